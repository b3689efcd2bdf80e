//! README validation and generation tools.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use courier_sampling::{SamplingClient, SamplingRequest};

use crate::tool::{optional_str, required_str, Tool, ToolDefinition};
use crate::ToolError;

/// Checks a README for the sections and structure a usable project page
/// needs, producing a score and a list of issues.
pub struct ValidateReadmeTool {
    title: Regex,
    sections: Vec<Section>,
}

struct Section {
    name: &'static str,
    pattern: Regex,
    weight: u32,
}

/// Score floor below which a README is reported invalid.
const PASSING_SCORE: u32 = 60;

/// Minimum content length before the "too short" deduction.
const MIN_LENGTH: usize = 200;

impl ValidateReadmeTool {
    /// Build the tool, compiling its heading patterns.
    pub fn new() -> Result<Self, ToolError> {
        Ok(Self {
            title: Regex::new(r"(?m)^#\s+\S")?,
            sections: vec![
                Section {
                    name: "installation",
                    pattern: Regex::new(r"(?im)^#{1,6}[^\n]*\b(installation|install|getting started)\b")?,
                    weight: 15,
                },
                Section {
                    name: "usage",
                    pattern: Regex::new(r"(?im)^#{1,6}[^\n]*\b(usage|examples?|quick\s*start)\b")?,
                    weight: 15,
                },
                Section {
                    name: "license",
                    pattern: Regex::new(r"(?im)^#{1,6}[^\n]*\blicen[sc]e\b")?,
                    weight: 10,
                },
            ],
        })
    }

    fn assess(&self, content: &str) -> Value {
        let mut score: u32 = 100;
        let mut issues: Vec<String> = Vec::new();

        let has_title = self.title.is_match(content);
        if !has_title {
            score = score.saturating_sub(30);
            issues.push("missing top-level title heading".to_string());
        }

        for section in &self.sections {
            if !section.pattern.is_match(content) {
                score = score.saturating_sub(section.weight);
                issues.push(format!("missing {} section", section.name));
            }
        }

        if !content.contains("```") {
            score = score.saturating_sub(10);
            issues.push("no code examples (fenced block)".to_string());
        }

        if content.len() < MIN_LENGTH {
            score = score.saturating_sub(15);
            issues.push(format!("content shorter than {MIN_LENGTH} characters"));
        }

        let valid = has_title && score >= PASSING_SCORE;
        json!({
            "valid": valid,
            "score": score,
            "issues": issues,
        })
    }
}

#[async_trait]
impl Tool for ValidateReadmeTool {
    fn name(&self) -> &str {
        "validate-readme"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("validate-readme", "Validate README structure and content")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "README markdown content"}
                },
                "required": ["content"]
            }))
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        if !arguments.is_object() {
            return Err(ToolError::invalid_args("arguments must be an object"));
        }
        Ok(())
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let content = required_str(arguments, "content")?;
        let report = self.assess(content);
        debug!(
            score = report["score"].as_u64(),
            valid = report["valid"].as_bool(),
            "README assessed"
        );
        Ok(report)
    }
}

/// Generates a README skeleton from project metadata.
///
/// When constructed with a sampling client, the overview paragraph is
/// drafted by the LLM through the sampling bridge; otherwise (or when
/// sampling fails) the description is used verbatim.
pub struct GenerateReadmeTool {
    sampling: Option<SamplingClient>,
}

impl GenerateReadmeTool {
    /// Template-only generator.
    pub fn new() -> Self {
        Self { sampling: None }
    }

    /// Generator with LLM-drafted overview prose.
    pub fn with_sampling(sampling: SamplingClient) -> Self {
        Self {
            sampling: Some(sampling),
        }
    }

    async fn overview(&self, name: &str, description: &str) -> (String, bool) {
        let Some(client) = &self.sampling else {
            return (description.to_string(), false);
        };

        let prompt = format!(
            "Write a concise one-paragraph overview for a software project \
             named '{name}'. Description: {description}. Plain prose, no headings."
        );
        let request =
            SamplingRequest::from_prompt(prompt, 512).with_system("You write project READMEs.");

        match client.create_message(&request).await {
            Ok(reply) => (reply.content, true),
            Err(e) => {
                // Sampling is best-effort here; the template still stands.
                warn!(error = %e, "Sampling failed, using description verbatim");
                (description.to_string(), false)
            }
        }
    }
}

impl Default for GenerateReadmeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GenerateReadmeTool {
    fn name(&self) -> &str {
        "generate-readme"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("generate-readme", "Generate a README skeleton")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Project name"},
                    "description": {"type": "string", "description": "Short project description"},
                    "language": {"type": "string", "description": "Implementation language"}
                },
                "required": ["name"]
            }))
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let name = required_str(arguments, "name")?;
        if name.is_empty() {
            return Err(ToolError::invalid_args("project name is empty"));
        }
        let description = optional_str(arguments, "description")?.unwrap_or("TODO: describe the project.");
        let language = optional_str(arguments, "language")?;

        let (overview, sampled) = self.overview(name, description).await;

        let install = match language {
            Some("rust") => format!("```sh\ncargo add {name}\n```"),
            Some("python") => format!("```sh\npip install {name}\n```"),
            Some("javascript") | Some("typescript") => format!("```sh\nnpm install {name}\n```"),
            _ => "```sh\n# installation steps\n```".to_string(),
        };

        let content = format!(
            "# {name}\n\n{overview}\n\n## Installation\n\n{install}\n\n\
             ## Usage\n\nSee the examples below.\n\n```\n# usage example\n```\n\n\
             ## License\n\nMIT\n"
        );

        Ok(json!({
            "content": content,
            "sampled": sampled,
        }))
    }
}
