//! Command implementations and service wiring.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use courier_bridge::{BridgeConfig, CallBridge, ResponseRouter};
use courier_bus::{InMemoryBus, MessageChannel};
use courier_core::Config;
use courier_gateway::GatewayState;
use courier_sampling::{
    AnthropicBackend, EchoBackend, SamplingBackend, SamplingClient, SamplingExecutor,
};
use courier_tools::{GenerateReadmeTool, Tool, ToolExecutor, ToolRegistry, ValidateReadmeTool};

/// Everything a single-process deployment wires together.
struct App {
    bus: Arc<InMemoryBus>,
    tool_bridge: Arc<CallBridge>,
    sampling_bridge: Arc<CallBridge>,
}

impl App {
    /// Build the bus, both executors, and both bridge instances.
    async fn wire(config: &Config) -> anyhow::Result<Self> {
        let bus = Arc::new(InMemoryBus::with_capacity(config.channel.capacity));
        let channel = bus.clone() as Arc<dyn MessageChannel>;

        // Sampling side.
        let backend = build_backend(config)?;
        let sampling_executor = SamplingExecutor::new(
            channel.clone(),
            backend,
            config.sampling.clone(),
            config.source.clone(),
        );
        tokio::spawn(sampling_executor.run());

        let sampling_bridge = Arc::new(CallBridge::new(
            channel.clone(),
            BridgeConfig::sampling(&config.sampling, config.source.clone()),
        ));
        let sampling_sub = bus
            .subscribe(&config.sampling.response_topic, &config.source)
            .await
            .context("subscribing to sampling responses")?;
        tokio::spawn(ResponseRouter::new(sampling_bridge.clone()).run(sampling_sub));

        let sampling_client = SamplingClient::new(
            sampling_bridge.clone(),
            Duration::from_millis(config.timeouts.sampling_ms),
        );

        // Tool side.
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(
            ValidateReadmeTool::new().context("building README validator")?,
        ));
        registry.register(Arc::new(GenerateReadmeTool::with_sampling(sampling_client)));

        let tool_executor = ToolExecutor::new(
            channel.clone(),
            Arc::new(registry),
            config.tools.clone(),
            config.source.clone(),
        );
        tokio::spawn(tool_executor.run());

        // Agent side.
        let tool_bridge = Arc::new(CallBridge::new(
            channel,
            BridgeConfig::tool_calls(&config.tools, config.source.clone()),
        ));
        let tool_sub = bus
            .subscribe(&config.tools.response_topic, &config.source)
            .await
            .context("subscribing to tool responses")?;
        tokio::spawn(ResponseRouter::new(tool_bridge.clone()).run(tool_sub));

        Ok(Self {
            bus,
            tool_bridge,
            sampling_bridge,
        })
    }

    /// Reject pending calls and stop the bus.
    fn shutdown(&self) {
        self.tool_bridge.shutdown();
        self.sampling_bridge.shutdown();
        self.bus.close();
    }
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn SamplingBackend>> {
    match config.backend.kind.as_str() {
        "anthropic" => {
            let Some(api_key) = config.backend.resolve_api_key() else {
                bail!("anthropic backend selected but no API key configured");
            };
            Ok(Arc::new(AnthropicBackend::new(
                api_key,
                config.backend.model.clone(),
            )))
        }
        "echo" => Ok(Arc::new(EchoBackend)),
        other => bail!("unknown sampling backend '{other}'"),
    }
}

/// Run the full service until interrupted.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let app = App::wire(&config).await?;

    let state = GatewayState {
        tool_bridge: app.tool_bridge.clone(),
        sampling_bridge: app.sampling_bridge.clone(),
        default_timeout: Duration::from_millis(config.timeouts.tool_call_ms),
    };
    let addr = config
        .gateway
        .bind
        .parse()
        .context("parsing gateway bind address")?;

    tokio::select! {
        result = courier_gateway::serve(addr, state) => {
            result.context("gateway failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    app.shutdown();
    Ok(())
}

/// Issue one tool call through the full pub/sub round trip.
pub async fn call(
    config: Config,
    tool: &str,
    args: &str,
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("parsing --args as JSON")?;
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(config.timeouts.tool_call_ms));

    let app = App::wire(&config).await?;
    let result = app.tool_bridge.call(tool, arguments, timeout).await;
    app.shutdown();

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            warn!(tool = tool, error = %e, "Call failed");
            bail!("{e}");
        }
    }
}

/// Validate a README file directly.
pub async fn validate(path: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let tool = ValidateReadmeTool::new().context("building README validator")?;
    let report = tool
        .execute(&serde_json::json!({ "content": content }))
        .await
        .context("running validation")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report["valid"] != serde_json::json!(true) {
        bail!("README failed validation");
    }
    Ok(())
}
