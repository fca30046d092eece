mod configuration;
mod gate;
mod platform;
mod report;

use clap::Parser;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::configuration::{Cli, FileConfig};
use crate::gate::{
    BuildGate, GateClient, GateError, GateImageVerifier, GateSink, VerificationResult,
};
use crate::platform::model::BuildPhase;
use crate::platform::openshift::OpenShiftClient;
use crate::platform::stubs;
use crate::report::StdoutSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => configuration::load_from_yaml(path)?,
        None => FileConfig::default(),
    };
    let config = configuration::resolve(cli, file)?;

    let sink: GateSink = Arc::new(StdoutSink);

    let (client, image_verifier): (Option<GateClient>, GateImageVerifier) = if config.dry_run {
        let latest = format!("{}-1", config.build_config.as_str());
        (
            Some(Arc::new(stubs::ScriptedBuilds::always(vec![stubs::build(
                &latest,
                BuildPhase::Complete,
            )]))),
            Arc::new(stubs::TriggersFired),
        )
    } else {
        match OpenShiftClient::connect(&config.cluster).await {
            Ok(open_shift) => {
                let shared = Arc::new(open_shift);
                (Some(shared.clone()), shared)
            }
            Err(err) => {
                error!(error = %err, "platform client construction failed");
                (None, Arc::new(stubs::TriggersFired))
            }
        }
    };

    let gate = BuildGate::new(image_verifier, sink.clone(), config.poll);
    let result = tokio::select! {
        result = gate.verify(client, &config.build_config, &config.namespace, config.verbose) => result,
        _ = tokio::signal::ctrl_c() => {
            let cancelled = VerificationResult::failed(GateError::Cancelled);
            sink.line(&format!("BUILD GATE EXIT: {}", cancelled.reason));
            cancelled
        }
    };

    if !result.succeeded {
        std::process::exit(1);
    }
    Ok(())
}
