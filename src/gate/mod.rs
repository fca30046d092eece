pub mod poller;
pub mod selector;

use std::sync::Arc;

use crate::gate::poller::{poll_until_complete, PollSettings};
use crate::platform::model::{
    BuildConfigName, DeploymentImageVerifier, Namespace, PlatformClient,
};
use crate::report::ProgressSink;

// Thread safe type aliases
pub type GateClient = Arc<dyn PlatformClient + Send + Sync + 'static>;
pub type GateImageVerifier = Arc<dyn DeploymentImageVerifier + Send + Sync + 'static>;
pub type GateSink = Arc<dyn ProgressSink + Send + Sync + 'static>;

/// Why the gate failed. Build failures and rollout failures are distinct
/// variants so an operator can tell "build broke" from "rollout didn't
/// happen" in the pipeline log.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("could not construct a platform client for the cluster API")]
    ClientUnavailable,
    #[error("no build matching config {0} appeared within the polling budget")]
    NoMatchingBuild(String),
    #[error("build {name} did not reach phase Complete within the polling budget (last phase: {phase}); inspect the platform server logs")]
    BuildNotComplete { name: String, phase: String },
    #[error("not all deployments with image change triggers on the output of {0} triggered with new images")]
    DeploymentNotTriggered(String),
    #[error("deployment verification failed: {0}")]
    VerificationFailed(String),
    #[error("verification cancelled before completion")]
    Cancelled,
}

/// Final pass/fail verdict. The calling pipeline fails its job when
/// `succeeded` is false; `reason` is the line it logs.
#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub succeeded: bool,
    pub reason: String,
}

impl VerificationResult {
    pub fn passed(build_config: &BuildConfigName) -> VerificationResult {
        VerificationResult {
            succeeded: true,
            reason: format!(
                "latest build of {} is complete and all image change triggers fired",
                build_config.as_str()
            ),
        }
    }

    pub fn failed(error: GateError) -> VerificationResult {
        VerificationResult {
            succeeded: false,
            reason: error.to_string(),
        }
    }
}

/// End-to-end verification gate: poll the latest build to completion, then
/// check the downstream image change triggers. All state is local to one
/// `verify` call, so independent gates may run concurrently.
pub struct BuildGate {
    image_verifier: GateImageVerifier,
    sink: GateSink,
    settings: PollSettings,
}

impl BuildGate {
    pub fn new(
        image_verifier: GateImageVerifier,
        sink: GateSink,
        settings: PollSettings,
    ) -> BuildGate {
        BuildGate {
            image_verifier,
            sink,
            settings,
        }
    }

    /// Runs the gate. An absent client fails immediately, before any
    /// polling; afterwards the flow is poll -> verify triggers -> verdict.
    /// Errors never cross this boundary; every outcome becomes a
    /// `VerificationResult` with its reason written to the sink.
    pub async fn verify(
        &self,
        client: Option<GateClient>,
        build_config: &BuildConfigName,
        namespace: &Namespace,
        verbose: bool,
    ) -> VerificationResult {
        self.sink.line(&format!(
            "BUILD GATE: verifying latest build of {} in namespace {}",
            build_config.as_str(),
            namespace.as_str()
        ));

        let Some(client) = client else {
            return self.exit(VerificationResult::failed(GateError::ClientUnavailable));
        };

        let outcome = poll_until_complete(
            client.as_ref(),
            build_config,
            namespace,
            self.settings,
            self.sink.as_ref(),
            verbose,
        )
        .await;

        if outcome.timed_out {
            let error = match outcome.latest {
                None => GateError::NoMatchingBuild(build_config.as_str().to_string()),
                Some(build) => GateError::BuildNotComplete {
                    name: build.name.as_str().to_string(),
                    phase: build.phase.to_string(),
                },
            };
            return self.exit(VerificationResult::failed(error));
        }

        let verdict = self
            .image_verifier
            .all_triggered_images_changed(build_config, namespace)
            .await;

        let result = match verdict {
            Ok(true) => VerificationResult::passed(build_config),
            Ok(false) => VerificationResult::failed(GateError::DeploymentNotTriggered(
                build_config.as_str().to_string(),
            )),
            Err(error) => {
                VerificationResult::failed(GateError::VerificationFailed(error.to_string()))
            }
        };
        self.exit(result)
    }

    fn exit(&self, result: VerificationResult) -> VerificationResult {
        self.sink.line(&format!("BUILD GATE EXIT: {}", result.reason));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::model::BuildPhase;
    use crate::platform::stubs::{build, ScriptedBuilds, TriggersError, TriggersFired, TriggersStuck};
    use crate::report::MemorySink;
    use std::time::Duration;
    use tokio::time::Instant;

    fn frontend() -> BuildConfigName {
        BuildConfigName::new("frontend").unwrap()
    }

    fn test_namespace() -> Namespace {
        Namespace::new("test").unwrap()
    }

    fn gate(
        verifier: GateImageVerifier,
        sink: Arc<MemorySink>,
        budget_secs: u64,
    ) -> BuildGate {
        let settings = PollSettings {
            budget: Duration::from_secs(budget_secs),
            interval: Duration::from_secs(1),
        };
        BuildGate::new(verifier, sink, settings)
    }

    #[tokio::test(start_paused = true)]
    async fn absent_client_fails_immediately_without_polling() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersFired), sink.clone(), 60);
        let started = Instant::now();

        let result = gate
            .verify(None, &frontend(), &test_namespace(), false)
            .await;

        assert!(!result.succeeded);
        assert!(result.reason.contains("client"));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(sink
            .lines()
            .iter()
            .any(|line| line.starts_with("BUILD GATE EXIT:")));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_build_with_fired_triggers_passes() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersFired), sink.clone(), 60);
        let client = Arc::new(ScriptedBuilds::always(vec![build(
            "frontend-1",
            BuildPhase::Complete,
        )]));

        let result = gate
            .verify(
                Some(client.clone() as GateClient),
                &frontend(),
                &test_namespace(),
                false,
            )
            .await;

        assert!(result.succeeded);
        assert_eq!(client.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_build_with_stuck_triggers_fails_with_deployment_reason() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersStuck), sink.clone(), 60);
        let client = Arc::new(ScriptedBuilds::always(vec![build(
            "frontend-1",
            BuildPhase::Complete,
        )]));

        let result = gate
            .verify(
                Some(client as GateClient),
                &frontend(),
                &test_namespace(),
                false,
            )
            .await;

        assert!(!result.succeeded);
        assert!(result.reason.contains("image change triggers"));
        assert!(!result.reason.contains("polling budget"));
    }

    #[tokio::test(start_paused = true)]
    async fn verifier_error_fails_with_verification_reason() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersError), sink.clone(), 60);
        let client = Arc::new(ScriptedBuilds::always(vec![build(
            "frontend-1",
            BuildPhase::Complete,
        )]));

        let result = gate
            .verify(
                Some(client as GateClient),
                &frontend(),
                &test_namespace(),
                false,
            )
            .await;

        assert!(!result.succeeded);
        assert!(result.reason.contains("deployment verification failed"));
        assert!(result.reason.contains("listing deployment configs in test failed"));
        assert!(sink
            .lines()
            .iter()
            .any(|line| line.starts_with("BUILD GATE EXIT:")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_any_matching_build_reports_no_match() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersFired), sink.clone(), 3);
        let client = Arc::new(ScriptedBuilds::always(Vec::new()));
        let started = Instant::now();

        let result = gate
            .verify(
                Some(client as GateClient),
                &frontend(),
                &test_namespace(),
                false,
            )
            .await;

        assert!(!result.succeeded);
        assert!(result.reason.contains("no build matching config frontend"));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_stalled_build_reports_its_last_phase() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersFired), sink.clone(), 3);
        let client = Arc::new(ScriptedBuilds::always(vec![build(
            "frontend-4",
            BuildPhase::Running,
        )]));

        let result = gate
            .verify(
                Some(client as GateClient),
                &frontend(),
                &test_namespace(),
                false,
            )
            .await;

        assert!(!result.succeeded);
        assert!(result.reason.contains("frontend-4"));
        assert!(result.reason.contains("Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn banners_frame_the_transcript() {
        let sink = Arc::new(MemorySink::new());
        let gate = gate(Arc::new(TriggersFired), sink.clone(), 60);
        let client = Arc::new(ScriptedBuilds::always(vec![build(
            "frontend-1",
            BuildPhase::Complete,
        )]));

        gate.verify(
            Some(client as GateClient),
            &frontend(),
            &test_namespace(),
            true,
        )
        .await;

        let lines = sink.lines();
        assert!(lines.first().unwrap().starts_with("BUILD GATE:"));
        assert!(lines.last().unwrap().starts_with("BUILD GATE EXIT:"));
    }
}
