use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::gate::selector::select_latest;
use crate::platform::model::{
    BuildConfigName, BuildPhase, BuildRecord, Namespace, PlatformClient,
};
use crate::report::ProgressSink;

/// Wall-clock budget for the whole loop and the delay between listings.
/// Both are explicit settings rather than constants baked into the loop.
#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    pub budget: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> PollSettings {
        PollSettings {
            budget: Duration::from_secs(60),
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct PollOutcome {
    /// Last observed latest build, if any build ever matched the prefix.
    pub latest: Option<BuildRecord>,
    /// Whether the budget ran out before a Complete phase was observed.
    pub timed_out: bool,
}

/// Lists builds in the namespace until the latest one derived from
/// `build_config` reaches phase Complete, or the budget elapses. Each
/// iteration re-lists from the platform; nothing is cached beyond the
/// current latest record. A listing error counts as an empty listing for
/// that cycle, so a flaky API server costs budget rather than the verdict.
///
/// The sleep between iterations is an ordinary tokio timer; dropping the
/// returned future cancels the loop cleanly.
pub async fn poll_until_complete(
    client: &dyn PlatformClient,
    build_config: &BuildConfigName,
    namespace: &Namespace,
    settings: PollSettings,
    sink: &dyn ProgressSink,
    verbose: bool,
) -> PollOutcome {
    let deadline = Instant::now() + settings.budget;
    let mut latest: Option<BuildRecord> = None;

    while Instant::now() < deadline {
        let builds = match client.list_builds(namespace).await {
            Ok(builds) => builds,
            Err(error) => {
                warn!(error = %error, "build listing failed, retrying");
                Vec::new()
            }
        };

        let matching: Vec<BuildRecord> = builds
            .into_iter()
            .filter(|build| build.name.derives_from(build_config))
            .collect();

        let picked = select_latest(matching.iter().map(|build| &build.name)).cloned();
        if let Some(name) = picked {
            if verbose {
                sink.line(&format!(
                    "latest build for {} is {}",
                    build_config.as_str(),
                    name.as_str()
                ));
            }
            latest = matching.into_iter().find(|build| build.name == name);
        }

        let phase = latest.as_ref().map(|build| build.phase);
        if verbose {
            match phase {
                Some(phase) => sink.line(&format!("observed build phase: {phase}")),
                None => sink.line("no matching build yet"),
            }
        }

        if phase == Some(BuildPhase::Complete) {
            return PollOutcome {
                latest,
                timed_out: false,
            };
        }

        sleep(settings.interval).await;
    }

    PollOutcome {
        latest,
        timed_out: true,
    }
}
