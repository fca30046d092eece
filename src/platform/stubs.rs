use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::platform::model::{
    BuildConfigName, BuildName, BuildPhase, BuildRecord, DeploymentImageVerifier, Namespace,
    PlatformClient,
};

pub fn build(name: &str, phase: BuildPhase) -> BuildRecord {
    BuildRecord {
        name: BuildName::from(name),
        phase,
        output_image: None,
    }
}

/// Replays one scripted listing per poll, in order. Once the script runs
/// out, the last listing keeps repeating (an empty script repeats an empty
/// listing).
pub struct ScriptedBuilds {
    responses: Mutex<VecDeque<Vec<BuildRecord>>>,
    polls: Mutex<usize>,
}

impl ScriptedBuilds {
    pub fn new(responses: Vec<Vec<BuildRecord>>) -> ScriptedBuilds {
        ScriptedBuilds {
            responses: Mutex::new(responses.into()),
            polls: Mutex::new(0),
        }
    }

    pub fn always(records: Vec<BuildRecord>) -> ScriptedBuilds {
        ScriptedBuilds::new(vec![records])
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl PlatformClient for ScriptedBuilds {
    async fn list_builds(&self, _namespace: &Namespace) -> anyhow::Result<Vec<BuildRecord>> {
        *self.polls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.pop_front().unwrap_or_default())
        } else {
            Ok(responses.front().cloned().unwrap_or_default())
        }
    }
}

pub struct ListingFails;

#[async_trait]
impl PlatformClient for ListingFails {
    async fn list_builds(&self, namespace: &Namespace) -> anyhow::Result<Vec<BuildRecord>> {
        anyhow::bail!("listing builds in {} failed", namespace.as_str())
    }
}

pub struct TriggersFired;

#[async_trait]
impl DeploymentImageVerifier for TriggersFired {
    async fn all_triggered_images_changed(
        &self,
        _build_config: &BuildConfigName,
        _namespace: &Namespace,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
}

pub struct TriggersStuck;

#[async_trait]
impl DeploymentImageVerifier for TriggersStuck {
    async fn all_triggered_images_changed(
        &self,
        _build_config: &BuildConfigName,
        _namespace: &Namespace,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }
}

pub struct TriggersError;

#[async_trait]
impl DeploymentImageVerifier for TriggersError {
    async fn all_triggered_images_changed(
        &self,
        _build_config: &BuildConfigName,
        namespace: &Namespace,
    ) -> anyhow::Result<bool> {
        anyhow::bail!(
            "listing deployment configs in {} failed",
            namespace.as_str()
        )
    }
}
