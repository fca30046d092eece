use async_trait::async_trait;

use http::Uri;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, DynamicObject, ListParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::ResourceExt;
use kube_client::config::KubeConfigOptions;
use kube_client::{Client, Config};
use secrecy::SecretString;
use tracing::debug;

use crate::platform::model::{
    BuildConfigName, BuildName, BuildPhase, BuildRecord, DeploymentImageVerifier, Namespace,
    PlatformClient,
};

/// Explicit connection settings for the cluster API. Nothing here is read
/// from ambient process state; the local kubeconfig is only a fallback when
/// no API URL is given.
#[derive(Clone, Debug, Default)]
pub struct ClusterSettings {
    pub api_url: Option<String>,
    pub auth_token: Option<String>,
}

pub struct OpenShiftClient {
    client: Client,
}

impl OpenShiftClient {
    pub async fn connect(settings: &ClusterSettings) -> anyhow::Result<OpenShiftClient> {
        let config = match &settings.api_url {
            Some(url) => {
                let mut config = Config::new(url.parse::<Uri>()?);
                if let Some(token) = &settings.auth_token {
                    config.auth_info.token = Some(SecretString::new(token.clone()));
                }
                config
            }
            None => Config::from_kubeconfig(&KubeConfigOptions::default()).await?,
        };
        let client = Client::try_from(config)?;
        Ok(OpenShiftClient { client })
    }

    fn builds(&self, namespace: &Namespace) -> Api<DynamicObject> {
        self.namespaced(namespace, "build.openshift.io", "Build")
    }

    fn build_configs(&self, namespace: &Namespace) -> Api<DynamicObject> {
        self.namespaced(namespace, "build.openshift.io", "BuildConfig")
    }

    fn deployment_configs(&self, namespace: &Namespace) -> Api<DynamicObject> {
        self.namespaced(namespace, "apps.openshift.io", "DeploymentConfig")
    }

    fn namespaced(&self, namespace: &Namespace, group: &str, kind: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(group, "v1", kind);
        let resource = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), namespace.as_str(), &resource)
    }
}

#[async_trait]
impl PlatformClient for OpenShiftClient {
    async fn list_builds(&self, namespace: &Namespace) -> anyhow::Result<Vec<BuildRecord>> {
        let builds = self.builds(namespace).list(&ListParams::default()).await?;
        debug!(
            namespace = namespace.as_str(),
            count = builds.items.len(),
            "listed builds"
        );
        Ok(builds.items.iter().map(build_record).collect())
    }
}

#[async_trait]
impl DeploymentImageVerifier for OpenShiftClient {
    async fn all_triggered_images_changed(
        &self,
        build_config: &BuildConfigName,
        namespace: &Namespace,
    ) -> anyhow::Result<bool> {
        let config = self.build_configs(namespace).get(build_config.as_str()).await?;
        let Some(output_tag) = output_image_tag(&config) else {
            // Nothing downstream can trigger on a config without an
            // image stream output.
            return Ok(true);
        };

        let deployments = self
            .deployment_configs(namespace)
            .list(&ListParams::default())
            .await?;
        debug!(
            namespace = namespace.as_str(),
            output_tag = output_tag.as_str(),
            count = deployments.items.len(),
            "checking image change triggers"
        );
        Ok(deployments
            .items
            .iter()
            .all(|config| deployment_config_triggered(config, &output_tag)))
    }
}

fn build_record(object: &DynamicObject) -> BuildRecord {
    let phase = object.data["status"]["phase"]
        .as_str()
        .map(BuildPhase::parse)
        .unwrap_or(BuildPhase::Unknown);
    let output_image = object.data["status"]["outputDockerImageReference"]
        .as_str()
        .map(str::to_string);
    debug!(
        build = %object.name_any(),
        phase = %phase,
        created = ?created(object),
        "observed build"
    );
    BuildRecord {
        name: BuildName::from(object.name_any()),
        phase,
        output_image,
    }
}

fn created(object: &DynamicObject) -> Option<&Time> {
    object.metadata.creation_timestamp.as_ref()
}

/// The ImageStreamTag a build config pushes to, e.g. "frontend:latest".
fn output_image_tag(build_config: &DynamicObject) -> Option<String> {
    let to = &build_config.data["spec"]["output"]["to"];
    match to["kind"].as_str() {
        Some("ImageStreamTag") => to["name"].as_str().map(str::to_string),
        _ => None,
    }
}

/// True unless the deployment config carries an ImageChange trigger on
/// `output_tag` that has not fired yet. Configs without such a trigger pass
/// vacuously.
fn deployment_config_triggered(deployment_config: &DynamicObject, output_tag: &str) -> bool {
    let Some(triggers) = deployment_config.data["spec"]["triggers"].as_array() else {
        return true;
    };
    triggers.iter().all(|trigger| {
        if trigger["type"].as_str() != Some("ImageChange") {
            return true;
        }
        let params = &trigger["imageChangeParams"];
        if params["from"]["name"].as_str() != Some(output_tag) {
            return true;
        }
        params["lastTriggeredImage"]
            .as_str()
            .map_or(false, |image| !image.is_empty())
    })
}
