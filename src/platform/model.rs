use async_trait::async_trait;

use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fmt::Formatter;

/// Name of a build config on the platform. Builds derived from it are
/// named `<config>-<sequence>`. Never empty.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct BuildConfigName(String);

impl BuildConfigName {
    pub fn new(name: impl Into<String>) -> Option<BuildConfigName> {
        let name = name.into();
        if name.is_empty() {
            None
        } else {
            Some(BuildConfigName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct BuildConfigNameVisitor;

impl<'de> Visitor<'de> for BuildConfigNameVisitor {
    type Value = BuildConfigName;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("Expecting build config name to be a non-empty string.")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        match BuildConfigName::new(v) {
            None => Err(E::custom("Expecting build config name to be a non-empty string.")),
            Some(name) => Ok(name),
        }
    }
}

impl<'de> Deserialize<'de> for BuildConfigName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(BuildConfigNameVisitor)
    }
}

/// Cluster namespace holding the builds and deployments. Never empty.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Option<Namespace> {
        let name = name.into();
        if name.is_empty() {
            None
        } else {
            Some(Namespace(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct NamespaceVisitor;

impl<'de> Visitor<'de> for NamespaceVisitor {
    type Value = Namespace;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("Expecting namespace to be a non-empty string.")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        match Namespace::new(v) {
            None => Err(E::custom("Expecting namespace to be a non-empty string.")),
            Some(namespace) => Ok(namespace),
        }
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(NamespaceVisitor)
    }
}

/// Name of a single build instance. Ordered by plain string comparison,
/// which is also the "latest build" ordering the gate inherits.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BuildName(String);

impl BuildName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix match against the originating build config. Deliberately
    /// permissive: "frontend" also matches a build config named
    /// "frontend-canary".
    pub fn derives_from(&self, config: &BuildConfigName) -> bool {
        self.0.starts_with(config.as_str())
    }
}

impl From<&str> for BuildName {
    fn from(name: &str) -> BuildName {
        BuildName(name.to_string())
    }
}

impl From<String> for BuildName {
    fn from(name: String) -> BuildName {
        BuildName(name)
    }
}

/// Build phases reported by the platform, as a closed set. Anything the
/// platform reports outside this set parses to Unknown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    Unknown,
}

impl BuildPhase {
    pub fn parse(raw: &str) -> BuildPhase {
        match raw {
            "New" => BuildPhase::New,
            "Pending" => BuildPhase::Pending,
            "Running" => BuildPhase::Running,
            "Complete" => BuildPhase::Complete,
            "Failed" => BuildPhase::Failed,
            "Error" => BuildPhase::Error,
            "Cancelled" => BuildPhase::Cancelled,
            _ => BuildPhase::Unknown,
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let raw = match self {
            BuildPhase::New => "New",
            BuildPhase::Pending => "Pending",
            BuildPhase::Running => "Running",
            BuildPhase::Complete => "Complete",
            BuildPhase::Failed => "Failed",
            BuildPhase::Error => "Error",
            BuildPhase::Cancelled => "Cancelled",
            BuildPhase::Unknown => "Unknown",
        };
        f.write_str(raw)
    }
}

/// Snapshot of a build as listed from the platform. Recomputed on every
/// poll cycle, never cached across iterations.
#[derive(Clone, Debug)]
pub struct BuildRecord {
    pub name: BuildName,
    pub phase: BuildPhase,
    pub output_image: Option<String>,
}

#[async_trait]
pub trait PlatformClient {
    async fn list_builds(&self, namespace: &Namespace) -> anyhow::Result<Vec<BuildRecord>>;
}

#[async_trait]
pub trait DeploymentImageVerifier {
    /// Whether every deployment declaring an image change trigger on the
    /// build config's output image has fired with the new image. Called
    /// once, after build completion; must not touch build state.
    async fn all_triggered_images_changed(
        &self,
        build_config: &BuildConfigName,
        namespace: &Namespace,
    ) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_build_config_name_is_rejected() {
        assert!(BuildConfigName::new("").is_none());
        assert!(BuildConfigName::new("frontend").is_some());
    }

    #[test]
    fn empty_namespace_is_rejected() {
        assert!(Namespace::new("").is_none());
        assert!(Namespace::new("test").is_some());
    }

    #[test]
    fn build_config_name_rejects_empty_yaml_value() {
        let parsed: Result<BuildConfigName, _> = serde_yaml::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: Result<BuildConfigName, _> = serde_yaml::from_str("frontend");
        assert_eq!(parsed.unwrap().as_str(), "frontend");
    }

    #[test]
    fn build_name_prefix_match_is_permissive() {
        let config = BuildConfigName::new("frontend").unwrap();
        assert!(BuildName::from("frontend-1").derives_from(&config));
        assert!(BuildName::from("frontend").derives_from(&config));
        assert!(BuildName::from("frontend-canary-2").derives_from(&config));
        assert!(!BuildName::from("backend-1").derives_from(&config));
    }

    #[test]
    fn build_phase_parses_known_and_unknown_values() {
        assert_eq!(BuildPhase::parse("Complete"), BuildPhase::Complete);
        assert_eq!(BuildPhase::parse("Running"), BuildPhase::Running);
        assert_eq!(BuildPhase::parse("SomethingNew"), BuildPhase::Unknown);
    }

    #[test]
    fn build_phase_display_round_trips() {
        assert_eq!(BuildPhase::parse(&BuildPhase::Failed.to_string()), BuildPhase::Failed);
        assert_eq!(BuildPhase::Complete.to_string(), "Complete");
    }
}
