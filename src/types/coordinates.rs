//! Module and artifact coordinates.
//!
//! These are the values the resolver hands to the engine. Both types are
//! plain data: ordered, hashable and serializable, so they can key the
//! interning caches and the per-node query caches directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing a coordinate from its textual form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateError {
    /// Input was not of the form `group:name`.
    #[error("Malformed module coordinate '{0}': expected 'group:name'")]
    Malformed(String),
}

/// A module coordinate: group plus name.
///
/// Ordered by group, then name, which gives module-id sets a stable
/// iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    group: String,
    name: String,
}

impl ModuleId {
    /// Create a new module coordinate.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// The module group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl FromStr for ModuleId {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() && !name.contains(':') => {
                Ok(Self::new(group, name))
            }
            _ => Err(CoordinateError::Malformed(s.to_string())),
        }
    }
}

/// An Ivy-style artifact name.
///
/// `extension` and `classifier` are optional, matching how artifacts are
/// declared in module metadata.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactName {
    name: String,
    artifact_type: String,
    extension: Option<String>,
    classifier: Option<String>,
}

impl ArtifactName {
    /// Create a new artifact name.
    pub fn new(
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        extension: Option<String>,
        classifier: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_type: artifact_type.into(),
            extension,
            classifier,
        }
    }

    /// Shorthand for a `jar` artifact with a `jar` extension and no classifier.
    pub fn jar(name: impl Into<String>) -> Self {
        Self::new(name, "jar", Some("jar".to_string()), None)
    }

    /// The artifact name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The artifact type (`jar`, `pom`, `source`, ...).
    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    /// The file extension, if declared.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// The classifier, if declared.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(classifier) = &self.classifier {
            write!(f, "-{}", classifier)?;
        }
        if let Some(extension) = &self.extension {
            write!(f, ".{}", extension)?;
        }
        write!(f, " ({})", self.artifact_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_parse_and_display() {
        let id: ModuleId = "org.example:core".parse().unwrap();
        assert_eq!(id.group(), "org.example");
        assert_eq!(id.name(), "core");
        assert_eq!(id.to_string(), "org.example:core");
    }

    #[test]
    fn test_module_id_parse_rejects_malformed() {
        assert!("no-separator".parse::<ModuleId>().is_err());
        assert!(":name".parse::<ModuleId>().is_err());
        assert!("group:".parse::<ModuleId>().is_err());
        assert_eq!(
            "a:b:c".parse::<ModuleId>(),
            Err(CoordinateError::Malformed("a:b:c".to_string()))
        );
    }

    #[test]
    fn test_module_id_ordering() {
        let a = ModuleId::new("a", "z");
        let b = ModuleId::new("b", "a");
        assert!(a < b);
        assert!(ModuleId::new("a", "a") < a);
    }

    #[test]
    fn test_artifact_display() {
        let sources = ArtifactName::new(
            "core",
            "source",
            Some("jar".to_string()),
            Some("sources".to_string()),
        );
        assert_eq!(sources.to_string(), "core-sources.jar (source)");
        assert_eq!(ArtifactName::jar("core").to_string(), "core.jar (jar)");
    }

    #[test]
    fn test_serde_roundtrip_preserves_equality() {
        let id = ModuleId::new("g", "n");
        let json = serde_json::to_string(&id).unwrap();
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
