//! Leaf exclude predicates.
//!
//! A leaf decides exclusion from its own parameters only. Leaves without
//! artifact granularity answer artifact queries by delegating to their
//! module-level answer.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ExcludeError;
use crate::matcher::{CompiledPattern, MatcherRegistry};

use super::coordinates::{ArtifactName, ModuleId};

/// Discriminant of an exclude spec, used for diagnostics and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludeKind {
    /// Excludes nothing.
    Nothing,
    /// Excludes everything.
    Everything,
    /// Excludes a whole group.
    Group,
    /// Excludes every module with a given name.
    Module,
    /// Excludes one module.
    ModuleId,
    /// Excludes a set of modules.
    ModuleIdSet,
    /// Excludes one artifact of one module.
    Artifact,
    /// Excludes by Ivy pattern.
    IvyPattern,
    /// Union of child specs.
    AnyOf,
    /// Intersection of child specs.
    AllOf,
}

impl fmt::Display for ExcludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nothing => "nothing",
            Self::Everything => "everything",
            Self::Group => "group",
            Self::Module => "module",
            Self::ModuleId => "module_id",
            Self::ModuleIdSet => "module_id_set",
            Self::Artifact => "artifact",
            Self::IvyPattern => "ivy_pattern",
            Self::AnyOf => "any_of",
            Self::AllOf => "all_of",
        };
        f.write_str(name)
    }
}

/// Compiled matchers for the artifact part of an Ivy pattern exclude.
#[derive(Debug)]
struct ArtifactPatterns {
    name: Box<dyn CompiledPattern>,
    artifact_type: Box<dyn CompiledPattern>,
    extension: Box<dyn CompiledPattern>,
}

/// Exclude rule expressed with Ivy patterns.
///
/// Without an artifact it excludes whole modules whose group and name match.
/// With an artifact it only excludes matching artifacts and never a whole
/// module.
#[derive(Debug)]
pub struct IvyPatternExclude {
    module: ModuleId,
    artifact: Option<ArtifactName>,
    matcher: String,
    group_pattern: Box<dyn CompiledPattern>,
    name_pattern: Box<dyn CompiledPattern>,
    artifact_patterns: Option<ArtifactPatterns>,
}

impl IvyPatternExclude {
    /// Compile a pattern exclude with the named matcher.
    ///
    /// An artifact extension of `None` is treated as the any-expression.
    pub fn compile(
        matchers: &MatcherRegistry,
        module: ModuleId,
        artifact: Option<ArtifactName>,
        matcher: &str,
    ) -> Result<Self, ExcludeError> {
        let compiler = matchers.get(matcher)?;
        let group_pattern = compiler.compile(module.group())?;
        let name_pattern = compiler.compile(module.name())?;
        let artifact_patterns = match &artifact {
            Some(artifact) => Some(ArtifactPatterns {
                name: compiler.compile(artifact.name())?,
                artifact_type: compiler.compile(artifact.artifact_type())?,
                extension: compiler.compile(artifact.extension().unwrap_or(crate::matcher::ANY_EXPRESSION))?,
            }),
            None => None,
        };
        Ok(Self {
            module,
            artifact,
            matcher: matcher.to_string(),
            group_pattern,
            name_pattern,
            artifact_patterns,
        })
    }

    /// Module coordinate whose group and name are patterns.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Artifact whose fields are patterns, if this is an artifact exclude.
    pub fn artifact(&self) -> Option<&ArtifactName> {
        self.artifact.as_ref()
    }

    /// Name of the matcher used to compile the patterns.
    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    fn matches_module(&self, module: &ModuleId) -> bool {
        self.group_pattern.matches(module.group()) && self.name_pattern.matches(module.name())
    }
}

impl PartialEq for IvyPatternExclude {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.artifact == other.artifact && self.matcher == other.matcher
    }
}

impl Eq for IvyPatternExclude {}

/// A leaf exclude predicate.
#[derive(Debug, PartialEq, Eq)]
pub enum ExcludeLeaf {
    /// Excludes nothing.
    Nothing,
    /// Excludes every module and artifact.
    Everything,
    /// Excludes every module of a group.
    Group(String),
    /// Excludes every module with this name, whatever the group.
    Module(String),
    /// Excludes exactly one module.
    ModuleId(ModuleId),
    /// Excludes any module of the set.
    ModuleIdSet(BTreeSet<ModuleId>),
    /// Excludes one artifact of one module.
    Artifact {
        /// Owning module.
        module: ModuleId,
        /// Excluded artifact.
        artifact: ArtifactName,
    },
    /// Excludes by Ivy pattern.
    IvyPattern(IvyPatternExclude),
}

impl ExcludeLeaf {
    /// Kind of this leaf.
    pub fn kind(&self) -> ExcludeKind {
        match self {
            Self::Nothing => ExcludeKind::Nothing,
            Self::Everything => ExcludeKind::Everything,
            Self::Group(_) => ExcludeKind::Group,
            Self::Module(_) => ExcludeKind::Module,
            Self::ModuleId(_) => ExcludeKind::ModuleId,
            Self::ModuleIdSet(_) => ExcludeKind::ModuleIdSet,
            Self::Artifact { .. } => ExcludeKind::Artifact,
            Self::IvyPattern(_) => ExcludeKind::IvyPattern,
        }
    }

    /// Whether the whole module is excluded.
    pub fn excludes_module(&self, module: &ModuleId) -> bool {
        match self {
            Self::Nothing => false,
            Self::Everything => true,
            Self::Group(group) => module.group() == group,
            Self::Module(name) => module.name() == name,
            Self::ModuleId(id) => id == module,
            Self::ModuleIdSet(ids) => ids.contains(module),
            Self::Artifact { .. } => false,
            Self::IvyPattern(pattern) => pattern.artifact.is_none() && pattern.matches_module(module),
        }
    }

    /// Whether this artifact of the module is excluded.
    pub fn excludes_artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> bool {
        match self {
            Self::Artifact {
                module: excluded_module,
                artifact: excluded_artifact,
            } => excluded_module == module && excluded_artifact == artifact,
            Self::IvyPattern(pattern) => match &pattern.artifact_patterns {
                Some(patterns) => {
                    pattern.matches_module(module)
                        && patterns.name.matches(artifact.name())
                        && patterns.artifact_type.matches(artifact.artifact_type())
                        && patterns.extension.matches(artifact.extension().unwrap_or(""))
                }
                None => self.excludes_module(module),
            },
            _ => self.excludes_module(module),
        }
    }

    /// Whether this leaf can express an artifact-specific restriction.
    pub fn may_exclude_artifacts(&self) -> bool {
        match self {
            Self::Artifact { .. } => true,
            Self::IvyPattern(pattern) => pattern.artifact.is_some(),
            _ => false,
        }
    }

    /// Equality that ignores artifact-level refinements.
    pub fn equals_ignore_artifact(&self, other: &ExcludeLeaf) -> bool {
        match (self, other) {
            (Self::Artifact { module: a, .. }, Self::Artifact { module: b, .. }) => a == b,
            (Self::IvyPattern(a), Self::IvyPattern(b)) => a.module == b.module && a.matcher == b.matcher,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ExcludeLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "excludes nothing"),
            Self::Everything => write!(f, "excludes everything"),
            Self::Group(group) => write!(f, "{{ group = {} }}", group),
            Self::Module(name) => write!(f, "{{ module = {} }}", name),
            Self::ModuleId(id) => write!(f, "{{ module id = {} }}", id),
            Self::ModuleIdSet(ids) => {
                write!(f, "{{ module ids = [")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", id)?;
                }
                write!(f, "] }}")
            }
            Self::Artifact { module, artifact } => {
                write!(f, "{{ artifact = {} of {} }}", artifact, module)
            }
            Self::IvyPattern(pattern) => match &pattern.artifact {
                Some(artifact) => write!(
                    f,
                    "{{ {} pattern = {} of {} }}",
                    pattern.matcher, artifact, pattern.module
                ),
                None => write!(f, "{{ {} pattern = {} }}", pattern.matcher, pattern.module),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{GLOB, REGEXP};

    fn id(group: &str, name: &str) -> ModuleId {
        ModuleId::new(group, name)
    }

    fn pattern(module: ModuleId, artifact: Option<ArtifactName>, matcher: &str) -> ExcludeLeaf {
        ExcludeLeaf::IvyPattern(
            IvyPatternExclude::compile(&MatcherRegistry::with_builtins(), module, artifact, matcher).unwrap(),
        )
    }

    #[test]
    fn test_constants() {
        let m = id("g", "n");
        let jar = ArtifactName::jar("n");
        assert!(!ExcludeLeaf::Nothing.excludes_module(&m));
        assert!(!ExcludeLeaf::Nothing.excludes_artifact(&m, &jar));
        assert!(ExcludeLeaf::Everything.excludes_module(&m));
        assert!(ExcludeLeaf::Everything.excludes_artifact(&m, &jar));
        assert!(!ExcludeLeaf::Everything.may_exclude_artifacts());
    }

    #[test]
    fn test_group_and_module() {
        let group = ExcludeLeaf::Group("org.foo".to_string());
        assert!(group.excludes_module(&id("org.foo", "a")));
        assert!(!group.excludes_module(&id("org.foo.sub", "a")));

        let module = ExcludeLeaf::Module("core".to_string());
        assert!(module.excludes_module(&id("x", "core")));
        assert!(module.excludes_module(&id("y", "core")));
        assert!(!module.excludes_module(&id("x", "api")));
    }

    #[test]
    fn test_module_level_leaves_delegate_artifact_queries() {
        let leaf = ExcludeLeaf::ModuleId(id("g", "n"));
        let jar = ArtifactName::jar("anything");
        assert!(leaf.excludes_artifact(&id("g", "n"), &jar));
        assert!(!leaf.excludes_artifact(&id("g", "other"), &jar));
        assert!(!leaf.may_exclude_artifacts());
    }

    #[test]
    fn test_module_id_set() {
        let set = ExcludeLeaf::ModuleIdSet([id("a", "1"), id("b", "2")].into_iter().collect());
        assert!(set.excludes_module(&id("a", "1")));
        assert!(set.excludes_module(&id("b", "2")));
        assert!(!set.excludes_module(&id("a", "2")));
    }

    #[test]
    fn test_artifact_exclude() {
        let leaf = ExcludeLeaf::Artifact {
            module: id("g", "n"),
            artifact: ArtifactName::jar("n"),
        };
        assert!(!leaf.excludes_module(&id("g", "n")));
        assert!(leaf.excludes_artifact(&id("g", "n"), &ArtifactName::jar("n")));
        assert!(!leaf.excludes_artifact(&id("g", "n"), &ArtifactName::jar("other")));
        assert!(!leaf.excludes_artifact(&id("g", "m"), &ArtifactName::jar("n")));
        assert!(leaf.may_exclude_artifacts());
    }

    #[test]
    fn test_artifact_equals_ignore_artifact() {
        let a = ExcludeLeaf::Artifact {
            module: id("g", "n"),
            artifact: ArtifactName::jar("a"),
        };
        let b = ExcludeLeaf::Artifact {
            module: id("g", "n"),
            artifact: ArtifactName::jar("b"),
        };
        let c = ExcludeLeaf::Artifact {
            module: id("g", "m"),
            artifact: ArtifactName::jar("a"),
        };
        assert_ne!(a, b);
        assert!(a.equals_ignore_artifact(&b));
        assert!(!a.equals_ignore_artifact(&c));
        assert!(!a.equals_ignore_artifact(&ExcludeLeaf::ModuleId(id("g", "n"))));
    }

    #[test]
    fn test_ivy_module_pattern() {
        let leaf = pattern(id("org.foo*", "*"), None, GLOB);
        assert!(leaf.excludes_module(&id("org.foo", "core")));
        assert!(leaf.excludes_module(&id("org.foobar", "api")));
        assert!(!leaf.excludes_module(&id("com.foo", "core")));
        assert!(leaf.excludes_artifact(&id("org.foo", "core"), &ArtifactName::jar("core")));
        assert!(!leaf.may_exclude_artifacts());
    }

    #[test]
    fn test_ivy_artifact_pattern() {
        let artifact = ArtifactName::new("core.*", "jar", None, None);
        let leaf = pattern(id("org\\.foo", ".*"), Some(artifact), REGEXP);

        assert!(!leaf.excludes_module(&id("org.foo", "core")));
        assert!(leaf.excludes_artifact(&id("org.foo", "core"), &ArtifactName::jar("core-api")));
        assert!(!leaf.excludes_artifact(&id("org.foo", "core"), &ArtifactName::jar("impl")));
        assert!(!leaf.excludes_artifact(
            &id("org.foo", "core"),
            &ArtifactName::new("core", "pom", Some("pom".to_string()), None)
        ));
        assert!(leaf.may_exclude_artifacts());
    }

    #[test]
    fn test_ivy_equals_ignore_artifact() {
        let a = pattern(id("g", "n"), Some(ArtifactName::jar("a")), GLOB);
        let b = pattern(id("g", "n"), Some(ArtifactName::jar("b")), GLOB);
        let c = pattern(id("g", "n"), Some(ArtifactName::jar("a")), REGEXP);
        assert_ne!(a, b);
        assert!(a.equals_ignore_artifact(&b));
        assert!(!a.equals_ignore_artifact(&c));
    }

    #[test]
    fn test_display() {
        assert_eq!(ExcludeLeaf::Group("g".to_string()).to_string(), "{ group = g }");
        let set = ExcludeLeaf::ModuleIdSet([id("b", "2"), id("a", "1")].into_iter().collect());
        assert_eq!(set.to_string(), "{ module ids = [a:1, b:2] }");
    }
}
