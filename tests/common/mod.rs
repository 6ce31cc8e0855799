//! Shared helpers for integration tests.

#![allow(dead_code)]

use exclude_kernel::{ArtifactName, EngineConfig, ExcludeSession, ModuleId};

/// Install a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn session() -> ExcludeSession {
    init_tracing();
    ExcludeSession::new(EngineConfig::default())
}

pub fn id(group: &str, name: &str) -> ModuleId {
    ModuleId::new(group, name)
}

pub fn jar(name: &str) -> ArtifactName {
    ArtifactName::jar(name)
}
