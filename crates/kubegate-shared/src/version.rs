//! Build and version information.

use serde::{Deserialize, Serialize};

/// Crate version, shared by the daemon and its HTTP surface.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit hash captured by build.rs.
pub const GIT_SHA: &str = env!("KUBEGATE_GIT_SHA");

/// UTC build date captured by build.rs.
pub const BUILD_DATE: &str = env!("KUBEGATE_BUILD_DATE");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_sha: String,
    pub build_date: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            git_sha: GIT_SHA.to_string(),
            build_date: BUILD_DATE.to_string(),
        }
    }
}
