//! Build identification, shared by `/api/buildinfo` and the startup log

use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
}

impl BuildInfo {
    /// Values embedded by `build.rs`
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_profile: env!("BUILD_PROFILE"),
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "v{} [{}] built {} ({})",
            self.version, self.git_hash, self.build_timestamp, self.build_profile
        )
    }
}

/// GET /api/buildinfo
pub async fn get_build_info() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}
