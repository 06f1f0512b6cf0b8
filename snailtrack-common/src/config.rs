//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SNAILTRACK_ROOT";
/// Environment variable naming an explicit config file
pub const CONFIG_FILE_ENV: &str = "SNAILTRACK_CONFIG";
/// Environment variables holding the Basic-Auth credentials
pub const AUTH_USER_ENV: &str = "BASIC_AUTH_USER";
pub const AUTH_PASS_ENV: &str = "BASIC_AUTH_PASS";
/// Environment variable holding the AI provider key
pub const AI_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const DATABASE_FILE: &str = "snailtrack.db";
const IMAGES_DIR: &str = "images";

// ========================================
// TOML file
// ========================================

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub public_base_url: Option<String>,
    pub log_level: Option<String>,
    pub auth: AuthSection,
    pub ai: AiSection,
    pub matching: MatchingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Open the gate without credentials
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub vision_model: Option<String>,
    pub embedding_model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    pub candidate_limit: Option<u32>,
    pub top_n: Option<usize>,
    pub confidence_floor: Option<u8>,
    pub scoring_timeout_secs: Option<u64>,
    pub fanout_timeout_secs: Option<u64>,
    pub identify_strategy: Option<IdentifyStrategy>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load the config file.
    ///
    /// An explicit path (CLI or `SNAILTRACK_CONFIG`) must exist. Without one, the
    /// platform default location is tried and a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from));

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path
            }
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    warn!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }
}

/// `<config_dir>/snailtrack/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("snailtrack").join("config.toml"))
}

// ========================================
// Root folder
// ========================================

/// Resolves the root folder holding the database and stored images
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    toml: &'a TomlConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(cli_arg: Option<PathBuf>, toml: &'a TomlConfig) -> Self {
        Self { cli_arg, toml }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.toml.root_folder {
            return path.clone();
        }
        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("snailtrack"))
        .unwrap_or_else(|| PathBuf::from("./snailtrack_data"))
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder and the image directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.images_path())?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn images_path(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }
}

// ========================================
// Resolved sections
// ========================================

/// Static Basic-Auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// How the `/api` gate treats requests
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Require these credentials
    Basic(Credentials),
    /// Every request passes. Only set by `[auth] disabled = true`.
    Disabled,
    /// No credentials configured: every request is rejected
    #[default]
    Locked,
}

/// Auth gate configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
}

impl AuthConfig {
    /// ENV → TOML. A half-configured pair is rejected.
    pub fn resolve(toml: &AuthSection) -> Result<Self> {
        if toml.disabled {
            return Ok(Self {
                mode: AuthMode::Disabled,
            });
        }

        let username = env_non_empty(AUTH_USER_ENV).or_else(|| toml.username.clone());
        let password = env_non_empty(AUTH_PASS_ENV).or_else(|| toml.password.clone());

        let mode = match (username, password) {
            (Some(username), Some(password)) => AuthMode::Basic(Credentials { username, password }),
            (None, None) => AuthMode::Locked,
            _ => {
                return Err(Error::Config(format!(
                    "Both {} and {} must be set to enable authentication",
                    AUTH_USER_ENV, AUTH_PASS_ENV
                )))
            }
        };
        Ok(Self { mode })
    }
}

/// AI provider configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub vision_model: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
}

impl AiConfig {
    pub fn resolve(toml: &AiSection) -> Self {
        Self {
            api_key: env_non_empty(AI_API_KEY_ENV).or_else(|| toml.api_key.clone()),
            base_url: toml
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            vision_model: toml
                .vision_model
                .clone()
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            embedding_model: toml
                .embedding_model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            request_timeout: Duration::from_secs(toml.request_timeout_secs.unwrap_or(60)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::resolve(&AiSection::default())
    }
}

/// Which scorer backs the identify endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifyStrategy {
    #[default]
    Embedding,
    Pairwise,
}

impl fmt::Display for IdentifyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifyStrategy::Embedding => write!(f, "embedding"),
            IdentifyStrategy::Pairwise => write!(f, "pairwise"),
        }
    }
}

impl FromStr for IdentifyStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" => Ok(IdentifyStrategy::Embedding),
            "pairwise" => Ok(IdentifyStrategy::Pairwise),
            other => Err(Error::InvalidInput(format!(
                "Unknown identify strategy '{}' (expected 'embedding' or 'pairwise')",
                other
            ))),
        }
    }
}

/// Matching pipeline tuning
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Individuals considered per request
    pub candidate_limit: u32,
    /// Results returned per request
    pub top_n: usize,
    /// Pairwise comparison floor (0-100)
    pub confidence_floor: u8,
    /// Per-candidate scoring timeout
    pub scoring_timeout: Duration,
    /// Cap on the whole fan-out
    pub fanout_timeout: Duration,
    pub identify_strategy: IdentifyStrategy,
}

impl MatchingConfig {
    pub fn resolve(toml: &MatchingSection) -> Result<Self> {
        let floor = toml.confidence_floor.unwrap_or(50);
        if floor > 100 {
            return Err(Error::Config(format!(
                "confidence_floor must be within 0-100 (got {})",
                floor
            )));
        }

        Ok(Self {
            candidate_limit: toml.candidate_limit.unwrap_or(20),
            top_n: toml.top_n.unwrap_or(5),
            confidence_floor: floor,
            scoring_timeout: Duration::from_secs(toml.scoring_timeout_secs.unwrap_or(45)),
            fanout_timeout: Duration::from_secs(toml.fanout_timeout_secs.unwrap_or(120)),
            identify_strategy: toml.identify_strategy.unwrap_or_default(),
        })
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 20,
            top_n: 5,
            confidence_floor: 50,
            scoring_timeout: Duration::from_secs(45),
            fanout_timeout: Duration::from_secs(120),
            identify_strategy: IdentifyStrategy::default(),
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
