//! Server configuration
//!
//! Command-line flags (each also readable from an environment variable) are
//! layered over the TOML file and compiled defaults from
//! [`snailtrack_common::config`].

use clap::Parser;
use snailtrack_common::config::{
    AiConfig, AuthConfig, MatchingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
    CONFIG_FILE_ENV, DEFAULT_BIND_ADDRESS, DEFAULT_LOG_LEVEL, ROOT_FOLDER_ENV,
};
use snailtrack_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command-line arguments for snailtrack-server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "snailtrack-server")]
#[command(about = "Garden snail tracking service with photo re-identification")]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/snailtrack/config.toml)
    #[arg(short, long, env = CONFIG_FILE_ENV)]
    pub config: Option<PathBuf>,

    /// Root folder holding the database and uploaded images
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    pub root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "SNAILTRACK_BIND")]
    pub bind: Option<String>,

    /// Base URL used when building links to uploaded images
    #[arg(long, env = "SNAILTRACK_PUBLIC_URL")]
    pub public_base_url: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "SNAILTRACK_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Fully resolved server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root: RootFolderInitializer,
    pub bind_address: SocketAddr,
    pub public_base_url: String,
    pub log_level: String,
    pub auth: AuthConfig,
    pub ai: AiConfig,
    pub matching: MatchingConfig,
}

impl ServerConfig {
    /// CLI/env → TOML → defaults
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let toml = TomlConfig::load(cli.config.as_deref())?;
        Self::from_parts(cli, &toml)
    }

    pub fn from_parts(cli: &Cli, toml: &TomlConfig) -> Result<Self> {
        let root_folder = RootFolderResolver::new(cli.root_folder.clone(), toml).resolve();

        let bind = cli
            .bind
            .clone()
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address: SocketAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let public_base_url = cli
            .public_base_url
            .clone()
            .or_else(|| toml.public_base_url.clone())
            .unwrap_or_else(|| format!("http://{}", bind_address))
            .trim_end_matches('/')
            .to_string();

        let log_level = cli
            .log_level
            .clone()
            .or_else(|| toml.log_level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            root: RootFolderInitializer::new(root_folder),
            bind_address,
            public_base_url,
            log_level,
            auth: AuthConfig::resolve(&toml.auth)?,
            ai: AiConfig::resolve(&toml.ai),
            matching: MatchingConfig::resolve(&toml.matching)?,
        })
    }
}
