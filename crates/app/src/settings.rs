use std::path::PathBuf;

use serde::Deserialize;
use wbs_engine::{BalancePolicy, Percent};

use crate::{cli::GlobalArgs, error::Result};

const DEFAULT_CONFIG_PATH: &str = "config/wbs.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    /// Used when the snapshot carries no BDI of its own.
    pub bdi: Percent,
    pub balance_policy: BalancePolicy,
    pub snapshot: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bdi: Percent::ZERO,
            balance_policy: BalancePolicy::ClampAtZero,
            snapshot: PathBuf::from("project.json"),
        }
    }
}

/// File, then `WBS_*` environment, then command-line flags.
pub fn load(args: &GlobalArgs) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("WBS"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(log_level) = &args.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(bdi) = args.bdi {
        settings.bdi = bdi;
    }
    if let Some(policy) = args.balance_policy {
        settings.balance_policy = policy.into();
    }
    if let Some(snapshot) = &args.snapshot {
        settings.snapshot = snapshot.clone();
    }

    Ok(settings)
}
