//! Configuration loading: built-in defaults, then the TOML file, then `LOTTERY_*`
//! environment variables (nested keys separated by `__`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use lottery_deploy::{CONFIG_FILENAME, LotteryConfig};

/// Prefix of the environment variables overriding the configuration.
const ENV_PREFIX: &str = "LOTTERY_";

fn figment(path: Option<&Path>) -> Result<Figment> {
    let file = match path {
        Some(path) if !path.exists() => {
            anyhow::bail!("Configuration file not found: {}", path.display())
        }
        Some(path) => Toml::file(path),
        None => Toml::file(CONFIG_FILENAME),
    };

    Ok(Figment::from(Serialized::defaults(LotteryConfig::default()))
        .merge(file)
        .merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Directory of the configuration file that was found, if any.
fn config_dir(figment: &Figment) -> Option<PathBuf> {
    figment
        .metadata()
        .filter_map(|metadata| metadata.source.as_ref()?.file_path())
        .find(|path| path.is_file())
        .and_then(Path::parent)
        .map(Path::to_path_buf)
}

/// Load the effective configuration.
///
/// Relative paths are resolved against the directory of the configuration file
/// when one is found, and against the working directory otherwise.
pub fn load(path: Option<&Path>) -> Result<LotteryConfig> {
    let figment = figment(path)?;
    let config: LotteryConfig = figment
        .extract()
        .context("Failed to load configuration")?;

    Ok(match config_dir(&figment) {
        Some(dir) => config.anchored_at(&dir),
        None => config,
    })
}
