//! Configuration loading from TOML files.
//!
//! Config text is resolved in this order of precedence (highest wins):
//! 1. Path passed via the `--config` CLI flag (must exist).
//! 2. Path named by the `DESKPILOT_CONFIG` environment variable (must exist).
//! 3. `./deskpilot.toml` in the working directory.
//! 4. `~/.config/deskpilot/deskpilot.toml` (global config).
//! 5. Built-in defaults when no file is found.
//!
//! A blank `generation.api_key` is filled from the environment variable named
//! by `generation.api_key_env` after parsing, so config files never need to
//! hold secrets.

mod defaults;
mod types;

pub use types::{
    Config, GenerationConfig, GlobalConfigInitResult, ServerConfig, SessionConfig, SurfaceConfig,
};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration using the standard precedence chain.
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

/// Load configuration with injectable file/env/root sources. The production
/// path goes through [`load_config`]; tests drive this directly.
pub fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<Config, ConfigError>
where
    FRead: Fn(&Path) -> std::io::Result<String>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let text = read_config_text(path_override, &read_file, &env_lookup, &config_root)?;
    let mut config: Config = if text.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&text)?
    };
    resolve_generation_api_key(&mut config, &env_lookup);
    validate(&config)?;
    Ok(config)
}

fn read_config_text<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    env_lookup: &FEnv,
    config_root: &FRoot,
) -> Result<String, ConfigError>
where
    FRead: Fn(&Path) -> std::io::Result<String>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // Explicitly named paths must exist; the implicit locations are optional.
    if let Some(path) = path_override {
        return Ok(read_file(Path::new(path))?);
    }
    if let Some(path) = env_lookup(defaults::CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Ok(read_file(Path::new(&path))?);
        }
    }
    if let Ok(text) = read_file(Path::new("deskpilot.toml")) {
        return Ok(text);
    }
    if let Some(root) = config_root() {
        let global = root.join("deskpilot").join("deskpilot.toml");
        if let Ok(text) = read_file(&global) {
            return Ok(text);
        }
    }
    Ok(String::new())
}

fn resolve_generation_api_key<FEnv>(config: &mut Config, env_lookup: &FEnv)
where
    FEnv: Fn(&str) -> Option<String>,
{
    if !config.generation.api_key.trim().is_empty() {
        return;
    }
    if let Some(var) = config.generation.api_key_env.as_deref() {
        if let Some(value) = env_lookup(var) {
            config.generation.api_key = value.trim().to_string();
        }
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "server.listen_addr `{}` is not a valid socket address",
            config.server.listen_addr
        )));
    }
    if config.generation.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "generation.base_url must not be empty".to_string(),
        ));
    }
    if config.surface.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "surface.base_url must not be empty".to_string(),
        ));
    }
    if config.session.max_rounds == 0 {
        return Err(ConfigError::Invalid(
            "session.max_rounds must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Global config initialization
// ---------------------------------------------------------------------------

/// Path of the global config file, if a config root can be determined.
pub fn default_global_config_path() -> Option<PathBuf> {
    config_root_dir().map(|root| root.join("deskpilot").join("deskpilot.toml"))
}

/// Write the bundled config template to the global config path. With `force`
/// an existing file is backed up and replaced; otherwise it is left alone.
pub fn initialize_default_global_config(
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let path = default_global_config_path().ok_or_else(|| {
        ConfigError::Invalid("could not determine a config directory for this user".to_string())
    })?;
    initialize_default_global_config_at_path(&path, force)
}

fn initialize_default_global_config_at_path(
    path: &Path,
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // create_new keeps the common path race-free: if the file appears between
    // our check and the write, we report it as already initialized.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            use std::io::Write;
            file.write_all(defaults::DESKPILOT_CONFIG_TEMPLATE.as_bytes())?;
            return Ok(GlobalConfigInitResult::Created {
                path: path.to_path_buf(),
            });
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(err) => return Err(ConfigError::Io(err)),
    }

    if !force {
        return Ok(GlobalConfigInitResult::AlreadyInitialized {
            path: path.to_path_buf(),
        });
    }

    let backup_path = timestamped_backup_path(path);
    std::fs::copy(path, &backup_path)?;
    std::fs::write(path, defaults::DESKPILOT_CONFIG_TEMPLATE)?;
    Ok(GlobalConfigInitResult::Overwritten {
        path: path.to_path_buf(),
        backup_path,
    })
}

fn timestamped_backup_path(path: &Path) -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    path.with_extension(format!("toml.bak.{stamp}"))
}

/// Root directory for per-user config, honoring `XDG_CONFIG_HOME`.
fn config_root_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".config"));
    }
    dirs::config_dir()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
