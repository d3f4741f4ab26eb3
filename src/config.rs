use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ClientError;

/// Command-line options; flags mirror the interactive client's usage text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub debug_level: u8,
    pub config_path: PathBuf,
    pub pathfinding: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            debug_level: 0,
            config_path: PathBuf::from("hc_test1.json"),
            pathfinding: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(CliOptions),
    Help,
}

pub const USAGE: &str = "\
Usage: eqhc [options]
Options:
  -d, --debug <level>      Set debug level (0-3)
  -c, --config <file>      Set config file (default: hc_test1.json)
  -np, --no-pathfinding    Disable navmesh pathfinding
  -h, --help               Show this help message";

impl CliOptions {
    pub fn from_args(args: &[String]) -> Result<CliAction, ClientError> {
        let mut options = CliOptions::default();
        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "-d" | "--debug" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| ClientError::Config("--debug needs a level".to_string()))?;
                    options.debug_level = value.parse::<u8>().map_err(|_| {
                        ClientError::Config(format!("invalid debug level '{}'", value))
                    })?;
                    if options.debug_level > 3 {
                        return Err(ClientError::Config(format!(
                            "debug level {} out of range (0-3)",
                            options.debug_level
                        )));
                    }
                }
                "-c" | "--config" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| ClientError::Config("--config needs a file".to_string()))?;
                    options.config_path = PathBuf::from(value);
                }
                "-np" | "--no-pathfinding" => {
                    options.pathfinding = false;
                }
                "-h" | "--help" => return Ok(CliAction::Help),
                other => {
                    return Err(ClientError::Config(format!(
                        "unknown argument '{}'",
                        other
                    )));
                }
            }
            idx += 1;
        }
        Ok(CliAction::Run(options))
    }
}

/// One client instance from the JSON config array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// World server long name to match in the server list.
    pub server: String,
    pub character: String,
    #[serde(default)]
    pub navmesh_path: Option<PathBuf>,
    #[serde(default)]
    pub maps_path: Option<PathBuf>,
}

pub fn load_instances(path: &Path) -> Result<Vec<InstanceConfig>, ClientError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        ClientError::Config(format!("cannot read config {}: {}", path.display(), err))
    })?;
    let instances: Vec<InstanceConfig> = serde_json::from_str(&raw).map_err(|err| {
        ClientError::Config(format!("cannot parse config {}: {}", path.display(), err))
    })?;
    if instances.is_empty() {
        return Err(ClientError::Config(format!(
            "config {} lists no client instances",
            path.display()
        )));
    }
    Ok(instances)
}
