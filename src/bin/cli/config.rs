use std::path::{Path, PathBuf};

use graphstream::engine::EngineOptions;
use graphstream::Result;

const CONFIG_DIR: &str = "gstream";
const CONFIG_FILE: &str = "engine.toml";

/// Location of the per-user engine config, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Reads engine options from `explicit`, falling back to the per-user file
/// when it exists and to defaults otherwise.
pub fn load_options(explicit: Option<&Path>) -> Result<(EngineOptions, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((EngineOptions::load(path)?, Some(path.to_path_buf())));
    }
    match default_config_path() {
        Some(path) if path.exists() => Ok((EngineOptions::load(&path)?, Some(path))),
        _ => Ok((EngineOptions::default(), None)),
    }
}
