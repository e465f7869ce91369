// src/infra/paths.rs — Config and data locations
//
// All paths respect the STEPCHEF_HOME environment variable for isolation.
// When STEPCHEF_HOME is set, config and data live under that directory.
// When unset, config uses ~/.stepchef/ and data uses XDG_DATA_HOME/stepchef.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the STEPCHEF_HOME override, if set.
fn stepchef_home() -> Option<PathBuf> {
    std::env::var_os("STEPCHEF_HOME").map(PathBuf::from)
}

/// Configuration directory: $STEPCHEF_HOME/ or ~/.stepchef/
pub fn config_dir() -> PathBuf {
    if let Some(home) = stepchef_home() {
        return home;
    }
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".stepchef"),
        None => PathBuf::from(".stepchef"),
    }
}

/// Data directory: $STEPCHEF_HOME/data/ or ~/.local/share/stepchef/
pub fn data_dir() -> PathBuf {
    if let Some(home) = stepchef_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "stepchef") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Default database path
pub fn db_path() -> PathBuf {
    data_dir().join("stepchef.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
