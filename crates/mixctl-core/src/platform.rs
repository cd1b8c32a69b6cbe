use std::path::PathBuf;

const APP_DIR: &str = "mixctl";

/// Environment variable pointing at an alternate `config.toml`.
pub const CONFIG_ENV: &str = "MIXCTL_CONFIG";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/mixctl on unix, not the macOS Application Support folder
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// `$MIXCTL_CONFIG` if set and non-empty, else `<config_dir>/config.toml`.
pub fn config_file() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_dir().join("config.toml"),
    }
}

pub fn log_file() -> PathBuf {
    data_dir().join("daemon.log")
}
