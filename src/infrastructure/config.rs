use crate::domain::{config::NusTermConfig, error::{NusTermError, NusTermResult}};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> NusTermResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self::with_paths(global_config_path, project_config_path))
    }

    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files. Project values override global ones
    /// key by key; anything unset falls back to defaults.
    pub fn load_config(&self) -> NusTermResult<NusTermConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in std::iter::once(&self.global_config_path).chain(self.project_config_path.as_ref()) {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                merge_values(&mut merged, self.read_value(path)?);
            }
        }

        merged.try_into::<NusTermConfig>().map_err(|e| NusTermError::Config {
            message: format!("Invalid configuration: {}", e),
        })
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> NusTermResult<NusTermConfig> {
        let content = fs::read_to_string(path).map_err(|e| NusTermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| NusTermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &NusTermConfig) -> NusTermResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| NusTermError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| NusTermError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        fs::write(path, content).map_err(|e| NusTermError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Write a default configuration file, refusing to overwrite
    pub fn init_config(&self, path: &Path) -> NusTermResult<()> {
        if path.exists() {
            return Err(NusTermError::Config {
                message: format!("Configuration already exists at {}", path.display()),
            });
        }

        self.save_config_to_path(path, &NusTermConfig::default())
    }

    /// Project configuration path under `dir`
    pub fn project_config_path_in(dir: &Path) -> PathBuf {
        dir.join(".nusterm").join("config.toml")
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }

    /// Get global configuration path
    fn get_global_config_path() -> NusTermResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| NusTermError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("nusterm").join("config.toml"))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = Self::project_config_path_in(path);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    fn read_value(&self, path: &Path) -> NusTermResult<toml::Value> {
        let content = fs::read_to_string(path).map_err(|e| NusTermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        content.parse::<toml::Value>().map_err(|e| NusTermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }
}

/// Recursively overlay tables; non-table values replace.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ConfigManager {
        ConfigManager::with_paths(
            dir.path().join("global").join("config.toml"),
            Some(ConfigManager::project_config_path_in(dir.path())),
        )
    }

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = manager_in(&temp_dir).load_config().unwrap();

        assert_eq!(config.global.log_level, "warn");
        assert_eq!(config.session.device_log_level, "inf");
        assert!(config.session.device_name.is_none());
    }

    #[test]
    fn test_project_overrides_global_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        fs::create_dir_all(manager.get_global_config_path_ref().parent().unwrap()).unwrap();
        fs::write(
            manager.get_global_config_path_ref(),
            "[session]\ndevice_name = \"Widget-A\"\nretry_delay_ms = 1000\n",
        )
        .unwrap();

        let project = manager.get_project_config_path().unwrap();
        fs::create_dir_all(project.parent().unwrap()).unwrap();
        fs::write(project, "[session]\ndevice_log_level = \"dbg\"\n").unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config.session.device_name.as_deref(), Some("Widget-A"));
        assert_eq!(config.session.retry_delay_ms, 1000);
        assert_eq!(config.session.device_log_level, "dbg");
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let path = ConfigManager::project_config_path_in(temp_dir.path());

        manager.init_config(&path).unwrap();
        assert!(path.exists());

        let loaded = manager.load_config_from_path(&path).unwrap();
        assert_eq!(loaded.session.scan_timeout_ms, 5000);

        assert!(manager.init_config(&path).is_err());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[session\n").unwrap();

        let err = manager_in(&temp_dir).load_config_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
