//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default locations
    pub fn load_default() -> ConfigResult<Config> {
        Self::load_with_env_prefix("AIRLIFT")
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix("AIRLIFT")
            .build()
    }

    /// Load configuration from multiple files (later files override earlier ones)
    pub fn load_from_files<P: AsRef<Path>>(paths: &[P]) -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();

        for path in paths {
            let path = path.as_ref();
            if path.exists() {
                builder = builder.add_source_file(path);
            }
        }

        builder = builder.add_env_prefix("AIRLIFT");
        builder.build()
    }

    /// Load configuration with a custom environment prefix
    pub fn load_with_env_prefix<S: Into<String>>(prefix: S) -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();

        // Use the first configuration file found in the default locations
        for path in Self::get_default_config_paths() {
            if path.exists() {
                builder = builder.add_source_file(&path);
                break;
            }
        }

        builder = builder.add_env_prefix(prefix);
        builder.build()
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(config)?,
            Some("json") => serde_json::to_string_pretty(config)?,
            // Default to YAML, which also covers "yaml" and "yml"
            _ => serde_yaml::to_string(config)?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        let config = Config::default();
        Self::save_to_file(&config, path)
    }

    /// Get default configuration file paths in order of preference
    fn get_default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("airlift.yaml"),
            PathBuf::from("airlift.yml"),
            PathBuf::from("airlift.toml"),
            PathBuf::from(".airlift.yaml"),
            PathBuf::from(".airlift.yml"),
            PathBuf::from(".airlift.toml"),
        ];

        if let Some(config_dir) = Self::user_config_dir() {
            let airlift_dir = config_dir.join("airlift");
            paths.push(airlift_dir.join("config.yaml"));
            paths.push(airlift_dir.join("config.yml"));
            paths.push(airlift_dir.join("config.toml"));
        }

        #[cfg(unix)]
        {
            paths.push(PathBuf::from("/etc/airlift/config.yaml"));
            paths.push(PathBuf::from("/etc/airlift/config.yml"));
            paths.push(PathBuf::from("/etc/airlift/config.toml"));
        }

        paths
    }

    /// Check if a configuration file exists in default locations
    pub fn config_exists() -> Option<PathBuf> {
        Self::get_default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Validate a configuration file without keeping the result
    pub fn validate_file<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        let _config = Self::load_from_file(path)?;
        Ok(())
    }

    /// Per-user configuration directory, if the platform exposes one
    fn user_config_dir() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var_os("APPDATA").map(PathBuf::from)
        }
        #[cfg(not(windows))]
        {
            std::env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigLoader::load_from_file(temp_dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_save_and_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.yaml");

        let original = Config::default();
        ConfigLoader::save_to_file(&original, &config_path).unwrap();

        let loaded = ConfigLoader::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.transfer.max_tries, original.transfer.max_tries);
        assert_eq!(
            loaded.failsafe.problematic_devices,
            original.failsafe.problematic_devices
        );
    }

    #[test]
    fn test_save_and_load_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let original = Config::default();
        ConfigLoader::save_to_file(&original, &config_path).unwrap();

        let loaded = ConfigLoader::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.transfer.max_tries, original.transfer.max_tries);
        assert_eq!(
            loaded.cancellation.grace_window_ms,
            original.cancellation.grace_window_ms
        );
    }

    #[test]
    fn test_generate_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("default.yaml");

        ConfigLoader::generate_default_config(&config_path).unwrap();
        assert!(config_path.exists());

        let config = ConfigLoader::load_from_file(&config_path).unwrap();
        assert_eq!(config.transfer.max_tries, 10);
    }

    #[test]
    fn test_load_from_files_later_overrides_earlier() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("base.yaml");
        let site = temp_dir.path().join("site.yaml");

        std::fs::write(&base, "transfer:\n  max_tries: 4\n").unwrap();
        std::fs::write(&site, "transfer:\n  max_tries: 7\n").unwrap();

        let config = ConfigLoader::load_from_files(&[&base, &site]).unwrap();
        assert_eq!(config.transfer.max_tries, 7);
    }
}
