// src/config/loader.rs
//! Layered configuration loader: defaults, TOML files, then environment
//!
//! Environment overrides use `TRIGNO__<SECTION>__<KEY>`, for example
//! `TRIGNO__CONNECTION__HOST=10.0.0.5` or `TRIGNO__EMG__CHANNELS=3,1`.

use crate::config::{constants::paths, SystemConfig};
use crate::error::{TrignoError, TrignoResult};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader over an ordered list of optional TOML files
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    environment: Option<HashMap<String, String>>,
    current_config: SystemConfig,
}

impl ConfigLoader {
    /// Create a loader over the discovered configuration paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths; later paths take precedence
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            environment: None,
            current_config: SystemConfig::default(),
        }
    }

    /// Read overrides from `vars` instead of the process environment
    pub fn with_environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate the system configuration
    pub fn load_system_config(&mut self) -> TrignoResult<SystemConfig> {
        let config = self.load_and_merge_configs()?;
        config.validate()?;

        info!(
            "Configuration loaded from {} candidate file(s)",
            self.config_paths.len()
        );
        self.current_config = config.clone();
        Ok(config)
    }

    /// Last successfully loaded configuration
    pub fn current_config(&self) -> &SystemConfig {
        &self.current_config
    }

    /// Validate a single file on top of the defaults without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> TrignoResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrignoError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let config: SystemConfig = Config::builder()
            .add_source(Self::defaults_source()?)
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()
    }

    /// Write the current configuration as TOML
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> TrignoResult<()> {
        let toml_content = toml::to_string_pretty(&self.current_config)
            .map_err(|e| TrignoError::Configuration(e.to_string()))?;

        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn load_and_merge_configs(&self) -> TrignoResult<SystemConfig> {
        let mut builder = Config::builder().add_source(Self::defaults_source()?);

        for config_path in &self.config_paths {
            if config_path.exists() {
                debug!("Merging configuration file {}", config_path.display());
            }
            builder = builder.add_source(
                File::from(config_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config: SystemConfig = builder
            .add_source(self.environment_source())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    fn defaults_source() -> TrignoResult<File<config::FileSourceString, FileFormat>> {
        let defaults = toml::to_string(&SystemConfig::default())
            .map_err(|e| TrignoError::Configuration(e.to_string()))?;
        Ok(File::from_str(&defaults, FileFormat::Toml))
    }

    fn environment_source(&self) -> Environment {
        Environment::with_prefix(paths::ENV_PREFIX)
            .prefix_separator(paths::ENV_SEPARATOR)
            .separator(paths::ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("emg.channels")
            .with_list_parse_key("accel.channels")
            .source(self.environment.clone())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        // Local configurations (in order of precedence)
        paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));

        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// Cross-platform directory discovery
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::Units;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn isolated(paths: Vec<PathBuf>) -> ConfigLoader {
        ConfigLoader::with_paths(paths).with_environment(HashMap::new())
    }

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
    }

    #[test]
    fn test_load_defaults_when_files_missing() {
        let mut loader = isolated(vec![PathBuf::from("/nonexistent/trigno.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_later_files_take_precedence() {
        let base = toml_file(
            r#"
[connection]
host = "10.0.0.1"
read_timeout_ms = 500

[emg]
channels = [1, 2]
"#,
        );
        let local = toml_file(
            r#"
[connection]
host = "10.0.0.2"
"#,
        );

        let mut loader = isolated(vec![base.path().to_path_buf(), local.path().to_path_buf()]);
        let config = loader.load_system_config().unwrap();

        assert_eq!(config.connection.host, "10.0.0.2");
        assert_eq!(config.connection.read_timeout_ms, 500);
        assert_eq!(config.emg.channels, vec![1, 2]);
        assert_eq!(loader.current_config(), &config);
    }

    #[test]
    fn test_environment_override() {
        let env = HashMap::from([
            ("TRIGNO__CONNECTION__HOST".to_string(), "192.168.0.7".to_string()),
            ("TRIGNO__CONNECTION__COMMAND_PORT".to_string(), "6000".to_string()),
            ("TRIGNO__EMG__CHANNELS".to_string(), "3,1".to_string()),
            ("TRIGNO__EMG__UNITS".to_string(), "mV".to_string()),
        ]);

        let mut loader = ConfigLoader::with_paths(vec![]).with_environment(env);
        let config = loader.load_system_config().unwrap();

        assert_eq!(config.connection.host, "192.168.0.7");
        assert_eq!(config.connection.command_port, 6000);
        assert_eq!(config.emg.channels, vec![3, 1]);
        assert_eq!(config.emg.units, Units::Millivolts);
    }

    #[test]
    fn test_invalid_merged_config_is_rejected() {
        let file = toml_file(
            r#"
[emg]
channels = [0]
"#,
        );

        let mut loader = isolated(vec![file.path().to_path_buf()]);
        assert!(matches!(
            loader.load_system_config(),
            Err(TrignoError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_file_validation() {
        let loader = isolated(vec![]);

        let valid = toml_file(
            r#"
[accel]
channels = [1, 4, 46]
samples_per_read = 18
"#,
        );
        assert!(loader.validate_config_file(valid.path()).is_ok());

        let invalid = toml_file(
            r#"
[accel]
channels = [47]
"#,
        );
        assert!(loader.validate_config_file(invalid.path()).is_err());
        assert!(loader.validate_config_file("/nonexistent/trigno.toml").is_err());
    }

    #[test]
    fn test_config_export() {
        let loader = isolated(vec![]);
        let temp_file = NamedTempFile::new().unwrap();

        loader.export_config(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[connection]"));
        let parsed: SystemConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, SystemConfig::default());
    }
}
