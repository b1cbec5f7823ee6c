use crate::models::config::AppConfig;
use std::fs;
use std::path::PathBuf;

/// Loads and persists the server configuration.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager rooted at the platform config directory,
    /// creating it if needed. The `EXP_OCR_SERVER_CONFIG` environment
    /// variable overrides the file location for deployments.
    pub fn new() -> Result<Self, String> {
        if let Ok(path) = std::env::var("EXP_OCR_SERVER_CONFIG") {
            let config_path = PathBuf::from(path);
            let config_dir = config_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(Self {
                config_dir,
                config_path,
            });
        }

        let config_dir = dirs::config_dir()
            .ok_or("Failed to determine config directory")?
            .join("exp-ocr-server");

        fs::create_dir_all(&config_dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let config_path = config_dir.join("config.json");

        Ok(Self {
            config_dir,
            config_path,
        })
    }

    /// Load configuration from disk, falling back to defaults when the
    /// file does not exist. A present-but-invalid file is an error; it
    /// is better to refuse startup than to serve with surprise settings.
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to disk (pretty-printed for hand editing).
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_path, json)
            .map_err(|e| format!("Failed to write config file: {}", e))?;

        Ok(())
    }

    pub fn config_file_path(&self) -> &PathBuf {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> ConfigManager {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "exp-ocr-server-test-{}-{}",
            std::process::id(),
            id
        ));
        let _ = fs::remove_dir_all(&temp_dir);

        ConfigManager {
            config_dir: temp_dir.clone(),
            config_path: temp_dir.join("config.json"),
        }
    }

    fn cleanup(manager: &ConfigManager) {
        let _ = fs::remove_dir_all(&manager.config_dir);
    }

    #[test]
    fn test_load_defaults_when_missing() {
        let manager = create_test_manager();
        let config = manager.load().unwrap();
        assert_eq!(config, AppConfig::default());
        cleanup(&manager);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let manager = create_test_manager();

        let mut config = AppConfig::default();
        config.engine.pool_size = 8;
        config.confidence.min_confidence = 0.8;

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.engine.pool_size, 8);
        cleanup(&manager);
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let manager = create_test_manager();

        let mut config = AppConfig::default();
        config.engine.pool_size = 0;
        // Bypass save-side checks by writing the JSON directly.
        fs::create_dir_all(&manager.config_dir).unwrap();
        fs::write(
            &manager.config_path,
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();

        assert!(manager.load().is_err());
        cleanup(&manager);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let manager = create_test_manager();
        fs::create_dir_all(&manager.config_dir).unwrap();
        fs::write(&manager.config_path, "{not json").unwrap();
        assert!(manager.load().is_err());
        cleanup(&manager);
    }

    #[test]
    fn test_config_file_path() {
        let manager = create_test_manager();
        assert!(manager
            .config_file_path()
            .to_str()
            .unwrap()
            .ends_with("config.json"));
        cleanup(&manager);
    }
}
