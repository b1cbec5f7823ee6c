use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        // Same loopback port the overlay client has always dialed.
        Self {
            host: "127.0.0.1".to_string(),
            port: 39835,
        }
    }
}

/// Recognition engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Number of engine instances loaded at startup; also the size of the
    /// blocking worker pool.
    pub pool_size: usize,
    /// Explicit tesseract executable; falls back to `tesseract` on PATH.
    pub tesseract_cmd: Option<PathBuf>,
    /// Explicit tessdata directory; omitted from the command line when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub languages: String,
    /// Tesseract page segmentation mode; 6 = single uniform block of text.
    pub psm: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            tesseract_cmd: None,
            tessdata_dir: None,
            languages: "eng".to_string(),
            psm: 6,
        }
    }
}

/// Dual-threshold confidence policy: a box-level cutoff for detection
/// acceptance and a result-level cutoff for response acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceConfig {
    /// Detections scoring below this are discarded by the engine before
    /// aggregation.
    pub box_score_threshold: f64,
    /// Minimum mean score across accepted detections for a typed response.
    pub min_confidence: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            box_score_threshold: 0.65,
            min_confidence: 0.75,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreprocessingConfig {
    /// Crops shorter than this are upscaled before recognition.
    pub min_height: u32,
    pub upscale_factor: f64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            min_height: 32,
            upscale_factor: 2.0,
        }
    }
}

/// Field parser configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    pub min_level: u32,
    pub max_level: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: 300,
        }
    }
}

/// Potion slot assignment within the inventory grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PotionConfig {
    pub hp_potion_slot: String,
    pub mp_potion_slot: String,
}

impl Default for PotionConfig {
    fn default() -> Self {
        Self {
            hp_potion_slot: "shift".to_string(),
            mp_potion_slot: "ins".to_string(),
        }
    }
}

impl PotionConfig {
    /// Validate that slots are different and name real inventory cells
    pub fn validate(&self) -> Result<(), String> {
        const VALID_SLOTS: &[&str] = &["shift", "ins", "home", "pup", "ctrl", "del", "end", "pdn"];

        if !VALID_SLOTS.contains(&self.hp_potion_slot.as_str()) {
            return Err(format!("Invalid HP potion slot: {}", self.hp_potion_slot));
        }

        if !VALID_SLOTS.contains(&self.mp_potion_slot.as_str()) {
            return Err(format!("Invalid MP potion slot: {}", self.mp_potion_slot));
        }

        if self.hp_potion_slot == self.mp_potion_slot {
            return Err("HP and MP potion slots must be different".to_string());
        }

        Ok(())
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub potion: PotionConfig,
}

impl AppConfig {
    /// Cross-field validation applied after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.pool_size == 0 {
            return Err("engine.pool_size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence.min_confidence) {
            return Err("confidence.min_confidence must be in [0,1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence.box_score_threshold) {
            return Err("confidence.box_score_threshold must be in [0,1]".to_string());
        }
        if self.parser.min_level == 0 || self.parser.min_level > self.parser.max_level {
            return Err("parser level range is invalid".to_string());
        }
        if self.preprocessing.upscale_factor < 1.0 {
            return Err("preprocessing.upscale_factor must be >= 1".to_string());
        }
        self.potion.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 39835);
        assert_eq!(config.engine.pool_size, 4);
        assert_eq!(config.confidence.box_score_threshold, 0.65);
        assert_eq!(config.parser.max_level, 300);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"server": {"host": "0.0.0.0", "port": 8080}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.pool_size, 4);
        assert_eq!(config.confidence.min_confidence, 0.75);
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let mut config = AppConfig::default();
        config.engine.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = AppConfig::default();
        config.confidence.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_potion_config_validation() {
        let valid = PotionConfig::default();
        assert!(valid.validate().is_ok());

        let bad_slot = PotionConfig {
            hp_potion_slot: "meso".to_string(),
            mp_potion_slot: "ins".to_string(),
        };
        assert!(bad_slot.validate().is_err());

        let duplicate = PotionConfig {
            hp_potion_slot: "shift".to_string(),
            mp_potion_slot: "shift".to_string(),
        };
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_level_range() {
        let mut config = AppConfig::default();
        config.parser.min_level = 301;
        assert!(config.validate().is_err());
    }
}
