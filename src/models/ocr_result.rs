use serde::{Deserialize, Serialize};

/// OCR recognition result for level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelResult {
    pub level: u32,
    pub raw_text: String,
}

/// OCR recognition result for EXP.
///
/// When the raw text carries only a single number, exactly one of
/// `absolute`/`percentage` is set (see the parser's single-number rule).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub raw_text: String,
}

/// OCR recognition result for a potion slot count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PotionResult {
    pub count: u32,
    pub raw_text: String,
}
