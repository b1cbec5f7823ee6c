pub mod config;
pub mod detection;
pub mod ocr_result;
pub mod roi;
