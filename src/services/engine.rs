use crate::error::EngineError;
use crate::models::config::EngineConfig;
use crate::models::detection::Detection;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// Boundary contract with the recognition engine. Implementations are
/// stateful and non-reentrant: the pool guarantees no two concurrent
/// calls ever reach the same instance.
pub trait TextRecognizer: Send {
    /// Run detection + recognition on a pixel buffer. Detections scoring
    /// below `box_score_threshold` are excluded. No text found is an
    /// empty vector, not an error.
    fn recognize(
        &mut self,
        image: &DynamicImage,
        box_score_threshold: f64,
    ) -> Result<Vec<Detection>, EngineError>;

    /// Short identifier for logs and the health endpoint.
    fn kind(&self) -> &'static str;
}

/// Tesseract driven as a subprocess in TSV mode. Each instance owns its
/// resolved paths; loading verifies the executable actually runs.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    languages: String,
    psm: u8,
}

impl TesseractEngine {
    /// Resolve and verify a tesseract installation. Spawns the binary
    /// once, so a missing or broken install fails here instead of on the
    /// first request.
    pub fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        let executable = config
            .tesseract_cmd
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"));

        let output = Command::new(&executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                EngineError::Load(format!("cannot run {}: {}", executable.display(), e))
            })?;

        if !output.status.success() {
            return Err(EngineError::Load(format!(
                "{} --version exited with {}",
                executable.display(),
                output.status
            )));
        }

        if let Some(dir) = &config.tessdata_dir {
            if !dir.is_dir() {
                return Err(EngineError::Load(format!(
                    "tessdata directory not found: {}",
                    dir.display()
                )));
            }
        }

        Ok(Self {
            executable,
            tessdata_dir: config.tessdata_dir.clone(),
            languages: config.languages.clone(),
            psm: config.psm,
        })
    }

    fn run_tsv(&self, image: &DynamicImage) -> Result<String, EngineError> {
        // Tesseract reads from disk; hand it the crop as a temporary PNG.
        let input = NamedTempFile::with_suffix(".png")
            .map_err(|e| EngineError::Inference(format!("temp file: {}", e)))?;
        image
            .save(input.path())
            .map_err(|e| EngineError::Inference(format!("failed to write input image: {}", e)))?;

        let output_base = NamedTempFile::new()
            .map_err(|e| EngineError::Inference(format!("temp file: {}", e)))?;
        let base_path = output_base.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command
            .arg(input.path())
            .arg(&base_path)
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv");
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }

        let output = command
            .output()
            .map_err(|e| EngineError::Inference(format!("failed to spawn tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Inference(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        // Tesseract appends the format extension to the output base.
        let tsv_path = format!("{}.tsv", base_path);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| EngineError::Inference(format!("failed to read tsv output: {}", e)))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(tsv)
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(
        &mut self,
        image: &DynamicImage,
        box_score_threshold: f64,
    ) -> Result<Vec<Detection>, EngineError> {
        let tsv = self.run_tsv(image)?;
        Ok(parse_tsv(&tsv, box_score_threshold))
    }

    fn kind(&self) -> &'static str {
        "tesseract"
    }
}

/// Parse tesseract TSV output into word-level detections.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Level 5 rows are words.
fn parse_tsv(tsv: &str, box_score_threshold: f64) -> Vec<Detection> {
    let mut detections = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let conf: f64 = fields[10].parse().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }

        let left: f64 = fields[6].parse().unwrap_or(0.0);
        let top: f64 = fields[7].parse().unwrap_or(0.0);
        let width: f64 = fields[8].parse().unwrap_or(0.0);
        let height: f64 = fields[9].parse().unwrap_or(0.0);

        // Tesseract reports confidence as 0-100.
        let score = (conf / 100.0).clamp(0.0, 1.0);
        if score < box_score_threshold {
            continue;
        }

        detections.push(Detection::from_rect(
            left,
            top,
            width,
            height,
            text.to_string(),
            score,
        ));
    }

    detections
}
