use crate::error::ParseError;
use crate::models::config::ParserConfig;
use crate::models::detection::Detection;
use regex::Regex;

/// Parsed EXP reading. When the raw text carries only one number the
/// single-number rule below decides which field is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpData {
    pub absolute: Option<u64>,
    pub percentage: Option<f64>,
}

/// Result-level confidence gate, applied before any field parsing.
///
/// Detections below the box-level cutoff were already excluded by the
/// engine, so the mean here runs over accepted detections only. A mean
/// exactly at the threshold passes. An empty detection set skips the
/// gate entirely; the field parser then reports the missing text.
pub fn gate_confidence(detections: &[Detection], threshold: f64) -> Result<(), ParseError> {
    if detections.is_empty() {
        return Ok(());
    }

    let sum: f64 = detections.iter().map(|d| d.score).sum();
    let aggregate = sum / detections.len() as f64;

    if aggregate < threshold {
        return Err(ParseError::LowConfidence {
            aggregate,
            threshold,
        });
    }

    Ok(())
}

/// Parse a character level from raw OCR text.
///
/// The UI renders "LV. 126"; everything but the digits is noise, so the
/// text is stripped to digits and range-checked.
pub fn parse_level(text: &str, config: &ParserConfig) -> Result<u32, ParseError> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(ParseError::NoDigitsFound {
            raw: text.to_string(),
        });
    }

    let value: u64 = digits.parse().unwrap_or(u64::MAX);

    if value < config.min_level as u64 || value > config.max_level as u64 {
        return Err(ParseError::OutOfRange {
            value,
            min: config.min_level as u64,
            max: config.max_level as u64,
            raw: text.to_string(),
        });
    }

    Ok(value as u32)
}

/// Parse an EXP reading like "123,456[45.67%]" from raw OCR text.
///
/// Thousands separators and whitespace are removed first. A percentage
/// may appear bracketed or trailing after the absolute value. When only
/// one number is present it is classified as a percentage if it is at
/// most 100 and as an absolute value otherwise — a lossy heuristic kept
/// deliberately: a lone "87" from the EXP bar is far more likely the
/// percentage readout than an absolute total.
pub fn parse_exp(text: &str) -> Result<ExpData, ParseError> {
    let clean: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let ambiguous = || ParseError::AmbiguousFormat {
        raw: text.to_string(),
    };

    // Bracketed percentage, the clean render: "123456[45.67%]".
    let bracketed = Regex::new(r"\[(\d{1,3}(?:\.\d+)?)%?\]?").unwrap();
    if let Some(m) = bracketed.captures(&clean) {
        let percentage: f64 = m[1].parse().map_err(|_| ambiguous())?;
        if percentage > 100.0 {
            return Err(ambiguous());
        }
        let prefix_digits: String = clean[..m.get(0).unwrap().start()]
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();

        if prefix_digits.is_empty() {
            // Only one number present; a bracketed value is a percentage.
            return Ok(ExpData {
                absolute: None,
                percentage: Some(percentage),
            });
        }

        let absolute: u64 = prefix_digits.parse().map_err(|_| ambiguous())?;
        return Ok(ExpData {
            absolute: Some(absolute),
            percentage: Some(percentage),
        });
    }

    // Percentage present but the opening bracket was misread or dropped
    // ("46185718.57%]"): anchor on the last '.' before the '%' and take
    // one digit ahead of it. A '1' immediately before that is the usual
    // misread of '[' and belongs to neither number.
    if let Some(pct_pos) = clean.rfind('%') {
        let before = &clean[..pct_pos];
        if let Some(dot_pos) = before.rfind('.') {
            let start = if dot_pos > 0 && clean.as_bytes()[dot_pos - 1].is_ascii_digit() {
                dot_pos - 1
            } else {
                dot_pos
            };
            let percentage: f64 = clean[start..pct_pos].parse().map_err(|_| ambiguous())?;

            let mut abs_end = start;
            if abs_end > 0 && clean.as_bytes()[abs_end - 1] == b'1' {
                abs_end -= 1;
            }
            let prefix_digits: String = clean[..abs_end]
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();

            if prefix_digits.is_empty() {
                return Ok(ExpData {
                    absolute: None,
                    percentage: Some(percentage),
                });
            }

            let absolute: u64 = prefix_digits.parse().map_err(|_| ambiguous())?;
            return Ok(ExpData {
                absolute: Some(absolute),
                percentage: Some(percentage),
            });
        }

        // Integer percentage without a bracket ("87%") is only safe to
        // read when the string holds nothing but that number.
        if !before.is_empty() && before.chars().all(|c| c.is_ascii_digit()) {
            let percentage: f64 = before.parse().map_err(|_| ambiguous())?;
            if percentage <= 100.0 {
                return Ok(ExpData {
                    absolute: None,
                    percentage: Some(percentage),
                });
            }
        }
        return Err(ambiguous());
    }

    // No percentage marker at all: fall back to bare numbers.
    let number = Regex::new(r"\d+(?:\.\d+)?").unwrap();
    let numbers: Vec<&str> = number.find_iter(&clean).map(|m| m.as_str()).collect();

    match numbers.as_slice() {
        [] => Err(ambiguous()),
        [single] => {
            let value: f64 = single.parse().map_err(|_| ambiguous())?;
            if value <= 100.0 {
                Ok(ExpData {
                    absolute: None,
                    percentage: Some(value),
                })
            } else if single.contains('.') {
                // A fractional value above 100 is neither a plausible
                // percentage nor an absolute total.
                Err(ambiguous())
            } else {
                Ok(ExpData {
                    absolute: Some(single.parse().map_err(|_| ambiguous())?),
                    percentage: None,
                })
            }
        }
        [first, second, ..] => {
            // Two bare numbers: read them as "absolute percentage" if the
            // second one can be a percentage.
            let absolute: u64 = if first.contains('.') {
                return Err(ambiguous());
            } else {
                first.parse().map_err(|_| ambiguous())?
            };
            let percentage: f64 = second.parse().map_err(|_| ambiguous())?;
            if percentage > 100.0 {
                return Err(ambiguous());
            }
            Ok(ExpData {
                absolute: Some(absolute),
                percentage: Some(percentage),
            })
        }
    }
}

/// Parse a potion count: digits only, anything else is noise.
pub fn parse_potion_count(text: &str) -> Result<u32, ParseError> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(ParseError::NoDigitsFound {
            raw: text.to_string(),
        });
    }

    let value: u64 = digits.parse().unwrap_or(u64::MAX);
    if value > u32::MAX as u64 {
        return Err(ParseError::OutOfRange {
            value,
            min: 0,
            max: u32::MAX as u64,
            raw: text.to_string(),
        });
    }

    Ok(value as u32)
}
