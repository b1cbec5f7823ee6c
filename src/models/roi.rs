use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proportional region definition, expressed as ratios of the image
/// dimensions. Defined once at process start against the reference layout
/// and reused for every incoming frame size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoiRatios {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl RoiRatios {
    /// Create ratios, validating ordering and the [0, 1] range.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&x_min) || !(0.0..=1.0).contains(&x_max) {
            return Err(format!("x ratios out of [0,1]: {} / {}", x_min, x_max));
        }
        if !(0.0..=1.0).contains(&y_min) || !(0.0..=1.0).contains(&y_max) {
            return Err(format!("y ratios out of [0,1]: {} / {}", y_min, y_max));
        }
        if x_max <= x_min {
            return Err("x_max must be greater than x_min".to_string());
        }
        if y_max <= y_min {
            return Err("y_max must be greater than y_min".to_string());
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
}

/// Absolute region of interest in pixel coordinates, derived from
/// [`RoiRatios`] for one concrete image size. Computed fresh per image;
/// never cached across differing sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roi {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl Roi {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Crop this region out of the image (bounds are inclusive).
    pub fn crop(&self, image: &DynamicImage) -> DynamicImage {
        image.crop_imm(self.x_min, self.y_min, self.width(), self.height())
    }
}

/// Named proportional layout of fixed UI elements.
#[derive(Debug, Clone)]
pub struct RoiLayout {
    regions: BTreeMap<String, RoiRatios>,
}

impl RoiLayout {
    pub fn new(regions: BTreeMap<String, RoiRatios>) -> Self {
        Self { regions }
    }

    /// The 4x2 inventory grid of the game UI, measured against the
    /// 522x255 reference screenshot.
    pub fn inventory_grid() -> Self {
        let cells = [
            // Row 0 (top row): x 0-130 / 130-261 / 261-391 / 391-521, y 64-125
            ("shift", (0.0000, 0.2490, 0.2510, 0.4902)),
            ("ins", (0.2490, 0.5000, 0.2510, 0.4902)),
            ("home", (0.5000, 0.7490, 0.2510, 0.4902)),
            ("pup", (0.7490, 0.9981, 0.2510, 0.4902)),
            // Row 1 (bottom row): same columns, y 196-254
            ("ctrl", (0.0000, 0.2490, 0.7686, 0.9961)),
            ("del", (0.2490, 0.5000, 0.7686, 0.9961)),
            ("end", (0.5000, 0.7490, 0.7686, 0.9961)),
            ("pdn", (0.7490, 0.9981, 0.7686, 0.9961)),
        ];

        let regions = cells
            .into_iter()
            .map(|(name, (x_min, x_max, y_min, y_max))| {
                let ratios = RoiRatios::new(x_min, x_max, y_min, y_max)
                    .expect("reference layout ratios are valid");
                (name.to_string(), ratios)
            })
            .collect();

        Self { regions }
    }

    pub fn get(&self, name: &str) -> Option<&RoiRatios> {
        self.regions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Scale every region of the layout to absolute pixel rectangles for
    /// the given image size. Pure; total over any positive dimensions.
    pub fn map_regions(&self, width: u32, height: u32) -> BTreeMap<String, Roi> {
        self.regions
            .iter()
            .map(|(name, ratios)| (name.clone(), scale_roi(ratios, width, height)))
            .collect()
    }

    /// Scale a single named region; `None` when the name is unknown.
    pub fn map_region(&self, name: &str, width: u32, height: u32) -> Option<Roi> {
        self.regions
            .get(name)
            .map(|ratios| scale_roi(ratios, width, height))
    }
}

/// Multiply ratios by the image dimensions, truncating. Max coordinates
/// are clamped to the last valid pixel so crops stay in bounds.
fn scale_roi(ratios: &RoiRatios, width: u32, height: u32) -> Roi {
    let x_min = (ratios.x_min * width as f64) as u32;
    let x_max = ((ratios.x_max * width as f64) as u32).min(width.saturating_sub(1));
    let y_min = (ratios.y_min * height as f64) as u32;
    let y_max = ((ratios.y_max * height as f64) as u32).min(height.saturating_sub(1));

    Roi {
        x_min: x_min.min(x_max),
        x_max,
        y_min: y_min.min(y_max),
        y_max,
    }
}
