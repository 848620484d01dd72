//! map_server style map files
//!
//! A YAML file names a greyscale image (PGM or PNG) and states its resolution,
//! origin and the thresholds that split pixel values into free, occupied and
//! unknown cells. Image row 0 is the top of the map, so rows are flipped on
//! load to put grid row 0 at the origin.

use image::GrayImage;
use log::info;
use serde::Deserialize;
use std::path::Path;

use crate::core::grid::{MapMessage, UNKNOWN_OCCUPANCY};
use crate::{Result, SimError};

/// Map metadata from the YAML file
#[derive(Debug, Clone, Deserialize)]
pub struct MapMetadata {
    /// Image filename, relative to the YAML file
    pub image: String,

    /// Meters per pixel
    pub resolution: f64,

    /// Map-frame pose `[x, y, yaw]` of the bottom-left pixel corner
    pub origin: [f64; 3],

    /// Non-zero when white means occupied
    #[serde(default)]
    pub negate: u8,

    /// Occupancy probability above which a pixel is occupied
    #[serde(default = "default_occupied_thresh")]
    pub occupied_thresh: f64,

    /// Occupancy probability below which a pixel is free
    #[serde(default = "default_free_thresh")]
    pub free_thresh: f64,
}

fn default_occupied_thresh() -> f64 {
    0.65
}

fn default_free_thresh() -> f64 {
    0.196
}

impl MapMetadata {
    /// Parse metadata from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let metadata: MapMetadata = serde_yaml::from_str(yaml)?;
        if !(0.0..=1.0).contains(&metadata.free_thresh)
            || !(0.0..=1.0).contains(&metadata.occupied_thresh)
            || metadata.free_thresh > metadata.occupied_thresh
        {
            return Err(SimError::Map(format!(
                "thresholds must satisfy 0 <= free ({}) <= occupied ({}) <= 1",
                metadata.free_thresh, metadata.occupied_thresh
            )));
        }
        Ok(metadata)
    }

    // Occupancy value for one pixel
    fn classify(&self, pixel: u8) -> i8 {
        let value = f64::from(pixel);
        let p = if self.negate != 0 {
            value / 255.0
        } else {
            (255.0 - value) / 255.0
        };

        if p > self.occupied_thresh {
            100
        } else if p < self.free_thresh {
            0
        } else {
            UNKNOWN_OCCUPANCY
        }
    }
}

/// Load a map YAML file and the image it references
pub fn load_map<P: AsRef<Path>>(yaml_path: P) -> Result<MapMessage> {
    let yaml_path = yaml_path.as_ref();
    let yaml = std::fs::read_to_string(yaml_path)?;
    let metadata = MapMetadata::from_yaml_str(&yaml)?;

    let yaml_dir = yaml_path.parent().unwrap_or(Path::new("."));
    let image_path = yaml_dir.join(&metadata.image);
    let pixels = image::open(&image_path)
        .map_err(|e| {
            SimError::Map(format!(
                "Failed to load map image {}: {}",
                image_path.display(),
                e
            ))
        })?
        .into_luma8();

    let message = map_from_image(&pixels, &metadata)?;
    info!(
        "Loaded map {}: {}x{} cells at {:.3} m/cell",
        yaml_path.display(),
        message.width,
        message.height,
        message.resolution
    );
    Ok(message)
}

/// Convert a greyscale image into a map message using `metadata`
pub fn map_from_image(pixels: &GrayImage, metadata: &MapMetadata) -> Result<MapMessage> {
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(SimError::Map("map image is empty".to_string()));
    }

    let mut data = Vec::with_capacity(width as usize * height as usize);
    // Bottom image row becomes grid row 0
    for row in (0..height).rev() {
        for col in 0..width {
            data.push(metadata.classify(pixels.get_pixel(col, row).0[0]));
        }
    }

    Ok(MapMessage {
        width,
        height,
        resolution: metadata.resolution,
        origin: metadata.origin,
        data,
    })
}
