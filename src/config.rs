//! # Block matching configuration
//!
//! Parameters for a single disparity computation. A configuration can be built in code or read
//! from a TOML document, and is checked with [`DisparityConfig::validate`] before any work is
//! done.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Largest disparity which still leaves room for the invalid value in an 8-bit map.
pub const MAX_U8_DISPARITY: i32 = 254;

/// Census sampling radii which have a code type.
pub const CENSUS_RADII: std::ops::RangeInclusive<u32> = 1..=5;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Error metric used to compare a pair of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMetric {
    /// Sum of absolute differences of the intensities.
    Sad,
    /// Hamming distance between census transform codes.
    Census
}

/// Shape of the region scores are aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockShape {
    /// A single rectangle centred on the pixel.
    Rect,
    /// The centre rectangle plus the best two of the four rectangles at its corners.
    BestFive
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisparityConfig {
    /// Smallest disparity searched, must be >= 0.
    pub min_disparity: i32,
    /// Largest disparity searched, inclusive.
    pub max_disparity: i32,
    pub region_radius_x: i32,
    pub region_radius_y: i32,
    /// Largest allowed average error per pixel in the region. Negative disables the check.
    pub max_per_pixel_error: f64,
    /// Tolerance in pixels of the right to left validation. Negative disables the check.
    pub validate_rtol: i32,
    /// Uniqueness threshold between the best and second best score. <= 0 disables the check.
    pub texture: f64,
    /// Produce a floating point map with parabolic sub-pixel refinement.
    pub subpixel: bool,
    pub error_metric: ErrorMetric,
    pub shape: BlockShape,
    /// Radius of the census transform when `error_metric` is `Census`.
    pub census_radius: u32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for DisparityConfig {
    fn default() -> Self {
        Self {
            min_disparity: 0,
            max_disparity: 40,
            region_radius_x: 3,
            region_radius_y: 3,
            max_per_pixel_error: -1.0,
            validate_rtol: 1,
            texture: 0.15,
            subpixel: false,
            error_metric: ErrorMetric::Sad,
            shape: BlockShape::Rect,
            census_radius: 3
        }
    }
}

impl DisparityConfig {
    /// Parse and validate a configuration from a TOML document.
    ///
    /// Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check that the parameters describe a computation which can be carried out.
    pub fn validate(&self) -> Result<()> {
        if self.min_disparity < 0 {
            return Err(Error::InvalidConfig(format!(
                "min_disparity must be >= 0, got {}", self.min_disparity
            )));
        }
        if self.max_disparity <= self.min_disparity {
            return Err(Error::InvalidConfig(format!(
                "max_disparity ({}) must be greater than min_disparity ({})",
                self.max_disparity, self.min_disparity
            )));
        }
        if self.region_radius_x < 1 || self.region_radius_y < 1 {
            return Err(Error::InvalidConfig(format!(
                "region radius must be >= 1, got ({}, {})",
                self.region_radius_x, self.region_radius_y
            )));
        }
        if !self.subpixel {
            if self.max_disparity - self.min_disparity > MAX_U8_DISPARITY {
                return Err(Error::InvalidConfig(format!(
                    "(max - min) disparity must be <= {} for an 8-bit map, got {}",
                    MAX_U8_DISPARITY, self.max_disparity - self.min_disparity
                )));
            }
            if self.max_disparity > MAX_U8_DISPARITY {
                return Err(Error::InvalidConfig(format!(
                    "max_disparity must be <= {} for an 8-bit map, got {}",
                    MAX_U8_DISPARITY, self.max_disparity
                )));
            }
        }
        if self.error_metric == ErrorMetric::Census && !CENSUS_RADII.contains(&self.census_radius) {
            return Err(Error::InvalidConfig(format!(
                "census_radius must be in {:?}, got {}", CENSUS_RADII, self.census_radius
            )));
        }
        if self.texture.is_nan() || self.max_per_pixel_error.is_nan() {
            return Err(Error::InvalidConfig("thresholds must not be NaN".into()));
        }

        Ok(())
    }

    /// Number of disparities searched.
    pub fn range(&self) -> usize {
        (self.max_disparity - self.min_disparity + 1) as usize
    }

    /// The value written to pixels without a valid disparity.
    pub fn invalid_value(&self) -> u32 {
        self.max_disparity as u32 + 1
    }

    /// Number of pixels in one region.
    pub fn window_area(&self) -> usize {
        ((2 * self.region_radius_x + 1) * (2 * self.region_radius_y + 1)) as usize
    }

    /// Number of columns and rows at each image edge which never receive a disparity, not
    /// counting the extra `min_disparity` columns on the left.
    pub fn border(&self) -> (usize, usize) {
        let (rx, ry) = (self.region_radius_x as usize, self.region_radius_y as usize);
        match self.shape {
            BlockShape::Rect => (rx, ry),
            BlockShape::BestFive => (2 * rx, 2 * ry)
        }
    }

    /// Number of regions which contribute to one score.
    pub fn regions(&self) -> usize {
        match self.shape {
            BlockShape::Rect => 1,
            BlockShape::BestFive => 3
        }
    }

    /// Largest allowed region score, `None` when the check is disabled.
    pub fn max_region_error(&self) -> Option<f64> {
        if self.max_per_pixel_error < 0.0 {
            return None;
        }

        Some(self.window_area() as f64 * self.max_per_pixel_error * self.regions() as f64)
    }

    /// Largest score possible when a single pixel pair costs at most `max_cost`.
    pub fn max_score(&self, max_cost: u64) -> u64 {
        max_cost
            .saturating_mul(self.window_area() as u64)
            .saturating_mul(self.regions() as u64)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DisparityConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_ranges() {
        let mut c = DisparityConfig::default();
        c.min_disparity = -1;
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));

        let mut c = DisparityConfig::default();
        c.max_disparity = c.min_disparity;
        assert!(c.validate().is_err());

        let mut c = DisparityConfig::default();
        c.region_radius_y = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn u8_output_range_is_limited() {
        let mut c = DisparityConfig::default();
        c.max_disparity = 255;
        assert!(c.validate().is_err());

        c.min_disparity = 10;
        assert!(c.validate().is_err());

        // a float map has room for the invalid value
        c.subpixel = true;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn census_radius_checked_only_for_census() {
        let mut c = DisparityConfig::default();
        c.census_radius = 9;
        assert!(c.validate().is_ok());

        c.error_metric = ErrorMetric::Census;
        assert!(c.validate().is_err());
    }

    #[test]
    fn borders_and_errors() {
        let mut c = DisparityConfig::default();
        c.region_radius_x = 2;
        c.region_radius_y = 1;
        c.max_per_pixel_error = 4.0;
        assert_eq!(c.border(), (2, 1));
        assert_eq!(c.window_area(), 15);
        assert_eq!(c.max_region_error(), Some(60.0));

        c.shape = BlockShape::BestFive;
        assert_eq!(c.border(), (4, 2));
        assert_eq!(c.max_region_error(), Some(180.0));

        c.max_per_pixel_error = -1.0;
        assert_eq!(c.max_region_error(), None);
    }

    #[test]
    fn from_toml() {
        let c = DisparityConfig::from_toml_str(
            r#"
            max_disparity = 64
            region_radius_x = 4
            subpixel = true
            error_metric = "Census"
            shape = "BestFive"
            "#
        ).unwrap();

        assert_eq!(c.max_disparity, 64);
        assert_eq!(c.region_radius_x, 4);
        assert_eq!(c.region_radius_y, 3);
        assert!(c.subpixel);
        assert_eq!(c.error_metric, ErrorMetric::Census);
        assert_eq!(c.shape, BlockShape::BestFive);

        let serialised = toml::to_string(&c).unwrap();
        assert_eq!(DisparityConfig::from_toml_str(&serialised).unwrap(), c);
    }

    #[test]
    fn from_toml_validates() {
        assert!(DisparityConfig::from_toml_str("min_disparity = 5\nmax_disparity = 2").is_err());
        assert!(matches!(
            DisparityConfig::from_toml_str("max_disparity = \"many\""),
            Err(Error::Config(_))
        ));
    }
}
