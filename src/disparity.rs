//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;

use crate::config::MAX_U8_DISPARITY;
use crate::error::*;
use crate::gray::{DynImage, Gray};

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Storage type of a disparity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisparityKind {
    /// Integer disparities.
    U8,
    /// Sub-pixel disparities.
    F32
}

/// Pixels of a disparity map.
#[derive(Debug, Clone, PartialEq)]
pub enum DisparityData {
    U8(Gray<u8>),
    F32(Gray<f32>)
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A dense disparity map.
///
/// Each pixel holds the absolute disparity of the left image pixel at the same position, in
/// `min_disparity..=max_disparity`. Pixels without a disparity hold `max_disparity + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    data: DisparityData,
    min_disparity: u32,
    max_disparity: u32
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given rectified stereo pair.
    fn compute(&mut self, left: &DynImage, right: &DynImage) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    /// Create a map with every pixel set to the invalid value.
    ///
    /// An 8-bit map needs `max_disparity <= 254` to leave room for the invalid value.
    pub fn new(
        kind: DisparityKind,
        width: usize,
        height: usize,
        min_disparity: u32,
        max_disparity: u32
    ) -> Result<Self> {
        if min_disparity > max_disparity {
            return Err(Error::InvalidConfig(format!(
                "min_disparity ({}) is above max_disparity ({})", min_disparity, max_disparity
            )));
        }
        if kind == DisparityKind::U8 && max_disparity > MAX_U8_DISPARITY as u32 {
            return Err(Error::InvalidConfig(format!(
                "max_disparity must be <= {} for an 8-bit map, got {}",
                MAX_U8_DISPARITY, max_disparity
            )));
        }

        let invalid = max_disparity + 1;
        let data = match kind {
            DisparityKind::U8 => DisparityData::U8(Gray::filled(width, height, invalid as u8)),
            DisparityKind::F32 => DisparityData::F32(Gray::filled(width, height, invalid as f32))
        };

        Ok(Self {
            data,
            min_disparity,
            max_disparity
        })
    }

    /// Resize the map and set its range, marking every pixel invalid.
    pub(crate) fn reset(
        &mut self,
        width: usize,
        height: usize,
        min_disparity: u32,
        max_disparity: u32
    ) {
        self.min_disparity = min_disparity;
        self.max_disparity = max_disparity;
        let invalid = self.invalid_value();

        match &mut self.data {
            DisparityData::U8(img) => {
                img.reshape(width, height);
                img.fill(invalid as u8);
            },
            DisparityData::F32(img) => {
                img.reshape(width, height);
                img.fill(invalid as f32);
            }
        }
    }

    pub fn kind(&self) -> DisparityKind {
        match self.data {
            DisparityData::U8(_) => DisparityKind::U8,
            DisparityData::F32(_) => DisparityKind::F32
        }
    }

    pub fn width(&self) -> usize {
        match &self.data {
            DisparityData::U8(img) => img.width(),
            DisparityData::F32(img) => img.width()
        }
    }

    pub fn height(&self) -> usize {
        match &self.data {
            DisparityData::U8(img) => img.height(),
            DisparityData::F32(img) => img.height()
        }
    }

    pub fn min_disparity(&self) -> u32 {
        self.min_disparity
    }

    pub fn max_disparity(&self) -> u32 {
        self.max_disparity
    }

    /// The value held by pixels without a disparity.
    pub fn invalid_value(&self) -> u32 {
        self.max_disparity + 1
    }

    pub fn data(&self) -> &DisparityData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DisparityData {
        &mut self.data
    }

    /// Raw value of a pixel, including the invalid value.
    pub fn raw(&self, x: usize, y: usize) -> f32 {
        match &self.data {
            DisparityData::U8(img) => img.get(x, y) as f32,
            DisparityData::F32(img) => img.get(x, y)
        }
    }

    /// Disparity of a pixel, or `None` if it has none.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        let val = self.raw(x, y);
        if val > self.max_disparity as f32 {
            None
        }
        else {
            Some(val)
        }
    }

    /// Number of pixels holding a disparity in each row.
    pub fn valid_per_row(&self) -> Vec<usize> {
        (0..self.height())
            .map(|y| (0..self.width()).filter(|&x| self.get(x, y).is_some()).count())
            .collect()
    }

    /// Converts the image into a dynamic Luma8 image.
    ///
    /// Invalid pixels are drawn black.
    pub fn to_luma(&self) -> GrayImage {
        self.luma_scaled(1.0)
    }

    /// Converts the image to a normalised GrayImage.
    ///
    /// Normalises by the maximum disparity of the search range so that the full intensity range
    /// is used. Invalid pixels are drawn black.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let mult = match self.max_disparity {
            0 => 1.0,
            d => 255.0 / d as f32
        };
        self.luma_scaled(mult)
    }

    fn luma_scaled(&self, mult: f32) -> GrayImage {
        let mut new = GrayImage::new(self.width() as u32, self.height() as u32);

        for y in 0..new.height() {
            for x in 0..new.width() {
                let val = match self.get(x as usize, y as usize) {
                    Some(d) => (d * mult).max(0.0).min(255.0),
                    None => 0.0
                };

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_invalid() {
        let map = DisparityMap::new(DisparityKind::U8, 4, 3, 2, 10).unwrap();
        assert_eq!(map.invalid_value(), 11);
        assert_eq!(map.raw(3, 2), 11.0);
        assert_eq!(map.get(0, 0), None);
        assert_eq!(map.valid_per_row(), vec![0, 0, 0]);
    }

    #[test]
    fn u8_map_keeps_room_for_invalid() {
        let map = DisparityMap::new(DisparityKind::U8, 2, 2, 0, 254).unwrap();
        assert_eq!(map.raw(0, 0), 255.0);

        assert!(matches!(
            DisparityMap::new(DisparityKind::U8, 2, 2, 0, 255),
            Err(Error::InvalidConfig(_))
        ));
        assert!(DisparityMap::new(DisparityKind::F32, 2, 2, 0, 255).is_ok());
        assert!(DisparityMap::new(DisparityKind::F32, 2, 2, 5, 4).is_err());
    }

    #[test]
    fn reset_changes_shape_and_range() {
        let mut map = DisparityMap::new(DisparityKind::F32, 4, 3, 0, 10).unwrap();
        if let DisparityData::F32(img) = map.data_mut() {
            img.put(1, 1, 4.5);
        }
        assert_eq!(map.get(1, 1), Some(4.5));

        map.reset(6, 2, 1, 20);
        assert_eq!((map.width(), map.height()), (6, 2));
        assert_eq!(map.kind(), DisparityKind::F32);
        assert_eq!(map.raw(1, 1), 21.0);
    }

    #[test]
    fn luma_conversion() {
        let mut map = DisparityMap::new(DisparityKind::U8, 3, 1, 0, 51).unwrap();
        if let DisparityData::U8(img) = map.data_mut() {
            img.put(0, 0, 10);
            img.put(1, 0, 51);
        }

        let luma = map.to_luma();
        assert_eq!(luma.get_pixel(0, 0)[0], 10);
        assert_eq!(luma.get_pixel(2, 0)[0], 0);

        let norm = map.to_luma_normalised();
        assert_eq!(norm.get_pixel(0, 0)[0], 50);
        assert_eq!(norm.get_pixel(1, 0)[0], 255);
        assert_eq!(norm.get_pixel(2, 0)[0], 0);
    }
}
