//! # Stereo Disparity
//!
//! This crate provides dense disparity map computation for rectified stereo image pairs by block
//! matching, single pixel matching for sparse points, and a mutual information measure of how
//! well a disparity map aligns the two images.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod aggregate;
pub mod block_match;
pub mod census;
pub mod config;
mod disparity;
mod error;
pub mod gray;
pub mod mutual_info;
pub mod parallel;
pub mod score;
pub mod select;
pub mod sparse;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use crate::disparity::{DisparityAlgorithm, DisparityData, DisparityKind, DisparityMap};
pub use crate::error::{Error, Result};

pub mod prelude {
    pub use crate::block_match::BlockMatch;
    pub use crate::config::{BlockShape, DisparityConfig, ErrorMetric};
    pub use crate::disparity::{DisparityAlgorithm, DisparityData, DisparityKind, DisparityMap};
    pub use crate::gray::{DynImage, Gray, ImageView, PixelKind};
    pub use crate::mutual_info::StereoMutualInformation;
    pub use crate::sparse::SparseBlockMatch;
    pub use crate::compute_disparity;
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Compute the disparity map of a rectified stereo pair.
///
/// Both images must have the same size and pixel kind. The map holds `u8` disparities, or `f32`
/// when `config.subpixel` is set.
pub fn compute_disparity(
    left: &gray::DynImage,
    right: &gray::DynImage,
    config: &config::DisparityConfig
) -> Result<DisparityMap> {
    block_match::BlockMatch::new(config.clone())?.compute(left, right)
}
