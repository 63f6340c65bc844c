//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::gray::PixelKind;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the disparity crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A configuration parameter is outside of its allowed range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image dimensions do not match: left is {left:?}, right is {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize)
    },

    #[error("Left and right images must share a pixel type, got {left:?} and {right:?}")]
    PixelKindMismatch {
        left: PixelKind,
        right: PixelKind
    },

    #[error("Pixel buffer holds {actual} samples but {expected} are required")]
    BufferLength {
        expected: usize,
        actual: usize
    },

    #[error("Image of {width}x{height} is too small, at least {min_width}x{min_height} is needed")]
    ImageTooSmall {
        width: usize,
        height: usize,
        min_width: usize,
        min_height: usize
    },

    /// The operation needs contiguous row storage but was handed a strided view.
    #[error("Sub-images are not supported by {0}")]
    SubImage(&'static str),

    /// A valid configuration was paired with an input or output it cannot produce.
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[cfg(feature = "statistics")]
    #[error("Failed to plot statistics: {0}")]
    Plotting(String)
}
