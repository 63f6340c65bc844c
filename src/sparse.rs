//! # Sparse block matching
//!
//! Disparity of individual pixels, for when only a handful of points are needed rather than a
//! whole map. The region scores of the requested pixel are summed directly from the images with
//! the sum of absolute differences over a single rectangle, then the best disparity is picked by
//! the same [`DisparitySelector`] the dense matcher uses.
//!
//! No right to left check is made, each pixel is only ever searched from the left image.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::debug;

use crate::block_match::check_score_range;
use crate::config::{BlockShape, DisparityConfig, ErrorMetric};
use crate::error::*;
use crate::gray::ImageView;
use crate::score::{RowScorer, Sad, SadPixel, Score};
use crate::select::DisparitySelector;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Block matching of single pixels in a rectified stereo pair.
pub struct SparseBlockMatch<'a, T: SadPixel> {
    config: DisparityConfig,
    selector: DisparitySelector,
    scorer: Sad<T>,
    left: ImageView<'a, T>,
    right: ImageView<'a, T>,

    /// Region scores of the last processed pixel, `scores[i]` holds disparity `min + i`.
    scores: Vec<T::Score>,
    /// Errors of one column of the region.
    element: Vec<T::Score>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<'a, T: SadPixel> SparseBlockMatch<'a, T> {
    /// Create a matcher over the given pair.
    ///
    /// Only the `Sad` metric with a `Rect` region is supported. `validate_rtol` is ignored.
    pub fn new(
        config: DisparityConfig,
        left: ImageView<'a, T>,
        right: ImageView<'a, T>
    ) -> Result<Self> {
        config.validate()?;

        if config.error_metric != ErrorMetric::Sad || config.shape != BlockShape::Rect {
            return Err(Error::UnsupportedCombination(format!(
                "sparse matching needs a Sad metric and a Rect region, got {:?} and {:?}",
                config.error_metric, config.shape
            )));
        }

        if (left.width(), left.height()) != (right.width(), right.height()) {
            return Err(Error::DimensionMismatch {
                left: (left.width(), left.height()),
                right: (right.width(), right.height())
            });
        }

        check_score_range::<Sad<T>>(&config)?;

        debug!(
            "Sparse block matching {}x{} {:?} images, disparity {}..={}",
            left.width(), left.height(), T::KIND, config.min_disparity, config.max_disparity
        );

        Ok(Self {
            selector: DisparitySelector::new(&config),
            scores: Vec::with_capacity(config.range()),
            element: Vec::with_capacity(config.range()),
            scorer: Sad::new(),
            config,
            left,
            right
        })
    }

    pub fn config(&self) -> &DisparityConfig {
        &self.config
    }

    /// Columns and rows at each image edge which can't be matched, not counting the extra
    /// `min_disparity` columns on the left.
    pub fn border(&self) -> (usize, usize) {
        self.config.border()
    }

    /// Region scores of the last pixel passed to [`SparseBlockMatch::process`], for disparities
    /// from `min_disparity` up to the largest one which fit in the image.
    pub fn scores(&self) -> &[T::Score] {
        &self.scores
    }

    /// Disparity of the left image pixel at `(x, y)`.
    ///
    /// Returns `None` when the pixel's region leaves the image or the match is rejected. The
    /// disparity is refined to sub-pixel precision when `subpixel` is set.
    pub fn process(&mut self, x: usize, y: usize) -> Option<f64> {
        if !self.score(x, y) {
            return None;
        }

        let best = self.selector.select_column(&self.scores)?;
        let disparity = (self.config.min_disparity as usize + best) as f64;

        if self.config.subpixel {
            Some(disparity + DisparitySelector::subpixel_offset(&self.scores, best) as f64)
        }
        else {
            Some(disparity)
        }
    }

    /// Fill `scores` for the pixel at `(x, y)`, false if its region leaves the image.
    fn score(&mut self, x: usize, y: usize) -> bool {
        let (rx, ry) = self.border();
        let min = self.config.min_disparity as usize;
        let (width, height) = (self.left.width(), self.left.height());

        self.scores.clear();
        if x < rx + min || x + rx >= width || y < ry || y + ry >= height {
            return false;
        }

        let local_max = (self.config.max_disparity as usize).min(x - rx);
        self.scores.resize(local_max - min + 1, T::Score::ZERO);

        for yy in (y - ry)..=(y + ry) {
            let (left_row, right_row) = (self.left.row(yy), self.right.row(yy));

            for xx in (x - rx)..=(x + rx) {
                self.scorer.score(left_row, right_row, xx, min, local_max, &mut self.element);
                for (s, &e) in self.scores.iter_mut().zip(self.element.iter()) {
                    *s += e;
                }
            }
        }

        true
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
