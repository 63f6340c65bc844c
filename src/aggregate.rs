//! # Block aggregation
//!
//! Sums the per-pixel errors from a [`RowScorer`] over a rectangular region for every pixel and
//! disparity. The sum is separable: each row is first summed horizontally with a running window
//! of `2*rx + 1` columns, then `2*ry + 1` of those rows are summed vertically. For exact score
//! types the vertical sum is updated by adding the row entering the window and subtracting the
//! row leaving it, so the cost per pixel does not depend on the size of the region.
//!
//! Floating point vertical sums are instead recomputed from the stored rows, always in the same
//! order, so that the output of a row never depends on which row a partition started at.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::Range;

use crate::config::{BlockShape, DisparityConfig};
use crate::gray::ImageView;
use crate::score::{RowScorer, Score};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Geometry of the aggregation for one image width and configuration.
#[derive(Debug, Clone)]
pub struct BlockAggregator {
    width: usize,
    min_disparity: usize,
    max_disparity: usize,
    radius_x: usize,
    radius_y: usize,
    shape: BlockShape
}

/// Scratch memory owned by a single worker.
///
/// Allocated once when a partition starts and reused for each of its rows.
pub struct Workspace<S> {
    /// Errors of a single row at a single disparity.
    element: Vec<S>,
    /// Horizontal sums of the last `2*ry + 1` rows, row `y` lives in slot `y % len`.
    horizontal: Vec<Vec<S>>,
    /// Vertical sum of the rows in `horizontal`.
    vertical: Vec<S>,
    /// Recent vertical sums, only used by [`BlockShape::BestFive`].
    vertical_ring: Vec<Vec<S>>,
    combined: Vec<S>,
    /// Errors of one column across the disparity range, used by the selector.
    column: Vec<S>
}

/// Aggregated region scores of one output row.
///
/// The score of column `x` at disparity `d` is stored at `(d - min_disparity) * width + x`. Only
/// columns inside [`ScoreRow::columns`] and disparities up to [`ScoreRow::local_max`] hold a
/// score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRow<'a, S> {
    pub scores: &'a [S],
    pub width: usize,
    pub border_x: usize,
    pub min_disparity: usize,
    pub max_disparity: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BlockAggregator {
    /// Create an aggregator for images of the given width.
    ///
    /// The configuration must already have been validated.
    pub fn new(config: &DisparityConfig, width: usize) -> Self {
        Self {
            width,
            min_disparity: config.min_disparity as usize,
            max_disparity: config.max_disparity as usize,
            radius_x: config.region_radius_x as usize,
            radius_y: config.region_radius_y as usize,
            shape: config.shape
        }
    }

    pub fn range(&self) -> usize {
        self.max_disparity - self.min_disparity + 1
    }

    /// Columns and rows at each image edge which never receive a score.
    pub fn border(&self) -> (usize, usize) {
        match self.shape {
            BlockShape::Rect => (self.radius_x, self.radius_y),
            BlockShape::BestFive => (2 * self.radius_x, 2 * self.radius_y)
        }
    }

    /// Allocate the scratch memory needed by [`BlockAggregator::process_rows`].
    pub fn workspace<S: Score>(&self) -> Workspace<S> {
        let len = self.range() * self.width;
        let ring = 2 * self.radius_y + 1;

        let (vertical_ring, combined) = match self.shape {
            BlockShape::Rect => (Vec::new(), Vec::new()),
            BlockShape::BestFive => (vec![vec![S::ZERO; len]; ring], vec![S::ZERO; len])
        };

        Workspace {
            element: vec![S::ZERO; self.width],
            horizontal: vec![vec![S::ZERO; len]; ring],
            vertical: vec![S::ZERO; len],
            vertical_ring,
            combined,
            column: Vec::with_capacity(self.range())
        }
    }

    /// Aggregate the scores of each output row in `rows`, handing them to `emit` in order.
    ///
    /// `rows` must lie inside the rows which have a complete region, `border().1` rows away from
    /// the top and bottom of the image. `emit` also receives the workspace's column buffer.
    pub fn process_rows<R, F>(
        &self,
        scorer: &R,
        left: ImageView<'_, R::Input>,
        right: ImageView<'_, R::Input>,
        rows: Range<usize>,
        ws: &mut Workspace<R::Score>,
        mut emit: F
    )
    where
        R: RowScorer,
        F: FnMut(usize, &ScoreRow<'_, R::Score>, &mut Vec<R::Score>)
    {
        if rows.start >= rows.end {
            return;
        }

        let Workspace {
            element,
            horizontal,
            vertical,
            vertical_ring,
            combined,
            column
        } = ws;

        match self.shape {
            BlockShape::Rect => {
                self.vertical_pass(
                    scorer, left, right, rows, element, horizontal, vertical,
                    |y, v| emit(y, &self.wrap_scores(v), &mut *column)
                );
            },
            BlockShape::BestFive => {
                let ry = self.radius_y;
                let ring = vertical_ring.len();
                let first = rows.start;
                let centers = (rows.start - ry)..(rows.end + ry);

                self.vertical_pass(
                    scorer, left, right, centers, element, horizontal, vertical,
                    |yc, v| {
                        vertical_ring[yc % ring].copy_from_slice(v);
                        if yc < first + ry {
                            return;
                        }

                        let y = yc - ry;
                        self.combine_five(
                            &vertical_ring[(y - ry) % ring],
                            &vertical_ring[y % ring],
                            &vertical_ring[yc % ring],
                            &mut combined[..]
                        );
                        emit(y, &self.wrap_scores(&combined[..]), &mut *column);
                    }
                );
            }
        }
    }

    fn wrap_scores<'a, S>(&self, scores: &'a [S]) -> ScoreRow<'a, S> {
        ScoreRow {
            scores,
            width: self.width,
            border_x: self.border().0,
            min_disparity: self.min_disparity,
            max_disparity: self.max_disparity
        }
    }

    /// Stream the vertical sums centred on each row in `centers`.
    #[allow(clippy::too_many_arguments)]
    fn vertical_pass<R, F>(
        &self,
        scorer: &R,
        left: ImageView<'_, R::Input>,
        right: ImageView<'_, R::Input>,
        centers: Range<usize>,
        element: &mut [R::Score],
        horizontal: &mut [Vec<R::Score>],
        vertical: &mut [R::Score],
        mut on_vertical: F
    )
    where
        R: RowScorer,
        F: FnMut(usize, &[R::Score])
    {
        let ry = self.radius_y;
        let ring = horizontal.len();

        // Rows above the first centre and all but the last row of its region
        for yi in (centers.start - ry)..(centers.start + ry) {
            self.horizontal_row(scorer, left, right, yi, element, &mut horizontal[yi % ring]);
        }

        for yc in centers.clone() {
            let entering = yc + ry;
            let slot = entering % ring;

            if R::Score::EXACT && yc > centers.start {
                // The slot still holds the row leaving the region
                for (v, h) in vertical.iter_mut().zip(horizontal[slot].iter()) {
                    *v -= *h;
                }
                self.horizontal_row(scorer, left, right, entering, element, &mut horizontal[slot]);
                for (v, h) in vertical.iter_mut().zip(horizontal[slot].iter()) {
                    *v += *h;
                }
            }
            else {
                self.horizontal_row(scorer, left, right, entering, element, &mut horizontal[slot]);
                sum_rows(horizontal, yc - ry, vertical);
            }

            on_vertical(yc, vertical);
        }
    }

    /// Horizontal region sums of image row `y` for every disparity, centred on each column.
    fn horizontal_row<R: RowScorer>(
        &self,
        scorer: &R,
        left: ImageView<'_, R::Input>,
        right: ImageView<'_, R::Input>,
        y: usize,
        element: &mut [R::Score],
        out: &mut [R::Score]
    ) {
        let width = self.width;
        let region = 2 * self.radius_x + 1;
        let (left_row, right_row) = (left.row(y), right.row(y));

        for d in self.min_disparity..=self.max_disparity {
            if d + region > width {
                break;
            }

            scorer.score_row(left_row, right_row, d, element);

            let base = (d - self.min_disparity) * width + self.radius_x;
            let mut sum = R::Score::ZERO;
            for &e in &element[d..d + region] {
                sum += e;
            }
            out[base + d] = sum;

            for start in (d + 1)..=(width - region) {
                sum += element[start + region - 1];
                sum -= element[start - 1];
                out[base + start] = sum;
            }
        }
    }

    /// Best of five score: the centre region plus the two lowest of the four corner regions.
    fn combine_five<S: Score>(&self, top: &[S], middle: &[S], bottom: &[S], out: &mut [S]) {
        let (width, rx) = (self.width, self.radius_x);
        let (border_x, _) = self.border();

        for d in self.min_disparity..=self.max_disparity {
            let base = (d - self.min_disparity) * width;
            let start = border_x + d;
            let end = width.saturating_sub(border_x);

            for x in start..end {
                let i = base + x;
                let corners = two_smallest_sum(
                    top[i - rx], top[i + rx], bottom[i - rx], bottom[i + rx]
                );
                out[i] = middle[i] + corners;
            }
        }
    }
}

impl<'a, S: Score> ScoreRow<'a, S> {
    /// Score of column `x` at disparity `d`.
    #[inline]
    pub fn score(&self, x: usize, d: usize) -> S {
        self.scores[(d - self.min_disparity) * self.width + x]
    }

    /// Columns which receive a disparity.
    pub fn columns(&self) -> Range<usize> {
        (self.border_x + self.min_disparity)..self.width.saturating_sub(self.border_x)
    }

    /// Largest disparity scored at column `x`.
    #[inline]
    pub fn local_max(&self, x: usize) -> usize {
        self.max_disparity.min(x - self.border_x)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Sum the ring rows `first..first + ring.len()` into `out`, in row order.
fn sum_rows<S: Score>(ring: &[Vec<S>], first: usize, out: &mut [S]) {
    let n = ring.len();
    out.copy_from_slice(&ring[first % n]);
    for y in (first + 1)..(first + n) {
        for (o, h) in out.iter_mut().zip(ring[y % n].iter()) {
            *o += *h;
        }
    }
}

#[inline]
fn two_smallest_sum<S: Score>(v0: S, v1: S, v2: S, v3: S) -> S {
    let (a0, a1) = if v1 < v0 { (v1, v0) } else { (v0, v1) };
    let (b0, b1) = if v3 < v2 { (v3, v2) } else { (v2, v3) };

    if a0 <= b0 {
        a0 + if a1 < b0 { a1 } else { b0 }
    }
    else {
        b0 + if a0 < b1 { a0 } else { b1 }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
