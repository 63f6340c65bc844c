//! # Disparity selection
//!
//! Picks the disparity of each pixel from its aggregated region scores. The lowest score wins
//! (Winner Takes All), after which the match can be rejected by:
//!
//! - an upper bound on the region error,
//! - a texture test, which rejects matches whose best and second best scores are too similar,
//! - a right to left check, which repeats the search anchored on the matched right pixel and
//!   rejects the match if the two searches disagree.
//!
//! Rejected pixels are given the invalid value `max_disparity + 1`. Integer maps hold the winning
//! disparity, floating point maps refine it by fitting a parabola through the neighbouring scores.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::aggregate::ScoreRow;
use crate::config::DisparityConfig;
use crate::score::Score;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Pixel type of a disparity map.
pub trait DisparityOutput: Copy + Default + Send + Sync + 'static {
    /// Whether the map holds sub-pixel disparities.
    const SUBPIXEL: bool;

    fn from_disparity(d: u32) -> Self;

    /// Disparity `d` refined by a sub-pixel `offset`. Integer maps keep `d`.
    fn refined(d: u32, _offset: f32) -> Self {
        Self::from_disparity(d)
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DisparitySelector {
    max_error: Option<f64>,
    validate_rtol: Option<usize>,
    texture: Option<f64>,
    invalid: u32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityOutput for u8 {
    const SUBPIXEL: bool = false;

    #[inline]
    fn from_disparity(d: u32) -> Self {
        d as u8
    }
}

impl DisparityOutput for f32 {
    const SUBPIXEL: bool = true;

    #[inline]
    fn from_disparity(d: u32) -> Self {
        d as f32
    }

    #[inline]
    fn refined(d: u32, offset: f32) -> Self {
        d as f32 + offset
    }
}

impl DisparitySelector {
    pub fn new(config: &DisparityConfig) -> Self {
        Self {
            max_error: config.max_region_error(),
            validate_rtol: match config.validate_rtol {
                t if t >= 0 => Some(t as usize),
                _ => None
            },
            texture: match config.texture {
                t if t > 0.0 => Some(t),
                _ => None
            },
            invalid: config.invalid_value()
        }
    }

    pub fn invalid_value(&self) -> u32 {
        self.invalid
    }

    /// Select the best entry of `costs`, where `costs[i]` is the score of the `i`th disparity in
    /// the search range. Returns `None` if the match fails the error or texture test.
    ///
    /// Ties go to the lowest disparity. The texture test only applies when some disparity other
    /// than the best and its two neighbours was scored.
    pub fn select_column<S: Score>(&self, costs: &[S]) -> Option<usize> {
        let mut best = 0;
        let mut best_score = *costs.first()?;
        for (i, &c) in costs.iter().enumerate().skip(1) {
            if c < best_score {
                best = i;
                best_score = c;
            }
        }

        if let Some(max_error) = self.max_error {
            if best_score.to_f64() > max_error {
                return None;
            }
        }

        if let Some(texture) = self.texture {
            // Neighbours of the best disparity are part of the same minimum
            let second = costs
                .iter()
                .enumerate()
                .filter(|&(i, _)| i + 1 < best || i > best + 1)
                .map(|(_, &c)| c)
                .fold(None, |acc: Option<S>, c| match acc {
                    Some(s) if s <= c => Some(s),
                    _ => Some(c)
                });

            if let Some(second) = second {
                if (second - best_score).to_f64() <= texture * best_score.to_f64() {
                    return None;
                }
            }
        }

        Some(best)
    }

    /// Offset of the minimum of a parabola fitted through `costs[best - 1..=best + 1]`.
    ///
    /// Zero at either end of the range or when the three scores lie on a line.
    pub fn subpixel_offset<S: Score>(costs: &[S], best: usize) -> f32 {
        if best == 0 || best + 1 >= costs.len() {
            return 0.0;
        }

        let c0 = costs[best - 1].to_f64();
        let c1 = costs[best].to_f64();
        let c2 = costs[best + 1].to_f64();

        let denom = c0 - 2.0 * c1 + c2;
        if denom == 0.0 {
            return 0.0;
        }

        (0.5 * (c0 - c2) / denom) as f32
    }

    /// Best disparity of right image column `xr`, searching the left pixels it could match.
    fn right_to_left<S: Score>(row: &ScoreRow<'_, S>, xr: usize) -> usize {
        let last_column = row.width - row.border_x - 1;
        let max_d = row.max_disparity.min(last_column - xr);

        let mut best = row.min_disparity;
        let mut best_score = row.score(xr + best, best);
        for d in (row.min_disparity + 1)..=max_d {
            let s = row.score(xr + d, d);
            if s < best_score {
                best = d;
                best_score = s;
            }
        }
        best
    }

    /// Select the disparity of every scored column of `row`, writing it into `out`.
    ///
    /// Columns outside [`ScoreRow::columns`] are not written.
    pub fn select_row<S: Score, O: DisparityOutput>(
        &self,
        row: &ScoreRow<'_, S>,
        column: &mut Vec<S>,
        out: &mut [O]
    ) {
        let invalid = O::from_disparity(self.invalid);

        for x in row.columns() {
            column.clear();
            for d in row.min_disparity..=row.local_max(x) {
                column.push(row.score(x, d));
            }

            out[x] = match self.select_column(column) {
                None => invalid,
                Some(best) => {
                    let d = row.min_disparity + best;

                    let consistent = match self.validate_rtol {
                        Some(tol) => {
                            let d_right = Self::right_to_left(row, x - d);
                            (d as isize - d_right as isize).abs() as usize <= tol
                        },
                        None => true
                    };

                    if !consistent {
                        invalid
                    }
                    else if O::SUBPIXEL {
                        O::refined(d as u32, Self::subpixel_offset(column, best))
                    }
                    else {
                        O::from_disparity(d as u32)
                    }
                }
            };
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
