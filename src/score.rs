//! # Row cost scoring
//!
//! Computes the error between pixels of a left and right scanline for each candidate disparity.
//! The left pixel at column `x` is compared with the right pixel at `x - d`, so a disparity is
//! only ever scored at columns where `x >= d`. Columns where the right pixel would fall outside
//! the image are left out of the candidate set rather than given a large score.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::census::CensusCode;
use crate::gray::Pixel;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Numeric type in which region errors are accumulated.
pub trait Score:
    Copy
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + AddAssign
    + SubAssign
    + Send
    + Sync
    + Debug
    + 'static
{
    const ZERO: Self;

    /// Largest sum this type holds exactly, `None` for floating point.
    const SUM_LIMIT: Option<u64>;

    /// Whether sums of this type are exact, so that a running sum updated by adding and
    /// subtracting rows always equals the sum computed from scratch.
    const EXACT: bool;

    fn to_f64(self) -> f64;
}

/// Pixel types which can be compared with the sum of absolute differences.
pub trait SadPixel: Pixel {
    type Score: Score;

    /// Largest absolute difference between two pixels, `None` for floating point.
    const MAX_DIFF: Option<u64>;

    fn abs_diff(a: Self, b: Self) -> Self::Score;
}

/// Computes the error between the pixels of a left and right row.
pub trait RowScorer: Sync {
    type Input: Copy + Send + Sync;
    type Score: Score;

    /// Largest error of a single pixel pair, `None` when it has no bound.
    const MAX_COST: Option<u64>;

    /// Error between a single left and right pixel.
    fn cost(&self, left: Self::Input, right: Self::Input) -> Self::Score;

    /// Errors of column `x` for each disparity in `min_d..=max_d` which stays inside the right
    /// row. `costs[i]` holds disparity `min_d + i`; disparities above `x` are not scored.
    fn score(
        &self,
        left: &[Self::Input],
        right: &[Self::Input],
        x: usize,
        min_d: usize,
        max_d: usize,
        costs: &mut Vec<Self::Score>
    ) {
        costs.clear();
        for d in min_d..=max_d.min(x) {
            costs.push(self.cost(left[x], right[x - d]));
        }
    }

    /// Errors of an entire row at disparity `d`. Only `out[d..]` is written.
    fn score_row(
        &self,
        left: &[Self::Input],
        right: &[Self::Input],
        d: usize,
        out: &mut [Self::Score]
    ) {
        let width = left.len();
        if d >= width {
            return;
        }
        for ((o, &l), &r) in out[d..width].iter_mut().zip(&left[d..]).zip(right) {
            *o = self.cost(l, r);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Sum of absolute differences between intensities.
#[derive(Debug, Clone, Copy)]
pub struct Sad<T> {
    _pixel: PhantomData<T>
}

/// Hamming distance between census codes.
#[derive(Debug, Clone, Copy)]
pub struct CensusHamming<C> {
    _code: PhantomData<C>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Score for i32 {
    const ZERO: Self = 0;
    const SUM_LIMIT: Option<u64> = Some(i32::MAX as u64);
    const EXACT: bool = true;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Score for f32 {
    const ZERO: Self = 0.0;
    const SUM_LIMIT: Option<u64> = None;
    const EXACT: bool = false;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

macro_rules! impl_sad_integer {
    ($($t:ty),*) => {
        $(
            impl SadPixel for $t {
                type Score = i32;
                const MAX_DIFF: Option<u64> = Some((<$t>::MAX as i64 - <$t>::MIN as i64) as u64);

                #[inline]
                fn abs_diff(a: Self, b: Self) -> i32 {
                    (a as i32 - b as i32).abs()
                }
            }
        )*
    };
}

impl_sad_integer!(u8, u16, i16);

impl SadPixel for f32 {
    type Score = f32;
    const MAX_DIFF: Option<u64> = None;

    #[inline]
    fn abs_diff(a: Self, b: Self) -> f32 {
        (a - b).abs()
    }
}

impl<T> Sad<T> {
    pub fn new() -> Self {
        Self {
            _pixel: PhantomData
        }
    }
}

impl<T> Default for Sad<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SadPixel> RowScorer for Sad<T> {
    type Input = T;
    type Score = T::Score;
    const MAX_COST: Option<u64> = T::MAX_DIFF;

    #[inline]
    fn cost(&self, left: T, right: T) -> T::Score {
        T::abs_diff(left, right)
    }
}

impl<C> CensusHamming<C> {
    pub fn new() -> Self {
        Self {
            _code: PhantomData
        }
    }
}

impl<C> Default for CensusHamming<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CensusCode> RowScorer for CensusHamming<C> {
    type Input = C;
    type Score = i32;
    const MAX_COST: Option<u64> = Some(C::BITS as u64);

    #[inline]
    fn cost(&self, left: C, right: C) -> i32 {
        left.hamming(right) as i32
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
