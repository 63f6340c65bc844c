//! # Census transform
//!
//! The census transform encodes each pixel as a bit mask with one bit per sampled neighbour, set
//! when the neighbour is brighter than the centre pixel. Two codes are compared with the Hamming
//! distance, which makes the error robust to changes in brightness between the two cameras.
//!
//! A square region of radius 1 fits an 8-bit code, radius 2 a 32-bit code and radius 3 a 64-bit
//! code. Radii 4 and 5 are packed into a pair of 64-bit words.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;

use crate::error::*;
use crate::gray::{Gray, ImageView, Pixel};

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How pixels whose sampling region leaves the image are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusBorder {
    /// Leave the code of border pixels at zero.
    Skip,
    /// Treat samples outside the image as zero intensity.
    Zero
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A fixed width bit mask holding one census code.
pub trait CensusCode: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    /// Number of bits available in the code.
    const BITS: usize;

    fn set_bit(&mut self, bit: usize);

    /// Number of bits which differ between two codes.
    fn hamming(self, other: Self) -> u32;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

macro_rules! impl_census_word {
    ($($t:ty),*) => {
        $(
            impl CensusCode for $t {
                const BITS: usize = std::mem::size_of::<$t>() * 8;

                #[inline]
                fn set_bit(&mut self, bit: usize) {
                    *self |= 1 << bit;
                }

                #[inline]
                fn hamming(self, other: Self) -> u32 {
                    (self ^ other).count_ones()
                }
            }
        )*
    };
}

impl_census_word!(u8, u32, u64);

impl CensusCode for [u64; 2] {
    const BITS: usize = 128;

    #[inline]
    fn set_bit(&mut self, bit: usize) {
        self[bit / 64] |= 1 << (bit % 64);
    }

    #[inline]
    fn hamming(self, other: Self) -> u32 {
        (self[0] ^ other[0]).count_ones() + (self[1] ^ other[1]).count_ones()
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Offsets of every pixel in a square block of the given radius, excluding the centre, in
/// row-major order starting from the top left.
pub fn block_samples(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut samples = Vec::with_capacity((2 * radius + 1).pow(2) - 1);
    for y in -r..=r {
        for x in -r..=r {
            if x != 0 || y != 0 {
                samples.push((x, y));
            }
        }
    }
    samples
}

/// Census transform of a 3x3 block.
pub fn dense3x3<T: Pixel>(input: ImageView<'_, T>, border: CensusBorder) -> Gray<u8> {
    transform(input, &block_samples(1), border)
}

/// Census transform of a 5x5 block.
pub fn dense5x5<T: Pixel>(input: ImageView<'_, T>, border: CensusBorder) -> Gray<u32> {
    transform(input, &block_samples(2), border)
}

/// Census transform over an arbitrary set of sample offsets.
///
/// Bit `i` of each code is set when the sample at `samples[i]` is greater than the centre pixel.
/// The code type must be wide enough to hold every sample.
pub fn sample_transform<T: Pixel, C: CensusCode>(
    input: ImageView<'_, T>,
    samples: &[(isize, isize)],
    border: CensusBorder
) -> Result<Gray<C>> {
    if samples.len() > C::BITS {
        return Err(Error::UnsupportedCombination(format!(
            "{} census samples do not fit in a {}-bit code", samples.len(), C::BITS
        )));
    }

    Ok(transform(input, samples, border))
}

fn transform<T: Pixel, C: CensusCode>(
    input: ImageView<'_, T>,
    samples: &[(isize, isize)],
    border: CensusBorder
) -> Gray<C> {
    let radius = samples
        .iter()
        .map(|&(x, y)| x.abs().max(y.abs()) as usize)
        .max()
        .unwrap_or(0);

    let (width, height) = (input.width(), input.height());
    let mut output = Gray::<C>::new(width, height);

    let mut rows: Vec<&mut [C]> = output.rows_mut().collect();
    rows.par_iter_mut().enumerate().for_each(|(y, row)| {
        let inner_row = y >= radius && y + radius < height;

        for (x, code) in row.iter_mut().enumerate() {
            let inner = inner_row && x >= radius && x + radius < width;
            if !inner && border == CensusBorder::Skip {
                continue;
            }

            let center = input.get(x, y);
            let mut census = C::default();
            for (bit, &(dx, dy)) in samples.iter().enumerate() {
                let sx = x as isize + dx;
                let sy = y as isize + dy;
                let value = if inner
                    || (sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height)
                {
                    input.get(sx as usize, sy as usize)
                }
                else {
                    T::default()
                };

                if value > center {
                    census.set_bit(bit);
                }
            }
            *code = census;
        }
    });

    output
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sample_counts() {
        assert_eq!(block_samples(1).len(), 8);
        assert_eq!(block_samples(2).len(), 24);
        assert_eq!(block_samples(3).len(), 48);
        assert!(!block_samples(2).contains(&(0, 0)));
        assert_eq!(block_samples(1)[0], (-1, -1));
    }

    #[test]
    fn dense3x3_bit_order() {
        // Only the pixel to the right of the centre is brighter
        let mut img = Gray::<u8>::filled(3, 3, 10);
        img.put(2, 1, 20);

        let census = dense3x3(img.view(), CensusBorder::Skip);
        assert_eq!(census.get(1, 1), 0b0001_0000);
        assert_eq!(census.get(0, 0), 0);
    }

    #[test]
    fn zero_border_fills_edges() {
        let img = Gray::from_fn(4, 4, |x, y| (1 + x + 4 * y) as u8);

        let skipped = dense3x3(img.view(), CensusBorder::Skip);
        let zeroed = dense3x3(img.view(), CensusBorder::Zero);

        assert_eq!(skipped.get(0, 0), 0);
        // (0,0) = 1: right, below and diagonal neighbours are brighter
        assert_eq!(zeroed.get(0, 0), 0x10 | 0x40 | 0x80);
        assert_eq!(zeroed.get(1, 1), skipped.get(1, 1));
    }

    #[test]
    fn hamming_distances() {
        assert_eq!(0b1011u8.hamming(0b1011), 0);
        assert_eq!(0b1011u8.hamming(0b0001), 2);
        assert_eq!(u64::MAX.hamming(0), 64);

        let mut a = [0u64; 2];
        a.set_bit(3);
        a.set_bit(70);
        assert_eq!(a[1], 1 << 6);
        assert_eq!(a.hamming(a), 0);
        assert_eq!(a.hamming([0; 2]), 2);
    }

    #[test]
    fn samples_must_fit_code() {
        let img = Gray::<u8>::new(8, 8);
        let res = sample_transform::<u8, u8>(img.view(), &block_samples(2), CensusBorder::Zero);
        assert!(matches!(res, Err(Error::UnsupportedCombination(_))));
    }

    #[test]
    fn wide_codes_match_narrow_codes() {
        let img = Gray::from_fn(9, 7, |x, y| ((x * 37 + y * 11) % 23) as u16);
        let samples = block_samples(2);

        let narrow: Gray<u32> = sample_transform(img.view(), &samples, CensusBorder::Zero).unwrap();
        let wide: Gray<[u64; 2]> = sample_transform(img.view(), &samples, CensusBorder::Zero).unwrap();

        for y in 0..7 {
            for x in 0..9 {
                assert_eq!(narrow.get(x, y) as u64, wide.get(x, y)[0]);
                assert_eq!(wide.get(x, y)[1], 0);
            }
        }
    }
}
