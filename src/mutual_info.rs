//! # Stereo mutual information
//!
//! Measures how well the intensities of a left and right image predict each other at the
//! correspondences given by an existing disparity map. The joint histogram of
//! `(left[x, y], right[x - d, y])` over every pixel with a valid disparity is normalised into a
//! joint probability, from which the marginal probabilities of each image follow.
//!
//! Two results are derived from the probabilities:
//!
//! - the Shannon entropies of the left, right and joint distributions, and their mutual information
//!   `H(L) + H(R) - H(L, R)`,
//! - a per intensity pair cost table in the manner of Hirschmüller's semi-global matching, where
//!   each entropy term is `-ln(P * g) * g` for a Gaussian kernel `g`. Pairs which are likely to
//!   correspond have a low cost.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, warn};

use crate::error::*;
use crate::gray::{ImageView, Pixel};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Smallest probability passed to the logarithm.
const PROB_FLOOR: f64 = 1e-7;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Pixels whose intensity can be placed in a histogram.
pub trait IntensityPixel: Pixel {
    fn intensity(self) -> u32;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StereoMutualInformation {
    /// Largest intensity a pixel can have.
    max_intensity: u32,
    bins: usize,
    /// Normalised Gaussian smoothing kernel, `2 * radius + 1` taps.
    kernel: Vec<f64>,

    /// Joint histogram, left intensity bins are rows.
    hist_joint: Vec<u32>,
    total: u64,
    prob_joint: Vec<f64>,
    prob_left: Vec<f64>,
    prob_right: Vec<f64>,

    entropy_left: Vec<f64>,
    entropy_right: Vec<f64>,
    entropy_joint: Vec<f64>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl IntensityPixel for u8 {
    #[inline]
    fn intensity(self) -> u32 {
        self as u32
    }
}

impl IntensityPixel for u16 {
    #[inline]
    fn intensity(self) -> u32 {
        self as u32
    }
}

impl Default for StereoMutualInformation {
    /// Histogram of 8-bit intensities with a smoothing radius of 3.
    fn default() -> Self {
        let mut mi = Self {
            max_intensity: 255,
            bins: 0,
            kernel: Vec::new(),
            hist_joint: Vec::new(),
            total: 0,
            prob_joint: Vec::new(),
            prob_left: Vec::new(),
            prob_right: Vec::new(),
            entropy_left: Vec::new(),
            entropy_right: Vec::new(),
            entropy_joint: Vec::new()
        };
        mi.resize(256);
        mi.configure_smoothing(3);
        mi
    }
}

impl StereoMutualInformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest intensity of the input images and the number of histogram bins.
    pub fn configure_histogram(&mut self, max_intensity: u32, bins: usize) -> Result<()> {
        if max_intensity == 0 || bins == 0 {
            return Err(Error::InvalidConfig(format!(
                "histogram needs max_intensity > 0 and bins > 0, got {} and {}",
                max_intensity, bins
            )));
        }

        self.max_intensity = max_intensity;
        self.resize(bins);
        Ok(())
    }

    /// Set the radius of the Gaussian kernel used to smooth the entropy tables.
    ///
    /// A radius of zero disables smoothing.
    pub fn configure_smoothing(&mut self, radius: usize) {
        self.kernel = gaussian_kernel(radius);
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn max_intensity(&self) -> u32 {
        self.max_intensity
    }

    fn resize(&mut self, bins: usize) {
        self.bins = bins;
        self.hist_joint = vec![0; bins * bins];
        self.total = 0;
        self.prob_joint = vec![0.0; bins * bins];
        self.prob_left = vec![0.0; bins];
        self.prob_right = vec![0.0; bins];
        self.entropy_left = vec![0.0; bins];
        self.entropy_right = vec![0.0; bins];
        self.entropy_joint = vec![0.0; bins * bins];
    }

    /// Histogram bin of a raw intensity.
    ///
    /// Intensities at or above the configured maximum fall in the last bin.
    pub fn bin(&self, intensity: u32) -> usize {
        let scaled = self.bins as u64 * intensity as u64 / self.max_intensity as u64;
        (scaled as usize).min(self.bins - 1)
    }

    /// Build the statistics of `left` and `right` at the correspondences in `disparity`.
    ///
    /// Pixels whose disparity equals `invalid`, or which would read outside the right image, are
    /// skipped. Sub-images are rejected.
    pub fn process<T: IntensityPixel>(
        &mut self,
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        disparity: ImageView<'_, u8>,
        invalid: u8
    ) -> Result<()> {
        if left.is_subimage() || right.is_subimage() || disparity.is_subimage() {
            return Err(Error::SubImage("mutual information"));
        }

        let dims = (left.width(), left.height());
        for other in [(right.width(), right.height()), (disparity.width(), disparity.height())].iter() {
            if *other != dims {
                return Err(Error::DimensionMismatch {
                    left: dims,
                    right: *other
                });
            }
        }

        self.compute_joint_histogram(left, right, disparity, invalid);
        self.compute_probabilities();
        self.compute_entropy();

        debug!(
            "Mutual information over {} correspondences: {:.4} nats",
            self.total,
            self.mutual_information()
        );

        Ok(())
    }

    fn compute_joint_histogram<T: IntensityPixel>(
        &mut self,
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        disparity: ImageView<'_, u8>,
        invalid: u8
    ) {
        let n = self.bins;
        for h in self.hist_joint.iter_mut() {
            *h = 0;
        }
        self.total = 0;

        for y in 0..left.height() {
            let (l_row, r_row, d_row) = (left.row(y), right.row(y), disparity.row(y));

            for (x, (&l, &d)) in l_row.iter().zip(d_row).enumerate() {
                let d = d as usize;
                if d == invalid as usize || d > x {
                    continue;
                }

                let l_bin = self.bin(l.intensity());
                let r_bin = self.bin(r_row[x - d].intensity());
                self.hist_joint[l_bin * n + r_bin] += 1;
                self.total += 1;
            }
        }

        if self.total == 0 {
            warn!("No valid correspondences, mutual information is zero");
        }
    }

    fn compute_probabilities(&mut self) {
        let n = self.bins;
        let total = self.total.max(1) as f64;

        for (p, &h) in self.prob_joint.iter_mut().zip(self.hist_joint.iter()) {
            *p = h as f64 / total;
        }

        for v in self.prob_left.iter_mut().chain(self.prob_right.iter_mut()) {
            *v = 0.0;
        }

        for (row, probs) in self.prob_joint.chunks(n).enumerate() {
            let mut sum_row = 0.0;
            for (col, &v) in probs.iter().enumerate() {
                sum_row += v;
                self.prob_right[col] += v;
            }
            self.prob_left[row] = sum_row;
        }
    }

    /// Fill the smoothed entropy tables, `-ln(P * g) * g`.
    fn compute_entropy(&mut self) {
        let n = self.bins;

        entropy_1d(&self.prob_left, &self.kernel, &mut self.entropy_left);
        entropy_1d(&self.prob_right, &self.kernel, &mut self.entropy_right);

        let mut smoothed = vec![0.0; n * n];
        smooth_2d(&self.prob_joint, n, &self.kernel, &mut smoothed);
        for v in smoothed.iter_mut() {
            *v = -v.max(PROB_FLOOR).ln();
        }
        smooth_2d(&smoothed, n, &self.kernel, &mut self.entropy_joint);
    }

    /// Number of correspondences in the histogram.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count of correspondences with the given left and right intensity bins.
    pub fn joint_count(&self, left_bin: usize, right_bin: usize) -> u32 {
        self.hist_joint[left_bin * self.bins + right_bin]
    }

    pub fn prob_joint(&self, left_bin: usize, right_bin: usize) -> f64 {
        self.prob_joint[left_bin * self.bins + right_bin]
    }

    pub fn prob_left(&self) -> &[f64] {
        &self.prob_left
    }

    pub fn prob_right(&self) -> &[f64] {
        &self.prob_right
    }

    /// Shannon entropy of the left intensities, in nats.
    pub fn entropy_left(&self) -> f64 {
        shannon(&self.prob_left)
    }

    pub fn entropy_right(&self) -> f64 {
        shannon(&self.prob_right)
    }

    pub fn entropy_joint(&self) -> f64 {
        shannon(&self.prob_joint)
    }

    /// `H(L) + H(R) - H(L, R)`, in nats.
    pub fn mutual_information(&self) -> f64 {
        self.entropy_left() + self.entropy_right() - self.entropy_joint()
    }

    /// Matching cost of a pair of raw intensities.
    ///
    /// The negated mutual information of the pair, lower is a better match.
    pub fn cost(&self, left: u32, right: u32) -> f64 {
        let (l, r) = (self.bin(left), self.bin(right));
        self.entropy_joint[l * self.bins + r] - self.entropy_left[l] - self.entropy_right[r]
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Normalised Gaussian kernel of the given radius.
fn gaussian_kernel(radius: usize) -> Vec<f64> {
    if radius == 0 {
        return vec![1.0];
    }

    let sigma = (2.0 * radius as f64 + 1.0) / 5.0;
    let r = radius as isize;
    let mut kernel: Vec<f64> = (-r..=r)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Convolve `input` with `kernel`, renormalising where the kernel overhangs the ends.
fn convolve_1d(input: &[f64], kernel: &[f64], out: &mut [f64]) {
    let n = input.len() as isize;
    let r = (kernel.len() / 2) as isize;

    for (i, o) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for (k, &w) in kernel.iter().enumerate() {
            let j = i as isize + k as isize - r;
            if j >= 0 && j < n {
                sum += w * input[j as usize];
                weight += w;
            }
        }
        *o = sum / weight;
    }
}

/// Separable convolution of a square `n` by `n` table.
fn smooth_2d(input: &[f64], n: usize, kernel: &[f64], out: &mut [f64]) {
    let mut rows = vec![0.0; n * n];
    for (src, dst) in input.chunks(n).zip(rows.chunks_mut(n)) {
        convolve_1d(src, kernel, dst);
    }

    let mut col = vec![0.0; n];
    let mut col_out = vec![0.0; n];
    for x in 0..n {
        for y in 0..n {
            col[y] = rows[y * n + x];
        }
        convolve_1d(&col, kernel, &mut col_out);
        for y in 0..n {
            out[y * n + x] = col_out[y];
        }
    }
}

fn entropy_1d(prob: &[f64], kernel: &[f64], out: &mut [f64]) {
    let mut smoothed = vec![0.0; prob.len()];
    convolve_1d(prob, kernel, &mut smoothed);
    for v in smoothed.iter_mut() {
        *v = -v.max(PROB_FLOOR).ln();
    }
    convolve_1d(&smoothed, kernel, out);
}

fn shannon(prob: &[f64]) -> f64 {
    -prob
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.ln())
        .sum::<f64>()
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
