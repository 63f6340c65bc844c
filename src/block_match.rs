//! # Block matching
//!
//! Dense disparity by comparing regions of the left image against horizontally shifted regions of
//! the right image. Region scores come from the [`BlockAggregator`] and each pixel's disparity is
//! picked by the [`DisparitySelector`].
//!
//! The rows which receive a disparity are split into contiguous partitions, each processed on
//! rayon's pool with its own scratch memory and its own disjoint slice of the output map. Every
//! output row is computed the same way whichever partition it falls in, so the map does not
//! depend on the partition count.
//!
//! Pixels closer to the image edge than the region border, plus `min_disparity` extra columns on
//! the left, are always invalid.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::Range;

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::aggregate::BlockAggregator;
use crate::census::{self, CensusBorder};
use crate::config::{DisparityConfig, ErrorMetric};
use crate::disparity::{DisparityAlgorithm, DisparityData, DisparityKind, DisparityMap};
use crate::error::*;
use crate::gray::{DynImage, Gray, ImageView, PixelKind};
use crate::parallel;
use crate::score::{CensusHamming, RowScorer, Sad, SadPixel, Score};
use crate::select::{DisparityOutput, DisparitySelector};

#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Block matching disparity algorithm.
#[derive(Debug, Clone)]
pub struct BlockMatch {
    config: DisparityConfig,
    selector: DisparitySelector,
    partitions: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BlockMatch {
    /// Create a new instance of the algorithm, validating the configuration.
    ///
    /// The rows are split into one partition per thread of the current rayon pool.
    pub fn new(config: DisparityConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            selector: DisparitySelector::new(&config),
            config,
            partitions: parallel::current_threads()
        })
    }

    /// Set the number of row partitions processed in parallel.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn config(&self) -> &DisparityConfig {
        &self.config
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Storage type of the maps this instance produces.
    pub fn output_kind(&self) -> DisparityKind {
        match self.config.subpixel {
            true => DisparityKind::F32,
            false => DisparityKind::U8
        }
    }

    /// Columns and rows at each image edge which are always invalid, not counting the extra
    /// `min_disparity` columns on the left.
    pub fn border(&self) -> (usize, usize) {
        self.config.border()
    }

    /// Smallest image which has at least one valid pixel.
    pub fn min_size(&self) -> (usize, usize) {
        let (bx, by) = self.border();
        (2 * bx + self.config.min_disparity as usize + 1, 2 * by + 1)
    }

    /// Compute the disparity of `left` against `right`, writing into `map`.
    ///
    /// The map is reshaped to the size of the input. Its storage type must agree with the
    /// `subpixel` setting.
    pub fn process_into(
        &self,
        left: &DynImage,
        right: &DynImage,
        map: &mut DisparityMap
    ) -> Result<()> {
        match (left, right) {
            (DynImage::U8(l), DynImage::U8(r)) => self.process_view_into(l.view(), r.view(), map),
            (DynImage::U16(l), DynImage::U16(r)) => self.process_view_into(l.view(), r.view(), map),
            (DynImage::S16(l), DynImage::S16(r)) => self.process_view_into(l.view(), r.view(), map),
            (DynImage::F32(l), DynImage::F32(r)) => self.process_view_into(l.view(), r.view(), map),
            _ => Err(Error::PixelKindMismatch {
                left: left.kind(),
                right: right.kind()
            })
        }
    }

    /// Compute the disparity of a pair of image views, which may be sub-images.
    pub fn process_view_into<T: SadPixel>(
        &self,
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        map: &mut DisparityMap
    ) -> Result<()> {
        let (width, height) = (left.width(), left.height());
        if (width, height) != (right.width(), right.height()) {
            return Err(Error::DimensionMismatch {
                left: (width, height),
                right: (right.width(), right.height())
            });
        }

        let (min_width, min_height) = self.min_size();
        if width < min_width || height < min_height {
            return Err(Error::ImageTooSmall {
                width,
                height,
                min_width,
                min_height
            });
        }

        if map.kind() != self.output_kind() {
            return Err(Error::UnsupportedCombination(format!(
                "a {:?} disparity map can't hold the output of subpixel = {}",
                map.kind(), self.config.subpixel
            )));
        }

        if self.config.error_metric == ErrorMetric::Census && T::KIND == PixelKind::F32 {
            return Err(Error::UnsupportedCombination(
                "census error requires integer input images".into()
            ));
        }

        debug!(
            "Block matching {}x{} {:?} images, disparity {}..={}, {:?} {:?} region ({}, {})",
            width, height, T::KIND,
            self.config.min_disparity, self.config.max_disparity,
            self.config.shape, self.config.error_metric,
            self.config.region_radius_x, self.config.region_radius_y
        );

        map.reset(
            width,
            height,
            self.config.min_disparity as u32,
            self.config.max_disparity as u32
        );

        match self.config.error_metric {
            ErrorMetric::Sad => self.run(&Sad::<T>::new(), left, right, map),
            ErrorMetric::Census => self.run_census(left, right, map)
        }
    }

    /// Census transform both images with the configured radius, then match the codes.
    fn run_census<T: SadPixel>(
        &self,
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        map: &mut DisparityMap
    ) -> Result<()> {
        let border = CensusBorder::Zero;

        match self.config.census_radius {
            1 => {
                let (l, r) = (census::dense3x3(left, border), census::dense3x3(right, border));
                self.run(&CensusHamming::<u8>::new(), l.view(), r.view(), map)
            },
            2 => {
                let (l, r) = (census::dense5x5(left, border), census::dense5x5(right, border));
                self.run(&CensusHamming::<u32>::new(), l.view(), r.view(), map)
            },
            3 => {
                let (l, r) = census_pair::<T, u64>(left, right, 3, border)?;
                self.run(&CensusHamming::<u64>::new(), l.view(), r.view(), map)
            },
            radius => {
                let (l, r) = census_pair::<T, [u64; 2]>(left, right, radius as usize, border)?;
                self.run(&CensusHamming::<[u64; 2]>::new(), l.view(), r.view(), map)
            }
        }
    }

    fn run<R: RowScorer>(
        &self,
        scorer: &R,
        left: ImageView<'_, R::Input>,
        right: ImageView<'_, R::Input>,
        map: &mut DisparityMap
    ) -> Result<()> {
        check_score_range::<R>(&self.config)?;

        match map.data_mut() {
            DisparityData::U8(out) => self.fill_rows(scorer, left, right, out),
            DisparityData::F32(out) => self.fill_rows(scorer, left, right, out)
        }
        Ok(())
    }

    /// Compute every valid row of `out`, one rayon task per partition.
    fn fill_rows<R: RowScorer, O: DisparityOutput>(
        &self,
        scorer: &R,
        left: ImageView<'_, R::Input>,
        right: ImageView<'_, R::Input>,
        out: &mut Gray<O>
    ) {
        let aggregator = BlockAggregator::new(&self.config, left.width());
        let selector = &self.selector;

        let (_, border_y) = aggregator.border();
        let rows = border_y..(left.height() - border_y);

        if self.partitions > rows.len() {
            warn!(
                "{} partitions requested for {} rows, using one row per partition",
                self.partitions, rows.len()
            );
        }
        let partitions = parallel::partition_rows(rows.clone(), self.partitions);

        // Hand each partition a disjoint run of output rows
        let mut out_rows: Vec<&mut [O]> = out.rows_mut().skip(rows.start).take(rows.len()).collect();
        let mut rest = &mut out_rows[..];
        let mut tasks: Vec<(Range<usize>, &mut [&mut [O]])> = Vec::with_capacity(partitions.len());
        for range in partitions {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            tasks.push((range, head));
            rest = tail;
        }

        tasks.into_par_iter().for_each(|(range, chunk)| {
            trace!("Partition rows {:?}", range);

            let first = range.start;
            let mut ws = aggregator.workspace::<R::Score>();
            aggregator.process_rows(scorer, left, right, range, &mut ws, |y, scores, column| {
                selector.select_row(scores, column, &mut *chunk[y - first]);
            });
        });
    }

    /// Plot the number of valid disparities in each row of `map`.
    #[cfg(feature = "statistics")]
    fn plot_valid_rows(&self, map: &DisparityMap) -> Result<()> {
        let plot_err = |e: &dyn std::fmt::Display| Error::Plotting(e.to_string());

        std::fs::create_dir_all("plots/block_match")?;

        let counts = map.valid_per_row();
        let valid_rows = BitMapBackend::new(
            "plots/block_match/valid_per_row.png",
            (800, 600)
        ).into_drawing_area();
        valid_rows.fill(&WHITE).map_err(|e| plot_err(&e))?;

        let mut chart = ChartBuilder::on(&valid_rows)
            .caption("Valid disparities per row", ("sans-serif", 20).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_ranged(0..map.height(), 0..map.width() + 1)
            .map_err(|e| plot_err(&e))?;

        chart.configure_mesh().draw().map_err(|e| plot_err(&e))?;

        chart
            .draw_series(LineSeries::new(
                counts.into_iter().enumerate(),
                &RED
            ))
            .map_err(|e| plot_err(&e))?;

        debug!("Stats plotting complete");
        Ok(())
    }
}

impl DisparityAlgorithm for BlockMatch {
    /// Compute the disparity map for the given pair.
    fn compute(&mut self, left: &DynImage, right: &DynImage) -> Result<DisparityMap> {
        let mut map = DisparityMap::new(
            self.output_kind(),
            0,
            0,
            self.config.min_disparity as u32,
            self.config.max_disparity as u32
        )?;
        self.process_into(left, right, &mut map)?;

        #[cfg(feature = "statistics")]
        self.plot_valid_rows(&map)?;

        Ok(map)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Fail if the region sums of `R` could exceed what its score type holds.
pub(crate) fn check_score_range<R: RowScorer>(config: &DisparityConfig) -> Result<()> {
    if let (Some(cost), Some(limit)) = (R::MAX_COST, <R::Score as Score>::SUM_LIMIT) {
        let worst = config.max_score(cost);
        if worst > limit {
            return Err(Error::UnsupportedCombination(format!(
                "region ({}, {}) can sum to {}, above the score limit of {}",
                config.region_radius_x, config.region_radius_y, worst, limit
            )));
        }
    }
    Ok(())
}

/// Census transform a pair of images with a square sampling block of the given radius.
fn census_pair<T: SadPixel, C: census::CensusCode>(
    left: ImageView<'_, T>,
    right: ImageView<'_, T>,
    radius: usize,
    border: CensusBorder
) -> Result<(Gray<C>, Gray<C>)> {
    let samples = census::block_samples(radius);

    Ok((
        census::sample_transform(left, &samples, border)?,
        census::sample_transform(right, &samples, border)?
    ))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockShape;

    fn gradient(width: usize, height: usize, shift: usize) -> Gray<u8> {
        Gray::from_fn(width, height, |x, y| ((x + shift) * 3 + y) as u8)
    }

    fn noise(u: usize, y: usize) -> u8 {
        let mut h = ((u as u64) << 32) | y as u64;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;
        (h & 0xff) as u8
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let bm = BlockMatch::new(DisparityConfig::default()).unwrap();
        let mut map = DisparityMap::new(DisparityKind::U8, 0, 0, 0, 40).unwrap();

        let a = DynImage::from(gradient(60, 30, 0));
        let b = DynImage::from(gradient(61, 30, 0));
        assert!(matches!(bm.process_into(&a, &b, &mut map), Err(Error::DimensionMismatch { .. })));

        let c = DynImage::from(Gray::<u16>::new(60, 30));
        assert!(matches!(bm.process_into(&a, &c, &mut map), Err(Error::PixelKindMismatch { .. })));

        let small = DynImage::from(gradient(6, 30, 0));
        assert!(matches!(bm.process_into(&small, &small, &mut map), Err(Error::ImageTooSmall { .. })));
    }

    #[test]
    fn rejects_wrong_map_kind() {
        let bm = BlockMatch::new(DisparityConfig {
            subpixel: true,
            ..Default::default()
        }).unwrap();
        let img = DynImage::from(gradient(60, 30, 0));

        let mut map = DisparityMap::new(DisparityKind::U8, 0, 0, 0, 40).unwrap();
        assert!(matches!(
            bm.process_into(&img, &img, &mut map),
            Err(Error::UnsupportedCombination(_))
        ));
    }

    #[test]
    fn rejects_census_on_float() {
        let bm = BlockMatch::new(DisparityConfig {
            error_metric: ErrorMetric::Census,
            ..Default::default()
        }).unwrap();
        let img = DynImage::from(Gray::<f32>::new(60, 30));

        let mut map = DisparityMap::new(DisparityKind::U8, 0, 0, 0, 40).unwrap();
        assert!(matches!(
            bm.process_into(&img, &img, &mut map),
            Err(Error::UnsupportedCombination(_))
        ));
    }

    #[test]
    fn reshapes_map_and_marks_borders() {
        let bm = BlockMatch::new(DisparityConfig {
            min_disparity: 2,
            max_disparity: 10,
            region_radius_x: 2,
            region_radius_y: 1,
            ..Default::default()
        }).unwrap();
        let img = DynImage::from(gradient(30, 12, 0));

        let mut map = DisparityMap::new(DisparityKind::U8, 5, 5, 0, 3).unwrap();
        bm.process_into(&img, &img, &mut map).unwrap();

        assert_eq!((map.width(), map.height()), (30, 12));
        assert_eq!(map.invalid_value(), 11);
        for x in 0..30 {
            assert_eq!(map.get(x, 0), None);
            assert_eq!(map.get(x, 11), None);
        }
        for y in 0..12 {
            for x in (0..4).chain(28..30) {
                assert_eq!(map.get(x, y), None);
            }
        }
    }

    #[test]
    fn census_radii_are_dispatched() {
        // left(x) = right(x - 4)
        let left = Gray::from_fn(50, 20, |x, y| noise(x + 6, y));
        let right = Gray::from_fn(50, 20, |x, y| noise(x + 10, y));

        for radius in 1..=5 {
            let bm = BlockMatch::new(DisparityConfig {
                max_disparity: 12,
                region_radius_x: 2,
                region_radius_y: 2,
                validate_rtol: -1,
                texture: 0.0,
                error_metric: ErrorMetric::Census,
                census_radius: radius,
                ..Default::default()
            }).unwrap();

            let mut map = DisparityMap::new(DisparityKind::U8, 0, 0, 0, 12).unwrap();
            bm.process_view_into(left.view(), right.view(), &mut map).unwrap();
            assert_eq!(map.get(25, 10), Some(4.0), "radius {}", radius);
        }
    }

    #[test]
    fn region_sums_must_fit_scores() {
        // 65535 * 183 * 183 overflows an i32
        let wide = DisparityConfig {
            max_disparity: 4,
            region_radius_x: 91,
            region_radius_y: 91,
            ..Default::default()
        };
        assert!(matches!(
            check_score_range::<Sad<u16>>(&wide),
            Err(Error::UnsupportedCombination(_))
        ));
        assert!(check_score_range::<Sad<u8>>(&wide).is_ok());
        assert!(check_score_range::<Sad<f32>>(&wide).is_ok());

        // best five sums three regions
        let five = DisparityConfig {
            region_radius_x: 53,
            region_radius_y: 53,
            shape: BlockShape::BestFive,
            ..wide.clone()
        };
        assert!(check_score_range::<Sad<u16>>(&five).is_err());
        assert!(check_score_range::<Sad<u16>>(&DisparityConfig {
            shape: BlockShape::Rect,
            ..five
        }).is_ok());

        let bm = BlockMatch::new(wide).unwrap();
        let img = Gray::from_fn(200, 200, |x, y| if (x + y) % 2 == 0 { 0u16 } else { 65535 });
        let mut map = DisparityMap::new(DisparityKind::U8, 0, 0, 0, 4).unwrap();
        assert!(matches!(
            bm.process_view_into(img.view(), img.view(), &mut map),
            Err(Error::UnsupportedCombination(_))
        ));
    }
}
