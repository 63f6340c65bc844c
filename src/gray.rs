//! # Grayscale images
//!
//! Owned and borrowed single band images used as the input to the disparity algorithms, together
//! with the closed set of pixel kinds that can be handed to [`crate::compute_disparity`].

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// The scalar types an input image can be made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelKind {
    U8,
    U16,
    S16,
    F32
}

/// An owned input image of any supported pixel kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DynImage {
    U8(Gray<u8>),
    U16(Gray<u16>),
    S16(Gray<i16>),
    F32(Gray<f32>)
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A scalar sample which can be stored in a [`Gray`] image.
pub trait Pixel: Copy + Default + PartialOrd + Send + Sync + std::fmt::Debug + 'static {
    const KIND: PixelKind;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Owned row-major single band image.
///
/// Row `y` starts at `y * stride` in the backing buffer. The stride of an owned image is normally
/// equal to its width but an image can be built around a padded buffer with
/// [`Gray::from_vec_with_stride`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gray<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    stride: usize
}

/// Borrowed view into the pixels of an image.
///
/// Views created with [`ImageView::sub_view`] share the storage of their parent, so their stride
/// is larger than their width. Algorithms index rows through [`ImageView::row`] and never assume
/// contiguous storage unless they say so.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Pixel for u8 {
    const KIND: PixelKind = PixelKind::U8;
}

impl Pixel for u16 {
    const KIND: PixelKind = PixelKind::U16;
}

impl Pixel for i16 {
    const KIND: PixelKind = PixelKind::S16;
}

impl Pixel for f32 {
    const KIND: PixelKind = PixelKind::F32;
}

impl<T: Copy + Default> Gray<T> {
    /// Create a new image with every pixel set to the default value of `T`.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
            stride: width
        }
    }

    /// Wrap a contiguous row-major buffer.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        Self::from_vec_with_stride(width, height, width, data)
    }

    /// Wrap a row-major buffer whose rows are `stride` samples apart.
    pub fn from_vec_with_stride(
        width: usize,
        height: usize,
        stride: usize,
        data: Vec<T>
    ) -> Result<Self> {
        if stride < width {
            return Err(Error::InvalidConfig(format!(
                "stride {} is smaller than the width {}", stride, width
            )));
        }

        let expected = match height {
            0 => 0,
            h => (h - 1) * stride + width
        };
        if data.len() < expected {
            return Err(Error::BufferLength {
                expected,
                actual: data.len()
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride
        })
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F: FnMut(usize, usize) -> T>(width: usize, height: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }

        Self {
            data,
            width,
            height,
            stride: width
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.stride + x]
    }

    pub fn put(&mut self, x: usize, y: usize, val: T) {
        self.data[y * self.stride + x] = val;
    }

    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: T) {
        for y in 0..self.height {
            for v in self.row_mut(y) {
                *v = value;
            }
        }
    }

    /// Change the shape of the image, making the storage contiguous.
    ///
    /// Pixel values are unspecified after a reshape which changes the dimensions.
    pub fn reshape(&mut self, width: usize, height: usize) {
        if self.width == width && self.height == height {
            return;
        }
        self.data.clear();
        self.data.resize(width * height, T::default());
        self.width = width;
        self.height = height;
        self.stride = width;
    }

    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride
        }
    }

    /// Iterate over mutable row slices, top to bottom.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [T]> + '_ {
        let width = self.width;
        self.data
            .chunks_mut(self.stride.max(1))
            .take(self.height)
            .map(move |r| &mut r[..width])
    }
}

impl<'a, T: Copy> ImageView<'a, T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns true if the rows of this view are not stored back to back.
    pub fn is_subimage(&self) -> bool {
        self.stride != self.width
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.stride + x]
    }

    pub fn row(&self, y: usize) -> &'a [T] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Borrow the rectangle `(x, y, width, height)` of this view without copying.
    pub fn sub_view(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Self> {
        if x + width > self.width || y + height > self.height {
            return Err(Error::ImageTooSmall {
                width: self.width,
                height: self.height,
                min_width: x + width,
                min_height: y + height
            });
        }

        let start = y * self.stride + x;
        let end = match height {
            0 => start,
            h => start + (h - 1) * self.stride + width
        };

        Ok(Self {
            data: &self.data[start..end],
            width,
            height,
            stride: self.stride
        })
    }

    /// Copy the view into a new contiguous image.
    pub fn to_owned(&self) -> Gray<T> {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            data.extend_from_slice(self.row(y));
        }

        Gray {
            data,
            width: self.width,
            height: self.height,
            stride: self.width
        }
    }
}

impl DynImage {
    pub fn kind(&self) -> PixelKind {
        match self {
            DynImage::U8(_) => PixelKind::U8,
            DynImage::U16(_) => PixelKind::U16,
            DynImage::S16(_) => PixelKind::S16,
            DynImage::F32(_) => PixelKind::F32
        }
    }

    pub fn width(&self) -> usize {
        match self {
            DynImage::U8(i) => i.width(),
            DynImage::U16(i) => i.width(),
            DynImage::S16(i) => i.width(),
            DynImage::F32(i) => i.width()
        }
    }

    pub fn height(&self) -> usize {
        match self {
            DynImage::U8(i) => i.height(),
            DynImage::U16(i) => i.height(),
            DynImage::S16(i) => i.height(),
            DynImage::F32(i) => i.height()
        }
    }
}

impl From<Gray<u8>> for DynImage {
    fn from(img: Gray<u8>) -> Self {
        DynImage::U8(img)
    }
}

impl From<Gray<u16>> for DynImage {
    fn from(img: Gray<u16>) -> Self {
        DynImage::U16(img)
    }
}

impl From<Gray<i16>> for DynImage {
    fn from(img: Gray<i16>) -> Self {
        DynImage::S16(img)
    }
}

impl From<Gray<f32>> for DynImage {
    fn from(img: Gray<f32>) -> Self {
        DynImage::F32(img)
    }
}

impl From<&GrayImage> for Gray<u8> {
    fn from(img: &GrayImage) -> Self {
        Gray {
            data: img.as_raw().clone(),
            width: img.width() as usize,
            height: img.height() as usize,
            stride: img.width() as usize
        }
    }
}

impl From<&ImageBuffer<Luma<u16>, Vec<u16>>> for Gray<u16> {
    fn from(img: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Self {
        Gray {
            data: img.as_raw().clone(),
            width: img.width() as usize,
            height: img.height() as usize,
            stride: img.width() as usize
        }
    }
}

impl From<&GrayImage> for DynImage {
    fn from(img: &GrayImage) -> Self {
        DynImage::U8(img.into())
    }
}

impl From<&ImageBuffer<Luma<u16>, Vec<u16>>> for DynImage {
    fn from(img: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Self {
        DynImage::U16(img.into())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_view_shares_rows() {
        let img = Gray::from_fn(6, 4, |x, y| (x + 10 * y) as u8);
        let sub = img.view().sub_view(2, 1, 3, 2).unwrap();

        assert!(sub.is_subimage());
        assert_eq!(sub.stride(), 6);
        assert_eq!(sub.row(0), &[12, 13, 14]);
        assert_eq!(sub.row(1), &[22, 23, 24]);
        assert_eq!(sub.get(2, 1), 24);

        let owned = sub.to_owned();
        assert!(!owned.view().is_subimage());
        assert_eq!(owned.row(1), &[22, 23, 24]);
    }

    #[test]
    fn sub_view_out_of_bounds() {
        let img = Gray::<u8>::new(4, 4);
        assert!(img.view().sub_view(2, 2, 3, 1).is_err());
    }

    #[test]
    fn padded_buffer() {
        let data: Vec<u16> = (0..11).collect();
        let img = Gray::from_vec_with_stride(3, 3, 4, data).unwrap();
        assert_eq!(img.row(2), &[8, 9, 10]);

        let short = Gray::from_vec_with_stride(3, 3, 4, vec![0u16; 10]);
        assert!(matches!(short, Err(Error::BufferLength { expected: 11, actual: 10 })));
    }

    #[test]
    fn from_image_buffer() {
        let buf = GrayImage::from_fn(5, 3, |x, y| Luma([(x * y) as u8]));
        let img = DynImage::from(&buf);

        assert_eq!(img.kind(), PixelKind::U8);
        assert_eq!((img.width(), img.height()), (5, 3));
        match img {
            DynImage::U8(g) => assert_eq!(g.get(4, 2), 8),
            _ => unreachable!()
        }
    }
}
