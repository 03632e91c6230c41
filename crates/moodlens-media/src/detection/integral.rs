//! Summed-area tables.

use image::GrayImage;

/// Integral and squared-integral image with a zero top row and left column.
///
/// `sum(x, y, w, h)` is the pixel sum of the rectangle with top-left `(x, y)`.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    stride: usize,
    sum: Vec<u64>,
    sqsum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0u64; stride * (height as usize + 1)];
        let mut sqsum = vec![0u64; stride * (height as usize + 1)];
        let raw = image.as_raw();

        for y in 0..height as usize {
            let mut row_sum = 0u64;
            let mut row_sqsum = 0u64;
            for x in 0..width as usize {
                let v = raw[y * width as usize + x] as u64;
                row_sum += v;
                row_sqsum += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row_sum;
                sqsum[idx] = sqsum[idx - stride] + row_sqsum;
            }
        }

        Self {
            width,
            height,
            stride,
            sum,
            sqsum,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn rect(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] + table[y0 * stride + x0] - table[y1 * stride + x0] - table[y0 * stride + x1]
    }

    /// Pixel sum over a rectangle. The rectangle must lie inside the image.
    #[inline]
    pub fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        debug_assert!(x + w <= self.width && y + h <= self.height);
        Self::rect(&self.sum, self.stride, x, y, w, h)
    }

    /// Sum of squared pixels over a rectangle.
    #[inline]
    pub fn sqsum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        debug_assert!(x + w <= self.width && y + h <= self.height);
        Self::rect(&self.sqsum, self.stride, x, y, w, h)
    }
}
