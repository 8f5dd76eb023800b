use anyhow::{Context, Result};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer as FirResizer};
use mc_core::frame::Frame;

/// Bilinear RGB frame scaler.
///
/// Keeps the fast_image_resize state between calls; one instance per thread.
///
/// # Example
/// ```
/// use mc_core::frame::Frame;
/// use mc_source::resize::Resizer;
///
/// let mut r = Resizer::new();
/// let small = r.resize(&Frame::new(64, 48), 16, 12).unwrap();
/// assert_eq!((small.width, small.height), (16, 12));
/// ```
pub struct Resizer {
    inner: FirResizer,
    options: ResizeOptions,
}

impl Resizer {
    /// Bilinear convolution resizer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: FirResizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        }
    }

    /// Scale `src` into `dst`, whose dimensions give the output size.
    ///
    /// # Errors
    /// Returns an error if a buffer length does not match its dimensions.
    pub fn resize_into(&mut self, src: &Frame, dst: &mut Frame) -> Result<()> {
        if (src.width, src.height) == (dst.width, dst.height) {
            dst.data.copy_from_slice(&src.data);
            return Ok(());
        }
        let src_view = ImageRef::new(src.width, src.height, &src.data, PixelType::U8x3)
            .with_context(|| format!("Frame source {}×{} incohérente", src.width, src.height))?;
        let mut dst_view = Image::from_slice_u8(dst.width, dst.height, &mut dst.data, PixelType::U8x3)
            .with_context(|| format!("Frame cible {}×{} incohérente", dst.width, dst.height))?;
        self.inner
            .resize(&src_view, &mut dst_view, Some(&self.options))
            .context("Redimensionnement échoué")
    }

    /// Scale `src` to a new `width × height` frame.
    ///
    /// # Errors
    /// Same as [`Self::resize_into`].
    pub fn resize(&mut self, src: &Frame, width: u32, height: u32) -> Result<Frame> {
        let mut dst = Frame::new(width, height);
        self.resize_into(src, &mut dst)?;
        Ok(dst)
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let mut f = Frame::new(width, height);
        for px in f.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
        f
    }

    #[test]
    fn uniform_color_survives_resize() {
        let dst = Resizer::new().resize(&filled(16, 12, [200, 100, 50]), 5, 7).unwrap();
        let (r, g, b) = dst.pixel(2, 3);
        assert!(r.abs_diff(200) <= 1 && g.abs_diff(100) <= 1 && b.abs_diff(50) <= 1);
    }

    #[test]
    fn same_size_is_a_copy() {
        let mut src = Frame::new(3, 2);
        src.data[4] = 9;
        let dst = Resizer::new().resize(&src, 3, 2).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let mut src = Frame::new(8, 8);
        src.data.truncate(10);
        assert!(Resizer::new().resize(&src, 4, 4).is_err());
    }
}
