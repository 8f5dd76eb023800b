use anyhow::{Result, bail};
use mc_core::config::TransformConfig;
use mc_core::frame::Frame;
use mc_core::modality::Modality;
use mc_core::traits::FrameTransform;
use ndarray::{Array4, ArrayD};

use crate::resize::Resizer;

/// Resize every frame, scale to [0, 1], normalize per channel.
///
/// Output `[N, 3, H, W]`, one plane per color channel.
///
/// # Example
/// ```
/// use mc_core::config::TransformConfig;
/// use mc_core::frame::Frame;
/// use mc_core::modality::Modality;
/// use mc_core::traits::FrameTransform;
/// use mc_source::transform::ResizeNormalize;
///
/// let t = ResizeNormalize::from_config(&TransformConfig { width: 8, height: 4, ..Default::default() });
/// let out = t.apply(Modality::Rgb, &[Frame::new(16, 16), Frame::new(10, 10)]).unwrap();
/// assert_eq!(out.shape(), &[2, 3, 4, 8]);
/// ```
#[derive(Clone, Debug)]
pub struct ResizeNormalize {
    width: u32,
    height: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ResizeNormalize {
    /// Build from the `[transform]` settings.
    #[must_use]
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            mean: config.mean,
            std: config.std,
        }
    }
}

impl FrameTransform for ResizeNormalize {
    fn apply(&self, modality: Modality, frames: &[Frame]) -> Result<ArrayD<f32>> {
        if frames.is_empty() {
            bail!("Aucune frame à transformer pour {modality}");
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = Array4::<f32>::zeros((frames.len(), 3, h, w));
        let mut resizer = Resizer::new();
        let mut scaled = Frame::new(self.width, self.height);

        for (n, frame) in frames.iter().enumerate() {
            resizer.resize_into(frame, &mut scaled)?;
            for (i, px) in scaled.data.chunks_exact(3).enumerate() {
                let (y, x) = (i / w, i % w);
                for (c, &v) in px.iter().enumerate() {
                    out[[n, c, y, x]] = (f32::from(v) / 255.0 - self.mean[c]) / self.std[c];
                }
            }
        }
        Ok(out.into_dyn())
    }
}
