use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use mc_core::config::DatasetConfig;
use mc_core::error::CoreError;
use mc_core::frame::Frame;
use mc_core::modality::Modality;
use mc_core::record::Record;
use mc_core::template::FrameTemplate;
use mc_core::traits::FrameLoader;

/// Décode une image en frame RGB.
///
/// # Errors
/// Returns an error if the image cannot be loaded.
///
/// # Example
/// ```no_run
/// use mc_source::image::load_image;
/// use std::path::Path;
/// let frame = load_image(Path::new("img_0000000001.jpg")).unwrap();
/// ```
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path).with_context(|| format!("Impossible de charger {}", path.display()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame {
        data: rgb.into_raw(),
        width,
        height,
    })
}

/// Highest frame index in `dir` whose file name matches `tmpl`.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn max_frame_index(dir: &Path, tmpl: &FrameTemplate) -> Result<Option<usize>> {
    let mut max = None;
    for entry in fs::read_dir(dir).with_context(|| format!("Impossible de lire {}", dir.display()))? {
        let entry = entry?;
        if let Some(idx) = entry.file_name().to_str().and_then(|n| tmpl.parse_index(n)) {
            max = max.max(Some(idx));
        }
    }
    Ok(max)
}

/// Load frame `index` from `dir`.
///
/// If the file is missing and `index` lies past the last frame on disk, the
/// last frame is returned instead. A hole inside the sequence is an error.
///
/// # Errors
/// Returns [`CoreError::FileNotFound`] for a missing frame with no fallback,
/// or any decoding error.
pub fn load_frame(dir: &Path, tmpl: &FrameTemplate, index: usize) -> Result<Frame> {
    load_frame_or_last(dir, tmpl, index, || max_frame_index(dir, tmpl))
}

/// [`load_frame`] with the last index supplied by `last`, called only on a miss.
fn load_frame_or_last(
    dir: &Path,
    tmpl: &FrameTemplate,
    index: usize,
    last: impl FnOnce() -> Result<Option<usize>>,
) -> Result<Frame> {
    let path = dir.join(tmpl.format(index));
    if path.is_file() {
        return load_image(&path);
    }
    match last()? {
        Some(last) if index > last => {
            log::warn!(
                "Frame {} absente, repli sur la dernière ({last})",
                path.display()
            );
            load_image(&dir.join(tmpl.format(last)))
        }
        _ => Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into()),
    }
}

/// Reads extracted frames laid out as `<data_path>/<video_name>/<tmpl>`.
///
/// Only image modalities (RGB, RGBDiff) have a loader. The last frame index
/// of a video folder is scanned once, on its first miss, then reused.
///
/// # Example
/// ```
/// use mc_core::config::DatasetConfig;
/// use mc_source::image::ImageFolderLoader;
/// let loader = ImageFolderLoader::from_config(&DatasetConfig::default());
/// assert_eq!(loader.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ImageFolderLoader {
    sources: BTreeMap<Modality, (PathBuf, FrameTemplate)>,
    last_frames: Mutex<HashMap<(Modality, PathBuf), Option<usize>>>,
}

impl ImageFolderLoader {
    /// Loader with no modality.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the frame root and template of `modality`.
    #[must_use]
    pub fn with_source(mut self, modality: Modality, data_path: PathBuf, tmpl: FrameTemplate) -> Self {
        self.sources.insert(modality, (data_path, tmpl));
        self
    }

    /// Loader for every image modality configured in `config`.
    #[must_use]
    pub fn from_config(config: &DatasetConfig) -> Self {
        config
            .modality
            .iter()
            .filter(|(m, _)| m.is_image())
            .fold(Self::new(), |loader, (m, c)| {
                loader.with_source(*m, c.data_path.clone(), c.tmpl.clone())
            })
    }

    /// Number of registered modalities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// `true` if no modality is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FrameLoader for ImageFolderLoader {
    fn load(&self, modality: Modality, record: &Record, index: usize) -> Result<Vec<Frame>> {
        if !modality.is_image() {
            return Err(CoreError::UnsupportedModality { modality }.into());
        }
        let (data_path, tmpl) = self
            .sources
            .get(&modality)
            .ok_or_else(|| CoreError::Config(format!("aucun dossier de frames pour {modality}")))?;
        let dir = data_path.join(record.video_name());
        let frame = load_frame_or_last(&dir, tmpl, record.start_frame() + index, || {
            self.last_frame(modality, &dir, tmpl)
        })
        .with_context(|| format!("uid {} : frame {index} ({modality})", record.uid()))?;
        Ok(vec![frame])
    }
}

impl ImageFolderLoader {
    fn last_frame(&self, modality: Modality, dir: &Path, tmpl: &FrameTemplate) -> Result<Option<usize>> {
        let key = (modality, dir.to_path_buf());
        let cached = self
            .last_frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();
        if let Some(last) = cached {
            return Ok(last);
        }
        let last = max_frame_index(dir, tmpl)?;
        self.last_frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, last);
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn tmpl() -> FrameTemplate {
        "img_{:05d}.png".parse().unwrap()
    }

    /// Writes frames `indices` into `<root>/vid`, pixel value = index.
    fn write_frames(root: &Path, indices: &[usize]) -> PathBuf {
        let dir = root.join("vid");
        fs::create_dir_all(&dir).unwrap();
        for &i in indices {
            let img = RgbImage::from_pixel(4, 3, Rgb([i as u8, 0, 0]));
            img.save(dir.join(tmpl().format(i))).unwrap();
        }
        dir
    }

    fn record(start: usize) -> Record {
        Record::builder(1, "vid")
            .start_frame(start)
            .num_frames(Modality::Rgb, 30)
            .build()
            .unwrap()
    }

    #[test]
    fn loads_frame_offset_by_start() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[10, 11, 12]);
        let loader = ImageFolderLoader::new().with_source(Modality::Rgb, tmp.path().to_path_buf(), tmpl());
        let frames = loader.load(Modality::Rgb, &record(10), 2).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].width, frames[0].height), (4, 3));
        assert_eq!(frames[0].pixel(0, 0), (12, 0, 0));
    }

    #[test]
    fn index_past_the_end_falls_back_to_last_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_frames(tmp.path(), &[1, 2, 3]);
        fs::write(dir.join("notes.txt"), "x").unwrap();
        let frame = load_frame(&dir, &tmpl(), 9).unwrap();
        assert_eq!(frame.pixel(0, 0), (3, 0, 0));
        assert_eq!(max_frame_index(&dir, &tmpl()).unwrap(), Some(3));
    }

    #[test]
    fn loader_scans_each_folder_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_frames(tmp.path(), &[1, 2, 3]);
        let loader = ImageFolderLoader::new().with_source(Modality::Rgb, tmp.path().to_path_buf(), tmpl());
        let first = loader.load(Modality::Rgb, &record(0), 9).unwrap();
        assert_eq!(first[0].pixel(0, 0), (3, 0, 0));

        // A frame added after the first miss is not seen by this loader.
        RgbImage::from_pixel(4, 3, Rgb([5, 0, 0]))
            .save(dir.join(tmpl().format(5)))
            .unwrap();
        let again = loader.load(Modality::Rgb, &record(0), 9).unwrap();
        assert_eq!(again[0].pixel(0, 0), (3, 0, 0));
        assert_eq!(load_frame(&dir, &tmpl(), 9).unwrap().pixel(0, 0), (5, 0, 0));
    }

    #[test]
    fn hole_inside_the_sequence_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_frames(tmp.path(), &[1, 3]);
        let err = load_frame(&dir, &tmpl(), 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::FileNotFound { .. })
        ));
    }

    #[test]
    fn empty_folder_has_no_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_frames(tmp.path(), &[]);
        assert!(load_frame(&dir, &tmpl(), 0).is_err());
    }

    #[test]
    fn non_image_modality_is_unsupported() {
        let loader = ImageFolderLoader::new();
        let err = loader.load(Modality::Flow, &record(0), 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::UnsupportedModality { modality: Modality::Flow })
        ));
    }
}
