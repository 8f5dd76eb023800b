use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Sensor stream a sample can be drawn from.
///
/// Serialized with the names used in annotation and feature tables
/// (`"RGB"`, `"RGBDiff"`, `"EMG"`, ...).
///
/// # Example
/// ```
/// use mc_core::modality::Modality;
/// let m: Modality = "RGB".parse().unwrap();
/// assert_eq!(m, Modality::Rgb);
/// assert_eq!(m.to_string(), "RGB");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Modality {
    /// Egocentric RGB frames.
    #[serde(rename = "RGB")]
    Rgb,
    /// Difference of consecutive RGB frames, loaded from the RGB frame folder.
    #[serde(rename = "RGBDiff")]
    RgbDiff,
    /// Optical flow.
    #[serde(rename = "Flow")]
    Flow,
    /// Audio spectrogram.
    #[serde(rename = "Spec")]
    Spec,
    /// Event camera.
    #[serde(rename = "Event")]
    Event,
    /// Dual-armband electromyography.
    #[serde(rename = "EMG")]
    Emg,
}

impl Modality {
    /// Every modality, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Rgb,
        Self::RgbDiff,
        Self::Flow,
        Self::Spec,
        Self::Event,
        Self::Emg,
    ];

    /// Table/config name of the modality.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::RgbDiff => "RGBDiff",
            Self::Flow => "Flow",
            Self::Spec => "Spec",
            Self::Event => "Event",
            Self::Emg => "EMG",
        }
    }

    /// `true` if frames of this modality are stored as image files.
    #[must_use]
    pub const fn is_image(self) -> bool {
        matches!(self, Self::Rgb | Self::RgbDiff)
    }

    /// Column holding this modality's vector in a feature table (`features_RGB`).
    #[must_use]
    pub fn feature_column(self) -> String {
        format!("features_{}", self.name())
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Config(format!("modalité inconnue '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("rgbdiff".parse::<Modality>().unwrap(), Modality::RgbDiff);
        assert_eq!("emg".parse::<Modality>().unwrap(), Modality::Emg);
        assert!("depth".parse::<Modality>().is_err());
    }

    #[test]
    fn serde_uses_table_names() {
        let json = serde_json::to_string(&Modality::RgbDiff).unwrap();
        assert_eq!(json, "\"RGBDiff\"");
        let back: Modality = serde_json::from_str("\"Event\"").unwrap();
        assert_eq!(back, Modality::Event);
    }

    #[test]
    fn only_rgb_variants_are_images() {
        let images: Vec<_> = Modality::ALL.into_iter().filter(|m| m.is_image()).collect();
        assert_eq!(images, vec![Modality::Rgb, Modality::RgbDiff]);
        assert_eq!(Modality::Flow.feature_column(), "features_Flow");
    }
}
