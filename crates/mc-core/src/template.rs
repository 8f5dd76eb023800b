use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Nom de fichier de frame avec un emplacement d'index, ex. `img_{:010d}.jpg`.
///
/// Accepted placeholders: `{}`, `{:d}`, `{:Nd}` and `{:0Nd}`. Padding is
/// always with zeros.
///
/// # Example
/// ```
/// use mc_core::template::FrameTemplate;
/// let tmpl: FrameTemplate = "img_{:010d}.jpg".parse().unwrap();
/// assert_eq!(tmpl.format(42), "img_0000000042.jpg");
/// assert_eq!(tmpl.parse_index("img_0000000042.jpg"), Some(42));
/// assert_eq!(tmpl.parse_index("flow_0000000042.jpg"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTemplate {
    prefix: String,
    width: usize,
    suffix: String,
}

impl FrameTemplate {
    /// `img_{:010d}.jpg`, the naming of extracted EPIC frames.
    #[must_use]
    pub fn default_image() -> Self {
        Self {
            prefix: "img_".into(),
            width: 10,
            suffix: ".jpg".into(),
        }
    }

    /// File name of frame `index`.
    #[must_use]
    pub fn format(&self, index: usize) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        )
    }

    /// Index encoded in `file_name`, if it matches the template.
    #[must_use]
    pub fn parse_index(&self, file_name: &str) -> Option<usize> {
        let digits = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl FromStr for FrameTemplate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |why: &str| CoreError::Config(format!("template de frame '{s}' : {why}"));

        let open = s.find('{').ok_or_else(|| bad("aucun emplacement {}"))?;
        let close = s[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| bad("accolade non fermée"))?;
        let (prefix, spec, suffix) = (&s[..open], &s[open + 1..close], &s[close + 1..]);
        if prefix.contains(['{', '}']) || suffix.contains(['{', '}']) {
            return Err(bad("un seul emplacement autorisé"));
        }

        let width = match spec {
            "" | ":d" => 0,
            _ => {
                let digits = spec
                    .strip_prefix(':')
                    .and_then(|rest| rest.strip_suffix('d'))
                    .ok_or_else(|| bad("format attendu {:0Nd}"))?;
                digits
                    .parse::<usize>()
                    .map_err(|_| bad("largeur invalide"))?
            }
        };

        Ok(Self {
            prefix: prefix.to_string(),
            width,
            suffix: suffix.to_string(),
        })
    }
}

impl fmt::Display for FrameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 0 {
            write!(f, "{}{{}}{}", self.prefix, self.suffix)
        } else {
            write!(f, "{}{{:0{}d}}{}", self.prefix, self.width, self.suffix)
        }
    }
}

impl Serialize for FrameTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FrameTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
