//! Emotion labels and label taxonomies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An emotion label assigned to one face.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    #[default]
    Neutral,
    Sad,
    Angry,
    Excited,
    Surprised,
    Fear,
    Disgust,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Excited => "excited",
            Emotion::Surprised => "surprised",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
        }
    }

    /// Capitalized name used in summaries ("2 Happy, 1 Sad").
    pub fn display_name(&self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Neutral => "Neutral",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Excited => "Excited",
            Emotion::Surprised => "Surprised",
            Emotion::Fear => "Fear",
            Emotion::Disgust => "Disgust",
        }
    }

    /// Box and text color (RGB) used when rendering this label.
    pub fn color(&self) -> [u8; 3] {
        match self {
            Emotion::Happy => [0, 255, 0],
            Emotion::Neutral => [255, 255, 0],
            Emotion::Sad => [0, 0, 255],
            Emotion::Angry => [255, 165, 0],
            Emotion::Excited => [255, 0, 255],
            Emotion::Surprised => [0, 255, 255],
            Emotion::Fear => [128, 0, 128],
            Emotion::Disgust => [128, 128, 0],
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EmotionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(Emotion::Happy),
            "neutral" => Ok(Emotion::Neutral),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            "excited" => Ok(Emotion::Excited),
            "surprised" => Ok(Emotion::Surprised),
            "fear" => Ok(Emotion::Fear),
            "disgust" => Ok(Emotion::Disgust),
            _ => Err(EmotionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown emotion: {0}")]
pub struct EmotionParseError(String);

/// Closed set of labels a rule set may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    /// happy / neutral / sad / angry
    #[default]
    Basic,
    /// Basic plus excited / surprised / fear / disgust
    Extended,
}

impl Taxonomy {
    /// Labels in reporting order.
    pub fn labels(&self) -> &'static [Emotion] {
        match self {
            Taxonomy::Basic => &[Emotion::Happy, Emotion::Neutral, Emotion::Sad, Emotion::Angry],
            Taxonomy::Extended => &[
                Emotion::Happy,
                Emotion::Excited,
                Emotion::Neutral,
                Emotion::Surprised,
                Emotion::Sad,
                Emotion::Fear,
                Emotion::Angry,
                Emotion::Disgust,
            ],
        }
    }

    pub fn contains(&self, emotion: Emotion) -> bool {
        self.labels().contains(&emotion)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::Basic => "basic",
            Taxonomy::Extended => "extended",
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Taxonomy {
    type Err = EmotionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Taxonomy::Basic),
            "extended" => Ok(Taxonomy::Extended),
            _ => Err(EmotionParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_names() {
        for emotion in Taxonomy::Extended.labels() {
            assert_eq!(emotion.as_str().parse::<Emotion>().unwrap(), *emotion);
        }
        assert_eq!(" HAPPY ".parse::<Emotion>().unwrap(), Emotion::Happy);
        assert!("平静".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_basic_taxonomy_is_subset_of_extended() {
        for emotion in Taxonomy::Basic.labels() {
            assert!(Taxonomy::Extended.contains(*emotion));
        }
        assert!(!Taxonomy::Basic.contains(Emotion::Fear));
    }

    #[test]
    fn test_default_is_neutral() {
        assert_eq!(Emotion::default(), Emotion::Neutral);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Emotion::Surprised).unwrap();
        assert_eq!(json, "\"surprised\"");
        let taxonomy: Taxonomy = serde_json::from_str("\"extended\"").unwrap();
        assert_eq!(taxonomy, Taxonomy::Extended);
    }
}
