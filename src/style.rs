use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Cinematic,
    Anime,
    Photorealistic,
    Noir,
    Pixar,
}

impl Style {
    pub const ALL: [Style; 5] = [Self::Cinematic, Self::Anime, Self::Photorealistic, Self::Noir, Self::Pixar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cinematic => "cinematic",
            Self::Anime => "anime",
            Self::Photorealistic => "photorealistic",
            Self::Noir => "noir",
            Self::Pixar => "pixar",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cinematic => "Cinematic",
            Self::Anime => "Anime",
            Self::Photorealistic => "Photorealistic",
            Self::Noir => "Noir",
            Self::Pixar => "Pixar",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Cinematic => "Professional film-style with dramatic lighting",
            Self::Anime => "Japanese animation style with vibrant colors",
            Self::Photorealistic => "High-quality photographic realism",
            Self::Noir => "Classic film noir with dramatic shadows",
            Self::Pixar => "3D animation style like Pixar films",
        }
    }
}

impl FromStr for Style {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| ClientError::validation(format!("Unknown style: {s}")))
    }
}
