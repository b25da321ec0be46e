use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{error::ClientError, uploads::UploadRole};

/// The mutually exclusive request variants the user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    #[default]
    Storyboard,
    Single,
    Batch,
    Controlnet,
    Img2img,
    Inpainting,
    PromptChaining,
}

/// Presentation regions the rendering layer toggles per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    MainPrompt,
    StoryboardOutput,
    SingleImageOutput,
    BatchControls,
    ControlnetControls,
    Img2imgControls,
    ReferencePreview,
    InpaintingCanvas,
    InpaintingTools,
    PromptChainEditor,
}

/// Inputs that must be present before a submission is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredInput {
    MainPrompt,
    Upload(UploadRole),
    MaskSurface,
    PromptChain,
}

impl GenerationMode {
    pub const ALL: [GenerationMode; 7] = [
        Self::Storyboard,
        Self::Single,
        Self::Batch,
        Self::Controlnet,
        Self::Img2img,
        Self::Inpainting,
        Self::PromptChaining,
    ];

    /// Wire name, as sent in the `genType` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storyboard => "storyboard",
            Self::Single => "single",
            Self::Batch => "batch",
            Self::Controlnet => "controlnet",
            Self::Img2img => "img2img",
            Self::Inpainting => "inpainting",
            Self::PromptChaining => "prompt-chaining",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Storyboard => "Storyboard (5 panels)",
            Self::Single => "Single Image Art",
            Self::Batch => "Batch Generation",
            Self::Controlnet => "ControlNet",
            Self::Img2img => "Image-to-Image",
            Self::Inpainting => "Inpainting",
            Self::PromptChaining => "Prompt Chaining",
        }
    }

    /// The one upload role this mode accepts, if any.
    pub fn upload_role(&self) -> Option<UploadRole> {
        match self {
            Self::Img2img => Some(UploadRole::InputImage),
            Self::Controlnet => Some(UploadRole::ControlnetImage),
            Self::Inpainting => Some(UploadRole::InpaintingImage),
            _ => None,
        }
    }

    pub fn accepts_role(&self, role: UploadRole) -> bool { self.upload_role() == Some(role) }

    /// Main-prompt validation is skipped only while chaining prompts.
    pub fn requires_main_prompt(&self) -> bool { !matches!(self, Self::PromptChaining) }

    pub fn uses_mask(&self) -> bool { matches!(self, Self::Inpainting) }

    pub fn required_inputs(&self) -> Vec<RequiredInput> {
        let mut required = Vec::with_capacity(3);
        if self.requires_main_prompt() {
            required.push(RequiredInput::MainPrompt);
        }
        if let Some(role) = self.upload_role() {
            required.push(RequiredInput::Upload(role));
        }
        if self.uses_mask() {
            required.push(RequiredInput::MaskSurface);
        }
        if matches!(self, Self::PromptChaining) {
            required.push(RequiredInput::PromptChain);
        }
        required
    }

    /// Regions visible under this mode. A pure function of the mode.
    pub fn visible_regions(&self) -> Vec<Region> {
        let mut regions = Vec::with_capacity(3);
        if self.requires_main_prompt() {
            regions.push(Region::MainPrompt);
        }
        match self {
            Self::Storyboard => regions.push(Region::StoryboardOutput),
            Self::Single => regions.push(Region::SingleImageOutput),
            Self::Batch => regions.push(Region::BatchControls),
            Self::Controlnet => regions.extend([Region::ControlnetControls, Region::ReferencePreview]),
            Self::Img2img => regions.extend([Region::Img2imgControls, Region::ReferencePreview]),
            Self::Inpainting => regions.extend([Region::InpaintingCanvas, Region::InpaintingTools]),
            Self::PromptChaining => regions.push(Region::PromptChainEditor),
        }
        regions
    }

    pub fn shows(&self, region: Region) -> bool { self.visible_regions().contains(&region) }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for GenerationMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ClientError::validation(format!("Unknown generation mode: {s}")))
    }
}

/// What the presentation layer needs to apply after a mode switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: GenerationMode,
    pub to: GenerationMode,
    pub visible: Vec<Region>,
    pub required: Vec<RequiredInput>,
    /// Upload roles whose committed slot was dropped by the switch.
    pub cleared: Vec<UploadRole>,
    pub mask_unbound: bool,
}
