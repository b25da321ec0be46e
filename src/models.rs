use serde::{Serialize, Deserialize};

use crate::{error::{ClientError, ClientResult}, mode::GenerationMode, style::Style};

/// Whether the backend runs the real diffusion pipeline or its fast placeholder renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Ai,
    Demo,
}

impl std::str::FromStr for RenderMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(Self::Ai),
            "demo" => Ok(Self::Demo),
            other => Err(ClientError::validation(format!("Unknown render mode: {other}"))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    pub count: u32,
    pub layout: String,
    pub variation_strength: f32,
}

impl Default for BatchOptions {
    fn default() -> Self { Self { count: 4, layout: "grid".into(), variation_strength: 0.3 } }
}

impl BatchOptions {
    pub fn validate(&self) -> ClientResult<()> {
        if !(1..=8).contains(&self.count) {
            return Err(ClientError::validation("Batch count must be between 1 and 8"));
        }
        unit_range("Variation strength", self.variation_strength)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlnetOptions {
    pub model: String,
    pub control_strength: f32,
    pub guidance_start: f32,
    pub guidance_end: f32,
}

impl Default for ControlnetOptions {
    fn default() -> Self { Self { model: "canny".into(), control_strength: 1.0, guidance_start: 0.0, guidance_end: 1.0 } }
}

impl ControlnetOptions {
    pub fn validate(&self) -> ClientResult<()> {
        if !(0.0..=2.0).contains(&self.control_strength) {
            return Err(ClientError::validation("Control strength must be between 0 and 2"));
        }
        unit_range("Guidance start", self.guidance_start)?;
        unit_range("Guidance end", self.guidance_end)?;
        if self.guidance_start >= self.guidance_end {
            return Err(ClientError::validation("Guidance start must be before guidance end"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptChainOptions {
    pub evolution_strength: f32,
    pub layout: String,
}

impl Default for PromptChainOptions {
    fn default() -> Self { Self { evolution_strength: 0.5, layout: "horizontal".into() } }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptChainPayload {
    pub prompts: Vec<String>,
    pub evolution_strength: f32,
    pub layout: String,
}

pub(crate) fn unit_range(what: &str, v: f32) -> ClientResult<()> {
    if (0.0..=1.0).contains(&v) { Ok(()) } else { Err(ClientError::validation(format!("{what} must be between 0 and 1"))) }
}

/// Body of `POST /generate`. Built fresh per submission.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub style: Style,
    pub mode: RenderMode,
    pub gen_type: GenerationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img2img: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inpainting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inpainting_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlnet_image_path: Option<String>,
    /// PNG data URL of the composited mask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_chain: Option<PromptChainPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlnet: Option<ControlnetOptions>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, style: Style, mode: RenderMode, gen_type: GenerationMode) -> Self {
        Self {
            prompt: prompt.into(),
            style,
            mode,
            gen_type,
            img2img: None,
            inpainting: None,
            input_image_path: None,
            inpainting_image_path: None,
            controlnet_image_path: None,
            mask_data: None,
            strength: None,
            prompt_chain: None,
            batch: None,
            controlnet: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GenerateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image: Option<String>, // base64 PNG
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub captions: Option<Vec<String>>,
    #[serde(default)]
    pub caption: Option<String>, // single / img2img responses
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ControlnetUploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestMaskRequest {
    pub mask_data: String,
}

/// Backend's analysis of a submitted mask.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TestMaskResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub mask_size: Option<[u32; 2]>,
    #[serde(default)]
    pub mask_mode: Option<String>,
    #[serde(default)]
    pub masked_pixels: Option<u64>,
    #[serde(default)]
    pub total_pixels: Option<u64>,
    #[serde(default)]
    pub inpaint_available: bool,
    #[serde(default)]
    pub inpaint_type: Option<String>,
    #[serde(default)]
    pub processed_mask: Option<String>,
    #[serde(default)]
    pub inverted_mask: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StyleInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
