use tracing::{debug, info};

use crate::{
    backend::Backend,
    config::ClientConfig,
    error::{ClientError, ClientResult},
    mask::MaskSurface,
    mode::{GenerationMode, ModeTransition, RequiredInput},
    models::{unit_range, BatchOptions, ControlnetOptions, GenerationRequest, PromptChainOptions, PromptChainPayload, RenderMode},
    prompt_chain::{PromptChain, MIN_PROMPT_CHARS},
    style::Style,
    uploads::{UploadFile, UploadRole, UploadTracker},
};

pub const DEFAULT_STRENGTH: f32 = 0.75;

/// Everything the user has entered so far. One per open page.
#[derive(Debug)]
pub struct Session {
    mode: GenerationMode,
    render_mode: RenderMode,
    prompt: String,
    style: Style,
    strength: f32,
    batch: BatchOptions,
    controlnet: ControlnetOptions,
    chain_options: PromptChainOptions,
    chain: PromptChain,
    uploads: UploadTracker,
    mask: Option<MaskSurface>,
    brush_size: f32,
    last_filename: Option<String>,
}

impl Default for Session {
    fn default() -> Self { Self::new(&ClientConfig::default()) }
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            mode: GenerationMode::default(),
            render_mode: config.render_mode,
            prompt: String::new(),
            style: Style::default(),
            strength: DEFAULT_STRENGTH,
            batch: BatchOptions::default(),
            controlnet: ControlnetOptions::default(),
            chain_options: PromptChainOptions::default(),
            chain: PromptChain::default(),
            uploads: UploadTracker::new(),
            mask: None,
            brush_size: config.brush_size,
            last_filename: None,
        }
    }

    pub fn mode(&self) -> GenerationMode { self.mode }

    /// Switches mode, dropping uploads (and the mask) the new mode cannot use.
    pub fn set_mode(&mut self, to: GenerationMode) -> ModeTransition {
        let from = self.mode;
        let cleared = self.uploads.retain_roles(|role| to.accepts_role(role));
        let mask_unbound = self.mask.is_some() && !to.uses_mask();
        if mask_unbound {
            self.mask = None;
        }
        self.mode = to;
        if !cleared.is_empty() || mask_unbound {
            info!("🔀 Mode {} -> {}: cleared {:?}, mask unbound: {}", from, to, cleared, mask_unbound);
        } else {
            debug!("Mode {} -> {}", from, to);
        }
        ModeTransition { from, to, visible: to.visible_regions(), required: to.required_inputs(), cleared, mask_unbound }
    }

    pub fn render_mode(&self) -> RenderMode { self.render_mode }
    pub fn set_render_mode(&mut self, mode: RenderMode) { self.render_mode = mode; }

    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn set_prompt(&mut self, prompt: impl Into<String>) { self.prompt = prompt.into(); }

    pub fn style(&self) -> Style { self.style }
    pub fn set_style(&mut self, style: Style) { self.style = style; }

    pub fn strength(&self) -> f32 { self.strength }
    pub fn set_strength(&mut self, strength: f32) -> ClientResult<()> {
        unit_range("Strength", strength)?;
        self.strength = strength;
        Ok(())
    }

    pub fn batch(&self) -> &BatchOptions { &self.batch }
    pub fn set_batch(&mut self, batch: BatchOptions) -> ClientResult<()> {
        batch.validate()?;
        self.batch = batch;
        Ok(())
    }

    pub fn controlnet(&self) -> &ControlnetOptions { &self.controlnet }
    pub fn set_controlnet(&mut self, options: ControlnetOptions) -> ClientResult<()> {
        options.validate()?;
        self.controlnet = options;
        Ok(())
    }

    pub fn chain_options(&self) -> &PromptChainOptions { &self.chain_options }
    pub fn set_chain_options(&mut self, options: PromptChainOptions) -> ClientResult<()> {
        unit_range("Evolution strength", options.evolution_strength)?;
        self.chain_options = options;
        Ok(())
    }

    pub fn chain(&self) -> &PromptChain { &self.chain }
    pub fn chain_mut(&mut self) -> &mut PromptChain { &mut self.chain }

    pub fn uploads(&self) -> &UploadTracker { &self.uploads }

    pub fn mask(&self) -> Option<&MaskSurface> { self.mask.as_ref() }
    pub fn mask_mut(&mut self) -> Option<&mut MaskSurface> { self.mask.as_mut() }

    /// Uploads `file` for `role`. Inpainting images are decoded first and bound
    /// to a fresh mask surface once the backend acknowledges the upload.
    pub async fn commit_upload<B: Backend + ?Sized>(&mut self, role: UploadRole, file: UploadFile, backend: &B) -> ClientResult<()> {
        if !self.mode.accepts_role(role) {
            return Err(ClientError::validation(format!("{} does not take a {:?} upload", self.mode.label(), role)));
        }
        file.validate()?;
        let surface = match role {
            UploadRole::InpaintingImage => {
                let mut surface = MaskSurface::load(file.bytes.clone()).await?;
                surface.set_brush_size(self.brush_size);
                Some(surface)
            }
            _ => None,
        };
        self.uploads.commit(role, &file, backend).await?;
        if surface.is_some() {
            self.mask = surface;
        }
        Ok(())
    }

    pub fn clear_upload(&mut self, role: UploadRole) {
        self.uploads.clear(role);
        if role == UploadRole::InpaintingImage {
            self.mask = None;
        }
    }

    /// Checks every input the active mode requires, reporting the first gap.
    pub fn validate(&self) -> ClientResult<()> {
        for required in self.mode.required_inputs() {
            match required {
                RequiredInput::MainPrompt => validate_prompt(&self.prompt)?,
                RequiredInput::Upload(role) if !self.uploads.is_committed(role) => {
                    return Err(ClientError::validation(missing_upload_message(role)));
                }
                RequiredInput::Upload(_) => {}
                RequiredInput::MaskSurface if self.mask.is_none() => {
                    return Err(ClientError::validation(missing_upload_message(UploadRole::InpaintingImage)));
                }
                RequiredInput::MaskSurface => {}
                RequiredInput::PromptChain => self.chain.validate()?,
            }
        }
        match self.mode {
            GenerationMode::Batch => self.batch.validate(),
            GenerationMode::Controlnet => self.controlnet.validate(),
            GenerationMode::Img2img | GenerationMode::Inpainting => unit_range("Strength", self.strength),
            GenerationMode::PromptChaining => unit_range("Evolution strength", self.chain_options.evolution_strength),
            GenerationMode::Storyboard | GenerationMode::Single => Ok(()),
        }
    }

    /// Validates, then assembles the `/generate` body for the active mode.
    pub fn build_request(&self) -> ClientResult<GenerationRequest> {
        self.validate()?;
        let prompt = match self.mode {
            GenerationMode::PromptChaining => self.chain.prompts().into_iter().next().unwrap_or_default(),
            _ => self.prompt.trim().to_string(),
        };
        let mut req = GenerationRequest::new(prompt, self.style, self.render_mode, self.mode);
        match self.mode {
            GenerationMode::Storyboard | GenerationMode::Single => {}
            GenerationMode::Batch => req.batch = Some(self.batch.clone()),
            GenerationMode::Controlnet => {
                req.controlnet_image_path = self.remote_path(UploadRole::ControlnetImage);
                req.controlnet = Some(self.controlnet.clone());
            }
            GenerationMode::Img2img => {
                req.img2img = Some(true);
                req.input_image_path = self.remote_path(UploadRole::InputImage);
                req.strength = Some(self.strength);
            }
            GenerationMode::Inpainting => {
                let mask = self.mask.as_ref().ok_or_else(|| ClientError::validation(missing_upload_message(UploadRole::InpaintingImage)))?;
                req.inpainting = Some(true);
                req.inpainting_image_path = self.remote_path(UploadRole::InpaintingImage);
                req.mask_data = Some(mask.serialize()?.to_data_url());
                req.strength = Some(self.strength);
            }
            GenerationMode::PromptChaining => {
                req.prompt_chain = Some(PromptChainPayload {
                    prompts: self.chain.prompts(),
                    evolution_strength: self.chain_options.evolution_strength,
                    layout: self.chain_options.layout.clone(),
                });
            }
        }
        Ok(req)
    }

    pub fn last_filename(&self) -> Option<&str> { self.last_filename.as_deref() }
    pub fn record_result(&mut self, filename: Option<String>) { self.last_filename = filename; }

    fn remote_path(&self, role: UploadRole) -> Option<String> { self.uploads.remote_path(role).map(str::to_string) }
}

pub fn validate_prompt(prompt: &str) -> ClientResult<()> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation("Please enter a scene description"));
    }
    if trimmed.chars().count() < MIN_PROMPT_CHARS {
        return Err(ClientError::validation(format!("Scene description should be at least {MIN_PROMPT_CHARS} characters")));
    }
    Ok(())
}

fn missing_upload_message(role: UploadRole) -> &'static str {
    match role {
        UploadRole::InputImage => "Please upload an input image for image-to-image generation",
        UploadRole::ControlnetImage => "Please upload a reference image for ControlNet",
        UploadRole::InpaintingImage => "Please upload an image to inpaint",
    }
}
