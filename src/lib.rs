//! Client-side controller for the AI storyboard generator: generation-mode
//! state, upload slots, the inpainting mask canvas, and a single-flight
//! request orchestrator talking to the storyboard backend.

pub mod backend;
pub mod config;
pub mod error;
pub mod mask;
pub mod mode;
pub mod models;
pub mod orchestrator;
pub mod prompt_chain;
pub mod session;
pub mod status;
pub mod style;
pub mod uploads;

pub use backend::{Backend, HttpBackend};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use mask::{MaskSurface, Point, PointerEvent, Tool};
pub use mode::{GenerationMode, ModeTransition, Region};
pub use models::{GenerationRequest, RenderMode};
pub use orchestrator::{GenerationOutput, Orchestrator};
pub use session::Session;
pub use status::StatusMessage;
pub use style::Style;
pub use uploads::{UploadFile, UploadRole};
