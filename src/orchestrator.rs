use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    backend::Backend,
    error::{ClientError, ClientResult},
    models::{GenerateResponse, GenerationRequest, TestMaskResponse},
    session::Session,
};

/// A decoded, successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub image: Bytes,
    pub filename: Option<String>,
    pub captions: Vec<String>,
}

impl GenerationOutput {
    pub fn from_response(response: GenerateResponse) -> ClientResult<Self> {
        let encoded = response.image.ok_or_else(|| ClientError::Generation("response contained no image".into()))?;
        let image = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ClientError::Generation(format!("invalid image data: {e}")))?;
        let captions = match (response.captions, response.caption) {
            (Some(list), _) => list,
            (None, Some(one)) => vec![one],
            (None, None) => Vec::new(),
        };
        Ok(Self { image: Bytes::from(image), filename: response.filename, captions })
    }
}

/// Cancellation flag for one in-flight generation.
#[derive(Debug, Clone)]
pub struct RequestToken {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
}

impl RequestToken {
    fn new() -> Self { Self { id: Uuid::new_v4(), cancelled: Arc::new(AtomicBool::new(false)) } }
    pub fn id(&self) -> Uuid { self.id }
    pub fn cancel(&self) { self.cancelled.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::SeqCst) }
}

struct InFlight<'a>(&'a Mutex<Option<RequestToken>>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) { *self.0.lock() = None; }
}

/// Turns session state into exactly one backend call at a time.
///
/// `cancel` only suppresses the outcome: the HTTP request keeps running and
/// its result is dropped when it lands.
pub struct Orchestrator<B: Backend + ?Sized> {
    backend: Arc<B>,
    in_flight: Mutex<Option<RequestToken>>,
    timeout: Option<Duration>,
}

impl<B: Backend + ?Sized> Orchestrator<B> {
    pub fn new(backend: Arc<B>) -> Self { Self { backend, in_flight: Mutex::new(None), timeout: None } }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<B> { &self.backend }

    pub fn is_busy(&self) -> bool { self.in_flight.lock().is_some() }

    /// Marks the in-flight request cancelled. Returns false when nothing is pending.
    pub fn cancel(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                info!("🛑 Cancelled request {}", token.id());
                true
            }
            None => false,
        }
    }

    /// Validates `session`, sends one generation request and, on success,
    /// records the result filename on the session for a later `download`.
    pub async fn submit(&self, session: &mut Session) -> ClientResult<GenerationOutput> {
        let token = {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                warn!("Rejecting submit: a request is already in flight");
                return Err(ClientError::Busy);
            }
            let token = RequestToken::new();
            *slot = Some(token.clone());
            token
        };
        let _in_flight = InFlight(&self.in_flight);

        let request = session.build_request().map_err(|e| {
            info!("⚠️ Not submitting: {}", e);
            e
        })?;
        let output = self.dispatch(request, &token).await?;
        session.record_result(output.filename.clone());
        Ok(output)
    }

    async fn dispatch(&self, request: GenerationRequest, token: &RequestToken) -> ClientResult<GenerationOutput> {
        info!("🚀 Request {}: {} / {:?} / {:?}", token.id(), request.gen_type, request.style, request.mode);
        let call = self.backend.generate(&request);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or(Err(ClientError::Timeout)),
            None => call.await,
        };

        if token.is_cancelled() {
            info!("🛑 Request {} resolved after cancellation; discarding result", token.id());
            return Err(ClientError::Cancelled);
        }

        match result.and_then(GenerationOutput::from_response) {
            Ok(output) => {
                info!("✅ Request {} produced {} bytes, {} captions", token.id(), output.image.len(), output.captions.len());
                Ok(output)
            }
            Err(e) => {
                error!("❌ Request {} failed: {}", token.id(), e);
                Err(e)
            }
        }
    }

    /// Sends the current mask to the backend's diagnostic endpoint.
    pub async fn test_mask(&self, session: &Session) -> ClientResult<TestMaskResponse> {
        let mask = session.mask().ok_or_else(|| ClientError::validation("Please upload an image to inpaint"))?;
        let encoded = mask.serialize()?;
        info!("🧪 Testing {}x{} mask ({} bytes)", encoded.width, encoded.height, encoded.bytes.len());
        self.backend.test_mask(&encoded.to_data_url()).await
    }

    /// Fetches the last generated file.
    pub async fn download(&self, session: &Session) -> ClientResult<(String, Bytes)> {
        let filename = session.last_filename().ok_or_else(|| ClientError::validation("No storyboard to download"))?;
        let bytes = self.backend.download(filename).await?;
        Ok((filename.to_string(), bytes))
    }

    /// Downloads the last result into `dir`, keeping the backend's filename.
    pub async fn download_to(&self, session: &Session, dir: &Path) -> ClientResult<PathBuf> {
        let (filename, bytes) = self.download(session).await?;
        let name = Path::new(&filename)
            .file_name()
            .ok_or_else(|| ClientError::validation(format!("Unusable filename: {filename}")))?;
        let target = dir.join(name);
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| ClientError::Save(format!("{}: {e}", target.display())))?;
        info!("💾 Saved {}", target.display());
        Ok(target)
    }
}
