use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};
use tracing::{info, warn};

use crate::{backend::Backend, error::{ClientError, ClientResult}};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_MEDIA_TYPES: [&str; 5] = ["image/jpeg", "image/png", "image/gif", "image/bmp", "image/webp"];

/// What an uploaded image is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadRole {
    InputImage,
    ControlnetImage,
    InpaintingImage,
}

impl UploadRole {
    pub const ALL: [UploadRole; 3] = [Self::InputImage, Self::ControlnetImage, Self::InpaintingImage];

    /// Backend route accepting this role's multipart upload.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::ControlnetImage => "/upload-controlnet",
            Self::InputImage | Self::InpaintingImage => "/upload",
        }
    }
}

/// A local file the user picked, not yet sent anywhere.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { file_name: file_name.into(), media_type: media_type.into(), bytes: bytes.into() }
    }

    /// Reads a file from disk, deriving its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::validation(format!("Cannot read {}: {e}", path.display())))?;
        let media_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, media_type, bytes))
    }

    pub fn size(&self) -> usize { self.bytes.len() }

    /// Client-side gate applied before any network traffic.
    pub fn validate(&self) -> ClientResult<()> {
        if self.bytes.is_empty() {
            return Err(ClientError::validation("No image file selected"));
        }
        if !ACCEPTED_MEDIA_TYPES.contains(&self.media_type.as_str()) {
            return Err(ClientError::validation("Invalid file type. Please upload a valid image file."));
        }
        if self.size() > MAX_UPLOAD_BYTES {
            return Err(ClientError::validation(format!(
                "File is too large ({:.1} MB). Maximum size is 10 MB.",
                self.size() as f64 / (1024.0 * 1024.0)
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSlot {
    pub role: UploadRole,
    pub remote_path: Option<String>,
    pub file_name: String,
    pub committed_at: DateTime<Utc>,
}

/// At most one committed upload per role.
#[derive(Debug, Default)]
pub struct UploadTracker {
    slots: HashMap<UploadRole, UploadSlot>,
}

impl UploadTracker {
    pub fn new() -> Self { Self::default() }

    /// Validates, uploads, and only on acknowledgment replaces the role's slot.
    pub async fn commit<B: Backend + ?Sized>(&mut self, role: UploadRole, file: &UploadFile, backend: &B) -> ClientResult<&UploadSlot> {
        file.validate()?;
        info!("📤 Uploading {} ({} bytes) as {:?}", file.file_name, file.size(), role);
        let remote_path = backend.upload(role, file).await.map_err(|e| {
            warn!("❌ Upload of {} failed: {}", file.file_name, e);
            match e {
                ClientError::Upload(_) => e,
                other => ClientError::Upload(other.to_string()),
            }
        })?;
        let slot = UploadSlot { role, remote_path, file_name: file.file_name.clone(), committed_at: Utc::now() };
        info!("✅ Committed {:?} -> {:?}", role, slot.remote_path);
        self.slots.insert(role, slot);
        Ok(&self.slots[&role])
    }

    pub fn clear(&mut self, role: UploadRole) -> Option<UploadSlot> { self.slots.remove(&role) }

    pub fn get(&self, role: UploadRole) -> Option<&UploadSlot> { self.slots.get(&role) }

    pub fn is_committed(&self, role: UploadRole) -> bool { self.slots.contains_key(&role) }

    pub fn remote_path(&self, role: UploadRole) -> Option<&str> {
        self.slots.get(&role).and_then(|s| s.remote_path.as_deref())
    }

    /// Drops every slot whose role fails `keep`, returning the dropped roles.
    pub fn retain_roles(&mut self, keep: impl Fn(UploadRole) -> bool) -> Vec<UploadRole> {
        let mut cleared: Vec<UploadRole> = self.slots.keys().copied().filter(|r| !keep(*r)).collect();
        cleared.sort_by_key(|r| *r as u8);
        for role in &cleared {
            self.slots.remove(role);
        }
        cleared
    }

    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    fn png(n: usize) -> UploadFile { UploadFile::new("castle.png", "image/png", vec![7u8; n]) }

    #[test]
    fn rejects_unsupported_media_type() {
        let file = UploadFile::new("notes.txt", "text/plain", b"hello".to_vec());
        assert!(matches!(file.validate(), Err(ClientError::Validation(_))));
        for mt in ACCEPTED_MEDIA_TYPES {
            assert!(UploadFile::new("x", mt, vec![1u8]).validate().is_ok(), "{mt}");
        }
    }

    #[test]
    fn size_limit_is_inclusive_at_ten_mib() {
        assert!(png(MAX_UPLOAD_BYTES).validate().is_ok());
        assert!(matches!(png(MAX_UPLOAD_BYTES + 1).validate(), Err(ClientError::Validation(_))));
        assert!(png(0).validate().is_err());
    }

    #[tokio::test]
    async fn oversize_file_never_reaches_backend() {
        let backend = FakeBackend::default();
        let mut tracker = UploadTracker::new();
        let err = tracker.commit(UploadRole::InputImage, &png(MAX_UPLOAD_BYTES + 1), &backend).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(backend.upload_calls(), 0);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn commit_replaces_previous_slot_for_role() {
        let backend = FakeBackend::default();
        let mut tracker = UploadTracker::new();
        tracker.commit(UploadRole::InputImage, &png(10), &backend).await.unwrap();
        let first = tracker.remote_path(UploadRole::InputImage).map(str::to_string);
        tracker.commit(UploadRole::InputImage, &UploadFile::new("b.jpg", "image/jpeg", vec![1u8; 4]), &backend).await.unwrap();
        assert_eq!(tracker.len(), 1);
        assert_ne!(tracker.remote_path(UploadRole::InputImage).map(str::to_string), first);
        assert_eq!(tracker.get(UploadRole::InputImage).unwrap().file_name, "b.jpg");
    }

    #[tokio::test]
    async fn failed_upload_keeps_existing_slot() {
        let backend = FakeBackend::default();
        let mut tracker = UploadTracker::new();
        tracker.commit(UploadRole::ControlnetImage, &png(10), &backend).await.unwrap();
        let before = tracker.get(UploadRole::ControlnetImage).cloned();

        backend.fail_uploads("disk full");
        let err = tracker.commit(UploadRole::ControlnetImage, &png(12), &backend).await.unwrap_err();
        assert_eq!(err, ClientError::Upload("disk full".into()));
        assert_eq!(tracker.get(UploadRole::ControlnetImage).cloned(), before);
    }

    #[tokio::test]
    async fn retain_roles_reports_cleared() {
        let backend = FakeBackend::default();
        let mut tracker = UploadTracker::new();
        for role in UploadRole::ALL {
            tracker.commit(role, &png(3), &backend).await.unwrap();
        }
        let cleared = tracker.retain_roles(|r| r == UploadRole::InpaintingImage);
        assert_eq!(cleared, vec![UploadRole::InputImage, UploadRole::ControlnetImage]);
        assert!(tracker.is_committed(UploadRole::InpaintingImage));
        assert!(tracker.clear(UploadRole::InpaintingImage).is_some());
        assert!(tracker.clear(UploadRole::InpaintingImage).is_none());
    }

    #[test]
    fn controlnet_has_its_own_endpoint() {
        assert_eq!(UploadRole::ControlnetImage.endpoint(), "/upload-controlnet");
        assert_eq!(UploadRole::InpaintingImage.endpoint(), "/upload");
    }
}
