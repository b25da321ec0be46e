use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::{
    error::{ClientError, ClientResult},
    models::{ControlnetUploadResponse, GenerateResponse, GenerationRequest, HealthResponse, StyleInfo, TestMaskRequest, TestMaskResponse, UploadResponse},
    uploads::{UploadFile, UploadRole},
};

const BASE64_KEYS: [&str; 5] = ["image", "maskData", "mask_data", "processed_mask", "inverted_mask"];

// Shortens long base64 strings under image-bearing keys so payloads stay readable in logs
pub(crate) fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if BASE64_KEYS.contains(&key.as_str()) {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | ':' | ';' | ',')) {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable<T: serde::Serialize>(body: &T) -> String {
    match serde_json::to_value(body) {
        Ok(mut v) => { truncate_base64_in_json(&mut v); v.to_string() }
        Err(_) => "<unserializable>".into(),
    }
}

/// The storyboard backend, consumed as a black box.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolves only for `success: true`; every other outcome is an error.
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<GenerateResponse>;
    /// Returns the backend's path for the stored file.
    async fn upload(&self, role: UploadRole, file: &UploadFile) -> ClientResult<Option<String>>;
    async fn test_mask(&self, mask_data: &str) -> ClientResult<TestMaskResponse>;
    async fn download(&self, filename: &str) -> ClientResult<Bytes>;
    async fn styles(&self) -> ClientResult<HashMap<String, StyleInfo>>;
    async fn health(&self) -> ClientResult<HealthResponse>;
}

pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::validation(format!("Invalid backend URL {base_url}: {e}")))?;
        Ok(Self { client: Client::new(), base_url })
    }

    pub fn base_url(&self) -> &Url { &self.base_url }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::validation(format!("Backend URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        let url = self.url(segments)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Network(format!("status={status}")));
        }
        response.json::<T>().await.map_err(|e| ClientError::Network(format!("parse error: {e}")))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<GenerateResponse> {
        let url = self.url(&["generate"])?;
        info!("🔗 POST {} ({})", url, request.gen_type);
        debug!("📤 Request body: {}", loggable(request));

        let response = self.client.post(url).json(request).send().await.map_err(|e| {
            error!("❌ Transport failure: {}", e);
            ClientError::from(e)
        })?;
        let status = response.status();
        info!("📥 Response status: {}", status);

        let text = response.text().await?;
        let parsed: GenerateResponse = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(e) if status.is_success() => return Err(ClientError::Generation(format!("parse error: {e}"))),
            Err(_) => return Err(ClientError::Generation(format!("status={status}"))),
        };
        debug!("📥 Response body: {}", loggable(&parsed));

        if !status.is_success() || !parsed.success {
            let reason = parsed.error.unwrap_or_else(|| "Failed to generate".to_string());
            error!("❌ Generation rejected ({}): {}", status, reason);
            return Err(ClientError::Generation(reason));
        }
        Ok(parsed)
    }

    async fn upload(&self, role: UploadRole, file: &UploadFile) -> ClientResult<Option<String>> {
        let url = self.url(&[role.endpoint().trim_start_matches('/')])?;
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| ClientError::Upload(e.to_string()))?;
        let form = multipart::Form::new().part("image", part);

        info!("🔗 POST {} ({})", url, file.file_name);
        let response = self.client.post(url).multipart(form).send().await
            .map_err(|e| ClientError::Upload(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| ClientError::Upload(e.to_string()))?;

        let (success, path, err) = match role {
            UploadRole::ControlnetImage => {
                let r: ControlnetUploadResponse = serde_json::from_str(&text).unwrap_or_default();
                (r.success, r.image_path, r.error)
            }
            UploadRole::InputImage | UploadRole::InpaintingImage => {
                let r: UploadResponse = serde_json::from_str(&text).unwrap_or_default();
                (r.success, r.filepath, r.error)
            }
        };
        if !status.is_success() || !success {
            return Err(ClientError::Upload(err.unwrap_or_else(|| format!("status={status}"))));
        }
        Ok(path)
    }

    async fn test_mask(&self, mask_data: &str) -> ClientResult<TestMaskResponse> {
        let url = self.url(&["test-mask"])?;
        let body = TestMaskRequest { mask_data: mask_data.to_string() };
        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        let parsed: TestMaskResponse = response.json().await
            .map_err(|e| ClientError::Generation(format!("parse error: {e}")))?;
        if !status.is_success() || !parsed.success {
            return Err(ClientError::Generation(parsed.error.unwrap_or_else(|| format!("status={status}"))));
        }
        info!("🧪 Mask test: {:?} masked of {:?}", parsed.masked_pixels, parsed.total_pixels);
        Ok(parsed)
    }

    async fn download(&self, filename: &str) -> ClientResult<Bytes> {
        let url = self.url(&["download", filename])?;
        info!("⬇️ GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Network(format!("Download failed ({status})")));
        }
        Ok(response.bytes().await?)
    }

    async fn styles(&self) -> ClientResult<HashMap<String, StyleInfo>> { self.get_json(&["api", "styles"]).await }

    async fn health(&self) -> ClientResult<HealthResponse> { self.get_json(&["health"]).await }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncates_only_image_keys() {
        let long = "A".repeat(400);
        let mut v = json!({"image": long, "prompt": "B".repeat(400), "nested": [{"processed_mask": "C".repeat(200)}]});
        truncate_base64_in_json(&mut v);
        assert!(v["image"].as_str().unwrap().ends_with("[truncated 350 chars]"));
        assert_eq!(v["prompt"].as_str().unwrap().len(), 400);
        assert!(v["nested"][0]["processed_mask"].as_str().unwrap().contains("truncated"));
    }

    #[test]
    fn non_base64_text_under_image_key_is_left_alone() {
        let odd = format!("{}é{}", "A".repeat(49), "B".repeat(100));
        let mut v = json!({"image": odd.clone(), "maskData": format!("data:image/png;base64,{}", "Q".repeat(200))});
        truncate_base64_in_json(&mut v);
        assert_eq!(v["image"].as_str().unwrap(), odd);
        assert!(v["maskData"].as_str().unwrap().starts_with("data:image/png;base64,QQ"));
        assert!(v["maskData"].as_str().unwrap().ends_with("[truncated 172 chars]"));
    }

    #[test]
    fn url_segments_are_joined_and_escaped() {
        let backend = HttpBackend::new("http://localhost:5001/").unwrap();
        assert_eq!(backend.url(&["generate"]).unwrap().as_str(), "http://localhost:5001/generate");
        assert_eq!(
            backend.url(&["download", "story board.png"]).unwrap().as_str(),
            "http://localhost:5001/download/story%20board.png"
        );
        let nested = HttpBackend::new("http://host/app").unwrap();
        assert_eq!(nested.url(&["health"]).unwrap().as_str(), "http://host/app/health");
    }

    #[test]
    fn rejects_malformed_base_url() {
        assert!(matches!(HttpBackend::new("not a url"), Err(ClientError::Validation(_))));
    }
}
