//! Upload of assembled PDFs to the destination Google Drive folder.
//!
//! Uses the Drive v3 multipart upload endpoint with an opaque bearer token;
//! the job never inspects or refreshes the token. The endpoint requires a
//! `multipart/related` body with the JSON metadata as the first part, so the
//! body is assembled by hand rather than with a form encoder. The response
//! is asked for the id and web link only.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::UploadError;

pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com";
/// Part separator for the `multipart/related` upload body.
pub const RELATED_BOUNDARY: &str = "issuu_drive_sync_upload_boundary";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The created Drive file, as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "id")]
    pub file_id: String,
    #[serde(rename = "webViewLink", default)]
    pub web_link: String,
}

/// Uploads one named document into the destination folder.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<UploadedFile, UploadError>;
}

pub struct DriveUploader {
    client: reqwest::Client,
    token: String,
    folder_id: String,
    base_url: String,
}

impl DriveUploader {
    pub fn new(token: String, folder_id: String) -> Result<Self, reqwest::Error> {
        Self::with_base_url(token, folder_id, DRIVE_BASE_URL)
    }

    /// Same as [`DriveUploader::new`] with an overridable host, for tests.
    pub fn with_base_url(
        token: String,
        folder_id: String,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            token,
            folder_id,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Uploader for DriveUploader {
    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<UploadedFile, UploadError> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [self.folder_id],
        });
        let body = related_body(&metadata.to_string(), &content);

        let url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart&fields=id%2CwebViewLink",
            self.base_url
        );
        debug!(name, folder = %self.folder_id, "Uploading to Drive");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={RELATED_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Api { status, body });
        }

        let file = response.json::<UploadedFile>().await?;
        info!(name, file_id = %file.file_id, link = %file.web_link, "Uploaded file to Drive");
        Ok(file)
    }
}

/// Drive's `uploadType=multipart` body: the JSON metadata part first, then
/// the PDF content, closed with the terminating boundary.
fn related_body(metadata: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(
        format!(
            "--{RELATED_BOUNDARY}\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n\
             {metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{RELATED_BOUNDARY}\r\nContent-Type: application/pdf\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{RELATED_BOUNDARY}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_body_puts_metadata_before_the_file_part() {
        let body = related_body(r#"{"name":"doc.pdf"}"#, b"%PDF-1.4");
        let text = String::from_utf8_lossy(&body);

        let metadata_at = text.find("application/json").unwrap();
        let file_at = text.find("application/pdf").unwrap();
        assert!(metadata_at < file_at);
        assert!(text.starts_with(&format!("--{RELATED_BOUNDARY}\r\n")));
        assert!(text.ends_with(&format!("\r\n--{RELATED_BOUNDARY}--\r\n")));
    }
}
