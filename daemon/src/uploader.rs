//! dps.report upload client.
//!
//! Each call sleeps a fixed throttle delay, then posts the raw log as a
//! multipart body and parses the JSON report summary. Nothing is retried here;
//! a failed file is picked up again by the next rescan.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::UploadError;

pub const DEFAULT_ENDPOINT: &str = "https://dps.report/uploadContent";
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
/// Applied once before every upload to go easy on the remote service.
pub const PRE_UPLOAD_DELAY: Duration = Duration::from_secs(2);

const FILE_FIELD: &str = "file";
/// JSON response, Elite Insights report generator.
const QUERY: [(&str, &str); 2] = [("json", "1"), ("generator", "ei")];

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub permalink: String,
    pub boss: String,
    pub success: bool,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<UploadOutcome, UploadError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    encounter: Option<Encounter>,
}

#[derive(Debug, Deserialize)]
struct Encounter {
    #[serde(default)]
    boss: Option<String>,
    #[serde(default)]
    success: Option<bool>,
}

impl From<UploadResponse> for UploadOutcome {
    fn from(resp: UploadResponse) -> Self {
        let (boss, success) = match resp.encounter {
            Some(e) => (e.boss, e.success),
            None => (None, None),
        };
        Self {
            permalink: resp.permalink.unwrap_or_default(),
            boss: boss.unwrap_or_else(|| "Unknown".to_string()),
            success: success.unwrap_or(false),
        }
    }
}

pub struct DpsReportClient {
    http: reqwest::Client,
    endpoint: String,
    pre_upload_delay: Duration,
}

impl DpsReportClient {
    pub fn new() -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| UploadError::Unexpected(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pre_upload_delay: PRE_UPLOAD_DELAY,
        })
    }

    /// Sets a custom endpoint (for testing).
    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, url: String) -> Self {
        self.endpoint = url;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_pre_upload_delay(mut self, delay: Duration) -> Self {
        self.pre_upload_delay = delay;
        self
    }
}

#[async_trait]
impl Uploader for DpsReportClient {
    async fn upload(&self, path: &Path) -> Result<UploadOutcome, UploadError> {
        tokio::time::sleep(self.pre_upload_delay).await;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::Unexpected(format!("failed to read {}: {e}", path.display())))?;

        let form = Form::new().part(FILE_FIELD, Part::bytes(bytes).file_name(name));
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&QUERY)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(UploadError::Request(format!("HTTP {status}: {body}")));
        }

        let report: UploadResponse = resp.json().await?;
        Ok(report.into())
    }
}
