//! Test doubles shared by the engine, watcher and dashboard tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::log_name;
use crate::error::UploadError;
use crate::notifier::Notifier;
use crate::uploader::{UploadOutcome, Uploader};

type Respond = Box<dyn Fn(&str) -> Result<UploadOutcome, UploadError> + Send + Sync>;

/// Records every call and answers from a closure keyed on the basename.
pub struct MockUploader {
    calls: Mutex<Vec<String>>,
    respond: Respond,
    delay: Duration,
}

impl MockUploader {
    pub fn new(
        respond: impl Fn(&str) -> Result<UploadOutcome, UploadError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            delay: Duration::ZERO,
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(|name| Ok(report(name)))
    }

    /// Succeeds after sleeping `delay`, so concurrent callers overlap.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(|name| Ok(report(name))),
            delay,
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, path: &Path) -> Result<UploadOutcome, UploadError> {
        let name = log_name(path).unwrap();
        self.calls.lock().unwrap().push(name.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(&name)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

pub fn report(name: &str) -> UploadOutcome {
    UploadOutcome {
        permalink: format!("https://dps.report/{name}"),
        boss: "Vale Guardian".to_string(),
        success: true,
    }
}
