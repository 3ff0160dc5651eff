use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One completed upload, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub permalink: String,
    pub boss: String,
    pub success: bool,
    pub uploaded_at: DateTime<Local>,
}

/// Completed uploads for this session, most recent first.
///
/// Uncapped: entries accumulate until `/clear` or restart.
#[derive(Default)]
pub struct EventFeed {
    records: Mutex<VecDeque<UploadRecord>>,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: UploadRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_front(record);
    }

    pub fn snapshot(&self) -> Vec<UploadRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
        tracing::info!("web session cleared");
    }
}
