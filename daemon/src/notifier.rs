use crate::feed::UploadRecord;

/// Receives a `(title, body)` pair for each successful upload.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Records notifications in the log. Popup rendering belongs to the tray.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }
}

pub fn upload_notification(record: &UploadRecord) -> (String, String) {
    let result = if record.success { "Success" } else { "Fail" };
    (
        "Log uploaded".to_string(),
        format!("{} ({result})\n{}", record.boss, record.permalink),
    )
}
