use std::sync::Mutex;

/// Number of uploads currently being processed. Never negative.
#[derive(Default)]
pub struct UploadQueue {
    depth: Mutex<usize>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file entered processing. Returns the new depth.
    pub fn enter(&self) -> usize {
        let mut depth = self.depth.lock().unwrap_or_else(|e| e.into_inner());
        *depth += 1;
        *depth
    }

    /// A file finished processing, successfully or not. Returns the new depth.
    pub fn leave(&self) -> usize {
        let mut depth = self.depth.lock().unwrap_or_else(|e| e.into_inner());
        *depth = depth.saturating_sub(1);
        *depth
    }

    pub fn depth(&self) -> usize {
        *self.depth.lock().unwrap_or_else(|e| e.into_inner())
    }
}
