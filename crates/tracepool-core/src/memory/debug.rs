use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::ArenaKind;

/// Categories for attributing arena pages and bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemoryCategory {
    StringRecords,
    TreeNodes,
    StringBytes,
}

impl From<ArenaKind> for MemoryCategory {
    fn from(kind: ArenaKind) -> Self {
        match kind {
            ArenaKind::StringRecords => Self::StringRecords,
            ArenaKind::TreeNodes => Self::TreeNodes,
            ArenaKind::StringBytes => Self::StringBytes,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CategoryStats {
    pub pages: u64,
    pub bytes: u64,
}

/// Process-wide page accounting. Arenas report here when they take or
/// release a page, never per object.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    inner: Mutex<HashMap<MemoryCategory, CategoryStats>>,
}

impl MemoryTracker {
    pub fn record_page(&self, category: MemoryCategory, bytes: usize) {
        let mut g = self.inner.lock();
        let e = g.entry(category).or_default();
        e.pages = e.pages.saturating_add(1);
        e.bytes = e.bytes.saturating_add(bytes as u64);
    }

    pub fn release_pages(&self, category: MemoryCategory, pages: usize, bytes: usize) {
        if pages == 0 {
            return;
        }
        let mut g = self.inner.lock();
        let e = g.entry(category).or_default();
        e.pages = e.pages.saturating_sub(pages as u64);
        e.bytes = e.bytes.saturating_sub(bytes as u64);
    }

    pub fn snapshot(&self) -> HashMap<MemoryCategory, CategoryStats> {
        self.inner.lock().clone()
    }
}

pub static MEMORY_TRACKER: Lazy<MemoryTracker> = Lazy::new(MemoryTracker::default);
