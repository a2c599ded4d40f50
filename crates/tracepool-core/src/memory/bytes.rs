use crate::error::{ArenaKind, PoolError, Result};
use crate::memory::debug::{MemoryCategory, MEMORY_TRACKER};

/// A byte range inside a [`ByteArena`]. `len` excludes the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteSpan {
    page: u32,
    offset: u32,
    len: u32,
}

impl ByteSpan {
    #[inline]
    pub fn len(self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Bump arena for string bodies. Every allocation reserves `n + 1` bytes:
/// the body followed by a zero terminator. Pages are `page_size` bytes; a
/// body that cannot fit in a regular page gets a dedicated page of its own,
/// which still counts against `max_pages`.
#[derive(Debug)]
pub struct ByteArena {
    pages: Vec<Vec<u8>>,
    current: Option<usize>,
    page_size: usize,
    max_pages: usize,
    bytes_used: usize,
    reserved: usize,
}

impl ByteArena {
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        Self {
            pages: Vec::new(),
            current: None,
            page_size: page_size.max(1),
            max_pages,
            bytes_used: 0,
            reserved: 0,
        }
    }

    fn exhausted(&self) -> PoolError {
        PoolError::AllocationExhausted {
            arena: ArenaKind::StringBytes,
            max_pages: self.max_pages,
        }
    }

    fn push_page(&mut self, capacity: usize) -> Result<usize> {
        if self.pages.len() >= self.max_pages {
            return Err(self.exhausted());
        }
        self.pages.push(Vec::with_capacity(capacity));
        self.reserved += capacity;
        MEMORY_TRACKER.record_page(MemoryCategory::StringBytes, capacity);
        Ok(self.pages.len() - 1)
    }

    /// Pick the page that will receive `needed` bytes, rolling the cursor
    /// forward when the current page has too little room left.
    fn page_for(&mut self, needed: usize) -> Result<usize> {
        if needed > self.page_size {
            return self.push_page(needed);
        }
        if let Some(current) = self.current {
            if self.page_size - self.pages[current].len() >= needed {
                return Ok(current);
            }
        }
        let page = self.push_page(self.page_size)?;
        self.current = Some(page);
        Ok(page)
    }

    /// Copy `bytes` into the arena followed by a zero terminator.
    pub fn try_alloc_bytes(&mut self, bytes: &[u8]) -> Result<ByteSpan> {
        let len = u32::try_from(bytes.len()).map_err(|_| self.exhausted())?;
        let needed = bytes.len() + 1;
        let page_idx = self.page_for(needed)?;
        let page = &mut self.pages[page_idx];
        let offset = page.len() as u32;
        page.extend_from_slice(bytes);
        page.push(0);
        self.bytes_used += needed;
        Ok(ByteSpan {
            page: page_idx as u32,
            offset,
            len,
        })
    }

    /// The stored body, without its terminator.
    pub fn get(&self, span: ByteSpan) -> Option<&[u8]> {
        let start = span.offset as usize;
        self.pages
            .get(span.page as usize)?
            .get(start..start + span.len())
    }

    /// The stored body including the trailing zero byte.
    pub fn get_with_terminator(&self, span: ByteSpan) -> Option<&[u8]> {
        let start = span.offset as usize;
        self.pages
            .get(span.page as usize)?
            .get(start..start + span.len() + 1)
    }

    /// Bytes handed out so far, terminators included.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Bytes reserved by all pages taken so far.
    pub fn bytes_reserved(&self) -> usize {
        self.reserved
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

}

impl Drop for ByteArena {
    fn drop(&mut self) {
        MEMORY_TRACKER.release_pages(MemoryCategory::StringBytes, self.pages.len(), self.reserved);
    }
}
