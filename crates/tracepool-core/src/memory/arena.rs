use std::mem;
use std::ops::{Index, IndexMut};

use crate::error::{ArenaKind, PoolError, Result};
use crate::memory::debug::{MemoryCategory, MEMORY_TRACKER};

/// A handle into a paged arena. Compact 64-bit encoding of (page, offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaIndex(u64);

impl ArenaIndex {
    /// Reserved "absent" value. No arena ever hands it out.
    pub const NIL: Self = Self(u64::MAX);

    #[inline]
    pub fn new(page: u32, offset: u32) -> Self {
        Self(((page as u64) << 32) | (offset as u64))
    }
    #[inline]
    pub fn page(self) -> u32 {
        (self.0 >> 32) as u32
    }
    #[inline]
    pub fn offset(self) -> u32 {
        self.0 as u32
    }
    #[inline]
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }
}

impl Default for ArenaIndex {
    fn default() -> Self {
        Self::NIL
    }
}

/// Fixed-slot block arena. Objects are placed into pages of
/// `slots_per_page` slots and stay at their index until the whole arena is
/// dropped; there is no per-object release.
///
/// - Allocation: amortized O(1), push into current page until full.
/// - Access: O(1) via ArenaIndex.
/// - Growth: at most `max_pages` pages, after which allocation fails.
#[derive(Debug)]
pub struct BlockArena<T> {
    pages: Vec<Vec<T>>,
    slots_per_page: usize,
    max_pages: usize,
    len: usize,
    kind: ArenaKind,
}

impl<T> BlockArena<T> {
    pub fn new(kind: ArenaKind, slots_per_page: usize, max_pages: usize) -> Self {
        Self {
            pages: Vec::new(),
            slots_per_page: slots_per_page.max(1),
            max_pages,
            len: 0,
            kind,
        }
    }

    #[inline]
    fn page_bytes(&self) -> usize {
        self.slots_per_page * mem::size_of::<T>()
    }

    #[inline]
    fn ensure_page(&mut self) -> Result<()> {
        if self
            .pages
            .last()
            .map(|p| p.len() < self.slots_per_page)
            .unwrap_or(false)
        {
            return Ok(());
        }
        if self.pages.len() >= self.max_pages {
            return Err(PoolError::AllocationExhausted {
                arena: self.kind,
                max_pages: self.max_pages,
            });
        }
        self.pages.push(Vec::with_capacity(self.slots_per_page));
        MEMORY_TRACKER.record_page(MemoryCategory::from(self.kind), self.page_bytes());
        Ok(())
    }

    /// Place `value` in the arena and return its index, or fail once every
    /// page is full and the page limit has been reached.
    pub fn try_alloc(&mut self, value: T) -> Result<ArenaIndex> {
        self.ensure_page()?;
        let page_idx = self.pages.len() - 1;
        let page = &mut self.pages[page_idx];
        let offset = page.len() as u32;
        page.push(value);
        self.len += 1;
        Ok(ArenaIndex::new(page_idx as u32, offset))
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total number of slots this arena can ever hold.
    pub fn capacity(&self) -> usize {
        self.slots_per_page.saturating_mul(self.max_pages)
    }

    pub fn get(&self, idx: ArenaIndex) -> Option<&T> {
        let page = self.pages.get(idx.page() as usize)?;
        page.get(idx.offset() as usize)
    }

    pub fn get_mut(&mut self, idx: ArenaIndex) -> Option<&mut T> {
        let page = self.pages.get_mut(idx.page() as usize)?;
        page.get_mut(idx.offset() as usize)
    }
}

impl<T> Drop for BlockArena<T> {
    fn drop(&mut self) {
        let pages = self.pages.len();
        MEMORY_TRACKER.release_pages(
            MemoryCategory::from(self.kind),
            pages,
            pages * self.page_bytes(),
        );
    }
}

impl<T> Index<ArenaIndex> for BlockArena<T> {
    type Output = T;
    fn index(&self, index: ArenaIndex) -> &Self::Output {
        self.get(index).expect("invalid ArenaIndex")
    }
}

impl<T> IndexMut<ArenaIndex> for BlockArena<T> {
    fn index_mut(&mut self, index: ArenaIndex) -> &mut Self::Output {
        self.get_mut(index).expect("invalid ArenaIndex")
    }
}
