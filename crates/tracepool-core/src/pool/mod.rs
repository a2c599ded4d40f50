//! The string pool: a fixed table of buckets, each owning a balanced tree of
//! interned strings, backed by three monotonic arenas.
//!
//! ```
//! use tracepool_core::{hash_bytes, StringPool};
//!
//! let mut pool = StringPool::default();
//! let a = pool.intern(b"sched_switch", hash_bytes(b"sched_switch")).unwrap();
//! let b = pool.intern(b"sched_switch", hash_bytes(b"sched_switch")).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(pool.resolve(a), Some(&b"sched_switch"[..]));
//! ```
//!
//! # Overload fallback
//!
//! A bucket that has taken more than `fallback_threshold` insertions stops
//! deduplicating: further calls hashing into it get a fresh, unshared copy
//! without touching the tree. This bounds the search depth of hot buckets
//! at the price of some duplicate storage until the next `clear`/`reset`.

pub mod tree;

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{ArenaKind, PoolError, Result};
use crate::hashing::hash_bytes;
use crate::memory::{ArenaIndex, BlockArena, ByteArena, ByteSpan};
use tree::{NodeStore, Probe, TreeNode, TreeViolation};

/// Handle to an interned string. Copyable; two handles are equal exactly
/// when they denote the same stored copy. Handles issued before the last
/// `clear`/`reset` no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternedStr {
    record: ArenaIndex,
    epoch: u32,
}

/// Location of one stored string body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StrRecord {
    span: ByteSpan,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    root: ArenaIndex,
    usage: u32,
}

impl Default for Bucket {
    fn default() -> Self {
        Self {
            root: ArenaIndex::NIL,
            usage: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub buckets: usize,
    pub occupied_buckets: usize,
    pub overloaded_buckets: usize,
    /// Strings stored in bucket trees.
    pub distinct: u64,
    pub dedup_hits: u64,
    pub fallback_allocations: u64,
    pub record_pages: usize,
    pub node_pages: usize,
    pub byte_pages: usize,
    pub bytes_used: usize,
    pub bytes_reserved: usize,
}

/// Single-owner string interning pool. Not thread-safe; every mutating
/// operation takes `&mut self`.
#[derive(Debug)]
pub struct StringPool {
    config: PoolConfig,
    records: BlockArena<StrRecord>,
    nodes: NodeStore,
    bytes: ByteArena,
    buckets: Vec<Bucket>,
    epoch: u32,
    distinct: u64,
    dedup_hits: u64,
    fallback_allocations: u64,
}

/// Stored body of `record`; empty if the record is unknown.
fn body<'a>(
    records: &BlockArena<StrRecord>,
    bytes: &'a ByteArena,
    record: ArenaIndex,
) -> &'a [u8] {
    records
        .get(record)
        .and_then(|r| bytes.get(r.span))
        .unwrap_or(&[])
}

fn note_exhaustion(err: PoolError) -> PoolError {
    warn!(error = %err, "string pool allocation failed");
    err
}

impl StringPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
        Ok(Self::build(config))
    }

    fn build(config: PoolConfig) -> Self {
        Self {
            records: BlockArena::new(
                ArenaKind::StringRecords,
                config.slots_per_page,
                config.record_pages,
            ),
            nodes: NodeStore::new(
                ArenaKind::TreeNodes,
                config.slots_per_page,
                config.node_pages,
            ),
            bytes: ByteArena::new(config.byte_page_size, config.byte_pages),
            buckets: vec![Bucket::default(); config.bucket_count],
            epoch: 0,
            distinct: 0,
            dedup_hits: 0,
            fallback_allocations: 0,
            config,
        }
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    #[inline]
    fn handle(&self, record: ArenaIndex) -> InternedStr {
        InternedStr {
            record,
            epoch: self.epoch,
        }
    }

    /// Copy `candidate` into the byte arena and give it a record.
    fn store(&mut self, candidate: &[u8]) -> Result<ArenaIndex> {
        let span = self.bytes.try_alloc_bytes(candidate)?;
        self.records.try_alloc(StrRecord { span })
    }

    /// Return the canonical copy of `candidate`, storing it first if this
    /// bucket has not seen it. `hash` must cover exactly `candidate`; the
    /// pool never hashes on its own.
    ///
    /// On allocation failure nothing is linked into any tree and the bucket
    /// counters are left untouched.
    pub fn intern(&mut self, candidate: &[u8], hash: u64) -> Result<InternedStr> {
        let bucket_idx = self.bucket_of(hash);
        let Bucket { root, usage } = self.buckets[bucket_idx];

        if usage > self.config.fallback_threshold {
            let record = self.store(candidate).map_err(note_exhaustion)?;
            self.fallback_allocations += 1;
            return Ok(self.handle(record));
        }

        let (records, bytes) = (&self.records, &self.bytes);
        let probe = tree::probe(&self.nodes, root, |node| {
            candidate.cmp(body(records, bytes, node.record))
        });
        let (parent, side) = match probe {
            Probe::Found(node) => {
                self.dedup_hits += 1;
                return Ok(self.handle(self.nodes[node].record));
            }
            Probe::Vacant { parent, side } => (parent, side),
        };

        let record = self.store(candidate).map_err(note_exhaustion)?;
        let leaf = self
            .nodes
            .try_alloc(TreeNode::leaf(record, parent))
            .map_err(note_exhaustion)?;

        let bucket = &mut self.buckets[bucket_idx];
        tree::attach(&mut self.nodes, &mut bucket.root, leaf, side);
        bucket.usage = bucket.usage.saturating_add(1);
        if bucket.usage == self.config.fallback_threshold.saturating_add(1) {
            debug!(
                bucket = bucket_idx,
                threshold = self.config.fallback_threshold,
                "bucket overloaded, deduplication disabled until clear"
            );
        }
        self.distinct += 1;
        Ok(self.handle(record))
    }

    pub fn intern_str(&mut self, candidate: &str, hash: u64) -> Result<InternedStr> {
        self.intern(candidate.as_bytes(), hash)
    }

    /// [`intern`](Self::intern) with the hash computed by [`hash_bytes`].
    pub fn intern_hashed(&mut self, candidate: &[u8]) -> Result<InternedStr> {
        self.intern(candidate, hash_bytes(candidate))
    }

    /// Look `candidate` up in its bucket tree without storing anything.
    /// Copies handed out by the overload fallback are never found here.
    pub fn lookup(&self, candidate: &[u8], hash: u64) -> Option<InternedStr> {
        let root = self.buckets[self.bucket_of(hash)].root;
        let (records, bytes) = (&self.records, &self.bytes);
        tree::find(&self.nodes, root, |node| {
            candidate.cmp(body(records, bytes, node.record))
        })
        .map(|node| self.handle(self.nodes[node].record))
    }

    pub fn contains(&self, candidate: &[u8], hash: u64) -> bool {
        self.lookup(candidate, hash).is_some()
    }

    /// Bytes of an interned string, or `None` for a handle issued before the
    /// last `clear`/`reset`.
    pub fn resolve(&self, handle: InternedStr) -> Option<&[u8]> {
        if handle.epoch != self.epoch {
            return None;
        }
        let record = self.records.get(handle.record)?;
        self.bytes.get(record.span)
    }

    pub fn resolve_str(&self, handle: InternedStr) -> Option<&str> {
        self.resolve(handle)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Number of strings stored in bucket trees since the last clear.
    pub fn len(&self) -> usize {
        self.distinct as usize
    }

    pub fn is_empty(&self) -> bool {
        self.distinct == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_usage(&self, bucket: usize) -> Option<u32> {
        self.buckets.get(bucket).map(|b| b.usage)
    }

    /// Height of a bucket's tree; -1 when the bucket is empty.
    pub fn bucket_height(&self, bucket: usize) -> Option<i32> {
        self.buckets
            .get(bucket)
            .map(|b| tree::height(&self.nodes, b.root))
    }

    /// Forget every bucket tree. Arena memory is kept; handles issued so far
    /// stop resolving.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::default();
        }
        self.epoch = self.epoch.wrapping_add(1);
        self.distinct = 0;
        self.dedup_hits = 0;
        self.fallback_allocations = 0;
        debug!(
            buckets = self.buckets.len(),
            epoch = self.epoch,
            "string pool cleared"
        );
    }

    /// Drop all three arenas, recreate them empty, then [`clear`](Self::clear).
    pub fn reset(&mut self) {
        debug!(
            byte_pages = self.bytes.page_count(),
            node_pages = self.nodes.page_count(),
            record_pages = self.records.page_count(),
            "string pool reset, releasing arenas"
        );
        self.records = BlockArena::new(
            ArenaKind::StringRecords,
            self.config.slots_per_page,
            self.config.record_pages,
        );
        self.nodes = NodeStore::new(
            ArenaKind::TreeNodes,
            self.config.slots_per_page,
            self.config.node_pages,
        );
        self.bytes = ByteArena::new(self.config.byte_page_size, self.config.byte_pages);
        self.clear();
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            buckets: self.buckets.len(),
            occupied_buckets: self.buckets.iter().filter(|b| !b.root.is_nil()).count(),
            overloaded_buckets: self
                .buckets
                .iter()
                .filter(|b| b.usage > self.config.fallback_threshold)
                .count(),
            distinct: self.distinct,
            dedup_hits: self.dedup_hits,
            fallback_allocations: self.fallback_allocations,
            record_pages: self.records.page_count(),
            node_pages: self.nodes.page_count(),
            byte_pages: self.bytes.page_count(),
            bytes_used: self.bytes.bytes_used(),
            bytes_reserved: self.bytes.bytes_reserved(),
        }
    }

    /// Check every bucket tree: ordering, parent links, heights, balance and
    /// agreement with the bucket's usage counter.
    pub fn validate(&self) -> Result<()> {
        let (records, bytes) = (&self.records, &self.bytes);
        for (idx, bucket) in self.buckets.iter().enumerate() {
            let corrupt = |violation: TreeViolation| PoolError::CorruptTree {
                bucket: idx,
                violation,
            };
            let count = tree::check_subtree(&self.nodes, bucket.root, |a, b| {
                body(records, bytes, a.record).cmp(body(records, bytes, b.record))
            })
            .map_err(corrupt)?;
            if count != bucket.usage as usize {
                return Err(corrupt(TreeViolation::UsageMismatch {
                    usage: bucket.usage,
                    nodes: count,
                }));
            }
        }
        Ok(())
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::build(PoolConfig::default())
    }
}

impl PartialOrd for InternedStr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by epoch, then by storage position. Useful as a map key; unrelated
/// to the byte order of the contents.
impl Ord for InternedStr {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.epoch, self.record).cmp(&(other.epoch, other.record))
    }
}
