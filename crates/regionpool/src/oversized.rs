//! Registry of oversized allocations.
//!
//! Requests at or above the pool threshold bypass the block chain and get a
//! dedicated heap region. Each region is tracked by an [`OversizedRecord`]
//! whose own footprint is charged to the block chain through
//! [`MetadataAlloc`]. Freeing a region clears its record, and the slot can be
//! picked up again by a later oversized allocation.

use tracing::trace;

use crate::block::MetadataAlloc;
use crate::buffer::WordBuffer;
use crate::config::consts::LARGE_RECORD_SIZE;
use crate::error::PoolError;

/// One tracked oversized region.
struct OversizedRecord {
    /// The heap region, or `None` after an explicit free.
    region: Option<WordBuffer>,
    /// Token of the allocation currently (or last) held by this slot.
    token: u64,
}

/// Side list of directly heap-allocated regions.
///
/// Records are kept oldest-first in `records`; lookups walk it newest-first,
/// matching a list that prepends each new record.
pub(crate) struct OversizedRegistry {
    records: Vec<OversizedRecord>,
    next_token: u64,
    /// Number of records inspected for a free slot before giving up.
    reuse_scan: usize,
}

impl OversizedRegistry {
    pub(crate) fn new(reuse_scan: usize) -> Self {
        Self {
            records: Vec::new(),
            next_token: 0,
            reuse_scan,
        }
    }

    /// Allocate a `size`-byte region and track it, returning its token.
    ///
    /// A cleared slot among the newest `reuse_scan` records is reused;
    /// otherwise a new record is charged to `meta`. If that charge fails the
    /// region is released before the error is returned.
    pub(crate) fn alloc(
        &mut self,
        size: usize,
        meta: &mut impl MetadataAlloc,
    ) -> Result<u64, PoolError> {
        let region = WordBuffer::try_new(size)?;
        let token = self.next_token;
        self.next_token += 1;

        if let Some(slot) = self
            .records
            .iter_mut()
            .rev()
            .take(self.reuse_scan)
            .find(|r| r.region.is_none())
        {
            slot.region = Some(region);
            slot.token = token;
            trace!(token, size, "reused oversized slot");
            return Ok(token);
        }

        // `region` drops here on failure.
        meta.alloc_metadata(LARGE_RECORD_SIZE)?;
        self.records.push(OversizedRecord {
            region: Some(region),
            token,
        });
        trace!(token, size, records = self.records.len(), "new oversized record");
        Ok(token)
    }

    /// Release the region for `token`, keeping its record for reuse.
    ///
    /// Returns `false` (and does nothing) when the token is not tracked.
    pub(crate) fn free(&mut self, token: u64) -> bool {
        match self.live_record_mut(token) {
            Some(record) => {
                record.region = None;
                true
            }
            None => false,
        }
    }

    pub(crate) fn bytes(&self, token: u64) -> Option<&[u8]> {
        self.records
            .iter()
            .rev()
            .find(|r| r.token == token)
            .and_then(|r| r.region.as_ref())
            .map(WordBuffer::as_bytes)
    }

    pub(crate) fn bytes_mut(&mut self, token: u64) -> Option<&mut [u8]> {
        self.live_record_mut(token)
            .and_then(|r| r.region.as_mut())
            .map(WordBuffer::as_bytes_mut)
    }

    /// Release every live region and forget all records.
    ///
    /// Returns the number of regions released.
    pub(crate) fn release_all(&mut self) -> usize {
        let live = self.live_count();
        self.records.clear();
        live
    }

    /// Regions currently allocated.
    pub(crate) fn live_count(&self) -> usize {
        self.records.iter().filter(|r| r.region.is_some()).count()
    }

    /// Records, live or cleared.
    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Bytes held by live regions.
    pub(crate) fn live_bytes(&self) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.region.as_ref())
            .map(WordBuffer::len)
            .sum()
    }

    fn live_record_mut(&mut self, token: u64) -> Option<&mut OversizedRecord> {
        self.records
            .iter_mut()
            .rev()
            .find(|r| r.token == token && r.region.is_some())
    }
}
