//! Pluggable visibility and byte-budget filters.

use extinfo::InfoFlags;

/// Accepts or rejects a candidate for an observer, after the built-in checks.
pub trait VisibilityFilter: Send + Sync {
    fn accept(&self, observer: u32, candidate: u16) -> bool;
}

/// Accepts every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl VisibilityFilter for AcceptAll {
    fn accept(&self, _observer: u32, _candidate: u16) -> bool {
        true
    }
}

/// Decides whether an extended-info record is written now or deferred.
pub trait ExtendedInfoFilter: Send + Sync {
    /// `remaining_bytes` is the packet budget left, `remaining_avatars` the
    /// number of records queued behind this one.
    fn accept(
        &self,
        remaining_bytes: usize,
        flags: InfoFlags,
        remaining_avatars: usize,
        previously_observed: bool,
    ) -> bool;
}

/// Writes a record only if its worst case still leaves one byte for every
/// record queued behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstCaseFilter;

impl ExtendedInfoFilter for WorstCaseFilter {
    fn accept(
        &self,
        remaining_bytes: usize,
        flags: InfoFlags,
        remaining_avatars: usize,
        _previously_observed: bool,
    ) -> bool {
        remaining_bytes >= flags.worst_case_len() + remaining_avatars
    }
}
