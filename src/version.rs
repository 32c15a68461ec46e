//! Filepath: src/version.rs
//!
//! Versioned spin lock for optimistic lock coupling.
//!
//! [`VersionLock`] packs a lock bit, an obsolete bit, and a version counter
//! into a single `AtomicU64`. Readers proceed without blocking: they capture
//! the version, read the protected data, and validate that the version is
//! unchanged. Writers briefly hold the lock bit and publish their mutation
//! by bumping the counter on unlock.
//!
//! # Word Layout
//!
//! ```text
//! bit 0      obsolete - the node was retired; optimistic readers must restart
//! bit 1      locked   - a writer currently owns the node
//! bits 2..   version  - incremented by every completed mutation
//! ```
//!
//! The unlock paths exploit the layout: adding `0b10` to a locked word
//! carries out of the lock bit, clearing it and incrementing the version in
//! one atomic add; adding `0b11` does the same while setting the obsolete
//! flag.
//!
//! # Concurrency Model
//!
//! 1. Readers: [`read_lock`](VersionLock::read_lock) to capture a version,
//!    copy data out, [`read_unlock`](VersionLock::read_unlock) to validate.
//! 2. Writers: [`upgrade_to_write_lock`](VersionLock::upgrade_to_write_lock)
//!    from a captured version (or [`write_lock`](VersionLock::write_lock)
//!    with no prior read), mutate, [`write_unlock`](VersionLock::write_unlock).
//!
//! Every fallible operation returns [`Restart`], which callers handle by
//! abandoning the whole traversal and retrying from the root. Locks are
//! always acquired parent before child along a single root-to-leaf path, so
//! contention degrades to spin-retry and never to deadlock.

use std::hint;
use std::sync::atomic::{fence, AtomicU64};

use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED, WRITE_ORD};

/// Obsolete bit: the node was retired and must not be revisited.
const OBSOLETE_BIT: u64 = 0b01;

/// Lock bit: a writer currently owns the node.
const LOCK_BIT: u64 = 0b10;

// ============================================================================
//  Restart
// ============================================================================

/// Signal that an optimistic read was invalidated by a concurrent writer.
///
/// Carried as the `Err` of every fallible lock operation. The only sane
/// reaction is to discard all state derived from the invalidated read and
/// retry the operation from the tree root; the tree's public operations do
/// exactly that, so `Restart` never reaches external callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Restart;

// ============================================================================
//  VersionLock
// ============================================================================

/// A spin lock fused with a monotonically increasing version counter.
///
/// One `VersionLock` sits at the head of every tree node. The version lets
/// unlocked readers detect concurrent mutation after the fact; the obsolete
/// flag lets retired nodes turn away optimistic traversals that still hold
/// stale pointers to them.
#[derive(Debug)]
pub struct VersionLock {
    value: AtomicU64,
}

impl VersionLock {
    /// Create an unlocked lock with version zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Spin until the lock bit clears, then return the observed word.
    #[inline]
    fn await_unlocked(&self) -> u64 {
        let mut value: u64 = self.value.load(READ_ORD);
        while value & LOCK_BIT != 0 {
            hint::spin_loop();
            value = self.value.load(READ_ORD);
        }
        value
    }

    // ========================================================================
    //  Optimistic Read Operations
    // ========================================================================

    /// Begin an optimistic read: spin while a writer holds the node, then
    /// capture the version.
    ///
    /// # Errors
    /// [`Restart`] if the node has been retired (obsolete flag set); the
    /// pointer the caller followed to get here is permanently stale.
    #[inline]
    pub fn read_lock(&self) -> Result<u64, Restart> {
        let version: u64 = self.await_unlocked();
        if version & OBSOLETE_BIT != 0 {
            return Err(Restart);
        }
        Ok(version)
    }

    /// Finish an optimistic read: validate that nothing mutated the node
    /// since `version` was captured.
    ///
    /// The fence orders the caller's data copies before the re-read, so a
    /// passing check proves the copies were taken from an unmodified node.
    ///
    /// # Errors
    /// [`Restart`] if the version changed or a writer holds the lock.
    #[inline]
    pub fn read_unlock(&self, version: u64) -> Result<(), Restart> {
        fence(READ_ORD);
        if self.value.load(RELAXED) == version {
            Ok(())
        } else {
            Err(Restart)
        }
    }

    /// Mid-traversal validation; identical to [`read_unlock`](Self::read_unlock)
    /// but named for call sites where the optimistic read continues afterwards.
    ///
    /// # Errors
    /// [`Restart`] if the version changed or a writer holds the lock.
    #[inline]
    pub fn check(&self, version: u64) -> Result<(), Restart> {
        self.read_unlock(version)
    }

    // ========================================================================
    //  Write Operations
    // ========================================================================

    /// Atomically transition from (version, unlocked) to (version, locked).
    ///
    /// Success proves the node is exactly as the caller last read it, so
    /// state derived from the optimistic read (search positions, child
    /// indices) remains valid under the lock.
    ///
    /// # Errors
    /// [`Restart`] if the word is not exactly `version` anymore.
    #[inline]
    pub fn upgrade_to_write_lock(&self, version: u64) -> Result<(), Restart> {
        match self
            .value
            .compare_exchange(version, version + LOCK_BIT, CAS_SUCCESS, CAS_FAILURE)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(Restart),
        }
    }

    /// Acquire the write lock with no prior optimistic read, spinning
    /// through contention.
    ///
    /// # Errors
    /// [`Restart`] if the node has been retired.
    #[inline]
    pub fn write_lock(&self) -> Result<(), Restart> {
        loop {
            let version: u64 = self.read_lock()?;
            if self.upgrade_to_write_lock(version).is_ok() {
                return Ok(());
            }
            hint::spin_loop();
        }
    }

    /// Publish a mutation: increment the version and clear the lock bit.
    ///
    /// Must only be called by the thread that acquired the lock.
    #[inline]
    pub fn write_unlock(&self) {
        // Locked word has bit 1 set; adding 0b10 carries into the counter.
        self.value.fetch_add(LOCK_BIT, WRITE_ORD);
    }

    /// Publish a mutation and retire the node: increment the version, set
    /// the obsolete flag, clear the lock bit.
    ///
    /// Used on a node whose key range has been reassigned elsewhere; any
    /// traversal still holding a pointer to it restarts at its next
    /// [`read_lock`](Self::read_lock). Must only be called by the thread
    /// that acquired the lock.
    #[inline]
    pub fn write_unlock_obsolete(&self) {
        self.value.fetch_add(LOCK_BIT | OBSOLETE_BIT, WRITE_ORD);
    }

    // ========================================================================
    //  Inspection
    // ========================================================================

    /// Check whether a writer currently holds the lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.value.load(RELAXED) & LOCK_BIT != 0
    }

    /// Check whether the node has been retired.
    #[inline]
    #[must_use]
    pub fn is_obsolete(&self) -> bool {
        self.value.load(RELAXED) & OBSOLETE_BIT != 0
    }

    /// Get the raw word value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(RELAXED)
    }
}

impl Default for VersionLock {
    fn default() -> Self {
        Self::new()
    }
}
