//! Per-item checkout/return bookkeeping with a FIFO waitlist.
//!
//! Every entry keeps `available_copies + holders.len() == total_copies`, and a
//! holder id is never both holding and waitlisted for the same item.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CheckoutOutcome, LendingSnapshot, LendingState, ReturnOutcome};

#[derive(Debug, Clone)]
struct LendingEntry {
    title: String,
    total_copies: u32,
    available_copies: u32,
    holders: BTreeSet<String>,
    waitlist: VecDeque<String>,
}

impl LendingEntry {
    fn new(title: &str, total_copies: u32) -> Self {
        Self {
            title: title.to_string(),
            total_copies,
            available_copies: total_copies,
            holders: BTreeSet::new(),
            waitlist: VecDeque::new(),
        }
    }

    fn waitlist_position(&self, holder: &str) -> Option<usize> {
        self.waitlist
            .iter()
            .position(|queued| queued == holder)
            .map(|idx| idx + 1)
    }

    /// Hand free copies to the front of the waitlist. Returns who got one.
    fn promote_waiting(&mut self) -> Vec<String> {
        let mut promoted = Vec::new();
        while self.available_copies > 0 {
            let Some(next) = self.waitlist.pop_front() else {
                break;
            };
            self.available_copies -= 1;
            self.holders.insert(next.clone());
            promoted.push(next);
        }
        promoted
    }

    fn check(&self, key: &str) -> CatalogResult<()> {
        let accounted = self.available_copies as usize + self.holders.len();
        if accounted != self.total_copies as usize {
            return Err(CatalogError::InvalidState(format!(
                "{key}: {} available + {} holders != {} copies",
                self.available_copies,
                self.holders.len(),
                self.total_copies
            )));
        }
        if let Some(both) = self.waitlist.iter().find(|id| self.holders.contains(*id)) {
            return Err(CatalogError::InvalidState(format!(
                "{key}: {both} is both holding and waitlisted"
            )));
        }
        let distinct: BTreeSet<&String> = self.waitlist.iter().collect();
        if distinct.len() != self.waitlist.len() {
            return Err(CatalogError::InvalidState(format!(
                "{key}: waitlist contains duplicates"
            )));
        }
        Ok(())
    }

    fn snapshot(&self, key: &str) -> LendingSnapshot {
        LendingSnapshot {
            isbn: key.to_string(),
            title: self.title.clone(),
            total_copies: self.total_copies,
            available_copies: self.available_copies,
            holders: self.holders.iter().cloned().collect(),
            waitlist: self.waitlist.iter().cloned().collect(),
        }
    }
}

/// Saved state of one item, used to undo a transition whose write-through
/// failed.
#[derive(Debug, Clone)]
pub struct LendingCheckpoint {
    key: String,
    entry: LendingEntry,
}

#[derive(Debug, Default)]
pub struct LendingCoordinator {
    items: HashMap<String, LendingEntry>,
}

impl LendingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` with every copy on the shelf. Re-adding a key starts
    /// it over from scratch.
    pub fn add_item(&mut self, key: &str, title: &str, total_copies: u32) {
        self.items
            .insert(key.to_string(), LendingEntry::new(title, total_copies));
    }

    pub fn remove_item(&mut self, key: &str) -> Option<LendingSnapshot> {
        self.items.remove(key).map(|entry| entry.snapshot(key))
    }

    pub fn checkpoint(&self, key: &str) -> Option<LendingCheckpoint> {
        self.items.get(key).map(|entry| LendingCheckpoint {
            key: key.to_string(),
            entry: entry.clone(),
        })
    }

    /// Put an item back exactly as it was when `checkpoint` was taken.
    pub fn restore(&mut self, checkpoint: LendingCheckpoint) {
        debug!(key = %checkpoint.key, "restoring lending checkpoint");
        self.items.insert(checkpoint.key, checkpoint.entry);
    }

    pub fn rename_item(&mut self, key: &str, title: &str) -> bool {
        match self.items.get_mut(key) {
            Some(entry) => {
                entry.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn state(&self, key: &str) -> LendingState {
        match self.items.get(key) {
            None => LendingState::NoCopiesConfigured,
            Some(entry) if entry.available_copies > 0 => LendingState::Available,
            Some(_) => LendingState::FullyCheckedOut,
        }
    }

    /// `true` when `holder` walks away with a copy. An unknown key never
    /// enqueues anyone.
    pub fn check_out(&mut self, holder: &str, key: &str) -> bool {
        self.request(holder, key).is_checked_out()
    }

    /// Detailed form of [`check_out`](Self::check_out). Repeating a request
    /// while holding or already waitlisted changes nothing.
    pub fn request(&mut self, holder: &str, key: &str) -> CheckoutOutcome {
        let Some(entry) = self.items.get_mut(key) else {
            debug!(key, holder, "checkout for unknown item");
            return CheckoutOutcome::UnknownItem;
        };

        let outcome = if entry.holders.contains(holder) {
            CheckoutOutcome::AlreadyHolding
        } else if let Some(position) = entry.waitlist_position(holder) {
            CheckoutOutcome::AlreadyWaitlisted { position }
        } else if entry.available_copies > 0 {
            entry.available_copies -= 1;
            entry.holders.insert(holder.to_string());
            CheckoutOutcome::CheckedOut
        } else {
            entry.waitlist.push_back(holder.to_string());
            CheckoutOutcome::Waitlisted {
                position: entry.waitlist.len(),
            }
        };

        debug_assert!(entry.check(key).is_ok());
        outcome
    }

    /// Give a copy back. Returning an item the holder does not have is an
    /// over-return and is rejected without touching any state.
    pub fn return_item(&mut self, key: &str, holder: &str) -> CatalogResult<ReturnOutcome> {
        let entry = self
            .items
            .get_mut(key)
            .ok_or_else(|| CatalogError::NotFound(format!("Lending record {key}")))?;

        if !entry.holders.remove(holder) {
            warn!(key, holder, "rejected return from non-holder");
            return Err(CatalogError::InvalidState(format!(
                "{holder} does not hold a copy of {key}"
            )));
        }

        let outcome = match entry.waitlist.pop_front() {
            Some(next) => {
                entry.holders.insert(next.clone());
                ReturnOutcome::Promoted(next)
            }
            None => {
                entry.available_copies += 1;
                ReturnOutcome::Restocked
            }
        };

        debug_assert!(entry.check(key).is_ok());
        Ok(outcome)
    }

    /// Change how many copies exist. Fewer copies than current holders is
    /// refused. Any newly freed copies go to the waitlist, front first.
    pub fn set_total_copies(&mut self, key: &str, total: u32) -> CatalogResult<Vec<String>> {
        let entry = self
            .items
            .get_mut(key)
            .ok_or_else(|| CatalogError::NotFound(format!("Lending record {key}")))?;

        let held = entry.holders.len() as u32;
        if total < held {
            return Err(CatalogError::InvalidState(format!(
                "{key} has {held} copies checked out; cannot reduce to {total}"
            )));
        }

        entry.total_copies = total;
        entry.available_copies = total - held;
        let promoted = entry.promote_waiting();

        debug_assert!(entry.check(key).is_ok());
        Ok(promoted)
    }

    /// Drop `holder` from the waitlist of `key`.
    pub fn cancel_reservation(&mut self, key: &str, holder: &str) -> CatalogResult<()> {
        let entry = self
            .items
            .get_mut(key)
            .ok_or_else(|| CatalogError::NotFound(format!("Lending record {key}")))?;
        let idx = entry
            .waitlist
            .iter()
            .position(|queued| queued == holder)
            .ok_or_else(|| CatalogError::NotFound(format!("{holder} on the waitlist for {key}")))?;
        entry.waitlist.remove(idx);
        Ok(())
    }

    pub fn available_copies(&self, key: &str) -> Option<u32> {
        self.items.get(key).map(|entry| entry.available_copies)
    }

    pub fn snapshot(&self, key: &str) -> Option<LendingSnapshot> {
        self.items.get(key).map(|entry| entry.snapshot(key))
    }

    /// Every entry, sorted by key.
    pub fn snapshots(&self) -> Vec<LendingSnapshot> {
        let mut all: Vec<LendingSnapshot> = self
            .items
            .iter()
            .map(|(key, entry)| entry.snapshot(key))
            .collect();
        all.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        all
    }

    /// Verify the copy-accounting invariants for every entry.
    pub fn check_invariants(&self) -> CatalogResult<()> {
        self.items
            .iter()
            .try_for_each(|(key, entry)| entry.check(key))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
