use std::collections::VecDeque;
use tracing::{debug, info};

use super::track::{RepeatMode, Track};

pub const ITEMS_PER_PAGE: usize = 10;

/// Ordered track queue plus the current slot.
///
/// Selection of the next track lives here so the repeat rules can be checked
/// without a running session.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    repeat_mode: RepeatMode,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the 1-based position in the queue.
    pub fn push(&mut self, track: Track) -> usize {
        info!("➕ Queued: {}", track.title);
        self.items.push_back(track);
        self.items.len()
    }

    /// Puts a track straight into the current slot, bypassing the queue.
    pub fn promote(&mut self, track: Track) {
        debug!("⏫ Promoted to current: {}", track.title);
        self.current = Some(track);
    }

    /// Chooses the next current track according to the repeat mode.
    ///
    /// RepeatOne keeps the current track and leaves the queue alone.
    /// RepeatAll re-appends the finished track before popping the head, so
    /// the rotation never drops or duplicates an entry.
    pub fn advance(&mut self) -> Option<&Track> {
        match (self.repeat_mode, self.current.take()) {
            (RepeatMode::RepeatOne, Some(track)) => {
                info!("🔂 Repeating: {}", track.title);
                self.current = Some(track);
            }
            (RepeatMode::RepeatAll, Some(track)) => {
                debug!("🔁 Rotating to the tail: {}", track.title);
                self.items.push_back(track);
                self.current = self.items.pop_front();
            }
            _ => {
                self.current = self.items.pop_front();
            }
        }

        match &self.current {
            Some(track) => info!("➡️ Next up: {}", track.title),
            None => info!("📭 Queue exhausted"),
        }
        self.current.as_ref()
    }

    /// Drops the current track without re-queueing it.
    pub fn discard_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    /// Empties the queue, keeping the current track. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        info!("🗑️ Queue cleared: {} tracks removed", removed);
        removed
    }

    /// Empties both the queue and the current slot.
    pub fn reset(&mut self) {
        self.items.clear();
        self.current = None;
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.next();
        info!("🔁 Repeat mode: {}", self.repeat_mode);
        self.repeat_mode
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}

/// One page of the queue as shown to users.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    /// Zero-based page index after clamping.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Entries on this page with their 1-based queue position.
    pub entries: Vec<(usize, Track)>,
}

impl QueuePage {
    /// Builds a page, clamping `page` to `[0, ceil(len / 10) - 1]`.
    pub fn new(tracks: &[Track], page: usize) -> Self {
        let total_items = tracks.len();
        let total_pages = total_items.div_ceil(ITEMS_PER_PAGE).max(1);
        let page = page.min(total_pages - 1);
        let start = page * ITEMS_PER_PAGE;

        let entries = tracks
            .iter()
            .enumerate()
            .skip(start)
            .take(ITEMS_PER_PAGE)
            .map(|(index, track)| (index + 1, track.clone()))
            .collect();

        Self {
            page,
            total_pages,
            total_items,
            entries,
        }
    }

    /// Tracks after the end of this page.
    pub fn remaining_after(&self) -> usize {
        self.total_items
            .saturating_sub((self.page + 1) * ITEMS_PER_PAGE)
    }

    pub fn is_first(&self) -> bool {
        self.page == 0
    }

    pub fn is_last(&self) -> bool {
        self.page + 1 >= self.total_pages
    }
}
