//! # Playback Queue
//!
//! Ordered list of tracks with a cursor pointing at the current item.
//!
//! The queue is pure state: no I/O and no callbacks. It never wraps around on
//! its own; the coordinator decides what happens when [`Queue::next`] returns
//! `None` (repeat all, or stop at the end).

use core_library::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repeat behaviour applied when a track completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Off → All → One → Off.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator-owned playback queue.
///
/// Invariant: `cursor`, when present, is a valid index into `items`.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<Track>,
    cursor: Option<usize>,
    history: Vec<Track>,
    shuffle_enabled: bool,
    repeat_mode: RepeatMode,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace the queue contents. The cursor starts at `start_index`,
    /// clamped to the last item, and history is cleared.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) {
        self.cursor = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.items = tracks;
        self.history.clear();
    }

    /// Append a track. The cursor is left alone, so appending to an empty
    /// queue does not select anything.
    pub fn add_to_end(&mut self, track: Track) {
        self.items.push(track);
    }

    pub fn add_all_to_end(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.items.extend(tracks);
    }

    /// Insert a track right after the current one. On an empty queue the
    /// track becomes current.
    pub fn insert_next(&mut self, track: Track) {
        match self.cursor {
            Some(cursor) => self.items.insert(cursor + 1, track),
            None if self.items.is_empty() => {
                self.items.push(track);
                self.cursor = Some(0);
            }
            None => self.items.insert(0, track),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.history.clear();
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Advance to the next item. Returns `None` at the last index.
    pub fn next(&mut self) -> Option<Track> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.items.len() {
            return None;
        }
        self.history.push(self.items[cursor].clone());
        self.cursor = Some(cursor + 1);
        self.current().cloned()
    }

    /// Step back one position. Purely positional; history is not consulted.
    pub fn previous(&mut self) -> Option<Track> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.current().cloned()
    }

    pub fn jump_to(&mut self, index: usize) -> Option<Track> {
        if index >= self.items.len() {
            return None;
        }
        if let Some(current) = self.current().cloned() {
            self.history.push(current);
        }
        self.cursor = Some(index);
        self.current().cloned()
    }

    /// Remove the item at `index`, keeping the cursor on the same track when
    /// possible. Removing the current item moves the cursor to the item that
    /// took its place (or the new last item).
    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);

        self.cursor = match self.cursor {
            Some(cursor) if index < cursor => Some(cursor - 1),
            Some(cursor) if index == cursor => {
                if self.items.is_empty() {
                    None
                } else {
                    Some(cursor.min(self.items.len() - 1))
                }
            }
            other => other,
        };

        Some(removed)
    }

    pub fn has_next(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.items.len())
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    // ========================================================================
    // Shuffle & repeat
    // ========================================================================

    /// Randomly reorder the queue. The current track moves to the front and
    /// stays current, so shuffling never interrupts it.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.cursor {
            Some(cursor) => {
                let current = self.items.remove(cursor);
                self.items.shuffle(rng);
                self.items.insert(0, current);
                self.cursor = Some(0);
            }
            None => self.items.shuffle(rng),
        }
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn set_shuffle_enabled(&mut self, enabled: bool) {
        self.shuffle_enabled = enabled;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|cursor| self.items.get(cursor))
    }

    pub fn items(&self) -> &[Track] {
        &self.items
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tracks that were current before each forward move, oldest first.
    pub fn history(&self) -> &[Track] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_library::{LocalResourceHandle, ResourceHandle, TrackId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn track(title: &str) -> Track {
        Track::new(
            Some(title.to_string()),
            Some("Artist".to_string()),
            180.0,
            ResourceHandle::Local(LocalResourceHandle::new(format!("/music/{title}.mp3"))),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn tracks(count: usize) -> Vec<Track> {
        (0..count).map(|i| track(&format!("t{i}"))).collect()
    }

    fn titles(queue: &Queue) -> Vec<String> {
        queue.items().iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_set_queue() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 1);
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().title, "t1");

        queue.set_queue(tracks(2), 10);
        assert_eq!(queue.cursor(), Some(1));

        queue.set_queue(Vec::new(), 0);
        assert_eq!(queue.cursor(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_set_queue_resets_history() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 0);
        queue.next();
        assert_eq!(queue.history().len(), 1);

        queue.set_queue(tracks(3), 0);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn test_next_until_end() {
        for len in 1..6 {
            let mut queue = Queue::new();
            queue.set_queue(tracks(len), 0);
            while queue.has_next() {
                assert!(queue.next().is_some());
            }
            assert_eq!(queue.cursor(), Some(len - 1));
            assert!(queue.next().is_none());
            assert_eq!(queue.cursor(), Some(len - 1));
        }
    }

    #[test]
    fn test_next_records_history() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 0);
        queue.next();
        queue.next();
        let history: Vec<_> = queue.history().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(history, vec!["t0", "t1"]);
    }

    #[test]
    fn test_previous_at_start_is_noop() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 0);
        let before = titles(&queue);

        assert!(queue.previous().is_none());
        assert_eq!(queue.cursor(), Some(0));
        assert_eq!(titles(&queue), before);
        assert!(queue.history().is_empty());
        assert!(!queue.has_previous());
    }

    #[test]
    fn test_previous_on_empty_queue() {
        let mut queue = Queue::new();
        assert!(queue.previous().is_none());
        assert!(queue.next().is_none());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn test_previous_steps_back() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 2);
        assert_eq!(queue.previous().unwrap().title, "t1");
        assert_eq!(queue.cursor(), Some(1));
        assert!(queue.history().is_empty());
    }

    #[test]
    fn test_jump_to() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(4), 0);
        assert_eq!(queue.jump_to(3).unwrap().title, "t3");
        assert_eq!(queue.history().len(), 1);

        assert!(queue.jump_to(4).is_none());
        assert_eq!(queue.cursor(), Some(3));
    }

    #[test]
    fn test_add_to_end_keeps_cursor() {
        let mut queue = Queue::new();
        queue.add_to_end(track("a"));
        assert_eq!(queue.cursor(), None);

        queue.set_queue(tracks(2), 1);
        queue.add_all_to_end(tracks(2));
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.cursor(), Some(1));
    }

    #[test]
    fn test_insert_next() {
        let mut queue = Queue::new();
        queue.insert_next(track("first"));
        assert_eq!(queue.cursor(), Some(0));

        queue.add_to_end(track("last"));
        queue.insert_next(track("middle"));
        assert_eq!(titles(&queue), vec!["first", "middle", "last"]);
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn test_remove_before_cursor() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(4), 2);
        let removed = queue.remove_at(0).unwrap();
        assert_eq!(removed.title, "t0");
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().title, "t2");
    }

    #[test]
    fn test_remove_after_cursor() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(4), 1);
        queue.remove_at(3);
        assert_eq!(queue.cursor(), Some(1));
        assert!(queue.remove_at(10).is_none());
    }

    #[test]
    fn test_remove_current() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(3), 1);
        queue.remove_at(1);
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().title, "t2");

        queue.remove_at(1);
        assert_eq!(queue.cursor(), Some(0));

        queue.remove_at(0);
        assert_eq!(queue.cursor(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_shuffle_keeps_current_first() {
        let mut rng = StdRng::seed_from_u64(7);
        for start in 0..8 {
            let mut queue = Queue::new();
            queue.set_queue(tracks(8), start);
            let current = queue.current().unwrap().id;
            let before: HashSet<TrackId> = queue.items().iter().map(|t| t.id).collect();

            queue.shuffle_with(&mut rng);

            let after: HashSet<TrackId> = queue.items().iter().map(|t| t.id).collect();
            assert_eq!(before, after);
            assert_eq!(queue.len(), 8);
            assert_eq!(queue.cursor(), Some(0));
            assert_eq!(queue.current().unwrap().id, current);
        }
    }

    #[test]
    fn test_shuffle_without_cursor() {
        let mut queue = Queue::new();
        queue.add_all_to_end(tracks(5));
        queue.shuffle();
        assert_eq!(queue.cursor(), None);
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_repeat_mode_cycle() {
        assert_eq!(RepeatMode::Off.cycled(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycled(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycled(), RepeatMode::Off);
        assert_eq!(RepeatMode::default().to_string(), "off");
    }
}
