use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::protocol::Track;

/// Ordered list of pending tracks for one guild. Insertion order is
/// playback order. No capacity bound.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail.
    pub fn enqueue(&mut self, track: Track) {
        self.items.push_back(track);
    }

    /// Remove and return the head, or `None` when empty.
    pub fn dequeue_next(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Randomly permute the remaining order.
    pub fn shuffle(&mut self) {
        self.items
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackInfo;

    fn track(title: &str) -> Track {
        Track {
            encoded: format!("encoded:{}", title),
            info: TrackInfo {
                title: title.into(),
                ..TrackInfo::default()
            },
            plugin_info: serde_json::json!({}),
            user_data: serde_json::json!({}),
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.enqueue(track("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue_next().unwrap().info.title, "a");
        assert_eq!(queue.dequeue_next().unwrap().info.title, "b");
        assert_eq!(queue.dequeue_next().unwrap().info.title, "c");
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_clear_empties_queue() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_shuffle_preserves_contents() {
        let mut queue = TrackQueue::new();
        for i in 0..20 {
            queue.enqueue(track(&format!("t{}", i)));
        }
        queue.shuffle();
        assert_eq!(queue.len(), 20);

        let mut titles: Vec<String> = queue.iter().map(|t| t.info.title.clone()).collect();
        titles.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("t{}", i)).collect();
        expected.sort();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_shuffle_of_empty_queue_is_noop() {
        let mut queue = TrackQueue::new();
        queue.shuffle();
        assert!(queue.is_empty());
    }
}
