use crate::{player::queue::TrackQueue, protocol::Track};

/// Per-guild loop setting, cycled by the `loop` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Replay the finished track, ignoring the queue.
    One,
    /// Requeue the finished track at the tail.
    All,
}

impl LoopMode {
    /// Off -> One -> All -> Off. The only mutation the command surface offers.
    pub fn toggle(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::One => "track",
            Self::All => "queue",
        }
    }
}

/// Decide what plays after `finished`, consuming from `queue` as needed.
/// Returns `None` when the player should go idle.
pub fn next_track(mode: LoopMode, finished: Track, queue: &mut TrackQueue) -> Option<Track> {
    match mode {
        LoopMode::One => Some(finished),
        LoopMode::All => {
            queue.enqueue(finished);
            queue.dequeue_next()
        }
        LoopMode::Off => queue.dequeue_next(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
