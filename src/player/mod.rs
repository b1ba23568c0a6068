pub mod context;
pub mod loop_mode;
pub mod manager;
pub mod monitor;
pub mod queue;

pub use context::GuildPlayer;
pub use loop_mode::LoopMode;
pub use manager::{PlayOutcome, PlayerManager};
pub use queue::TrackQueue;
