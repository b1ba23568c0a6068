pub mod base;
pub mod discord;
pub mod lastfm;
pub mod logging;
pub mod node;
pub mod player;

pub use base::*;
pub use discord::*;
pub use lastfm::*;
pub use logging::*;
pub use node::*;
pub use player::*;
