//! Wire models for the audio node's v4 API, as seen from the client side.

pub mod events;
pub mod tracks;

pub use events::*;
pub use tracks::*;
