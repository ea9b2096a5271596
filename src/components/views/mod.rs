//! Routed pages.

mod home;
mod leaderboard;
mod rank;

pub use home::*;
pub use leaderboard::*;
pub use rank::*;
