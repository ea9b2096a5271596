//! The components module contains all shared components for our app.

mod app;
mod app_view;
mod icons;
mod navbar;
mod session;
mod song_card;
pub mod views;

pub use app::*;
pub use app_view::*;
pub use icons::*;
pub use navbar::*;
pub use session::*;
pub use song_card::*;
// Views are accessed via views::ViewName
