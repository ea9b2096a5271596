//! Defines the application routes.

use crate::components::views::{HomeView, LeaderboardView, RankView};
use crate::components::AppShell;
use dioxus::prelude::*;

#[derive(Routable, Clone, PartialEq, Debug)]
#[rustfmt::skip]
pub enum AppView {
    #[layout(AppShell)]
        #[route("/")]
        HomeView {},
        #[route("/rank")]
        RankView {},
        #[route("/leaderboard")]
        LeaderboardView {},
}

pub fn view_label(view: &AppView) -> &'static str {
    match view {
        AppView::HomeView {} => "Home",
        AppView::RankView {} => "Rank",
        AppView::LeaderboardView {} => "Leaderboard",
    }
}

/// Links shown in the navigation bar, in order.
pub fn nav_links() -> [AppView; 3] {
    [
        AppView::HomeView {},
        AppView::RankView {},
        AppView::LeaderboardView {},
    ]
}
