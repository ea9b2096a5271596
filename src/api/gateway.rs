//! Contract of the remote data gateway.
//!
//! Random sampling, rating math and persistence all happen behind these
//! calls; the client only consumes their results.

use crate::api::models::{Comparison, Song};
use crate::error::GatewayError;

pub const RANDOM_SONGS_RPC: &str = "get_n_random_songs";
pub const SUBMIT_COMPARISON_RPC: &str = "submit_comparison";
pub const LEADERBOARD_RPC: &str = "get_leaderboard";

#[allow(async_fn_in_trait)]
pub trait SongGateway {
    /// Up to `count` randomly sampled songs, in no particular order.
    async fn random_songs(&self, count: usize) -> Result<Vec<Song>, GatewayError>;

    async fn submit_comparison(&self, comparison: &Comparison) -> Result<(), GatewayError>;

    /// Top songs ordered by rating, highest first.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<Song>, GatewayError>;
}
