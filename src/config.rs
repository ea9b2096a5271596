use crate::error::ConfigError;

/// Songs requested per gateway call.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Undisplayed songs at or below which a background refill starts.
pub const DEFAULT_REFILL_THRESHOLD: usize = 4;
/// Songs past the displayed pair whose media is warmed up.
pub const DEFAULT_PRELOAD_COUNT: usize = 2;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 50;
pub const DEFAULT_OAUTH_PROVIDER: &str = "google";

const URL_BUILD_ENV: Option<&str> = option_env!("ANITUNES_SUPABASE_URL");
const KEY_BUILD_ENV: Option<&str> = option_env!("ANITUNES_SUPABASE_ANON_KEY");

/// Buffer sizing for the song queue controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    batch_size: usize,
    refill_threshold: usize,
    preload_count: usize,
}

impl QueueConfig {
    pub fn new(
        batch_size: usize,
        refill_threshold: usize,
        preload_count: usize,
    ) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        if refill_threshold < 2 || refill_threshold % 2 != 0 {
            return Err(ConfigError::InvalidThreshold {
                threshold: refill_threshold,
            });
        }
        if refill_threshold >= batch_size {
            return Err(ConfigError::ThresholdTooLarge {
                threshold: refill_threshold,
                batch_size,
            });
        }
        Ok(Self {
            batch_size,
            refill_threshold,
            preload_count,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn refill_threshold(&self) -> usize {
        self.refill_threshold
    }

    pub fn preload_count(&self) -> usize {
        self.preload_count
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            refill_threshold: DEFAULT_REFILL_THRESHOLD,
            preload_count: DEFAULT_PRELOAD_COUNT,
        }
    }
}

/// Everything the client needs to reach the hosted backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub oauth_provider: String,
    pub queue: QueueConfig,
    pub leaderboard_size: usize,
}

impl AppConfig {
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into().trim().trim_end_matches('/').to_string(),
            supabase_anon_key: supabase_anon_key.into().trim().to_string(),
            oauth_provider: DEFAULT_OAUTH_PROVIDER.to_string(),
            queue: QueueConfig::default(),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        }
    }

    /// Values baked in at build time, falling back to the process environment
    /// on native targets.
    pub fn from_env() -> Self {
        let url = URL_BUILD_ENV
            .map(str::to_string)
            .or_else(|| runtime_env("ANITUNES_SUPABASE_URL"))
            .unwrap_or_default();
        let key = KEY_BUILD_ENV
            .map(str::to_string)
            .or_else(|| runtime_env("ANITUNES_SUPABASE_ANON_KEY"))
            .unwrap_or_default();
        Self::new(url, key)
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn runtime_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(target_arch = "wasm32")]
fn runtime_env(_name: &str) -> Option<String> {
    None
}
