/// Utility helpers for AniTunes

/// Wall clock in milliseconds. Safe on wasm, unlike `std::time::Instant`.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Sleep that works on both the browser event loop and native runtimes.
#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep_ms(ms: u64) {
    gloo_timers::future::TimeoutFuture::new(ms.min(u32::MAX as u64) as u32).await;
}
