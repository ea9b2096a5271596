//! Catalog importer: copies anime theme songs from AnimeThemes into the
//! `anime_songs` table the ranking client reads from.
//!
//! Pages are walked season by season from `start_year` to `end_year`, then
//! the long-running series listing. Requests are spaced out to stay under
//! the public API's rate limit and a failing page is retried a bounded
//! number of times before it is skipped.

pub mod anime_themes;

use crate::api::SupabaseClient;
use crate::error::GatewayError;
use crate::utils::sleep_ms;
pub use anime_themes::{
    song_rows, AnimePage, AnimeThemesClient, PageQuery, Season, SongRow, ThemeSource,
};
use chrono::{Datelike, Utc};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SONGS_TABLE: &str = "anime_songs";
pub const DEFAULT_START_YEAR: i32 = 2020;
/// 90 requests per minute.
pub const DEFAULT_DELAY_MS: u64 = 670;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned status {status} for page {page}")]
    Status { status: u16, page: u32 },

    #[error("upsert failed: {0}")]
    Sink(#[from] GatewayError),
}

/// Write side of the importer.
#[allow(async_fn_in_trait)]
pub trait RowSink {
    async fn upsert(&self, rows: &[SongRow]) -> Result<(), GatewayError>;
}

impl RowSink for SupabaseClient {
    async fn upsert(&self, rows: &[SongRow]) -> Result<(), GatewayError> {
        self.upsert_rows(SONGS_TABLE, rows).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub start_year: i32,
    pub end_year: i32,
    pub delay_ms: u64,
    pub retry_delay_ms: u64,
    /// Extra attempts for a failing page before it is skipped.
    pub max_retries: u32,
    pub long_runners: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            start_year: DEFAULT_START_YEAR,
            end_year: Utc::now().year(),
            delay_ms: DEFAULT_DELAY_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            long_runners: true,
        }
    }
}

impl ImportOptions {
    /// Listings in the order they are walked.
    pub fn queries(&self) -> Vec<PageQuery> {
        let mut queries: Vec<PageQuery> = (self.start_year..=self.end_year)
            .flat_map(|year| {
                Season::ALL
                    .into_iter()
                    .map(move |season| PageQuery::Season { year, season })
            })
            .collect();
        if self.long_runners {
            queries.push(PageQuery::LongRunners);
        }
        queries
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub pages: usize,
    pub rows: usize,
    pub failed_pages: usize,
}

pub struct SongImporter<Src, S> {
    source: Src,
    sink: S,
    options: ImportOptions,
}

impl<Src: ThemeSource, S: RowSink> SongImporter<Src, S> {
    pub fn new(source: Src, sink: S, options: ImportOptions) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub async fn run(&self) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for query in self.options.queries() {
            self.import_listing(&query, &mut summary).await;
        }
        info!(
            pages = summary.pages,
            rows = summary.rows,
            failed_pages = summary.failed_pages,
            "import finished"
        );
        summary
    }

    async fn import_listing(&self, query: &PageQuery, summary: &mut ImportSummary) {
        let mut page = 1;
        loop {
            let data = match self
                .with_retries(move || self.source.fetch_page(query, page))
                .await
            {
                Ok(data) => data,
                Err(err) => {
                    // Without the page we cannot tell whether another follows.
                    warn!(%err, %query, page, "giving up on listing");
                    summary.failed_pages += 1;
                    return;
                }
            };

            let mut page_failed = false;
            for anime in &data.anime {
                let rows = song_rows(anime, Utc::now());
                if rows.is_empty() {
                    continue;
                }
                let batch = rows.as_slice();
                match self.with_retries(move || self.upsert(batch)).await {
                    Ok(()) => summary.rows += rows.len(),
                    Err(err) => {
                        warn!(%err, anime = anime.id, "skipping anime");
                        page_failed = true;
                    }
                }
            }

            summary.pages += 1;
            if page_failed {
                summary.failed_pages += 1;
            }
            debug!(%query, page, anime = data.anime.len(), "page imported");

            if !data.has_next() {
                return;
            }
            page += 1;
            sleep_ms(self.options.delay_ms).await;
        }
    }

    async fn upsert(&self, rows: &[SongRow]) -> Result<(), ImportError> {
        Ok(self.sink.upsert(rows).await?)
    }

    async fn with_retries<T, F, Fut>(&self, mut attempt: F) -> Result<T, ImportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ImportError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if retries < self.options.max_retries => {
                    retries += 1;
                    warn!(%err, retry = retries, "request failed, retrying");
                    sleep_ms(self.options.retry_delay_ms).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::anime_themes::{Anime, AnimeTheme, PageLinks, ThemeEntry};
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    fn anime(id: i64, themes: &[(&str, u32)]) -> Anime {
        Anime {
            id,
            name: format!("Show {id}"),
            year: Some(2021),
            season: Some("Winter".into()),
            animethemes: themes
                .iter()
                .map(|(kind, sequence)| AnimeTheme {
                    theme_type: kind.to_string(),
                    sequence: Some(*sequence),
                    song: None,
                    animethemeentries: vec![ThemeEntry::default()],
                })
                .collect(),
            ..Anime::default()
        }
    }

    fn page(anime: Vec<Anime>, next: bool) -> AnimePage {
        AnimePage {
            anime,
            links: PageLinks {
                next: next.then(|| "next".to_string()),
            },
        }
    }

    /// Serves canned pages; anything not listed is an empty last page.
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<(String, u32), AnimePage>,
        failures: RefCell<HashMap<(String, u32), u32>>,
        calls: RefCell<Vec<(String, u32)>>,
    }

    impl FakeSource {
        fn with_page(mut self, query: PageQuery, number: u32, data: AnimePage) -> Self {
            self.pages.insert((query.to_string(), number), data);
            self
        }

        fn failing(self, query: PageQuery, number: u32, times: u32) -> Self {
            self.failures
                .borrow_mut()
                .insert((query.to_string(), number), times);
            self
        }
    }

    impl ThemeSource for FakeSource {
        async fn fetch_page(&self, query: &PageQuery, page: u32) -> Result<AnimePage, ImportError> {
            let key = (query.to_string(), page);
            self.calls.borrow_mut().push(key.clone());
            if let Some(left) = self.failures.borrow_mut().get_mut(&key) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ImportError::Status { status: 503, page });
                }
            }
            Ok(self.pages.get(&key).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: RefCell<Vec<Vec<String>>>,
        fail_next: Cell<u32>,
    }

    impl RowSink for RecordingSink {
        async fn upsert(&self, rows: &[SongRow]) -> Result<(), GatewayError> {
            if self.fail_next.get() > 0 {
                self.fail_next.set(self.fail_next.get() - 1);
                return Err(GatewayError::Network("connection reset".into()));
            }
            self.batches
                .borrow_mut()
                .push(rows.iter().map(|row| row.id.clone()).collect());
            Ok(())
        }
    }

    fn options() -> ImportOptions {
        ImportOptions {
            start_year: 2021,
            end_year: 2021,
            delay_ms: 0,
            retry_delay_ms: 0,
            max_retries: 2,
            long_runners: false,
        }
    }

    const WINTER: PageQuery = PageQuery::Season {
        year: 2021,
        season: Season::Winter,
    };

    #[test]
    fn queries_walk_years_then_long_runners() {
        let opts = ImportOptions {
            start_year: 2020,
            end_year: 2021,
            long_runners: true,
            ..options()
        };
        let queries = opts.queries();
        assert_eq!(queries.len(), 9);
        assert_eq!(
            queries[0],
            PageQuery::Season {
                year: 2020,
                season: Season::Winter
            }
        );
        assert_eq!(
            queries[7],
            PageQuery::Season {
                year: 2021,
                season: Season::Fall
            }
        );
        assert_eq!(queries[8], PageQuery::LongRunners);
    }

    #[tokio::test]
    async fn follows_next_links_and_upserts_per_anime() {
        let source = FakeSource::default()
            .with_page(WINTER, 1, page(vec![anime(1, &[("OP", 1), ("ED", 1)])], true))
            .with_page(WINTER, 2, page(vec![anime(2, &[("OP", 1)])], false));
        let importer = SongImporter::new(source, RecordingSink::default(), options());

        let summary = importer.run().await;

        // Two winter pages plus one empty page for each other season
        assert_eq!(summary.pages, 5);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.failed_pages, 0);
        assert_eq!(
            *importer.sink.batches.borrow(),
            vec![
                vec!["1-OP-1".to_string(), "1-ED-1".to_string()],
                vec!["2-OP-1".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_theme_ids_are_collapsed_before_upsert() {
        let source = FakeSource::default().with_page(
            WINTER,
            1,
            page(vec![anime(7, &[("OP", 1), ("OP", 1)])], false),
        );
        let importer = SongImporter::new(source, RecordingSink::default(), options());

        let summary = importer.run().await;

        assert_eq!(summary.rows, 1);
        assert_eq!(*importer.sink.batches.borrow(), vec![vec!["7-OP-1".to_string()]]);
    }

    #[tokio::test]
    async fn transient_page_failure_is_retried() {
        let source = FakeSource::default()
            .with_page(WINTER, 1, page(vec![anime(1, &[("OP", 1)])], false))
            .failing(WINTER, 1, 2);
        let importer = SongImporter::new(source, RecordingSink::default(), options());

        let summary = importer.run().await;

        assert_eq!(summary.rows, 1);
        assert_eq!(summary.failed_pages, 0);
        let winter_calls = importer
            .source
            .calls
            .borrow()
            .iter()
            .filter(|(query, _)| query == "winter 2021")
            .count();
        assert_eq!(winter_calls, 3);
    }

    #[tokio::test]
    async fn page_is_skipped_after_retries_run_out() {
        let source = FakeSource::default()
            .with_page(WINTER, 1, page(vec![anime(1, &[("OP", 1)])], false))
            .failing(WINTER, 1, 10);
        let importer = SongImporter::new(source, RecordingSink::default(), options());

        let summary = importer.run().await;

        assert_eq!(summary.failed_pages, 1);
        assert_eq!(summary.rows, 0);
        // The remaining seasons are still imported
        assert_eq!(summary.pages, 3);
    }

    #[tokio::test]
    async fn failing_upsert_is_retried_then_skipped() {
        let source = FakeSource::default().with_page(
            WINTER,
            1,
            page(vec![anime(1, &[("OP", 1)]), anime(2, &[("OP", 1)])], false),
        );
        let sink = RecordingSink::default();
        sink.fail_next.set(3);
        let importer = SongImporter::new(source, sink, options());

        let summary = importer.run().await;

        assert_eq!(summary.failed_pages, 1);
        assert_eq!(summary.rows, 1);
        assert_eq!(*importer.sink.batches.borrow(), vec![vec!["2-OP-1".to_string()]]);
    }
}
