//! Read side of the importer: the public AnimeThemes catalog API.

use super::ImportError;
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const ANIME_THEMES_URL: &str = "https://api.animethemes.moe/anime";
pub const IMAGE_BASE_URL: &str = "https://animethemes.moe/image";
const PAGE_SIZE: u32 = 100;
const INCLUDES: &str = "animethemes.song.artists,animethemes.animethemeentries.videos,images";

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

/// One paginated listing walked by the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageQuery {
    Season { year: i32, season: Season },
    /// TV series with 50 or more episodes, whatever their airing season.
    LongRunners,
}

impl PageQuery {
    pub fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = match self {
            PageQuery::Season { year, season } => vec![
                ("filter[year]", year.to_string()),
                ("filter[season]", season.as_str().to_string()),
                ("fields[anime]", "id,name,slug,year,season".to_string()),
                ("fields[image]", "path".to_string()),
            ],
            PageQuery::LongRunners => vec![
                ("filter[type]", "TV".to_string()),
                ("filter[episode_count][ge]", "50".to_string()),
            ],
        };
        params.extend([
            ("filter[has]", "animethemes".to_string()),
            ("include", INCLUDES.to_string()),
            ("page[size]", PAGE_SIZE.to_string()),
            ("page[number]", page.to_string()),
        ]);
        params
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageQuery::Season { year, season } => write!(f, "{} {}", season.as_str(), year),
            PageQuery::LongRunners => f.write_str("long runners"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct AnimePage {
    #[serde(default)]
    pub anime: Vec<Anime>,
    #[serde(default)]
    pub links: PageLinks,
}

impl AnimePage {
    pub fn has_next(&self) -> bool {
        self.links.next.as_deref().is_some_and(|next| !next.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Anime {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub images: Vec<AnimeImage>,
    #[serde(default)]
    pub animethemes: Vec<AnimeTheme>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct AnimeImage {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct AnimeTheme {
    #[serde(rename = "type", default)]
    pub theme_type: String,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub song: Option<ThemeSong>,
    #[serde(default)]
    pub animethemeentries: Vec<ThemeEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ThemeSong {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ThemeEntry {
    #[serde(default)]
    pub videos: Vec<ThemeVideo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ThemeVideo {
    pub link: String,
}

/// A row of the `anime_songs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRow {
    pub id: String,
    pub created_at: String,
    pub year: i32,
    pub season: String,
    pub title: String,
    pub artist: String,
    #[serde(rename = "type")]
    pub song_type: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub rating: f64,
    pub matches_played: u32,
}

/// Flattens one anime into table rows, one per theme entry. Entries that
/// share an id (same type and sequence) collapse to the first one.
pub fn song_rows(anime: &Anime, now: DateTime<Utc>) -> Vec<SongRow> {
    let year = anime.year.unwrap_or_else(|| now.year());
    let season = anime
        .season
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let image_url = anime
        .images
        .iter()
        .filter_map(|image| image.path.as_deref())
        .find(|path| !path.is_empty())
        .map(|path| format!("{IMAGE_BASE_URL}/{path}"));
    let created_at = now.to_rfc3339();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for theme in &anime.animethemes {
        let sequence = theme.sequence.unwrap_or(1);
        let id = format!("{}-{}-{}", anime.id, theme.theme_type, sequence);
        let (title, artist) = match &theme.song {
            Some(song) => (
                song.title.clone().unwrap_or_default(),
                song.artists
                    .iter()
                    .map(|artist| artist.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            None => (String::new(), String::new()),
        };

        for entry in &theme.animethemeentries {
            if !seen.insert(id.clone()) {
                continue;
            }
            rows.push(SongRow {
                id: id.clone(),
                created_at: created_at.clone(),
                year,
                season: season.clone(),
                title: title.clone(),
                artist: artist.clone(),
                song_type: format!("{} {}", theme.theme_type, sequence),
                image_url: image_url.clone(),
                video_url: entry.videos.first().map(|video| video.link.clone()),
                rating: 0.0,
                matches_played: 0,
            });
        }
    }
    rows
}

/// Where catalog pages come from.
#[allow(async_fn_in_trait)]
pub trait ThemeSource {
    async fn fetch_page(&self, query: &PageQuery, page: u32) -> Result<AnimePage, ImportError>;
}

#[derive(Debug, Clone)]
pub struct AnimeThemesClient {
    base_url: String,
}

impl AnimeThemesClient {
    pub fn new() -> Self {
        Self::with_base_url(ANIME_THEMES_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for AnimeThemesClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeSource for AnimeThemesClient {
    async fn fetch_page(&self, query: &PageQuery, page: u32) -> Result<AnimePage, ImportError> {
        let response = HTTP_CLIENT
            .get(&self.base_url)
            .query(&query.params(page))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                status: status.as_u16(),
                page,
            });
        }
        Ok(response.json::<AnimePage>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn anime_json() -> Anime {
        serde_json::from_str(
            r#"{
                "id": 11,
                "name": "Demon Slayer",
                "year": 2019,
                "season": "Spring",
                "images": [{"path": null}, {"path": "anime/demon-slayer.png"}],
                "animethemes": [
                    {
                        "type": "OP",
                        "sequence": 1,
                        "song": {"title": "Gurenge", "artists": [{"name": "LiSA"}]},
                        "animethemeentries": [
                            {"videos": [{"link": "https://v.animethemes.moe/KnY-OP1.webm"}]},
                            {"videos": [{"link": "https://v.animethemes.moe/KnY-OP1v2.webm"}]}
                        ]
                    },
                    {
                        "type": "ED",
                        "sequence": null,
                        "song": {"title": "from the edge", "artists": [{"name": "FictionJunction"}, {"name": "LiSA"}]},
                        "animethemeentries": [{"videos": []}]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn rows_follow_table_layout() {
        let rows = song_rows(&anime_json(), now());
        assert_eq!(rows.len(), 2);

        let op = &rows[0];
        assert_eq!(op.id, "11-OP-1");
        assert_eq!(op.song_type, "OP 1");
        assert_eq!(op.title, "Gurenge");
        assert_eq!(op.artist, "LiSA");
        assert_eq!(op.year, 2019);
        assert_eq!(op.season, "Spring");
        assert_eq!(
            op.image_url.as_deref(),
            Some("https://animethemes.moe/image/anime/demon-slayer.png")
        );
        assert_eq!(op.video_url.as_deref(), Some("https://v.animethemes.moe/KnY-OP1.webm"));
        assert_eq!(op.rating, 0.0);
        assert_eq!(op.matches_played, 0);
    }

    #[test]
    fn missing_sequence_becomes_one_and_artists_are_joined() {
        let rows = song_rows(&anime_json(), now());
        let ed = &rows[1];
        assert_eq!(ed.id, "11-ED-1");
        assert_eq!(ed.song_type, "ED 1");
        assert_eq!(ed.artist, "FictionJunction, LiSA");
        assert_eq!(ed.video_url, None);
    }

    #[test]
    fn missing_year_and_season_get_defaults() {
        let anime = Anime {
            id: 3,
            name: "Mystery".into(),
            animethemes: vec![AnimeTheme {
                theme_type: "OP".into(),
                sequence: Some(2),
                song: None,
                animethemeentries: vec![ThemeEntry::default()],
            }],
            ..Anime::default()
        };
        let rows = song_rows(&anime, now());
        assert_eq!(rows[0].year, 2024);
        assert_eq!(rows[0].season, "unknown");
        assert_eq!(rows[0].image_url, None);
        assert!(rows[0].title.is_empty());
    }

    #[test]
    fn row_serializes_type_column() {
        let rows = song_rows(&anime_json(), now());
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(value["type"], "OP 1");
        assert!(value.get("song_type").is_none());
    }

    #[test]
    fn season_query_params() {
        let query = PageQuery::Season {
            year: 2021,
            season: Season::Fall,
        };
        let params = query.params(3);
        assert!(params.contains(&("filter[year]", "2021".to_string())));
        assert!(params.contains(&("filter[season]", "fall".to_string())));
        assert!(params.contains(&("page[number]", "3".to_string())));
        assert!(params.contains(&("page[size]", "100".to_string())));
        assert_eq!(query.to_string(), "fall 2021");
    }

    #[test]
    fn long_runner_query_params() {
        let params = PageQuery::LongRunners.params(1);
        assert!(params.contains(&("filter[episode_count][ge]", "50".to_string())));
        assert!(params.contains(&("filter[type]", "TV".to_string())));
        assert!(!params.iter().any(|(key, _)| *key == "filter[year]"));
    }

    #[test]
    fn page_links() {
        let page: AnimePage =
            serde_json::from_str(r#"{"anime": [], "links": {"next": "https://api/next"}}"#).unwrap();
        assert!(page.has_next());
        let last: AnimePage = serde_json::from_str(r#"{"anime": [], "links": {"next": null}}"#).unwrap();
        assert!(!last.has_next());
        assert!(!AnimePage::default().has_next());
    }
}
