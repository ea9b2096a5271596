use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque song identifier handed out by the gateway.
///
/// The catalog has used both integer keys and composite string keys, so
/// either JSON form is accepted and the value is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SongId(String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for SongId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for SongId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Numeric keys go back out as numbers so RPC parameters typed as
        // bigint still match.
        match self.0.parse::<i64>() {
            Ok(number) => serializer.serialize_i64(number),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for SongId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(number) => SongId(number.to_string()),
            RawId::Text(text) => SongId(text),
        })
    }
}

/// A song as returned by the gateway. Rating fields are snapshots taken at
/// fetch time and are never updated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Song {
    pub id: SongId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, rename = "type")]
    pub song_type: String,
    #[serde(default)]
    pub anime_id: Option<i64>,
    #[serde(default, alias = "video_url")]
    pub video: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_deviation: f64,
    #[serde(default)]
    pub matches_played: u32,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub anime_name: Option<String>,
    #[serde(default)]
    pub anime_season: Option<String>,
    #[serde(default)]
    pub anime_year: Option<i32>,
    #[serde(default)]
    pub anime_image: Option<String>,
}

impl Song {
    pub fn display_artist(&self) -> &str {
        let artist = self.artist.trim();
        if artist.is_empty() {
            "Unknown artist"
        } else {
            artist
        }
    }

    pub fn has_video(&self) -> bool {
        self.video
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }

    /// Badges shown under the title: song type, then show name.
    pub fn tags(&self) -> Vec<&str> {
        [Some(self.song_type.as_str()), self.anime_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// "Fall 2023" style label for the show, when known.
    pub fn show_label(&self) -> Option<String> {
        let season = self
            .anime_season
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("unknown"))
            .map(capitalize);
        match (season, self.anime_year) {
            (Some(season), Some(year)) => Some(format!("{season} {year}")),
            (Some(season), None) => Some(season),
            (None, Some(year)) => Some(year.to_string()),
            (None, None) => None,
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Outcome of one pairwise pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub winner_id: SongId,
    pub loser_id: SongId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Provider user name when present, otherwise the email address.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Signed in")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub song: Song,
}

/// Assigns 1-based ranks in the order the gateway returned them.
pub fn rank_songs(songs: Vec<Song>) -> Vec<LeaderboardEntry> {
    songs
        .into_iter()
        .enumerate()
        .map(|(index, song)| LeaderboardEntry {
            rank: index + 1,
            song,
        })
        .collect()
}

pub fn format_rating(rating: f64, deviation: f64) -> String {
    if deviation > 0.0 {
        format!("{:.0} ± {:.0}", rating, deviation)
    } else {
        format!("{:.0}", rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_accepts_numeric_and_text_ids() {
        let numeric: Song = serde_json::from_str(
            r#"{"id": 42, "title": "Gurenge", "artist": "LiSA", "type": "OP1",
                "video": "https://v.animethemes.moe/x.webm", "rating": 1520.5,
                "rating_deviation": 80.0, "matches_played": 12,
                "anime_name": "Demon Slayer", "anime_season": "spring", "anime_year": 2019}"#,
        )
        .unwrap();
        assert_eq!(numeric.id, SongId::new("42"));
        assert_eq!(numeric.song_type, "OP1");
        assert_eq!(numeric.matches_played, 12);
        assert_eq!(numeric.show_label().as_deref(), Some("Spring 2019"));

        let text: Song = serde_json::from_str(r#"{"id": "123-OP-1", "title": "x"}"#).unwrap();
        assert_eq!(text.id.as_str(), "123-OP-1");
        assert_eq!(text.rating, 0.0);
        assert!(!text.has_video());
    }

    #[test]
    fn numeric_ids_serialize_as_numbers() {
        let comparison = Comparison {
            winner_id: SongId::from(7_i64),
            loser_id: SongId::new("12-ED-1"),
        };
        let json = serde_json::to_value(&comparison).unwrap();
        assert_eq!(json["winner_id"], serde_json::json!(7));
        assert_eq!(json["loser_id"], serde_json::json!("12-ED-1"));
    }

    #[test]
    fn tags_skip_blank_values() {
        let song = Song {
            song_type: "ED 2".into(),
            anime_name: Some("  ".into()),
            ..Song::default()
        };
        assert_eq!(song.tags(), vec!["ED 2"]);
    }

    #[test]
    fn profile_label_falls_back_to_email() {
        let profile = UserProfile {
            id: "u1".into(),
            email: Some("fan@example.com".into()),
            display_name: None,
            avatar_url: None,
        };
        assert_eq!(profile.label(), "fan@example.com");
    }

    #[test]
    fn ranks_start_at_one() {
        let ranked = rank_songs(vec![Song::default(), Song::default()]);
        assert_eq!(ranked.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(format_rating(1500.4, 0.0), "1500");
        assert_eq!(format_rating(1500.4, 61.2), "1500 ± 61");
    }

    #[test]
    fn blank_video_url_is_not_playable() {
        let mut song = Song {
            video: Some("   ".to_string()),
            ..Song::default()
        };
        assert!(!song.has_video());

        song.video = Some("https://v.animethemes.moe/x.webm".to_string());
        assert!(song.has_video());
    }
}
