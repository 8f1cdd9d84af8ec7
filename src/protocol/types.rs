//! Core protocol types
//!
//! Fundamental types used throughout the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL of one mirror
///
/// Opaque apart from normalization at construction: surrounding whitespace
/// and trailing slashes are stripped, after which equality is plain string
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Create an endpoint from a base URL
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(url.as_ref().trim().trim_end_matches('/').to_string())
    }

    /// Get the base URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a request path onto this base URL.
    ///
    /// The path keeps whatever query string it already carries.
    pub fn join(&self, path: &str) -> String {
        if path.is_empty() {
            self.0.clone()
        } else if path.starts_with('/') || path.starts_with('?') {
            format!("{}{}", self.0, path)
        } else {
            format!("{}/{}", self.0, path)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Class of request whose fastest mirror is tracked independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Personalized recommendations
    Recommend,
    /// Playlist listings and details
    Playlist,
    /// Keyword search
    Search,
    /// Artist pages
    Artist,
    /// Album pages
    Album,
    /// Lyrics
    Lyrics,
    /// Comment threads
    Comments,
    /// Song details and playable URLs
    Song,
}

impl Category {
    /// Every category, in a fixed order
    pub const ALL: [Category; 8] = [
        Category::Recommend,
        Category::Playlist,
        Category::Search,
        Category::Artist,
        Category::Album,
        Category::Lyrics,
        Category::Comments,
        Category::Song,
    ];

    /// Lowercase name, also used in persistence keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommend => "recommend",
            Self::Playlist => "playlist",
            Self::Search => "search",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Lyrics => "lyrics",
            Self::Comments => "comments",
            Self::Song => "song",
        }
    }

    /// Cheap request representative of this category's real traffic
    pub fn default_probe_path(&self) -> &'static str {
        match self {
            Self::Recommend => "/personalized?limit=1",
            Self::Playlist => "/top/playlist?limit=1",
            Self::Search => "/search?keywords=hello&limit=1",
            Self::Artist => "/top/artists?limit=1",
            Self::Album => "/album/newest",
            Self::Lyrics => "/lyric?id=33894312",
            Self::Comments => "/comment/music?id=33894312&limit=1",
            Self::Song => "/song/detail?ids=33894312",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommend" => Ok(Self::Recommend),
            "playlist" => Ok(Self::Playlist),
            "search" => Ok(Self::Search),
            "artist" => Ok(Self::Artist),
            "album" => Ok(Self::Album),
            "lyrics" | "lyric" => Ok(Self::Lyrics),
            "comments" | "comment" => Ok(Self::Comments),
            "song" => Ok(Self::Song),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

/// The endpoint that last won a race for a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Category this entry belongs to
    pub category: Category,
    /// Winning endpoint
    pub endpoint: Endpoint,
    /// When the endpoint won (or when it was persisted, for warm-started entries)
    pub won_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(category: Category, endpoint: Endpoint) -> Self {
        Self {
            category,
            endpoint,
            won_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let e = Endpoint::new("  https://api.example.com/// ");
        assert_eq!(e.as_str(), "https://api.example.com");
        assert_eq!(e, Endpoint::from("https://api.example.com"));
        assert_ne!(e, Endpoint::from("http://api.example.com"));
    }

    #[test]
    fn test_endpoint_join() {
        let e = Endpoint::new("https://api.example.com/");
        assert_eq!(e.join("/lyric?id=1"), "https://api.example.com/lyric?id=1");
        assert_eq!(e.join("lyric"), "https://api.example.com/lyric");
        assert_eq!(e.join(""), "https://api.example.com");
    }

    #[test]
    fn test_category_round_trip() {
        for category in Category::ALL {
            let parsed: Category = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!("Lyric".parse::<Category>().unwrap(), Category::Lyrics);
        assert!("video".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_matches_display() {
        let json = serde_json::to_string(&Category::Comments).unwrap();
        assert_eq!(json, "\"comments\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::Comments);
    }

    #[test]
    fn test_probe_paths_are_absolute() {
        for category in Category::ALL {
            assert!(category.default_probe_path().starts_with('/'));
        }
    }
}
