// Scrobble track record carried through the batching layer
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::batch::BatchRecord;

/// A single scrobbled track.
///
/// Only the fields the batching layer transports; the upstream wire envelope
/// is parsed elsewhere and is not this crate's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub artist: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrobble_time: Option<DateTime<Utc>>,
}

impl Track {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            album: None,
            mbid: None,
            url: None,
            user: None,
            genre: None,
            scrobble_time: None,
        }
    }

    pub fn with_scrobble_time(mut self, scrobble_time: DateTime<Utc>) -> Self {
        self.scrobble_time = Some(scrobble_time);
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }
}

impl BatchRecord for Track {
    /// Deterministic duplicate-detection key: artist, title and scrobble
    /// time, case-folded. Two plays of the same track at different times are
    /// distinct records.
    fn identity_key(&self) -> String {
        let timestamp = self
            .scrobble_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        format!(
            "{}|{}|{}",
            self.artist.to_lowercase(),
            self.title.to_lowercase(),
            timestamp
        )
    }

    fn scrobble_time(&self) -> Option<DateTime<Utc>> {
        self.scrobble_time
    }
}
