use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One listing exactly as a source reported it. Every field except `source_id` is free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub artist: String,
    pub venue: String,
    pub date: String,
    pub time: Option<String>,
    pub source_id: String,
    pub source_note: Option<String>,
}

impl RawEvent {
    pub fn new(
        source_id: impl Into<String>,
        artist: impl Into<String>,
        venue: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            venue: venue.into(),
            date: date.into(),
            time: None,
            source_id: source_id.into(),
            source_note: None,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        let time = time.into();
        self.time = if time.trim().is_empty() { None } else { Some(time) };
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.source_note = if note.trim().is_empty() { None } else { Some(note) };
        self
    }
}

/// Everything an adapter may need to know about the current run
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub run_at: DateTime<Utc>,
    /// The run's calendar date in Central time
    pub today: NaiveDate,
    credentials: HashMap<String, String>,
}

impl SourceContext {
    pub fn new(run_at: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            run_at,
            today,
            credentials: HashMap::new(),
        }
    }

    pub fn with_credential(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(name.into(), value.into());
        self
    }

    /// Returns the credential only when it is present and non-blank
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// How completely an adapter managed to read its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Complete,
    Partial { detail: String },
    MissingCredential { name: String },
}

/// What an adapter hands back for one run
#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub events: Vec<RawEvent>,
    pub status: FetchStatus,
    /// Listings the adapter read but left out as not music
    pub filtered: usize,
}

impl SourceFetch {
    pub fn complete(events: Vec<RawEvent>) -> Self {
        Self {
            events,
            status: FetchStatus::Complete,
            filtered: 0,
        }
    }

    pub fn partial(events: Vec<RawEvent>, detail: impl Into<String>) -> Self {
        Self {
            events,
            status: FetchStatus::Partial {
                detail: detail.into(),
            },
            filtered: 0,
        }
    }

    pub fn missing_credential(name: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            status: FetchStatus::MissingCredential { name: name.into() },
            filtered: 0,
        }
    }

    pub fn with_filtered(mut self, filtered: usize) -> Self {
        self.filtered = filtered;
        self
    }
}

/// Core trait that all event data sources must implement
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique identifier for this source, used to look up its reliability weight
    fn source_id(&self) -> &str;

    /// Fetch all listings from this source.
    ///
    /// Expected "no data" conditions are returned as an empty `SourceFetch`; only genuine
    /// infrastructure failures should be returned as `Err`.
    async fn fetch(&self, ctx: &SourceContext) -> Result<SourceFetch>;
}
