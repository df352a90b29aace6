use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::apis::venue_calendar::extract_json_ld_events;
use crate::constants::ARTIFACTS_SOURCE;
use crate::error::Result;
use crate::types::{RawEvent, SourceAdapter, SourceContext, SourceFetch};

/// One listing as written by the flyer/screenshot extraction step
#[derive(Debug, Deserialize)]
struct ArtifactRecord {
    #[serde(default)]
    artist: String,
    #[serde(default)]
    venue: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    source_note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    List(Vec<ArtifactRecord>),
    Wrapped { events: Vec<ArtifactRecord> },
}

impl From<ArtifactRecord> for RawEvent {
    fn from(record: ArtifactRecord) -> Self {
        let mut event = RawEvent::new(ARTIFACTS_SOURCE, record.artist, record.venue, record.date);
        if let Some(time) = record.time {
            event = event.with_time(time);
        }
        if let Some(note) = record.source_note {
            event = event.with_note(note);
        }
        event
    }
}

fn parse_artifact_json(text: &str) -> Result<Vec<RawEvent>> {
    let records = match serde_json::from_str::<ArtifactFile>(text)? {
        ArtifactFile::List(records) => records,
        ArtifactFile::Wrapped { events } => events,
    };
    Ok(records.into_iter().map(RawEvent::from).collect())
}

/// Listings extracted from saved files: `.json` extraction results and saved `.html` pages
pub struct ArtifactsAdapter {
    dir: PathBuf,
}

impl ArtifactsAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_file(path: &Path) -> Result<Option<Vec<RawEvent>>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => {
                let text = tokio::fs::read_to_string(path).await?;
                parse_artifact_json(&text).map(Some)
            }
            "html" | "htm" => {
                let text = tokio::fs::read_to_string(path).await?;
                Ok(Some(extract_json_ld_events(&text, ARTIFACTS_SOURCE, None)))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ArtifactsAdapter {
    fn source_id(&self) -> &str {
        ARTIFACTS_SOURCE
    }

    #[instrument(skip_all, fields(source_id = ARTIFACTS_SOURCE, dir = %self.dir.display()))]
    async fn fetch(&self, _ctx: &SourceContext) -> Result<SourceFetch> {
        if !self.dir.is_dir() {
            info!("No artifacts directory");
            return Ok(SourceFetch::complete(Vec::new()));
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();

        let mut events = Vec::new();
        let mut failures = Vec::new();
        for path in &paths {
            match Self::read_file(path).await {
                Ok(Some(found)) => {
                    debug!(file = %path.display(), "Read {} listings", found.len());
                    events.extend(found);
                }
                Ok(None) => debug!(file = %path.display(), "Skipping unsupported artifact"),
                Err(e) => {
                    warn!(file = %path.display(), "Unreadable artifact: {}", e);
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    failures.push(name);
                }
            }
        }

        info!("Read {} listings from {} artifact files", events.len(), paths.len());
        if failures.is_empty() {
            Ok(SourceFetch::complete(events))
        } else {
            Ok(SourceFetch::partial(
                events,
                format!("unreadable artifacts: {}", failures.join(", ")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchStatus;
    use chrono::{NaiveDate, Utc};
    use std::fs;

    fn ctx() -> SourceContext {
        SourceContext::new(Utc::now(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    #[test]
    fn test_parses_list_and_wrapped_json() {
        let list = r#"[{"artist":"DJ Night","venue":"Bar DKDC","date":"Feb 14","time":"10pm"}]"#;
        let events = parse_artifact_json(list).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time.as_deref(), Some("10pm"));
        assert_eq!(events[0].source_id, "artifacts");

        let wrapped = r#"{"events":[{"artist":"Rock Trio","venue":"B-Side","date":"2/15"}]}"#;
        let events = parse_artifact_json(wrapped).unwrap();
        assert_eq!(events[0].artist, "Rock Trio");
        assert_eq!(events[0].time, None);
    }

    #[tokio::test]
    async fn test_reads_directory_and_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a-flyer.json"),
            r#"[{"artist":"DJ Night","venue":"Bar DKDC","date":"Feb 14"}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b-page.html"),
            r#"<script type="application/ld+json">{"@type":"Event","name":"Rock Trio","startDate":"2026-02-15","location":{"name":"B-Side"}}</script>"#,
        )
        .unwrap();
        fs::write(dir.path().join("c-broken.json"), "{ nope").unwrap();
        fs::write(dir.path().join("d-photo.png"), [0u8, 1, 2]).unwrap();

        let fetch = ArtifactsAdapter::new(dir.path()).fetch(&ctx()).await.unwrap();
        assert_eq!(fetch.events.len(), 2);
        assert_eq!(fetch.events[1].venue, "B-Side");
        match fetch.status {
            FetchStatus::Partial { detail } => assert!(detail.contains("c-broken.json")),
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = ArtifactsAdapter::new(dir.path().join("missing"))
            .fetch(&ctx())
            .await
            .unwrap();
        assert_eq!(fetch.status, FetchStatus::Complete);
        assert!(fetch.events.is_empty());
    }
}
