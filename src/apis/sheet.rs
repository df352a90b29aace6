use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::constants::{SHEET_CSV_URL_ENV, SHEET_SOURCE};
use crate::error::Result;
use crate::infra::ReqwestHttp;
use crate::types::{RawEvent, SourceAdapter, SourceContext, SourceFetch};

const DATE_COLUMNS: &[&str] = &["date", "event_date", "event date"];
const ARTIST_COLUMNS: &[&str] = &["artist", "event", "act", "name", "artist/event"];
const VENUE_COLUMNS: &[&str] = &["venue", "location", "place"];
const TIME_COLUMNS: &[&str] = &["time", "showtime", "show time", "doors"];
const NOTE_COLUMNS: &[&str] = &["source_note", "source", "notes", "note"];

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

/// Parse a manually curated CSV. Header names are matched case-insensitively against a set
/// of synonyms; rows that are entirely blank are skipped, every other row is passed on as-is.
pub fn parse_sheet_csv(text: &str) -> Result<Vec<RawEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let date_col = find_column(&headers, DATE_COLUMNS);
    let artist_col = find_column(&headers, ARTIST_COLUMNS);
    let venue_col = find_column(&headers, VENUE_COLUMNS);
    let time_col = find_column(&headers, TIME_COLUMNS);
    let note_col = find_column(&headers, NOTE_COLUMNS);

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let field = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        events.push(
            RawEvent::new(SHEET_SOURCE, field(artist_col), field(venue_col), field(date_col))
                .with_time(field(time_col))
                .with_note(field(note_col)),
        );
    }
    Ok(events)
}

/// Manually curated listings: a published spreadsheet CSV, with a local CSV as fallback
pub struct SheetAdapter {
    http: ReqwestHttp,
    local_csv: Option<PathBuf>,
}

impl SheetAdapter {
    pub fn new(http: ReqwestHttp, local_csv: Option<PathBuf>) -> Self {
        Self { http, local_csv }
    }

    async fn read_local(&self) -> Option<Result<(String, &Path)>> {
        let path = self.local_csv.as_deref()?;
        if !path.exists() {
            return None;
        }
        Some(
            tokio::fs::read_to_string(path)
                .await
                .map(|text| (text, path))
                .map_err(Into::into),
        )
    }
}

#[async_trait::async_trait]
impl SourceAdapter for SheetAdapter {
    fn source_id(&self) -> &str {
        SHEET_SOURCE
    }

    #[instrument(skip_all, fields(source_id = SHEET_SOURCE))]
    async fn fetch(&self, ctx: &SourceContext) -> Result<SourceFetch> {
        if let Some(url) = ctx.credential(SHEET_CSV_URL_ENV) {
            match self.http.get_text(url).await {
                Ok(text) => {
                    let events = parse_sheet_csv(&text)?;
                    info!("Read {} rows from published sheet", events.len());
                    return Ok(SourceFetch::complete(events));
                }
                Err(e) => {
                    warn!("Sheet URL failed, trying local CSV: {}", e);
                    return match self.read_local().await {
                        Some(local) => {
                            let (text, path) = local?;
                            let events = parse_sheet_csv(&text)?;
                            Ok(SourceFetch::partial(
                                events,
                                format!("sheet URL failed ({}), used {}", e, path.display()),
                            ))
                        }
                        None => Err(e),
                    };
                }
            }
        }

        match self.read_local().await {
            Some(local) => {
                let (text, path) = local?;
                let events = parse_sheet_csv(&text)?;
                info!(path = %path.display(), "Read {} rows from local CSV", events.len());
                Ok(SourceFetch::complete(events))
            }
            None => {
                info!("No sheet URL or local CSV configured");
                Ok(SourceFetch::complete(Vec::new()))
            }
        }
    }
}
