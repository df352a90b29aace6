use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{CalendarError, Result};
use crate::registry::MusicFilter;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Normalize free venue text into a lookup key: case-folded, `&` spelled out, apostrophes and
/// periods removed, every other punctuation run collapsed to one space, leading "the" dropped.
pub fn venue_key(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace('&', " and ")
        .replace(['\'', '\u{2019}', '.'], "");
    let collapsed = NON_ALNUM.replace_all(&lowered, " ");
    let trimmed = collapsed.trim();
    trimmed
        .strip_prefix("the ")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn default_weight() -> f64 {
    1.0
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_stale_after_days() -> i64 {
    548
}

fn default_max_forward_days() -> i64 {
    548
}

fn default_ambiguity_window_days() -> i64 {
    365
}

/// Upper bound for every `[window]` value, roughly a century
pub const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Artist similarity at or above which two listings in the same bucket are merged
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Trailing place names that may be dropped when a venue string has no alias match,
    /// e.g. "growlers memphis"
    #[serde(default)]
    pub locality_suffixes: Vec<String>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            locality_suffixes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
    #[serde(default = "default_max_forward_days")]
    pub max_forward_days: i64,
    /// Forward window used to choose between day/month orders
    #[serde(default = "default_ambiguity_window_days")]
    pub ambiguity_window_days: i64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            max_forward_days: default_max_forward_days(),
            ambiguity_window_days: default_ambiguity_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub weight: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub calendar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_weight")]
    default_weight: f64,
    #[serde(default)]
    matching: MatchingSettings,
    #[serde(default)]
    window: WindowSettings,
    #[serde(default)]
    music_filter: MusicFilter,
    #[serde(default)]
    sources: BTreeMap<String, SourceEntry>,
    #[serde(default)]
    venues: Vec<VenueInfo>,
}

/// Trust weights per source and the canonical venue table.
///
/// Loaded once at run start and shared read-only by the normalizer and the conflict resolver.
#[derive(Debug, Clone)]
pub struct ReliabilityRegistry {
    default_weight: f64,
    matching: MatchingSettings,
    window: WindowSettings,
    music_filter: MusicFilter,
    sources: BTreeMap<String, SourceEntry>,
    venues: Vec<VenueInfo>,
    alias_index: HashMap<String, usize>,
    locality_suffixes: Vec<String>,
}

impl ReliabilityRegistry {
    /// Load and validate a registry TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CalendarError::Config(format!(
                "Failed to read registry file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let registry = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            sources = registry.sources.len(),
            venues = registry.venues.len(),
            "Loaded reliability registry"
        );
        Ok(registry)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)?;
        Self::build(file)
    }

    fn build(file: RegistryFile) -> Result<Self> {
        check_weight("default_weight", file.default_weight)?;

        let threshold = file.matching.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CalendarError::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        let window = &file.window;
        if window.stale_after_days < 0
            || window.max_forward_days < 0
            || window.ambiguity_window_days <= 0
        {
            return Err(CalendarError::Config(
                "window bounds must be non-negative and the ambiguity window positive".to_string(),
            ));
        }
        for (name, days) in [
            ("stale_after_days", window.stale_after_days),
            ("max_forward_days", window.max_forward_days),
            ("ambiguity_window_days", window.ambiguity_window_days),
        ] {
            if days > MAX_WINDOW_DAYS {
                return Err(CalendarError::Config(format!(
                    "window.{} must be at most {} days, got {}",
                    name, MAX_WINDOW_DAYS, days
                )));
            }
        }

        for (source_id, entry) in &file.sources {
            if source_id.trim().is_empty() {
                return Err(CalendarError::Config("source id must not be empty".to_string()));
            }
            check_weight(&format!("sources.{}.weight", source_id), entry.weight)?;
        }

        let mut alias_index: HashMap<String, usize> = HashMap::new();
        for (idx, venue) in file.venues.iter().enumerate() {
            if venue.id.trim().is_empty() || venue.name.trim().is_empty() {
                return Err(CalendarError::Config(format!(
                    "venue #{} needs both an id and a name",
                    idx + 1
                )));
            }

            let keys = std::iter::once(venue.id.as_str())
                .chain(std::iter::once(venue.name.as_str()))
                .chain(venue.aliases.iter().map(String::as_str))
                .map(venue_key)
                .filter(|k| !k.is_empty());

            for key in keys {
                match alias_index.get(&key) {
                    Some(&other) if other != idx => {
                        return Err(CalendarError::Config(format!(
                            "alias '{}' is claimed by both '{}' and '{}'",
                            key, file.venues[other].id, venue.id
                        )));
                    }
                    Some(_) => {}
                    None => {
                        alias_index.insert(key, idx);
                    }
                }
            }
        }

        let locality_suffixes = file
            .matching
            .locality_suffixes
            .iter()
            .map(|s| venue_key(s))
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            default_weight: file.default_weight,
            matching: file.matching,
            window: file.window,
            music_filter: file.music_filter.normalized(),
            sources: file.sources,
            venues: file.venues,
            alias_index,
            locality_suffixes,
        })
    }

    /// Trust weight for a source id.
    ///
    /// Falls back to the family before a `:` (so `venue:hi-tone` can share a `venue` weight),
    /// then to the registry default.
    pub fn weight_for(&self, source_id: &str) -> f64 {
        if let Some(entry) = self.sources.get(source_id) {
            return entry.weight;
        }
        if let Some((family, _)) = source_id.split_once(':') {
            if let Some(entry) = self.sources.get(family) {
                return entry.weight;
            }
        }
        debug!(source_id, "No weight configured, using default");
        self.default_weight
    }

    /// Resolve free venue text to a registry venue, if any alias matches
    pub fn resolve_venue(&self, raw: &str) -> Option<&VenueInfo> {
        let key = venue_key(raw);
        if key.is_empty() {
            return None;
        }
        if let Some(&idx) = self.alias_index.get(&key) {
            return Some(&self.venues[idx]);
        }
        for suffix in &self.locality_suffixes {
            let tail = format!(" {}", suffix);
            if let Some(stem) = key.strip_suffix(tail.as_str()) {
                if let Some(&idx) = self.alias_index.get(stem.trim()) {
                    return Some(&self.venues[idx]);
                }
            }
        }
        None
    }

    pub fn venues(&self) -> &[VenueInfo] {
        &self.venues
    }

    pub fn source_weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.sources.iter().map(|(id, entry)| (id.as_str(), entry.weight))
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    pub fn matching(&self) -> &MatchingSettings {
        &self.matching
    }

    pub fn window(&self) -> &WindowSettings {
        &self.window
    }

    pub fn music_filter(&self) -> &MusicFilter {
        &self.music_filter
    }

    pub fn alias_count(&self) -> usize {
        self.alias_index.len()
    }
}

fn check_weight(name: &str, weight: f64) -> Result<()> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(CalendarError::Config(format!(
            "{} must be a positive number, got {}",
            name, weight
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_weight = 1.0

[matching]
similarity_threshold = 0.8
locality_suffixes = ["memphis", "memphis tn"]

[sources.sheet]
weight = 3.0

[sources.dice]
weight = 2.0

[sources.venue]
weight = 2.5

[[venues]]
id = "bar-dkdc"
name = "Bar DKDC"
aliases = ["dkdc"]

[[venues]]
id = "hi-tone"
name = "Hi Tone"
aliases = ["hi-tone cafe", "hi tone café", "the hi-tone"]

[[venues]]
id = "hernandos-hideaway"
name = "Hernando's Hideaway"
aliases = ["hernandos", "hernando's hide-a-way"]
"#;

    fn registry() -> ReliabilityRegistry {
        ReliabilityRegistry::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_venue_key_folds_case_and_punctuation() {
        assert_eq!(venue_key("  The Hi-Tone  "), "hi tone");
        assert_eq!(venue_key("HERNANDO'S HIDEAWAY"), "hernandos hideaway");
        assert_eq!(venue_key("B.B. King's"), "bb kings");
        assert_eq!(venue_key("Rock & Roll Café"), "rock and roll café");
        assert_eq!(venue_key("!!!"), "");
    }

    #[test]
    fn test_resolves_aliases_case_insensitively() {
        let reg = registry();
        assert_eq!(reg.resolve_venue("bar dkdc").unwrap().id, "bar-dkdc");
        assert_eq!(reg.resolve_venue("Bar DKDC").unwrap().id, "bar-dkdc");
        assert_eq!(reg.resolve_venue("DKDC").unwrap().id, "bar-dkdc");
        assert_eq!(reg.resolve_venue("The Hi-Tone").unwrap().id, "hi-tone");
        assert_eq!(reg.resolve_venue("Hernando's Hide-A-Way").unwrap().id, "hernandos-hideaway");
    }

    #[test]
    fn test_locality_suffix_is_stripped_on_second_pass() {
        let reg = registry();
        assert_eq!(reg.resolve_venue("Hi Tone, Memphis TN").unwrap().id, "hi-tone");
        assert!(reg.resolve_venue("Memphis").is_none());
    }

    #[test]
    fn test_unknown_venue_is_unresolved() {
        assert!(registry().resolve_venue("Midtown TBA").is_none());
    }

    #[test]
    fn test_weight_lookup_falls_back_to_family_then_default() {
        let reg = registry();
        assert_eq!(reg.weight_for("sheet"), 3.0);
        assert_eq!(reg.weight_for("venue:hi-tone"), 2.5);
        assert_eq!(reg.weight_for("eventbrite"), 1.0);
    }

    #[test]
    fn test_conflicting_alias_is_rejected() {
        let toml = r#"
[[venues]]
id = "a"
name = "Shell"

[[venues]]
id = "b"
name = "Overton Park Shell"
aliases = ["the shell"]
"#;
        let err = ReliabilityRegistry::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, CalendarError::Config(ref m) if m.contains("shell")));
    }

    #[test]
    fn test_invalid_weight_and_threshold_are_rejected() {
        assert!(ReliabilityRegistry::from_toml_str("[sources.x]\nweight = 0.0\n").is_err());
        assert!(ReliabilityRegistry::from_toml_str("[matching]\nsimilarity_threshold = 1.5\n").is_err());
    }

    #[test]
    fn test_oversized_window_is_rejected_at_load() {
        let err = ReliabilityRegistry::from_toml_str("[window]\nstale_after_days = 1000000000\n")
            .unwrap_err();
        assert!(matches!(err, CalendarError::Config(ref m) if m.contains("stale_after_days")));
        assert!(ReliabilityRegistry::from_toml_str("[window]\nmax_forward_days = 36501\n").is_err());
        assert!(ReliabilityRegistry::from_toml_str("[window]\nmax_forward_days = 36500\n").is_ok());
    }

    #[test]
    fn test_shipped_registry_filters_non_music_listings() {
        let reg = ReliabilityRegistry::from_toml_str(include_str!("../../registry.toml")).unwrap();
        let filter = reg.music_filter();
        assert!(!filter.is_music("Memphis Grizzlies vs. Lakers"));
        assert!(!filter.is_music("Trivia Night"));
        assert!(!filter.is_music("Stand-Up Comedy Showcase"));
        assert!(filter.is_music("Lucero"));
        assert!(filter.is_music("Jazz Brunch Band"));
        assert!(filter.is_music("Playboi Carti"));
    }

    #[test]
    fn test_empty_registry_uses_defaults() {
        let reg = ReliabilityRegistry::from_toml_str("").unwrap();
        assert_eq!(reg.matching().similarity_threshold, 0.8);
        assert_eq!(reg.window().stale_after_days, 548);
        assert_eq!(reg.weight_for("anything"), 1.0);
        assert!(reg.venues().is_empty());
    }
}
