use serde::{Deserialize, Serialize};

use crate::types::RawEvent;

/// Keyword lists that tell concerts apart from the other things mixed-use venues and
/// ticketing APIs list (sports, trivia, comedy...).
///
/// A listing is rejected when its title contains an exclude keyword and no music keyword.
/// Keywords match whole words or phrases, case-insensitively. Empty lists keep everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MusicFilter {
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub music_keywords: Vec<String>,
}

/// `phrase` occurs in `text` with no letter or digit directly on either side
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

impl MusicFilter {
    /// Lowercase and trim every keyword, dropping blanks
    pub(crate) fn normalized(self) -> Self {
        let clean = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            exclude_keywords: clean(self.exclude_keywords),
            music_keywords: clean(self.music_keywords),
        }
    }

    pub fn is_music(&self, title: &str) -> bool {
        let text = title.to_lowercase();
        let excluded = self
            .exclude_keywords
            .iter()
            .any(|k| contains_phrase(&text, k));
        if !excluded {
            return true;
        }
        self.music_keywords.iter().any(|k| contains_phrase(&text, k))
    }

    /// Split listings into the ones kept and a count of the ones filtered out
    pub fn retain_music(&self, events: Vec<RawEvent>) -> (Vec<RawEvent>, usize) {
        let before = events.len();
        let kept: Vec<RawEvent> = events.into_iter().filter(|e| self.is_music(&e.artist)).collect();
        let filtered = before - kept.len();
        (kept, filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> MusicFilter {
        MusicFilter {
            exclude_keywords: vec!["Trivia".into(), "play".into(), " vs. ".into(), "comedy".into()],
            music_keywords: vec!["band".into(), "dj".into()],
        }
        .normalized()
    }

    #[test]
    fn test_excluded_titles_are_rejected() {
        let f = filter();
        assert!(!f.is_music("Trivia Night"));
        assert!(!f.is_music("Memphis Grizzlies vs. Lakers"));
        assert!(!f.is_music("A Play in Two Acts"));
    }

    #[test]
    fn test_music_signal_overrides_exclusion() {
        let f = filter();
        assert!(f.is_music("Comedy Night with DJ Spinz"));
        assert!(f.is_music("Trivia & Band Night"));
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let f = filter();
        assert!(f.is_music("Playboi Carti"));
        assert!(f.is_music("Lucero"));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        assert!(MusicFilter::default().is_music("Trivia Night"));
    }

    #[test]
    fn test_retain_counts_filtered_listings() {
        let events = vec![
            RawEvent::new("ticketmaster", "Lucero", "Minglewood Hall", "2026-02-14"),
            RawEvent::new("ticketmaster", "Trivia Night", "Crosstown Arts", "2026-02-14"),
        ];
        let (kept, filtered) = filter().retain_music(events);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].artist, "Lucero");
        assert_eq!(filtered, 1);
    }
}
