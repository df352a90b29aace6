use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[\{][^\)\]\}]*[\)\]\}]").unwrap());
static FEATURING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(?:feat\.?|ft\.?|featuring|w/|with special guests?|special guests?)(?:\s|$).*$")
        .unwrap()
});
static PRESENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S.*?\s+presents:?\s+").unwrap());
static LIVE_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blive\s+(?:at|on|from|in)\b.*$").unwrap());
static NOISE_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:live|in concert|concert|presents)\b").unwrap());
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Lowercase, spell out `&`, drop apostrophes, collapse punctuation and whitespace,
/// strip a leading "the"
pub fn fold_text(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace('&', " and ")
        .replace(['\'', '\u{2019}'], "");
    let collapsed = NON_ALNUM.replace_all(&lowered, " ");
    let trimmed = collapsed.trim();
    trimmed
        .strip_prefix("the ")
        .unwrap_or(trimmed)
        .to_string()
}

/// Matching key for an artist string.
///
/// Bracketed asides, featured guests, promoter prefixes ("X presents Y") and noise words such
/// as "live" are removed before folding. If stripping leaves nothing, the plain fold is used.
pub fn artist_canonical(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let stripped = BRACKETED.replace_all(&lowered, " ");
    let stripped = FEATURING.replace(&stripped, "");
    let headliner_start = PRESENTS
        .find(&stripped)
        .map(|m| m.end())
        .filter(|&end| end < stripped.len());
    let stripped = match headliner_start {
        Some(start) => stripped[start..].to_string(),
        None => stripped.into_owned(),
    };
    let stripped = LIVE_AT.replace(&stripped, "");
    let stripped = NOISE_WORDS.replace_all(&stripped, " ");

    let canonical = fold_text(&stripped);
    if canonical.is_empty() {
        fold_text(text)
    } else {
        canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("  The Black Keys!! "), "black keys");
        assert_eq!(fold_text("Simon & Garfunkel"), "simon and garfunkel");
        assert_eq!(fold_text("Guns N' Roses"), "guns n roses");
        assert_eq!(fold_text("The The"), "the");
    }

    #[test]
    fn test_noise_is_stripped() {
        assert_eq!(artist_canonical("DJ Night (Live)"), "dj night");
        assert_eq!(artist_canonical("DJ Night"), "dj night");
        assert_eq!(artist_canonical("Lucero w/ Two Cow Garage"), "lucero");
        assert_eq!(artist_canonical("Lucero feat. Jim Dickinson"), "lucero");
        assert_eq!(artist_canonical("Lucero ft. Friends"), "lucero");
        assert_eq!(artist_canonical("Lucero with Special Guests"), "lucero");
        assert_eq!(artist_canonical("Goner Records presents: Ty Segall"), "ty segall");
        assert_eq!(artist_canonical("Al Green Live at the Orpheum"), "al green");
        assert_eq!(artist_canonical("Big Star [Tribute]"), "big star");
        assert_eq!(artist_canonical("Present Tense"), "present tense");
    }

    #[test]
    fn test_falls_back_when_everything_is_noise() {
        assert_eq!(artist_canonical("Live"), "live");
        assert_eq!(artist_canonical("(Live)"), "live");
        assert_eq!(artist_canonical("   "), "");
    }
}
