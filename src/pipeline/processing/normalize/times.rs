use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(?:([ap])\.?\s?m\b\.?)?").unwrap()
});

/// Best-effort showtime parsing. `None` means no usable time, which is never an error.
///
/// When both doors and show are listed the show time wins. Dollar amounts are skipped, and a
/// time with am/pm is preferred over a bare number. Hours 1 through 11 without a meridiem are
/// read as evening hours.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let focus = match lowered.rfind("show") {
        Some(idx) => &lowered[idx + "show".len()..],
        None => lowered.as_str(),
    };

    if focus.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if focus.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    // Prices are not times; a token with a meridiem beats a bare number
    let tokens: Vec<_> = TIME_TOKEN
        .captures_iter(focus)
        .filter(|c| c.get(0).is_some_and(|m| !focus[..m.start()].ends_with('$')))
        .collect();
    let caps = tokens
        .iter()
        .find(|c| c.get(3).is_some())
        .or_else(|| tokens.first())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let hour = match caps.get(3).map(|m| m.as_str()) {
        Some("p") if (1..=11).contains(&hour) => hour + 12,
        Some("p") if hour == 12 => 12,
        Some("a") if hour == 12 => 0,
        Some("a") if (1..=11).contains(&hour) => hour,
        Some(_) => return None,
        None if (1..=11).contains(&hour) => hour + 12,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}
