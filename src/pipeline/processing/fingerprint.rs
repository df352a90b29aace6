//! Identity grouping of normalized listings.
//!
//! Listings are only compared inside a bucket sharing the same calendar date and the same
//! canonical venue. Resolved and unresolved venues never share a bucket, and unresolved venues
//! only meet on exact text. Inside a bucket, artists are compared with
//! `max(token-set Jaccard, normalized Levenshtein)` over the canonical artist text, and every
//! pair at or above the threshold is joined with union-find, so matching is transitive.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::NormalizedEvent;
use crate::observability::metrics;

/// Listings judged to describe the same real-world event. Members keep input order.
#[derive(Debug, Clone)]
pub struct EventGroup<'a> {
    pub members: Vec<&'a NormalizedEvent>,
}

impl<'a> EventGroup<'a> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Symmetric artist similarity in `[0, 1]`
pub fn artist_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    let union = tokens_a.union(&tokens_b).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        tokens_a.intersection(&tokens_b).count() as f64 / union as f64
    };

    jaccard.max(strsim::normalized_levenshtein(a, b))
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Joins two sets, keeping the lower index as root so roots are deterministic
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    threshold: f64,
}

impl FingerprintEngine {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Partition candidates into groups. Groups are ordered by their first member's position.
    pub fn group<'a>(&self, events: &'a [NormalizedEvent]) -> Vec<EventGroup<'a>> {
        let mut bucket_index: HashMap<(NaiveDate, bool, &str), usize> = HashMap::new();
        let mut buckets: Vec<Vec<usize>> = Vec::new();
        for (idx, event) in events.iter().enumerate() {
            let key = (
                event.calendar_date,
                event.venue_resolved,
                event.venue_canonical.as_str(),
            );
            let slot = *bucket_index.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(idx);
        }

        let mut sets = UnionFind::new(events.len());
        for bucket in &buckets {
            for (pos, &i) in bucket.iter().enumerate() {
                for &j in &bucket[pos + 1..] {
                    let score =
                        artist_similarity(&events[i].artist_canonical, &events[j].artist_canonical);
                    if score >= self.threshold {
                        debug!(
                            left = %events[i].artist_display,
                            right = %events[j].artist_display,
                            score,
                            "Listings matched"
                        );
                        sets.union(i, j);
                    }
                }
            }
        }

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<EventGroup<'a>> = Vec::new();
        for (idx, event) in events.iter().enumerate() {
            let root = sets.find(idx);
            let slot = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(EventGroup {
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].members.push(event);
        }

        metrics::dedup::run_summary(buckets.len(), groups.len(), events.len());
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(artist: &str, venue: &str, resolved: bool, day: u32, source: &str) -> NormalizedEvent {
        NormalizedEvent {
            artist_canonical: artist.to_string(),
            artist_display: artist.to_string(),
            venue_canonical: venue.to_string(),
            venue_display: venue.to_string(),
            venue_resolved: resolved,
            calendar_date: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            time_of_day: None,
            time_display: None,
            source_id: source.to_string(),
            reliability_weight: 1.0,
            source_note: None,
        }
    }

    #[test]
    fn test_similarity_is_symmetric_and_bounded() {
        let pairs = [
            ("dj night", "dj night"),
            ("dj night", "rock trio"),
            ("big star", "big star tribute"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            let s = artist_similarity(a, b);
            assert!((0.0..=1.0).contains(&s));
            assert_eq!(s, artist_similarity(b, a));
        }
        assert_eq!(artist_similarity("dj night", "dj night"), 1.0);
        assert!(artist_similarity("dj night", "rock trio") < 0.8);
        assert!(artist_similarity("the beatles", "teh beatles") >= 0.8);
    }

    #[test]
    fn test_groups_only_within_date_and_venue() {
        let events = vec![
            event("dj night", "bar-dkdc", true, 14, "sheet"),
            event("dj night", "bar-dkdc", true, 15, "dice"),
            event("dj night", "hi-tone", true, 14, "dice"),
            event("dj night", "bar-dkdc", true, 14, "dice"),
        ];
        let groups = FingerprintEngine::new(0.8).group(&events);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].members[1].source_id, "dice");
    }

    #[test]
    fn test_unresolved_venue_never_matches_resolved() {
        let events = vec![
            event("dj night", "bar-dkdc", true, 14, "sheet"),
            event("dj night", "bar-dkdc", false, 14, "dice"),
            event("dj night", "midtown tba", false, 14, "eventbrite"),
            event("dj night", "midtown", false, 14, "eventbrite"),
        ];
        let groups = FingerprintEngine::new(0.8).group(&events);
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_matching_is_transitive() {
        // a~b and b~c clear the threshold, a~c alone does not
        let a = "alpha beta gamma delta";
        let b = "alpha beta gamma delta epsilon";
        let c = "alpha beta gamma delta epsilon zeta";
        assert!(artist_similarity(a, b) >= 0.8);
        assert!(artist_similarity(b, c) >= 0.8);
        assert!(artist_similarity(a, c) < 0.8);

        let events = vec![
            event(a, "hi-tone", true, 14, "sheet"),
            event(c, "hi-tone", true, 14, "dice"),
            event(b, "hi-tone", true, 14, "venue:hi-tone"),
        ];
        let groups = FingerprintEngine::new(0.8).group(&events);
        assert_eq!(groups.len(), 1);
        let sources: Vec<_> = groups[0].members.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(sources, vec!["sheet", "dice", "venue:hi-tone"]);
    }
}
