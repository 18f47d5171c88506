use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::models::{JournalEntry, Mood, TimeFilter};

/// One count per mood, in `Mood::ALL` order
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MoodCounts([u64; 4]);

impl MoodCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mood: Mood) {
        self.0[mood.index()] += 1;
    }

    pub fn get(&self, mood: Mood) -> u64 {
        self.0[mood.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Mood, u64)> + '_ {
        Mood::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    pub fn as_array(&self) -> [u64; 4] {
        self.0
    }
}

/// Serialized as `{"joyful": n, "sad": n, ...}` in declaration order
impl Serialize for MoodCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Mood::ALL.len()))?;
        for (mood, count) in self.iter() {
            map.serialize_entry(mood.label(), &count)?;
        }
        map.end()
    }
}

/// Count entries per mood. Entries with an unrecognized label are skipped.
pub fn compute_mood_counts<'a, I>(entries: I) -> MoodCounts
where
    I: IntoIterator<Item = &'a JournalEntry>,
{
    let mut counts = MoodCounts::new();
    for mood in entries.into_iter().filter_map(|e| e.mood()) {
        counts.record(mood);
    }
    counts
}

/// Counts over entries created in `[since, until]`. `None` leaves that side open.
pub fn compute_mood_counts_between<'a, I>(
    entries: I,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> MoodCounts
where
    I: IntoIterator<Item = &'a JournalEntry>,
{
    compute_mood_counts(entries.into_iter().filter(|e| {
        since.map_or(true, |s| e.created_at >= s) && until.map_or(true, |u| e.created_at <= u)
    }))
}

/// Counts over the last seven days
pub fn compute_weekly_mood_counts<'a, I>(entries: I, now: DateTime<Utc>) -> MoodCounts
where
    I: IntoIterator<Item = &'a JournalEntry>,
{
    compute_mood_counts_between(entries, Some(now - Duration::days(7)), Some(now))
}

pub fn compute_mood_counts_for<'a, I>(entries: I, filter: TimeFilter, now: DateTime<Utc>) -> MoodCounts
where
    I: IntoIterator<Item = &'a JournalEntry>,
{
    compute_mood_counts_between(entries, filter.since(now), Some(now))
}

/// Most frequent mood. Ties go to the mood declared first.
pub fn dominant_mood(counts: &MoodCounts) -> Option<Mood> {
    let mut best: Option<(Mood, u64)> = None;
    for (mood, count) in counts.iter() {
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((mood, count));
        }
    }
    best.map(|(mood, _)| mood)
}
