use crate::deck::Deck;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Collection overview
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub deck_count: usize,
    pub card_count: usize,
    pub due_count: usize,
    /// Reviews per UTC day, oldest first
    pub reviews_by_day: Vec<(NaiveDate, usize)>,
    pub reviewed_today: usize,
}

impl Stats {
    /// Count cards and group them by the day of their most recent review.
    /// Cards that were never scheduled are not counted as reviews.
    pub fn collect(decks: &[Deck], now: DateTime<Utc>) -> Self {
        let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut stats = Stats {
            deck_count: decks.len(),
            ..Default::default()
        };

        for card in decks.iter().flat_map(|d| &d.cards) {
            stats.card_count += 1;
            if card.is_due(now) {
                stats.due_count += 1;
            }
            if card.repetitions > 0 {
                *by_day.entry(card.last_reviewed.date_naive()).or_default() += 1;
            }
        }

        stats.reviewed_today = by_day.get(&now.date_naive()).copied().unwrap_or(0);
        stats.reviews_by_day = by_day.into_iter().collect();
        stats
    }

    /// Largest daily review count, for chart scaling
    pub fn peak(&self) -> usize {
        self.reviews_by_day.iter().map(|(_, n)| *n).max().unwrap_or(0)
    }
}
