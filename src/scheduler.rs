//! SM-2 scheduling.
//!
//! Quality ratings run from 0 (forgotten) to 5 (perfect recall). The rating
//! moves the ease factor; the interval follows the repetition count:
//! 1 day, then 6 days, then the previous interval times the new ease.
//! A low rating does not send the card back to the start of that progression.

use crate::deck::{Card, MIN_EASE, latest_due};
use chrono::{DateTime, Duration, Utc};

/// Highest quality rating
pub const MAX_QUALITY: f64 = 5.0;

/// Rating buttons offered during review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// Could not recall the answer
    Hard,
    /// Recalled with effort
    Good,
    /// Recalled without hesitation
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Hard, Rating::Good, Rating::Easy];

    /// SM-2 quality for this rating
    pub fn quality(self) -> f64 {
        match self {
            Rating::Hard => 0.0,
            Rating::Good => 2.0,
            Rating::Easy => 4.0,
        }
    }

    /// Rating bound to a number key (1, 2, 3)
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Rating::Hard),
            '2' => Some(Rating::Good),
            '3' => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

/// Clamp a raw quality into [0, 5]. NaN counts as 0.
pub fn clamp_quality(quality: f64) -> f64 {
    if quality.is_nan() {
        return 0.0;
    }
    quality.clamp(0.0, MAX_QUALITY)
}

/// Ease factor after a review of the given quality, floored at 1.3
pub fn next_ease(ease: f64, quality: f64) -> f64 {
    let miss = MAX_QUALITY - clamp_quality(quality);
    let ease = ease + (0.1 - miss * (0.08 + miss * 0.02));
    ease.max(MIN_EASE)
}

/// Interval in days for the review that brings the card past `repetitions`.
/// `f64::round` rounds half away from zero, so 6.5 days becomes 7.
pub fn next_interval(repetitions: u32, interval: u32, ease: f64) -> u32 {
    match repetitions {
        0 => 1,
        1 => 6,
        // float-to-int casts saturate
        _ => (f64::from(interval) * ease).round() as u32,
    }
}

/// Schedule `card` after a review of the given quality at `now`.
///
/// Out-of-range qualities are clamped rather than rejected. Only the
/// scheduling fields change; id and content pass through.
pub fn schedule_card(card: &Card, quality: f64, now: DateTime<Utc>) -> Card {
    let ease = next_ease(card.ease, quality);
    let interval = next_interval(card.repetitions, card.interval, ease);

    // Very long intervals are pinned to the latest storable instant
    let latest = latest_due();
    let due = now
        .checked_add_signed(Duration::days(i64::from(interval)))
        .map_or(latest, |due| due.min(latest));

    Card {
        interval,
        ease,
        repetitions: card.repetitions.saturating_add(1),
        last_reviewed: now,
        due,
        ..card.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::INITIAL_EASE;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    fn card_with(repetitions: u32, interval: u32, ease: f64) -> Card {
        let mut card = Card::new("front", "back", day(1)).unwrap();
        card.repetitions = repetitions;
        card.interval = interval;
        card.ease = ease;
        card
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_first_review_is_one_day_for_every_quality() {
        for q in 0..=5 {
            let next = schedule_card(&card_with(0, 0, INITIAL_EASE), q as f64, day(1));
            assert_eq!(next.interval, 1, "quality {q}");
        }
    }

    #[test]
    fn test_second_review_is_six_days_for_every_quality() {
        for q in 0..=5 {
            let next = schedule_card(&card_with(1, 1, INITIAL_EASE), q as f64, day(1));
            assert_eq!(next.interval, 6, "quality {q}");
        }
    }

    #[test]
    fn test_later_reviews_multiply_by_new_ease() {
        for q in 0..=5 {
            let card = card_with(4, 10, 2.2);
            let next = schedule_card(&card, q as f64, day(1));
            let expected = (10.0 * next.ease).round() as u32;
            assert_eq!(next.interval, expected, "quality {q}");
        }

        // 10 * 2.5 with quality 4 keeps ease at 2.5
        let next = schedule_card(&card_with(2, 10, 2.5), 4.0, day(1));
        assert_eq!(next.interval, 25);
    }

    #[test]
    fn test_ease_adjustment() {
        assert_close(next_ease(2.5, 5.0), 2.6);
        assert_close(next_ease(2.5, 4.0), 2.5);
        assert_close(next_ease(2.5, 3.0), 2.36);
        assert_close(next_ease(2.5, 2.0), 2.18);
        assert_close(next_ease(2.5, 0.0), 1.7);
    }

    #[test]
    fn test_ease_floor_holds_under_repeated_failure() {
        let mut card = card_with(0, 0, INITIAL_EASE);
        for _ in 0..20 {
            card = schedule_card(&card, 0.0, day(1));
            assert!(card.ease >= MIN_EASE);
        }
        assert_eq!(card.ease, MIN_EASE);
    }

    #[test]
    fn test_repetitions_increase_by_one() {
        let mut card = card_with(0, 0, INITIAL_EASE);
        for expected in 1..=8 {
            card = schedule_card(&card, 3.0, day(1));
            assert_eq!(card.repetitions, expected);
        }
    }

    #[test]
    fn test_due_is_last_reviewed_plus_interval() {
        let mut card = card_with(0, 0, INITIAL_EASE);
        for (i, q) in [5.0, 4.0, 1.0, 3.0, 0.0, 5.0].into_iter().enumerate() {
            let now = day(1 + i as u32);
            card = schedule_card(&card, q, now);
            assert_eq!(card.last_reviewed, now);
            assert_eq!(card.due, now + Duration::days(card.interval as i64));
        }
    }

    #[test]
    fn test_quality_is_clamped() {
        let card = card_with(3, 8, 2.1);
        assert_eq!(
            schedule_card(&card, -5.0, day(2)),
            schedule_card(&card, 0.0, day(2))
        );
        assert_eq!(
            schedule_card(&card, 99.0, day(2)),
            schedule_card(&card, 5.0, day(2))
        );
        assert_eq!(
            schedule_card(&card, f64::NAN, day(2)),
            schedule_card(&card, 0.0, day(2))
        );
    }

    #[test]
    fn test_fractional_quality_is_accepted() {
        let next = schedule_card(&card_with(2, 6, 2.5), 4.5, day(1));
        assert!(next.ease > 2.5 && next.ease < 2.6);
    }

    #[test]
    fn test_half_day_rounds_up() {
        // 5 * 1.3 = 6.5 and 15 * 1.3 = 19.5
        let next = schedule_card(&card_with(2, 5, 1.3), 0.0, day(1));
        assert_eq!(next.ease, MIN_EASE);
        assert_eq!(next.interval, 7);

        let next = schedule_card(&card_with(2, 15, 1.3), 0.0, day(1));
        assert_eq!(next.interval, 20);
    }

    #[test]
    fn test_content_passes_through() {
        let card = card_with(2, 6, 2.5);
        let next = schedule_card(&card, 5.0, day(3));
        assert_eq!(next.id, card.id);
        assert_eq!(next.front, card.front);
        assert_eq!(next.back, card.back);
    }

    #[test]
    fn test_review_progression_from_new_card() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let card = Card::new("front", "back", start).unwrap();

        let first = schedule_card(&card, 4.0, start);
        assert_eq!(first.interval, 1);
        assert_eq!(first.repetitions, 1);
        assert_close(first.ease, 2.5);
        assert_eq!(first.due, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let second_at = first.due;
        let second = schedule_card(&first, 4.0, second_at);
        assert_eq!(second.interval, 6);
        assert_eq!(second.repetitions, 2);
        assert_eq!(second.due, second.last_reviewed + Duration::days(6));

        let third = schedule_card(&second, 0.0, second.due);
        assert!(third.ease < second.ease);
        assert!(third.ease >= MIN_EASE);
        assert_eq!(third.interval, (6.0 * third.ease).round() as u32);
        assert_eq!(third.repetitions, 3);
    }

    #[test]
    fn test_huge_interval_pins_due() {
        let next = schedule_card(&card_with(2, u32::MAX, 2.5), 5.0, day(1));
        assert_eq!(next.interval, u32::MAX);
        assert_eq!(next.due, latest_due());

        // Representable by chrono but past year 9999
        let next = schedule_card(&card_with(2, 3_000_000, 2.5), 5.0, day(1));
        assert_eq!(next.interval, 7_800_000);
        assert_eq!(next.due, latest_due());
    }

    #[test]
    fn test_rating_keys() {
        assert_eq!(Rating::from_key('1'), Some(Rating::Hard));
        assert_eq!(Rating::from_key('2'), Some(Rating::Good));
        assert_eq!(Rating::from_key('3'), Some(Rating::Easy));
        assert_eq!(Rating::from_key('4'), None);
        assert_eq!(Rating::Hard.quality(), 0.0);
        assert_eq!(Rating::Good.quality(), 2.0);
        assert_eq!(Rating::Easy.quality(), 4.0);
    }
}
