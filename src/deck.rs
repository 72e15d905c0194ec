use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ease factor given to every new card
pub const INITIAL_EASE: f64 = 2.5;

/// Ease factor floor, no rating can push a card below this
pub const MIN_EASE: f64 = 1.3;

/// 9999-12-31T23:59:59Z, the last instant RFC 3339 can write with a four-digit year
const LATEST_DUE_SECS: i64 = 253_402_300_799;

/// Latest instant a card can be scheduled for
pub fn latest_due() -> DateTime<Utc> {
    DateTime::from_timestamp(LATEST_DUE_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A single card in a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub front: String,
    pub back: String,
    /// Next review instant
    pub due: DateTime<Utc>,
    /// Days between `last_reviewed` and `due`
    pub interval: u32,
    pub ease: f64,
    /// Number of times the card has been scheduled
    pub repetitions: u32,
    pub last_reviewed: DateTime<Utc>,
}

impl Card {
    /// Create a card that is due immediately
    pub fn new(front: &str, back: &str, now: DateTime<Utc>) -> Result<Self> {
        let (front, back) = validate_sides(front, back)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            front,
            back,
            due: now,
            interval: 0,
            ease: INITIAL_EASE,
            repetitions: 0,
            last_reviewed: now,
        })
    }

    /// Replace the card's content. Scheduling state is left alone.
    pub fn edit(&mut self, front: &str, back: &str) -> Result<()> {
        let (front, back) = validate_sides(front, back)?;
        self.front = front;
        self.back = back;
        Ok(())
    }

    /// Whether the card should be shown at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

fn validate_sides(front: &str, back: &str) -> Result<(String, String)> {
    let front = front.trim();
    let back = back.trim();
    ensure!(!front.is_empty(), "Card front cannot be empty");
    ensure!(!back.is_empty(), "Card back cannot be empty");
    Ok((front.to_string(), back.to_string()))
}

/// A named, ordered collection of cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    pub cards: Vec<Card>,
}

impl Deck {
    /// Create an empty deck
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: validate_name(name)?,
            archived: false,
            cards: Vec::new(),
        })
    }

    /// Number of cards due at `now`
    pub fn due_count(&self, now: DateTime<Utc>) -> usize {
        self.cards.iter().filter(|c| c.is_due(now)).count()
    }
}

pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    ensure!(!name.is_empty(), "Deck name cannot be empty");
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_card_is_due_immediately() {
        let card = Card::new("hola", "hello", now()).unwrap();
        assert_eq!(card.interval, 0);
        assert_eq!(card.repetitions, 0);
        assert_eq!(card.ease, INITIAL_EASE);
        assert_eq!(card.due, now());
        assert_eq!(card.last_reviewed, now());
        assert!(card.is_due(now()));
    }

    #[test]
    fn test_new_card_trims_and_rejects_empty_sides() {
        let card = Card::new("  front ", "\tback\n", now()).unwrap();
        assert_eq!(card.front, "front");
        assert_eq!(card.back, "back");

        assert!(Card::new("", "back", now()).is_err());
        assert!(Card::new("front", "   ", now()).is_err());
    }

    #[test]
    fn test_edit_keeps_scheduling_state() {
        let mut card = Card::new("a", "b", now()).unwrap();
        card.interval = 6;
        card.repetitions = 2;
        card.ease = 2.36;
        let before = card.clone();

        card.edit("c", "d").unwrap();
        assert_eq!(card.front, "c");
        assert_eq!(card.back, "d");
        assert_eq!(card.id, before.id);
        assert_eq!(card.due, before.due);
        assert_eq!(card.interval, before.interval);
        assert_eq!(card.ease, before.ease);
        assert_eq!(card.repetitions, before.repetitions);

        assert!(card.edit("", "x").is_err());
        assert_eq!(card.front, "c");
    }

    #[test]
    fn test_deck_due_count() {
        let mut deck = Deck::new("Spanish").unwrap();
        deck.cards.push(Card::new("uno", "one", now()).unwrap());
        let mut later = Card::new("dos", "two", now()).unwrap();
        later.due = now() + chrono::Duration::days(1);
        deck.cards.push(later);

        assert_eq!(deck.due_count(now()), 1);
        assert!(!deck.archived);
    }

    #[test]
    fn test_latest_due_is_end_of_year_9999() {
        assert_eq!(latest_due(), Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap());
        assert_eq!(latest_due().to_rfc3339(), "9999-12-31T23:59:59+00:00");
    }

    #[test]
    fn test_deck_name_validation() {
        assert!(Deck::new("   ").is_err());
        let deck = Deck::new(" Verbs ").unwrap();
        assert_eq!(deck.name, "Verbs");
        assert_eq!(validate_name("\tIrregular verbs ").unwrap(), "Irregular verbs");
        assert!(validate_name("").is_err());
    }
}
