//! Due-card selection and review session progression.

use crate::deck::{Card, Deck};
use crate::scheduler::schedule_card;
use chrono::{DateTime, Utc};

/// A due card together with the id of the deck that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct DueCard {
    pub card: Card,
    pub deck_id: String,
}

/// Cards due at `now`, decks in the given order and cards in deck order.
///
/// The result holds copies, so later changes to `decks` do not affect it.
pub fn due_cards<'a, I>(decks: I, now: DateTime<Utc>) -> Vec<DueCard>
where
    I: IntoIterator<Item = &'a Deck>,
{
    decks
        .into_iter()
        .flat_map(|deck| {
            deck.cards
                .iter()
                .filter(move |card| card.is_due(now))
                .map(move |card| DueCard {
                    card: card.clone(),
                    deck_id: deck.id.clone(),
                })
        })
        .collect()
}

/// Outcome of rating the current card
#[derive(Debug, Clone, PartialEq)]
pub struct Reviewed {
    pub deck_id: String,
    /// The rescheduled card, to be persisted by the caller
    pub card: Card,
    /// True when this was the last card in the session
    pub completed: bool,
}

/// A review session over a frozen queue of due cards
#[derive(Debug, Clone)]
pub struct ReviewSession {
    queue: Vec<DueCard>,
    index: usize,
}

impl ReviewSession {
    /// Snapshot the due cards. Returns `None` when nothing is due.
    pub fn start<'a, I>(decks: I, now: DateTime<Utc>) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Deck>,
    {
        let queue = due_cards(decks, now);
        if queue.is_empty() {
            return None;
        }
        Some(Self { queue, index: 0 })
    }

    /// The card currently under review
    pub fn current(&self) -> Option<&DueCard> {
        self.queue.get(self.index)
    }

    /// Zero-based position of the current card
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.queue.len()
    }

    /// Rate the current card and advance.
    pub fn rate(&mut self, quality: f64, now: DateTime<Utc>) -> Option<Reviewed> {
        let due = self.queue.get(self.index)?;
        let card = schedule_card(&due.card, quality, now);
        let deck_id = due.deck_id.clone();
        self.index += 1;

        Some(Reviewed {
            deck_id,
            card,
            completed: self.is_complete(),
        })
    }
}

/// Review state as seen by a caller driving the UI
#[derive(Debug, Clone, Default)]
pub enum ReviewFlow {
    /// No session
    #[default]
    Idle,
    InSession(ReviewSession),
    /// The last card of the session has been rated
    Complete,
}

impl ReviewFlow {
    /// Begin a session. Stays `Idle` when nothing is due.
    pub fn begin<'a, I>(decks: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Deck>,
    {
        match ReviewSession::start(decks, now) {
            Some(session) => ReviewFlow::InSession(session),
            None => ReviewFlow::Idle,
        }
    }

    /// Rate the current card. Moves to `Complete` after the last one.
    /// Does nothing outside a session.
    pub fn rate(&mut self, quality: f64, now: DateTime<Utc>) -> Option<Reviewed> {
        let ReviewFlow::InSession(session) = self else {
            return None;
        };

        let reviewed = session.rate(quality, now)?;
        if reviewed.completed {
            *self = ReviewFlow::Complete;
        }
        Some(reviewed)
    }

    pub fn session(&self) -> Option<&ReviewSession> {
        match self {
            ReviewFlow::InSession(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ReviewFlow::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap()
    }

    fn card(front: &str, due: DateTime<Utc>) -> Card {
        let mut card = Card::new(front, "back", now() - Duration::days(30)).unwrap();
        card.due = due;
        card
    }

    fn deck(name: &str, cards: Vec<Card>) -> Deck {
        let mut deck = Deck::new(name).unwrap();
        deck.cards = cards;
        deck
    }

    fn fronts(due: &[DueCard]) -> Vec<&str> {
        due.iter().map(|d| d.card.front.as_str()).collect()
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let decks = vec![deck(
            "A",
            vec![
                card("past", now() - Duration::seconds(1)),
                card("exact", now()),
                card("future", now() + Duration::seconds(1)),
            ],
        )];

        let due = due_cards(&decks, now());
        assert_eq!(fronts(&due), vec!["past", "exact"]);
    }

    #[test]
    fn test_mixed_collection_filters_every_card() {
        let offsets = [-3i64, 5, 0, -1, 2, -10, 7, 0];
        let cards: Vec<Card> = offsets
            .iter()
            .enumerate()
            .map(|(i, off)| card(&format!("c{i}"), now() + Duration::hours(*off)))
            .collect();
        let decks = vec![deck("mixed", cards.clone())];

        let due = due_cards(&decks, now());
        for c in &cards {
            let included = due.iter().any(|d| d.card.id == c.id);
            assert_eq!(included, c.due <= now(), "{}", c.front);
        }
    }

    #[test]
    fn test_deck_then_card_order() {
        let a = deck("A", vec![card("a1", now() - Duration::days(1))]);
        let b = deck("B", vec![card("b1", now() + Duration::days(2))]);
        let c = deck(
            "C",
            vec![
                card("c1", now() - Duration::days(1)),
                card("c2", now() - Duration::days(5)),
            ],
        );
        let decks = vec![a.clone(), b, c.clone()];

        let due = due_cards(&decks, now());
        assert_eq!(due.len(), 3);
        assert_eq!(fronts(&due), vec!["a1", "c1", "c2"]);
        assert_eq!(due[0].deck_id, a.id);
        assert_eq!(due[1].deck_id, c.id);
        assert_eq!(due[2].deck_id, c.id);
    }

    #[test]
    fn test_empty_input() {
        let decks: Vec<Deck> = Vec::new();
        assert!(due_cards(&decks, now()).is_empty());
        assert!(ReviewSession::start(&decks, now()).is_none());
        assert!(matches!(ReviewFlow::begin(&decks, now()), ReviewFlow::Idle));

        let decks = vec![deck("empty", Vec::new())];
        assert!(due_cards(&decks, now()).is_empty());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let mut decks = vec![deck("A", vec![card("a1", now()), card("a2", now())])];
        let session = ReviewSession::start(&decks, now()).unwrap();

        decks[0].cards[0].due = now() + Duration::days(10);
        decks[0].cards.push(card("a3", now()));

        assert_eq!(session.len(), 2);
        assert_eq!(session.current().unwrap().card.front, "a1");
        assert_eq!(session.current().unwrap().card.due, now());
    }

    #[test]
    fn test_session_walks_queue_then_completes() {
        let decks = vec![deck(
            "A",
            vec![card("a1", now()), card("a2", now()), card("a3", now())],
        )];
        let mut flow = ReviewFlow::begin(&decks, now());

        let first = flow.rate(4.0, now()).unwrap();
        assert_eq!(first.card.front, "a1");
        assert_eq!(first.card.repetitions, 1);
        assert!(!first.completed);
        assert_eq!(flow.session().unwrap().index(), 1);

        let second = flow.rate(0.0, now()).unwrap();
        assert_eq!(second.card.front, "a2");
        assert!(!second.completed);

        let third = flow.rate(5.0, now()).unwrap();
        assert_eq!(third.card.front, "a3");
        assert!(third.completed);
        assert!(flow.is_complete());

        assert!(flow.rate(5.0, now()).is_none());
    }

    #[test]
    fn test_rate_returns_owning_deck() {
        let a = deck("A", vec![card("a1", now())]);
        let b = deck("B", vec![card("b1", now())]);
        let decks = vec![a, b.clone()];
        let mut session = ReviewSession::start(&decks, now()).unwrap();

        session.rate(3.0, now()).unwrap();
        let reviewed = session.rate(3.0, now()).unwrap();
        assert_eq!(reviewed.deck_id, b.id);
        assert!(session.is_complete());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_idle_flow_ignores_ratings() {
        let mut flow = ReviewFlow::default();
        assert!(flow.rate(3.0, now()).is_none());
        assert!(flow.session().is_none());
        assert!(!flow.is_complete());
    }
}
