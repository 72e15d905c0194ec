use crate::deck::{Card, Deck, validate_name};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

const STREAK_KEY: &str = "streak";

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Storage { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS decks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                deck_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                due TEXT NOT NULL,
                interval INTEGER NOT NULL,
                ease REAL NOT NULL,
                repetitions INTEGER NOT NULL,
                last_reviewed TEXT NOT NULL,
                position INTEGER NOT NULL,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id, position);
            ",
        )?;

        Ok(())
    }

    /// All decks with their cards, both in insertion order
    pub fn load_decks(&self) -> Result<Vec<Deck>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, archived FROM decks ORDER BY position")?;

        let mut decks = stmt
            .query_map([], |row| {
                Ok(Deck {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    archived: row.get(2)?,
                    cards: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, front, back, due, interval, ease, repetitions, last_reviewed
             FROM cards WHERE deck_id = ?1 ORDER BY position",
        )?;

        for deck in &mut decks {
            deck.cards = stmt
                .query_map(params![deck.id], card_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(decks)
    }

    /// Create an empty deck at the end of the list
    pub fn add_deck(&self, name: &str) -> Result<Deck> {
        let deck = Deck::new(name)?;
        insert_deck(&self.conn, &deck, self.next_deck_position()?)?;
        info!(deck_id = %deck.id, name = %deck.name, "Deck created");
        Ok(deck)
    }

    pub fn rename_deck(&self, deck_id: &str, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let changed = self.conn.execute(
            "UPDATE decks SET name = ?1 WHERE id = ?2",
            params![name, deck_id],
        )?;
        ensure_found(changed, "deck", deck_id)?;
        info!(deck_id, name = %name, "Deck renamed");
        Ok(())
    }

    pub fn set_archived(&self, deck_id: &str, archived: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE decks SET archived = ?1 WHERE id = ?2",
            params![archived, deck_id],
        )?;
        ensure_found(changed, "deck", deck_id)?;
        info!(deck_id, archived, "Deck archive flag changed");
        Ok(())
    }

    /// Delete a deck and all of its cards
    pub fn delete_deck(&self, deck_id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM decks WHERE id = ?1", params![deck_id])?;
        ensure_found(changed, "deck", deck_id)?;
        info!(deck_id, "Deck deleted");
        Ok(())
    }

    /// Append a new, immediately due card to a deck
    pub fn add_card(
        &self,
        deck_id: &str,
        front: &str,
        back: &str,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM decks WHERE id = ?1)",
            params![deck_id],
            |row| row.get(0),
        )?;
        if !exists {
            bail!("Deck not found: {}", deck_id);
        }

        let card = Card::new(front, back, now)?;
        let position = self.next_card_position(deck_id)?;
        insert_card(&self.conn, deck_id, &card, position)?;
        debug!(deck_id, card_id = %card.id, "Card added");
        Ok(card)
    }

    /// Change a card's front and back. Scheduling fields are untouched.
    pub fn edit_card(&self, card_id: &str, front: &str, back: &str) -> Result<()> {
        let mut card = self
            .get_card(card_id)?
            .with_context(|| format!("Card not found: {}", card_id))?;
        card.edit(front, back)?;

        self.conn.execute(
            "UPDATE cards SET front = ?1, back = ?2 WHERE id = ?3",
            params![card.front, card.back, card_id],
        )?;
        debug!(card_id, "Card edited");
        Ok(())
    }

    pub fn delete_card(&self, card_id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
        ensure_found(changed, "card", card_id)?;
        debug!(card_id, "Card deleted");
        Ok(())
    }

    /// Get a card by ID
    pub fn get_card(&self, card_id: &str) -> Result<Option<Card>> {
        let card = self
            .conn
            .query_row(
                "SELECT id, front, back, due, interval, ease, repetitions, last_reviewed
                 FROM cards WHERE id = ?1",
                params![card_id],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }

    /// Persist the scheduling fields of a reviewed card
    pub fn save_schedule(&self, card: &Card) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE cards SET
                due = ?1,
                interval = ?2,
                ease = ?3,
                repetitions = ?4,
                last_reviewed = ?5
             WHERE id = ?6",
            params![
                card.due.to_rfc3339(),
                card.interval,
                card.ease,
                card.repetitions,
                card.last_reviewed.to_rfc3339(),
                card.id
            ],
        )?;
        ensure_found(changed, "card", &card.id)?;
        debug!(
            card_id = %card.id,
            interval = card.interval,
            ease = card.ease,
            repetitions = card.repetitions,
            due = %card.due,
            "Card rescheduled"
        );
        Ok(())
    }

    /// Number of completed review sessions
    pub fn streak(&self) -> Result<u32> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![STREAK_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(v) => v
                .parse()
                .with_context(|| format!("Corrupt streak value: {}", v)),
            None => Ok(0),
        }
    }

    /// Record a completed review session and return the new streak
    pub fn increment_streak(&self) -> Result<u32> {
        let streak = self.streak()?.saturating_add(1);
        set_streak(&self.conn, streak)?;
        info!(streak, "Streak incremented");
        Ok(streak)
    }

    /// Replace the whole collection, e.g. when restoring a backup
    pub fn replace_all(&mut self, decks: &[Deck], streak: Option<u32>) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cards", [])?;
        tx.execute("DELETE FROM decks", [])?;

        for (position, deck) in decks.iter().enumerate() {
            insert_deck(&tx, deck, position as i64)?;
            for (card_position, card) in deck.cards.iter().enumerate() {
                insert_card(&tx, &deck.id, card, card_position as i64)?;
            }
        }

        if let Some(streak) = streak {
            set_streak(&tx, streak)?;
        }

        tx.commit()?;
        info!(decks = decks.len(), "Collection replaced");
        Ok(())
    }

    /// Delete every deck, card and the streak
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM cards; DELETE FROM decks; DELETE FROM meta;")?;
        info!("All data reset");
        Ok(())
    }

    fn next_deck_position(&self) -> Result<i64> {
        let pos = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM decks",
            [],
            |row| row.get(0),
        )?;
        Ok(pos)
    }

    fn next_card_position(&self, deck_id: &str) -> Result<i64> {
        let pos = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM cards WHERE deck_id = ?1",
            params![deck_id],
            |row| row.get(0),
        )?;
        Ok(pos)
    }
}

fn insert_deck(conn: &Connection, deck: &Deck, position: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO decks (id, name, archived, position) VALUES (?1, ?2, ?3, ?4)",
        params![deck.id, deck.name, deck.archived, position],
    )?;
    Ok(())
}

fn insert_card(conn: &Connection, deck_id: &str, card: &Card, position: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO cards (id, deck_id, front, back, due, interval, ease, repetitions,
                            last_reviewed, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            card.id,
            deck_id,
            card.front,
            card.back,
            card.due.to_rfc3339(),
            card.interval,
            card.ease,
            card.repetitions,
            card.last_reviewed.to_rfc3339(),
            position
        ],
    )?;
    Ok(())
}

fn set_streak(conn: &Connection, streak: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = ?2",
        params![STREAK_KEY, streak.to_string()],
    )?;
    Ok(())
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        front: row.get(1)?,
        back: row.get(2)?,
        due: parse_timestamp(row, 3)?,
        interval: row.get(4)?,
        ease: row.get(5)?,
        repetitions: row.get(6)?,
        last_reviewed: parse_timestamp(row, 7)?,
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn ensure_found(changed: usize, kind: &str, id: &str) -> Result<()> {
    if changed == 0 {
        bail!("{} not found: {}", kind, id);
    }
    Ok(())
}
