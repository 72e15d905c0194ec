//! JSON backup format.
//!
//! ```json
//! {
//!   "decks": [
//!     { "id": "...", "name": "...", "archived": false,
//!       "cards": [ { "id": "...", "front": "...", "back": "...",
//!                    "due": "2024-01-02T00:00:00Z", "interval": 1,
//!                    "ease": 2.5, "repetitions": 1,
//!                    "lastReviewed": "2024-01-01T00:00:00Z" } ] }
//!   ],
//!   "settings": { "dailyGoal": 20 },
//!   "streak": "3"
//! }
//! ```
//!
//! Import validates each deck and card on its own. A bad record is skipped
//! and reported; it never aborts the rest of the load. Ids are unique across
//! the document, so a repeated deck or card id is a bad record too.

use crate::deck::{Card, Deck, MIN_EASE, latest_due};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Largest backup file accepted for import
pub const MAX_IMPORT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("Card {index} in deck {deck}: {reason}")]
    MalformedCardState {
        deck: String,
        index: usize,
        reason: String,
    },

    #[error("Deck {index}: {reason}")]
    MalformedDeckState { index: usize, reason: String },

    #[error("Invalid backup: {0}")]
    InvalidDocument(String),
}

/// Settings carried in a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSettings {
    pub daily_goal: u32,
}

/// Streak written by older backups as a string, by newer ones as a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StreakValue {
    Number(u32),
    Text(String),
}

/// Backup document as written by `export`
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub decks: &'a [Deck],
    pub settings: SnapshotSettings,
    pub streak: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    id: String,
    front: String,
    back: String,
    due: DateTime<Utc>,
    interval: u32,
    ease: f64,
    repetitions: u32,
    last_reviewed: DateTime<Utc>,
}

/// Result of parsing a backup
#[derive(Debug, Default)]
pub struct ImportReport {
    pub decks: Vec<Deck>,
    pub settings: Option<SnapshotSettings>,
    pub streak: Option<u32>,
    /// Records that were dropped, with the reason
    pub skipped: Vec<SnapshotError>,
}

/// Ids already taken by earlier records
#[derive(Default)]
struct SeenIds {
    decks: HashSet<String>,
    cards: HashSet<String>,
}

impl ImportReport {
    pub fn card_count(&self) -> usize {
        self.decks.iter().map(|d| d.cards.len()).sum()
    }
}

/// Serialize the collection to pretty JSON
pub fn to_json(decks: &[Deck], settings: SnapshotSettings, streak: u32) -> Result<String> {
    let snapshot = Snapshot {
        decks,
        settings,
        streak: streak.to_string(),
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

/// Default backup file name for a given day
pub fn default_file_name(today: NaiveDate) -> PathBuf {
    PathBuf::from(format!("flashcards-backup-{}.json", today.format("%Y-%m-%d")))
}

/// Write a backup file
pub fn export(path: &Path, decks: &[Deck], settings: SnapshotSettings, streak: u32) -> Result<()> {
    let json = to_json(decks, settings, streak)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;
    info!(path = %path.display(), decks = decks.len(), "Backup exported");
    Ok(())
}

/// Read and validate a backup file
pub fn import(path: &Path) -> Result<ImportReport> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read backup: {}", path.display()))?
        .len();
    if size > MAX_IMPORT_BYTES {
        anyhow::bail!("Backup file is {} bytes; the limit is 5MB", size);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup: {}", path.display()))?;
    let report = parse(&content)?;

    for skipped in &report.skipped {
        warn!(error = %skipped, "Skipped record during import");
    }
    info!(
        path = %path.display(),
        decks = report.decks.len(),
        cards = report.card_count(),
        skipped = report.skipped.len(),
        "Backup parsed"
    );
    Ok(report)
}

/// Parse a backup document
pub fn parse(content: &str) -> Result<ImportReport, SnapshotError> {
    let doc: Value = serde_json::from_str(content)
        .map_err(|e| SnapshotError::InvalidDocument(e.to_string()))?;
    let Value::Object(doc) = doc else {
        return Err(SnapshotError::InvalidDocument(
            "expected a JSON object".to_string(),
        ));
    };

    let mut report = ImportReport::default();
    let mut seen = SeenIds::default();

    match doc.get("decks") {
        None | Some(Value::Null) => {}
        Some(Value::Array(decks)) => {
            for (index, value) in decks.iter().enumerate() {
                match parse_deck(index, value, &mut seen, &mut report.skipped) {
                    Ok(deck) => report.decks.push(deck),
                    Err(e) => report.skipped.push(e),
                }
            }
        }
        Some(_) => {
            return Err(SnapshotError::InvalidDocument(
                "decks must be an array".to_string(),
            ));
        }
    }

    match doc.get("settings") {
        None | Some(Value::Null) => {}
        Some(Value::Object(settings)) => {
            report.settings = settings
                .get("dailyGoal")
                .and_then(Value::as_u64)
                .and_then(|g| u32::try_from(g).ok())
                .map(|daily_goal| SnapshotSettings { daily_goal });
        }
        Some(_) => {
            return Err(SnapshotError::InvalidDocument(
                "settings must be an object".to_string(),
            ));
        }
    }

    match doc.get("streak") {
        None | Some(Value::Null) => {}
        Some(value) => {
            report.streak = match serde_json::from_value::<StreakValue>(value.clone()) {
                Ok(StreakValue::Number(n)) => Some(n),
                Ok(StreakValue::Text(s)) => s.trim().parse().ok(),
                Err(_) => None,
            };
            if report.streak.is_none() {
                return Err(SnapshotError::InvalidDocument(
                    "streak must be a non-negative integer".to_string(),
                ));
            }
        }
    }

    Ok(report)
}

fn parse_deck(
    index: usize,
    value: &Value,
    seen: &mut SeenIds,
    skipped: &mut Vec<SnapshotError>,
) -> Result<Deck, SnapshotError> {
    let malformed = |reason: &str| SnapshotError::MalformedDeckState {
        index,
        reason: reason.to_string(),
    };

    let obj = value.as_object().ok_or_else(|| malformed("not an object"))?;
    let id = non_empty_str(obj.get("id")).ok_or_else(|| malformed("missing or empty id"))?;
    let name = non_empty_str(obj.get("name")).ok_or_else(|| malformed("missing or empty name"))?;
    let archived = match obj.get("archived") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(malformed("archived must be a boolean")),
    };
    let cards = obj
        .get("cards")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("cards must be an array"))?;
    if !seen.decks.insert(id.clone()) {
        return Err(malformed("duplicate id"));
    }

    let mut deck = Deck {
        id,
        name,
        archived,
        cards: Vec::with_capacity(cards.len()),
    };

    for (card_index, card) in cards.iter().enumerate() {
        let parsed = parse_card(card).and_then(|card| {
            if seen.cards.insert(card.id.clone()) {
                Ok(card)
            } else {
                Err(format!("duplicate id {}", card.id))
            }
        });
        match parsed {
            Ok(card) => deck.cards.push(card),
            Err(reason) => skipped.push(SnapshotError::MalformedCardState {
                deck: deck.name.clone(),
                index: card_index,
                reason,
            }),
        }
    }

    Ok(deck)
}

fn parse_card(value: &Value) -> Result<Card, String> {
    let raw = RawCard::deserialize(value).map_err(|e| e.to_string())?;

    if raw.id.trim().is_empty() {
        return Err("empty id".to_string());
    }
    if raw.front.trim().is_empty() || raw.back.trim().is_empty() {
        return Err("empty front or back".to_string());
    }
    if !raw.ease.is_finite() || raw.ease < MIN_EASE {
        return Err(format!("ease {} is below {}", raw.ease, MIN_EASE));
    }
    let latest = latest_due();
    if raw.due > latest || raw.last_reviewed > latest {
        return Err(format!("timestamps must not be later than {}", latest.to_rfc3339()));
    }

    Ok(Card {
        id: raw.id,
        front: raw.front,
        back: raw.back,
        due: raw.due,
        interval: raw.interval,
        ease: raw.ease,
        repetitions: raw.repetitions,
        last_reviewed: raw.last_reviewed,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
