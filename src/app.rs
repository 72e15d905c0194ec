use crate::config::Config;
use crate::deck::Deck;
use crate::scheduler::Rating;
use crate::session::ReviewFlow;
use crate::stats::Stats;
use crate::storage::Storage;
use crate::ui;
use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{DefaultTerminal, Frame};
use std::time::Duration;
use tracing::{info, warn};

/// Which screen is showing
#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Decks,
    DeckDetail { deck_id: String },
    Review,
    Complete,
    Stats,
}

/// What a text form creates or changes
#[derive(Debug, Clone, PartialEq)]
enum FormTarget {
    NewDeck,
    RenameDeck(String),
    NewCard { deck_id: String },
    EditCard(String),
}

/// Text entry popup
#[derive(Debug, Clone)]
pub struct Form {
    target: FormTarget,
    pub title: &'static str,
    pub fields: Vec<(&'static str, String)>,
    pub focus: usize,
}

impl Form {
    fn deck(target: FormTarget, title: &'static str, name: &str) -> Self {
        Self {
            target,
            title,
            fields: vec![("Name", name.to_string())],
            focus: 0,
        }
    }

    fn card(target: FormTarget, title: &'static str, front: &str, back: &str) -> Self {
        Self {
            target,
            title,
            fields: vec![("Front", front.to_string()), ("Back", back.to_string())],
            focus: 0,
        }
    }

    fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map(|(_, v)| v.as_str()).unwrap_or("")
    }
}

/// Destructive action waiting for a yes/no
#[derive(Debug, Clone, PartialEq)]
enum Confirm {
    DeleteDeck { id: String, name: String },
    DeleteCard { id: String },
}

impl Confirm {
    fn question(&self) -> String {
        match self {
            Confirm::DeleteDeck { name, .. } => {
                format!("Delete deck \"{}\" and all its cards?", name)
            }
            Confirm::DeleteCard { .. } => "Delete this card?".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Modal {
    Form(Form),
    Confirm(Confirm),
}

/// Main application state
pub struct App {
    config: Config,
    storage: Storage,
    decks: Vec<Deck>,
    streak: u32,
    screen: Screen,
    modal: Option<Modal>,
    // Deck list state
    selected_deck_idx: usize,
    show_archived: bool,
    // Deck detail state
    selected_card_idx: usize,
    // Review state
    flow: ReviewFlow,
    revealed: bool,
    show_shortcuts: bool,
    reviewed_in_session: usize,
    return_to: Option<Screen>,
    status: Option<String>,
    should_exit: bool,
}

impl App {
    /// Create a new application
    pub fn new(config: Config, storage: Storage) -> Result<Self> {
        let decks = storage.load_decks()?;
        let streak = storage.streak()?;

        Ok(Self {
            config,
            storage,
            decks,
            streak,
            screen: Screen::Decks,
            modal: None,
            selected_deck_idx: 0,
            show_archived: false,
            selected_card_idx: 0,
            flow: ReviewFlow::Idle,
            revealed: false,
            show_shortcuts: false,
            reviewed_in_session: 0,
            return_to: None,
            status: None,
            should_exit: false,
        })
    }

    /// Run the application
    pub fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.should_exit {
            terminal.draw(|frame| self.render(frame))?;

            if event::poll(Duration::from_millis(100))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key)?;
            }
        }

        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.decks = self.storage.load_decks()?;
        let visible = self.visible_decks().len();
        // One past the last deck is the "All decks" row
        self.selected_deck_idx = self.selected_deck_idx.min(visible);
        if let Some(deck) = self.current_deck() {
            let cards = deck.cards.len();
            self.selected_card_idx = self.selected_card_idx.min(cards.saturating_sub(1));
        }
        Ok(())
    }

    fn visible_decks(&self) -> Vec<&Deck> {
        self.decks
            .iter()
            .filter(|d| self.show_archived || !d.archived)
            .collect()
    }

    fn selected_deck(&self) -> Option<&Deck> {
        self.visible_decks().get(self.selected_deck_idx).copied()
    }

    /// Deck shown on the detail screen
    fn current_deck(&self) -> Option<&Deck> {
        match &self.screen {
            Screen::DeckDetail { deck_id } => self.decks.iter().find(|d| &d.id == deck_id),
            _ => None,
        }
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let now = Utc::now();

        match &self.screen {
            Screen::Decks => {
                let stats = Stats::collect(&self.decks, now);
                let rows: Vec<ui::DeckRow> = self
                    .visible_decks()
                    .into_iter()
                    .map(|d| ui::DeckRow {
                        name: &d.name,
                        archived: d.archived,
                        due: d.due_count(now),
                        total: d.cards.len(),
                    })
                    .collect();
                ui::render_deck_list(
                    frame,
                    &ui::DeckListState {
                        decks: &rows,
                        selected: self.selected_deck_idx,
                        streak: self.streak,
                        reviewed_today: stats.reviewed_today,
                        daily_goal: self.config.daily_goal,
                        show_archived: self.show_archived,
                    },
                );
            }
            Screen::DeckDetail { .. } => {
                if let Some(deck) = self.current_deck() {
                    ui::render_deck_detail(frame, deck, self.selected_card_idx, now);
                }
            }
            Screen::Review => {
                if let Some(session) = self.flow.session()
                    && let Some(due) = session.current()
                {
                    let deck_name = self
                        .decks
                        .iter()
                        .find(|d| d.id == due.deck_id)
                        .map(|d| d.name.as_str())
                        .unwrap_or("");
                    ui::render_review(
                        frame,
                        &ui::ReviewState {
                            deck: deck_name,
                            front: &due.card.front,
                            back: &due.card.back,
                            revealed: self.revealed,
                            position: session.index() + 1,
                            total: session.len(),
                            show_shortcuts: self.show_shortcuts,
                        },
                    );
                }
            }
            Screen::Complete => {
                ui::render_complete(frame, self.reviewed_in_session, self.streak);
            }
            Screen::Stats => {
                ui::render_stats(frame, &Stats::collect(&self.decks, now));
            }
        }

        match &self.modal {
            Some(Modal::Form(form)) => ui::render_form(frame, form),
            Some(Modal::Confirm(confirm)) => ui::render_confirm(frame, &confirm.question()),
            None => {}
        }

        if let Some(status) = &self.status {
            ui::render_status(frame, status);
        }
    }

    /// Handle a key press
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return Ok(());
        }

        self.status = None;

        if let Some(modal) = self.modal.take() {
            return self.handle_modal(modal, key);
        }

        match self.screen.clone() {
            Screen::Decks => self.handle_decks(key),
            Screen::DeckDetail { deck_id } => self.handle_deck_detail(&deck_id, key),
            Screen::Review => self.handle_review(key),
            Screen::Complete | Screen::Stats => {
                self.screen = self.return_to.take().unwrap_or(Screen::Decks);
                self.reload()
            }
        }
    }

    /// Handle deck list input
    fn handle_decks(&mut self, key: KeyEvent) -> Result<()> {
        let visible = self.visible_decks().len();

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_deck_idx = self.selected_deck_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_deck_idx < visible {
                    self.selected_deck_idx += 1;
                }
            }
            KeyCode::Enter => match self.selected_deck() {
                Some(deck) => {
                    self.screen = Screen::DeckDetail {
                        deck_id: deck.id.clone(),
                    };
                    self.selected_card_idx = 0;
                }
                None => self.start_review(None)?,
            },
            KeyCode::Char('r') => self.start_review(None)?,
            KeyCode::Char('n') => {
                let form = Form::deck(FormTarget::NewDeck, "New deck", "");
                self.modal = Some(Modal::Form(form));
            }
            KeyCode::Char('e') => {
                if let Some(deck) = self.selected_deck() {
                    let target = FormTarget::RenameDeck(deck.id.clone());
                    let form = Form::deck(target, "Rename deck", &deck.name);
                    self.modal = Some(Modal::Form(form));
                }
            }
            KeyCode::Char('x') => {
                if let Some(deck) = self.selected_deck() {
                    let (id, archived) = (deck.id.clone(), deck.archived);
                    self.storage.set_archived(&id, !archived)?;
                    let message = if archived { "Deck restored" } else { "Deck archived" };
                    self.status = Some(message.to_string());
                    self.reload()?;
                }
            }
            KeyCode::Char('d') => {
                if let Some(deck) = self.selected_deck() {
                    self.modal = Some(Modal::Confirm(Confirm::DeleteDeck {
                        id: deck.id.clone(),
                        name: deck.name.clone(),
                    }));
                }
            }
            KeyCode::Char('a') => {
                self.show_archived = !self.show_archived;
                self.reload()?;
            }
            KeyCode::Char('s') => {
                self.return_to = Some(Screen::Decks);
                self.screen = Screen::Stats;
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.should_exit = true;
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle deck detail input
    fn handle_deck_detail(&mut self, deck_id: &str, key: KeyEvent) -> Result<()> {
        let Some(deck) = self.decks.iter().find(|d| d.id == deck_id) else {
            self.screen = Screen::Decks;
            return Ok(());
        };
        let card_count = deck.cards.len();
        let selected = deck.cards.get(self.selected_card_idx).cloned();

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_card_idx = self.selected_card_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_card_idx + 1 < card_count {
                    self.selected_card_idx += 1;
                }
            }
            KeyCode::Char('n') => {
                let target = FormTarget::NewCard {
                    deck_id: deck_id.to_string(),
                };
                self.modal = Some(Modal::Form(Form::card(target, "New card", "", "")));
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(card) = selected {
                    let target = FormTarget::EditCard(card.id.clone());
                    let form = Form::card(target, "Edit card", &card.front, &card.back);
                    self.modal = Some(Modal::Form(form));
                }
            }
            KeyCode::Char('d') => {
                if let Some(card) = selected {
                    self.modal = Some(Modal::Confirm(Confirm::DeleteCard { id: card.id }));
                }
            }
            KeyCode::Char('r') => self.start_review(Some(deck_id))?,
            KeyCode::Esc | KeyCode::Char('q') => {
                self.screen = Screen::Decks;
            }
            _ => {}
        }
        Ok(())
    }

    /// Start a review of one deck, or of every deck when `deck_id` is None
    fn start_review(&mut self, deck_id: Option<&str>) -> Result<()> {
        self.reload()?;
        let now = Utc::now();

        let flow = match deck_id {
            Some(id) => ReviewFlow::begin(self.decks.iter().filter(|d| d.id == id), now),
            None => ReviewFlow::begin(
                self.decks
                    .iter()
                    .filter(|d| self.config.include_archived || !d.archived),
                now,
            ),
        };

        let Some(session) = flow.session() else {
            self.status = Some("No cards due. Come back later!".to_string());
            return Ok(());
        };
        info!(cards = session.len(), deck_id = ?deck_id, "Review session started");

        self.return_to = Some(self.screen.clone());
        self.flow = flow;
        self.revealed = false;
        self.reviewed_in_session = 0;
        self.screen = Screen::Review;
        Ok(())
    }

    /// Handle review input
    fn handle_review(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.revealed = !self.revealed;
            }
            KeyCode::Char('?') | KeyCode::Char('h') => {
                self.show_shortcuts = !self.show_shortcuts;
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                // Abandoning a session just drops it
                info!(reviewed = self.reviewed_in_session, "Review session abandoned");
                self.flow = ReviewFlow::Idle;
                self.screen = self.return_to.take().unwrap_or(Screen::Decks);
                self.reload()?;
            }
            KeyCode::Char(c) => {
                if let Some(rating) = Rating::from_key(c) {
                    self.rate(rating)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Score the current card and move on
    fn rate(&mut self, rating: Rating) -> Result<()> {
        let Some(reviewed) = self.flow.rate(rating.quality(), Utc::now()) else {
            return Ok(());
        };

        self.storage.save_schedule(&reviewed.card)?;
        self.reviewed_in_session += 1;
        self.revealed = false;

        if self.flow.is_complete() {
            self.streak = self.storage.increment_streak()?;
            info!(
                reviewed = self.reviewed_in_session,
                streak = self.streak,
                "Review session complete"
            );
            self.flow = ReviewFlow::Idle;
            self.screen = Screen::Complete;
            self.reload()?;
        }
        Ok(())
    }

    fn handle_modal(&mut self, modal: Modal, key: KeyEvent) -> Result<()> {
        match modal {
            Modal::Form(form) => self.handle_form(form, key),
            Modal::Confirm(confirm) => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    match confirm {
                        Confirm::DeleteDeck { id, .. } => {
                            self.storage.delete_deck(&id)?;
                            if self.current_deck().is_some_and(|d| d.id == id) {
                                self.screen = Screen::Decks;
                            }
                        }
                        Confirm::DeleteCard { id } => self.storage.delete_card(&id)?,
                    }
                    self.reload()?;
                }
                Ok(())
            }
        }
    }

    fn handle_form(&mut self, mut form: Form, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => return Ok(()),
            KeyCode::Tab | KeyCode::Down => {
                form.focus = (form.focus + 1) % form.fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.focus = (form.focus + form.fields.len() - 1) % form.fields.len();
            }
            KeyCode::Backspace => {
                if let Some((_, value)) = form.fields.get_mut(form.focus) {
                    value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some((_, value)) = form.fields.get_mut(form.focus) {
                    value.push(c);
                }
            }
            KeyCode::Enter => {
                if form.focus + 1 < form.fields.len() {
                    form.focus += 1;
                } else {
                    match self.submit_form(&form) {
                        Ok(()) => return self.reload(),
                        Err(e) => {
                            warn!(error = %e, "Form rejected");
                            self.status = Some(e.to_string());
                        }
                    }
                }
            }
            _ => {}
        }

        self.modal = Some(Modal::Form(form));
        Ok(())
    }

    fn submit_form(&mut self, form: &Form) -> Result<()> {
        match &form.target {
            FormTarget::NewDeck => {
                self.storage.add_deck(form.value(0))?;
                // select the new deck, which goes at the end
                self.selected_deck_idx = self.visible_decks().len();
            }
            FormTarget::RenameDeck(id) => self.storage.rename_deck(id, form.value(0))?,
            FormTarget::NewCard { deck_id } => {
                self.storage
                    .add_card(deck_id, form.value(0), form.value(1), Utc::now())?;
            }
            FormTarget::EditCard(id) => {
                self.storage.edit_card(id, form.value(0), form.value(1))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(Config::default(), Storage::open_in_memory().unwrap()).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn add_deck(app: &mut App, name: &str) {
        press(app, KeyCode::Char('n'));
        type_text(app, name);
        press(app, KeyCode::Enter);
    }

    fn add_card(app: &mut App, front: &str, back: &str) {
        press(app, KeyCode::Char('n'));
        type_text(app, front);
        press(app, KeyCode::Tab);
        type_text(app, back);
        press(app, KeyCode::Enter);
    }

    #[test]
    fn test_create_deck_and_cards_through_keys() {
        let mut app = app();
        add_deck(&mut app, "Capitals");
        assert_eq!(app.decks.len(), 1);
        assert_eq!(app.decks[0].name, "Capitals");
        assert!(app.modal.is_none());

        app.selected_deck_idx = 0;
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.screen, Screen::DeckDetail { .. }));

        add_card(&mut app, "France", "Paris");
        add_card(&mut app, "Spain", "Madrid");
        let fronts: Vec<_> = app.decks[0].cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["France", "Spain"]);
    }

    #[test]
    fn test_empty_form_is_rejected_and_stays_open() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Enter);
        assert!(app.decks.is_empty());
        assert!(matches!(app.modal, Some(Modal::Form(_))));
        assert!(app.status.is_some());

        press(&mut app, KeyCode::Esc);
        assert!(app.modal.is_none());
    }

    #[test]
    fn test_review_session_updates_cards_and_streak() {
        let mut app = app();
        add_deck(&mut app, "Numbers");
        app.selected_deck_idx = 0;
        press(&mut app, KeyCode::Enter);
        add_card(&mut app, "one", "uno");
        add_card(&mut app, "two", "dos");
        press(&mut app, KeyCode::Esc);

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.screen, Screen::Review);
        assert_eq!(app.flow.session().unwrap().len(), 2);

        press(&mut app, KeyCode::Char(' '));
        assert!(app.revealed);
        press(&mut app, KeyCode::Char('3'));
        assert!(!app.revealed);
        press(&mut app, KeyCode::Char('1'));

        assert_eq!(app.screen, Screen::Complete);
        assert_eq!(app.streak, 1);
        assert_eq!(app.reviewed_in_session, 2);
        for card in &app.decks[0].cards {
            assert_eq!(card.repetitions, 1);
            assert_eq!(card.interval, 1);
        }
        // ease moved by quality: Easy (4) keeps 2.5, Hard (0) drops to 1.7
        assert!((app.decks[0].cards[0].ease - 2.5).abs() < 1e-9);
        assert!((app.decks[0].cards[1].ease - 1.7).abs() < 1e-9);

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.screen, Screen::Decks);

        // nothing is due any more
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.screen, Screen::Decks);
        assert!(app.status.is_some());
    }

    #[test]
    fn test_abandoned_session_keeps_rated_cards_only() {
        let mut app = app();
        add_deck(&mut app, "Half");
        app.selected_deck_idx = 0;
        press(&mut app, KeyCode::Enter);
        add_card(&mut app, "a", "1");
        add_card(&mut app, "b", "2");

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Esc);

        assert!(matches!(app.screen, Screen::DeckDetail { .. }));
        assert_eq!(app.streak, 0);
        assert_eq!(app.decks[0].cards[0].repetitions, 1);
        assert_eq!(app.decks[0].cards[1].repetitions, 0);
    }

    #[test]
    fn test_archived_decks_are_hidden_and_skipped() {
        let mut app = app();
        add_deck(&mut app, "Active");
        add_deck(&mut app, "Shelved");
        let shelved = app.decks[1].id.clone();
        app.storage.add_card(&shelved, "q", "a", Utc::now()).unwrap();

        app.selected_deck_idx = 1;
        press(&mut app, KeyCode::Char('x'));
        assert!(app.decks[1].archived);
        assert_eq!(app.visible_decks().len(), 1);

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.screen, Screen::Decks);

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.visible_decks().len(), 2);
    }

    #[test]
    fn test_delete_deck_needs_confirmation() {
        let mut app = app();
        add_deck(&mut app, "Temp");
        app.selected_deck_idx = 0;

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.decks.len(), 1);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.decks.is_empty());
    }

    #[test]
    fn test_ctrl_c_exits_from_any_screen() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(app.should_exit);
    }
}
