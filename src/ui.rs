use crate::app::Form;
use crate::deck::Deck;
use crate::scheduler::Rating;
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Clear, Gauge, Paragraph, Wrap},
};

/// One line of the deck list
pub struct DeckRow<'a> {
    pub name: &'a str,
    pub archived: bool,
    pub due: usize,
    pub total: usize,
}

/// Deck list screen state
pub struct DeckListState<'a> {
    pub decks: &'a [DeckRow<'a>],
    /// Index into `decks`; `decks.len()` selects "All decks"
    pub selected: usize,
    pub streak: u32,
    pub reviewed_today: usize,
    pub daily_goal: u32,
    pub show_archived: bool,
}

/// Review screen state
pub struct ReviewState<'a> {
    pub deck: &'a str,
    pub front: &'a str,
    pub back: &'a str,
    pub revealed: bool,
    /// 1-based position of the current card
    pub position: usize,
    pub total: usize,
    pub show_shortcuts: bool,
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn selectable(selected: bool) -> (&'static str, Style) {
    if selected {
        ("> ", Style::default().fg(Color::Cyan))
    } else {
        ("  ", Style::default().fg(Color::White))
    }
}

/// Render deck selection screen
pub fn render_deck_list(frame: &mut Frame, state: &DeckListState) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length((state.decks.len() + 2) as u16),
        Constraint::Length(2),
        Constraint::Fill(1),
    ])
    .split(area);

    let total_cards: usize = state.decks.iter().map(|d| d.total).sum();
    let header = vec![
        Line::from(Span::styled("Your Decks", Style::default().fg(Color::White))),
        Line::from(Span::styled(
            format!(
                "{} {} • {} total cards",
                state.decks.len(),
                if state.decks.len() == 1 { "deck" } else { "decks" },
                total_cards
            ),
            dim(),
        )),
        Line::from(vec![
            Span::styled(
                format!("🔥 {} session streak", state.streak),
                Style::default().fg(Color::LightRed),
            ),
            Span::styled(
                format!("   {}/{} reviewed today", state.reviewed_today, state.daily_goal),
                dim(),
            ),
        ]),
    ];
    frame.render_widget(Paragraph::new(header).alignment(Alignment::Center), chunks[1]);

    let mut lines: Vec<Line> = Vec::new();
    if state.decks.is_empty() {
        lines.push(Line::from(Span::styled(
            "No decks yet. Press n to create one.",
            dim(),
        )));
    }

    for (i, deck) in state.decks.iter().enumerate() {
        let (prefix, style) = selectable(i == state.selected);
        let archived = if deck.archived { " [archived]" } else { "" };
        lines.push(Line::from(Span::styled(
            format!(
                "{}{}{} ({} due / {} total)",
                prefix, deck.name, archived, deck.due, deck.total
            ),
            style,
        )));
    }

    let (prefix, style) = selectable(state.selected == state.decks.len());
    lines.push(Line::from(Span::styled(format!("{}All decks", prefix), style)));

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), chunks[2]);

    let archived_hint = if state.show_archived {
        "a hide archived"
    } else {
        "a show archived"
    };
    let help = format!(
        "enter open • r review all • n new • e rename • x archive • d delete • s stats • {} • q quit",
        archived_hint,
    );
    frame.render_widget(
        Paragraph::new(help)
            .style(dim())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[3],
    );
}

/// Render the card list of one deck
pub fn render_deck_detail(frame: &mut Frame, deck: &Deck, selected: usize, now: DateTime<Utc>) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .split(area);

    let header = vec![
        Line::from(Span::styled(&deck.name, Style::default().fg(Color::White))),
        Line::from(Span::styled(
            format!("{} cards • {} due", deck.cards.len(), deck.due_count(now)),
            dim(),
        )),
    ];
    frame.render_widget(Paragraph::new(header).alignment(Alignment::Center), chunks[0]);

    let mut lines: Vec<Line> = Vec::new();
    if deck.cards.is_empty() {
        lines.push(Line::from(Span::styled(
            "This deck doesn't have any cards. Press n to add your first card.",
            dim(),
        )));
    }

    // Keep the selection on screen
    let height = chunks[1].height.max(1) as usize;
    let skip = selected.saturating_sub(height - 1);

    for (i, card) in deck.cards.iter().enumerate().skip(skip).take(height) {
        let (prefix, style) = selectable(i == selected);
        let due = if card.is_due(now) {
            "due now".to_string()
        } else {
            format!("due {}", card.due.format("%Y-%m-%d"))
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{}", prefix, card.front), style),
            Span::styled(" → ", dim()),
            Span::styled(card.back.as_str(), style),
            Span::styled(format!("   {} • every {}d", due, card.interval), dim()),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), chunks[1]);

    frame.render_widget(
        Paragraph::new("n new card • e edit • d delete • r review deck • esc back")
            .style(dim())
            .alignment(Alignment::Center),
        chunks[2],
    );
}

/// Render a card under review
pub fn render_review(frame: &mut Frame, state: &ReviewState) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1), // Title
        Constraint::Length(1), // Card i of n
        Constraint::Length(1), // Progress bar
        Constraint::Length(1), // Spacer
        Constraint::Length(1), // Deck name
        Constraint::Length(3), // Front
        Constraint::Length(3), // Back or hint
        Constraint::Length(1), // Rating prompt
        Constraint::Length(1), // Shortcuts
        Constraint::Fill(1),
    ])
    .split(area);

    frame.render_widget(
        Paragraph::new("Review Cards")
            .style(Style::default().fg(Color::White))
            .alignment(Alignment::Center),
        chunks[1],
    );
    frame.render_widget(
        Paragraph::new(format!("Card {} of {}", state.position, state.total))
            .style(dim())
            .alignment(Alignment::Center),
        chunks[2],
    );

    let ratio = if state.total > 0 {
        state.position as f64 / state.total as f64
    } else {
        0.0
    };
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Blue))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(""),
        centered_width(chunks[3], 60),
    );

    frame.render_widget(
        Paragraph::new(state.deck).style(dim()).alignment(Alignment::Center),
        chunks[5],
    );
    frame.render_widget(
        Paragraph::new(state.front)
            .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[6],
    );

    let back = if state.revealed {
        Paragraph::new(state.back).style(Style::default().fg(Color::Green))
    } else {
        Paragraph::new("press space to show the answer").style(dim())
    };
    frame.render_widget(
        back.alignment(Alignment::Center).wrap(Wrap { trim: true }),
        chunks[7],
    );

    let mut prompt = vec![Span::styled("How well did you know this card?  ", dim())];
    for (i, rating) in Rating::ALL.iter().enumerate() {
        let color = match rating {
            Rating::Hard => Color::Red,
            Rating::Good => Color::Yellow,
            Rating::Easy => Color::Green,
        };
        prompt.push(Span::styled(
            format!("[{}] {}  ", i + 1, rating.label()),
            Style::default().fg(color),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(prompt)).alignment(Alignment::Center),
        chunks[8],
    );

    if state.show_shortcuts {
        frame.render_widget(
            Paragraph::new("Press 1 for Hard, 2 for Good, 3 for Easy • space flip • esc leave")
                .style(dim())
                .alignment(Alignment::Center),
            chunks[9],
        );
    }
}

/// Render session summary
pub fn render_complete(frame: &mut Frame, reviewed: usize, streak: u32) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(6),
        Constraint::Fill(1),
    ])
    .split(area);

    let lines = vec![
        Line::from(Span::styled(
            "Review Complete!",
            Style::default().fg(Color::Green),
        )),
        Line::from(""),
        Line::from(format!("Cards reviewed: {}", reviewed)),
        Line::from(format!("Streak: {}", streak)),
        Line::from("Great job! Come back tomorrow for more cards."),
        Line::from(Span::styled("Press any key to continue", dim())),
    ];

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), chunks[1]);
}

/// Render review statistics
pub fn render_stats(frame: &mut Frame, stats: &Stats) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .split(area);

    let header = vec![
        Line::from(Span::styled("Review Stats", Style::default().fg(Color::White))),
        Line::from(Span::styled(
            format!(
                "{} decks • {} cards • {} due",
                stats.deck_count, stats.card_count, stats.due_count
            ),
            dim(),
        )),
    ];
    frame.render_widget(Paragraph::new(header).alignment(Alignment::Center), chunks[0]);

    if stats.reviews_by_day.is_empty() {
        frame.render_widget(
            Paragraph::new("No stats yet. Complete some reviews to see your progress here!")
                .style(dim())
                .alignment(Alignment::Center),
            chunks[1],
        );
    } else {
        // Most recent days that fit, each bar labelled with its month-day
        let fits = (chunks[1].width / 6).max(1) as usize;
        let start = stats.reviews_by_day.len().saturating_sub(fits);
        let bars: Vec<Bar> = stats.reviews_by_day[start..]
            .iter()
            .map(|(day, count)| {
                Bar::default()
                    .value(*count as u64)
                    .label(Line::from(day.format("%m-%d").to_string()))
            })
            .collect();

        let chart = BarChart::default()
            .block(Block::bordered().title("Reviews per day"))
            .data(BarGroup::default().bars(&bars))
            .bar_width(5)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Blue))
            .max(stats.peak() as u64);
        frame.render_widget(chart, chunks[1]);
    }

    frame.render_widget(
        Paragraph::new("Press any key to return")
            .style(dim())
            .alignment(Alignment::Center),
        chunks[2],
    );
}

/// Render a text form popup
pub fn render_form(frame: &mut Frame, form: &Form) {
    let height = form.fields.len() as u16 * 2 + 3;
    let area = popup(frame.area(), 60, height);
    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, (label, value)) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };
        let cursor = if focused { "█" } else { "" };
        lines.push(Line::from(Span::styled(format!("{}:", label), dim())));
        lines.push(Line::from(Span::styled(format!("{}{}", value, cursor), style)));
    }
    lines.push(Line::from(Span::styled("tab switch • enter save • esc cancel", dim())));

    frame.render_widget(
        Paragraph::new(lines).block(Block::bordered().title(form.title)),
        area,
    );
}

/// Render a yes/no popup
pub fn render_confirm(frame: &mut Frame, question: &str) {
    let area = popup(frame.area(), 50, 4);
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(question),
        Line::from(Span::styled("y confirm • any other key cancels", dim())),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title("Are you sure?")),
        area,
    );
}

/// Render a one-line message at the bottom of the screen
pub fn render_status(frame: &mut Frame, message: &str) {
    let area = frame.area();
    if area.height == 0 {
        return;
    }
    let line = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
    frame.render_widget(Clear, line);
    frame.render_widget(
        Paragraph::new(message)
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center),
        line,
    );
}

/// A rectangle of at most `width` x `height`, centered in `area`
fn popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn centered_width(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect::new(area.x + (area.width - width) / 2, area.y, width, area.height)
}
