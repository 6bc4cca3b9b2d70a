use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::models::{Book, LendingSnapshot, LendingState};

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Footer key hints: `[key] label   [key] label`.
pub(crate) fn key_hints(pairs: &[(&str, &str)]) -> Line<'static> {
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let mut spans = Vec::with_capacity(pairs.len() * 2);
    for (idx, (key, label)) in pairs.iter().enumerate() {
        spans.push(Span::styled(format!("[{key}]"), key_style));
        let gap = if idx + 1 == pairs.len() { "" } else { "   " };
        spans.push(Span::raw(format!(" {label}{gap}")));
    }
    Line::from(spans)
}

/// Fixed-width row for the book list.
pub(crate) fn book_row(book: &Book, width: usize) -> String {
    let status = book.status().as_str();
    let isbn = pad(&book.isbn, 15);
    let status_col = pad(status, 12);
    let remaining = width.saturating_sub(15 + 12 + 2);
    let title_width = remaining * 3 / 5;
    let author_width = remaining.saturating_sub(title_width);
    format!(
        "{isbn} {} {} {status_col}",
        pad(&book.title, title_width),
        pad(&book.author, author_width.saturating_sub(1)),
    )
}

pub(crate) fn lending_row(snapshot: &LendingSnapshot) -> String {
    let state = match snapshot.state() {
        LendingState::Available => "available",
        LendingState::FullyCheckedOut => "all out",
        LendingState::NoCopiesConfigured => "untracked",
    };
    format!(
        "{} {}  {}/{} free  {} waiting  ({state})",
        pad(&snapshot.isbn, 15),
        snapshot.title,
        snapshot.available_copies,
        snapshot.total_copies,
        snapshot.waitlist.len(),
    )
}

/// Truncate or right-pad to exactly `width` characters.
pub(crate) fn pad(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        if width == 0 {
            return String::new();
        }
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    } else {
        format!("{text}{}", " ".repeat(width - count))
    }
}
