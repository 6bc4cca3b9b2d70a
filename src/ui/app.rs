use std::mem;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{debug, error};

use crate::catalog::Catalog;
use crate::db::SqliteStore;
use crate::models::{Book, BookSummary, CheckoutOutcome, ReturnOutcome, Traversal};

use super::forms::{
    ActionField, ActionForm, ActionKind, BookField, BookForm, ConfirmBookDelete,
};
use super::helpers::{book_row, centered_rect, key_hints, lending_row, pad, surface_error};
use super::screens::{
    scroll_by, ActivityScreen, LendingScreen, ResultsScreen, Selection, StructureScreen,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Entries shown in the activity panel beside the book list.
const RECENT_ACTIVITY: usize = 5;
const PAGE: isize = 10;

/// High-level navigation states.
enum Screen {
    Books,
    Results(ResultsScreen),
    Lending(LendingScreen),
    Structure(StructureScreen),
    Activity(ActivityScreen),
}

/// Modal states layered over the current screen.
enum Mode {
    Normal,
    AddingBook(BookForm),
    EditingBook(BookForm),
    ConfirmBookDelete(ConfirmBookDelete),
    Action(ActionForm),
    Searching(SearchState),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum SearchTarget {
    Title,
    Isbn,
    Author,
}

impl SearchTarget {
    fn label(&self) -> &'static str {
        match self {
            SearchTarget::Title => "Title",
            SearchTarget::Isbn => "ISBN",
            SearchTarget::Author => "Author",
        }
    }
}

/// State for an active inline search.
struct SearchState {
    target: SearchTarget,
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    catalog: Catalog<SqliteStore>,
    books: Selection<Book>,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    /// Where Ctrl+E writes the activity log.
    export_path: PathBuf,
}

impl App {
    pub fn new(catalog: Catalog<SqliteStore>, export_path: PathBuf) -> Self {
        let books = Selection::new(catalog.books());
        let loaded = books.len();
        let mut app = Self {
            catalog,
            books,
            screen: Screen::Books,
            mode: Mode::Normal,
            status: None,
            export_path,
        };
        app.set_status(format!("Loaded {loaded} books."), StatusKind::Info);
        app
    }

    pub fn catalog(&self) -> &Catalog<SqliteStore> {
        &self.catalog
    }

    /// Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingBook(form) => self.handle_book_form(code, form, false)?,
            Mode::EditingBook(form) => self.handle_book_form(code, form, true)?,
            Mode::ConfirmBookDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Action(form) => self.handle_action(code, form)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => {
                *exit = true;
                return Ok(Mode::Normal);
            }
            KeyCode::Esc => {
                if matches!(self.screen, Screen::Books) {
                    *exit = true;
                } else {
                    self.clear_status();
                    self.screen = Screen::Books;
                }
                return Ok(Mode::Normal);
            }
            _ => {}
        }

        match &mut self.screen {
            Screen::Books => {
                if move_list(&mut self.books, code) {
                    return Ok(Mode::Normal);
                }
            }
            Screen::Results(results) => {
                if move_list(&mut results.results, code) {
                    return Ok(Mode::Normal);
                }
                if code == KeyCode::Enter {
                    if let Some(isbn) = results.results.current().map(|hit| hit.isbn.clone()) {
                        self.screen = Screen::Books;
                        self.books.focus_where(|book| book.isbn == isbn);
                    }
                    return Ok(Mode::Normal);
                }
            }
            Screen::Lending(lending) => {
                if move_list(&mut lending.items, code) {
                    return Ok(Mode::Normal);
                }
            }
            Screen::Structure(structure) => {
                let total = structure.entries.len() + 12;
                match code {
                    KeyCode::Tab => {
                        let next = structure.order.next();
                        self.open_structure(next);
                        return Ok(Mode::Normal);
                    }
                    KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown => {
                        structure.scroll = scroll_by(structure.scroll, scroll_offset(code), total);
                        return Ok(Mode::Normal);
                    }
                    _ => {}
                }
            }
            Screen::Activity(activity) => match code {
                KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown => {
                    activity.scroll =
                        scroll_by(activity.scroll, scroll_offset(code), activity.entries.len());
                    return Ok(Mode::Normal);
                }
                KeyCode::Char('x') => {
                    self.catalog.clear_activity();
                    self.refresh_views(None);
                    self.set_status("Activity log cleared.", StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                _ => {}
            },
        }

        self.handle_shared_key(code)
    }

    /// Keys that work the same on every screen. Record actions target the
    /// book under the cursor of the current screen.
    fn handle_shared_key(&mut self, code: KeyCode) -> Result<Mode> {
        let focused = self.focused_isbn();
        match code {
            KeyCode::Char('b') => {
                self.clear_status();
                self.screen = Screen::Books;
            }
            KeyCode::Char('l') => {
                self.clear_status();
                self.open_lending();
            }
            KeyCode::Char('t') => {
                self.clear_status();
                self.open_structure(Traversal::Inorder);
            }
            KeyCode::Char('h') => {
                self.clear_status();
                self.open_activity();
            }
            KeyCode::Char('f') => return Ok(self.start_search(SearchTarget::Title)),
            KeyCode::Char('i') => return Ok(self.start_search(SearchTarget::Isbn)),
            KeyCode::Char('a') => return Ok(self.start_search(SearchTarget::Author)),
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingBook(BookForm::default()));
            }
            KeyCode::Char('e') => match self.focused_book() {
                Some(book) => {
                    self.clear_status();
                    return Ok(Mode::EditingBook(BookForm::from_book(&book)));
                }
                None => self.set_status("Please select a book to update!", StatusKind::Error),
            },
            KeyCode::Char('-') => match self.focused_book() {
                Some(book) => {
                    self.clear_status();
                    let lending = self.catalog.lending_status(&book.isbn);
                    return Ok(Mode::ConfirmBookDelete(ConfirmBookDelete {
                        holders: lending.as_ref().map_or(0, |status| status.holders.len()),
                        waiting: lending.as_ref().map_or(0, |status| status.waitlist.len()),
                        isbn: book.isbn,
                        title: book.title,
                    }));
                }
                None => self.set_status("Please select a book to delete!", StatusKind::Error),
            },
            KeyCode::Char('o') => return Ok(self.start_action(ActionKind::Checkout, focused)),
            KeyCode::Char('r') => return Ok(self.start_action(ActionKind::Return, focused)),
            KeyCode::Char('w') => {
                return Ok(self.start_action(ActionKind::CancelReservation, focused))
            }
            KeyCode::Char('c') => return Ok(self.start_action(ActionKind::Copies, focused)),
            KeyCode::Char('k') => return Ok(self.start_action(ActionKind::Link, focused)),
            KeyCode::Char('u') => return Ok(self.start_action(ActionKind::Unlink, focused)),
            KeyCode::Char('m') => self.show_recommendations(focused.as_deref(), true),
            KeyCode::Char('n') => self.show_recommendations(focused.as_deref(), false),
            KeyCode::Char('z') => match self.catalog.undo_last_activity() {
                Some(entry) => {
                    self.refresh_views(None);
                    self.set_status(
                        format!("Removed log entry: {}", entry.details),
                        StatusKind::Info,
                    );
                }
                None => self.set_status("Activity log is empty.", StatusKind::Error),
            },
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_book_form(&mut self, code: KeyCode, mut form: BookForm, editing: bool) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                let message = if editing {
                    "Edit cancelled."
                } else {
                    "Add book cancelled."
                };
                self.set_status(message, StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                let saved = if editing {
                    self.save_existing_book(&form)
                } else {
                    self.save_new_book(&form)
                };
                match saved {
                    Ok(_) => keep_open = false,
                    Err(err) => {
                        let message = surface_error(&err);
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        Ok(match (keep_open, editing) {
            (false, _) => Mode::Normal,
            (true, true) => Mode::EditingBook(form),
            (true, false) => Mode::AddingBook(form),
        })
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmBookDelete) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmBookDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmBookDelete(confirm)),
        }
    }

    fn handle_action(&mut self, code: KeyCode, mut form: ActionForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", form.kind.title()), StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.perform_action(&form) {
                Ok(_) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Action(form))
    }

    /// Results refresh on every keystroke; Enter keeps them, Esc drops them.
    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.screen = Screen::Books;
                self.clear_status();
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                let count = match &self.screen {
                    Screen::Results(results) => results.results.len(),
                    _ => 0,
                };
                if count == 0 {
                    self.set_status("No books found matching your search.", StatusKind::Error);
                } else {
                    self.set_status(format!("Found {count} matching books."), StatusKind::Info);
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Up | KeyCode::Down => {
                if let Screen::Results(results) = &mut self.screen {
                    move_list(&mut results.results, code);
                }
                return Ok(Mode::Searching(state));
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        self.run_search(&state);
        Ok(Mode::Searching(state))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Books => self.draw_books(frame, content_area),
            Screen::Results(results) => self.draw_results(frame, content_area, results),
            Screen::Lending(lending) => self.draw_lending(frame, content_area, lending),
            Screen::Structure(structure) => self.draw_structure(frame, content_area, structure),
            Screen::Activity(activity) => self.draw_activity(frame, content_area, activity),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingBook(form) => self.draw_book_form(frame, area, "Add Book", form),
            Mode::EditingBook(form) => self.draw_book_form(frame, area, "Update Book", form),
            Mode::ConfirmBookDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Action(form) => self.draw_action_form(frame, area, form),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Normal => {}
        }
    }

    /// Write the activity log next to the database.
    pub(crate) fn handle_ctrl_e(&mut self) {
        match self.catalog.export_activity(&self.export_path) {
            Ok(count) => self.set_status(
                format!(
                    "Saved {count} log entries to {}.",
                    self.export_path.display()
                ),
                StatusKind::Info,
            ),
            Err(err) => {
                error!("activity export failed: {err}");
                self.set_status(format!("Failed to save log: {err}"), StatusKind::Error);
            }
        }
    }

    fn draw_books(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let width = columns[0].width.saturating_sub(4) as usize;
        let rows = self
            .books
            .items
            .iter()
            .map(|book| book_row(book, width))
            .collect();
        render_list(
            frame,
            columns[0],
            format!("Books ({})", self.books.len()),
            rows,
            self.books.selected,
            "No books yet. Press '+' to add one.",
        );

        let recent: Vec<Line> = self
            .catalog
            .activity_tail(RECENT_ACTIVITY)
            .iter()
            .map(|entry| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<9}", entry.action.as_str()),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(entry.details.clone()),
                ])
            })
            .collect();
        let panel = Paragraph::new(recent)
            .block(Block::default().title("Recent Activity").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, columns[1]);
    }

    fn draw_results(&self, frame: &mut Frame, area: Rect, screen: &ResultsScreen) {
        let rows = screen
            .results
            .items
            .iter()
            .map(|hit| format!("{} {}", pad(&hit.isbn, 15), hit.display_title()))
            .collect();
        render_list(
            frame,
            area,
            format!("{} ({})", screen.heading, screen.results.len()),
            rows,
            screen.results.selected,
            "No matching books.",
        );
    }

    fn draw_lending(&self, frame: &mut Frame, area: Rect, screen: &LendingScreen) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let rows = screen.items.items.iter().map(lending_row).collect();
        render_list(
            frame,
            columns[0],
            "Lending".to_string(),
            rows,
            screen.items.selected,
            "No books are tracked for lending.",
        );

        let mut lines = Vec::new();
        if let Some(snapshot) = screen.items.current() {
            lines.push(Line::from(Span::styled(
                snapshot.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(format!(
                "{} of {} copies on the shelf",
                snapshot.available_copies, snapshot.total_copies
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("Checked out to:"));
            if snapshot.holders.is_empty() {
                lines.push(Line::from("  nobody"));
            }
            for holder in &snapshot.holders {
                lines.push(Line::from(format!("  {holder}")));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Waitlist:"));
            if snapshot.waitlist.is_empty() {
                lines.push(Line::from("  empty"));
            }
            for (idx, holder) in snapshot.waitlist.iter().enumerate() {
                lines.push(Line::from(format!("  {}. {holder}", idx + 1)));
            }
        }
        let detail = Paragraph::new(lines)
            .block(Block::default().title("Details").borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(detail, columns[1]);
    }

    fn draw_structure(&self, frame: &mut Frame, area: Rect, screen: &StructureScreen) {
        let stats = &screen.stats;
        let mut lines = vec![
            Line::from(format!(
                "Books: {}   Available: {}   Checked out: {}",
                stats.total_books, stats.available_books, stats.checked_out_books
            )),
            Line::from(format!(
                "ISBN tree: {} nodes, height {}",
                stats.tree_nodes, stats.tree_height
            )),
            Line::from(format!("Title index: {} entries", stats.indexed_titles)),
            Line::from(format!(
                "Similarity graph: {} books, {} links",
                stats.graph_nodes, stats.graph_edges
            )),
            Line::from(format!(
                "Activity log: {}/{}",
                stats.activity_entries, stats.activity_capacity
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("{} traversal", screen.order.label()),
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ];
        for (idx, summary) in screen.entries.iter().enumerate() {
            lines.push(Line::from(format!(
                "{:>4}. {} {}",
                idx + 1,
                pad(&summary.isbn, 15),
                summary.display_title()
            )));
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title("Structure").borders(Borders::ALL))
            .scroll((screen.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_activity(&self, frame: &mut Frame, area: Rect, screen: &ActivityScreen) {
        let lines: Vec<Line> = if screen.entries.is_empty() {
            vec![Line::from(Span::styled(
                "No activity recorded.",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            screen
                .entries
                .iter()
                .map(|entry| Line::from(entry.to_string()))
                .collect()
        };
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!("Activity ({} newest first)", screen.entries.len()))
                    .borders(Borders::ALL),
            )
            .wrap(Wrap { trim: false })
            .scroll((screen.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match (&self.screen, &self.mode) {
            (_, Mode::Searching(_)) => key_hints(&[
                ("↑↓", "Select"),
                ("Enter", "Keep Results"),
                ("Esc", "Cancel"),
            ]),
            (_, Mode::ConfirmBookDelete(_)) => key_hints(&[("y", "Delete"), ("n", "Cancel")]),
            (_, Mode::AddingBook(_) | Mode::EditingBook(_) | Mode::Action(_)) => key_hints(&[
                ("Tab", "Next Field"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
            ]),
            (Screen::Structure(_), _) => key_hints(&[
                ("Tab", "Next Traversal"),
                ("↑↓", "Scroll"),
                ("b", "Books"),
                ("Esc", "Back"),
                ("q", "Quit"),
            ]),
            (Screen::Activity(_), _) => key_hints(&[
                ("↑↓", "Scroll"),
                ("z", "Drop Latest"),
                ("x", "Clear"),
                ("Ctrl+E", "Save Log"),
                ("Esc", "Back"),
                ("q", "Quit"),
            ]),
            (Screen::Lending(_), _) => key_hints(&[
                ("↑↓", "Select"),
                ("o", "Check Out"),
                ("r", "Return"),
                ("w", "Leave Waitlist"),
                ("c", "Copies"),
                ("Esc", "Back"),
                ("q", "Quit"),
            ]),
            (Screen::Results(_), _) => key_hints(&[
                ("↑↓", "Select"),
                ("Enter", "Show in List"),
                ("m", "Recommend"),
                ("o", "Check Out"),
                ("e", "Edit"),
                ("Esc", "Back"),
                ("q", "Quit"),
            ]),
            (Screen::Books, _) => key_hints(&[
                ("↑↓", "Select"),
                ("+", "Add"),
                ("e", "Edit"),
                ("-", "Delete"),
                ("o/r/w", "Lend"),
                ("c", "Copies"),
                ("k/u", "Link"),
                ("m/n", "Similar"),
                ("f/i/a", "Search"),
                ("l", "Lending"),
                ("t", "Tree"),
                ("h", "Activity"),
                ("q", "Quit"),
            ]),
        }
    }

    fn draw_book_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &BookForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let fields = [
            ("ISBN", BookField::Isbn),
            ("Title", BookField::Title),
            ("Author", BookField::Author),
        ];
        let mut lines: Vec<Line> = fields
            .iter()
            .map(|(name, field)| form.build_line(name, *field))
            .collect();
        lines.push(Line::from(""));
        lines.push(form_hint(form.error.as_deref()));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        if let Some((row, (name, field))) = fields
            .iter()
            .enumerate()
            .find(|(_, (_, field))| *field == form.active)
        {
            let prefix = format!("{name}: ").len() as u16;
            frame.set_cursor_position((
                inner.x + prefix + form.value_len(*field) as u16,
                inner.y + row as u16,
            ));
        }
    }

    fn draw_action_form(&self, frame: &mut Frame, area: Rect, form: &ActionForm) {
        let popup_area = centered_rect(60, 35, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(form.kind.title()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            form.build_line(ActionField::First),
            form.build_line(ActionField::Second),
            Line::from(""),
            form_hint(form.error.as_deref()),
        ];
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (first_label, second_label) = form.kind.labels();
        let (label, row) = match form.active {
            ActionField::First => (first_label, 0),
            ActionField::Second => (second_label, 1),
        };
        let prefix = format!("{label}: ").len() as u16;
        frame.set_cursor_position((
            inner.x + prefix + form.value_len(form.active) as u16,
            inner.y + row,
        ));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmBookDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Confirm Delete").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![Line::from(format!(
            "Delete '{}' (ISBN: {})?",
            confirm.title, confirm.isbn
        ))];
        if confirm.holders > 0 || confirm.waiting > 0 {
            lines.push(Line::from(Span::styled(
                format!(
                    "{} copies are checked out and {} readers are waiting.",
                    confirm.holders, confirm.waiting
                ),
                Style::default().fg(Color::Yellow),
            )));
        }
        lines.push(Line::from("Its similarity links will be removed too."));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = format!("{}: ", state.target.label());
        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("{prefix}{}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + prefix.len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn save_new_book(&mut self, form: &BookForm) -> Result<()> {
        let (isbn, title, author) = form.parse_inputs()?;
        self.catalog.add_book(&isbn, &title, &author)?;
        self.refresh_views(Some(&isbn));
        self.set_status(format!("Added '{title}'."), StatusKind::Info);
        Ok(())
    }

    fn save_existing_book(&mut self, form: &BookForm) -> Result<()> {
        let (isbn, title, author) = form.parse_inputs()?;
        self.catalog.update_book(&isbn, &title, &author)?;
        self.refresh_views(Some(&isbn));
        self.set_status(format!("Updated '{title}'."), StatusKind::Info);
        Ok(())
    }

    fn perform_delete(&mut self, confirm: &ConfirmBookDelete) -> Result<()> {
        self.catalog.delete_book(&confirm.isbn)?;
        self.refresh_views(None);
        self.set_status(format!("Deleted '{}'.", confirm.title), StatusKind::Info);
        Ok(())
    }

    fn perform_action(&mut self, form: &ActionForm) -> Result<()> {
        debug!(kind = ?form.kind, "action submitted");
        let message = match form.kind {
            ActionKind::Checkout => {
                let (isbn, user) = form.parse_pair()?;
                match self.catalog.check_out(&isbn, &user)? {
                    CheckoutOutcome::CheckedOut => format!("Book {isbn} checked out to {user}."),
                    CheckoutOutcome::AlreadyHolding => format!("{user} already has book {isbn}."),
                    CheckoutOutcome::Waitlisted { position } => format!(
                        "Book {isbn} is not available. {user} is number {position} on the waitlist."
                    ),
                    CheckoutOutcome::AlreadyWaitlisted { position } => {
                        format!("{user} is already number {position} on the waitlist.")
                    }
                    CheckoutOutcome::UnknownItem => format!("Book {isbn} is not tracked."),
                }
            }
            ActionKind::Return => {
                let (isbn, user) = form.parse_pair()?;
                match self.catalog.return_book(&isbn, &user)? {
                    ReturnOutcome::Promoted(next) => {
                        format!("Book {isbn} returned and checked out to {next}.")
                    }
                    ReturnOutcome::Restocked => format!("Book {isbn} returned."),
                }
            }
            ActionKind::CancelReservation => {
                let (isbn, user) = form.parse_pair()?;
                self.catalog.cancel_reservation(&isbn, &user)?;
                format!("{user} left the waitlist for book {isbn}.")
            }
            ActionKind::Copies => {
                let (isbn, copies) = form.parse_copies()?;
                let promoted = self.catalog.set_copies(&isbn, copies)?;
                if promoted.is_empty() {
                    format!("Book {isbn} now has {copies} copies.")
                } else {
                    format!(
                        "Book {isbn} now has {copies} copies; checked out to {}.",
                        promoted.join(", ")
                    )
                }
            }
            ActionKind::Link => {
                let (a, b) = form.parse_pair()?;
                if self.catalog.link_books(&a, &b)? {
                    format!("Linked {a} and {b}.")
                } else {
                    format!("{a} and {b} are already linked.")
                }
            }
            ActionKind::Unlink => {
                let (a, b) = form.parse_pair()?;
                if self.catalog.unlink_books(&a, &b)? {
                    format!("Unlinked {a} and {b}.")
                } else {
                    format!("{a} and {b} were not linked.")
                }
            }
        };
        self.refresh_views(None);
        self.set_status(message, StatusKind::Info);
        Ok(())
    }

    fn start_search(&mut self, target: SearchTarget) -> Mode {
        self.clear_status();
        let state = SearchState {
            target,
            query: String::new(),
        };
        self.run_search(&state);
        Mode::Searching(state)
    }

    fn run_search(&mut self, state: &SearchState) {
        let query = state.query.trim();
        let results: Vec<BookSummary> = match state.target {
            SearchTarget::Title => self.catalog.search_title(query),
            SearchTarget::Isbn => self.catalog.find_by_isbn(query).into_iter().collect(),
            SearchTarget::Author => self.catalog.search_author(query),
        };
        let heading = format!("{} search: {query}", state.target.label());
        self.screen = Screen::Results(ResultsScreen::new(heading, results));
    }

    fn start_action(&mut self, kind: ActionKind, prefill: Option<String>) -> Mode {
        self.clear_status();
        Mode::Action(ActionForm::new(kind, prefill.as_deref()))
    }

    fn show_recommendations(&mut self, isbn: Option<&str>, transitive: bool) {
        let Some(isbn) = isbn else {
            self.set_status("Please select a book first!", StatusKind::Error);
            return;
        };
        let (results, heading) = if transitive {
            (self.catalog.recommend(isbn), format!("Recommended for {isbn}"))
        } else {
            (self.catalog.similar_to(isbn), format!("Similar to {isbn}"))
        };
        if results.is_empty() {
            self.set_status(format!("No similar books linked to {isbn}."), StatusKind::Error);
        } else {
            self.clear_status();
        }
        self.screen = Screen::Results(ResultsScreen::new(heading, results));
    }

    fn open_lending(&mut self) {
        self.screen = Screen::Lending(LendingScreen {
            items: Selection::new(self.catalog.lending_overview()),
        });
    }

    fn open_structure(&mut self, order: Traversal) {
        self.screen = Screen::Structure(StructureScreen {
            order,
            entries: self.catalog.traverse(order),
            stats: self.catalog.stats(),
            scroll: 0,
        });
    }

    fn open_activity(&mut self) {
        self.screen = Screen::Activity(ActivityScreen {
            entries: self.catalog.activity(),
            scroll: 0,
        });
    }

    /// Pull fresh data for the book list and whatever screen is showing.
    fn refresh_views(&mut self, focus: Option<&str>) {
        self.books.replace(self.catalog.books());
        if let Some(isbn) = focus {
            self.books.focus_where(|book| book.isbn == isbn);
        }

        match &mut self.screen {
            Screen::Books => {}
            Screen::Results(results) => {
                let refreshed = results
                    .results
                    .items
                    .iter()
                    .filter_map(|hit| self.catalog.find_by_isbn(&hit.isbn))
                    .collect();
                results.results.replace(refreshed);
            }
            Screen::Lending(lending) => lending.items.replace(self.catalog.lending_overview()),
            Screen::Structure(structure) => {
                structure.entries = self.catalog.traverse(structure.order);
                structure.stats = self.catalog.stats();
            }
            Screen::Activity(activity) => {
                activity.entries = self.catalog.activity();
                activity.scroll = 0;
            }
        }
    }

    fn focused_isbn(&self) -> Option<String> {
        let isbn = match &self.screen {
            Screen::Results(results) => results.results.current().map(|hit| &hit.isbn),
            Screen::Lending(lending) => lending.items.current().map(|item| &item.isbn),
            _ => self.books.current().map(|book| &book.isbn),
        };
        isbn.cloned()
    }

    fn focused_book(&self) -> Option<Book> {
        let isbn = self.focused_isbn()?;
        self.catalog.book(&isbn).cloned()
    }
}

/// Shared list navigation. Returns `true` when the key was consumed.
fn move_list<T>(list: &mut Selection<T>, code: KeyCode) -> bool {
    match code {
        KeyCode::Up => list.move_selection(-1),
        KeyCode::Down => list.move_selection(1),
        KeyCode::PageUp => list.move_selection(-PAGE),
        KeyCode::PageDown => list.move_selection(PAGE),
        KeyCode::Home => list.select_first(),
        KeyCode::End => list.select_last(),
        _ => return false,
    }
    true
}

fn scroll_offset(code: KeyCode) -> i32 {
    match code {
        KeyCode::Up => -1,
        KeyCode::Down => 1,
        KeyCode::PageUp => -(PAGE as i32),
        KeyCode::PageDown => PAGE as i32,
        _ => 0,
    }
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    title: String,
    rows: Vec<String>,
    selected: usize,
    empty_message: &str,
) {
    let block = Block::default().title(title).borders(Borders::ALL);
    if rows.is_empty() {
        let message = Paragraph::new(empty_message.to_string())
            .block(block)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(message, area);
        return;
    }

    let items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn form_hint(error: Option<&str>) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            "Enter to save • Tab to switch field • Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogSettings;

    fn app() -> App {
        let store = SqliteStore::open_in_memory().unwrap();
        let catalog = Catalog::load(store, CatalogSettings::default()).unwrap();
        App::new(catalog, std::env::temp_dir().join("unused-activity.log"))
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    #[test]
    fn add_book_through_the_form() {
        let mut app = app();
        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(&mut app, "001");
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(&mut app, "Dune");
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(&mut app, "Frank Herbert");
        app.handle_key(KeyCode::Enter).unwrap();

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.books.len(), 1);
        assert_eq!(app.catalog().find_by_isbn("001").unwrap().title, "Dune");
    }

    #[test]
    fn failed_save_keeps_the_form_open() {
        let mut app = app();
        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(&mut app, "001");
        app.handle_key(KeyCode::Enter).unwrap();

        match &app.mode {
            Mode::AddingBook(form) => {
                assert_eq!(form.error.as_deref(), Some("All fields are required!"))
            }
            _ => panic!("form should stay open"),
        }
    }

    #[test]
    fn checkout_form_prefills_the_selected_book() {
        let mut app = app();
        app.catalog.add_book("001", "Dune", "Frank Herbert").unwrap();
        app.refresh_views(None);

        app.handle_key(KeyCode::Char('o')).unwrap();
        type_text(&mut app, "U1");
        app.handle_key(KeyCode::Enter).unwrap();

        assert!(matches!(app.mode, Mode::Normal));
        assert!(!app.catalog().book("001").unwrap().available);
        assert!(!app.books.current().unwrap().available);
    }

    #[test]
    fn title_search_updates_results_live() {
        let mut app = app();
        app.catalog.add_book("1", "Harry Potter", "J.K. Rowling").unwrap();
        app.catalog.add_book("2", "Hamlet", "Shakespeare").unwrap();

        app.handle_key(KeyCode::Char('f')).unwrap();
        type_text(&mut app, "har");
        match &app.screen {
            Screen::Results(results) => {
                assert_eq!(results.results.len(), 1);
                assert_eq!(results.results.current().unwrap().isbn, "1");
            }
            _ => panic!("results screen expected"),
        }

        app.handle_key(KeyCode::Esc).unwrap();
        assert!(matches!(app.screen, Screen::Books));
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn q_quits_from_normal_mode() {
        let mut app = app();
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }
}
