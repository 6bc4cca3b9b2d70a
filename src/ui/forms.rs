use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::Book;

/// Internal representation of the add/edit book form.
#[derive(Default, Clone)]
pub(crate) struct BookForm {
    pub(crate) isbn: String,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) active: BookField,
    pub(crate) error: Option<String>,
    /// Editing never changes the key, so the ISBN field is skipped.
    pub(crate) isbn_locked: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum BookField {
    #[default]
    Isbn,
    Title,
    Author,
}

impl BookForm {
    /// Populate the form from an existing record when editing.
    pub(crate) fn from_book(book: &Book) -> Self {
        Self {
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            active: BookField::Title,
            error: None,
            isbn_locked: true,
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            BookField::Isbn => BookField::Title,
            BookField::Title => BookField::Author,
            BookField::Author if self.isbn_locked => BookField::Title,
            BookField::Author => BookField::Isbn,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            BookField::Isbn if self.isbn_locked => return false,
            BookField::Isbn => self.isbn.push(ch),
            BookField::Title => self.title.push(ch),
            BookField::Author => self.author.push(ch),
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            BookField::Isbn if self.isbn_locked => {}
            BookField::Isbn => {
                self.isbn.pop();
            }
            BookField::Title => {
                self.title.pop();
            }
            BookField::Author => {
                self.author.pop();
            }
        }
    }

    /// Trimmed `(isbn, title, author)`.
    pub(crate) fn parse_inputs(&self) -> Result<(String, String, String)> {
        let isbn = self.isbn.trim();
        let title = self.title.trim();
        let author = self.author.trim();
        if isbn.is_empty() || title.is_empty() || author.is_empty() {
            return Err(anyhow!("All fields are required!"));
        }
        Ok((isbn.to_string(), title.to_string(), author.to_string()))
    }

    pub(crate) fn build_line(&self, field_name: &str, field: BookField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;
        let locked = field == BookField::Isbn && self.isbn_locked;
        field_line(field_name, value, is_active, locked)
    }

    pub(crate) fn value_len(&self, field: BookField) -> usize {
        self.value(field).chars().count()
    }

    fn value(&self, field: BookField) -> &str {
        match field {
            BookField::Isbn => &self.isbn,
            BookField::Title => &self.title,
            BookField::Author => &self.author,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmBookDelete {
    pub(crate) isbn: String,
    pub(crate) title: String,
    pub(crate) holders: usize,
    pub(crate) waiting: usize,
}

/// What a two-field action form does once submitted.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum ActionKind {
    Checkout,
    Return,
    CancelReservation,
    Copies,
    Link,
    Unlink,
}

impl ActionKind {
    pub(crate) fn title(&self) -> &'static str {
        match self {
            ActionKind::Checkout => "Check Out Book",
            ActionKind::Return => "Return Book",
            ActionKind::CancelReservation => "Leave Waitlist",
            ActionKind::Copies => "Set Copies",
            ActionKind::Link => "Link Similar Books",
            ActionKind::Unlink => "Unlink Books",
        }
    }

    /// Labels for the first and second field.
    pub(crate) fn labels(&self) -> (&'static str, &'static str) {
        match self {
            ActionKind::Checkout | ActionKind::Return | ActionKind::CancelReservation => {
                ("Book ISBN", "User ID")
            }
            ActionKind::Copies => ("Book ISBN", "Copies"),
            ActionKind::Link | ActionKind::Unlink => ("First ISBN", "Second ISBN"),
        }
    }

    fn numeric_second(&self) -> bool {
        matches!(self, ActionKind::Copies)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum ActionField {
    #[default]
    First,
    Second,
}

/// Form shared by checkout/return, copies and linking dialogs.
#[derive(Clone)]
pub(crate) struct ActionForm {
    pub(crate) kind: ActionKind,
    pub(crate) first: String,
    pub(crate) second: String,
    pub(crate) active: ActionField,
    pub(crate) error: Option<String>,
}

impl ActionForm {
    /// Start a form with the first field filled in, focusing the second one
    /// when there is something to prefill.
    pub(crate) fn new(kind: ActionKind, prefill: Option<&str>) -> Self {
        let first = prefill.unwrap_or_default().to_string();
        let active = if first.is_empty() {
            ActionField::First
        } else {
            ActionField::Second
        };
        Self {
            kind,
            first,
            second: String::new(),
            active,
            error: None,
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            ActionField::First => ActionField::Second,
            ActionField::Second => ActionField::First,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        match self.active {
            ActionField::First => {
                if ch.is_control() {
                    return false;
                }
                self.first.push(ch);
            }
            ActionField::Second => {
                let allowed = if self.kind.numeric_second() {
                    ch.is_ascii_digit()
                } else {
                    !ch.is_control()
                };
                if !allowed {
                    return false;
                }
                self.second.push(ch);
            }
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            ActionField::First => {
                self.first.pop();
            }
            ActionField::Second => {
                self.second.pop();
            }
        }
    }

    pub(crate) fn parse_pair(&self) -> Result<(String, String)> {
        let first = self.first.trim();
        let second = self.second.trim();
        if first.is_empty() || second.is_empty() {
            let (a, b) = self.kind.labels();
            return Err(anyhow!("{a} and {b} are required!"));
        }
        Ok((first.to_string(), second.to_string()))
    }

    pub(crate) fn parse_copies(&self) -> Result<(String, u32)> {
        let (isbn, raw) = self.parse_pair()?;
        let copies = raw
            .parse::<u32>()
            .context("Copies must be a whole number.")?;
        Ok((isbn, copies))
    }

    pub(crate) fn build_line(&self, field: ActionField) -> Line<'static> {
        let (first_label, second_label) = self.kind.labels();
        let (label, value) = match field {
            ActionField::First => (first_label, &self.first),
            ActionField::Second => (second_label, &self.second),
        };
        field_line(label, value, self.active == field, false)
    }

    pub(crate) fn value_len(&self, field: ActionField) -> usize {
        match field {
            ActionField::First => self.first.chars().count(),
            ActionField::Second => self.second.chars().count(),
        }
    }
}

fn field_line(field_name: &str, value: &str, is_active: bool, locked: bool) -> Line<'static> {
    let display = if value.is_empty() {
        "<required>".to_string()
    } else {
        value.to_string()
    };

    let style = if locked {
        Style::default().fg(Color::DarkGray)
    } else if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{field_name}: ")),
        Span::styled(display, style),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_form_never_touches_the_isbn() {
        let book = Book::new("001", "Dune", "Frank Herbert");
        let mut form = BookForm::from_book(&book);
        assert!(form.active == BookField::Title);

        form.toggle_field();
        form.toggle_field();
        assert!(form.active == BookField::Title);

        form.active = BookField::Isbn;
        assert!(!form.push_char('9'));
        form.backspace();
        assert_eq!(form.isbn, "001");
    }

    #[test]
    fn blank_book_fields_are_rejected() {
        let mut form = BookForm::default();
        for ch in "123".chars() {
            form.push_char(ch);
        }
        assert!(form.parse_inputs().is_err());

        form.title = " Dune ".to_string();
        form.author = "Frank Herbert".to_string();
        let (isbn, title, _) = form.parse_inputs().unwrap();
        assert_eq!(isbn, "123");
        assert_eq!(title, "Dune");
    }

    #[test]
    fn copies_field_accepts_digits_only() {
        let mut form = ActionForm::new(ActionKind::Copies, Some("001"));
        assert!(form.active == ActionField::Second);
        assert!(!form.push_char('x'));
        assert!(form.push_char('4'));
        assert_eq!(form.parse_copies().unwrap(), ("001".to_string(), 4));
    }

    #[test]
    fn lending_form_needs_both_ids() {
        let form = ActionForm::new(ActionKind::Checkout, None);
        let err = form.parse_pair().unwrap_err();
        assert_eq!(err.to_string(), "Book ISBN and User ID are required!");
    }
}
