//! Diagnostics produced by characterization and call checking.
//!
//! The checkers never stop at the first problem: every message is appended
//! to a [`Messages`] buffer and the caller decides how to surface it.

use std::fmt;

use crate::errors::{CompileError, CompileErrorKind, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
    pub span: Option<Span>,
    pub attachments: Vec<Message>,
}

impl Message {
    pub fn error(text: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
            span,
            attachments: Vec::new(),
        }
    }

    pub fn warning(text: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(text, span)
        }
    }

    pub fn attach(&mut self, message: Message) -> &mut Self {
        self.attachments.push(message);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn into_compile_error(self, default_span: Span) -> CompileError {
        let kind = match self.severity {
            Severity::Error => CompileErrorKind::Semantic,
            Severity::Warning => CompileErrorKind::Warning,
        };
        let notes = self
            .attachments
            .iter()
            .map(|note| note.text.clone())
            .collect();
        CompileError::new(kind, self.text, self.span.unwrap_or(default_span)).with_notes(notes)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.text)?,
            Severity::Warning => write!(f, "warning: {}", self.text)?,
        }
        for note in &self.attachments {
            write!(f, "\n  note: {}", note.text)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Messages {
    messages: Vec<Message>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(&mut self, message: Message) -> &mut Message {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn any_fatal(&self) -> bool {
        self.messages.iter().any(Message::is_fatal)
    }

    /// Moves every message of `other` to the end of this buffer.
    pub fn annex(&mut self, other: Messages) {
        self.messages.extend(other.messages);
    }

    /// Attaches every message of this buffer to `message` as a note.
    pub fn attach_to(self, message: &mut Message) {
        message.attachments.extend(self.messages);
    }

    pub fn into_compile_errors(self, default_span: Span) -> Vec<CompileError> {
        self.messages
            .into_iter()
            .map(|message| message.into_compile_error(default_span.clone()))
            .collect()
    }
}

impl IntoIterator for Messages {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a Messages {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// A message sink that knows the source location of the construct under
/// analysis; messages said without an explicit span land there.
pub struct ContextualMessages<'m> {
    at: Option<Span>,
    buffer: &'m mut Messages,
}

impl<'m> ContextualMessages<'m> {
    pub fn new(at: Option<Span>, buffer: &'m mut Messages) -> Self {
        Self { at, buffer }
    }

    pub fn at(&self) -> Option<Span> {
        self.at.clone()
    }

    pub fn set_at(&mut self, at: Option<Span>) {
        self.at = at;
    }

    pub fn say(&mut self, text: impl Into<String>) -> &mut Message {
        let at = self.at.clone();
        self.buffer.say(Message::error(text, at))
    }

    pub fn say_at(&mut self, span: Option<Span>, text: impl Into<String>) -> &mut Message {
        let span = span.or_else(|| self.at.clone());
        self.buffer.say(Message::error(text, span))
    }

    pub fn warn(&mut self, text: impl Into<String>) -> &mut Message {
        let at = self.at.clone();
        self.buffer.say(Message::warning(text, at))
    }

    pub fn buffer(&mut self) -> &mut Messages {
        &mut *self.buffer
    }
}
