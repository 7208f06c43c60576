//! Line-oriented presenter for terminals

use super::{Presenter, WidgetView};
use crate::state_machine::{Message, Sender};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Printed {
    /// Transcript entries already written
    messages: Vec<Message>,
    /// Last option block written, to avoid repeating it
    options: Option<Vec<String>>,
}

/// Writes new transcript lines and a numbered option menu
pub struct TerminalPresenter<W> {
    out: Mutex<W>,
    printed: Mutex<Printed>,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            printed: Mutex::new(Printed::default()),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn render_messages(&self, view: &WidgetView<'_>) {
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut text = String::new();

        // Anything but an extension of what is on screen was replaced
        if !view.history.starts_with(&printed.messages) {
            text.push_str("---\n");
            printed.messages.clear();
        }
        for message in &view.history[printed.messages.len()..] {
            let label = match message.from {
                Sender::Bot => "bot",
                Sender::User => "you",
            };
            text.push_str(&format!("{label:>4}: {}\n", message.text));
        }
        printed.messages = view.history.to_vec();
        printed.options = None;
        drop(printed);

        if !text.is_empty() {
            self.write(&text);
        }
    }

    fn render_options(&self, view: &WidgetView<'_>) {
        let labels: Vec<String> = view.options.iter().map(|o| o.text.clone()).collect();
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        if printed.options.as_ref() == Some(&labels) {
            return;
        }

        let mut text = String::new();
        for (i, label) in labels.iter().enumerate() {
            text.push_str(&format!("  [{}] {label}\n", i + 1));
        }
        printed.options = Some(labels);
        drop(printed);

        if !text.is_empty() {
            self.write(&text);
        }
    }

    fn set_sending(&self, sending: bool) {
        if sending {
            self.write("  ...\n");
        }
    }

    fn set_open(&self, open: bool) {
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        // Reopening redraws the whole transcript
        printed.messages.clear();
        printed.options = None;
        drop(printed);
        if !open {
            self.write("(closed)\n");
        }
    }
}
