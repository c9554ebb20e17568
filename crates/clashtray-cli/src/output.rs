//! Notification rendering on stdout.

use clashtray_core::Notification;

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn notify(&self, note: &Notification) {
        println!("{}", self.render(note));
    }

    pub fn tooltip(&self, text: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "tooltip": text }));
        } else {
            println!("{}", text);
        }
    }

    fn render(&self, note: &Notification) -> String {
        if self.json {
            return serde_json::to_string(note).unwrap_or_else(|_| note.title.clone());
        }
        if note.body.is_empty() {
            format!("[{}] {}", note.severity, note.title)
        } else {
            format!("[{}] {}: {}", note.severity, note.title, note.body)
        }
    }
}
