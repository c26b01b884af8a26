//! Per-prompt progress window.
//!
//! While a prompt is in flight, the user sees a single status message
//! summarizing recent tool activity. This type owns the bounded line
//! window (cap K, oldest dropped first); the announcer owns the message
//! identity and edits it in place. Reset on every prompt start.

use std::collections::VecDeque;

use crate::tail::ToolEvent;

/// Bounded window of tool-activity lines for the current prompt.
pub struct ProgressBoard {
    lines: VecDeque<String>,
    cap: usize,
    active: bool,
}

impl ProgressBoard {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            cap: cap.max(1),
            active: false,
        }
    }

    /// Open a fresh window for a new prompt.
    pub fn begin(&mut self) {
        self.lines.clear();
        self.active = true;
    }

    /// Close the window (response delivered, prompt cancelled, or agent
    /// exited).
    pub fn reset(&mut self) {
        self.lines.clear();
        self.active = false;
    }

    /// Append a tool event, dropping the oldest line beyond the cap.
    pub fn push(&mut self, event: &ToolEvent) {
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(event.brief.clone());
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The indicator text: a header plus one bullet per line, oldest
    /// first, newest last.
    pub fn render(&self) -> String {
        let mut out = String::from("Working...");
        for line in &self.lines {
            out.push('\n');
            out.push_str("• ");
            out.push_str(line);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(brief: &str) -> ToolEvent {
        ToolEvent {
            event_id: format!("id-{}", brief),
            tool_name: "Bash".to_string(),
            brief: brief.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn begin_activates_and_clears() {
        let mut board = ProgressBoard::new(3);
        board.begin();
        board.push(&event("one"));
        assert!(board.is_active());
        assert_eq!(board.len(), 1);

        board.begin();
        assert!(board.is_active());
        assert!(board.is_empty());
    }

    #[test]
    fn cap_drops_oldest_first() {
        let mut board = ProgressBoard::new(3);
        board.begin();
        for i in 1..=5 {
            board.push(&event(&format!("step {}", i)));
        }

        assert_eq!(board.len(), 3);
        let rendered = board.render();
        assert!(!rendered.contains("step 1"));
        assert!(!rendered.contains("step 2"));
        assert!(rendered.contains("step 3"));
        assert!(rendered.contains("step 4"));
        assert!(rendered.contains("step 5"));
    }

    #[test]
    fn render_orders_oldest_to_newest() {
        let mut board = ProgressBoard::new(5);
        board.begin();
        board.push(&event("first"));
        board.push(&event("second"));

        let rendered = board.render();
        let first_pos = rendered.find("first").unwrap();
        let second_pos = rendered.find("second").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn render_always_has_header() {
        let board = ProgressBoard::new(3);
        assert_eq!(board.render(), "Working...");
    }

    #[test]
    fn reset_deactivates() {
        let mut board = ProgressBoard::new(3);
        board.begin();
        board.push(&event("x"));
        board.reset();

        assert!(!board.is_active());
        assert!(board.is_empty());
    }

    #[test]
    fn line_count_never_exceeds_cap() {
        let mut board = ProgressBoard::new(2);
        board.begin();
        for i in 0..20 {
            board.push(&event(&format!("{}", i)));
            assert!(board.len() <= 2);
        }
    }

    #[test]
    fn zero_cap_is_clamped_to_one() {
        let mut board = ProgressBoard::new(0);
        board.begin();
        board.push(&event("only"));
        assert_eq!(board.len(), 1);
    }
}
