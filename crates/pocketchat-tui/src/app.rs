use ratatui::layout::Rect;
use pocketchat_core::{ChatState, ModelMessage};

/// Rows the input box may grow to before it scrolls.
pub const MAX_INPUT_LINES: u16 = 5;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub chat: ChatState,
    pub model: String,
    pub host: String,
    pub worker_alive: bool,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat view state
    pub chat_scroll: u16,
    pub max_chat_scroll: u16,
    pub follow_output: bool,
    pub show_thinking: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub toggle_area: Option<Rect>,
}

impl App {
    pub fn new(chat: ChatState, model: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            chat,
            model: model.into(),
            host: host.into(),
            worker_alive: true,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            max_chat_scroll: 0,
            follow_output: true,
            show_thinking: false,

            animation_frame: 0,

            chat_area: None,
            toggle_area: None,
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Line and column of the cursor within the (possibly multi-line) input.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.input.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        (line, col)
    }

    /// Visible rows for the input box, growing with content up to a cap.
    pub fn input_rows(&self) -> u16 {
        let lines = self.input.split('\n').count() as u16;
        lines.clamp(1, MAX_INPUT_LINES)
    }

    /// Hand the input to the chat state. The input is only cleared when a
    /// turn actually starts.
    pub fn submit(&mut self) -> Option<Vec<ModelMessage>> {
        let history = self.chat.submit(&self.input)?;
        self.input.clear();
        self.cursor = 0;
        self.follow_output = true;
        Some(history)
    }

    pub fn toggle_drawer(&mut self) {
        self.chat.toggle_drawer();
        if self.chat.is_drawer_open() {
            self.follow_output = true;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, rows: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(rows);
        self.follow_output = false;
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(rows).min(self.max_chat_scroll);
        self.follow_output = self.chat_scroll >= self.max_chat_scroll;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll;
        self.follow_output = true;
    }

    /// Called by the renderer once the wrapped chat height is known.
    pub fn set_chat_extent(&mut self, total_lines: u16, visible_lines: u16) {
        self.max_chat_scroll = total_lines.saturating_sub(visible_lines);
        if self.follow_output || self.chat_scroll > self.max_chat_scroll {
            self.chat_scroll = self.max_chat_scroll;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketchat_core::GenerationEvent;

    fn app() -> App {
        App::new(ChatState::default(), "qwen3:0.6b", "http://localhost:11434")
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    #[test]
    fn test_editing_multibyte_input() {
        let mut app = app();
        type_text(&mut app, "héllo");
        app.cursor_left();
        app.cursor_left();
        app.delete_before_cursor();
        assert_eq!(app.input, "hélo");
        app.cursor_home();
        app.delete_at_cursor();
        assert_eq!(app.input, "élo");
        app.cursor_end();
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_submit_clears_input() {
        let mut app = app();
        type_text(&mut app, "Hello");
        let history = app.submit().unwrap();
        assert_eq!(history.last().unwrap().content, "Hello");
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_blank_submit_keeps_input() {
        let mut app = app();
        type_text(&mut app, "   ");
        assert!(app.submit().is_none());
        assert_eq!(app.input, "   ");
        assert!(app.chat.messages().is_empty());
    }

    #[test]
    fn test_submit_while_generating_keeps_input() {
        let mut app = app();
        type_text(&mut app, "one");
        app.submit().unwrap();
        type_text(&mut app, "two");
        assert!(app.submit().is_none());
        assert_eq!(app.input, "two");

        app.chat.apply(GenerationEvent::GenerationComplete);
        assert!(app.submit().is_some());
    }

    #[test]
    fn test_multiline_cursor_and_rows() {
        let mut app = app();
        type_text(&mut app, "ab\ncd");
        assert_eq!(app.cursor_line_col(), (1, 2));
        assert_eq!(app.input_rows(), 2);
        type_text(&mut app, "\n\n\n\n\n");
        assert_eq!(app.input_rows(), MAX_INPUT_LINES);
    }

    #[test]
    fn test_scrolling_stops_following_until_bottom() {
        let mut app = app();
        app.set_chat_extent(50, 10);
        assert_eq!(app.chat_scroll, 40);

        app.scroll_up(5);
        assert!(!app.follow_output);
        app.set_chat_extent(60, 10);
        assert_eq!(app.chat_scroll, 35);

        app.scroll_down(100);
        assert!(app.follow_output);
        assert_eq!(app.chat_scroll, 50);
    }
}
