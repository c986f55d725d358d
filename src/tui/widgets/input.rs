use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::cmp;

use crate::Config;
use crate::tui::widgets::color::parse_color;

#[derive(Clone, Debug)]
enum EditOperation {
    InsertChar { col: usize, ch: char },
    DeleteChar { col: usize, ch: char },
    Replace { previous: String, cursor: usize },
}

/// Single-line text field used by every form, the search prompt and the chat box
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    chars: Vec<char>,
    pub cursor: usize,
    /// Horizontal scroll (column offset)
    pub scroll_col: usize,
    /// Render as bullets
    pub masked: bool,
    undo_stack: Vec<EditOperation>,
}

const MAX_HISTORY: usize = 100;

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn masked() -> Self {
        Self {
            masked: true,
            ..Self::default()
        }
    }

    pub fn from_string(content: &str) -> Self {
        // Newlines have no place in a single-line field
        let chars: Vec<char> = content.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let cursor = chars.len();
        Self {
            chars,
            cursor,
            ..Self::default()
        }
    }

    pub fn value(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    fn record(&mut self, op: EditOperation) {
        self.undo_stack.push(op);
        if self.undo_stack.len() > MAX_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' || ch == '\r' {
            return;
        }
        let col = cmp::min(self.cursor, self.chars.len());
        self.chars.insert(col, ch);
        self.cursor = col + 1;
        self.record(EditOperation::InsertChar { col, ch });
    }

    /// Insert pasted text at the cursor as one undoable edit
    pub fn insert_str(&mut self, text: &str) {
        let previous = self.value();
        let cursor = self.cursor;
        let col = cmp::min(self.cursor, self.chars.len());
        let pasted: Vec<char> = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        if pasted.is_empty() {
            return;
        }
        let count = pasted.len();
        self.chars.splice(col..col, pasted);
        self.cursor = col + count;
        self.record(EditOperation::Replace { previous, cursor });
    }

    /// Backspace
    pub fn delete_char(&mut self) {
        let col = cmp::min(self.cursor, self.chars.len());
        if col == 0 {
            return;
        }
        let ch = self.chars.remove(col - 1);
        self.cursor = col - 1;
        self.record(EditOperation::DeleteChar { col: col - 1, ch });
    }

    /// Delete
    pub fn delete_forward(&mut self) {
        let col = cmp::min(self.cursor, self.chars.len());
        if col >= self.chars.len() {
            return;
        }
        let ch = self.chars.remove(col);
        self.record(EditOperation::DeleteChar { col, ch });
        // Undo puts the cursor after the restored char; keep it where it was
        self.cursor = col;
    }

    /// Ctrl+U style clear
    pub fn clear(&mut self) {
        if self.chars.is_empty() {
            return;
        }
        let previous = self.value();
        let cursor = self.cursor;
        self.chars.clear();
        self.cursor = 0;
        self.scroll_col = 0;
        self.record(EditOperation::Replace { previous, cursor });
    }

    /// Empty the field without keeping history, e.g. after a message is sent
    pub fn reset(&mut self) {
        self.chars.clear();
        self.cursor = 0;
        self.scroll_col = 0;
        self.undo_stack.clear();
    }

    pub fn undo(&mut self) -> bool {
        let Some(op) = self.undo_stack.pop() else {
            return false;
        };
        match op {
            EditOperation::InsertChar { col, ch } => {
                if self.chars.get(col) == Some(&ch) {
                    self.chars.remove(col);
                    self.cursor = col;
                }
            }
            EditOperation::DeleteChar { col, ch } => {
                if col <= self.chars.len() {
                    self.chars.insert(col, ch);
                    self.cursor = col + 1;
                }
            }
            EditOperation::Replace { previous, cursor } => {
                self.chars = previous.chars().collect();
                self.cursor = cmp::min(cursor, self.chars.len());
            }
        }
        true
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = cmp::min(self.cursor + 1, self.chars.len());
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub fn move_cursor_word_left(&mut self) {
        let mut pos = cmp::min(self.cursor, self.chars.len());
        while pos > 0 && self.chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && is_word_char(self.chars[pos - 1]) {
            pos -= 1;
        }
        // Punctuation run
        if pos == self.cursor && pos > 0 {
            pos -= 1;
        }
        self.cursor = pos;
    }

    pub fn move_cursor_word_right(&mut self) {
        let len = self.chars.len();
        let mut pos = cmp::min(self.cursor, len);
        while pos < len && is_word_char(self.chars[pos]) {
            pos += 1;
        }
        while pos < len && self.chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos == self.cursor && pos < len {
            pos += 1;
        }
        self.cursor = pos;
    }

    pub fn update_horizontal_scroll(&mut self, viewport_width: usize) {
        // viewport_width should account for borders (width - 2)
        let effective_width = viewport_width.saturating_sub(2).max(1);
        if self.cursor < self.scroll_col {
            self.scroll_col = self.cursor;
        } else if self.cursor >= self.scroll_col + effective_width {
            self.scroll_col = self.cursor + 1 - effective_width;
        }
    }

    /// Visible slice of the text, masked if needed
    pub fn visible_text(&self, width: usize) -> String {
        self.chars
            .iter()
            .skip(self.scroll_col)
            .take(width)
            .map(|c| if self.masked { '•' } else { *c })
            .collect()
    }

    /// Cursor position inside a bordered box at `area`
    pub fn get_cursor_screen_pos(&self, area: Rect) -> Option<(u16, u16)> {
        if area.width < 3 || area.height < 3 {
            return None;
        }
        let col = self.cursor.saturating_sub(self.scroll_col) as u16;
        let x = area.x + 1 + cmp::min(col, area.width - 3);
        Some((x, area.y + 1))
    }
}

/// Bordered single-line field. Places the terminal cursor when focused.
pub fn render_input(
    f: &mut Frame,
    area: Rect,
    input: &mut TextInput,
    title: &str,
    placeholder: &str,
    focused: bool,
    config: &Config,
) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);

    input.update_horizontal_scroll(area.width as usize);
    let inner_width = area.width.saturating_sub(2) as usize;

    let line = if input.is_empty() && !focused {
        Line::from(Span::styled(
            placeholder.to_string(),
            Style::default().fg(fg_color).add_modifier(Modifier::DIM),
        ))
    } else {
        Line::from(input.visible_text(inner_width))
    };

    let border_style = if focused {
        Style::default().fg(highlight_bg)
    } else {
        Style::default().fg(fg_color)
    };

    let paragraph = Paragraph::new(line)
        .style(Style::default().fg(fg_color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title.to_string()),
        );
    f.render_widget(paragraph, area);

    if focused && let Some((x, y)) = input.get_cursor_screen_pos(area) {
        f.set_cursor_position(Position::new(x, y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let mut input = TextInput::new();
        for ch in "car".chars() {
            input.insert_char(ch);
        }
        assert_eq!(input.value(), "car");
        input.move_cursor_left();
        input.delete_char();
        assert_eq!(input.value(), "cr");
        assert_eq!(input.cursor, 1);
        input.delete_forward();
        assert_eq!(input.value(), "c");
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut input = TextInput::from_string("12");
        input.delete_char();
        assert_eq!(input.value(), "1");
        assert!(input.undo());
        assert_eq!(input.value(), "12");

        input.insert_str("0.5");
        assert_eq!(input.value(), "120.5");
        assert!(input.undo());
        assert_eq!(input.value(), "12");

        input.clear();
        assert!(input.is_empty());
        assert!(input.undo());
        assert_eq!(input.value(), "12");
    }

    #[test]
    fn test_paste_strips_newlines() {
        let mut input = TextInput::new();
        input.insert_str("line one\nline two");
        assert_eq!(input.value(), "line oneline two");
    }

    #[test]
    fn test_word_movement() {
        let mut input = TextInput::from_string("natural gas usage");
        input.move_cursor_word_left();
        assert_eq!(input.cursor, 12);
        input.move_cursor_word_left();
        assert_eq!(input.cursor, 8);
        input.move_cursor_home();
        input.move_cursor_word_right();
        assert_eq!(input.cursor, 8);
    }

    #[test]
    fn test_masked_visible_text() {
        let mut input = TextInput::masked();
        input.insert_str("secret");
        assert_eq!(input.visible_text(10), "••••••");
        assert_eq!(input.value(), "secret");
    }

    #[test]
    fn test_horizontal_scroll_follows_cursor() {
        let mut input = TextInput::from_string("abcdefghijklmnop");
        input.update_horizontal_scroll(10);
        // 8 visible columns, cursor at 16
        assert_eq!(input.scroll_col, 9);
        input.move_cursor_home();
        input.update_horizontal_scroll(10);
        assert_eq!(input.scroll_col, 0);
    }
}
