use aiwriter_core::EditorBuffer;

/// Line-based text buffer with a cursor, one per tab.
///
/// Columns are counted in chars, never bytes.
#[derive(Debug, Clone)]
pub struct TextArea {
    lines: Vec<String>,
    row: usize,
    col: usize,
    pub scroll: usize,
    /// Written back by `text()` so CRLF files stay CRLF.
    line_ending: &'static str,
}

impl Default for TextArea {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            scroll: 0,
            line_ending: "\n",
        }
    }
}

impl EditorBuffer for TextArea {
    fn from_text(text: &str) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            lines,
            line_ending,
            ..Self::default()
        }
    }

    fn text(&self) -> String {
        self.lines.join(self.line_ending)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub(crate) fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextArea {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines[row].chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let line = &mut self.lines[self.row];
        let at = char_to_byte_index(line, self.col);
        line.insert(at, c);
        self.col += 1;
    }

    pub fn insert_newline(&mut self) {
        let line = &mut self.lines[self.row];
        let at = char_to_byte_index(line, self.col);
        let rest = line.split_off(at);
        self.lines.insert(self.row + 1, rest);
        self.row += 1;
        self.col = 0;
    }

    /// Returns false when there was nothing to delete.
    pub fn backspace(&mut self) -> bool {
        if self.col > 0 {
            let line = &mut self.lines[self.row];
            let at = char_to_byte_index(line, self.col - 1);
            line.remove(at);
            self.col -= 1;
            true
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_len(self.row);
            self.lines[self.row].push_str(&line);
            true
        } else {
            false
        }
    }

    pub fn delete(&mut self) -> bool {
        if self.col < self.line_len(self.row) {
            let line = &mut self.lines[self.row];
            let at = char_to_byte_index(line, self.col);
            line.remove(at);
            true
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
            true
        } else {
            false
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.line_len(self.row);
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.line_len(self.row) {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self, n: usize) {
        self.row = self.row.saturating_sub(n);
        self.col = self.col.min(self.line_len(self.row));
    }

    pub fn move_down(&mut self, n: usize) {
        self.row = (self.row + n).min(self.lines.len() - 1);
        self.col = self.col.min(self.line_len(self.row));
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.line_len(self.row);
    }

    /// Keeps the cursor row inside a viewport of `height` rows.
    pub fn scroll_to_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_survives_load() {
        let text = "first line\nsecond\n";
        assert_eq!(TextArea::from_text(text).text(), text);
        assert_eq!(TextArea::from_text("").lines().len(), 1);
    }

    #[test]
    fn test_crlf_kept_after_edit() {
        let mut buf = TextArea::from_text("one\r\ntwo\r\n");
        assert_eq!(buf.lines()[0], "one");
        buf.move_end();
        buf.insert_char('!');
        buf.insert_newline();
        buf.insert_char('x');
        assert_eq!(buf.text(), "one!\r\nx\r\ntwo\r\n");
    }

    #[test]
    fn test_insert_and_split_lines() {
        let mut buf = TextArea::from_text("héllo");
        buf.move_right();
        buf.move_right();
        buf.insert_newline();
        buf.insert_char('X');
        assert_eq!(buf.text(), "hé\nXllo");
        assert_eq!(buf.cursor(), (1, 1));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut buf = TextArea::from_text("ab\ncd");
        buf.move_down(1);
        assert!(buf.backspace());
        assert_eq!(buf.text(), "abcd");
        assert_eq!(buf.cursor(), (0, 2));

        buf.move_home();
        assert!(!buf.backspace());
    }

    #[test]
    fn test_delete_at_end_of_line() {
        let mut buf = TextArea::from_text("ab\ncd");
        buf.move_end();
        assert!(buf.delete());
        assert_eq!(buf.text(), "abcd");
    }

    #[test]
    fn test_vertical_moves_clamp_column() {
        let mut buf = TextArea::from_text("long line\nx");
        buf.move_end();
        buf.move_down(5);
        assert_eq!(buf.cursor(), (1, 1));
        buf.move_up(5);
        assert_eq!(buf.cursor(), (0, 1));
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let mut buf = TextArea::from_text(&"x\n".repeat(20));
        buf.move_down(15);
        buf.scroll_to_cursor(10);
        assert_eq!(buf.scroll, 6);
        buf.move_up(15);
        buf.scroll_to_cursor(10);
        assert_eq!(buf.scroll, 0);
    }
}
