use super::numeric::format_with_commas;
use super::numeric::reformat_with_caret;
use super::numeric::sanitize_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Plain,
    Numeric,
    Grouped,
}

/// Single-line editor with a char-indexed caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    text: String,
    caret: usize,
    format: FieldFormat,
}

impl TextField {
    pub fn new(format: FieldFormat) -> Self {
        Self {
            text: String::new(),
            caret: 0,
            format,
        }
    }

    pub fn with_value(format: FieldFormat, raw: &str) -> Self {
        let text = match format {
            FieldFormat::Grouped => format_with_commas(raw),
            FieldFormat::Numeric => sanitize_number(raw),
            FieldFormat::Plain => raw.to_string(),
        };
        let caret = text.chars().count();
        Self {
            text,
            caret,
            format,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    /// Value as stored in answers: separators stripped for numeric formats.
    pub fn value(&self) -> String {
        match self.format {
            FieldFormat::Plain => self.text.clone(),
            FieldFormat::Numeric | FieldFormat::Grouped => sanitize_number(&self.text),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    /// Returns false when the character is not accepted by the field format.
    pub fn insert(&mut self, ch: char) -> bool {
        let accepted = match self.format {
            FieldFormat::Plain => !ch.is_control(),
            FieldFormat::Numeric | FieldFormat::Grouped => {
                ch.is_ascii_digit() || matches!(ch, '.' | '-' | ',')
            }
        };
        if !accepted {
            return false;
        }
        let at = self.byte_index(self.caret);
        self.text.insert(at, ch);
        self.caret += 1;
        self.reformat();
        true
    }

    pub fn insert_str(&mut self, input: &str) {
        for ch in input.chars() {
            self.insert(ch);
        }
    }

    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        // Deleting a separator would just re-insert it; remove the digit before it.
        if self.format == FieldFormat::Grouped && self.char_at(self.caret - 1) == Some(',') {
            self.caret -= 1;
            if self.caret == 0 {
                return;
            }
        }
        let start = self.byte_index(self.caret - 1);
        let end = self.byte_index(self.caret);
        self.text.replace_range(start..end, "");
        self.caret -= 1;
        self.reformat();
    }

    pub fn delete(&mut self) {
        let len = self.text.chars().count();
        if self.caret >= len {
            return;
        }
        if self.format == FieldFormat::Grouped && self.char_at(self.caret) == Some(',') {
            self.caret += 1;
            if self.caret >= len {
                return;
            }
        }
        let start = self.byte_index(self.caret);
        let end = self.byte_index(self.caret + 1);
        self.text.replace_range(start..end, "");
        self.reformat();
    }

    pub fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.caret = 0;
    }

    pub fn move_end(&mut self) {
        self.caret = self.text.chars().count();
    }

    fn char_at(&self, idx: usize) -> Option<char> {
        self.text.chars().nth(idx)
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map_or(self.text.len(), |(idx, _)| idx)
    }

    fn reformat(&mut self) {
        if self.format != FieldFormat::Grouped {
            return;
        }
        let out = reformat_with_caret(&self.text, self.caret);
        self.text = out.text;
        self.caret = out.caret;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn grouped_field_formats_while_typing() {
        let mut field = TextField::new(FieldFormat::Grouped);
        field.insert_str("100000");
        assert_eq!(field.text(), "100,000");
        assert_eq!(field.caret(), 7);
        assert_eq!(field.value(), "100000");
    }

    #[test]
    fn numeric_field_rejects_letters() {
        let mut field = TextField::new(FieldFormat::Numeric);
        assert!(!field.insert('a'));
        assert!(field.insert('4'));
        assert_eq!(field.text(), "4");
    }

    #[test]
    fn backspace_over_separator_removes_digit() {
        let mut field = TextField::with_value(FieldFormat::Grouped, "1234");
        assert_eq!(field.text(), "1,234");
        field.move_home();
        field.move_right();
        field.move_right();
        // caret sits right after the comma
        field.backspace();
        assert_eq!(field.text(), "234");
        assert_eq!(field.caret(), 0);
    }

    #[test]
    fn editing_in_the_middle_keeps_caret_position() {
        let mut field = TextField::with_value(FieldFormat::Grouped, "1000");
        field.move_home();
        field.move_right();
        field.insert('5');
        assert_eq!(field.text(), "15,000");
        assert_eq!(field.caret(), 2);
    }

    #[test]
    fn plain_field_handles_multibyte_text() {
        let mut field = TextField::new(FieldFormat::Plain);
        field.insert_str("héllo");
        field.move_left();
        field.backspace();
        assert_eq!(field.text(), "hélo");
        field.move_home();
        field.delete();
        assert_eq!(field.text(), "élo");
    }
}
