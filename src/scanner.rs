/// Cursor over one line of assembly text.
///
/// Positions are byte offsets into the original line so errors can point
/// back at the source.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_spaces(&mut self) -> &mut Self {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.pos += 1;
        }
        self
    }

    /// Consumes `c` if it is the next character.
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes `word` case-insensitively when it is not followed by an
    /// identifier character.
    pub fn eat_word(&mut self, word: &str) -> bool {
        let rest = self.rest();
        if rest.len() < word.len() || !rest.is_char_boundary(word.len()) {
            return false;
        }
        if !rest[..word.len()].eq_ignore_ascii_case(word) {
            return false;
        }
        if rest[word.len()..].chars().next().map_or(false, is_ident_char) {
            return false;
        }
        self.pos += word.len();
        true
    }

    /// Peeks the identifier at the cursor without consuming it.
    pub fn peek_ident(&self) -> Option<&'a str> {
        let rest = self.rest();
        if !rest.chars().next().map_or(false, is_ident_start) {
            return None;
        }
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        Some(&rest[..end])
    }

    pub fn ident(&mut self) -> Option<&'a str> {
        let id = self.peek_ident()?;
        self.pos += id.len();
        Some(id)
    }

    /// True when only spaces or a `;` comment remain.
    pub fn at_end(&self) -> bool {
        let rest = self.rest().trim_start();
        rest.is_empty() || rest.starts_with(';')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_need_a_boundary() {
        let mut s = Scanner::new("HLX");
        assert!(!s.eat_word("hl"));
        let mut s = Scanner::new("hl,5");
        assert!(s.eat_word("HL"));
        assert_eq!(s.peek(), Some(','));
    }

    #[test]
    fn comment_counts_as_end() {
        let mut s = Scanner::new("NOP   ; idle");
        assert_eq!(s.ident(), Some("NOP"));
        assert!(s.at_end());
    }
}
