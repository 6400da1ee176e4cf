//! On-demand JavaScript lexer.
//!
//! Tokens are produced as the parser asks for them, which lets the lexer use
//! token history to disambiguate regex literals from division and lets the
//! parser re-enter template literals after each `${…}` substitution.
//!
//! Comments are collected (not tokenized) and handed to the parser when
//! lexing finishes; the pipeline uses them for directive guards and for the
//! empty-source check.

use crate::span::Span;
use crate::token::{Kw, Token, TokenKind};

/// A comment collected while lexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// `/* … */` if true, `// …` otherwise.
    pub block: bool,
    /// Text between the comment markers.
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Whether `/` at the current position starts a regex literal.
    regex_allowed: bool,
    comments: Vec<Comment>,
    hashbang: Option<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            regex_allowed: true,
            comments: Vec::new(),
            hashbang: None,
        };
        lexer.skip_hashbang();
        lexer
    }

    /// The `#!…` line, if the source started with one.
    pub fn hashbang(&self) -> Option<&str> {
        self.hashbang.as_deref()
    }

    /// Hand over the collected comments.
    pub fn take_comments(&mut self) -> Vec<Comment> {
        std::mem::take(&mut self.comments)
    }

    fn skip_hashbang(&mut self) {
        if self.bytes.starts_with(b"#!") {
            let end = self.find_line_end(0);
            self.hashbang = Some(self.source[..end].to_string());
            self.pos = end;
        }
    }

    fn find_line_end(&self, from: usize) -> usize {
        self.bytes[from..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.bytes.len(), |i| from + i)
    }

    #[inline]
    fn peek_byte(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    #[inline]
    fn byte_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// Skip whitespace and comments. Returns true if a line terminator was
    /// crossed.
    fn skip_trivia(&mut self) -> bool {
        let mut newline = false;
        loop {
            match self.peek_byte() {
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'\n' => {
                    newline = true;
                    self.pos += 1;
                }
                b'/' if self.byte_at(1) == b'/' => {
                    let start = self.pos;
                    let end = self.find_line_end(self.pos);
                    self.comments.push(Comment {
                        block: false,
                        text: self.source[start + 2..end].to_string(),
                        span: Span::new(start as u32, end as u32),
                    });
                    self.pos = end;
                }
                b'/' if self.byte_at(1) == b'*' => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut end = self.bytes.len();
                    while self.pos < self.bytes.len() {
                        if self.peek_byte() == b'\n' {
                            newline = true;
                        }
                        if self.peek_byte() == b'*' && self.byte_at(1) == b'/' {
                            end = self.pos;
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                    self.comments.push(Comment {
                        block: true,
                        text: self.source[start + 2..end].to_string(),
                        span: Span::new(start as u32, self.pos as u32),
                    });
                }
                _ => {
                    // Non-ASCII whitespace (U+2028/U+2029 count as terminators).
                    if let Some(c) = self.peek_char() {
                        if c == '\u{2028}' || c == '\u{2029}' {
                            newline = true;
                            self.pos += c.len_utf8();
                            continue;
                        }
                        if c != '\u{feff}' && c.is_whitespace() {
                            self.pos += c.len_utf8();
                            continue;
                        }
                        if c == '\u{feff}' {
                            self.pos += c.len_utf8();
                            continue;
                        }
                    }
                    return newline;
                }
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        let newline = self.skip_trivia();
        let start = self.pos as u32;
        if self.pos >= self.bytes.len() {
            return Token::new(TokenKind::Eof, Span::at(start), newline);
        }

        let kind = match self.peek_byte() {
            b'0'..=b'9' => self.read_number(),
            b'"' | b'\'' => self.read_string(),
            b'`' => self.read_template_piece(),
            b'/' if self.regex_allowed => self.read_regex(),
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80 => {
                self.read_word()
            }
            b'.' if self.byte_at(1).is_ascii_digit() => self.read_number(),
            _ => self.read_punct(),
        };

        self.regex_allowed = regex_can_follow(&kind);
        Token::new(kind, Span::new(start, self.pos as u32), newline)
    }

    /// Resume a template literal after the `}` closing a substitution. The
    /// parser calls this instead of `next_token` while it is inside a
    /// template, with `pos` sitting just past the `}`.
    pub fn template_continue(&mut self) -> Token {
        let start = self.pos as u32;
        let kind = self.read_template_body();
        self.regex_allowed = regex_can_follow(&kind);
        Token::new(kind, Span::new(start, self.pos as u32), false)
    }

    fn read_word(&mut self) -> TokenKind {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.peek_char().unwrap();
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        match Kw::from_word(word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(word.to_string()),
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek_byte() == b'0' && matches!(self.byte_at(1), b'x' | b'X' | b'o' | b'O' | b'b' | b'B') {
            let radix = match self.byte_at(1) {
                b'x' | b'X' => 16,
                b'o' | b'O' => 8,
                _ => 2,
            };
            self.pos += 2;
            let digits_start = self.pos;
            // `n` ends the digits: it is the bigint suffix, never a digit.
            while (self.peek_byte().is_ascii_alphanumeric() && self.peek_byte() != b'n')
                || self.peek_byte() == b'_'
            {
                self.pos += 1;
            }
            let digits: String = self.source[digits_start..self.pos]
                .chars()
                .filter(|&c| c != '_')
                .collect();
            if self.peek_byte() == b'n' {
                self.pos += 1;
                return TokenKind::BigInt(self.source[start..self.pos].replace('_', ""));
            }
            let value = u128::from_str_radix(&digits, radix).unwrap_or(0);
            return TokenKind::Num(value as f64);
        }

        while self.peek_byte().is_ascii_digit() || self.peek_byte() == b'_' {
            self.pos += 1;
        }
        if self.peek_byte() == b'n' {
            self.pos += 1;
            return TokenKind::BigInt(self.source[start..self.pos].replace('_', ""));
        }
        if self.peek_byte() == b'.' {
            self.pos += 1;
            while self.peek_byte().is_ascii_digit() || self.peek_byte() == b'_' {
                self.pos += 1;
            }
        }
        if matches!(self.peek_byte(), b'e' | b'E') {
            let mut ahead = 1;
            if matches!(self.byte_at(1), b'+' | b'-') {
                ahead = 2;
            }
            if self.byte_at(ahead).is_ascii_digit() {
                self.pos += ahead;
                while self.peek_byte().is_ascii_digit() || self.peek_byte() == b'_' {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.source[start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        TokenKind::Num(text.parse().unwrap_or(f64::NAN))
    }

    fn read_string(&mut self) -> TokenKind {
        let quote = self.peek_byte();
        self.pos += 1;
        let mut value = String::new();
        while self.pos < self.bytes.len() {
            let b = self.peek_byte();
            if b == quote {
                self.pos += 1;
                break;
            }
            if b == b'\\' {
                self.pos += 1;
                self.read_escape(&mut value);
            } else {
                let c = self.peek_char().unwrap();
                value.push(c);
                self.pos += c.len_utf8();
            }
        }
        TokenKind::Str(value)
    }

    fn read_escape(&mut self, out: &mut String) {
        let Some(c) = self.peek_char() else { return };
        self.pos += c.len_utf8();
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek_byte().is_ascii_digit() => out.push('\0'),
            'x' => {
                let hex = self.take_hex(2);
                if let Some(v) = hex {
                    if let Some(ch) = char::from_u32(v) {
                        out.push(ch);
                    }
                }
            }
            'u' => {
                if self.peek_byte() == b'{' {
                    self.pos += 1;
                    let start = self.pos;
                    while self.peek_byte() != b'}' && self.pos < self.bytes.len() {
                        self.pos += 1;
                    }
                    let v = u32::from_str_radix(&self.source[start..self.pos], 16).ok();
                    if self.peek_byte() == b'}' {
                        self.pos += 1;
                    }
                    if let Some(ch) = v.and_then(char::from_u32) {
                        out.push(ch);
                    }
                } else if let Some(v) = self.take_hex(4) {
                    // Surrogate pairs round-trip through a replacement when
                    // unpaired; paired surrogates are recombined.
                    if (0xd800..0xdc00).contains(&v)
                        && self.peek_byte() == b'\\'
                        && self.byte_at(1) == b'u'
                    {
                        let save = self.pos;
                        self.pos += 2;
                        if let Some(lo) = self.take_hex(4) {
                            if (0xdc00..0xe000).contains(&lo) {
                                let combined =
                                    0x10000 + ((v - 0xd800) << 10) + (lo - 0xdc00);
                                if let Some(ch) = char::from_u32(combined) {
                                    out.push(ch);
                                    return;
                                }
                            }
                        }
                        self.pos = save;
                        out.push(char::from_u32(v).unwrap_or('\u{fffd}'));
                    } else {
                        out.push(char::from_u32(v).unwrap_or('\u{fffd}'));
                    }
                }
            }
            '\n' => {}
            '\r' => {
                if self.peek_byte() == b'\n' {
                    self.pos += 1;
                }
            }
            other => out.push(other),
        }
    }

    fn take_hex(&mut self, digits: usize) -> Option<u32> {
        let end = self.pos + digits;
        if end > self.bytes.len() {
            return None;
        }
        let v = u32::from_str_radix(&self.source[self.pos..end], 16).ok()?;
        self.pos = end;
        Some(v)
    }

    fn read_template_piece(&mut self) -> TokenKind {
        self.pos += 1; // consume the backtick
        self.read_template_body()
    }

    fn read_template_body(&mut self) -> TokenKind {
        let mut cooked = String::new();
        while self.pos < self.bytes.len() {
            match self.peek_byte() {
                b'`' => {
                    self.pos += 1;
                    return TokenKind::TemplatePart { cooked, tail: true };
                }
                b'$' if self.byte_at(1) == b'{' => {
                    self.pos += 2;
                    return TokenKind::TemplatePart { cooked, tail: false };
                }
                b'\\' => {
                    self.pos += 1;
                    self.read_escape(&mut cooked);
                }
                _ => {
                    let c = self.peek_char().unwrap();
                    cooked.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        TokenKind::TemplatePart { cooked, tail: true }
    }

    fn read_regex(&mut self) -> TokenKind {
        self.pos += 1; // the opening slash
        let start = self.pos;
        let mut in_class = false;
        while self.pos < self.bytes.len() {
            match self.peek_byte() {
                b'\\' => self.pos += 2,
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => break,
                b'\n' => break,
                _ => {
                    let c = self.peek_char().unwrap();
                    self.pos += c.len_utf8();
                }
            }
        }
        let pattern = self.source[start..self.pos.min(self.bytes.len())].to_string();
        if self.peek_byte() == b'/' {
            self.pos += 1;
        }
        let flags_start = self.pos;
        while self.peek_byte().is_ascii_alphabetic() {
            self.pos += 1;
        }
        TokenKind::Regex {
            pattern,
            flags: self.source[flags_start..self.pos].to_string(),
        }
    }

    fn read_punct(&mut self) -> TokenKind {
        use TokenKind::*;
        macro_rules! take {
            ($n:expr, $kind:expr) => {{
                self.pos += $n;
                $kind
            }};
        }
        let (a, b, c, d) = (self.byte_at(0), self.byte_at(1), self.byte_at(2), self.byte_at(3));
        match (a, b, c, d) {
            (b'>', b'>', b'>', b'=') => take!(4, UShrEq),
            (b'.', b'.', b'.', _) => take!(3, DotDotDot),
            (b'=', b'=', b'=', _) => take!(3, EqEqEq),
            (b'!', b'=', b'=', _) => take!(3, NotEqEq),
            (b'*', b'*', b'=', _) => take!(3, StarStarEq),
            (b'<', b'<', b'=', _) => take!(3, ShlEq),
            (b'>', b'>', b'=', _) => take!(3, ShrEq),
            (b'>', b'>', b'>', _) => take!(3, UShr),
            (b'&', b'&', b'=', _) => take!(3, AmpAmpEq),
            (b'|', b'|', b'=', _) => take!(3, PipePipeEq),
            (b'?', b'?', b'=', _) => take!(3, QuestionQuestionEq),
            (b'=', b'=', _, _) => take!(2, EqEq),
            (b'!', b'=', _, _) => take!(2, NotEq),
            (b'=', b'>', _, _) => take!(2, Arrow),
            (b'<', b'=', _, _) => take!(2, LtEq),
            (b'>', b'=', _, _) => take!(2, GtEq),
            (b'<', b'<', _, _) => take!(2, Shl),
            (b'>', b'>', _, _) => take!(2, Shr),
            (b'+', b'+', _, _) => take!(2, PlusPlus),
            (b'-', b'-', _, _) => take!(2, MinusMinus),
            (b'+', b'=', _, _) => take!(2, PlusEq),
            (b'-', b'=', _, _) => take!(2, MinusEq),
            (b'*', b'*', _, _) => take!(2, StarStar),
            (b'*', b'=', _, _) => take!(2, StarEq),
            (b'/', b'=', _, _) => take!(2, SlashEq),
            (b'%', b'=', _, _) => take!(2, PercentEq),
            (b'&', b'&', _, _) => take!(2, AmpAmp),
            (b'|', b'|', _, _) => take!(2, PipePipe),
            (b'&', b'=', _, _) => take!(2, AmpEq),
            (b'|', b'=', _, _) => take!(2, PipeEq),
            (b'^', b'=', _, _) => take!(2, CaretEq),
            (b'?', b'?', _, _) => take!(2, QuestionQuestion),
            (b'?', b'.', _, _) if !c.is_ascii_digit() => take!(2, QuestionDot),
            (b'(', ..) => take!(1, LParen),
            (b')', ..) => take!(1, RParen),
            (b'{', ..) => take!(1, LBrace),
            (b'}', ..) => take!(1, RBrace),
            (b'[', ..) => take!(1, LBracket),
            (b']', ..) => take!(1, RBracket),
            (b';', ..) => take!(1, Semicolon),
            (b',', ..) => take!(1, Comma),
            (b'.', ..) => take!(1, Dot),
            (b':', ..) => take!(1, Colon),
            (b'?', ..) => take!(1, Question),
            (b'=', ..) => take!(1, Eq),
            (b'!', ..) => take!(1, Bang),
            (b'<', ..) => take!(1, Lt),
            (b'>', ..) => take!(1, Gt),
            (b'+', ..) => take!(1, Plus),
            (b'-', ..) => take!(1, Minus),
            (b'*', ..) => take!(1, Star),
            (b'/', ..) => take!(1, Slash),
            (b'%', ..) => take!(1, Percent),
            (b'&', ..) => take!(1, Amp),
            (b'|', ..) => take!(1, Pipe),
            (b'^', ..) => take!(1, Caret),
            (b'~', ..) => take!(1, Tilde),
            _ => {
                // Unknown byte: skip it so the parser reports at the right spot.
                self.pos += self.peek_char().map_or(1, char::len_utf8);
                Eof
            }
        }
    }
}

/// Whether a `/` after a token of this kind starts a regex literal.
fn regex_can_follow(kind: &TokenKind) -> bool {
    use TokenKind::*;
    !matches!(
        kind,
        Ident(_)
            | Num(_)
            | BigInt(_)
            | Str(_)
            | TemplatePart { tail: true, .. }
            | Regex { .. }
            | RParen
            | RBracket
            | PlusPlus
            | MinusMinus
            | Keyword(crate::token::Kw::This)
            | Keyword(crate::token::Kw::Super)
            | Keyword(crate::token::Kw::Null)
            | Keyword(crate::token::Kw::True)
            | Keyword(crate::token::Kw::False)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_words_and_numbers() {
        assert_eq!(
            kinds("let x = 0x1f;"),
            vec![
                TokenKind::Ident("let".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Num(31.0),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#"'a\x41B'"#), vec![TokenKind::Str("aAB".into())]);
    }

    #[test]
    fn test_regex_vs_division() {
        assert_eq!(
            kinds("a / b"),
            vec![TokenKind::Ident("a".into()), TokenKind::Slash, TokenKind::Ident("b".into())]
        );
        assert!(matches!(kinds("= /ab/g")[1], TokenKind::Regex { .. }));
    }

    #[test]
    fn test_newline_tracking() {
        let mut lexer = Lexer::new("a\nb");
        assert!(!lexer.next_token().had_newline_before);
        assert!(lexer.next_token().had_newline_before);
    }

    #[test]
    fn test_comments_collected() {
        let mut lexer = Lexer::new("// line\n/* block */ x");
        while lexer.next_token().kind != TokenKind::Eof {}
        let comments = lexer.take_comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, " line");
        assert!(comments[1].block);
    }

    #[test]
    fn test_hashbang() {
        let lexer = Lexer::new("#!/usr/bin/env node\nvar a;");
        assert_eq!(lexer.hashbang(), Some("#!/usr/bin/env node"));
    }
}
