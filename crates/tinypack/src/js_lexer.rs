//! Minimal ECMAScript tokenizer
//!
//! Only as much lexing as is needed to find module specifiers reliably: it
//! separates comments, string literals, template literals and regular
//! expression literals from code so that text inside them is never mistaken
//! for a `require` call. Every token keeps its byte range in the source so
//! callers can splice replacements without re-printing anything.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Ident,
    /// `'..'`, `".."` or a template literal without substitutions
    Str,
    /// Part of a template literal that has substitutions
    Template,
    Number,
    Regex,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub range: Range<usize>,
}

impl Token<'_> {
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    /// Decoded value of a string token
    pub fn string_value(&self) -> Option<String> {
        if self.kind == TokenKind::Str {
            string_value(self.text)
        } else {
            None
        }
    }
}

/// Keywords after which a `/` starts a regular expression rather than a division
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Keywords whose parenthesized header is followed by a statement, so a `/`
/// after the closing `)` starts a regular expression
const CONTROL_HEADER_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

/// Byte order mark, JavaScript whitespace wherever it appears
const BOM: char = '\u{feff}';

/// Tokenize `source`, dropping whitespace and comments.
///
/// The tokenizer never fails: unterminated literals and comments simply run
/// to the end of the input.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Brace depth at which each open template substitution started
    template_stack: Vec<usize>,
    brace_depth: usize,
    /// One entry per open `(`: whether it opened a control statement header
    paren_stack: Vec<bool>,
    /// Whether the most recent `)` closed a control statement header
    closed_control_header: bool,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            template_stack: Vec::new(),
            brace_depth: 0,
            paren_stack: Vec::new(),
            closed_control_header: false,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token<'a>> {
        if self.source.starts_with(BOM) {
            self.pos += BOM.len_utf8();
        }
        if self.source[self.pos..].starts_with("#!") {
            self.skip_line();
        }

        while let Some(c) = self.skip_trivia() {
            let start = self.pos;
            let kind = match c {
                b'\'' | b'"' => {
                    self.scan_quoted(c);
                    TokenKind::Str
                }
                b'`' => {
                    self.pos += 1;
                    if self.scan_template_chars() {
                        TokenKind::Template
                    } else {
                        TokenKind::Str
                    }
                }
                b'}' if self.template_stack.last() == Some(&self.brace_depth) => {
                    self.template_stack.pop();
                    self.pos += 1;
                    self.scan_template_chars();
                    TokenKind::Template
                }
                b'/' if self.regex_allowed() => {
                    self.scan_regex();
                    TokenKind::Regex
                }
                b'0'..=b'9' => {
                    self.scan_number();
                    TokenKind::Number
                }
                b'.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.scan_number();
                    TokenKind::Number
                }
                c if is_ident_start(c) => {
                    self.scan_ident();
                    TokenKind::Ident
                }
                _ => {
                    self.scan_punct(c);
                    TokenKind::Punct
                }
            };
            self.push(kind, start);
        }

        self.tokens
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.source[start..self.pos],
            range: start..self.pos,
        });
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Skip whitespace and comments, returning the next significant byte
    fn skip_trivia(&mut self) -> Option<u8> {
        loop {
            let c = self.peek(0)?;
            match c {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => {
                    self.pos += 2;
                    match self.source[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => self.pos = self.bytes.len(),
                    }
                }
                0x80..=0xff => match self.unicode_space_len() {
                    Some(len) => self.pos += len,
                    None => return Some(c),
                },
                _ => return Some(c),
            }
        }
    }

    /// Byte length of the non-ASCII whitespace or line terminator at `pos`
    fn unicode_space_len(&self) -> Option<usize> {
        let c = self.source.get(self.pos..)?.chars().next()?;
        (c == BOM || (!c.is_ascii() && c.is_whitespace())).then_some(c.len_utf8())
    }

    fn scan_quoted(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            match c {
                b'\\' => self.pos = (self.pos + 1).min(self.bytes.len()),
                b'\n' => {
                    // Unterminated; keep the newline out of the token
                    self.pos -= 1;
                    return;
                }
                c if c == quote => return,
                _ => {}
            }
        }
    }

    /// Scan template characters up to and including the closing backtick or
    /// an opening `${`. Returns `true` if a substitution was opened.
    fn scan_template_chars(&mut self) -> bool {
        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => self.pos = (self.pos + 2).min(self.bytes.len()),
                b'`' => {
                    self.pos += 1;
                    return false;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.template_stack.push(self.brace_depth);
                    return true;
                }
                _ => self.pos += 1,
            }
        }
        false
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        match prev.kind {
            TokenKind::Punct => match prev.text {
                ")" => self.closed_control_header,
                "]" | "}" => false,
                _ => true,
            },
            TokenKind::Ident => REGEX_PRECEDING_KEYWORDS.contains(&prev.text),
            TokenKind::Template => prev.text.ends_with("${"),
            TokenKind::Str | TokenKind::Number | TokenKind::Regex => false,
        }
    }

    fn scan_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => {
                    self.pos = (self.pos + 2).min(self.bytes.len());
                    continue;
                }
                b'\n' => return,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(is_ident_part) {
                        self.pos += 1;
                    }
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn scan_number(&mut self) {
        let hex = self.peek(0) == Some(b'0') && matches!(self.peek(1), Some(b'x' | b'X'));
        while let Some(c) = self.peek(0) {
            let exponent_sign = matches!(c, b'+' | b'-')
                && !hex
                && self.pos > 0
                && matches!(self.bytes[self.pos - 1], b'e' | b'E');
            if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn scan_ident(&mut self) {
        while self.peek(0).is_some_and(is_ident_part) && self.unicode_space_len().is_none() {
            self.pos += 1;
        }
    }

    /// Whether a `(` about to be pushed opens an `if`/`while`/`for`/`with`
    /// header, including `for await (`
    fn opens_control_header(&self) -> bool {
        let mut previous = self.tokens.iter().rev();
        match previous.next() {
            Some(token) if token.is_ident("await") => {
                previous.next().is_some_and(|token| token.is_ident("for"))
            }
            Some(token) => {
                token.kind == TokenKind::Ident && CONTROL_HEADER_KEYWORDS.contains(&token.text)
            }
            None => false,
        }
    }

    fn scan_punct(&mut self, c: u8) {
        match c {
            b'{' => self.brace_depth += 1,
            b'}' => self.brace_depth = self.brace_depth.saturating_sub(1),
            b'(' => {
                let header = self.opens_control_header();
                self.paren_stack.push(header);
            }
            b')' => self.closed_control_header = self.paren_stack.pop().unwrap_or(false),
            _ => {}
        }
        let rest = &self.source[self.pos..];
        let len = if rest.starts_with("...") {
            3
        } else if rest.starts_with("?.") && !rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
            2
        } else if rest.starts_with("=>") {
            2
        } else {
            rest.chars().next().map_or(1, char::len_utf8)
        };
        self.pos += len;
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c == b'\\' || c >= 0x80
}

fn is_ident_part(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Decode the value of a quoted string or substitution-free template literal
pub fn string_value(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = chars.next()?;
    if !matches!(quote, '\'' | '"' | '`') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next()? {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            'v' => value.push('\u{b}'),
            '0' => value.push('\0'),
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                value.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                value.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            other => value.push(other),
        }
    }
    Some(value)
}
