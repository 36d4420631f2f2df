//! Lexer for script source code
//!
//! Converts source text into a stream of tokens. Regular expression literals
//! are ambiguous with division at the token level, so the parser asks for a
//! rescan when it expects an operand and sees `/` or `/=`.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::string_dict::StringDict;
use crate::value::JsString;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(JsString),
    RegExp(JsString, JsString), // (pattern, flags)
    True,
    False,
    Null,

    Identifier(JsString),

    // Keywords
    Var,
    Const,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Typeof,
    Instanceof,
    In,
    Void,
    Delete,
    With,
    Debugger,

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    PlusPlus,   // ++
    MinusMinus, // --
    Eq,         // =
    EqEq,       // ==
    EqEqEq,     // ===
    BangEq,     // !=
    BangEqEq,   // !==
    Lt,         // <
    LtEq,       // <=
    Gt,         // >
    GtEq,       // >=
    LtLt,       // <<
    GtGt,       // >>
    GtGtGt,     // >>>
    Amp,        // &
    AmpAmp,     // &&
    Pipe,       // |
    PipePipe,   // ||
    Caret,      // ^
    Tilde,      // ~
    Bang,       // !
    Question,   // ?

    // Assignment operators
    PlusEq,   // +=
    MinusEq,  // -=
    StarEq,   // *=
    SlashEq,  // /=
    PercentEq, // %=
    AmpEq,    // &=
    PipeEq,   // |=
    CaretEq,  // ^=
    LtLtEq,   // <<=
    GtGtEq,   // >>=
    GtGtGtEq, // >>>=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Dot,       // .
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;

    Eof,
    Invalid(char),
    UnterminatedString,
}

impl TokenKind {
    /// Keywords that may still appear as property names after `.`
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::New => "new",
            TokenKind::This => "this",
            TokenKind::Typeof => "typeof",
            TokenKind::Instanceof => "instanceof",
            TokenKind::In => "in",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::With => "with",
            TokenKind::Debugger => "debugger",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            _ => return None,
        })
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }
}

/// Lexer for tokenizing source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Base offset added to char_indices positions after a rescan
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    saw_newline: bool,
    string_dict: &'a mut StringDict,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
            string_dict,
        }
    }

    pub fn string_dict(&mut self) -> &mut StringDict {
        self.string_dict
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(
                TokenKind::Eof,
                Span::new(self.current_pos, self.current_pos, self.line, self.column),
                self.saw_newline,
            );
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,

            '.' => {
                if matches!(self.peek(), Some('0'..='9')) {
                    self.scan_number('.')
                } else {
                    TokenKind::Dot
                }
            }
            '+' => self.scan_compound('+', TokenKind::PlusPlus, TokenKind::PlusEq, TokenKind::Plus),
            '-' => self.scan_compound(
                '-',
                TokenKind::MinusMinus,
                TokenKind::MinusEq,
                TokenKind::Minus,
            ),
            '*' => self.scan_assign(TokenKind::StarEq, TokenKind::Star),
            '/' => self.scan_assign(TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.scan_assign(TokenKind::PercentEq, TokenKind::Percent),
            '^' => self.scan_assign(TokenKind::CaretEq, TokenKind::Caret),
            '=' => self.scan_equality(TokenKind::Eq, TokenKind::EqEq, TokenKind::EqEqEq),
            '!' => self.scan_equality(TokenKind::Bang, TokenKind::BangEq, TokenKind::BangEqEq),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '&' => self.scan_compound('&', TokenKind::AmpAmp, TokenKind::AmpEq, TokenKind::Amp),
            '|' => self.scan_compound('|', TokenKind::PipePipe, TokenKind::PipeEq, TokenKind::Pipe),

            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(ch),
            c if is_id_start(c) => self.scan_identifier(c),
            c => TokenKind::Invalid(c),
        };

        Token::new(kind, self.make_span(), self.saw_newline)
    }

    /// Rescan from `span.start` as a regular expression literal
    pub fn rescan_as_regexp(&mut self, span: Span) -> Token {
        let newline_before = self.saw_newline;
        self.current_pos = span.start;
        self.line = span.line;
        self.column = span.column;
        self.start_pos = span.start;
        self.start_line = span.line;
        self.start_column = span.column;
        self.chars_base_offset = span.start;
        self.chars = self
            .source
            .get(span.start..)
            .unwrap_or("")
            .char_indices()
            .peekable();

        // opening slash
        self.advance();

        let mut pattern = String::new();
        let mut in_class = false;
        let mut terminated = false;
        while let Some((_, c)) = self.advance() {
            match c {
                '/' if !in_class => {
                    terminated = true;
                    break;
                }
                '\n' | '\u{2028}' | '\u{2029}' => break,
                '[' => {
                    in_class = true;
                    pattern.push(c);
                }
                ']' => {
                    in_class = false;
                    pattern.push(c);
                }
                '\\' => {
                    pattern.push('\\');
                    if let Some((_, escaped)) = self.advance() {
                        pattern.push(escaped);
                    }
                }
                c => pattern.push(c),
            }
        }

        if !terminated {
            return Token::new(TokenKind::Invalid('/'), self.make_span(), newline_before);
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if is_id_part(ch) {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = TokenKind::RegExp(
            self.string_dict.get_or_insert(&pattern),
            self.string_dict.get_or_insert(&flags),
        );
        Token::new(kind, self.make_span(), newline_before)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            if is_line_terminator(ch) {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}') => {
                    self.advance();
                }
                Some('\n' | '\u{2028}' | '\u{2029}') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, c)) if is_line_terminator(c) => {
                                    self.saw_newline = true;
                                }
                                Some(_) => {}
                                None => break,
                            }
                        }
                    }
                    _ => break,
                },
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// `c`, `cc` or `c=`
    fn scan_compound(
        &mut self,
        c: char,
        doubled: TokenKind,
        assign: TokenKind,
        single: TokenKind,
    ) -> TokenKind {
        if self.match_char(c) {
            doubled
        } else if self.match_char('=') {
            assign
        } else {
            single
        }
    }

    fn scan_assign(&mut self, assign: TokenKind, single: TokenKind) -> TokenKind {
        if self.match_char('=') { assign } else { single }
    }

    fn scan_equality(
        &mut self,
        single: TokenKind,
        double: TokenKind,
        triple: TokenKind,
    ) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') { triple } else { double }
        } else {
            single
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.match_char('<') {
            if self.match_char('=') {
                TokenKind::LtLtEq
            } else {
                TokenKind::LtLt
            }
        } else if self.match_char('=') {
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.match_char('>') {
            if self.match_char('>') {
                if self.match_char('=') {
                    TokenKind::GtGtGtEq
                } else {
                    TokenKind::GtGtGt
                }
            } else if self.match_char('=') {
                TokenKind::GtGtEq
            } else {
                TokenKind::GtGt
            }
        } else if self.match_char('=') {
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'b')) => value.push('\x08'),
                    Some((_, 'f')) => value.push('\x0C'),
                    Some((_, 'v')) => value.push('\x0B'),
                    Some((_, c @ '0'..='7')) => {
                        // legacy octal escape, up to three digits
                        let mut code = c.to_digit(8).unwrap_or(0);
                        let max_digits = if c <= '3' { 2 } else { 1 };
                        for _ in 0..max_digits {
                            match self.peek().and_then(|d| d.to_digit(8)) {
                                Some(d) => {
                                    code = code * 8 + d;
                                    self.advance();
                                }
                                None => break,
                            }
                        }
                        value.extend(char::from_u32(code));
                    }
                    Some((_, 'x')) => match self.scan_hex_escape(2) {
                        Some(code) => value.extend(char::from_u32(code)),
                        None => value.push('x'),
                    },
                    Some((_, 'u')) => match self.scan_hex_escape(4) {
                        Some(code) => {
                            value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
                        }
                        None => value.push('u'),
                    },
                    Some((_, '\r')) => {
                        self.match_char('\n');
                    }
                    Some((_, c)) if is_line_terminator(c) => {}
                    Some((_, c)) => value.push(c),
                    None => return TokenKind::UnterminatedString,
                },
                Some((_, c)) if is_line_terminator(c) => return TokenKind::UnterminatedString,
                Some((_, c)) => value.push(c),
                None => return TokenKind::UnterminatedString,
            }
        }

        TokenKind::String(self.string_dict.get_or_insert(&value))
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<u32> {
        let rest = self.source.get(self.current_pos..)?;
        let digits: String = rest.chars().take(count).collect();
        if digits.len() != count || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        for _ in 0..count {
            self.advance();
        }
        u32::from_str_radix(&digits, 16).ok()
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut num_str = String::new();

        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => {
                    self.advance();
                    let mut value = 0.0f64;
                    let mut any = false;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        value = value * 16.0 + d as f64;
                        any = true;
                        self.advance();
                    }
                    return if any {
                        TokenKind::Number(value)
                    } else {
                        TokenKind::Invalid('x')
                    };
                }
                Some('0'..='7') => {
                    // legacy octal literal, e.g. 0777
                    let mut value = 0.0f64;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(8)) {
                        value = value * 8.0 + d as f64;
                        self.advance();
                    }
                    return TokenKind::Number(value);
                }
                _ => num_str.push('0'),
            }
        } else if first == '.' {
            num_str.push_str("0.");
        } else {
            num_str.push(first);
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if first != '.' && self.peek() == Some('.') {
            self.advance();
            num_str.push('.');
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    num_str.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_follows = match self.peek_next() {
                Some('0'..='9') => true,
                Some('+' | '-') => self
                    .source
                    .get(self.current_pos..)
                    .and_then(|s| s.chars().nth(2))
                    .is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                self.advance();
                num_str.push('e');
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    num_str.push(sign);
                    self.advance();
                }
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_digit() {
                        num_str.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if num_str.ends_with('.') {
            num_str.push('0');
        }
        TokenKind::Number(num_str.parse::<f64>().unwrap_or(f64::NAN))
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut ident = String::new();
        ident.push(first);

        while let Some(ch) = self.peek() {
            if is_id_part(ch) {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "typeof" => TokenKind::Typeof,
            "instanceof" => TokenKind::Instanceof,
            "in" => TokenKind::In,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "with" => TokenKind::With,
            "debugger" => TokenKind::Debugger,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(self.string_dict.get_or_insert(&ident)),
        }
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_id_part(c: char) -> bool {
    is_id_start(c) || c.is_alphanumeric() || c == '\u{200C}' || c == '\u{200D}'
}
