//! Lexer for XL source text.
//!
//! Turns a UTF-8 byte string into positioned tokens. Whitespace and `//`
//! line comments are discarded but advance the position; scanning is
//! longest-match first, so `>>>` wins over `>>` wins over `>`. An
//! identifier whose lexeme is a reserved word is reclassified to the
//! matching keyword kind.

/// Token kinds. Keywords get their own kind so the parser never compares
/// lexemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Var,
    Func,
    If,
    Else,
    While,
    For,
    Return,
    New,
    Import,
    Ident,
    Number,
    Str,
    Op,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
}

impl TokenKind {
    /// Human name used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Var => "'var'",
            TokenKind::Func => "'func'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::Return => "'return'",
            TokenKind::New => "'new'",
            TokenKind::Import => "'import'",
            TokenKind::Ident => "identifier",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Op => "operator",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
        }
    }
}

/// A token with source position information. `line` is 1-based, `column`
/// 0-based, matching compiler diagnostics. For `Str` tokens `text` holds
/// the decoded literal (escapes resolved, quotes stripped); for everything
/// else it is the raw lexeme.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// Lexing failure at a specific position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    UnexpectedChar { ch: char, line: usize, column: usize },
    UnterminatedString { line: usize, column: usize },
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, line, column } => {
                write!(f, "unexpected character '{}' at line {}, column {}", ch, line, column)
            }
            LexError::UnterminatedString { line, column } => {
                write!(f, "unterminated string literal at line {}, column {}", line, column)
            }
        }
    }
}

impl std::error::Error for LexError {}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("func", TokenKind::Func),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("return", TokenKind::Return),
    ("new", TokenKind::New),
    ("import", TokenKind::Import),
];

/// Multi-character operators, longest first so prefixes never shadow them.
const MULTI_OPS: &[&str] = &[">>>", "&&", "||", "==", "!=", ">=", "<=", ">>", "<<"];

const SINGLE_OPS: &[char] = &['+', '-', '*', '/', '>', '<', '=', '^', '&', '|'];

/// Tokenize a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            match ch {
                '\n' => {
                    self.bump();
                    self.line += 1;
                    self.column = 0;
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_comment(),
                '"' => tokens.push(self.string_literal()?),
                '0'..='9' => tokens.push(self.number()),
                c if c.is_ascii_alphabetic() || c == '_' => tokens.push(self.ident_or_keyword()),
                _ => {
                    if let Some(tok) = self.operator_or_punct() {
                        tokens.push(tok);
                    } else {
                        return Err(LexError::UnexpectedChar {
                            ch,
                            line: self.line,
                            column: self.column,
                        });
                    }
                }
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        self.column += 1;
        Some(ch)
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn token(&self, kind: TokenKind, text: String, line: usize, column: usize) -> Token {
        Token { kind, text, line, column }
    }

    fn string_literal(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(LexError::UnterminatedString { line, column });
            };
            match ch {
                '"' => break,
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(LexError::UnterminatedString { line, column });
                    };
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        // Unknown escapes pass through verbatim.
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\n' => {
                    self.line += 1;
                    self.column = 0;
                    value.push('\n');
                }
                other => value.push(other),
            }
        }
        Ok(self.token(TokenKind::Str, value, line, column))
    }

    fn number(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.take_into(&mut text);
            self.take_into(&mut text);
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.take_into(&mut text);
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.take_into(&mut text);
            }
        }
        self.token(TokenKind::Number, text, line, column)
    }

    fn ident_or_keyword(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.take_into(&mut text);
        }
        let kind = KEYWORDS
            .iter()
            .find(|(word, _)| *word == text)
            .map(|(_, kind)| *kind)
            .unwrap_or(TokenKind::Ident);
        self.token(kind, text, line, column)
    }

    /// Consume the current character into `text` (no-op at end of input).
    fn take_into(&mut self, text: &mut String) {
        if let Some(ch) = self.bump() {
            text.push(ch);
        }
    }

    fn operator_or_punct(&mut self) -> Option<Token> {
        let (line, column) = (self.line, self.column);
        for multi in MULTI_OPS {
            if self.lookahead_matches(multi) {
                for _ in 0..multi.len() {
                    self.bump();
                }
                return Some(self.token(TokenKind::Op, (*multi).to_string(), line, column));
            }
        }
        let ch = self.peek()?;
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            c if SINGLE_OPS.contains(&c) => TokenKind::Op,
            _ => return None,
        };
        self.bump();
        Some(self.token(kind, ch.to_string(), line, column))
    }

    fn lookahead_matches(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, expected)| self.peek_at(i) == Some(expected))
    }
}
