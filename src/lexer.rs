// Lox Lexer: tokenizes .lox source files

use std::fmt;

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    BangEq,
    Eq,
    EqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Dot,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,

    // Special
    Eof,
}

impl TokenKind {
    /// Keywords that begin a declaration or statement; the parser resumes there
    /// after an error.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Eof {
            write!(f, "end")
        } else {
            write!(f, "'{}'", self.lexeme)
        }
    }
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    start: usize,
    line: usize,
    errors: Vec<SyntaxError>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            line: 1,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        ch
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.pos].iter().collect()
    }

    fn error(&mut self, line: usize, message: String) {
        self.errors.push(SyntaxError::Lex { line, message });
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' { break; }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self) -> Option<TokenKind> {
        let opened_on = self.line;
        let mut result = String::new();
        loop {
            match self.advance() {
                None => {
                    self.error(opened_on, "Unterminated string.".to_string());
                    return None;
                }
                Some('"') => break,
                Some(c) => result.push(c),
            }
        }
        Some(TokenKind::Str(result))
    }

    fn read_number(&mut self) -> Option<TokenKind> {
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek2().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = self.lexeme();
        match text.parse::<f64>() {
            Ok(n) => Some(TokenKind::Number(n)),
            Err(_) => {
                self.error(self.line, format!("Invalid number literal '{}'.", text));
                None
            }
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        while self.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let s = self.lexeme();
        match s.as_str() {
            "and"    => TokenKind::And,
            "class"  => TokenKind::Class,
            "else"   => TokenKind::Else,
            "false"  => TokenKind::False,
            "for"    => TokenKind::For,
            "fun"    => TokenKind::Fun,
            "if"     => TokenKind::If,
            "nil"    => TokenKind::Nil,
            "or"     => TokenKind::Or,
            "print"  => TokenKind::Print,
            "return" => TokenKind::Return,
            "super"  => TokenKind::Super,
            "this"   => TokenKind::This,
            "true"   => TokenKind::True,
            "var"    => TokenKind::Var,
            "while"  => TokenKind::While,
            _        => TokenKind::Ident(s),
        }
    }

    /// Scans the whole source. Every bad character or unterminated string is
    /// recorded; the token stream is only returned if there were none.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<SyntaxError>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            self.start = self.pos;
            let line = self.line;

            let ch = match self.advance() {
                None => {
                    tokens.push(Token { kind: TokenKind::Eof, lexeme: String::new(), line });
                    break;
                }
                Some(c) => c,
            };

            let kind = match ch {
                '"' => self.read_string(),
                c if c.is_ascii_digit() => self.read_number(),
                c if c.is_ascii_alphabetic() || c == '_' => Some(self.read_ident()),
                '+' => Some(TokenKind::Plus),
                '-' => Some(TokenKind::Minus),
                '*' => Some(TokenKind::Star),
                '/' => Some(TokenKind::Slash),
                '.' => Some(TokenKind::Dot),
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                '{' => Some(TokenKind::LBrace),
                '}' => Some(TokenKind::RBrace),
                ',' => Some(TokenKind::Comma),
                ';' => Some(TokenKind::Semicolon),
                '!' => Some(if self.eat('=') { TokenKind::BangEq } else { TokenKind::Bang }),
                '=' => Some(if self.eat('=') { TokenKind::EqEq } else { TokenKind::Eq }),
                '<' => Some(if self.eat('=') { TokenKind::LtEq } else { TokenKind::Lt }),
                '>' => Some(if self.eat('=') { TokenKind::GtEq } else { TokenKind::Gt }),
                other => {
                    self.error(line, format!("Unexpected character '{}'.", other));
                    None
                }
            };

            if let Some(kind) = kind {
                tokens.push(Token { kind, lexeme: self.lexeme(), line });
            }
        }

        if self.errors.is_empty() {
            tracing::debug!(count = tokens.len(), "scanned tokens");
            Ok(tokens)
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .expect("source should scan")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn operators_prefer_the_longest_match() {
        assert_eq!(
            kinds("! != = == < <= > >= / . ;"),
            vec![
                TokenKind::Bang,
                TokenKind::BangEq,
                TokenKind::Eq,
                TokenKind::EqEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Slash,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("var fun_name = fun; print orchid or nil;"),
            vec![
                TokenKind::Var,
                TokenKind::Ident("fun_name".into()),
                TokenKind::Eq,
                TokenKind::Fun,
                TokenKind::Semicolon,
                TokenKind::Print,
                TokenKind::Ident("orchid".into()),
                TokenKind::Or,
                TokenKind::Nil,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds(r#"12 3.25 7. "hi there""#),
            vec![
                TokenKind::Number(12.0),
                TokenKind::Number(3.25),
                TokenKind::Number(7.0),
                TokenKind::Dot,
                TokenKind::Str("hi there".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_are_not_unescaped() {
        assert_eq!(kinds(r#""a\nb""#)[0], TokenKind::Str("a\\nb".into()));
    }

    #[test]
    fn comments_are_discarded_and_lines_tracked() {
        let tokens = Lexer::new("// header\nprint 1; // trailing\n\n\"two\nlines\" x")
            .tokenize()
            .expect("source should scan");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![2, 2, 2, 4, 5, 5]);
    }

    #[test]
    fn lexeme_is_the_source_text() {
        let tokens = Lexer::new("\"quoted\" >=").tokenize().expect("source should scan");
        assert_eq!(tokens[0].lexeme, "\"quoted\"");
        assert_eq!(tokens[1].lexeme, ">=");
    }

    #[test]
    fn collects_every_lex_error() {
        let errors = Lexer::new("var a = @;\nvar b = #;\n\"open").tokenize().unwrap_err();
        assert_eq!(
            errors,
            vec![
                SyntaxError::Lex { line: 1, message: "Unexpected character '@'.".into() },
                SyntaxError::Lex { line: 2, message: "Unexpected character '#'.".into() },
                SyntaxError::Lex { line: 3, message: "Unterminated string.".into() },
            ]
        );
    }
}
