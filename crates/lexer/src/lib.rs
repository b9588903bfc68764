pub mod token;

use token::{Token, TokenKind};

use ss_errors::SsError;
use ss_location::Location;

pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &str) -> Scanner {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    pub fn scan(mut self) -> Result<Vec<Token<'a>>, SsError> {
        let mut tokens = Vec::new();

        self.skip_whitespace();

        while !self.is_at_end() {
            let c = self.advance();

            let token = match c {
                b'(' => self.make_token(TokenKind::LeftParen),
                b')' => self.make_token(TokenKind::RightParen),
                b'{' => self.make_token(TokenKind::LeftBrace),
                b'}' => self.make_token(TokenKind::RightBrace),
                b',' => self.make_token(TokenKind::Comma),
                b'.' => self.make_token(TokenKind::Dot),
                b';' => self.make_token(TokenKind::Semicolon),
                b'+' => self.make_token(TokenKind::Plus),
                b'-' => self.make_token(TokenKind::Minus),
                b'*' => self.make_token(TokenKind::Star),
                b'/' => self.make_token(TokenKind::Slash),
                b'%' => self.make_token(TokenKind::Percent),

                b'!' => {
                    if self.advance_if_match(b'=') {
                        self.make_token(TokenKind::BangEqual)
                    } else {
                        self.make_token(TokenKind::Bang)
                    }
                }

                b'=' => {
                    if self.advance_if_match(b'=') {
                        self.make_token(TokenKind::EqualEqual)
                    } else if self.advance_if_match(b'>') {
                        self.make_token(TokenKind::EqualGreater)
                    } else {
                        self.make_token(TokenKind::Equal)
                    }
                }

                b'<' => {
                    if self.advance_if_match(b'=') {
                        self.make_token(TokenKind::LessEqual)
                    } else {
                        self.make_token(TokenKind::Less)
                    }
                }

                b'>' => {
                    if self.advance_if_match(b'=') {
                        self.make_token(TokenKind::GreaterEqual)
                    } else {
                        self.make_token(TokenKind::Greater)
                    }
                }

                b'"' => self.make_string()?,

                b'0'..=b'9' => self.make_number(),

                c if is_alpha(c) => self.make_identifier(),

                c => {
                    return Err(SsError::compile(
                        Location::new(self.start_line, self.start_column),
                        format!("invalid character '{}'", c as char),
                    ))
                }
            };

            tokens.push(token);

            self.skip_whitespace();
        }

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;
        tokens.push(self.make_token(TokenKind::EndOfFile));

        Ok(tokens)
    }

    fn make_token(&self, kind: TokenKind) -> Token<'a> {
        Token::new(
            kind,
            &self.source[self.start..self.current],
            Location::new(self.start_line, self.start_column),
        )
    }

    fn make_string(&mut self) -> Result<Token<'a>, SsError> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
                self.column = 0;
            }

            self.advance();
        }

        if self.is_at_end() {
            return Err(self.error("unterminated string".to_owned()));
        }

        // the lexeme is the contents, quotes excluded
        self.start += 1;
        self.start_column += 1;

        let token = self.make_token(TokenKind::String);

        // step past the closing '"'
        self.advance();

        Ok(token)
    }

    fn make_number(&mut self) -> Token<'a> {
        while is_digit(self.peek()) {
            self.advance();
        }

        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.advance();

            while is_digit(self.peek()) {
                self.advance();
            }
        }

        self.make_token(TokenKind::Number)
    }

    fn make_identifier(&mut self) -> Token<'a> {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }

        let lexeme = &self.source[self.start..self.current];

        self.make_token(TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier))
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }

                b'\n' => {
                    self.line += 1;
                    self.column = 0;
                    self.advance();
                }

                b'#' => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }

                _ => break,
            }
        }

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    #[inline]
    fn peek(&self) -> u8 {
        self.source.as_bytes().get(self.current).copied().unwrap_or(0)
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        self.source.as_bytes().get(self.current + 1).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();

        self.current += 1;
        self.column += 1;

        c
    }

    fn advance_if_match(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }

        self.advance();

        true
    }

    fn error(&self, content: String) -> SsError {
        SsError::compile(Location::new(self.line, self.column), content)
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'@'
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan()
            .unwrap()
            .iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scanning_ends_with_exactly_one_eof() {
        for source in ["", "   ", "# just a comment", "1 + 2;"] {
            let tokens = Scanner::new(source).scan().unwrap();

            let eofs = tokens
                .iter()
                .filter(|token| token.kind == TokenKind::EndOfFile)
                .count();

            assert_eq!(eofs, 1);
            assert_eq!(tokens.last().unwrap().kind, TokenKind::EndOfFile);
        }
    }

    #[test]
    fn single_character_tokens() {
        assert_eq!(
            kinds("( ) { } , . ; + - * / %"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn one_or_two_character_tokens() {
        assert_eq!(
            kinds("! != = == => < <= > >="),
            vec![
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::EqualGreater,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn keywords_are_recognized() {
        let source = "and break class continue else false fn for if let \
                      load loadr loop match nil or print return true while";

        assert_eq!(
            kinds(source),
            vec![
                TokenKind::And,
                TokenKind::Break,
                TokenKind::Class,
                TokenKind::Continue,
                TokenKind::Else,
                TokenKind::False,
                TokenKind::Fn,
                TokenKind::For,
                TokenKind::If,
                TokenKind::Let,
                TokenKind::Load,
                TokenKind::Loadr,
                TokenKind::Loop,
                TokenKind::Match,
                TokenKind::Nil,
                TokenKind::Or,
                TokenKind::Print,
                TokenKind::Return,
                TokenKind::True,
                TokenKind::While,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn keyword_prefixes_are_identifiers() {
        assert_eq!(
            kinds("lets loading fortune @tmp _x"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn number_lexemes() {
        let tokens = Scanner::new("1 2.5 100").scan().unwrap();

        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].lexeme, "2.5");
        assert_eq!(tokens[2].lexeme, "100");
    }

    #[test]
    fn number_followed_by_bare_dot_is_not_fractional() {
        assert_eq!(
            kinds("1."),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::EndOfFile]
        );
    }

    #[test]
    fn string_lexeme_excludes_quotes() {
        let tokens = Scanner::new("\"hello\"").scan().unwrap();

        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "hello");
    }

    #[test]
    fn strings_may_span_lines() {
        let tokens = Scanner::new("\"a\nb\" x").scan().unwrap();

        assert_eq!(tokens[0].lexeme, "a\nb");
        assert_eq!(tokens[1].location.line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Scanner::new("\"oops").scan().unwrap_err();

        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("# a comment\n1; # trailing"),
            vec![TokenKind::Number, TokenKind::Semicolon, TokenKind::EndOfFile]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = Scanner::new("let x = 1;\nprint x;").scan().unwrap();

        assert_eq!(tokens[0].location, Location::new(1, 1));
        assert_eq!(tokens[1].location, Location::new(1, 5));
        assert_eq!(tokens[2].location, Location::new(1, 7));

        let print = tokens.iter().find(|t| t.kind == TokenKind::Print).unwrap();
        assert_eq!(print.location, Location::new(2, 1));
    }

    #[test]
    fn relexing_the_joined_lexemes_preserves_the_kinds() {
        let source = "let x = 1; while x < 5 { x = x + 1; } print !x == nil;";

        let tokens = Scanner::new(source).scan().unwrap();

        let joined = tokens
            .iter()
            .map(|token| token.lexeme)
            .collect::<Vec<_>>()
            .join(" ");

        let relexed = Scanner::new(&joined).scan().unwrap();

        assert_eq!(
            tokens.iter().map(|token| token.kind).collect::<Vec<_>>(),
            relexed.iter().map(|token| token.kind).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn invalid_character_reports_position() {
        let err = Scanner::new("let $ = 1;").scan().unwrap_err();

        assert_eq!(err.to_string(), "1:5 -> invalid character '$'");
    }
}
