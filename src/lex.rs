use std::fmt;

use crate::error::{Error, Position};
use crate::grammar::Grammar;

/// Declaration tokens over flattened header text.
///
/// Restarting means constructing a new `Tokens`; a clone continues from the same point.
#[derive(Clone)]
pub struct Tokens<'s> { source: &'s str, position: Position, grammar: Grammar, done: bool }

/// A declaration token, borrowing its spelling from the source buffer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Token<'s> { pub kind: Kind, pub text: &'s str, pub position: Position }

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    EndOfFile,

    Comment,

    Identifier, Integer,

    Typedef, Struct, Enum, Const,

    LeftBrace, RightBrace, LeftBracket, RightBracket, LeftParen, RightParen,
    Semi, Comma, Colon, Star, Eq, Ellipsis,
}

impl<'s> Tokens<'s> {
    pub fn new(source: &'s str, grammar: Grammar) -> Tokens<'s> {
        Tokens { source, position: Position::START, grammar, done: false }
    }

    /// Consume whitespace. Comments are tokens in their own right.
    pub fn whitespace(&mut self) {
        let len = self.rest().bytes()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0B' | b'\x0C'))
            .count();
        self.bump(len);
    }

    /// Consume a token. Whitespace must be skipped first with [`Tokens::whitespace`].
    pub fn token(&mut self) -> Result<Token<'s>, Error> {
        let rest = self.rest().as_bytes();
        let (kind, len) = match *rest {
            [] => { (Kind::EndOfFile, 0) }

            [b'/', b'/', ..] => {
                (Kind::Comment, rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len()))
            }
            [b'/', b'*', ..] => match rest[2..].windows(2).position(|w| w == b"*/") {
                Some(end) => { (Kind::Comment, 2 + end + 2) }
                None => { return Err(self.error(2)); }
            }

            [b'a'..=b'z' | b'A'..=b'Z' | b'_', ..] => {
                let len = rest.iter().take_while(|&&b| is_identifier(b)).count();
                (self.grammar.keyword(&self.rest()[..len]), len)
            }

            [b'0', b'x' | b'X', ..] => {
                let digits = rest[2..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
                if digits == 0 { return Err(self.error(2)); }
                (Kind::Integer, 2 + digits)
            }
            [b'0'..=b'9', ..] => {
                (Kind::Integer, rest.iter().take_while(|b| b.is_ascii_digit()).count())
            }
            [b'-' | b'+', b'0', b'x' | b'X', ..] => {
                let digits = rest[3..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
                if digits == 0 { return Err(self.error(3)); }
                (Kind::Integer, 3 + digits)
            }
            [b'-' | b'+', b'0'..=b'9', ..] => {
                (Kind::Integer, 1 + rest[1..].iter().take_while(|b| b.is_ascii_digit()).count())
            }

            [b'.', b'.', b'.', ..] => { (Kind::Ellipsis, 3) }

            [b'{', ..] => { (Kind::LeftBrace, 1) }
            [b'}', ..] => { (Kind::RightBrace, 1) }
            [b'[', ..] => { (Kind::LeftBracket, 1) }
            [b']', ..] => { (Kind::RightBracket, 1) }
            [b'(', ..] => { (Kind::LeftParen, 1) }
            [b')', ..] => { (Kind::RightParen, 1) }

            [b';', ..] => { (Kind::Semi, 1) }
            [b',', ..] => { (Kind::Comma, 1) }
            [b':', ..] => { (Kind::Colon, 1) }
            [b'*', ..] => { (Kind::Star, 1) }
            [b'=', ..] => { (Kind::Eq, 1) }

            _ => {
                let len = self.rest().chars().next().map_or(1, char::len_utf8);
                return Err(self.error(len));
            }
        };

        let text = &self.rest()[..len];
        let position = self.position;
        self.bump(len);
        Ok(Token { kind, text, position })
    }

    fn rest(&self) -> &'s str { &self.source[self.position.offset..] }

    fn bump(&mut self, len: usize) {
        let text = &self.rest()[..len];
        self.position = self.position.advance(text);
    }

    fn error(&self, len: usize) -> Error {
        Error::Lex { position: self.position, found: self.rest()[..len].to_string() }
    }
}

impl<'s> Iterator for Tokens<'s> {
    type Item = Result<Token<'s>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None; }

        self.whitespace();
        match self.token() {
            Ok(token) if token.kind == Kind::EndOfFile => { self.done = true; None }
            Ok(token) => { Some(Ok(token)) }
            Err(error) => { self.done = true; Some(Err(error)) }
        }
    }
}

pub(crate) fn is_identifier(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_')
}

impl Kind {
    /// How the grammar refers to this kind of token in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Kind::EndOfFile => { "end of file" }
            Kind::Comment => { "comment" }
            Kind::Identifier => { "identifier" }
            Kind::Integer => { "integer literal" }
            Kind::Typedef => { "'typedef'" }
            Kind::Struct => { "'struct'" }
            Kind::Enum => { "'enum'" }
            Kind::Const => { "'const'" }
            Kind::LeftBrace => { "'{'" }
            Kind::RightBrace => { "'}'" }
            Kind::LeftBracket => { "'['" }
            Kind::RightBracket => { "']'" }
            Kind::LeftParen => { "'('" }
            Kind::RightParen => { "')'" }
            Kind::Semi => { "';'" }
            Kind::Comma => { "','" }
            Kind::Colon => { "':'" }
            Kind::Star => { "'*'" }
            Kind::Eq => { "'='" }
            Kind::Ellipsis => { "'...'" }
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Identifier => { write!(f, "identifier '{}'", self.text) }
            Kind::Integer => { write!(f, "integer literal {}", self.text) }
            kind => { f.write_str(kind.describe()) }
        }
    }
}
