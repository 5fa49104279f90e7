use std::fmt;

use thiserror::Error;

/// A location in a header buffer. Lines and columns start at 1; columns count characters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Position { pub offset: usize, pub line: usize, pub column: usize }

impl Position {
    pub const START: Position = Position { offset: 0, line: 1, column: 1 };

    /// The position reached after `text`, which starts at `self`.
    pub fn advance(self, text: &str) -> Position {
        let Position { mut line, mut column, .. } = self;
        for c in text.chars() {
            if c == '\n' { line += 1; column = 1; } else { column += 1; }
        }
        Position { offset: self.offset + text.len(), line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("{position}: unrecognized input {found:?}")]
    Lex { position: Position, found: String },

    #[error("{position}: {kind}")]
    Structural { position: Position, kind: Structural },

    #[error("{position}: expected {expected}, found {found}")]
    Grammar { position: Position, found: String, expected: String },
}

/// Malformed directive structure.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Structural {
    #[error("#endif without a matching #ifdef or #ifndef")]
    UnmatchedEndif,

    #[error("#{directive} {name} is never closed by #endif")]
    Unterminated { directive: &'static str, name: String },

    #[error("#{directive} is missing its argument")]
    MissingArgument { directive: &'static str },

    #[error("# is followed by text rather than a directive name")]
    MissingName,

    #[error("unsupported directive #{directive}")]
    Unsupported { directive: String },

    #[error("unexpected text after #{directive}")]
    TrailingText { directive: &'static str },
}

impl Error {
    pub fn position(&self) -> Position {
        match *self {
            Error::Lex { position, .. } => { position }
            Error::Structural { position, .. } => { position }
            Error::Grammar { position, .. } => { position }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Position, Structural};

    #[test]
    fn advance() {
        let p = Position::START.advance("ab\ncd");
        assert_eq!(p, Position { offset: 5, line: 2, column: 3 });

        let p = p.advance("é");
        assert_eq!(p, Position { offset: 7, line: 2, column: 4 });
    }

    #[test]
    fn display() {
        let position = Position { offset: 10, line: 3, column: 7 };
        let error = Error::Grammar { position, found: "'['".into(), expected: "';'".into() };
        assert_eq!(error.to_string(), "3:7: expected ';', found '['");

        let error = Error::Structural { position, kind: Structural::UnmatchedEndif };
        assert_eq!(error.to_string(), "3:7: #endif without a matching #ifdef or #ifndef");
        assert_eq!(error.position(), position);
    }
}
