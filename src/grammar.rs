use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::lex::Kind;

/// The header dialects the declaration grammar understands.
///
/// Both share one grammar; a dialect only switches parts of it on or off via [`Grammar`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `gdnative_interface.h`: single indirection, no function-typed arguments.
    GdNative,
    /// `gdextension_interface.h`: double indirection and nested function pointer arguments.
    #[default]
    GdExtension,
}

/// Grammar capabilities and keyword table for one dialect.
#[derive(Copy, Clone, Debug)]
pub struct Grammar {
    pub keywords: &'static [(&'static str, Kind)],
    /// The largest number of `*` a primitive type may carry.
    pub max_indirection: u8,
    /// Whether an argument may itself be a function pointer, `void (*cb)(void *)`.
    pub function_arguments: bool,
}

static KEYWORDS: [(&str, Kind); 4] = [
    ("typedef", Kind::Typedef),
    ("struct", Kind::Struct),
    ("enum", Kind::Enum),
    ("const", Kind::Const),
];

impl Dialect {
    pub fn grammar(self) -> Grammar {
        match self {
            Dialect::GdNative => {
                Grammar { keywords: &KEYWORDS, max_indirection: 1, function_arguments: false }
            }
            Dialect::GdExtension => {
                Grammar { keywords: &KEYWORDS, max_indirection: 2, function_arguments: true }
            }
        }
    }
}

impl Grammar {
    /// Classify an identifier-shaped word, which is either a reserved word or an identifier.
    pub fn keyword(&self, word: &str) -> Kind {
        self.keywords.iter()
            .find(|&&(keyword, _)| keyword == word)
            .map_or(Kind::Identifier, |&(_, kind)| kind)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::GdNative => { f.write_str("gdnative") }
            Dialect::GdExtension => { f.write_str("gdextension") }
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Dialect, String> {
        match s {
            "gdnative" => { Ok(Dialect::GdNative) }
            "gdextension" => { Ok(Dialect::GdExtension) }
            _ => { Err(format!("unknown dialect {:?}, expected gdnative or gdextension", s)) }
        }
    }
}
