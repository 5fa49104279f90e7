use serde::{Deserialize, Serialize};

use crate::cpp::PreprocVars;
use crate::grammar::Dialect;

/// How to read one header: the names to treat as defined, and which declaration dialect follows.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dialect: Dialect,
    /// Seed `__cplusplus`, as when the header is included from C++.
    pub cplusplus: bool,
    pub defines: Vec<String>,
}

impl Config {
    pub fn vars(&self) -> PreprocVars {
        let mut vars = if self.cplusplus { PreprocVars::cplusplus() } else { PreprocVars::new() };
        for name in &self.defines { vars.define(name); }
        vars
    }
}
