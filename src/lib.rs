pub mod error;
pub mod lex;
pub mod cpp;
pub mod grammar;
pub mod parse;
pub mod syntax;
pub mod config;

pub use crate::config::Config;
pub use crate::cpp::PreprocVars;
pub use crate::error::{Error, Position};
pub use crate::grammar::Dialect;
pub use crate::parse::parse_declarations;
pub use crate::syntax::HeaderFile;

/// Resolve conditional compilation against `vars`, producing flattened declaration text.
pub fn evaluate_preprocessor(source: &str, vars: &PreprocVars) -> Result<String, Error> {
    let directives = cpp::Directives::parse(source)?;
    Ok(directives.eval(vars))
}

/// Both stages in sequence, as configured.
pub fn parse_header(source: &str, config: &Config) -> Result<HeaderFile, Error> {
    let text = evaluate_preprocessor(source, &config.vars())?;
    parse_declarations(&text, config.dialect)
}
