use std::mem;

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::error::{Error, Position, Structural};
use crate::lex::is_identifier;

/// Conditional compilation - `#ifdef`/`#ifndef` blocks, `#define` and `#include`, evaluated
/// against a set of defined names. Names are only ever tested for presence, never expanded.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Directives<'s> { pub directives: Vec<Directive<'s>> }

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Directive<'s> {
    Ifndef { name: &'s str, directives: Vec<Directive<'s>> },
    Ifdef { name: &'s str, directives: Vec<Directive<'s>> },
    Define { name: &'s str },
    Include { name: &'s str, angled: bool },
    Source(&'s str),
}

/// The names considered defined during evaluation, in definition order.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PreprocVars { names: IndexSet<String> }

/// Directive-stage tokens: whole directive lines and the source spans between them.
pub struct Tokens<'s> { source: &'s str, position: Position }

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Token<'s> { pub kind: Kind<'s>, pub position: Position }

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Kind<'s> {
    EndOfFile,
    /// Text from its first significant character up to the next directive line.
    Source(&'s str),
    /// A directive line. `rest` is whatever follows the argument, less comments.
    Directive { name: &'s str, argument: Option<&'s str>, rest: &'s str },
}

impl PreprocVars {
    pub const CPLUSPLUS: &'static str = "__cplusplus";

    pub fn new() -> PreprocVars { PreprocVars::default() }

    /// The set a C++ compiler starts from.
    pub fn cplusplus() -> PreprocVars {
        let mut vars = PreprocVars::new();
        vars.define(PreprocVars::CPLUSPLUS);
        vars
    }

    pub fn define(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    pub fn is_defined(&self, name: &str) -> bool { self.names.contains(name) }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ { self.names.iter().map(String::as_str) }
}

impl<S: AsRef<str>> FromIterator<S> for PreprocVars {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> PreprocVars {
        let mut vars = PreprocVars::new();
        for name in iter { vars.define(name.as_ref()); }
        vars
    }
}

impl<'s> Directives<'s> {
    /// Build the directive tree, keeping the blocks still waiting for `#endif` on a stack.
    pub fn parse(source: &'s str) -> Result<Directives<'s>, Error> {
        let mut tokens = Tokens::new(source);
        let mut tree = Directives { directives: Vec::default() };
        let mut open: Vec<Block<'s>> = Vec::default();
        loop {
            let Token { kind, position } = tokens.token()?;
            let directive = match kind {
                Kind::EndOfFile => match open.pop() {
                    None => { break; }
                    Some(block) => {
                        let name = block.name.to_string();
                        let kind = Structural::Unterminated { directive: block.directive, name };
                        return Err(Error::Structural { position: block.position, kind });
                    }
                }

                Kind::Source(text) => { Directive::Source(text) }

                // The null directive.
                Kind::Directive { name: "", argument: None, rest: "" } => { continue; }
                Kind::Directive { name: "", .. } => {
                    return Err(Error::Structural { position, kind: Structural::MissingName });
                }

                Kind::Directive { name: "endif", argument, rest } => {
                    let block = match open.pop() {
                        Some(block) => { block }
                        None => {
                            let kind = Structural::UnmatchedEndif;
                            return Err(Error::Structural { position, kind });
                        }
                    };
                    if argument.is_some() || !rest.is_empty() {
                        let kind = Structural::TrailingText { directive: "endif" };
                        return Err(Error::Structural { position, kind });
                    }
                    block.close()
                }

                Kind::Directive { name: directive @ ("ifndef" | "ifdef"), argument, rest } => {
                    let directive = if directive == "ifndef" { "ifndef" } else { "ifdef" };
                    let name = name_argument(position, directive, argument, rest)?;
                    open.push(Block { position, directive, name, directives: Vec::default() });
                    continue;
                }

                Kind::Directive { name: "define", argument, .. } => {
                    // The replacement list is irrelevant to presence checks.
                    let name = name_argument(position, "define", argument, "")?;
                    Directive::Define { name }
                }

                Kind::Directive { name: "include", argument, rest } => {
                    // The directive lexer only produces these with their closing delimiter.
                    let (name, angled) = match argument {
                        Some(argument) if argument.starts_with(['<', '"']) => {
                            (&argument[1..argument.len() - 1], argument.starts_with('<'))
                        }
                        _ => {
                            let kind = Structural::MissingArgument { directive: "include" };
                            return Err(Error::Structural { position, kind });
                        }
                    };
                    if !rest.is_empty() {
                        let kind = Structural::TrailingText { directive: "include" };
                        return Err(Error::Structural { position, kind });
                    }
                    Directive::Include { name, angled }
                }

                Kind::Directive { name, .. } => {
                    let kind = Structural::Unsupported { directive: name.to_string() };
                    return Err(Error::Structural { position, kind });
                }
            };
            match open.last_mut() {
                Some(block) => { block.directives.push(directive); }
                None => { tree.directives.push(directive); }
            }
        }

        debug!(directives = tree.directives.len(), "parsed directives");
        Ok(tree)
    }

    /// Flatten the tree: every directive's output followed by a newline.
    ///
    /// Defines seen along the way go into a private copy of `vars`.
    pub fn eval(&self, vars: &PreprocVars) -> String {
        let mut vars = vars.clone();
        let mut output = String::new();

        // One iterator per taken block, innermost last.
        let mut groups = vec![self.directives.iter()];
        while let Some(group) = groups.last_mut() {
            let directive = match group.next() {
                Some(directive) => { directive }
                None => {
                    groups.pop();
                    if !groups.is_empty() { output.push('\n'); }
                    continue;
                }
            };
            match *directive {
                Directive::Source(text) => { output.push_str(text); }
                Directive::Define { name } => { vars.define(name); }
                Directive::Include { .. } => {}
                Directive::Ifndef { name, ref directives } => {
                    let taken = !vars.is_defined(name);
                    trace!(name, taken, "#ifndef");
                    if taken { groups.push(directives.iter()); continue; }
                }
                Directive::Ifdef { name, ref directives } => {
                    let taken = vars.is_defined(name);
                    trace!(name, taken, "#ifdef");
                    if taken { groups.push(directives.iter()); continue; }
                }
            }
            output.push('\n');
        }
        output
    }
}

impl Drop for Directives<'_> {
    fn drop(&mut self) { drop_nested(mem::take(&mut self.directives)); }
}

/// Take nested blocks apart one level at a time, keeping drops off the call stack.
fn drop_nested(mut pending: Vec<Directive<'_>>) {
    while let Some(directive) = pending.pop() {
        match directive {
            Directive::Ifndef { directives, .. } | Directive::Ifdef { directives, .. } => {
                pending.extend(directives);
            }
            _ => {}
        }
    }
}

/// An `#ifdef` or `#ifndef` whose `#endif` has not been seen yet.
struct Block<'s> {
    position: Position,
    directive: &'static str,
    name: &'s str,
    directives: Vec<Directive<'s>>,
}

impl<'s> Block<'s> {
    fn close(mut self) -> Directive<'s> {
        let (name, directives) = (self.name, mem::take(&mut self.directives));
        match self.directive {
            "ifndef" => { Directive::Ifndef { name, directives } }
            _ => { Directive::Ifdef { name, directives } }
        }
    }
}

impl Drop for Block<'_> {
    fn drop(&mut self) { drop_nested(mem::take(&mut self.directives)); }
}

fn name_argument<'s>(
    position: Position, directive: &'static str, argument: Option<&'s str>, rest: &'s str
) -> Result<&'s str, Error> {
    let name = match argument {
        Some(name) if !name.starts_with(|c: char| c.is_ascii_digit() || c == '<' || c == '"') => {
            name
        }
        _ => {
            let kind = Structural::MissingArgument { directive };
            return Err(Error::Structural { position, kind });
        }
    };
    if !rest.is_empty() {
        let kind = Structural::TrailingText { directive };
        return Err(Error::Structural { position, kind });
    }
    Ok(name)
}

impl<'s> Tokens<'s> {
    pub fn new(source: &'s str) -> Tokens<'s> {
        Tokens { source, position: Position::START }
    }

    pub fn token(&mut self) -> Result<Token<'s>, Error> {
        let rest = self.rest();
        match trivia(rest) {
            Ok(len) => { self.bump(len); }
            Err(offset) => {
                self.bump(offset);
                return Err(Error::Lex { position: self.position, found: "/*".to_string() });
            }
        }

        let rest = self.rest();
        let position = self.position;
        let kind = if rest.is_empty() {
            Kind::EndOfFile
        } else if rest.starts_with('#') {
            let end = line_end(rest);
            self.bump(if end < rest.len() { end + 1 } else { end });
            directive(&rest[..end])
        } else {
            let len = directive_start(rest);
            self.bump(len);
            Kind::Source(&rest[..len])
        };
        Ok(Token { kind, position })
    }

    fn rest(&self) -> &'s str { &self.source[self.position.offset..] }

    fn bump(&mut self, len: usize) {
        let text = &self.rest()[..len];
        self.position = self.position.advance(text);
    }
}

/// Split a directive line into its name, its argument, and the rest.
fn directive(line: &str) -> Kind<'_> {
    let rest = space(&line[1..]);
    let len = rest.bytes().take_while(|&b| is_identifier(b)).count();
    let (name, rest) = rest.split_at(len);

    let rest = space(rest);
    let len = match *rest.as_bytes() {
        [b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'0'..=b'9', ..] => {
            rest.bytes().take_while(|&b| is_identifier(b)).count()
        }
        [b'<', ..] => { rest.find('>').map_or(0, |end| end + 1) }
        [b'"', ..] => { rest[1..].find('"').map_or(0, |end| end + 2) }
        _ => { 0 }
    };
    let argument = if len > 0 { Some(&rest[..len]) } else { None };

    let rest = space(&rest[len..]).trim_end();
    Kind::Directive { name, argument, rest }
}

/// Skip blanks, comments and line continuations within a directive line.
fn space(mut text: &str) -> &str {
    loop {
        let bytes = text.as_bytes();
        let len = match *bytes {
            [b' ' | b'\t' | b'\r' | b'\x0B' | b'\x0C', ..] => { 1 }
            [b'\\', b'\n', ..] => { 2 }
            [b'\\', b'\r', b'\n', ..] => { 3 }
            [b'/', b'*', ..] => { text[2..].find("*/").map_or(bytes.len(), |end| end + 4) }
            [b'/', b'/', ..] => { bytes.len() }
            _ => { return text; }
        };
        text = &text[len..];
    }
}

/// The length of whitespace and comments at the start of `text`, or the offset of an
/// unterminated block comment.
fn trivia(text: &str) -> Result<usize, usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    loop {
        match bytes[i..] {
            [b' ' | b'\t' | b'\r' | b'\n' | b'\x0B' | b'\x0C', ..] => { i += 1; }
            [b'/', b'*', ..] => match text[i + 2..].find("*/") {
                Some(end) => { i += end + 4; }
                None => { return Err(i); }
            }
            [b'/', b'/', ..] => {
                i += bytes[i..].iter().position(|&b| b == b'\n').unwrap_or(bytes.len() - i);
            }
            _ => { return Ok(i); }
        }
    }
}

/// The end of the logical line starting at `text`, not including its newline.
fn line_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i..] {
            [b'\n', ..] => { return i; }
            [b'\\', b'\n', ..] => { i += 2; }
            [b'\\', b'\r', b'\n', ..] => { i += 3; }
            [b'/', b'*', ..] => {
                i += text[i + 2..].find("*/").map_or(bytes.len() - i, |end| end + 4);
            }
            [b'/', b'/', ..] => {
                i += bytes[i..].iter().position(|&b| b == b'\n').unwrap_or(bytes.len() - i);
            }
            _ => { i += 1; }
        }
    }
    bytes.len()
}

/// The offset of the next `#` that begins a directive line, or the length of `text`.
///
/// `text` itself starts on a line that is not a directive.
fn directive_start(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut line_start = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i..] {
            [b'\n', ..] => { line_start = true; i += 1; }
            [b' ' | b'\t' | b'\r' | b'\x0B' | b'\x0C', ..] => { i += 1; }
            [b'/', b'*', ..] => {
                i += text[i + 2..].find("*/").map_or(bytes.len() - i, |end| end + 4);
            }
            [b'/', b'/', ..] => {
                i += bytes[i..].iter().position(|&b| b == b'\n').unwrap_or(bytes.len() - i);
            }
            [b'#', ..] if line_start => { return i; }
            _ => { line_start = false; i += 1; }
        }
    }
    bytes.len()
}
