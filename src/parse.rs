use tracing::{debug, trace};

use crate::error::{Error, Position};
use crate::grammar::{Dialect, Grammar};
use crate::lex::{self, Kind, Token};
use crate::syntax::{
    Argument, EnumInit, EnumValue, Expr, FunctionType, HeaderFile, PrimitiveType, StructField,
    StructFunction, StructVariable, Type, TypedefAlias, TypedefEnum, TypedefFunction,
    TypedefStruct,
};

/// Parse flattened header text into its declarations.
pub fn parse_declarations(source: &str, dialect: Dialect) -> Result<HeaderFile, Error> {
    let grammar = dialect.grammar();
    let tokens = lex::Tokens::new(source, grammar).collect::<Result<Vec<_>, _>>()?;
    let end = Position::START.advance(source);

    let mut parser = Parser { tokens, next: 0, end, grammar, depth: 0 };
    let header = parser.header_file()?;
    debug!(declarations = header.exprs.len(), %dialect, "parsed declarations");
    Ok(header)
}

/// Recursive descent over a buffered token list.
///
/// Comments are significant only between top-level declarations and after a struct function
/// field; everywhere else they are skipped.
struct Parser<'s> {
    tokens: Vec<Token<'s>>,
    next: usize,
    end: Position,
    grammar: Grammar,
    /// Function pointer arguments currently open around the cursor.
    depth: usize,
}

/// How deeply function pointer arguments may nest inside one another.
const MAX_NESTING: usize = 64;

impl<'s> Parser<'s> {
    fn header_file(&mut self) -> Result<HeaderFile, Error> {
        let mut exprs = Vec::default();
        while let Some(&token) = self.tokens.get(self.next) {
            let expr = match token.kind {
                Kind::Comment => { self.next += 1; Expr::Comment(token.text.to_string()) }
                _ => { self.expr()? }
            };
            trace!(name = expr.name().unwrap_or_default(), "declaration");
            exprs.push(expr);
        }
        Ok(HeaderFile { exprs })
    }

    fn expr(&mut self) -> Result<Expr, Error> {
        self.expect(Kind::Typedef, "'typedef' or a comment")?;
        let expr = match self.peek() {
            Some(Kind::Enum) => { Expr::Enum(self.typedef_enum()?) }
            Some(Kind::Struct) => { Expr::Struct(self.typedef_struct()?) }
            _ => {
                let ty = self.primitive_type()?;
                if self.peek() == Some(Kind::LeftParen) {
                    let name = self.function_name()?;
                    let arguments = self.arguments()?;
                    Expr::Function(TypedefFunction { return_type: ty, name, arguments })
                } else {
                    let name = self.identifier("a typedef name")?;
                    Expr::Alias(TypedefAlias { ty, name })
                }
            }
        };
        self.expect(Kind::Semi, "';'")?;
        Ok(expr)
    }

    fn typedef_enum(&mut self) -> Result<TypedefEnum, Error> {
        self.expect(Kind::Enum, "'enum'")?;
        self.expect(Kind::LeftBrace, "'{'")?;

        let mut values = Vec::default();
        while self.peek() != Some(Kind::RightBrace) {
            let name = self.identifier("an enumerator")?;
            let value = if self.eat(Kind::Eq) { self.enum_init()? } else { EnumInit::Implicit };
            values.push(EnumValue { name, value });
            if !self.eat(Kind::Comma) { break; }
        }
        self.expect(Kind::RightBrace, "',' or '}'")?;

        let name = match self.peek() {
            Some(Kind::Identifier) => { Some(self.identifier("an enum name")?) }
            _ => { None }
        };
        Ok(TypedefEnum { values, name })
    }

    fn enum_init(&mut self) -> Result<EnumInit, Error> {
        let expected = "an integer or an enumerator name";
        match self.peek() {
            Some(Kind::Integer) => {
                let token = self.expect(Kind::Integer, expected)?;
                Ok(EnumInit::Int(integer(token)?))
            }
            Some(Kind::Identifier) => { Ok(EnumInit::Ref(self.identifier(expected)?)) }
            _ => { Err(self.error(expected)) }
        }
    }

    fn typedef_struct(&mut self) -> Result<TypedefStruct, Error> {
        self.expect(Kind::Struct, "'struct'")?;
        self.expect(Kind::LeftBrace, "'{'")?;

        let mut fields = Vec::default();
        while self.peek() != Some(Kind::RightBrace) {
            fields.push(self.struct_field()?);
        }
        self.expect(Kind::RightBrace, "'}'")?;

        let name = self.identifier("a struct name")?;
        Ok(TypedefStruct { name, fields })
    }

    fn struct_field(&mut self) -> Result<StructField, Error> {
        let ty = self.primitive_type()?;
        if self.peek() != Some(Kind::LeftParen) {
            let name = self.identifier("a field name")?;
            self.expect(Kind::Semi, "';'")?;
            return Ok(StructField::Variable(StructVariable { ty, name }));
        }

        let name = self.function_name()?;
        let arguments = self.arguments()?;
        let mut comment = self.comment(None);
        let semi = self.expect(Kind::Semi, "';'")?;
        if comment.is_none() {
            comment = self.comment(Some(semi.position.line));
        }
        Ok(StructField::Function(StructFunction { return_type: ty, name, arguments, comment }))
    }

    /// `const? name *{0..max}`. Stars beyond the dialect's limit are left for the caller to
    /// reject.
    fn primitive_type(&mut self) -> Result<PrimitiveType, Error> {
        let is_const = self.eat(Kind::Const);
        let name = self.identifier("a type")?;
        let mut indirection = 0;
        while indirection < self.grammar.max_indirection && self.eat(Kind::Star) {
            indirection += 1;
        }
        Ok(PrimitiveType { is_const, name, indirection })
    }

    /// `( * name )`
    fn function_name(&mut self) -> Result<String, Error> {
        self.expect(Kind::LeftParen, "'('")?;
        self.expect(Kind::Star, "'*'")?;
        let name = self.identifier("a function pointer name")?;
        self.expect(Kind::RightParen, "')'")?;
        Ok(name)
    }

    fn arguments(&mut self) -> Result<Vec<Argument>, Error> {
        self.expect(Kind::LeftParen, "'('")?;
        let mut arguments = Vec::default();
        if self.eat(Kind::RightParen) { return Ok(arguments); }

        loop {
            arguments.push(self.argument()?);
            if !self.eat(Kind::Comma) { break; }
        }
        self.expect(Kind::RightParen, "',' or ')'")?;
        Ok(arguments)
    }

    /// Either `R (*name?)(arguments)` or `T name?`, trying the function pointer first.
    fn argument(&mut self) -> Result<Argument, Error> {
        if self.grammar.function_arguments {
            let start = self.next;
            if let Ok(return_type) = self.primitive_type() {
                if self.upcoming().take(2).eq([Kind::LeftParen, Kind::Star]) {
                    return self.function_argument(return_type);
                }
            }
            self.next = start;
        }

        let ty = self.primitive_type()?;
        let name = match self.peek() {
            Some(Kind::Identifier) => { Some(self.identifier("an argument name")?) }
            _ => { None }
        };
        Ok(Argument { ty: Type::Primitive(ty), name })
    }

    fn function_argument(&mut self, return_type: PrimitiveType) -> Result<Argument, Error> {
        if self.depth == MAX_NESTING {
            let expected = format!("at most {} nested function pointer arguments", MAX_NESTING);
            return Err(self.error(&expected));
        }
        self.depth += 1;
        let argument = self.nested_function(return_type);
        self.depth -= 1;
        argument
    }

    fn nested_function(&mut self, return_type: PrimitiveType) -> Result<Argument, Error> {
        self.expect(Kind::LeftParen, "'('")?;
        self.expect(Kind::Star, "'*'")?;
        let name = match self.peek() {
            Some(Kind::Identifier) => { Some(self.identifier("an argument name")?) }
            _ => { None }
        };
        self.expect(Kind::RightParen, "')'")?;
        let arguments = self.arguments()?;

        let ty = Type::Function(Box::new(FunctionType { return_type, arguments }));
        Ok(Argument { ty, name })
    }

    /// Take a comment token at the cursor, if there is one and it starts on `line`.
    fn comment(&mut self, line: Option<usize>) -> Option<String> {
        let token = self.tokens.get(self.next).filter(|token| token.kind == Kind::Comment)?;
        if line.map_or(false, |line| token.position.line != line) { return None; }

        self.next += 1;
        Some(token.text.to_string())
    }

    fn identifier(&mut self, expected: &str) -> Result<String, Error> {
        self.expect(Kind::Identifier, expected).map(|token| token.text.to_string())
    }

    fn expect(&mut self, kind: Kind, expected: &str) -> Result<Token<'s>, Error> {
        if self.peek() != Some(kind) { return Err(self.error(expected)); }

        let token = self.tokens[self.next];
        self.next += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: Kind) -> bool {
        let found = self.peek() == Some(kind);
        if found { self.next += 1; }
        found
    }

    /// The kind of the next significant token, moving the cursor past any comments.
    fn peek(&mut self) -> Option<Kind> {
        while self.tokens.get(self.next).map_or(false, |token| token.kind == Kind::Comment) {
            self.next += 1;
        }
        self.tokens.get(self.next).map(|token| token.kind)
    }

    fn upcoming(&self) -> impl Iterator<Item = Kind> + '_ {
        self.tokens[self.next..].iter()
            .map(|token| token.kind)
            .filter(|&kind| kind != Kind::Comment)
    }

    fn error(&mut self, expected: &str) -> Error {
        self.peek();
        let (position, found) = match self.tokens.get(self.next) {
            Some(token) => { (token.position, token.to_string()) }
            None => { (self.end, Kind::EndOfFile.describe().to_string()) }
        };
        Error::Grammar { position, found, expected: expected.to_string() }
    }
}

/// The value of an integer literal: optionally signed, decimal or hexadecimal.
fn integer(token: Token<'_>) -> Result<i64, Error> {
    let text = token.text;
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => { (true, digits) }
        None => { (false, text.strip_prefix('+').unwrap_or(text)) }
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => { u64::from_str_radix(hex, 16) }
        None => { digits.parse::<u64>() }
    };
    magnitude.ok()
        .map(|magnitude| if negative { -i128::from(magnitude) } else { i128::from(magnitude) })
        .and_then(|value| i64::try_from(value).ok())
        .ok_or_else(|| Error::Grammar {
            position: token.position,
            found: token.to_string(),
            expected: "an integer that fits in 64 bits".to_string(),
        })
}
