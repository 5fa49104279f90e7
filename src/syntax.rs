use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// The top-level declarations of one header, in source order.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct HeaderFile {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exprs: Vec<Expr>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum Expr {
    /// A comment standing between declarations, with its delimiters.
    Comment(String),
    Enum(TypedefEnum),
    Alias(TypedefAlias),
    Function(TypedefFunction),
    Struct(TypedefStruct),
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TypedefEnum {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct EnumValue {
    pub name: String,
    #[serde(skip_serializing_if = "EnumInit::is_implicit")]
    pub value: EnumInit,
}

/// An enumerator's initializer. References name an earlier enumerator and are left to the
/// consumer to resolve.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum EnumInit {
    Int(i64),
    Ref(String),
    Implicit,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TypedefAlias {
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    pub name: String,
}

/// `typedef R (*name)(arguments);`
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TypedefFunction {
    pub return_type: PrimitiveType,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TypedefStruct {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<StructField>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum StructField {
    Variable(StructVariable),
    Function(StructFunction),
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct StructVariable {
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    pub name: String,
}

/// A function pointer field, `R (*name)(arguments);`, with any comment trailing it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct StructFunction {
    pub return_type: PrimitiveType,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// `const? name *{indirection}`
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct PrimitiveType {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_const: bool,
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub indirection: u8,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum Type {
    Primitive(PrimitiveType),
    Function(Box<FunctionType>),
}

/// An unnamed function pointer type, as taken by an argument.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct FunctionType {
    pub return_type: PrimitiveType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Argument {
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn is_zero(n: &u8) -> bool { *n == 0 }

impl HeaderFile {
    /// Function typedefs, one per name. The first declaration of a name wins.
    pub fn collect_functions(&self) -> Vec<&TypedefFunction> {
        let mut distinct = IndexMap::new();
        for expr in &self.exprs {
            if let Expr::Function(function) = expr {
                distinct.entry(&function.name[..]).or_insert(function);
            }
        }
        distinct.into_values().collect()
    }

    /// Distinct function typedefs whose names start with `prefix`, less the names in `exclude`.
    pub fn collect_functions_with_prefix(
        &self, prefix: &str, exclude: &[&str]
    ) -> Vec<&TypedefFunction> {
        self.collect_functions().into_iter()
            .filter(|function| function.name.starts_with(prefix))
            .filter(|function| !exclude.contains(&&function.name[..]))
            .collect()
    }

    pub fn collect_functions_without_prefix(&self, prefix: &str) -> Vec<&TypedefFunction> {
        self.collect_functions().into_iter()
            .filter(|function| !function.name.starts_with(prefix))
            .collect()
    }

    pub fn collect_structs(&self) -> Vec<&TypedefStruct> {
        self.exprs.iter().filter_map(|expr| match expr {
            Expr::Struct(s) => { Some(s) }
            _ => { None }
        }).collect()
    }

    pub fn collect_aliases(&self) -> Vec<&TypedefAlias> {
        self.exprs.iter().filter_map(|expr| match expr {
            Expr::Alias(alias) => { Some(alias) }
            _ => { None }
        }).collect()
    }

    pub fn collect_enums(&self) -> Vec<&TypedefEnum> {
        self.exprs.iter().filter_map(|expr| match expr {
            Expr::Enum(e) => { Some(e) }
            _ => { None }
        }).collect()
    }

    /// The first enum typedef named `name`, such as the variant type enum.
    pub fn find_enum(&self, name: &str) -> Option<&TypedefEnum> {
        self.collect_enums().into_iter().find(|e| e.name.as_deref() == Some(name))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Expr {
    /// The name a declaration introduces. Comments and anonymous enums have none.
    pub fn name(&self) -> Option<&str> {
        match *self {
            Expr::Comment(_) => { None }
            Expr::Enum(ref e) => { e.name.as_deref() }
            Expr::Alias(ref alias) => { Some(&alias.name) }
            Expr::Function(ref function) => { Some(&function.name) }
            Expr::Struct(ref s) => { Some(&s.name) }
        }
    }
}

impl TypedefStruct {
    pub fn collect_functions(&self) -> Vec<&StructFunction> {
        self.fields.iter().filter_map(|field| match field {
            StructField::Function(function) => { Some(function) }
            StructField::Variable(_) => { None }
        }).collect()
    }
}

impl EnumInit {
    pub fn is_implicit(&self) -> bool { matches!(self, EnumInit::Implicit) }
}

impl PrimitiveType {
    pub fn is_pointer(&self) -> bool { self.indirection > 0 }
}

impl Argument {
    /// The declared name, or `arg_{index}` for an unnamed parameter.
    pub fn resolved_name(&self, index: usize) -> String {
        match self.name {
            Some(ref name) => { name.clone() }
            None => { format!("arg_{}", index) }
        }
    }

    /// Whether a binding has to keep the argument's referent in place across the call.
    pub fn is_pinnable(&self) -> bool {
        match self.ty {
            Type::Function(_) => { false }
            Type::Primitive(ref ty) => { ty.name != "char" && ty.is_pointer() }
        }
    }

    /// A C parameter declaration, naming the argument even when the header does not.
    pub fn declaration(&self, index: usize) -> String {
        let name = self.resolved_name(index);
        match self.ty {
            Type::Primitive(ref ty) => { format!("{}", Declarator(ty, &name)) }
            Type::Function(ref function) => { format!("{}", function.declarator(&name)) }
        }
    }
}

struct Declarator<'a>(&'a PrimitiveType, &'a str);

struct FunctionDeclarator<'a>(&'a PrimitiveType, &'a [Argument], &'a str);

impl FunctionType {
    fn declarator<'a>(&'a self, name: &'a str) -> FunctionDeclarator<'a> {
        FunctionDeclarator(&self.return_type, &self.arguments, name)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const { f.write_str("const ")?; }
        f.write_str(&self.name)?;
        if self.indirection > 0 { f.write_str(" ")?; }
        for _ in 0..self.indirection { f.write_str("*")?; }
        Ok(())
    }
}

impl fmt::Display for Declarator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Declarator(ty, name) = *self;
        if ty.is_pointer() { write!(f, "{}{}", ty, name) } else { write!(f, "{} {}", ty, name) }
    }
}

impl fmt::Display for FunctionDeclarator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let FunctionDeclarator(return_type, arguments, name) = *self;
        write!(f, "{} (*{})(", return_type, name)?;
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{}", argument)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declarator(""))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Type::Primitive(ref ty) => { write!(f, "{}", ty) }
            Type::Function(ref function) => { write!(f, "{}", function) }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ty, &self.name) {
            (ty, None) => { write!(f, "{}", ty) }
            (Type::Primitive(ty), Some(name)) => { write!(f, "{}", Declarator(ty, name)) }
            (Type::Function(function), Some(name)) => {
                write!(f, "{}", function.declarator(name))
            }
        }
    }
}

impl fmt::Display for TypedefFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let declarator = FunctionDeclarator(&self.return_type, &self.arguments, &self.name);
        write!(f, "typedef {};", declarator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(is_const: bool, name: &str, indirection: u8) -> PrimitiveType {
        PrimitiveType { is_const, name: name.to_string(), indirection }
    }

    fn function(name: &str) -> Expr {
        Expr::Function(TypedefFunction {
            return_type: primitive(false, "void", 0),
            name: name.to_string(),
            arguments: Vec::new(),
        })
    }

    fn callback() -> Argument {
        Argument {
            ty: Type::Function(Box::new(FunctionType {
                return_type: primitive(false, "void", 0),
                arguments: vec![
                    Argument { ty: Type::Primitive(primitive(false, "void", 1)), name: None },
                    Argument { ty: Type::Primitive(primitive(false, "uint32_t", 0)), name: None },
                ],
            })),
            name: Some("p_func".to_string()),
        }
    }

    #[test]
    fn distinct_functions() {
        let mut first = function("GDExtensionClassGetPropertyList");
        if let Expr::Function(ref mut f) = first { f.return_type.indirection = 1; }
        let header = HeaderFile { exprs: vec![
            first,
            Expr::Comment("// between".to_string()),
            function("GDExtensionInterfaceGetProcAddress"),
            function("GDExtensionClassGetPropertyList"),
            function("GDExtensionInterfaceFunctionPtr"),
        ] };

        let functions = header.collect_functions();
        let names: Vec<_> = functions.iter().map(|f| &f.name[..]).collect();
        assert_eq!(names, [
            "GDExtensionClassGetPropertyList",
            "GDExtensionInterfaceGetProcAddress",
            "GDExtensionInterfaceFunctionPtr",
        ]);
        assert_eq!(functions[0].return_type.indirection, 1);

        let interface = header.collect_functions_with_prefix(
            "GDExtensionInterface", &["GDExtensionInterfaceFunctionPtr"]);
        assert_eq!(interface.len(), 1);
        assert_eq!(interface[0].name, "GDExtensionInterfaceGetProcAddress");

        let rest = header.collect_functions_without_prefix("GDExtensionInterface");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "GDExtensionClassGetPropertyList");
    }

    #[test]
    fn collections() {
        let header = HeaderFile { exprs: vec![
            Expr::Enum(TypedefEnum { values: Vec::new(), name: None }),
            Expr::Alias(TypedefAlias { ty: primitive(false, "void", 1), name: "A".into() }),
            Expr::Enum(TypedefEnum { values: Vec::new(), name: Some("VariantType".into()) }),
            Expr::Struct(TypedefStruct { name: "S".into(), fields: vec![
                StructField::Variable(StructVariable { ty: primitive(false, "int", 0), name: "x".into() }),
                StructField::Function(StructFunction {
                    return_type: primitive(false, "void", 0),
                    name: "f".into(),
                    arguments: Vec::new(),
                    comment: Some("// f".into()),
                }),
            ] }),
            Expr::Alias(TypedefAlias { ty: primitive(false, "int64_t", 0), name: "B".into() }),
        ] };

        assert_eq!(header.collect_enums().len(), 2);
        let aliases: Vec<_> = header.collect_aliases().iter().map(|a| &a.name[..]).collect();
        assert_eq!(aliases, ["A", "B"]);
        assert!(header.find_enum("VariantType").is_some());
        assert!(header.find_enum("Missing").is_none());

        let structs = header.collect_structs();
        assert_eq!(structs.len(), 1);
        let functions = structs[0].collect_functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].comment.as_deref(), Some("// f"));
    }

    #[test]
    fn c_style() {
        assert_eq!(primitive(true, "char", 1).to_string(), "const char *");
        assert_eq!(primitive(false, "void", 2).to_string(), "void **");
        assert_eq!(primitive(false, "int32_t", 0).to_string(), "int32_t");

        let contents = Argument {
            ty: Type::Primitive(primitive(true, "char", 1)),
            name: Some("p_contents".into()),
        };
        assert_eq!(contents.to_string(), "const char *p_contents");

        let callback = callback();
        assert_eq!(callback.to_string(), "void (*p_func)(void *, uint32_t)");
        assert_eq!(callback.ty.to_string(), "void (*)(void *, uint32_t)");

        let unnamed = Argument { ty: Type::Primitive(primitive(false, "GDExtensionTypePtr", 0)), name: None };
        assert_eq!(unnamed.to_string(), "GDExtensionTypePtr");
        assert_eq!(unnamed.declaration(1), "GDExtensionTypePtr arg_1");
        assert_eq!(unnamed.resolved_name(3), "arg_3");
        assert_eq!(callback.resolved_name(3), "p_func");

        let typedef = TypedefFunction {
            return_type: primitive(false, "int64_t", 0),
            name: "Fn".into(),
            arguments: vec![contents, callback],
        };
        assert_eq!(
            typedef.to_string(),
            "typedef int64_t (*Fn)(const char *p_contents, void (*p_func)(void *, uint32_t));"
        );
    }

    #[test]
    fn pinnable() {
        let argument = |ty| Argument { ty: Type::Primitive(ty), name: None };
        assert!(argument(primitive(false, "void", 1)).is_pinnable());
        assert!(!argument(primitive(true, "char", 1)).is_pinnable());
        assert!(!argument(primitive(false, "int", 0)).is_pinnable());
        assert!(!callback().is_pinnable());
    }

    #[test]
    fn json() {
        let header = HeaderFile { exprs: vec![
            Expr::Enum(TypedefEnum {
                values: vec![
                    EnumValue { name: "A".into(), value: EnumInit::Int(1) },
                    EnumValue { name: "B".into(), value: EnumInit::Implicit },
                ],
                name: None,
            }),
            Expr::Alias(TypedefAlias { ty: primitive(false, "int64_t", 0), name: "Int".into() }),
        ] };

        let value: serde_json::Value = serde_json::from_str(&header.to_json().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({
            "exprs": [
                { "Enum": { "values": [
                    { "name": "A", "value": { "Int": 1 } },
                    { "name": "B" },
                ] } },
                { "Alias": { "type": { "name": "int64_t" }, "name": "Int" } },
            ]
        }));

        assert_eq!(HeaderFile::default().to_json().unwrap(), "{}");
    }
}
