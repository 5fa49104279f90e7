use gdheader::cpp::Directives;
use gdheader::syntax::{EnumInit, Expr, StructField, Type};
use gdheader::{evaluate_preprocessor, parse_header, Config, Dialect, PreprocVars};

const GDNATIVE_INTERFACE: &str = include_str!("data/gdnative_interface.h");

fn config() -> Config {
    Config { dialect: Dialect::GdNative, ..Config::default() }
}

#[test]
fn flattened() {
    let text = evaluate_preprocessor(GDNATIVE_INTERFACE, &PreprocVars::new()).unwrap();
    assert!(text.contains("typedef uint32_t char32_t;"));
    assert!(!text.contains("extern \"C\""));
    assert!(!text.lines().any(|line| line.trim_start().starts_with('#')));

    let text = evaluate_preprocessor(GDNATIVE_INTERFACE, &PreprocVars::cplusplus()).unwrap();
    assert!(!text.contains("char32_t;"));
    assert!(text.contains("extern \"C\" {"));

    let tree = Directives::parse(GDNATIVE_INTERFACE).unwrap();
    assert_eq!(tree.eval(&PreprocVars::new()), tree.eval(&PreprocVars::new()));
}

#[test]
fn declarations() {
    let header = parse_header(GDNATIVE_INTERFACE, &config()).unwrap();

    assert_eq!(header.collect_enums().len(), 6);
    assert_eq!(header.collect_structs().len(), 9);
    assert_eq!(header.collect_aliases().len(), 17);
    assert_eq!(header.collect_functions().len(), 62);
    assert!(header.exprs.iter().any(|expr| matches!(expr, Expr::Comment(c) if c == "/* INTERFACE */")));

    let variant_type = header.find_enum("GDNativeVariantType").unwrap();
    assert_eq!(variant_type.values.len(), 39);
    assert_eq!(variant_type.values[0].name, "GDNATIVE_VARIANT_TYPE_NIL");
    assert_eq!(variant_type.values[38].name, "GDNATIVE_VARIANT_TYPE_VARIANT_MAX");

    let call_error = header.find_enum("GDNativeCallErrorType").unwrap();
    assert_eq!(call_error.values.len(), 7);
    assert!(call_error.values.iter().all(|value| value.value == EnumInit::Implicit));

    let flags = header.find_enum("GDNativeExtensionClassMethodFlags").unwrap();
    assert_eq!(flags.values[5].value, EnumInit::Int(32));
    assert_eq!(flags.values[6].value, EnumInit::Ref("GDNATIVE_EXTENSION_METHOD_FLAG_NORMAL".into()));
}

#[test]
fn interface_struct() {
    let header = parse_header(GDNATIVE_INTERFACE, &config()).unwrap();
    let interface = header.collect_structs().into_iter()
        .find(|s| s.name == "GDNativeInterface")
        .unwrap();
    assert_eq!(interface.fields.len(), 122);

    let StructField::Variable(ref version) = interface.fields[3] else { panic!("expected a variable") };
    assert_eq!(version.name, "version_string");
    assert_eq!(version.ty.to_string(), "const char *");

    let functions = interface.collect_functions();
    assert_eq!(functions.len(), 118);

    let mem_alloc = functions[0];
    assert_eq!(mem_alloc.name, "mem_alloc");
    assert_eq!(mem_alloc.return_type.to_string(), "void *");
    assert_eq!(mem_alloc.arguments.len(), 1);
    assert_eq!(mem_alloc.arguments[0].to_string(), "size_t p_bytes");

    let index = functions.iter()
        .find(|f| f.name == "packed_byte_array_operator_index")
        .unwrap();
    assert_eq!(index.return_type.to_string(), "uint8_t *");
    assert_eq!(index.comment.as_deref(), Some("// p_self should be a PackedByteArray"));

    let construct = functions.iter().find(|f| f.name == "classdb_construct_object").unwrap();
    assert!(construct.comment.as_deref().unwrap().starts_with("/* The passed class"));
}

#[test]
fn initialization_function() {
    let header = parse_header(GDNATIVE_INTERFACE, &config()).unwrap();
    let functions = header.collect_functions();
    let init = functions.iter().find(|f| f.name == "GDNativeInitializationFunction").unwrap();

    assert_eq!(init.return_type.name, "GDNativeBool");
    let arguments: Vec<_> = init.arguments.iter().map(|argument| argument.to_string()).collect();
    assert_eq!(arguments, [
        "const GDNativeInterface *p_interface",
        "const GDNativeExtensionClassLibraryPtr p_library",
        "GDNativeInitialization *r_initialization",
    ]);
    assert!(init.arguments.iter().all(|argument| matches!(argument.ty, Type::Primitive(_))));

    let constructors = header.collect_functions_with_prefix("GDNativePtr", &["GDNativePtrUtilityFunction"]);
    assert_eq!(constructors.len(), 11);
    assert!(constructors.iter().all(|f| f.name != "GDNativePtrUtilityFunction"));
}

#[test]
fn extension_dialect_reads_native_headers() {
    let header = parse_header(GDNATIVE_INTERFACE, &Config::default()).unwrap();
    assert_eq!(header.collect_functions().len(), 62);

    let json = header.to_json().unwrap();
    assert!(json.contains("\"GDNativeInterface\""));
}
