// Integration tests for the CFG config engine

use cfglang::{Config, ConfigError, Value};

fn load(source: &str) -> Config {
    Config::from_source(source).expect("load failed")
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn test_hello_world() {
    let source = r#"
a: 'Hello, '
b: 'world!'
c: { d: 'e' }
'f.g': 'h'
"#;
    let cfg = load(source);

    assert_eq!(cfg.get("a").expect("lookup failed"), Value::from("Hello, "));
    assert_eq!(cfg.get("b").expect("lookup failed"), Value::from("world!"));
    assert_eq!(cfg.get("c.d").expect("lookup failed"), Value::from("e"));
    // a literal key wins over path interpretation
    assert_eq!(cfg.get("f.g").expect("lookup failed"), Value::from("h"));
}

#[test]
fn test_top_level_braces_are_optional() {
    let braced = load("{a: 1, b: 2}");
    let bare = load("a: 1\nb: 2");

    assert_eq!(braced.get("a").expect("lookup failed"), Value::Integer(1));
    assert_eq!(bare.get("b").expect("lookup failed"), Value::Integer(2));
}

#[test]
fn test_root_must_be_mapping() {
    match Config::from_source("[1, 2, 3]") {
        Err(ConfigError::MappingExpected) => {}
        other => panic!("Expected MappingExpected, got {:?}", other),
    }
}

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn test_slices() {
    let cfg = load("test_list: ['a', 'b', 'c', 'd', 'e', 'f', 'g']");

    assert_eq!(
        cfg.get("test_list[::2]").expect("lookup failed"),
        strings(&["a", "c", "e", "g"])
    );
    assert_eq!(
        cfg.get("test_list[-2:2:-1]").expect("lookup failed"),
        strings(&["f", "e", "d"])
    );
    assert_eq!(
        cfg.get("test_list[::-1]").expect("lookup failed"),
        strings(&["g", "f", "e", "d", "c", "b", "a"])
    );
    assert_eq!(
        cfg.get("test_list[:]").expect("lookup failed"),
        strings(&["a", "b", "c", "d", "e", "f", "g"])
    );
    assert_eq!(
        cfg.get("test_list[2:]").expect("lookup failed"),
        strings(&["c", "d", "e", "f", "g"])
    );
    assert_eq!(
        cfg.get("test_list[-2]").expect("lookup failed"),
        Value::from("f")
    );
}

#[test]
fn test_index_out_of_range() {
    let cfg = load("test_list: ['a', 'b', 'c', 'd', 'e', 'f', 'g']");
    let err = cfg.get("test_list[7]").expect_err("out-of-range accepted");

    match &err {
        ConfigError::BadIndex { message, .. } => {
            assert_eq!(message, "index out of range: is 7, must be between 0 and 6");
        }
        other => panic!("Expected BadIndex, got {:?}", other),
    }
}

#[test]
fn test_slice_step_cannot_be_zero() {
    let cfg = load("test_list: [1, 2, 3]");
    let err = cfg.get("test_list[::0]").expect_err("zero step accepted");

    match &err {
        ConfigError::BadIndex { message, .. } => {
            assert_eq!(message, "slice step cannot be zero");
        }
        other => panic!("Expected BadIndex, got {:?}", other),
    }
}

#[test]
fn test_slices_only_operate_on_lists() {
    let cfg = load("m: {a: 1}");
    let err = cfg.get("m[::2]").expect_err("sliced a mapping");

    match &err {
        ConfigError::BadIndex { message, .. } => {
            assert_eq!(message, "slices can only operate on lists");
        }
        other => panic!("Expected BadIndex, got {:?}", other),
    }
}

#[test]
fn test_interpolation_and_references() {
    let source = "string_value: 'x'\nlist_value: [1, 2, 3]\ninterp: `A ${string_value} ${list_value[1]} Z`";
    let cfg = load(source);

    assert_eq!(
        cfg.get("interp").expect("lookup failed"),
        Value::from("A x 2 Z")
    );
}

#[test]
fn test_references_in_expressions() {
    let cfg = load("base: 2\nderived: ${base} * 3\ngreeting: ${name} + '!'\nname: 'hi'");

    assert_eq!(
        cfg.get("derived").expect("lookup failed"),
        Value::Integer(6)
    );
    assert_eq!(
        cfg.get("greeting").expect("lookup failed"),
        Value::from("hi!")
    );
}

#[test]
fn test_merge_and_subtract() {
    let source = r#"
m1: {a: 'b', c: 'd'} + {e: 'f'}
m2: {a: 'b', c: 'd'} - {c: null}
nested: {o: {p: 1, q: 2}} + {o: {q: 3, r: 4}}
piped: {a: 1} | {b: 2}
"#;
    let cfg = load(source);

    match cfg.get("m1").expect("lookup failed") {
        Value::Mapping(m) => {
            assert_eq!(m.len(), 3);
            assert_eq!(m.get("a"), Some(&Value::from("b")));
            assert_eq!(m.get("c"), Some(&Value::from("d")));
            assert_eq!(m.get("e"), Some(&Value::from("f")));
        }
        other => panic!("Expected a mapping, got {:?}", other),
    }
    match cfg.get("m2").expect("lookup failed") {
        Value::Mapping(m) => {
            assert_eq!(m.len(), 1);
            assert_eq!(m.get("a"), Some(&Value::from("b")));
        }
        other => panic!("Expected a mapping, got {:?}", other),
    }
    // nested mappings deep-merge, with the right side winning on scalars
    match cfg.get("nested.o").expect("lookup failed") {
        Value::Mapping(m) => {
            assert_eq!(m.get("p"), Some(&Value::Integer(1)));
            assert_eq!(m.get("q"), Some(&Value::Integer(3)));
            assert_eq!(m.get("r"), Some(&Value::Integer(4)));
        }
        other => panic!("Expected a mapping, got {:?}", other),
    }
    match cfg.get("piped").expect("lookup failed") {
        Value::Mapping(m) => assert_eq!(m.len(), 2),
        other => panic!("Expected a mapping, got {:?}", other),
    }
}

#[test]
fn test_list_concatenation() {
    let cfg = load("joined: [1, 2] + [3]");

    assert_eq!(
        cfg.get("joined").expect("lookup failed"),
        Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
    );
}

#[test]
fn test_include() {
    let cfg = Config::from_file(&fixture("main.cfg")).expect("load failed");

    assert_eq!(
        cfg.get("logging.handlers.file.filename")
            .expect("lookup failed"),
        Value::from("run/server.log")
    );
    // the included document itself comes back as a sub-configuration
    match cfg.get("logging").expect("lookup failed") {
        Value::Config(sub) => {
            assert!(sub.contains_key("handlers"));
        }
        other => panic!("Expected a sub-configuration, got {:?}", other),
    }
}

#[test]
fn test_include_not_found() {
    let cfg = load("missing: @ 'no_such_file.cfg'");
    let err = cfg.get("missing").expect_err("missing include accepted");

    match &err {
        ConfigError::FileNotFound { path } => assert_eq!(path, "no_such_file.cfg"),
        other => panic!("Expected FileNotFound, got {:?}", other),
    }
    assert_eq!(format!("{}", err), "unable to locate no_such_file.cfg");
}

#[test]
fn test_include_operand_must_be_string() {
    let cfg = load("bad: @ 42");
    let err = cfg.get("bad").expect_err("numeric include accepted");

    match &err {
        ConfigError::IncludeNotString { .. } => {}
        other => panic!("Expected IncludeNotString, got {:?}", other),
    }
    assert_eq!(format!("{}", err), "@ operand must be a string, but is 42");
}

#[test]
fn test_include_path_search() {
    let mut cfg = Config::new();

    cfg.add_include(&format!("{}/tests/fixtures", env!("CARGO_MANIFEST_DIR")));
    cfg.load("logging: @ 'log.cfg'".as_bytes()).expect("load failed");
    assert_eq!(
        cfg.get("logging.handlers.file.filename")
            .expect("lookup failed"),
        Value::from("run/server.log")
    );
}

#[test]
fn test_circular_references() {
    let cfg = load("a: ${b}\nb: ${a}");
    let err = cfg.get("a").expect_err("cycle accepted");

    match &err {
        ConfigError::CircularReference { chain } => {
            let paths: Vec<&str> = chain.iter().map(|(p, _)| p.as_str()).collect();
            assert_eq!(paths, vec!["a", "b"]);
        }
        other => panic!("Expected CircularReference, got {:?}", other),
    }
    assert_eq!(
        format!("{}", err),
        "Circular reference: a (2, 4), b (1, 4)"
    );
}

#[test]
fn test_three_way_cycle() {
    let cfg = load("a: ${b}\nb: ${c}\nc: ${a}");

    for key in ["a", "b", "c"] {
        match cfg.get(key) {
            Err(ConfigError::CircularReference { .. }) => {}
            other => panic!("Expected CircularReference for {}, got {:?}", key, other),
        }
    }
}

#[test]
fn test_duplicate_keys_rejected() {
    let err = Config::from_source("a: 1\na: 2").expect_err("duplicate accepted");

    match &err {
        ConfigError::DuplicateKey { key, .. } => assert_eq!(key, "a"),
        other => panic!("Expected DuplicateKey, got {:?}", other),
    }
    assert_eq!(
        format!("{}", err),
        "Duplicate key a seen at (2, 1) (previously at (1, 1))"
    );
}

#[test]
fn test_duplicate_keys_allowed_later_wins() {
    let mut cfg = Config::new();

    cfg.no_duplicates = false;
    cfg.load("a: 1\na: 2".as_bytes()).expect("load failed");
    assert_eq!(cfg.get("a").expect("lookup failed"), Value::Integer(2));
}

#[test]
fn test_not_found() {
    let cfg = load("a: 1");
    let err = cfg.get("nope").expect_err("missing key accepted");

    assert_eq!(format!("{}", err), "Not found in configuration: nope");

    let err = cfg.get("a.b").expect_err("path into scalar accepted");
    match err {
        ConfigError::NotFound { key, .. } => assert_eq!(key, "b"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_get_or_defaults() {
    let cfg = load("a: 1\nxs: [1, 2]");

    assert_eq!(
        cfg.get_or("nope", Value::from("dflt")).expect("lookup failed"),
        Value::from("dflt")
    );
    assert_eq!(
        cfg.get_or("a", Value::from("dflt")).expect("lookup failed"),
        Value::Integer(1)
    );
    // bad indices always propagate, even with a default
    match cfg.get_or("xs[5]", Value::Null) {
        Err(ConfigError::BadIndex { .. }) => {}
        other => panic!("Expected BadIndex, got {:?}", other),
    }
    // so do invalid paths
    match cfg.get_or("a..b", Value::Null) {
        Err(ConfigError::InvalidPath { path, .. }) => assert_eq!(path, "a..b"),
        other => panic!("Expected InvalidPath, got {:?}", other),
    }
}

#[test]
fn test_invalid_path_message() {
    let cfg = load("a: 1");
    let err = cfg.get("a[").expect_err("bad path accepted");

    assert_eq!(format!("{}", err), "Invalid path: a[");
}

#[test]
fn test_caching_is_idempotent() {
    let mut cfg = Config::new();

    cfg.load("a: 1 + 2\nb: [1, 2, 3]".as_bytes()).expect("load failed");
    cfg.set_cached(true);
    let first = cfg.get("a").expect("lookup failed");
    let second = cfg.get("a").expect("lookup failed");

    assert_eq!(first, second);
    assert_eq!(first, Value::Integer(3));
    assert_eq!(
        cfg.get("b[::2]").expect("lookup failed"),
        cfg.get("b[::2]").expect("lookup failed")
    );
}

#[test]
fn test_context_lookup() {
    let mut cfg = Config::new();
    let mut context = rustc_hash::FxHashMap::default();

    context.insert("answer".to_string(), Value::Integer(42));
    cfg.set_context(context);
    cfg.load("a: answer\nb: unknown".as_bytes()).expect("load failed");
    assert_eq!(cfg.get("a").expect("lookup failed"), Value::Integer(42));

    let err = cfg.get("b").expect_err("unknown variable accepted");
    assert_eq!(format!("{}", err), "Unknown variable: unknown");
}

#[test]
fn test_env_var_special() {
    std::env::set_var("CFGLANG_TEST_VAR", "from-env");
    let cfg = load("e: `$CFGLANG_TEST_VAR`\nd: `$CFGLANG_NO_SUCH_VAR|fallback`");

    assert_eq!(cfg.get("e").expect("lookup failed"), Value::from("from-env"));
    assert_eq!(cfg.get("d").expect("lookup failed"), Value::from("fallback"));
}

#[test]
fn test_strict_conversions() {
    let cfg = load("v: `$CFGLANG_NO_SUCH_VAR`");
    let err = cfg.get("v").expect_err("missing env var accepted");

    match err {
        ConfigError::Conversion { text } => assert_eq!(text, "$CFGLANG_NO_SUCH_VAR"),
        other => panic!("Expected Conversion, got {:?}", other),
    }

    let mut lenient = Config::new();
    lenient.strict_conversions = false;
    lenient
        .load("v: `$CFGLANG_NO_SUCH_VAR`".as_bytes())
        .expect("load failed");
    assert_eq!(lenient.get("v").expect("lookup failed"), Value::Null);
}

#[test]
fn test_datetime_conversion() {
    use chrono::Datelike;

    let cfg = load("when: `2019-03-28`");

    match cfg.get("when").expect("lookup failed") {
        Value::Date(d) => assert_eq!((d.year(), d.month(), d.day()), (2019, 3, 28)),
        other => panic!("Expected a date, got {:?}", other),
    }
}

#[test]
fn test_as_mapping_unwraps_everything() {
    let cfg = load("a: 1 + 1\nc: {d: 'e'}\nxs: [1, 2]");
    let map = cfg.as_mapping().expect("as_mapping failed");

    assert_eq!(map.get("a"), Some(&Value::Integer(2)));
    match map.get("c") {
        Some(Value::Mapping(inner)) => assert_eq!(inner.get("d"), Some(&Value::from("e"))),
        other => panic!("Expected a mapping, got {:?}", other),
    }
    // document order is preserved
    let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["a", "c", "xs"]);
}

#[test]
fn test_comments_and_trailing_commas() {
    let source = r#"
# leading comment
a: 1,   # trailing comment
b: [
    1,
    2,
]
"#;
    let cfg = load(source);

    assert_eq!(cfg.get("a").expect("lookup failed"), Value::Integer(1));
    assert_eq!(
        cfg.get("b").expect("lookup failed"),
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );
}

#[test]
fn test_syntax_error_carries_location() {
    let err = Config::from_source("a:\n  : 1").expect_err("bad syntax accepted");

    match err {
        ConfigError::Syntax(e) => assert_eq!(e.location.line, 2),
        other => panic!("Expected Syntax, got {:?}", other),
    }
}
