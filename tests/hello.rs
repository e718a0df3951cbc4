//! End-to-end scenario 1 from the spec: a single variable substitution.

use std::rc::Rc;

use fmtgen::filecache::FileCache;
use fmtgen::lexer;
use fmtgen::value::Value;

fn render(template: &str, env: &Value) -> (String, bool) {
    let (tokens, lex_error) = lexer::tokenize(template);
    assert!(!lex_error, "template failed to tokenize: {template}");
    let mut cache = FileCache::new();
    let mut out = String::new();
    let ok = fmtgen::eval::render(template, &tokens, env, &mut cache, &mut out);
    (out, ok)
}

#[test]
fn hello_world() {
    let doc: serde_json::Value = serde_json::json!({"name": "World"});
    let env = fmtgen::env::prepare_environment(&doc);

    let (out, ok) = render("Hello, <$ name $>!", &env);

    assert!(ok);
    assert_eq!(out, "Hello, World!");
}

#[test]
fn hello_uses_string_value_directly() {
    let env = Value::empty_object();
    if let Value::Object(object) = &env {
        object.borrow_mut().insert("name".to_string(), Value::String(Rc::from("Rust")));
    }

    let (out, ok) = render("Hello, <$ name $>!", &env);

    assert!(ok);
    assert_eq!(out, "Hello, Rust!");
}
