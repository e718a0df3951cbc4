//! End-to-end scenarios 4 and 5: slices and out-of-bounds reporting.

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
fn slice_with_end() {
    let doc: serde_json::Value = serde_json::json!({"xs": [1, 2, 3, 4]});
    let env = fmtgen::env::prepare_environment(&doc);

    let (out, ok) = render("<$ for v : xs[1, xs.end] { <$ v $>/} $>", &env);

    assert!(ok);
    assert_eq!(out, "2/3/4/");
}

#[test]
fn out_of_bounds_index_fails_the_render() {
    let doc: serde_json::Value = serde_json::json!({"xs": [1]});
    let env = fmtgen::env::prepare_environment(&doc);

    let (_, ok) = render("<$ xs[5] $>", &env);

    assert!(!ok);
}

#[test]
fn out_of_bounds_slice_fails_the_render() {
    let doc: serde_json::Value = serde_json::json!({"xs": [1, 2]});
    let env = fmtgen::env::prepare_environment(&doc);

    let (_, ok) = render("<$ for v : xs[0, 5] { <$ v $> } $>", &env);

    assert!(!ok);
}
