//! The driver (§4.G): reads a decoded document, builds the root
//! environment, and for each `templates` entry renders every declared pass
//! of both the template body and its `output` path (itself a template),
//! writing the result to disk.

use crate::document::{DecodedNode, Document};
use crate::env;
use crate::error::{ErrorKind, FmtError, Result};
use crate::eval;
use crate::filecache::FileCache;
use crate::io;
use crate::lexer;
use crate::value::Value;

/// Tallies what a driver run actually did, so `main` can pick an exit code
/// that distinguishes "nothing to do" from "ran, but some pass failed".
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub templates_processed: usize,
    pub passes_rendered: usize,
    pub passes_failed: usize,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.passes_failed == 0
    }
}

pub fn run(document: &Document) -> Result<RunSummary> {
    match document {
        Document::Json(root) => run_generic(root),
        Document::Yaml(root) => run_generic(root),
    }
}

fn run_generic<N: DecodedNode>(root: &N) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    let Some(fields) = root.as_object() else {
        return Err(FmtError::new(ErrorKind::TypeMismatch, 0, "document root must be an object"));
    };
    let Some((_, templates_node)) = fields.into_iter().find(|(key, _)| *key == "templates") else {
        log::warn!("document has no 'templates' array; nothing to render");
        return Ok(summary);
    };
    let Some(template_entries) = templates_node.as_array() else {
        return Err(FmtError::new(ErrorKind::TypeMismatch, 0, "'templates' must be an array"));
    };

    let root_env = env::prepare_environment(root);
    let mut cache = FileCache::new();

    for entry in template_entries {
        summary.templates_processed += 1;
        render_template_entry(entry, &root_env, &mut cache, &mut summary);
    }

    Ok(summary)
}

fn render_template_entry<N: DecodedNode>(entry: &N, root_env: &Value, cache: &mut FileCache, summary: &mut RunSummary) {
    let Some(fields) = entry.as_object() else {
        log::error!("a 'templates' entry is not an object, skipping");
        return;
    };

    let field = |name: &str| fields.iter().find(|(key, _)| *key == name).map(|(_, value)| *value);

    let Some(template_body) = field("template").and_then(|v| v.as_str()) else {
        log::error!("a 'templates' entry is missing a string 'template' field, skipping");
        return;
    };
    let Some(output_body) = field("output").and_then(|v| v.as_str()) else {
        log::error!("a 'templates' entry is missing a string 'output' field, skipping");
        return;
    };
    let passes = field("passes").and_then(|v| v.as_array()).unwrap_or_default();

    let (template_tokens, template_lex_error) = lexer::tokenize(template_body);
    let (output_tokens, output_lex_error) = lexer::tokenize(output_body);
    if template_lex_error || output_lex_error {
        log::error!("'template' or 'output' failed to tokenize, skipping its passes");
        return;
    }

    let mut rendered = String::new();
    let mut path = String::new();

    for pass in passes {
        env::prepare_pass(root_env, env::to_value(pass));

        let template_ok = eval::render(template_body, &template_tokens, root_env, cache, &mut rendered);
        let output_ok = eval::render(output_body, &output_tokens, root_env, cache, &mut path);

        if !template_ok || !output_ok {
            summary.passes_failed += 1;
            log::error!("a pass failed to render; skipping the remaining passes of this template");
            break;
        }

        match io::write_text(&path, &rendered) {
            Ok(()) => {
                log::info!("wrote '{path}'");
                summary.passes_rendered += 1;
            }
            Err(e) => {
                summary.passes_failed += 1;
                log::error!("{e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_file_per_pass() {
        let dir = std::env::temp_dir().join(format!("fmtgen-driver-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let doc: serde_json::Value = serde_json::json!({
            "greeting": "Hello",
            "templates": [{
                "template": "<$ greeting $>, <$ params.name $>!",
                "output": format!("{}/<$ params.name $>.txt", dir.to_str().unwrap()),
                "passes": [{"name": "World"}, {"name": "Rust"}],
            }],
        });

        let document = Document::Json(doc);
        let summary = run(&document).expect("driver run should succeed");

        assert_eq!(summary.templates_processed, 1);
        assert_eq!(summary.passes_rendered, 2);
        assert_eq!(summary.passes_failed, 0);

        let world = std::fs::read_to_string(dir.join("World.txt")).unwrap();
        assert_eq!(world, "Hello, World!");
        let rust = std::fs::read_to_string(dir.join("Rust.txt")).unwrap();
        assert_eq!(rust, "Hello, Rust!");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn render_failure_stops_remaining_passes_of_that_template() {
        let dir = std::env::temp_dir().join(format!("fmtgen-driver-test-fail-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let doc: serde_json::Value = serde_json::json!({
            "templates": [{
                "template": "<$ missing $>",
                "output": format!("{}/<$ params.name $>.txt", dir.to_str().unwrap()),
                "passes": [{"name": "first"}, {"name": "second"}],
            }],
        });

        let summary = run(&Document::Json(doc)).expect("driver run should succeed even with a bad pass");
        assert_eq!(summary.passes_rendered, 0);
        assert_eq!(summary.passes_failed, 1);
        assert!(!dir.exists() || std::fs::read_dir(&dir).unwrap().next().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
