use clap::Parser as ClapParser;
use fmtgen::document::Document;
use fmtgen::driver;

/// Render every (template, pass) pair declared in a JSON or YAML document.
#[derive(ClapParser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the document describing templates, passes and base data.
    document: std::path::PathBuf,

    /// Raise the log level to show trace-level diagnostics (file cache
    /// hits/misses, lexer errors on individual templates).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Cli::parse();

    let level = if args.verbose { log::Level::Trace } else { log::Level::Info };
    simple_logger::init_with_level(level).expect("failed to initialize logger");

    let text = match std::fs::read_to_string(&args.document) {
        Ok(text) => text,
        Err(e) => {
            log::error!("couldn't read '{}': {e}", args.document.display());
            std::process::exit(1);
        }
    };

    let document = match Document::from_path_and_text(&args.document, &text) {
        Ok(document) => document,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    match driver::run(&document) {
        Ok(summary) => {
            log::info!(
                "processed {} template(s), {} pass(es) rendered, {} failed",
                summary.templates_processed,
                summary.passes_rendered,
                summary.passes_failed
            );
            if !summary.all_succeeded() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}
