//! The file-inclusion cache (§4.E): memoizes `path -> (content, tokens,
//! had_error)` for the lifetime of one driver invocation so that a `file`
//! tag referenced from several passes only loads and tokenizes once.

use std::collections::HashMap;
use std::rc::Rc;

use crate::io;
use crate::lexer;
use crate::token::Token;

#[derive(Clone)]
pub struct CachedFile {
    pub content: Rc<str>,
    pub tokens: Rc<[Token]>,
    pub had_error: bool,
}

#[derive(Default)]
pub struct FileCache {
    entries: HashMap<String, CachedFile>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `path`, loading and tokenizing it on
    /// first reference. A failed load is cached too (as an errored, empty
    /// entry) so repeated references to a missing file don't re-attempt the
    /// read every time.
    pub fn get_or_load(&mut self, path: &str) -> CachedFile {
        if let Some(cached) = self.entries.get(path) {
            log::trace!("file cache hit for '{path}'");
            return cached.clone();
        }

        log::trace!("file cache miss for '{path}', loading");
        let entry = match io::load_text(path) {
            Ok(content) => {
                let (tokens, had_error) = lexer::tokenize(&content);
                CachedFile {
                    content: Rc::from(content),
                    tokens,
                    had_error,
                }
            }
            Err(e) => {
                log::error!("couldn't load included file '{path}': {e}");
                CachedFile {
                    content: Rc::from(""),
                    tokens: Rc::from(Vec::new()),
                    had_error: true,
                }
            }
        };

        self.entries.insert(path.to_string(), entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memoizes_across_repeated_references() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("fmtgen-filecache-test-{}.txt", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "hello").unwrap();

        let mut cache = FileCache::new();
        let path_str = path.to_str().unwrap();
        let first = cache.get_or_load(path_str);
        std::fs::remove_file(&path).unwrap();
        let second = cache.get_or_load(path_str);

        assert!(Rc::ptr_eq(&first.content, &second.content));
        assert!(!first.had_error);
    }
}
