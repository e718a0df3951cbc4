//! The narrow file I/O surface the core consumes: `load_text`/`write_text`.
//! Kept separate from the evaluator so the core never touches `std::fs`
//! directly.

use std::fs;
use std::path::Path;

use crate::error::{ErrorKind, FmtError, Result};

pub fn load_text(path: &str) -> Result<String> {
    let text = fs::read_to_string(path)
        .map_err(|e| FmtError::new(ErrorKind::FileLoad, 0, format!("couldn't read '{path}': {e}")))?;

    if text.is_empty() {
        return Err(FmtError::new(ErrorKind::FileLoad, 0, format!("'{path}' is empty")));
    }

    Ok(text)
}

pub fn write_text(path: &str, contents: &str) -> Result<()> {
    let target = Path::new(path);
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| FmtError::new(ErrorKind::FileLoad, 0, format!("couldn't create '{}': {e}", parent.display())))?;
        }
    }

    fs::write(target, contents)
        .map_err(|e| FmtError::new(ErrorKind::FileLoad, 0, format!("couldn't write '{path}': {e}")))
}
