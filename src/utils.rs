use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Prefix of every in-flight temporary file.
pub const TEMP_PREFIX: &str = "._seaflow-transfer_";

const TEMP_TOKEN_LEN: usize = 7;

/// Builds a temporary name for `filename` that no transfer glob can match:
/// the leading `._` and trailing `_` keep it away from both `*.sfl` and the
/// capture-file pattern.
pub fn temp_name<R: Rng>(rng: &mut R, filename: &str) -> String {
    let token: String = rng
        .sample_iter(&Alphanumeric)
        .take(TEMP_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}{}.{}_", TEMP_PREFIX, token, filename)
}

/// True if `component` holds any glob metacharacter.
pub fn has_magic(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// Expands `pattern` by walking it one path component at a time.
///
/// `read_dir` lists a directory as `(name, is_dir)` pairs and must return an
/// empty list for a directory that does not exist. Used by backends that have
/// no native glob.
pub fn glob_with<F>(pattern: &str, mut read_dir: F) -> io::Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> io::Result<Vec<(String, bool)>>,
{
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !has_magic(&text) {
            base.push(component.as_os_str());
        } else {
            let compiled = Pattern::new(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
            rest.push(compiled);
        }
    }

    if rest.is_empty() {
        // Purely literal pattern: match only if the entry exists.
        let (Some(parent), Some(name)) = (base.parent(), base.file_name()) else {
            return Ok(Vec::new());
        };
        let name = name.to_string_lossy();
        let found = read_dir(parent)?.iter().any(|(n, _)| *n == name);
        return Ok(if found { vec![base] } else { Vec::new() });
    }

    let mut current = vec![base];
    let last = rest.len() - 1;
    for (depth, pattern) in rest.iter().enumerate() {
        let mut next = Vec::new();
        for dir in &current {
            let listing_dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir.as_path()
            };
            let mut entries = read_dir(listing_dir)?;
            entries.sort();
            for (name, is_dir) in entries {
                if name == "." || name == ".." {
                    continue;
                }
                if depth != last && !is_dir {
                    continue;
                }
                if pattern.matches(&name) {
                    next.push(dir.join(&name));
                }
            }
        }
        current = next;
    }
    current.sort();
    Ok(current)
}
