//! Best-effort discovery of the modules a Python source wants.
//!
//! This is a lexical scan, not a parser. Only declarations starting in
//! column 0 are seen, so imports inside functions, `if` blocks or `try`
//! blocks are missed, as are the extra names in `import a, b`. A missed
//! module surfaces later as an ordinary `ModuleNotFoundError` from the code.

use regex::Regex;
use std::sync::OnceLock;

fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^(?:from[ \t]+([A-Za-z_]\w*)|import[ \t]+([A-Za-z_]\w*))")
            .expect("import pattern is a valid regex")
    })
}

/// Top-level package names imported by `source`, first occurrence order,
/// without duplicates and without `__future__`.
pub fn scan_imports(source: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in import_pattern().captures_iter(source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let name = name.as_str();
        if name == "__future__" || found.iter().any(|n| n == name) {
            continue;
        }
        found.push(name.to_string());
    }
    found
}
