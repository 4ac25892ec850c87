//! Fixed-text built-in commands.
//!
//! `help` and the whole `npm`/`node` surface are canned output: nothing here
//! executes code or manages packages. Lines come back tagged with a tone so
//! the caller can send them through the output pipeline.

use crate::runtime::NodeInvocation;
use crate::style::Tone;

pub type Lines = Vec<(Tone, String)>;

fn plain(text: &str) -> (Tone, String) {
    (Tone::Plain, text.to_string())
}

pub fn help_lines() -> Lines {
    vec![
        (Tone::Heading, "=== runbox Terminal Help ===".to_string()),
        plain(""),
        (Tone::Warning, "Python Commands:".to_string()),
        plain("  python -c \"code\"           Run Python code"),
        plain("  python -m module           Run Python module (not supported)"),
        plain("  python file.py             Execute Python file (not supported)"),
        plain(""),
        (Tone::Warning, "Node.js/npm Commands:".to_string()),
        plain("  npm list                   List installed packages"),
        plain("  npm install [pkg]          Install package"),
        plain("  npm run [script]           Run npm script"),
        plain("  node file.js               Execute JavaScript file"),
        plain(""),
        (Tone::Warning, "Utility Commands:".to_string()),
        plain("  ls                         List files"),
        plain("  pwd                        Print working directory"),
        plain("  clear                      Clear screen"),
        plain("  help                       Show this help"),
        plain(""),
        (Tone::Warning, "Keys:".to_string()),
        plain("  Up/Down                    Navigate command history"),
        plain("  Ctrl+C                     Request cancellation of the running code"),
    ]
}

/// `installed` is listed by `npm list`; the rest is fixed text.
pub fn node_lines(invocation: &NodeInvocation, installed: &[String]) -> Lines {
    match invocation {
        NodeInvocation::NpmMissingScript => {
            vec![(Tone::Warning, "npm ERR! missing script".to_string())]
        }
        NodeInvocation::NpmList => {
            let mut lines = vec![(Tone::Info, "📦 Installed packages:".to_string())];
            if installed.is_empty() {
                lines.push(plain("(none)"));
            }
            lines.extend(installed.iter().map(|p| plain(p)));
            lines
        }
        NodeInvocation::NpmInstall(pkg) => {
            let pkg = pkg.as_deref().unwrap_or("packages");
            vec![
                (Tone::Warning, format!("⏳ Installing {}...", pkg)),
                (Tone::Success, format!("✔ {} installed", pkg)),
            ]
        }
        NodeInvocation::NpmRun(script) => vec![
            (
                Tone::Warning,
                format!("▶ Running script: {}", script.as_deref().unwrap_or("")),
            ),
            (Tone::Error, "ℹ Script not found in package.json".to_string()),
        ],
        NodeInvocation::NpmUnsupported(sub) => {
            vec![(Tone::Warning, format!("⚠ npm {} not fully supported", sub))]
        }
        NodeInvocation::NodeRepl => vec![
            plain("Node.js v18.0.0"),
            plain("(Node REPL not supported)"),
        ],
        NodeInvocation::NodeFile(args) => {
            vec![(Tone::Warning, format!("⚠ File execution: node {}", args))]
        }
    }
}

/// `512 B`, `2.5 KB`, `1.2 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}
