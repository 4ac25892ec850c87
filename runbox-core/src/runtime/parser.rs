/// A parsed command line. Every first token the terminal understands has a
/// variant; everything else is `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Python(PythonInvocation),
    Node(NodeInvocation),
    ListDir,
    Pwd,
    Clear,
    Help,
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PythonInvocation {
    /// `python -c CODE...`
    Inline(String),
    /// `python -m MODULE`
    Module(String),
    /// `python FILE.py`
    File(String),
    /// Bare `python`.
    Repl,
    /// A flag without its argument, or an unknown flag.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeInvocation {
    NpmMissingScript,
    NpmList,
    NpmInstall(Option<String>),
    NpmRun(Option<String>),
    NpmUnsupported(String),
    NodeRepl,
    NodeFile(String),
}

pub struct CommandParser;

impl CommandParser {
    /// `None` for a blank line.
    pub fn parse(input: &str) -> Option<Command> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let (cmd, args) = parts.split_first()?;

        let command = match *cmd {
            "python" | "python3" => Command::Python(Self::parse_python(args)),
            "npm" => Command::Node(Self::parse_npm(args)),
            "node" => Command::Node(if args.is_empty() {
                NodeInvocation::NodeRepl
            } else {
                NodeInvocation::NodeFile(args.join(" "))
            }),
            "ls" | "dir" => Command::ListDir,
            "pwd" => Command::Pwd,
            "clear" | "cls" => Command::Clear,
            "help" | "-h" | "--help" => Command::Help,
            other => Command::Unrecognized(other.to_string()),
        };
        Some(command)
    }

    fn parse_python(args: &[&str]) -> PythonInvocation {
        let Some(flag) = args.first() else {
            return PythonInvocation::Repl;
        };
        match (*flag, args.len() > 1) {
            ("-c", true) => PythonInvocation::Inline(unquote(&args[1..].join(" ")).to_string()),
            ("-m", true) => PythonInvocation::Module(args[1].to_string()),
            (file, _) if file.ends_with(".py") => PythonInvocation::File(file.to_string()),
            _ => PythonInvocation::Invalid,
        }
    }

    fn parse_npm(args: &[&str]) -> NodeInvocation {
        let Some(sub) = args.first() else {
            return NodeInvocation::NpmMissingScript;
        };
        let arg = args.get(1).map(|s| s.to_string());
        match *sub {
            "list" | "ls" => NodeInvocation::NpmList,
            "install" | "i" => NodeInvocation::NpmInstall(arg),
            "run" => NodeInvocation::NpmRun(arg),
            other => NodeInvocation::NpmUnsupported(other.to_string()),
        }
    }
}

/// Strip one layer of matching quotes: `"print(1)"` → `print(1)`.
fn unquote(code: &str) -> &str {
    for quote in ['"', '\''] {
        if code.len() >= 2 && code.starts_with(quote) && code.ends_with(quote) {
            return &code[1..code.len() - 1];
        }
    }
    code
}
