/// One line of terminal input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Print the component tree.
    Tree,
    /// Print the most recent render trace.
    Trace,
    /// Print the screen as HTML.
    Html,
    /// Anything that is not a command goes to the app.
    Line(String),
    Unknown(String),
}

impl Command {
    /// Parses a line; commands start with `:` or `/`. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix(':').or_else(|| line.strip_prefix('/')) else {
            return Some(Command::Line(line.to_string()));
        };
        let name = rest.split_whitespace().next()?;
        Some(match name {
            "q" | "quit" | "exit" => Command::Quit,
            "tree" => Command::Tree,
            "trace" => Command::Trace,
            "html" => Command::Html,
            other => Command::Unknown(other.to_string()),
        })
    }
}
