use crate::registry::ProcessRegistry;
use std::env as stdenv;
use std::path::PathBuf;

/// Lines the user entered during this session, oldest first.
#[derive(Debug, Default, Clone)]
pub struct History {
    lines: Vec<String>,
}

impl History {
    pub fn record(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Drop every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.lines.len();
        self.lines.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Mutable state of one interpreter session.
///
/// The environment contains:
/// - `current_dir`: the working directory children are started in.
/// - `registry`: background processes started by this session.
/// - `history`: command lines accepted so far.
/// - `should_exit`: set by `quit`; the REPL stops once it sees it.
#[derive(Debug, Clone)]
pub struct Environment {
    pub current_dir: PathBuf,
    pub registry: ProcessRegistry,
    pub history: History,
    pub should_exit: bool,
}

impl Environment {
    /// Start a session in the process's current directory with nothing running.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            registry: ProcessRegistry::new(),
            history: History::default(),
            should_exit: false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
