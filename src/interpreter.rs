use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::error::is_fatal;
use crate::lexer;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use tracing::{debug, error};

/// Prompt printed before each command line unless configured otherwise.
pub const DEFAULT_PROMPT: &str = "# ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, see [`crate::builtin`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Interactive interpreter that launches, tracks and kills external programs.
///
/// The interpreter owns an [`Environment`], which holds the registry of
/// background processes, and a list of [`CommandFactory`] objects queried to
/// create commands by name. See [`Default`] for the commands included out of
/// the box.
///
/// Example
/// ```
/// use mysh::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("whereami", &[]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    prompt: String,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run a single command invocation by name with arguments, printing to stdout.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        self.run_with_output(name, args, &mut std::io::stdout())
    }

    fn run_with_output(
        &mut self,
        name: &str,
        args: &[&str],
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(name, args) {
                return cmd.execute(stdout, &mut self.env);
            }
        }
        Err(anyhow::anyhow!("Invalid command. Please try again"))
    }

    /// Record `line` in the history, split it and dispatch on the first word.
    ///
    /// Blank lines are ignored.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let tokens = lexer::split_into_tokens(line);
        let Some((name, args)) = tokens.split_first() else {
            return Ok(0);
        };
        self.env.history.record(line.trim());
        debug!(command = %name, ?args, "dispatch");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_with_output(name, &args, stdout)
    }

    /// Read-Eval-Print Loop over the terminal.
    ///
    /// Returns `Ok` after `quit` or end of input, and an error when a command hit
    /// a failure the interpreter can't recover from.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = std::io::stdout();

        while !self.env.should_exit {
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let result = self.execute_line(&line, &mut stdout);
                    report_failure(result, &mut stdout)?;
                    stdout.flush()?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    self.run_with_output("quit", &[], &mut stdout)?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

/// Print a non-fatal command error and carry on. A fatal one is handed back
/// untouched; `main` prints it once on the way out.
fn report_failure(result: anyhow::Result<ExitCode>, stdout: &mut dyn Write) -> anyhow::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_fatal(&e) => {
            error!(error = %e, "giving up");
            Err(e)
        }
        Err(e) => Ok(writeln!(stdout, "{}", e)?),
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Run>::default()),
            Box::new(Factory::<Background>::default()),
            Box::new(Factory::<Exterminate>::default()),
            Box::new(Factory::<ExterminateAll>::default()),
            Box::new(Factory::<Repeat>::default()),
            Box::new(Factory::<Processes>::default()),
            Box::new(Factory::<ChangeDir>::default()),
            Box::new(Factory::<WhereAmI>::default()),
            Box::new(Factory::<LastCommands>::default()),
            Box::new(Factory::<Quit>::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sh: &mut Interpreter, text: &str) -> (anyhow::Result<ExitCode>, String) {
        let mut out = Vec::new();
        let res = sh.execute_line(text, &mut out);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_unknown_command() {
        let mut sh = Interpreter::default();
        let (res, _) = line(&mut sh, "frobnicate now");
        assert_eq!(res.unwrap_err().to_string(), "Invalid command. Please try again");
    }

    #[test]
    fn test_blank_line_is_not_recorded() {
        let mut sh = Interpreter::default();
        let (res, out) = line(&mut sh, "   ");
        assert_eq!(res.unwrap(), 0);
        assert!(out.is_empty());
        assert!(sh.env().history.is_empty());
    }

    #[test]
    fn test_history_includes_current_line() {
        let mut sh = Interpreter::default();
        line(&mut sh, "whereami").0.unwrap();
        let _ = line(&mut sh, "bogus");
        let (res, out) = line(&mut sh, "lastcommands");
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "whereami\nbogus\nlastcommands\n");
    }

    #[test]
    fn test_background_exterminate_session() {
        let mut sh = Interpreter::default();
        let (_, out) = line(&mut sh, "background /bin/sleep\t100");
        let pid = out.trim().trim_matches(['[', ']']).to_string();
        assert_eq!(sh.env().registry.len(), 1);

        let (res, out) = line(&mut sh, &format!("exterminate {}", pid));
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, format!("[{}] was killed\n", pid));
        assert!(sh.env().registry.is_empty());

        let (res, _) = line(&mut sh, &format!("exterminate {}", pid));
        assert_eq!(res.unwrap(), 1);
    }

    #[test]
    fn test_repeat_then_exterminateall_session() {
        let mut sh = Interpreter::default();
        let (res, out) = line(&mut sh, "repeat 3 /bin/sh -c exit");
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out.lines().count(), 3);
        assert_eq!(sh.env().registry.len(), 3);

        let (_, out) = line(&mut sh, "exterminateall");
        assert!(out.contains("Total of 3 processes"));
        assert!(sh.env().registry.is_empty());
    }

    #[test]
    fn test_fatal_error_is_returned_not_printed() {
        use crate::error::SpawnError;
        use nix::errno::Errno;

        let mut out = Vec::new();
        let err = report_failure(Err(SpawnError::ForkFailed(Errno::EAGAIN).into()), &mut out)
            .unwrap_err();
        assert!(err.to_string().starts_with("fork failed: EAGAIN"));
        assert!(out.is_empty());

        let invalid = anyhow::anyhow!("Invalid command. Please try again");
        report_failure(Err(invalid), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Invalid command. Please try again\n");
    }

    #[test]
    fn test_quit_stops_loop() {
        let mut sh = Interpreter::default();
        let (res, _) = line(&mut sh, "quit");
        assert_eq!(res.unwrap(), 0);
        assert!(sh.env().should_exit);
    }

    #[test]
    fn test_custom_factories() {
        let mut sh =
            Interpreter::new(vec![Box::new(Factory::<crate::builtin::WhereAmI>::default())]);
        assert!(line(&mut sh, "whereami").0.is_ok());
        assert!(line(&mut sh, "quit").0.is_err());
    }
}
