use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error;
use crate::interpreter::Factory;
use crate::supervisor::{self, Outcome};
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use nix::unistd::Pid;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Built-in commands known to the interpreter at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// in-process. The ones that start programs hand the work to [`supervisor`].
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "run" or "whereami".
    fn name() -> &'static str;

    /// Whether everything after the command name is a program command line that
    /// must reach the command untouched, dashes included.
    fn takes_command_line() -> bool {
        false
    }

    /// Executes the command, writing user-facing messages to `stdout`.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) if error::is_fatal(&e) => Err(e),
            Err(e) => {
                writeln!(stdout, "{}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        let parsed = if T::takes_command_line() && args.first() != Some(&"--help") {
            let mut verbatim = Vec::with_capacity(args.len() + 1);
            verbatim.push("--");
            verbatim.extend_from_slice(args);
            T::from_args(&[name], &verbatim)
        } else {
            T::from_args(&[name], args)
        };
        Some(match parsed {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::ExitedNormally(code) => code,
        Outcome::KilledBySignal(sig) | Outcome::Stopped(sig) => 128 + sig,
    }
}

#[derive(FromArgs)]
/// Run a program in the foreground and wait for it to finish.
pub struct Run {
    #[argh(positional, greedy)]
    /// path of the program followed by its arguments.
    pub command: Vec<String>,
}

impl BuiltinCommand for Run {
    fn name() -> &'static str {
        "run"
    }

    fn takes_command_line() -> bool {
        true
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(anyhow!("Missing program to run. Please try again"));
        };
        let outcome = supervisor::run_foreground(program, args, |stop| {
            // Shown while the wait is still blocked, so it can't go through `?`.
            if let Err(e) = writeln!(stdout, "{}", stop).and_then(|()| stdout.flush()) {
                warn!(error = %e, "can't report stopped child");
            }
        })?;
        writeln!(stdout, "{}", outcome)?;
        Ok(exit_code(outcome))
    }
}

#[derive(FromArgs)]
/// Start a program in the background and print its process id.
pub struct Background {
    #[argh(positional, greedy)]
    /// path of the program followed by its arguments.
    pub command: Vec<String>,
}

impl BuiltinCommand for Background {
    fn name() -> &'static str {
        "background"
    }

    fn takes_command_line() -> bool {
        true
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(anyhow!("Missing program. Please try again"));
        };
        let pid = supervisor::run_background(&mut env.registry, program, args)?;
        writeln!(stdout, "[{}]", pid)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Kill a background process started by this shell.
pub struct Exterminate {
    #[argh(positional)]
    /// process id as printed by `background`.
    pub pid: Option<String>,
}

impl BuiltinCommand for Exterminate {
    fn name() -> &'static str {
        "exterminate"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let pid = self
            .pid
            .as_deref()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|raw| *raw > 0)
            .map(Pid::from_raw)
            .ok_or_else(|| anyhow!("Missing or invalid process. Please try again"))?;
        supervisor::terminate(&mut env.registry, pid)?;
        writeln!(stdout, "[{}] was killed", pid)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Kill every background process started by this shell.
pub struct ExterminateAll {}

impl BuiltinCommand for ExterminateAll {
    fn name() -> &'static str {
        "exterminateall"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        if env.registry.is_empty() {
            writeln!(stdout, "No processes to kill")?;
            return Ok(1);
        }
        writeln!(stdout, "Killing processes...\n")?;
        let mut lines = Vec::new();
        let summary = supervisor::terminate_all(&mut env.registry, |pid, result| {
            lines.push(match result {
                Ok(()) => format!("[{}] was killed", pid),
                Err(e) => format!("[{}] {}", pid, e),
            });
        });
        for line in lines {
            writeln!(stdout, "{}", line)?;
        }
        writeln!(stdout, "\nTotal of {} processes", summary.killed)?;
        if summary.failed > 0 {
            writeln!(stdout, "{} could not be killed", summary.failed)?;
            return Ok(1);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Start a program in the background the given number of times.
pub struct Repeat {
    #[argh(positional, greedy)]
    /// how many copies to start (at least 1), then the program path and its arguments.
    pub command: Vec<String>,
}

impl BuiltinCommand for Repeat {
    fn name() -> &'static str {
        "repeat"
    }

    fn takes_command_line() -> bool {
        true
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let (count, command) = match self.command.split_first() {
            Some((count, rest)) => (count.parse::<i64>().ok().filter(|n| *n >= 1), rest),
            None => (None, &[][..]),
        };
        let count =
            count.ok_or_else(|| anyhow!("Missing or invalid number of repeats. Please try again"))?;
        let Some((program, args)) = command.split_first() else {
            return Err(anyhow!("Missing program. Please try again"));
        };
        let mut started = Vec::new();
        let result = supervisor::repeat(&mut env.registry, count, program, args, |pid| {
            started.push(pid)
        });
        // Print what did start even if a later fork failed.
        for pid in started {
            writeln!(stdout, "[{}]", pid)?;
        }
        result?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the background processes this shell still tracks.
pub struct Processes {}

impl BuiltinCommand for Processes {
    fn name() -> &'static str {
        "processes"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        if env.registry.is_empty() {
            writeln!(stdout, "No background processes")?;
            return Ok(0);
        }
        let listing: Vec<String> = env.registry.iter().map(|pid| format!("[{}]", pid)).collect();
        writeln!(stdout, "{}", listing.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct ChangeDir {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for ChangeDir {
    fn name() -> &'static str {
        "changedir"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = PathBuf::from(&self.target);
        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("changedir: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("changedir: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory.
pub struct WhereAmI {}

impl BuiltinCommand for WhereAmI {
    fn name() -> &'static str {
        "whereami"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the command lines entered so far, or forget them.
pub struct LastCommands {
    #[argh(switch, short = 'c')]
    /// clear the list instead of printing it.
    pub clear: bool,
}

impl BuiltinCommand for LastCommands {
    fn name() -> &'static str {
        "lastcommands"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        if self.clear {
            env.history.clear();
            return Ok(0);
        }
        for line in env.history.iter() {
            writeln!(stdout, "{}", line)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell. Background processes keep running.
pub struct Quit {}

impl BuiltinCommand for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.history.clear();
        env.should_exit = true;
        Ok(0)
    }
}
