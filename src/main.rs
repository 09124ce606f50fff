use argh::FromArgs;
use mysh::{DEFAULT_PROMPT, Interpreter};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `MYSH_LOG=mysh=trace`.
const LOG_ENV: &str = "MYSH_LOG";

#[derive(FromArgs)]
/// Interactive shell that runs programs and exterminates background ones.
struct Args {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before each command line.
    prompt: String,

    #[argh(switch, short = 'v')]
    /// log process activity to stderr.
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);
    Interpreter::default().with_prompt(args.prompt).repl()
}
