use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shepherd_cli::app::App;
use shepherd_cli::cli::commands;
use shepherd_cli::shell;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "shepherd")]
#[command(version)]
#[command(about = "Debug your AI agents like you debug your code")]
#[command(long_about = "Shepherd inspects AI agent sessions recorded by the AIOBS\n\
    observability service, and traces and sessions recorded by Langfuse.\n\
    The 'sessions' and 'traces' commands use the default provider; 'aiobs'\n\
    and 'langfuse' reach one provider explicitly. Run 'shepherd' with no\n\
    arguments for an interactive shell.")]
#[command(after_help = "EXAMPLES:\n    \
    shepherd config init                   Store your AIOBS API key\n    \
    shepherd sessions list                 List sessions, most recent first\n    \
    shepherd sessions get <id>             Show a session's trace tree\n    \
    shepherd sessions search -p openai     Search by provider\n    \
    shepherd langfuse traces list          List Langfuse traces\n    \
    shepherd                               Start the interactive shell\n\n\
    For more information about a command, run 'shepherd <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List, fetch, search and compare sessions
    #[command(long_about = "Fetches sessions from the default provider. Search filters\n\
        combine with AND; repeated --label values must all match. Results are\n\
        sorted by start time, most recent first. search and diff need aiobs.")]
    Sessions(commands::sessions::Args),

    /// List and inspect traces (langfuse)
    #[command(long_about = "Fetches traces from the default provider. Only langfuse\n\
        records traces; switch with 'shepherd config set provider langfuse'.")]
    Traces(commands::traces::Args),

    /// AIOBS sessions, whatever the default provider
    Aiobs(commands::aiobs::Args),

    /// Langfuse traces and sessions, whatever the default provider
    #[command(long_about = "Talks to Langfuse directly. Keys come from\n\
        LANGFUSE_PUBLIC_KEY and LANGFUSE_SECRET_KEY when set, otherwise from\n\
        the config file. LANGFUSE_HOST overrides langfuse.host.")]
    Langfuse(commands::langfuse::Args),

    /// View and manage configuration settings
    #[command(long_about = "Provides subcommands to initialize, show, get, and set\n\
        configuration values. Configuration is stored in\n\
        ~/.shepherd/config.yaml. AIOBS_API_KEY and the LANGFUSE_* variables\n\
        override the stored keys.")]
    Config(commands::config::Args),

    /// Show version information
    Version,

    /// Start the interactive shell
    #[command(long_about = "Starts a shell that accepts the same commands without the\n\
        'shepherd' prefix, with history and tab completion. A leading '/'\n\
        is optional: '/sessions list' and 'sessions list' are equivalent.")]
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "shepherd_cli=debug"
    } else {
        "shepherd_cli=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let mut app = App::new()?;

    match cli.command {
        Some(Commands::Sessions(args)) => commands::sessions::run(&mut app, args),
        Some(Commands::Traces(args)) => commands::traces::run(&mut app, args),
        Some(Commands::Aiobs(args)) => commands::aiobs::run(&mut app, args),
        Some(Commands::Langfuse(args)) => commands::langfuse::run(&mut app, args),
        Some(Commands::Config(args)) => commands::config::run(&mut app, args),
        Some(Commands::Version) => commands::version::run(&mut app),
        Some(Commands::Shell) | None => shell::run(&mut app),
    }
}
