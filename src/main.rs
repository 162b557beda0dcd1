//! boardgame-rag CLI entry point

use boardgame_rag::{
    commands::{
        cmd_ask, cmd_ingest, cmd_init, cmd_list_games, cmd_prune, cmd_rulebook_status, cmd_serve,
        cmd_status, print_ask_result, print_games, print_ingest_stats, print_init,
        print_prune_stats, print_rulebook, print_status, InitOptions, Services,
    },
    config::Config,
    ingest::GameRef,
    progress::LogWriterFactory,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "boardgame-rag")]
#[command(version, about = "Board-game rulebook ingestion and retrieval service", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run the HTTP API and ingestion workers
    Serve,

    /// Ingest a rulebook PDF or a directory of PDFs
    Ingest {
        /// File or directory to ingest
        path: PathBuf,

        #[command(flatten)]
        game: GameArgs,
    },

    /// Retrieve rulebook passages answering a question
    Ask {
        /// Game to search
        game_id: i64,

        /// The question
        question: String,

        /// Number of passages
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show service status, or one rulebook's processing state
    Status {
        /// Rulebook to inspect
        rulebook_id: Option<i64>,
    },

    /// List games
    Games,

    /// Purge vectors left behind by failed rulebooks
    Prune {
        /// Only list what would be purged
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct GameArgs {
    /// Game title (created if missing)
    #[arg(long)]
    game: Option<String>,

    /// Existing game id
    #[arg(long)]
    game_id: Option<i64>,
}

impl GameArgs {
    fn into_ref(self) -> GameRef {
        match (self.game_id, self.game) {
            (Some(id), _) => GameRef::Id(id),
            (None, Some(title)) => GameRef::Title(title),
            (None, None) => GameRef::Title(String::new()),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(LogWriterFactory))
            .with(filter)
            .init();
    }
}

fn emit<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Init { force } => {
            let config_path = cli.config.unwrap_or_else(Config::default_config_path);
            let config = cmd_init(InitOptions { config_path, force }).await?;
            print_init(&config);
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "boardgame-rag", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            cmd_serve(config).await?;
        }

        Commands::Ingest { path, game } => {
            let services = Services::open(&config).await?;
            services.index.ensure_ready().await?;
            let pipeline = services.pipeline(&config);
            let stats = cmd_ingest(&pipeline, &path, game.into_ref()).await?;
            emit(cli.json, &stats, print_ingest_stats)?;
        }

        Commands::Ask { game_id, question, k } => {
            let services = Services::open(&config).await?;
            let engine = services.retrieval(&config);
            let result = cmd_ask(&engine, game_id, &question, k).await?;
            emit(cli.json, &result, print_ask_result)?;
        }

        Commands::Status { rulebook_id } => {
            let services = Services::open(&config).await?;
            match rulebook_id {
                Some(id) => {
                    let rulebook = cmd_rulebook_status(&services.db, id).await?;
                    emit(cli.json, &rulebook, print_rulebook)?;
                }
                None => {
                    let status = cmd_status(&config, &services.db, services.index.as_ref()).await?;
                    emit(cli.json, &status, print_status)?;
                }
            }
        }

        Commands::Games => {
            let services = Services::open(&config).await?;
            let games = cmd_list_games(&services.db).await?;
            emit(cli.json, &games, |g| print_games(g))?;
        }

        Commands::Prune { dry_run } => {
            let services = Services::open(&config).await?;
            let pipeline = services.pipeline(&config);
            let stats = cmd_prune(&services.db, &pipeline, dry_run).await?;
            emit(cli.json, &stats, |s| print_prune_stats(s, dry_run))?;
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
