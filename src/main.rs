use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use scenesmith::chat::OpenAiInvoker;
use scenesmith::config::{AppConfig, API_KEY_ENV};
use scenesmith::probe::HttpProbe;
use scenesmith::session::{self, SessionDeps, SessionOutput};
use scenesmith::store::{HistoryStore, SqliteStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scenesmith",
    about = "Generate policy-checked Three.js scene scripts with a chat model",
    version
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "scenesmith.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new session and generate a scene script
    Generate {
        /// What to draw
        prompt: String,
    },
    /// Continue an existing session with a follow-up request
    Resume {
        user_id: String,
        prompt: String,
    },
    /// Print the last generated script for a session
    Show { user_id: String },
    /// Count stored sessions
    Sessions,
    /// Delete one session's history
    Delete { user_id: String },
    /// Delete all stored history
    DeleteAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scenesmith=info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let store = SqliteStore::open(&config.database_path)?;

    match args.command {
        Command::Generate { prompt } => {
            let invoker = build_invoker(&config)?;
            let probe = HttpProbe::new(Duration::from_secs(config.generation.probe_timeout_secs));
            let deps = SessionDeps {
                invoker: &invoker,
                probe: &probe,
                store: &store,
            };
            print_output(&session::start(&config, &deps, &prompt).await?);
        }
        Command::Resume { user_id, prompt } => {
            let invoker = build_invoker(&config)?;
            let probe = HttpProbe::new(Duration::from_secs(config.generation.probe_timeout_secs));
            let deps = SessionDeps {
                invoker: &invoker,
                probe: &probe,
                store: &store,
            };
            print_output(&session::resume(&config, &deps, &user_id, &prompt).await?);
        }
        Command::Show { user_id } => {
            print_output(&session::last_source(&store, &user_id)?);
        }
        Command::Sessions => {
            println!("{}", store.distinct_user_count()?);
        }
        Command::Delete { user_id } => {
            println!("deleted {} records", store.delete(&user_id)?);
        }
        Command::DeleteAll => {
            println!("deleted {} records", store.delete_all()?);
        }
    }

    Ok(())
}

fn build_invoker(config: &AppConfig) -> Result<OpenAiInvoker> {
    let api_key = config
        .api_key()
        .ok_or_else(|| anyhow!("{API_KEY_ENV} is not set and the config carries no apiKey"))?;
    Ok(OpenAiInvoker::new(api_key, config.api.model.clone()))
}

fn print_output(output: &SessionOutput) {
    println!("session: {}", output.user_id);
    println!("{}", output.content);
}
