use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

// `#[zbus::proxy]` generates `FinderProxy` (async) and
// `FinderProxyBlocking`. Only the async variant is used here.
#[zbus::proxy(
    interface = "org.kidfind.Finder1",
    default_service = "org.kidfind.Finder1",
    default_path = "/org/kidfind/Finder1"
)]
trait Finder {
    async fn train(&self, collection_id: &str, staged_image_dir: &str) -> zbus::Result<bool>;
    async fn train_all(&self) -> zbus::Result<Vec<String>>;
    async fn match_image(&self, collection_id: &str, image_path: &str) -> zbus::Result<bool>;
    async fn match_chat_image(&self, chat_id: &str, image_path: &str) -> zbus::Result<(bool, String, String)>;
    async fn create_collection(&self, collection_id: &str) -> zbus::Result<()>;
    async fn delete_collection(&self, collection_id: &str) -> zbus::Result<()>;
    async fn list_collections(&self) -> zbus::Result<String>;
    async fn configured_collections(&self) -> zbus::Result<Vec<String>>;
    async fn list_training_images(&self, collection_id: &str) -> zbus::Result<Vec<String>>;
    async fn collection_for_chat(&self, chat_id: &str) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "kidfind", about = "Train and query per-child face collections")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrain a collection from its staged images
    Train {
        collection: String,
        /// Staging directory (defaults to the daemon's directory for the collection)
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// Retrain every staged collection
    TrainAll,
    /// Check whether an image shows the collection's child
    Match {
        collection: String,
        image: String,
    },
    /// Resolve a chat's collection and match an image against it
    MatchChat {
        chat_id: String,
        image: String,
    },
    /// Create an empty collection
    Create { collection: String },
    /// Delete a collection and its classifier
    Delete { collection: String },
    /// List staged and trained collections
    List,
    /// List collections named in the routing file
    Configured,
    /// List a collection's staged training images
    Images { collection: String },
    /// Show which collection a chat is routed to
    Chat { chat_id: String },
    /// Show daemon status
    Status,
}

/// The daemon resolves paths against its own working directory, so
/// relative paths are made absolute here first.
fn absolute(path: &str) -> Result<String> {
    let path = Path::new(path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(path)
    };
    Ok(resolved.display().to_string())
}

fn pretty(json: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| json.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = if cli.system {
        zbus::Connection::system().await?
    } else {
        zbus::Connection::session().await?
    };
    let finder = FinderProxy::new(&connection).await?;
    tracing::debug!(system_bus = cli.system, "connected to kidfindd");

    match cli.command {
        Commands::Train { collection, dir } => {
            let dir = dir.as_deref().map(absolute).transpose()?.unwrap_or_default();
            let ok = finder.train(&collection, &dir).await?;
            if ok {
                println!("Collection {collection} trained");
            } else {
                println!("Training {collection} failed (see kidfindd log)");
                std::process::exit(1);
            }
        }
        Commands::TrainAll => {
            let trained = finder.train_all().await?;
            if trained.is_empty() {
                println!("No collection had enough staged images to train");
            }
            for id in trained {
                println!("Collection {id} trained");
            }
        }
        Commands::Match { collection, image } => {
            let matched = finder.match_image(&collection, &absolute(&image)?).await?;
            println!("{}", if matched { "match" } else { "no match" });
        }
        Commands::MatchChat { chat_id, image } => {
            let (matched, collection, target) = finder.match_chat_image(&chat_id, &absolute(&image)?).await?;
            if collection.is_empty() {
                println!("Chat {chat_id} is not routed to any collection");
            } else if matched {
                println!("match in {collection}; forward to {target}");
            } else {
                println!("no match in {collection}");
            }
        }
        Commands::Create { collection } => {
            finder.create_collection(&collection).await?;
            println!("Collection {collection} ready");
        }
        Commands::Delete { collection } => {
            finder.delete_collection(&collection).await?;
            println!("Collection {collection} deleted");
        }
        Commands::List => println!("{}", pretty(&finder.list_collections().await?)),
        Commands::Configured => {
            for id in finder.configured_collections().await? {
                println!("{id}");
            }
        }
        Commands::Images { collection } => {
            for path in finder.list_training_images(&collection).await? {
                println!("{path}");
            }
        }
        Commands::Chat { chat_id } => {
            let collection = finder.collection_for_chat(&chat_id).await?;
            if collection.is_empty() {
                println!("Chat {chat_id} is not routed");
            } else {
                println!("{collection}");
            }
        }
        Commands::Status => println!("{}", pretty(&finder.status().await?)),
    }

    Ok(())
}
