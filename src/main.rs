use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

use my_places::client::{Completion, ConsoleMap, HttpTransport, MapSession, MarkerPhase};
use my_places::config::{Config, DEFAULT_CONFIG_PATH};
use my_places::import::{import, ImportFile};
use my_places::settings::{SettingKey, SettingsStore};
use my_places::storage::open_storage;
use my_places::templates::ClientConfig;
use my_places::{logging, metrics, server};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "my_places")]
#[command(about = "Place directory: curated places on a map with category filters")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create categories and published places from a TOML file
    Import {
        file: PathBuf,
    },
    /// Read or write one of the map settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run one fetch cycle against a running server and print the pins
    Browse {
        /// The server's get_places endpoint
        #[arg(long, default_value = "http://localhost:8080/ajax/get_places")]
        url: String,
        /// Category ids to filter by (comma-separated); all places when omitted
        #[arg(long)]
        placetypes: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting, or all of them when no key is given
    Get { key: Option<String> },
    /// Store a setting
    Set { key: String, value: String },
}

fn parse_placetypes(list: Option<&str>) -> anyhow::Result<Vec<Uuid>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).map_err(|e| anyhow::anyhow!("invalid category id '{s}': {e}")))
        .collect()
}

async fn run_settings(config: &Config, action: SettingsAction) -> anyhow::Result<()> {
    let path = match action {
        SettingsAction::Set { .. } => config.persistent_database_path()?,
        SettingsAction::Get { .. } => config.database.path.as_str(),
    };
    let store = SettingsStore::new(open_storage(path)?);
    match action {
        SettingsAction::Get { key: Some(key) } => {
            let key: SettingKey = key.parse()?;
            println!("{}", store.get(key).await?.unwrap_or_default());
        }
        SettingsAction::Get { key: None } => {
            let settings = store.load().await?;
            for key in SettingKey::ALL {
                println!("{} = {}", key, settings.get(key));
            }
        }
        SettingsAction::Set { key, value } => {
            let key: SettingKey = key.parse()?;
            store.set(key, &value).await?;
            println!("✅ {key} updated");
        }
    }
    Ok(())
}

async fn run_browse(url: String, placetypes: Option<String>) -> anyhow::Result<()> {
    let categories = parse_placetypes(placetypes.as_deref())?;
    let client_config = ClientConfig {
        ajax_url: url.clone(),
        google_maps_latitude: String::new(),
        google_maps_longitude: String::new(),
        google_maps_zoom: String::new(),
    };
    let mut session = MapSession::new(
        ConsoleMap::default(),
        &client_config,
        categories,
        HttpTransport::new(url),
    );

    if session.refresh().await == Completion::Stale {
        return Ok(());
    }
    match session.markers().phase() {
        MarkerPhase::Populated => println!("\n📊 {} places on the map", session.markers().pin_count()),
        MarkerPhase::Failed(message) => println!("\n❌ {message}"),
        _ => println!("\n📭 No places"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            metrics::init_metrics();
            info!("Starting my_places server");
            if let Err(e) = server::start_server(&config).await {
                error!("Server failed: {}", e);
                return Err(e);
            }
        }
        Commands::Import { file } => {
            let content = fs::read_to_string(&file)?;
            let storage = open_storage(config.persistent_database_path()?)?;
            let summary = import(storage.as_ref(), ImportFile::from_toml(&content)?).await?;
            println!(
                "✅ Imported {} categories and {} places",
                summary.categories_created, summary.places_created
            );
        }
        Commands::Settings { action } => run_settings(&config, action).await?,
        Commands::Browse { url, placetypes } => run_browse(url, placetypes).await?,
    }

    Ok(())
}
