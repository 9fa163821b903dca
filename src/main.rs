extern crate log;
pub mod config;
pub mod dashboard;
pub mod import;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod store;
pub mod surface;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::notify::ConsoleNotifier;
use crate::remote::client::HttpApiClient;
use crate::session::gate::SessionGate;
use crate::session::token::FileTokenStore;
use crate::store::cache::JsonFileCache;
use crate::store::feature_store::FeatureStore;
use crate::store::record::Identifier;
use crate::surface::map_surface::FeatureGroup;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, fs::read_to_string};

/// Draw, edit and upload GeoJSON shapes stored on a geodata server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Register { email: String, password: String },
    /// Log in and keep the session token in the data directory.
    Login { email: String, password: String },
    Logout,
    /// List the stored shapes.
    List,
    /// Save the GeoJSON feature or geometry in a file as a new shape.
    Draw { geojson_filepath: PathBuf },
    /// Replace the geometry of a shape with the one in a GeoJSON file.
    Edit {
        id: Identifier,
        geojson_filepath: PathBuf,
    },
    /// Delete shapes by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<Identifier>,
    },
    /// Upload every feature of a GeoJSON file.
    Import { filepath: PathBuf },
}

type CliDashboard =
    Dashboard<HttpApiClient, HttpApiClient, JsonFileCache, FeatureGroup, ConsoleNotifier>;

/// Read a file holding a single GeoJSON feature or a bare geometry.
fn read_feature(filepath: &Path) -> anyhow::Result<geojson::Feature> {
    let contents =
        read_to_string(filepath).with_context(|| format!("Reading {:?}", filepath))?;
    match contents.parse::<geojson::GeoJson>()? {
        geojson::GeoJson::Feature(feature) => Ok(feature),
        geojson::GeoJson::Geometry(geometry) => Ok(geojson::Feature::from(geometry)),
        geojson::GeoJson::FeatureCollection(_) => Err(anyhow!(
            "{:?} holds a FeatureCollection, use the import command instead",
            filepath
        )),
    }
}

fn read_geometry(filepath: &Path) -> anyhow::Result<geo::Geometry> {
    let geometry = read_feature(filepath)?
        .geometry
        .ok_or_else(|| anyhow!("{:?} has no geometry", filepath))?;
    Ok(geo::Geometry::try_from(geometry.value)?)
}

fn open_dashboard(
    session: SessionGate<HttpApiClient>,
    client: HttpApiClient,
    config: &Config,
) -> anyhow::Result<CliDashboard> {
    let mut dashboard = Dashboard::new(
        session,
        client,
        FeatureStore::new(JsonFileCache::in_dir(&config.data_dir)),
        FeatureGroup::new(),
        ConsoleNotifier,
    )
    .with_edit_policy(config.edit_policy);
    dashboard.open()?;
    Ok(dashboard)
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = Config::from_file(Path::new(&args.config_filepath))?;
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Creating data directory {:?}", config.data_dir))?;

    let tokens = Arc::new(FileTokenStore::in_dir(&config.data_dir));
    let client = HttpApiClient::new(&config.api_url, config.request_timeout(), tokens.clone())?;
    let mut session = SessionGate::new(client.clone(), tokens);

    match args.command {
        Command::Register { email, password } => {
            session.register(&email, &password)?;
            log::info!("Registration successful, please log in");
        }
        Command::Login { email, password } => {
            if let Err(err) = session.login(&email, &password) {
                let message = session.last_error().unwrap_or("Login failed").to_string();
                return Err(err.context(message));
            }
        }
        Command::Logout => {
            session.logout();
            log::info!("Logged out");
        }
        command => {
            session.restore();
            session
                .require_authenticated()
                .context("Log in first with the login command")?;
            let mut dashboard = open_dashboard(session, client, &config)?;
            match command {
                Command::List => {
                    for record in dashboard.reconciler().store().records() {
                        let kind = record.data["geometry"]["type"]
                            .as_str()
                            .or_else(|| record.data["type"].as_str())
                            .unwrap_or("unknown");
                        println!("{}\t{}", record.id, kind);
                    }
                }
                Command::Draw { geojson_filepath } => {
                    let id = dashboard.draw(read_feature(&geojson_filepath)?)?;
                    println!("{}", id);
                }
                Command::Edit {
                    id,
                    geojson_filepath,
                } => {
                    let report = dashboard.edit(&id, read_geometry(&geojson_filepath)?)?;
                    if !report.all_succeeded() {
                        log::warn!("The server did not accept the edit of shape {}", id);
                    }
                }
                Command::Delete { ids } => {
                    let report = dashboard.delete(&ids)?;
                    log::info!("Deleted {} shapes", report.len());
                }
                Command::Import { filepath } => {
                    let report = dashboard.import_file(&filepath)?;
                    for id in &report.created {
                        println!("{}", id);
                    }
                    if !report.failed.is_empty() {
                        log::warn!("{} features could not be imported", report.failed.len());
                    }
                }
                Command::Register { .. } | Command::Login { .. } | Command::Logout => {
                    return Err(anyhow!("{:?} does not run on the dashboard", command));
                }
            }
        }
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
