use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pokesync::catalog::{EvolutionLine, SearchView};
use pokesync::config::{self, Config};
use pokesync::display::{
  capitalize, format_ability_name, format_stat_name, padded_number, pixel_sprite_url, share_text,
};
use pokesync::favorites::{
  FavoriteStore, MemoryFavoriteStore, SqliteFavoriteStore, ToggleFavorite, ToggleOutcome,
};
use pokesync::pokeapi::{CatalogEntry, PokeApiClient};
use pokesync::Dex;

#[derive(Parser, Debug)]
#[command(name = "pokesync")]
#[command(about = "Browse the PokéAPI catalog through a local query cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pokesync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log to stderr instead of the log file
  #[arg(long)]
  log_stderr: bool,

  /// Print JSON instead of text
  #[arg(long)]
  json: bool,

  /// Keep favorites in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the catalog page by page
  List {
    /// Number of pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
  },
  /// Search the full catalog by name
  Search { query: String },
  /// Show one entry with its evolution line
  Show { name: String },
  /// List favorites
  Favorites,
  /// Add or remove a favorite
  Toggle { name: String },
}

/// Initialize the tracing subscriber.
///
/// Logs go to a daily file under the data directory unless `to_stderr` is
/// set. Use RUST_LOG to control the level (default: pokesync=info).
fn init_tracing(to_stderr: bool) -> Result<Option<WorkerGuard>> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pokesync=info"));

  if to_stderr {
    tracing_subscriber::registry()
      .with(fmt::layer().with_writer(std::io::stderr))
      .with(filter)
      .init();
    return Ok(None);
  }

  let log_dir = config::data_dir()?.join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;
  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "pokesync.log"));
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(filter)
    .init();
  Ok(Some(guard))
}

fn open_store(config: &Config, ephemeral: bool) -> Result<Arc<dyn FavoriteStore>> {
  if ephemeral {
    return Ok(Arc::new(MemoryFavoriteStore::new()));
  }
  let path = config.favorites.database_path()?;
  Ok(Arc::new(SqliteFavoriteStore::open(&path)?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn print_entries(entries: &[CatalogEntry]) {
  for entry in entries {
    println!("#{}  {}", padded_number(entry.id), capitalize(&entry.name));
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_stderr)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  info!(base_url = %config.api.base_url, "pokesync starting");

  let client = PokeApiClient::new(&config.api)?;
  let store = open_store(&config, args.ephemeral)?;
  let dex = Dex::new(&config, Arc::new(client), store);
  let sweeper = dex.spawn_sweeper();

  let result = run(&dex, args.command, args.json).await;
  sweeper.abort();
  result
}

async fn run(dex: &Dex, command: Command, json: bool) -> Result<()> {
  match command {
    Command::List { pages } => {
      let mut pager = dex.pager();
      for _ in 0..pages.max(1) {
        if !pager.load_next().await? {
          break;
        }
      }
      let entries = pager.entries();
      if json {
        return print_json(&entries);
      }
      print_entries(&entries);
      if pager.has_more() {
        println!("... more available (--pages {})", pager.pages().len() + 1);
      }
    }

    Command::Search { query } => {
      let mut browser = dex.browser();
      browser.set_query(query);
      if !browser.is_searching() {
        browser.pager_mut().load_next().await?;
      }
      browser.settle_index().await;
      let view = browser.view();
      if let SearchView::IndexFailed(err) = &view {
        return Err(eyre!("Search index unavailable: {}", err));
      }
      if json {
        return print_json(&view.entries());
      }
      if view.entries().is_empty() {
        println!("No results");
      }
      print_entries(view.entries());
    }

    Command::Show { name } => {
      let details = dex.details();
      let (detail, line) = tokio::join!(details.fetch_detail(&name), details.evolution_line(&name));
      let detail = detail?;
      let is_favorite = dex.favorites().is_favorite(detail.id).await?;

      let evolutions = match &line {
        Ok(EvolutionLine::Lineage(entries)) => Some(entries.clone()),
        Ok(EvolutionLine::NoEvolutionData) => None,
        Err(err) => {
          tracing::warn!(error = %err, "evolution line unavailable");
          None
        }
      };

      if json {
        return print_json(&serde_json::json!({
          "detail": detail,
          "evolutions": evolutions,
          "is_favorite": is_favorite,
          "share": share_text(detail.id, &detail.name),
        }));
      }

      let star = if is_favorite { " ★" } else { "" };
      println!("#{} {}{}", padded_number(detail.id), capitalize(&detail.name), star);
      println!("  Sprite:    {}", pixel_sprite_url(detail.id));
      let types: Vec<String> = detail.type_names().map(capitalize).collect();
      println!("  Types:     {}", types.join(", "));
      let abilities: Vec<String> = detail
        .abilities
        .iter()
        .map(|a| format_ability_name(&a.ability_name))
        .collect();
      println!("  Abilities: {}", abilities.join(", "));
      println!("  Height:    {:.1} m", detail.height_m());
      println!("  Weight:    {:.1} kg", detail.weight_kg());
      if let Some(exp) = detail.base_experience {
        println!("  Base exp:  {}", exp);
      }
      for stat in &detail.stats {
        println!("  {:<16} {}", format_stat_name(&stat.stat_name), stat.base_value);
      }
      match line {
        Ok(EvolutionLine::Lineage(entries)) => {
          let names: Vec<String> = entries.iter().map(|e| capitalize(&e.name)).collect();
          println!("  Evolution: {}", names.join(" → "));
        }
        Ok(EvolutionLine::NoEvolutionData) => println!("  Evolution: no evolution data"),
        Err(err) => println!("  Evolution: unavailable ({})", err),
      }
      println!("  Share:     {}", share_text(detail.id, &detail.name));
    }

    Command::Favorites => {
      let favorites = dex.favorites().list_favorites().await?;
      if json {
        return print_json(&favorites);
      }
      if favorites.is_empty() {
        println!("No favorites yet");
      }
      for favorite in &favorites {
        println!(
          "#{}  {}",
          padded_number(favorite.pokemon_id),
          capitalize(&favorite.name)
        );
      }
    }

    Command::Toggle { name } => {
      let detail = dex.details().fetch_detail(&name).await?;
      let is_currently_favorite = dex.favorites().is_favorite(detail.id).await?;
      let outcome = dex
        .favorites()
        .toggle_favorite(ToggleFavorite {
          pokemon_id: detail.id,
          name: detail.name.clone(),
          image_url: None,
          is_currently_favorite,
        })
        .await?;

      if json {
        return print_json(&serde_json::json!({
          "pokemon_id": detail.id,
          "is_favorite": outcome.is_favorite(),
        }));
      }
      let label = capitalize(&detail.name);
      match outcome {
        ToggleOutcome::Added => println!("Added {} to favorites", label),
        ToggleOutcome::Removed => println!("Removed {} from favorites", label),
        ToggleOutcome::Unchanged { .. } => println!("{} changed elsewhere, nothing done", label),
      }
    }
  }

  Ok(())
}
