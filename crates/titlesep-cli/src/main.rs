use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use prometheus::{Registry, TextEncoder};
use std::path::PathBuf;
use std::sync::Arc;
use titlesep_client::HttpTransport;
use titlesep_core::{ConfigManager, LoggingConfig, SearchStatus, TitleSet};
use titlesep_graph::{ResultSink, SearchEvent, SearchRequest, SearchSession};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "titlesep")]
#[command(
    about = "Shortest chain of wins from a rated player to a titled player",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Rating code of the query player, e.g. 120787J
    code: String,

    /// Titles to look for, comma-separated (default: any title)
    #[arg(short, long)]
    titles: Option<String>,

    /// Diagnostic verbosity: 0, 1 or 2
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    debug: Option<u8>,

    /// Configuration file
    #[arg(short, long, env = "TITLESEP_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum search depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Skip the startup check of the primary endpoint
    #[arg(long)]
    no_probe: bool,

    /// Print remote-call metrics (Prometheus text format) after the search
    #[arg(long)]
    metrics: bool,
}

/// Writes search events to the terminal.
struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn emit(&self, event: SearchEvent) {
        let line = event.to_string();
        match &event {
            SearchEvent::Status(_) => println!("{line}"),
            SearchEvent::Progress(_) | SearchEvent::Diagnostic(_) => println!("{}", line.dimmed()),
            SearchEvent::Result { result, .. } => match result.status {
                SearchStatus::Found => println!("{}", line.green().bold()),
                SearchStatus::Exhausted => println!("{}", line.yellow().bold()),
                SearchStatus::PlayerNotFound => println!("{}", line.red().bold()),
            },
            SearchEvent::Elapsed(_) | SearchEvent::Lookups { .. } => println!("{}", line.cyan()),
            SearchEvent::Endpoint(_) | SearchEvent::Cache(_) => println!("  {}", line.cyan()),
            SearchEvent::Error(_) => eprintln!("{}", line.red().bold()),
        }
    }
}

fn default_filter(logging: &LoggingConfig) -> String {
    match logging.debug_level {
        0 => logging.level.clone(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(logging).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_metrics(registry: &Registry) -> Result<()> {
    let text = TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("Failed to encode metrics")?;
    print!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager =
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let config_path = manager.config_path().map(|p| p.display().to_string());
    let mut config = manager.into_config();
    if let Some(level) = cli.debug {
        config.logging.debug_level = level;
    }
    if let Some(depth) = cli.max_depth {
        config.search.max_depth = depth;
    }
    let config = ConfigManager::from_config(config)
        .context("Invalid command-line options")?
        .into_config();

    init_tracing(&config.logging);
    match &config_path {
        Some(path) => info!(path = %path, "loaded configuration file"),
        None => info!("no configuration file, using defaults"),
    }

    let titles = match cli.titles.as_deref() {
        Some(raw) => TitleSet::parse_list(raw).context("Invalid --titles value")?,
        None => TitleSet::all(),
    };

    let registry = Registry::new();
    titlesep_lb::metrics::register(&registry);

    let transport = Arc::new(HttpTransport::new().context("Failed to build HTTP client")?);
    let session = SearchSession::from_config(&config, transport)
        .context("Failed to set up search session")?;
    let sink = ConsoleSink;

    if !cli.no_probe {
        sink.emit(SearchEvent::Status("Checking primary endpoint...".to_string()));
        let reachable = session.probe().await;
        info!(reachable, "primary endpoint probe finished");
        if !reachable {
            sink.emit(SearchEvent::Status(
                "Primary endpoint unreachable, using relays.".to_string(),
            ));
        }
    }

    let request =
        SearchRequest::new(cli.code, titles).with_debug_level(config.logging.debug_level);
    let outcome = session.run(&request, &sink).await;

    if cli.metrics {
        print_metrics(&registry)?;
    }

    // The sink has already printed the error.
    if outcome.is_err() {
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_options() {
        let cli = Cli::try_parse_from([
            "titlesep", "120787J", "--titles", "GM,IM", "--debug", "2", "--max-depth", "3",
        ])
        .unwrap();
        assert_eq!(cli.code, "120787J");
        assert_eq!(cli.titles.as_deref(), Some("GM,IM"));
        assert_eq!(cli.debug, Some(2));
        assert_eq!(cli.max_depth, Some(3));
        assert!(!cli.no_probe);
    }

    #[test]
    fn debug_level_is_bounded() {
        assert!(Cli::try_parse_from(["titlesep", "1", "--debug", "3"]).is_err());
        assert!(Cli::try_parse_from(["titlesep"]).is_err());
    }

    #[test]
    fn filter_follows_debug_level() {
        let mut logging = LoggingConfig::default();
        assert_eq!(default_filter(&logging), "warn");
        logging.debug_level = 1;
        assert_eq!(default_filter(&logging), "info");
        logging.debug_level = 2;
        assert_eq!(default_filter(&logging), "debug");
    }
}
