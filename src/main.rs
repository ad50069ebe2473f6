mod cli;

use metaforge::config;
use metaforge::metadata::{Engine, MetadataRecord, ResolveRequest, SearchQuery};
use metaforge_common::{media_source, CastType, MediaSource, MediaType};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "metaforge=debug,metaforge_common=debug".to_string()
        } else {
            "metaforge=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            query,
            year,
            tv,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(search(cli.config.as_deref(), query, year, tv, json))
        }
        Commands::Resolve {
            imdb,
            tmdb,
            title,
            year,
            tv,
            json,
        } => {
            let media_type = if tv { MediaType::TvShow } else { MediaType::Movie };
            let target = match (imdb, tmdb, title) {
                (Some(id), _, _) => Target::Request(
                    ResolveRequest::new(media_type).with_id("imdb", id.trim().to_string()),
                ),
                (_, Some(id), _) => Target::Request(ResolveRequest::new(media_type).with_id("tmdb", id)),
                (_, _, Some(title)) => Target::Query(SearchQuery {
                    title,
                    year,
                    media_type,
                    language: None,
                }),
                _ => anyhow::bail!("Pass one of --imdb, --tmdb or --title"),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve(cli.config.as_deref(), target, json))
        }
        Commands::Classify { names } => classify(cli.config.as_deref(), &names),
        Commands::Sources => list_sources(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("metaforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

enum Target {
    Request(ResolveRequest),
    Query(SearchQuery),
}

fn engine(config_path: Option<&Path>) -> Result<Engine> {
    let config = config::load_config_or_default(config_path)?;
    config::register_media_sources(&config)?;
    Engine::from_config(&config).context("Failed to set up the metadata engine")
}

async fn search(
    config_path: Option<&Path>,
    query: String,
    year: Option<u16>,
    tv: bool,
    json: bool,
) -> Result<()> {
    let engine = engine(config_path)?;
    let query = SearchQuery {
        title: query,
        year,
        media_type: if tv { MediaType::TvShow } else { MediaType::Movie },
        language: None,
    };
    let results = engine.search(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results for '{}'", query.title);
        return Ok(());
    }
    for result in &results {
        let year = result.year.map(|y| y.to_string()).unwrap_or_else(|| "----".into());
        print!(
            "{:.2}  {} ({})  [{}:{}]",
            result.match_score, result.title, year, result.provider_id, result.external_id
        );
        if let Some(ref imdb_id) = result.imdb_id {
            print!("  imdb:{}", imdb_id);
        }
        println!();
    }
    Ok(())
}

async fn resolve(config_path: Option<&Path>, target: Target, json: bool) -> Result<()> {
    let engine = engine(config_path)?;
    let record = match target {
        Target::Request(request) => engine.resolve(&request).await?,
        Target::Query(query) => engine.search_and_resolve(&query).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_record(record: &MetadataRecord) {
    let title = record.title.as_deref().unwrap_or("<untitled>");
    match record.year {
        Some(year) => println!("{} ({})", title, year),
        None => println!("{}", title),
    }
    if let Some(ref original) = record.original_title {
        if Some(original) != record.title.as_ref() {
            println!("  Original title: {}", original);
        }
    }
    if let Some(ref tagline) = record.tagline {
        println!("  Tagline: {}", tagline);
    }
    if let Some(date) = record.release_date {
        println!("  Released: {}", date);
    }
    if let Some(runtime) = record.runtime_minutes {
        println!("  Runtime: {} min", runtime);
    }
    if let Some(ref collection) = record.collection_name {
        println!("  Collection: {}", collection);
    }
    if !record.genres.is_empty() {
        println!("  Genres: {}", record.genres.join(", "));
    }
    if !record.certifications.is_empty() {
        let certs: Vec<&str> = record.certifications.iter().map(String::as_str).collect();
        println!("  Certifications: {}", certs.join(", "));
    }
    for (source, rating) in &record.ratings {
        println!(
            "  Rating ({}): {:.1}/{} from {} votes",
            source, rating.value, rating.max_value, rating.votes
        );
    }
    let directors: Vec<&str> = record
        .cast_of(CastType::Director)
        .map(|c| c.name.as_str())
        .collect();
    if !directors.is_empty() {
        println!("  Directed by: {}", directors.join(", "));
    }
    let actors: Vec<String> = record
        .cast_of(CastType::Actor)
        .take(5)
        .map(|c| match c.role {
            Some(ref role) => format!("{} as {}", c.name, role),
            None => c.name.clone(),
        })
        .collect();
    if !actors.is_empty() {
        println!("  Starring: {}", actors.join(", "));
    }
    if let Some(ref plot) = record.plot {
        println!("\n{}\n", plot);
    }
    let ids: Vec<String> = record
        .ids
        .iter()
        .map(|(provider, id)| format!("{}:{}", provider, id))
        .collect();
    println!("  Ids: {}", ids.join(", "));
}

fn classify(config_path: Option<&Path>, names: &[String]) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::register_media_sources(&config)?;

    for name in names {
        let source = media_source::classify(name);
        println!("{:<12} {}", source.name(), name);
    }
    Ok(())
}

fn list_sources(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::register_media_sources(&config)?;

    for source in MediaSource::values() {
        println!("{:<12} {}", source.name(), source.title());
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  IMDb enabled: {}", config.imdb.enabled);
            println!("  TMDB enabled: {}", config.tmdb.enabled);
            println!(
                "  Addons: {} ({} enabled)",
                config.addons.len(),
                config.addons.iter().filter(|a| a.enabled).count()
            );
            println!("  Media sources: {}", config.media_sources.len());
            println!("  Worker pool: {}", config.aggregator.worker_pool_size);
            println!("  Country: {}", config.scraper.country);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Worker pool: {}", config.aggregator.worker_pool_size);
            println!("  Country: {}", config.scraper.country);
        }
    }

    Ok(())
}
