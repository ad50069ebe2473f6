use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metaforge")]
#[command(author, version, about = "Movie and TV metadata resolution tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search all enabled providers for a title
    Search {
        /// Title to search for; a trailing year ("Inception 2010") is honoured
        #[arg(required = true)]
        query: String,

        /// Release year
        #[arg(short, long)]
        year: Option<u16>,

        /// Search TV shows instead of movies
        #[arg(long)]
        tv: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve full metadata by id, or by title via the best search match
    Resolve {
        /// IMDb title id (tt...)
        #[arg(long, conflicts_with_all = ["tmdb", "title"])]
        imdb: Option<String>,

        /// TMDB numeric id
        #[arg(long, conflicts_with = "title")]
        tmdb: Option<u64>,

        /// Title to search for
        #[arg(long)]
        title: Option<String>,

        /// Release year, used with --title
        #[arg(short, long, requires = "title")]
        year: Option<u16>,

        /// Resolve a TV show instead of a movie
        #[arg(long)]
        tv: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify release names by media source
    Classify {
        /// Release names or file names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List known media sources
    Sources,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
