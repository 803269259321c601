//! # cinescout CLI (`cine`)
//!
//! The `cine` binary drives the review pipeline: catalog search, review
//! scraping, summarization, semantic Q&A over indexed reviews, and
//! content-addressed publishing.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cine search "<title>"` | Search the movie catalog by title |
//! | `cine reviews <movie-id>` | Scrape and print a movie's review text |
//! | `cine summarize <movie-id>` | Scrape and summarize reviews |
//! | `cine ingest <movie-id>` | Scrape and add review text to the index |
//! | `cine ask "<question>"` | Answer a question over indexed reviews |
//! | `cine index info` | Show the persisted index dims and size |
//! | `cine index push` | Upload the index file to storage |
//! | `cine index pull <cid>` | Download an index file by CID |
//! | `cine upload <path>` | Upload a file to content-addressed storage |
//! | `cine serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Find the movie, then summarize its professional reviews
//! cine search "blade runner"
//! cine summarize 123456
//!
//! # The combined flow: summarize, publish the summary, index the text,
//! # and publish the refreshed index file
//! cine summarize 123456 --title "Blade Runner" --upload --index
//!
//! # Ask questions over everything indexed so far
//! cine ask "which aspects do critics criticize?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cinescout::{config, index, pipeline, scrape, search, server, storage};

/// cinescout — a movie-review scraping, summarization, and semantic Q&A
/// agent with content-addressed publishing.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cinescout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cine",
    about = "cinescout — scrape, summarize, index, and publish movie reviews",
    version,
    long_about = "cinescout searches a movie catalog, scrapes professional review text, \
    summarizes it with a locally hosted LLM, indexes it for semantic question answering, \
    and publishes artifacts to content-addressed storage."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cinescout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Search the movie catalog by title.
    ///
    /// Prints candidate movies as `[year] title | country | id` lines.
    /// Use the id with `reviews`, `summarize`, or `ingest`.
    Search {
        /// The title to search for.
        title: String,
    },

    /// Scrape a movie's review page and print the review text.
    ///
    /// The text is truncated to the configured character budget.
    Reviews {
        /// Movie id from `cine search`.
        movie_id: Option<String>,

        /// Scrape an explicit review page URL instead of a movie id.
        #[arg(long)]
        url: Option<String>,
    },

    /// Scrape a movie's reviews and summarize them with the LLM.
    Summarize {
        /// Movie id from `cine search`.
        movie_id: Option<String>,

        /// Scrape an explicit review page URL instead of a movie id.
        #[arg(long)]
        url: Option<String>,

        /// Title used to name the uploaded summary file.
        #[arg(long)]
        title: Option<String>,

        /// Upload the summary to content-addressed storage.
        #[arg(long)]
        upload: bool,

        /// Chunk, embed, and add the scraped text to the similarity index.
        #[arg(long)]
        index: bool,
    },

    /// Scrape a movie's reviews and add them to the similarity index
    /// without summarizing.
    Ingest {
        /// Movie id from `cine search`.
        movie_id: Option<String>,

        /// Scrape an explicit review page URL instead of a movie id.
        #[arg(long)]
        url: Option<String>,
    },

    /// Answer a question over the indexed review chunks.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Manage the persisted similarity index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Upload a file or text to content-addressed storage.
    Upload {
        /// Path of the file to upload.
        path: Option<PathBuf>,

        /// Upload this text instead of a file.
        #[arg(long)]
        text: Option<String>,

        /// Title used to name the uploaded text file.
        #[arg(long)]
        title: Option<String>,
    },

    /// Start the JSON HTTP server.
    Serve,
}

/// Index management subcommands.
#[derive(Subcommand)]
enum IndexAction {
    /// Show the persisted index dimensionality and vector count.
    Info,

    /// Upload the index file to content-addressed storage.
    Push,

    /// Download an index file by CID and install it as the local index,
    /// replacing any previous file.
    Pull {
        /// Root content identifier of a previously pushed index.
        cid: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search { title } => {
            search::run_search(&cfg, &title).await?;
        }
        Commands::Reviews { movie_id, url } => {
            scrape::run_reviews(&cfg, movie_id, url).await?;
        }
        Commands::Summarize {
            movie_id,
            url,
            title,
            upload,
            index,
        } => {
            pipeline::run_summarize(&cfg, movie_id, url, title, upload, index).await?;
        }
        Commands::Ingest { movie_id, url } => {
            pipeline::run_ingest(&cfg, movie_id, url).await?;
        }
        Commands::Ask { question } => {
            pipeline::run_ask(&cfg, &question).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Info => {
                index::run_info(&cfg)?;
            }
            IndexAction::Push => {
                storage::run_index_push(&cfg).await?;
            }
            IndexAction::Pull { cid } => {
                storage::run_index_pull(&cfg, &cid).await?;
            }
        },
        Commands::Upload { path, text, title } => {
            storage::run_upload(&cfg, path, text, title).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
