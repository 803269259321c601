//! Command orchestration for the summarize / ingest / ask flows.
//!
//! Each flow is a strictly linear chain triggered by one user action:
//! resolve URL → scrape → summarize → (upload) → (index). Every step blocks
//! until the chain of network calls and subprocess invocations completes;
//! there is no background processing and no parallel fetch.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::Config;
use crate::scrape;
use crate::search;
use crate::session::Session;
use crate::storage::{self, BridgeClient};

/// Resolve the review page URL from a movie id or an explicit URL.
fn resolve_review_url(
    config: &Config,
    movie_id: Option<&str>,
    url: Option<&str>,
) -> Result<String> {
    match (movie_id, url) {
        (Some(id), _) => Ok(search::review_url(&config.catalog, id)),
        (None, Some(url)) => Ok(url.to_string()),
        (None, None) => bail!("Provide a movie id or --url"),
    }
}

fn scrape_client(config: &Config) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.scrape.timeout_secs))
        .build()?)
}

/// Scrape a review page and summarize it; optionally upload the summary
/// and ingest the scraped text into the similarity index.
pub async fn run_summarize(
    config: &Config,
    movie_id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    upload: bool,
    index: bool,
) -> Result<()> {
    let review_url = resolve_review_url(config, movie_id.as_deref(), url.as_deref())?;
    let http = scrape_client(config)?;

    println!("Scraping {}", review_url);
    let content = scrape::scrape_reviews(&http, &config.scrape, &review_url).await?;

    let mut session = Session::open(config)?;

    println!("Summarizing...");
    let summary = session.summarize(&content).await?;
    println!();
    println!("{}", summary);
    println!();

    if upload {
        let storage_config = config
            .storage
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("--upload requires [storage] in the config"))?;
        let client = BridgeClient::new(storage_config)?;

        let upload_title = title
            .or_else(|| movie_id.map(|id| format!("movie {}", id)))
            .unwrap_or_else(|| "review".to_string());

        println!("Uploading summary...");
        let receipt = client.upload_text(&summary, &upload_title).await?;
        println!("  filename: {}", receipt.filename);
        println!("  CID: {}", receipt.cid);
        println!("  {}", receipt.url);
    }

    if index {
        println!("Indexing review text...");
        let stored = session.ingest(&content, &review_url).await?;
        println!("  chunks stored: {}", stored);
        println!("  index size: {}", session.index_len());

        // The combined flow also publishes the refreshed index file.
        if upload && config.storage.is_some() {
            storage::run_index_push(config).await?;
        }
    }

    Ok(())
}

/// Scrape a review page and ingest it into the index without summarizing.
pub async fn run_ingest(
    config: &Config,
    movie_id: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let review_url = resolve_review_url(config, movie_id.as_deref(), url.as_deref())?;
    let http = scrape_client(config)?;

    println!("Scraping {}", review_url);
    let content = scrape::scrape_reviews(&http, &config.scrape, &review_url).await?;

    let mut session = Session::open(config)?;
    let stored = session.ingest(&content, &review_url).await?;
    println!("  chunks stored: {}", stored);
    println!("  index size: {}", session.index_len());
    Ok(())
}

/// Answer a question over the indexed review chunks.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let session = Session::open(config)?;
    let answer = session.ask(question).await?;
    println!("{}", answer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_movie_id() {
        let config = Config::minimal();
        let url =
            resolve_review_url(&config, Some("123"), Some("https://elsewhere.test")).unwrap();
        assert_eq!(
            url,
            "https://www.filmaffinity.com/es/pro-reviews.php?movie-id=123"
        );
    }

    #[test]
    fn test_resolve_accepts_explicit_url() {
        let config = Config::minimal();
        let url = resolve_review_url(&config, None, Some("https://elsewhere.test/p")).unwrap();
        assert_eq!(url, "https://elsewhere.test/p");
    }

    #[test]
    fn test_resolve_requires_one_of() {
        let config = Config::minimal();
        assert!(resolve_review_url(&config, None, None).is_err());
    }
}
