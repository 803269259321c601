//! Review-page scraper.
//!
//! Fetches a review page with a fixed user-agent, selects the elements
//! matching the configured CSS selector, concatenates their text, and
//! truncates the result to the configured character budget.
//!
//! Failures are typed. Earlier iterations of this tool signaled failure by
//! prefixing the returned string with a marker, which is ambiguous with
//! legitimate page content; callers must be able to branch on the failure
//! kind without string matching.

use scraper::{Html, Selector};
use thiserror::Error;

use crate::config::{Config, ScrapeConfig};
use crate::search;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The page could not be fetched; any non-200 status lands here.
    #[error("Failed to fetch {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// The page fetched but no element matched the review selector.
    #[error("No reviews found on this page")]
    NoReviews,

    /// The configured selector is not valid CSS.
    #[error("Invalid review selector: {0}")]
    Selector(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetch a review page and return its concatenated review text.
///
/// The returned string never exceeds `config.max_chars` characters.
pub async fn scrape_reviews(
    http: &reqwest::Client,
    config: &ScrapeConfig,
    url: &str,
) -> Result<String, ScrapeError> {
    let response = http
        .get(url)
        .header("User-Agent", &config.user_agent)
        .send()
        .await?;

    let status = response.status();
    if status.as_u16() != 200 {
        return Err(ScrapeError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    let text = extract_reviews(&body, &config.selector)?;
    Ok(truncate_chars(&text, config.max_chars).to_string())
}

/// Pull the text of every element matching `selector` out of an HTML page.
///
/// Whitespace is normalized to single spaces within and between matched
/// elements.
fn extract_reviews(html: &str, selector: &str) -> Result<String, ScrapeError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(selector).map_err(|_| ScrapeError::Selector(selector.to_string()))?;

    let parts: Vec<String> = document
        .select(&selector)
        .map(|element| {
            let raw = element.text().collect::<String>();
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(ScrapeError::NoReviews);
    }

    Ok(parts.join(" "))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub async fn run_reviews(
    config: &Config,
    movie_id: Option<String>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let url = match (movie_id, url) {
        (Some(id), _) => search::review_url(&config.catalog, &id),
        (None, Some(url)) => url,
        (None, None) => anyhow::bail!("Provide a movie id or --url"),
    };

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.scrape.timeout_secs))
        .build()?;

    println!("Scraping {}", url);
    let text = scrape_reviews(&http, &config.scrape, &url).await?;
    println!("{}", text);
    Ok(())
}
