//! Movie catalog search client.
//!
//! Queries the catalog's search page by title and parses candidate movie
//! records out of the result HTML. The catalog owns its markup and changes
//! it at will; the selectors below are best-effort, result nodes that fail
//! to parse are skipped, and an empty result list is not an error.

use anyhow::Result;
use scraper::{Html, Selector};

use crate::config::{CatalogConfig, Config};
use crate::models::MovieRecord;

const RESULT_SELECTOR: &str = "div.se-it";
const TITLE_SELECTOR: &str = "div.mc-title a";
const YEAR_SELECTOR: &str = "span.ye-w";
const COUNTRY_SELECTOR: &str = "img.nflag";

/// Search the catalog for movies matching a title.
pub async fn search_movies(
    http: &reqwest::Client,
    config: &CatalogConfig,
    title: &str,
) -> Result<Vec<MovieRecord>> {
    let url = search_url(config, title);
    let response = http.get(&url).send().await?;

    let status = response.status();
    if status.as_u16() != 200 {
        anyhow::bail!("Catalog search failed: HTTP {} for {}", status, url);
    }

    let body = response.text().await?;
    Ok(parse_search_results(&body))
}

/// Build the search URL for a title query.
fn search_url(config: &CatalogConfig, title: &str) -> String {
    format!(
        "{}/{}/search.php?stext={}",
        config.base_url,
        config.lang,
        urlencoding::encode(title)
    )
}

/// Build the professional-reviews page URL for a movie id.
pub fn review_url(config: &CatalogConfig, movie_id: &str) -> String {
    format!(
        "{}/{}/pro-reviews.php?movie-id={}",
        config.base_url, config.lang, movie_id
    )
}

/// Parse movie records out of a search result page.
fn parse_search_results(html: &str) -> Vec<MovieRecord> {
    let document = Html::parse_document(html);

    // Fixed selectors; parse failure here is a programming error.
    let result_sel = Selector::parse(RESULT_SELECTOR).expect("valid selector");
    let title_sel = Selector::parse(TITLE_SELECTOR).expect("valid selector");
    let year_sel = Selector::parse(YEAR_SELECTOR).expect("valid selector");
    let country_sel = Selector::parse(COUNTRY_SELECTOR).expect("valid selector");

    let mut movies = Vec::new();

    for node in document.select(&result_sel) {
        let title_el = match node.select(&title_sel).next() {
            Some(el) => el,
            None => continue,
        };

        let title = title_el
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            continue;
        }

        let id = match title_el.value().attr("href").and_then(movie_id_from_href) {
            Some(id) => id,
            None => continue,
        };

        let year = node.select(&year_sel).next().map(|el| {
            el.text()
                .collect::<String>()
                .trim()
                .to_string()
        });

        let country = node
            .select(&country_sel)
            .next()
            .and_then(|el| el.value().attr("alt"))
            .map(|alt| alt.to_string());

        movies.push(MovieRecord {
            id,
            title,
            year: year.filter(|y| !y.is_empty()),
            country: country.filter(|c| !c.is_empty()),
        });
    }

    movies
}

/// Extract the numeric movie id from a film page href
/// (e.g. `…/film123456.html` → `123456`).
fn movie_id_from_href(href: &str) -> Option<String> {
    let file = href.rsplit('/').next()?;
    let stem = file.strip_suffix(".html")?;
    let id = stem.strip_prefix("film")?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}

pub async fn run_search(config: &Config, title: &str) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.scrape.timeout_secs))
        .user_agent(&config.scrape.user_agent)
        .build()?;

    let movies = search_movies(&http, &config.catalog, title).await?;

    if movies.is_empty() {
        println!("No movies found with that title.");
        return Ok(());
    }

    for movie in &movies {
        println!(
            "[{}] {} | {} | id: {}",
            movie.year.as_deref().unwrap_or("----"),
            movie.title,
            movie.country.as_deref().unwrap_or("unknown"),
            movie.id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="se-it">
            <div class="mc-title">
              <a href="https://example.test/es/film123456.html">Blade Runner</a>
            </div>
            <span class="ye-w">1982</span>
            <img class="nflag" alt="Estados Unidos">
          </div>
          <div class="se-it">
            <div class="mc-title">
              <a href="/es/film789.html">Amanece, que no es poco</a>
            </div>
          </div>
          <div class="se-it">
            <div class="mc-title"><a href="/es/notafilm.html">Broken</a></div>
          </div>
        </body></html>"#;

    #[test]
    fn test_parse_results() {
        let movies = parse_search_results(RESULTS_PAGE);
        assert_eq!(movies.len(), 2);

        assert_eq!(movies[0].id, "123456");
        assert_eq!(movies[0].title, "Blade Runner");
        assert_eq!(movies[0].year.as_deref(), Some("1982"));
        assert_eq!(movies[0].country.as_deref(), Some("Estados Unidos"));

        assert_eq!(movies[1].id, "789");
        assert!(movies[1].year.is_none());
        assert!(movies[1].country.is_none());
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_search_results("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_movie_id_from_href() {
        assert_eq!(
            movie_id_from_href("https://x.test/es/film123.html").as_deref(),
            Some("123")
        );
        assert_eq!(movie_id_from_href("/es/film42.html").as_deref(), Some("42"));
        assert!(movie_id_from_href("/es/film.html").is_none());
        assert!(movie_id_from_href("/es/about.html").is_none());
        assert!(movie_id_from_href("/es/filmabc.html").is_none());
    }

    #[test]
    fn test_search_url_encodes_title() {
        let config = CatalogConfig::default();
        let url = search_url(&config, "amanece, que no es poco");
        assert!(url.ends_with("search.php?stext=amanece%2C%20que%20no%20es%20poco"));
        assert!(url.contains("/es/"));
    }

    #[test]
    fn test_review_url() {
        let config = CatalogConfig::default();
        assert_eq!(
            review_url(&config, "123456"),
            "https://www.filmaffinity.com/es/pro-reviews.php?movie-id=123456"
        );
    }
}
