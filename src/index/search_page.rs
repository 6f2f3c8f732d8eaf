//! Parser for the index's HTML search results page.
//!
//! Each hit is an `<a class="package-snippet" href="/project/NAME/">` holding a
//! `span.package-snippet__name` and, usually, a `span.package-snippet__description`.

use log::debug;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};
use crate::package::{NO_SUMMARY, RemotePackage};

const SNIPPET: &str = "a.package-snippet";
const SNIPPET_NAME: &str = "span.package-snippet__name";
const SNIPPET_DESCRIPTION: &str = "span.package-snippet__description";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::parse(format!("Invalid selector {css}: {e}")))
}

/// Collapses runs of whitespace inside an element's text.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a possibly relative `href` against the index base URL.
fn resolve_href(base_url: &str, href: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Extracts search hits from a results page.
///
/// A page without any result snippets yields an empty list. Snippets without
/// a name are skipped; snippets without a description get [`NO_SUMMARY`].
pub fn parse_search_results(html: &str, base_url: &str) -> Result<Vec<RemotePackage>> {
    let document = Html::parse_document(html);
    let snippet_selector = selector(SNIPPET)?;
    let name_selector = selector(SNIPPET_NAME)?;
    let description_selector = selector(SNIPPET_DESCRIPTION)?;

    let mut results = Vec::new();
    for snippet in document.select(&snippet_selector) {
        let Some(name) = snippet
            .select(&name_selector)
            .next()
            .map(element_text)
            .filter(|n| !n.is_empty())
        else {
            debug!("Skipping search snippet without a package name");
            continue;
        };

        let summary = snippet
            .select(&description_selector)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string());

        let detail_url = snippet
            .value()
            .attr("href")
            .map(|href| resolve_href(base_url, href))
            .unwrap_or_default();

        results.push(RemotePackage {
            name,
            summary,
            detail_url,
        });
    }

    debug!("Parsed {} search result(s)", results.len());
    Ok(results)
}
