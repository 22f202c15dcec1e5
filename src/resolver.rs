//! Following selector chains from vendor pages to file links.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Links already taken from the page being scanned.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the link was seen before on this page.
    pub fn insert(&mut self, link: &Url) -> bool {
        self.seen.insert(link.as_str().to_string())
    }
}

/// Compile a selector, reporting bad syntax as a configuration error.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch `url` and return the links matched by `selector`, deduplicated, in
/// document order.
pub async fn resolve_page(client: &HttpClient, url: &Url, selector: &str) -> Result<Vec<Url>> {
    let body = client.page(url).await?;
    extract_links(&body, selector, url)
}

pub fn extract_links(html: &str, selector: &str, page_url: &Url) -> Result<Vec<Url>> {
    let parsed = parse_selector(selector)?;

    let document = Html::parse_document(html);
    let mut visited = VisitedSet::new();
    let mut links = Vec::new();

    for element in document.select(&parsed) {
        trace!(element = ?element.value(), "Matched element");

        let Some(raw) = element_link(element) else {
            continue;
        };
        let link = match page_url.join(&raw) {
            Ok(link) => link,
            Err(e) => {
                debug!(page = %page_url, link = %raw, error = %e, "Skipping unresolvable link");
                continue;
            }
        };

        if visited.insert(&link) {
            debug!(%link, "Found");
            links.push(link);
        }
    }

    Ok(links)
}

/// `href`, else `src`, else whatever follows the first `=` of a meta refresh
/// `content` such as `3;url=http://host/file.exe`.
fn element_link(element: ElementRef<'_>) -> Option<String> {
    let attr = |name: &str| element.value().attr(name).map(str::trim).filter(|v| !v.is_empty());

    let link = match attr("href").or_else(|| attr("src")) {
        Some(link) => link,
        None => {
            let content = attr("content")?;
            let (_, target) = content.split_once('=')?;
            target.trim()
        }
    };

    if link.is_empty() {
        return None;
    }

    // some servers mangle the last `&` of a query into `⟨`
    Some(link.replace('⟨', "&"))
}
