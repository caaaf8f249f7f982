//! Listing page parsing.
//!
//! Detail-page links come from two independent regions of the listing page:
//!
//! 1. the card grid, `.full-card-content`, first link of each card
//! 2. the fallback list, every link inside `ul.wp-block-list`
//!
//! Card links come first, then list links, each in document order. The same
//! URL may appear in both regions; duplicates are passed on as found.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".full-card-content").expect("valid card selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("valid link selector"));
static LIST_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.wp-block-list a").expect("valid list selector"));

/// Extract detail-page URLs, resolving relative links against `base` when given.
///
/// Nodes without an `href` (or with one that cannot be resolved) are logged
/// and skipped.
#[instrument(level = "info", skip_all, fields(base = base.map(Url::as_str)))]
pub fn extract_detail_urls_from(html: &str, base: Option<&Url>) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();

    let mut cards = 0usize;
    for (index, card) in document.select(&CARD_SELECTOR).enumerate() {
        cards += 1;
        let Some(link) = card.select(&LINK_SELECTOR).next() else {
            warn!(card = index, "Card has no link; skipping");
            continue;
        };
        if let Some(url) = link_target(link, base) {
            urls.push(url);
        }
    }
    let from_cards = urls.len();

    for link in document.select(&LIST_LINK_SELECTOR) {
        if let Some(url) = link_target(link, base) {
            urls.push(url);
        }
    }

    info!(
        cards,
        from_cards,
        from_list = urls.len() - from_cards,
        "Indexed detail page URLs"
    );
    debug!(urls = ?urls, "Detail page URLs");
    urls
}

fn link_target(link: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let Some(href) = link.value().attr("href") else {
        warn!(text = %link.text().collect::<String>().trim(), "Link has no href; skipping");
        return None;
    };

    match base {
        None => Some(href.to_string()),
        Some(base) => match base.join(href) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                warn!(%href, error = %e, "Unresolvable href; skipping");
                None
            }
        },
    }
}
