//! Landmark detail page parsing.
//!
//! A detail page yields a partial [`Landmark`]: name, address, coordinates and
//! history. Fields that are absent from the markup stay at their defaults and
//! parsing never fails as a whole.

use crate::models::{Landmark, Location};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

static PROMO_PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".promo-text p").expect("valid promo selector"));
static LABEL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("strong").expect("valid label selector"));
static HISTORY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("section.wp-block-rest-gutenberg-blocks-guten-block.content-block p")
        .expect("valid history selector")
});
static NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".promo-layout-columns h1").expect("valid name selector"));

const ADDRESS_LABELS: [&str; 2] = ["Адрес:", "Address:"];
const COORDINATES_LABELS: [&str; 2] = ["Координаты:", "Coordinates:"];

/// Parse a landmark detail page.
#[instrument(level = "debug", skip_all)]
pub fn parse_detail(html: &str) -> Landmark {
    let document = Html::parse_document(html);
    let mut landmark = Landmark::default();

    for paragraph in document.select(&PROMO_PARAGRAPH_SELECTOR) {
        let label = paragraph_label(paragraph);
        if label.is_empty() {
            continue;
        }
        let text: String = paragraph.text().collect();
        let value = text.replacen(&label, "", 1);

        if ADDRESS_LABELS.contains(&label.as_str()) {
            landmark.address = value.trim().to_string();
        } else if COORDINATES_LABELS.contains(&label.as_str()) {
            match parse_coordinates(&value) {
                Ok(location) => landmark.location = location,
                Err(reason) => warn!(value = %value.trim(), %reason, "Skipping coordinates"),
            }
        }
    }

    landmark.history = document
        .select(&HISTORY_SELECTOR)
        .map(|p| p.text().collect::<String>())
        .collect();

    landmark.name = document
        .select(&NAME_SELECTOR)
        .flat_map(|heading| heading.text())
        .collect::<String>()
        .trim()
        .to_string();

    debug!(
        name = %landmark.name,
        has_address = !landmark.address.is_empty(),
        history_chars = landmark.history.chars().count(),
        "Parsed detail page"
    );
    landmark
}

fn paragraph_label(paragraph: ElementRef<'_>) -> String {
    paragraph
        .select(&LABEL_SELECTOR)
        .flat_map(|strong| strong.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse `"lat, lng"`. Whitespace anywhere is ignored.
fn parse_coordinates(value: &str) -> Result<Location, String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let tokens: Vec<&str> = compact.split(',').collect();
    let [lat, lng] = tokens.as_slice() else {
        return Err(format!("expected 2 comma-separated values, got {}", tokens.len()));
    };

    let lat = lat
        .parse::<f64>()
        .map_err(|e| format!("latitude {:?}: {}", lat, e))?;
    let lng = lng
        .parse::<f64>()
        .map_err(|e| format!("longitude {:?}: {}", lng, e))?;

    Ok(Location { lat, lng })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="promo-layout-columns">
                <h1>  Ласточкино гнездо </h1>
                <div class="promo-text">
                    <p><strong>Адрес:</strong> Алупкинское шоссе, 9А, Гаспра</p>
                    <p><strong>Координаты:</strong> 44.5, 34.1</p>
                    <p>Без метки</p>
                </div>
            </div>
            <section class="wp-block-rest-gutenberg-blocks-guten-block content-block">
                <p>Замок построен в 1912 году. </p>
                <p>Стоит на Аврориной скале.</p>
            </section>
            <section class="content-block"><p>not history</p></section>
        </body></html>
    "#;

    #[test]
    fn test_parse_full_detail_page() {
        let landmark = parse_detail(PAGE);

        assert_eq!(landmark.name, "Ласточкино гнездо");
        assert_eq!(landmark.address, "Алупкинское шоссе, 9А, Гаспра");
        assert_eq!(landmark.location.lat, 44.5);
        assert_eq!(landmark.location.lng, 34.1);
        assert_eq!(
            landmark.history,
            "Замок построен в 1912 году. Стоит на Аврориной скале."
        );
        assert_eq!(landmark.id, 0);
        assert!(landmark.translated_name.is_empty());
    }

    #[test]
    fn test_name_joins_every_heading() {
        let html = r#"
            <div class="promo-layout-columns">
                <h1>Воронцовский </h1>
                <div><h1>дворец</h1></div>
            </div>
            <h1>Outside</h1>
        "#;
        assert_eq!(parse_detail(html).name, "Воронцовский дворец");
    }

    #[test]
    fn test_english_labels() {
        let html = r#"
            <div class="promo-text">
                <p><strong>Address:</strong> Yalta, Embankment</p>
                <p><strong>Coordinates:</strong> 44.49 , 34.17</p>
            </div>
        "#;
        let landmark = parse_detail(html);

        assert_eq!(landmark.address, "Yalta, Embankment");
        assert_eq!(landmark.location, Location { lat: 44.49, lng: 34.17 });
    }

    #[test]
    fn test_bad_coordinates_leave_location_unset() {
        for raw in ["44.5", "44.5, 34.1, 10", "north, 34.1", "44.5, east"] {
            let html = format!(
                r#"<div class="promo-text"><p><strong>Координаты:</strong> {}</p></div>"#,
                raw
            );
            let landmark = parse_detail(&html);
            assert_eq!(landmark.location, Location::default(), "input {:?}", raw);
        }
    }

    #[test]
    fn test_missing_regions_stay_default() {
        let landmark = parse_detail("<html><body><p>nothing here</p></body></html>");
        assert_eq!(landmark, Landmark::default());
    }

    #[test]
    fn test_parse_coordinates_strips_all_whitespace() {
        assert_eq!(
            parse_coordinates(" 44 .5 ,\t34.1\n"),
            Ok(Location { lat: 44.5, lng: 34.1 })
        );
    }
}
