//! Parsing of attraction-listing API responses.
//!
//! The upstream API returns several response shapes depending on endpoint
//! revision. Instead of scanning dictionaries open-endedly, parsing is an
//! ordered chain of typed extractors tried in sequence; the first one that
//! yields cards wins. A heuristic full-document scan is the last resort.

use serde_json::Value;

use crate::attractions::AttractionRecord;

/// One strategy for locating attraction cards in a response document.
trait CardExtractor {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Extract raw cards from the response, or an empty list if this shape
    /// does not apply.
    fn extract(&self, response: &Value) -> Vec<AttractionRecord>;
}

/// Parse an attraction listing response into clean records.
///
/// Deduplicates by (name, link) preserving order and caps at `limit`.
pub fn parse_attractions(response: &Value, limit: usize) -> Vec<AttractionRecord> {
    let extractors: [&dyn CardExtractor; 3] =
        [&AppListExtractor, &SectionListExtractor, &CardScanExtractor];

    let mut cards = Vec::new();
    for extractor in extractors {
        cards = extractor.extract(response);
        if !cards.is_empty() {
            log::debug!("extractor={} produced {} cards", extractor.name(), cards.len());
            break;
        }
        log::debug!("extractor={} produced no cards", extractor.name());
    }

    dedupe(cards, limit)
}

/// Recursively locate the first numeric `geoId` value in a response.
pub fn find_geo_id(value: &Value) -> Option<i64> {
    match value {
        Value::Object(map) => {
            if let Some(geo) = map.get("geoId") {
                if let Some(id) = geo.as_i64() {
                    return Some(id);
                }
                if let Some(id) = geo.as_str().and_then(|s| s.parse::<i64>().ok()) {
                    return Some(id);
                }
            }
            map.values().find_map(find_geo_id)
        }
        Value::Array(items) => items.iter().find_map(find_geo_id),
        _ => None,
    }
}

fn dedupe(cards: Vec<AttractionRecord>, limit: usize) -> Vec<AttractionRecord> {
    let mut seen = std::collections::HashSet::new();
    let mut cleaned = Vec::new();

    for card in cards {
        if card.name.is_empty() {
            continue;
        }
        let key = (card.name.trim().to_lowercase(), card.link.clone());
        if seen.insert(key) {
            cleaned.push(card);
        }
        if cleaned.len() >= limit {
            break;
        }
    }

    cleaned
}

/// Walk a path of object keys.
fn at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in keys {
        current = current.get(key)?;
    }
    Some(current)
}

fn str_at(value: &Value, keys: &[&str]) -> Option<String> {
    at(value, keys).and_then(|v| v.as_str()).map(str::to_owned)
}

/// Normalize one card object, whichever shape wrapped it.
fn normalize_card(card: &Value) -> AttractionRecord {
    let name = str_at(card, &["cardTitle", "string"])
        .or_else(|| str_at(card, &["title"]))
        .or_else(|| str_at(card, &["name"]))
        .or_else(|| str_at(card, &["localizedName"]))
        .or_else(|| str_at(card, &["title", "string"]))
        .unwrap_or_else(|| "Unknown".to_string());

    let rating = at(card, &["bubbleRating", "rating"])
        .or_else(|| card.get("rating"))
        .map(value_to_string)
        .unwrap_or_else(|| "N/A".to_string());

    let reviews = str_at(card, &["bubbleRating", "numberReviews", "string"])
        .or_else(|| card.get("reviewCount").map(value_to_string))
        .unwrap_or_default()
        .replace(['(', ')'], "")
        .trim()
        .to_string();

    let category = str_at(card, &["primaryInfo", "text"])
        .or_else(|| str_at(card, &["category", "name"]))
        .or_else(|| str_at(card, &["category"]))
        .unwrap_or_else(|| "N/A".to_string());

    let photo = str_at(card, &["cardPhoto", "sizes", "urlTemplate"])
        .or_else(|| str_at(card, &["cardPhoto", "photo", "url"]))
        .or_else(|| str_at(card, &["photo", "url"]))
        .map(|template| template.replace("{width}", "400").replace("{height}", "300"))
        .unwrap_or_default();

    let link = match at(card, &["cardLink", "route"]) {
        Some(route) if route.is_object() => {
            let path = str_at(route, &["url"])
                .or_else(|| str_at(route, &["nonCanonicalUrl"]))
                .unwrap_or_default();
            if path.is_empty() {
                String::new()
            } else {
                format!("https://www.tripadvisor.com{}", path)
            }
        }
        _ => str_at(card, &["detailPageUrl"])
            .or_else(|| str_at(card, &["cardLink", "url"]))
            .unwrap_or_default(),
    };

    let description = str_at(card, &["descriptiveText", "text"])
        .or_else(|| str_at(card, &["content", "description"]))
        .or_else(|| str_at(card, &["snippet"]))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    AttractionRecord {
        name,
        description,
        category,
        rating,
        reviews,
        photo,
        link,
        city: String::new(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Card wrapped in an item: `listSingleCardContent`, `appSearchCardContent`
/// or the item itself.
fn unwrap_card(item: &Value) -> &Value {
    item.get("listSingleCardContent")
        .or_else(|| item.get("appSearchCardContent"))
        .unwrap_or(item)
}

/// Primary shape: `data.AppPresentation_queryAppListV2[0].sections[].items[]`.
struct AppListExtractor;

impl CardExtractor for AppListExtractor {
    fn name(&self) -> &'static str {
        "app_list_v2"
    }

    fn extract(&self, response: &Value) -> Vec<AttractionRecord> {
        let mut cards = Vec::new();

        let Some(first) = at(response, &["data", "AppPresentation_queryAppListV2"])
            .and_then(|v| v.as_array())
            .and_then(|list| list.first())
        else {
            return cards;
        };

        let sections = first
            .get("sections")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for section in &sections {
            let items = section
                .get("items")
                .or_else(|| section.get("list"))
                .or_else(|| section.get("cardItems"))
                .and_then(|v| v.as_array());

            match items {
                Some(items) => {
                    for item in items {
                        cards.push(normalize_card(unwrap_card(item)));
                    }
                }
                // The section itself may be a single card
                None => cards.push(normalize_card(unwrap_card(section))),
            }
        }

        cards
    }
}

/// Fallback shape: cards under top-level `data.sections` or `data.results`.
struct SectionListExtractor;

impl CardExtractor for SectionListExtractor {
    fn name(&self) -> &'static str {
        "section_list"
    }

    fn extract(&self, response: &Value) -> Vec<AttractionRecord> {
        let mut cards = Vec::new();

        let Some(blocks) = at(response, &["data", "sections"])
            .or_else(|| at(response, &["data", "results"]))
            .and_then(|v| v.as_array())
        else {
            return cards;
        };

        for block in blocks {
            let items = block
                .get("items")
                .or_else(|| block.get("cards"))
                .or_else(|| block.get("list"))
                .and_then(|v| v.as_array());

            match items {
                Some(items) if !items.is_empty() => {
                    for item in items {
                        cards.push(normalize_card(unwrap_card(item)));
                    }
                }
                _ => cards.push(normalize_card(unwrap_card(block))),
            }
        }

        cards
    }
}

/// Last resort: scan the whole document for objects that look like cards.
struct CardScanExtractor;

impl CardScanExtractor {
    fn scan(value: &Value, cards: &mut Vec<AttractionRecord>) {
        match value {
            Value::Object(map) => {
                let looks_like_card = ["cardTitle", "cardPhoto", "bubbleRating", "listSingleCardContent"]
                    .iter()
                    .any(|key| map.contains_key(*key));
                if looks_like_card {
                    cards.push(normalize_card(unwrap_card(value)));
                    return;
                }
                for child in map.values() {
                    Self::scan(child, cards);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::scan(item, cards);
                }
            }
            _ => {}
        }
    }
}

impl CardExtractor for CardScanExtractor {
    fn name(&self) -> &'static str {
        "card_scan"
    }

    fn extract(&self, response: &Value) -> Vec<AttractionRecord> {
        let mut cards = Vec::new();
        Self::scan(response, &mut cards);
        cards
    }
}
