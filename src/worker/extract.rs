//! HTML summary extraction
//!
//! Reduces a fetched document to the structured result reported back to
//! the coordinator: the page title plus link and image counts.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured summary of one fetched page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: String,
    pub links: usize,
    pub images: usize,
}

impl PageSummary {
    /// Convert into the opaque result payload carried by `submit_result`
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).expect("summary serializes to JSON")
    }
}

/// Extract a [`PageSummary`] from an HTML document
pub fn summarize(html: &str) -> PageSummary {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("static selector");
    let link_selector = Selector::parse("a").expect("static selector");
    let image_selector = Selector::parse("img").expect("static selector");

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title found".to_string());

    PageSummary {
        title,
        links: document.select(&link_selector).count(),
        images: document.select(&image_selector).count(),
    }
}
