// src/ingest/providers/html_page.rs
//! Heading-delimited release-notes pages: one record per `h2`/`h3` section.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::ingest::providers::http::fetch_text;
use crate::ingest::types::{RawRecord, Source};

const MAX_SECTIONS: usize = 20;
const MAX_SECTION_CHARS: usize = 2500;
const MAX_FALLBACK_BLOCKS: usize = 80;
const MAX_SLUG_CHARS: usize = 60;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Section extracted from a page: heading, body text, date parsed from heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// URL fragment for a heading: ASCII alnum only, separators folded to `-`.
pub fn slugify(text: &str) -> String {
    static RE_DROP: OnceCell<Regex> = OnceCell::new();
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    let re_drop = RE_DROP.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s_-]").unwrap());
    let re_sep = RE_SEP.get_or_init(|| Regex::new(r"[\s_-]+").unwrap());

    let kept = re_drop.replace_all(text, "");
    let lowered = kept.trim().to_lowercase();
    let slug: String = re_sep
        .replace_all(&lowered, "-")
        .chars()
        .take(MAX_SLUG_CHARS)
        .collect();
    if slug.is_empty() {
        "update".to_string()
    } else {
        slug
    }
}

/// `2026-02-07`, `2026/2/7` or `February 7, 2026` anywhere in `text`.
pub fn parse_date_from_text(text: &str) -> Option<DateTime<Utc>> {
    static RE_ISO: OnceCell<Regex> = OnceCell::new();
    static RE_LONG: OnceCell<Regex> = OnceCell::new();
    let re_iso =
        RE_ISO.get_or_init(|| Regex::new(r"(20\d{2})[-/](\d{1,2})[-/](\d{1,2})").unwrap());
    let re_long = RE_LONG.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b({})\s+(\d{{1,2}}),\s*(20\d{{2}})", MONTHS.join("|")))
            .unwrap()
    });

    if let Some(c) = re_iso.captures(text) {
        let y: i32 = c[1].parse().ok()?;
        let m: u32 = c[2].parse().ok()?;
        let d: u32 = c[3].parse().ok()?;
        return midnight_utc(y, m, d);
    }
    if let Some(c) = re_long.captures(text) {
        let month = c[1].to_ascii_lowercase();
        let m = MONTHS.iter().position(|name| *name == month)? as u32 + 1;
        let d: u32 = c[2].parse().ok()?;
        let y: i32 = c[3].parse().ok()?;
        return midnight_utc(y, m, d);
    }
    None
}

fn midnight_utc(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Visible text of an element, whitespace-trimmed fragments joined by a space.
fn element_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h2" | "h3")
}

fn is_body_block(name: &str) -> bool {
    matches!(name, "p" | "li" | "ul" | "ol" | "div")
}

/// Split a document into heading-delimited sections.
///
/// Container is `<main>`, else `<article>`, else `<body>`. Without any
/// heading, the first paragraphs/list items become a single "Latest Update".
pub fn extract_sections(document: &Html) -> Vec<Section> {
    let container = ["main", "article", "body"]
        .iter()
        .find_map(|tag| document.select(&sel(tag)).next());
    let Some(container) = container else {
        return Vec::new();
    };

    let headings: Vec<ElementRef> = container.select(&sel("h2, h3")).collect();
    if headings.is_empty() {
        let text = container
            .select(&sel("p, li"))
            .take(MAX_FALLBACK_BLOCKS)
            .map(|el| element_text(&el))
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        return vec![Section {
            heading: "Latest Update".to_string(),
            body: text.to_string(),
            published_at: None,
        }];
    }

    let mut sections = Vec::new();
    for h in headings.into_iter().take(MAX_SECTIONS) {
        let heading = element_text(&h);
        let mut parts: Vec<String> = Vec::new();
        for sib in h.next_siblings() {
            if let Some(el) = ElementRef::wrap(sib) {
                let name = el.value().name();
                if is_heading(name) {
                    break;
                }
                if is_body_block(name) {
                    let txt = element_text(&el);
                    if !txt.is_empty() {
                        parts.push(txt);
                    }
                }
            }
            if parts.join(" ").chars().count() > MAX_SECTION_CHARS {
                break;
            }
        }
        let body = parts.join(" ").trim().to_string();
        if body.is_empty() {
            continue;
        }
        let published_at = parse_date_from_text(&heading);
        sections.push(Section {
            heading,
            body,
            published_at,
        });
    }
    sections
}

/// Turn a fetched page into raw records. `now` stamps sections without a date.
pub fn parse_page(html: &str, source: &Source, now: DateTime<Utc>) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let page_title = document
        .select(&sel("title"))
        .next()
        .map(|t| element_text(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| source.label.to_string());

    extract_sections(&document)
        .into_iter()
        .enumerate()
        .map(|(idx, s)| RawRecord {
            source_id: source.id.to_string(),
            service: source.service,
            title: format!("{} | {}", s.heading, page_title),
            url: format!("{}#{}-{}", source.url, slugify(&s.heading), idx),
            published_at: s.published_at.unwrap_or(now),
            body: s.body,
        })
        .collect()
}

pub async fn collect(client: &Client, source: &Source) -> Result<Vec<RawRecord>> {
    let html = fetch_text(client, source.url).await?;
    Ok(parse_page(&html, source, Utc::now()))
}
