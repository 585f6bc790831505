//! HTML summary extraction.
//!
//! Produces a [`PageSummary`] from a raw document. All URLs in the summary are
//! absolute and restricted to http(s).

use super::types::{MetaTags, PageSummary, TextStats};

use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

pub const MAX_LINKS: usize = 100;
pub const MAX_IMAGE_URLS: usize = 20;

pub fn parse_page(html: &str, base_url: &str) -> PageSummary {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let summary = PageSummary {
        title: extract_title(&document),
        links: extract_links(&document, base.as_ref()),
        meta_tags: extract_meta_tags(&document),
        structure: extract_structure(&document),
        images_count: count(&document, "img"),
        image_urls: extract_image_urls(&document, base.as_ref()),
        text_stats: extract_text_stats(&document),
    };

    tracing::debug!(
        "Parsed {}: title={:?}, {} links, {} images",
        base_url,
        summary.title,
        summary.links.len(),
        summary.images_count
    );

    summary
}

fn for_each_match<'a>(document: &'a Html, css: &str, mut visit: impl FnMut(ElementRef<'a>) -> bool) {
    let Ok(selector) = Selector::parse(css) else {
        tracing::warn!("Invalid selector: {}", css);
        return;
    };

    for element in document.select(&selector) {
        if !visit(element) {
            break;
        }
    }
}

fn count(document: &Html, css: &str) -> usize {
    let mut n = 0;
    for_each_match(document, css, |_| {
        n += 1;
        true
    });
    n
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let mut found = None;
    for_each_match(document, css, |element| {
        let text = collapse_whitespace(element.text());
        if text.is_empty() {
            return true;
        }
        found = Some(text);
        false
    });
    found
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let mut found = None;
    for_each_match(document, css, |element| {
        found = element
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        found.is_none()
    });
    found
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `href` resolved against `base`, kept only if it is http(s).
fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn extract_links(document: &Html, base: Option<&Url>) -> Vec<String> {
    let mut links = BTreeSet::new();

    for_each_match(document, "a[href]", |element| {
        let href = element.value().attr("href").unwrap_or_default().trim();

        if href.starts_with('#') || href.starts_with("javascript:") {
            return true;
        }
        if let Some(link) = absolutize(base, href) {
            links.insert(link);
        }
        links.len() < MAX_LINKS
    });

    links.into_iter().collect()
}

fn extract_image_urls(document: &Html, base: Option<&Url>) -> Vec<String> {
    let mut urls = Vec::new();

    for_each_match(document, "img[src]", |element| {
        let src = element.value().attr("src").unwrap_or_default().trim();

        if !src.starts_with("data:") {
            if let Some(url) = absolutize(base, src) {
                urls.push(url);
            }
        }
        urls.len() < MAX_IMAGE_URLS
    });

    urls
}

fn extract_meta_tags(document: &Html) -> MetaTags {
    let mut open_graph = BTreeMap::new();
    for_each_match(document, r#"meta[property^="og:"]"#, |element| {
        let attrs = element.value();
        if let (Some(property), Some(content)) = (attrs.attr("property"), attrs.attr("content")) {
            open_graph.insert(property.to_string(), content.to_string());
        }
        true
    });

    let mut twitter = BTreeMap::new();
    for_each_match(document, r#"meta[name^="twitter:"]"#, |element| {
        let attrs = element.value();
        if let (Some(name), Some(content)) = (attrs.attr("name"), attrs.attr("content")) {
            twitter.insert(name.to_string(), content.to_string());
        }
        true
    });

    MetaTags {
        description: first_attr(document, r#"meta[name="description"]"#, "content"),
        keywords: first_attr(document, r#"meta[name="keywords"]"#, "content"),
        author: first_attr(document, r#"meta[name="author"]"#, "content"),
        canonical: first_attr(document, r#"link[rel="canonical"]"#, "href"),
        open_graph,
        twitter,
    }
}

fn extract_structure(document: &Html) -> BTreeMap<String, usize> {
    (1..=6)
        .map(|level| {
            let tag = format!("h{}", level);
            let n = count(document, &tag);
            (tag, n)
        })
        .collect()
}

fn extract_text_stats(document: &Html) -> TextStats {
    let text = collapse_whitespace(document.root_element().text());

    TextStats {
        word_count: text.split_whitespace().count(),
        char_count: text.chars().count(),
        paragraph_count: count(document, "p"),
        list_count: count(document, "ul, ol"),
    }
}
