//! Pure parsing of a fetched body into a [`PageRecord`].
//!
//! Out of scope per the core design — implemented here only so the `crawl`
//! binary has something to extract links and text with. No JavaScript
//! execution, no form submission.

use chrono::Utc;
use scraper::{Html, Selector};

use crate::page_record::{PageImage, PageMetadata, PageRecord};
use crate::url_normalizer::CanonicalUrl;

/// `parse(bytes, base_url) -> PageRecord`. Infallible: a body that cannot be
/// parsed at all produces a record with `parse_error` set rather than an
/// error surfaced to the orchestrator.
pub trait Parser: Send + Sync {
    fn parse(
        &self,
        bytes: &[u8],
        base_url: &CanonicalUrl,
        status_code: u16,
        content_type: Option<String>,
    ) -> PageRecord;
}

/// Default HTML parser backed by `scraper`. Extracts title, visible text,
/// links, meta description/keywords, images, headings, tables, and lists.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl Parser for HtmlParser {
    fn parse(
        &self,
        bytes: &[u8],
        base_url: &CanonicalUrl,
        status_code: u16,
        content_type: Option<String>,
    ) -> PageRecord {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return PageRecord::parse_failed(
                base_url.as_str(),
                status_code,
                content_type,
                "body is not valid utf-8".to_string(),
            );
        };

        let document = Html::parse_document(text);

        let title = select_one(&document, "title").map(|e| e.text().collect::<String>().trim().to_string());

        let body_text = select_one(&document, "body")
            .map(|e| e.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        let body_text = collapse_whitespace(&body_text);

        let links = links(&document, base_url);

        let description = meta_content(&document, "description");
        let keywords = meta_content(&document, "keywords");

        let images = images(&document, base_url);
        let headings = select_all(&document, "h1,h2,h3,h4,h5,h6")
            .map(|e| collapse_whitespace(&e.text().collect::<String>()))
            .filter(|s| !s.is_empty())
            .collect();

        let tables = tables(&document);
        let lists = lists(&document);

        PageRecord {
            url: base_url.as_str().to_string(),
            title,
            text: body_text,
            links,
            metadata: PageMetadata { description, keywords },
            images,
            headings,
            tables,
            lists,
            status_code,
            content_type,
            crawled_at: Utc::now(),
            parse_error: None,
        }
    }
}

fn select_one<'a>(doc: &'a Html, selector: &str) -> Option<scraper::ElementRef<'a>> {
    Selector::parse(selector).ok().and_then(|sel| doc.select(&sel).next())
}

fn select_all<'a>(doc: &'a Html, selector: &str) -> impl Iterator<Item = scraper::ElementRef<'a>> {
    let sel = Selector::parse(selector).expect("static selector is valid");
    doc.select(&sel).collect::<Vec<_>>().into_iter()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn links(doc: &Html, base_url: &CanonicalUrl) -> Vec<String> {
    let Ok(sel) = Selector::parse("a[href]") else { return Vec::new() };
    doc.select(&sel)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|u| u.as_str().to_string())
        .collect()
}

fn images(doc: &Html, base_url: &CanonicalUrl) -> Vec<PageImage> {
    let Ok(sel) = Selector::parse("img[src]") else { return Vec::new() };
    doc.select(&sel)
        .filter_map(|e| {
            let src = e.value().attr("src")?;
            let src = base_url.join(src).ok().map(|u| u.as_str().to_string()).unwrap_or_else(|| src.to_string());
            Some(PageImage { src, alt: e.value().attr("alt").map(str::to_string) })
        })
        .collect()
}

fn meta_content(doc: &Html, name: &str) -> Option<String> {
    let selector = format!(r#"meta[name="{name}"]"#);
    Selector::parse(&selector)
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .and_then(|e| e.value().attr("content"))
        .map(str::to_string)
}

fn tables(doc: &Html) -> Vec<Vec<Vec<String>>> {
    let Ok(table_sel) = Selector::parse("table") else { return Vec::new() };
    let Ok(row_sel) = Selector::parse("tr") else { return Vec::new() };
    let Ok(cell_sel) = Selector::parse("td,th") else { return Vec::new() };

    doc.select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .map(|row| {
                    row.select(&cell_sel)
                        .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                        .collect()
                })
                .collect()
        })
        .collect()
}

fn lists(doc: &Html) -> Vec<Vec<String>> {
    let Ok(list_sel) = Selector::parse("ul,ol") else { return Vec::new() };
    let Ok(item_sel) = Selector::parse("li") else { return Vec::new() };

    doc.select(&list_sel)
        .map(|list| {
            list.select(&item_sel)
                .map(|item| collapse_whitespace(&item.text().collect::<String>()))
                .collect()
        })
        .collect()
}
