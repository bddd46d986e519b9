//! Reads a book landing page (or one of its `?pageNum=` continuations).

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid") // Static pattern, safe to panic
}

static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-test-id="paginationSearchResult"]"#));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static ENTRY: LazyLock<Selector> = LazyLock::new(|| selector("ul.details"));
static PART_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.part-link"));
static HREF: LazyLock<Selector> = LazyLock::new(|| selector("[href]"));
static CITATION_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_title"]"#));
static CITATION_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_author"]"#));
static CITATION_EDITOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="citation_editor"]"#));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Non-blank lines of the entry's link text: title first, then the printed range.
    pub display_lines: Vec<String>,
    pub pdf_link: Option<String>,
    pub reader_link: Option<String>,
    pub nesting_depth: u32,
}

impl DirectoryEntry {
    pub fn has_content(&self) -> bool {
        self.pdf_link.is_some() || self.reader_link.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPage {
    /// Page count announced by the pagination indicator, if the page has one.
    pub total_pages: Option<usize>,
    pub entries: Vec<DirectoryEntry>,
}

pub fn parse_book_metadata(html: &str) -> Result<BookMetadata> {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &CITATION_TITLE)
        .ok_or(Error::MetadataMissing { what: "book title" })?;
    let author = meta_content(&document, &CITATION_AUTHOR)
        .or_else(|| meta_content(&document, &CITATION_EDITOR))
        .ok_or(Error::MetadataMissing {
            what: "book author or editor",
        })?;

    Ok(BookMetadata { title, author })
}

pub fn parse_directory_page(html: &str) -> Result<DirectoryPage> {
    let document = Html::parse_document(html);

    let total_pages = match document.select(&PAGINATION).next() {
        Some(indicator) => Some(parse_page_count(indicator)?),
        None => None,
    };

    let entries = document.select(&ENTRY).map(parse_entry).collect();

    Ok(DirectoryPage {
        total_pages,
        entries,
    })
}

/// The indicator reads like "Page 1 of 3"; the count is the last word.
fn parse_page_count(indicator: ElementRef<'_>) -> Result<usize> {
    let missing = || Error::MetadataMissing {
        what: "directory page count",
    };
    let text = indicator
        .select(&PARAGRAPH)
        .next()
        .map(|p| p.text().collect::<String>())
        .ok_or_else(missing)?;

    text.split_whitespace()
        .last()
        .and_then(|word| word.parse::<usize>().ok())
        .filter(|count| *count > 0)
        .ok_or_else(missing)
}

fn parse_entry(entry: ElementRef<'_>) -> DirectoryEntry {
    let display_lines = entry
        .select(&PART_LINK)
        .next()
        .map(|link| {
            link.text()
                .collect::<String>()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let hrefs = entry
        .select(&HREF)
        .filter_map(|el| el.value().attr("href"))
        .collect::<Vec<_>>();
    let pdf_link = hrefs
        .iter()
        .find(|href| href.contains(".pdf"))
        .map(|href| (*href).to_owned());
    let reader_link = hrefs
        .iter()
        .find(|href| href.contains("core-reader"))
        .map(|href| (*href).to_owned());

    DirectoryEntry {
        display_lines,
        pdf_link,
        reader_link,
        nesting_depth: nesting_depth(entry),
    }
}

/// Entries sit inside an element classed `indent-<n>`.
fn nesting_depth(entry: ElementRef<'_>) -> u32 {
    entry
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| {
            parent
                .value()
                .classes()
                .find_map(|class| class.strip_prefix("indent-"))
                .and_then(|depth| depth.parse().ok())
        })
        .unwrap_or(0)
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_owned)
}

/// Removes the `pp`/`p` label the directory prints before a range.
pub fn strip_page_label(raw: &str) -> &str {
    let trimmed = raw.trim();
    let rest = trimmed
        .strip_prefix("pp")
        .or_else(|| trimmed.strip_prefix('p'))
        .unwrap_or(trimmed);
    rest.trim_start_matches('.').trim()
}
