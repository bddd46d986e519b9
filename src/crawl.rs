use url::Url;

use crate::chapter::{ChapterStore, NewChapter};
use crate::directory::{self, DirectoryEntry, DirectoryPage};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, fetch_ok};
use crate::page_range;

/// Progress through the paginated directory. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryCursor {
    current_page: usize,
    total_pages: usize,
}

impl DirectoryCursor {
    pub fn new(total_pages: usize) -> Self {
        Self {
            current_page: 1,
            total_pages: total_pages.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_finished(&self) -> bool {
        self.current_page == self.total_pages
    }

    /// Moves to the next page, or returns `None` once the last page was reached.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        self.current_page += 1;
        Some(self.current_page)
    }
}

pub fn directory_page_url(landing_url: &Url, page: usize) -> Url {
    let mut url = landing_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("pageNum", &page.to_string());
    url
}

/// Walks every directory page after `first_page` and collects the chapters in order.
///
/// The page count is taken from `first_page` only; later pages are not consulted for it.
pub async fn crawl(
    fetcher: &dyn Fetcher,
    landing_url: &Url,
    first_page: DirectoryPage,
) -> Result<ChapterStore> {
    let mut store = ChapterStore::new();
    let mut cursor = DirectoryCursor::new(first_page.total_pages.unwrap_or(1));
    tracing::info!(pages = cursor.total_pages(), "crawl chapter directory");

    append_entries(&mut store, first_page.entries)?;

    while let Some(page) = cursor.advance() {
        let url = directory_page_url(landing_url, page);
        tracing::info!(page, of = cursor.total_pages(), "fetch directory page");
        let resource = fetch_ok(fetcher, &url).await?;
        let parsed = directory::parse_directory_page(&resource.text())?;
        append_entries(&mut store, parsed.entries)?;
    }

    tracing::info!(chapters = store.len(), "chapter directory complete");
    Ok(store)
}

fn append_entries(store: &mut ChapterStore, entries: Vec<DirectoryEntry>) -> Result<()> {
    for entry in entries {
        if !entry.has_content() {
            tracing::debug!(title = ?entry.display_lines.first(), "skip entry without content");
            continue;
        }
        let chapter = chapter_from_entry(entry)?;
        let record = store.append(chapter);
        tracing::debug!(
            sequence = record.sequence_index(),
            title = %record.title,
            pages = ?record.page_range_raw,
            "chapter"
        );
    }
    Ok(())
}

fn chapter_from_entry(entry: DirectoryEntry) -> Result<NewChapter> {
    let mut lines = entry.display_lines.into_iter();
    let title = lines.next().ok_or(Error::MetadataMissing {
        what: "chapter title",
    })?;

    let page_range_raw = lines
        .next()
        .map(|line| directory::strip_page_label(&line).to_owned())
        .filter(|raw| !raw.is_empty());

    let page_range = match page_range_raw.as_deref() {
        Some(raw) => Some(page_range::parse(raw).map_err(|source| Error::Pagination {
            title: title.clone(),
            source,
        })?),
        None => None,
    };

    Ok(NewChapter {
        title,
        content_link: entry.pdf_link,
        alternate_content_link: entry.reader_link,
        page_range_raw,
        page_range,
        nesting_depth: entry.nesting_depth,
    })
}
