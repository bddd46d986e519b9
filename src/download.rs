//! Runs one download end to end: resolve, crawl, fetch, merge, and the optional EPUB.

use std::path::PathBuf;

use anyhow::Context as _;
use url::Url;

use crate::assemble;
use crate::chapter::{Artifact, ChapterRecord, ChapterStore};
use crate::config::Config;
use crate::crawl;
use crate::directory::{self, BookMetadata, DirectoryPage};
use crate::epub::{self, EpubBook, EpubChapter};
use crate::error::Error;
use crate::extract;
use crate::fetch::{Fetcher, HttpFetcher, fetch_ok};
use crate::manifest;
use crate::output::{self, OutputLayout};
use crate::pdf;

#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub book_dir: PathBuf,
    pub merged_pdf: PathBuf,
    pub epub: Option<PathBuf>,
    pub chapters: usize,
    pub pages: usize,
}

pub async fn run(config: &Config) -> anyhow::Result<DownloadSummary> {
    let fetcher = HttpFetcher::new(&config.user_agent, config.timeout)?;
    download(&fetcher, config).await
}

pub async fn download(fetcher: &dyn Fetcher, config: &Config) -> anyhow::Result<DownloadSummary> {
    let doi_url = config.doi_url()?;
    tracing::info!(doi = %config.doi, url = %doi_url, "resolve DOI");
    let landing = fetch_ok(fetcher, &doi_url).await.context("resolve DOI")?;
    let landing_url = landing.url.clone();

    let html = landing.text();
    let metadata = directory::parse_book_metadata(&html).context("read book metadata")?;
    let first_page =
        directory::parse_directory_page(&html).context("read chapter directory")?;
    tracing::info!(
        title = %metadata.title,
        author = %metadata.author,
        landing = %landing_url,
        "book"
    );

    let layout =
        OutputLayout::create(&config.output_root, &metadata).context("create output directory")?;

    let result = populate(
        fetcher,
        config,
        &metadata,
        &layout,
        &landing_url,
        first_page,
    )
    .await;
    if result.is_err() {
        tracing::warn!(
            dir = %layout.book_dir().display(),
            "download failed; partial output remains"
        );
    }
    result
}

async fn populate(
    fetcher: &dyn Fetcher,
    config: &Config,
    metadata: &BookMetadata,
    layout: &OutputLayout,
    landing_url: &Url,
    first_page: DirectoryPage,
) -> anyhow::Result<DownloadSummary> {
    let mut store = crawl::crawl(fetcher, landing_url, first_page)
        .await
        .context("crawl chapter directory")?;
    if assemble::merge_candidates(&store).next().is_none() {
        anyhow::bail!("chapter directory lists no chapter PDFs");
    }

    let total = store.len();
    let mut manifest_records = Vec::with_capacity(total);
    for record in store.iter_mut() {
        if record.content_link.is_none() {
            tracing::info!(
                chapter = record.sequence_index(),
                title = %record.title,
                "chapter is only offered as HTML; no PDF to fetch"
            );
            manifest_records.push(manifest::manifest_record(record, None));
            continue;
        }
        let path = fetch_chapter_pdf(fetcher, config, layout, record, total)
            .await
            .with_context(|| format!("fetch chapter {:?}", record.title))?;
        manifest_records.push(manifest::manifest_record(
            record,
            Some(layout.relative(&path)),
        ));
    }
    manifest::write(&layout.manifest_path(), &manifest_records)
        .context("write chapter manifest")?;

    let assembled = assemble::assemble(&store).context("merge chapter PDFs")?;
    let merged_pdf = layout.merged_pdf_path();
    output::write_new_file(&merged_pdf, &assembled.pdf).context("write merged PDF")?;
    tracing::info!(
        path = %merged_pdf.display(),
        pages = assembled.layout.total_pages,
        "wrote merged PDF"
    );

    let epub = if config.epub {
        build_epub(fetcher, config, metadata, layout, &mut store)
            .await
            .context("build EPUB")?
    } else {
        None
    };

    Ok(DownloadSummary {
        book_dir: layout.book_dir().to_path_buf(),
        merged_pdf,
        epub,
        chapters: store.len(),
        pages: assembled.layout.total_pages,
    })
}

async fn fetch_chapter_pdf(
    fetcher: &dyn Fetcher,
    config: &Config,
    layout: &OutputLayout,
    record: &mut ChapterRecord,
    total: usize,
) -> anyhow::Result<PathBuf> {
    let link = record
        .content_link
        .as_deref()
        .ok_or_else(|| Error::ArtifactMissing {
            title: record.title.clone(),
        })?;
    let url = config
        .base_url
        .join(link)
        .with_context(|| format!("resolve chapter link: {link}"))?;

    tracing::info!(
        chapter = record.sequence_index(),
        of = total,
        title = %record.title,
        "fetch chapter PDF"
    );
    let resource = fetch_ok(fetcher, &url).await?;
    let summary = pdf::inspect(&resource.body).map_err(|source| Error::MalformedArtifact {
        title: record.title.clone(),
        source,
    })?;

    let path = layout.chapter_artifact_path(record, "pdf");
    output::write_new_file(&path, &resource.body)?;

    record.artifact = Some(Artifact {
        bytes: resource.body,
        page_count: summary.page_count,
        has_outline: summary.has_outline,
    });
    Ok(path)
}

/// Returns `None` when some chapter has no usable HTML form.
async fn build_epub(
    fetcher: &dyn Fetcher,
    config: &Config,
    metadata: &BookMetadata,
    layout: &OutputLayout,
    store: &mut ChapterStore,
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(record) = store
        .iter()
        .find(|record| record.alternate_content_link.is_none())
    {
        tracing::info!(title = %record.title, "chapter has no HTML reader form; skipping EPUB");
        return Ok(None);
    }

    for record in store.iter_mut() {
        let Some(link) = record.alternate_content_link.clone() else {
            continue;
        };
        let url = config
            .base_url
            .join(&link)
            .with_context(|| format!("resolve reader link: {link}"))?;

        tracing::info!(chapter = record.sequence_index(), title = %record.title, "fetch reader HTML");
        let resource = fetch_ok(fetcher, &url)
            .await
            .with_context(|| format!("fetch reader page for {:?}", record.title))?;
        output::write_new_file(&layout.chapter_artifact_path(record, "html"), &resource.body)?;

        let Some(fragment) = extract::content_fragment(&resource.text()) else {
            tracing::info!(title = %record.title, "reader page has no content region; skipping EPUB");
            return Ok(None);
        };
        record.html_fragment = Some(fragment);
    }

    let book = EpubBook {
        identifier: format!("urn:doi:{}", config.doi),
        title: metadata.title.clone(),
        author: metadata.author.clone(),
        lang: "en".to_owned(),
        chapters: store
            .iter()
            .map(|record| EpubChapter {
                stem: format!("ch{:03}", record.sequence_index()),
                title: record.title.clone(),
                body_html: record.html_fragment.clone().unwrap_or_default(),
            })
            .collect(),
    };
    let bytes = epub::render(&book)?;
    let path = layout.epub_path();
    output::write_new_file(&path, &bytes)?;
    tracing::info!(path = %path.display(), chapters = book.chapters.len(), "wrote EPUB");
    Ok(Some(path))
}
