use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::chapter::ChapterRecord;
use crate::directory::BookMetadata;
use crate::error::{Error, Result};

/// Where one book's files go: `<root>/<author>_<title>/`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    book_dir: PathBuf,
    stem: String,
}

impl OutputLayout {
    /// Creates the book directory and its `chapters/` subdirectory.
    ///
    /// Fails if the book directory already exists; the output root itself may.
    pub fn create(root: &Path, metadata: &BookMetadata) -> Result<Self> {
        let layout = Self::plan(root, metadata);

        if layout.book_dir.exists() {
            return Err(Error::OutputExists {
                path: layout.book_dir,
            });
        }
        std::fs::create_dir_all(root).map_err(|err| Error::fs(root, err))?;
        create_new_dir(&layout.book_dir)?;
        create_new_dir(&layout.chapters_dir())?;

        tracing::info!(dir = %layout.book_dir.display(), "created output directory");
        Ok(layout)
    }

    /// Computes the paths without touching the filesystem.
    pub fn plan(root: &Path, metadata: &BookMetadata) -> Self {
        let stem = format!("{}_{}", sanitize(&metadata.author), sanitize(&metadata.title));
        Self {
            book_dir: root.join(&stem),
            stem,
        }
    }

    pub fn book_dir(&self) -> &Path {
        &self.book_dir
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.book_dir.join("chapters")
    }

    /// `chapters/<NN>_<title>_<range>.<ext>`; the range part is empty when absent.
    pub fn chapter_artifact_path(&self, record: &ChapterRecord, extension: &str) -> PathBuf {
        let range = record.page_range_raw.as_deref().map(sanitize).unwrap_or_default();
        self.chapters_dir().join(format!(
            "{:02}_{}_{range}.{extension}",
            record.sequence_index(),
            sanitize(&record.title),
        ))
    }

    pub fn merged_pdf_path(&self) -> PathBuf {
        self.book_dir.join(format!("{}.pdf", self.stem))
    }

    pub fn epub_path(&self) -> PathBuf {
        self.book_dir.join(format!("{}.epub", self.stem))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.book_dir.join("chapters.jsonl")
    }

    /// Path relative to the book directory, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.book_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Keeps ASCII letters, digits and `-_.() `, then turns spaces into `-`.
///
/// En dashes count as hyphens so page ranges keep their separator.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\u{2013}' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '-' | '_' | '.' | '(' | ')' | ' '))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// Writes a file that must not exist yet.
pub fn write_new_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => Error::OutputExists {
                path: path.to_path_buf(),
            },
            _ => Error::fs(path, err),
        })?;
    file.write_all(bytes).map_err(|err| Error::fs(path, err))?;
    file.flush().map_err(|err| Error::fs(path, err))?;
    Ok(())
}

fn create_new_dir(path: &Path) -> Result<()> {
    std::fs::create_dir(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::AlreadyExists => Error::OutputExists {
            path: path.to_path_buf(),
        },
        _ => Error::fs(path, err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{ChapterStore, NewChapter};

    fn metadata() -> BookMetadata {
        BookMetadata {
            title: "A History: of Things?".to_owned(),
            author: "Jane Doe".to_owned(),
        }
    }

    #[test]
    fn sanitize_keeps_the_allowed_set() {
        assert_eq!(sanitize("A History: of Things?"), "A-History-of-Things");
        assert_eq!(sanitize("Notes (1914–1918)"), "Notes-(1914-1918)");
        assert_eq!(sanitize("12\u{2013}30"), "12-30");
        assert_eq!(sanitize("v1.2_final"), "v1.2_final");
        assert_eq!(sanitize("日本語"), "");
    }

    #[test]
    fn paths_follow_the_book_stem() {
        let layout = OutputLayout::plan(Path::new("out"), &metadata());
        assert_eq!(
            layout.book_dir(),
            Path::new("out/Jane-Doe_A-History-of-Things")
        );
        assert_eq!(
            layout.merged_pdf_path(),
            Path::new("out/Jane-Doe_A-History-of-Things/Jane-Doe_A-History-of-Things.pdf")
        );
        assert_eq!(
            layout.epub_path(),
            Path::new("out/Jane-Doe_A-History-of-Things/Jane-Doe_A-History-of-Things.epub")
        );
        assert_eq!(
            layout.manifest_path(),
            Path::new("out/Jane-Doe_A-History-of-Things/chapters.jsonl")
        );
    }

    #[test]
    fn chapter_paths_carry_index_title_and_range() {
        let layout = OutputLayout::plan(Path::new("out"), &metadata());
        let mut store = ChapterStore::new();
        store.append(NewChapter {
            title: "Introduction: Why?".to_owned(),
            content_link: Some("/intro.pdf".to_owned()),
            alternate_content_link: None,
            page_range_raw: Some("1-10".to_owned()),
            page_range: None,
            nesting_depth: 0,
        });
        store.append(NewChapter {
            title: "Plates".to_owned(),
            content_link: Some("/plates.pdf".to_owned()),
            alternate_content_link: None,
            page_range_raw: None,
            page_range: None,
            nesting_depth: 0,
        });
        let records = store.iter().collect::<Vec<_>>();

        let intro = layout.chapter_artifact_path(records[0], "pdf");
        assert!(intro.ends_with("chapters/01_Introduction-Why_1-10.pdf"));
        assert_eq!(layout.relative(&intro), "chapters/01_Introduction-Why_1-10.pdf");

        let plates = layout.chapter_artifact_path(records[1], "html");
        assert!(plates.ends_with("chapters/02_Plates_.html"));
    }

    #[test]
    fn create_refuses_an_existing_book_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = OutputLayout::create(temp.path(), &metadata()).unwrap();
        assert!(layout.chapters_dir().is_dir());

        let err = OutputLayout::create(temp.path(), &metadata()).unwrap_err();
        assert!(matches!(err, Error::OutputExists { .. }));
    }

    #[test]
    fn write_new_file_never_overwrites() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("a.pdf");
        write_new_file(&path, b"first").unwrap();

        let err = write_new_file(&path, b"second").unwrap_err();
        assert!(matches!(err, Error::OutputExists { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"first");
    }
}
