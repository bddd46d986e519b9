use crate::page_range::{NumberingScheme, PageRange};

/// A chapter entry as it appears in the directory, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChapter {
    pub title: String,
    pub content_link: Option<String>,
    pub alternate_content_link: Option<String>,
    pub page_range_raw: Option<String>,
    pub page_range: Option<PageRange>,
    pub nesting_depth: u32,
}

/// Fetched chapter PDF plus what the fetch stage learned about it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// Physical page count; may differ from the printed range.
    pub page_count: usize,
    /// Whether the PDF already carries its own outline.
    pub has_outline: bool,
}

#[derive(Debug, Clone)]
pub struct ChapterRecord {
    pub title: String,
    pub content_link: Option<String>,
    pub alternate_content_link: Option<String>,
    pub page_range_raw: Option<String>,
    pub page_range: Option<PageRange>,
    pub nesting_depth: u32,
    pub artifact: Option<Artifact>,
    pub html_fragment: Option<String>,
    sequence_index: usize,
}

impl ChapterRecord {
    /// 1-based position in chapter order, fixed when the record was appended.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn numbering_scheme(&self) -> NumberingScheme {
        self.page_range
            .map_or(NumberingScheme::None, |range| range.scheme)
    }

    pub fn nominal_page_count(&self) -> Option<u32> {
        self.page_range
            .filter(|range| range.scheme != NumberingScheme::None)
            .map(|range| range.nominal_page_count())
    }
}

/// Chapters in document order. Append-only.
#[derive(Debug, Clone, Default)]
pub struct ChapterStore {
    records: Vec<ChapterRecord>,
}

impl ChapterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chapter: NewChapter) -> &ChapterRecord {
        let sequence_index = self.records.len() + 1;
        self.records.push(ChapterRecord {
            title: chapter.title,
            content_link: chapter.content_link,
            alternate_content_link: chapter.alternate_content_link,
            page_range_raw: chapter.page_range_raw,
            page_range: chapter.page_range,
            nesting_depth: chapter.nesting_depth,
            artifact: None,
            html_fragment: None,
            sequence_index,
        });
        &self.records[sequence_index - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChapterRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ChapterRecord> {
        self.records.iter_mut()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.title.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ChapterStore {
    type Item = &'a ChapterRecord;
    type IntoIter = std::slice::Iter<'a, ChapterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
