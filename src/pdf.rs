//! PDF plumbing on top of `lopdf`: chapter inspection and the merge itself.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};

use crate::assemble::{ChapterPlacement, LabelStyle};
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_PAGE_TREE_DEPTH: usize = 64;
const MAX_OUTLINE_ITEMS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub page_count: usize,
    pub has_outline: bool,
}

pub fn inspect(bytes: &[u8]) -> Result<ArtifactSummary, lopdf::Error> {
    let doc = Document::load_mem(bytes)?;
    Ok(ArtifactSummary {
        page_count: doc.get_pages().len(),
        has_outline: !navigable_outline(&doc).is_empty(),
    })
}

/// One chapter's input to [`merge`].
#[derive(Debug, Clone, Copy)]
pub struct ChapterPages<'a> {
    pub title: &'a str,
    pub bytes: &'a [u8],
    pub placement: &'a ChapterPlacement,
}

/// Concatenates the chapters into a single PDF with one flat page tree.
///
/// Chapters with a bookmark get a new top-level outline item; chapters without
/// one contribute their own top-level outline items instead.
pub fn merge(chapters: &[ChapterPages<'_>]) -> Result<Vec<u8>> {
    let mut merged = Document::with_version("1.7");
    let pages_id = merged.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    let mut outline_items: Vec<ObjectId> = Vec::new();
    let mut label_nums: Vec<Object> = Vec::new();

    for chapter in chapters {
        let mut doc = Document::load_mem(chapter.bytes).map_err(|source| {
            Error::MalformedArtifact {
                title: chapter.title.to_owned(),
                source,
            }
        })?;
        doc.renumber_objects_with(merged.max_id + 1);

        let page_ids = doc.get_pages().into_values().collect::<Vec<_>>();
        if page_ids.len() != chapter.placement.page_count {
            return Err(Error::PageCountMismatch {
                title: chapter.title.to_owned(),
                expected: chapter.placement.page_count,
                actual: page_ids.len(),
            });
        }
        let inherited = page_ids
            .iter()
            .map(|page_id| inherited_attributes(&doc, *page_id))
            .collect::<Vec<_>>();
        let own_outline = navigable_outline(&doc);

        merged.max_id = merged.max_id.max(doc.max_id);
        merged.objects.extend(doc.objects);

        for (page_id, attributes) in page_ids.iter().zip(inherited) {
            let page = merged
                .get_object_mut(*page_id)
                .and_then(Object::as_dict_mut)
                .map_err(Error::Merge)?;
            page.set("Parent", pages_id);
            for (key, value) in attributes {
                if !page.has(key) {
                    page.set(key, value);
                }
            }
            kids.push(Object::Reference(*page_id));
        }

        match (&chapter.placement.bookmark, page_ids.first()) {
            (Some(bookmark), Some(first_page)) => {
                let item_id = merged.add_object(dictionary! {
                    "Title" => text_string(&bookmark.title),
                    "Dest" => vec![Object::Reference(*first_page), Object::Name(b"Fit".to_vec())],
                });
                outline_items.push(item_id);
            }
            (Some(_), None) => {}
            (None, _) => outline_items.extend(own_outline),
        }

        if chapter.placement.page_count > 0 {
            let start = chapter.placement.first_page_index as i64;
            label_nums.push(Object::Integer(start));
            label_nums.push(Object::Dictionary(label_dictionary(chapter.placement)));
        }
    }

    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outlines_id) = link_outline(&mut merged, &outline_items)? {
        catalog.set("Outlines", outlines_id);
        catalog.set("PageMode", "UseOutlines");
    }
    if !label_nums.is_empty() {
        catalog.set("PageLabels", dictionary! { "Nums" => label_nums });
    }
    let catalog_id = merged.add_object(catalog);
    merged.trailer.set("Root", catalog_id);

    let pruned = merged.prune_objects();
    tracing::debug!(
        pages = page_count,
        outline_items = outline_items.len(),
        pruned = pruned.len(),
        "merged document built"
    );

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|err| Error::Merge(err.into()))?;
    Ok(out)
}

/// Chapters without a printed range get an unstyled range so they do not
/// continue the previous chapter's numbering.
fn label_dictionary(placement: &ChapterPlacement) -> Dictionary {
    let Some(label) = placement.label else {
        return Dictionary::new();
    };
    let style: &[u8] = match label.style {
        LabelStyle::Decimal => b"D",
        LabelStyle::LowercaseRoman => b"r",
    };
    dictionary! {
        "S" => Object::Name(style.to_vec()),
        "St" => Object::Integer(i64::from(label.start_value)),
    }
}

/// Chains the items under a fresh outline root. Returns the root, if any.
fn link_outline(doc: &mut Document, items: &[ObjectId]) -> Result<Option<ObjectId>> {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Ok(None);
    };
    let outlines_id = doc.new_object_id();

    for (idx, item_id) in items.iter().enumerate() {
        let item = doc
            .get_object_mut(*item_id)
            .and_then(Object::as_dict_mut)
            .map_err(Error::Merge)?;
        item.set("Parent", outlines_id);
        item.remove(b"Prev");
        item.remove(b"Next");
        if let Some(prev) = idx.checked_sub(1).and_then(|prev| items.get(prev)) {
            item.set("Prev", *prev);
        }
        if let Some(next) = items.get(idx + 1) {
            item.set("Next", *next);
        }
    }

    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => *first,
            "Last" => *last,
            "Count" => Object::Integer(items.len() as i64),
        }),
    );
    Ok(Some(outlines_id))
}

/// Top-level outline items, but only when every one of them targets a page
/// directly. Named destinations resolve through the chapter's own catalog,
/// which does not survive the merge.
fn navigable_outline(doc: &Document) -> Vec<ObjectId> {
    let items = top_level_outline_items(doc);
    let all_explicit = items.iter().all(|item_id| {
        doc.get_dictionary(*item_id)
            .is_ok_and(|item| has_explicit_destination(doc, item))
    });
    if all_explicit { items } else { Vec::new() }
}

/// `/Dest [page ...]`, or a `/GoTo` action with `/D [page ...]`.
fn has_explicit_destination(doc: &Document, item: &Dictionary) -> bool {
    let destination = item.get(b"Dest").ok().or_else(|| {
        item.get(b"A")
            .ok()
            .and_then(|action| resolve_object(doc, action).as_dict().ok())
            .filter(|action| {
                action
                    .get(b"S")
                    .and_then(Object::as_name)
                    .is_ok_and(|kind| kind == b"GoTo")
            })
            .and_then(|action| action.get(b"D").ok())
    });
    let Some(destination) = destination else {
        return false;
    };
    match resolve_object(doc, destination) {
        Object::Array(parts) => matches!(parts.first(), Some(Object::Reference(_))),
        _ => false,
    }
}

fn resolve_object<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn top_level_outline_items(doc: &Document) -> Vec<ObjectId> {
    let Some(outlines) = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Outlines").ok())
        .and_then(|outlines| resolve_dictionary(doc, outlines))
    else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut next = outlines.get(b"First").and_then(Object::as_reference).ok();
    while let Some(item_id) = next {
        if items.contains(&item_id) || items.len() >= MAX_OUTLINE_ITEMS {
            break;
        }
        items.push(item_id);
        next = doc
            .get_dictionary(item_id)
            .and_then(|item| item.get(b"Next"))
            .and_then(Object::as_reference)
            .ok();
    }
    items
}

/// Looks up inherited page attributes the page does not set itself.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for key in INHERITABLE_PAGE_KEYS {
        if page.has(key) {
            continue;
        }
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(parent_id) = parent {
            if depth >= MAX_PAGE_TREE_DEPTH {
                break;
            }
            depth += 1;
            let Ok(node) = doc.get_dictionary(parent_id) else {
                break;
            };
            if let Ok(value) = node.get(key) {
                found.push((key, value.clone()));
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }
    found
}

fn resolve_dictionary<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dictionary) => Some(dictionary),
        _ => None,
    }
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
