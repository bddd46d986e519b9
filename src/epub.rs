use std::io::{Cursor, Write as _};

use anyhow::Context as _;
use chrono::Utc;
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone)]
pub struct EpubBook {
    /// Package identifier, e.g. `urn:doi:10.1017/...`.
    pub identifier: String,
    pub title: String,
    pub author: String,
    /// BCP-47 language tag used for EPUB metadata and XHTML documents.
    pub lang: String,
    pub chapters: Vec<EpubChapter>,
}

#[derive(Debug, Clone)]
pub struct EpubChapter {
    /// File stem inside `OEBPS/`; also the manifest id.
    pub stem: String,
    pub title: String,
    /// HTML fragment placed inside `<body>`.
    pub body_html: String,
}

/// Renders the book as an EPUB 3 container with an NCX fallback.
pub fn render(book: &EpubBook) -> anyhow::Result<Vec<u8>> {
    if book.chapters.is_empty() {
        anyhow::bail!("epub needs at least one chapter");
    }
    let lang = match book.lang.trim() {
        "" => "und",
        lang => lang,
    };
    let modified = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    // `mimetype` must be the first entry and stored uncompressed.
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", stored)
        .context("epub start_file mimetype")?;
    zip.write_all(b"application/epub+zip")
        .context("epub write mimetype")?;

    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let entries = [
        ("META-INF/container.xml", CONTAINER_XML.to_owned()),
        ("OEBPS/content.opf", render_content_opf(book, lang, &modified)),
        ("OEBPS/nav.xhtml", render_nav_xhtml(book, lang)),
        ("OEBPS/toc.ncx", render_toc_ncx(book)),
        ("OEBPS/style.css", STYLE_CSS.to_owned()),
    ];
    for (name, contents) in entries {
        zip.start_file(name, deflated)
            .with_context(|| format!("epub start_file {name}"))?;
        zip.write_all(contents.as_bytes())
            .with_context(|| format!("epub write {name}"))?;
    }

    for chapter in &book.chapters {
        let body = ensure_xhtml_entities(&ensure_xhtml_void_tags(&chapter.body_html));
        let xhtml = wrap_xhtml_document(&chapter.title, lang, &body);

        zip.start_file(format!("OEBPS/{}.xhtml", chapter.stem), deflated)
            .with_context(|| format!("epub start_file chapter: {}", chapter.stem))?;
        zip.write_all(xhtml.as_bytes())
            .with_context(|| format!("epub write chapter: {}", chapter.stem))?;
    }

    let cursor = zip.finish().context("epub finish zip")?;
    Ok(cursor.into_inner())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLE_CSS: &str = r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1.2em; line-height: 1.6; }
img { max-width: 100%; height: auto; }
table { border-collapse: collapse; }
.footnote, .fn { font-size: 0.85em; }
blockquote { margin: 1em 0; padding: 0 1em; border-left: 4px solid #ddd; }
"#;

fn push_xhtml_head(out: &mut String, title: &str, lang: &str, epub_namespace: bool) {
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    let epub_ns = if epub_namespace {
        " xmlns:epub=\"http://www.idpf.org/2007/ops\""
    } else {
        ""
    };
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\"{epub_ns} lang=\"{lang}\" xml:lang=\"{lang}\">\n",
        lang = xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
}

fn render_nav_xhtml(book: &EpubBook, lang: &str) -> String {
    let mut out = String::new();
    push_xhtml_head(&mut out, &book.title, lang, true);
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(&book.title)));
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n    <ol>\n");
    for chapter in &book.chapters {
        out.push_str(&format!(
            "      <li><a href=\"{}.xhtml\">{}</a></li>\n",
            xml_escape(&chapter.stem),
            xml_escape(&chapter.title)
        ));
    }
    out.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
    out
}

fn render_toc_ncx(book: &EpubBook) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\" />\n",
        xml_escape(&book.identifier)
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        xml_escape(&book.title)
    ));
    out.push_str(&format!(
        "  <docAuthor><text>{}</text></docAuthor>\n",
        xml_escape(&book.author)
    ));
    out.push_str("  <navMap>\n");
    for (idx, chapter) in book.chapters.iter().enumerate() {
        let play = idx + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
        ));
        out.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            xml_escape(&chapter.title)
        ));
        out.push_str(&format!(
            "      <content src=\"{}.xhtml\" />\n",
            xml_escape(&chapter.stem)
        ));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n</ncx>\n");
    out
}

fn render_content_opf(book: &EpubBook, lang: &str, modified: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">{}</dc:identifier>\n",
        xml_escape(&book.identifier)
    ));
    out.push_str(&format!("    <dc:title>{}</dc:title>\n", xml_escape(&book.title)));
    out.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        xml_escape(&book.author)
    ));
    out.push_str(&format!("    <dc:language>{}</dc:language>\n", xml_escape(lang)));
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(modified)
    ));
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
    for chapter in &book.chapters {
        let stem = xml_escape(&chapter.stem);
        out.push_str(&format!(
            "    <item id=\"{stem}\" href=\"{stem}.xhtml\" media-type=\"application/xhtml+xml\" />\n"
        ));
    }
    out.push_str("  </manifest>\n");

    out.push_str("  <spine toc=\"ncx\">\n");
    for chapter in &book.chapters {
        out.push_str(&format!(
            "    <itemref idref=\"{}\" />\n",
            xml_escape(&chapter.stem)
        ));
    }
    out.push_str("  </spine>\n</package>\n");
    out
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    push_xhtml_head(&mut out, title, lang, false);
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// HTML named entities other than the XML five are undefined in XHTML.
fn ensure_xhtml_entities(html: &str) -> String {
    html.replace("&nbsp;", "&#160;")
}

/// Rewrites void tags like `<img ...>` as `<img ... />`.
fn ensure_xhtml_void_tags(html: &str) -> String {
    const VOID_TAGS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];

    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel_lt) = html[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&html[cursor..lt]);

        // Tag end, skipping `>` inside quoted attribute values.
        let mut in_quote: Option<u8> = None;
        let mut gt = lt + 1;
        while gt < bytes.len() {
            let b = bytes[gt];
            match in_quote {
                Some(q) if b == q => in_quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => in_quote = Some(b),
                None if b == b'>' => break,
                None => {}
            }
            gt += 1;
        }
        if gt >= bytes.len() {
            out.push_str(&html[lt..]);
            return out;
        }

        let raw_tag = &html[lt..=gt];
        cursor = gt + 1;

        let name_start = lt + 1;
        let name_len = html[name_start..gt]
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        let tag_name = html[name_start..name_start + name_len].to_ascii_lowercase();
        if name_len == 0 || !VOID_TAGS.contains(&tag_name.as_str()) {
            out.push_str(raw_tag);
            continue;
        }

        let tag_without_gt = &html[lt..gt];
        if tag_without_gt.trim_end().ends_with('/') {
            out.push_str(raw_tag);
        } else {
            out.push_str(tag_without_gt);
            out.push_str(" />");
        }
    }

    out.push_str(&html[cursor..]);
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
