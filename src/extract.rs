//! Pulls the readable body out of a chapter's reader page.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::directory::selector;

static CONTENT_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("#content-container"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script, style, noscript"));

/// Inner HTML of `#content-container`, or `None` if the page has no such region.
pub fn content_fragment(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let container = document.select(&CONTENT_CONTAINER).next()?;

    let mut fragment = container.inner_html();
    for script in container.select(&SCRIPT) {
        fragment = fragment.replace(&script.html(), "");
    }

    let fragment = fragment.trim();
    if fragment.is_empty() {
        return None;
    }
    Some(fragment.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_region_is_extracted_without_scripts() {
        let html = r#"<html><body>
            <nav>Site chrome</nav>
            <div id="content-container">
              <h2>Introduction</h2>
              <p>First paragraph.</p>
              <script>track()</script>
            </div>
        </body></html>"#;

        let fragment = content_fragment(html).unwrap();
        assert!(fragment.starts_with("<h2>Introduction</h2>"));
        assert!(fragment.contains("<p>First paragraph.</p>"));
        assert!(!fragment.contains("track()"));
        assert!(!fragment.contains("Site chrome"));
    }

    #[test]
    fn missing_or_empty_region_yields_none() {
        assert_eq!(content_fragment("<html><body><p>x</p></body></html>"), None);
        assert_eq!(
            content_fragment(r#"<div id="content-container">  </div>"#),
            None
        );
    }
}
