use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use predicates::prelude::*;

const DOI: &str = "10.1017/things";
const LANDING_PATH: &str = "/core/books/a-history-of-things/0123";
const BOOK_DIR: &str = "Jane-Doe_A-History-of-Things";

fn blank_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..page_count {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save pdf");
    out
}

fn entry(title: &str, range: Option<&str>, pdf: &str) -> String {
    let range = range.map(|r| format!("\n  pp {r}")).unwrap_or_default();
    format!(
        r#"<li class="indent-0"><ul class="details">
  <li><a class="part-link" href="/core/books/x">{title}{range}</a></li>
  <li><a href="{pdf}">PDF</a></li>
</ul></li>"#
    )
}

fn landing_page() -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta name="citation_title" content="A History of Things">
    <meta name="citation_author" content="Jane Doe">
  </head>
  <body>
    <div data-test-id="paginationSearchResult"><p>Page 1 of 2</p></div>
    <ul>
      <li class="indent-0"><ul class="details">
        <li><a class="part-link" href="/core/books/x">Contents</a></li>
      </ul></li>
      {front}
      {one}
    </ul>
  </body>
</html>
"#,
        front = entry("Frontmatter", Some("i-iv"), "/pdf/front.pdf"),
        one = entry("Chapter One", Some("1-10"), "/pdf/one.pdf"),
    )
}

fn second_page() -> String {
    format!(
        r#"<html><body>
    <div data-test-id="paginationSearchResult"><p>Page 2 of 2</p></div>
    <ul>{plates}</ul>
</body></html>"#,
        plates = entry("Plates", None, "/pdf/plates.pdf"),
    )
}

fn spawn_book_server() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = request.url().to_owned();
            let (status, body, content_type): (u16, Vec<u8>, &str) = match url.as_str() {
                path if path == format!("/doi/{DOI}") => {
                    let location =
                        tiny_http::Header::from_bytes("Location", LANDING_PATH).expect("header");
                    let _ = request.respond(tiny_http::Response::empty(302).with_header(location));
                    continue;
                }
                LANDING_PATH => (200, landing_page().into_bytes(), "text/html"),
                path if path == format!("{LANDING_PATH}?pageNum=2") => {
                    (200, second_page().into_bytes(), "text/html")
                }
                "/pdf/front.pdf" => (200, blank_pdf(4), "application/pdf"),
                "/pdf/one.pdf" => (200, blank_pdf(12), "application/pdf"),
                "/pdf/plates.pdf" => (200, blank_pdf(3), "application/pdf"),
                _ => (404, b"not found".to_vec(), "text/plain"),
            };

            let header =
                tiny_http::Header::from_bytes("Content-Type", content_type).expect("header");
            let _ = request.respond(
                tiny_http::Response::from_data(body)
                    .with_status_code(status)
                    .with_header(header),
            );
        }
    });

    (base_url, shutdown_tx, handle)
}

fn corebook(base_url: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("corebook");
    cmd.env("COREBOOK_BASE_URL", base_url)
        .env("COREBOOK_RESOLVER_URL", format!("{base_url}/doi/"))
        .env("COREBOOK_TIMEOUT_SECS", "10");
    cmd
}

fn page_label_starts(doc: &Document) -> Vec<i64> {
    let catalog = doc.catalog().expect("catalog");
    let labels = catalog
        .get(b"PageLabels")
        .and_then(Object::as_dict)
        .expect("page labels");
    labels
        .get(b"Nums")
        .and_then(Object::as_array)
        .expect("nums")
        .iter()
        .step_by(2)
        .map(|start| start.as_i64().expect("label start"))
        .collect()
}

#[test]
fn download_writes_the_book_layout() {
    let (base_url, shutdown, handle) = spawn_book_server();
    let out = tempfile::TempDir::new().expect("tempdir");

    corebook(&base_url)
        .args([DOI, "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{BOOK_DIR}.pdf")));

    let book_dir = out.path().join(BOOK_DIR);
    for name in [
        "chapters/01_Frontmatter_i-iv.pdf",
        "chapters/02_Chapter-One_1-10.pdf",
        "chapters/03_Plates_.pdf",
        "chapters.jsonl",
    ] {
        assert!(book_dir.join(name).is_file(), "missing {name}");
    }

    let manifest = std::fs::read_to_string(book_dir.join("chapters.jsonl")).expect("manifest");
    let records = manifest
        .lines()
        .map(|line| serde_json::from_str::<corebook::formats::ChapterManifestRecord>(line))
        .collect::<Result<Vec<_>, _>>()
        .expect("parse manifest");
    let titles = records.iter().map(|r| r.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["Frontmatter", "Chapter One", "Plates"]);
    assert_eq!(records[1].artifact_page_count, Some(12));
    assert_eq!(records[1].nominal_page_count, Some(10));

    let merged = Document::load(book_dir.join(format!("{BOOK_DIR}.pdf"))).expect("merged pdf");
    assert_eq!(merged.get_pages().len(), 19);
    assert_eq!(page_label_starts(&merged), vec![0, 4, 16]);

    let _ = shutdown.send(());
    let _ = handle.join();
}

#[test]
fn doi_is_prompted_for_on_stdin() {
    let (base_url, shutdown, handle) = spawn_book_server();
    let out = tempfile::TempDir::new().expect("tempdir");

    corebook(&base_url)
        .args(["--out"])
        .arg(out.path())
        .write_stdin(format!("{DOI}\n"))
        .assert()
        .success()
        .stderr(predicate::str::contains("DOI: "));

    assert!(out.path().join(BOOK_DIR).join(format!("{BOOK_DIR}.pdf")).is_file());

    let _ = shutdown.send(());
    let _ = handle.join();
}

#[test]
fn unknown_doi_fails_with_the_http_status() {
    let (base_url, shutdown, handle) = spawn_book_server();
    let out = tempfile::TempDir::new().expect("tempdir");

    corebook(&base_url)
        .args(["10.1017/missing", "--out"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("returned HTTP 404"));

    assert!(!out.path().join(BOOK_DIR).exists());

    let _ = shutdown.send(());
    let _ = handle.join();
}

#[test]
fn existing_book_directory_is_not_overwritten() {
    let (base_url, shutdown, handle) = spawn_book_server();
    let out = tempfile::TempDir::new().expect("tempdir");
    let book_dir = out.path().join(BOOK_DIR);
    std::fs::create_dir_all(&book_dir).expect("create book dir");
    std::fs::write(book_dir.join("keep.txt"), "mine").expect("write marker");

    corebook(&base_url)
        .args([DOI, "--out"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(
        std::fs::read_to_string(book_dir.join("keep.txt")).expect("marker"),
        "mine"
    );
    assert!(!Path::new(&book_dir).join("chapters").exists());

    let _ = shutdown.send(());
    let _ = handle.join();
}

#[test]
fn malformed_doi_is_rejected_before_any_request() {
    corebook("http://127.0.0.1:9")
        .args(["not-a-doi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid DOI"));
}
