use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pdfbucket::bookmark::{BookmarkStore, Bookmarks};
use pdfbucket::settings::ViewerSettings;
use pdfbucket::test_utils::{FakeDocument, FakeEngine};
use pdfbucket::{DocumentDescriptor, PageTarget, Viewer};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

fn descriptor(key: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        key: key.to_string(),
        url: format!("mem://{key}?expires=3600"),
        size: 100,
        last_modified: Utc::now(),
    }
}

fn open(engine: &FakeEngine, bookmarks: Bookmarks, key: &str) -> Viewer {
    let mut viewer = Viewer::new(
        Arc::new(engine.clone()),
        Box::new(bookmarks),
        &ViewerSettings::default(),
    );
    viewer.select_document(descriptor(key));
    assert!(viewer.settle(WAIT));
    viewer
}

#[test]
fn saved_page_is_restored_in_a_later_session() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bookmarks.json");
    let engine = FakeEngine::new();
    engine.add_document("mem://manual.pdf", FakeDocument::new(20));

    let mut viewer = open(&engine, Bookmarks::load_or_ephemeral(Some(&path)), "manual.pdf");
    viewer.go_to_page(PageTarget::Absolute(14));
    assert!(viewer.settle(WAIT));
    assert_eq!(viewer.save_bookmark().unwrap(), Some(14));
    drop(viewer);

    let stored = Bookmarks::load_from_file(&path).unwrap();
    assert_eq!(stored.page_for("manual.pdf").unwrap(), Some(14));

    let viewer = open(&engine, stored, "manual.pdf");
    assert_eq!(viewer.current_page(), Some(14));
    assert_eq!(viewer.displayed_page().unwrap().page, 14);
}

#[test]
fn bookmark_beyond_the_document_starts_on_page_one() {
    let engine = FakeEngine::new();
    engine.add_document("mem://short.pdf", FakeDocument::new(3));
    let mut bookmarks = Bookmarks::ephemeral();
    bookmarks.save_page("short.pdf", 8).unwrap();

    let viewer = open(&engine, bookmarks, "short.pdf");
    assert_eq!(viewer.current_page(), Some(1));
}

#[test]
fn bookmarks_are_per_document() {
    let engine = FakeEngine::new();
    engine.add_document("mem://a.pdf", FakeDocument::new(10));
    engine.add_document("mem://b.pdf", FakeDocument::new(10));
    let mut bookmarks = Bookmarks::ephemeral();
    bookmarks.save_page("a.pdf", 6).unwrap();

    let mut viewer = open(&engine, bookmarks, "a.pdf");
    assert_eq!(viewer.current_page(), Some(6));

    viewer.select_document(descriptor("b.pdf"));
    assert!(viewer.settle(WAIT));
    assert_eq!(viewer.current_page(), Some(1));
}

#[test]
fn failed_save_is_not_restored_on_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("missing").join("bookmarks.json");
    let engine = FakeEngine::new();
    engine.add_document("mem://a.pdf", FakeDocument::new(10));

    let mut viewer = open(&engine, Bookmarks::with_file(&path), "a.pdf");
    viewer.go_to_page(PageTarget::Absolute(7));
    assert!(viewer.settle(WAIT));
    assert!(viewer.save_bookmark().is_err());

    viewer.select_document(descriptor("a.pdf"));
    assert!(viewer.settle(WAIT));
    assert_eq!(viewer.current_page(), Some(1));
}
