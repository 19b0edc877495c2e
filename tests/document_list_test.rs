use std::sync::Arc;
use std::time::Duration;

use pdfbucket::bookmark::Bookmarks;
use pdfbucket::document_list::{ListStatus, entry_summary};
use pdfbucket::settings::Settings;
use pdfbucket::store::ObjectStore;
use pdfbucket::test_utils::{FakeDocument, FakeEngine, MemoryStore};
use pdfbucket::thumbnail::Thumbnail;
use pdfbucket::{App, Error, Phase};

const WAIT: Duration = Duration::from_secs(5);

fn app(store: &Arc<MemoryStore>, engine: &FakeEngine) -> App<FakeEngine> {
    let mut settings = Settings::default();
    settings.viewer.load_retry_delay_ms = 1;
    settings.thumbnail_workers = 2;
    let store: Arc<dyn ObjectStore> = store.clone();
    App::new(
        store,
        Arc::new(engine.clone()),
        Box::new(Bookmarks::ephemeral()),
        &settings,
    )
}

#[test]
fn newer_documents_are_listed_first() {
    let store = Arc::new(MemoryStore::new());
    store.insert("a.pdf", vec![0; 2048], 1_000);
    store.insert("b.pdf", vec![0; 4096], 2_000);
    let engine = FakeEngine::new();

    let app = app(&store, &engine);
    let keys: Vec<&str> = app
        .list()
        .entries()
        .iter()
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, vec!["b.pdf", "a.pdf"]);
    assert!(
        entry_summary(&app.list().entries()[0]).starts_with("Size: 4.00 KB • Last modified: ")
    );
}

#[test]
fn one_broken_thumbnail_leaves_the_others_alone() {
    let store = Arc::new(MemoryStore::new());
    store.insert("old.pdf", vec![1; 100], 100);
    store.insert("broken.pdf", vec![2; 100], 200);
    store.insert("new.pdf", vec![3; 100], 300);
    let engine = FakeEngine::new();
    engine.add_document("mem://old.pdf", FakeDocument::new(2));
    engine.add_document("mem://new.pdf", FakeDocument::new(4));

    let mut app = app(&store, &engine);
    app.wait_for_thumbnails(WAIT);

    let list = app.list();
    let keys: Vec<&str> = list.entries().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["new.pdf", "broken.pdf", "old.pdf"]);

    assert!(matches!(
        list.thumbnail("new.pdf"),
        Thumbnail::Image(uri) if uri.starts_with("data:image/png;base64,")
    ));
    assert_eq!(list.thumbnail("broken.pdf"), &Thumbnail::Placeholder);
    assert!(matches!(list.thumbnail("old.pdf"), Thumbnail::Image(_)));
}

#[test]
fn selecting_an_entry_opens_it_in_the_viewer() {
    let store = Arc::new(MemoryStore::new());
    store.insert("reports/q3.pdf", vec![0; 10], 10);
    let engine = FakeEngine::new();
    engine.add_document("mem://reports/q3.pdf", FakeDocument::new(12));

    let mut app = app(&store, &engine);
    app.select("reports/q3.pdf").unwrap();
    assert!(app.viewer_mut().settle(WAIT));

    let viewer = app.viewer();
    assert_eq!(viewer.phase(), Phase::Ready);
    assert_eq!(viewer.page_count(), 12);
    assert_eq!(viewer.title().as_deref(), Some("reports/q3"));
}

#[test]
fn listing_failure_is_reported_on_the_list() {
    let store = Arc::new(MemoryStore::new());
    store.fail_list(true);
    let engine = FakeEngine::new();

    let mut app = app(&store, &engine);
    assert_eq!(
        app.list().status(),
        ListStatus::Failed("Failed to load PDFs. Please try again later.")
    );
    assert!(matches!(app.select("a.pdf"), Err(Error::NotListed(_))));
}
