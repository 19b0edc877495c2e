use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pdfbucket::bookmark::Bookmarks;
use pdfbucket::settings::ViewerSettings;
use pdfbucket::test_utils::{FakeDocument, FakeEngine};
use pdfbucket::{DocumentDescriptor, PageTarget, Phase, Viewer};

const WAIT: Duration = Duration::from_secs(5);

fn settings() -> ViewerSettings {
    ViewerSettings {
        container_width: 1000.0,
        load_attempts: 10,
        load_retry_delay_ms: 1,
    }
}

fn descriptor(key: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        key: key.to_string(),
        url: format!("mem://{key}?expires=3600"),
        size: 2048,
        last_modified: Utc::now(),
    }
}

fn viewer(engine: &FakeEngine) -> Viewer {
    Viewer::new(
        Arc::new(engine.clone()),
        Box::new(Bookmarks::ephemeral()),
        &settings(),
    )
}

#[test]
fn load_that_fails_twice_then_succeeds_is_ready() {
    let engine = FakeEngine::new();
    engine.add_document("mem://flaky.pdf", FakeDocument::new(7));
    engine.fail_opens("mem://flaky.pdf", 2);
    let mut viewer = viewer(&engine);

    viewer.select_document(descriptor("flaky.pdf"));
    assert!(viewer.settle(WAIT));

    assert_eq!(viewer.phase(), Phase::Ready);
    assert_eq!(viewer.page_count(), 7);
    assert!(viewer.last_error().is_none());
    assert_eq!(engine.open_calls("mem://flaky.pdf"), 3);
}

#[test]
fn navigating_while_a_page_renders_shows_only_the_newer_page() {
    let engine = FakeEngine::new();
    engine.add_document("mem://a.pdf", FakeDocument::new(5));
    let renders = engine.render_log();
    let gate = engine.hold_page(1);
    let mut viewer = viewer(&engine);

    viewer.select_document(descriptor("a.pdf"));
    while viewer.current_page().is_none() {
        assert!(viewer.wait_for_response(WAIT), "document never loaded");
    }
    assert!(gate.wait_until_rendering(WAIT));
    assert_eq!(viewer.phase(), Phase::RenderingPage);

    viewer.go_to_page(PageTarget::Delta(1));
    gate.release();
    assert!(viewer.settle(WAIT));

    assert_eq!(viewer.phase(), Phase::Ready);
    assert_eq!(viewer.current_page(), Some(2));
    assert_eq!(viewer.displayed_page().unwrap().page, 2);

    let finished: Vec<usize> = renders.lock().unwrap().iter().map(|r| r.0).collect();
    assert_eq!(finished, vec![2]);
}

#[test]
fn selecting_another_document_discards_the_first() {
    let engine = FakeEngine::new();
    engine.add_document("mem://slow.pdf", FakeDocument::new(3));
    engine.fail_opens("mem://slow.pdf", 5);
    engine.add_document("mem://fast.pdf", FakeDocument::new(9));
    let mut viewer = Viewer::new(
        Arc::new(engine.clone()),
        Box::new(Bookmarks::ephemeral()),
        &ViewerSettings {
            load_retry_delay_ms: 50,
            ..settings()
        },
    );

    viewer.select_document(descriptor("slow.pdf"));
    viewer.select_document(descriptor("fast.pdf"));
    assert!(viewer.settle(WAIT));

    assert_eq!(viewer.phase(), Phase::Ready);
    assert_eq!(viewer.title().as_deref(), Some("fast"));
    assert_eq!(viewer.page_count(), 9);
    assert!(engine.open_calls("mem://slow.pdf") < 6);
}

#[test]
fn zooming_back_to_100_reproduces_the_fit_scale() {
    let engine = FakeEngine::new();
    engine.add_document("mem://a.pdf", FakeDocument::new(2).with_page_size(612.0, 792.0));
    let mut viewer = viewer(&engine);
    viewer.select_document(descriptor("a.pdf"));
    assert!(viewer.settle(WAIT));
    let fit = viewer.state().fit_scale.unwrap();
    assert_eq!(viewer.displayed_page().unwrap().scale, fit);

    viewer.set_zoom(130);
    viewer.zoom_in();
    assert!(viewer.settle(WAIT));
    assert_eq!(viewer.state().zoom.percent(), 140);
    assert!((viewer.displayed_page().unwrap().scale - fit * 1.4).abs() < 1e-5);

    viewer.set_zoom(100);
    assert!(viewer.settle(WAIT));
    assert_eq!(viewer.displayed_page().unwrap().scale, fit);
}

#[test]
fn zoom_stays_within_limits() {
    let engine = FakeEngine::new();
    engine.add_document("mem://a.pdf", FakeDocument::new(1));
    let mut viewer = viewer(&engine);
    viewer.select_document(descriptor("a.pdf"));
    assert!(viewer.settle(WAIT));

    viewer.set_zoom(500);
    assert_eq!(viewer.state().zoom.percent(), 200);
    viewer.set_zoom(5);
    for _ in 0..3 {
        viewer.zoom_out();
    }
    assert_eq!(viewer.state().zoom.percent(), 50);
}

#[test]
fn navigation_never_leaves_the_document() {
    for page_count in [1, 2, 5, 13] {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(page_count));
        let mut viewer = viewer(&engine);
        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));

        for target in [
            PageTarget::Delta(-1),
            PageTarget::Delta(3),
            PageTarget::Absolute(page_count * 2),
            PageTarget::Delta(1),
            PageTarget::Absolute(0),
            PageTarget::Last,
            PageTarget::Delta(-100),
        ] {
            viewer.go_to_page(target);
            let page = viewer.current_page().unwrap();
            assert!((1..=page_count).contains(&page), "{target:?} gave {page}");
        }
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.displayed_page().unwrap().page, 1);
    }
}
