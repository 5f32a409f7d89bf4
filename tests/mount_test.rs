use std::cell::Cell;

use folio_ngin::{
    capability::{Capabilities, UnsupportedReason, detect},
    config::{MonogramStyle, WidgetKind},
    fallback::{FallbackMarkup, FallbackRenderer},
    flow::{FallbackCause, mount},
    render::RenderError,
    resources::scene::SceneError,
};

use crate::common::test_utils::{
    FakeContainer, FakeProbe, MODERN_ANDROID, OLD_IPHONE, ProbeMode, RecordingBackend,
};

mod common;

#[test]
fn should_mount_the_fallback_without_touching_the_gpu() {
    let container = FakeContainer::new(400, 400);
    let caps = detect(&FakeProbe::desktop().with_mode(ProbeMode::NoContext));
    let called = Cell::new(false);
    let widget = mount(container.clone(), &caps, &WidgetKind::denvil().preset(false), |_| {
        called.set(true);
        Ok(RecordingBackend::new().boxed())
    });

    assert!(!called.get());
    assert!(widget.is_fallback());
    assert!(!widget.outcome().is_scene());
    assert_eq!(
        widget.outcome().cause(),
        Some(&FallbackCause::Unsupported(UnsupportedReason::ContextCreationFailed))
    );
    let html = container.inserted();
    assert_eq!(html.len(), 1);
    assert!(html[0].contains("DENVIL"));
    assert_eq!(container.clears(), 1);
    assert!(widget.session().is_none());
    assert!(widget.disposal().is_none());
}

#[test]
fn should_mount_the_fallback_for_low_end_phones() {
    let container = FakeContainer::new(400, 400);
    let caps = detect(&FakeProbe::new(OLD_IPHONE));
    let widget = mount(container.clone(), &caps, &WidgetKind::Starfield.preset(true), |_| {
        Ok(RecordingBackend::new().boxed())
    });

    assert_eq!(
        widget.outcome().cause(),
        Some(&FallbackCause::Unsupported(UnsupportedReason::LowEndDevice))
    );
    assert_eq!(container.inserted().len(), 1);
}

#[test]
fn should_fall_back_when_no_context_can_be_created() {
    let container = FakeContainer::new(400, 400);
    let caps = Capabilities::assume_supported("FakeGPU");
    let widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Err(RenderError::InitializationFailed("no adapter".into()))
    });

    assert!(matches!(
        widget.outcome().cause(),
        Some(FallbackCause::Context(RenderError::InitializationFailed(_)))
    ));
    assert_eq!(container.inserted().len(), 1);
}

#[test]
fn should_release_the_backend_when_the_scene_fails() {
    let container = FakeContainer::new(400, 400);
    let caps = Capabilities::assume_supported("FakeGPU");
    let backend = RecordingBackend::new().with_allocation_budget(3);
    let log = backend.log();
    let widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Ok(backend.boxed())
    });

    assert!(matches!(
        widget.outcome().cause(),
        Some(FallbackCause::Scene(SceneError::Backend(RenderError::OutOfMemory)))
    ));
    assert!(widget.is_fallback());
    let log = log.borrow();
    assert_eq!(log.live_resources(), 0);
    assert_eq!(log.releases(), 1);
    assert_eq!(container.inserted().len(), 1);
}

#[test]
fn should_switch_to_the_fallback_once_when_rendering_fails() {
    let container = FakeContainer::new(400, 400);
    let caps = Capabilities::assume_supported("FakeGPU");
    let backend = RecordingBackend::new().failing_render_after(2);
    let log = backend.log();
    let mut widget = mount(container.clone(), &caps, &WidgetKind::harsh().preset(false), |_| {
        Ok(backend.boxed())
    });
    let token = widget.session().unwrap().loop_token();

    assert!(widget.frame(0.0));
    assert!(widget.frame(0.016));
    assert!(container.inserted().is_empty());

    assert!(!widget.frame(0.033));
    assert!(widget.is_fallback());
    assert!(!token.is_active());
    assert!(matches!(
        widget.outcome().cause(),
        Some(FallbackCause::Runtime(RenderError::ContextLost(_)))
    ));
    assert_eq!(container.inserted().len(), 1);
    assert!(container.inserted()[0].contains("HARSH"));

    assert!(!widget.frame(0.050));
    assert_eq!(container.inserted().len(), 1);
    assert_eq!(container.clears(), 1);

    let log = log.borrow();
    assert_eq!(log.frame_count(), 2);
    assert_eq!(log.live_resources(), 0);
    assert_eq!(log.releases(), 1);
}

#[test]
fn should_mount_a_six_bar_monogram_and_release_it() {
    let container = FakeContainer::new(400, 400);
    let caps = detect(&FakeProbe::desktop());
    let backend = RecordingBackend::new();
    let log = backend.log();
    let config = WidgetKind::Monogram {
        word: "DENVIL".into(),
        style: MonogramStyle::Simple,
    }
    .preset(false);
    let widget = mount(container.clone(), &caps, &config, |_| Ok(backend.boxed()));
    let session = widget.session().unwrap();

    assert_eq!(session.with_scene(|g| g.drawable_count()), Some(6));
    assert_eq!(session.with_scene(|g| g.light_count()), Some(3));
    assert!(container.inserted().is_empty());

    let dispose = widget.disposal().unwrap().into_fn();
    dispose();
    dispose();

    let log = log.borrow();
    assert_eq!(log.geometries_created(), 6);
    assert_eq!(log.materials_created(), 6);
    assert_eq!(log.live_resources(), 0);
    assert_eq!(log.unknown_disposals(), 0);
    assert_eq!(log.releases(), 1);
    assert!(!session.loop_token().is_active());
}

#[test]
fn should_finish_disposal_requested_during_a_frame() {
    let container = FakeContainer::new(400, 400);
    let caps = detect(&FakeProbe::desktop());
    let backend = RecordingBackend::new();
    let log = backend.log();
    let hook = backend.render_hook();
    let mut widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Ok(backend.boxed())
    });
    let token = widget.session().unwrap().loop_token();
    let dispose = widget.disposal().unwrap();
    *hook.borrow_mut() = Some(Box::new(move || {
        dispose.call();
    }));

    assert!(!widget.frame(0.0));
    assert!(!token.is_active());
    assert!(widget.session().unwrap().is_disposed());
    assert!(container.inserted().is_empty());

    assert!(!widget.frame(0.016));
    let log = log.borrow();
    assert_eq!(log.frame_count(), 1);
    assert_eq!(log.live_resources(), 0);
    assert_eq!(log.unknown_disposals(), 0);
    assert_eq!(log.releases(), 1);
}

#[test]
fn should_adapt_the_scene_to_phones() {
    let container = FakeContainer::new(360, 640);
    let caps = detect(&FakeProbe::new(MODERN_ANDROID));
    let widget = mount(container.clone(), &caps, &WidgetKind::Starfield.preset(false), |_| {
        Ok(RecordingBackend::new().boxed())
    });
    let session = widget.session().unwrap();

    // Mobile starfield: 2000 particles in one point cloud.
    assert_eq!(session.with_scene(|g| g.drawable_count()), Some(1));
    assert_eq!(session.surface_size(), (360, 640));
}

#[test]
fn should_insert_the_panel_only_once() {
    let container = FakeContainer::new(100, 100);
    let renderer = FallbackRenderer::new();
    let markup = FallbackMarkup::labelled("DENVIL").with_caption("3D unavailable");

    assert!(renderer.render(container.as_ref(), &markup));
    assert!(!renderer.render(container.as_ref(), &markup));
    assert!(renderer.is_engaged());
    assert_eq!(container.inserted().len(), 1);
    assert!(container.inserted()[0].contains("3D unavailable"));
}

#[test]
fn should_escape_fallback_text() {
    let html = FallbackMarkup::labelled("<b>D&V</b>").to_html();

    assert!(html.contains("&lt;b&gt;D&amp;V&lt;/b&gt;"));
    assert!(!html.contains("<b>"));
    assert!(html.contains("opacity-30"));
    assert!(html.contains("rgba(120,119,198,0.05)"));
}

#[test]
fn should_render_an_unlabelled_panel() {
    let html = FallbackMarkup {
        opacity: 0.7,
        ..Default::default()
    }
    .to_html();

    assert!(html.contains("opacity-70"));
    assert!(!html.contains("text-center"));
}
