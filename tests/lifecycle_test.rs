use std::{cell::Cell, rc::Rc};

use folio_ngin::{
    capability::detect,
    config::WidgetKind,
    flow::{Mount, mount},
    lifecycle::{DetachFn, TeardownReport},
};

use crate::common::test_utils::{FakeContainer, FakeProbe, RecordingBackend};

mod common;

fn counter() -> (Rc<Cell<usize>>, DetachFn) {
    let count = Rc::new(Cell::new(0));
    let inner = count.clone();
    (count, DetachFn::new(move || inner.set(inner.get() + 1)))
}

#[test]
fn should_keep_monograms_square() {
    let container = FakeContainer::new(800, 600);
    let backend = RecordingBackend::new();
    let log = backend.log();
    let caps = detect(&FakeProbe::desktop());
    let widget = mount(container.clone(), &caps, &WidgetKind::denvil().preset(false), |_| {
        Ok(backend.boxed())
    });
    let session = widget.session().unwrap();

    assert_eq!(session.surface_size(), (600, 600));
    approx::assert_relative_eq!(session.aspect(), 1.0);

    container.set_size(300, 900);
    assert_eq!(widget.resize(), Some((300, 300)));
    approx::assert_relative_eq!(session.aspect(), 1.0);
    assert_eq!(log.borrow().resizes(), &[(600, 600), (300, 300)]);
}

#[test]
fn should_follow_the_container_aspect() {
    let container = FakeContainer::new(800, 600);
    let caps = detect(&FakeProbe::desktop());
    let widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Ok(RecordingBackend::new().boxed())
    });
    let session = widget.session().unwrap();

    assert_eq!(session.surface_size(), (800, 600));
    approx::assert_relative_eq!(session.aspect(), 800.0 / 600.0);

    container.set_size(1920, 1080);
    widget.resize();
    assert_eq!(session.surface_size(), (1920, 1080));
    approx::assert_relative_eq!(session.aspect(), 1920.0 / 1080.0);
}

#[test]
fn should_ignore_collapsed_containers() {
    let container = FakeContainer::new(800, 600);
    let backend = RecordingBackend::new();
    let log = backend.log();
    let caps = detect(&FakeProbe::desktop());
    let widget = mount(container.clone(), &caps, &WidgetKind::Starfield.preset(false), |_| {
        Ok(backend.boxed())
    });

    container.set_size(0, 600);
    assert_eq!(widget.resize(), None);
    assert_eq!(widget.session().unwrap().surface_size(), (800, 600));
    assert_eq!(log.borrow().resizes().len(), 1);
}

#[test]
fn should_dispose_everything_exactly_once() {
    let container = FakeContainer::new(640, 480);
    let backend = RecordingBackend::new();
    let log = backend.log();
    let caps = detect(&FakeProbe::desktop());
    let mut widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Ok(backend.boxed())
    });
    let session = widget.session().unwrap().clone();
    let (listener_calls, listener) = counter();
    let (observer_calls, observer) = counter();
    session.add_listener(Box::new(listener));
    session.add_observer(Box::new(observer));
    let token = session.loop_token();
    let dispose = widget.disposal().unwrap();

    assert!(widget.frame(0.0));
    assert!(token.is_active());

    let report = dispose.call();
    assert_eq!(report.resources.geometries, 3);
    assert_eq!(report.resources.materials, 3);
    assert_eq!(report.listeners, 1);
    assert_eq!(report.observers, 1);
    assert!(report.context_released);
    assert!(!token.is_active());
    assert!(session.is_disposed());
    assert_eq!(session.with_scene(|g| g.drawable_count()), None);

    let again = dispose.call();
    assert_eq!(again, TeardownReport::default());
    let from_widget = widget.dispose();
    assert_eq!(from_widget, TeardownReport::default());

    let log = log.borrow();
    assert_eq!(log.live_resources(), 0);
    assert_eq!(log.unknown_disposals(), 0);
    assert_eq!(log.releases(), 1);
    assert_eq!(listener_calls.get(), 1);
    assert_eq!(observer_calls.get(), 1);
}

#[test]
fn should_stop_rendering_after_disposal() {
    let container = FakeContainer::new(640, 480);
    let backend = RecordingBackend::new();
    let log = backend.log();
    let caps = detect(&FakeProbe::desktop());
    let mut widget = mount(container.clone(), &caps, &WidgetKind::Starfield.preset(false), |_| {
        Ok(backend.boxed())
    });

    assert!(widget.frame(0.0));
    assert!(widget.frame(0.016));
    widget.dispose();

    assert!(!widget.frame(0.032));
    assert_eq!(log.borrow().frame_count(), 2);
    assert_eq!(widget.session().unwrap().resize(100, 100), None);
}

#[test]
fn should_ignore_listeners_added_after_disposal() {
    let container = FakeContainer::new(640, 480);
    let caps = detect(&FakeProbe::desktop());
    let widget = mount(container.clone(), &caps, &WidgetKind::Hero.preset(false), |_| {
        Ok(RecordingBackend::new().boxed())
    });
    let session = widget.session().unwrap();
    widget.dispose();

    let (calls, listener) = counter();
    session.add_listener(Box::new(listener));
    assert_eq!(widget.dispose(), TeardownReport::default());
    assert_eq!(calls.get(), 0);
}

#[test]
fn should_dispose_when_the_session_is_dropped() {
    let backend = RecordingBackend::new();
    let log = backend.log();
    {
        let container = FakeContainer::new(640, 480);
        let caps = detect(&FakeProbe::desktop());
        let widget = mount(container, &caps, &WidgetKind::Hero.preset(false), |_| Ok(backend.boxed()));
        assert!(matches!(widget.outcome(), Mount::Scene { .. }));
    }
    assert_eq!(log.borrow().live_resources(), 0);
    assert_eq!(log.borrow().releases(), 1);
}

#[test]
fn should_render_nothing_once_the_token_is_cancelled() {
    let container = FakeContainer::new(640, 480);
    let backend = RecordingBackend::new();
    let log = backend.log();
    let caps = detect(&FakeProbe::desktop());
    let widget = mount(container, &caps, &WidgetKind::Hero.preset(false), |_| Ok(backend.boxed()));
    let session = widget.session().unwrap();

    session.loop_token().cancel();
    session.frame(1.0).unwrap();

    assert_eq!(log.borrow().frame_count(), 0);
}
