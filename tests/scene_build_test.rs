use folio_ngin::{
    camera::CameraConfig,
    config::{self, MonogramStyle, PRIMARY_TAG, WidgetKind},
    data_structures::{
        scene_graph::NodeKind,
        shape::{Color, MaterialDescriptor, Primitive, ShapeDescriptor},
    },
    render::RenderError,
    resources::scene::{LightDescriptor, PARTICLES_TAG, SHAPES_TAG, SceneDescriptor, SceneError, build_scene},
};
use rand::{SeedableRng, rngs::SmallRng};

use crate::common::test_utils::RecordingBackend;

mod common;

fn simple_monogram() -> SceneDescriptor {
    let shapes = config::monogram_shapes("DENVIL", MonogramStyle::Simple, &[config::BLUE]);
    SceneDescriptor::new(
        shapes,
        CameraConfig::default(),
        vec![
            LightDescriptor::ambient(config::AMBIENT_GREY, 0.4),
            LightDescriptor::directional(config::BLUE, 0.8, [1.0, 1.0, 1.0]),
            LightDescriptor::point(config::VIOLET, 0.6, [-1.0, 1.0, 2.0], 100.0),
        ],
    )
}

#[test]
fn should_build_one_drawable_per_bar() {
    let mut backend = RecordingBackend::new();
    let log = backend.log();
    let graph = build_scene(&simple_monogram(), &mut backend, &mut SmallRng::seed_from_u64(0)).unwrap();

    assert_eq!(graph.drawable_count(), 6);
    assert_eq!(graph.mesh_count(), 6);
    assert_eq!(graph.light_count(), 3);
    assert_eq!(graph.find(SHAPES_TAG).unwrap().get_children().len(), 6);
    assert_eq!(log.borrow().geometries_created(), 6);
    assert_eq!(log.borrow().materials_created(), 6);
    assert_eq!(graph.light_uniforms().len(), 3);
}

#[test]
fn should_release_exactly_what_was_built() {
    let mut backend = RecordingBackend::new();
    let log = backend.log();
    let mut graph = build_scene(&simple_monogram(), &mut backend, &mut SmallRng::seed_from_u64(0)).unwrap();

    let report = graph.dispose(&mut backend);
    assert_eq!(report.geometries, 6);
    assert_eq!(report.materials, 6);
    assert_eq!(log.borrow().live_resources(), 0);

    let again = graph.dispose(&mut backend);
    assert_eq!(again.geometries, 0);
    assert_eq!(again.materials, 0);
    assert_eq!(log.borrow().unknown_disposals(), 0);
    assert_eq!(graph.drawable_count(), 0);
}

#[test]
fn should_leave_nothing_behind_when_the_backend_refuses() {
    // Five handles fit: the sixth request (third material) fails.
    let mut backend = RecordingBackend::new().with_allocation_budget(5);
    let log = backend.log();
    let result = build_scene(&simple_monogram(), &mut backend, &mut SmallRng::seed_from_u64(0));

    assert!(matches!(result, Err(SceneError::Backend(RenderError::OutOfMemory))));
    assert_eq!(log.borrow().geometries_created(), 3);
    assert_eq!(log.borrow().materials_created(), 2);
    assert_eq!(log.borrow().live_resources(), 0);
    assert_eq!(log.borrow().unknown_disposals(), 0);
}

#[test]
fn should_reject_invalid_shapes_without_leaking() {
    let mut descriptor = simple_monogram();
    descriptor.shapes[2] = descriptor.shapes[2].clone().scaled(0.0);

    let mut backend = RecordingBackend::new();
    let log = backend.log();
    let result = build_scene(&descriptor, &mut backend, &mut SmallRng::seed_from_u64(0));

    match result {
        Err(SceneError::InvalidShape { index, .. }) => assert_eq!(index, 2),
        other => panic!("unexpected result: {:?}", other.map(|g| g.drawable_count())),
    }
    assert_eq!(log.borrow().geometries_created(), 2);
    assert_eq!(log.borrow().live_resources(), 0);
}

#[test]
fn should_reject_invalid_geometry_parameters() {
    let descriptor = SceneDescriptor::new(
        vec![ShapeDescriptor::new(
            Primitive::Sphere {
                radius: -1.0,
                segments: 16,
            },
            [0.0; 3],
            MaterialDescriptor::phong(Color::WHITE, 30.0, 1.0),
        )],
        CameraConfig::default(),
        Vec::new(),
    );
    let mut backend = RecordingBackend::new();
    let result = build_scene(&descriptor, &mut backend, &mut SmallRng::seed_from_u64(0));

    assert!(matches!(result, Err(SceneError::InvalidShape { index: 0, .. })));
}

#[test]
fn should_reject_non_finite_lights() {
    let mut descriptor = simple_monogram();
    descriptor.lights[1].position = [f32::NAN, 0.0, 0.0];
    let mut backend = RecordingBackend::new();
    let log = backend.log();
    let result = build_scene(&descriptor, &mut backend, &mut SmallRng::seed_from_u64(0));

    assert!(matches!(result, Err(SceneError::InvalidLight { index: 1, .. })));
    assert_eq!(log.borrow().live_resources(), 0);
}

#[test]
fn should_assemble_lettered_monograms_from_bars() {
    let shapes = config::monogram_shapes("DENVIL", MonogramStyle::Lettered, &[config::BLUE, config::VIOLET]);
    // D 4, E 4, N 3, V 2, I 3, L 2
    assert_eq!(shapes.len(), 18);
    assert_eq!(shapes[0].material.color, config::BLUE);
    assert_eq!(shapes[4].material.color, config::VIOLET);

    let harsh = WidgetKind::harsh().preset(false);
    // H 3, A 4, R 5, S 5, H 3
    assert_eq!(harsh.scene.shapes.len(), 20);
    assert_eq!(harsh.scene.lights.len(), 4);
}

#[test]
fn should_build_the_hero_scene() {
    let config = WidgetKind::Hero.preset(false);
    let mut backend = RecordingBackend::new();
    let graph = build_scene(&config.scene, &mut backend, &mut SmallRng::seed_from_u64(config.seed)).unwrap();

    assert_eq!(graph.drawable_count(), 3);
    assert_eq!(graph.mesh_count(), 2);
    assert_eq!(graph.light_count(), 4);
    assert!(graph.find(PRIMARY_TAG).is_some());
    assert!(matches!(
        graph.find(PARTICLES_TAG).map(|n| &n.kind),
        Some(NodeKind::Points(_))
    ));

    let batches = graph.get_render().into_batches();
    assert_eq!(batches.opaque.len(), 1);
    assert_eq!(batches.transparent.len(), 1);
    assert_eq!(batches.points.len(), 1);
    assert_eq!(batches.len(), 3);
}

#[test]
fn should_skip_the_particle_node_for_an_empty_field() {
    let mut config = WidgetKind::Hero.preset(false);
    if let Some(particles) = config.scene.particles.as_mut() {
        particles.count = 0;
        particles.fallback_count = 0;
    }
    let mut backend = RecordingBackend::new();
    let graph = build_scene(&config.scene, &mut backend, &mut SmallRng::seed_from_u64(0)).unwrap();

    assert!(graph.find(PARTICLES_TAG).is_none());
    assert_eq!(graph.drawable_count(), 2);
}
