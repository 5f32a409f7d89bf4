use folio_ngin::{
    camera::AspectPolicy,
    capability::detect,
    config::{self, MonogramStyle, WidgetKind},
    data_structures::shape::{Color, MaterialDescriptor, Shading},
    pipelines::MaterialUniform,
};

use crate::common::test_utils::{FakeProbe, IPAD, MODERN_ANDROID, MODERN_IPHONE};

mod common;

#[test]
fn should_size_the_starfield_per_device() {
    let desktop = WidgetKind::Starfield.preset(false);
    let mobile = WidgetKind::Starfield.preset(true);

    let desktop_field = desktop.scene.particles.unwrap();
    let mobile_field = mobile.scene.particles.unwrap();
    assert_eq!(desktop_field.count, 5000);
    assert_eq!(mobile_field.count, 2000);
    assert_eq!(desktop_field.fallback_count, 500);
    approx::assert_relative_eq!(desktop_field.radius, 1.2);
    assert!(desktop_field.shell);
    assert!(mobile_field.size > desktop_field.size);
    assert_eq!(desktop.aspect, AspectPolicy::Container);
}

#[test]
fn should_build_monogram_presets() {
    let denvil = WidgetKind::denvil().preset(false);

    assert_eq!(denvil.aspect, AspectPolicy::Square);
    assert_eq!(denvil.scene.lights.len(), 3);
    assert_eq!(denvil.fallback.label.as_deref(), Some("DENVIL"));
    assert_eq!(denvil.clear_colour, wgpu::Color::TRANSPARENT);

    let simple = WidgetKind::Monogram {
        word: "denvil".into(),
        style: MonogramStyle::Simple,
    }
    .preset(false);
    assert_eq!(simple.scene.shapes.len(), 6);
    assert_eq!(simple.fallback.label.as_deref(), Some("DENVIL"));
    let xs: Vec<f32> = simple.scene.shapes.iter().map(|s| s.position[0]).collect();
    approx::assert_relative_eq!(xs[0], -xs[5], epsilon = 1e-6);
    approx::assert_relative_eq!(xs[1] - xs[0], 0.7, epsilon = 1e-6);
}

#[test]
fn should_lighten_presets_on_phones() {
    let caps = detect(&FakeProbe::new(MODERN_IPHONE));
    let config = WidgetKind::Starfield
        .preset(false)
        .with_seed(99)
        .adapt_to(&caps);

    assert_eq!(config.scene.particles.unwrap().count, 2000);
    assert_eq!(config.seed, 99);
    assert!(!config.motion.is_still());

    let floating = WidgetKind::FloatingGeometry.preset(false).adapt_to(&detect(&FakeProbe::new(IPAD)));
    assert_eq!(floating.scene.shapes.len(), 10);
    approx::assert_relative_eq!(floating.scene.shapes[0].scale, 0.5);
}

#[test]
fn should_keep_customised_scenes_on_phones() {
    let mut custom = WidgetKind::denvil().preset(false);
    custom.scene.shapes.truncate(2);
    custom.clear_colour = wgpu::Color::BLACK;

    let adapted = custom.clone().adapt_to(&detect(&FakeProbe::new(MODERN_ANDROID)));

    assert_eq!(adapted.scene.shapes.len(), 2);
    assert_eq!(adapted.clear_colour, wgpu::Color::BLACK);
    assert_eq!(adapted, custom);
}

#[test]
fn should_freeze_motion_for_reduced_motion_users() {
    let caps = detect(&FakeProbe::desktop().with_reduced_motion());
    for kind in [
        WidgetKind::denvil(),
        WidgetKind::harsh(),
        WidgetKind::Starfield,
        WidgetKind::Hero,
        WidgetKind::FloatingGeometry,
    ] {
        let config = kind.preset(false).adapt_to(&caps);
        assert!(config.motion.is_still(), "{:?}", kind);
    }
}

#[test]
fn should_leave_desktop_presets_alone() {
    let caps = detect(&FakeProbe::desktop());
    let preset = WidgetKind::Hero.preset(false);

    assert_eq!(preset.clone().adapt_to(&caps), preset);
}

#[test]
fn should_build_the_hero_preset() {
    let hero = WidgetKind::Hero.preset(false);

    assert_eq!(hero.scene.shapes.len(), 2);
    assert_eq!(hero.scene.lights.len(), 4);
    assert_eq!(hero.scene.shapes[0].tag.as_deref(), Some(config::PRIMARY_TAG));
    assert_eq!(hero.scene.shapes[1].material.shading, Shading::Shadow);
    assert_eq!(hero.scene.particles.unwrap().count, 500);
    approx::assert_relative_eq!(hero.motion.camera.parallax, 0.15);
}

#[test]
fn should_map_materials_to_shader_layout() {
    let phong = MaterialUniform::from(&MaterialDescriptor::phong(config::BLUE, 30.0, 0.8));
    assert_eq!(phong.params, [0.0, 30.0, 0.0, 0.0]);
    approx::assert_relative_eq!(phong.color[3], 0.8);

    let standard = MaterialUniform::from(&MaterialDescriptor::standard(config::VIOLET, 0.7, 0.2).with_emissive(0.1));
    assert_eq!(standard.params, [1.0, 0.0, 0.7, 0.2]);
    approx::assert_relative_eq!(standard.extra[0], 0.1);

    let points = MaterialUniform::from(&MaterialDescriptor::points(Color::WHITE, 0.02, 0.6, true));
    assert_eq!(points.params[0], 3.0);
    assert_eq!(points.extra, [0.0, 0.02, 1.0, 0.0]);
    assert!(points.is_additive());

    let shadow = MaterialUniform::from(&MaterialDescriptor {
        color: Color::BLACK,
        shading: Shading::Shadow,
        opacity: 1.7,
        emissive: 0.0,
    });
    assert_eq!(shadow.params[0], 2.0);
    assert_eq!(shadow.color, [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn should_fit_square_surfaces_into_containers() {
    assert_eq!(AspectPolicy::Square.surface_size(800, 600), Some((600, 600)));
    assert_eq!(AspectPolicy::Square.surface_size(320, 1000), Some((320, 320)));
    assert_eq!(AspectPolicy::Container.surface_size(800, 600), Some((800, 600)));
    assert_eq!(AspectPolicy::Container.surface_size(800, 0), None);
}

#[test]
fn should_format_css_colours() {
    assert_eq!(Color::from_hex(0x3b82f6).to_css(), "#3b82f6");
}
