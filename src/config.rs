//! Widget presets.
//!
//! Every widget on the site is the same machine with different parameters:
//! a shape list, lights, a particle field and a motion profile. A
//! [`WidgetConfig`] bundles them; [`WidgetKind::preset`] reproduces the
//! widgets the site ships.

use std::f32::consts::PI;

use cgmath::Deg;

use crate::{
    animation::{CameraMotion, MotionProfile, NodeMotion, Wave},
    camera::{AspectPolicy, CameraConfig},
    capability::Capabilities,
    data_structures::{
        particles::{ColorMode, ParticleFieldConfig, SamplingStrategy},
        shape::{Color, MaterialDescriptor, Primitive, Shading, ShapeDescriptor},
    },
    fallback::FallbackMarkup,
    resources::scene::{LightDescriptor, PARTICLES_TAG, SHAPES_TAG, SceneDescriptor},
};

pub const BLUE: Color = Color::from_hex(0x3b82f6);
pub const VIOLET: Color = Color::from_hex(0x8b5cf6);
pub const CYAN: Color = Color::from_hex(0x06b6d4);
pub const EMERALD: Color = Color::from_hex(0x10b981);
pub const LAVENDER: Color = Color::from_hex(0xa78bfa);
pub const ORCHID: Color = Color::from_hex(0xc084fc);
pub const AMBIENT_GREY: Color = Color::from_hex(0x404040);

/// Tag of the hero's main object.
pub const PRIMARY_TAG: &str = "primary";
/// Tag of the key light whose intensity breathes.
pub const KEY_LIGHT_TAG: &str = "key_light";
pub const FILL_LIGHT_TAG: &str = "fill_light";

/// Per-frame step of the hand-written widgets (0.01 per frame at 60 Hz).
const FRAME_TIME_SCALE: f32 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonogramStyle {
    /// One bar per letter.
    Simple,
    /// Letters assembled from several bars.
    Lettered,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetKind {
    Monogram { word: String, style: MonogramStyle },
    Starfield,
    Hero,
    FloatingGeometry,
}

impl WidgetKind {
    pub fn denvil() -> Self {
        WidgetKind::Monogram {
            word: "DENVIL".into(),
            style: MonogramStyle::Lettered,
        }
    }

    pub fn harsh() -> Self {
        WidgetKind::Monogram {
            word: "HARSH".into(),
            style: MonogramStyle::Lettered,
        }
    }

    pub fn preset(&self, mobile: bool) -> WidgetConfig {
        match self {
            WidgetKind::Monogram { word, style } => monogram(word, *style),
            WidgetKind::Starfield => starfield(mobile),
            WidgetKind::Hero => hero(),
            WidgetKind::FloatingGeometry => floating_geometry(mobile),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WidgetConfig {
    pub kind: WidgetKind,
    pub scene: SceneDescriptor,
    pub motion: MotionProfile,
    pub aspect: AspectPolicy,
    pub clear_colour: wgpu::Color,
    pub fallback: FallbackMarkup,
    /// Seed for particle generation, so a widget looks the same every visit.
    pub seed: u64,
}

impl WidgetConfig {
    /// Tune a preset to the host: lighter scenes on phones, no motion when
    /// the user asked for reduced motion.
    ///
    /// Only an untouched desktop preset is swapped for its phone variant;
    /// customised scenes are kept as given.
    pub fn adapt_to(self, capabilities: &Capabilities) -> Self {
        let mut config = if capabilities.is_mobile() && self.is_desktop_preset() {
            let preset = self.kind.preset(true);
            WidgetConfig {
                seed: self.seed,
                fallback: self.fallback,
                ..preset
            }
        } else {
            self
        };
        if capabilities.prefers_reduced_motion() {
            config.motion = MotionProfile::still();
        }
        config
    }

    /// Seed and fallback content are not compared.
    fn is_desktop_preset(&self) -> bool {
        let preset = self.kind.preset(false);
        self.scene == preset.scene
            && self.motion == preset.motion
            && self.aspect == preset.aspect
            && self.clear_colour == preset.clear_colour
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackMarkup) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Bar of a lettered monogram: x, y, width, height, z-rotation.
type Bar = (f32, f32, f32, f32, f32);

fn letter(c: char) -> &'static [Bar] {
    match c {
        'D' => &[
            (-0.5, 0.0, 0.2, 2.0, 0.0),
            (-0.2, 0.8, 0.6, 0.2, 0.0),
            (-0.2, -0.8, 0.6, 0.2, 0.0),
            (0.2, 0.0, 0.2, 1.2, 0.0),
        ],
        'E' => &[
            (-0.3, 0.0, 0.2, 2.0, 0.0),
            (0.0, 0.8, 0.6, 0.2, 0.0),
            (0.0, 0.0, 0.4, 0.2, 0.0),
            (0.0, -0.8, 0.6, 0.2, 0.0),
        ],
        'N' => &[
            (-0.2, 0.0, 0.2, 2.0, 0.0),
            (0.2, 0.0, 0.2, 2.0, 0.0),
            (0.0, 0.2, 0.4, 0.2, PI / 6.0),
        ],
        'V' => &[
            (-0.2, 0.3, 0.2, 1.4, -PI / 8.0),
            (0.2, 0.3, 0.2, 1.4, PI / 8.0),
        ],
        'I' => &[
            (0.0, 0.0, 0.2, 2.0, 0.0),
            (0.0, 0.8, 0.4, 0.2, 0.0),
            (0.0, -0.8, 0.4, 0.2, 0.0),
        ],
        'L' => &[(-0.15, 0.0, 0.2, 2.0, 0.0), (0.15, -0.8, 0.6, 0.2, 0.0)],
        'H' => &[
            (-0.2, 0.0, 0.2, 2.0, 0.0),
            (0.2, 0.0, 0.2, 2.0, 0.0),
            (0.0, 0.0, 0.4, 0.2, 0.0),
        ],
        'A' => &[
            (-0.2, -0.3, 0.2, 1.4, -PI / 12.0),
            (0.2, -0.3, 0.2, 1.4, PI / 12.0),
            (0.0, 0.8, 0.3, 0.15, 0.0),
            (0.0, 0.2, 0.3, 0.15, 0.0),
        ],
        'R' => &[
            (-0.2, 0.0, 0.2, 2.0, 0.0),
            (0.1, 0.5, 0.4, 0.2, 0.0),
            (0.1, 0.8, 0.4, 0.2, 0.0),
            (0.3, 0.65, 0.2, 0.3, 0.0),
            (0.2, -0.2, 0.3, 0.2, PI / 6.0),
        ],
        'S' => &[
            (0.0, 0.6, 0.5, 0.2, 0.0),
            (-0.2, 0.2, 0.2, 0.6, 0.0),
            (0.0, 0.0, 0.4, 0.2, 0.0),
            (0.2, -0.4, 0.2, 0.6, 0.0),
            (0.0, -0.7, 0.5, 0.2, 0.0),
        ],
        _ => &[(0.0, 0.0, 0.2, 2.0, 0.0)],
    }
}

/// Horizontal distance between letter centres.
const LETTER_PITCH: f32 = 0.9;
const BAR_DEPTH: f32 = 0.2;

fn letter_centres(count: usize, pitch: f32) -> impl Iterator<Item = f32> {
    let start = -(count.saturating_sub(1) as f32) * pitch / 2.0;
    (0..count).map(move |i| start + i as f32 * pitch)
}

pub fn monogram_shapes(word: &str, style: MonogramStyle, palette: &[Color]) -> Vec<ShapeDescriptor> {
    let letters: Vec<char> = word.chars().collect();
    let palette = if palette.is_empty() { &[BLUE][..] } else { palette };
    match style {
        MonogramStyle::Simple => letter_centres(letters.len(), 0.7)
            .map(|x| {
                ShapeDescriptor::bar(x, 0.0, 0.3, 2.0, BAR_DEPTH, MaterialDescriptor::phong(palette[0], 30.0, 0.8))
            })
            .collect(),
        MonogramStyle::Lettered => letters
            .iter()
            .zip(letter_centres(letters.len(), LETTER_PITCH))
            .enumerate()
            .flat_map(|(letter_index, (c, centre))| {
                letter(c.to_ascii_uppercase())
                    .iter()
                    .map(move |&(x, y, w, h, rotation)| {
                        let color = palette[letter_index % palette.len()];
                        let shape = ShapeDescriptor::bar(
                            centre + x,
                            y,
                            w,
                            h,
                            BAR_DEPTH,
                            MaterialDescriptor::phong(color, 100.0, 0.9),
                        );
                        if rotation != 0.0 {
                            shape.rotated_z(rotation)
                        } else {
                            shape
                        }
                    })
            })
            .collect(),
    }
}

fn monogram(word: &str, style: MonogramStyle) -> WidgetConfig {
    let harsh = word.eq_ignore_ascii_case("harsh");
    let palette: &[Color] = match (style, harsh) {
        (MonogramStyle::Simple, _) => &[BLUE],
        (MonogramStyle::Lettered, true) => &[VIOLET, CYAN, EMERALD],
        (MonogramStyle::Lettered, false) => &[BLUE, VIOLET],
    };
    let shapes = monogram_shapes(word, style, palette);

    let (lights, motion) = if harsh {
        (
            vec![
                LightDescriptor::ambient(AMBIENT_GREY, 0.4),
                LightDescriptor::directional(VIOLET, 0.6, [1.0, 1.0, 1.0]).tagged(KEY_LIGHT_TAG),
                LightDescriptor::point(CYAN, 0.4, [-1.0, 1.0, 2.0], 100.0).tagged(FILL_LIGHT_TAG),
                LightDescriptor::spot(EMERALD, 0.5, [0.0, 3.0, 2.0], [0.0; 3], PI / 6.0, 0.1),
            ],
            MotionProfile::new(FRAME_TIME_SCALE)
                .with_node(
                    SHAPES_TAG,
                    NodeMotion {
                        spin: [0.0, -0.7, 0.0],
                        wobble: [Wave::cos(0.15, 0.4), Wave::ZERO, Wave::cos(0.08, 0.3)],
                        pointer_gain: [0.15, 0.08],
                        float: Wave::cos(0.25, 1.2),
                        drift: Wave::sin(0.1, 0.6),
                        pulse: Wave::cos(0.08, 1.5),
                        hover_scale: 1.0,
                    },
                )
                .with_camera(CameraMotion {
                    orbit_x: Wave::cos(0.15, 0.7),
                    orbit_y: Wave::sin(0.1, 0.4),
                    parallax: 0.0,
                })
                .with_light(KEY_LIGHT_TAG, Wave::sin(0.2, 2.0))
                .with_light(FILL_LIGHT_TAG, Wave::cos(0.2, 1.5)),
        )
    } else {
        (
            vec![
                LightDescriptor::ambient(AMBIENT_GREY, 0.4),
                LightDescriptor::directional(BLUE, 0.8, [1.0, 1.0, 1.0]).tagged(KEY_LIGHT_TAG),
                LightDescriptor::point(VIOLET, 0.6, [-1.0, 1.0, 2.0], 100.0).tagged(FILL_LIGHT_TAG),
            ],
            MotionProfile::new(FRAME_TIME_SCALE)
                .with_node(
                    SHAPES_TAG,
                    NodeMotion {
                        spin: [0.0, 0.5, 0.0],
                        wobble: [Wave::sin(0.1, 0.3), Wave::ZERO, Wave::sin(0.05, 0.2)],
                        pointer_gain: [0.1, 0.05],
                        float: Wave::sin(0.2, 0.8),
                        pulse: Wave::sin(0.05, 2.0),
                        ..NodeMotion::STILL
                    },
                )
                .with_camera(CameraMotion {
                    orbit_x: Wave::sin(0.1, 0.5),
                    orbit_y: Wave::cos(0.1, 0.3),
                    parallax: 0.0,
                }),
        )
    };

    WidgetConfig {
        kind: WidgetKind::Monogram {
            word: word.to_string(),
            style,
        },
        scene: SceneDescriptor::new(shapes, CameraConfig::default(), lights),
        motion,
        aspect: AspectPolicy::Square,
        clear_colour: wgpu::Color::TRANSPARENT,
        fallback: FallbackMarkup::labelled(word.to_uppercase()),
        seed: 0,
    }
}

fn starfield(mobile: bool) -> WidgetConfig {
    let (count, x_rate, y_rate) = if mobile {
        (2000, 1.0 / 20.0, 1.0 / 30.0)
    } else {
        (5000, 1.0 / 10.0, 1.0 / 15.0)
    };
    let mut particles = ParticleFieldConfig::new(
        count,
        1.2,
        SamplingStrategy::Rejection,
        ColorMode::Uniform(BLUE),
    );
    particles.shell = true;
    particles.size = if mobile { 0.003 } else { 0.002 };
    particles.opacity = 1.0;
    particles.additive = false;

    let mut scene = SceneDescriptor::new(
        Vec::new(),
        CameraConfig {
            position: [0.0, 0.0, 1.0],
            ..Default::default()
        },
        Vec::new(),
    )
    .with_particles(particles);
    scene.particle_tilt = [0.0, 0.0, PI / 4.0];

    WidgetConfig {
        kind: WidgetKind::Starfield,
        scene,
        motion: MotionProfile::new(1.0).with_node(
            PARTICLES_TAG,
            NodeMotion {
                spin: [-x_rate, -y_rate, 0.0],
                ..NodeMotion::STILL
            },
        ),
        aspect: AspectPolicy::Container,
        clear_colour: wgpu::Color::TRANSPARENT,
        fallback: FallbackMarkup::default(),
        seed: 0x5eed,
    }
}

fn hero() -> WidgetConfig {
    let primary = ShapeDescriptor::new(
        Primitive::TorusKnot {
            radius: 1.0,
            tube: 0.3,
            tubular_segments: 128,
            radial_segments: 32,
            p: 2,
            q: 3,
        },
        [0.0; 3],
        MaterialDescriptor::standard(VIOLET, 0.7, 0.2).with_emissive(0.1),
    )
    .tagged(PRIMARY_TAG);
    let contact_shadow = ShapeDescriptor::new(
        Primitive::Plane {
            width: 5.0,
            height: 5.0,
        },
        [0.0, -2.0, 0.0],
        MaterialDescriptor {
            color: Color::BLACK,
            shading: Shading::Shadow,
            opacity: 0.3,
            emissive: 0.0,
        },
    )
    .rotated([-PI / 2.0, 0.0, 0.0]);

    let mut particles = ParticleFieldConfig::new(
        500,
        5.0,
        SamplingStrategy::Spherical,
        ColorMode::Jitter {
            base: LAVENDER,
            min: 0.8,
        },
    );
    particles.size = 0.02;

    let scene = SceneDescriptor::new(
        vec![primary, contact_shadow],
        CameraConfig {
            fov_y: Deg(45.0),
            near: 0.1,
            far: 100.0,
            position: [0.0, 0.0, 5.0],
        },
        vec![
            LightDescriptor::ambient(Color::WHITE, 0.3),
            LightDescriptor::directional(Color::WHITE, 1.0, [5.0, 5.0, 5.0]),
            LightDescriptor::directional(LAVENDER, 0.5, [-5.0, 2.0, -5.0]),
            LightDescriptor::point(ORCHID, 0.3, [-3.0, 0.0, 3.0], 0.0),
        ],
    )
    .with_particles(particles);

    WidgetConfig {
        kind: WidgetKind::Hero,
        scene,
        motion: MotionProfile::new(1.0)
            .with_node(
                PRIMARY_TAG,
                NodeMotion {
                    wobble: [Wave::sin(0.1, 0.3), Wave::ZERO, Wave::cos(0.1, 0.2)],
                    float: Wave::sin(0.1, 0.5),
                    hover_scale: 1.1,
                    ..NodeMotion::STILL
                },
            )
            .with_node(
                PARTICLES_TAG,
                NodeMotion {
                    spin: [0.0, 0.05, 0.0],
                    wobble: [Wave::sin(0.05, 0.1), Wave::ZERO, Wave::ZERO],
                    ..NodeMotion::STILL
                },
            )
            .with_camera(CameraMotion {
                parallax: 0.15,
                ..Default::default()
            }),
        aspect: AspectPolicy::Container,
        clear_colour: wgpu::Color {
            r: 0x0f as f64 / 255.0,
            g: 0x17 as f64 / 255.0,
            b: 0x2a as f64 / 255.0,
            a: 1.0,
        },
        fallback: FallbackMarkup::default(),
        seed: 0x4e60,
    }
}

/// Primitive, position, colour, desktop scale, mobile scale, speed.
type Floater = (Primitive, [f32; 3], u32, f32, f32, f32);

fn floaters() -> [Floater; 10] {
    let octa = |radius| Primitive::Octahedron { radius };
    let torus = |radius, tube| Primitive::Torus {
        radius,
        tube,
        radial_segments: 8,
        tubular_segments: 16,
    };
    let cube = |width, height, depth| Primitive::Box {
        width,
        height,
        depth,
    };
    let sphere = |radius| Primitive::Sphere {
        radius,
        segments: 16,
    };
    [
        (octa(0.5), [-8.0, 2.0, -3.0], 0x3b82f6, 0.8, 0.5, 0.8),
        (octa(0.3), [8.0, -1.0, -2.0], 0x8b5cf6, 0.6, 0.4, 1.2),
        (torus(0.4, 0.1), [-6.0, -2.0, -1.0], 0x06b6d4, 1.0, 0.6, 0.6),
        (torus(0.3, 0.08), [6.0, 3.0, -2.5], 0x10b981, 0.8, 0.5, 1.0),
        (cube(0.6, 0.6, 0.6), [-4.0, 4.0, -1.5], 0xf59e0b, 0.7, 0.4, 1.1),
        (cube(0.4, 0.8, 0.4), [4.0, -3.0, -1.0], 0xef4444, 0.8, 0.5, 0.9),
        (sphere(0.3), [-2.0, 5.0, -2.0], 0xec4899, 1.0, 0.6, 0.7),
        (sphere(0.25), [2.0, -4.0, -1.5], 0x06d6a0, 0.8, 0.5, 1.3),
        (octa(0.2), [-10.0, 0.0, -4.0], 0xfbbf24, 0.5, 0.3, 1.4),
        (octa(0.35), [10.0, 1.0, -3.5], 0xa855f7, 0.7, 0.4, 0.5),
    ]
}

fn floating_geometry(mobile: bool) -> WidgetConfig {
    let mut shapes = Vec::new();
    let mut motion = MotionProfile::new(1.0);
    for (index, (primitive, position, hex, scale, mobile_scale, speed)) in floaters().into_iter().enumerate() {
        let tag = format!("floater_{}", index);
        let color = Color::from_hex(hex);
        let material = MaterialDescriptor::standard(color, 0.8, 0.2)
            .with_emissive(0.1)
            .with_opacity(0.8);
        shapes.push(
            ShapeDescriptor::new(primitive, position, material)
                .scaled(if mobile { mobile_scale } else { scale })
                .tagged(tag.clone()),
        );
        motion = motion.with_node(
            tag,
            NodeMotion {
                spin: [0.6 * speed, 0.9 * speed, 0.0],
                float: Wave::sin(0.2, speed),
                ..NodeMotion::STILL
            },
        );
    }

    WidgetConfig {
        kind: WidgetKind::FloatingGeometry,
        scene: SceneDescriptor::new(
            shapes,
            CameraConfig {
                fov_y: Deg(50.0),
                position: [0.0, 0.0, 5.0],
                ..Default::default()
            },
            vec![
                LightDescriptor::ambient(Color::WHITE, 0.2),
                LightDescriptor::point(Color::WHITE, 0.3, [10.0, 10.0, 10.0], 0.0),
                LightDescriptor::point(BLUE, 0.2, [-10.0, -10.0, 5.0], 0.0),
            ],
        ),
        motion,
        aspect: AspectPolicy::Container,
        clear_colour: wgpu::Color::TRANSPARENT,
        fallback: FallbackMarkup {
            opacity: 0.7,
            ..Default::default()
        },
        seed: 0,
    }
}
