//! Declarative shape descriptors.
//!
//! A [`ShapeDescriptor`] describes one primitive: which geometry to generate,
//! where to place it and which material to draw it with. Descriptors are
//! plain values; the scene builder turns each one into a geometry + material
//! + mesh triple.

use cgmath::{Euler, Quaternion, Rad, Vector3};

/// Linear RGB colour with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from a `0xRRGGBB` literal, the way the site palette is written.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    pub fn scaled(self, factor: f32) -> Color {
        Color {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// `#rrggbb`, used when the fallback markup needs a CSS colour.
    pub fn to_css(self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
    }
}

/// Geometry to generate for a shape. Extents are in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Primitive {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32, segments: u32 },
    Octahedron { radius: f32 },
    Icosahedron { radius: f32 },
    Torus { radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32 },
    TorusKnot { radius: f32, tube: f32, tubular_segments: u32, radial_segments: u32, p: u32, q: u32 },
    Plane { width: f32, height: f32 },
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Box { .. } => "box",
            Primitive::Sphere { .. } => "sphere",
            Primitive::Octahedron { .. } => "octahedron",
            Primitive::Icosahedron { .. } => "icosahedron",
            Primitive::Torus { .. } => "torus",
            Primitive::TorusKnot { .. } => "torus_knot",
            Primitive::Plane { .. } => "plane",
        }
    }
}

/// Lighting model used by a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shading {
    Phong { shininess: f32 },
    Standard { metalness: f32, roughness: f32 },
    /// Only darkens what it covers; used for contact shadow planes.
    Shadow,
    /// Unlit point sprites for particle fields.
    Points { size: f32, additive: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDescriptor {
    pub color: Color,
    pub shading: Shading,
    pub opacity: f32,
    pub emissive: f32,
}

impl MaterialDescriptor {
    pub fn phong(color: Color, shininess: f32, opacity: f32) -> Self {
        Self {
            color,
            shading: Shading::Phong { shininess },
            opacity,
            emissive: 0.0,
        }
    }

    pub fn standard(color: Color, metalness: f32, roughness: f32) -> Self {
        Self {
            color,
            shading: Shading::Standard {
                metalness,
                roughness,
            },
            opacity: 1.0,
            emissive: 0.0,
        }
    }

    pub fn points(color: Color, size: f32, opacity: f32, additive: bool) -> Self {
        Self {
            color,
            shading: Shading::Points { size, additive },
            opacity,
            emissive: 0.0,
        }
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0 || matches!(self.shading, Shading::Shadow)
    }
}

/// One authored primitive: geometry, placement and material.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeDescriptor {
    pub primitive: Primitive,
    pub position: [f32; 3],
    /// Euler angles in radians (x, y, z).
    pub rotation: Option<[f32; 3]>,
    pub scale: f32,
    pub material: MaterialDescriptor,
    /// Name the animation driver can address this shape by.
    pub tag: Option<String>,
}

impl ShapeDescriptor {
    pub fn new(primitive: Primitive, position: [f32; 3], material: MaterialDescriptor) -> Self {
        Self {
            primitive,
            position,
            rotation: None,
            scale: 1.0,
            material,
            tag: None,
        }
    }

    /// Axis aligned bar, the building block of the monogram letters.
    pub fn bar(x: f32, y: f32, w: f32, h: f32, d: f32, material: MaterialDescriptor) -> Self {
        Self::new(
            Primitive::Box {
                width: w,
                height: h,
                depth: d,
            },
            [x, y, 0.0],
            material,
        )
    }

    pub fn rotated(mut self, rotation: [f32; 3]) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn rotated_z(self, angle: f32) -> Self {
        self.rotated([0.0, 0.0, angle])
    }

    pub fn scaled(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position.into()
    }

    pub fn orientation(&self) -> Quaternion<f32> {
        euler(self.rotation.unwrap_or([0.0; 3]))
    }
}

/// Quaternion for Euler angles in radians, applied x then y then z.
pub fn euler([x, y, z]: [f32; 3]) -> Quaternion<f32> {
    Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)))
}
