//! Procedural geometry for the shape primitives.
//!
//! Each generator produces an indexed triangle list with per-vertex normals,
//! counter-clockwise when seen from outside. Polyhedra use flat normals so
//! their facets catch the light.

use std::{f32::consts::PI, fmt};

use cgmath::{InnerSpace, Vector3};

use crate::data_structures::{particles::ParticleBuffer, shape::Primitive};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A particle as uploaded to the points pipeline.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex for PointVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// CPU side geometry, either a triangle mesh or a point cloud.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryData {
    Mesh {
        label: &'static str,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    },
    Points {
        vertices: Vec<PointVertex>,
    },
}

impl GeometryData {
    pub fn label(&self) -> &'static str {
        match self {
            GeometryData::Mesh { label, .. } => label,
            GeometryData::Points { .. } => "points",
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            GeometryData::Mesh { vertices, .. } => vertices.len(),
            GeometryData::Points { vertices } => vertices.len(),
        }
    }

    /// Number of elements a draw call has to submit.
    pub fn element_count(&self) -> usize {
        match self {
            GeometryData::Mesh { indices, .. } => indices.len(),
            GeometryData::Points { vertices } => vertices.len(),
        }
    }

    pub fn from_particles(buffer: &ParticleBuffer) -> Self {
        let vertices = buffer
            .positions
            .chunks_exact(3)
            .zip(buffer.colors.chunks_exact(3))
            .map(|(p, c)| PointVertex {
                position: [p[0], p[1], p[2]],
                color: [c[0], c[1], c[2]],
            })
            .collect();
        GeometryData::Points { vertices }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeometryError {
    pub primitive: &'static str,
    pub reason: String,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} geometry: {}", self.primitive, self.reason)
    }
}

impl std::error::Error for GeometryError {}

fn positive(primitive: &'static str, name: &str, value: f32) -> Result<f32, GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(GeometryError {
            primitive,
            reason: format!("{} must be a positive finite number, got {}", name, value),
        })
    }
}

/// Upper bound for any segment or winding count.
pub const MAX_SEGMENTS: u32 = 512;

/// Validates the lower bound and clamps to [`MAX_SEGMENTS`].
fn at_least(primitive: &'static str, name: &str, value: u32, min: u32) -> Result<u32, GeometryError> {
    if value >= min {
        Ok(value.min(MAX_SEGMENTS))
    } else {
        Err(GeometryError {
            primitive,
            reason: format!("{} must be at least {}, got {}", name, min, value),
        })
    }
}

/// Generate the mesh for a primitive, validating its parameters first.
pub fn build_primitive(primitive: &Primitive) -> Result<GeometryData, GeometryError> {
    let label = primitive.name();
    let (vertices, indices) = match *primitive {
        Primitive::Box {
            width,
            height,
            depth,
        } => cuboid(
            positive(label, "width", width)?,
            positive(label, "height", height)?,
            positive(label, "depth", depth)?,
        ),
        Primitive::Sphere { radius, segments } => sphere(
            positive(label, "radius", radius)?,
            at_least(label, "segments", segments, 3)?,
        ),
        Primitive::Octahedron { radius } => {
            flat_polyhedron(&OCTAHEDRON_VERTICES, &OCTAHEDRON_FACES, positive(label, "radius", radius)?)
        }
        Primitive::Icosahedron { radius } => flat_polyhedron(
            &icosahedron_vertices(),
            &ICOSAHEDRON_FACES,
            positive(label, "radius", radius)?,
        ),
        Primitive::Torus {
            radius,
            tube,
            radial_segments,
            tubular_segments,
        } => torus(
            positive(label, "radius", radius)?,
            positive(label, "tube", tube)?,
            at_least(label, "radial_segments", radial_segments, 3)?,
            at_least(label, "tubular_segments", tubular_segments, 3)?,
        ),
        Primitive::TorusKnot {
            radius,
            tube,
            tubular_segments,
            radial_segments,
            p,
            q,
        } => torus_knot(
            positive(label, "radius", radius)?,
            positive(label, "tube", tube)?,
            at_least(label, "tubular_segments", tubular_segments, 3)?,
            at_least(label, "radial_segments", radial_segments, 3)?,
            at_least(label, "p", p, 1)?,
            at_least(label, "q", q, 1)?,
        ),
        Primitive::Plane { width, height } => plane(
            positive(label, "width", width)?,
            positive(label, "height", height)?,
        ),
    };
    Ok(GeometryData::Mesh {
        label,
        vertices,
        indices,
    })
}

type Mesh = (Vec<ModelVertex>, Vec<u32>);

fn vertex(position: Vector3<f32>, normal: Vector3<f32>) -> ModelVertex {
    ModelVertex {
        position: position.into(),
        normal: normal.into(),
    }
}

fn cuboid(width: f32, height: f32, depth: f32) -> Mesh {
    let half = Vector3::new(width / 2.0, height / 2.0, depth / 2.0);
    let scale = |v: Vector3<f32>| Vector3::new(v.x * half.x, v.y * half.y, v.z * half.z);
    // (normal, u, v) with u x v == normal so the quads wind counter-clockwise
    let faces = [
        (Vector3::unit_x(), -Vector3::unit_z(), Vector3::unit_y()),
        (-Vector3::unit_x(), Vector3::unit_z(), Vector3::unit_y()),
        (Vector3::unit_y(), Vector3::unit_x(), -Vector3::unit_z()),
        (-Vector3::unit_y(), Vector3::unit_x(), Vector3::unit_z()),
        (Vector3::unit_z(), Vector3::unit_x(), Vector3::unit_y()),
        (-Vector3::unit_z(), -Vector3::unit_x(), Vector3::unit_y()),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let center = scale(normal);
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(vertex(center + scale(u * su) + scale(v * sv), normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn sphere(radius: f32, segments: u32) -> Mesh {
    let width_segments = segments;
    let height_segments = segments;
    let mut vertices = Vec::new();
    let mut grid = Vec::new();
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let mut row = Vec::new();
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * 2.0 * PI;
            let theta = v * PI;
            let normal = Vector3::new(
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            );
            row.push(vertices.len() as u32);
            vertices.push(vertex(normal * radius, normal));
        }
        grid.push(row);
    }
    let mut indices = Vec::new();
    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments as usize - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    (vertices, indices)
}

fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Mesh {
    let mut vertices = Vec::new();
    for j in 0..=radial_segments {
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * PI * 2.0;
            let v = j as f32 / radial_segments as f32 * PI * 2.0;
            let position = Vector3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vector3::new(radius * u.cos(), radius * u.sin(), 0.0);
            vertices.push(vertex(position, (position - center).normalize()));
        }
    }
    let row = tubular_segments + 1;
    let mut indices = Vec::new();
    for j in 1..=radial_segments {
        for i in 1..=tubular_segments {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    (vertices, indices)
}

fn torus_knot_curve(u: f32, p: f32, q: f32, radius: f32) -> Vector3<f32> {
    let qu_over_p = q / p * u;
    let cs = qu_over_p.cos();
    Vector3::new(
        radius * (2.0 + cs) * 0.5 * u.cos(),
        radius * (2.0 + cs) * u.sin() * 0.5,
        radius * qu_over_p.sin() * 0.5,
    )
}

fn torus_knot(radius: f32, tube: f32, tubular_segments: u32, radial_segments: u32, p: u32, q: u32) -> Mesh {
    let (p, q) = (p as f32, q as f32);
    let mut vertices = Vec::new();
    for i in 0..=tubular_segments {
        let u = i as f32 / tubular_segments as f32 * p * PI * 2.0;
        let p1 = torus_knot_curve(u, p, q, radius);
        let p2 = torus_knot_curve(u + 0.01, p, q, radius);
        let tangent = p2 - p1;
        let binormal = tangent.cross(p2 + p1).normalize();
        let normal = binormal.cross(tangent).normalize();
        for j in 0..=radial_segments {
            let v = j as f32 / radial_segments as f32 * PI * 2.0;
            let cx = -tube * v.cos();
            let cy = tube * v.sin();
            let position = p1 + normal * cx + binormal * cy;
            vertices.push(vertex(position, (position - p1).normalize()));
        }
    }
    let row = radial_segments + 1;
    let mut indices = Vec::new();
    for j in 1..=tubular_segments {
        for i in 1..=radial_segments {
            let a = row * (j - 1) + (i - 1);
            let b = row * j + (i - 1);
            let c = row * j + i;
            let d = row * (j - 1) + i;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    (vertices, indices)
}

fn plane(width: f32, height: f32) -> Mesh {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let normal = Vector3::unit_z();
    let vertices = vec![
        vertex(Vector3::new(-hw, -hh, 0.0), normal),
        vertex(Vector3::new(hw, -hh, 0.0), normal),
        vertex(Vector3::new(hw, hh, 0.0), normal),
        vertex(Vector3::new(-hw, hh, 0.0), normal),
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

const OCTAHEDRON_VERTICES: [[f32; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

const OCTAHEDRON_FACES: [[usize; 3]; 8] = [
    [0, 2, 4],
    [0, 4, 3],
    [0, 3, 5],
    [0, 5, 2],
    [1, 2, 5],
    [1, 5, 3],
    [1, 3, 4],
    [1, 4, 2],
];

fn icosahedron_vertices() -> [[f32; 3]; 12] {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Project the corners onto a sphere of `radius` and emit one flat-shaded
/// triangle per face, flipping any face whose normal points inwards.
fn flat_polyhedron(corners: &[[f32; 3]], faces: &[[usize; 3]], radius: f32) -> Mesh {
    let corners: Vec<Vector3<f32>> = corners
        .iter()
        .map(|&c| Vector3::from(c).normalize() * radius)
        .collect();
    let mut vertices = Vec::with_capacity(faces.len() * 3);
    let mut indices = Vec::with_capacity(faces.len() * 3);
    for &[a, b, c] in faces {
        let (mut pa, mut pb, pc) = (corners[a], corners[b], corners[c]);
        let mut normal = (pb - pa).cross(pc - pa).normalize();
        if normal.dot(pa + pb + pc) < 0.0 {
            std::mem::swap(&mut pa, &mut pb);
            normal = -normal;
        }
        let base = vertices.len() as u32;
        vertices.push(vertex(pa, normal));
        vertices.push(vertex(pb, normal));
        vertices.push(vertex(pc, normal));
        indices.extend_from_slice(&[base, base + 1, base + 2]);
    }
    (vertices, indices)
}
