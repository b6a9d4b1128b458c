//! Flat-shaded painter's-algorithm rasterization of a draw list into a [`RenderTarget`].

use std::f64::consts::TAU;

use crate::{
    foundation::core::{Affine3, BezPath, Point, Rgb, Vec3},
    scene::{
        camera::PerspectiveCamera,
        resources::{Geometry, GeometryId, MaterialId, ResourceRegistry},
        target::RenderTarget,
    },
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub world: Affine3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Rgb,
    pub intensity: f64,
    /// Distance at which the contribution reaches zero.
    pub range: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: Rgb,
    pub ambient_intensity: f64,
    /// Position of the directional light; it shines towards the origin.
    pub sun_position: Vec3,
    pub sun_intensity: f64,
    pub point: Option<PointLight>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: Rgb::hex(0xFFFFFF),
            ambient_intensity: 1.0,
            sun_position: Vec3::new(0.0, 1.0, 0.0),
            sun_intensity: 0.0,
            point: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub faces_drawn: usize,
    pub faces_culled: usize,
}

struct Face {
    depth: f64,
    points: Vec<Point>,
    color: Rgb,
    opacity: f64,
}

/// Local-space polygons of a solid geometry.
fn polygons(geometry: &Geometry) -> Vec<Vec<Vec3>> {
    match geometry {
        Geometry::Plane { width, height } => {
            let (x, y) = (width / 2.0, height / 2.0);
            vec![vec![
                Vec3::new(-x, -y, 0.0),
                Vec3::new(x, -y, 0.0),
                Vec3::new(x, y, 0.0),
                Vec3::new(-x, y, 0.0),
            ]]
        }
        Geometry::Box {
            width,
            height,
            depth,
        } => {
            let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
            let c = |sx: f64, sy: f64, sz: f64| Vec3::new(sx * x, sy * y, sz * z);
            vec![
                vec![c(-1., -1., 1.), c(1., -1., 1.), c(1., 1., 1.), c(-1., 1., 1.)],
                vec![c(1., -1., -1.), c(-1., -1., -1.), c(-1., 1., -1.), c(1., 1., -1.)],
                vec![c(1., -1., 1.), c(1., -1., -1.), c(1., 1., -1.), c(1., 1., 1.)],
                vec![c(-1., -1., -1.), c(-1., -1., 1.), c(-1., 1., 1.), c(-1., 1., -1.)],
                vec![c(-1., 1., 1.), c(1., 1., 1.), c(1., 1., -1.), c(-1., 1., -1.)],
                vec![c(-1., -1., -1.), c(1., -1., -1.), c(1., -1., 1.), c(-1., -1., 1.)],
            ]
        }
        Geometry::Sphere { radius, segments } => {
            let rings = (*segments / 2).max(2);
            let profile: Vec<(f64, f64)> = (0..=rings)
                .map(|i| {
                    let a = std::f64::consts::PI * f64::from(i) / f64::from(rings);
                    (radius * a.sin(), -radius * a.cos())
                })
                .collect();
            lathe(&profile, *segments)
        }
        Geometry::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        } => lathe(
            &[(*radius_bottom, -height / 2.0), (*radius_top, height / 2.0)],
            *segments,
        ),
        Geometry::Cone {
            radius,
            height,
            segments,
        } => lathe(&[(*radius, -height / 2.0), (0.0, height / 2.0)], *segments),
        Geometry::Points { .. } => Vec::new(),
    }
}

/// Revolves a `(radius, y)` profile around the Y axis into quads.
fn lathe(profile: &[(f64, f64)], segments: u32) -> Vec<Vec<Vec3>> {
    let segments = segments.max(3);
    let at = |(r, y): (f64, f64), i: u32| {
        let a = TAU * f64::from(i) / f64::from(segments);
        Vec3::new(r * a.sin(), y, r * a.cos())
    };
    let mut out = Vec::new();
    for w in profile.windows(2) {
        for i in 0..segments {
            out.push(vec![
                at(w[0], i),
                at(w[0], i + 1),
                at(w[1], i + 1),
                at(w[1], i),
            ]);
        }
    }
    out
}

fn face_normal(pts: &[Vec3]) -> Vec3 {
    // Newell's method; tolerant of degenerate (collapsed) vertices.
    let mut n = Vec3::ZERO;
    for (i, a) in pts.iter().enumerate() {
        let b = pts[(i + 1) % pts.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n.normalize_or_zero()
}

fn centroid(pts: &[Vec3]) -> Vec3 {
    let sum = pts.iter().fold(Vec3::ZERO, |acc, p| acc + *p);
    sum * (1.0 / pts.len().max(1) as f64)
}

fn shade(base: Rgb, normal: Vec3, center: Vec3, lighting: &Lighting) -> Rgb {
    let ambient_level = f64::from(lighting.ambient.r) / 255.0 * 0.299
        + f64::from(lighting.ambient.g) / 255.0 * 0.587
        + f64::from(lighting.ambient.b) / 255.0 * 0.114;
    let to_sun = lighting.sun_position.normalize_or_zero();
    let lambert = normal.dot(to_sun).abs();
    let mut k = lighting.ambient_intensity * ambient_level + lighting.sun_intensity * lambert;

    let mut glow = Rgb::new(0, 0, 0);
    if let Some(pl) = lighting.point
        && pl.intensity > 0.0
        && pl.range > 0.0
    {
        let d = pl.position - center;
        let falloff = (1.0 - d.length() / pl.range).max(0.0);
        let term = pl.intensity * falloff * normal.dot(d.normalize_or_zero()).abs();
        k += term;
        glow = pl.color.scale(term * 0.25);
    }
    base.scale(k).saturating_add(glow)
}

/// Clears `target` and draws `items` back to front.
pub fn rasterize(
    target: &mut RenderTarget,
    camera: &PerspectiveCamera,
    resources: &ResourceRegistry,
    items: &[DrawItem],
    lighting: &Lighting,
    clear: Option<Rgb>,
) -> RasterStats {
    let viewport = target.viewport();
    let mut stats = RasterStats::default();
    let mut faces: Vec<Face> = Vec::new();

    for item in items {
        let (Some(geometry), Some(material)) = (
            resources.geometry(item.geometry),
            resources.material(item.material),
        ) else {
            tracing::trace!(?item, "skipping draw item with disposed resources");
            continue;
        };

        if let Geometry::Points { positions, size } = geometry {
            let color = if material.unlit {
                material.color
            } else {
                shade(material.color, Vec3::Y, Vec3::ZERO, lighting)
            };
            for p in positions {
                let Some(pr) = camera.project(item.world.transform_point3(*p), viewport) else {
                    stats.faces_culled += 1;
                    continue;
                };
                let half = (size * 0.5 * f64::from(viewport.height) / pr.depth).max(0.5);
                let (x, y) = (pr.point.x, pr.point.y);
                faces.push(Face {
                    depth: pr.depth,
                    points: vec![
                        Point::new(x - half, y - half),
                        Point::new(x + half, y - half),
                        Point::new(x + half, y + half),
                        Point::new(x - half, y + half),
                    ],
                    color,
                    opacity: material.opacity,
                });
            }
            continue;
        }

        for poly in polygons(geometry) {
            let world: Vec<Vec3> = poly.iter().map(|p| item.world.transform_point3(*p)).collect();
            let projected: Option<Vec<_>> =
                world.iter().map(|p| camera.project(*p, viewport)).collect();
            let Some(projected) = projected else {
                stats.faces_culled += 1;
                continue;
            };
            let depth =
                projected.iter().map(|p| p.depth).sum::<f64>() / projected.len() as f64;
            let color = if material.unlit {
                material.color
            } else {
                shade(material.color, face_normal(&world), centroid(&world), lighting)
            };
            faces.push(Face {
                depth,
                points: projected.into_iter().map(|p| p.point).collect(),
                color,
                opacity: material.opacity,
            });
        }
    }

    faces.sort_by(|a, b| b.depth.total_cmp(&a.depth));

    target.clear(clear);
    let mut ctx = vello_cpu::RenderContext::new(target.width(), target.height());
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    if let Some(bg) = clear {
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(bg.r, bg.g, bg.b, 255));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(viewport.width),
            f64::from(viewport.height),
        ));
    }
    for face in &faces {
        let alpha = (face.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            face.color.r,
            face.color.g,
            face.color.b,
            alpha,
        ));
        ctx.fill_path(&bezpath_to_cpu(&polygon_path(&face.points)));
        stats.faces_drawn += 1;
    }
    ctx.flush();
    ctx.render_to_pixmap(target.pixmap_mut());
    stats
}

fn polygon_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
        path.close_path();
    }
    path
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
