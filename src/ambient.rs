//! Decorative background particle field.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    foundation::{
        core::{Affine3, Millis, Rgb, Vec3},
        error::{RoomError, RoomResult},
    },
    schedule::Scheduler,
    scene::{
        camera::PerspectiveCamera,
        lifecycle::{Container, FrameRequest, SceneContent, SceneLifecycleManager},
        raster::{DrawItem, Lighting},
        resources::{Geometry, GeometryId, Material, MaterialId, ResourceRegistry},
        target::FrameRgba,
    },
    theme::mode::ThemeMode,
};

pub const DEFAULT_PARTICLES: usize = 2000;
pub const FIELD_EXTENT: f64 = 10.0;
/// Rotation added per frame about X and Y.
pub const SPIN_PER_FRAME: (f64, f64) = (0.0003, 0.0005);

const POINT_SIZE: f64 = 0.01;
const OPACITY: f64 = 0.6;
const FOV_DEG: f64 = 75.0;

pub fn particle_color(theme: ThemeMode) -> Rgb {
    match theme {
        ThemeMode::Dark => Rgb::hex(0x3a86ff),
        ThemeMode::Light => Rgb::hex(0x1d4ed8),
    }
}

/// Uniform positions in a cube of side [`FIELD_EXTENT`] centered on the origin.
pub fn scatter(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half = FIELD_EXTENT / 2.0;
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.random_range(-half..half),
                rng.random_range(-half..half),
                rng.random_range(-half..half),
            )
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct ParticleField {
    count: usize,
    seed: u64,
    rotation: (f64, f64),
    mesh: Option<(GeometryId, MaterialId)>,
}

impl ParticleField {
    pub fn new(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed,
            rotation: (0.0, 0.0),
            mesh: None,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn rotation(&self) -> (f64, f64) {
        self.rotation
    }

    /// One frame of spin.
    pub fn advance(&mut self) {
        self.rotation.0 += SPIN_PER_FRAME.0;
        self.rotation.1 += SPIN_PER_FRAME.1;
    }
}

impl Default for ParticleField {
    fn default() -> Self {
        Self::new(DEFAULT_PARTICLES, 0x3a86ff)
    }
}

impl SceneContent for ParticleField {
    fn setup(
        &mut self,
        resources: &mut ResourceRegistry,
        camera: &mut PerspectiveCamera,
        theme: ThemeMode,
    ) -> RoomResult<()> {
        if self.count == 0 {
            return Err(RoomError::validation("particle field needs at least one particle"));
        }
        let geometry = resources.create_geometry(Geometry::Points {
            positions: scatter(self.count, self.seed),
            size: POINT_SIZE,
        });
        let material = resources.create_material(Material::basic(particle_color(theme), OPACITY));
        self.mesh = Some((geometry, material));

        camera.fov_deg = FOV_DEG;
        camera.update_projection_matrix();
        camera.set_position(Vec3::new(0.0, 0.0, 3.0));
        camera.look_at(Vec3::ZERO);
        Ok(())
    }

    fn collect(&self, out: &mut Vec<DrawItem>) {
        if let Some((geometry, material)) = self.mesh {
            out.push(DrawItem {
                geometry,
                material,
                world: Affine3::from_rotation_x(self.rotation.0) * Affine3::from_rotation_y(self.rotation.1),
            });
        }
    }

    fn lighting(&self) -> Lighting {
        Lighting::default()
    }
}

/// Mounts `field` into `container`, lets it spin for `frames` frames and returns the last one.
#[tracing::instrument(skip(field), fields(particles = field.count()))]
pub fn render_still(
    container: &Container,
    field: ParticleField,
    theme: ThemeMode,
    frames: u64,
    frame_interval: Millis,
) -> RoomResult<FrameRgba> {
    let mut sched: Scheduler<FrameRequest> = Scheduler::new(frame_interval);
    let mut scenes = SceneLifecycleManager::default();
    let handle = scenes.mount(container, field, theme, &mut sched)?;

    let mut served = 0;
    while served < frames {
        let Some(next) = sched.next_due() else {
            break;
        };
        while let Some(fired) = sched.pop_due(next) {
            if let Some(parts) = scenes.frame_fired(fired.event.0, &mut sched) {
                parts.content.advance();
            }
        }
        served += 1;
    }

    scenes.render(&handle)?;
    let frame = scenes
        .target(&handle)
        .map(|t| t.to_frame())
        .ok_or_else(|| RoomError::scene_init("ambient scene vanished before capture"))?;
    scenes.unmount(handle, &mut sched);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_is_seeded_and_bounded() {
        let a = scatter(500, 7);
        assert_eq!(a, scatter(500, 7));
        assert_ne!(a, scatter(500, 8));
        let half = FIELD_EXTENT / 2.0;
        for p in &a {
            assert!(p.x.abs() <= half && p.y.abs() <= half && p.z.abs() <= half);
        }
    }

    #[test]
    fn spin_accumulates_per_frame() {
        let mut f = ParticleField::default();
        for _ in 0..1000 {
            f.advance();
        }
        let (x, y) = f.rotation();
        assert!((x - 0.3).abs() < 1e-9);
        assert!((y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn setup_uses_theme_color_and_wide_lens() {
        let mut f = ParticleField::new(10, 1);
        let mut res = ResourceRegistry::new();
        let mut cam = PerspectiveCamera::new(50.0, 1.0, 0.1, 1000.0);
        f.setup(&mut res, &mut cam, ThemeMode::Dark).unwrap();
        assert_eq!(cam.fov_deg, 75.0);
        let mut items = Vec::new();
        f.collect(&mut items);
        assert_eq!(items.len(), 1);
        let m = res.material(items[0].material).unwrap();
        assert_eq!(m.color, Rgb::hex(0x3a86ff));
        assert_eq!(res.live_count(), 2);
    }

    #[test]
    fn still_frame_has_visible_particles() {
        let container = Container::new(
            "background",
            crate::foundation::core::Viewport::new(64, 48).unwrap(),
        );
        let frame = render_still(
            &container,
            ParticleField::new(400, 11),
            ThemeMode::Dark,
            3,
            Millis(16),
        )
        .unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert!(frame.data.chunks_exact(4).any(|px| px[3] > 0));
    }

    #[test]
    fn empty_field_is_rejected() {
        let mut f = ParticleField::new(0, 1);
        let mut res = ResourceRegistry::new();
        let mut cam = PerspectiveCamera::new(50.0, 1.0, 0.1, 1000.0);
        assert!(f.setup(&mut res, &mut cam, ThemeMode::Light).is_err());
        assert_eq!(res.live_count(), 0);
    }
}
