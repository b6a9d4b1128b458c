//! The toggle room: floor, walls, desk, chair, lamp, light switch and the walking person.

use std::f64::consts::PI;

use crate::{
    animator::{ActorPose, EndpointEffects, FACING_DESK, LimbPose},
    foundation::{
        core::{Affine3, Millis, Rgb, Vec3, euler_transform},
        error::RoomResult,
    },
    scene::{
        camera::PerspectiveCamera,
        lifecycle::SceneContent,
        raster::{DrawItem, Lighting, PointLight},
        resources::{Geometry, GeometryId, Material, MaterialId, ResourceRegistry},
    },
    theme::mode::ThemeMode,
};

pub const CAMERA_POSITION: Vec3 = Vec3::new(2.0, 1.5, 2.0);
pub const CAMERA_TARGET: Vec3 = Vec3::new(0.0, 0.0, -1.0);

const SUN_POSITION: Vec3 = Vec3::new(2.0, 2.0, 1.0);
const LAMP_POSITION: Vec3 = Vec3::new(-1.0, 0.1, -1.5);
const LAMP_COLOR: Rgb = Rgb::hex(0xFFFF99);
const LAMP_RANGE: f64 = 3.0;
const AMBIENT_INTENSITY: f64 = 0.5;
const SWITCH_PLATE: Vec3 = Vec3::new(-2.45, 0.0, -0.95);
const SWAY_RATE: f64 = 0.001;
const SWAY_AMPLITUDE: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Limb {
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attach {
    Room,
    SwitchButton,
    Person,
    PersonLimb(Limb),
}

#[derive(Clone, Copy, Debug)]
struct Part {
    geometry: GeometryId,
    material: MaterialId,
    attach: Attach,
    position: Vec3,
    rotation: Vec3,
}

/// Materials recolored when the room changes theme.
#[derive(Clone, Copy, Debug)]
struct ThemedMaterials {
    floor: MaterialId,
    wall: MaterialId,
    body: MaterialId,
}

/// Scene content of the theme toggle room.
#[derive(Clone, Debug)]
pub struct RoomScene {
    parts: Vec<Part>,
    themed: Option<ThemedMaterials>,
    shown: ThemeMode,
    pose: ActorPose,
    room_yaw: f64,
    switch_offset: f64,
    lamp_intensity: f64,
    sun_intensity: f64,
    ambient: Rgb,
}

impl RoomScene {
    /// `idle` is where the person stands when nothing is happening.
    pub fn new(idle: ActorPose) -> Self {
        let fx = EndpointEffects::for_theme(ThemeMode::Light);
        Self {
            parts: Vec::new(),
            themed: None,
            shown: fx.theme,
            pose: idle,
            room_yaw: 0.0,
            switch_offset: fx.switch_offset,
            lamp_intensity: fx.lamp_intensity,
            sun_intensity: fx.sun_intensity,
            ambient: fx.ambient,
        }
    }

    /// Theme the room's lighting and palette currently show.
    pub fn shown_theme(&self) -> ThemeMode {
        self.shown
    }

    pub fn pose(&self) -> &ActorPose {
        &self.pose
    }

    pub fn room_yaw(&self) -> f64 {
        self.room_yaw
    }

    pub fn switch_offset(&self) -> f64 {
        self.switch_offset
    }

    pub fn lamp_intensity(&self) -> f64 {
        self.lamp_intensity
    }

    pub fn sun_intensity(&self) -> f64 {
        self.sun_intensity
    }

    pub fn floor_material(&self) -> Option<MaterialId> {
        self.themed.map(|t| t.floor)
    }

    pub fn apply_pose(&mut self, pose: &ActorPose) {
        self.pose = *pose;
    }

    /// Flips the switch, lamp and window light and recolors floor, walls and body.
    pub fn apply_endpoint(
        &mut self,
        resources: &mut ResourceRegistry,
        fx: &EndpointEffects,
    ) -> RoomResult<()> {
        self.set_lights(fx);
        if let Some(t) = self.themed {
            resources.set_material_color(t.floor, fx.palette.floor)?;
            resources.set_material_color(t.wall, fx.palette.wall)?;
            resources.set_material_color(t.body, fx.palette.body)?;
        }
        tracing::debug!(theme = %fx.theme, switch_on = fx.switch_on, "room endpoint applied");
        Ok(())
    }

    fn set_lights(&mut self, fx: &EndpointEffects) {
        self.shown = fx.theme;
        self.switch_offset = fx.switch_offset;
        self.lamp_intensity = fx.lamp_intensity;
        self.sun_intensity = fx.sun_intensity;
        self.ambient = fx.ambient;
    }

    /// Slow oscillation of the whole room about the vertical axis.
    pub fn sway(&mut self, now: Millis) {
        self.room_yaw = (now.as_f64() * SWAY_RATE).sin() * SWAY_AMPLITUDE;
    }

    fn room_transform(&self) -> Affine3 {
        Affine3::from_rotation_y(self.room_yaw)
    }

    fn limb_angle(&self, limb: Limb) -> f64 {
        let l = &self.pose.limbs;
        match limb {
            Limb::RightArm => l.right_arm,
            Limb::LeftArm => l.left_arm,
            Limb::RightLeg => l.right_leg,
            Limb::LeftLeg => l.left_leg,
        }
    }

    fn part_world(&self, part: &Part, room: Affine3, person: Affine3) -> Affine3 {
        match part.attach {
            Attach::Room => room * euler_transform(part.position, part.rotation),
            Attach::SwitchButton => {
                let p = part.position + Vec3::new(0.0, self.switch_offset, 0.0);
                room * euler_transform(p, part.rotation)
            }
            Attach::Person => {
                room * person * euler_transform(part.position, part.rotation)
            }
            Attach::PersonLimb(limb) => {
                let r = Vec3::new(self.limb_angle(limb), part.rotation.y, part.rotation.z);
                room * person * euler_transform(part.position, r)
            }
        }
    }
}

impl Default for RoomScene {
    fn default() -> Self {
        Self::new(ActorPose {
            position: Vec3::new(-0.5, -0.5, -1.0),
            yaw: FACING_DESK,
            limbs: LimbPose::NEUTRAL,
        })
    }
}

struct Builder<'a> {
    resources: &'a mut ResourceRegistry,
    parts: Vec<Part>,
}

impl Builder<'_> {
    fn add(&mut self, geometry: GeometryId, material: MaterialId, attach: Attach, position: Vec3) {
        self.add_rotated(geometry, material, attach, position, Vec3::ZERO);
    }

    fn add_rotated(
        &mut self,
        geometry: GeometryId,
        material: MaterialId,
        attach: Attach,
        position: Vec3,
        rotation: Vec3,
    ) {
        self.parts.push(Part {
            geometry,
            material,
            attach,
            position,
            rotation,
        });
    }

    fn geometry(&mut self, g: Geometry) -> GeometryId {
        self.resources.create_geometry(g)
    }

    fn standard(&mut self, color: u32, roughness: f64) -> MaterialId {
        self.resources
            .create_material(Material::standard(Rgb::hex(color), roughness))
    }
}

fn cuboid(width: f64, height: f64, depth: f64) -> Geometry {
    Geometry::Box {
        width,
        height,
        depth,
    }
}

impl SceneContent for RoomScene {
    #[tracing::instrument(skip(self, resources, camera))]
    fn setup(
        &mut self,
        resources: &mut ResourceRegistry,
        camera: &mut PerspectiveCamera,
        theme: ThemeMode,
    ) -> RoomResult<()> {
        let fx = EndpointEffects::for_theme(theme);
        let mut b = Builder {
            resources: &mut *resources,
            parts: Vec::new(),
        };

        let floor_geo = b.geometry(Geometry::Plane {
            width: 5.0,
            height: 5.0,
        });
        let floor = b.resources.create_material(Material::standard(fx.palette.floor, 0.8));
        b.add_rotated(
            floor_geo,
            floor,
            Attach::Room,
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(-PI / 2.0, 0.0, 0.0),
        );

        let wall = b.resources.create_material(Material::standard(fx.palette.wall, 0.9));
        let back_wall = b.geometry(Geometry::Plane {
            width: 5.0,
            height: 3.0,
        });
        b.add(back_wall, wall, Attach::Room, Vec3::new(0.0, 0.5, -2.5));
        let side_wall = b.geometry(Geometry::Plane {
            width: 5.0,
            height: 3.0,
        });
        b.add_rotated(
            side_wall,
            wall,
            Attach::Room,
            Vec3::new(-2.5, 0.5, 0.0),
            Vec3::new(0.0, PI / 2.0, 0.0),
        );

        let wood = b.standard(0x964B00, 0.6);
        let desk = b.geometry(cuboid(1.5, 0.1, 0.8));
        b.add(desk, wood, Attach::Room, Vec3::new(-0.5, -0.45, -1.5));
        let desk_leg = b.geometry(cuboid(0.1, 0.5, 0.1));
        for (x, z) in [(-1.1, -1.1), (0.1, -1.1), (-1.1, -1.9), (0.1, -1.9)] {
            b.add(desk_leg, wood, Attach::Room, Vec3::new(x, -0.75, z));
        }

        let chair = b.standard(0x111111, 0.5);
        let seat = b.geometry(cuboid(0.6, 0.1, 0.6));
        b.add(seat, chair, Attach::Room, Vec3::new(-0.5, -0.2, -0.8));
        let back = b.geometry(cuboid(0.6, 0.6, 0.1));
        b.add(back, chair, Attach::Room, Vec3::new(-0.5, 0.1, -1.1));

        let lamp_base = b.geometry(Geometry::Cylinder {
            radius_top: 0.1,
            radius_bottom: 0.15,
            height: 0.05,
            segments: 16,
        });
        let lamp_base_mat = b.standard(0x333333, 0.5);
        b.add(lamp_base, lamp_base_mat, Attach::Room, Vec3::new(-1.0, -0.4, -1.5));
        let pole = b.geometry(Geometry::Cylinder {
            radius_top: 0.02,
            radius_bottom: 0.02,
            height: 0.5,
            segments: 8,
        });
        let pole_mat = b.standard(0x777777, 0.5);
        b.add(pole, pole_mat, Attach::Room, Vec3::new(-1.0, -0.15, -1.5));
        let shade = b.geometry(Geometry::Cone {
            radius: 0.2,
            height: 0.3,
            segments: 16,
        });
        let shade_mat = b.standard(LAMP_COLOR.to_hex(), 0.5);
        b.add_rotated(shade, shade_mat, Attach::Room, LAMP_POSITION, Vec3::new(PI, 0.0, 0.0));

        let plate = b.geometry(cuboid(0.2, 0.3, 0.05));
        let plate_mat = b.standard(0xDDDDDD, 0.5);
        b.add(plate, plate_mat, Attach::Room, Vec3::new(-2.45, 0.0, -1.0));
        let button = b.geometry(cuboid(0.1, 0.1, 0.05));
        let button_mat = b.standard(0x999999, 0.5);
        b.add(button, button_mat, Attach::SwitchButton, SWITCH_PLATE);

        let head = b.geometry(Geometry::Sphere {
            radius: 0.1,
            segments: 16,
        });
        let skin = b.standard(0xFFA07A, 0.7);
        b.add(head, skin, Attach::Person, Vec3::new(0.0, 0.1, 0.0));
        let torso = b.geometry(Geometry::Cylinder {
            radius_top: 0.07,
            radius_bottom: 0.1,
            height: 0.35,
            segments: 8,
        });
        let body = b.resources.create_material(Material::standard(fx.palette.body, 0.7));
        b.add(torso, body, Attach::Person, Vec3::new(0.0, -0.15, 0.0));
        let arm = b.geometry(cuboid(0.05, 0.2, 0.05));
        b.add_rotated(
            arm,
            body,
            Attach::PersonLimb(Limb::RightArm),
            Vec3::new(0.13, -0.1, 0.0),
            Vec3::new(0.0, 0.0, -0.3),
        );
        b.add_rotated(
            arm,
            body,
            Attach::PersonLimb(Limb::LeftArm),
            Vec3::new(-0.13, -0.1, 0.0),
            Vec3::new(0.0, 0.0, 0.3),
        );
        let leg = b.geometry(cuboid(0.07, 0.2, 0.07));
        let right_trousers = b.standard(0x222222, 0.7);
        let left_trousers = b.standard(0x222222, 0.7);
        b.add(
            leg,
            right_trousers,
            Attach::PersonLimb(Limb::RightLeg),
            Vec3::new(0.05, -0.35, 0.0),
        );
        b.add(
            leg,
            left_trousers,
            Attach::PersonLimb(Limb::LeftLeg),
            Vec3::new(-0.05, -0.35, 0.0),
        );

        let parts = b.parts;
        tracing::debug!(parts = parts.len(), live = resources.live_count(), "room built");
        self.parts = parts;
        self.themed = Some(ThemedMaterials { floor, wall, body });
        self.set_lights(&fx);

        camera.set_position(CAMERA_POSITION);
        camera.look_at(CAMERA_TARGET);
        Ok(())
    }

    fn collect(&self, out: &mut Vec<DrawItem>) {
        let room = self.room_transform();
        let person = Affine3::from_translation(self.pose.position) * Affine3::from_rotation_y(self.pose.yaw);
        out.extend(self.parts.iter().map(|part| DrawItem {
            geometry: part.geometry,
            material: part.material,
            world: self.part_world(part, room, person),
        }));
    }

    fn lighting(&self) -> Lighting {
        let room = self.room_transform();
        Lighting {
            ambient: self.ambient,
            ambient_intensity: AMBIENT_INTENSITY,
            sun_position: SUN_POSITION,
            sun_intensity: self.sun_intensity,
            point: Some(PointLight {
                position: room.transform_point3(LAMP_POSITION),
                color: LAMP_COLOR,
                intensity: self.lamp_intensity,
                range: LAMP_RANGE,
            }),
        }
    }
}
