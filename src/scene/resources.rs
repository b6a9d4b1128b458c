use std::collections::BTreeMap;

use crate::foundation::{
    core::{Rgb, Vec3},
    error::{RoomError, RoomResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// In the local XY plane, facing +Z.
    Plane { width: f64, height: f64 },
    Box { width: f64, height: f64, depth: f64 },
    Sphere { radius: f64, segments: u32 },
    Cylinder {
        radius_top: f64,
        radius_bottom: f64,
        height: f64,
        segments: u32,
    },
    Cone { radius: f64, height: f64, segments: u32 },
    Points { positions: Vec<Vec3>, size: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: Rgb,
    pub roughness: f64,
    pub opacity: f64,
    /// Unlit materials ignore scene lighting.
    pub unlit: bool,
}

impl Material {
    pub fn standard(color: Rgb, roughness: f64) -> Self {
        Self {
            color,
            roughness,
            opacity: 1.0,
            unlit: false,
        }
    }

    pub fn basic(color: Rgb, opacity: f64) -> Self {
        Self {
            color,
            roughness: 1.0,
            opacity,
            unlit: true,
        }
    }
}

/// Creation/disposal counters for one scope (a scene or a whole manager).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResourceStats {
    pub geometries_created: u64,
    pub geometries_disposed: u64,
    pub materials_created: u64,
    pub materials_disposed: u64,
    pub targets_allocated: u64,
    pub targets_released: u64,
}

impl ResourceStats {
    pub fn live_geometries(&self) -> u64 {
        self.geometries_created - self.geometries_disposed
    }

    pub fn live_materials(&self) -> u64 {
        self.materials_created - self.materials_disposed
    }

    pub fn live_targets(&self) -> u64 {
        self.targets_allocated - self.targets_released
    }

    /// Everything ever created has been released.
    pub fn is_balanced(&self) -> bool {
        self.live_geometries() == 0 && self.live_materials() == 0 && self.live_targets() == 0
    }

    pub fn absorb(&mut self, o: ResourceStats) {
        self.geometries_created += o.geometries_created;
        self.geometries_disposed += o.geometries_disposed;
        self.materials_created += o.materials_created;
        self.materials_disposed += o.materials_disposed;
        self.targets_allocated += o.targets_allocated;
        self.targets_released += o.targets_released;
    }
}

/// Disposable graphics resources of one mounted scene.
///
/// Ids are never reused, so a disposed id cannot alias a newer resource.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    geometries: BTreeMap<GeometryId, Geometry>,
    materials: BTreeMap<MaterialId, Material>,
    next_id: u32,
    stats: ResourceStats,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    pub fn live_count(&self) -> usize {
        self.geometries.len() + self.materials.len()
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.next());
        self.geometries.insert(id, geometry);
        self.stats.geometries_created += 1;
        id
    }

    pub fn create_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.next());
        self.materials.insert(id, material);
        self.stats.materials_created += 1;
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn set_material_color(&mut self, id: MaterialId, color: Rgb) -> RoomResult<()> {
        let m = self
            .materials
            .get_mut(&id)
            .ok_or_else(|| RoomError::validation(format!("material {id:?} is not live")))?;
        m.color = color;
        Ok(())
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) -> RoomResult<()> {
        self.geometries
            .remove(&id)
            .ok_or_else(|| RoomError::validation(format!("geometry {id:?} disposed twice")))?;
        self.stats.geometries_disposed += 1;
        Ok(())
    }

    pub fn dispose_material(&mut self, id: MaterialId) -> RoomResult<()> {
        self.materials
            .remove(&id)
            .ok_or_else(|| RoomError::validation(format!("material {id:?} disposed twice")))?;
        self.stats.materials_disposed += 1;
        Ok(())
    }

    /// Disposes every live resource; returns how many were released.
    pub fn dispose_all(&mut self) -> usize {
        let n = self.live_count();
        self.stats.geometries_disposed += self.geometries.len() as u64;
        self.stats.materials_disposed += self.materials.len() as u64;
        self.geometries.clear();
        self.materials.clear();
        n
    }
}
