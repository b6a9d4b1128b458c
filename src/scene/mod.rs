pub mod camera;
pub mod lifecycle;
pub mod raster;
pub mod resources;
pub mod target;
