pub mod layer;
pub mod map_surface;
