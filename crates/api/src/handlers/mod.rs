pub mod render;
pub mod workers;
