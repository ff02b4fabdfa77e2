pub mod config;
pub mod frame;
pub mod geometry;
pub mod pose;
pub mod render;
pub mod system;
pub mod tracker;
