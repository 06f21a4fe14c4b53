//! Reaction-diffusion mandala driven by live sensory input.

pub mod audio_input;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod flow_field;
pub mod motion;
pub mod pipeline;
pub mod post;
pub mod raster;
pub mod reaction_diffusion;
pub mod sensors;
pub mod types;

pub use config::MandalaConfig;
pub use pipeline::MandalaPipeline;
pub use raster::Raster;
