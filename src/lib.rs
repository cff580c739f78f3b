pub mod collaborators;
pub mod config;
pub mod layers;
pub mod load;
pub mod network;
pub mod pipeline;
pub mod transform;

pub use config::BuildConfig;
pub use network::{AbstractNetworkModel, Overlay};
pub use pipeline::{Build, BuildError, BuildOutput, Pipeline, Stage, build};
