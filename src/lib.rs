pub mod archive;
pub mod config;
pub mod patcher;
pub mod pipeline;
pub mod release;
pub mod telemetry;

pub use config::Config;

