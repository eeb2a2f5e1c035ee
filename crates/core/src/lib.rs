mod assets;

pub mod completion;
pub mod config;
pub mod files;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod session;

pub use crate::assets::{get_config_dir, get_data_dir};
pub use crate::provider::llm::get_completion_model;
