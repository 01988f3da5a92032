pub mod models;
pub mod registry;
pub mod rom_loader;

pub use models::ModelDefinition;
pub use rom_loader::{RomLoadError, RomSet};
