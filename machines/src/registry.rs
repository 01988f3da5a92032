//! Front-end-facing catalogue of BBC Micro family members.
//!
//! Unlike a per-game arcade catalogue, the BBC family is a small, fixed
//! set known at compile time, so a plain static table stands in for a
//! plugin-style registry: no self-registration machinery needed.

use beeb_core::machine::BbcMicro;

use crate::models::{self, ModelDefinition};
use crate::rom_loader::{RomLoadError, RomSet};

/// Look up a model by its CLI name (e.g. `"model-b"`, `"master-128"`).
pub fn find(name: &str) -> Option<&'static ModelDefinition> {
    models::find(name)
}

/// All known family members, sorted by name.
pub fn all() -> Vec<&'static ModelDefinition> {
    let mut entries: Vec<_> = models::ALL_MODELS.iter().copied().collect();
    entries.sort_by_key(|m| m.name);
    entries
}

/// Build a runnable [`BbcMicro`] for `definition` from `rom_set`.
///
/// Unlike an arcade catalogue with one `Machine` impl per game, every BBC
/// family member is the same concrete struct wired up differently, so this
/// returns `BbcMicro` directly rather than `Box<dyn Machine>` — callers that
/// need disc/tape control beyond the trait (`insert_disc`, `eject_disc`)
/// still have it.
pub fn create(definition: &ModelDefinition, rom_set: &RomSet) -> Result<BbcMicro, RomLoadError> {
    let config = definition.build_config(rom_set)?;
    Ok(BbcMicro::new(config))
}
