//! Concrete BBC Micro family members: which MOS/BASIC ROMs each model
//! needs, and how to assemble a [`MachineConfig`] from a loaded [`RomSet`].

use beeb_core::machine::{MachineConfig, SidewaysRomConfig};
use beeb_core::paging::RomType;
use beeb_core::paging::engine::MachineModel;

use crate::rom_loader::{RomLoadError, RomSet};

/// Everything needed to build a runnable machine for one family member.
pub struct ModelDefinition {
    pub name: &'static str,
    pub model: MachineModel,
    pub mos_file: &'static str,
    /// Default sideways fit: BASIC in the highest-priority slot, a RAM
    /// cartridge slot for user programs. Real machines carry more; this
    /// is the minimal set real MOS code expects to find something in.
    pub default_sideways: &'static [(usize, &'static str, RomType)],
}

pub const MODEL_B: ModelDefinition = ModelDefinition {
    name: "model-b",
    model: MachineModel::ModelB,
    mos_file: "os12.rom",
    default_sideways: &[(15, "basic2.rom", RomType::Plain16K)],
};

pub const B_PLUS: ModelDefinition = ModelDefinition {
    name: "b-plus",
    model: MachineModel::BPlus,
    mos_file: "os20.rom",
    default_sideways: &[(15, "basic2.rom", RomType::Plain16K)],
};

pub const MASTER_128: ModelDefinition = ModelDefinition {
    name: "master-128",
    model: MachineModel::Master128,
    mos_file: "mos350.rom",
    default_sideways: &[
        (15, "terminal.rom", RomType::Plain16K),
        (12, "basic4.rom", RomType::Plain16K),
    ],
};

pub const MASTER_COMPACT: ModelDefinition = ModelDefinition {
    name: "master-compact",
    model: MachineModel::MasterCompact,
    mos_file: "mos510c.rom",
    default_sideways: &[(12, "basic4.rom", RomType::Plain16K)],
};

pub const ALL_MODELS: &[&ModelDefinition] = &[&MODEL_B, &B_PLUS, &MASTER_128, &MASTER_COMPACT];

pub fn find(name: &str) -> Option<&'static ModelDefinition> {
    ALL_MODELS.iter().copied().find(|m| m.name == name)
}

impl ModelDefinition {
    /// Read this model's MOS and default sideways ROMs out of `rom_set`
    /// and build a [`MachineConfig`] borrowing their bytes.
    ///
    /// ROM bytes are returned alongside the config (rather than having the
    /// config own them) because `MachineConfig` borrows `&[u8]` slices, and
    /// `rom_set` already owns the backing storage for the lifetime the
    /// caller needs.
    pub fn build_config<'a>(&self, rom_set: &'a RomSet) -> Result<MachineConfig<'a>, RomLoadError> {
        let mos_rom = rom_set.require(self.mos_file)?;

        let mut sideways: [Option<SidewaysRomConfig<'a>>; 16] = std::array::from_fn(|_| None);
        for (slot, file, rom_type) in self.default_sideways {
            let image = rom_set.require(file)?;
            sideways[*slot] = Some(SidewaysRomConfig {
                rom_type: *rom_type,
                image,
                writable: false,
            });
        }

        Ok(MachineConfig {
            model: self.model,
            mos_rom,
            sideways,
        })
    }
}
