use super::rom_type::RomType;
use super::{BigPageArena, BigPageIndex, BigPageStorage};

/// Which BBC family member a [`PagingEngine`] is configured for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MachineModel {
    ModelB,
    BPlus,
    Master128,
    MasterCompact,
}

impl MachineModel {
    pub fn has_shadow_ram(self) -> bool {
        !matches!(self, MachineModel::ModelB)
    }

    pub fn has_hazel(self) -> bool {
        matches!(self, MachineModel::Master128 | MachineModel::MasterCompact)
    }
}

// ACCCON bit assignments for the Master's X/Y/E/TST control bits. The
// distilled spec names these bits but does not pin down their numbering;
// this assignment is this implementation's own choice (see DESIGN.md).
pub const ACCCON_X: u8 = 0x01;
pub const ACCCON_Y: u8 = 0x02;
pub const ACCCON_E: u8 = 0x04;
pub const ACCCON_TST: u8 = 0x08;
// B+ uses a single shadow-select bit, per spec text "ACCCON bit 7".
pub const ACCCON_BPLUS_SHADOW: u8 = 0x80;
// ROMSEL bit 7 gates ANDY on both B+ and Master.
pub const ROMSEL_ANDY: u8 = 0x80;

/// Current ROMSEL/ACCCON/mapper-region tuple. This is the only paging
/// input state that needs to be part of a snapshot; the rest of the
/// [`PagingEngine`] is immutable machine configuration.
#[derive(Clone, Debug, Default)]
pub struct PagingState {
    pub romsel: u8,
    pub acccon: u8,
    pub slot_regions: [u8; 16],
}

/// Result of [`PagingEngine::rebuild`]: two 16-entry big-page tables (user
/// and MOS views) plus the per-page "is this MOS code" flag and the
/// SHEILA-is-MMIO flag.
#[derive(Clone)]
pub struct PagingTables {
    pub user: [BigPageIndex; 16],
    pub mos: [BigPageIndex; 16],
    pub mem_big_page_is_mos: [bool; 16],
    pub sheila_is_mmio: bool,
}

impl Default for PagingTables {
    fn default() -> Self {
        Self {
            user: [BigPageIndex::INVALID; 16],
            mos: [BigPageIndex::INVALID; 16],
            mem_big_page_is_mos: [false; 16],
            sheila_is_mmio: true,
        }
    }
}

pub struct SidewaysSlot {
    pub rom_type: RomType,
    /// Index of physical big page 0 of this slot's image in the arena.
    pub base: BigPageIndex,
    pub writable: bool,
}

/// Model-parameterised big-page layout plus the ROMSEL/ACCCON -> table
/// mapping logic.
pub struct PagingEngine {
    pub model: MachineModel,
    pub main_ram: [BigPageIndex; 8],
    pub andy: Vec<BigPageIndex>,
    pub hazel: Vec<BigPageIndex>,
    pub shadow: Vec<BigPageIndex>,
    pub mos: [BigPageIndex; 4],
    pub sideways: Vec<SidewaysSlot>,
}

/// Initial contents for one sideways slot.
pub struct SidewaysSlotInit<'a> {
    pub rom_type: RomType,
    pub image: &'a [u8],
    pub writable: bool,
}

impl PagingEngine {
    /// Allocate every big page this model needs into `arena` and return the
    /// engine configured to map between them.
    pub fn new(
        model: MachineModel,
        arena: &mut BigPageArena,
        mos_rom: &[u8],
        sideways: &[Option<SidewaysSlotInit>; 16],
    ) -> Self {
        let main_ram = std::array::from_fn(|_| arena.push('m', BigPageStorage::zeroed_ram()));

        let andy_count = match model {
            MachineModel::ModelB => 0,
            MachineModel::BPlus => 3,
            MachineModel::Master128 | MachineModel::MasterCompact => 1,
        };
        let andy = (0..andy_count)
            .map(|_| arena.push('n', BigPageStorage::zeroed_ram()))
            .collect();

        let hazel_count = if model.has_hazel() { 2 } else { 0 };
        let hazel = (0..hazel_count)
            .map(|_| arena.push('h', BigPageStorage::zeroed_ram()))
            .collect();

        let shadow_count = if model.has_shadow_ram() { 5 } else { 0 };
        let shadow = (0..shadow_count)
            .map(|_| arena.push('s', BigPageStorage::zeroed_ram()))
            .collect();

        let mos = {
            let padded = zero_pad(mos_rom, 4 * super::BIG_PAGE_SIZE);
            let shared: std::sync::Arc<[u8]> = std::sync::Arc::from(padded.into_boxed_slice());
            std::array::from_fn(|i| {
                let mut buf = [0u8; super::BIG_PAGE_SIZE];
                buf.copy_from_slice(&shared[i * super::BIG_PAGE_SIZE..(i + 1) * super::BIG_PAGE_SIZE]);
                arena.push('o', BigPageStorage::Rom(std::sync::Arc::new(buf)))
            })
        };

        let mut slots = Vec::with_capacity(16);
        for (i, init) in sideways.iter().enumerate() {
            let code = std::char::from_digit(i as u32, 16).unwrap();
            match init {
                None => slots.push(SidewaysSlot {
                    rom_type: RomType::Plain16K,
                    base: BigPageIndex::INVALID,
                    writable: false,
                }),
                Some(init) => {
                    let total = init.rom_type.image_big_pages() * super::BIG_PAGE_SIZE;
                    let padded = zero_pad(init.image, total);
                    let mut base = BigPageIndex::INVALID;
                    for (chunk_i, chunk) in padded.chunks(super::BIG_PAGE_SIZE).enumerate() {
                        let mut buf = [0u8; super::BIG_PAGE_SIZE];
                        buf[..chunk.len()].copy_from_slice(chunk);
                        let idx = if init.writable {
                            arena.push(code, BigPageStorage::Ram(Box::new(buf)))
                        } else {
                            arena.push(code, BigPageStorage::Rom(std::sync::Arc::new(buf)))
                        };
                        if chunk_i == 0 {
                            base = idx;
                        }
                    }
                    slots.push(SidewaysSlot {
                        rom_type: init.rom_type,
                        base,
                        writable: init.writable,
                    });
                }
            }
        }

        Self {
            model,
            main_ram,
            andy,
            hazel,
            shadow,
            mos,
            sideways: slots,
        }
    }

    pub fn rebuild(&self, state: &PagingState) -> PagingTables {
        let mut t = PagingTables::default();

        for i in 0..8 {
            t.user[i] = self.main_ram[i];
            t.mos[i] = self.main_ram[i];
        }

        let slot_no = (state.romsel & 0x0F) as usize;
        let slot = &self.sideways[slot_no];
        let region = state.slot_regions[slot_no];
        if slot.base.is_valid() {
            for w in 0..4 {
                let phys = slot.rom_type.physical_big_page(region, w);
                let idx = BigPageIndex(slot.base.0 + phys as u16);
                t.user[8 + w] = idx;
                t.mos[8 + w] = idx;
            }
        }

        for i in 0..4 {
            t.user[12 + i] = self.mos[i];
            t.mos[12 + i] = self.mos[i];
            t.mem_big_page_is_mos[12 + i] = true;
        }

        match self.model {
            MachineModel::ModelB => {}
            MachineModel::BPlus => {
                if state.romsel & ROMSEL_ANDY != 0 {
                    for w in 0..3 {
                        t.user[8 + w] = self.andy[w];
                        t.mos[8 + w] = self.andy[w];
                    }
                }
                let shadow_sel = state.acccon & ACCCON_BPLUS_SHADOW != 0;
                for w in 0..5 {
                    let main_idx = self.main_ram[3 + w];
                    t.user[3 + w] = if shadow_sel { self.shadow[w] } else { main_idx };
                    t.mos[3 + w] = main_idx;
                }
            }
            MachineModel::Master128 | MachineModel::MasterCompact => {
                if state.romsel & ROMSEL_ANDY != 0 && !self.andy.is_empty() {
                    t.user[8] = self.andy[0];
                    t.mos[8] = self.andy[0];
                }
                let x = state.acccon & ACCCON_X != 0;
                let y = state.acccon & ACCCON_Y != 0;
                let e = state.acccon & ACCCON_E != 0;
                let usr_shadow = x;
                let mos_shadow = (y && x) || (!y && e);
                for w in 0..5 {
                    let main_idx = self.main_ram[3 + w];
                    t.user[3 + w] = if usr_shadow { self.shadow[w] } else { main_idx };
                    t.mos[3 + w] = if mos_shadow { self.shadow[w] } else { main_idx };
                }
                if y && self.hazel.len() == 2 {
                    t.user[12] = self.hazel[0];
                    t.mos[12] = self.hazel[0];
                    t.user[13] = self.hazel[1];
                    t.mos[13] = self.hazel[1];
                }
            }
        }

        t.sheila_is_mmio = match self.model {
            MachineModel::ModelB | MachineModel::BPlus => true,
            MachineModel::Master128 | MachineModel::MasterCompact => {
                state.acccon & ACCCON_TST == 0
            }
        };

        t
    }
}

fn zero_pad(data: &[u8], len: usize) -> Vec<u8> {
    let mut v = data.to_vec();
    v.resize(len, 0);
    v
}
