//! Sideways ROM mapper types. Each type determines how the per-slot
//! "mapper region" byte selects which physical 4 KiB sub-page of the
//! slot's image is visible at a given 4 KiB window within $8000-$BFFF.

/// Which ROM mapper a sideways slot uses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomType {
    Plain16K,
    CciWord,
    Abe,
    Abep,
    CciBase,
    CciSpell,
    PalQst,
    PalTed,
    PalWap,
}

impl RomType {
    /// Number of region-select bits this type actually uses; bits beyond
    /// this are ignored when a write sets the mapper region.
    pub fn region_bits(self) -> u8 {
        match self {
            RomType::Plain16K => 0,
            RomType::CciWord | RomType::Abe | RomType::Abep => 1,
            RomType::CciBase => 2,
            RomType::CciSpell => 3,
            RomType::PalQst | RomType::PalTed => 2,
            RomType::PalWap => 3,
        }
    }

    pub fn region_mask(self) -> u8 {
        (1u8 << self.region_bits()).wrapping_sub(1)
    }

    /// Total physical image size this type addresses, in 4 KiB big pages.
    /// Loaded ROM images smaller than this are zero-padded (see
    /// DESIGN.md / spec Open Questions).
    pub fn image_big_pages(self) -> usize {
        match self {
            RomType::Plain16K => 4,
            RomType::CciWord | RomType::Abe | RomType::Abep => 8,
            RomType::CciBase => 16,
            RomType::CciSpell => 32,
            RomType::PalQst | RomType::PalTed => 8,
            RomType::PalWap => 32,
        }
    }

    /// Map (region byte, big page within the $8000-$BFFF window [0..3])
    /// to a physical big-page offset within the slot's image.
    pub fn physical_big_page(self, region: u8, window_page: usize) -> usize {
        debug_assert!(window_page < 4);
        let region = region & self.region_mask();
        match self {
            RomType::Plain16K => window_page,
            RomType::CciWord | RomType::Abe | RomType::Abep => {
                (region as usize) * 4 + window_page
            }
            RomType::CciBase => (region as usize) * 4 + window_page,
            RomType::CciSpell => (region as usize) * 4 + window_page,
            // 8 KiB at $8000-$9FFF (window pages 0,1) is fixed; $A000-$BFFF
            // (window pages 2,3) is paginated in 8 KiB banks.
            RomType::PalQst | RomType::PalWap => {
                if window_page < 2 {
                    window_page
                } else {
                    2 + (region as usize) * 2 + (window_page - 2)
                }
            }
            RomType::PalTed => {
                if window_page < 2 {
                    window_page
                } else {
                    2 + (region as usize) * 2 + (window_page - 2)
                }
            }
        }
    }
}
