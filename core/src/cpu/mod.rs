use crate::core::component::BusMasterComponent;

/// Generic CPU interface.
pub trait Cpu: BusMasterComponent + CpuStateTrait {
    /// Reset vector fetch.
    fn reset(&mut self);

    /// Signal a specific interrupt line directly (used by tests; normal
    /// operation drives interrupts through `Bus::check_interrupts`).
    fn signal_interrupt(&mut self, int: crate::core::bus::InterruptState);

    /// Query whether the CPU is halted internally. The 6502 has no such
    /// state, so this is always false for `M6502`.
    fn is_sleeping(&self) -> bool;
}

pub mod state;
pub use state::{CpuStateTrait, M6502State};

pub mod m6502;
pub use m6502::M6502;
