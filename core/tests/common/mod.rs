//! Flat 64 KiB RAM bus used by the 6502 instruction-level tests.
//!
//! Unlike the full BBC memory map, this bus has no paging and no devices:
//! it exists purely to drive the CPU through known cycle sequences and
//! inspect the resulting register/memory state.

use beeb_core::core::{Bus, BusMaster, InterruptState};

pub struct TestBus {
    pub memory: [u8; 0x10000],
    pub irq: bool,
    pub nmi: bool,
}

impl TestBus {
    pub fn new() -> Self {
        TestBus {
            memory: [0; 0x10000],
            irq: false,
            nmi: false,
        }
    }

    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl Bus for TestBus {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        self.memory[addr as usize] = data;
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        false
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        InterruptState {
            nmi: self.nmi,
            irq: self.irq,
        }
    }
}
