/// Identifies who is accessing the bus. The BBC Micro has a single 6502 bus
/// master; the enum still exists so the `Bus` trait shape matches the rest
/// of the device layer and leaves room for a future co-processor tube bus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BusMaster {
    Cpu,
}

/// Generic bus interface. The BBC's 6502 sees one flat 64 KiB address space
/// (no separate I/O space), so `io_read`/`io_write` are left at their
/// memory-mapped defaults.
pub trait Bus {
    type Address: Copy + Into<u64>;
    type Data;

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);

    fn io_read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data {
        self.read(master, addr)
    }

    fn io_write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data) {
        self.write(master, addr, data)
    }

    /// The 6502 is never halted by another bus master on this machine.
    fn is_halted_for(&self, master: BusMaster) -> bool;

    /// OR of every device's interrupt line, sampled once per CPU cycle.
    fn check_interrupts(&self, target: BusMaster) -> InterruptState;
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptState {
    pub nmi: bool,
    pub irq: bool,
}
