//! Whole-machine snapshot format: a structured, manually-encoded record
//! (no serde — the teacher's own style keeps codecs explicit) containing
//! everything needed to resume a machine on a fresh core, given the same
//! ROMs by content hash.

use std::sync::Arc;

/// FNV-1a, used only to identify ROM images by content so a snapshot can
/// reference "the MOS ROM" without embedding its bytes.
pub fn content_hash(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub struct Snapshot {
    pub machine_type_id: u8,
    pub cycle_counter: u64,
    pub cpu_registers: Vec<u8>,
    pub ram_buffers: Vec<Vec<u8>>,
    pub rom_hashes: Vec<u64>,
    pub peripheral_states: Vec<(u8, Vec<u8>)>,
    pub paging_state: Vec<u8>,
}

impl Snapshot {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.machine_type_id);
        out.extend_from_slice(&self.cycle_counter.to_le_bytes());

        write_blob(&mut out, &self.cpu_registers);

        write_u32(&mut out, self.ram_buffers.len() as u32);
        for ram in &self.ram_buffers {
            write_blob(&mut out, ram);
        }

        write_u32(&mut out, self.rom_hashes.len() as u32);
        for hash in &self.rom_hashes {
            out.extend_from_slice(&hash.to_le_bytes());
        }

        write_u32(&mut out, self.peripheral_states.len() as u32);
        for (tag, blob) in &self.peripheral_states {
            out.push(*tag);
            write_blob(&mut out, blob);
        }

        write_blob(&mut out, &self.paging_state);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(bytes);
        let machine_type_id = cursor.take_u8()?;
        let cycle_counter = cursor.take_u64()?;
        let cpu_registers = cursor.take_blob()?;

        let ram_count = cursor.take_u32()?;
        let mut ram_buffers = Vec::with_capacity(ram_count as usize);
        for _ in 0..ram_count {
            ram_buffers.push(cursor.take_blob()?);
        }

        let rom_count = cursor.take_u32()?;
        let mut rom_hashes = Vec::with_capacity(rom_count as usize);
        for _ in 0..rom_count {
            rom_hashes.push(cursor.take_u64()?);
        }

        let peripheral_count = cursor.take_u32()?;
        let mut peripheral_states = Vec::with_capacity(peripheral_count as usize);
        for _ in 0..peripheral_count {
            let tag = cursor.take_u8()?;
            let blob = cursor.take_blob()?;
            peripheral_states.push((tag, blob));
        }

        let paging_state = cursor.take_blob()?;

        Some(Self {
            machine_type_id,
            cycle_counter,
            cpu_registers,
            ram_buffers,
            rom_hashes,
            peripheral_states,
            paging_state,
        })
    }
}

/// Reference-counted handle so snapshots can be shared across threads
/// without cloning their (potentially large) RAM buffers.
pub type SharedSnapshot = Arc<Snapshot>;

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_blob(out: &mut Vec<u8>, blob: &[u8]) {
    write_u32(out, blob.len() as u32);
    out.extend_from_slice(blob);
}

/// Minimal little-endian byte reader shared by every peripheral's
/// `load_state`. Missing bytes decode as zero, so a truncated or
/// wrong-shaped blob degrades to a partial restore instead of panicking.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> u8 {
        let b = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    pub(crate) fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    pub(crate) fn u16(&mut self) -> u16 {
        let lo = self.u8() as u16;
        let hi = self.u8() as u16;
        lo | (hi << 8)
    }

    pub(crate) fn i16(&mut self) -> i16 {
        self.u16() as i16
    }

    pub(crate) fn u32(&mut self) -> u32 {
        let lo = self.u16() as u32;
        let hi = self.u16() as u32;
        lo | (hi << 16)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take_u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take_u32(&mut self) -> Option<u32> {
        let slice = self.bytes.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes(slice.try_into().ok()?))
    }

    fn take_u64(&mut self) -> Option<u64> {
        let slice = self.bytes.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        Some(u64::from_le_bytes(slice.try_into().ok()?))
    }

    fn take_blob(&mut self) -> Option<Vec<u8>> {
        let len = self.take_u32()? as usize;
        let slice = self.bytes.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(slice.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            machine_type_id: 2,
            cycle_counter: 123_456,
            cpu_registers: vec![1, 2, 3, 4, 5, 6],
            ram_buffers: vec![vec![0xAA; 4096], vec![0xBB; 4096]],
            rom_hashes: vec![content_hash(b"mos"), content_hash(b"basic")],
            peripheral_states: vec![(1, vec![9, 9]), (2, vec![])],
            paging_state: vec![0xFF; 32],
        }
    }

    #[test]
    fn encode_then_decode_round_trips_byte_for_byte() {
        let snap = sample();
        let encoded = snap.encode();
        let decoded = Snapshot::decode(&encoded).expect("valid snapshot");
        assert_eq!(decoded.machine_type_id, snap.machine_type_id);
        assert_eq!(decoded.cycle_counter, snap.cycle_counter);
        assert_eq!(decoded.cpu_registers, snap.cpu_registers);
        assert_eq!(decoded.ram_buffers, snap.ram_buffers);
        assert_eq!(decoded.rom_hashes, snap.rom_hashes);
        assert_eq!(decoded.peripheral_states, snap.peripheral_states);
        assert_eq!(decoded.paging_state, snap.paging_state);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn truncated_buffer_fails_to_decode() {
        let snap = sample();
        let mut encoded = snap.encode();
        encoded.truncate(encoded.len() - 10);
        assert!(Snapshot::decode(&encoded).is_none());
    }

    #[test]
    fn content_hash_is_stable_for_same_bytes() {
        assert_eq!(content_hash(b"mos"), content_hash(b"mos"));
        assert_ne!(content_hash(b"mos"), content_hash(b"basic"));
    }
}
