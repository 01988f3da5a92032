//! WD1770-compatible floppy disc controller: the command/status/track/
//! sector/data register set, the Type I-IV command state machine, and a
//! small trait for the physical disc backend so the controller logic
//! never has to know how a track's bytes are actually stored.

pub const STATUS_BUSY: u8 = 0x01;
pub const STATUS_INDEX_OR_DRQ: u8 = 0x02;
pub const STATUS_TRACK0_OR_LOST_DATA: u8 = 0x04;
pub const STATUS_CRC_ERROR: u8 = 0x08;
pub const STATUS_SEEK_ERROR_OR_NOT_FOUND: u8 = 0x10;
pub const STATUS_HEAD_LOADED_OR_RECORD_TYPE: u8 = 0x20;
pub const STATUS_WRITE_PROTECT: u8 = 0x40;
pub const STATUS_MOTOR_ON: u8 = 0x80;

/// One physical (or image-backed) disc surface, addressed by the
/// controller in terms of the drive's own track/head/sector geometry.
pub trait DiscInterface {
    fn is_track0(&self) -> bool;
    fn step_in(&mut self);
    fn step_out(&mut self);
    fn current_track(&self) -> u8;
    fn spin_up(&mut self);
    fn spin_down(&mut self);
    fn is_spinning(&mut self) -> bool;
    fn is_write_protected(&self) -> bool;

    /// Sector geometry for the given logical sector number on the current
    /// track/side, or `None` if no such sector exists (sector-not-found).
    fn sector_details(&self, side: u8, sector: u8) -> Option<SectorDetails>;
    fn read_byte(&mut self, side: u8, track: u8, sector: u8, offset: usize) -> Option<u8>;
    fn write_byte(&mut self, side: u8, track: u8, sector: u8, offset: usize, value: u8) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorDetails {
    pub track: u8,
    pub side: u8,
    pub sector: u8,
    pub length: usize,
}

/// A flat, sector-addressable disc image: `sectors_per_track` sectors of
/// `sector_size` bytes each, single-sided, laid out track-major. Matches
/// the common BBC `.ssd`/`.dsd` single/double-sided raw image layout.
pub struct DirectAccessDisc {
    data: Vec<u8>,
    sectors_per_track: u8,
    sector_size: usize,
    tracks: u8,
    sides: u8,
    write_protected: bool,
    track: u8,
    motor_running: bool,
}

impl DirectAccessDisc {
    pub fn new(data: Vec<u8>, sectors_per_track: u8, sector_size: usize, sides: u8) -> Self {
        let bytes_per_side_track = sectors_per_track as usize * sector_size;
        let tracks = if bytes_per_side_track == 0 {
            0
        } else {
            (data.len() / sides.max(1) as usize / bytes_per_side_track) as u8
        };
        Self {
            data,
            sectors_per_track,
            sector_size,
            tracks,
            sides,
            write_protected: false,
            track: 0,
            motor_running: false,
        }
    }

    fn offset(&self, side: u8, track: u8, sector: u8) -> Option<usize> {
        if sector >= self.sectors_per_track || side >= self.sides {
            return None;
        }
        let side_stride = self.tracks as usize * self.sectors_per_track as usize * self.sector_size;
        let track_offset = track as usize * self.sectors_per_track as usize * self.sector_size;
        let sector_offset = sector as usize * self.sector_size;
        Some(side as usize * side_stride + track_offset + sector_offset)
    }

    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }
}

impl DiscInterface for DirectAccessDisc {
    fn is_track0(&self) -> bool {
        self.track == 0
    }

    fn step_in(&mut self) {
        if self.track < self.tracks.saturating_sub(1) {
            self.track += 1;
        }
    }

    fn step_out(&mut self) {
        self.track = self.track.saturating_sub(1);
    }

    fn current_track(&self) -> u8 {
        self.track
    }

    fn spin_up(&mut self) {
        self.motor_running = true;
    }

    fn spin_down(&mut self) {
        self.motor_running = false;
    }

    fn is_spinning(&mut self) -> bool {
        self.motor_running
    }

    fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    fn sector_details(&self, side: u8, sector: u8) -> Option<SectorDetails> {
        if sector >= self.sectors_per_track {
            return None;
        }
        Some(SectorDetails {
            track: self.track,
            side,
            sector,
            length: self.sector_size,
        })
    }

    fn read_byte(&mut self, side: u8, track: u8, sector: u8, offset: usize) -> Option<u8> {
        let base = self.offset(side, track, sector)?;
        self.data.get(base + offset).copied()
    }

    fn write_byte(&mut self, side: u8, track: u8, sector: u8, offset: usize, value: u8) -> bool {
        if self.write_protected {
            return false;
        }
        if let Some(base) = self.offset(side, track, sector) {
            if let Some(slot) = self.data.get_mut(base + offset) {
                *slot = value;
                return true;
            }
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    TypeISettle { steps_remaining: u8, step_in: bool, update_track: bool, verify: bool },
    ReadSectorWait { side: u8 },
    ReadSectorTransfer { side: u8, index: usize, length: usize },
    WriteSectorWait { side: u8 },
    WriteSectorTransfer { side: u8, index: usize, length: usize },
    ReadAddressTransfer { index: usize },
}

pub struct Wd1770 {
    pub command: u8,
    pub status: u8,
    pub track: u8,
    pub sector: u8,
    pub data: u8,

    side: u8,
    phase: Phase,
    settle_delay: u8,
    id_field: [u8; 6],
}

impl Wd1770 {
    pub fn new() -> Self {
        Self {
            command: 0,
            status: 0,
            track: 0,
            sector: 0,
            data: 0,
            side: 0,
            phase: Phase::Idle,
            settle_delay: 0,
            id_field: [0; 6],
        }
    }

    pub fn set_side(&mut self, side: u8) {
        self.side = side;
    }

    /// Register read at the controller's four addressable locations
    /// (offset 0..=3: status, track, sector, data).
    pub fn read(&mut self, offset: u8, disc: &mut dyn DiscInterface) -> u8 {
        match offset & 0x03 {
            0 => {
                self.status &= !STATUS_INDEX_OR_DRQ;
                self.status
            }
            1 => self.track,
            2 => self.sector,
            3 => {
                self.status &= !STATUS_INDEX_OR_DRQ;
                let value = self.data;
                self.advance_read(disc);
                value
            }
            _ => unreachable!(),
        }
    }

    pub fn write(&mut self, offset: u8, value: u8, disc: &mut dyn DiscInterface) {
        match offset & 0x03 {
            0 => self.execute(value, disc),
            1 => self.track = value,
            2 => self.sector = value,
            3 => {
                self.data = value;
                self.status &= !STATUS_INDEX_OR_DRQ;
                self.advance_write(disc);
            }
            _ => unreachable!(),
        }
    }

    pub fn data_request(&self) -> bool {
        self.status & STATUS_INDEX_OR_DRQ != 0
    }

    pub fn interrupt_request(&self) -> bool {
        matches!(self.phase, Phase::Idle) && self.status & STATUS_BUSY == 0 && self.command != 0
    }

    fn execute(&mut self, command: u8, disc: &mut dyn DiscInterface) {
        self.command = command;
        self.status &= !(STATUS_CRC_ERROR | STATUS_SEEK_ERROR_OR_NOT_FOUND);
        self.status |= STATUS_BUSY;

        match command >> 4 {
            0x0 => self.start_restore(disc),
            0x1 => self.start_seek(disc),
            0x2 | 0x3 => self.start_step(command, disc, None),
            0x4 | 0x5 => self.start_step(command, disc, Some(true)),
            0x6 | 0x7 => self.start_step(command, disc, Some(false)),
            0x8 | 0x9 => self.start_read_sector(command, disc),
            0xA | 0xB => self.start_write_sector(command, disc),
            0xC => self.start_read_address(disc),
            0xD => self.force_interrupt(),
            0xE => self.start_read_track(disc),
            0xF => self.start_write_track(disc),
            _ => unreachable!(),
        }
    }

    fn start_restore(&mut self, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        while !disc.is_track0() {
            disc.step_out();
        }
        self.track = 0;
        self.finish_type_i(disc);
    }

    fn start_seek(&mut self, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        while disc.current_track() < self.data {
            disc.step_in();
        }
        while disc.current_track() > self.data {
            disc.step_out();
        }
        self.track = disc.current_track();
        self.finish_type_i(disc);
    }

    fn start_step(&mut self, command: u8, disc: &mut dyn DiscInterface, direction: Option<bool>) {
        disc.spin_up();
        let step_in = match direction {
            Some(d) => d,
            None => command & 0x20 != 0, // step (no direction change) reuses last direction; default in
        };
        let update_track = command & 0x10 != 0;
        if step_in {
            disc.step_in();
        } else {
            disc.step_out();
        }
        if update_track {
            self.track = disc.current_track();
        }
        self.finish_type_i(disc);
    }

    fn finish_type_i(&mut self, disc: &mut dyn DiscInterface) {
        self.status = STATUS_MOTOR_ON | STATUS_HEAD_LOADED_OR_RECORD_TYPE;
        if disc.is_track0() {
            self.status |= STATUS_TRACK0_OR_LOST_DATA;
        }
        if disc.is_write_protected() {
            self.status |= STATUS_WRITE_PROTECT;
        }
        self.phase = Phase::Idle;
    }

    fn start_read_sector(&mut self, _command: u8, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        if disc.sector_details(self.side, self.sector).is_none() {
            self.status = STATUS_SEEK_ERROR_OR_NOT_FOUND;
            self.phase = Phase::Idle;
            return;
        }
        self.phase = Phase::ReadSectorWait { side: self.side };
        self.poll_read(disc);
    }

    fn start_write_sector(&mut self, _command: u8, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        if disc.is_write_protected() {
            self.status = STATUS_WRITE_PROTECT;
            self.phase = Phase::Idle;
            return;
        }
        match disc.sector_details(self.side, self.sector) {
            Some(details) => {
                self.phase = Phase::WriteSectorWait { side: self.side };
                self.status = STATUS_BUSY | STATUS_INDEX_OR_DRQ;
                let _ = details;
            }
            None => {
                self.status = STATUS_SEEK_ERROR_OR_NOT_FOUND;
                self.phase = Phase::Idle;
            }
        }
    }

    fn start_read_address(&mut self, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        self.id_field = [
            disc.current_track(),
            self.side,
            self.sector,
            1,
            0,
            0,
        ];
        self.sector = self.id_field[0];
        self.phase = Phase::ReadAddressTransfer { index: 0 };
        self.status = STATUS_BUSY | STATUS_INDEX_OR_DRQ;
        self.data = self.id_field[0];
    }

    fn start_read_track(&mut self, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        self.status = STATUS_BUSY;
        self.phase = Phase::Idle;
    }

    fn start_write_track(&mut self, disc: &mut dyn DiscInterface) {
        disc.spin_up();
        if disc.is_write_protected() {
            self.status = STATUS_WRITE_PROTECT;
        } else {
            self.status = STATUS_BUSY;
        }
        self.phase = Phase::Idle;
    }

    fn force_interrupt(&mut self) {
        self.status &= !STATUS_BUSY;
        self.phase = Phase::Idle;
    }

    fn poll_read(&mut self, disc: &mut dyn DiscInterface) {
        if let Phase::ReadSectorWait { side } = self.phase {
            let track = disc.current_track();
            if let Some(details) = disc.sector_details(side, self.sector) {
                if let Some(byte) = disc.read_byte(side, track, self.sector, 0) {
                    self.data = byte;
                    self.status = STATUS_BUSY | STATUS_INDEX_OR_DRQ;
                    self.phase = Phase::ReadSectorTransfer {
                        side,
                        index: 1,
                        length: details.length,
                    };
                    return;
                }
            }
            self.status = STATUS_SEEK_ERROR_OR_NOT_FOUND;
            self.phase = Phase::Idle;
        }
    }

    fn advance_read(&mut self, disc: &mut dyn DiscInterface) {
        if let Phase::ReadSectorTransfer { side, index, length } = self.phase {
            let track = disc.current_track();
            if index >= length {
                self.status &= !(STATUS_BUSY | STATUS_INDEX_OR_DRQ);
                self.phase = Phase::Idle;
                return;
            }
            match disc.read_byte(side, track, self.sector, index) {
                Some(byte) => {
                    self.data = byte;
                    self.status |= STATUS_INDEX_OR_DRQ;
                    self.phase = Phase::ReadSectorTransfer {
                        side,
                        index: index + 1,
                        length,
                    };
                }
                None => {
                    self.status = STATUS_BUSY | STATUS_CRC_ERROR;
                    self.phase = Phase::Idle;
                }
            }
        } else if let Phase::ReadAddressTransfer { index } = self.phase {
            if index + 1 >= self.id_field.len() {
                self.status &= !(STATUS_BUSY | STATUS_INDEX_OR_DRQ);
                self.phase = Phase::Idle;
            } else {
                let next = index + 1;
                self.data = self.id_field[next];
                self.status |= STATUS_INDEX_OR_DRQ;
                self.phase = Phase::ReadAddressTransfer { index: next };
            }
        }
    }

    fn advance_write(&mut self, disc: &mut dyn DiscInterface) {
        if let Phase::WriteSectorWait { side } = self.phase {
            let track = disc.current_track();
            let length = disc
                .sector_details(side, self.sector)
                .map(|d| d.length)
                .unwrap_or(256);
            disc.write_byte(side, track, self.sector, 0, self.data);
            self.phase = Phase::WriteSectorTransfer {
                side,
                index: 1,
                length,
            };
            self.status = STATUS_BUSY | STATUS_INDEX_OR_DRQ;
        } else if let Phase::WriteSectorTransfer { side, index, length } = self.phase {
            let track = disc.current_track();
            if index >= length {
                self.status &= !(STATUS_BUSY | STATUS_INDEX_OR_DRQ);
                self.phase = Phase::Idle;
                return;
            }
            disc.write_byte(side, track, self.sector, index, self.data);
            self.status = STATUS_BUSY | STATUS_INDEX_OR_DRQ;
            self.phase = Phase::WriteSectorTransfer {
                side,
                index: index + 1,
                length,
            };
        }
    }

    /// Encode the controller's registers and in-flight command phase, for
    /// inclusion in a whole-machine snapshot. The disc image itself is not
    /// part of this blob; it is restored separately by content hash.
    pub fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.push(self.command);
        out.push(self.status);
        out.push(self.track);
        out.push(self.sector);
        out.push(self.data);
        out.push(self.side);
        out.push(self.settle_delay);
        out.extend_from_slice(&self.id_field);
        match self.phase {
            Phase::Idle => out.push(0),
            Phase::TypeISettle { steps_remaining, step_in, update_track, verify } => {
                out.push(1);
                out.push(steps_remaining);
                out.push(step_in as u8);
                out.push(update_track as u8);
                out.push(verify as u8);
            }
            Phase::ReadSectorWait { side } => {
                out.push(2);
                out.push(side);
            }
            Phase::ReadSectorTransfer { side, index, length } => {
                out.push(3);
                out.push(side);
                out.extend_from_slice(&(index as u32).to_le_bytes());
                out.extend_from_slice(&(length as u32).to_le_bytes());
            }
            Phase::WriteSectorWait { side } => {
                out.push(4);
                out.push(side);
            }
            Phase::WriteSectorTransfer { side, index, length } => {
                out.push(5);
                out.push(side);
                out.extend_from_slice(&(index as u32).to_le_bytes());
                out.extend_from_slice(&(length as u32).to_le_bytes());
            }
            Phase::ReadAddressTransfer { index } => {
                out.push(6);
                out.extend_from_slice(&(index as u32).to_le_bytes());
            }
        }
        out
    }

    pub fn load_state(&mut self, bytes: &[u8]) {
        let mut r = crate::snapshot::ByteReader::new(bytes);
        self.command = r.u8();
        self.status = r.u8();
        self.track = r.u8();
        self.sector = r.u8();
        self.data = r.u8();
        self.side = r.u8();
        self.settle_delay = r.u8();
        for slot in self.id_field.iter_mut() {
            *slot = r.u8();
        }
        self.phase = match r.u8() {
            1 => Phase::TypeISettle {
                steps_remaining: r.u8(),
                step_in: r.bool(),
                update_track: r.bool(),
                verify: r.bool(),
            },
            2 => Phase::ReadSectorWait { side: r.u8() },
            3 => Phase::ReadSectorTransfer {
                side: r.u8(),
                index: r.u32() as usize,
                length: r.u32() as usize,
            },
            4 => Phase::WriteSectorWait { side: r.u8() },
            5 => Phase::WriteSectorTransfer {
                side: r.u8(),
                index: r.u32() as usize,
                length: r.u32() as usize,
            },
            6 => Phase::ReadAddressTransfer { index: r.u32() as usize },
            _ => Phase::Idle,
        };
    }
}

impl Default for Wd1770 {
    fn default() -> Self {
        Self::new()
    }
}
