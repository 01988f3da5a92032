//! 6845-compatible CRTC: horizontal/vertical timing, sync, cursor and
//! address generation. One [`tick`](Crtc6845::tick) advances by one
//! character clock and produces one [`CrtcOutput`].

use super::CrtcOutput;

/// Guard against misprogrammed CRTC values causing an unbounded frame.
const MAX_NUM_SCANNED_LINES: u16 = 500;

pub struct Crtc6845 {
    registers: [u8; 18],
    selected: u8,

    column: u16,
    raster: u8,
    row: u8,
    /// >= 0 while in the vertical-adjust phase: remaining adjust scanlines.
    adjust_remaining: i16,

    hsync_remaining: u8,
    vsync_remaining: u8,

    address: u16,
    line_start_address: u16,
    frame_start_address: u16,

    odd_field: bool,
    scanned_lines: u16,
    frame_counter: u32,
}

impl Crtc6845 {
    pub fn new() -> Self {
        Self {
            registers: [0; 18],
            selected: 0,
            column: 0,
            raster: 0,
            row: 0,
            adjust_remaining: -1,
            hsync_remaining: 0,
            vsync_remaining: 0,
            address: 0,
            line_start_address: 0,
            frame_start_address: 0,
            odd_field: false,
            scanned_lines: 0,
            frame_counter: 0,
        }
    }

    pub fn select(&mut self, value: u8) {
        self.selected = value & 0x1F;
    }

    pub fn write_data(&mut self, value: u8) {
        let r = self.selected as usize;
        if r < 16 {
            self.registers[r] = value;
            if r == 12 || r == 13 {
                self.frame_start_address = self.display_start_address();
            }
        }
    }

    pub fn read_data(&self) -> u8 {
        match self.selected {
            14 => (self.cursor_address() >> 8) as u8,
            15 => self.cursor_address() as u8,
            16 => (self.light_pen_address() >> 8) as u8,
            17 => self.light_pen_address() as u8,
            // Most CRTC registers are write-only; reads return open bus.
            _ => 0xFF,
        }
    }

    fn reg(&self, n: usize) -> u8 {
        self.registers[n]
    }

    fn display_start_address(&self) -> u16 {
        (((self.reg(12) as u16) & 0x3F) << 8) | self.reg(13) as u16
    }

    fn cursor_address(&self) -> u16 {
        (((self.reg(14) as u16) & 0x3F) << 8) | self.reg(15) as u16
    }

    fn light_pen_address(&self) -> u16 {
        0
    }

    fn cursor_visible(&self) -> bool {
        if self.address != self.cursor_address() {
            return false;
        }
        let start = self.reg(10) & 0x1F;
        let end = self.reg(11) & 0x1F;
        if self.raster < start || self.raster > end {
            return false;
        }
        match (self.reg(10) >> 5) & 0x03 {
            0 => true,
            1 => false,
            2 => (self.frame_counter / 16) % 2 == 0,
            _ => (self.frame_counter / 32) % 2 == 0,
        }
    }

    /// Advance one character clock; returns the sample for this clock.
    pub fn tick(&mut self) -> CrtcOutput {
        let total_h = self.reg(0) as u16;
        let displayed_h = self.reg(1) as u16;
        let sync_pos_h = self.reg(2) as u16;
        let sync_width_h = self.reg(3) & 0x0F;
        let vsync_width = {
            let w = (self.reg(3) >> 4) & 0x0F;
            if w == 0 { 16 } else { w }
        };
        let total_v = self.reg(4) & 0x7F;
        let total_adjust = self.reg(5);
        let displayed_v = self.reg(6) & 0x7F;
        let sync_pos_v = self.reg(7) & 0x7F;
        let max_raster = self.reg(9) & 0x1F;

        let disp_h = self.column < displayed_h;
        let disp_v = self.adjust_remaining < 0 && self.row < displayed_v;
        let display = disp_h && disp_v;

        if display {
            self.address = self.line_start_address.wrapping_add(self.column) & 0x3FFF;
        }

        if self.column == sync_pos_h && self.hsync_remaining == 0 {
            self.hsync_remaining = sync_width_h.max(1);
        }
        if self.row == sync_pos_v
            && self.raster == 0
            && self.vsync_remaining == 0
            && self.adjust_remaining < 0
        {
            self.vsync_remaining = vsync_width;
        }

        let out = CrtcOutput {
            hsync: self.hsync_remaining > 0,
            vsync: self.vsync_remaining > 0,
            display,
            cudisp: display && self.cursor_visible(),
            odd_frame: self.odd_field,
            address: self.address,
            raster: self.raster,
        };

        if self.hsync_remaining > 0 {
            self.hsync_remaining -= 1;
        }

        self.column += 1;
        if self.column > total_h {
            self.column = 0;
            self.end_of_line(max_raster, total_v, total_adjust, displayed_h);
        }

        out
    }

    fn end_of_line(&mut self, max_raster: u8, total_v: u8, total_adjust: u8, displayed_h: u16) {
        self.scanned_lines += 1;
        if self.vsync_remaining > 0 {
            self.vsync_remaining -= 1;
        }

        if self.adjust_remaining >= 0 {
            self.adjust_remaining -= 1;
            if self.adjust_remaining < 0 {
                self.start_of_frame();
                return;
            }
        } else {
            self.raster += 1;
            if self.raster > max_raster {
                self.raster = 0;
                self.row = (self.row + 1) & 0x7F;
                self.line_start_address =
                    self.line_start_address.wrapping_add(displayed_h) & 0x3FFF;
                if self.row > total_v {
                    self.row = 0;
                    if total_adjust > 0 {
                        self.adjust_remaining = total_adjust as i16;
                    } else {
                        self.start_of_frame();
                        return;
                    }
                }
            }
        }

        if self.scanned_lines > MAX_NUM_SCANNED_LINES {
            self.start_of_frame();
        }
    }

    fn start_of_frame(&mut self) {
        self.row = 0;
        self.raster = 0;
        self.adjust_remaining = -1;
        self.scanned_lines = 0;
        self.line_start_address = self.frame_start_address;
        self.odd_field = !self.odd_field;
        self.frame_counter = self.frame_counter.wrapping_add(1);
    }

    /// Encode the register file and timing counters, for inclusion in a
    /// whole-machine snapshot.
    pub fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40);
        out.extend_from_slice(&self.registers);
        out.push(self.selected);
        out.extend_from_slice(&self.column.to_le_bytes());
        out.push(self.raster);
        out.push(self.row);
        out.extend_from_slice(&self.adjust_remaining.to_le_bytes());
        out.push(self.hsync_remaining);
        out.push(self.vsync_remaining);
        out.extend_from_slice(&self.address.to_le_bytes());
        out.extend_from_slice(&self.line_start_address.to_le_bytes());
        out.extend_from_slice(&self.frame_start_address.to_le_bytes());
        out.push(self.odd_field as u8);
        out.extend_from_slice(&self.scanned_lines.to_le_bytes());
        out.extend_from_slice(&self.frame_counter.to_le_bytes());
        out
    }

    pub fn load_state(&mut self, bytes: &[u8]) {
        let mut r = crate::snapshot::ByteReader::new(bytes);
        for slot in self.registers.iter_mut() {
            *slot = r.u8();
        }
        self.selected = r.u8();
        self.column = r.u16();
        self.raster = r.u8();
        self.row = r.u8();
        self.adjust_remaining = r.i16();
        self.hsync_remaining = r.u8();
        self.vsync_remaining = r.u8();
        self.address = r.u16();
        self.line_start_address = r.u16();
        self.frame_start_address = r.u16();
        self.odd_field = r.bool();
        self.scanned_lines = r.u16();
        self.frame_counter = r.u32();
    }
}

impl Default for Crtc6845 {
    fn default() -> Self {
        Self::new()
    }
}
