//! Keyboard scanning matrix. The system VIA drives a row (or "scan all
//! rows") onto port A and reads back which keys in that row/column are
//! down; an unscanned key transition raises the CA2-wired keyboard IRQ.

pub const NUM_ROWS: usize = 8;
pub const NUM_COLUMNS: usize = 10;

pub struct Keyboard {
    matrix: [[bool; NUM_COLUMNS]; NUM_ROWS],
    /// When true, VIA port A is driven from the AND of all rows rather
    /// than a single selected one ("scan all keys" autoscan mode).
    autoscan: bool,
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            matrix: [[false; NUM_COLUMNS]; NUM_ROWS],
            autoscan: false,
        }
    }

    pub fn set_key(&mut self, row: u8, column: u8, pressed: bool) {
        if (row as usize) < NUM_ROWS && (column as usize) < NUM_COLUMNS {
            self.matrix[row as usize][column as usize] = pressed;
        }
    }

    pub fn is_key_down(&self, row: u8, column: u8) -> bool {
        self.matrix
            .get(row as usize)
            .and_then(|r| r.get(column as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn set_autoscan(&mut self, autoscan: bool) {
        self.autoscan = autoscan;
    }

    /// Read the column bits of the given row as seen on port A (bit 0 =
    /// column 0). Column 0 of every row is wired to the keyboard's own
    /// "any key down" logic by the real hardware; that's handled by
    /// [`Keyboard::any_unscanned_key_down`], not here.
    pub fn scan_row(&self, row: u8) -> u8 {
        if self.autoscan {
            let mut result = 0u8;
            for r in 0..NUM_ROWS {
                let mut bits = 0u8;
                for c in 0..NUM_COLUMNS.min(8) {
                    if self.matrix[r][c] {
                        bits |= 1 << c;
                    }
                }
                result |= bits;
            }
            return result;
        }
        let mut bits = 0u8;
        if let Some(cols) = self.matrix.get(row as usize) {
            for (c, &down) in cols.iter().take(8).enumerate() {
                if down {
                    bits |= 1 << c;
                }
            }
        }
        bits
    }

    /// True if any key in rows 1..=7 (the rows that can assert the
    /// keyboard interrupt; row 0 holds modifier-only keys on the BBC
    /// matrix) is currently down. Used to drive the system VIA's CA2
    /// keyboard-IRQ input.
    pub fn any_unscanned_key_down(&self) -> bool {
        self.matrix[1..].iter().flatten().any(|&down| down)
    }

    /// Encode every matrix position plus the autoscan flag, for inclusion
    /// in a whole-machine snapshot.
    pub fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NUM_ROWS * NUM_COLUMNS / 8 + 2);
        for row in &self.matrix {
            for &down in row {
                out.push(down as u8);
            }
        }
        out.push(self.autoscan as u8);
        out
    }

    pub fn load_state(&mut self, bytes: &[u8]) {
        let mut r = crate::snapshot::ByteReader::new(bytes);
        for row in self.matrix.iter_mut() {
            for cell in row.iter_mut() {
                *cell = r.bool();
            }
        }
        self.autoscan = r.bool();
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}
