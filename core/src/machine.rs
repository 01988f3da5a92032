//! `BbcMicro`: the top-level machine. Owns every peripheral, the paging
//! engine, and the arena they all index into; implements [`Bus`] (so the
//! CPU can run against it) and [`Machine`] (so a frontend can run it
//! without knowing any of the above).
//!
//! Addresses in the `$FC00`-`$FEFF` "SHEILA/FRED/JIM" window are decoded
//! by [`BbcMicro::mmio_read`]/[`mmio_write`] against a fixed sub-map; the
//! distilled spec names the page but not its exact layout, so the exact
//! offsets below (CRTC at `$FE00`, VIA registers at `$FE40`/`$FE60`, etc)
//! are this implementation's own choice, matching a real Model B/B+/
//! Master memory map closely enough to run real MOS code against it.

use crate::adc::Adc;
use crate::core::bus::{Bus, BusMaster, InterruptState};
use crate::core::component::{BusMasterComponent, Component};
use crate::core::machine::{InputButton, Machine};
use crate::cpu::m6502::CpuVariant;
use crate::cpu::{Cpu, M6502};
use crate::error::MessageRejection;
use crate::floppy::{DirectAccessDisc, DiscInterface, Wd1770};
use crate::keyboard::Keyboard;
use crate::message::{Message, MessageQueue};
use crate::paging::engine::{MachineModel, PagingEngine, PagingState, PagingTables, SidewaysSlotInit};
use crate::paging::{BigPageArena, BigPageIndex, RomType};
use crate::ringbuf::RingBuffer;
use crate::rtc::Rtc146818;
use crate::sound::{Sn76489, SoundUnit};
use crate::timeline::{ActionPayload, Mode as TimelineMode, Timeline};
use crate::trace::{TraceEvent, TraceLog};
use crate::via::Via6522;
use crate::video::{Crtc6845, Teletext, TvDecoder, VideoUla, VideoUnit};

const RUN_CYCLES_PER_ITERATION: u64 = 2_000; // ~1 ms of emulated time at 2 MHz
const SNAPSHOT_INTERVAL_CYCLES: u64 = 4_000_000; // roughly every two seconds at 2 MHz

const LATCH_SOUND_WRITE: u8 = 0;
const LATCH_SCREEN_BASE_0: u8 = 3;
const LATCH_SCREEN_BASE_1: u8 = 4;
const LATCH_CAPS_LOCK: u8 = 5;
const LATCH_SHIFT_LOCK: u8 = 6;

// Tags identifying each blob in `Snapshot::peripheral_states`.
const PSTATE_SYSTEM_VIA: u8 = 1;
const PSTATE_USER_VIA: u8 = 2;
const PSTATE_SOUND: u8 = 3;
const PSTATE_FLOPPY: u8 = 4;
const PSTATE_RTC: u8 = 5;
const PSTATE_KEYBOARD: u8 = 6;
const PSTATE_ADC: u8 = 7;
const PSTATE_CRTC: u8 = 8;
const PSTATE_ULA: u8 = 9;
const PSTATE_TELETEXT: u8 = 10;
const PSTATE_MISC: u8 = 11;

pub struct MachineConfig<'a> {
    pub model: MachineModel,
    pub mos_rom: &'a [u8],
    pub sideways: [Option<SidewaysRomConfig<'a>>; 16],
}

pub struct SidewaysRomConfig<'a> {
    pub rom_type: RomType,
    pub image: &'a [u8],
    pub writable: bool,
}

pub struct BbcMicro {
    model: MachineModel,

    cpu: M6502,
    arena: BigPageArena,
    paging: PagingEngine,
    paging_state: PagingState,
    tables: PagingTables,
    /// Which table applied to the instruction currently executing, set at
    /// each fetch boundary from the about-to-be-fetched PC's region. See
    /// DESIGN.md: this is a simplification of "which table a given bus
    /// transaction uses" down to "which table the owning instruction uses".
    executing_in_mos: bool,

    crtc: Crtc6845,
    ula: VideoUla,
    teletext: Teletext,
    tv: TvDecoder,
    last_raster: u8,
    last_vsync: bool,

    system_via: Via6522,
    user_via: Via6522,
    addressable_latch: u8,
    sound_we_prev: bool,

    sound: Sn76489,
    sound_divider: u8,

    floppy: Wd1770,
    discs: [DirectAccessDisc; 2],
    selected_drive: usize,

    rtc: Option<Rtc146818>,
    keyboard: Keyboard,
    adc: Option<Adc>,

    cycle_counter: u64,

    last_system_irq: bool,
    last_user_irq: bool,

    video_ring: RingBuffer<VideoUnit>,
    sound_ring: RingBuffer<SoundUnit>,

    message_queue: MessageQueue,
    timeline: Timeline,
    trace: TraceLog,
    /// Most recently encoded `SaveState` result, for the host to collect
    /// via [`BbcMicro::take_saved_state`]; the completion callback alone
    /// has no channel to carry the bytes back.
    last_saved_state: Option<Vec<u8>>,

    inputs: Vec<InputButton>,
}

impl BbcMicro {
    pub fn new(config: MachineConfig) -> Self {
        let mut arena = BigPageArena::new();
        let sideways_init: [Option<SidewaysSlotInit>; 16] = std::array::from_fn(|i| {
            config.sideways[i].as_ref().map(|s| SidewaysSlotInit {
                rom_type: s.rom_type,
                image: s.image,
                writable: s.writable,
            })
        });
        let paging = PagingEngine::new(config.model, &mut arena, config.mos_rom, &sideways_init);
        let paging_state = PagingState::default();
        let tables = paging.rebuild(&paging_state);

        let adc = match config.model {
            MachineModel::MasterCompact => None,
            _ => Some(Adc::new()),
        };
        let rtc = match config.model {
            MachineModel::Master128 | MachineModel::MasterCompact => Some(Rtc146818::new()),
            _ => None,
        };

        let mut cpu = M6502::new();
        // The Master 128 and Master Compact shipped a 65C02; the Model B
        // and B+ shipped an NMOS 6502/6502A.
        cpu.set_variant(match config.model {
            MachineModel::Master128 | MachineModel::MasterCompact => CpuVariant::Cmos,
            MachineModel::ModelB | MachineModel::BPlus => CpuVariant::NmosUndocumented,
        });

        Self {
            model: config.model,
            cpu,
            arena,
            paging,
            paging_state,
            tables,
            executing_in_mos: true,
            crtc: Crtc6845::new(),
            ula: VideoUla::new(),
            teletext: Teletext::new(),
            tv: TvDecoder::new(),
            last_raster: 0,
            last_vsync: false,
            system_via: Via6522::new(),
            user_via: Via6522::new(),
            addressable_latch: 0,
            sound_we_prev: true,
            sound: Sn76489::new(),
            sound_divider: 0,
            floppy: Wd1770::new(),
            discs: [empty_disc(), empty_disc()],
            selected_drive: 0,
            rtc,
            keyboard: Keyboard::new(),
            adc,
            cycle_counter: 0,
            last_system_irq: false,
            last_user_irq: false,
            video_ring: RingBuffer::new(16384),
            sound_ring: RingBuffer::new(4096),
            message_queue: MessageQueue::new(),
            timeline: Timeline::new(SNAPSHOT_INTERVAL_CYCLES),
            trace: TraceLog::new(1 << 20),
            last_saved_state: None,
            inputs: default_input_map(),
        }
    }

    pub fn submit(&mut self, message: Message) {
        self.message_queue.submit(message);
    }

    pub fn insert_disc(&mut self, drive: usize, image: Vec<u8>) {
        if let Some(slot) = self.discs.get_mut(drive) {
            *slot = DirectAccessDisc::new(image, 10, 256, 1);
        }
    }

    pub fn eject_disc(&mut self, drive: usize) {
        if let Some(slot) = self.discs.get_mut(drive) {
            *slot = empty_disc();
        }
    }

    pub fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }

    /// Take the encoded snapshot produced by the most recent `SaveState`
    /// message, if one hasn't already been collected.
    pub fn take_saved_state(&mut self) -> Option<Vec<u8>> {
        self.last_saved_state.take()
    }

    fn rebuild_tables(&mut self) {
        self.tables = self.paging.rebuild(&self.paging_state);
    }

    fn table(&self) -> &[BigPageIndex; 16] {
        if self.executing_in_mos {
            &self.tables.mos
        } else {
            &self.tables.user
        }
    }

    fn read_mem(&mut self, addr: u16) -> u8 {
        if self.tables.sheila_is_mmio && (0xFC00..=0xFEFF).contains(&addr) {
            return self.mmio_read(addr);
        }
        let big_page = (addr >> 12) as usize;
        let idx = self.table()[big_page];
        self.arena.read(idx, addr as usize & 0xFFF)
    }

    fn write_mem(&mut self, addr: u16, value: u8) {
        if self.tables.sheila_is_mmio && (0xFC00..=0xFEFF).contains(&addr) {
            self.mmio_write(addr, value);
            return;
        }
        let big_page = (addr >> 12) as usize;
        let idx = self.table()[big_page];
        self.arena.write(idx, addr as usize & 0xFFF, value);
    }

    fn mmio_read(&mut self, addr: u16) -> u8 {
        match addr {
            0xFE00..=0xFE07 => {
                if addr & 1 == 0 {
                    0xFF // CRTC address register is write-only
                } else {
                    self.crtc.read_data()
                }
            }
            0xFE20..=0xFE2F => 0xFE, // video ULA is write-only
            0xFE30..=0xFE33 => self.paging_state.romsel,
            0xFE34..=0xFE37 if self.model != MachineModel::ModelB => self.paging_state.acccon,
            0xFE40..=0xFE5F => self.system_via.read((addr & 0x0F) as u8),
            0xFE60..=0xFE7F => self.user_via.read((addr & 0x0F) as u8),
            0xFE80..=0xFE83 => {
                let idx = self.selected_drive.min(1);
                self.floppy.read((addr & 0x03) as u8, &mut self.discs[idx])
            }
            0xFE84 => 0xFF,
            // The ADC and RTC shared the $FEC0-$FEC3 page on real Master
            // hardware by never appearing on the same model; this
            // implementation runs them both so it gives each a disjoint
            // slot instead (see DESIGN.md).
            0xFEC0 if self.adc.is_some() => self.adc.as_ref().unwrap().status(),
            0xFEC2 if self.adc.is_some() => self.adc.as_ref().unwrap().high_byte(),
            0xFEC3 if self.adc.is_some() => self.adc.as_ref().unwrap().low_byte(),
            0xFEC5 => self.rtc.as_ref().map(|r| r.read()).unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    fn mmio_write(&mut self, addr: u16, value: u8) {
        match addr {
            0xFE00..=0xFE07 => {
                if addr & 1 == 0 {
                    self.crtc.select(value);
                } else {
                    self.crtc.write_data(value);
                }
            }
            0xFE20..=0xFE2F => {
                if addr & 1 == 0 {
                    self.ula.write_control(value);
                } else {
                    self.ula.write_palette(value);
                }
            }
            0xFE30..=0xFE33 => {
                self.paging_state.romsel = value;
                self.rebuild_tables();
            }
            0xFE34..=0xFE37 if self.model != MachineModel::ModelB => {
                self.paging_state.acccon = value;
                self.rebuild_tables();
            }
            0xFE40..=0xFE5F => self.system_via.write((addr & 0x0F) as u8, value),
            0xFE60..=0xFE7F => self.user_via.write((addr & 0x0F) as u8, value),
            0xFE80..=0xFE83 => {
                let offset = (addr & 0x03) as u8;
                let idx = self.selected_drive.min(1);
                self.floppy.write(offset, value, &mut self.discs[idx]);
            }
            0xFE84 => self.selected_drive = (value & 0x01) as usize,
            0xFEC0 if self.adc.is_some() => self.adc.as_mut().unwrap().write_control(value),
            0xFEC4 if self.rtc.is_some() => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.select(value);
                }
            }
            0xFEC5 if self.rtc.is_some() => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write(value);
                }
            }
            _ => {}
        }
    }

    fn step_one_cycle(&mut self) {
        // The CPU drives the bus, and `Self` is the bus: there is no way to
        // hold `&mut self.cpu` and `&mut self as &mut dyn Bus` at once under
        // the borrow checker, so the bus reference is summoned through a
        // raw pointer instead, following the same pattern the single-chip
        // machines use to run a CPU against their own owning struct.
        let bus_ptr: *mut Self = self;
        let instruction_boundary = unsafe {
            let bus = &mut *bus_ptr as &mut dyn Bus<Address = u16, Data = u8>;
            self.cpu.tick_with_bus(bus, BusMaster::Cpu)
        };

        if instruction_boundary {
            self.executing_in_mos = self.cpu.pc >= 0xC000;
        }

        self.step_video();
        self.step_vias();

        self.sound_divider += 1;
        if self.sound_divider >= 16 {
            self.sound_divider = 0;
            let sample = self.sound.tick();
            self.sound_ring.push(sample);
        }

        if let Some(adc) = self.adc.as_mut() {
            adc.tick();
        }

        self.cycle_counter += 1;

        let cycle = self.cycle_counter;
        self.timeline.maybe_snapshot(cycle, || {
            let (ram_buffers, rom_hashes) = capture_ram_and_rom(&self.arena);
            let peripheral_states = capture_peripheral_states(
                &self.system_via,
                &self.user_via,
                &self.sound,
                &self.floppy,
                &self.rtc,
                &self.keyboard,
                &self.adc,
                &self.crtc,
                &self.ula,
                &self.teletext,
                [
                    self.addressable_latch,
                    self.sound_we_prev as u8,
                    self.last_raster,
                    self.last_vsync as u8,
                    self.selected_drive as u8,
                ],
            );
            let mut paging_state = vec![self.paging_state.romsel, self.paging_state.acccon];
            paging_state.extend_from_slice(&self.paging_state.slot_regions);
            std::sync::Arc::new(crate::snapshot::Snapshot {
                machine_type_id: self.model as u8,
                cycle_counter: cycle,
                cpu_registers: vec![
                    self.cpu.a,
                    self.cpu.x,
                    self.cpu.y,
                    self.cpu.sp,
                    self.cpu.p,
                    (self.cpu.pc & 0xFF) as u8,
                    (self.cpu.pc >> 8) as u8,
                ],
                ram_buffers,
                rom_hashes,
                peripheral_states,
                paging_state,
            })
        });
    }

    fn step_video(&mut self) {
        let out = self.crtc.tick();

        if out.raster != self.last_raster && out.raster == 0 {
            self.teletext.start_of_row();
        }
        self.last_raster = out.raster;

        if out.vsync && !self.last_vsync {
            self.teletext.on_field_toggle();
        }
        // CA1 on the system VIA is wired to CRTC VSYNC on real hardware;
        // this is MOS's 50 Hz tick, used for keyboard scanning and the
        // cursor flash, and gates the keyboard-boot sequence (scenario 1).
        self.system_via.set_ca1(out.vsync);
        self.last_vsync = out.vsync;

        let unit = if out.hsync {
            VideoUnit::HSync
        } else if out.vsync {
            VideoUnit::VSync
        } else if out.display {
            let byte = self.read_display_byte(out.address);
            if self.ula.is_teletext() {
                let (fg, bg, data) = self.teletext.process(byte, out.raster);
                VideoUnit::Teletext { fg, bg, data }
            } else {
                self.ula.tick(byte)
            }
        } else {
            return;
        };

        self.tv.consume(unit);
        if self.video_ring.free_space() == 0 {
            self.video_ring.pop();
        }
        self.video_ring.push(unit);
    }

    fn read_display_byte(&self, address: u16) -> u8 {
        // Display memory lives in the bottom 32 KiB, outside SHEILA, so a
        // direct arena read (always via the user table: video fetches are
        // never MOS-privileged) is equivalent to `read_mem` here.
        let big_page = (address >> 12) as usize;
        let idx = self.tables.user[big_page.min(7)];
        self.arena.read(idx, address as usize & 0xFFF)
    }

    fn step_vias(&mut self) {
        let key_pa_out = self.system_via.port_a_output();
        let column = key_pa_out & 0x0F;
        let row = (key_pa_out >> 4) & 0x07;
        let key_down = self.keyboard.is_key_down(row, column);
        self.system_via
            .set_port_a_input(if key_down { 0x80 } else { 0x00 });
        self.system_via.set_ca2(self.keyboard.any_unscanned_key_down());

        let system_irq = self.system_via.tick(false);

        let pb_out = self.system_via.port_b_output();
        let latch_index = pb_out & 0x07;
        let latch_value = pb_out & 0x08 != 0;
        if latch_value {
            self.addressable_latch |= 1 << latch_index;
        } else {
            self.addressable_latch &= !(1 << latch_index);
        }

        let sound_we = self.addressable_latch & (1 << LATCH_SOUND_WRITE) != 0;
        if self.sound_we_prev && !sound_we {
            self.sound.write(key_pa_out);
        }
        self.sound_we_prev = sound_we;

        let user_irq = self.user_via.tick(false);

        self.last_system_irq = system_irq;
        self.last_user_irq = user_irq;
    }

    pub fn caps_lock_led(&self) -> bool {
        self.addressable_latch & (1 << LATCH_CAPS_LOCK) == 0
    }

    pub fn shift_lock_led(&self) -> bool {
        self.addressable_latch & (1 << LATCH_SHIFT_LOCK) == 0
    }

    pub fn screen_base(&self) -> u8 {
        let bit0 = (self.addressable_latch >> LATCH_SCREEN_BASE_0) & 1;
        let bit1 = (self.addressable_latch >> LATCH_SCREEN_BASE_1) & 1;
        bit0 | (bit1 << 1)
    }

    fn reset_vector_fetch(&mut self) {
        let lo = self.read_mem(0xFFFC);
        let hi = self.read_mem(0xFFFD);
        self.cpu.pc = ((hi as u16) << 8) | lo as u16;
    }

    fn capture_snapshot(&self) -> crate::snapshot::SharedSnapshot {
        let (ram_buffers, rom_hashes) = capture_ram_and_rom(&self.arena);
        let peripheral_states = capture_peripheral_states(
            &self.system_via,
            &self.user_via,
            &self.sound,
            &self.floppy,
            &self.rtc,
            &self.keyboard,
            &self.adc,
            &self.crtc,
            &self.ula,
            &self.teletext,
            [
                self.addressable_latch,
                self.sound_we_prev as u8,
                self.last_raster,
                self.last_vsync as u8,
                self.selected_drive as u8,
            ],
        );
        let mut paging_state = vec![self.paging_state.romsel, self.paging_state.acccon];
        paging_state.extend_from_slice(&self.paging_state.slot_regions);
        std::sync::Arc::new(crate::snapshot::Snapshot {
            machine_type_id: self.model as u8,
            cycle_counter: self.cycle_counter,
            cpu_registers: vec![
                self.cpu.a,
                self.cpu.x,
                self.cpu.y,
                self.cpu.sp,
                self.cpu.p,
                (self.cpu.pc & 0xFF) as u8,
                (self.cpu.pc >> 8) as u8,
            ],
            ram_buffers,
            rom_hashes,
            peripheral_states,
            paging_state,
        })
    }

    /// Restore every captured buffer and register back into the running
    /// machine. ROM big pages are left untouched (only their content hash
    /// was captured; the caller is expected to have already configured
    /// this machine with the matching ROM images), so only RAM pages are
    /// written back, in the same order [`capture_ram_and_rom`] iterated
    /// them in.
    fn restore_snapshot(&mut self, snapshot: &crate::snapshot::Snapshot) {
        self.cycle_counter = snapshot.cycle_counter;

        let mut regs = crate::snapshot::ByteReader::new(&snapshot.cpu_registers);
        self.cpu.a = regs.u8();
        self.cpu.x = regs.u8();
        self.cpu.y = regs.u8();
        self.cpu.sp = regs.u8();
        self.cpu.p = regs.u8();
        self.cpu.pc = regs.u16();

        let mut ram_iter = snapshot.ram_buffers.iter();
        for page in self.arena.pages_mut() {
            if !page.is_ram() {
                continue;
            }
            if let Some(bytes) = ram_iter.next() {
                if let Some(buf) = page.raw_mut() {
                    if bytes.len() == buf.len() {
                        buf.copy_from_slice(bytes);
                    }
                }
            }
        }

        let mut paging = crate::snapshot::ByteReader::new(&snapshot.paging_state);
        self.paging_state.romsel = paging.u8();
        self.paging_state.acccon = paging.u8();
        for slot in self.paging_state.slot_regions.iter_mut() {
            *slot = paging.u8();
        }
        self.rebuild_tables();
        self.executing_in_mos = self.cpu.pc >= 0xC000;

        for (tag, blob) in &snapshot.peripheral_states {
            match *tag {
                PSTATE_SYSTEM_VIA => self.system_via.load_state(blob),
                PSTATE_USER_VIA => self.user_via.load_state(blob),
                PSTATE_SOUND => self.sound.load_state(blob),
                PSTATE_FLOPPY => self.floppy.load_state(blob),
                PSTATE_RTC => {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.load_state(blob);
                    }
                }
                PSTATE_KEYBOARD => self.keyboard.load_state(blob),
                PSTATE_ADC => {
                    if let Some(adc) = self.adc.as_mut() {
                        adc.load_state(blob);
                    }
                }
                PSTATE_CRTC => self.crtc.load_state(blob),
                PSTATE_ULA => self.ula.load_state(blob),
                PSTATE_TELETEXT => self.teletext.load_state(blob),
                PSTATE_MISC => {
                    let mut r = crate::snapshot::ByteReader::new(blob);
                    self.addressable_latch = r.u8();
                    self.sound_we_prev = r.bool();
                    self.last_raster = r.u8();
                    self.last_vsync = r.bool();
                    self.selected_drive = r.u8() as usize;
                }
                _ => {}
            }
        }
    }

    /// Drain every message currently queued and apply them before the next
    /// batch of cycles runs; if a timeline replay is active, also feed it
    /// due replay events at the current cycle.
    fn process_pending_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            self.apply_message(message);
        }
        if self.timeline.mode() != TimelineMode::Replaying {
            return;
        }
        while let Some(due) = self.timeline.next_replay_cycle() {
            if due > self.cycle_counter {
                break;
            }
            match self.timeline.poll_replay(self.cycle_counter) {
                Some(payload) => self.apply_replay_action(payload),
                None => break,
            }
        }
    }

    fn apply_message(&mut self, message: Message) {
        match message {
            Message::KeyState { key_id, pressed } => {
                self.record_action(ActionPayload::KeyState { key_id, pressed });
                let row = (key_id / crate::keyboard::NUM_COLUMNS as u16) as u8;
                let column = (key_id % crate::keyboard::NUM_COLUMNS as u16) as u8;
                self.keyboard.set_key(row, column, pressed);
            }
            Message::AnalogChannel { channel, value } => {
                self.record_action(ActionPayload::AnalogChannel { channel, value });
                if let Some(adc) = self.adc.as_mut() {
                    adc.set_channel_value(channel, value);
                }
            }
            Message::JoystickButton { index, pressed } => {
                if let Some(adc) = self.adc.as_mut() {
                    adc.set_button(index, pressed);
                }
            }
            Message::MouseMotion { dx, dy } => {
                self.record_action(ActionPayload::MouseMotion { dx, dy });
            }
            Message::HardReset { completion, .. } => {
                self.record_action(ActionPayload::HardReset);
                self.reset();
                if let Some(callback) = completion {
                    callback(Ok(()));
                }
            }
            Message::LoadDisc { drive, image, completion, .. } => {
                let hash = crate::snapshot::content_hash(&image);
                self.record_action(ActionPayload::DiscInsert { drive, image_hash: hash });
                self.insert_disc(drive as usize, image);
                if let Some(callback) = completion {
                    callback(Ok(()));
                }
            }
            Message::EjectDisc { drive } => self.eject_disc(drive as usize),
            Message::WriteProtect { drive, protected } => {
                if let Some(disc) = self.discs.get_mut(drive as usize) {
                    disc.set_write_protected(protected);
                }
            }
            Message::StartRecording => {
                let snapshot = self.capture_snapshot();
                self.timeline.start_recording(snapshot, self.cycle_counter);
            }
            Message::StopRecording => self.timeline.stop_recording(),
            Message::ClearRecording => self.timeline.clear_recording(),
            Message::StopReplay => self.timeline.stop_replay(),
            Message::StartTrace { byte_limit } => self.trace = TraceLog::new(byte_limit),
            Message::StopTrace => self.trace.stop(),
            Message::CancelTrace => self.trace.cancel(),
            Message::StartPaste { .. } | Message::StopPaste => {
                // Keystroke-injection pacing happens host-side; the core
                // only ever sees the individual `KeyState` messages it emits.
            }
            Message::SaveState { completion, .. } => {
                let snapshot = self.capture_snapshot();
                self.last_saved_state = Some(snapshot.encode());
                if let Some(callback) = completion {
                    callback(Ok(()));
                }
            }
            Message::LoadState { snapshot, completion } => {
                match crate::snapshot::Snapshot::decode(&snapshot) {
                    Some(decoded) => {
                        self.restore_snapshot(&decoded);
                        if let Some(callback) = completion {
                            callback(Ok(()));
                        }
                    }
                    None => {
                        if let Some(callback) = completion {
                            callback(Err(MessageRejection::InvalidSnapshot));
                        }
                    }
                }
            }
            Message::StartReplay { snapshot, completion } => {
                // Resolve the host's snapshot to a recorded group by cycle,
                // then replay from the timeline's own copy of it.
                let group = crate::snapshot::Snapshot::decode(&snapshot)
                    .and_then(|decoded| self.timeline.group_index_for_cycle(decoded.cycle_counter));
                let restored = group.and_then(|idx| self.timeline.start_replay(idx));
                match restored {
                    Some(shared) => {
                        self.message_queue.discard_all(MessageRejection::InvalidInTimelineMode);
                        self.restore_snapshot(&shared);
                        if let Some(callback) = completion {
                            callback(Ok(()));
                        }
                    }
                    None => {
                        if let Some(callback) = completion {
                            callback(Err(MessageRejection::InvalidInTimelineMode));
                        }
                    }
                }
            }
            Message::Stop => {}
            _ => {}
        }
    }

    fn record_action(&mut self, payload: ActionPayload) {
        self.timeline.record_action(self.cycle_counter, payload);
    }

    fn apply_replay_action(&mut self, payload: ActionPayload) {
        match payload {
            ActionPayload::KeyState { key_id, pressed } => {
                let row = (key_id / crate::keyboard::NUM_COLUMNS as u16) as u8;
                let column = (key_id % crate::keyboard::NUM_COLUMNS as u16) as u8;
                self.keyboard.set_key(row, column, pressed);
            }
            ActionPayload::DiscInsert { .. } => {}
            ActionPayload::Paste { .. } => {}
            ActionPayload::HardReset => self.reset(),
            ActionPayload::AnalogChannel { channel, value } => {
                if let Some(adc) = self.adc.as_mut() {
                    adc.set_channel_value(channel, value);
                }
            }
            ActionPayload::MouseMotion { .. } => {}
        }
    }
}

/// Split every big page in the arena into RAM contents (captured in full)
/// and ROM contents (captured by content hash only, since ROM images are
/// supplied again at `BbcMicro::new` time rather than round-tripped).
/// A free function, not a `&self` method, so it can be called from inside
/// the `timeline.maybe_snapshot` closure in [`BbcMicro::step_one_cycle`]
/// without the closure needing to capture all of `self`.
fn capture_ram_and_rom(arena: &BigPageArena) -> (Vec<Vec<u8>>, Vec<u64>) {
    let mut ram_buffers = Vec::new();
    let mut rom_hashes = Vec::new();
    for page in arena.pages() {
        if page.is_ram() {
            ram_buffers.push(page.raw().to_vec());
        } else {
            rom_hashes.push(crate::snapshot::content_hash(page.raw()));
        }
    }
    (ram_buffers, rom_hashes)
}

/// Every stateful peripheral's `save_state()` blob, tagged with a
/// `PSTATE_*` constant so `BbcMicro::restore_snapshot` can route each one
/// back to its owner via `load_state()`. `misc` carries the handful of
/// top-level latch/selection bytes that don't belong to any single
/// peripheral struct.
#[allow(clippy::too_many_arguments)]
fn capture_peripheral_states(
    system_via: &Via6522,
    user_via: &Via6522,
    sound: &Sn76489,
    floppy: &Wd1770,
    rtc: &Option<Rtc146818>,
    keyboard: &Keyboard,
    adc: &Option<Adc>,
    crtc: &Crtc6845,
    ula: &VideoUla,
    teletext: &Teletext,
    misc: [u8; 5],
) -> Vec<(u8, Vec<u8>)> {
    let mut out = vec![
        (PSTATE_SYSTEM_VIA, system_via.save_state()),
        (PSTATE_USER_VIA, user_via.save_state()),
        (PSTATE_SOUND, sound.save_state()),
        (PSTATE_FLOPPY, floppy.save_state()),
        (PSTATE_KEYBOARD, keyboard.save_state()),
        (PSTATE_CRTC, crtc.save_state()),
        (PSTATE_ULA, ula.save_state()),
        (PSTATE_TELETEXT, teletext.save_state()),
        (PSTATE_MISC, misc.to_vec()),
    ];
    if let Some(rtc) = rtc.as_ref() {
        out.push((PSTATE_RTC, rtc.save_state()));
    }
    if let Some(adc) = adc.as_ref() {
        out.push((PSTATE_ADC, adc.save_state()));
    }
    out
}

/// A write-protected, zero-length disc used as the "drive empty" sentinel,
/// replacing an `Option<DirectAccessDisc>` per slot so every `Wd1770` call
/// site always has a real `&mut dyn DiscInterface` to hand.
fn empty_disc() -> DirectAccessDisc {
    let mut disc = DirectAccessDisc::new(Vec::new(), 10, 256, 1);
    disc.set_write_protected(true);
    disc
}

impl Bus for BbcMicro {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        self.read_mem(addr)
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        self.write_mem(addr, data);
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        false
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        let floppy_irq = self.floppy.interrupt_request();
        // The WD1770's INTRQ is wired to NMI on a Model B (no other NMI
        // source exists there) and to IRQ on B+/Master, which added a
        // proper interrupt-sharing scheme for the FDC.
        let floppy_on_nmi = self.model == MachineModel::ModelB;
        InterruptState {
            nmi: floppy_irq && floppy_on_nmi,
            irq: self.last_system_irq || self.last_user_irq || (floppy_irq && !floppy_on_nmi),
        }
    }
}

impl Machine for BbcMicro {
    fn display_size(&self) -> (u32, u32) {
        let (w, h) = self.tv.dimensions();
        (w as u32, h as u32)
    }

    fn run_frame(&mut self) {
        self.process_pending_messages();

        let start_version = self.tv.version();
        let mut guard = 0u64;
        while self.tv.version() == start_version {
            for _ in 0..RUN_CYCLES_PER_ITERATION {
                self.step_one_cycle();
            }
            guard += RUN_CYCLES_PER_ITERATION;
            if guard > 20_000_000 {
                break; // misprogrammed CRTC safety valve; never spin forever
            }
        }
    }

    fn render_frame(&self, buffer: &mut [u8]) {
        let (w, h) = self.tv.dimensions();
        let argb = self.tv.buffer();
        for (i, px) in argb.iter().take(w * h).enumerate() {
            let base = i * 3;
            if base + 2 < buffer.len() {
                buffer[base] = (px >> 16) as u8;
                buffer[base + 1] = (px >> 8) as u8;
                buffer[base + 2] = *px as u8;
            }
        }
    }

    fn set_input(&mut self, button: u8, pressed: bool) {
        let row = button / crate::keyboard::NUM_COLUMNS as u8;
        let column = button % crate::keyboard::NUM_COLUMNS as u8;
        self.keyboard.set_key(row, column, pressed);
    }

    fn input_map(&self) -> &[InputButton] {
        &self.inputs
    }

    fn reset(&mut self) {
        self.cpu.reset();
        self.paging_state = PagingState::default();
        self.rebuild_tables();
        self.executing_in_mos = true;
        self.reset_vector_fetch();
        self.trace.record(TraceEvent::Reset { cycle: self.cycle_counter });
    }

    fn save_nvram(&self) -> Vec<u8> {
        self.rtc.as_ref().map(|r| r.save_nvram().to_vec()).unwrap_or_default()
    }

    fn load_nvram(&mut self, data: &[u8]) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.load_nvram(data);
        }
    }
}

fn default_input_map() -> Vec<InputButton> {
    // A minimal, representative subset; the full 8x10 matrix is reachable
    // by `row * NUM_COLUMNS + column` ids even where no named entry exists.
    vec![
        InputButton { id: 0, name: "SHIFT" },
        InputButton { id: 1, name: "CTRL" },
        InputButton { id: 58, name: "BREAK" },
    ]
}
