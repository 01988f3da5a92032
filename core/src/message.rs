//! Host → core message protocol. Each variant is one row of the message
//! table: a tagged union rather than the original's per-message virtual
//! dispatch, so the orchestrator's handling is a single `match`.

use crate::error::MessageRejection;
use std::collections::VecDeque;

/// Invoked exactly once per message: on success, on rejection, or when
/// the message is discarded outright (e.g. a replay starting mid-flight).
pub type CompletionCallback = Box<dyn FnOnce(Result<(), MessageRejection>) + Send>;

pub struct HardResetFlags {
    pub boot: bool,
    pub run: bool,
}

pub enum Message {
    Stop,

    KeyState { key_id: u16, pressed: bool },
    KeySymbol { symbol: char, pressed: bool },

    JoystickButton { index: u8, pressed: bool },
    AnalogChannel { channel: u8, value: u16 },
    DigitalJoystick { index: u8, bits: u8 },
    MouseMotion { dx: i32, dy: i32 },
    MouseButtons { mask: u8, value: u8 },

    HardReset {
        flags: HardResetFlags,
        nvram: Option<Vec<u8>>,
        completion: Option<CompletionCallback>,
        timeout_cycles: Option<u64>,
    },

    SpeedLimit(bool),
    SpeedScale(f64),

    LoadDisc { drive: u8, image: Vec<u8>, verbose: bool, completion: Option<CompletionCallback> },
    EjectDisc { drive: u8 },
    WriteProtect { drive: u8, protected: bool },

    LoadState { snapshot: Vec<u8>, completion: Option<CompletionCallback> },
    SaveState { verbose: bool, completion: Option<CompletionCallback> },

    StartRecording,
    StopRecording,
    ClearRecording,
    StartReplay { snapshot: Vec<u8>, completion: Option<CompletionCallback> },
    StopReplay,

    StartPaste { text: String },
    StopPaste,

    StartCopy { basic_flag: bool, completion: Option<CompletionCallback> },
    StopCopy,

    StartTrace { byte_limit: usize },
    StopTrace,
    CancelTrace,

    DebugSetByte { address: u16, value: u8 },
    DebugSetFlags { flags: u8 },
    DebugHalt,
    DebugStep,
    DebugRun,

    /// Real-time pacing hint. One privileged slot: a new Timing message
    /// overwrites any prior pending one rather than queuing behind it.
    Timing { max_sound_units: u32 },

    BeebLinkResponse { payload: Vec<u8> },

    SetPrinterEnabled(bool),
    ResetPrinterBuffer,
}

impl Message {
    /// Whether this message is the privileged "overwrite, don't queue"
    /// kind described in the concurrency model.
    pub fn is_timing(&self) -> bool {
        matches!(self, Message::Timing { .. })
    }
}

/// Single-producer (host) / single-consumer (emulation thread) FIFO, with
/// one privileged slot reserved for the most recent pending `Timing`
/// message: a fresh one overwrites it instead of taking a place in line.
#[derive(Default)]
pub struct MessageQueue {
    fifo: VecDeque<Message>,
    pending_timing: Option<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::new(),
            pending_timing: None,
        }
    }

    pub fn submit(&mut self, message: Message) {
        if message.is_timing() {
            self.pending_timing = Some(message);
        } else {
            self.fifo.push_back(message);
        }
    }

    /// Pop the next message in submission order, except the timing slot
    /// is drained first whenever one is pending.
    pub fn pop(&mut self) -> Option<Message> {
        self.pending_timing.take().or_else(|| self.fifo.pop_front())
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty() && self.pending_timing.is_none()
    }

    pub fn len(&self) -> usize {
        self.fifo.len() + self.pending_timing.is_some() as usize
    }

    /// Drain everything, invoking each message's completion callback (if
    /// any) with a rejection — used when the queue itself is torn down,
    /// e.g. a replay starting mid-flight discards any outstanding host
    /// messages.
    pub fn discard_all(&mut self, reason: MessageRejection) {
        while let Some(message) = self.pop() {
            invoke_rejection(message, reason.clone());
        }
    }
}

fn invoke_rejection(message: Message, reason: MessageRejection) {
    match message {
        Message::HardReset { completion, .. }
        | Message::LoadDisc { completion, .. }
        | Message::LoadState { completion, .. }
        | Message::SaveState { completion, .. }
        | Message::StartReplay { completion, .. }
        | Message::StartCopy { completion, .. } => {
            if let Some(callback) = completion {
                callback(Err(reason));
            }
        }
        _ => {}
    }
}
