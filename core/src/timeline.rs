//! Deterministic record/replay. The timeline is an ordered log of
//! (timestamp, payload) records partitioned by snapshot: a snapshot event
//! marks a complete machine state, and the action events between two
//! snapshots replay exactly the host messages that were accepted while
//! recording.

use crate::snapshot::SharedSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    KeyState { key_id: u16, pressed: bool },
    DiscInsert { drive: u8, image_hash: u64 },
    Paste { text: String },
    HardReset,
    AnalogChannel { channel: u8, value: u16 },
    MouseMotion { dx: i32, dy: i32 },
}

#[derive(Clone)]
pub struct ActionEvent {
    pub timestamp: u64,
    pub payload: ActionPayload,
}

struct SnapshotGroup {
    timestamp: u64,
    snapshot: SharedSnapshot,
    actions: Vec<ActionEvent>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Mode {
    Idle,
    Recording,
    Replaying,
}

pub struct Timeline {
    groups: Vec<SnapshotGroup>,
    mode: Mode,
    snapshot_interval_cycles: u64,
    last_snapshot_cycle: u64,
    replay_cursor: (usize, usize),
}

impl Timeline {
    pub fn new(snapshot_interval_cycles: u64) -> Self {
        Self {
            groups: Vec::new(),
            mode: Mode::Idle,
            snapshot_interval_cycles,
            last_snapshot_cycle: 0,
            replay_cursor: (0, 0),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn start_recording(&mut self, initial_snapshot: SharedSnapshot, cycle: u64) {
        self.groups.clear();
        self.groups.push(SnapshotGroup {
            timestamp: cycle,
            snapshot: initial_snapshot,
            actions: Vec::new(),
        });
        self.last_snapshot_cycle = cycle;
        self.mode = Mode::Recording;
    }

    pub fn stop_recording(&mut self) {
        if self.mode == Mode::Recording {
            self.mode = Mode::Idle;
        }
    }

    pub fn clear_recording(&mut self) {
        self.groups.clear();
        self.mode = Mode::Idle;
    }

    /// Every message the orchestrator accepts while recording is
    /// duplicated here. Enforces that snapshot timestamps strictly
    /// increase and that each action's timestamp falls within its
    /// owning snapshot's window.
    pub fn record_action(&mut self, cycle: u64, payload: ActionPayload) {
        if self.mode != Mode::Recording {
            return;
        }
        debug_assert!(cycle >= self.last_snapshot_cycle);
        if let Some(group) = self.groups.last_mut() {
            group.actions.push(ActionEvent {
                timestamp: cycle,
                payload,
            });
        }
    }

    /// Called once per orchestrator iteration while recording; takes a
    /// fresh snapshot once the configured interval has elapsed.
    pub fn maybe_snapshot(&mut self, cycle: u64, make_snapshot: impl FnOnce() -> SharedSnapshot) {
        if self.mode != Mode::Recording {
            return;
        }
        if cycle.saturating_sub(self.last_snapshot_cycle) < self.snapshot_interval_cycles {
            return;
        }
        self.groups.push(SnapshotGroup {
            timestamp: cycle,
            snapshot: make_snapshot(),
            actions: Vec::new(),
        });
        self.last_snapshot_cycle = cycle;
    }

    pub fn start_replay(&mut self, from_snapshot_group: usize) -> Option<SharedSnapshot> {
        let group = self.groups.get(from_snapshot_group)?;
        self.replay_cursor = (from_snapshot_group, 0);
        self.mode = Mode::Replaying;
        Some(group.snapshot.clone())
    }

    pub fn stop_replay(&mut self) {
        self.mode = Mode::Idle;
    }

    /// The cycle count of the next scheduled replay event, if any remain.
    pub fn next_replay_cycle(&self) -> Option<u64> {
        let (group_idx, action_idx) = self.replay_cursor;
        let mut group_idx = group_idx;
        let mut action_idx = action_idx;
        loop {
            let group = self.groups.get(group_idx)?;
            if let Some(action) = group.actions.get(action_idx) {
                return Some(action.timestamp);
            }
            group_idx += 1;
            action_idx = 0;
            if group_idx >= self.groups.len() {
                return None;
            }
        }
    }

    /// Pop the next replay event if `cycle` has reached its timestamp.
    pub fn poll_replay(&mut self, cycle: u64) -> Option<ActionPayload> {
        if self.mode != Mode::Replaying {
            return None;
        }
        let (mut group_idx, mut action_idx) = self.replay_cursor;
        loop {
            let group = self.groups.get(group_idx)?;
            match group.actions.get(action_idx) {
                Some(action) if action.timestamp <= cycle => {
                    let payload = action.payload.clone();
                    self.replay_cursor = (group_idx, action_idx + 1);
                    return Some(payload);
                }
                Some(_) => return None,
                None => {
                    group_idx += 1;
                    action_idx = 0;
                    if group_idx >= self.groups.len() {
                        self.mode = Mode::Idle;
                        return None;
                    }
                }
            }
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.groups.len()
    }

    /// Index of the recorded group whose own snapshot was taken at
    /// exactly `cycle`, if any. Used to turn a host-supplied snapshot
    /// (identified by the cycle it was captured at) back into the group
    /// index [`start_replay`](Self::start_replay) expects.
    pub fn group_index_for_cycle(&self, cycle: u64) -> Option<usize> {
        self.groups.iter().position(|g| g.timestamp == cycle)
    }
}
