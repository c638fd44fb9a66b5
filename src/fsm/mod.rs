//! Function-pointer finite state machine for the dock's operating mode.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌──────────────────┬─────────────────────────────────┐  │
//! │  │ DeviceState      │ on_trigger                      │  │
//! │  ├──────────────────┼─────────────────────────────────┤  │
//! │  │ Setup            │ fn(Trigger) -> Option<State>    │  │
//! │  │ Connecting       │ fn(Trigger) -> Option<State>    │  │
//! │  │ ConnSuccess      │ fn(Trigger) -> Option<State>    │  │
//! │  │ ...              │ ...                             │  │
//! │  └──────────────────┴─────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Triggers come from dock commands (dispatcher) and from hardware events
//! that the main loop drains out of the interrupt queue. The machine has
//! a single writer; the LED animation thread reads the current value
//! through a [`StateReader`] backed by one atomic byte.

pub mod states;

use core::sync::atomic::{AtomicU8, Ordering};
use log::info;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Operating mode of the dock.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceState {
    Setup = 0,
    Connecting = 1,
    ConnSuccess = 2,
    Normal = 3,
    NormalCharging = 4,
    Error = 5,
    LedSetup = 6,
    NormalFullyCharged = 7,
    NormalLowBattery = 8,
}

impl DeviceState {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Setup,
        Self::Connecting,
        Self::ConnSuccess,
        Self::Normal,
        Self::NormalCharging,
        Self::Error,
        Self::LedSetup,
        Self::NormalFullyCharged,
        Self::NormalLowBattery,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    /// Convert a raw index back to `DeviceState`. Panics on out-of-range in
    /// debug builds; returns `Error` in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(s) => *s,
            None => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Setup => "Setup",
            Self::Connecting => "Connecting",
            Self::ConnSuccess => "ConnSuccess",
            Self::Normal => "Normal",
            Self::NormalCharging => "NormalCharging",
            Self::Error => "Error",
            Self::LedSetup => "LedSetup",
            Self::NormalFullyCharged => "NormalFullyCharged",
            Self::NormalLowBattery => "NormalLowBattery",
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Everything that can move the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Charge-detect pin went active (remote placed on the dock).
    ChargePinAsserted,
    /// Charge-detect pin released.
    ChargePinReleased,
    /// Station association started.
    WifiConnectBegin,
    /// Station got an IP.
    WifiConnected,
    /// LED animator finished the connection-success blinks.
    SuccessBlinkDone,
    /// `led_brightness_start` command.
    LedSetupStart,
    /// `led_brightness_stop` command.
    LedSetupStop,
    /// `remote_charged` command.
    RemoteCharged,
    /// `remote_lowbattery` command.
    RemoteLowBattery,
    /// Unrecoverable subsystem failure.
    Fault,
}

// ---------------------------------------------------------------------------
// Shared state cell
// ---------------------------------------------------------------------------

/// Single-writer atomic cell holding the current [`DeviceState`].
#[derive(Debug)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new(initial: DeviceState) -> Self {
        Self(Arc::new(AtomicU8::new(initial as u8)))
    }

    pub fn get(&self) -> DeviceState {
        DeviceState::from_index(self.0.load(Ordering::Acquire) as usize)
    }

    fn set(&self, state: DeviceState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Read-only handle for other threads.
    pub fn reader(&self) -> StateReader {
        StateReader(Arc::clone(&self.0))
    }
}

/// Read-only view of a [`StateCell`].
#[derive(Debug, Clone)]
pub struct StateReader(Arc<AtomicU8>);

impl StateReader {
    pub fn get(&self) -> DeviceState {
        DeviceState::from_index(self.0.load(Ordering::Acquire) as usize)
    }
}

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Signature for the per-state trigger handler.
/// Returns `Some(next)` to transition, or `None` to stay.
pub type StateTriggerFn = fn(Trigger) -> Option<DeviceState>;

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: DeviceState,
    pub name: &'static str,
    pub on_trigger: StateTriggerFn,
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeviceState,
    pub to: DeviceState,
    pub trigger: Trigger,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct DeviceFsm {
    /// Fixed-size table indexed by `DeviceState as usize`.
    table: [StateDescriptor; DeviceState::COUNT],
    cell: StateCell,
    transitions: u32,
}

impl DeviceFsm {
    pub fn new(initial: DeviceState) -> Self {
        Self {
            table: states::build_state_table(),
            cell: StateCell::new(initial),
            transitions: 0,
        }
    }

    pub fn current(&self) -> DeviceState {
        self.cell.get()
    }

    pub fn reader(&self) -> StateReader {
        self.cell.reader()
    }

    /// Number of state changes since construction.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }

    /// Feed one trigger. Returns the transition if the state changed.
    pub fn apply(&mut self, trigger: Trigger) -> Option<Transition> {
        let from = self.cell.get();
        let next = (self.table[from as usize].on_trigger)(trigger)?;
        if next == from {
            return None;
        }

        info!(
            "FSM transition: {} -> {} ({:?})",
            self.table[from as usize].name, self.table[next as usize].name, trigger
        );
        self.cell.set(next);
        self.transitions = self.transitions.wrapping_add(1);
        Some(Transition {
            from,
            to: next,
            trigger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm_in(state: DeviceState) -> DeviceFsm {
        DeviceFsm::new(state)
    }

    #[test]
    fn starts_in_setup() {
        let fsm = DeviceFsm::new(DeviceState::Setup);
        assert_eq!(fsm.current(), DeviceState::Setup);
        assert_eq!(fsm.transition_count(), 0);
    }

    #[test]
    fn charge_pin_edges() {
        let mut fsm = fsm_in(DeviceState::Normal);
        let t = fsm.apply(Trigger::ChargePinAsserted).unwrap();
        assert_eq!((t.from, t.to), (DeviceState::Normal, DeviceState::NormalCharging));

        // already charging: stays, no transition reported
        assert!(fsm.apply(Trigger::ChargePinAsserted).is_none());
        assert_eq!(fsm.current(), DeviceState::NormalCharging);

        fsm.apply(Trigger::ChargePinReleased);
        assert_eq!(fsm.current(), DeviceState::Normal);
    }

    #[test]
    fn wifi_connect_sequence() {
        let mut fsm = fsm_in(DeviceState::Setup);
        fsm.apply(Trigger::WifiConnectBegin);
        assert_eq!(fsm.current(), DeviceState::Connecting);
        fsm.apply(Trigger::WifiConnected);
        assert_eq!(fsm.current(), DeviceState::ConnSuccess);
        fsm.apply(Trigger::SuccessBlinkDone);
        assert_eq!(fsm.current(), DeviceState::Normal);
        assert_eq!(fsm.transition_count(), 3);
    }

    #[test]
    fn blink_done_only_acts_from_conn_success() {
        for state in DeviceState::ALL {
            if state == DeviceState::ConnSuccess {
                continue;
            }
            let mut fsm = fsm_in(state);
            assert!(fsm.apply(Trigger::SuccessBlinkDone).is_none());
            assert_eq!(fsm.current(), state);
        }
    }

    #[test]
    fn led_setup_round_trip() {
        let mut fsm = fsm_in(DeviceState::Normal);
        fsm.apply(Trigger::LedSetupStart);
        assert_eq!(fsm.current(), DeviceState::LedSetup);
        fsm.apply(Trigger::LedSetupStop);
        assert_eq!(fsm.current(), DeviceState::Normal);
    }

    #[test]
    fn remote_battery_commands() {
        let mut fsm = fsm_in(DeviceState::NormalCharging);
        fsm.apply(Trigger::RemoteCharged);
        assert_eq!(fsm.current(), DeviceState::NormalFullyCharged);
        fsm.apply(Trigger::RemoteLowBattery);
        assert_eq!(fsm.current(), DeviceState::NormalLowBattery);
    }

    #[test]
    fn fault_reaches_error_from_anywhere() {
        for state in DeviceState::ALL {
            let mut fsm = fsm_in(state);
            fsm.apply(Trigger::Fault);
            assert_eq!(fsm.current(), DeviceState::Error, "from {:?}", state);
        }
    }

    #[test]
    fn reader_sees_writes() {
        let mut fsm = fsm_in(DeviceState::Setup);
        let reader = fsm.reader();
        fsm.apply(Trigger::WifiConnectBegin);
        assert_eq!(reader.get(), DeviceState::Connecting);

        let handle = std::thread::spawn(move || reader.get());
        assert_eq!(handle.join().unwrap(), DeviceState::Connecting);
    }

    #[test]
    fn state_from_u8_roundtrip() {
        for i in 0..DeviceState::COUNT {
            let s = DeviceState::from_u8(i as u8).unwrap();
            assert_eq!(s as usize, i);
        }
        assert!(DeviceState::from_u8(9).is_none());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn state_from_invalid_index_returns_error() {
        assert_eq!(DeviceState::from_index(99), DeviceState::Error);
    }
}
