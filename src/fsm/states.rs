//! Per-state trigger handlers and table builder.
//!
//! Most triggers move the dock to the same place whatever it is doing;
//! only `ConnSuccess` adds a rule of its own (the end of the success
//! blink). Each row still gets its own handler so a state can grow
//! special cases without touching the engine.
//!
//! ```text
//!  SETUP ──[wifi begin]──▶ CONNECTING ──[wifi up]──▶ CONN_SUCCESS
//!                                                        │
//!                                               [blink done]
//!                                                        ▼
//!  NORMAL_CHARGING ◀──[pin asserted]── any ──[pin released]──▶ NORMAL
//!
//!  any ──[led start]──▶ LED_SETUP ──[led stop]──▶ NORMAL
//!  any ──[remote_charged]──▶ NORMAL_FULLY_CHARGED
//!  any ──[remote_lowbattery]──▶ NORMAL_LOW_BATTERY
//!  any ──[fault]──▶ ERROR
//! ```

use super::{DeviceState, StateDescriptor, Trigger};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; DeviceState::COUNT] {
    [
        // Index 0: Setup
        StateDescriptor {
            id: DeviceState::Setup,
            name: "Setup",
            on_trigger: common_trigger,
        },
        // Index 1: Connecting
        StateDescriptor {
            id: DeviceState::Connecting,
            name: "Connecting",
            on_trigger: common_trigger,
        },
        // Index 2: ConnSuccess
        StateDescriptor {
            id: DeviceState::ConnSuccess,
            name: "ConnSuccess",
            on_trigger: conn_success_trigger,
        },
        // Index 3: Normal
        StateDescriptor {
            id: DeviceState::Normal,
            name: "Normal",
            on_trigger: common_trigger,
        },
        // Index 4: NormalCharging
        StateDescriptor {
            id: DeviceState::NormalCharging,
            name: "NormalCharging",
            on_trigger: common_trigger,
        },
        // Index 5: Error
        StateDescriptor {
            id: DeviceState::Error,
            name: "Error",
            on_trigger: common_trigger,
        },
        // Index 6: LedSetup
        StateDescriptor {
            id: DeviceState::LedSetup,
            name: "LedSetup",
            on_trigger: common_trigger,
        },
        // Index 7: NormalFullyCharged
        StateDescriptor {
            id: DeviceState::NormalFullyCharged,
            name: "NormalFullyCharged",
            on_trigger: common_trigger,
        },
        // Index 8: NormalLowBattery
        StateDescriptor {
            id: DeviceState::NormalLowBattery,
            name: "NormalLowBattery",
            on_trigger: common_trigger,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Rules shared by every state
// ═══════════════════════════════════════════════════════════════════════════

fn common_trigger(trigger: Trigger) -> Option<DeviceState> {
    match trigger {
        Trigger::ChargePinAsserted => Some(DeviceState::NormalCharging),
        Trigger::ChargePinReleased | Trigger::LedSetupStop => Some(DeviceState::Normal),
        Trigger::WifiConnectBegin => Some(DeviceState::Connecting),
        Trigger::WifiConnected => Some(DeviceState::ConnSuccess),
        Trigger::LedSetupStart => Some(DeviceState::LedSetup),
        Trigger::RemoteCharged => Some(DeviceState::NormalFullyCharged),
        Trigger::RemoteLowBattery => Some(DeviceState::NormalLowBattery),
        Trigger::Fault => Some(DeviceState::Error),
        Trigger::SuccessBlinkDone => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONN_SUCCESS state
// ═══════════════════════════════════════════════════════════════════════════

fn conn_success_trigger(trigger: Trigger) -> Option<DeviceState> {
    match trigger {
        Trigger::SuccessBlinkDone => Some(DeviceState::Normal),
        other => common_trigger(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_match_their_index() {
        for (i, row) in build_state_table().iter().enumerate() {
            assert_eq!(row.id as usize, i);
            assert_eq!(row.name, row.id.name());
        }
    }

    #[test]
    fn conn_success_inherits_common_rules() {
        assert_eq!(
            conn_success_trigger(Trigger::ChargePinAsserted),
            Some(DeviceState::NormalCharging)
        );
        assert_eq!(
            conn_success_trigger(Trigger::SuccessBlinkDone),
            Some(DeviceState::Normal)
        );
        assert_eq!(common_trigger(Trigger::SuccessBlinkDone), None);
    }
}
