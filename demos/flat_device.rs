//! Flat device state machine example
//!
//! This example demonstrates a simple device with four states:
//! - Off: Device is powered down
//! - Standby: Device is on but not active
//! - Active: Device is fully operational
//! - Failure: Device encountered a fault and needs recovery
//!
//! The example shows:
//! - Basic state transitions with run-to-completion chaining
//! - Context management (power level, fault count)
//! - Transducer-based transition tracing
//! - Error handling and recovery
//!
//! Run with: cargo run --example flat_device

use async_signal_fsm::prelude::*;

const OFF: StateInstance = StateInstance::new(0);
const STANDBY: StateInstance = StateInstance::new(1);
const ACTIVE: StateInstance = StateInstance::new(2);
const FAILURE: StateInstance = StateInstance::new(3);

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceEvent {
    PowerOn,
    PowerOff,
    Activate,
    Deactivate,
    Glitch,
    Reset,
}

#[derive(Debug)]
struct DeviceContext {
    power_level: u8,
    fault_count: u32,
}

impl DeviceContext {
    fn new() -> Self {
        Self {
            power_level: 0,
            fault_count: 0,
        }
    }
}

struct OffState;

#[async_trait]
impl StateHandler<DeviceContext, DeviceEvent> for OffState {
    async fn on_signal(
        &mut self,
        signal: &Signal<DeviceEvent>,
        context: &mut DeviceContext,
    ) -> Response {
        match signal {
            Signal::Entry => {
                context.power_level = 0;
                println!("  [off] powered down");
                Response::Handled
            }
            Signal::User(DeviceEvent::PowerOn) => Response::Transition(STANDBY),
            _ => Response::Handled,
        }
    }
}

struct StandbyState;

#[async_trait]
impl StateHandler<DeviceContext, DeviceEvent> for StandbyState {
    async fn on_signal(
        &mut self,
        signal: &Signal<DeviceEvent>,
        context: &mut DeviceContext,
    ) -> Response {
        match signal {
            Signal::Entry => {
                context.power_level = 25;
                println!("  [standby] power level {}", context.power_level);
                Response::Handled
            }
            Signal::User(DeviceEvent::Activate) => Response::Transition(ACTIVE),
            Signal::User(DeviceEvent::PowerOff) => Response::Transition(OFF),
            Signal::User(DeviceEvent::Glitch) => Response::Transition(FAILURE),
            _ => Response::Handled,
        }
    }
}

struct ActiveState;

#[async_trait]
impl StateHandler<DeviceContext, DeviceEvent> for ActiveState {
    async fn on_signal(
        &mut self,
        signal: &Signal<DeviceEvent>,
        context: &mut DeviceContext,
    ) -> Response {
        match signal {
            Signal::Entry => {
                context.power_level = 100;
                println!("  [active] running at full power");
                Response::Handled
            }
            Signal::User(DeviceEvent::Deactivate) => Response::Transition(STANDBY),
            Signal::User(DeviceEvent::PowerOff) => Response::Transition(OFF),
            Signal::User(DeviceEvent::Glitch) => Response::Transition(FAILURE),
            _ => Response::Handled,
        }
    }
}

struct FailureState;

#[async_trait]
impl StateHandler<DeviceContext, DeviceEvent> for FailureState {
    async fn on_signal(
        &mut self,
        signal: &Signal<DeviceEvent>,
        context: &mut DeviceContext,
    ) -> Response {
        match signal {
            Signal::Entry => {
                context.fault_count += 1;
                context.power_level = 10;
                println!("  [failure] fault #{}", context.fault_count);
                Response::Handled
            }
            Signal::User(DeviceEvent::Reset) => {
                if context.fault_count < 3 {
                    Response::Transition(STANDBY)
                } else {
                    println!("  [failure] too many faults, shutting down");
                    Response::Transition(OFF)
                }
            }
            Signal::User(DeviceEvent::PowerOff) => Response::Transition(OFF),
            _ => Response::Handled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut device = FlatMachineBuilder::new(DeviceContext::new())
        .state(0, "off", OffState)
        .state(1, "standby", StandbyState)
        .state(2, "active", ActiveState)
        .state(3, "failure", FailureState)
        .transducer(|table, from, to, _input| {
            println!(
                "  >> {} -> {}",
                table.name(from).unwrap_or("(start)"),
                table.name(to).unwrap_or("?")
            );
            Ok(())
        })
        .build();

    device.init(OFF)?;

    let script = [
        DeviceEvent::PowerOn,
        DeviceEvent::Activate,
        DeviceEvent::Deactivate,
        DeviceEvent::Glitch,
        DeviceEvent::Reset,
        DeviceEvent::PowerOff,
    ];

    for event in script {
        println!("event: {event:?}");
        device.dispatch(Signal::User(event)).await?;
        println!(
            "state: {} (power {})",
            device
                .state_name(device.current_instance())
                .unwrap_or("(none)"),
            device.context().power_level
        );
    }

    Ok(())
}
