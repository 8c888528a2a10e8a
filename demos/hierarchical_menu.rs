//! Hierarchical menu state machine example
//!
//! This example demonstrates a hierarchical state machine for a UI system:
//! - Ui: Root of the whole interface
//! - Home: Main screen (child of Ui)
//! - Settings: Settings menu (child of Ui)
//! - Display: Display settings (child of Settings)
//! - Audio: Audio settings (child of Settings)
//!
//! The hierarchy allows for:
//! - Pass-through delivery: the root catches `Home` from any screen
//! - Minimal entry/exit paths computed through the Least Common Ancestor
//! - Natural navigation patterns
//!
//! Run with: cargo run --example hierarchical_menu

use async_signal_fsm::prelude::*;

const UI: StateInstance = StateInstance::new(0);
const HOME: StateInstance = StateInstance::new(1);
const SETTINGS: StateInstance = StateInstance::new(2);
const DISPLAY: StateInstance = StateInstance::new(3);
const AUDIO: StateInstance = StateInstance::new(4);

#[derive(Debug, Clone, PartialEq, Eq)]
enum UiEvent {
    OpenSettings,
    SelectDisplay,
    SelectAudio,
    Adjust(i8),
    Back,
    Home,
}

#[derive(Debug, Default)]
struct UiContext {
    brightness: i16,
    volume: i16,
}

struct UiRoot;

#[async_trait]
impl StateHandler<UiContext, UiEvent> for UiRoot {
    async fn on_signal(&mut self, signal: &Signal<UiEvent>, _context: &mut UiContext) -> Response {
        match signal {
            Signal::Entry => {
                println!("  [ui] interface up");
                Response::Handled
            }
            // Pass-through delivery lets this catch Home from any screen
            Signal::User(UiEvent::Home) => Response::Transition(HOME),
            _ => Response::Handled,
        }
    }
}

struct HomeScreen;

#[async_trait]
impl StateHandler<UiContext, UiEvent> for HomeScreen {
    async fn on_signal(&mut self, signal: &Signal<UiEvent>, _context: &mut UiContext) -> Response {
        match signal {
            Signal::Entry => {
                println!("  [home] showing main screen");
                Response::Handled
            }
            Signal::User(UiEvent::OpenSettings) => Response::Transition(SETTINGS),
            _ => Response::Handled,
        }
    }
}

struct SettingsScreen;

#[async_trait]
impl StateHandler<UiContext, UiEvent> for SettingsScreen {
    async fn on_signal(&mut self, signal: &Signal<UiEvent>, _context: &mut UiContext) -> Response {
        match signal {
            Signal::Entry => {
                println!("  [settings] menu open");
                Response::Handled
            }
            Signal::User(UiEvent::SelectDisplay) => Response::Transition(DISPLAY),
            Signal::User(UiEvent::SelectAudio) => Response::Transition(AUDIO),
            Signal::User(UiEvent::Back) => Response::Transition(HOME),
            _ => Response::Handled,
        }
    }
}

struct DisplayScreen;

#[async_trait]
impl StateHandler<UiContext, UiEvent> for DisplayScreen {
    async fn on_signal(&mut self, signal: &Signal<UiEvent>, context: &mut UiContext) -> Response {
        match signal {
            Signal::User(UiEvent::Adjust(delta)) => {
                context.brightness += i16::from(*delta);
                println!("  [display] brightness {}", context.brightness);
                Response::Handled
            }
            _ => Response::Handled,
        }
    }
}

struct AudioScreen;

#[async_trait]
impl StateHandler<UiContext, UiEvent> for AudioScreen {
    async fn on_signal(&mut self, signal: &Signal<UiEvent>, context: &mut UiContext) -> Response {
        match signal {
            Signal::User(UiEvent::Adjust(delta)) => {
                context.volume += i16::from(*delta);
                println!("  [audio] volume {}", context.volume);
                Response::Handled
            }
            _ => Response::Handled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut ui = HierarchicalMachineBuilder::new(UiContext::default())
        .state(0, "ui", UiRoot)
        .substate(UI, 1, "home", HomeScreen)
        .substate(UI, 2, "settings", SettingsScreen)
        .substate(SETTINGS, 3, "display", DisplayScreen)
        .substate(SETTINGS, 4, "audio", AudioScreen)
        .mode(DispatchMode::PassThrough)
        .transducer(|table, from, to, _input| {
            println!(
                "  >> {} -> {}",
                table.name(from).unwrap_or("(start)"),
                table.name(to).unwrap_or("?")
            );
            Ok(())
        })
        .build();

    ui.init(HOME)?;

    let script = [
        UiEvent::OpenSettings,
        UiEvent::SelectDisplay,
        UiEvent::Adjust(10),
        UiEvent::Adjust(-3),
        UiEvent::Home,
        UiEvent::OpenSettings,
        UiEvent::SelectAudio,
        UiEvent::Adjust(4),
        UiEvent::Back,
        UiEvent::Home,
    ];

    for event in script {
        println!("event: {event:?}");
        ui.dispatch(Signal::User(event)).await?;
        println!("state: {}", ui.current_state_name().unwrap_or("(none)"));
    }

    println!(
        "final settings: brightness {}, volume {}",
        ui.context().brightness,
        ui.context().volume
    );

    Ok(())
}
