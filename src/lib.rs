//! # Async Signal State Machines
//!
//! A pair of small, reusable state machine engines driven by typed signals:
//! a flat sequential machine and a hierarchical machine with parent/child
//! state composition.
//!
//! ## Features
//!
//! - 🔄 **Async/Await Support**: handlers are async; dispatch still runs to
//!   completion before returning
//! - 🏗️ **Hierarchical States**: parent slots, Least-Common-Ancestor
//!   transition resolution, ordered `Entry`/`Init`/`Exit` cascades
//! - ⛓️ **Run-to-Completion Chaining**: a handler can request a transition
//!   mid-dispatch and the engine finishes the whole cascade in the same call
//! - 🔭 **Transducer Hook**: an observer fired on every committed transition,
//!   wired into the abort path
//! - 📊 **PlantUML Export**: automatic state diagram generation (debug builds
//!   only, behind the `plantuml` feature)
//! - 🛡️ **Type Safety**: signals, responses, and instances are plain enums
//!   and newtypes checked at compile time
//!
//! ## Quick Start
//!
//! ```rust
//! use async_signal_fsm::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, Eq)]
//! enum Event {
//!     PowerOn,
//! }
//!
//! const OFF: StateInstance = StateInstance::new(0);
//! const ON: StateInstance = StateInstance::new(1);
//!
//! # async fn example() -> Result<()> {
//! let mut machine = FlatMachineBuilder::new(0u32)
//!     .state(0, "off", |signal: &Signal<Event>, _powered: &mut u32| {
//!         match signal {
//!             Signal::User(Event::PowerOn) => Response::Transition(ON),
//!             _ => Response::Handled,
//!         }
//!     })
//!     .state(1, "on", |signal: &Signal<Event>, powered: &mut u32| {
//!         if matches!(signal, Signal::Entry) {
//!             *powered += 1;
//!         }
//!         Response::Handled
//!     })
//!     .build();
//!
//! machine.init(OFF)?;
//! machine.dispatch(Signal::User(Event::PowerOn)).await?;
//! assert_eq!(machine.current_instance(), ON);
//! assert_eq!(*machine.context(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Handlers can also be structs implementing [`StateHandler`]; see the
//! `demos/` directory for hierarchical examples.
//!
//! ## Errors
//!
//! Operations return [`Error`] on failure: `InvalidArgument` for malformed
//! calls, `InvalidData` for out-of-range query instances, and `Fault` when a
//! handler or the transducer aborts a dispatch mid-cascade.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub use async_trait::async_trait;

mod builder;
mod error;
mod flat;
mod hierarchical;
mod state;

#[cfg(all(feature = "plantuml", debug_assertions))]
mod plantuml;

pub use builder::{FlatMachineBuilder, HierarchicalMachineBuilder};
pub use error::{Error, Result};
pub use flat::FlatStateMachine;
pub use hierarchical::{DispatchMode, HierarchicalStateMachine};
pub use state::{
    Response, Signal, StateDescriptor, StateHandler, StateInstance, StateTable, TransducerFn,
};

pub mod prelude {
    //! Prelude module for convenient imports
    pub use crate::{
        DispatchMode, Error, FlatMachineBuilder, FlatStateMachine, HierarchicalMachineBuilder,
        HierarchicalStateMachine, Response, Result, Signal, StateHandler, StateInstance,
    };
    pub use async_trait::async_trait;
}
