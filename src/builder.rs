//! Builder pattern implementation for both engines

use std::fmt::Debug;

use crate::flat::FlatStateMachine;
use crate::hierarchical::{DispatchMode, HierarchicalStateMachine};
use crate::state::{
    Signal, StateDescriptor, StateHandler, StateInstance, StateTable, TransducerFn,
};

/// Builder for [`FlatStateMachine`].
///
/// States receive their [`StateInstance`] from insertion order: the first
/// `state` call describes instance `0`, the next instance `1`, and so on.
pub struct FlatMachineBuilder<CTX, E> {
    context: CTX,
    states: Vec<StateDescriptor<CTX, E>>,
    transducer: Option<TransducerFn<CTX, E>>,
}

impl<CTX, E> FlatMachineBuilder<CTX, E>
where
    CTX: Send + 'static,
    E: Clone + Debug + Send + Sync + 'static,
{
    /// Create a new builder with the given context
    pub fn new(context: CTX) -> Self {
        Self {
            context,
            states: Vec::new(),
            transducer: None,
        }
    }

    /// Append a state; its instance is its position in the table.
    pub fn state<H>(mut self, id: u32, name: &'static str, handler: H) -> Self
    where
        H: StateHandler<CTX, E> + 'static,
    {
        let instance = StateInstance::new(self.states.len() as u16);
        self.states
            .push(StateDescriptor::new(instance, id, name, None, Box::new(handler)));
        self
    }

    /// Install the transition observer.
    pub fn transducer<F>(mut self, transducer: F) -> Self
    where
        F: FnMut(
                &StateTable<CTX, E>,
                StateInstance,
                StateInstance,
                &Signal<E>,
            ) -> std::result::Result<(), String>
            + Send
            + 'static,
    {
        self.transducer = Some(Box::new(transducer));
        self
    }

    /// Build the state machine
    pub fn build(self) -> FlatStateMachine<CTX, E> {
        FlatStateMachine::new(StateTable::new(self.states), self.context, self.transducer)
    }
}

/// Builder for [`HierarchicalStateMachine`].
///
/// States receive their [`StateInstance`] from insertion order; `substate`
/// additionally records the parent slot. Parent references may point
/// anywhere in the table; shape validation happens in
/// [`HierarchicalStateMachine::init`].
pub struct HierarchicalMachineBuilder<CTX, E> {
    context: CTX,
    states: Vec<StateDescriptor<CTX, E>>,
    mode: DispatchMode,
    transducer: Option<TransducerFn<CTX, E>>,
}

impl<CTX, E> HierarchicalMachineBuilder<CTX, E>
where
    CTX: Send + 'static,
    E: Clone + Debug + Send + Sync + 'static,
{
    /// Create a new builder with the given context
    pub fn new(context: CTX) -> Self {
        Self {
            context,
            states: Vec::new(),
            mode: DispatchMode::PassThrough,
            transducer: None,
        }
    }

    /// Append a top-level state; its instance is its position in the table.
    pub fn state<H>(mut self, id: u32, name: &'static str, handler: H) -> Self
    where
        H: StateHandler<CTX, E> + 'static,
    {
        let instance = StateInstance::new(self.states.len() as u16);
        self.states
            .push(StateDescriptor::new(instance, id, name, None, Box::new(handler)));
        self
    }

    /// Append a child of `parent`; its instance is its position in the table.
    pub fn substate<H>(
        mut self,
        parent: StateInstance,
        id: u32,
        name: &'static str,
        handler: H,
    ) -> Self
    where
        H: StateHandler<CTX, E> + 'static,
    {
        let instance = StateInstance::new(self.states.len() as u16);
        self.states.push(StateDescriptor::new(
            instance,
            id,
            name,
            Some(parent),
            Box::new(handler),
        ));
        self
    }

    /// Select how far user-defined signals travel up the ancestor chain.
    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Install the transition observer.
    pub fn transducer<F>(mut self, transducer: F) -> Self
    where
        F: FnMut(
                &StateTable<CTX, E>,
                StateInstance,
                StateInstance,
                &Signal<E>,
            ) -> std::result::Result<(), String>
            + Send
            + 'static,
    {
        self.transducer = Some(Box::new(transducer));
        self
    }

    /// Build the state machine
    pub fn build(self) -> HierarchicalStateMachine<CTX, E> {
        HierarchicalStateMachine::new(
            StateTable::new(self.states),
            self.context,
            self.mode,
            self.transducer,
        )
    }
}
