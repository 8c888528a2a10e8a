//! Shared building blocks: state instances, signals, handler capabilities,
//! descriptors, and the transducer hook.

use std::fmt;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Index of a state within its table.
///
/// Instances are dense table positions; two reserved sentinels sit at the top
/// of the `u16` range so a table can never contain them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateInstance(u16);

impl StateInstance {
    /// The hierarchical machine has not entered any real state yet.
    pub const ROOT: StateInstance = StateInstance(0xFFFE);

    /// Lookup failed, or the machine is uninitialized.
    pub const INVALID: StateInstance = StateInstance(0xFFFF);

    /// Name a table position. Usable in `const` context:
    ///
    /// ```
    /// use async_signal_fsm::StateInstance;
    /// const STANDBY: StateInstance = StateInstance::new(1);
    /// ```
    pub const fn new(raw: u16) -> Self {
        StateInstance(raw)
    }

    /// The raw table position this instance refers to.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is the `ROOT` or `INVALID` sentinel.
    pub const fn is_sentinel(self) -> bool {
        self.0 >= Self::ROOT.0
    }
}

impl From<u16> for StateInstance {
    fn from(raw: u16) -> Self {
        StateInstance(raw)
    }
}

impl fmt::Display for StateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ROOT => f.write_str("<root>"),
            Self::INVALID => f.write_str("<invalid>"),
            StateInstance(raw) => write!(f, "{raw}"),
        }
    }
}

/// Event value delivered to a state handler.
///
/// `Unknown`, `Entry`, `Init`, and `Exit` form the reserved system range;
/// everything application-defined travels as `User`. `Init` is only ever
/// synthesized by the hierarchical engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal<E> {
    /// Placeholder signal; carries no meaning to the engines.
    Unknown,
    /// The state is being entered.
    Entry,
    /// The state has just become the active leaf (hierarchical engine only).
    Init,
    /// The state is being left.
    Exit,
    /// An application-defined signal.
    User(E),
}

impl<E> Signal<E> {
    /// Whether this is one of the reserved system signals.
    pub fn is_system(&self) -> bool {
        !matches!(self, Signal::User(_))
    }
}

/// Verdict returned by a state handler for one delivered signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Signal consumed; no transition requested.
    Handled,
    /// Request a transition, processed within the same dispatch call. An
    /// out-of-range target aborts the dispatch with
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) and leaves
    /// the active state unchanged.
    Transition(StateInstance),
    /// Raise a fault; the dispatch aborts with
    /// [`Error::Fault`](crate::Error::Fault).
    Error(String),
}

/// Capability implemented by every state: react to one signal at a time.
///
/// A handler receives the in-flight signal together with mutable access to
/// the machine-wide context and answers with a [`Response`]. Plain closures
/// of shape `FnMut(&Signal<E>, &mut CTX) -> Response` implement this trait
/// through a blanket impl.
#[async_trait]
pub trait StateHandler<CTX, E>: Send {
    /// React to `signal`.
    async fn on_signal(&mut self, signal: &Signal<E>, context: &mut CTX) -> Response;
}

#[async_trait]
impl<CTX, E, F> StateHandler<CTX, E> for F
where
    F: FnMut(&Signal<E>, &mut CTX) -> Response + Send,
    CTX: Send,
    E: Sync,
{
    async fn on_signal(&mut self, signal: &Signal<E>, context: &mut CTX) -> Response {
        (self)(signal, context)
    }
}

/// One row of a state table, immutable after construction.
pub struct StateDescriptor<CTX, E> {
    instance: StateInstance,
    id: u32,
    name: &'static str,
    parent: Option<StateInstance>,
    handler: Box<dyn StateHandler<CTX, E>>,
}

impl<CTX, E> StateDescriptor<CTX, E> {
    pub(crate) fn new(
        instance: StateInstance,
        id: u32,
        name: &'static str,
        parent: Option<StateInstance>,
        handler: Box<dyn StateHandler<CTX, E>>,
    ) -> Self {
        Self {
            instance,
            id,
            name,
            parent,
            handler,
        }
    }

    /// The table position of this state; equals its insertion order.
    pub fn instance(&self) -> StateInstance {
        self.instance
    }

    /// Application-defined tag, opaque to the engines.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Display label, used only for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parent slot, `None` for a top-level state.
    pub fn parent(&self) -> Option<StateInstance> {
        self.parent
    }
}

/// Ordered, fixed-after-build sequence of state descriptors.
///
/// Both engines reference their table through this type; all instance
/// validation and name/id lookups live here.
pub struct StateTable<CTX, E> {
    states: Vec<StateDescriptor<CTX, E>>,
}

impl<CTX, E> StateTable<CTX, E> {
    pub(crate) fn new(states: Vec<StateDescriptor<CTX, E>>) -> Self {
        Self { states }
    }

    /// Number of states in the table.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the table has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether `instance` names a row of this table.
    pub fn contains(&self, instance: StateInstance) -> bool {
        instance.index() < self.states.len()
    }

    /// The descriptor at `instance`, `None` when out of range.
    pub fn descriptor(&self, instance: StateInstance) -> Option<&StateDescriptor<CTX, E>> {
        self.states.get(instance.index())
    }

    /// Display name of the state at `instance`, `None` when out of range.
    pub fn name(&self, instance: StateInstance) -> Option<&'static str> {
        self.descriptor(instance).map(StateDescriptor::name)
    }

    /// Application id of the state at `instance`.
    pub fn id(&self, instance: StateInstance) -> Result<u32> {
        self.descriptor(instance)
            .map(StateDescriptor::id)
            .ok_or(Error::InvalidData(instance))
    }

    /// Parent slot of the state at `instance`; `None` for top-level states
    /// and out-of-range instances alike.
    pub fn parent_of(&self, instance: StateInstance) -> Option<StateInstance> {
        self.descriptor(instance).and_then(StateDescriptor::parent)
    }

    /// Iterate over the descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &StateDescriptor<CTX, E>> {
        self.states.iter()
    }

    /// Handler of a previously validated instance.
    pub(crate) fn handler_mut(&mut self, instance: StateInstance) -> &mut dyn StateHandler<CTX, E> {
        self.states[instance.index()].handler.as_mut()
    }
}

/// Observer invoked once per committed transition.
///
/// Receives the full table, the source instance (`INVALID`/`ROOT` on the
/// respective engine's very first entry), the destination instance, and the
/// input in effect at the moment of commit. Informational only, but an
/// `Err` return aborts the in-progress dispatch with
/// [`Error::Fault`](crate::Error::Fault).
pub type TransducerFn<CTX, E> = Box<
    dyn FnMut(
            &StateTable<CTX, E>,
            StateInstance,
            StateInstance,
            &Signal<E>,
        ) -> std::result::Result<(), String>
        + Send,
>;
