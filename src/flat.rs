//! Flat (non-hierarchical) engine: a single active state, run-to-completion
//! chaining, and deferred entry/exit delivery.

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::state::{Response, Signal, StateInstance, StateTable, TransducerFn};

/// Sequential state machine over a flat table.
///
/// One state is active at a time. A dispatched signal is delivered to the
/// active state's handler; when the handler requests a transition, the engine
/// chains within the same `dispatch` call until a handler reports
/// [`Response::Handled`]. Every hop delivers `Exit` to the state being left,
/// the transducer notification, and `Entry` to the state being entered.
///
/// Entry of the initial state is deferred to the first `dispatch` call:
/// [`FlatStateMachine::init`] only records where the machine starts.
pub struct FlatStateMachine<CTX, E> {
    table: StateTable<CTX, E>,
    context: CTX,
    current: StateInstance,
    previous: StateInstance,
    transducer: Option<TransducerFn<CTX, E>>,

    #[cfg(all(feature = "plantuml", debug_assertions))]
    transition_log: std::collections::HashSet<(StateInstance, StateInstance)>,
}

impl<CTX, E> FlatStateMachine<CTX, E>
where
    CTX: Send,
    E: Clone + Debug + Send + Sync,
{
    pub(crate) fn new(
        table: StateTable<CTX, E>,
        context: CTX,
        transducer: Option<TransducerFn<CTX, E>>,
    ) -> Self {
        Self {
            table,
            context,
            current: StateInstance::INVALID,
            previous: StateInstance::INVALID,
            transducer,

            #[cfg(all(feature = "plantuml", debug_assertions))]
            transition_log: std::collections::HashSet::new(),
        }
    }

    /// Arm the machine with its starting state.
    ///
    /// Fails with [`Error::InvalidArgument`] when the table is empty, does
    /// not fit the instance index space, or `initial` is out of range. The
    /// initial state's `Entry` is delivered by the first `dispatch`, not
    /// here.
    pub fn init(&mut self, initial: StateInstance) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::InvalidArgument("state table is empty"));
        }
        if self.table.len() >= StateInstance::INVALID.index() {
            return Err(Error::InvalidArgument(
                "state table does not fit the instance index space",
            ));
        }
        if !self.table.contains(initial) {
            return Err(Error::InvalidArgument("initial instance out of range"));
        }

        self.current = initial;
        self.previous = StateInstance::INVALID;
        Ok(())
    }

    /// Whether `instance` names a row of the bound table.
    pub fn is_valid(&self, instance: StateInstance) -> bool {
        self.table.contains(instance)
    }

    /// Display name of the state at `instance`, `None` when out of range.
    pub fn state_name(&self, instance: StateInstance) -> Option<&'static str> {
        self.table.name(instance)
    }

    /// Application id of the state at `instance`; [`Error::InvalidData`] when
    /// out of range.
    pub fn state_id(&self, instance: StateInstance) -> Result<u32> {
        self.table.id(instance)
    }

    /// The active instance, or [`StateInstance::INVALID`] before `init`.
    pub fn current_instance(&self) -> StateInstance {
        self.current
    }

    /// Shared view of the state table.
    pub fn table(&self) -> &StateTable<CTX, E> {
        &self.table
    }

    /// Get a reference to the context
    pub fn context(&self) -> &CTX {
        &self.context
    }

    /// Get a mutable reference to the context
    pub fn context_mut(&mut self) -> &mut CTX {
        &mut self.context
    }

    /// Dispatch one input signal and run every resulting transition to
    /// completion.
    ///
    /// On the very first call the initial state receives `Entry` before the
    /// caller's signal. Each chained hop delivers exactly one `Exit` to the
    /// state being left, fires the transducer, and delivers exactly one
    /// `Entry` to the state being entered, all before this call returns. A
    /// [`Response::Error`] from any handler or an `Err` from the transducer
    /// aborts with [`Error::Fault`], leaving the machine wherever the chain
    /// reached.
    pub async fn dispatch(&mut self, input: Signal<E>) -> Result<()> {
        if self.current == StateInstance::INVALID {
            return Err(Error::InvalidArgument("machine is not initialized"));
        }

        let mut signal = input;
        loop {
            if self.previous != self.current {
                // A transition is outstanding: tear down the old state and
                // announce the move before the new state sees any signal.
                let pending = signal.clone();
                signal = Signal::Exit;
                if self.previous != StateInstance::INVALID {
                    self.deliver_sequenced(self.previous, &signal).await?;
                }

                if let Some(transducer) = self.transducer.as_mut() {
                    transducer(&self.table, self.previous, self.current, &signal)
                        .map_err(|reason| Error::Fault(self.current, reason))?;
                }
                self.log_transition(self.previous, self.current);
                tracing::debug!(from = %self.previous, to = %self.current, "flat transition committed");

                signal = Signal::Entry;
                if self.previous == StateInstance::INVALID {
                    // Very first transition: the initial state is entered
                    // here, then the caller's signal is restored. Chained
                    // hops instead receive `Entry` through the delivery
                    // below.
                    self.deliver_sequenced(self.current, &signal).await?;
                    signal = pending;
                }

                self.previous = self.current;
            }

            let state = self.current;
            tracing::trace!(state = %state, signal = ?signal, "flat delivery");
            match self
                .table
                .handler_mut(state)
                .on_signal(&signal, &mut self.context)
                .await
            {
                Response::Handled => return Ok(()),
                Response::Error(reason) => return Err(Error::Fault(state, reason)),
                Response::Transition(next) => self.transition(next)?,
            }
        }
    }

    /// Deliver a synthesized `Exit`/`Entry` signal. Transition requests are
    /// not honored from these deliveries; faults abort the dispatch.
    async fn deliver_sequenced(&mut self, instance: StateInstance, signal: &Signal<E>) -> Result<()> {
        tracing::trace!(state = %instance, signal = ?signal, "flat delivery");
        match self
            .table
            .handler_mut(instance)
            .on_signal(signal, &mut self.context)
            .await
        {
            Response::Error(reason) => Err(Error::Fault(instance, reason)),
            Response::Handled | Response::Transition(_) => Ok(()),
        }
    }

    /// Apply a handler-requested transition target.
    fn transition(&mut self, next: StateInstance) -> Result<()> {
        if !self.table.contains(next) {
            return Err(Error::InvalidArgument("transition target out of range"));
        }
        self.current = next;
        Ok(())
    }

    #[cfg(all(feature = "plantuml", debug_assertions))]
    fn log_transition(&mut self, from: StateInstance, to: StateInstance) {
        self.transition_log.insert((from, to));
    }

    #[cfg(not(all(feature = "plantuml", debug_assertions)))]
    fn log_transition(&mut self, _from: StateInstance, _to: StateInstance) {
        // No-op when plantuml feature is disabled or in release builds
    }

    /// Render the transitions seen so far as a PlantUML state diagram.
    #[cfg(all(feature = "plantuml", debug_assertions))]
    pub fn export_plantuml(&self) -> String {
        crate::plantuml::generate_plantuml(&self.transition_log, self.current, &self.table)
    }

    /// Stub for export_plantuml when the feature is disabled
    #[cfg(not(all(feature = "plantuml", debug_assertions)))]
    pub fn export_plantuml(&self) -> String {
        String::from("PlantUML export not available (requires 'plantuml' feature and debug build)")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::builder::FlatMachineBuilder;
    use crate::state::StateHandler;
    use async_trait::async_trait;

    const S0: StateInstance = StateInstance::new(0);
    const S1: StateInstance = StateInstance::new(1);
    const S2: StateInstance = StateInstance::new(2);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Go,
        Nudge,
    }

    #[derive(Debug, Clone, Default)]
    struct Trace(Arc<Mutex<Vec<String>>>);

    impl Trace {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    struct Station {
        name: &'static str,
        chain_on_entry: Option<StateInstance>,
        go_to: Option<StateInstance>,
        fail_on_exit: bool,
    }

    impl Station {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                chain_on_entry: None,
                go_to: None,
                fail_on_exit: false,
            }
        }

        fn go_to(mut self, next: StateInstance) -> Self {
            self.go_to = Some(next);
            self
        }

        fn chain_on_entry(mut self, next: StateInstance) -> Self {
            self.chain_on_entry = Some(next);
            self
        }

        fn fail_on_exit(mut self) -> Self {
            self.fail_on_exit = true;
            self
        }
    }

    #[async_trait]
    impl StateHandler<Trace, Event> for Station {
        async fn on_signal(&mut self, signal: &Signal<Event>, trace: &mut Trace) -> Response {
            match signal {
                Signal::Entry => {
                    trace.push(format!("entry:{}", self.name));
                    match self.chain_on_entry {
                        Some(next) => Response::Transition(next),
                        None => Response::Handled,
                    }
                }
                Signal::Exit => {
                    trace.push(format!("exit:{}", self.name));
                    if self.fail_on_exit {
                        Response::Error("exit refused".to_string())
                    } else {
                        Response::Handled
                    }
                }
                Signal::User(Event::Go) => {
                    trace.push(format!("go:{}", self.name));
                    match self.go_to {
                        Some(next) => Response::Transition(next),
                        None => Response::Handled,
                    }
                }
                _ => Response::Handled,
            }
        }
    }

    fn recording_transducer(log: Arc<Mutex<Vec<String>>>) -> TransducerFn<Trace, Event> {
        Box::new(move |_table, from, to, _input| {
            log.lock().unwrap().push(format!("transducer:{from}->{to}"));
            Ok(())
        })
    }

    #[tokio::test]
    async fn first_dispatch_enters_before_delivering() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0"))
            .build();
        machine.init(S0).unwrap();

        machine.dispatch(Signal::User(Event::Go)).await.unwrap();

        assert_eq!(trace.entries(), vec!["entry:s0", "go:s0"]);
        assert_eq!(machine.current_instance(), S0);
    }

    #[tokio::test]
    async fn chained_transitions_pair_exit_and_entry_per_hop() {
        let trace = Trace::default();
        let hops = Arc::new(Mutex::new(Vec::new()));
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0").go_to(S1))
            .state(11, "s1", Station::new("s1").chain_on_entry(S2))
            .state(12, "s2", Station::new("s2"))
            .transducer(recording_transducer(Arc::clone(&hops)))
            .build();
        machine.init(S0).unwrap();

        machine.dispatch(Signal::User(Event::Go)).await.unwrap();

        assert_eq!(
            trace.entries(),
            vec![
                "entry:s0", "go:s0", "exit:s0", "entry:s1", "exit:s1", "entry:s2",
            ]
        );
        assert_eq!(
            hops.lock().unwrap().clone(),
            vec![
                "transducer:<invalid>->0",
                "transducer:0->1",
                "transducer:1->2",
            ]
        );
        assert_eq!(machine.current_instance(), S2);
    }

    #[tokio::test]
    async fn transducer_fires_between_exit_and_entry() {
        let trace = Trace::default();
        let shared = trace.0.clone();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0").go_to(S1))
            .state(11, "s1", Station::new("s1"))
            .transducer(recording_transducer(shared))
            .build();
        machine.init(S0).unwrap();

        machine.dispatch(Signal::User(Event::Go)).await.unwrap();

        assert_eq!(
            trace.entries(),
            vec![
                "transducer:<invalid>->0",
                "entry:s0",
                "go:s0",
                "exit:s0",
                "transducer:0->1",
                "entry:s1",
            ]
        );
    }

    #[tokio::test]
    async fn out_of_range_transition_is_rejected_in_place() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0").go_to(StateInstance::new(9)))
            .build();
        machine.init(S0).unwrap();

        let result = machine.dispatch(Signal::User(Event::Go)).await;

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(machine.current_instance(), S0);
    }

    #[tokio::test]
    async fn fault_from_exit_aborts_the_whole_dispatch() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0").go_to(S1).fail_on_exit())
            .state(11, "s1", Station::new("s1"))
            .build();
        machine.init(S0).unwrap();

        let result = machine.dispatch(Signal::User(Event::Go)).await;

        assert!(matches!(result, Err(Error::Fault(instance, _)) if instance == S0));
        // s1 was never entered
        assert_eq!(trace.entries(), vec!["entry:s0", "go:s0", "exit:s0"]);
    }

    #[tokio::test]
    async fn transducer_fault_aborts_before_entry() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0").go_to(S1))
            .state(11, "s1", Station::new("s1"))
            .transducer(|_table, from, _to, _input| {
                if from == StateInstance::INVALID {
                    Ok(())
                } else {
                    Err("refused".to_string())
                }
            })
            .build();
        machine.init(S0).unwrap();

        let result = machine.dispatch(Signal::User(Event::Go)).await;

        assert!(matches!(result, Err(Error::Fault(instance, _)) if instance == S1));
        assert_eq!(trace.entries(), vec!["entry:s0", "go:s0", "exit:s0"]);
    }

    #[tokio::test]
    async fn dispatch_before_init_fails_without_deliveries() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0"))
            .build();

        let result = machine.dispatch(Signal::User(Event::Go)).await;

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(trace.entries().is_empty());
    }

    #[tokio::test]
    async fn queries_are_idempotent_and_read_only() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(42, "s0", Station::new("s0"))
            .state(43, "s1", Station::new("s1"))
            .build();
        machine.init(S0).unwrap();

        for _ in 0..3 {
            assert_eq!(machine.state_name(S1), Some("s1"));
            assert_eq!(machine.state_id(S1).unwrap(), 43);
            assert!(machine.is_valid(S1));
        }
        assert_eq!(machine.state_name(StateInstance::new(5)), None);
        assert!(matches!(
            machine.state_id(StateInstance::new(5)),
            Err(Error::InvalidData(_))
        ));
        assert!(!machine.is_valid(StateInstance::new(5)));

        // no handler ran, no state moved
        assert!(trace.entries().is_empty());
        assert_eq!(machine.current_instance(), S0);
    }

    #[tokio::test]
    async fn init_rejects_empty_table_and_bad_initial() {
        let trace = Trace::default();
        let mut empty: FlatStateMachine<Trace, Event> =
            FlatMachineBuilder::new(trace.clone()).build();
        assert!(matches!(
            empty.init(S0),
            Err(Error::InvalidArgument(_))
        ));

        let mut machine = FlatMachineBuilder::new(trace)
            .state(10, "s0", Station::new("s0"))
            .build();
        assert!(matches!(
            machine.init(StateInstance::new(3)),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(machine.current_instance(), StateInstance::INVALID);
    }

    #[tokio::test]
    async fn reinit_restarts_the_entry_sequence() {
        let trace = Trace::default();
        let mut machine = FlatMachineBuilder::new(trace.clone())
            .state(10, "s0", Station::new("s0"))
            .state(11, "s1", Station::new("s1"))
            .build();
        machine.init(S0).unwrap();
        machine.dispatch(Signal::User(Event::Nudge)).await.unwrap();
        trace.clear();

        machine.init(S1).unwrap();
        machine.dispatch(Signal::User(Event::Nudge)).await.unwrap();

        assert_eq!(trace.entries(), vec!["entry:s1"]);
        assert_eq!(machine.current_instance(), S1);
    }
}
