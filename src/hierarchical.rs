//! Hierarchical engine: parent/child state composition, Least Common
//! Ancestor transition resolution, and ordered entry/init/exit cascades.

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::state::{Response, Signal, StateInstance, StateTable, TransducerFn};

/// Delivery policy for user-defined signals.
///
/// System signals (`Entry`, `Init`, `Exit`, `Unknown`) are always delivered
/// to whichever state the engine is processing; the mode only decides how far
/// up the ancestor chain a user signal travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// A user signal visits every ancestor of the active leaf, top-down,
    /// before reaching the leaf itself.
    PassThrough,
    /// A user signal reaches only the active leaf.
    CurrentNode,
}

/// State machine over a tree-shaped table.
///
/// States form a forest through their parent slots; exactly one leaf is
/// active at a time, together with all of its ancestors. A transition
/// computes the Least Common Ancestor of the old and new leaves, exits
/// every state between the old leaf and the LCA, and enters every state
/// between the LCA and the new leaf, delivering `Entry`/`Init`/`Exit` in
/// hierarchical order, even when the request arrives while a previous
/// cascade is still entering states.
///
/// The active configuration is built lazily: [`HierarchicalStateMachine::init`]
/// records the designated leaf, and the first `dispatch` enters the whole
/// path from the tree root down to it before handling the caller's signal.
pub struct HierarchicalStateMachine<CTX, E> {
    table: StateTable<CTX, E>,
    context: CTX,
    /// Committed active leaf; `ROOT` between `init` and the first dispatch.
    current: StateInstance,
    /// State whose handler is being (or was last) invoked.
    processing: StateInstance,
    mode: DispatchMode,
    transducer: Option<TransducerFn<CTX, E>>,

    #[cfg(all(feature = "plantuml", debug_assertions))]
    transition_log: std::collections::HashSet<(StateInstance, StateInstance)>,
}

impl<CTX, E> HierarchicalStateMachine<CTX, E>
where
    CTX: Send,
    E: Clone + Debug + Send + Sync,
{
    pub(crate) fn new(
        table: StateTable<CTX, E>,
        context: CTX,
        mode: DispatchMode,
        transducer: Option<TransducerFn<CTX, E>>,
    ) -> Self {
        Self {
            table,
            context,
            current: StateInstance::INVALID,
            processing: StateInstance::INVALID,
            mode,
            transducer,

            #[cfg(all(feature = "plantuml", debug_assertions))]
            transition_log: std::collections::HashSet::new(),
        }
    }

    /// Arm the machine with its designated initial leaf.
    ///
    /// Validates the table shape: non-empty, small enough that both
    /// sentinels stay out of range, every parent slot in range, and no
    /// cycles in the parent graph. Nothing is entered here; `current`
    /// becomes [`StateInstance::ROOT`] until the first `dispatch` constructs
    /// the active configuration.
    pub fn init(&mut self, initial: StateInstance) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::InvalidArgument("state table is empty"));
        }
        if self.table.len() >= StateInstance::ROOT.index() {
            return Err(Error::InvalidArgument(
                "state table does not fit the instance index space",
            ));
        }
        if !self.table.contains(initial) {
            return Err(Error::InvalidArgument("initial instance out of range"));
        }
        self.validate_parent_links()?;

        self.current = StateInstance::ROOT;
        self.processing = initial;
        Ok(())
    }

    fn validate_parent_links(&self) -> Result<()> {
        for descriptor in self.table.iter() {
            let mut hops = 0usize;
            let mut cursor = descriptor.parent();
            while let Some(parent) = cursor {
                if !self.table.contains(parent) {
                    return Err(Error::InvalidArgument("parent slot out of range"));
                }
                hops += 1;
                if hops > self.table.len() {
                    return Err(Error::InvalidArgument("parent links form a cycle"));
                }
                cursor = self.table.parent_of(parent);
            }
        }
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

    /// The committed active leaf: [`StateInstance::ROOT`] before the first
    /// dispatch, [`StateInstance::INVALID`] before `init`.
    pub fn current_instance(&self) -> StateInstance {
        self.current
    }

    /// Display name of the active leaf, `None` while only a sentinel is
    /// recorded.
    pub fn current_state_name(&self) -> Option<&'static str> {
        self.table.name(self.current)
    }

    /// The state whose handler is being (or was last) invoked; after a
    /// completed dispatch this equals the active leaf.
    pub fn processing_instance(&self) -> StateInstance {
        self.processing
    }

    /// Display name of the processing state.
    pub fn processing_state_name(&self) -> Option<&'static str> {
        self.table.name(self.processing)
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

    /// Dispatch one input signal and run every resulting cascade to
    /// completion.
    ///
    /// The first call constructs the active configuration: `Entry` to every
    /// state from the tree root down to the designated leaf, `Init` to the
    /// leaf, then the caller's signal replayed to the leaf (unless it was
    /// itself `Init`). Subsequent calls deliver the signal according to the
    /// [`DispatchMode`], honoring transition requests as described on
    /// [`HierarchicalStateMachine`].
    pub async fn dispatch(&mut self, input: Signal<E>) -> Result<()> {
        if self.current == StateInstance::INVALID {
            return Err(Error::InvalidArgument("machine is not initialized"));
        }

        let first = self.current == StateInstance::ROOT;
        let saved = input.clone();
        let mut signal = input;

        if first {
            // Construction pass: commit the designated leaf and announce it
            // before anything is entered.
            self.current = self.processing;
            self.fire_transducer(StateInstance::ROOT, self.current, &saved)?;
            self.log_transition(StateInstance::ROOT, self.current);
            signal = Signal::Entry;
        }

        // The leaf being entered or already active, and the exclusive upper
        // bound of the descent (`None` = above every top-level state).
        let mut leaf = self.current;
        let mut entry_target: Option<StateInstance> = None;

        loop {
            if Some(leaf) == entry_target {
                // The transition landed exactly on its LCA; nothing to enter.
                break;
            }

            // Next state to process, top-down: walk up from the leaf until
            // the parent is the current entry target.
            let mut step = leaf;
            loop {
                let parent = self.table.parent_of(step);
                if parent == entry_target {
                    break;
                }
                match parent {
                    Some(parent) => step = parent,
                    None => break,
                }
            }

            self.processing = step;
            let at_leaf = step == leaf;
            let deliver =
                signal.is_system() || self.mode == DispatchMode::PassThrough || at_leaf;

            let mut requested = None;
            if deliver {
                requested = self.deliver(step, &signal).await?;
            }

            // Entering the leaf completes with `Init`, plus the caller's
            // original signal on the construction pass.
            if requested.is_none() && at_leaf && matches!(signal, Signal::Entry) {
                requested = self.deliver(step, &Signal::Init).await?;
                if requested.is_some() {
                    signal = Signal::Init;
                } else if first && !matches!(saved, Signal::Init) {
                    signal = saved.clone();
                    requested = self.deliver(step, &signal).await?;
                }
            }

            if let Some(next) = requested {
                if !self.table.contains(next) {
                    return Err(Error::InvalidArgument("transition target out of range"));
                }

                let source = leaf;
                let lca = self.least_common_ancestor(source, next);
                self.current = next;

                // Fires after LCA computation and before any exit, so an
                // observer fault vetoes the cascade with no state torn down.
                self.fire_transducer(source, next, &signal)?;
                self.log_transition(source, next);
                tracing::debug!(from = %source, to = %next, lca = ?lca, "hierarchical transition committed");

                let exit_signal = Signal::Exit;
                let mut cursor = source;
                while Some(cursor) != lca {
                    self.processing = cursor;
                    self.deliver_exit(cursor, &exit_signal).await?;
                    match self.table.parent_of(cursor) {
                        Some(parent) => cursor = parent,
                        None => break,
                    }
                }

                signal = Signal::Entry;
                leaf = next;
                entry_target = lca;
                continue;
            }

            if at_leaf {
                break;
            }
            entry_target = Some(step);
        }

        self.processing = self.current;
        Ok(())
    }

    /// Deliver `signal` to one state and surface any transition request.
    async fn deliver(
        &mut self,
        instance: StateInstance,
        signal: &Signal<E>,
    ) -> Result<Option<StateInstance>> {
        tracing::trace!(state = %instance, signal = ?signal, "hierarchical delivery");
        match self
            .table
            .handler_mut(instance)
            .on_signal(signal, &mut self.context)
            .await
        {
            Response::Handled => Ok(None),
            Response::Transition(next) => Ok(Some(next)),
            Response::Error(reason) => Err(Error::Fault(instance, reason)),
        }
    }

    /// Deliver `Exit` to one state. Transition requests are not honored
    /// while tearing down; faults abort the dispatch.
    async fn deliver_exit(&mut self, instance: StateInstance, signal: &Signal<E>) -> Result<()> {
        tracing::trace!(state = %instance, signal = ?signal, "hierarchical delivery");
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

    fn fire_transducer(
        &mut self,
        from: StateInstance,
        to: StateInstance,
        input: &Signal<E>,
    ) -> Result<()> {
        if let Some(transducer) = self.transducer.as_mut() {
            transducer(&self.table, from, to, input)
                .map_err(|reason| Error::Fault(to, reason))?;
        }
        Ok(())
    }

    /// Deepest state that is an ancestor of (or equal to) both `a` and `b`.
    ///
    /// `None` when the two share no ancestor (both paths reach distinct tree
    /// roots). A self-transition resolves to the leaf's parent, so the leaf
    /// itself is exited and re-entered.
    fn least_common_ancestor(
        &self,
        a: StateInstance,
        b: StateInstance,
    ) -> Option<StateInstance> {
        if a == b {
            return self.table.parent_of(a);
        }

        let mut from = Some(a);
        while let Some(candidate) = from {
            let mut to = Some(b);
            while let Some(other) = to {
                if candidate == other {
                    return Some(candidate);
                }
                to = self.table.parent_of(other);
            }
            from = self.table.parent_of(candidate);
        }
        None
    }

    #[cfg(all(feature = "plantuml", debug_assertions))]
    fn log_transition(&mut self, from: StateInstance, to: StateInstance) {
        self.transition_log.insert((from, to));
    }

    #[cfg(not(all(feature = "plantuml", debug_assertions)))]
    fn log_transition(&mut self, _from: StateInstance, _to: StateInstance) {
        // No-op when plantuml feature is disabled or in release builds
    }

    /// Render the hierarchy and the transitions seen so far as a PlantUML
    /// state diagram.
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
