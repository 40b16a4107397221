// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table-driven hierarchical state machine.
//!
//! States form a tree: each state names a parent (or the root) and a
//! default substate to land in when a transition targets it. The machine
//! processes one event per call. Dispatch starts at the current leaf and
//! *bubbles*: if the leaf's transition table has no row for the event, the
//! parent's table is consulted, and so on up to the root. The first
//! matching row wins; its target is resolved down the default-substate
//! chain to a leaf, the machine moves there, and that leaf's action
//! callback runs with the event.
//!
//! The table is plain data — typically a `static` array — so a machine's
//! whole behavior can be read off at a glance:
//!
//! ```
//! use hfsm::{Fsm, StateDef, Transition};
//!
//! const IDLE: u8 = 1;
//! const RUNNING: u8 = 2;
//! const START: u32 = 10;
//!
//! fn note(count: &mut u32, _event: u32) {
//!     *count += 1;
//! }
//!
//! static TABLE: [StateDef<'static, u32, u32>; 2] = [
//!     StateDef {
//!         default_substate: IDLE,
//!         parent: hfsm::ROOT,
//!         transitions: &[Transition { event: START, next: RUNNING }],
//!         action: note,
//!     },
//!     StateDef {
//!         default_substate: RUNNING,
//!         parent: IDLE,
//!         transitions: &[],
//!         action: note,
//!     },
//! ];
//!
//! let mut count = 0;
//! let mut fsm = Fsm::new(&TABLE, IDLE).unwrap();
//! fsm.process_event(START, &mut count);
//! assert_eq!(fsm.current_state(), RUNNING);
//! ```
//!
//! State ids are 1-based so that 0 can mean "no parent"; the table array
//! is indexed by `id - 1`. A state whose `default_substate` is its own id
//! is a leaf. The table is validated once at construction — every id in
//! range, every default-substate chain reaching a leaf, every parent
//! chain reaching the root — so event processing cannot wander off the
//! table or loop forever on a miswired chain.
//!
//! The machine holds no interior mutability and takes `&mut self`;
//! callers serialize access.

#![cfg_attr(not(test), no_std)]

/// States are named by small 1-based ordinals.
pub type StateId = u8;

/// The parent id that marks a state as a root.
pub const ROOT: StateId = 0;

/// One row of a state's transition table.
#[derive(Copy, Clone, Debug)]
pub struct Transition<E> {
    pub event: E,
    /// Target state; inner states are resolved to a leaf through their
    /// default substates.
    pub next: StateId,
}

/// One state's table entry.
pub struct StateDef<'t, E, C> {
    /// Where a transition targeting this state actually lands. A leaf
    /// names itself.
    pub default_substate: StateId,
    /// Enclosing state, or [`ROOT`].
    pub parent: StateId,
    /// Event dispatch rows; scanned linearly, first match wins.
    pub transitions: &'t [Transition<E>],
    /// Runs after the machine arrives in this state (leaves only, since
    /// arrival is always at a leaf).
    pub action: fn(&mut C, E),
}

/// Whether an event found a transition anywhere along the parent chain.
/// Interpreting an unhandled event is caller policy, not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Unhandled,
}

/// A structurally broken state table, reported at construction time with
/// the offending state id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// An id is 0 where a real state is required, or beyond the table.
    BadStateId(StateId),
    /// A default-substate chain does not reach a leaf.
    DefaultCycle(StateId),
    /// A parent chain does not reach the root.
    ParentCycle(StateId),
}

/// A running machine over a borrowed state table.
pub struct Fsm<'t, E, C> {
    table: &'t [StateDef<'t, E, C>],
    current: StateId,
}

impl<'t, E, C> core::fmt::Debug for Fsm<'t, E, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fsm").field("current", &self.current).finish()
    }
}

impl<'t, E: Copy + PartialEq, C> Fsm<'t, E, C> {
    /// Validates `table` and starts the machine in state `initial`.
    ///
    /// `initial` should be a leaf; like [`Self::reset_to`], no resolution
    /// is applied.
    pub fn new(
        table: &'t [StateDef<'t, E, C>],
        initial: StateId,
    ) -> Result<Self, TableError> {
        assert!(
            table.len() <= usize::from(StateId::MAX),
            "state table too large for the id type"
        );
        let count = table.len() as StateId;
        let in_range = |id: StateId| id >= 1 && id <= count;

        // All ids must be in range before any chain can be walked safely.
        for state in table {
            if !in_range(state.default_substate) {
                return Err(TableError::BadStateId(state.default_substate));
            }
            if state.parent != ROOT && !in_range(state.parent) {
                return Err(TableError::BadStateId(state.parent));
            }
            for t in state.transitions {
                if !in_range(t.next) {
                    return Err(TableError::BadStateId(t.next));
                }
            }
        }

        for (i, state) in table.iter().enumerate() {
            let id = (i + 1) as StateId;

            // The default-substate chain must hit a leaf within one hop
            // per state; anything longer is a cycle.
            let mut cursor = id;
            let mut hops = 0;
            while table[usize::from(cursor) - 1].default_substate != cursor {
                cursor = table[usize::from(cursor) - 1].default_substate;
                hops += 1;
                if hops > table.len() {
                    return Err(TableError::DefaultCycle(id));
                }
            }

            // Same argument for the parent chain and the root.
            let mut cursor = state.parent;
            let mut hops = 0;
            while cursor != ROOT {
                cursor = table[usize::from(cursor) - 1].parent;
                hops += 1;
                if hops > table.len() {
                    return Err(TableError::ParentCycle(id));
                }
            }
        }

        if !in_range(initial) {
            return Err(TableError::BadStateId(initial));
        }
        Ok(Self {
            table,
            current: initial,
        })
    }

    /// Dispatches one event, bubbling from the current leaf toward the
    /// root until some state's table claims it.
    ///
    /// On a match the machine moves to the target resolved to a leaf, the
    /// leaf's action runs with `event` and `ctx`, and `Handled` is
    /// returned. If no ancestor claims the event the state is unchanged.
    pub fn process_event(&mut self, event: E, ctx: &mut C) -> Outcome {
        let mut sid = self.current;
        loop {
            let state = &self.table[usize::from(sid) - 1];
            if let Some(t) =
                state.transitions.iter().find(|t| t.event == event)
            {
                let leaf = self.resolve_leaf(t.next);
                self.current = leaf;
                (self.table[usize::from(leaf) - 1].action)(ctx, event);
                return Outcome::Handled;
            }
            if state.parent == ROOT {
                return Outcome::Unhandled;
            }
            sid = state.parent;
        }
    }

    /// Follows default substates from `id` down to a leaf. Terminates
    /// because the constructor proved every chain does.
    fn resolve_leaf(&self, mut id: StateId) -> StateId {
        loop {
            let next = self.table[usize::from(id) - 1].default_substate;
            if next == id {
                return id;
            }
            id = next;
        }
    }

    /// Forces the machine into `id` with no resolution and no actions.
    /// For initialization and fatal-error recovery only; `id` should be a
    /// leaf.
    pub fn reset_to(&mut self, id: StateId) -> Result<(), TableError> {
        if id < 1 || usize::from(id) > self.table.len() {
            return Err(TableError::BadStateId(id));
        }
        self.current = id;
        Ok(())
    }

    /// The current (leaf) state id.
    pub fn current_state(&self) -> StateId {
        self.current
    }
}
