//! The off-graph builder a writer mutates before publishing a new arena
//! snapshot (spec §5 publication rule: "constructing the new sub-chain
//! entirely off-graph, then atomically installing the root pointer").

use super::state::{ByteState, ByteTransition};
use crate::state_id::ByteStateId;

#[derive(Clone, Debug, Default)]
pub(crate) struct Graph {
    pub(crate) states: Vec<ByteState>,
}

impl Graph {
    pub(crate) fn from_published(states: &[ByteState]) -> Self {
        Graph {
            states: states.to_vec(),
        }
    }

    pub(crate) fn alloc(&mut self) -> ByteStateId {
        let id = ByteStateId(self.states.len() as u32);
        self.states.push(ByteState::default());
        id
    }

    pub(crate) fn get(&self, id: ByteStateId) -> &ByteState {
        &self.states[id.to_usize()]
    }

    pub(crate) fn get_mut(&mut self, id: ByteStateId) -> &mut ByteState {
        &mut self.states[id.to_usize()]
    }

    pub(crate) fn transitions_on(&self, id: ByteStateId, byte: u8) -> &[ByteTransition] {
        self.get(id).trans.get(byte)
    }

    pub(crate) fn push_transition(&mut self, id: ByteStateId, byte: u8, transition: ByteTransition) {
        self.get_mut(id).trans.entry(byte).push(transition);
    }
}
