//! Reassembly of streamed tool-call fragments.

use crate::error::AgentError;
use crate::types::{ToolCall, ToolCallFragment};

/// Upper bound on slot indices accepted from a stream.
pub const MAX_TOOL_CALL_SLOTS: usize = 1024;

/// In-progress tool calls for one completion turn, indexed by stream slot.
///
/// Slots are only ever grown and appended to; they are never reordered or
/// removed.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    slots: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment: grow to cover its index, then append each present field.
    pub fn push(&mut self, fragment: &ToolCallFragment) -> Result<(), AgentError> {
        if fragment.index >= MAX_TOOL_CALL_SLOTS {
            return Err(AgentError::Stream(format!(
                "tool call index {} exceeds limit of {MAX_TOOL_CALL_SLOTS}",
                fragment.index
            )));
        }
        if self.slots.len() <= fragment.index {
            self.slots.resize_with(fragment.index + 1, ToolCall::default);
        }

        let slot = &mut self.slots[fragment.index];
        if let Some(id) = &fragment.id {
            slot.id.push_str(id);
        }
        if let Some(name) = &fragment.name {
            slot.function.name.push_str(name);
        }
        if let Some(arguments) = &fragment.arguments {
            slot.function.arguments.push_str(arguments);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current (possibly partial) state of every slot.
    pub fn slots(&self) -> &[ToolCall] {
        &self.slots
    }

    /// Finalize the turn's tool calls.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
    }
}
