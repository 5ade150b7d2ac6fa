//! Variable bindings of one function.

use std::collections::HashMap;

use super::CodegenError;
use crate::ir::{ScalarType, Slot, SlotId};

/// Variables of the function being emitted. Each name owns one slot for the
/// whole function, and its type is fixed by the first binding.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, (SlotId, ScalarType)>,
    slots: Vec<Slot>,
}

impl SymbolTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a slot of type `ty`. Rebinding with the same type
    /// returns the existing slot.
    pub fn declare(&mut self, name: &str, ty: ScalarType) -> Result<SlotId, CodegenError> {
        if let Some(&(slot, previous)) = self.entries.get(name) {
            if previous != ty {
                return Err(CodegenError::Redeclaration {
                    name: name.to_string(),
                    previous,
                    attempted: ty,
                });
            }
            return Ok(slot);
        }

        let slot = SlotId(self.slots.len() as u32);
        self.slots.push(Slot {
            name: name.to_string(),
            ty,
        });
        self.entries.insert(name.to_string(), (slot, ty));
        Ok(slot)
    }

    /// Slot and type bound to `name`.
    pub fn lookup(&self, name: &str) -> Result<(SlotId, ScalarType), CodegenError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnboundName {
                name: name.to_string(),
            })
    }

    /// Hand the allocated slots over to the finished function.
    pub fn into_slots(self) -> Vec<Slot> {
        self.slots
    }
}
