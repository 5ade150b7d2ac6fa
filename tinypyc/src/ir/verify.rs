//! Structural checks run on every module before it leaves the compiler.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::*;

/// Structural defect found in a module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// A function without an entry block
    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },
    /// Two definitions share a name
    #[error("function '{function}' is defined more than once")]
    DuplicateFunction { function: String },
    /// A block without a terminator
    #[error("block '{block}' in '{function}' has no terminator")]
    Unterminated { function: String, block: String },
    /// A branch to a block that does not exist
    #[error("branch in '{function}' targets missing block #{target}")]
    BadBranchTarget { function: String, target: u32 },
    /// Two instructions define the same value
    #[error("value %t{value} in '{function}' is defined more than once")]
    Redefined { function: String, value: u32 },
    /// A use of a value no instruction defines
    #[error("value %t{value} used in '{function}' block '{block}' is never defined")]
    Undefined {
        function: String,
        block: String,
        value: u32,
    },
    /// A use not dominated by the definition
    #[error("value %t{value} used in '{function}' block '{block}' does not dominate its use")]
    NotDominated {
        function: String,
        block: String,
        value: u32,
    },
    /// Parameters or slots that render to the same local name
    #[error("local name '%{name}' is defined more than once in '{function}'")]
    DuplicateLocal { function: String, name: String },
    /// A call to a function neither defined nor declared
    #[error("call in '{function}' to unknown function '{callee}'")]
    UnknownCallee { function: String, callee: String },
    /// A slot, parameter or string index out of range
    #[error("'{function}' references missing {what} #{index}")]
    DanglingReference {
        function: String,
        what: &'static str,
        index: u32,
    },
}

/// Check every function of `module`:
///
/// - each block ends in exactly one terminator and branch targets exist
/// - every value is defined once and its definition dominates each use
/// - calls name a function defined or declared in the module
/// - slot, parameter and string references are in range
/// - parameter and slot names render to distinct locals
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    let mut seen = Vec::new();
    for func in &module.functions {
        if seen.contains(&func.name()) {
            return Err(VerifyError::DuplicateFunction {
                function: func.name().to_string(),
            });
        }
        seen.push(func.name());
        FunctionVerifier::new(module, func).run()?;
    }
    Ok(())
}

struct FunctionVerifier<'a> {
    module: &'a Module,
    func: &'a Function,
    /// Defining block and position of each value
    defs: HashMap<ValueId, (usize, usize)>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(module: &'a Module, func: &'a Function) -> Self {
        Self {
            module,
            func,
            defs: HashMap::new(),
        }
    }

    fn name(&self) -> String {
        self.func.name().to_string()
    }

    fn run(mut self) -> Result<(), VerifyError> {
        if self.func.blocks.is_empty() {
            return Err(VerifyError::EmptyFunction {
                function: self.name(),
            });
        }

        for (b, block) in self.func.blocks.iter().enumerate() {
            let Some(term) = &block.terminator else {
                return Err(VerifyError::Unterminated {
                    function: self.name(),
                    block: block.label.clone(),
                });
            };
            for target in term.successors() {
                if target.index() >= self.func.blocks.len() {
                    return Err(VerifyError::BadBranchTarget {
                        function: self.name(),
                        target: target.0,
                    });
                }
            }
            for (i, inst) in block.instructions.iter().enumerate() {
                if let Some(dest) = inst.dest() {
                    if self.defs.insert(dest, (b, i)).is_some() {
                        return Err(VerifyError::Redefined {
                            function: self.name(),
                            value: dest.0,
                        });
                    }
                }
            }
        }

        self.check_locals()?;

        let dominators = self.dominators();
        for (b, block) in self.func.blocks.iter().enumerate() {
            for (i, inst) in block.instructions.iter().enumerate() {
                self.check_instruction(inst)?;
                for operand in inst.operands() {
                    self.check_use(&operand, b, i, &dominators)?;
                }
            }
            if let Some(term) = &block.terminator {
                for operand in term.operands() {
                    self.check_use(&operand, b, block.instructions.len(), &dominators)?;
                }
            }
        }

        Ok(())
    }

    fn check_locals(&self) -> Result<(), VerifyError> {
        let params = self.func.signature.params.iter().map(Parameter::local_name);
        let slots = self.func.slots.iter().map(Slot::local_name);
        let mut seen = HashSet::new();
        for name in params.chain(slots) {
            if !seen.insert(name.clone()) {
                return Err(VerifyError::DuplicateLocal {
                    function: self.name(),
                    name,
                });
            }
        }
        Ok(())
    }

    fn check_instruction(&self, inst: &Instruction) -> Result<(), VerifyError> {
        match inst {
            Instruction::Load { slot, .. } | Instruction::Store { slot, .. } => {
                if slot.0 as usize >= self.func.slots.len() {
                    return Err(VerifyError::DanglingReference {
                        function: self.name(),
                        what: "slot",
                        index: slot.0,
                    });
                }
            }
            Instruction::Call { callee, .. } => {
                if self.module.function(callee).is_none()
                    && self.module.extern_function(callee).is_none()
                {
                    return Err(VerifyError::UnknownCallee {
                        function: self.name(),
                        callee: callee.clone(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_use(
        &self,
        value: &Value,
        block: usize,
        position: usize,
        dominators: &[Vec<bool>],
    ) -> Result<(), VerifyError> {
        match value {
            Value::Inst(id) => {
                let Some(&(def_block, def_pos)) = self.defs.get(id) else {
                    return Err(VerifyError::Undefined {
                        function: self.name(),
                        block: self.func.blocks[block].label.clone(),
                        value: id.0,
                    });
                };
                let dominates = if def_block == block {
                    def_pos < position
                } else {
                    dominators[block][def_block]
                };
                if !dominates {
                    return Err(VerifyError::NotDominated {
                        function: self.name(),
                        block: self.func.blocks[block].label.clone(),
                        value: id.0,
                    });
                }
            }
            Value::Param(index) if *index as usize >= self.func.signature.params.len() => {
                return Err(VerifyError::DanglingReference {
                    function: self.name(),
                    what: "parameter",
                    index: *index,
                });
            }
            Value::Global(id) if self.module.global(*id).is_none() => {
                return Err(VerifyError::DanglingReference {
                    function: self.name(),
                    what: "string constant",
                    index: id.0,
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// `result[b][d]` is true when block `d` dominates block `b`. Blocks that
    /// cannot be reached from the entry are dominated by everything.
    fn dominators(&self) -> Vec<Vec<bool>> {
        let count = self.func.blocks.len();
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (b, block) in self.func.blocks.iter().enumerate() {
            if let Some(term) = &block.terminator {
                for target in term.successors() {
                    preds[target.index()].push(b);
                }
            }
        }

        let mut dom = vec![vec![true; count]; count];
        dom[0] = vec![false; count];
        dom[0][0] = true;

        let mut changed = true;
        while changed {
            changed = false;
            for b in 1..count {
                let mut next = vec![true; count];
                for &p in &preds[b] {
                    for (d, flag) in next.iter_mut().enumerate() {
                        *flag = *flag && dom[p][d];
                    }
                }
                next[b] = true;
                if next != dom[b] {
                    dom[b] = next;
                    changed = true;
                }
            }
        }

        dom
    }
}
