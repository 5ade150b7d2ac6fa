//! IR builder utilities
//!
//! Helpers for constructing IR programmatically

use std::collections::HashMap;

use thiserror::Error;

use super::*;

/// Misuse of the builder API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No block was selected with `switch_to_block`
    #[error("no insertion block selected")]
    NoInsertionPoint,
    /// The selected block is already closed
    #[error("block '{block}' already has a terminator")]
    AlreadyTerminated { block: String },
}

/// IR builder for constructing modules
pub struct ModuleBuilder {
    module: Module,
    strings: HashMap<String, GlobalId>,
}

impl ModuleBuilder {
    /// Create a new module builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name.into()),
            strings: HashMap::new(),
        }
    }

    /// Record the target triple, or clear it with `None`.
    pub fn set_target_triple(&mut self, triple: Option<String>) {
        self.module.target_triple = triple;
    }

    /// Declare an external function once; later declarations with the same
    /// name are ignored.
    pub fn declare_extern(&mut self, func: ExternFunction) {
        if self.module.extern_function(&func.name).is_none() {
            self.module.externs.push(func);
        }
    }

    /// Return the constant holding `text`, creating it on first use.
    pub fn intern_string(&mut self, text: &str) -> GlobalId {
        if let Some(id) = self.strings.get(text) {
            return *id;
        }

        let id = GlobalId(self.module.globals.len() as u32);
        self.module.globals.push(StringConstant {
            name: format!(".str.{}", id.0),
            value: text.to_string(),
        });
        self.strings.insert(text.to_string(), id);
        id
    }

    /// Add a function to the module
    pub fn add_function(&mut self, func: Function) {
        self.module.functions.push(func);
    }

    /// Finish building and return the module
    pub fn build(self) -> Module {
        self.module
    }
}

/// IR builder for constructing functions
pub struct FunctionBuilder {
    function: Function,
    current_block: Option<BlockId>,
}

impl FunctionBuilder {
    /// Create a new function builder
    pub fn new(signature: Signature) -> Self {
        Self {
            function: Function {
                signature,
                slots: Vec::new(),
                values: Vec::new(),
                blocks: Vec::new(),
            },
            current_block: None,
        }
    }

    /// Signature of the function under construction
    pub fn signature(&self) -> &Signature {
        &self.function.signature
    }

    /// Create a new basic block
    pub fn create_block(&mut self, label: impl Into<String>) -> BlockId {
        self.function.blocks.push(BasicBlock::new(label.into()));
        BlockId(self.function.blocks.len() as u32 - 1)
    }

    /// Switch to a block
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// True when there is nowhere left to append code: either no block is
    /// selected or the selected one already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.current_block
            .and_then(|id| self.function.blocks.get(id.index()))
            .map_or(true, BasicBlock::is_terminated)
    }

    /// Number of branches built so far that target `block`.
    pub fn predecessor_count(&self, block: BlockId) -> usize {
        self.function.predecessor_count(block)
    }

    /// Read `slot`, which holds a `ty`.
    pub fn load(&mut self, slot: SlotId, ty: ScalarType) -> Result<Value, BuildError> {
        let dest = self.new_value(ty.ir_type());
        self.add_instruction(Instruction::Load { dest, slot })?;
        Ok(Value::Inst(dest))
    }

    /// Write `value` to `slot`.
    pub fn store(&mut self, slot: SlotId, value: Value) -> Result<(), BuildError> {
        self.add_instruction(Instruction::Store { slot, value })
    }

    /// Emit `op lhs, rhs`.
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, BuildError> {
        let dest = self.new_value(op.result_type());
        self.add_instruction(Instruction::Binary { dest, op, lhs, rhs })?;
        Ok(Value::Inst(dest))
    }

    /// Emit `fneg`.
    pub fn fneg(&mut self, operand: Value) -> Result<Value, BuildError> {
        let dest = self.new_value(Type::F64);
        self.add_instruction(Instruction::FNeg { dest, operand })?;
        Ok(Value::Inst(dest))
    }

    /// Integer comparison.
    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Result<Value, BuildError> {
        let dest = self.new_value(Type::I1);
        self.add_instruction(Instruction::ICmp {
            dest,
            pred,
            lhs,
            rhs,
        })?;
        Ok(Value::Inst(dest))
    }

    /// Float comparison.
    pub fn fcmp(
        &mut self,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, BuildError> {
        let dest = self.new_value(Type::I1);
        self.add_instruction(Instruction::FCmp {
            dest,
            pred,
            lhs,
            rhs,
        })?;
        Ok(Value::Inst(dest))
    }

    /// `on_true` when `cond` holds, else `on_false`; both have type `ty`.
    pub fn select(
        &mut self,
        ty: Type,
        cond: Value,
        on_true: Value,
        on_false: Value,
    ) -> Result<Value, BuildError> {
        let dest = self.new_value(ty);
        self.add_instruction(Instruction::Select {
            dest,
            cond,
            on_true,
            on_false,
        })?;
        Ok(Value::Inst(dest))
    }

    /// Emit a direct call. Returns the result value unless `ret` is void.
    pub fn call(
        &mut self,
        callee: &str,
        args: Vec<Value>,
        ret: Type,
    ) -> Result<Option<Value>, BuildError> {
        let dest = (ret != Type::Void).then(|| self.new_value(ret));
        self.add_instruction(Instruction::Call {
            dest,
            callee: callee.to_string(),
            args,
        })?;
        Ok(dest.map(Value::Inst))
    }

    /// Set the terminator for the current block. A block is closed exactly
    /// once.
    pub fn terminate(&mut self, term: Terminator) -> Result<(), BuildError> {
        let block = self.open_block()?;
        block.terminator = Some(term);
        Ok(())
    }

    /// Finish building and return the function
    pub fn build(mut self, slots: Vec<Slot>) -> Function {
        self.function.slots = slots;
        self.function
    }

    fn new_value(&mut self, ty: Type) -> ValueId {
        self.function.values.push(ty);
        ValueId(self.function.values.len() as u32 - 1)
    }

    fn add_instruction(&mut self, inst: Instruction) -> Result<(), BuildError> {
        self.open_block()?.instructions.push(inst);
        Ok(())
    }

    fn open_block(&mut self) -> Result<&mut BasicBlock, BuildError> {
        let id = self.current_block.ok_or(BuildError::NoInsertionPoint)?;
        let block = self
            .function
            .blocks
            .get_mut(id.index())
            .ok_or(BuildError::NoInsertionPoint)?;
        if block.is_terminated() {
            return Err(BuildError::AlreadyTerminated {
                block: block.label.clone(),
            });
        }
        Ok(block)
    }
}
