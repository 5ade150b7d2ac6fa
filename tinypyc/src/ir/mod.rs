//! Intermediate Representation for tinypyc
//!
//! A small register-based IR modelled on LLVM: functions own their basic
//! blocks and value table, blocks refer to each other through [`BlockId`]
//! indices, and every instruction result is an opaque [`Value`] handle.

pub mod builder;
pub mod printer;
pub mod verify;

use std::fmt;

use serde::Serialize;

pub use verify::VerifyError;

/// A compiled module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Target triple written into the rendered IR, if any
    pub target_triple: Option<String>,
    /// NUL-terminated string constants, indexed by [`GlobalId`]
    pub globals: Vec<StringConstant>,
    /// External functions provided by the C runtime
    pub externs: Vec<ExternFunction>,
    /// Functions defined in this module
    pub functions: Vec<Function>,
}

/// Private string constant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringConstant {
    /// Symbol name without the `@` sigil
    pub name: String,
    /// Contents, without the trailing NUL
    pub value: String,
}

/// Declaration of a function defined outside the module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternFunction {
    /// Symbol name
    pub name: String,
    /// Types of the fixed parameters
    pub params: Vec<Type>,
    /// Return type
    pub ret: Type,
    /// Accepts extra arguments after `params`
    pub variadic: bool,
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    /// Name, parameters and return type
    pub signature: Signature,
    /// Stack slots, indexed by [`SlotId`]
    pub slots: Vec<Slot>,
    /// Type of every instruction result, indexed by [`ValueId`]
    pub values: Vec<Type>,
    /// Basic blocks; block 0 is the entry block
    pub blocks: Vec<BasicBlock>,
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Function name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<Parameter>,
    /// Return type
    pub ret: ReturnType,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: ScalarType,
}

impl Parameter {
    /// Local name of the incoming argument in rendered IR, without the `%`.
    pub fn local_name(&self) -> String {
        format!("{}.param", self.name)
    }
}

/// The two storage types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarType {
    /// 32-bit signed integer
    Int,
    /// 64-bit float
    Float,
}

impl ScalarType {
    /// The IR type values of this type are held in.
    pub fn ir_type(self) -> Type {
        match self {
            ScalarType::Int => Type::I32,
            ScalarType::Float => Type::F64,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int => write!(f, "int"),
            ScalarType::Float => write!(f, "float"),
        }
    }
}

/// What a function returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnType {
    /// Nothing
    Void,
    /// A single int or float
    Scalar(ScalarType),
}

impl ReturnType {
    /// `void`, `i32` or `double`.
    pub fn ir_type(self) -> Type {
        match self {
            ReturnType::Void => Type::Void,
            ReturnType::Scalar(ty) => ty.ir_type(),
        }
    }
}

/// Addressable storage for one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Variable name
    pub name: String,
    /// Stored type
    pub ty: ScalarType,
}

impl Slot {
    /// Local name of the slot's `alloca` in rendered IR, without the `%`.
    ///
    /// Parameter names end in `.param` and temporaries are `tN`, so the
    /// `.addr` suffix keeps the three namespaces apart.
    pub fn local_name(&self) -> String {
        format!("{}.addr", self.name)
    }
}

/// A basic block (straight-line code with no branches except at the end)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicBlock {
    /// Block label
    pub label: String,
    /// Instructions in this block
    pub instructions: Vec<Instruction>,
    /// Block terminator; only `None` while the block is under construction
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    /// Create a new, open basic block
    pub fn new(label: String) -> Self {
        Self {
            label,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    /// True once the block has a terminator
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Instruction result, index into [`Function::values`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ValueId(pub u32);

/// Index into [`Function::blocks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockId(pub u32);

/// Index into [`Function::slots`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotId(pub u32);

/// Index into [`Module::globals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GlobalId(pub u32);

impl BlockId {
    /// The id as a `Vec` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// IR value handle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Value {
    /// Result of an instruction
    Inst(ValueId),
    /// Incoming function argument
    Param(u32),
    /// Immediate constant
    Const(Constant),
    /// Address of a string constant
    Global(GlobalId),
}

/// Immediate operand
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Constant {
    /// `i32` literal
    Int(i32),
    /// `double` literal
    Float(f64),
    /// `i1` literal
    Bool(bool),
}

impl Constant {
    /// IR type of the constant.
    pub fn ty(self) -> Type {
        match self {
            Constant::Int(_) => Type::I32,
            Constant::Float(_) => Type::F64,
            Constant::Bool(_) => Type::I1,
        }
    }
}

/// IR type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    /// No value
    Void,
    /// Boolean
    I1,
    /// Int
    I32,
    /// Float
    F64,
    /// Opaque pointer
    Ptr,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I32 => write!(f, "i32"),
            Type::F64 => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
        }
    }
}

/// IR instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instruction {
    /// Read a slot
    Load { dest: ValueId, slot: SlotId },
    /// Write a slot
    Store { slot: SlotId, value: Value },
    /// Two-operand arithmetic or bitwise operation
    Binary {
        dest: ValueId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    /// Floating-point negation
    FNeg { dest: ValueId, operand: Value },
    /// Integer comparison producing `i1`
    ICmp {
        dest: ValueId,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Floating-point comparison producing `i1`
    FCmp {
        dest: ValueId,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Pick one of two values based on an `i1`
    Select {
        dest: ValueId,
        cond: Value,
        on_true: Value,
        on_false: Value,
    },
    /// Direct call; `dest` is `None` for void callees
    Call {
        dest: Option<ValueId>,
        callee: String,
        args: Vec<Value>,
    },
}

impl Instruction {
    /// The value this instruction defines, if any.
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Instruction::Load { dest, .. }
            | Instruction::Binary { dest, .. }
            | Instruction::FNeg { dest, .. }
            | Instruction::ICmp { dest, .. }
            | Instruction::FCmp { dest, .. }
            | Instruction::Select { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } => *dest,
            Instruction::Store { .. } => None,
        }
    }

    /// Values read by this instruction, in operand order.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instruction::Load { .. } => Vec::new(),
            Instruction::Store { value, .. } => vec![*value],
            Instruction::Binary { lhs, rhs, .. }
            | Instruction::ICmp { lhs, rhs, .. }
            | Instruction::FCmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::FNeg { operand, .. } => vec![*operand],
            Instruction::Select {
                cond,
                on_true,
                on_false,
                ..
            } => vec![*cond, *on_true, *on_false],
            Instruction::Call { args, .. } => args.clone(),
        }
    }

    /// Short opcode name, stable across runs.
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Load { .. } => "load",
            Instruction::Store { .. } => "store",
            Instruction::Binary { op, .. } => op.mnemonic(),
            Instruction::FNeg { .. } => "fneg",
            Instruction::ICmp { .. } => "icmp",
            Instruction::FCmp { .. } => "fcmp",
            Instruction::Select { .. } => "select",
            Instruction::Call { .. } => "call",
        }
    }
}

/// Binary operation. `And`, `Or` and `Xor` only appear on `i1` operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    /// Integer addition
    Add,
    /// Integer subtraction
    Sub,
    /// Integer multiplication
    Mul,
    /// Signed integer division
    SDiv,
    /// Float addition
    FAdd,
    /// Float subtraction
    FSub,
    /// Float multiplication
    FMul,
    /// Float division
    FDiv,
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical exclusive or
    Xor,
}

impl BinaryOp {
    /// LLVM instruction name.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    /// Type of the result.
    pub fn result_type(self) -> Type {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::SDiv => Type::I32,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv => Type::F64,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => Type::I1,
        }
    }
}

/// `icmp` condition, signed where it matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntPredicate {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Slt,
    /// `<=`
    Sle,
    /// `>`
    Sgt,
    /// `>=`
    Sge,
}

impl IntPredicate {
    /// LLVM condition code.
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }
}

/// `fcmp` condition. Ordered except `!=`, which is true for NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FloatPredicate {
    /// `==`
    Oeq,
    /// `!=`
    Une,
    /// `<`
    Olt,
    /// `<=`
    Ole,
    /// `>`
    Ogt,
    /// `>=`
    Oge,
}

impl FloatPredicate {
    /// LLVM condition code.
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Une => "une",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }
}

/// Block terminator (control flow)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Terminator {
    /// Return from function
    Return(Option<Value>),
    /// Unconditional branch
    Branch(BlockId),
    /// Conditional branch
    CondBranch {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Control never reaches the end of this block
    Unreachable,
}

impl Terminator {
    /// Blocks control may continue in.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch(target) => vec![*target],
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_) | Terminator::Unreachable => Vec::new(),
        }
    }

    /// Values read by the terminator.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Terminator::Return(Some(value)) => vec![*value],
            Terminator::CondBranch { cond, .. } => vec![*cond],
            _ => Vec::new(),
        }
    }

    /// `ret`, `br` or `unreachable`.
    pub fn opcode(&self) -> &'static str {
        match self {
            Terminator::Return(_) => "ret",
            Terminator::Branch(_) | Terminator::CondBranch { .. } => "br",
            Terminator::Unreachable => "unreachable",
        }
    }
}

impl Module {
    /// Create a new empty module
    pub fn new(name: String) -> Self {
        Self {
            name,
            target_triple: None,
            globals: Vec::new(),
            externs: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Defined function by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.signature.name == name)
    }

    /// Declared external function by name
    pub fn extern_function(&self, name: &str) -> Option<&ExternFunction> {
        self.externs.iter().find(|f| f.name == name)
    }

    /// String constant by id
    pub fn global(&self, id: GlobalId) -> Option<&StringConstant> {
        self.globals.get(id.0 as usize)
    }

    /// Check the structural invariants, see [`verify::verify_module`].
    pub fn verify(&self) -> Result<(), VerifyError> {
        verify::verify_module(self)
    }

    /// Render the module as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Function {
    /// Function name
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Block by id
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Type of a value as seen from inside this function.
    pub fn value_type(&self, value: &Value) -> Option<Type> {
        match value {
            Value::Inst(id) => self.values.get(id.0 as usize).copied(),
            Value::Param(index) => self
                .signature
                .params
                .get(*index as usize)
                .map(|param| param.ty.ir_type()),
            Value::Const(constant) => Some(constant.ty()),
            Value::Global(_) => Some(Type::Ptr),
        }
    }

    /// Number of blocks whose terminator targets `block`.
    pub fn predecessor_count(&self, block: BlockId) -> usize {
        self.blocks
            .iter()
            .filter_map(|b| b.terminator.as_ref())
            .map(|term| {
                term.successors()
                    .into_iter()
                    .filter(|target| *target == block)
                    .count()
            })
            .sum()
    }

    /// Opcode sequence of the whole function, terminators included.
    pub fn opcodes(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend(block.instructions.iter().map(Instruction::opcode));
            if let Some(term) = &block.terminator {
                out.push(term.opcode());
            }
        }
        out
    }
}
