//! Rendering of modules as textual LLVM IR
//!
//! The output uses opaque pointers: LLVM 15 and later read it as is, LLVM 14
//! needs `-opaque-pointers` (the backend passes it). Rendering is
//! deterministic: the same module always produces the same bytes.

use super::*;
use std::fmt;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;
        if let Some(triple) = &self.target_triple {
            writeln!(f, "target triple = \"{}\"", triple)?;
        }

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(
                f,
                "@{} = private unnamed_addr constant [{} x i8] c\"{}\\00\", align 1",
                global.name,
                global.value.len() + 1,
                escape_bytes(&global.value)
            )?;
        }

        if !self.externs.is_empty() {
            writeln!(f)?;
        }
        for func in &self.externs {
            writeln!(f, "declare {} @{}({})", func.ret, func.name, param_list(func))?;
        }

        for func in &self.functions {
            writeln!(f)?;
            write!(
                f,
                "{}",
                FunctionPrinter {
                    module: self,
                    function: func,
                }
            )?;
        }

        Ok(())
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl fmt::Display for FunctionPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = &self.function.signature;
        write!(f, "define {} @{}(", sig.ret.ir_type(), sig.name)?;
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", param.ty.ir_type(), param.local_name())?;
        }
        writeln!(f, ") {{")?;

        for (index, block) in self.function.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            if index == 0 {
                for slot in &self.function.slots {
                    let ty = slot.ty.ir_type();
                    writeln!(f, "  %{} = alloca {}, align {}", slot.local_name(), ty, align(ty))?;
                }
            }
            for inst in &block.instructions {
                write!(f, "  ")?;
                self.instruction(f, inst)?;
                writeln!(f)?;
            }
            match &block.terminator {
                Some(term) => {
                    write!(f, "  ")?;
                    self.terminator(f, term)?;
                    writeln!(f)?;
                }
                None => writeln!(f, "  ; missing terminator")?,
            }
        }

        writeln!(f, "}}")
    }
}

impl FunctionPrinter<'_> {
    fn instruction(&self, f: &mut fmt::Formatter<'_>, inst: &Instruction) -> fmt::Result {
        match inst {
            Instruction::Load { dest, slot } => {
                let ty = self.dest_type(*dest);
                write!(
                    f,
                    "%t{} = load {}, ptr {}, align {}",
                    dest.0,
                    ty,
                    self.slot(*slot),
                    align(ty)
                )
            }
            Instruction::Store { slot, value } => {
                let ty = self.type_of(value);
                write!(
                    f,
                    "store {} {}, ptr {}, align {}",
                    ty,
                    self.value(value),
                    self.slot(*slot),
                    align(ty)
                )
            }
            Instruction::Binary { dest, op, lhs, rhs } => write!(
                f,
                "%t{} = {} {} {}, {}",
                dest.0,
                op.mnemonic(),
                self.type_of(lhs),
                self.value(lhs),
                self.value(rhs)
            ),
            Instruction::FNeg { dest, operand } => write!(
                f,
                "%t{} = fneg {} {}",
                dest.0,
                self.type_of(operand),
                self.value(operand)
            ),
            Instruction::ICmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(
                f,
                "%t{} = icmp {} {} {}, {}",
                dest.0,
                pred.mnemonic(),
                self.type_of(lhs),
                self.value(lhs),
                self.value(rhs)
            ),
            Instruction::FCmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(
                f,
                "%t{} = fcmp {} {} {}, {}",
                dest.0,
                pred.mnemonic(),
                self.type_of(lhs),
                self.value(lhs),
                self.value(rhs)
            ),
            Instruction::Select {
                dest,
                cond,
                on_true,
                on_false,
            } => write!(
                f,
                "%t{} = select i1 {}, {} {}, {} {}",
                dest.0,
                self.value(cond),
                self.type_of(on_true),
                self.value(on_true),
                self.type_of(on_false),
                self.value(on_false)
            ),
            Instruction::Call { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "%t{} = ", dest.0)?;
                }
                write!(f, "call {} @{}(", self.callee_type(callee, *dest), callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", self.type_of(arg), self.value(arg))?;
                }
                write!(f, ")")
            }
        }
    }

    fn terminator(&self, f: &mut fmt::Formatter<'_>, term: &Terminator) -> fmt::Result {
        match term {
            Terminator::Return(None) => write!(f, "ret void"),
            Terminator::Return(Some(value)) => {
                write!(f, "ret {} {}", self.type_of(value), self.value(value))
            }
            Terminator::Branch(target) => write!(f, "br label %{}", self.label(*target)),
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "br i1 {}, label %{}, label %{}",
                self.value(cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }

    /// Return type as written at a call site. Variadic externs need the full
    /// function type, e.g. `i32 (ptr, ...)`.
    fn callee_type(&self, callee: &str, dest: Option<ValueId>) -> String {
        if let Some(func) = self.module.function(callee) {
            return func.signature.ret.ir_type().to_string();
        }
        if let Some(ext) = self.module.extern_function(callee) {
            if ext.variadic {
                return format!("{} ({})", ext.ret, param_list(ext));
            }
            return ext.ret.to_string();
        }
        dest.map_or_else(|| Type::Void.to_string(), |d| self.dest_type(d).to_string())
    }

    fn value(&self, value: &Value) -> String {
        match value {
            Value::Inst(id) => format!("%t{}", id.0),
            Value::Param(index) => match self.function.signature.params.get(*index as usize) {
                Some(param) => format!("%{}", param.local_name()),
                None => format!("%p{}", index),
            },
            Value::Const(Constant::Int(v)) => v.to_string(),
            Value::Const(Constant::Float(v)) => format!("0x{:016X}", v.to_bits()),
            Value::Const(Constant::Bool(v)) => v.to_string(),
            Value::Global(id) => match self.module.global(*id) {
                Some(global) => format!("@{}", global.name),
                None => format!("@.str.{}", id.0),
            },
        }
    }

    fn type_of(&self, value: &Value) -> Type {
        self.function.value_type(value).unwrap_or(Type::Void)
    }

    fn dest_type(&self, dest: ValueId) -> Type {
        self.type_of(&Value::Inst(dest))
    }

    fn slot(&self, slot: SlotId) -> String {
        match self.function.slots.get(slot.0 as usize) {
            Some(slot) => format!("%{}", slot.local_name()),
            None => format!("%slot{}", slot.0),
        }
    }

    fn label(&self, block: BlockId) -> String {
        self.function
            .block(block)
            .map_or_else(|| format!("bb{}", block.0), |b| b.label.clone())
    }
}

fn param_list(func: &ExternFunction) -> String {
    let mut params: Vec<String> = func.params.iter().map(Type::to_string).collect();
    if func.variadic {
        params.push("...".to_string());
    }
    params.join(", ")
}

fn align(ty: Type) -> u32 {
    match ty {
        Type::I1 | Type::Void => 1,
        Type::I32 => 4,
        Type::F64 | Type::Ptr => 8,
    }
}

/// Escape a string for a `c"..."` constant: printable ASCII passes through,
/// everything else becomes `\XX`.
fn escape_bytes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'"' | b'\\' => out.push_str(&format!("\\{:02X}", byte)),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_control_bytes() {
        assert_eq!(escape_bytes("%d\n"), "%d\\0A");
        assert_eq!(escape_bytes("say \"hi\""), "say \\22hi\\22");
        assert_eq!(escape_bytes("a\\b"), "a\\5Cb");
    }

    #[test]
    fn float_constants_use_hex_bit_patterns() {
        let func = Function {
            signature: Signature {
                name: "f".to_string(),
                params: Vec::new(),
                ret: ReturnType::Scalar(ScalarType::Float),
            },
            slots: Vec::new(),
            values: Vec::new(),
            blocks: vec![BasicBlock {
                label: "entry".to_string(),
                instructions: Vec::new(),
                terminator: Some(Terminator::Return(Some(Value::Const(Constant::Float(1.5))))),
            }],
        };
        let mut module = Module::new("m".to_string());
        module.functions.push(func);

        let text = module.to_string();
        assert!(text.contains("define double @f() {"));
        assert!(text.contains("ret double 0x3FF8000000000000"));
    }
}
