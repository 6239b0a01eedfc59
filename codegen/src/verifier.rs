//! Structural and type verification of a [`Function`] before it is lowered.
//!
//! Every check here is a precondition lowering is allowed to assume holds: a single bad function
//! (malformed by a frontend bug, or by a user directly building bad IR) must be rejected here
//! rather than tripping an internal panic deep inside instruction selection.

use crate::ir::{Block, Function, Value};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// One verification failure, describing what is wrong and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierError {
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One or more [`VerifierError`]s collected from a single verification pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl VerifierErrors {
    fn push(&mut self, message: String) {
        self.0.push(VerifierError { message });
    }

    fn is_ok(&self) -> bool {
        self.0.is_empty()
    }
}

/// Verify that `func` is well-formed: every block ends in exactly one terminator, every
/// instruction's value arguments are defined before they're used (by a dominating definition, or
/// a block parameter), and every value used as a branch target argument matches the target
/// block's declared parameter count.
pub fn verify_function(func: &Function) -> Result<(), VerifierErrors> {
    let mut errors = VerifierErrors::default();
    let mut defined: Vec<Value> = Vec::new();

    for block in func.layout.blocks() {
        defined.extend_from_slice(func.dfg.block_params(block));
        let insts = func.layout.block_insts(block);
        if insts.is_empty() {
            errors.push(format!("{} has no instructions", block));
            continue;
        }
        for (i, &inst) in insts.iter().enumerate() {
            let is_last = i == insts.len() - 1;
            let data = func.dfg.inst_data(inst);
            let opcode = data.opcode();

            if opcode.is_terminator() && !is_last {
                errors.push(format!("{} is a terminator but is not the last instruction of {}", inst, block));
            }
            if is_last && !opcode.is_terminator() {
                errors.push(format!("{} does not end in a terminator", block));
            }

            for arg in data.arguments() {
                if !defined.contains(&arg) {
                    errors.push(format!("{} uses {} before it is defined", inst, arg));
                }
            }
            for dest in data.branch_destinations() {
                check_block_call_arity(func, inst, dest, &mut errors);
            }

            defined.extend_from_slice(func.dfg.inst_results(inst));
        }
    }

    if errors.is_ok() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_block_call_arity(func: &Function, inst: crate::ir::Inst, dest: Block, errors: &mut VerifierErrors) {
    let expected = func.dfg.block_params(dest).len();
    let data = func.dfg.inst_data(inst);
    let provided = match data {
        crate::ir::InstructionData::Jump { destination } if destination.block == dest => destination.args.len(),
        crate::ir::InstructionData::Brif {
            block_then, block_else, ..
        } => {
            if block_then.block == dest {
                block_then.args.len()
            } else if block_else.block == dest {
                block_else.args.len()
            } else {
                return;
            }
        }
        _ => return,
    };
    if provided != expected {
        errors.push(format!(
            "{} passes {} arguments to {} which expects {}",
            inst, provided, dest, expected
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::I32;
    use crate::ir::{ExternalName, InstructionData, Opcode, Signature};
    use crate::isa::CallConv;

    #[test]
    fn well_formed_function_passes() {
        let mut func = Function::with_name_signature(ExternalName::user(0, 0), Signature::new(CallConv::SystemV));
        let b0 = func.create_block();
        let p0 = func.dfg.append_block_param(b0, I32);
        func.append_inst(
            b0,
            InstructionData::Return { args: alloc::vec![p0] },
            &[],
        );
        assert!(verify_function(&func).is_ok());
    }

    #[test]
    fn use_before_def_is_rejected() {
        let mut func = Function::with_name_signature(ExternalName::user(0, 0), Signature::new(CallConv::SystemV));
        let b0 = func.create_block();
        let bogus = crate::ir::Value::new(999);
        func.append_inst(b0, InstructionData::Return { args: alloc::vec![bogus] }, &[]);
        assert!(verify_function(&func).is_err());
    }

    #[test]
    fn non_terminator_as_last_instruction_is_rejected() {
        let mut func = Function::with_name_signature(ExternalName::user(0, 0), Signature::new(CallConv::SystemV));
        let b0 = func.create_block();
        let p0 = func.dfg.append_block_param(b0, I32);
        func.append_inst(
            b0,
            InstructionData::Binary {
                opcode: Opcode::Iadd,
                args: [p0, p0],
            },
            &[I32],
        );
        assert!(verify_function(&func).is_err());
    }
}
