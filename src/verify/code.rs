//! Static bytecode verification: the stack-size / branch-target checker.
//!
//! The verifier walks a method's code linearly, dispatching on the opcode
//! at the program counter. For every opcode it enforces operand length,
//! the required constant-pool entry kind, and branch-target bounds, while
//! maintaining a running approximation of operand-stack depth. It is not
//! the type-checking verifier of JVMS §4.10.1 — no types are tracked.
//!
//! The depth counter models a category-2 value (long/double) as a single
//! stack entry, matching the runtime's operand stack. That convention is
//! what drives the one rewrite the verifier performs: a `DUP2` whose
//! following opcode operates on a long/double is narrowed in place to
//! `DUP`, since only one entry needs duplicating.

use crate::classfile::class::ClassAccess;
use crate::classfile::constpool::{ConstantPool, CpEntry};
use crate::classfile::opcodes as op;
use crate::common::diag::DiagSink;
use crate::common::error::Result;
use crate::{internal_err, verify_fail};

/// Verify one method's bytecode.
///
/// `code` and `cp` are optional to express the caller contract directly:
/// a missing pointer is an internal bug, distinct from an empty-but-present
/// code array (legal only for abstract classes) or an empty pool (always
/// rejected). On success the code may have been rewritten in place (DUP2
/// narrowing), which is why the slice is taken mutably.
pub fn check_code_validity(
    code: Option<&mut Vec<u8>>,
    cp: Option<&ConstantPool>,
    max_locals: u16,
    access: &ClassAccess,
    sink: &DiagSink,
) -> Result<()> {
    let code = match code {
        Some(code) => code,
        None => return Err(internal_err!(sink, "no code segment supplied to the verifier")),
    };
    let cp = match cp {
        Some(cp) => cp,
        None => {
            return Err(internal_err!(
                sink,
                "no constant pool supplied to the verifier"
            ))
        }
    };

    if code.is_empty() {
        // abstract methods carry no code
        if access.is_abstract {
            return Ok(());
        }
        return Err(verify_fail!(
            sink,
            "empty code segment in a non-abstract class"
        ));
    }
    if cp.is_empty() {
        return Err(verify_fail!(sink, "empty constant pool"));
    }

    let mut state = VerifierState {
        code,
        cp,
        pc: 0,
        stack_entries: 0,
        max_locals,
        sink,
    };
    state.run()
}

/// Working state of one verification pass. Handlers return the number of
/// bytes to advance the program counter by.
struct VerifierState<'a> {
    code: &'a mut Vec<u8>,
    cp: &'a ConstantPool,
    pc: usize,
    stack_entries: i32,
    max_locals: u16,
    sink: &'a DiagSink,
}

impl VerifierState<'_> {
    fn run(&mut self) -> Result<()> {
        while self.pc < self.code.len() {
            let opcode = self.code[self.pc];
            let advance = self.dispatch(opcode)?;
            self.pc += advance;
        }
        Ok(())
    }

    // ---- small helpers -------------------------------------------------

    /// Require `extra` operand bytes after the opcode at PC.
    fn need(&self, extra: usize, opcode: u8) -> Result<()> {
        if self.pc + extra >= self.code.len() {
            return Err(verify_fail!(
                self.sink,
                "invalid bytecode or argument length: opcode 0x{opcode:02X} at PC {} \
                 needs {extra} operand byte(s)",
                self.pc
            ));
        }
        Ok(())
    }

    fn u16_operand(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.code[self.pc + offset], self.code[self.pc + offset + 1]])
    }

    fn i16_operand(&self, offset: usize) -> i16 {
        self.u16_operand(offset) as i16
    }

    fn i32_at(&self, index: usize) -> i32 {
        i32::from_be_bytes([
            self.code[index],
            self.code[index + 1],
            self.code[index + 2],
            self.code[index + 3],
        ])
    }

    fn push(&mut self, n: i32) {
        self.stack_entries += n;
    }

    /// Saturating pop for opcodes whose consumption the linear model
    /// cannot police (stores, array ops, invokes).
    fn pop_lenient(&mut self, n: i32) {
        self.stack_entries = (self.stack_entries - n).max(0);
    }

    /// Checked pop for the opcodes where a shortfall is an obvious
    /// underflow.
    fn pop_checked(&mut self, n: i32, opcode: u8) -> Result<()> {
        if self.stack_entries < n {
            return Err(verify_fail!(
                self.sink,
                "operand stack underflow at PC {} (opcode 0x{opcode:02X} needs {n} operand(s), \
                 stack holds {})",
                self.pc,
                self.stack_entries
            ));
        }
        self.stack_entries -= n;
        Ok(())
    }

    fn check_local_index(&self, index: u16, opcode: u8) -> Result<()> {
        if index >= self.max_locals {
            return Err(verify_fail!(
                self.sink,
                "local variable index {index} out of range at PC {} \
                 (opcode 0x{opcode:02X}, max_locals {})",
                self.pc,
                self.max_locals
            ));
        }
        Ok(())
    }

    /// Validate a 16-bit relative branch from the current PC.
    fn check_branch16(&self, opcode: u8) -> Result<()> {
        self.check_branch_target(self.i16_operand(1) as i64, opcode)
    }

    fn check_branch_target(&self, offset: i64, opcode: u8) -> Result<()> {
        let target = self.pc as i64 + offset;
        if target < 0 || target >= self.code.len() as i64 {
            return Err(verify_fail!(
                self.sink,
                "branch target {target} out of bounds at PC {} \
                 (opcode 0x{opcode:02X}, method is {} bytes)",
                self.pc,
                self.code.len()
            ));
        }
        Ok(())
    }

    // ---- dispatch ------------------------------------------------------

    fn dispatch(&mut self, opcode: u8) -> Result<usize> {
        match opcode {
            op::NOP => Ok(1),

            // constants: one entry each; the runtime stack holds a
            // category-2 value as a single entry
            op::ACONST_NULL..=op::DCONST_1 => {
                self.push(1);
                Ok(1)
            }

            op::BIPUSH => {
                self.need(1, opcode)?;
                self.push(1);
                Ok(2)
            }
            op::SIPUSH => {
                self.need(2, opcode)?;
                self.push(1);
                Ok(3)
            }

            op::LDC => {
                self.need(1, opcode)?;
                let index = self.code[self.pc + 1] as u16;
                self.check_ldc_category1(index, opcode)?;
                self.push(1);
                Ok(2)
            }
            op::LDC_W => {
                self.need(2, opcode)?;
                let index = self.u16_operand(1);
                self.check_ldc_category1(index, opcode)?;
                self.push(1);
                Ok(3)
            }
            op::LDC2_W => {
                self.need(2, opcode)?;
                let index = self.u16_operand(1);
                match self.cp.fetch(index) {
                    Some(CpEntry::LongConst(_))
                    | Some(CpEntry::DoubleConst(_))
                    | Some(CpEntry::Dynamic { .. }) => {}
                    _ => {
                        return Err(verify_fail!(
                            self.sink,
                            "LDC2_W at PC {} points to CP slot {index} which is not a \
                             long or double constant",
                            self.pc
                        ))
                    }
                }
                self.push(1);
                Ok(3)
            }

            // loads with a one-byte local index
            op::ILOAD..=op::ALOAD => {
                self.need(1, opcode)?;
                self.check_local_index(self.code[self.pc + 1] as u16, opcode)?;
                self.push(1);
                Ok(2)
            }
            // xload_n forms
            op::ILOAD_0..=op::ALOAD_3 => {
                self.push(1);
                Ok(1)
            }
            // array loads: pop arrayref + index, push value
            op::IALOAD..=op::SALOAD => {
                self.pop_lenient(2);
                self.push(1);
                Ok(1)
            }

            // stores with a one-byte local index
            op::ISTORE..=op::ASTORE => {
                self.need(1, opcode)?;
                self.check_local_index(self.code[self.pc + 1] as u16, opcode)?;
                self.pop_lenient(1);
                Ok(2)
            }
            // xstore_n forms
            op::ISTORE_0..=op::ASTORE_3 => {
                self.pop_lenient(1);
                Ok(1)
            }
            // array stores: pop arrayref + index + value
            op::IASTORE..=op::SASTORE => {
                self.pop_lenient(3);
                Ok(1)
            }

            op::POP => {
                self.pop_checked(1, opcode)?;
                Ok(1)
            }
            op::POP2 => {
                // may be popping one category-2 entry or two category-1s;
                // the model only knows entries, so require at least one
                self.pop_checked(1, opcode)?;
                self.pop_lenient(1);
                Ok(1)
            }

            op::DUP | op::DUP_X1 | op::DUP_X2 => {
                self.push(1);
                Ok(1)
            }
            op::DUP2 => Ok(self.check_dup2()),
            op::DUP2_X1 | op::DUP2_X2 => {
                self.push(2);
                Ok(1)
            }
            op::SWAP => Ok(1),

            // binary arithmetic and logic
            op::IADD..=op::DREM | op::ISHL..=op::LXOR => {
                self.pop_checked(2, opcode)?;
                self.push(1);
                Ok(1)
            }
            // unary negation
            op::INEG..=op::DNEG => {
                self.pop_checked(1, opcode)?;
                self.push(1);
                Ok(1)
            }

            op::IINC => {
                self.need(2, opcode)?;
                self.check_local_index(self.code[self.pc + 1] as u16, opcode)?;
                Ok(3)
            }

            // conversions replace the top entry
            op::I2L..=op::I2S => {
                self.pop_checked(1, opcode)?;
                self.push(1);
                Ok(1)
            }

            // comparisons collapse two entries into one int
            op::LCMP..=op::DCMPG => {
                self.pop_checked(2, opcode)?;
                self.push(1);
                Ok(1)
            }

            // one-operand conditional branches
            op::IFEQ..=op::IFLE | op::IFNULL | op::IFNONNULL => {
                self.need(2, opcode)?;
                self.check_branch16(opcode)?;
                self.pop_lenient(1);
                Ok(3)
            }
            // two-operand conditional branches
            op::IF_ICMPEQ..=op::IF_ACMPNE => {
                self.need(2, opcode)?;
                self.check_branch16(opcode)?;
                self.pop_lenient(2);
                Ok(3)
            }

            op::GOTO => {
                self.need(2, opcode)?;
                self.check_branch16(opcode)?;
                Ok(3)
            }
            op::JSR => {
                self.need(2, opcode)?;
                self.check_branch16(opcode)?;
                self.push(1); // the return address
                Ok(3)
            }
            op::RET => {
                self.need(1, opcode)?;
                self.check_local_index(self.code[self.pc + 1] as u16, opcode)?;
                Ok(2)
            }

            op::TABLESWITCH => self.check_tableswitch(opcode),
            op::LOOKUPSWITCH => self.check_lookupswitch(opcode),

            op::IRETURN..=op::ARETURN => {
                self.pop_lenient(1);
                Ok(1)
            }
            op::RETURN => Ok(1),

            op::GETSTATIC => {
                self.check_field_target(opcode, "GETSTATIC")?;
                self.push(1);
                Ok(3)
            }
            op::PUTSTATIC => {
                self.check_field_target(opcode, "PUTSTATIC")?;
                self.pop_lenient(1);
                Ok(3)
            }
            op::GETFIELD => {
                self.check_field_target(opcode, "GETFIELD")?;
                // objectref out, value in
                Ok(3)
            }
            op::PUTFIELD => {
                self.check_field_target(opcode, "PUTFIELD")?;
                self.pop_lenient(2);
                Ok(3)
            }

            op::INVOKEVIRTUAL => {
                self.check_method_target(opcode, "INVOKEVIRTUAL")?;
                Ok(3)
            }
            op::INVOKESPECIAL => {
                self.check_method_target(opcode, "INVOKESPECIAL")?;
                Ok(3)
            }
            op::INVOKESTATIC => {
                self.check_method_target(opcode, "INVOKESTATIC")?;
                Ok(3)
            }
            op::INVOKEINTERFACE => self.check_invokeinterface(opcode),
            op::INVOKEDYNAMIC => self.check_invokedynamic(opcode),

            op::NEW => {
                self.check_class_target(opcode, "NEW")?;
                self.push(1);
                Ok(3)
            }
            op::NEWARRAY => {
                self.need(1, opcode)?;
                let atype = self.code[self.pc + 1];
                if !(4..=11).contains(&atype) {
                    return Err(verify_fail!(
                        self.sink,
                        "NEWARRAY at PC {} has invalid array type {atype}",
                        self.pc
                    ));
                }
                Ok(2)
            }
            op::ANEWARRAY => {
                self.check_class_target(opcode, "ANEWARRAY")?;
                Ok(3)
            }
            op::ARRAYLENGTH => Ok(1),
            op::ATHROW => {
                self.pop_lenient(1);
                Ok(1)
            }
            op::CHECKCAST => {
                self.check_class_target(opcode, "CHECKCAST")?;
                Ok(3)
            }
            op::INSTANCEOF => {
                self.check_class_target(opcode, "INSTANCEOF")?;
                Ok(3)
            }
            op::MONITORENTER | op::MONITOREXIT => {
                self.pop_lenient(1);
                Ok(1)
            }

            op::WIDE => self.check_wide(),
            op::MULTIANEWARRAY => self.check_multianewarray(opcode),

            op::GOTO_W => {
                self.need(4, opcode)?;
                self.check_branch_target(self.i32_at(self.pc + 1) as i64, opcode)?;
                Ok(5)
            }
            op::JSR_W => {
                self.need(4, opcode)?;
                self.check_branch_target(self.i32_at(self.pc + 1) as i64, opcode)?;
                self.push(1);
                Ok(5)
            }

            _ => Err(verify_fail!(
                self.sink,
                "unrecognized opcode 0x{opcode:02X} at PC {}",
                self.pc
            )),
        }
    }

    // ---- opcode-family handlers ---------------------------------------

    fn check_ldc_category1(&self, index: u16, opcode: u8) -> Result<()> {
        let loadable = self
            .cp
            .fetch(index)
            .map(CpEntry::is_loadable_category1)
            .unwrap_or(false);
        if !loadable {
            return Err(verify_fail!(
                self.sink,
                "LDC at PC {} (opcode 0x{opcode:02X}) points to CP slot {index} \
                 which is not a loadable single-slot constant",
                self.pc
            ));
        }
        Ok(())
    }

    /// When the next opcode operates on a long/double, the top of stack
    /// holds one category-2 entry, and the DUP2 is narrowed to DUP in
    /// place.
    fn check_dup2(&mut self) -> usize {
        let next = self.code.get(self.pc + 1).copied();
        match next {
            Some(following) if op::is_long_or_double(following) => {
                self.code[self.pc] = op::DUP;
                self.push(1);
            }
            _ => self.push(2),
        }
        1
    }

    fn check_field_target(&self, opcode: u8, mnemonic: &str) -> Result<()> {
        self.need(2, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::FieldRef { .. }) => Ok(()),
            _ => Err(verify_fail!(
                self.sink,
                "{mnemonic} at PC {} points to CP slot {index} which is not a field reference",
                self.pc
            )),
        }
    }

    fn check_method_target(&self, opcode: u8, mnemonic: &str) -> Result<()> {
        self.need(2, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::MethodRef { .. }) => Ok(()),
            _ => Err(verify_fail!(
                self.sink,
                "{mnemonic} at PC {} points to CP slot {index} which is not a method reference",
                self.pc
            )),
        }
    }

    fn check_class_target(&self, opcode: u8, mnemonic: &str) -> Result<()> {
        self.need(2, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::ClassRef { .. }) => Ok(()),
            _ => Err(verify_fail!(
                self.sink,
                "{mnemonic} at PC {} points to CP slot {index} which is not a class reference",
                self.pc
            )),
        }
    }

    fn check_invokeinterface(&mut self, opcode: u8) -> Result<usize> {
        self.need(4, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::InterfaceMethodRef { .. }) => {}
            _ => {
                return Err(verify_fail!(
                    self.sink,
                    "INVOKEINTERFACE at PC {} points to CP slot {index} which is \
                     not an interface method reference",
                    self.pc
                ))
            }
        }
        if self.code[self.pc + 3] == 0 {
            return Err(verify_fail!(
                self.sink,
                "INVOKEINTERFACE at PC {} has a zero count byte",
                self.pc
            ));
        }
        if self.code[self.pc + 4] != 0 {
            return Err(verify_fail!(
                self.sink,
                "INVOKEINTERFACE at PC {} must have a zero fourth operand byte",
                self.pc
            ));
        }
        Ok(5)
    }

    fn check_invokedynamic(&mut self, opcode: u8) -> Result<usize> {
        self.need(4, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::InvokeDynamic { .. }) => {}
            None => {
                return Err(verify_fail!(
                    self.sink,
                    "INVOKEDYNAMIC at PC {} points to a non-existent invokeDynamic slot {index}",
                    self.pc
                ))
            }
            Some(other) => {
                return Err(verify_fail!(
                    self.sink,
                    "INVOKEDYNAMIC at PC {} points to CP slot {index} which is a {} \
                     rather than an invokeDynamic entry",
                    self.pc,
                    other.kind_name()
                ))
            }
        }
        if self.code[self.pc + 3] != 0 || self.code[self.pc + 4] != 0 {
            return Err(verify_fail!(
                self.sink,
                "INVOKEDYNAMIC at PC {} must have zero trailing operand bytes",
                self.pc
            ));
        }
        Ok(5)
    }

    fn check_multianewarray(&mut self, opcode: u8) -> Result<usize> {
        self.need(3, opcode)?;
        let index = self.u16_operand(1);
        match self.cp.fetch(index) {
            Some(CpEntry::ClassRef { .. }) => {}
            _ => {
                return Err(verify_fail!(
                    self.sink,
                    "MULTIANEWARRAY at PC {} points to CP slot {index} which is \
                     not a class reference",
                    self.pc
                ))
            }
        }
        let dimensions = self.code[self.pc + 3];
        if dimensions < 1 {
            return Err(verify_fail!(
                self.sink,
                "MULTIANEWARRAY at PC {} must have at least one dimension",
                self.pc
            ));
        }
        self.pop_lenient(dimensions as i32);
        self.push(1);
        Ok(4)
    }

    fn check_wide(&mut self) -> Result<usize> {
        self.need(1, op::WIDE)?;
        let widened = self.code[self.pc + 1];
        match widened {
            op::ILOAD | op::LLOAD | op::FLOAD | op::DLOAD | op::ALOAD => {
                self.need(3, op::WIDE)?;
                self.push(1);
                Ok(4)
            }
            op::ISTORE | op::LSTORE | op::FSTORE | op::DSTORE | op::ASTORE => {
                self.need(3, op::WIDE)?;
                self.pop_lenient(1);
                Ok(4)
            }
            op::RET => {
                self.need(3, op::WIDE)?;
                Ok(4)
            }
            op::IINC => {
                self.need(5, op::WIDE)?;
                Ok(6)
            }
            _ => Err(verify_fail!(
                self.sink,
                "invalid opcode 0x{widened:02X} following WIDE at PC {}",
                self.pc
            )),
        }
    }

    fn check_tableswitch(&mut self, opcode: u8) -> Result<usize> {
        let padding = (4 - ((self.pc + 1) % 4)) % 4;
        let base = self.pc + 1 + padding;
        if base + 12 > self.code.len() {
            return Err(verify_fail!(
                self.sink,
                "TABLESWITCH at PC {} is truncated before its bounds",
                self.pc
            ));
        }
        let default_offset = self.i32_at(base);
        let low = self.i32_at(base + 4);
        let high = self.i32_at(base + 8);
        if low > high {
            return Err(verify_fail!(
                self.sink,
                "TABLESWITCH at PC {} has low {low} greater than high {high}",
                self.pc
            ));
        }
        let count = (high as i64 - low as i64 + 1) as usize;
        let table_end = base + 12 + count * 4;
        if table_end > self.code.len() {
            return Err(verify_fail!(
                self.sink,
                "TABLESWITCH at PC {} declares {count} offsets but the method ends first",
                self.pc
            ));
        }
        self.check_branch_target(default_offset as i64, opcode)?;
        for arm in 0..count {
            let offset = self.i32_at(base + 12 + arm * 4);
            self.check_branch_target(offset as i64, opcode)?;
        }
        self.pop_lenient(1); // the switch key
        Ok(table_end - self.pc)
    }

    fn check_lookupswitch(&mut self, opcode: u8) -> Result<usize> {
        let padding = (4 - ((self.pc + 1) % 4)) % 4;
        let base = self.pc + 1 + padding;
        if base + 8 > self.code.len() {
            return Err(verify_fail!(
                self.sink,
                "LOOKUPSWITCH at PC {} is truncated before its pair count",
                self.pc
            ));
        }
        let default_offset = self.i32_at(base);
        let npairs = self.i32_at(base + 4);
        if npairs < 0 {
            return Err(verify_fail!(
                self.sink,
                "LOOKUPSWITCH at PC {} has a negative pair count {npairs}",
                self.pc
            ));
        }
        let count = npairs as usize;
        let table_end = base + 8 + count * 8;
        if table_end > self.code.len() {
            return Err(verify_fail!(
                self.sink,
                "LOOKUPSWITCH at PC {} declares {count} pairs but the method ends first",
                self.pc
            ));
        }
        self.check_branch_target(default_offset as i64, opcode)?;
        let mut previous_key: Option<i32> = None;
        for pair in 0..count {
            let key = self.i32_at(base + 8 + pair * 8);
            if let Some(prev) = previous_key {
                if key <= prev {
                    return Err(verify_fail!(
                        self.sink,
                        "LOOKUPSWITCH at PC {} has unsorted match keys ({key} after {prev})",
                        self.pc
                    ));
                }
            }
            previous_key = Some(key);
            let offset = self.i32_at(base + 8 + pair * 8 + 4);
            self.check_branch_target(offset as i64, opcode)?;
        }
        self.pop_lenient(1);
        Ok(table_end - self.pc)
    }
}
