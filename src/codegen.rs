// src/codegen.rs
//! Emission side of the translator: the instruction buffer, storage
//! allocation and backpatching. The parser drives it in a single pass.

use crate::error::{Error, Result};
use crate::ir::{Line, Op, Operand, Program, Quad};
use std::collections::HashMap;

pub const ADDRESS_BASE: u32 = 400;
pub const TEMP_BASE: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// First storage address handed to a declared variable.
    pub address_base: u32,
    /// First number used for temporaries and pending jump labels.
    pub temp_base: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { address_base: ADDRESS_BASE, temp_base: TEMP_BASE }
    }
}

/// Variable name to storage address, allocated in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    addrs: HashMap<String, u32>,
    order: Vec<String>,
    next: u32,
}

impl SymbolTable {
    pub fn new(base: u32) -> Self {
        Self { addrs: HashMap::new(), order: Vec::new(), next: base }
    }

    /// Allocates a fresh address for `name`, declared at `line`/`col`.
    pub fn declare(&mut self, name: &str, line: usize, col: usize) -> Result<u32> {
        if self.addrs.contains_key(name) {
            return Err(Error::semantic(
                format!("variable '{name}' is already defined"),
                line,
                col,
            ));
        }
        let addr = self.next;
        self.next = addr
            .checked_add(1)
            .ok_or_else(|| Error::semantic("address space exhausted", line, col))?;
        self.addrs.insert(name.to_string(), addr);
        self.order.push(name.to_string());
        Ok(addr)
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.addrs.get(name).copied()
    }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.order.iter().map(move |name| (name.as_str(), self.addrs[name]))
    }
}

/// Index of an emitted jump whose target is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a pending jump must be patched"]
pub struct JumpHandle(usize);

#[derive(Debug)]
struct LoopFrame {
    head: Line,
    breaks: Vec<JumpHandle>,
}

pub struct Codegen {
    code: Vec<Quad>,
    symbols: SymbolTable,
    next_temp: u32,
    loops: Vec<LoopFrame>,
    // source position errors raised here are reported at
    origin: (usize, usize),
}

impl Codegen {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            code: Vec::with_capacity(256),
            symbols: SymbolTable::new(options.address_base),
            next_temp: options.temp_base,
            loops: Vec::new(),
            origin: (1, 1),
        }
    }

    /// Records the source position of the token being translated.
    pub fn locate(&mut self, line: usize, col: usize) {
        self.origin = (line, col);
    }

    /// Line number the next emitted instruction will occupy.
    pub fn next_line(&self) -> Line {
        self.code.len() + 1
    }

    pub fn emit(&mut self, quad: Quad) -> Line {
        let line = self.next_line();
        log::trace!("{line:4}: {quad}");
        self.code.push(quad);
        line
    }

    fn next_number(&mut self) -> Result<u32> {
        let n = self.next_temp;
        let (line, col) = self.origin;
        self.next_temp = n
            .checked_add(1)
            .ok_or_else(|| Error::semantic("temporary numbering exhausted", line, col))?;
        Ok(n)
    }

    pub fn new_temp(&mut self) -> Result<Operand> {
        Ok(Operand::Temp(self.next_number()?))
    }

    pub fn binary(&mut self, op: Op, lhs: Operand, rhs: Operand) -> Result<Operand> {
        let temp = self.new_temp()?;
        self.emit(Quad::new(op, lhs, rhs, temp.clone()));
        Ok(temp)
    }

    pub fn unary(&mut self, op: Op, arg: Operand) -> Result<Operand> {
        let temp = self.new_temp()?;
        self.emit(Quad::new(op, arg, Operand::None, temp.clone()));
        Ok(temp)
    }

    /// Emits a jump with a placeholder target to be patched later.
    pub fn emit_jump(&mut self, op: Op, cond: Operand) -> Result<JumpHandle> {
        let label = Operand::Label(self.next_number()?);
        let line = self.emit(Quad::new(op, cond, Operand::None, label));
        Ok(JumpHandle(line - 1))
    }

    /// Emits a jump whose target is already known.
    pub fn emit_jump_to(&mut self, op: Op, cond: Operand, target: Line) -> Line {
        self.emit(Quad::new(op, cond, Operand::None, Operand::Line(target)))
    }

    pub fn patch(&mut self, handle: JumpHandle, target: Line) {
        let quad = &mut self.code[handle.0];
        debug_assert!(quad.op.is_jump());
        log::trace!("patch {} -> {target}", handle.0 + 1);
        quad.result = Operand::Line(target);
    }

    /// Patches a jump to the line the next instruction will occupy.
    pub fn patch_here(&mut self, handle: JumpHandle) {
        let here = self.next_line();
        self.patch(handle, here);
    }

    pub fn declare(&mut self, name: &str, line: usize, col: usize) -> Result<u32> {
        self.symbols.declare(name, line, col)
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.symbols.lookup(name)
    }

    pub fn enter_loop(&mut self, head: Line) {
        self.loops.push(LoopFrame { head, breaks: Vec::new() });
    }

    /// Closes the innermost loop, sending every pending `break` to `exit`.
    pub fn exit_loop(&mut self, exit: Line) {
        if let Some(frame) = self.loops.pop() {
            for handle in frame.breaks {
                self.patch(handle, exit);
            }
        }
    }

    /// Emits a `break` placeholder; `false` when no loop is open.
    pub fn emit_break(&mut self) -> Result<bool> {
        if self.loops.is_empty() {
            return Ok(false);
        }
        let handle = self.emit_jump(Op::Jmp, Operand::None)?;
        if let Some(frame) = self.loops.last_mut() {
            frame.breaks.push(handle);
        }
        Ok(true)
    }

    /// Emits a jump back to the innermost loop head; `false` when no loop is open.
    pub fn emit_continue(&mut self) -> bool {
        match self.loops.last().map(|frame| frame.head) {
            Some(head) => {
                self.emit_jump_to(Op::Jmp, Operand::None, head);
                true
            }
            None => false,
        }
    }

    pub fn finish(self) -> Result<(Program, SymbolTable)> {
        let program = Program::new(self.code);
        program.verify()?;
        Ok((program, self.symbols))
    }
}
