// src/vm.rs
use crate::error::{Error, Result, RuntimeFault};
use crate::ir::{Line, Number, Op, Operand, Program, Quad};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

type Fault<T> = std::result::Result<T, RuntimeFault>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64), Float(f64), Str(String),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    fn from_bool(b: bool) -> Value {
        Value::Int(b as i64)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

fn mismatch(op: Op, a: &Value, b: &Value) -> RuntimeFault {
    RuntimeFault::TypeMismatch(format!("cannot apply '{op}' to {a:?} and {b:?}"))
}

fn overflow(op: Op) -> RuntimeFault {
    RuntimeFault::InvalidArithmetic(format!("integer overflow in '{op}'"))
}

fn float_result(v: f64) -> Fault<Value> {
    if v.is_finite() {
        Ok(Value::Float(v))
    } else {
        Err(RuntimeFault::InvalidArithmetic("result is not a finite number".to_string()))
    }
}

fn arith(op: Op, a: Value, b: Value) -> Fault<Value> {
    if op == Op::Add && (matches!(a, Value::Str(_)) || matches!(b, Value::Str(_))) {
        return Ok(Value::Str(format!("{a}{b}")));
    }
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => {
            let (x, y) = (*x, *y);
            let r = match op {
                Op::Add => x.checked_add(y),
                Op::Sub => x.checked_sub(y),
                Op::Mul => x.checked_mul(y),
                Op::Div | Op::Mod if y == 0 => return Err(RuntimeFault::DivisionByZero),
                Op::Div => match x.checked_rem(y) {
                    Some(0) => x.checked_div(y),
                    Some(_) => return Ok(Value::Float(x as f64 / y as f64)),
                    None => None,
                },
                Op::Mod => x.checked_rem(y),
                _ => return Err(mismatch(op, &a, &b)),
            };
            r.map(Value::Int).ok_or_else(|| overflow(op))
        }
        _ => {
            let (x, y) = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(mismatch(op, &a, &b)),
            };
            match op {
                Op::Add => float_result(x + y),
                Op::Sub => float_result(x - y),
                Op::Mul => float_result(x * y),
                Op::Div | Op::Mod if y == 0.0 => Err(RuntimeFault::DivisionByZero),
                Op::Div => float_result(x / y),
                Op::Mod => float_result(x % y),
                _ => Err(mismatch(op, &a, &b)),
            }
        }
    }
}

fn compare(op: Op, a: &Value, b: &Value) -> Fault<Value> {
    use std::cmp::Ordering;

    let ordering: Option<Ordering> = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            // a number never equals a string
            _ if matches!(op, Op::Eq | Op::Ne) => None,
            _ => return Err(mismatch(op, a, b)),
        },
    };
    let result = match op {
        Op::Eq => ordering == Some(Ordering::Equal),
        Op::Ne => ordering != Some(Ordering::Equal),
        Op::Lt => ordering == Some(Ordering::Less),
        Op::Gt => ordering == Some(Ordering::Greater),
        Op::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Op::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        _ => return Err(mismatch(op, a, b)),
    };
    Ok(Value::from_bool(result))
}

/// Key into the variable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Var(u32),
    Temp(u32),
    Name(String),
}

impl Slot {
    fn of(operand: &Operand) -> Option<Slot> {
        match operand {
            Operand::Addr(a) => Some(Slot::Var(*a)),
            Operand::Temp(t) => Some(Slot::Temp(*t)),
            Operand::Name(n) => Some(Slot::Name(n.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Executed-instruction budget; `None` disables the limit.
    pub max_steps: Option<u64>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { max_steps: Some(1_000_000) }
    }
}

enum Flow {
    Next,
    Jump(Line),
}

pub struct VM<W: Write> {
    store: HashMap<Slot, Value>,
    out: W,
    options: VmOptions,
    steps: u64,
}

impl<W: Write> VM<W> {
    pub fn new(out: W, options: VmOptions) -> Self {
        Self {
            store: HashMap::new(),
            out,
            options,
            steps: 0,
        }
    }

    /// Value currently held by a store slot.
    pub fn get(&self, slot: &Slot) -> Option<&Value> {
        self.store.get(slot)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn resolve(&self, operand: &Operand) -> Fault<Value> {
        match operand {
            Operand::Bool(b) => Ok(Value::from_bool(*b)),
            Operand::Str(s) => Ok(Value::Str(s.clone())),
            Operand::Imm(n) => Ok(Value::from(*n)),
            _ => Slot::of(operand)
                .and_then(|slot| self.store.get(&slot).cloned())
                .ok_or_else(|| RuntimeFault::UnknownOperand(operand.to_string())),
        }
    }

    fn store(&mut self, result: &Operand, value: Value) -> Fault<()> {
        let slot = Slot::of(result)
            .ok_or_else(|| RuntimeFault::UnknownOperand(format!("cannot store into {result}")))?;
        self.store.insert(slot, value);
        Ok(())
    }

    fn jump(quad: &Quad, ip: Line) -> Fault<Flow> {
        match &quad.result {
            Operand::Line(target) if *target == ip => Err(RuntimeFault::SelfJump),
            Operand::Line(target) => Ok(Flow::Jump(*target)),
            other => Err(RuntimeFault::UnresolvedJump(other.to_string())),
        }
    }

    fn exec(&mut self, quad: &Quad, ip: Line) -> Result<Flow> {
        let fault = |kind: RuntimeFault| Error::runtime(kind, ip);

        match quad.op {
            Op::Assign => {
                let v = self.resolve(&quad.arg1).map_err(fault)?;
                self.store(&quad.result, v).map_err(fault)?;
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                let a = self.resolve(&quad.arg1).map_err(fault)?;
                let b = self.resolve(&quad.arg2).map_err(fault)?;
                let v = arith(quad.op, a, b).map_err(fault)?;
                self.store(&quad.result, v).map_err(fault)?;
            }
            Op::Gt | Op::Lt | Op::Ge | Op::Le | Op::Eq | Op::Ne => {
                let a = self.resolve(&quad.arg1).map_err(fault)?;
                let b = self.resolve(&quad.arg2).map_err(fault)?;
                let v = compare(quad.op, &a, &b).map_err(fault)?;
                self.store(&quad.result, v).map_err(fault)?;
            }
            Op::And | Op::Or => {
                let a = self.resolve(&quad.arg1).map_err(fault)?.truthy();
                let b = self.resolve(&quad.arg2).map_err(fault)?.truthy();
                let v = if quad.op == Op::And { a && b } else { a || b };
                self.store(&quad.result, Value::from_bool(v)).map_err(fault)?;
            }
            Op::Not => {
                let a = self.resolve(&quad.arg1).map_err(fault)?;
                self.store(&quad.result, Value::from_bool(!a.truthy())).map_err(fault)?;
            }
            Op::Neg => {
                let v = match self.resolve(&quad.arg1).map_err(fault)? {
                    Value::Int(i) => {
                        let negated = i.checked_neg().ok_or_else(|| fault(overflow(Op::Neg)))?;
                        Value::Int(negated)
                    }
                    Value::Float(f) => Value::Float(-f),
                    s @ Value::Str(_) => {
                        let mismatch = RuntimeFault::TypeMismatch(format!("cannot negate {s:?}"));
                        return Err(fault(mismatch));
                    }
                };
                self.store(&quad.result, v).map_err(fault)?;
            }
            Op::Jmp => return Self::jump(quad, ip).map_err(fault),
            Op::Jmpf => {
                if !self.resolve(&quad.arg1).map_err(fault)?.truthy() {
                    return Self::jump(quad, ip).map_err(fault);
                }
            }
            Op::Print => {
                let v = self.resolve(&quad.arg1).map_err(fault)?;
                writeln!(self.out, "{}", v)?;
            }
        }
        Ok(Flow::Next)
    }

    /// Runs the program from line 1 until the instruction pointer walks off the end.
    pub fn run(&mut self, program: &Program) -> Result<()> {
        program.verify()?;
        log::debug!("executing {} quadruples", program.len());

        let mut ip: Line = 1;
        while let Some(quad) = program.get(ip) {
            if let Some(max) = self.options.max_steps {
                if self.steps >= max {
                    return Err(Error::runtime(RuntimeFault::StepLimitExceeded(max), ip));
                }
            }
            self.steps += 1;
            log::trace!("{ip:4}: {quad}");

            match self.exec(quad, ip)? {
                // land on the line before the target so the increment reaches it
                Flow::Jump(target) => ip = target - 1,
                Flow::Next => {}
            }
            ip += 1;
        }

        self.out.flush()?;
        log::debug!("halted after {} steps", self.steps);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_text(text: &str) -> (Result<()>, String) {
        let program: Program = text.parse().unwrap();
        let mut vm = VM::new(Vec::new(), VmOptions::default());
        let result = vm.run(&program);
        (result, String::from_utf8(vm.into_output()).unwrap())
    }

    fn fault_of(result: Result<()>) -> (RuntimeFault, Line) {
        match result {
            Err(Error::Runtime { kind, line }) => (kind, line),
            other => panic!("expected runtime fault, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_and_print() {
        let (result, out) = run_text("(=, #7, _, 400)\n(%, 400, #4, t600)\n(print, t600, _, _)\n");
        result.unwrap();
        assert_eq!(out, "3\n");
    }

    #[test]
    fn integer_division_stays_exact_when_it_can() {
        assert_eq!(arith(Op::Div, Value::Int(6), Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(arith(Op::Div, Value::Int(5), Value::Int(2)), Ok(Value::Float(2.5)));
        assert_eq!(arith(Op::Add, Value::Int(1), Value::Float(0.5)), Ok(Value::Float(1.5)));
    }

    #[test]
    fn division_and_modulo_by_zero_fault() {
        assert_eq!(arith(Op::Div, Value::Int(1), Value::Int(0)), Err(RuntimeFault::DivisionByZero));
        assert_eq!(arith(Op::Mod, Value::Float(1.0), Value::Int(0)), Err(RuntimeFault::DivisionByZero));
        let (result, _) = run_text("(/, #1, #0, t600)");
        assert_eq!(fault_of(result), (RuntimeFault::DivisionByZero, 1));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            arith(Op::Mul, Value::Int(i64::MAX), Value::Int(2)),
            Err(RuntimeFault::InvalidArithmetic(_))
        ));
    }

    #[test]
    fn negation_checks_range_and_type() {
        let (result, out) = run_text("(neg, #5, _, t600)\n(print, t600, _, _)");
        result.unwrap();
        assert_eq!(out, "-5\n");

        let (result, _) = run_text("(neg, #-9223372036854775808, _, t600)");
        assert!(matches!(fault_of(result), (RuntimeFault::InvalidArithmetic(_), 1)));

        let (result, _) = run_text("(=, #1, _, 400)\n(neg, \"x\", _, t600)");
        assert!(matches!(fault_of(result), (RuntimeFault::TypeMismatch(_), 2)));
    }

    #[test]
    fn strings_concatenate_and_compare() {
        assert_eq!(
            arith(Op::Add, Value::Str("n=".into()), Value::Int(3)),
            Ok(Value::Str("n=3".into()))
        );
        assert_eq!(compare(Op::Lt, &Value::Str("a".into()), &Value::Str("b".into())), Ok(Value::Int(1)));
        assert_eq!(compare(Op::Eq, &Value::Str("1".into()), &Value::Int(1)), Ok(Value::Int(0)));
        assert!(compare(Op::Lt, &Value::Str("1".into()), &Value::Int(1)).is_err());
    }

    #[test]
    fn booleans_resolve_to_integers() {
        let (result, out) = run_text("(and, true, false, t600)\n(print, t600, _, _)\n(print, true, _, _)");
        result.unwrap();
        assert_eq!(out, "0\n1\n");
    }

    #[test]
    fn unknown_operand_faults() {
        let (result, _) = run_text("(print, 401, _, _)");
        assert_eq!(fault_of(result), (RuntimeFault::UnknownOperand("401".into()), 1));
        let (result, _) = run_text("(=, #1, _, total)\n(print, count, _, _)");
        assert_eq!(fault_of(result), (RuntimeFault::UnknownOperand("count".into()), 2));
    }

    #[test]
    fn named_slots_work_in_loaded_programs() {
        let (result, out) = run_text("(=, #1, _, total)\n(+, total, #1, total)\n(print, total, _, _)");
        result.unwrap();
        assert_eq!(out, "2\n");
    }

    #[test]
    fn self_jump_is_rejected() {
        let (result, _) = run_text("(=, #0, _, 400)\n(jmp, _, _, 2)");
        assert_eq!(fault_of(result), (RuntimeFault::SelfJump, 2));
    }

    #[test]
    fn untaken_conditional_self_jump_is_fine() {
        let (result, out) = run_text("(jmpf, true, _, 1)\n(print, #1, _, _)");
        result.unwrap();
        assert_eq!(out, "1\n");
    }

    #[test]
    fn jump_to_end_halts() {
        let (result, out) = run_text("(jmp, _, _, 3)\n(print, #1, _, _)");
        result.unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn step_limit_stops_endless_loops() {
        let program: Program = "(print, #1, _, _)\n(jmp, _, _, 1)".parse().unwrap();
        let mut vm = VM::new(Vec::new(), VmOptions { max_steps: Some(10) });
        let (kind, _) = fault_of(vm.run(&program));
        assert_eq!(kind, RuntimeFault::StepLimitExceeded(10));
        assert_eq!(vm.steps(), 10);
    }

    #[test]
    fn store_keeps_assigned_values() {
        let program: Program = "(=, #2.5, _, 400)\n(=, 400, _, 401)".parse().unwrap();
        let mut vm = VM::new(Vec::new(), VmOptions::default());
        vm.run(&program).unwrap();
        assert_eq!(vm.get(&Slot::Var(401)), Some(&Value::Float(2.5)));
    }
}
