// src/ir.rs
//! Three-address program model and its quadruple text form.
//!
//! One instruction renders as `(op, arg1, arg2, result)`, one per line, and
//! the 1-based line number is what jumps refer to. Bare integers are always
//! variable addresses; numeric immediates always carry a `#` tag so the two
//! can never be confused.

use crate::error::{Error, Result, RuntimeFault};
use std::fmt;
use std::str::FromStr;

/// 1-based instruction number.
pub type Line = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Assign,
    Add, Sub, Mul, Div, Mod,
    Gt, Lt, Ge, Le, Eq, Ne,
    And, Or,
    Not, Neg,
    Jmp, Jmpf,
    Print,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Assign => "=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            Op::Neg => "neg",
            Op::Jmp => "jmp",
            Op::Jmpf => "jmpf",
            Op::Print => "print",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Op> {
        Some(match symbol {
            "=" => Op::Assign,
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Mod,
            ">" => Op::Gt,
            "<" => Op::Lt,
            ">=" => Op::Ge,
            "<=" => Op::Le,
            "==" => Op::Eq,
            "!=" => Op::Ne,
            "and" => Op::And,
            "or" => Op::Or,
            "not" => Op::Not,
            "neg" => Op::Neg,
            "jmp" => Op::Jmp,
            "jmpf" => Op::Jmpf,
            "print" => Op::Print,
            _ => return None,
        })
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Op::Jmp | Op::Jmpf)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Numeric immediate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parses a numeric lexeme, keeping integral values exact.
    pub fn parse(text: &str) -> Option<Number> {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Int(i));
        }
        let v: f64 = text.parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            Some(Number::Int(v as i64))
        } else {
            Some(Number::Float(v))
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// Encodes a numeric lexeme as an immediate token, e.g. `2.50` becomes `#2.5`.
pub fn encode_number(text: &str) -> Option<String> {
    Number::parse(text).map(|n| format!("#{n}"))
}

/// Inverse of [`encode_number`]. Bare integers are addresses, not numbers.
pub fn decode_number(token: &str) -> Option<Number> {
    token.strip_prefix('#').and_then(Number::parse)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Unused slot, rendered `_`.
    None,
    /// Storage address of a declared variable.
    Addr(u32),
    /// Synthesized intermediate value.
    Temp(u32),
    /// Variable referenced by name; only produced by hand-written programs.
    Name(String),
    Imm(Number),
    Str(String),
    Bool(bool),
    /// Resolved jump target.
    Line(Line),
    /// Jump target still waiting for a backpatch.
    Label(u32),
}

impl Operand {
    /// Whether this operand denotes a value an instruction can read.
    pub fn is_value(&self) -> bool {
        !matches!(self, Operand::None | Operand::Line(_) | Operand::Label(_))
    }

    fn parse(token: &str, jump_target: bool) -> Option<Operand> {
        let token = token.trim();
        if token == "_" {
            return Some(Operand::None);
        }
        if token == "true" || token == "false" {
            return Some(Operand::Bool(token == "true"));
        }
        if token.starts_with('#') {
            return decode_number(token).map(Operand::Imm);
        }
        if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
            return unescape(&token[1..token.len() - 1]).map(Operand::Str);
        }
        if token.bytes().all(|b| b.is_ascii_digit()) && !token.is_empty() {
            return if jump_target {
                token.parse().ok().map(Operand::Line)
            } else {
                token.parse().ok().map(Operand::Addr)
            };
        }
        for (prefix, make) in [
            ('t', Operand::Temp as fn(u32) -> Operand),
            ('L', Operand::Label as fn(u32) -> Operand),
        ] {
            if let Some(n) = token.strip_prefix(prefix).and_then(|n| n.parse().ok()) {
                return Some(make(n));
            }
        }
        let mut chars = token.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    Some(Operand::Name(token.to_string()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::None => f.write_str("_"),
            Operand::Addr(a) => write!(f, "{a}"),
            Operand::Temp(t) => write!(f, "t{t}"),
            Operand::Name(n) => f.write_str(n),
            Operand::Imm(n) => write!(f, "#{n}"),
            Operand::Str(s) => write!(f, "\"{}\"", escape(s)),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Line(l) => write!(f, "{l}"),
            Operand::Label(l) => write!(f, "L{l}"),
        }
    }
}

/// The `(operator, arg1, arg2, result)` instruction record.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub op: Op,
    pub arg1: Operand,
    pub arg2: Operand,
    pub result: Operand,
}

impl Quad {
    pub fn new(op: Op, arg1: Operand, arg2: Operand, result: Operand) -> Self {
        Self { op, arg1, arg2, result }
    }

    /// The concrete jump target, if this is a resolved jump.
    pub fn target(&self) -> Option<Line> {
        match (self.op.is_jump(), &self.result) {
            (true, Operand::Line(l)) => Some(*l),
            _ => None,
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.op, self.arg1, self.arg2, self.result)
    }
}

/// Escapes a string literal so the listing keeps one instruction per line.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(match chars.next()? {
                '\\' => '\\',
                '"' => '"',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                _ => return None,
            }),
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Splits `a, "x, y", b` on commas that sit outside string quotes.
fn split_fields(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                fields.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(body[start..].trim());
    fields
}

impl Quad {
    fn parse_line(text: &str, line: Line) -> Result<Quad> {
        let malformed = |what: &str| Error::syntax(format!("malformed quadruple: {what}"), line, 1);

        let body = text
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| malformed("expected '(op, arg1, arg2, result)'"))?;
        let fields = split_fields(body);
        if fields.len() != 4 {
            return Err(malformed(&format!("expected 4 fields, found {}", fields.len())));
        }

        let op = Op::from_symbol(fields[0]).ok_or_else(|| {
            Error::runtime(RuntimeFault::UnknownOperation(fields[0].to_string()), line)
        })?;
        let operand = |field: &str, jump_target: bool| {
            Operand::parse(field, jump_target)
                .ok_or_else(|| malformed(&format!("invalid operand '{field}'")))
        };

        Ok(Quad::new(
            op,
            operand(fields[1], false)?,
            operand(fields[2], false)?,
            operand(fields[3], op.is_jump())?,
        ))
    }
}

/// Ordered instruction sequence; index + 1 is the line number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    quads: Vec<Quad>,
}

impl Program {
    pub fn new(quads: Vec<Quad>) -> Self {
        Self { quads }
    }

    pub fn len(&self) -> usize { self.quads.len() }
    pub fn is_empty(&self) -> bool { self.quads.is_empty() }

    /// Fetches the instruction at a 1-based line.
    pub fn get(&self, line: Line) -> Option<&Quad> {
        line.checked_sub(1).and_then(|i| self.quads.get(i))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Quad> {
        self.quads.iter()
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// Checks that every jump holds a concrete target in `[1, len + 1]`.
    pub fn verify(&self) -> Result<()> {
        let end = self.len() + 1;
        for (i, quad) in self.quads.iter().enumerate() {
            if !quad.op.is_jump() {
                continue;
            }
            match quad.target() {
                Some(target) if (1..=end).contains(&target) => {}
                _ => {
                    return Err(Error::runtime(
                        RuntimeFault::UnresolvedJump(quad.result.to_string()),
                        i + 1,
                    ))
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for quad in &self.quads {
            writeln!(f, "{quad}")?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(text: &str) -> Result<Program> {
        let quads = text
            .trim_end()
            .lines()
            .enumerate()
            .map(|(i, line)| Quad::parse_line(line, i + 1))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("loaded {} quadruples", quads.len());
        Ok(Program { quads })
    }
}
