// bdbg - Binary Image Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Symbolic integer expressions over registers and target memory.
//!
//! Evaluation is a two-step pipeline: [`Expr::bind`] substitutes known
//! register values, then [`Expr::reduce`] folds constants and resolves
//! memory indirections against a [`PagedSpace`]. Anything unresolvable
//! (an unknown name, an unreadable pointer) stays symbolic instead of
//! erroring, so partial results remain printable.

use std::collections::HashMap;
use std::fmt;

use bdbg_memory::PagedSpace;

pub mod parser;
pub use parser::{parse_expr, parse_expr_with_deref};

/// Binary operators, ordered here for no particular reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        })
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Two's-complement negation.
    Neg,
    /// Bitwise not.
    Not,
}

/// An expression tree. All arithmetic is u64 wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal.
    Int(u64),
    /// A named register (or any unresolved identifier).
    Reg(String),
    /// Sized little-endian read of target memory at `ptr`.
    Mem {
        /// Pointer expression.
        ptr: Box<Expr>,
        /// Read width in bytes (1, 2, 4 or 8).
        size: u8,
    },
    /// Unary operation.
    Un(UnOp, Box<Expr>),
    /// Binary operation.
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// The constant value, if fully reduced.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Substitute every register present in `bindings`; unknown names are
    /// left in place.
    pub fn bind(&self, bindings: &HashMap<String, u64>) -> Expr {
        match self {
            Self::Int(v) => Self::Int(*v),
            Self::Reg(name) => match bindings.get(name) {
                Some(&v) => Self::Int(v),
                None => Self::Reg(name.clone()),
            },
            Self::Mem { ptr, size } => {
                Self::Mem { ptr: Box::new(ptr.bind(bindings)), size: *size }
            }
            Self::Un(op, e) => Self::Un(*op, Box::new(e.bind(bindings))),
            Self::Bin(op, l, r) => {
                Self::Bin(*op, Box::new(l.bind(bindings)), Box::new(r.bind(bindings)))
            }
        }
    }

    /// Fold constants and resolve memory indirections.
    ///
    /// A [`Expr::Mem`] node whose pointer reduces to a constant is replaced
    /// by the little-endian decode of `size` bytes read at the pointer
    /// masked to `addr_mask`. Division by zero and failed reads keep their
    /// node symbolic.
    pub fn reduce(&self, memory: &mut PagedSpace, addr_mask: u64) -> Expr {
        match self {
            Self::Int(v) => Self::Int(*v),
            Self::Reg(name) => Self::Reg(name.clone()),
            Self::Mem { ptr, size } => {
                let ptr = ptr.reduce(memory, addr_mask);
                if let Some(p) = ptr.as_int() {
                    if let Some(v) = read_int(memory, p & addr_mask, *size) {
                        return Self::Int(v);
                    }
                }
                Self::Mem { ptr: Box::new(ptr), size: *size }
            }
            Self::Un(op, e) => {
                let e = e.reduce(memory, addr_mask);
                match (op, e.as_int()) {
                    (UnOp::Neg, Some(v)) => Self::Int(v.wrapping_neg()),
                    (UnOp::Not, Some(v)) => Self::Int(!v),
                    _ => Self::Un(*op, Box::new(e)),
                }
            }
            Self::Bin(op, l, r) => {
                let l = l.reduce(memory, addr_mask);
                let r = r.reduce(memory, addr_mask);
                if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
                    if let Some(v) = fold_bin(*op, a, b) {
                        return Self::Int(v);
                    }
                }
                Self::Bin(*op, Box::new(l), Box::new(r))
            }
        }
    }
}

fn fold_bin(op: BinOp, a: u64, b: u64) -> Option<u64> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => a.checked_div(b)?,
        BinOp::Rem => a.checked_rem(b)?,
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => {
            if b >= 64 {
                0
            } else {
                a << b
            }
        }
        BinOp::Shr => {
            if b >= 64 {
                0
            } else {
                a >> b
            }
        }
    })
}

/// Little-endian decode of `size` bytes at `addr`, or `None` if the space
/// cannot supply that many bytes there.
fn read_int(memory: &mut PagedSpace, addr: u64, size: u8) -> Option<u64> {
    let offset = i64::try_from(addr).ok()?;
    let bytes = memory.read(offset, size as u64)?.into_bytes();
    if bytes.len() != size as usize {
        return None;
    }
    let mut v = 0u64;
    for (i, b) in bytes.iter().enumerate() {
        v |= (*b as u64) << (8 * i);
    }
    Some(v)
}

/// All-ones mask for a pointer of `bits` bits.
pub fn address_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Compound children get parentheses, leaves do not.
        fn child(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
            match e {
                Expr::Bin(..) | Expr::Un(..) => write!(f, "({e})"),
                _ => write!(f, "{e}"),
            }
        }
        match self {
            Self::Int(v) if *v < 10 => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v:#x}"),
            Self::Reg(name) => f.write_str(name),
            Self::Mem { ptr, size } => write!(f, "[{ptr}]:{size}"),
            Self::Un(UnOp::Neg, e) => {
                f.write_str("-")?;
                child(f, e)
            }
            Self::Un(UnOp::Not, e) => {
                f.write_str("~")?;
                child(f, e)
            }
            Self::Bin(op, l, r) => {
                child(f, l)?;
                write!(f, " {op} ")?;
                child(f, r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdbg_memory::space_from_bytes;

    fn reg(name: &str) -> Expr {
        Expr::Reg(name.into())
    }

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Bin(op, Box::new(l), Box::new(r))
    }

    #[test]
    fn test_bind_substitutes_known_registers() {
        let bindings = HashMap::from([("eax".to_string(), 0x10u64)]);
        let e = bin(BinOp::Add, reg("eax"), reg("mystery")).bind(&bindings);
        assert_eq!(e, bin(BinOp::Add, Expr::Int(0x10), reg("mystery")));
    }

    #[test]
    fn test_reduce_folds_constants() {
        let mut mem = space_from_bytes(vec![0; 16]);
        let e = bin(BinOp::Add, Expr::Int(0x10), bin(BinOp::Mul, Expr::Int(3), Expr::Int(4)));
        assert_eq!(e.reduce(&mut mem, u64::MAX).as_int(), Some(0x1c));
    }

    #[test]
    fn test_reduce_is_wrapping() {
        let mut mem = space_from_bytes(vec![0; 16]);
        let e = bin(BinOp::Sub, Expr::Int(0), Expr::Int(1));
        assert_eq!(e.reduce(&mut mem, u64::MAX).as_int(), Some(u64::MAX));
    }

    #[test]
    fn test_division_by_zero_stays_symbolic() {
        let mut mem = space_from_bytes(vec![0; 16]);
        let e = bin(BinOp::Div, Expr::Int(4), Expr::Int(0));
        let r = e.reduce(&mut mem, u64::MAX);
        assert_eq!(r.as_int(), None);
    }

    #[test]
    fn test_memory_indirection_decodes_little_endian() {
        let mut data = vec![0u8; 64];
        data[8..12].copy_from_slice(&[0x78, 0x56, 0x34, 0x12]);
        let mut mem = space_from_bytes(data);

        let e = Expr::Mem { ptr: Box::new(Expr::Int(8)), size: 4 };
        assert_eq!(e.reduce(&mut mem, u64::MAX).as_int(), Some(0x12345678));
    }

    #[test]
    fn test_pointer_is_masked_to_address_width() {
        let mut data = vec![0u8; 64];
        data[8] = 0xaa;
        let mut mem = space_from_bytes(data);

        // 0x1_0000_0008 masked to 32 bits is 8.
        let e = Expr::Mem { ptr: Box::new(Expr::Int(0x1_0000_0008)), size: 1 };
        assert_eq!(e.reduce(&mut mem, address_mask(32)).as_int(), Some(0xaa));
    }

    #[test]
    fn test_unreadable_pointer_stays_symbolic() {
        let mut mem = space_from_bytes(vec![0; 16]);
        // Pointer past the end of the space.
        let e = Expr::Mem { ptr: Box::new(Expr::Int(0x4000)), size: 4 };
        let r = e.reduce(&mut mem, u64::MAX);
        assert!(matches!(r, Expr::Mem { .. }));
    }

    #[test]
    fn test_symbolic_subtree_survives_reduce() {
        let mut mem = space_from_bytes(vec![0; 16]);
        let e = bin(BinOp::Add, reg("lost"), bin(BinOp::Add, Expr::Int(1), Expr::Int(2)));
        let r = e.reduce(&mut mem, u64::MAX);
        assert_eq!(r, bin(BinOp::Add, reg("lost"), Expr::Int(3)));
    }

    #[test]
    fn test_address_mask() {
        assert_eq!(address_mask(32), 0xffff_ffff);
        assert_eq!(address_mask(64), u64::MAX);
    }

    #[test]
    fn test_display() {
        let e = bin(
            BinOp::Add,
            Expr::Mem { ptr: Box::new(reg("esp")), size: 4 },
            Expr::Int(0x20),
        );
        assert_eq!(e.to_string(), "[esp]:4 + 0x20");
        let n = Expr::Un(UnOp::Neg, Box::new(bin(BinOp::Add, reg("a"), Expr::Int(1))));
        assert_eq!(n.to_string(), "-(a + 1)");
    }
}
