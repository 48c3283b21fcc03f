//! Structure/Array capability contract
//!
//! The evaluator never touches row data directly. Every backend (a columnar
//! engine, a row store, an adapter over a structural-biology library)
//! implements [`Structure`] and [`Array`] once; the core only talks to these
//! traits.
//!
//! [`Scalar`] carries the per-element semantics shared by the evaluator and
//! by backends: ordering between mixed numeric types, Python-style floor
//! division and modulo, and the type mismatches that comparisons degrade to
//! an all-false mask.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors raised by array operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrayError {
    #[error("Type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Unknown row index: {0}")]
    UnknownIndex(usize),

    #[error("Integer division by zero")]
    DivisionByZero,
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Element types an array can be cast to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Bool,
    Int,
    Float,
    Str,
}

/// Elementwise binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    /// Operator symbol, as written in selections
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }

    /// True for operators producing a boolean mask
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Scalar {
    /// Name of the dynamic type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
        }
    }

    /// Numeric view; booleans count as 0/1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(x) => Some(*x),
            Scalar::Str(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Bool(b) => Some(*b as i64),
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Truthiness: zero, empty string and false are false
    pub fn truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(x) => *x != 0.0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }

    /// Cast to another element type
    pub fn cast(&self, dtype: DType) -> Result<Scalar, ArrayError> {
        let mismatch = || ArrayError::TypeMismatch {
            op: "astype",
            lhs: self.type_name(),
            rhs: dtype.name(),
        };
        Ok(match dtype {
            DType::Bool => Scalar::Bool(self.truthy()),
            DType::Str => Scalar::Str(self.to_string()),
            DType::Float => match self {
                Scalar::Str(s) => Scalar::Float(s.trim().parse().map_err(|_| mismatch())?),
                other => Scalar::Float(other.as_f64().ok_or_else(mismatch)?),
            },
            DType::Int => match self {
                Scalar::Str(s) => Scalar::Int(s.trim().parse().map_err(|_| mismatch())?),
                Scalar::Float(x) => Scalar::Int(x.trunc() as i64),
                other => Scalar::Int(other.as_i64().ok_or_else(mismatch)?),
            },
        })
    }

    /// Ordering between two scalars; `None` when the types cannot be ordered
    pub fn partial_cmp_scalar(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Str(_), _) | (_, Scalar::Str(_)) => None,
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Apply a binary operator elementwise on two scalars
    pub fn binary(&self, op: BinaryOp, rhs: &Scalar) -> Result<Scalar, ArrayError> {
        let mismatch = || ArrayError::TypeMismatch {
            op: op.as_str(),
            lhs: self.type_name(),
            rhs: rhs.type_name(),
        };

        match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                // Equality between unrelated types is simply false
                let equal = match (self, rhs) {
                    (Scalar::Str(a), Scalar::Str(b)) => a == b,
                    (Scalar::Str(_), _) | (_, Scalar::Str(_)) => false,
                    _ => self.partial_cmp_scalar(rhs) == Some(Ordering::Equal),
                };
                Ok(Scalar::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (self, rhs) {
                    (Scalar::Float(a), _) if a.is_nan() => None,
                    (_, Scalar::Float(b)) if b.is_nan() => None,
                    _ => Some(self.partial_cmp_scalar(rhs).ok_or_else(mismatch)?),
                };
                let result = match ordering {
                    None => false,
                    Some(ord) => match op {
                        BinaryOp::Lt => ord == Ordering::Less,
                        BinaryOp::Le => ord != Ordering::Greater,
                        BinaryOp::Gt => ord == Ordering::Greater,
                        _ => ord != Ordering::Less,
                    },
                };
                Ok(Scalar::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                let (a, b) = (self.truthy(), rhs.truthy());
                Ok(Scalar::Bool(match op {
                    BinaryOp::And => a && b,
                    BinaryOp::Or => a || b,
                    _ => a ^ b,
                }))
            }
            BinaryOp::Add => match (self, rhs) {
                (Scalar::Str(a), Scalar::Str(b)) => Ok(Scalar::Str(format!("{a}{b}"))),
                _ => self.numeric(rhs, op, |a, b| a.checked_add(b), |a, b| a + b),
            },
            BinaryOp::Sub => self.numeric(rhs, op, |a, b| a.checked_sub(b), |a, b| a - b),
            BinaryOp::Mul => self.numeric(rhs, op, |a, b| a.checked_mul(b), |a, b| a * b),
            BinaryOp::Div => {
                let (a, b) = (
                    self.as_f64().ok_or_else(mismatch)?,
                    rhs.as_f64().ok_or_else(mismatch)?,
                );
                Ok(Scalar::Float(a / b))
            }
            BinaryOp::FloorDiv => match (self.as_i64(), rhs.as_i64()) {
                (Some(_), Some(0)) => Err(ArrayError::DivisionByZero),
                (Some(a), Some(b)) => Ok(match floor_div_i64(a, b) {
                    Some(q) => Scalar::Int(q),
                    None => Scalar::Float((a as f64 / b as f64).floor()),
                }),
                _ => {
                    let (a, b) = (
                        self.as_f64().ok_or_else(mismatch)?,
                        rhs.as_f64().ok_or_else(mismatch)?,
                    );
                    Ok(Scalar::Float((a / b).floor()))
                }
            },
            BinaryOp::Mod => match (self.as_i64(), rhs.as_i64()) {
                (Some(_), Some(0)) => Err(ArrayError::DivisionByZero),
                (Some(a), Some(b)) => Ok(Scalar::Int(python_mod_i64(a, b))),
                _ => {
                    let (a, b) = (
                        self.as_f64().ok_or_else(mismatch)?,
                        rhs.as_f64().ok_or_else(mismatch)?,
                    );
                    Ok(Scalar::Float(python_mod_f64(a, b)))
                }
            },
            BinaryOp::Pow => match (self.as_i64(), rhs.as_i64()) {
                (Some(a), Some(b)) if (0..=u32::MAX as i64).contains(&b) => a
                    .checked_pow(b as u32)
                    .map(Scalar::Int)
                    .or_else(|| Some(Scalar::Float((a as f64).powf(b as f64))))
                    .ok_or_else(mismatch),
                _ => {
                    let (a, b) = (
                        self.as_f64().ok_or_else(mismatch)?,
                        rhs.as_f64().ok_or_else(mismatch)?,
                    );
                    Ok(Scalar::Float(a.powf(b)))
                }
            },
        }
    }

    /// Absolute value; integers stay integers
    pub fn abs(&self) -> Result<Scalar, ArrayError> {
        match self {
            Scalar::Int(i) => Ok(match i.checked_abs() {
                Some(v) => Scalar::Int(v),
                None => Scalar::Float((*i as f64).abs()),
            }),
            Scalar::Float(x) => Ok(Scalar::Float(x.abs())),
            Scalar::Bool(b) => Ok(Scalar::Int(*b as i64)),
            Scalar::Str(_) => Err(ArrayError::TypeMismatch {
                op: "abs",
                lhs: "str",
                rhs: "str",
            }),
        }
    }

    /// Unary negation
    pub fn neg(&self) -> Result<Scalar, ArrayError> {
        match self {
            Scalar::Int(i) => Ok(match i.checked_neg() {
                Some(v) => Scalar::Int(v),
                None => Scalar::Float(-(*i as f64)),
            }),
            Scalar::Float(x) => Ok(Scalar::Float(-x)),
            Scalar::Bool(b) => Ok(Scalar::Int(-(*b as i64))),
            Scalar::Str(_) => Err(ArrayError::TypeMismatch {
                op: "-",
                lhs: "str",
                rhs: "str",
            }),
        }
    }

    fn numeric(
        &self,
        rhs: &Scalar,
        op: BinaryOp,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Scalar, ArrayError> {
        if let (Some(a), Some(b)) = (self.as_i64(), rhs.as_i64()) {
            if let Some(v) = int_op(a, b) {
                return Ok(Scalar::Int(v));
            }
        }
        match (self.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Scalar::Float(float_op(a, b))),
            _ => Err(ArrayError::TypeMismatch {
                op: op.as_str(),
                lhs: self.type_name(),
                rhs: rhs.type_name(),
            }),
        }
    }
}

/// Flooring integer division; `None` when the quotient leaves the i64 range
fn floor_div_i64(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Modulo with the sign of the divisor
fn python_mod_i64(a: i64, b: i64) -> i64 {
    // Only i64::MIN % -1 wraps, and its remainder is 0
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

fn python_mod_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int => "int",
            DType::Float => "float",
            DType::Str => "str",
        }
    }
}

/// Right-hand operand of an elementwise operation
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a, A> {
    Array(&'a A),
    Scalar(&'a Scalar),
}

/// A per-row value vector aligned to a structure's row index
pub trait Array: Clone + fmt::Debug {
    /// Number of rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable row identities, in row order
    fn row_index(&self) -> Vec<usize>;

    /// Elementwise binary operation against another array or a scalar
    fn binary(&self, op: BinaryOp, rhs: Operand<'_, Self>) -> Result<Self, ArrayError>;

    /// Elementwise negation
    fn neg(&self) -> Result<Self, ArrayError>;

    /// Elementwise logical complement
    fn invert(&self) -> Result<Self, ArrayError>;

    /// Cast every element
    fn astype(&self, dtype: DType) -> Result<Self, ArrayError>;

    /// Apply a float function to every element
    fn map_float(&self, f: fn(f64) -> f64) -> Result<Self, ArrayError>;

    /// True if any element is truthy
    fn any(&self) -> bool;

    /// True if every element is truthy
    fn all(&self) -> bool;

    /// Membership mask against a set of values
    fn isin(&self, values: &[Scalar]) -> Self;

    /// Distinct values, in first-seen order
    fn unique(&self) -> Vec<Scalar>;

    /// Element values in row order
    fn values(&self) -> Vec<Scalar>;

    /// Copy of `self` with the rows named by `values.row_index()` replaced
    fn set_by_index(&self, values: &Self) -> Result<Self, ArrayError>;

    /// Native substring/regex search, if the backend has one
    fn str_contains(&self, _pattern: &Regex) -> Option<Self> {
        None
    }
}

/// An ordered collection of rows with named columns
pub trait Structure: Sized {
    type Array: Array;

    /// Number of rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names
    fn columns(&self) -> Vec<String>;

    /// A named column, or the positional row index for `"index"`
    fn get_property(&self, key: &str) -> Option<Self::Array>;

    /// A new structure holding only the rows where `mask` is true
    fn select(&self, mask: &Self::Array) -> Self;

    /// Per-row minimum Euclidean distance to any row of `other`
    fn minimum_pairwise_distances(&self, other: &Self) -> Self::Array;

    /// An array holding `value` in every row
    fn array_filled(&self, value: Scalar) -> Self::Array;

    /// An array from per-row values
    fn array_values(&self, values: Vec<Scalar>) -> Self::Array;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Scalar::Int(7), BinaryOp::FloorDiv, Scalar::Int(2), Scalar::Int(3))]
    #[case(Scalar::Int(-7), BinaryOp::FloorDiv, Scalar::Int(2), Scalar::Int(-4))]
    #[case(Scalar::Int(7), BinaryOp::FloorDiv, Scalar::Int(-2), Scalar::Int(-4))]
    #[case(Scalar::Int(-7), BinaryOp::Mod, Scalar::Int(3), Scalar::Int(2))]
    #[case(Scalar::Int(7), BinaryOp::Mod, Scalar::Int(-3), Scalar::Int(-2))]
    #[case(Scalar::Int(7), BinaryOp::Div, Scalar::Int(2), Scalar::Float(3.5))]
    #[case(Scalar::Int(2), BinaryOp::Pow, Scalar::Int(10), Scalar::Int(1024))]
    #[case(Scalar::Float(1.5), BinaryOp::Add, Scalar::Int(1), Scalar::Float(2.5))]
    #[case(Scalar::Int(i64::MIN), BinaryOp::Mod, Scalar::Int(-1), Scalar::Int(0))]
    #[case(Scalar::Int(i64::MIN), BinaryOp::FloorDiv, Scalar::Int(-1), Scalar::Float(9.223372036854775808e18))]
    #[case(Scalar::Int(i64::MIN), BinaryOp::FloorDiv, Scalar::Int(1), Scalar::Int(i64::MIN))]
    #[case(Scalar::Int(i64::MAX), BinaryOp::Add, Scalar::Int(1), Scalar::Float(9.223372036854775808e18))]
    #[case(Scalar::Int(i64::MIN), BinaryOp::Sub, Scalar::Int(1), Scalar::Float(-9.223372036854775808e18))]
    #[case(Scalar::Int(1), BinaryOp::Div, Scalar::Int(0), Scalar::Float(f64::INFINITY))]
    fn test_scalar_arithmetic(
        #[case] lhs: Scalar,
        #[case] op: BinaryOp,
        #[case] rhs: Scalar,
        #[case] expected: Scalar,
    ) {
        assert_eq!(lhs.binary(op, &rhs).unwrap(), expected);
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        let lt = Scalar::Int(3).binary(BinaryOp::Lt, &Scalar::Float(3.5)).unwrap();
        assert_eq!(lt, Scalar::Bool(true));
        let eq = Scalar::Int(3).binary(BinaryOp::Eq, &Scalar::Float(3.0)).unwrap();
        assert_eq!(eq, Scalar::Bool(true));
    }

    #[test]
    fn test_string_number_ordering_is_a_type_mismatch() {
        let err = Scalar::from("CA")
            .binary(BinaryOp::Lt, &Scalar::Int(3))
            .unwrap_err();
        assert!(matches!(err, ArrayError::TypeMismatch { op: "<", .. }));
    }

    #[test]
    fn test_string_number_equality_is_false() {
        let eq = Scalar::from("3").binary(BinaryOp::Eq, &Scalar::Int(3)).unwrap();
        assert_eq!(eq, Scalar::Bool(false));
    }

    #[rstest]
    #[case(BinaryOp::Mod)]
    #[case(BinaryOp::FloorDiv)]
    fn test_integer_division_by_zero(#[case] op: BinaryOp) {
        assert_eq!(
            Scalar::Int(1).binary(op, &Scalar::Int(0)),
            Err(ArrayError::DivisionByZero)
        );
    }

    #[test]
    fn test_negating_min_int_widens_to_float() {
        assert_eq!(Scalar::Int(i64::MIN).neg().unwrap(), Scalar::Float(9.223372036854775808e18));
        assert_eq!(Scalar::Int(5).neg().unwrap(), Scalar::Int(-5));
    }

    #[test]
    fn test_cast() {
        assert_eq!(Scalar::Int(0).cast(DType::Bool).unwrap(), Scalar::Bool(false));
        assert_eq!(Scalar::Int(12).cast(DType::Str).unwrap(), Scalar::from("12"));
        assert!(Scalar::from("CA").cast(DType::Float).is_err());
    }
}
