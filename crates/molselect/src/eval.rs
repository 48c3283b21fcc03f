//! Expression evaluation for selection
//!
//! Evaluates a macro-free [`Node`] tree against a [`Structure`]. Boolean
//! operators short-circuit: the right operand of `and`/`or` only sees the
//! rows the left operand left undecided, unless it needs the whole
//! structure (see [`Node::short_circuit`]).

use crate::ast::{CompareOp, Node, WithinMode};
use crate::backend::{Array, ArrayError, BinaryOp, DType, Operand, Scalar, Structure};
use crate::error::EvalError;
use regex::Regex;
use tracing::debug;

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Result of evaluating a node: a per-row array (or mask) or a scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Value<A> {
    Array(A),
    Scalar(Scalar),
}

impl<A: Array> Value<A> {
    pub fn as_array(&self) -> Option<&A> {
        match self {
            Value::Array(a) => Some(a),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Array(_) => None,
        }
    }
}

/// Evaluator bound to one structure
pub struct Evaluator<'a, S: Structure> {
    structure: &'a S,
}

impl<'a, S: Structure> Evaluator<'a, S> {
    /// Create a new evaluator
    pub fn new(structure: &'a S) -> Self {
        Self { structure }
    }

    /// Evaluate an expression, returning a selection mask
    pub fn mask(&self, node: &Node) -> EvalResult<S::Array> {
        Ok(self.array(node)?.astype(DType::Bool)?)
    }

    /// Evaluate `node` and return the rows it selects
    pub fn select(&self, node: &Node) -> EvalResult<S> {
        let mask = self.mask(node)?;
        Ok(self.structure.select(&mask))
    }

    /// Evaluate and broadcast scalars to the structure's rows
    pub fn array(&self, node: &Node) -> EvalResult<S::Array> {
        Ok(match self.evaluate(node)? {
            Value::Array(a) => a,
            Value::Scalar(s) => self.structure.array_filled(s),
        })
    }

    pub fn evaluate(&self, node: &Node) -> EvalResult<Value<S::Array>> {
        let array = |a: S::Array| Ok(Value::Array(a));
        match node {
            Node::Start(inner) => array(self.mask(inner)?),
            Node::And(l, r) => array(self.and(l, r)?),
            Node::Or(l, r) => array(self.or(l, r)?),
            Node::Xor(l, r) => array(self.xor(l, r)?),
            Node::Not(inner) => array(self.mask(inner)?.invert()?),
            Node::All => array(self.filled(true)),
            Node::None => array(self.filled(false)),
            Node::Literal(rows) => {
                let index = self.property("index")?;
                let rows: Vec<Scalar> = rows.iter().map(|&r| Scalar::Int(r as i64)).collect();
                array(index.isin(&rows))
            }

            Node::Comparison { field, op, value } => self.comparison(field, *op, value.as_deref()),
            Node::PropertySelection { field, values } => {
                array(self.property_selection(field, values)?)
            }
            Node::Regex { field, pattern } => {
                let pattern = self.pattern(pattern)?;
                array(self.regex(&self.array(field)?, &pattern)?)
            }
            Node::RangeValue { .. } => Err(EvalError::InvalidOperand(
                "a range is only valid as a property value".to_string(),
            )),

            Node::StringValue(s) | Node::RegexValue(s) => Ok(Value::Scalar(Scalar::Str(s.clone()))),
            Node::QuotedStringValue(s) => Ok(Value::Scalar(Scalar::Str(unquote(s).to_string()))),

            Node::Within {
                distance,
                target,
                mode,
            } => array(self.within(distance, target, *mode)?),
            Node::Same { field, mask } => array(self.same(field, mask)?),
            Node::SelectionKeyword(name) => array(self.property(name)?),
            Node::Macro(name) => Err(EvalError::UnresolvedMacro(name.clone())),

            Node::Bonded { .. } => Err(EvalError::NotImplemented("bonded selection")),
            Node::SequenceSelection(_) => Err(EvalError::NotImplemented("sequence selection")),
            Node::SequenceSelectionRegex(_) => {
                Err(EvalError::NotImplemented("sequence pattern selection"))
            }

            Node::Add(..)
            | Node::Sub(..)
            | Node::Mul(..)
            | Node::Div(..)
            | Node::FloorDiv(..)
            | Node::Mod(..)
            | Node::Pow(..) => {
                let Some((op, l, r)) = node.as_binary() else {
                    return Err(EvalError::InvalidOperand(node.symbolic()));
                };
                self.arithmetic(op, l, r)
            }
            Node::Neg(inner) => Ok(match self.evaluate(inner)? {
                Value::Array(a) => Value::Array(a.neg()?),
                Value::Scalar(s) => Value::Scalar(s.neg()?),
            }),
            Node::Func { name, arg } => self.function(name, arg),
            Node::Number(text) => Ok(Value::Scalar(parse_number(text)?)),
            Node::Const(name) => Ok(Value::Scalar(Scalar::Float(constant(name)?))),
        }
    }

    fn filled(&self, value: bool) -> S::Array {
        self.structure.array_filled(Scalar::Bool(value))
    }

    fn property(&self, name: &str) -> EvalResult<S::Array> {
        self.structure
            .get_property(name)
            .ok_or_else(|| EvalError::UnknownColumn(name.to_string()))
    }

    fn and(&self, l: &Node, r: &Node) -> EvalResult<S::Array> {
        let left = self.mask(l)?;
        if !left.any() {
            return Ok(left);
        }
        let right = if r.short_circuit() {
            let subset = self.structure.select(&left);
            let partial = Evaluator::new(&subset).mask(r)?;
            self.filled(false).set_by_index(&partial)?
        } else {
            self.mask(r)?
        };
        Ok(left.binary(BinaryOp::And, Operand::Array(&right))?)
    }

    fn or(&self, l: &Node, r: &Node) -> EvalResult<S::Array> {
        let left = self.mask(l)?;
        if left.all() {
            return Ok(left);
        }
        let right = if r.short_circuit() {
            let subset = self.structure.select(&left.invert()?);
            let partial = Evaluator::new(&subset).mask(r)?;
            self.filled(true).set_by_index(&partial)?
        } else {
            self.mask(r)?
        };
        Ok(left.binary(BinaryOp::Or, Operand::Array(&right))?)
    }

    fn xor(&self, l: &Node, r: &Node) -> EvalResult<S::Array> {
        let left = self.mask(l)?;
        let right = self.mask(r)?;
        if left.all() {
            return Ok(right.invert()?);
        }
        if !left.any() {
            return Ok(right);
        }
        Ok(left.binary(BinaryOp::Xor, Operand::Array(&right))?)
    }

    fn comparison(
        &self,
        field: &Node,
        op: CompareOp,
        value: Option<&Node>,
    ) -> EvalResult<Value<S::Array>> {
        let Some(value) = value else {
            return Ok(Value::Array(self.array(field)?.astype(DType::Bool)?));
        };
        let left = self.evaluate(field)?;
        let right = self.evaluate(value)?;

        let result = match (&left, &right) {
            (Value::Array(a), Value::Array(b)) => {
                a.binary(op.binary_op(), Operand::Array(b)).map(Value::Array)
            }
            (Value::Array(a), Value::Scalar(s)) => {
                a.binary(op.binary_op(), Operand::Scalar(s)).map(Value::Array)
            }
            // Scalar on the left: swap operands and flip the operator
            (Value::Scalar(s), Value::Array(a)) => a
                .binary(op.flip().binary_op(), Operand::Scalar(s))
                .map(Value::Array),
            (Value::Scalar(a), Value::Scalar(b)) => {
                a.binary(op.binary_op(), b).map(Value::Scalar)
            }
        };

        match result {
            Err(err @ ArrayError::TypeMismatch { .. }) => {
                debug!(op = op.as_str(), error = %err, "Comparison type mismatch; no rows match");
                Ok(Value::Array(self.filled(false)))
            }
            other => Ok(other?),
        }
    }

    /// `column op scalar`, with type mismatches degraded to all-false
    fn compare(&self, column: &S::Array, op: BinaryOp, value: &Scalar) -> EvalResult<S::Array> {
        match column.binary(op, Operand::Scalar(value)) {
            Err(err @ ArrayError::TypeMismatch { .. }) => {
                debug!(op = op.as_str(), error = %err, "Comparison type mismatch; no rows match");
                Ok(self.filled(false))
            }
            other => Ok(other?),
        }
    }

    fn property_selection(&self, field: &Node, values: &[Node]) -> EvalResult<S::Array> {
        let column = self.array(field)?;
        let mut mask = self.filled(false);

        for value in values {
            let matched = match value {
                Node::StringValue(s) => self.compare(&column, BinaryOp::Eq, &Scalar::Str(s.clone()))?,
                Node::QuotedStringValue(s) => {
                    self.compare(&column, BinaryOp::Eq, &Scalar::from(unquote(s)))?
                }
                Node::RegexValue(pattern) => self.regex(&column, pattern)?,
                Node::RangeValue { start, end, step } => {
                    let start = self.scalar(start)?;
                    let end = self.scalar(end)?;
                    let lower = self.compare(&column, BinaryOp::Ge, &start)?;
                    let upper = self.compare(&column, BinaryOp::Le, &end)?;
                    let mut range = lower.binary(BinaryOp::And, Operand::Array(&upper))?;
                    if let Some(step) = step {
                        let step = self.scalar(step)?;
                        if step.as_f64() == Some(0.0) {
                            return Err(EvalError::InvalidRange(format!(
                                "step of {start}:{end}:{step} must be non-zero"
                            )));
                        }
                        // A string column never gets here: its range is empty
                        if range.any() {
                            let offset = column
                                .binary(BinaryOp::Sub, Operand::Scalar(&start))?
                                .binary(BinaryOp::Mod, Operand::Scalar(&step))?;
                            let on_step = offset.binary(BinaryOp::Eq, Operand::Scalar(&Scalar::Int(0)))?;
                            range = range.binary(BinaryOp::And, Operand::Array(&on_step))?;
                        }
                    }
                    range
                }
                other => match self.evaluate(other)? {
                    Value::Scalar(s) => self.compare(&column, BinaryOp::Eq, &s)?,
                    Value::Array(a) => column.binary(BinaryOp::Eq, Operand::Array(&a))?,
                },
            };
            mask = mask.binary(BinaryOp::Or, Operand::Array(&matched))?;
        }

        Ok(mask)
    }

    fn scalar(&self, node: &Node) -> EvalResult<Scalar> {
        match self.evaluate(node)? {
            Value::Scalar(s) => Ok(s),
            Value::Array(_) => Err(EvalError::InvalidOperand(format!(
                "expected a scalar, got {}",
                node.symbolic()
            ))),
        }
    }

    fn pattern(&self, node: &Node) -> EvalResult<String> {
        match node {
            Node::RegexValue(p) | Node::StringValue(p) => Ok(p.clone()),
            Node::QuotedStringValue(p) => Ok(unquote(p).to_string()),
            other => Err(EvalError::InvalidOperand(format!(
                "expected a pattern, got {}",
                other.symbolic()
            ))),
        }
    }

    fn regex(&self, column: &S::Array, pattern: &str) -> EvalResult<S::Array> {
        let re = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let text = column.astype(DType::Str)?;
        if let Some(native) = text.str_contains(&re) {
            return Ok(native);
        }
        let values = text
            .values()
            .iter()
            .map(|v| Scalar::Bool(re.is_match(&v.to_string())))
            .collect();
        Ok(self.structure.array_values(values))
    }

    fn within(&self, distance: &Node, target: &Node, mode: WithinMode) -> EvalResult<S::Array> {
        let target = self.mask(target)?;
        if !target.any() {
            return Ok(self.filled(false));
        }
        let distance = self.scalar(distance)?;
        let reference = self.structure.select(&target);
        let distances = self.structure.minimum_pairwise_distances(&reference);
        let op = match mode {
            WithinMode::Within => BinaryOp::Le,
            WithinMode::Exwithin => BinaryOp::Gt,
        };
        Ok(distances.binary(op, Operand::Scalar(&distance))?)
    }

    fn same(&self, field: &Node, mask: &Node) -> EvalResult<S::Array> {
        let mask = self.mask(mask)?;
        let column = self.array(field)?;
        if !mask.any() {
            return Ok(self.filled(false));
        }
        let subset = self.structure.select(&mask);
        let values = Evaluator::new(&subset).array(field)?.unique();
        Ok(column.isin(&values))
    }

    fn arithmetic(&self, op: BinaryOp, l: &Node, r: &Node) -> EvalResult<Value<S::Array>> {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        Ok(match (left, right) {
            (Value::Array(a), Value::Array(b)) => Value::Array(a.binary(op, Operand::Array(&b))?),
            (Value::Array(a), Value::Scalar(s)) => Value::Array(a.binary(op, Operand::Scalar(&s))?),
            (Value::Scalar(s), Value::Array(b)) => {
                let a = self.structure.array_filled(s);
                Value::Array(a.binary(op, Operand::Array(&b))?)
            }
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a.binary(op, &b)?),
        })
    }

    fn function(&self, name: &str, arg: &Node) -> EvalResult<Value<S::Array>> {
        let value = self.evaluate(arg)?;
        if name == "sq" {
            return Ok(match value {
                Value::Array(a) => Value::Array(a.binary(BinaryOp::Mul, Operand::Array(&a))?),
                Value::Scalar(s) => Value::Scalar(s.binary(BinaryOp::Mul, &s)?),
            });
        }

        if name == "abs" {
            return Ok(match value {
                Value::Array(a) => {
                    let values = a
                        .values()
                        .iter()
                        .map(Scalar::abs)
                        .collect::<Result<Vec<_>, _>>()?;
                    Value::Array(self.structure.array_values(values))
                }
                Value::Scalar(s) => Value::Scalar(s.abs()?),
            });
        }

        let f = math_function(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        Ok(match value {
            Value::Array(a) => Value::Array(a.map_float(f)?),
            Value::Scalar(s) => {
                let x = s.as_f64().ok_or(ArrayError::TypeMismatch {
                    op: "func",
                    lhs: s.type_name(),
                    rhs: "float",
                })?;
                Value::Scalar(Scalar::Float(f(x)))
            }
        })
    }
}

/// Elementwise float functions callable from selections
fn math_function(name: &str) -> Option<fn(f64) -> f64> {
    Some(match name {
        "sqrt" => f64::sqrt,
        "exp" => f64::exp,
        "log" => f64::ln,
        "log10" => f64::log10,
        "log2" => f64::log2,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "arcsin" => f64::asin,
        "arccos" => f64::acos,
        "arctan" => f64::atan,
        "sinh" => f64::sinh,
        "cosh" => f64::cosh,
        "tanh" => f64::tanh,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        _ => return None,
    })
}

/// Float if the literal has `.`, `e` or `E`, integer otherwise
pub fn parse_number(text: &str) -> EvalResult<Scalar> {
    let invalid = || EvalError::InvalidNumber(text.to_string());
    if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Scalar::Float).map_err(|_| invalid())
    } else {
        text.parse::<i64>().map(Scalar::Int).map_err(|_| invalid())
    }
}

fn constant(name: &str) -> EvalResult<f64> {
    match name.to_lowercase().as_str() {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        _ => Err(EvalError::UnknownConstant(name.to_string())),
    }
}

/// Strip one pair of matching surrounding quotes
fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample, RowArray, RowStructure};
    use rstest::rstest;

    fn mask(node: &Node) -> Vec<bool> {
        Evaluator::new(&sample()).mask(node).unwrap().bools()
    }

    fn name_is(value: &str) -> Node {
        Node::PropertySelection {
            field: Box::new(Node::keyword("name")),
            values: vec![Node::StringValue(value.into())],
        }
    }

    fn literal(bits: &[bool]) -> Node {
        Node::Literal(
            bits.iter()
                .enumerate()
                .filter(|(_, b)| **b)
                .map(|(i, _)| i)
                .collect(),
        )
    }

    /// Fails whenever it is evaluated
    fn bomb() -> Node {
        Node::Const("bogus".into())
    }

    const PATTERN: [bool; 8] = [true, false, true, true, false, false, true, false];

    #[test]
    fn test_identities() {
        assert_eq!(mask(&Node::and(literal(&PATTERN), Node::All)), PATTERN);
        assert_eq!(mask(&Node::or(literal(&PATTERN), Node::None)), PATTERN);
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        assert_eq!(mask(&Node::and(Node::None, bomb())), vec![false; 8]);
        assert_eq!(mask(&Node::or(Node::All, bomb())), vec![true; 8]);

        let s = sample();
        let err = Evaluator::new(&s).mask(&Node::and(Node::All, bomb())).unwrap_err();
        assert_eq!(err, EvalError::UnknownConstant("bogus".into()));
    }

    #[test]
    fn test_short_circuit_scatters_back() {
        // The right operand only sees rows 0, 2 and 3
        let node = Node::and(literal(&PATTERN), name_is("N"));
        assert_eq!(
            mask(&node),
            vec![true, false, false, true, false, false, false, false]
        );

        let node = Node::or(literal(&PATTERN), name_is("CA"));
        assert_eq!(mask(&node), vec![true, true, true, true, true, false, true, false]);
    }

    #[test]
    fn test_xor() {
        let right = name_is("CA");
        let all = literal(&[true; 8]);
        let none = literal(&[false; 8]);
        assert_eq!(
            mask(&Node::xor(all, right.clone())),
            mask(&Node::not(right.clone()))
        );
        assert_eq!(mask(&Node::xor(none, right.clone())), mask(&right));
        assert_eq!(
            mask(&Node::xor(literal(&PATTERN), right)),
            vec![true, true, true, true, true, false, true, false]
        );
    }

    #[rstest]
    #[case(WithinMode::Within, "0")]
    #[case(WithinMode::Within, "1000.0")]
    #[case(WithinMode::Exwithin, "0")]
    #[case(WithinMode::Exwithin, "1000.0")]
    fn test_within_empty_target(#[case] mode: WithinMode, #[case] distance: &str) {
        let node = Node::within(Node::number(distance), literal(&[false; 8]), mode);
        assert_eq!(mask(&node), vec![false; 8]);
    }

    #[test]
    fn test_within_and_exwithin() {
        // Water oxygens sit at (20, 0, 0) and (4, 3, 0)
        let water = Node::PropertySelection {
            field: Box::new(Node::keyword("resname")),
            values: vec![Node::StringValue("HOH".into())],
        };
        let within = Node::within(Node::number("3.5"), water.clone(), WithinMode::Within);
        assert_eq!(
            mask(&within),
            vec![false, false, true, true, true, false, true, true]
        );
        let exwithin = Node::within(Node::number("3.5"), water, WithinMode::Exwithin);
        assert_eq!(
            mask(&exwithin),
            vec![true, true, false, false, false, true, false, false]
        );
    }

    #[test]
    fn test_same_expands_to_shared_values() {
        let node = Node::same(Node::keyword("resid"), name_is("CB"));
        assert_eq!(
            mask(&node),
            vec![true, true, true, false, false, false, false, false]
        );
        assert!(!node.short_circuit());
    }

    #[rstest]
    #[case("3.14", Scalar::Float(3.14))]
    #[case("42", Scalar::Int(42))]
    #[case("1e3", Scalar::Float(1000.0))]
    #[case("-7", Scalar::Int(-7))]
    #[case("+2.", Scalar::Float(2.0))]
    fn test_number_literals(#[case] text: &str, #[case] expected: Scalar) {
        assert_eq!(parse_number(text).unwrap(), expected);
    }

    #[test]
    fn test_type_mismatch_comparison_is_all_false() {
        let node = Node::comparison(Node::keyword("name"), CompareOp::Lt, Node::number("3"));
        assert_eq!(mask(&node), vec![false; 8]);
    }

    #[test]
    fn test_comparison_swaps_scalar_left() {
        let node = Node::comparison(Node::number("2"), CompareOp::Lt, Node::keyword("resid"));
        assert_eq!(
            mask(&node),
            vec![false, false, false, false, false, true, true, true]
        );
    }

    #[test]
    fn test_comparison_without_value_casts_to_bool() {
        let node = Node::Comparison {
            field: Box::new(Node::keyword("x")),
            op: CompareOp::Eq,
            value: Option::None,
        };
        assert_eq!(mask(&node), vec![false, true, true, true, true, true, true, true]);
    }

    #[test]
    fn test_ranges() {
        let range = |start: &str, end: &str, step: Option<&str>| Node::PropertySelection {
            field: Box::new(Node::keyword("resid")),
            values: vec![Node::RangeValue {
                start: Box::new(Node::number(start)),
                end: Box::new(Node::number(end)),
                step: step.map(|s| Box::new(Node::number(s))),
            }],
        };
        assert_eq!(
            mask(&range("2", "4", None)),
            vec![false, false, false, true, true, true, true, false]
        );
        assert_eq!(
            mask(&range("1", "5", Some("2"))),
            vec![true, true, true, false, false, true, false, true]
        );
        assert_eq!(
            mask(&range("1", "5", Some("-2"))),
            vec![true, true, true, false, false, true, false, true]
        );
    }

    #[rstest]
    #[case("0")]
    #[case("0.0")]
    fn test_zero_step_range_is_rejected(#[case] step: &str) {
        let node = Node::PropertySelection {
            field: Box::new(Node::keyword("resid")),
            values: vec![Node::RangeValue {
                start: Box::new(Node::number("1")),
                end: Box::new(Node::number("5")),
                step: Some(Box::new(Node::number(step))),
            }],
        };
        let err = Evaluator::new(&sample()).mask(&node).unwrap_err();
        assert!(matches!(err, EvalError::InvalidRange(_)));
    }

    #[test]
    fn test_regex_and_quoted_values() {
        let node = Node::Regex {
            field: Box::new(Node::keyword("name")),
            pattern: Box::new(Node::RegexValue("^C".into())),
        };
        assert_eq!(
            mask(&node),
            vec![false, true, true, false, true, false, false, false]
        );

        let node = Node::PropertySelection {
            field: Box::new(Node::keyword("resname")),
            values: vec![
                Node::QuotedStringValue("'HEM'".into()),
                Node::RegexValue("^GL".into()),
            ],
        };
        assert_eq!(
            mask(&node),
            vec![false, false, false, true, true, true, false, false]
        );
    }

    #[test]
    fn test_invalid_regex() {
        let node = Node::Regex {
            field: Box::new(Node::keyword("name")),
            pattern: Box::new(Node::RegexValue("(".into())),
        };
        let err = Evaluator::new(&sample()).mask(&node).unwrap_err();
        assert!(matches!(err, EvalError::InvalidRegex { .. }));
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let s = sample();
        let eval = Evaluator::new(&s);
        let node = Node::Func {
            name: "sq".into(),
            arg: Box::new(Node::keyword("resid")),
        };
        let Value::Array(array) = eval.evaluate(&node).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(array.values[7], Scalar::Int(25));

        let node = Node::FloorDiv(Box::new(Node::number("7")), Box::new(Node::number("2")));
        assert_eq!(eval.evaluate(&node).unwrap(), Value::Scalar(Scalar::Int(3)));

        let node = Node::Func {
            name: "cos".into(),
            arg: Box::new(Node::Const("PI".into())),
        };
        assert_eq!(eval.evaluate(&node).unwrap(), Value::Scalar(Scalar::Float(-1.0)));

        let node = Node::Func {
            name: "abs".into(),
            arg: Box::new(Node::Neg(Box::new(Node::keyword("resid")))),
        };
        let Value::Array(array) = eval.evaluate(&node).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(array.values[5], Scalar::Int(3));
        let node = Node::comparison(
            Node::Func {
                name: "abs".into(),
                arg: Box::new(Node::Neg(Box::new(Node::keyword("resid")))),
            },
            CompareOp::Eq,
            Node::number("3"),
        );
        assert_eq!(mask(&node), vec![false, false, false, false, false, true, false, false]);

        let node = Node::Func {
            name: "abs".into(),
            arg: Box::new(Node::number("-2.5")),
        };
        assert_eq!(eval.evaluate(&node).unwrap(), Value::Scalar(Scalar::Float(2.5)));

        let node = Node::Func {
            name: "gamma".into(),
            arg: Box::new(Node::number("1")),
        };
        assert_eq!(
            eval.evaluate(&node).unwrap_err(),
            EvalError::UnknownFunction("gamma".into())
        );
    }

    #[rstest]
    #[case(Node::keyword("occupancy"), EvalError::UnknownColumn("occupancy".into()))]
    #[case(Node::Const("tau".into()), EvalError::UnknownConstant("tau".into()))]
    #[case(Node::Macro("water".into()), EvalError::UnresolvedMacro("water".into()))]
    #[case(Node::SequenceSelection("ACD".into()), EvalError::NotImplemented("sequence selection"))]
    #[case(
        Node::Bonded { distance: Box::new(Node::number("1")), selection: Box::new(Node::All) },
        EvalError::NotImplemented("bonded selection")
    )]
    #[case(
        Node::comparison(
            Node::Mod(Box::new(Node::keyword("resid")), Box::new(Node::number("0"))),
            CompareOp::Eq,
            Node::number("0"),
        ),
        EvalError::Array(ArrayError::DivisionByZero)
    )]
    #[case(
        Node::comparison(
            Node::FloorDiv(Box::new(Node::keyword("resid")), Box::new(Node::number("0"))),
            CompareOp::Gt,
            Node::number("0"),
        ),
        EvalError::Array(ArrayError::DivisionByZero)
    )]
    fn test_hard_failures(#[case] node: Node, #[case] expected: EvalError) {
        let s = sample();
        assert_eq!(Evaluator::new(&s).mask(&node).unwrap_err(), expected);
    }

    #[test]
    fn test_index_keyword_and_literal_on_subset() {
        let s = sample();
        let subset = s.select(&RowArray::new(
            PATTERN.iter().map(|b| Scalar::Bool(*b)).collect(),
            s.index.clone(),
        ));
        let eval = Evaluator::<RowStructure>::new(&subset);
        assert_eq!(eval.mask(&Node::Literal(vec![2, 6])).unwrap().bools(), vec![false, true, false, true]);

        let selected = eval
            .select(&Node::comparison(Node::keyword("index"), CompareOp::Gt, Node::number("2")))
            .unwrap();
        assert_eq!(selected.index, vec![3, 6]);
    }
}
