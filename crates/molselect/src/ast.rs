//! Abstract Syntax Tree for selection expressions
//!
//! Every node evaluates to a per-row mask, a per-row value array, or a
//! scalar. [`Node::symbolic`] gives a canonical rendering: binary operators
//! fully parenthesized infix, unary operators prefix, everything else as
//! `Name(field, ...)`.

use crate::backend::BinaryOp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A selection expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Root wrapper: evaluates to the filtered structure
    Start(Box<Node>),

    /// Logical AND of two expressions
    And(Box<Node>, Box<Node>),

    /// Logical OR of two expressions
    Or(Box<Node>, Box<Node>),

    /// Logical exclusive OR of two expressions
    Xor(Box<Node>, Box<Node>),

    /// Logical NOT of an expression
    Not(Box<Node>),

    /// All rows (constant true)
    All,

    /// No rows (constant false)
    None,

    /// A stored selection, by row index
    Literal(Vec<usize>),

    /// `field op value`; a missing value casts the field to bool
    Comparison {
        field: Box<Node>,
        op: CompareOp,
        value: Option<Box<Node>>,
    },

    /// `field v1 v2 ...`: true where the field matches any value
    PropertySelection { field: Box<Node>, values: Vec<Node> },

    /// `start to end` or `start:end[:step]`, inclusive
    RangeValue {
        start: Box<Node>,
        end: Box<Node>,
        step: Option<Box<Node>>,
    },

    /// Bare word value
    StringValue(String),

    /// Quoted value, stored with its quotes
    QuotedStringValue(String),

    /// Regex value, stored without its slashes
    RegexValue(String),

    /// `field =~ pattern`
    Regex { field: Box<Node>, pattern: Box<Node> },

    /// `within d of target` / `exwithin d of target`
    Within {
        distance: Box<Node>,
        target: Box<Node>,
        mode: WithinMode,
    },

    /// `same field as mask`
    Same { field: Box<Node>, mask: Box<Node> },

    /// A column by name; `index` is the row position
    SelectionKeyword(String),

    /// Reference to a macro, resolved before evaluation
    Macro(String),

    /// Connectivity-based selection (not implemented)
    Bonded {
        distance: Box<Node>,
        selection: Box<Node>,
    },

    /// Sequence selection (not implemented)
    SequenceSelection(String),

    /// Sequence pattern selection (not implemented)
    SequenceSelectionRegex(String),

    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    FloorDiv(Box<Node>, Box<Node>),
    Mod(Box<Node>, Box<Node>),
    Pow(Box<Node>, Box<Node>),
    Neg(Box<Node>),

    /// Single-argument numeric function
    Func { name: String, arg: Box<Node> },

    /// Numeric literal, kept as written
    Number(String),

    /// Named constant (`pi`, `e`)
    Const(String),
}

impl Node {
    /// Create an AND expression
    pub fn and(left: Node, right: Node) -> Self {
        Node::And(Box::new(left), Box::new(right))
    }

    /// Create an OR expression
    pub fn or(left: Node, right: Node) -> Self {
        Node::Or(Box::new(left), Box::new(right))
    }

    /// Create an XOR expression
    pub fn xor(left: Node, right: Node) -> Self {
        Node::Xor(Box::new(left), Box::new(right))
    }

    /// Create a NOT expression
    pub fn not(expr: Node) -> Self {
        Node::Not(Box::new(expr))
    }

    pub fn comparison(field: Node, op: CompareOp, value: Node) -> Self {
        Node::Comparison {
            field: Box::new(field),
            op,
            value: Some(Box::new(value)),
        }
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Node::SelectionKeyword(name.into())
    }

    pub fn number(text: impl Into<String>) -> Self {
        Node::Number(text.into())
    }

    pub fn within(distance: Node, target: Node, mode: WithinMode) -> Self {
        Node::Within {
            distance: Box::new(distance),
            target: Box::new(target),
            mode,
        }
    }

    pub fn same(field: Node, mask: Node) -> Self {
        Node::Same {
            field: Box::new(field),
            mask: Box::new(mask),
        }
    }

    /// Whether this node may be evaluated on a row subset
    ///
    /// Spatial and `same` selections need the whole structure; the flag
    /// propagates up through every node containing one.
    pub fn short_circuit(&self) -> bool {
        match self {
            Node::Within { .. } | Node::Same { .. } | Node::Bonded { .. } => false,
            _ => self.children().iter().all(|child| child.short_circuit()),
        }
    }

    /// Binary operator and operands, for the infix nodes
    pub fn as_binary(&self) -> Option<(BinaryOp, &Node, &Node)> {
        let (op, l, r) = match self {
            Node::And(l, r) => (BinaryOp::And, l, r),
            Node::Or(l, r) => (BinaryOp::Or, l, r),
            Node::Xor(l, r) => (BinaryOp::Xor, l, r),
            Node::Add(l, r) => (BinaryOp::Add, l, r),
            Node::Sub(l, r) => (BinaryOp::Sub, l, r),
            Node::Mul(l, r) => (BinaryOp::Mul, l, r),
            Node::Div(l, r) => (BinaryOp::Div, l, r),
            Node::FloorDiv(l, r) => (BinaryOp::FloorDiv, l, r),
            Node::Mod(l, r) => (BinaryOp::Mod, l, r),
            Node::Pow(l, r) => (BinaryOp::Pow, l, r),
            _ => return Option::None,
        };
        Some((op, l.as_ref(), r.as_ref()))
    }

    /// Direct child nodes, in field order
    pub fn children(&self) -> Vec<&Node> {
        if let Some((_, l, r)) = self.as_binary() {
            return vec![l, r];
        }
        match self {
            Node::Start(x) | Node::Not(x) | Node::Neg(x) => vec![x.as_ref()],
            Node::Comparison { field, value, .. } => {
                let mut out = vec![field.as_ref()];
                out.extend(value.as_deref());
                out
            }
            Node::PropertySelection { field, values } => {
                std::iter::once(field.as_ref()).chain(values.iter()).collect()
            }
            Node::RangeValue { start, end, step } => {
                let mut out = vec![start.as_ref(), end.as_ref()];
                out.extend(step.as_deref());
                out
            }
            Node::Regex { field, pattern } => vec![field.as_ref(), pattern.as_ref()],
            Node::Within {
                distance, target, ..
            } => vec![distance.as_ref(), target.as_ref()],
            Node::Same { field, mask } => vec![field.as_ref(), mask.as_ref()],
            Node::Bonded {
                distance,
                selection,
            } => vec![distance.as_ref(), selection.as_ref()],
            Node::Func { arg, .. } => vec![arg.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Rebuild this node with every direct child passed through `f`
    pub fn try_map_children<E, F>(self, mut f: F) -> Result<Node, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        let mut boxed = |node: Box<Node>| f(*node).map(Box::new);
        Ok(match self {
            Node::Start(x) => Node::Start(boxed(x)?),
            Node::And(l, r) => Node::And(boxed(l)?, boxed(r)?),
            Node::Or(l, r) => Node::Or(boxed(l)?, boxed(r)?),
            Node::Xor(l, r) => Node::Xor(boxed(l)?, boxed(r)?),
            Node::Not(x) => Node::Not(boxed(x)?),
            Node::Comparison { field, op, value } => Node::Comparison {
                field: boxed(field)?,
                op,
                value: value.map(&mut boxed).transpose()?,
            },
            Node::PropertySelection { field, values } => {
                let field = boxed(field)?;
                let values = values
                    .into_iter()
                    .map(|v| boxed(Box::new(v)).map(|b| *b))
                    .collect::<Result<Vec<_>, E>>()?;
                Node::PropertySelection { field, values }
            }
            Node::RangeValue { start, end, step } => Node::RangeValue {
                start: boxed(start)?,
                end: boxed(end)?,
                step: step.map(&mut boxed).transpose()?,
            },
            Node::Regex { field, pattern } => Node::Regex {
                field: boxed(field)?,
                pattern: boxed(pattern)?,
            },
            Node::Within {
                distance,
                target,
                mode,
            } => Node::Within {
                distance: boxed(distance)?,
                target: boxed(target)?,
                mode,
            },
            Node::Same { field, mask } => Node::Same {
                field: boxed(field)?,
                mask: boxed(mask)?,
            },
            Node::Bonded {
                distance,
                selection,
            } => Node::Bonded {
                distance: boxed(distance)?,
                selection: boxed(selection)?,
            },
            Node::Add(l, r) => Node::Add(boxed(l)?, boxed(r)?),
            Node::Sub(l, r) => Node::Sub(boxed(l)?, boxed(r)?),
            Node::Mul(l, r) => Node::Mul(boxed(l)?, boxed(r)?),
            Node::Div(l, r) => Node::Div(boxed(l)?, boxed(r)?),
            Node::FloorDiv(l, r) => Node::FloorDiv(boxed(l)?, boxed(r)?),
            Node::Mod(l, r) => Node::Mod(boxed(l)?, boxed(r)?),
            Node::Pow(l, r) => Node::Pow(boxed(l)?, boxed(r)?),
            Node::Neg(x) => Node::Neg(boxed(x)?),
            Node::Func { name, arg } => Node::Func {
                name,
                arg: boxed(arg)?,
            },
            leaf => leaf,
        })
    }

    /// Variant name, as used by the symbolic rendering
    pub fn name(&self) -> &'static str {
        match self {
            Node::Start(_) => "Start",
            Node::And(..) => "And",
            Node::Or(..) => "Or",
            Node::Xor(..) => "Xor",
            Node::Not(_) => "Not",
            Node::All => "All",
            Node::None => "None",
            Node::Literal(_) => "Literal",
            Node::Comparison { .. } => "Comparison",
            Node::PropertySelection { .. } => "PropertySelection",
            Node::RangeValue { .. } => "RangeValue",
            Node::StringValue(_) => "StringValue",
            Node::QuotedStringValue(_) => "QuotedStringValue",
            Node::RegexValue(_) => "RegexValue",
            Node::Regex { .. } => "Regex",
            Node::Within { .. } => "Within",
            Node::Same { .. } => "Same",
            Node::SelectionKeyword(_) => "SelectionKeyword",
            Node::Macro(_) => "Macro",
            Node::Bonded { .. } => "Bonded",
            Node::SequenceSelection(_) => "SequenceSelection",
            Node::SequenceSelectionRegex(_) => "SequenceSelectionRegex",
            Node::Add(..) => "Add",
            Node::Sub(..) => "Sub",
            Node::Mul(..) => "Mul",
            Node::Div(..) => "Div",
            Node::FloorDiv(..) => "FloorDiv",
            Node::Mod(..) => "Mod",
            Node::Pow(..) => "Pow",
            Node::Neg(_) => "Neg",
            Node::Func { .. } => "Func",
            Node::Number(_) => "Number",
            Node::Const(_) => "Const",
        }
    }

    /// Canonical textual rendering
    pub fn symbolic(&self) -> String {
        if let Some((op, l, r)) = self.as_binary() {
            return format!("({}) {} ({})", l.symbolic(), op, r.symbolic());
        }
        let parts: Vec<String> = match self {
            Node::Not(x) => return format!("~({})", x.symbolic()),
            Node::Neg(x) => return format!("-({})", x.symbolic()),
            Node::Comparison { field, op, value } => {
                let value = value.as_ref().map_or("None".to_string(), |v| v.symbolic());
                return format!("({}) {} ({})", field.symbolic(), op, value);
            }
            Node::Literal(rows) => vec![format!("{rows:?}")],
            Node::PropertySelection { field, values } => vec![
                field.symbolic(),
                format!(
                    "[{}]",
                    values.iter().map(Node::symbolic).collect::<Vec<_>>().join(", ")
                ),
            ],
            Node::RangeValue { start, end, step } => vec![
                start.symbolic(),
                end.symbolic(),
                step.as_ref().map_or("None".to_string(), |s| s.symbolic()),
            ],
            Node::StringValue(s)
            | Node::QuotedStringValue(s)
            | Node::RegexValue(s)
            | Node::SelectionKeyword(s)
            | Node::Macro(s)
            | Node::SequenceSelection(s)
            | Node::SequenceSelectionRegex(s)
            | Node::Number(s)
            | Node::Const(s) => vec![format!("{s:?}")],
            Node::Within {
                distance,
                target,
                mode,
            } => vec![
                distance.symbolic(),
                target.symbolic(),
                format!("{:?}", mode.as_str()),
            ],
            Node::Func { name, arg } => vec![format!("{name:?}"), arg.symbolic()],
            other => other.children().iter().map(|c| c.symbolic()).collect(),
        };
        format!("{}({})", self.name(), parts.join(", "))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbolic())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal (==, =, eq)
    Eq,
    /// Not equal (!=, ne)
    Ne,
    /// Less than (<, lt)
    Lt,
    /// Less than or equal (<=, le)
    Le,
    /// Greater than (>, gt)
    Gt,
    /// Greater than or equal (>=, ge)
    Ge,
}

impl CompareOp {
    /// Parse an operator or its mnemonic alias
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "==" | "=" | "eq" => CompareOp::Eq,
            "!=" | "ne" => CompareOp::Ne,
            "<" | "lt" => CompareOp::Lt,
            "<=" | "le" => CompareOp::Le,
            ">" | "gt" => CompareOp::Gt,
            ">=" | "ge" => CompareOp::Ge,
            _ => return Option::None,
        })
    }

    /// The operator with its operands swapped
    pub fn flip(&self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Le,
            other => *other,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        self.binary_op().as_str()
    }

    pub fn binary_op(&self) -> BinaryOp {
        match self {
            CompareOp::Eq => BinaryOp::Eq,
            CompareOp::Ne => BinaryOp::Ne,
            CompareOp::Lt => BinaryOp::Lt,
            CompareOp::Le => BinaryOp::Le,
            CompareOp::Gt => BinaryOp::Gt,
            CompareOp::Ge => BinaryOp::Ge,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `within` keeps rows at distance <= d, `exwithin` rows beyond d
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithinMode {
    Within,
    Exwithin,
}

impl WithinMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "within" => Some(WithinMode::Within),
            "exwithin" => Some(WithinMode::Exwithin),
            _ => Option::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithinMode::Within => "within",
            WithinMode::Exwithin => "exwithin",
        }
    }
}
