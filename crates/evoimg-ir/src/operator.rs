//! Primitive operator set and the registry that maps symbols to operators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Largest arity of any primitive operator
pub const MAX_ARITY: usize = 3;

/// Primitive operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // Literal
    Const,

    // Unary
    X2,
    X3,
    Cos,
    Sin,
    Tri,
    Inv,
    Band,
    Bw,

    // Binary
    Add,
    Mul,
    Div,
    Sub,
    Min,
    Max,
    And,
    Or,
    Xor,
    Noise,

    // Ternary
    Lerp,
    If,
}

impl Operator {
    pub const ALL: [Operator; 21] = [
        Operator::Const,
        Operator::X2,
        Operator::X3,
        Operator::Cos,
        Operator::Sin,
        Operator::Tri,
        Operator::Inv,
        Operator::Band,
        Operator::Bw,
        Operator::Add,
        Operator::Mul,
        Operator::Div,
        Operator::Sub,
        Operator::Min,
        Operator::Max,
        Operator::And,
        Operator::Or,
        Operator::Xor,
        Operator::Noise,
        Operator::Lerp,
        Operator::If,
    ];

    /// Symbol used in program text
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Const => "=",
            Operator::X2 => "x2",
            Operator::X3 => "x3",
            Operator::Cos => "cos",
            Operator::Sin => "sin",
            Operator::Tri => "tri",
            Operator::Inv => "inv",
            Operator::Band => "band",
            Operator::Bw => "bw",
            Operator::Add => "+",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Sub => "-",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Xor => "xor",
            Operator::Noise => "noise",
            Operator::Lerp => "lerp",
            Operator::If => "if",
        }
    }

    /// Number of node arguments. A constant takes a literal instead.
    pub fn arity(&self) -> usize {
        match self {
            Operator::Const => 0,
            Operator::X2
            | Operator::X3
            | Operator::Cos
            | Operator::Sin
            | Operator::Tri
            | Operator::Inv
            | Operator::Band
            | Operator::Bw => 1,
            Operator::Add
            | Operator::Mul
            | Operator::Div
            | Operator::Sub
            | Operator::Min
            | Operator::Max
            | Operator::And
            | Operator::Or
            | Operator::Xor
            | Operator::Noise => 2,
            Operator::Lerp | Operator::If => 3,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Operator::Const)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Immutable symbol table over [`Operator::ALL`], grouped by arity.
///
/// Built once and shared read-only; see [`OperatorRegistry::standard`].
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    by_symbol: HashMap<&'static str, Operator>,
    by_arity: [Vec<Operator>; MAX_ARITY + 1],
}

static STANDARD: LazyLock<OperatorRegistry> = LazyLock::new(OperatorRegistry::new);

impl OperatorRegistry {
    pub fn new() -> Self {
        let mut by_symbol = HashMap::with_capacity(Operator::ALL.len());
        let mut by_arity: [Vec<Operator>; MAX_ARITY + 1] = Default::default();
        for op in Operator::ALL {
            by_symbol.insert(op.symbol(), op);
            by_arity[op.arity()].push(op);
        }
        Self { by_symbol, by_arity }
    }

    /// Process-wide registry, initialized on first use
    pub fn standard() -> &'static OperatorRegistry {
        &STANDARD
    }

    pub fn lookup(&self, symbol: &str) -> Option<Operator> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    /// Operators taking exactly `arity` arguments (empty above [`MAX_ARITY`])
    pub fn with_arity(&self, arity: usize) -> &[Operator] {
        self.by_arity.get(arity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Operators taking at most `max_arity` arguments, in registry order
    pub fn up_to_arity(&self, max_arity: usize) -> impl Iterator<Item = Operator> + '_ {
        self.all().filter(move |op| op.arity() <= max_arity)
    }

    pub fn all(&self) -> impl Iterator<Item = Operator> + '_ {
        self.by_arity.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
