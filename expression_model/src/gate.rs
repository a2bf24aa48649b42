//! Gate expressions - single-axis comparison constraints.
//!
//! A gate is a condition like `threat <= 0.40` that must hold for a
//! prototype to be active. Gates parse into a small normalized AST and
//! map onto [`Interval`]s for the implication algebra.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interval::Interval;

/// Comparison operators accepted in gate expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOp {
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `<`
    Lt,
    /// `==`
    Eq,
}

impl GateOp {
    /// The textual form of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            GateOp::Ge => ">=",
            GateOp::Gt => ">",
            GateOp::Le => "<=",
            GateOp::Lt => "<",
            GateOp::Eq => "==",
        }
    }
}

/// Errors produced while parsing a gate expression.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GateParseError {
    #[error("empty gate expression")]
    Empty,

    #[error("no comparison operator in gate `{0}`")]
    MissingOperator(String),

    #[error("missing axis name in gate `{0}`")]
    MissingAxis(String),

    #[error("threshold `{found}` in gate `{gate}` is not a number")]
    BadThreshold { gate: String, found: String },

    #[error("threshold in gate `{0}` is not finite")]
    NonFiniteThreshold(String),
}

/// The normalized AST of one gate expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub axis: String,
    pub op: GateOp,
    pub threshold: f64,
}

impl Gate {
    /// Parse an expression like `"valence >= 0.55"`.
    ///
    /// The operator may be surrounded by arbitrary whitespace. Longer
    /// operators are matched first so `>=` is never read as `>`.
    pub fn parse(expr: &str) -> Result<Gate, GateParseError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(GateParseError::Empty);
        }

        // Order matters: two-character operators before their prefixes.
        const OPERATORS: [(&str, GateOp); 5] = [
            (">=", GateOp::Ge),
            ("<=", GateOp::Le),
            ("==", GateOp::Eq),
            (">", GateOp::Gt),
            ("<", GateOp::Lt),
        ];

        let (idx, symbol, op) = OPERATORS
            .iter()
            .filter_map(|(symbol, op)| trimmed.find(symbol).map(|idx| (idx, *symbol, *op)))
            .min_by_key(|(idx, symbol, _)| (*idx, std::cmp::Reverse(symbol.len())))
            .ok_or_else(|| GateParseError::MissingOperator(trimmed.to_string()))?;

        let axis = trimmed[..idx].trim();
        if axis.is_empty() {
            return Err(GateParseError::MissingAxis(trimmed.to_string()));
        }

        let rhs = trimmed[idx + symbol.len()..].trim();
        let threshold: f64 = rhs.parse().map_err(|_| GateParseError::BadThreshold {
            gate: trimmed.to_string(),
            found: rhs.to_string(),
        })?;
        if !threshold.is_finite() {
            return Err(GateParseError::NonFiniteThreshold(trimmed.to_string()));
        }

        Ok(Gate {
            axis: axis.to_string(),
            op,
            threshold,
        })
    }

    /// Evaluate the gate against a raw axis value.
    pub fn passes(&self, value: f64) -> bool {
        match self.op {
            GateOp::Ge => value >= self.threshold,
            GateOp::Gt => value > self.threshold,
            GateOp::Le => value <= self.threshold,
            GateOp::Lt => value < self.threshold,
            GateOp::Eq => value == self.threshold,
        }
    }

    /// The axis interval admitted by this gate.
    ///
    /// Strict operators map to the same closed bounds as their non-strict
    /// counterparts; the downstream algebra is closed-interval.
    pub fn to_interval(&self) -> Interval {
        match self.op {
            GateOp::Ge | GateOp::Gt => Interval::at_least(self.threshold),
            GateOp::Le | GateOp::Lt => Interval::at_most(self.threshold),
            GateOp::Eq => Interval::point(self.threshold),
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {:.2}", self.axis, self.op.symbol(), self.threshold)
    }
}

/// Parse a whole gate list, splitting successes from failures.
pub fn parse_gates(gates: &[String]) -> (Vec<Gate>, Vec<GateParseError>) {
    let mut parsed = Vec::with_capacity(gates.len());
    let mut errors = Vec::new();
    for gate in gates {
        match Gate::parse(gate) {
            Ok(gate) => parsed.push(gate),
            Err(err) => errors.push(err),
        }
    }
    (parsed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let gate = Gate::parse("threat <= 0.40").unwrap();
        assert_eq!(gate.axis, "threat");
        assert_eq!(gate.op, GateOp::Le);
        assert!((gate.threshold - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_parse_without_spaces() {
        let gate = Gate::parse("valence>=0.55").unwrap();
        assert_eq!(gate.axis, "valence");
        assert_eq!(gate.op, GateOp::Ge);
    }

    #[test]
    fn test_parse_strict_operators() {
        assert_eq!(Gate::parse("arousal > 0.3").unwrap().op, GateOp::Gt);
        assert_eq!(Gate::parse("arousal < 0.3").unwrap().op, GateOp::Lt);
        assert_eq!(Gate::parse("arousal == 0.3").unwrap().op, GateOp::Eq);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Gate::parse("   "), Err(GateParseError::Empty));
        assert!(matches!(
            Gate::parse("threat 0.4"),
            Err(GateParseError::MissingOperator(_))
        ));
        assert!(matches!(
            Gate::parse(">= 0.4"),
            Err(GateParseError::MissingAxis(_))
        ));
        assert!(matches!(
            Gate::parse("threat >= high"),
            Err(GateParseError::BadThreshold { .. })
        ));
        assert!(matches!(
            Gate::parse("threat >= NaN"),
            Err(GateParseError::NonFiniteThreshold(_))
        ));
    }

    #[test]
    fn test_passes() {
        let gate = Gate::parse("threat <= 0.4").unwrap();
        assert!(gate.passes(0.4));
        assert!(gate.passes(0.1));
        assert!(!gate.passes(0.41));

        let strict = Gate::parse("threat < 0.4").unwrap();
        assert!(!strict.passes(0.4));
    }

    #[test]
    fn test_to_interval() {
        assert_eq!(
            Gate::parse("v >= 0.3").unwrap().to_interval(),
            Interval::at_least(0.3)
        );
        assert_eq!(
            Gate::parse("v <= 0.7").unwrap().to_interval(),
            Interval::at_most(0.7)
        );
        assert_eq!(
            Gate::parse("v == 0.5").unwrap().to_interval(),
            Interval::point(0.5)
        );
    }

    #[test]
    fn test_display_round_trips_meaning() {
        let gate = Gate::parse("valence>=0.55").unwrap();
        assert_eq!(gate.to_string(), "valence >= 0.55");

        let reparsed = Gate::parse(&gate.to_string()).unwrap();
        assert_eq!(reparsed, gate);
    }

    #[test]
    fn test_parse_gates_splits_errors() {
        let gates = vec![
            "threat >= 0.2".to_string(),
            "nonsense".to_string(),
            "valence <= 0.8".to_string(),
        ];
        let (parsed, errors) = parse_gates(&gates);
        assert_eq!(parsed.len(), 2);
        assert_eq!(errors.len(), 1);
    }
}
