//! Evaluation engine.
//!
//! Evaluation state lives in the nodes themselves (`value` and `computed`),
//! so a module must not be evaluated by two tasks at once. Concurrent users
//! each take their own clone.

use crate::module::{Module, NodeOp};
use crate::noise::Perlin;
use crate::operator::{Operator, MAX_ARITY};
use evoimg_core::{Error, Result};
use std::f64::consts::PI;
use std::sync::Arc;

/// What a module needs from its surroundings while evaluating.
pub trait EvalContext {
    /// Raw coherent noise at `(x, y)`
    fn noise(&self, x: f64, y: f64) -> f64;

    /// Evaluate module `index` of the enclosing circuit and return its
    /// single output.
    fn call(&mut self, index: usize, args: &[f64]) -> Result<f64>;
}

/// Context for evaluating a lone module; calls are not available.
#[derive(Debug, Clone, Default)]
pub struct Standalone {
    noise: Arc<Perlin>,
}

impl Standalone {
    pub fn new(noise: Arc<Perlin>) -> Self {
        Self { noise }
    }
}

impl EvalContext for Standalone {
    fn noise(&self, x: f64, y: f64) -> f64 {
        self.noise.at(x, y)
    }

    fn call(&mut self, index: usize, _args: &[f64]) -> Result<f64> {
        Err(Error::Internal(format!(
            "call to module #{} outside of a circuit",
            index
        )))
    }
}

impl Module {
    /// Bind input values by port position and clear every computed flag.
    /// Ports without a value read 0.
    pub fn set_inputs(&mut self, inputs: &[f64]) {
        for node in &mut self.nodes {
            node.computed = false;
        }
        for (i, port) in self.inputs.iter().enumerate() {
            if let Some(k) = port.index {
                let node = &mut self.nodes[k];
                node.value = inputs.get(i).copied().unwrap_or(0.0);
                node.computed = true;
            }
        }
    }

    /// Compute every node reachable from `roots`, each at most once.
    ///
    /// Relies on the sorted layout: scanning from the last node to the first
    /// always sees arguments before their users.
    pub fn eval_nodes(&mut self, ctx: &mut dyn EvalContext, roots: &[usize]) -> Result<()> {
        let live = self.reachable_from(roots);
        let mut call_args: Vec<f64> = Vec::new();

        for i in (0..self.size()).rev() {
            if !live[i] || self.nodes[i].computed {
                continue;
            }
            let node = &self.nodes[i];
            let value = match &node.op {
                NodeOp::Primitive(Operator::Const) | NodeOp::Input(_) => node.value,
                NodeOp::Primitive(op) => {
                    let mut args = [0.0; MAX_ARITY];
                    for (slot, &arg) in args.iter_mut().zip(&node.args) {
                        *slot = self.nodes[arg].value;
                    }
                    apply(*op, &args[..node.args.len()], ctx)
                }
                NodeOp::Call { index, .. } => {
                    let index = *index;
                    call_args.clear();
                    call_args.extend(node.args.iter().map(|&arg| self.nodes[arg].value));
                    ctx.call(index, &call_args)?
                }
                NodeOp::Symbol(symbol) => {
                    return Err(Error::Internal(format!("Op '{}' not implemented!", symbol)));
                }
            };
            let node = &mut self.nodes[i];
            node.value = value;
            node.computed = true;
        }
        Ok(())
    }

    /// Values of the output nodes, in declaration order
    pub fn get_outputs(&self) -> Vec<f64> {
        self.outputs
            .iter()
            .map(|port| port.index.map_or(0.0, |k| self.nodes[k].value))
            .collect()
    }

    pub fn eval(&mut self, ctx: &mut dyn EvalContext, inputs: &[f64]) -> Result<Vec<f64>> {
        self.set_inputs(inputs);
        let roots = self.output_indices();
        self.eval_nodes(ctx, &roots)?;
        Ok(self.get_outputs())
    }
}

/// Primitive operator formulas. `args` has exactly `op.arity()` values.
fn apply(op: Operator, args: &[f64], ctx: &dyn EvalContext) -> f64 {
    let a = args.first().copied().unwrap_or(0.0);
    let b = args.get(1).copied().unwrap_or(0.0);
    let c = args.get(2).copied().unwrap_or(0.0);
    match op {
        Operator::Const => a,
        Operator::X2 => {
            if a < 0.5 {
                2.0 * a
            } else {
                2.0 * a - 1.0
            }
        }
        Operator::X3 => {
            if a < 0.3333 {
                3.0 * a
            } else if a < 0.6666 {
                3.0 * a - 1.0
            } else {
                3.0 * a - 2.0
            }
        }
        Operator::Cos => (1.0 + (2.0 * PI * a).cos()) / 2.0,
        Operator::Sin => (1.0 + (2.0 * PI * a).sin()) / 2.0,
        Operator::Tri => {
            if a < 0.5 {
                2.0 * a
            } else {
                2.0 * (1.0 - a)
            }
        }
        Operator::Inv => 1.0 - a,
        Operator::Band => indicator(a > 0.33 && a < 0.66),
        Operator::Bw => indicator(a > 0.5),
        Operator::Add => (a + b) / 2.0,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div => a / b,
        Operator::Min => {
            if a < b {
                a
            } else {
                b
            }
        }
        Operator::Max => {
            if a > b {
                a
            } else {
                b
            }
        }
        Operator::And => indicator(a > 0.5 && b > 0.5),
        Operator::Or => indicator(a > 0.5 || b > 0.5),
        Operator::Xor => indicator((a > 0.5) != (b > 0.5)),
        Operator::Noise => 0.5 + ctx.noise(10.0 * a, 10.0 * b),
        Operator::Lerp => a * b + (1.0 - a) * c,
        Operator::If => {
            if a > 0.5 {
                b
            } else {
                c
            }
        }
    }
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::OperatorRegistry;
    use crate::parser::parse_module;
    use approx::assert_relative_eq;

    fn read(s: &str) -> Module {
        let mut module = parse_module(s, OperatorRegistry::standard()).unwrap();
        module.normalize().unwrap();
        module
    }

    fn eval1(op: &str, inputs: &[f64]) -> f64 {
        let names = &"abc"[..inputs.len()];
        let args: Vec<String> = (1..=inputs.len()).map(|k| k.to_string()).collect();
        let nodes: Vec<String> = names.chars().map(String::from).collect();
        let text = format!("(o)({})[o:{} {}|{}]", names, op, args.join(" "), nodes.join("|"));
        let mut module = read(&text);
        module.eval(&mut Standalone::default(), inputs).unwrap()[0]
    }

    #[test]
    fn test_eval_nodes() {
        let mut module = read("(a)(xy)[a:+ 1 2|x|y]");
        let mut ctx = Standalone::default();
        for k in 1..10 {
            let x = k as f64 / 10.0;
            module.set_inputs(&[x, 0.5]);
            module.eval_nodes(&mut ctx, &[1]).unwrap();
            assert_eq!(module.nodes[1].value, x);
            assert!(!module.nodes[0].computed);

            module.set_inputs(&[0.0, x]);
            module.eval_nodes(&mut ctx, &[2]).unwrap();
            assert_eq!(module.nodes[2].value, x);
        }
    }

    #[test]
    fn test_eval_constant_sum() {
        let mut module = read("(y)(x)[y:+ 1 2|x|= 0.5]");
        let mut ctx = Standalone::default();
        let mut x = 0.1;
        while x < 0.5 {
            let out = module.eval(&mut ctx, &[x]).unwrap();
            assert_eq!(out[0], (x + 0.5) / 2.0);
            x += 0.05;
        }
    }

    #[test]
    fn test_add_is_mean() {
        assert_eq!(eval1("+", &[0.2, 0.4]), (0.2 + 0.4) / 2.0);
        assert_eq!(eval1("+", &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_unary_formulas() {
        assert_relative_eq!(eval1("x2", &[0.3]), 0.6);
        assert_relative_eq!(eval1("x2", &[0.75]), 0.5);
        assert_relative_eq!(eval1("x3", &[0.2]), 0.6, epsilon = 1e-12);
        assert_relative_eq!(eval1("x3", &[0.5]), 0.5, epsilon = 1e-12);
        assert_relative_eq!(eval1("x3", &[0.9]), 0.7, epsilon = 1e-12);
        assert_relative_eq!(eval1("cos", &[0.0]), 1.0);
        assert_relative_eq!(eval1("cos", &[0.5]), 0.0, epsilon = 1e-12);
        assert_relative_eq!(eval1("sin", &[0.25]), 1.0);
        assert_relative_eq!(eval1("tri", &[0.25]), 0.5);
        assert_relative_eq!(eval1("tri", &[0.75]), 0.5);
        assert_relative_eq!(eval1("inv", &[0.2]), 0.8);
    }

    #[test]
    fn test_band_and_bw() {
        assert_eq!(eval1("band", &[0.33]), 0.0);
        assert_eq!(eval1("band", &[0.34]), 1.0);
        assert_eq!(eval1("band", &[0.65]), 1.0);
        assert_eq!(eval1("band", &[0.66]), 0.0);
        assert_eq!(eval1("bw", &[0.5]), 0.0);
        assert_eq!(eval1("bw", &[0.51]), 1.0);
    }

    #[test]
    fn test_binary_formulas() {
        assert_relative_eq!(eval1("-", &[0.5, 0.2]), 0.3);
        assert_relative_eq!(eval1("*", &[0.5, 0.3]), 0.15);
        assert_relative_eq!(eval1("/", &[0.3, 0.6]), 0.5);
        assert_eq!(eval1("min", &[0.3, 0.6]), 0.3);
        assert_eq!(eval1("max", &[0.3, 0.6]), 0.6);
        assert!(eval1("/", &[0.3, 0.0]).is_infinite());
    }

    #[test]
    fn test_logic_formulas() {
        assert_eq!(eval1("and", &[0.9, 0.6]), 1.0);
        assert_eq!(eval1("and", &[0.9, 0.4]), 0.0);
        assert_eq!(eval1("or", &[0.1, 0.6]), 1.0);
        assert_eq!(eval1("or", &[0.1, 0.5]), 0.0);
        // exclusive or, deliberately not XNOR: equal sides give 0
        assert_eq!(eval1("xor", &[0.9, 0.1]), 1.0);
        assert_eq!(eval1("xor", &[0.9, 0.8]), 0.0);
        assert_eq!(eval1("xor", &[0.1, 0.2]), 0.0);
    }

    #[test]
    fn test_ternary_formulas() {
        assert_relative_eq!(eval1("lerp", &[0.25, 1.0, 0.0]), 0.25);
        assert_relative_eq!(eval1("lerp", &[0.0, 0.3, 0.7]), 0.7);
        assert_eq!(eval1("if", &[0.6, 0.1, 0.2]), 0.1);
        assert_eq!(eval1("if", &[0.5, 0.1, 0.2]), 0.2);
    }

    #[test]
    fn test_noise_formula() {
        let noise = Perlin::default();
        assert_eq!(eval1("noise", &[0.1, 0.2]), 0.5 + noise.at(1.0, 2.0));
        let v = eval1("noise", &[0.123, 0.456]);
        assert_relative_eq!(v, 0.5 + noise.at(1.23, 4.56), epsilon = 1e-12);
    }

    #[test]
    fn test_unresolved_symbol_is_internal_error() {
        let mut module = read("(a)(x)[a:sum 1|x]");
        let err = module.eval(&mut Standalone::default(), &[0.5]).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_missing_inputs_read_zero() {
        let mut module = read("(a)(xy)[a:+ 1 2|x|y]");
        let out = module.eval(&mut Standalone::default(), &[0.5]).unwrap();
        assert_eq!(out, vec![0.25]);
    }

    #[test]
    fn test_each_node_computed_once() {
        // node 2 is an argument of both outputs
        let mut module = read("(ab)(x)[a:inv 2|b:x2 2|x]");
        let mut ctx = Standalone::default();
        let out = module.eval(&mut ctx, &[0.25]).unwrap();
        assert_eq!(out, vec![0.75, 0.5]);
        assert!(module.nodes.iter().all(|n| n.computed));

        // computed nodes are not evaluated again until inputs are reset
        module.nodes[2].value = 0.0;
        module.eval_nodes(&mut ctx, &[0, 1]).unwrap();
        assert_eq!(module.get_outputs(), vec![0.75, 0.5]);
    }
}
