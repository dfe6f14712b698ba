//! Composition checks for a set of modules forming a circuit.

use crate::module::{Module, NodeOp};
use evoimg_core::{Error, Result};
use std::collections::HashMap;

/// Name the entry module must carry
pub const ENTRY_NAME: &str = "";

/// Outputs the entry module must declare, in this order
pub const ENTRY_OUTPUTS: &str = "rgb";

/// Validate a circuit's modules and resolve every bare symbol into a call.
///
/// `by_name` maps each module name to its position in `modules`. Checks run
/// in a fixed order and the first failure is returned.
pub fn validate_circuit(modules: &mut [Module], by_name: &HashMap<String, usize>) -> Result<()> {
    let entry = by_name
        .get(ENTRY_NAME)
        .map(|&i| &modules[i])
        .ok_or_else(|| {
            Error::Composition("There is no main module (with empty name)".to_string())
        })?;

    let names = entry.output_names();
    if names != ENTRY_OUTPUTS {
        return Err(Error::Composition(format!(
            "Outputs != 'rgb'! (outputs = '{}')",
            names
        )));
    }

    for module in modules.iter() {
        if !module.is_entry() && module.outputs.len() != 1 {
            return Err(Error::Composition(format!(
                "Module `{}` has more than one output",
                module.name
            )));
        }
    }

    resolve_calls(modules, by_name)?;
    check_call_graph(modules)
}

/// Turn symbols naming a module of the circuit into calls and check each
/// call site supplies as many arguments as the callee has inputs.
fn resolve_calls(modules: &mut [Module], by_name: &HashMap<String, usize>) -> Result<()> {
    let arities: Vec<usize> = modules.iter().map(|m| m.inputs.len()).collect();

    for module in modules.iter_mut() {
        for node in &mut module.nodes {
            let symbol = match &node.op {
                NodeOp::Symbol(symbol) => symbol.clone(),
                _ => continue,
            };
            let index = *by_name
                .get(symbol.as_str())
                .ok_or_else(|| Error::Composition(format!("Missing module `{}`", symbol)))?;
            if arities[index] != node.args.len() {
                return Err(Error::Composition(format!(
                    "Module `{}` has {} inputs, not {}.",
                    symbol,
                    arities[index],
                    node.args.len()
                )));
            }
            node.op = NodeOp::Call {
                module: symbol,
                index,
            };
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Reject circuits where a module can reach itself through calls.
fn check_call_graph(modules: &[Module]) -> Result<()> {
    let callees: Vec<Vec<usize>> = modules
        .iter()
        .map(|module| {
            module
                .nodes
                .iter()
                .filter_map(|node| match node.op {
                    NodeOp::Call { index, .. } => Some(index),
                    _ => None,
                })
                .collect()
        })
        .collect();

    let mut state = vec![Visit::New; modules.len()];
    for start in 0..modules.len() {
        if state[start] != Visit::New {
            continue;
        }
        // iterative DFS; each frame holds the module and its next callee
        let mut stack = vec![(start, 0usize)];
        state[start] = Visit::Active;
        while let Some(frame) = stack.last_mut() {
            let (m, next) = *frame;
            match callees[m].get(next) {
                Some(&callee) => {
                    frame.1 += 1;
                    match state[callee] {
                        Visit::Active => {
                            return Err(Error::Composition(format!(
                                "Recursive call through module `{}`",
                                modules[callee].name
                            )));
                        }
                        Visit::New => {
                            state[callee] = Visit::Active;
                            stack.push((callee, 0));
                        }
                        Visit::Done => {}
                    }
                }
                None => {
                    state[m] = Visit::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}
