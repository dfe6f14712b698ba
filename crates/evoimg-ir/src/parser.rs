//! Parser for the module text form.
//!
//! ```text
//! module  = '(' OUTPUTS ')' NAME '(' INPUTS ')' '[' node { '|' node } ']'
//! node    = [ LABELS ':' ] ( '=' FLOAT | OP { INDEX } | INPUT | SYMBOL { INDEX } )
//! circuit = module { ';' module }
//! ```
//!
//! Parsing validates syntax and structure only. Argument indices may point
//! forward or backward and bare symbols stay unresolved until the circuit
//! they belong to is assembled.

use crate::module::{Module, Node, NodeOp};
use crate::operator::{Operator, OperatorRegistry};
use evoimg_core::{Error, Result};
use tracing::trace;

const SHAPE_ERROR: &str = "Modules must have format `(abc)name(xyz)[...]`";

/// Raw pieces of `(outputs)name(inputs)[body]`
struct Shape<'a> {
    outputs: &'a str,
    name: &'a str,
    inputs: &'a str,
    body: &'a str,
}

fn split_shape(s: &str) -> Option<Shape<'_>> {
    let rest = s.strip_prefix('(')?;
    let (outputs, rest) = rest.split_once(')')?;
    let (name, rest) = rest.split_once('(')?;
    let (inputs, rest) = rest.split_once(')')?;
    let body = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some(Shape {
        outputs,
        name: name.trim(),
        inputs,
        body,
    })
}

/// Parse one module. The result is not normalized.
pub fn parse_module(text: &str, registry: &OperatorRegistry) -> Result<Module> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Syntax("Module is empty".to_string()));
    }
    let shape = split_shape(text).ok_or_else(|| Error::Syntax(SHAPE_ERROR.to_string()))?;

    if registry.is_operator(shape.name) {
        return Err(Error::Structure(format!(
            "Module name '{}' is reserved",
            shape.name
        )));
    }

    let inputs: String = shape.inputs.chars().filter(|c| !c.is_whitespace()).collect();
    let outputs: String = shape.outputs.chars().filter(|c| !c.is_whitespace()).collect();
    let mut module = Module::new(shape.name, &inputs, &outputs);

    for (i, name) in inputs.chars().enumerate() {
        if inputs.chars().take(i).any(|c| c == name) {
            return Err(Error::Structure(format!("Input '{}' declared twice", name)));
        }
    }

    for (i, node_text) in shape.body.split('|').enumerate() {
        let node = parse_node(&mut module, i, node_text, registry)?;
        module.nodes.push(node);
    }

    if module.outputs.is_empty() {
        return Err(Error::Structure(
            "Error in module: there are no outputs".to_string(),
        ));
    }
    if let Some(port) = module.outputs.iter().find(|port| port.index.is_none()) {
        return Err(Error::Structure(format!("Missing output `{}`", port.name)));
    }

    let size = module.size();
    for node in &module.nodes {
        if let Some(&arg) = node.args.iter().find(|&&arg| arg >= size) {
            return Err(Error::Structure(format!("Nonexistent node {}", arg)));
        }
    }

    trace!(module = %module.name, nodes = size, "parsed module");
    Ok(module)
}

/// Parse node `i`, binding any output labels and the input it realizes.
fn parse_node(
    module: &mut Module,
    i: usize,
    text: &str,
    registry: &OperatorRegistry,
) -> Result<Node> {
    let parts: Vec<&str> = text.split(':').collect();
    let body = match parts.as_slice() {
        [body] => *body,
        [labels, body] => {
            for c in labels.trim().chars() {
                let k = module
                    .output_position(c)
                    .ok_or_else(|| Error::Structure(format!("There is no output '{}'", c)))?;
                if module.outputs[k].index.is_some() {
                    return Err(Error::Structure(format!("Duplicated output '{}'", c)));
                }
                module.outputs[k].index = Some(i);
            }
            *body
        }
        _ => {
            return Err(Error::Syntax(format!(
                "Error in node {}: wrong number of ':'",
                i
            )))
        }
    };

    let mut tokens = body.split_whitespace();
    let op = tokens
        .next()
        .ok_or_else(|| Error::Syntax("Empty node".to_string()))?;

    let node = match registry.lookup(op) {
        Some(Operator::Const) => {
            let value = tokens
                .next()
                .and_then(|tok| tok.parse::<f64>().ok())
                .ok_or_else(|| {
                    Error::Syntax(format!("Error in node {}: cannot read constant", i))
                })?;
            Node::constant(value)
        }
        Some(operator) => {
            let args = parse_args(i, &mut tokens)?;
            if args.len() != operator.arity() {
                return Err(Error::Syntax(format!(
                    "Error in node {}: `{}` has {} args, not {}.",
                    i,
                    op,
                    operator.arity(),
                    args.len()
                )));
            }
            return Ok(Node::primitive(operator, args));
        }
        None => match single_char(op).and_then(|c| module.input_position(c)) {
            Some(k) => {
                let port = &mut module.inputs[k];
                if port.index.is_some() {
                    return Err(Error::Structure(format!("Duplicated input '{}'", port.name)));
                }
                port.index = Some(i);
                Node::input(port.name)
            }
            None => {
                let args = parse_args(i, &mut tokens)?;
                return Ok(Node::new(NodeOp::Symbol(op.to_string()), args));
            }
        },
    };

    if let Some(extra) = tokens.next() {
        return Err(Error::Syntax(format!(
            "Error in node {}: unexpected '{}'",
            i, extra
        )));
    }
    Ok(node)
}

fn parse_args<'a>(i: usize, tokens: impl Iterator<Item = &'a str>) -> Result<Vec<usize>> {
    tokens
        .map(|tok| {
            tok.parse::<usize>().map_err(|_| {
                Error::Syntax(format!("Error in node {}: bad argument '{}'", i, tok))
            })
        })
        .collect()
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
