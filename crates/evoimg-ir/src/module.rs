//! Data model: nodes, ports and modules.
//!
//! A [`Module`] is one DAG-shaped function. Nodes live in a single `Vec` and
//! refer to their arguments by index into it. Once normalized every argument
//! index is strictly larger than the index of the node using it, so a single
//! backward scan is a valid evaluation order.

use crate::operator::Operator;
use evoimg_core::{Error, Result};
use std::fmt;

/// What a node computes
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    /// A registry operator; `Operator::Const` keeps its literal in the value slot
    Primitive(Operator),
    /// Realizes the input port with this name
    Input(char),
    /// Bare symbol not yet resolved against the circuit's module table
    Symbol(String),
    /// Call into another module of the same circuit
    Call { module: String, index: usize },
}

impl NodeOp {
    pub fn operator(&self) -> Option<Operator> {
        match self {
            NodeOp::Primitive(op) => Some(*op),
            _ => None,
        }
    }
}

impl fmt::Display for NodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOp::Primitive(op) => f.write_str(op.symbol()),
            NodeOp::Input(name) => write!(f, "{}", name),
            NodeOp::Symbol(symbol) => f.write_str(symbol),
            NodeOp::Call { module, .. } => f.write_str(module),
        }
    }
}

/// One DAG vertex, owned by its module
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: NodeOp,
    pub args: Vec<usize>,
    /// Literal for constants, memoized result for everything else
    pub value: f64,
    pub computed: bool,
}

impl Node {
    pub fn new(op: NodeOp, args: Vec<usize>) -> Self {
        Self {
            op,
            args,
            value: 0.0,
            computed: false,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            op: NodeOp::Primitive(Operator::Const),
            args: Vec::new(),
            value,
            computed: false,
        }
    }

    pub fn input(name: char) -> Self {
        Self::new(NodeOp::Input(name), Vec::new())
    }

    pub fn primitive(op: Operator, args: Vec<usize>) -> Self {
        Self::new(NodeOp::Primitive(op), args)
    }

    pub fn is_call(&self) -> bool {
        matches!(self.op, NodeOp::Call { .. })
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.op, NodeOp::Primitive(Operator::Const))
    }
}

/// Named binding of an input or output to the node realizing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub name: char,
    pub index: Option<usize>,
}

impl Port {
    pub fn unbound(name: char) -> Self {
        Self { name, index: None }
    }
}

/// One function of a circuit. The empty name is the circuit's entry point.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub nodes: Vec<Node>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl Module {
    /// Empty module with unbound ports
    pub fn new(name: impl Into<String>, inputs: &str, outputs: &str) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            inputs: inputs.chars().map(Port::unbound).collect(),
            outputs: outputs.chars().map(Port::unbound).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_entry(&self) -> bool {
        self.name.is_empty()
    }

    /// Node indices of the bound outputs, in declaration order
    pub fn output_indices(&self) -> Vec<usize> {
        self.outputs.iter().filter_map(|port| port.index).collect()
    }

    pub fn output_names(&self) -> String {
        self.outputs.iter().map(|port| port.name).collect()
    }

    pub fn input_names(&self) -> String {
        self.inputs.iter().map(|port| port.name).collect()
    }

    pub fn input_position(&self, name: char) -> Option<usize> {
        self.inputs.iter().position(|port| port.name == name)
    }

    pub fn output_position(&self, name: char) -> Option<usize> {
        self.outputs.iter().position(|port| port.name == name)
    }

    /// True if node `n` realizes one of the inputs
    pub fn is_input(&self, n: usize) -> bool {
        self.inputs.iter().any(|port| port.index == Some(n))
    }

    /// Number of argument edges in the module
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.args.len()).sum()
    }

    /// Rebind every input port to the node carrying its name.
    pub fn reconstruct_inputs(&mut self) -> Result<()> {
        for port in &mut self.inputs {
            port.index = None;
            for (i, node) in self.nodes.iter().enumerate() {
                if node.op != NodeOp::Input(port.name) {
                    continue;
                }
                if port.index.is_some() {
                    return Err(Error::Structure(format!("Duplicated input '{}'", port.name)));
                }
                port.index = Some(i);
            }
        }
        Ok(())
    }
}

/// Text form, `(outputs)name(inputs)[node|node|...]`.
impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}({})[", self.output_names(), self.name, self.input_names())?;
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            let mut labelled = false;
            for port in self.outputs.iter().filter(|port| port.index == Some(i)) {
                write!(f, "{}", port.name)?;
                labelled = true;
            }
            if labelled {
                f.write_str(":")?;
            }
            write!(f, "{}", node.op)?;
            if node.is_constant() {
                write!(f, " {}", node.value)?;
            } else {
                for arg in &node.args {
                    write!(f, " {}", arg)?;
                }
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> Module {
        // (rgb)(xy)[b:+ 1 2|r:x|g:y]
        let mut module = Module::new("", "xy", "rgb");
        module.nodes.push(Node::primitive(Operator::Add, vec![1, 2]));
        module.nodes.push(Node::input('x'));
        module.nodes.push(Node::input('y'));
        module.outputs[0].index = Some(1);
        module.outputs[1].index = Some(2);
        module.outputs[2].index = Some(0);
        module
    }

    #[test]
    fn test_display() {
        let mut module = sample_module();
        module.reconstruct_inputs().unwrap();
        assert_eq!(module.to_string(), "(rgb)(xy)[b:+ 1 2|r:x|g:y]");
    }

    #[test]
    fn test_display_constant_and_shared_label() {
        let mut module = Module::new("k", "", "ab");
        module.nodes.push(Node::constant(0.25));
        module.outputs[0].index = Some(0);
        module.outputs[1].index = Some(0);
        assert_eq!(module.to_string(), "(ab)k()[ab:= 0.25]");
    }

    #[test]
    fn test_reconstruct_inputs() {
        let mut module = sample_module();
        module.reconstruct_inputs().unwrap();
        assert_eq!(module.inputs[0].index, Some(1));
        assert_eq!(module.inputs[1].index, Some(2));
        assert!(module.is_input(2));
        assert!(!module.is_input(0));

        module.nodes.push(Node::input('y'));
        let err = module.reconstruct_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Duplicated input 'y'");
    }

    #[test]
    fn test_port_queries() {
        let module = sample_module();
        assert_eq!(module.output_names(), "rgb");
        assert_eq!(module.input_names(), "xy");
        assert_eq!(module.output_indices(), vec![1, 2, 0]);
        assert_eq!(module.output_position('b'), Some(2));
        assert_eq!(module.input_position('q'), None);
        assert_eq!(module.edge_count(), 2);
        assert!(module.is_entry());
    }

    #[test]
    fn test_clone_is_independent() {
        let module = sample_module();
        let mut copy = module.clone();
        copy.nodes[0].op = NodeOp::Primitive(Operator::Mul);
        copy.nodes[1].value = 3.0;
        assert_eq!(module.nodes[0].op, NodeOp::Primitive(Operator::Add));
        assert_eq!(module.nodes[1].value, 0.0);
    }
}
