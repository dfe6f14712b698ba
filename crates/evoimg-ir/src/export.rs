//! Diagnostic graph export.
//!
//! A plain directed-graph description of a circuit: one record per input,
//! output and computing node, one edge per argument. Serializable to JSON
//! and printable as Graphviz DOT text.

use crate::circuit::Circuit;
use crate::module::{Module, NodeOp};
use evoimg_core::Result;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNodeKind {
    Input,
    Output,
    Constant,
    Operator,
    Call,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// Node index for computing nodes and inputs, `size + k` for output `k`
    pub id: usize,
    pub kind: GraphNodeKind,
    pub label: String,
}

/// Edge from producer to consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleGraph {
    pub name: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphExport {
    pub modules: Vec<ModuleGraph>,
}

impl Module {
    pub fn export_graph(&self) -> ModuleGraph {
        let size = self.size();
        let mut nodes = Vec::with_capacity(size + self.outputs.len());

        for port in &self.inputs {
            if let Some(i) = port.index {
                nodes.push(GraphNode {
                    id: i,
                    kind: GraphNodeKind::Input,
                    label: port.name.to_string(),
                });
            }
        }
        for (k, port) in self.outputs.iter().enumerate() {
            nodes.push(GraphNode {
                id: size + k,
                kind: GraphNodeKind::Output,
                label: port.name.to_string(),
            });
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let (kind, label) = match &node.op {
                NodeOp::Input(_) => continue,
                NodeOp::Primitive(op) if op.is_const() => {
                    (GraphNodeKind::Constant, format!("{:.2}", node.value))
                }
                NodeOp::Primitive(op) => (GraphNodeKind::Operator, op.symbol().to_string()),
                NodeOp::Call { module, .. } => (GraphNodeKind::Call, module.clone()),
                NodeOp::Symbol(symbol) => (GraphNodeKind::Call, symbol.clone()),
            };
            nodes.push(GraphNode { id: i, kind, label });
        }

        let mut edges: Vec<GraphEdge> = self
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(to, node)| node.args.iter().map(move |&from| GraphEdge { from, to }))
            .collect();
        for (k, port) in self.outputs.iter().enumerate() {
            if let Some(from) = port.index {
                edges.push(GraphEdge { from, to: size + k });
            }
        }

        ModuleGraph {
            name: self.name.clone(),
            nodes,
            edges,
        }
    }
}

impl Circuit {
    pub fn export_graph(&self) -> GraphExport {
        GraphExport {
            modules: self.modules().iter().map(Module::export_graph).collect(),
        }
    }
}

impl GraphExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Graphviz text. Node ids are prefixed with the module name (`main` for
    /// the entry) so modules don't collide.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph Circuit {\n");
        for module in &self.modules {
            let name = if module.name.is_empty() {
                "main"
            } else {
                module.name.as_str()
            };
            // writing into a String cannot fail
            let _ = writeln!(out, "   subgraph {} {{", name);
            for kind in [GraphNodeKind::Input, GraphNodeKind::Output] {
                out.push_str("      { rank = same;\n");
                for node in module.nodes.iter().filter(|n| n.kind == kind) {
                    let _ = writeln!(
                        out,
                        "      {}_{} [label=\"{}\",shape=square,style=filled];",
                        name, node.id, node.label
                    );
                }
                out.push_str("      }\n");
            }
            for node in &module.nodes {
                match node.kind {
                    GraphNodeKind::Input | GraphNodeKind::Output => {}
                    GraphNodeKind::Constant => {
                        let _ = writeln!(
                            out,
                            "      {}_{} [label=\"{}\",shape=diamond,style=filled,color=\"#99aaff\"];",
                            name, node.id, node.label
                        );
                    }
                    GraphNodeKind::Operator | GraphNodeKind::Call => {
                        let _ = writeln!(out, "      {}_{} [label=\"{}\"];", name, node.id, node.label);
                    }
                }
            }
            for edge in &module.edges {
                let _ = writeln!(out, "      {0}_{1} -> {0}_{2};", name, edge.from, edge.to);
            }
            out.push_str("   }\n");
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_records() {
        let circuit = Circuit::read("(rgb)(xy)[b:+ 1 2|r:x|g:y]").unwrap();
        let graph = circuit.export_graph();
        assert_eq!(graph.modules.len(), 1);
        let module = &graph.modules[0];
        assert_eq!(module.name, "");

        let kinds: Vec<GraphNodeKind> = module.nodes.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                GraphNodeKind::Input,
                GraphNodeKind::Input,
                GraphNodeKind::Output,
                GraphNodeKind::Output,
                GraphNodeKind::Output,
                GraphNodeKind::Operator,
            ]
        );
        assert_eq!(module.nodes[2], GraphNode { id: 3, kind: GraphNodeKind::Output, label: "r".to_string() });
        assert!(module.edges.contains(&GraphEdge { from: 1, to: 0 }));
        assert!(module.edges.contains(&GraphEdge { from: 0, to: 5 }));
        assert_eq!(module.edges.len(), 5);
    }

    #[test]
    fn test_export_constants_and_calls() {
        let circuit =
            Circuit::read("(rgb)(x)[r:mult 1 2|gb:x|= 0.3];(f)mult(xy)[f:* 1 2|x|y]").unwrap();
        let graph = circuit.export_graph();
        let main = &graph.modules[0];
        assert!(main
            .nodes
            .iter()
            .any(|n| n.kind == GraphNodeKind::Call && n.label == "mult"));
        assert!(main
            .nodes
            .iter()
            .any(|n| n.kind == GraphNodeKind::Constant && n.label == "0.30"));
        assert_eq!(graph.modules[1].name, "mult");
    }

    #[test]
    fn test_to_dot() {
        let circuit =
            Circuit::read("(rgb)(x)[rgb:mod1 1|x];(x)mod1(y)[x:inv 1|y]").unwrap();
        let dot = circuit.export_graph().to_dot();
        assert!(dot.starts_with("digraph Circuit {\n"));
        assert!(dot.contains("   subgraph main {\n"));
        assert!(dot.contains("   subgraph mod1 {\n"));
        assert!(dot.contains("      main_1 [label=\"x\",shape=square,style=filled];\n"));
        assert!(dot.contains("      main_0 [label=\"mod1\"];\n"));
        assert!(dot.contains("      mod1_1 -> mod1_0;\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_to_json() {
        let circuit = Circuit::read("(rgb)(xy)[b:+ 1 2|r:x|g:y]").unwrap();
        let json = circuit.export_graph().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["modules"][0]["nodes"][0]["kind"], "input");
        assert_eq!(value["modules"][0]["edges"].as_array().unwrap().len(), 5);
    }
}
