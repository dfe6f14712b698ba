//! Circuit representation for evolved images.
//!
//! A circuit is a set of modules, each a DAG of numeric operators stored in a
//! flat node array. This crate covers the whole life of a circuit:
//! - Text form: parsing and `Display` serialization
//! - Normalization: topological sort and tree-shake
//! - Evaluation, including calls between modules
//! - Random generation and acyclicity-preserving mutation
//! - Diagnostic graph export

pub mod operator;
pub mod noise;
pub mod module;
pub mod parser;
pub mod normalize;
pub mod eval;
pub mod validation;
pub mod circuit;
pub mod mutation;
pub mod generator;
pub mod export;

pub use operator::{Operator, OperatorRegistry, MAX_ARITY};
pub use noise::Perlin;
pub use module::{Module, Node, NodeOp, Port};
pub use parser::parse_module;
pub use eval::{EvalContext, Standalone};
pub use circuit::Circuit;
pub use mutation::{Link, MutationOutcome, Mutator};
pub use generator::Generator;
pub use export::{GraphEdge, GraphExport, GraphNode, GraphNodeKind, ModuleGraph};
