//! Random module and circuit generation.
//!
//! Both wiring strategies emit edges that can never close a loop, and the
//! result is normalized before it is returned.

use crate::circuit::Circuit;
use crate::module::{Module, Node};
use crate::operator::{Operator, OperatorRegistry};
use evoimg_core::{Error, GeneratorConfig, Result, Wiring};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use tracing::{debug, instrument};

pub struct Generator<'a> {
    config: GeneratorConfig,
    registry: &'a OperatorRegistry,
}

impl Generator<'static> {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_registry(config, OperatorRegistry::standard())
    }
}

impl<'a> Generator<'a> {
    pub fn with_registry(config: GeneratorConfig, registry: &'a OperatorRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Random entry module, wired as configured, as a one-module circuit.
    #[instrument(level = "debug", skip_all, fields(nodes = self.config.num_nodes))]
    pub fn random_circuit<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Circuit> {
        let module = self.random_module("", rng)?;
        debug!(size = module.size(), "random circuit");
        Circuit::from_entry(module)
    }

    /// Random module named `name` with the configured ports and size.
    pub fn random_module<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<Module> {
        let GeneratorConfig {
            num_nodes,
            inputs,
            outputs,
            wiring,
        } = &self.config;
        let mut module = match wiring {
            Wiring::PostHoc => self.random_module_post_hoc(inputs, outputs, *num_nodes, rng)?,
            Wiring::SocketMatching => {
                self.random_module_socket_matching(inputs, outputs, *num_nodes, rng)?
            }
        };
        module.name = name.to_string();
        Ok(module)
    }

    /// Inputs first, then `num_nodes` operators each taking distinct
    /// arguments among the nodes already emitted; outputs are bound last.
    pub fn random_module_post_hoc<R: Rng + ?Sized>(
        &self,
        inputs: &str,
        outputs: &str,
        num_nodes: usize,
        rng: &mut R,
    ) -> Result<Module> {
        let mut module = Module::new("", inputs, outputs);
        module.nodes.extend(inputs.chars().map(Node::input));

        for _ in 0..num_nodes {
            let emitted = module.size();
            let ops: Vec<Operator> = self.registry.up_to_arity(emitted).collect();
            let op = *ops.choose(rng).ok_or_else(no_operators)?;
            let node = if op.is_const() {
                Node::constant(rng.gen())
            } else {
                let args = index::sample(rng, emitted, op.arity()).into_vec();
                Node::primitive(op, args)
            };
            module.nodes.push(node);
        }

        let size = module.size();
        if size == 0 {
            return Err(empty_module());
        }
        for port in &mut module.outputs {
            port.index = Some(rng.gen_range(0..size));
        }
        module.reconstruct_inputs()?;
        module.normalize()?;
        Ok(module)
    }

    /// Operators first and inputs last. Each node in turn is plugged into a
    /// random open socket (an unbound argument of an earlier node or an
    /// unbound output); sockets still open at the end are bound to random
    /// later nodes.
    pub fn random_module_socket_matching<R: Rng + ?Sized>(
        &self,
        inputs: &str,
        outputs: &str,
        num_nodes: usize,
        rng: &mut R,
    ) -> Result<Module> {
        let mut module = Module::new("", inputs, outputs);
        let ops: Vec<Operator> = self.registry.all().collect();

        // open[i][k] is None while argument k of node i is unbound
        let mut open: Vec<Vec<Option<usize>>> = Vec::new();
        for i in 0..num_nodes {
            // without inputs the last node must be a leaf
            let op = if inputs.is_empty() && i + 1 == num_nodes {
                Operator::Const
            } else {
                *ops.choose(rng).ok_or_else(no_operators)?
            };
            let value = if op.is_const() { rng.gen() } else { 0.0 };
            let mut node = Node::primitive(op, Vec::new());
            node.value = value;
            module.nodes.push(node);
            open.push(vec![None; op.arity()]);
        }
        for (k, name) in inputs.chars().enumerate() {
            module.inputs[k].index = Some(module.size());
            module.nodes.push(Node::input(name));
            open.push(Vec::new());
        }

        let size = module.size();
        if size == 0 {
            return Err(empty_module());
        }

        for i in 0..size {
            let sockets: Vec<(usize, usize)> = open[..i]
                .iter()
                .enumerate()
                .flat_map(|(j, slots)| {
                    slots
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| slot.is_none())
                        .map(move |(k, _)| (j, k))
                })
                .collect();
            let free_outputs: Vec<usize> = module
                .outputs
                .iter()
                .enumerate()
                .filter(|(_, port)| port.index.is_none())
                .map(|(p, _)| p)
                .collect();
            let choices = sockets.len() + free_outputs.len();
            if choices == 0 {
                continue;
            }
            let r = rng.gen_range(0..choices);
            match sockets.get(r) {
                Some(&(j, k)) => open[j][k] = Some(i),
                None => module.outputs[free_outputs[r - sockets.len()]].index = Some(i),
            }
        }

        for (i, slots) in open.iter_mut().enumerate() {
            for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
                if i + 1 >= size {
                    return Err(Error::Internal(format!(
                        "node {} has an open argument and no later node",
                        i
                    )));
                }
                *slot = Some(rng.gen_range(i + 1..size));
            }
        }
        for port in module.outputs.iter_mut().filter(|port| port.index.is_none()) {
            port.index = Some(rng.gen_range(0..size));
        }

        for (node, slots) in module.nodes.iter_mut().zip(open) {
            node.args = slots.into_iter().flatten().collect();
        }
        module.normalize()?;
        Ok(module)
    }
}

fn no_operators() -> Error {
    Error::Config("operator registry is empty".to_string())
}

fn empty_module() -> Error {
    Error::Config("cannot generate a module without nodes or inputs".to_string())
}
