//! Mutation operators for circuits.
//!
//! Every mutation keeps the module acyclic and sorted. Mutations that find
//! nothing to change report [`MutationOutcome::NotApplicable`] instead of
//! failing.

use crate::circuit::Circuit;
use crate::module::{Module, NodeOp};
use crate::operator::{Operator, OperatorRegistry};
use evoimg_core::{Error, MutationConfig, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

/// Argument slot `slot` of node `node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub node: usize,
    pub slot: usize,
}

/// What a single mutation step did. Node indices refer to the module as it
/// was before the step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MutationOutcome {
    OperatorChanged {
        node: usize,
        from: Operator,
        to: Operator,
    },
    ConnectionSwapped {
        first: Link,
        second: Link,
    },
    NotApplicable(&'static str),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, MutationOutcome::NotApplicable(_))
    }
}

pub struct Mutator<'a> {
    config: MutationConfig,
    registry: &'a OperatorRegistry,
}

impl Mutator<'static> {
    pub fn new(config: MutationConfig) -> Self {
        Self::with_registry(config, OperatorRegistry::standard())
    }
}

impl<'a> Mutator<'a> {
    pub fn with_registry(config: MutationConfig, registry: &'a OperatorRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// Replace the operator of a random unary or binary node by a different
    /// operator of the same arity.
    pub fn mutate_operator<R: Rng + ?Sized>(&self, module: &mut Module, rng: &mut R) -> MutationOutcome {
        let candidates: Vec<(usize, Operator)> = module
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node.op {
                NodeOp::Primitive(op) if (1..=2).contains(&op.arity()) => Some((i, op)),
                _ => None,
            })
            .collect();
        let Some(&(node, from)) = candidates.choose(rng) else {
            return MutationOutcome::NotApplicable("no unary or binary node");
        };

        let alternatives: Vec<Operator> = self
            .registry
            .with_arity(from.arity())
            .iter()
            .copied()
            .filter(|&op| op != from)
            .collect();
        let Some(&to) = alternatives.choose(rng) else {
            return MutationOutcome::NotApplicable("no alternative operator");
        };

        module.nodes[node].op = NodeOp::Primitive(to);
        debug!(module = %module.name, node, %from, %to, "operator changed");
        MutationOutcome::OperatorChanged { node, from, to }
    }

    /// Swap the targets of two argument edges.
    ///
    /// The second edge is drawn from nodes that are neither arguments of the
    /// first edge's owner (transitively) nor users of it, so the swap cannot
    /// close a cycle. The module is re-sorted afterwards.
    pub fn mutate_connection<R: Rng + ?Sized>(
        &self,
        module: &mut Module,
        rng: &mut R,
    ) -> Result<MutationOutcome> {
        let links: Vec<Link> = all_links(module, |_| true);
        if links.is_empty() {
            return Ok(MutationOutcome::NotApplicable("no edges"));
        }

        for _ in 0..self.config.swap_attempts {
            let Some(&first) = links.choose(rng) else {
                break;
            };
            let inputs = module.reachable_from(&[first.node]);
            let users = module.dependents_of(first.node);
            let others = all_links(module, |i| !inputs[i] && !users[i]);
            let Some(&second) = others.choose(rng) else {
                continue;
            };

            swap_targets(module, first, second);
            if let Err(err) = module.topological_sort() {
                swap_targets(module, first, second);
                return Err(Error::Internal(format!(
                    "connection swap {:?} <-> {:?} broke ordering: {}",
                    first, second, err
                )));
            }
            debug!(module = %module.name, ?first, ?second, "connection swapped");
            return Ok(MutationOutcome::ConnectionSwapped { first, second });
        }
        Ok(MutationOutcome::NotApplicable("no swappable edge pair"))
    }

    /// Apply each mutation kind with its own probability.
    pub fn mutate_module<R: Rng + ?Sized>(
        &self,
        module: &mut Module,
        rng: &mut R,
    ) -> Result<Vec<MutationOutcome>> {
        let mut outcomes = Vec::new();
        if rng.gen::<f64>() < self.config.operator_change_probability {
            outcomes.push(self.mutate_operator(module, rng));
        }
        if rng.gen::<f64>() < self.config.connection_swap_probability {
            outcomes.push(self.mutate_connection(module, rng)?);
        }
        Ok(outcomes)
    }

    /// Mutate the circuit's entry module in place.
    pub fn mutate_circuit<R: Rng + ?Sized>(
        &self,
        circuit: &mut Circuit,
        rng: &mut R,
    ) -> Result<Vec<MutationOutcome>> {
        self.mutate_module(circuit.entry_mut(), rng)
    }

    /// `count` independently mutated copies of `circuit`.
    pub fn mutants<R: Rng + ?Sized>(
        &self,
        circuit: &Circuit,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Circuit>> {
        (0..count)
            .map(|_| {
                let mut child = circuit.clone();
                self.mutate_circuit(&mut child, rng)?;
                Ok(child)
            })
            .collect()
    }
}

impl Circuit {
    /// Mutated copy of this circuit, or `None` when no mutation applied.
    pub fn mutated<R: Rng + ?Sized>(&self, mutator: &Mutator<'_>, rng: &mut R) -> Result<Option<Circuit>> {
        let mut child = self.clone();
        let outcomes = mutator.mutate_circuit(&mut child, rng)?;
        if outcomes.iter().any(MutationOutcome::is_applied) {
            Ok(Some(child))
        } else {
            Ok(None)
        }
    }
}

fn all_links(module: &Module, keep: impl Fn(usize) -> bool) -> Vec<Link> {
    module
        .nodes
        .iter()
        .enumerate()
        .filter(|&(i, _)| keep(i))
        .flat_map(|(node, n)| (0..n.args.len()).map(move |slot| Link { node, slot }))
        .collect()
}

fn swap_targets(module: &mut Module, a: Link, b: Link) {
    let ta = module.nodes[a.node].args[a.slot];
    let tb = module.nodes[b.node].args[b.slot];
    module.nodes[a.node].args[a.slot] = tb;
    module.nodes[b.node].args[b.slot] = ta;
}
