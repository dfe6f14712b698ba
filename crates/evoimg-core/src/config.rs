//! Configuration types for mutation, random generation and rendering.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mutation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability of an operator substitution per mutate call
    pub operator_change_probability: f64,
    /// Probability of an edge rewiring per mutate call
    pub connection_swap_probability: f64,
    /// How many times a connection swap looks for an edge pair before giving up
    pub swap_attempts: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            operator_change_probability: 0.5,
            connection_swap_probability: 1.0,
            swap_attempts: 3,
        }
    }
}

/// How the random generator wires argument slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wiring {
    /// Inputs first, every operator picks arguments among nodes already emitted
    PostHoc,
    /// Operators first, inputs last, open sockets bound to the next node in turn
    SocketMatching,
}

/// Random circuit generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of operator nodes (inputs not counted)
    pub num_nodes: usize,
    /// Input port names of the generated entry module
    pub inputs: String,
    /// Output port names of the generated entry module
    pub outputs: String,
    pub wiring: Wiring,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_nodes: 5,
            inputs: "xyrt".to_string(),
            outputs: "rgb".to_string(),
            wiring: Wiring::SocketMatching,
        }
    }
}

/// Rendering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Width and height of the square output image in pixels
    pub size: usize,
    /// Samples per pixel
    pub samples: usize,
    /// Seed for sample jitter
    pub seed: u64,
    /// Seed for the coherent noise table
    pub noise_seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            size: 500,
            samples: 5,
            seed: 0,
            noise_seed: 0,
        }
    }
}

/// Everything a tool run needs, loadable from one JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvoConfig {
    pub mutation: MutationConfig,
    pub generator: GeneratorConfig,
    pub render: RenderConfig,
}

impl EvoConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EvoConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        check_probability(
            "mutation.operator_change_probability",
            self.mutation.operator_change_probability,
        )?;
        check_probability(
            "mutation.connection_swap_probability",
            self.mutation.connection_swap_probability,
        )?;
        if self.generator.outputs.is_empty() {
            return Err(Error::Config("generator.outputs must not be empty".to_string()));
        }
        if self.render.size == 0 {
            return Err(Error::Config("render.size must be at least 1".to_string()));
        }
        if self.render.samples == 0 {
            return Err(Error::Config("render.samples must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be in [0, 1] (got {})", name, p)))
    }
}
