//! Circuits: a set of modules with one RGB entry point.

use crate::eval::EvalContext;
use crate::module::Module;
use crate::noise::Perlin;
use crate::operator::OperatorRegistry;
use crate::parser::parse_module;
use crate::validation::{validate_circuit, ENTRY_NAME};
use evoimg_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A validated, normalized program.
///
/// Cloning deep-copies every module, including its evaluation state, and
/// shares the read-only noise table.
#[derive(Debug, Clone)]
pub struct Circuit {
    modules: Vec<Module>,
    by_name: HashMap<String, usize>,
    noise: Arc<Perlin>,
}

impl Circuit {
    /// Read a circuit using the standard operator set.
    pub fn read(text: &str) -> Result<Self> {
        Self::read_with(text, OperatorRegistry::standard())
    }

    /// Parse, normalize and validate `module;module;...`.
    #[instrument(level = "debug", skip(registry), err)]
    pub fn read_with(text: &str, registry: &OperatorRegistry) -> Result<Self> {
        let mut modules = Vec::new();
        for part in text.split(';') {
            let mut module = parse_module(part, registry)?;
            module.normalize()?;
            modules.push(module);
        }
        let circuit = Self::from_modules(modules)?;
        debug!(modules = circuit.modules.len(), "circuit read");
        Ok(circuit)
    }

    /// Assemble already-normalized modules into a circuit.
    pub fn from_modules(mut modules: Vec<Module>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            if by_name.insert(module.name.clone(), i).is_some() {
                return Err(Error::Structure(format!(
                    "Duplicated module `{}`.",
                    module.name
                )));
            }
        }
        validate_circuit(&mut modules, &by_name)?;
        Ok(Self {
            modules,
            by_name,
            noise: Arc::new(Perlin::default()),
        })
    }

    /// Circuit made of a single entry module.
    pub fn from_entry(module: Module) -> Result<Self> {
        Self::from_modules(vec![module])
    }

    /// Use the noise table derived from `seed`.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        if self.noise.seed() != seed {
            self.noise = Arc::new(Perlin::new(seed));
        }
        self
    }

    pub fn with_noise(mut self, noise: Arc<Perlin>) -> Self {
        self.noise = noise;
        self
    }

    pub fn noise(&self) -> &Arc<Perlin> {
        &self.noise
    }

    fn entry_index(&self) -> usize {
        // present by construction
        self.by_name[ENTRY_NAME]
    }

    pub fn entry(&self) -> &Module {
        &self.modules[self.entry_index()]
    }

    pub fn entry_mut(&mut self) -> &mut Module {
        let i = self.entry_index();
        &mut self.modules[i]
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.by_name.get(name).map(|&i| &self.modules[i])
    }

    pub fn module_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Modules in declaration order
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Evaluate the entry module. Returns the `rgb` channels.
    pub fn eval(&mut self, inputs: &[f64]) -> Result<Vec<f64>> {
        let entry = self.entry_index();
        self.eval_module(entry, inputs)
    }

    /// Evaluate module `index` with this circuit as the call context.
    pub fn eval_module(&mut self, index: usize, inputs: &[f64]) -> Result<Vec<f64>> {
        let slot = self
            .modules
            .get_mut(index)
            .ok_or_else(|| Error::Internal(format!("Module #{} missing", index)))?;
        // the call graph is acyclic, so a taken module is never re-entered
        let mut module = std::mem::take(slot);
        let result = module.eval(self, inputs);
        self.modules[index] = module;
        result
    }
}

impl EvalContext for Circuit {
    fn noise(&self, x: f64, y: f64) -> f64 {
        self.noise.at(x, y)
    }

    fn call(&mut self, index: usize, args: &[f64]) -> Result<f64> {
        let outputs = self.eval_module(index, args)?;
        outputs.first().copied().ok_or_else(|| {
            Error::Internal(format!("Module #{} produced no output", index))
        })
    }
}

/// Modules in declaration order, joined by `;`.
impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, module) in self.modules.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", module)?;
        }
        Ok(())
    }
}
