//! Test generation settings
//!
//! Every field has a default, so a TOML document only needs the keys it
//! overrides:
//!
//! ```toml
//! random_samples = 8
//! int_range = [-10, 10]
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Value synthesis and test assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenConfig {
    /// Pseudo-random draws per scalar parameter
    pub random_samples: usize,
    /// Integer range used when preconditions give no bound
    pub int_range: (i64, i64),
    /// Float range used when preconditions give no bound
    pub float_range: (f64, f64),
    /// Element range of integer sequences without an element bound
    pub elem_range: (i64, i64),
    /// Longest deterministic sequence length
    pub max_seq_len: usize,
    /// Extra sequences of random length per sequence parameter
    pub random_seqs: usize,
    pub int_seed: u64,
    pub float_seed: u64,
    pub seq_seed: u64,
    /// Name of the generated test module for the primary module
    pub test_module: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            random_samples: 20,
            int_range: (-100, 100),
            float_range: (-100.0, 100.0),
            elem_range: (1, 100),
            max_seq_len: 20,
            random_seqs: 3,
            int_seed: 0x9E37_79B9_7F4A_7C15,
            float_seed: 0xD1B5_4A32_D192_ED03,
            seq_seed: 0x94D0_49BB_1331_11EB,
            test_module: "contract_tests".to_string(),
        }
    }
}

impl GenConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GenConfig = toml::from_str(text).map_err(|e| CompileError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the synthesizer cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.int_range.0 > self.int_range.1 {
            return Err(CompileError::config(format!(
                "int_range lower bound {} exceeds upper bound {}",
                self.int_range.0, self.int_range.1
            )));
        }
        if matches!(
            self.float_range.0.partial_cmp(&self.float_range.1),
            None | Some(Ordering::Greater)
        ) {
            return Err(CompileError::config(format!(
                "float_range [{}, {}] is empty",
                self.float_range.0, self.float_range.1
            )));
        }
        if self.elem_range.0 > self.elem_range.1 {
            return Err(CompileError::config(format!(
                "elem_range lower bound {} exceeds upper bound {}",
                self.elem_range.0, self.elem_range.1
            )));
        }
        if [self.int_seed, self.float_seed, self.seq_seed].contains(&0) {
            // xorshift never leaves zero
            return Err(CompileError::config("seeds must be non-zero"));
        }
        if self.test_module.is_empty() || !self.test_module.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CompileError::config(format!(
                "test_module `{}` is not a valid module name",
                self.test_module
            )));
        }
        Ok(())
    }

    /// Set the number of random draws
    pub fn random_samples(mut self, n: usize) -> Self {
        self.random_samples = n;
        self
    }

    /// Set the default integer range
    pub fn int_range(mut self, lo: i64, hi: i64) -> Self {
        self.int_range = (lo, hi);
        self
    }

    /// Set the test module name
    pub fn test_module(mut self, name: impl Into<String>) -> Self {
        self.test_module = name.into();
        self
    }
}
