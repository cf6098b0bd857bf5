// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Settings for a single test run.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Maximum number of valid examples to generate before stopping
pub const DEFAULT_MAX_EXAMPLES: u64 = 100;

/// Number of words of data a single trial may draw
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Configuration for a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the test, used in reports and to derive the default seed
    pub name: String,

    /// Maximum number of valid examples to generate
    pub max_examples: u64,

    /// Random seed; derived from `name` when absent
    pub seed: Option<u64>,

    /// Per-trial data budget
    pub buffer_size: usize,

    /// Report every distinct failure rather than only the first
    pub report_multiple_bugs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "anonymous".to_string(),
            max_examples: DEFAULT_MAX_EXAMPLES,
            seed: None,
            buffer_size: BUFFER_SIZE,
            report_multiple_bugs: true,
        }
    }
}

impl EngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_examples(mut self, max_examples: u64) -> Self {
        self.max_examples = max_examples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_report_multiple_bugs(mut self, report_multiple_bugs: bool) -> Self {
        self.report_multiple_bugs = report_multiple_bugs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_examples == 0 {
            return Err(Error::Usage("max_examples must be at least 1".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(Error::Usage("buffer_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.name, "anonymous");
        assert_eq!(config.max_examples, 100);
        assert_eq!(config.buffer_size, 8192);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new("sorting")
            .with_max_examples(10)
            .with_seed(3)
            .with_buffer_size(16)
            .with_report_multiple_bugs(false);
        assert_eq!(config.name, "sorting");
        assert_eq!(config.max_examples, 10);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.buffer_size, 16);
        assert!(!config.report_multiple_bugs);
    }

    #[test]
    fn test_validation_rejects_empty_limits() {
        assert!(matches!(
            EngineConfig::default().with_max_examples(0).validate(),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            EngineConfig::default().with_buffer_size(0).validate(),
            Err(Error::Usage(_))
        ));
    }
}
