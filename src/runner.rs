// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Reference backend: random generation with a per-label record of the
//! smallest failing example.
//!
//! The runner hands out fresh random sessions until it has run enough
//! examples or has seen too many invalid ones. Unless it is asked to report
//! every distinct bug it also stops at the first failure. It does not
//! shrink; the example kept for each label is simply the smallest one that
//! was seen, ordered by record length and then lexicographically.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::data::{ByteSource, Status, TestResult};

/// Reasons for the runner to stop handing out sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Reached maximum examples that ran to completion
    MaxExamples,
    /// Too many trials were invalid or overflowed
    MaxIterations,
    /// A failing example was found
    FoundFailure,
}

impl ExitReason {
    /// Get a human-readable description of the exit reason
    pub fn description(&self, max_examples: u64) -> String {
        match self {
            ExitReason::MaxExamples => format!("max_examples={}", max_examples),
            ExitReason::MaxIterations => format!(
                "max_examples={}, but < 10% of examples satisfied assumptions",
                max_examples
            ),
            ExitReason::FoundFailure => "found a failing example".to_string(),
        }
    }
}

/// Statistics about a runner's generation so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub calls: u64,
    pub valid_examples: u64,
    pub invalid_examples: u64,
    pub overflow_examples: u64,
    pub interesting_examples: u64,
}

#[derive(Debug)]
pub struct ConjectureRunner {
    name: String,
    max_examples: u64,
    buffer_size: usize,
    report_multiple_bugs: bool,
    random: ChaCha8Rng,
    stats: RunnerStats,
    minimized_examples: BTreeMap<u64, TestResult>,
    exit_reason: Option<ExitReason>,
}

/// Stable seed for a test, so that reruns of the same test draw the same data.
pub fn seed_from_name(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    BigEndian::read_u64(&digest[..8])
}

impl ConjectureRunner {
    pub fn new(config: &EngineConfig) -> ConjectureRunner {
        let seed = config.seed.unwrap_or_else(|| seed_from_name(&config.name));
        debug!("Runner for {} seeded with {}", config.name, seed);
        ConjectureRunner {
            name: config.name.clone(),
            max_examples: config.max_examples,
            buffer_size: config.buffer_size,
            report_multiple_bugs: config.report_multiple_bugs,
            random: ChaCha8Rng::seed_from_u64(seed),
            stats: RunnerStats::default(),
            minimized_examples: BTreeMap::new(),
            exit_reason: None,
        }
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit_reason.as_ref()
    }

    /// The smallest example seen for each failure label, smallest first.
    pub fn list_minimized_examples(&self) -> Vec<TestResult> {
        let mut results: Vec<TestResult> = self.minimized_examples.values().cloned().collect();
        results.sort();
        results
    }

    // Failing trials ran to completion too, so they count towards max_examples.
    fn next_exit_reason(&self) -> Option<ExitReason> {
        let completed = self.stats.valid_examples + self.stats.interesting_examples;
        if self.stats.interesting_examples > 0 && !self.report_multiple_bugs {
            Some(ExitReason::FoundFailure)
        } else if completed >= self.max_examples {
            Some(ExitReason::MaxExamples)
        } else if self.stats.invalid_examples + self.stats.overflow_examples >= 10 * self.max_examples {
            Some(ExitReason::MaxIterations)
        } else {
            None
        }
    }

    fn exit_with(&mut self, reason: ExitReason) {
        if self.exit_reason.is_none() {
            info!(
                "{}: stopped generating because {} ({} calls, {} valid, {} invalid, {} overflow, {} interesting)",
                self.name,
                reason.description(self.max_examples),
                self.stats.calls,
                self.stats.valid_examples,
                self.stats.invalid_examples,
                self.stats.overflow_examples,
                self.stats.interesting_examples,
            );
            self.exit_reason = Some(reason);
        }
    }
}

impl Backend for ConjectureRunner {
    type Session = ByteSource;

    fn new_session(&mut self) -> Option<ByteSource> {
        if self.exit_reason.is_some() {
            return None;
        }
        if let Some(reason) = self.next_exit_reason() {
            self.exit_with(reason);
            return None;
        }
        let random = ChaCha8Rng::seed_from_u64(self.random.gen());
        Some(ByteSource::from_random(random, self.buffer_size))
    }

    fn mark_finished(&mut self, session: ByteSource, status: Status) {
        let result = session.into_result(status);
        self.stats.calls += 1;
        trace!("{}: call {} finished as {:?}", self.name, self.stats.calls, status);
        match status {
            Status::Overflow => self.stats.overflow_examples += 1,
            Status::Invalid => self.stats.invalid_examples += 1,
            Status::Valid => self.stats.valid_examples += 1,
            Status::Interesting(label) => {
                self.stats.interesting_examples += 1;
                let smaller = match self.minimized_examples.get(&label) {
                    Some(existing) => result < *existing,
                    None => true,
                };
                if smaller {
                    debug!(
                        "{}: new smallest example for label {} ({} words)",
                        self.name,
                        label,
                        result.record.len()
                    );
                    self.minimized_examples.insert(label, result);
                }
            }
        }
    }

    fn count_failing_examples(&self) -> usize {
        self.minimized_examples.len()
    }

    fn failing_example_at(&mut self, i: usize) -> Option<ByteSource> {
        self.list_minimized_examples()
            .into_iter()
            .nth(i)
            .map(|result| ByteSource::from_vec(result.record))
    }

    fn was_unsatisfiable(&self) -> bool {
        self.stats.interesting_examples == 0 && self.stats.valid_examples == 0
    }
}
