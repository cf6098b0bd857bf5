// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Test execution orchestration.
//!
//! The [`Engine`] drives a [`Backend`] through its session protocol: it asks
//! for sessions, runs the test body against each one, and reports every
//! trial's outcome back. Once the backend has no more sessions to offer, the
//! engine replays the failing examples it settled on, either to build a
//! failure report (property mode) or to hand the satisfying values back to
//! the caller (find mode).
//!
//! While an engine is running it holds the thread's [`World`] slot, so
//! runs cannot be nested and [`TestCase::draw`] refuses to work outside one.

use std::collections::HashMap;

use log::{debug, info, trace, warn};

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::data::Status;
use crate::errors::{Error, Failure, FailureReport, MultipleFailures, Result, UserError};
use crate::panics::{self, Panic};
use crate::runner::ConjectureRunner;
use crate::test_case::{Draws, TestCase};
use crate::world::World;

/// What a run is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Every trial should pass; any error is a failure to report.
    Property,
    /// Search for a trial whose body returns `true`.
    Find,
}

/// Counts of trial outcomes reported to the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub calls: u64,
    pub valid: u64,
    pub invalid: u64,
    pub overflow: u64,
    pub interesting: u64,
}

impl RunStatistics {
    fn record(&mut self, status: Status) {
        self.calls += 1;
        match status {
            Status::Valid => self.valid += 1,
            Status::Invalid => self.invalid += 1,
            Status::Overflow => self.overflow += 1,
            Status::Interesting(_) => self.interesting += 1,
        }
    }
}

type Outcome = std::result::Result<std::result::Result<bool, Failure>, Panic>;

pub struct Engine<B: Backend> {
    name: String,
    backend: B,
    mode: Mode,
    report_multiple_bugs: bool,
    labels: HashMap<(&'static str, Option<String>), u64>,
    statistics: RunStatistics,
}

impl<B: Backend> Engine<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Engine<B> {
        Engine {
            name: name.into(),
            backend,
            mode: Mode::Property,
            report_multiple_bugs: true,
            labels: HashMap::new(),
            statistics: RunStatistics::default(),
        }
    }

    /// Whether every distinct failure is replayed and reported, or only the
    /// first one.
    pub fn with_report_multiple_bugs(mut self, report_multiple_bugs: bool) -> Engine<B> {
        self.report_multiple_bugs = report_multiple_bugs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Runs `body` as a property: it must succeed for every trial.
    ///
    /// Errors returned from the body and panics inside it are both failures.
    /// Once the backend is done, each failing example it reports is replayed
    /// with a printing session and the result carries the drawn values.
    pub fn run<F>(&mut self, mut body: F) -> Result<()>
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), Failure>,
    {
        self.mode = Mode::Property;
        let _world = World::enter(&self.name, Mode::Property)?;
        debug!("{}: generating examples", self.name);
        self.search(|tc| body(tc).map(|()| false))?;
        self.report_failures(&mut body)
    }

    /// Searches for a trial on which `body` returns `true` and hands back
    /// the values it drew at the top level.
    ///
    /// Errors from the body are not failures here: the first one ends the
    /// search and is returned as [`Error::Test`]. Panics propagate.
    pub fn find<F>(&mut self, mut body: F) -> Result<Draws>
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<bool, Failure>,
    {
        self.mode = Mode::Find;
        let _world = World::enter(&self.name, Mode::Find)?;
        debug!("{}: searching for an example", self.name);
        self.search(&mut body)?;

        let mut session = match self.backend.failing_example() {
            Some(session) => session,
            None => {
                info!("{}: no satisfying example after {} calls", self.name, self.statistics.calls);
                return Err(if self.backend.was_unsatisfiable() {
                    Error::Unsatisfiable { name: self.name.clone() }
                } else {
                    Error::NoExampleFound
                });
            }
        };

        debug!("{}: replaying satisfying example", self.name);
        let mut tc = TestCase::recording_draws(&mut session);
        match body(&mut tc).map_err(Failure::escalate_usage) {
            Ok(true) => Ok(tc.into_draws()),
            Ok(false) | Err(Failure::Reject) | Err(Failure::Overflow) => {
                warn!("{}: satisfying example did not satisfy the test when replayed", self.name);
                Err(Error::Flaky { unreproduced: 1 })
            }
            Err(Failure::Usage(message)) => Err(Error::Usage(message)),
            Err(Failure::Error(error)) => Err(Error::Test(error)),
        }
    }

    fn search<F>(&mut self, mut trial: F) -> Result<()>
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<bool, Failure>,
    {
        while let Some(mut session) = self.backend.new_session() {
            let outcome = {
                let mut tc = TestCase::new(&mut session);
                match self.mode {
                    Mode::Property => panics::catch(|| trial(&mut tc)),
                    Mode::Find => Ok(trial(&mut tc)),
                }
            };
            // An error here ends the run; the session is dropped unreported.
            let status = self.classify(outcome)?;
            self.statistics.record(status);
            trace!("{}: trial {} was {:?}", self.name, self.statistics.calls, status);
            self.backend.mark_finished(session, status);
        }
        debug!(
            "{}: backend finished after {} calls ({} valid, {} invalid, {} overflow, {} interesting)",
            self.name,
            self.statistics.calls,
            self.statistics.valid,
            self.statistics.invalid,
            self.statistics.overflow,
            self.statistics.interesting,
        );
        Ok(())
    }

    fn classify(&mut self, outcome: Outcome) -> Result<Status> {
        let value = match outcome {
            Ok(value) => value.map_err(Failure::escalate_usage),
            Err(panic) => match self.mode {
                Mode::Property => Err(Failure::Error(panic.into_user_error())),
                Mode::Find => panic.resume(),
            },
        };
        match value {
            Ok(true) if self.mode == Mode::Find => Ok(Status::Interesting(0)),
            Ok(_) => Ok(Status::Valid),
            Err(Failure::Reject) => Ok(Status::Invalid),
            Err(Failure::Overflow) => Ok(Status::Overflow),
            Err(Failure::Usage(message)) => Err(Error::Usage(message)),
            Err(Failure::Error(error)) => match self.mode {
                Mode::Property => Ok(Status::Interesting(self.label_for(&error))),
                Mode::Find => Err(Error::Test(error)),
            },
        }
    }

    // Failures raised from the same place with the same type share a label.
    fn label_for(&mut self, error: &UserError) -> u64 {
        let next = self.labels.len() as u64;
        *self.labels.entry(error.key()).or_insert(next)
    }

    fn report_failures<F>(&mut self, body: &mut F) -> Result<()>
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), Failure>,
    {
        let count = self.backend.count_failing_examples();
        if count == 0 {
            if self.backend.was_unsatisfiable() {
                info!("{}: unable to satisfy assumptions", self.name);
                return Err(Error::Unsatisfiable { name: self.name.clone() });
            }
            info!("{}: passed {} examples", self.name, self.statistics.valid);
            return Ok(());
        }

        let to_replay = if self.report_multiple_bugs { count } else { 1 };
        debug!("{}: replaying {} of {} failing examples", self.name, to_replay, count);

        let mut reports = Vec::new();
        let mut unreproduced = 0;
        for i in 0..to_replay {
            let mut session = match self.backend.failing_example_at(i) {
                Some(session) => session,
                None => {
                    unreproduced += 1;
                    continue;
                }
            };
            let (outcome, givens) = {
                let mut tc = TestCase::printing(&mut session);
                let outcome = panics::catch(|| body(&mut tc));
                (outcome, tc.into_givens())
            };
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(failure)) => match failure.escalate_usage() {
                    Failure::Error(error) => Some(error),
                    Failure::Usage(message) => return Err(Error::Usage(message)),
                    Failure::Reject | Failure::Overflow => None,
                },
                Err(panic) => Some(panic.into_user_error()),
            };
            match error {
                Some(error) => {
                    for given in &givens {
                        info!("{}: {}", self.name, given);
                    }
                    reports.push(FailureReport::new(error, givens));
                }
                None => {
                    warn!("{}: failing example {} did not fail when replayed", self.name, i);
                    unreproduced += 1;
                }
            }
        }

        match reports.len() {
            0 => Err(Error::Flaky { unreproduced }),
            1 => Err(Error::Failed(reports.remove(0))),
            n => {
                info!("{}: found {} distinct failures", self.name, n);
                Err(Error::MultipleFailures(MultipleFailures::new(reports)))
            }
        }
    }
}

/// Runs `body` as a property test against the reference runner.
///
/// ```
/// use hypothesis_core::{hypothesis, bounded_integers, EngineConfig, Failure};
///
/// hypothesis(EngineConfig::new("small numbers"), |tc| {
///     let x = tc.draw(&bounded_integers(10))?;
///     if x > 10 {
///         return Err(Failure::fail("out of range"));
///     }
///     Ok(())
/// })
/// .unwrap();
/// ```
pub fn hypothesis<F>(config: EngineConfig, body: F) -> Result<()>
where
    F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), Failure>,
{
    config.validate()?;
    let runner = ConjectureRunner::new(&config);
    let mut engine = Engine::new(config.name, runner).with_report_multiple_bugs(config.report_multiple_bugs);
    engine.run(body)
}

/// Finds values for which `body` returns `true`, using the reference runner.
pub fn find<F>(config: EngineConfig, body: F) -> Result<Draws>
where
    F: FnMut(&mut TestCase<'_>) -> std::result::Result<bool, Failure>,
{
    config.validate()?;
    // Any satisfying example will do, so stop at the first.
    let config = config.with_report_multiple_bugs(false);
    let runner = ConjectureRunner::new(&config);
    let mut engine = Engine::new(config.name, runner);
    engine.find(body)
}
