// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The draw session handed to a test body for one trial.
//!
//! Every value a test body uses comes through [`TestCase::draw`]. The session
//! tracks how deeply draws are nested, so that composite providers can draw
//! from the same session while only their final, top-level result is recorded
//! when a failing example is replayed.

use std::any::Any;
use std::fmt;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

use crate::data::DataSource;
use crate::errors::{Failure, Given};
use crate::providers::Provider;
use crate::world::World;

/// Values drawn at the top level of a replayed trial, in draw order.
pub struct Draws {
    values: Vec<Box<dyn Any>>,
}

impl Draws {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `i`-th draw, if it exists and has type `T`.
    pub fn get<T: 'static>(&self, i: usize) -> Option<&T> {
        self.values.get(i).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn last<T: 'static>(&self) -> Option<&T> {
        self.values.last().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for Draws {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draws").field("len", &self.values.len()).finish()
    }
}

pub struct TestCase<'a> {
    source: &'a mut dyn DataSource,
    depth: usize,
    top_level_draws: usize,
    draws: Option<Vec<Box<dyn Any>>>,
    givens: Option<Vec<Given>>,
}

impl<'a> TestCase<'a> {
    /// A session that records nothing, as used for ordinary trials.
    pub fn new(source: &'a mut dyn DataSource) -> TestCase<'a> {
        TestCase {
            source,
            depth: 0,
            top_level_draws: 0,
            draws: None,
            givens: None,
        }
    }

    /// A session that keeps every top-level value, for find-mode replay.
    pub(crate) fn recording_draws(source: &'a mut dyn DataSource) -> TestCase<'a> {
        TestCase {
            draws: Some(Vec::new()),
            ..TestCase::new(source)
        }
    }

    /// A session that keeps a printable log of top-level draws, for
    /// reporting a failing example.
    pub(crate) fn printing(source: &'a mut dyn DataSource) -> TestCase<'a> {
        TestCase {
            givens: Some(Vec::new()),
            ..TestCase::new(source)
        }
    }

    /// The underlying data source, for providers built on raw bits.
    pub fn source(&mut self) -> &mut (dyn DataSource + 'a) {
        &mut *self.source
    }

    /// Number of draws currently in progress.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn draw<P>(&mut self, provider: &P) -> Result<P::Value, Failure>
    where
        P: Provider + ?Sized,
        P::Value: Clone + Debug + 'static,
    {
        self.draw_inner(None, |tc| provider.provide(tc))
    }

    /// Like [`draw`](TestCase::draw), but the value is reported under `label`.
    pub fn draw_as<P>(&mut self, label: &str, provider: &P) -> Result<P::Value, Failure>
    where
        P: Provider + ?Sized,
        P::Value: Clone + Debug + 'static,
    {
        self.draw_inner(Some(label), |tc| provider.provide(tc))
    }

    /// Draws a value built by `produce`, which may draw from this session
    /// itself. Only the value it returns is recorded.
    pub fn draw_with<T, F>(&mut self, label: Option<&str>, produce: F) -> Result<T, Failure>
    where
        T: Clone + Debug + 'static,
        F: FnOnce(&mut TestCase<'a>) -> Result<T, Failure>,
    {
        self.draw_inner(label, produce)
    }

    fn draw_inner<T, F>(&mut self, label: Option<&str>, produce: F) -> Result<T, Failure>
    where
        T: Clone + Debug + 'static,
        F: FnOnce(&mut TestCase<'a>) -> Result<T, Failure>,
    {
        if !World::is_active() {
            return Err(Failure::usage("Cannot call draw outside of a test run"));
        }
        let top_level = self.depth == 0;
        let value = {
            let mut scope = DrawScope::enter(self);
            produce(&mut *scope)?
        };
        if top_level {
            self.top_level_draws += 1;
            if let Some(draws) = self.draws.as_mut() {
                draws.push(Box::new(value.clone()));
            }
            if let Some(givens) = self.givens.as_mut() {
                let name = match label {
                    Some(label) => label.to_string(),
                    None => format!("#{}", self.top_level_draws),
                };
                givens.push(Given {
                    name,
                    value: format!("{:?}", value),
                });
            }
        }
        Ok(value)
    }

    /// Discards the current trial unless `condition` holds.
    pub fn assume(&mut self, condition: bool) -> Result<(), Failure> {
        if !World::is_active() {
            return Err(Failure::usage("Cannot call assume outside of a test run"));
        }
        if condition {
            Ok(())
        } else {
            Err(Failure::Reject)
        }
    }

    /// Unconditionally discards the current trial.
    pub fn reject<T>(&mut self) -> Result<T, Failure> {
        self.assume(false)?;
        Err(Failure::Reject)
    }

    /// The printable draw log, when this session keeps one.
    pub fn givens(&self) -> Option<&[Given]> {
        self.givens.as_deref()
    }

    pub(crate) fn into_givens(self) -> Vec<Given> {
        self.givens.unwrap_or_default()
    }

    pub(crate) fn into_draws(self) -> Draws {
        Draws {
            values: self.draws.unwrap_or_default(),
        }
    }
}

impl fmt::Debug for TestCase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("depth", &self.depth)
            .field("top_level_draws", &self.top_level_draws)
            .field("recording", &self.draws.is_some())
            .field("printing", &self.givens.is_some())
            .finish()
    }
}

// Holds one level of draw depth open. Released on every exit path,
// including `?` and unwinding.
struct DrawScope<'t, 'a> {
    tc: &'t mut TestCase<'a>,
}

impl<'t, 'a> DrawScope<'t, 'a> {
    fn enter(tc: &'t mut TestCase<'a>) -> DrawScope<'t, 'a> {
        tc.depth += 1;
        tc.source.start_draw();
        DrawScope { tc }
    }
}

impl<'a> Deref for DrawScope<'_, 'a> {
    type Target = TestCase<'a>;

    fn deref(&self) -> &TestCase<'a> {
        self.tc
    }
}

impl<'a> DerefMut for DrawScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut TestCase<'a> {
        self.tc
    }
}

impl Drop for DrawScope<'_, '_> {
    fn drop(&mut self) {
        self.tc.source.stop_draw();
        self.tc.depth -= 1;
    }
}
