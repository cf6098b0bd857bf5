// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Value sources consulted by a [`TestCase`].
//!
//! A provider either turns raw bits from the session's data source into a
//! typed value, or composes other providers by drawing from the same session.
//! Composite draws happen at depth one or more, so only the composed value is
//! recorded when a failing example is replayed.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::distributions::{Coin, Repeat};
use crate::errors::Failure;
use crate::ints::{self, Sampler};
use crate::test_case::TestCase;

/// Number of rejected values after which a filter gives up on the trial.
pub const MAX_FILTER_ATTEMPTS: usize = 10_000;

pub trait Provider {
    type Value;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<Self::Value, Failure>;
}

impl<P: Provider + ?Sized> Provider for &P {
    type Value = P::Value;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<P::Value, Failure> {
        (**self).provide(tc)
    }
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    type Value = P::Value;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<P::Value, Failure> {
        (**self).provide(tc)
    }
}

/// Adapters available on every provider.
pub trait ProviderExt: Provider + Sized {
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Value) -> U,
    {
        Map { inner: self, f }
    }

    /// Keeps drawing until `predicate` accepts a value. A predicate that
    /// never holds runs the trial out of data.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: Fn(&Self::Value) -> bool,
    {
        Filter {
            inner: self,
            predicate,
        }
    }

    fn boxed<'p>(self) -> Box<dyn Provider<Value = Self::Value> + 'p>
    where
        Self: 'p,
    {
        Box::new(self)
    }
}

impl<P: Provider> ProviderExt for P {}

#[derive(Debug, Clone)]
pub struct Map<P, F> {
    inner: P,
    f: F,
}

impl<U, P, F> Provider for Map<P, F>
where
    P: Provider,
    F: Fn(P::Value) -> U,
{
    type Value = U;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<U, Failure> {
        let value = self.inner.provide(tc)?;
        Ok((self.f)(value))
    }
}

#[derive(Debug, Clone)]
pub struct Filter<P, F> {
    inner: P,
    predicate: F,
}

impl<P, F> Provider for Filter<P, F>
where
    P: Provider,
    P::Value: Clone + Debug + 'static,
    F: Fn(&P::Value) -> bool,
{
    type Value = P::Value;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<P::Value, Failure> {
        for _ in 0..MAX_FILTER_ATTEMPTS {
            let value = tc.draw(&self.inner)?;
            if (self.predicate)(&value) {
                return Ok(value);
            }
        }
        Err(Failure::Overflow)
    }
}

/// Signed integers biased towards small bit lengths.
#[derive(Debug, Clone)]
pub struct Integers {
    bitlengths: Sampler,
}

pub fn integers() -> Integers {
    Integers {
        bitlengths: ints::good_bitlengths(),
    }
}

impl Provider for Integers {
    type Value = i64;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<i64, Failure> {
        Ok(ints::integer_from_bitlengths(tc.source(), &self.bitlengths)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedIntegers {
    max: u64,
}

/// Uniform integers in `[0, max]`.
pub fn bounded_integers(max: u64) -> BoundedIntegers {
    BoundedIntegers { max }
}

impl Provider for BoundedIntegers {
    type Value = u64;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<u64, Failure> {
        Ok(ints::bounded_int(tc.source(), self.max)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntegerRange {
    lo: i64,
    hi: i64,
}

/// Uniform integers in `[lo, hi]`.
pub fn integer_range(lo: i64, hi: i64) -> IntegerRange {
    IntegerRange { lo, hi }
}

impl Provider for IntegerRange {
    type Value = i64;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<i64, Failure> {
        if self.lo > self.hi {
            return Err(Failure::usage(format!(
                "Empty integer range [{}, {}]",
                self.lo, self.hi
            )));
        }
        Ok(ints::integer_range(tc.source(), self.lo, self.hi)?)
    }
}

/// Fair booleans.
pub fn booleans() -> Coin {
    Coin::new(0.5)
}

/// Booleans that are `true` with the given probability, clamped to `[0, 1]`.
pub fn biased_booleans(probability: f64) -> Coin {
    Coin::new(probability)
}

#[derive(Debug, Clone)]
pub struct Just<T> {
    value: T,
}

/// Always `value`; consumes no data.
pub fn just<T: Clone>(value: T) -> Just<T> {
    Just { value }
}

impl<T: Clone> Provider for Just<T> {
    type Value = T;

    fn provide(&self, _tc: &mut TestCase<'_>) -> Result<T, Failure> {
        Ok(self.value.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ElementOf<T> {
    elements: Vec<T>,
}

/// A uniformly chosen element of `elements`. Rejects the trial when empty.
pub fn element_of<T: Clone>(elements: Vec<T>) -> ElementOf<T> {
    ElementOf { elements }
}

impl<T: Clone> Provider for ElementOf<T> {
    type Value = T;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<T, Failure> {
        if self.elements.is_empty() {
            return Err(Failure::Reject);
        }
        let i = ints::bounded_int(tc.source(), self.elements.len() as u64 - 1)? as usize;
        Ok(self.elements[i].clone())
    }
}

#[derive(Debug, Clone)]
pub struct Vectors<P> {
    elements: P,
    min_size: usize,
    max_size: usize,
    average_size: Option<f64>,
}

/// Vectors whose elements are drawn from `elements`.
pub fn vectors<P: Provider>(elements: P) -> Vectors<P> {
    Vectors {
        elements,
        min_size: 0,
        max_size: usize::MAX,
        average_size: None,
    }
}

impl<P> Vectors<P> {
    pub fn min_size(mut self, min_size: usize) -> Vectors<P> {
        self.min_size = min_size;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Vectors<P> {
        self.max_size = max_size;
        self
    }

    pub fn average_size(mut self, average_size: f64) -> Vectors<P> {
        self.average_size = Some(average_size);
        self
    }

    fn expected_size(&self) -> f64 {
        let min = self.min_size as f64;
        let max = self.max_size as f64;
        let average = self
            .average_size
            .unwrap_or_else(|| (min * 2.0).max(min + 5.0).min(0.5 * (min + max)));
        average.max(min).min(max)
    }
}

impl<P> Provider for Vectors<P>
where
    P: Provider,
    P::Value: Clone + Debug + 'static,
{
    type Value = Vec<P::Value>;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<Vec<P::Value>, Failure> {
        if self.min_size > self.max_size {
            return Err(Failure::usage(format!(
                "min_size {} is larger than max_size {}",
                self.min_size, self.max_size
            )));
        }
        let mut repeat = Repeat::new(
            self.min_size as u64,
            self.max_size as u64,
            self.expected_size(),
        );
        let mut result = Vec::new();
        while repeat.should_continue(tc)? {
            result.push(tc.draw(&self.elements)?);
        }
        Ok(result)
    }
}

/// Provider backed by a function that draws from the session itself.
pub struct FromFn<F, T> {
    f: F,
    _value: PhantomData<fn() -> T>,
}

pub fn from_fn<T, F>(f: F) -> FromFn<F, T>
where
    F: Fn(&mut TestCase<'_>) -> Result<T, Failure>,
{
    FromFn {
        f,
        _value: PhantomData,
    }
}

impl<F, T> Provider for FromFn<F, T>
where
    F: Fn(&mut TestCase<'_>) -> Result<T, Failure>,
{
    type Value = T;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<T, Failure> {
        (self.f)(tc)
    }
}
