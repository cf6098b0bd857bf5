// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Biased coins and the stop-or-continue decisions of collection providers.
//!
//! A [`Coin`] is itself a provider, so every decision a [`Repeat`] makes is a
//! nested draw of the session it runs in.

use crate::data::DataSource;
use crate::errors::{DataOverflow, Failure};
use crate::providers::Provider;
use crate::test_case::TestCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    Never,
    Always,
    // True iff a `bits`-bit probe is at least `threshold`.
    Odds { bits: u64, threshold: u64 },
}

/// A coin that comes up `true` with a fixed probability.
///
/// The probability is rounded to a multiple of 2^-64 and then reduced, so a
/// fair coin reads a single bit and a quarter coin two. A probe of zero is
/// always `false`. Certain outcomes read nothing and write a forced value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coin {
    probability: f64,
    bias: Bias,
}

impl Coin {
    pub fn new(probability: f64) -> Coin {
        let truthy = (probability * (u64::MAX as f64 + 1.0)).floor();
        let bias = if probability.is_nan() || truthy < 1.0 {
            Bias::Never
        } else if probability >= 1.0 {
            Bias::Always
        } else {
            let truthy = truthy as u64;
            let shift = truthy.trailing_zeros() as u64;
            let bits = 64 - shift;
            let numerator = truthy >> shift;
            let threshold = ((1u128 << bits) - numerator as u128) as u64;
            Bias::Odds { bits, threshold }
        };
        Coin { probability, bias }
    }

    pub fn always() -> Coin {
        Coin::new(1.0)
    }

    pub fn never() -> Coin {
        Coin::new(0.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Flips the coin against raw bits, outside of any draw session.
    pub fn flip<S: DataSource + ?Sized>(&self, source: &mut S) -> Result<bool, DataOverflow> {
        match self.bias {
            Bias::Never => {
                source.write(0)?;
                Ok(false)
            }
            Bias::Always => {
                source.write(1)?;
                Ok(true)
            }
            Bias::Odds { bits, threshold } => Ok(source.bits(bits)? >= threshold),
        }
    }
}

impl Provider for Coin {
    type Value = bool;

    fn provide(&self, tc: &mut TestCase<'_>) -> Result<bool, Failure> {
        Ok(self.flip(tc.source())?)
    }
}

/// Decides, one element at a time, whether a collection keeps growing.
#[derive(Debug, Clone)]
pub struct Repeat {
    min_count: u64,
    max_count: u64,
    coin: Coin,
    count: u64,
}

impl Repeat {
    pub fn new(min_count: u64, max_count: u64, expected_count: f64) -> Repeat {
        Repeat {
            min_count,
            max_count,
            coin: Coin::new(1.0 - 1.0 / (1.0 + expected_count)),
            count: 0,
        }
    }

    /// Elements agreed to so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether to add one more element.
    ///
    /// Each decision is drawn from `tc` as a coin, forced while the count is
    /// below the minimum or at the maximum. A collection of fixed size makes
    /// no draws at all.
    pub fn should_continue(&mut self, tc: &mut TestCase<'_>) -> Result<bool, Failure> {
        if self.min_count == self.max_count {
            let more = self.count < self.max_count;
            if more {
                self.count += 1;
            }
            return Ok(more);
        }
        let coin = if self.count < self.min_count {
            Coin::always()
        } else if self.count >= self.max_count {
            Coin::never()
        } else {
            self.coin
        };
        let more = tc.draw(&coin)?;
        if more {
            self.count += 1;
        }
        Ok(more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ByteSource;
    use crate::engine::Mode;
    use crate::errors::Given;
    use crate::providers::vectors;
    use crate::world::World;

    #[test]
    fn test_fair_coin_reads_one_bit() {
        let mut source = ByteSource::from_vec(vec![0b11, 0b10]);
        let coin = Coin::new(0.5);
        assert!(coin.flip(&mut source).unwrap());
        assert!(!coin.flip(&mut source).unwrap());
        assert_eq!(source.record(), &[1, 0]);
    }

    #[test]
    fn test_quarter_coin_needs_the_top_probe() {
        let coin = Coin::new(0.25);
        let flips: Vec<bool> = (0..4)
            .map(|probe| coin.flip(&mut ByteSource::from_vec(vec![probe])).unwrap())
            .collect();
        assert_eq!(flips, vec![false, false, false, true]);
    }

    #[test]
    fn test_zero_probe_is_false_for_any_uncertain_coin() {
        for p in [0.001, 0.3, 0.5, 0.999, 1.0 - f64::EPSILON] {
            assert!(!Coin::new(p).flip(&mut ByteSource::from_vec(vec![0])).unwrap());
        }
    }

    #[test]
    fn test_certain_coins_write_forced_values() {
        let mut source = ByteSource::from_vec(vec![7, 7, 7]);
        assert!(Coin::always().flip(&mut source).unwrap());
        assert!(!Coin::never().flip(&mut source).unwrap());
        assert!(!Coin::new(f64::NAN).flip(&mut source).unwrap());
        assert_eq!(source.record(), &[1, 0, 0]);
        assert_eq!(Coin::never().flip(&mut source), Err(DataOverflow));
    }

    #[test]
    fn test_fixed_count_repeat_draws_nothing() {
        let _world = World::enter("fixed repeat", Mode::Property).unwrap();
        let mut source = ByteSource::from_vec(vec![]);
        let mut tc = TestCase::new(&mut source);
        let mut repeat = Repeat::new(3, 3, 3.0);
        let mut n = 0;
        while repeat.should_continue(&mut tc).unwrap() {
            n += 1;
        }
        assert_eq!(n, 3);
        drop(tc);
        assert!(source.record().is_empty());
    }

    #[test]
    fn test_repeat_forces_minimum_and_maximum() {
        let _world = World::enter("bounded repeat", Mode::Property).unwrap();
        // Two forced continues, one free decision that says yes, then a forced stop.
        let mut source = ByteSource::from_vec(vec![0, 0, u64::MAX, 0]);
        let mut tc = TestCase::new(&mut source);
        let mut repeat = Repeat::new(2, 3, 2.0);
        let mut n = 0;
        while repeat.should_continue(&mut tc).unwrap() {
            n += 1;
        }
        assert_eq!(n, 3);
        assert_eq!(repeat.count(), 3);
        assert_eq!(tc.depth(), 0);
        drop(tc);
        let record = source.record();
        assert_eq!(record.len(), 4);
        assert_eq!((record[0], record[1], record[3]), (1, 1, 0));
    }

    #[test]
    fn test_repeat_decisions_are_not_printed() {
        let _world = World::enter("printed repeat", Mode::Property).unwrap();
        let mut source = ByteSource::from_vec(vec![u64::MAX, 1, 0]);
        let mut tc = TestCase::printing(&mut source);
        let v = tc.draw(&vectors(Coin::new(0.5)).max_size(3)).unwrap();
        assert_eq!(v, vec![true]);
        assert_eq!(
            tc.givens().unwrap(),
            &[Given { name: "#1".to_string(), value: "[true]".to_string() }]
        );
    }
}
