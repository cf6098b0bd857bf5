// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The backend draw primitive and the reference data source built on it.
//!
//! Every value a test draws is ultimately built from calls to
//! [`DataSource::bits`]. A backend hands out one data source per trial and
//! gets it back, together with a [`Status`], once the trial is over.

use std::cmp::Ordering;

use rand::RngCore;
use rand_chacha::ChaCha8Rng;

use crate::errors::DataOverflow;

pub type DataStream = Vec<u64>;
pub type DataStreamSlice = [u64];

/// Budgeted source of raw bits for a single trial.
pub trait DataSource {
    /// Draw `n_bits` (at most 64) uniformly chosen bits.
    fn bits(&mut self, n_bits: u64) -> Result<u64, DataOverflow>;

    /// Record a value that was chosen without consulting the source.
    fn write(&mut self, value: u64) -> Result<(), DataOverflow>;

    /// Marks the start of a (possibly nested) draw.
    fn start_draw(&mut self) {}

    /// Marks the end of the innermost open draw.
    fn stop_draw(&mut self) {}
}

impl<S: DataSource + ?Sized> DataSource for &mut S {
    fn bits(&mut self, n_bits: u64) -> Result<u64, DataOverflow> {
        (**self).bits(n_bits)
    }

    fn write(&mut self, value: u64) -> Result<(), DataOverflow> {
        (**self).write(value)
    }

    fn start_draw(&mut self) {
        (**self).start_draw()
    }

    fn stop_draw(&mut self) {
        (**self).stop_draw()
    }
}

#[derive(Debug, Clone)]
enum BitGenerator {
    Random(ChaCha8Rng),
    Recorded(DataStream),
}

/// Data source that either generates fresh words or replays a recorded
/// stream, and records everything it hands out.
#[derive(Debug, Clone)]
pub struct ByteSource {
    bitgenerator: BitGenerator,
    record: DataStream,
    depth: usize,
    max_length: usize,
}

impl ByteSource {
    fn new(generator: BitGenerator, max_length: usize) -> ByteSource {
        ByteSource {
            bitgenerator: generator,
            record: DataStream::new(),
            depth: 0,
            max_length,
        }
    }

    /// Fresh data from `random`, at most `max_length` words of it.
    pub fn from_random(random: ChaCha8Rng, max_length: usize) -> ByteSource {
        ByteSource::new(BitGenerator::Random(random), max_length)
    }

    /// Replays `record`; overflows once it is used up.
    pub fn from_vec(record: DataStream) -> ByteSource {
        let max_length = record.len();
        ByteSource::new(BitGenerator::Recorded(record), max_length)
    }

    pub fn record(&self) -> &DataStreamSlice {
        &self.record
    }

    /// Number of draws currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn exhausted(&self) -> bool {
        self.record.len() >= self.max_length
    }

    pub fn into_result(self, status: Status) -> TestResult {
        debug_assert_eq!(self.depth, 0, "trial finished with open draws");
        TestResult {
            record: self.record,
            status,
        }
    }
}

impl DataSource for ByteSource {
    fn bits(&mut self, n_bits: u64) -> Result<u64, DataOverflow> {
        debug_assert!(n_bits <= 64);
        if self.exhausted() {
            return Err(DataOverflow);
        }
        let mut result = match self.bitgenerator {
            BitGenerator::Random(ref mut random) => random.next_u64(),
            BitGenerator::Recorded(ref v) => v[self.record.len()],
        };

        if n_bits < 64 {
            let mask = (1 << n_bits) - 1;
            result &= mask;
        };

        self.record.push(result);

        Ok(result)
    }

    fn write(&mut self, value: u64) -> Result<(), DataOverflow> {
        if self.exhausted() {
            return Err(DataOverflow);
        }
        self.record.push(value);
        Ok(())
    }

    fn start_draw(&mut self) {
        self.depth += 1;
    }

    fn stop_draw(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

// Status indicates the result that we got from completing
// a single test execution.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Status {
    // The test tried to read more data than we had for it.
    Overflow,

    // Some important precondition of the test was not
    // satisfied.
    Invalid,

    // This test ran successfully to completion without
    // anything of note happening.
    Valid,

    // This was an interesting test execution! Usually this
    // means failing, but for find it means satisfying. The
    // label tells distinct failures apart.
    Interesting(u64),
}

// Once a data source is finished it "decays" to a
// TestResult, that retains a trace of all the information
// we needed from the ByteSource.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub record: DataStream,
    pub status: Status,
}

impl Ord for TestResult {
    fn cmp(&self, other: &TestResult) -> Ordering {
        self.record
            .len()
            .cmp(&other.record.len())
            .then(self.record.cmp(&other.record))
    }
}

impl PartialOrd for TestResult {
    fn partial_cmp(&self, other: &TestResult) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TestResult {
    fn eq(&self, other: &TestResult) -> bool {
        self.record == other.record
    }
}

impl Eq for TestResult {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_recorded_source_masks_and_overflows() {
        let mut source = ByteSource::from_vec(vec![0xFFFF, 7]);
        assert_eq!(source.bits(8).unwrap(), 0xFF);
        assert_eq!(source.bits(64).unwrap(), 7);
        assert_eq!(source.bits(1), Err(DataOverflow));
        assert_eq!(source.record(), &[0xFF, 7]);
    }

    #[test]
    fn test_random_source_respects_budget() {
        let mut source = ByteSource::from_random(ChaCha8Rng::seed_from_u64(0), 3);
        for _ in 0..3 {
            assert!(source.bits(16).unwrap() < 1 << 16);
        }
        assert_eq!(source.bits(16), Err(DataOverflow));
        assert_eq!(source.write(0), Err(DataOverflow));
    }

    #[test]
    fn test_random_sources_with_same_seed_agree() {
        let mut a = ByteSource::from_random(ChaCha8Rng::seed_from_u64(42), 16);
        let mut b = ByteSource::from_random(ChaCha8Rng::seed_from_u64(42), 16);
        for _ in 0..16 {
            assert_eq!(a.bits(64).unwrap(), b.bits(64).unwrap());
        }
    }

    #[test]
    fn test_write_is_recorded_verbatim() {
        let mut source = ByteSource::from_vec(vec![9, 9]);
        source.write(1).unwrap();
        assert_eq!(source.bits(64).unwrap(), 9);
        assert_eq!(source.record(), &[1, 9]);
    }

    #[test]
    fn test_draw_depth_tracks_nesting() {
        let mut source = ByteSource::from_vec(vec![1, 2, 3]);
        source.start_draw();
        source.bits(8).unwrap();
        source.start_draw();
        assert_eq!(source.depth(), 2);
        source.stop_draw();
        source.stop_draw();
        assert_eq!(source.depth(), 0);
        source.stop_draw();
        assert_eq!(source.depth(), 0);
        assert_eq!(source.into_result(Status::Valid).record, vec![1]);
    }

    #[test]
    fn test_results_order_by_length_then_contents() {
        let short = TestResult { record: vec![5], status: Status::Valid };
        let long = TestResult { record: vec![0, 0], status: Status::Valid };
        let smaller = TestResult { record: vec![4], status: Status::Invalid };
        assert!(short < long);
        assert!(smaller < short);
        assert_eq!(short.clone(), TestResult { status: Status::Overflow, ..short });
    }
}
