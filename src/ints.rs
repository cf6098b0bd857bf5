// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

// Integer generation on top of a data source: bounded draws, an alias-method
// table over small weight sets, and a bit-length biased signed integer.

use crate::data::DataSource;
use crate::distributions::Coin;
use crate::errors::DataOverflow;

pub fn bounded_int<S: DataSource + ?Sized>(source: &mut S, max: u64) -> Result<u64, DataOverflow> {
    let bitlength = 64 - max.leading_zeros() as u64;
    if bitlength == 0 {
        source.write(0)?;
        return Ok(0);
    }
    loop {
        let probe = source.bits(bitlength)?;
        if probe <= max {
            return Ok(probe);
        }
    }
}

/// Uniform integer in the inclusive range `[lo, hi]`. Requires `lo <= hi`.
pub fn integer_range<S: DataSource + ?Sized>(
    source: &mut S,
    lo: i64,
    hi: i64,
) -> Result<i64, DataOverflow> {
    debug_assert!(lo <= hi);
    let span = hi.wrapping_sub(lo) as u64;
    let offset = bounded_int(source, span)?;
    Ok(lo.wrapping_add(offset as i64))
}

// One column of the alias table: `primary`, unless the coin says to take
// `alternate` instead. `primary` is the lower index so a zero probe picks it.
#[derive(Debug, Clone)]
struct Column {
    primary: usize,
    alternate: usize,
    coin: Coin,
}

impl Column {
    fn whole(i: usize) -> Column {
        Column {
            primary: i,
            alternate: i,
            coin: Coin::never(),
        }
    }

    fn split(short: usize, donor: usize, p_donor: f64) -> Column {
        if donor < short {
            Column {
                primary: donor,
                alternate: short,
                coin: Coin::new(1.0 - p_donor),
            }
        } else {
            Column {
                primary: short,
                alternate: donor,
                coin: Coin::new(p_donor),
            }
        }
    }
}

/// Alias table choosing an index with probability proportional to its weight.
#[derive(Debug, Clone)]
pub struct Sampler {
    columns: Vec<Column>,
}

impl Sampler {
    /// Panics unless `weights` is non-empty with a positive sum.
    pub fn new(weights: &[f64]) -> Sampler {
        let total: f64 = weights.iter().sum();
        assert!(
            !weights.is_empty() && total > 0.0,
            "Sampler needs at least one positive weight"
        );

        let n = weights.len() as f64;
        let mut scaled: Vec<f64> = weights.iter().map(|w| w * n / total).collect();
        let (mut short, mut tall): (Vec<usize>, Vec<usize>) =
            (0..weights.len()).partition(|&i| scaled[i] < 1.0);
        // Pair the emptiest columns first, so rounding never strands a zero weight.
        short.sort_by(|&a, &b| scaled[b].total_cmp(&scaled[a]));

        let mut columns = Vec::with_capacity(weights.len());
        while let (Some(&lo), Some(&hi)) = (short.last(), tall.last()) {
            short.pop();
            tall.pop();
            let deficit = 1.0 - scaled[lo];
            columns.push(Column::split(lo, hi, deficit));
            scaled[hi] -= deficit;
            if scaled[hi] < 1.0 {
                short.push(hi);
            } else {
                tall.push(hi);
            }
        }
        columns.extend(short.into_iter().chain(tall).map(Column::whole));
        columns.sort_by_key(|c| (c.primary, c.alternate));
        Sampler { columns }
    }

    pub fn sample<S: DataSource + ?Sized>(&self, source: &mut S) -> Result<usize, DataOverflow> {
        let i = bounded_int(source, self.columns.len() as u64 - 1)? as usize;
        let column = &self.columns[i];
        if column.coin.flip(source)? {
            Ok(column.alternate)
        } else {
            Ok(column.primary)
        }
    }
}

pub fn good_bitlengths() -> Sampler {
    let weights = [
        4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, // 1 byte
        2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, // 2 bytes
        1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, // 3 bytes
        0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, // 4 bytes
        0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 5 bytes
        0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 6 bytes
        0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 7 bytes
        0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 8 bytes (last bit spare for sign)
    ];
    Sampler::new(&weights)
}

pub fn integer_from_bitlengths<S: DataSource + ?Sized>(
    source: &mut S,
    bitlengths: &Sampler,
) -> Result<i64, DataOverflow> {
    let bitlength = bitlengths.sample(source)? as u64 + 1;
    let base = source.bits(bitlength)? as i64;
    let sign = source.bits(1)?;
    if sign > 0 {
        Ok(-base)
    } else {
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ByteSource;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn random_source() -> ByteSource {
        ByteSource::from_random(ChaCha8Rng::seed_from_u64(7), 10_000)
    }

    #[test]
    fn test_bounded_int_zero_writes_placeholder() {
        let mut source = ByteSource::from_vec(vec![0]);
        assert_eq!(bounded_int(&mut source, 0).unwrap(), 0);
        assert_eq!(source.record(), &[0]);
    }

    #[test]
    fn test_bounded_int_rejects_out_of_range_probes() {
        // 10 needs four bits; 15 is masked in and rejected, 9 is kept.
        let mut source = ByteSource::from_vec(vec![15, 9]);
        assert_eq!(bounded_int(&mut source, 10).unwrap(), 9);
    }

    #[test]
    fn test_bounded_int_stays_in_range() {
        let mut source = random_source();
        for _ in 0..200 {
            assert!(bounded_int(&mut source, 37).unwrap() <= 37);
        }
    }

    #[test]
    fn test_integer_range_covers_full_width() {
        let mut source = random_source();
        for _ in 0..100 {
            let v = integer_range(&mut source, -5, 5).unwrap();
            assert!((-5..=5).contains(&v));
        }
        let v = integer_range(&mut source, i64::MIN, i64::MAX).unwrap();
        assert!((i64::MIN..=i64::MAX).contains(&v));
        assert_eq!(integer_range(&mut source, 3, 3).unwrap(), 3);
    }

    #[test]
    fn test_sampler_only_returns_positive_weight_indices() {
        let sampler = Sampler::new(&[0.0, 1.0, 0.0, 3.0]);
        let mut source = random_source();
        for _ in 0..200 {
            let i = sampler.sample(&mut source).unwrap();
            assert!(i == 1 || i == 3, "sampled {}", i);
        }
    }

    #[test]
    fn test_sampler_follows_weights() {
        let sampler = Sampler::new(&[1.0, 3.0]);
        let mut source = random_source();
        let heavy = (0..2000)
            .filter(|_| sampler.sample(&mut source).unwrap() == 1)
            .count();
        assert!((1300..1700).contains(&heavy), "index 1 drawn {} times", heavy);
    }

    #[test]
    #[should_panic(expected = "positive weight")]
    fn test_sampler_rejects_all_zero_weights() {
        Sampler::new(&[0.0, 0.0]);
    }

    #[test]
    fn test_good_bitlengths_fits_in_i64() {
        let sampler = good_bitlengths();
        let mut source = random_source();
        for _ in 0..200 {
            let i = sampler.sample(&mut source).unwrap();
            assert!(i < 63);
            integer_from_bitlengths(&mut source, &sampler).unwrap();
        }
    }

    #[test]
    fn test_exhausted_source_overflows() {
        let mut source = ByteSource::from_vec(vec![]);
        assert_eq!(bounded_int(&mut source, 100), Err(DataOverflow));
    }
}
