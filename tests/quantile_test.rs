// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use bundlestats::quantile::P2Quantile;
use bundlestats::quantile::P2QuantileSet;
use bundlestats::quantile::percentile_key;

fn assert_relative(actual: f64, expected: f64, tolerance: f64) {
    let delta = (actual - expected).abs() / expected.abs();
    assert!(
        delta <= tolerance,
        "expected {expected} within {tolerance:.0e} relative, got {actual}"
    );
}

#[test]
#[should_panic(expected = "percentile must be in (0, 1)")]
fn test_zero_percentile_panics() {
    P2Quantile::new(0.0);
}

#[test]
#[should_panic(expected = "percentile must be in (0, 1)")]
fn test_full_percentile_panics() {
    P2Quantile::new(1.0);
}

#[test]
fn test_empty_has_no_value() {
    let estimator = P2Quantile::new(0.5);
    assert!(estimator.value().is_none());
    assert_eq!(estimator.count(), 0);
}

#[test]
fn test_below_five_samples_returns_order_statistic() {
    let mut estimator = P2Quantile::new(0.5);
    estimator.update(30.0);
    estimator.update(10.0);
    estimator.update(20.0);
    assert_eq!(estimator.value(), Some(20.0));
}

#[test]
fn test_median_of_ascending_sequence() {
    let mut estimator = P2Quantile::new(0.5);
    for i in 1..=100 {
        estimator.update(i as f64);
    }
    // True median of 1..=100 is 50.5; P2 must converge within ~5%.
    assert_relative(estimator.value().unwrap(), 50.5, 0.05);
}

#[test]
fn test_median_of_scrambled_sequence() {
    let mut estimator = P2Quantile::new(0.5);
    for i in 0..1_000u64 {
        let value = (i * 577) % 1_000;
        estimator.update(value as f64);
    }
    assert_relative(estimator.value().unwrap(), 499.5, 0.05);
}

#[test]
fn test_tail_percentile() {
    let mut estimator = P2Quantile::new(0.95);
    for i in 0..10_000u64 {
        let value = (i * 7_919) % 10_000;
        estimator.update(value as f64);
    }
    assert_relative(estimator.value().unwrap(), 9_500.0, 0.05);
}

#[test]
fn test_constant_stream() {
    let mut estimator = P2Quantile::new(0.5);
    for _ in 0..100 {
        estimator.update(7.0);
    }
    assert_eq!(estimator.value(), Some(7.0));
}

#[test]
fn test_non_finite_values_are_ignored() {
    let mut estimator = P2Quantile::new(0.5);
    estimator.update(f64::NAN);
    estimator.update(f64::INFINITY);
    assert_eq!(estimator.count(), 0);
    estimator.update(5.0);
    assert_eq!(estimator.count(), 1);
}

#[test]
fn test_set_fans_out_to_all_targets() {
    let mut set = P2QuantileSet::new(&[0.5, 0.95]);
    for i in 0..1_000u64 {
        let value = (i * 577) % 1_000;
        set.update(value as f64);
    }
    let estimates = set.estimates();
    assert_eq!(estimates.keys().copied().collect::<Vec<u8>>(), vec![50, 95]);
    assert_relative(estimates[&50], 499.5, 0.05);
    assert_relative(estimates[&95], 950.0, 0.05);
}

#[test]
fn test_percentile_key() {
    assert_eq!(percentile_key(0.5), 50);
    assert_eq!(percentile_key(0.95), 95);
    assert_eq!(percentile_key(0.999), 100);
}
