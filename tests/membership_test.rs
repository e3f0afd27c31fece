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

use std::collections::HashSet;

use bundlestats::hash::membership;

const THRESHOLDS: [f64; 4] = [0.01, 0.1, 0.5, 1.0];

fn sample_ids(threshold: f64, population: usize) -> HashSet<String> {
    (0..population)
        .map(|i| format!("bundle-{i}"))
        .filter(|id| membership(id) < threshold)
        .collect()
}

#[test]
fn test_nested_subset_across_thresholds() {
    let population = 2_000;
    for window in THRESHOLDS.windows(2) {
        let smaller = sample_ids(window[0], population);
        let larger = sample_ids(window[1], population);
        assert!(
            smaller.is_subset(&larger),
            "sample at {} is not nested in sample at {}",
            window[0],
            window[1]
        );
    }
}

#[test]
fn test_sample_fraction_tracks_threshold() {
    let population = 2_000;
    for threshold in [0.1, 0.25, 0.5] {
        let fraction = sample_ids(threshold, population).len() as f64 / population as f64;
        assert!(
            (fraction - threshold).abs() < 0.05,
            "fraction {fraction} far from threshold {threshold}"
        );
    }
}

#[test]
fn test_full_threshold_covers_everything() {
    let population = 500;
    assert_eq!(sample_ids(1.0, population).len(), population);
}

#[test]
fn test_stable_across_repeated_evaluation() {
    for i in 0..100 {
        let id = format!("page-view-{i}");
        let first = membership(&id);
        let second = membership(&id);
        assert_eq!(first, second);
    }
}
