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

use std::collections::BTreeMap;

const MARKERS: usize = 5;

/// P² estimator for a single target percentile.
///
/// The first five pushed values are buffered and sorted to seed the marker
/// heights and positions. Every later push locates the marker cell containing
/// the new value, shifts the downstream position counters, moves the desired
/// positions by their fixed increments, and nudges the three interior marker
/// heights by piecewise-parabolic interpolation, falling back to linear
/// interpolation whenever the parabolic estimate would break monotonicity.
#[derive(Debug, Clone)]
pub struct P2Quantile {
    percentile: f64,
    heights: [f64; MARKERS],
    positions: [f64; MARKERS],
    desired: [f64; MARKERS],
    increments: [f64; MARKERS],
    seed: Vec<f64>,
    count: u64,
}

impl P2Quantile {
    /// Creates an estimator for the given target percentile.
    ///
    /// # Panics
    ///
    /// Panics if `percentile` is not in the open interval (0, 1).
    pub fn new(percentile: f64) -> Self {
        assert!(
            percentile > 0.0 && percentile < 1.0,
            "percentile must be in (0, 1)"
        );
        let p = percentile;
        Self {
            percentile,
            heights: [0.0; MARKERS],
            positions: [0.0; MARKERS],
            desired: [0.0; MARKERS],
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
            seed: Vec::with_capacity(MARKERS),
            count: 0,
        }
    }

    /// Returns the target percentile.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Returns the number of values pushed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Pushes one observation.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        if self.count <= MARKERS as u64 {
            self.seed.push(value);
            if self.count == MARKERS as u64 {
                self.seed.sort_by(|a, b| a.total_cmp(b));
                for i in 0..MARKERS {
                    self.heights[i] = self.seed[i];
                    self.positions[i] = (i + 1) as f64;
                }
                let p = self.percentile;
                self.desired = [
                    1.0,
                    1.0 + 2.0 * p,
                    1.0 + 4.0 * p,
                    3.0 + 2.0 * p,
                    5.0,
                ];
            }
            return;
        }

        // Locate the cell containing the new value, extending the extremes.
        let k = if value < self.heights[0] {
            self.heights[0] = value;
            0
        } else if value >= self.heights[MARKERS - 1] {
            self.heights[MARKERS - 1] = value;
            MARKERS - 2
        } else {
            let mut cell = 0;
            for i in 1..MARKERS - 1 {
                if self.heights[i] <= value {
                    cell = i;
                }
            }
            cell
        };

        for position in self.positions.iter_mut().skip(k + 1) {
            *position += 1.0;
        }
        for i in 0..MARKERS {
            self.desired[i] += self.increments[i];
        }

        for i in 1..MARKERS - 1 {
            let delta = self.desired[i] - self.positions[i];
            let step_up = delta >= 1.0 && self.positions[i + 1] - self.positions[i] > 1.0;
            let step_down = delta <= -1.0 && self.positions[i - 1] - self.positions[i] < -1.0;
            if !(step_up || step_down) {
                continue;
            }
            let d = delta.signum();
            let parabolic = self.parabolic(i, d);
            if self.heights[i - 1] < parabolic && parabolic < self.heights[i + 1] {
                self.heights[i] = parabolic;
            } else {
                self.heights[i] = self.linear(i, d);
            }
            self.positions[i] += d;
        }
    }

    /// Returns the current estimate, or the nearest order statistic while
    /// fewer than five values have been pushed. `None` before any push.
    pub fn value(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        if self.count < MARKERS as u64 {
            let mut sorted = self.seed.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let index = ((sorted.len() - 1) as f64 * self.percentile).round() as usize;
            return Some(sorted[index]);
        }
        Some(self.heights[MARKERS / 2])
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let n = &self.positions;
        let q = &self.heights;
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = (i as f64 + d) as usize;
        self.heights[i]
            + d * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }
}

/// Fans one observation stream out to several independent P² targets.
#[derive(Debug, Clone)]
pub struct P2QuantileSet {
    targets: Vec<P2Quantile>,
}

impl P2QuantileSet {
    /// Creates one estimator per target percentile.
    ///
    /// # Panics
    ///
    /// Panics if any percentile is not in (0, 1).
    pub fn new(percentiles: &[f64]) -> Self {
        Self {
            targets: percentiles.iter().map(|p| P2Quantile::new(*p)).collect(),
        }
    }

    /// Pushes one observation into every target.
    pub fn update(&mut self, value: f64) {
        for target in &mut self.targets {
            target.update(value);
        }
    }

    /// Returns `{integer percentile -> estimate}` for targets with data.
    pub fn estimates(&self) -> BTreeMap<u8, f64> {
        self.targets
            .iter()
            .filter_map(|t| t.value().map(|v| (percentile_key(t.percentile()), v)))
            .collect()
    }
}

/// Maps a fractional percentile to its integer wire key, e.g. `0.5 -> 50`.
pub fn percentile_key(percentile: f64) -> u8 {
    (percentile * 100.0).round() as u8
}
