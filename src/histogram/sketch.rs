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

/// Fixed bin-count linear histogram with range-union merging.
#[derive(Debug, Clone, PartialEq)]
pub struct MergingHistogram {
    bins: Vec<f64>,
    min: f64,
    max: f64,
    total: f64,
}

impl MergingHistogram {
    /// Creates a histogram with the given number of bins.
    ///
    /// # Panics
    ///
    /// Panics if `bin_count` is less than 2.
    pub fn new(bin_count: usize) -> Self {
        assert!(bin_count >= 2, "bin_count must be at least 2");
        Self {
            bins: vec![0.0; bin_count],
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            total: 0.0,
        }
    }

    /// Returns the number of bins.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Returns true if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.total == 0.0
    }

    /// Returns the total pushed weight.
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Returns the covered value range, or `None` while empty.
    pub fn range(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            None
        } else {
            Some((self.min, self.max))
        }
    }

    /// Pushes one value with the given weight, expanding the range first if
    /// the value falls outside it.
    pub fn push(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || weight <= 0.0 {
            return;
        }
        if self.is_empty() {
            self.min = value;
            self.max = value;
        } else if value < self.min || value > self.max {
            self.rebin(self.min.min(value), self.max.max(value));
        }
        let index = self.bin_index(value);
        self.bins[index] += weight;
        self.total += weight;
    }

    /// Merges another histogram by expanding to the union range and folding
    /// the other's bin centers into this layout.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        if other.min < self.min || other.max > self.max {
            self.rebin(self.min.min(other.min), self.max.max(other.max));
        }
        for (i, weight) in other.bins.iter().enumerate() {
            if *weight > 0.0 {
                let center = other.bin_center(i);
                let index = self.bin_index(center);
                self.bins[index] += weight;
                self.total += weight;
            }
        }
    }

    /// Returns the bin-center value at each percentile, via a single forward
    /// scan of cumulative weight. `None` while empty.
    pub fn values(&self, percentiles: &[f64]) -> Option<Vec<f64>> {
        if self.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(percentiles.len());
        for percentile in percentiles {
            let target = percentile.clamp(0.0, 1.0) * self.total;
            let mut cumulative = 0.0;
            let mut found = self.bin_center(self.bins.len() - 1);
            for (i, weight) in self.bins.iter().enumerate() {
                cumulative += weight;
                if cumulative >= target && *weight > 0.0 {
                    found = self.bin_center(i);
                    break;
                }
            }
            out.push(found);
        }
        Some(out)
    }

    fn bin_index(&self, value: f64) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        let position = (value - self.min) / span * self.bins.len() as f64;
        (position as usize).min(self.bins.len() - 1)
    }

    fn bin_center(&self, index: usize) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return self.min;
        }
        self.min + (index as f64 + 0.5) * span / self.bins.len() as f64
    }

    /// Reallocates the bins over an expanded range, redistributing existing
    /// weight by remapping each old bin's center into the new layout.
    fn rebin(&mut self, new_min: f64, new_max: f64) {
        let bin_count = self.bins.len();
        let old_bins = std::mem::replace(&mut self.bins, vec![0.0; bin_count]);
        let old = Self {
            bins: old_bins,
            min: self.min,
            max: self.max,
            total: self.total,
        };
        self.min = new_min;
        self.max = new_max;
        for (i, weight) in old.bins.iter().enumerate() {
            if *weight > 0.0 {
                let index = self.bin_index(old.bin_center(i));
                self.bins[index] += weight;
            }
        }
    }
}
