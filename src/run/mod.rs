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

//! Run state machines.
//!
//! A run aggregates one filtered view of the data and is advanced by phase:
//! the cumulative membership threshold processed so far. The
//! [`ProgressiveRun`] works over a closed, fully known dataset sorted by
//! membership; the [`StreamingRun`] works over an open set whose size and
//! arrival order are unknown, binning not-yet-due bundles by membership and
//! draining the bins as phase advances.
//!
//! Within one run, phase is monotonically non-decreasing and every bundle is
//! processed at most once. Runs are single-threaded and cooperative: they
//! poll a [`CancelToken`](crate::cancel::CancelToken) every
//! `yield_every` processed items.

mod progressive;
mod streaming;

pub use self::progressive::ProgressiveRun;
pub use self::streaming::STREAM_BINS;
pub use self::streaming::StreamingRun;

use crate::histogram::MergingHistogram;
use crate::quantile::P2QuantileSet;
use crate::snapshot::SeriesPartial;

/// Bin count for per-series merge histograms.
const SERIES_HISTOGRAM_BINS: usize = 64;

/// Per-series accumulation shared by both run kinds: running totals, the P²
/// fan-out for cheap approximate quantiles, a mergeable histogram for shard
/// merging, and the raw value buffer that backs exact quantiles at
/// completion.
///
/// The raw buffer grows with the stream. That is a deliberate tradeoff:
/// streams are session-scoped here, and dropping the buffer would forfeit
/// the exact values that replace the estimates once phase and coverage
/// reach 1.
#[derive(Debug, Clone)]
pub(crate) struct SeriesState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    p2: P2QuantileSet,
    histogram: MergingHistogram,
    raw: Vec<f64>,
}

impl SeriesState {
    pub(crate) fn new(quantiles: &[f64]) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            p2: P2QuantileSet::new(quantiles),
            histogram: MergingHistogram::new(SERIES_HISTOGRAM_BINS),
            raw: Vec::new(),
        }
    }

    pub(crate) fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.p2.update(value);
        self.histogram.push(value, 1.0);
        self.raw.push(value);
    }

    pub(crate) fn estimates(&self) -> std::collections::BTreeMap<u8, f64> {
        self.p2.estimates()
    }

    pub(crate) fn partial(&self) -> SeriesPartial {
        SeriesPartial {
            count: self.count,
            sum: self.sum,
            min: self.min,
            max: self.max,
            histogram: self.histogram.clone(),
            raw: self.raw.clone(),
        }
    }
}
