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

//! Externally visible summary state.
//!
//! A [`Snapshot`] is what callers see: totals and facet weights are rescaled
//! by `1 / (phase * coverage)` while a run is incomplete, and exact values
//! replace the estimates once phase and coverage both reach 1. The raw
//! un-rescaled aggregates travel between shard workers and the merge as a
//! [`Partial`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::histogram::MergingHistogram;
use crate::quantile::percentile_key;
use crate::topk::Counter;

pub(crate) const COMPLETE_EPS: f64 = 1e-9;

/// Processed-bundle counts, raw and rescaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    /// Bundles processed so far.
    pub bundles: u64,
    /// Estimated bundle count for the full dataset.
    pub estimated: f64,
}

/// Running aggregate for one numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTotals {
    pub count: f64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: f64,
}

/// One reported facet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRow {
    pub value: String,
    pub count: f64,
    pub weight: f64,
}

/// Upstream delivery accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingestion {
    pub received: u64,
    pub expected: u64,
    pub coverage: f64,
}

/// Quantile estimates keyed by integer percentile, e.g. `{50: 1234.0}`.
pub type QuantileMap = BTreeMap<u8, f64>;

/// Externally visible summary of current aggregate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: f64,
    pub counts: Counts,
    /// Rescaled totals per series.
    pub totals: BTreeMap<String, SeriesTotals>,
    /// Raw (sample) totals per series.
    pub sample_totals: BTreeMap<String, SeriesTotals>,
    /// Quantile estimates per series; exact once `exact` is true.
    pub quantiles: BTreeMap<String, QuantileMap>,
    /// True once phase = 1 and coverage = 1.
    pub exact: bool,
    /// Top-K rows per facet, descending by weight.
    pub facets: BTreeMap<String, Vec<FacetRow>>,
    pub ingestion: Ingestion,
}

/// Raw per-series aggregate inside one run or shard.
#[derive(Debug, Clone)]
pub struct SeriesPartial {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub histogram: MergingHistogram,
    pub raw: Vec<f64>,
}

/// Un-rescaled aggregate state of one run, the unit of shard merging.
#[derive(Debug, Clone)]
pub struct Partial {
    pub phase: f64,
    pub received: u64,
    pub expected: u64,
    pub bundles: u64,
    pub series: BTreeMap<String, SeriesPartial>,
    /// Full candidate lists per facet, descending by score. Truncation to
    /// the final Top-K happens only at render time, after any merging.
    pub facets: BTreeMap<String, Vec<Counter>>,
}

/// Delivery coverage for the given accounting, 1.0 when nothing was
/// expected.
pub(crate) fn coverage_of(received: u64, expected: u64) -> f64 {
    if expected == 0 {
        1.0
    } else {
        (received as f64 / expected as f64).min(1.0)
    }
}

/// Order statistics over an already-sorted slice of raw values.
pub(crate) fn exact_quantiles(sorted: &[f64], percentiles: &[f64]) -> QuantileMap {
    let mut out = QuantileMap::new();
    if sorted.is_empty() {
        return out;
    }
    for percentile in percentiles {
        let index = ((sorted.len() - 1) as f64 * percentile).round() as usize;
        out.insert(percentile_key(*percentile), sorted[index]);
    }
    out
}

pub(crate) fn totals_pair(partial: &SeriesPartial, denom: f64) -> (SeriesTotals, SeriesTotals) {
    let has_data = partial.count > 0;
    let raw = SeriesTotals {
        count: partial.count as f64,
        sum: partial.sum,
        min: has_data.then_some(partial.min),
        max: has_data.then_some(partial.max),
        mean: if has_data {
            partial.sum / partial.count as f64
        } else {
            0.0
        },
    };
    let mut rescaled = raw.clone();
    if denom > 0.0 {
        rescaled.count = raw.count / denom;
        rescaled.sum = raw.sum / denom;
    }
    (rescaled, raw)
}

pub(crate) fn facet_rows(candidates: &[Counter], k: usize, denom: f64) -> Vec<FacetRow> {
    let scale = if denom > 0.0 { 1.0 / denom } else { 1.0 };
    candidates
        .iter()
        .take(k)
        .map(|counter| FacetRow {
            value: counter.key().to_string(),
            count: counter.count() as f64 * scale,
            weight: counter.score() * scale,
        })
        .collect()
}

impl Snapshot {
    /// Renders a partial into the caller-visible shape.
    ///
    /// `approx_quantiles` supplies the estimates used while incomplete: P²
    /// values for a single run, histogram values for a merged group. At
    /// phase = 1 and coverage = 1 they are replaced by exact order
    /// statistics over the buffered raw values.
    pub(crate) fn render(
        partial: &Partial,
        config: &EngineConfig,
        approx_quantiles: BTreeMap<String, QuantileMap>,
    ) -> Snapshot {
        let coverage = coverage_of(partial.received, partial.expected);
        let denom = partial.phase * coverage;
        let exact = partial.phase >= 1.0 - COMPLETE_EPS && coverage >= 1.0 - COMPLETE_EPS;

        let mut totals = BTreeMap::new();
        let mut sample_totals = BTreeMap::new();
        let mut quantiles = approx_quantiles;
        for (name, series) in &partial.series {
            let (rescaled, raw) = totals_pair(series, if exact { 1.0 } else { denom });
            totals.insert(name.clone(), rescaled);
            sample_totals.insert(name.clone(), raw);
            if exact {
                let mut sorted = series.raw.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                quantiles.insert(name.clone(), exact_quantiles(&sorted, &config.quantiles));
            }
        }

        let mut facets = BTreeMap::new();
        for (name, candidates) in &partial.facets {
            let k = config.top_k_for(name);
            facets.insert(
                name.clone(),
                facet_rows(candidates, k, if exact { 1.0 } else { denom }),
            );
        }

        Snapshot {
            phase: partial.phase,
            counts: Counts {
                bundles: partial.bundles,
                estimated: if exact || denom <= 0.0 {
                    partial.bundles as f64
                } else {
                    partial.bundles as f64 / denom
                },
            },
            totals,
            sample_totals,
            quantiles,
            exact,
            facets,
            ingestion: Ingestion {
                received: partial.received,
                expected: partial.expected,
                coverage,
            },
        }
    }
}
