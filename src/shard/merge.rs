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
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::quantile::percentile_key;
use crate::snapshot::Partial;
use crate::snapshot::QuantileMap;
use crate::snapshot::SeriesPartial;
use crate::snapshot::Snapshot;
use crate::topk::Counter;

/// Merges per-shard partials into one snapshot.
///
/// The merged phase is the minimum across shards (the weakest shard bounds
/// completeness) and the rescale denominator uses the orchestrator-level
/// received/expected accounting. Series totals are summed raw first and
/// scaled once, avoiding compounding bias; facet candidate lists are
/// union-summed by value before the final sort-and-truncate; quantile
/// estimates come from merged histograms.
///
/// Facet merging is approximate: a value that is moderately frequent in
/// every shard but never locally heavy enough for any shard's oversampled
/// candidate list is undercounted. Carrying full candidate lists (not
/// pre-truncated top-k) bounds, but does not eliminate, that error.
pub fn merge_partials(
    partials: &[Partial],
    received: u64,
    expected: u64,
    config: &EngineConfig,
) -> Snapshot {
    let phase = partials
        .iter()
        .map(|partial| partial.phase)
        .fold(f64::INFINITY, f64::min);
    let phase = if phase.is_finite() { phase } else { 0.0 };

    let mut series: BTreeMap<String, SeriesPartial> = BTreeMap::new();
    let mut bundles = 0u64;
    for partial in partials {
        bundles += partial.bundles;
        for (name, shard_series) in &partial.series {
            match series.get_mut(name) {
                Some(merged) => {
                    merged.count += shard_series.count;
                    merged.sum += shard_series.sum;
                    merged.min = merged.min.min(shard_series.min);
                    merged.max = merged.max.max(shard_series.max);
                    merged.histogram.merge(&shard_series.histogram);
                    merged.raw.extend_from_slice(&shard_series.raw);
                }
                None => {
                    series.insert(name.clone(), shard_series.clone());
                }
            }
        }
    }

    let mut facets: BTreeMap<String, Vec<Counter>> = BTreeMap::new();
    for partial in partials {
        for (name, candidates) in &partial.facets {
            let merged = facets.entry(name.clone()).or_default();
            union_counters(merged, candidates);
        }
    }
    for candidates in facets.values_mut() {
        candidates.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.key().cmp(b.key()))
        });
    }

    let approx: BTreeMap<String, QuantileMap> = series
        .iter()
        .filter_map(|(name, merged)| {
            merged.histogram.values(&config.quantiles).map(|values| {
                let map: QuantileMap = config
                    .quantiles
                    .iter()
                    .zip(values)
                    .map(|(p, v)| (percentile_key(*p), v))
                    .collect();
                (name.clone(), map)
            })
        })
        .collect();

    let merged = Partial {
        phase,
        received,
        expected,
        bundles,
        series,
        facets,
    };
    Snapshot::render(&merged, config, approx)
}

fn union_counters(into: &mut Vec<Counter>, from: &[Counter]) {
    let mut index: HashMap<String, usize> = into
        .iter()
        .enumerate()
        .map(|(i, counter)| (counter.key().to_string(), i))
        .collect();
    for counter in from {
        match index.get(counter.key()) {
            Some(position) => {
                let (key, score, count, err) = into[*position].clone().into_parts();
                into[*position] = Counter::from_parts(
                    key,
                    score + counter.score(),
                    count + counter.count(),
                    err + counter.err(),
                );
            }
            None => {
                index.insert(counter.key().to_string(), into.len());
                into.push(counter.clone());
            }
        }
    }
}
