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
use std::collections::HashSet;

use log::debug;

use crate::bundle::Bundle;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::extract::ExtractorRegistry;
use crate::filter::FilterSpec;
use crate::filter::filter_bundles;
use crate::hash::membership;
use crate::run::SeriesState;
use crate::snapshot::COMPLETE_EPS;
use crate::snapshot::Partial;
use crate::snapshot::Snapshot;
use crate::topk::Counter;
use crate::topk::SpaceSaving;
use crate::topk::candidate_capacity;

/// Closed-set run over a fully known, pre-sorted bundle list.
///
/// Construction evaluates the filter once over the whole dataset, computes
/// membership per surviving bundle, and sorts ascending by membership.
/// `advance_to` then moves a cursor forward and folds the delta range into
/// the per-series and per-facet state. Terminal once phase reaches 1.
#[derive(Debug)]
pub struct ProgressiveRun {
    config: EngineConfig,
    registry: ExtractorRegistry,
    items: Vec<(f64, Bundle)>,
    cursor: usize,
    phase: f64,
    bundles: u64,
    series: BTreeMap<String, SeriesState>,
    facets: BTreeMap<String, SpaceSaving>,
    since_yield: usize,
}

impl ProgressiveRun {
    /// Creates a run over the dataset, filtered and sorted by membership.
    pub fn new(
        dataset: &[Bundle],
        filter: Option<&FilterSpec>,
        config: &EngineConfig,
        registry: &ExtractorRegistry,
    ) -> Result<Self, Error> {
        let kept = filter_bundles(dataset.to_vec(), filter, config, registry)?;
        let mut items: Vec<(f64, Bundle)> = kept
            .into_iter()
            .map(|bundle| (membership(&bundle.id), bundle))
            .collect();
        items.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        let series = config
            .series
            .iter()
            .map(|name| (name.clone(), SeriesState::new(&config.quantiles)))
            .collect();
        let facets = config
            .facets
            .iter()
            .map(|name| {
                let capacity = candidate_capacity(config.top_k_for(name));
                (name.clone(), SpaceSaving::new(capacity))
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            registry: registry.clone(),
            items,
            cursor: 0,
            phase: 0.0,
            bundles: 0,
            series,
            facets,
            since_yield: 0,
        })
    }

    /// Returns the current phase.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Returns true once phase has reached 1.
    pub fn is_complete(&self) -> bool {
        self.phase >= 1.0 - COMPLETE_EPS
    }

    /// Returns the number of bundles that survived the filter.
    pub fn population(&self) -> usize {
        self.items.len()
    }

    /// Advances to a strictly larger phase in (current, 1], processing every
    /// bundle whose membership falls inside the delta range.
    pub fn advance_to(&mut self, phase: f64, cancel: &CancelToken) -> Result<(), Error> {
        if self.is_complete() {
            return Err(Error::new(
                ErrorKind::RunComplete,
                "run is terminal at phase 1",
            ));
        }
        if phase <= self.phase || phase > 1.0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "phase must be greater than the current phase and at most 1",
            )
            .with_context("current", self.phase)
            .with_context("requested", phase));
        }

        let target = self.items.partition_point(|(m, _)| *m < phase);
        for index in self.cursor..target {
            self.maybe_yield(cancel)?;
            let (_, bundle) = &self.items[index];
            let weight = bundle.weight;
            for name in &self.config.series {
                if let Some(value) = self.registry.series_value(name, bundle) {
                    if let Some(state) = self.series.get_mut(name) {
                        state.update(value);
                    }
                }
            }
            for name in &self.config.facets {
                let values = self.registry.facet_values(name, bundle);
                if let Some(sketch) = self.facets.get_mut(name) {
                    for value in values.iter() {
                        sketch.offer(value, weight);
                    }
                }
            }
            self.bundles += 1;
        }
        debug!(
            "progressive advance: phase {:.3} -> {:.3}, processed {}",
            self.phase,
            phase,
            target - self.cursor
        );
        self.cursor = target;
        self.phase = phase;
        Ok(())
    }

    /// Renders the current state.
    ///
    /// Facet rows are produced in two passes: the Space-Saving sketches
    /// provide candidate heavy values, and an exact pass over the processed
    /// prefix, restricted to those candidates, supplies the reported exact
    /// counts and weights.
    pub fn snapshot(&self) -> Snapshot {
        let mut facets = BTreeMap::new();
        for (name, sketch) in &self.facets {
            facets.insert(name.clone(), self.exact_candidates(name, sketch));
        }
        let partial = Partial {
            phase: self.phase,
            received: 1,
            expected: 1,
            bundles: self.bundles,
            series: self
                .series
                .iter()
                .map(|(name, state)| (name.clone(), state.partial()))
                .collect(),
            facets,
        };
        let approx = self
            .series
            .iter()
            .map(|(name, state)| (name.clone(), state.estimates()))
            .collect();
        Snapshot::render(&partial, &self.config, approx)
    }

    fn exact_candidates(&self, facet: &str, sketch: &SpaceSaving) -> Vec<Counter> {
        let candidates: HashSet<String> = sketch
            .candidates()
            .into_iter()
            .map(|counter| counter.into_parts().0)
            .collect();
        let mut exact: HashMap<String, (u64, f64)> = HashMap::new();
        for (_, bundle) in &self.items[..self.cursor] {
            let values = self.registry.facet_values(facet, bundle);
            for value in values.iter() {
                if candidates.contains(value) {
                    let entry = exact.entry(value.to_string()).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += bundle.weight;
                }
            }
        }
        let mut rows: Vec<Counter> = exact
            .into_iter()
            .map(|(key, (count, weight))| Counter::from_parts(key, weight, count, 0.0))
            .collect();
        rows.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.key().cmp(b.key()))
        });
        rows
    }

    fn maybe_yield(&mut self, cancel: &CancelToken) -> Result<(), Error> {
        self.since_yield += 1;
        if self.since_yield >= self.config.yield_every {
            self.since_yield = 0;
            cancel.check()?;
            std::thread::yield_now();
        }
        Ok(())
    }
}
