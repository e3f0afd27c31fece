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

use log::debug;

use crate::bundle::Bundle;
use crate::bundle::Chunk;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::extract::ExtractorRegistry;
use crate::filter::FilterSpec;
use crate::filter::filter_bundles;
use crate::hash::membership;
use crate::run::SeriesState;
use crate::snapshot::Partial;
use crate::snapshot::Snapshot;
use crate::snapshot::coverage_of;
use crate::topk::SpaceSaving;
use crate::topk::candidate_capacity;

/// Number of deterministic membership buckets over `[0, 1)`.
pub const STREAM_BINS: usize = 1024;

/// Open-set run over a stream whose size and arrival order are unknown.
///
/// Phase cannot index a static sorted array here, so it drives a
/// deterministic bucketing scheme instead: bundles that are not yet due are
/// queued in the bucket holding their membership, and advancing the phase
/// drains the newly covered buckets in index order. Delivery coverage is
/// tracked independently of phase via received/expected request counters.
#[derive(Debug)]
pub struct StreamingRun {
    config: EngineConfig,
    registry: ExtractorRegistry,
    filter: Option<FilterSpec>,
    phase: f64,
    bins: Vec<Vec<Bundle>>,
    received: u64,
    expected: u64,
    bundles: u64,
    series: BTreeMap<String, SeriesState>,
    facets: BTreeMap<String, SpaceSaving>,
    finalized: bool,
    since_yield: usize,
}

impl StreamingRun {
    /// Creates a run expecting the given number of upstream deliveries.
    pub fn new(
        config: &EngineConfig,
        registry: &ExtractorRegistry,
        filter: Option<FilterSpec>,
        expected_requests: u64,
    ) -> Self {
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
        Self {
            config: config.clone(),
            registry: registry.clone(),
            filter,
            phase: 0.0,
            bins: vec![Vec::new(); STREAM_BINS],
            received: 0,
            expected: expected_requests,
            bundles: 0,
            series,
            facets,
            finalized: false,
            since_yield: 0,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Returns upstream delivery completeness in `[0, 1]`.
    pub fn coverage(&self) -> f64 {
        coverage_of(self.received, self.expected)
    }

    /// Ingests one delivery of chunks.
    ///
    /// Counts one received request, adjusts the expected total by
    /// `requests_delta`, evaluates the filter over only the new bundles, and
    /// processes each one eagerly if its membership is already due, binning
    /// it otherwise. Identical chunks submitted twice count twice; de-dup
    /// across deliveries is the caller's responsibility.
    pub fn ingest(
        &mut self,
        chunks: Vec<Chunk>,
        requests_delta: i64,
        cancel: &CancelToken,
    ) -> Result<(), Error> {
        if self.finalized {
            return Err(Error::new(
                ErrorKind::RunComplete,
                "run has been finalized",
            ));
        }
        self.received += 1;
        self.expected = self.expected.saturating_add_signed(requests_delta);
        for chunk in chunks {
            let kept = filter_bundles(chunk.bundles, self.filter.as_ref(), &self.config, &self.registry)?;
            for bundle in kept {
                self.maybe_yield(cancel)?;
                let m = membership(&bundle.id);
                if m <= self.phase {
                    self.process(&bundle);
                } else {
                    self.bins[bin_index(m)].push(bundle);
                }
            }
        }
        Ok(())
    }

    /// Advances the phase, clamped to `[phase, 1]`; a non-increasing target
    /// is an idempotent no-op. Newly covered buckets are drained in index
    /// order and cleared, so every queued bundle is processed exactly once.
    pub fn advance_to(&mut self, phase: f64, cancel: &CancelToken) -> Result<(), Error> {
        if self.finalized {
            return Err(Error::new(
                ErrorKind::RunComplete,
                "run has been finalized",
            ));
        }
        let target = phase.min(1.0);
        if target <= self.phase {
            return Ok(());
        }
        let low = bin_index(self.phase);
        let high = bin_index(target);
        for index in low..=high {
            let queue = std::mem::take(&mut self.bins[index]);
            for position in 0..queue.len() {
                if let Err(err) = self.maybe_yield(cancel) {
                    // Re-queue what was not processed so the run stays
                    // consistent if the caller keeps it alive.
                    self.bins[index] = queue[position..].to_vec();
                    return Err(err);
                }
                self.process(&queue[position]);
            }
        }
        debug!("streaming advance: phase {:.3} -> {:.3}", self.phase, target);
        self.phase = target;
        Ok(())
    }

    /// Closes delivery accounting and returns the final snapshot.
    pub fn finalize(&mut self) -> Snapshot {
        self.expected = self.expected.max(self.received);
        self.finalized = true;
        self.snapshot()
    }

    /// Raw aggregate state for merging.
    pub fn partial(&self) -> Partial {
        Partial {
            phase: self.phase,
            received: self.received,
            expected: self.expected,
            bundles: self.bundles,
            series: self
                .series
                .iter()
                .map(|(name, state)| (name.clone(), state.partial()))
                .collect(),
            facets: self
                .facets
                .iter()
                .map(|(name, sketch)| (name.clone(), sketch.candidates()))
                .collect(),
        }
    }

    /// Renders the current state, P²-estimated while incomplete.
    pub fn snapshot(&self) -> Snapshot {
        let approx = self
            .series
            .iter()
            .map(|(name, state)| (name.clone(), state.estimates()))
            .collect();
        Snapshot::render(&self.partial(), &self.config, approx)
    }

    fn process(&mut self, bundle: &Bundle) {
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

fn bin_index(membership: f64) -> usize {
    ((membership * STREAM_BINS as f64) as usize).min(STREAM_BINS - 1)
}
