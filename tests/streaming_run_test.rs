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

use bundlestats::bundle::Bundle;
use bundlestats::bundle::Chunk;
use bundlestats::cancel::CancelToken;
use bundlestats::config::EngineConfig;
use bundlestats::error::ErrorKind;
use bundlestats::extract::ExtractorRegistry;
use bundlestats::run::StreamingRun;
use bundlestats::snapshot::Snapshot;
use serde_json::json;

const PATHS: [&str; 6] = ["/", "/docs", "/blog", "/pricing", "/about", "/search"];

fn config() -> EngineConfig {
    EngineConfig {
        thresholds: vec![1.0],
        series: vec!["value".to_string()],
        facets: vec!["path".to_string()],
        quantiles: vec![0.5, 0.95],
        yield_every: 32,
        ..EngineConfig::default()
    }
}

fn chunk(index: u64) -> Chunk {
    let bundles = (0..100)
        .map(|i| {
            let n = index * 100 + i;
            Bundle::new(format!("stream-{n}"), 1.0 + (n % 4) as f64)
                .with_field("value", json!((n * 7 % 500) as f64))
                .with_field("path", json!(PATHS[(n % 6) as usize]))
        })
        .collect();
    Chunk::new(format!("2026-08-0{}", index + 1), bundles)
}

fn finalized_after(order: &[u64]) -> Snapshot {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(
        &config(),
        &ExtractorRegistry::new(),
        None,
        order.len() as u64,
    );
    for index in order {
        run.ingest(vec![chunk(*index)], 0, &cancel).unwrap();
    }
    run.advance_to(1.0, &cancel).unwrap();
    run.finalize()
}

#[test]
fn test_arrival_order_does_not_change_the_final_snapshot() {
    let forward = finalized_after(&[0, 1, 2]);
    let scrambled = finalized_after(&[2, 0, 1]);
    assert!(forward.exact);
    assert_eq!(forward, scrambled);
    assert_eq!(forward.counts.bundles, 300);
}

#[test]
fn test_phase_before_or_after_ingest_is_equivalent() {
    let cancel = CancelToken::new();

    // Advance first, then ingest: due bundles are processed eagerly.
    let mut eager = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 3);
    eager.advance_to(0.5, &cancel).unwrap();
    for index in 0..3 {
        eager.ingest(vec![chunk(index)], 0, &cancel).unwrap();
    }
    eager.advance_to(1.0, &cancel).unwrap();

    // Ingest first, then advance: the same bundles arrive via the bins.
    let mut binned = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 3);
    for index in 0..3 {
        binned.ingest(vec![chunk(index)], 0, &cancel).unwrap();
    }
    binned.advance_to(0.5, &cancel).unwrap();
    binned.advance_to(1.0, &cancel).unwrap();

    assert_eq!(eager.finalize(), binned.finalize());
}

#[test]
fn test_advance_is_idempotent() {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    run.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    run.advance_to(0.6, &cancel).unwrap();
    let snapshot = run.snapshot();

    run.advance_to(0.6, &cancel).unwrap();
    run.advance_to(0.3, &cancel).unwrap();
    assert_eq!(run.snapshot(), snapshot);
    assert_eq!(run.phase(), 0.6);
}

#[test]
fn test_identical_chunk_twice_doubles_counts() {
    let cancel = CancelToken::new();

    let mut once = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    once.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    once.advance_to(1.0, &cancel).unwrap();
    let single = once.finalize();

    let mut twice = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 2);
    twice.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    twice.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    twice.advance_to(1.0, &cancel).unwrap();
    let doubled = twice.finalize();

    assert_eq!(doubled.counts.bundles, 2 * single.counts.bundles);
    assert_eq!(
        doubled.totals["value"].sum,
        2.0 * single.totals["value"].sum
    );
    assert_eq!(
        doubled.facets["path"][0].weight,
        2.0 * single.facets["path"][0].weight
    );
}

#[test]
fn test_coverage_tracks_deliveries_independently_of_phase() {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 4);
    run.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    run.ingest(vec![chunk(1)], 0, &cancel).unwrap();
    assert_eq!(run.coverage(), 0.5);

    run.advance_to(1.0, &cancel).unwrap();
    let snapshot = run.snapshot();
    assert_eq!(snapshot.phase, 1.0);
    assert!(!snapshot.exact);
    // Denominator is phase * coverage = 0.5.
    let raw = snapshot.sample_totals["value"].sum;
    assert_eq!(snapshot.totals["value"].sum, raw / 0.5);

    // Finalize closes accounting against over-delivery but keeps the
    // promised expectation.
    let final_snapshot = run.finalize();
    assert_eq!(final_snapshot.ingestion.expected, 4);
    assert_eq!(final_snapshot.ingestion.coverage, 0.5);
    assert!(!final_snapshot.exact);
}

#[test]
fn test_requests_delta_raises_expectations() {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    run.ingest(vec![chunk(0)], 2, &cancel).unwrap();
    let snapshot = run.snapshot();
    assert_eq!(snapshot.ingestion.received, 1);
    assert_eq!(snapshot.ingestion.expected, 3);
}

#[test]
fn test_over_delivery_is_clamped() {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    run.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    run.ingest(vec![chunk(1)], 0, &cancel).unwrap();
    assert_eq!(run.coverage(), 1.0);
    let final_snapshot = run.finalize();
    assert_eq!(final_snapshot.ingestion.expected, 2);
}

#[test]
fn test_finalized_run_rejects_further_input() {
    let cancel = CancelToken::new();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    run.ingest(vec![chunk(0)], 0, &cancel).unwrap();
    let _ = run.finalize();
    let err = run.ingest(vec![chunk(1)], 0, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunComplete);
    let err = run.advance_to(1.0, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunComplete);
}

#[test]
fn test_cancelled_ingest_reports_the_signal() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut run = StreamingRun::new(&config(), &ExtractorRegistry::new(), None, 1);
    let err = run.ingest(vec![chunk(0)], 0, &cancel).unwrap_err();
    assert!(err.is_cancelled());
}
