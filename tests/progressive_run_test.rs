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

use std::sync::Arc;

use bundlestats::bundle::Bundle;
use bundlestats::cancel::CancelToken;
use bundlestats::config::EngineConfig;
use bundlestats::error::ErrorKind;
use bundlestats::extract::ExtractorRegistry;
use bundlestats::filter::FilterSpec;
use bundlestats::run::ProgressiveRun;
use serde_json::json;

fn config() -> EngineConfig {
    EngineConfig {
        thresholds: vec![0.25, 0.5, 1.0],
        series: vec!["weight".to_string(), "metric".to_string()],
        facets: vec!["device".to_string()],
        quantiles: vec![0.5, 0.95],
        yield_every: 16,
        ..EngineConfig::default()
    }
}

fn registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register_series("weight", Arc::new(|bundle: &Bundle| Some(bundle.weight)));
    registry
}

fn dataset() -> Vec<Bundle> {
    (0..120)
        .map(|i| {
            let weight = 1.0 + ((i % 5) * 2) as f64;
            Bundle::new(format!("bundle-{i}"), weight)
                .with_field("metric", json!((i * 13 % 100) as f64))
                .with_field("device", json!(if i % 3 == 0 { "mobile" } else { "desktop" }))
        })
        .collect()
}

#[test]
fn test_exact_weight_sum_at_full_phase() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    run.advance_to(1.0, &cancel).unwrap();

    let snapshot = run.snapshot();
    assert!(snapshot.exact);
    assert_eq!(snapshot.counts.bundles, 120);
    // weight = 1 + (i % 5) * 2 over 120 bundles: 24 * (1+3+5+7+9).
    let expected: f64 = dataset().iter().map(|b| b.weight).sum();
    assert_eq!(expected, 600.0);
    assert_eq!(snapshot.totals["weight"].sum, 600.0);
    assert_eq!(snapshot.sample_totals["weight"].sum, 600.0);
    assert_eq!(snapshot.totals["weight"].count, 120.0);
    assert_eq!(snapshot.totals["weight"].min, Some(1.0));
    assert_eq!(snapshot.totals["weight"].max, Some(9.0));
}

#[test]
fn test_partial_phase_rescales_totals() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    run.advance_to(0.25, &cancel).unwrap();

    let snapshot = run.snapshot();
    assert!(!snapshot.exact);
    assert_eq!(snapshot.phase, 0.25);
    let raw = snapshot.sample_totals["weight"].sum;
    let rescaled = snapshot.totals["weight"].sum;
    assert!((rescaled - raw / 0.25).abs() < 1e-9);
    assert!((snapshot.counts.estimated - snapshot.counts.bundles as f64 / 0.25).abs() < 1e-9);
    // The sampled population should sit near a quarter of the dataset.
    assert!(snapshot.counts.bundles > 10 && snapshot.counts.bundles < 50);
}

#[test]
fn test_advance_must_increase() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    run.advance_to(0.5, &cancel).unwrap();
    let before = run.snapshot();

    let repeat = run.advance_to(0.5, &cancel).unwrap_err();
    assert_eq!(repeat.kind(), ErrorKind::ConfigInvalid);
    let backwards = run.advance_to(0.3, &cancel).unwrap_err();
    assert_eq!(backwards.kind(), ErrorKind::ConfigInvalid);
    let overshoot = run.advance_to(1.5, &cancel).unwrap_err();
    assert_eq!(overshoot.kind(), ErrorKind::ConfigInvalid);

    // Rejected advances leave the snapshot untouched.
    assert_eq!(run.snapshot(), before);
}

#[test]
fn test_terminal_after_full_phase() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    run.advance_to(1.0, &cancel).unwrap();
    assert!(run.is_complete());
    let err = run.advance_to(1.0, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunComplete);
}

#[test]
fn test_nested_processing_across_thresholds() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    let mut last = 0;
    for threshold in [0.25, 0.5, 1.0] {
        run.advance_to(threshold, &cancel).unwrap();
        let bundles = run.snapshot().counts.bundles;
        assert!(bundles >= last, "processed count shrank at {threshold}");
        last = bundles;
    }
    assert_eq!(last, 120);
}

#[test]
fn test_exact_facet_counts_at_full_phase() {
    let cancel = CancelToken::new();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    run.advance_to(1.0, &cancel).unwrap();

    let snapshot = run.snapshot();
    let rows = &snapshot.facets["device"];
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].value, "desktop");
    assert_eq!(rows[0].count, 80.0);
    assert_eq!(rows[1].value, "mobile");
    assert_eq!(rows[1].count, 40.0);

    let mobile_weight: f64 = dataset()
        .iter()
        .filter(|b| b.field("device") == Some(&json!("mobile")))
        .map(|b| b.weight)
        .sum();
    assert_eq!(rows[1].weight, mobile_weight);
}

#[test]
fn test_filter_restricts_population() {
    let spec = FilterSpec::matching("device", &["mobile"]);
    let run = ProgressiveRun::new(&dataset(), Some(&spec), &config(), &registry()).unwrap();
    assert_eq!(run.population(), 40);
}

#[test]
fn test_unknown_facet_in_filter_is_an_error() {
    let spec = FilterSpec::matching("browser", &["firefox"]);
    let err = ProgressiveRun::new(&dataset(), Some(&spec), &config(), &registry()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFacet);
}

#[test]
fn test_cancellation_aborts_advance() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut run = ProgressiveRun::new(&dataset(), None, &config(), &registry()).unwrap();
    let err = run.advance_to(1.0, &cancel).unwrap_err();
    assert!(err.is_cancelled());
}
