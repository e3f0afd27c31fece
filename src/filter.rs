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

//! Facet-based bundle filtering.
//!
//! A filter maps facet names to accepted values with a per-facet combiner.
//! Evaluation is a pure function of its inputs and returns an explicit
//! `Result`: an unknown facet name is a configuration error surfaced to the
//! caller, never a silent empty result.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::bundle::Bundle;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::extract::ExtractorRegistry;

/// How a facet's extracted values are matched against the accepted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Combiner {
    /// At least one extracted value is accepted.
    #[default]
    Some,
    /// Every extracted value is accepted, and at least one exists.
    Every,
    /// No extracted value is accepted.
    None,
    /// Nothing matches; the facet clause excludes every bundle.
    Never,
}

/// Accepted values and combiner for one facet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetFilter {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub combiner: Combiner,
}

/// A filter: facet name to accepted-values clause; all clauses must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub facets: HashMap<String, FacetFilter>,
}

impl FilterSpec {
    /// Builds a single-facet filter with the default `some` combiner.
    pub fn matching(facet: impl Into<String>, values: &[&str]) -> Self {
        let mut facets = HashMap::new();
        facets.insert(
            facet.into(),
            FacetFilter {
                values: values.iter().map(|v| v.to_string()).collect(),
                combiner: Combiner::Some,
            },
        );
        Self { facets }
    }
}

/// Filters owned bundles, keeping those every facet clause accepts.
///
/// Deterministic given identical inputs. Facet names must be configured or
/// registered; anything else is `ErrorKind::UnknownFacet`.
pub fn filter_bundles(
    bundles: Vec<Bundle>,
    filter: Option<&FilterSpec>,
    config: &EngineConfig,
    registry: &ExtractorRegistry,
) -> Result<Vec<Bundle>, Error> {
    let Some(spec) = filter else {
        return Ok(bundles);
    };
    for name in spec.facets.keys() {
        if !config.facets.iter().any(|facet| facet == name) && !registry.has_facet(name) {
            return Err(
                Error::new(ErrorKind::UnknownFacet, "filter references unknown facet")
                    .with_context("facet", name),
            );
        }
    }
    Ok(bundles
        .into_iter()
        .filter(|bundle| matches(bundle, spec, registry))
        .collect())
}

fn matches(bundle: &Bundle, spec: &FilterSpec, registry: &ExtractorRegistry) -> bool {
    spec.facets.iter().all(|(name, clause)| {
        let values = registry.facet_values(name, bundle);
        let accepted = |value: &str| clause.values.iter().any(|v| v == value);
        match clause.combiner {
            Combiner::Some => values.iter().any(|value| accepted(value)),
            Combiner::Every => !values.is_empty() && values.iter().all(|value| accepted(value)),
            Combiner::None => !values.iter().any(|value| accepted(value)),
            Combiner::Never => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> (EngineConfig, ExtractorRegistry, Vec<Bundle>) {
        let config = EngineConfig {
            facets: vec!["device".to_string()],
            ..EngineConfig::default()
        };
        let bundles = vec![
            Bundle::new("b1", 1.0).with_field("device", json!("mobile")),
            Bundle::new("b2", 1.0).with_field("device", json!("desktop")),
            Bundle::new("b3", 1.0),
        ];
        (config, ExtractorRegistry::new(), bundles)
    }

    #[test]
    fn test_some_combiner() {
        let (config, registry, bundles) = fixture();
        let spec = FilterSpec::matching("device", &["mobile"]);
        let kept = filter_bundles(bundles, Some(&spec), &config, &registry).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b1");
    }

    #[test]
    fn test_none_combiner_keeps_empty_extractions() {
        let (config, registry, bundles) = fixture();
        let mut spec = FilterSpec::matching("device", &["mobile"]);
        spec.facets.get_mut("device").unwrap().combiner = Combiner::None;
        let kept = filter_bundles(bundles, Some(&spec), &config, &registry).unwrap();
        let ids: Vec<&str> = kept.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b3"]);
    }

    #[test]
    fn test_never_combiner_excludes_everything() {
        let (config, registry, bundles) = fixture();
        let mut spec = FilterSpec::matching("device", &[]);
        spec.facets.get_mut("device").unwrap().combiner = Combiner::Never;
        let kept = filter_bundles(bundles, Some(&spec), &config, &registry).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_unknown_facet_is_an_error() {
        let (config, registry, bundles) = fixture();
        let spec = FilterSpec::matching("browser", &["firefox"]);
        let err = filter_bundles(bundles, Some(&spec), &config, &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFacet);
    }
}
