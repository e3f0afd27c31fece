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

//! Per-session engine configuration.
//!
//! Configuration is an explicit value owned by one dispatcher session and
//! handed to runs and shard workers by clone; it is never shared mutable
//! state across sessions.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::ErrorKind;

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SHARDS: usize = 1;
const DEFAULT_YIELD_EVERY: usize = 512;

/// Top-K sizing: one value for every facet, or a per-facet map falling back
/// to [`EngineConfig::default_top_k`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopK {
    Uniform(usize),
    PerFacet(HashMap<String, usize>),
}

/// Engine configuration for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Progressive phase thresholds, ascending in (0, 1].
    pub thresholds: Vec<f64>,
    /// Names of numeric series to aggregate.
    pub series: Vec<String>,
    /// Names of categorical facets to count.
    pub facets: Vec<String>,
    /// Target quantiles, each in (0, 1).
    pub quantiles: Vec<f64>,
    /// Top-K sizing; `None` means `default_top_k` everywhere.
    #[serde(default)]
    pub top_k: Option<TopK>,
    /// Fallback Top-K size.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Streaming shard worker count.
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Cooperative yield (and cancellation poll) stride, in processed items.
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_shards() -> usize {
    DEFAULT_SHARDS
}

fn default_yield_every() -> usize {
    DEFAULT_YIELD_EVERY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![1.0],
            series: Vec::new(),
            facets: Vec::new(),
            quantiles: Vec::new(),
            top_k: None,
            default_top_k: DEFAULT_TOP_K,
            shards: DEFAULT_SHARDS,
            yield_every: DEFAULT_YIELD_EVERY,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.thresholds.is_empty() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "thresholds must not be empty",
            ));
        }
        let mut previous = 0.0;
        for threshold in &self.thresholds {
            if *threshold <= previous || *threshold > 1.0 {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "thresholds must be ascending in (0, 1]",
                )
                .with_context("threshold", threshold));
            }
            previous = *threshold;
        }
        for quantile in &self.quantiles {
            if *quantile <= 0.0 || *quantile >= 1.0 {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "quantiles must be in (0, 1)",
                )
                .with_context("quantile", quantile));
            }
        }
        if self.default_top_k == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "default_top_k must be positive",
            ));
        }
        if self.shards == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "shards must be positive",
            ));
        }
        if self.yield_every == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "yield_every must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the Top-K size for one facet.
    pub fn top_k_for(&self, facet: &str) -> usize {
        match &self.top_k {
            Some(TopK::Uniform(k)) => *k,
            Some(TopK::PerFacet(map)) => *map.get(facet).unwrap_or(&self.default_top_k),
            None => self.default_top_k,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let config = EngineConfig {
            thresholds: vec![0.5, 0.1],
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_rejects_out_of_range_quantile() {
        let config = EngineConfig {
            quantiles: vec![1.0],
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err().kind(),
            ErrorKind::ConfigInvalid
        );
    }

    #[test]
    fn test_top_k_for() {
        let mut map = HashMap::new();
        map.insert("url".to_string(), 10);
        let config = EngineConfig {
            facets: vec!["url".to_string(), "device".to_string()],
            top_k: Some(TopK::PerFacet(map)),
            default_top_k: 3,
            ..EngineConfig::default()
        };
        assert_eq!(config.top_k_for("url"), 10);
        assert_eq!(config.top_k_for("device"), 3);
    }
}
