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

//! Series and facet extractor registry.
//!
//! Extractors are plain functions over a [`Bundle`]: a facet extractor
//! produces zero or more categorical values, a series extractor at most one
//! numeric value. Static registration is the primary API; the [`Resolver`]
//! trait is the host-supplied capability behind the `facet_import` /
//! `series_import` commands, so the core assumes no particular
//! module-loading mechanism.
//!
//! Names without a registered extractor fall back to reading the bundle
//! field of the same name, normalized at the boundary.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::bundle::FieldValues;
use crate::error::Error;
use crate::error::ErrorKind;

/// A categorical extractor: bundle in, zero or more values out.
pub type FacetFn = Arc<dyn Fn(&Bundle) -> FieldValues + Send + Sync>;

/// A numeric extractor: bundle in, at most one value out.
pub type SeriesFn = Arc<dyn Fn(&Bundle) -> Option<f64> + Send + Sync>;

/// Host capability for resolving named extractors from an external source
/// reference.
pub trait Resolver: Send + Sync {
    /// Resolves a facet extractor, or `None` if the name/source is unknown.
    fn resolve_facet(&self, name: &str, source: &str) -> Option<FacetFn>;

    /// Resolves a series extractor, or `None` if the name/source is unknown.
    fn resolve_series(&self, name: &str, source: &str) -> Option<SeriesFn>;
}

/// The default resolver: resolves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl Resolver for NoResolver {
    fn resolve_facet(&self, _name: &str, _source: &str) -> Option<FacetFn> {
        None
    }

    fn resolve_series(&self, _name: &str, _source: &str) -> Option<SeriesFn> {
        None
    }
}

/// Name-to-function maps for one session, cloned into runs and shard
/// workers at creation time.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    facets: HashMap<String, FacetFn>,
    series: HashMap<String, SeriesFn>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a facet extractor under a name.
    pub fn register_facet(&mut self, name: impl Into<String>, extractor: FacetFn) {
        self.facets.insert(name.into(), extractor);
    }

    /// Registers a series extractor under a name.
    pub fn register_series(&mut self, name: impl Into<String>, extractor: SeriesFn) {
        self.series.insert(name.into(), extractor);
    }

    /// Returns true if a facet extractor is registered under `name`.
    pub fn has_facet(&self, name: &str) -> bool {
        self.facets.contains_key(name)
    }

    /// Returns true if a series extractor is registered under `name`.
    pub fn has_series(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Extracts facet values for one bundle: the registered extractor, or
    /// the same-named bundle field normalized at the boundary.
    pub fn facet_values(&self, name: &str, bundle: &Bundle) -> FieldValues {
        match self.facets.get(name) {
            Some(extractor) => extractor(bundle),
            None => bundle
                .field(name)
                .map(FieldValues::from_json)
                .unwrap_or(FieldValues::Empty),
        }
    }

    /// Extracts the series value for one bundle: the registered extractor,
    /// or the same-named bundle field as a number.
    pub fn series_value(&self, name: &str, bundle: &Bundle) -> Option<f64> {
        match self.series.get(name) {
            Some(extractor) => extractor(bundle),
            None => bundle.field(name).and_then(|value| value.as_f64()),
        }
    }

    /// Binds a facet name via the host resolver.
    ///
    /// An unresolvable name is an explicit error, never a silent no-op.
    pub fn import_facet(
        &mut self,
        name: &str,
        source: &str,
        resolver: &dyn Resolver,
    ) -> Result<(), Error> {
        match resolver.resolve_facet(name, source) {
            Some(extractor) => {
                self.register_facet(name, extractor);
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::ExtractorUnresolved,
                "facet extractor could not be resolved",
            )
            .with_context("name", name)
            .with_context("source", source)),
        }
    }

    /// Binds a series name via the host resolver.
    pub fn import_series(
        &mut self,
        name: &str,
        source: &str,
        resolver: &dyn Resolver,
    ) -> Result<(), Error> {
        match resolver.resolve_series(name, source) {
            Some(extractor) => {
                self.register_series(name, extractor);
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::ExtractorUnresolved,
                "series extractor could not be resolved",
            )
            .with_context("name", name)
            .with_context("source", source)),
        }
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("facets", &self.facets.keys().collect::<Vec<_>>())
            .field("series", &self.series.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_fallback() {
        let registry = ExtractorRegistry::new();
        let bundle = Bundle::new("b1", 1.0)
            .with_field("device", json!("mobile"))
            .with_field("lcp", json!(2400.5));
        assert_eq!(
            registry.facet_values("device", &bundle),
            FieldValues::Single("mobile".to_string())
        );
        assert_eq!(registry.series_value("lcp", &bundle), Some(2400.5));
        assert_eq!(registry.series_value("missing", &bundle), None);
    }

    #[test]
    fn test_registered_extractor_wins_over_field() {
        let mut registry = ExtractorRegistry::new();
        registry.register_facet(
            "device",
            Arc::new(|_: &Bundle| FieldValues::Single("override".to_string())),
        );
        let bundle = Bundle::new("b1", 1.0).with_field("device", json!("mobile"));
        assert_eq!(
            registry.facet_values("device", &bundle),
            FieldValues::Single("override".to_string())
        );
    }

    #[test]
    fn test_import_unresolved_is_an_error() {
        let mut registry = ExtractorRegistry::new();
        let err = registry
            .import_facet("consent", "https://example.test/ext.js", &NoResolver)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractorUnresolved);
    }
}
