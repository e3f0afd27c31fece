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

//! Online quantile estimation with the P² algorithm.
//!
//! A [`P2Quantile`] tracks a single target percentile in O(1) time and O(1)
//! memory per pushed value: five marker heights are adjusted by
//! piecewise-parabolic interpolation as values stream in. A
//! [`P2QuantileSet`] fans one `update` out to several independent targets.
//!
//! Marker state is not mergeable across independent streams; merged quantile
//! estimates come from the [`histogram`](crate::histogram) module instead.
//!
//! # Usage
//!
//! ```rust
//! use bundlestats::quantile::P2Quantile;
//!
//! let mut median = P2Quantile::new(0.5);
//! for i in 1..=100 {
//!     median.update(i as f64);
//! }
//! let estimate = median.value().unwrap();
//! assert!((estimate - 50.5).abs() / 50.5 < 0.05);
//! ```

mod p2;
pub use self::p2::P2Quantile;
pub use self::p2::P2QuantileSet;
pub use self::p2::percentile_key;
