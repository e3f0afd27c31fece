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

//! Deterministic membership hashing.
//!
//! Every bundle is mapped to a stable position in `[0, 1)` derived from its
//! identity key. The mapping is a pure function of the key, so it is identical
//! across calls, workers, and time. Because a position either is or is not
//! below a threshold, the sample at any smaller threshold is a subset of the
//! sample at any larger one, which is what makes progressive phases and
//! order-independent shard merges possible.
//!
//! # Usage
//!
//! ```rust
//! use bundlestats::hash::membership;
//!
//! let m = membership("bundle-42");
//! assert!((0.0..1.0).contains(&m));
//! assert_eq!(m, membership("bundle-42"));
//! ```

mod fnv;
pub use self::fnv::Fnv1a32;
pub use self::fnv::membership;
