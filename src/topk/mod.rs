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

//! Weighted heavy-hitters tracking with the Space-Saving algorithm.
//!
//! A fixed-capacity counter map: offering a key that is absent at full
//! capacity evicts the minimum-score counter and inherits its score as the
//! new counter's error bound, giving the classic guarantee that a counter's
//! true weight lies in `[score - err, score]`.
//!
//! The sketch is a cheap first pass producing *candidate* heavy values; final
//! reported Top-K entries are drawn from an oversampled candidate set (see
//! [`candidate_capacity`]) so that the true top k are reliably present.
//!
//! # Usage
//!
//! ```rust
//! use bundlestats::topk::SpaceSaving;
//!
//! let mut sketch = SpaceSaving::new(2);
//! sketch.offer("a", 5.0);
//! sketch.offer("b", 3.0);
//! sketch.offer("c", 1.0);
//!
//! let top = sketch.top(2);
//! assert_eq!(top[0].key(), "a");
//! assert_eq!(top[1].key(), "b");
//! ```

mod sketch;
pub use self::sketch::Counter;
pub use self::sketch::SpaceSaving;
pub use self::sketch::candidate_capacity;
