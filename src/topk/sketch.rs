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

use std::collections::HashMap;

const OVERSAMPLE_FACTOR: usize = 8;
const MIN_HEADROOM: usize = 5;

/// One tracked counter: the estimated weight (`score`), the number of offers
/// absorbed since the key was inserted (`count`), and the inherited
/// overcount bound (`err`). The true weight lies in `[score - err, score]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    key: String,
    score: f64,
    count: u64,
    err: f64,
}

impl Counter {
    /// Returns the tracked key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the estimated total weight for the key.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Returns the number of offers absorbed by this counter.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the maximum overcount of `score`.
    pub fn err(&self) -> f64 {
        self.err
    }

    pub(crate) fn into_parts(self) -> (String, f64, u64, f64) {
        (self.key, self.score, self.count, self.err)
    }

    pub(crate) fn from_parts(key: String, score: f64, count: u64, err: f64) -> Self {
        Self {
            key,
            score,
            count,
            err,
        }
    }
}

/// Fixed-capacity weighted Space-Saving sketch keyed by facet value.
#[derive(Debug, Clone)]
pub struct SpaceSaving {
    capacity: usize,
    counters: HashMap<String, Slot>,
    stream_weight: f64,
}

#[derive(Debug, Clone)]
struct Slot {
    score: f64,
    count: u64,
    err: f64,
}

impl SpaceSaving {
    /// Creates a sketch holding at most `capacity` counters.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            counters: HashMap::with_capacity(capacity),
            stream_weight: 0.0,
        }
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of counters currently tracked.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if nothing has been offered yet.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the total weight offered to the sketch.
    pub fn stream_weight(&self) -> f64 {
        self.stream_weight
    }

    /// Offers one occurrence of `key` with the given weight.
    ///
    /// An existing counter absorbs the weight. A fresh key is inserted while
    /// capacity remains. At full capacity the minimum-score counter is
    /// evicted: a fresh key that beats the minimum inherits it, starting at
    /// `evicted.score + weight` with `err = evicted.score`; a fresh key that
    /// does not beat the minimum is itself the minimum and is evicted on the
    /// spot.
    pub fn offer(&mut self, key: &str, weight: f64) {
        self.stream_weight += weight;
        if let Some(slot) = self.counters.get_mut(key) {
            slot.score += weight;
            slot.count += 1;
            return;
        }
        if self.counters.len() < self.capacity {
            self.counters.insert(
                key.to_string(),
                Slot {
                    score: weight,
                    count: 1,
                    err: 0.0,
                },
            );
            return;
        }
        let evicted_key = self.min_score_key();
        let min_score = self
            .counters
            .get(&evicted_key)
            .map(|slot| slot.score)
            .unwrap_or(0.0);
        if weight <= min_score {
            return;
        }
        self.counters.remove(&evicted_key);
        self.counters.insert(
            key.to_string(),
            Slot {
                score: min_score + weight,
                count: 1,
                err: min_score,
            },
        );
    }

    /// Returns the k highest-score counters, descending by score with a
    /// lexicographic key tie-break.
    pub fn top(&self, k: usize) -> Vec<Counter> {
        let mut rows: Vec<Counter> = self
            .counters
            .iter()
            .map(|(key, slot)| Counter {
                key: key.clone(),
                score: slot.score,
                count: slot.count,
                err: slot.err,
            })
            .collect();
        rows.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
        rows.truncate(k);
        rows
    }

    /// Returns every tracked counter, descending by score. This is the
    /// candidate list handed to merges; truncating to the final k happens
    /// only after union-summing across shards.
    pub fn candidates(&self) -> Vec<Counter> {
        self.top(self.counters.len())
    }

    /// Merges another sketch into this one by union-summing counters, then
    /// re-truncating to capacity.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.stream_weight += other.stream_weight;
        for (key, slot) in &other.counters {
            match self.counters.get_mut(key) {
                Some(own) => {
                    own.score += slot.score;
                    own.count += slot.count;
                    own.err += slot.err;
                }
                None => {
                    self.counters.insert(key.clone(), slot.clone());
                }
            }
        }
        if self.counters.len() > self.capacity {
            let keep = self.top(self.capacity);
            let mut trimmed = HashMap::with_capacity(self.capacity);
            for row in keep {
                let (key, score, count, err) = row.into_parts();
                trimmed.insert(
                    key,
                    Slot {
                        score,
                        count,
                        err,
                    },
                );
            }
            self.counters = trimmed;
        }
    }

    fn min_score_key(&self) -> String {
        let mut min: Option<(&String, &Slot)> = None;
        for (key, slot) in &self.counters {
            let replace = match min {
                None => true,
                Some((min_key, min_slot)) => {
                    slot.score < min_slot.score
                        || (slot.score == min_slot.score && key > min_key)
                }
            };
            if replace {
                min = Some((key, slot));
            }
        }
        min.map(|(key, _)| key.clone()).unwrap_or_default()
    }
}

/// Candidate-list capacity for a final Top-K of `k`: `max(8k, k + 5)`.
///
/// Oversampling keeps the candidate set large enough that the true top k
/// reliably survive eviction churn.
pub fn candidate_capacity(k: usize) -> usize {
    (OVERSAMPLE_FACTOR * k).max(k + MIN_HEADROOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_newcomer_is_evicted_immediately() {
        let mut sketch = SpaceSaving::new(2);
        sketch.offer("a", 5.0);
        sketch.offer("b", 3.0);
        sketch.offer("c", 1.0);

        assert_eq!(sketch.len(), 2);
        let top = sketch.top(2);
        assert_eq!(top[0].key(), "a");
        assert_eq!(top[1].key(), "b");
        assert_eq!(sketch.stream_weight(), 9.0);
    }

    #[test]
    fn test_strong_newcomer_inherits_min_score() {
        let mut sketch = SpaceSaving::new(2);
        sketch.offer("a", 5.0);
        sketch.offer("b", 3.0);
        sketch.offer("d", 4.0);

        let top = sketch.top(2);
        assert_eq!(top[0].key(), "d");
        assert_eq!(top[0].score(), 7.0);
        assert_eq!(top[0].err(), 3.0);
        assert_eq!(top[1].key(), "a");
    }

    #[test]
    fn test_tied_newcomer_keeps_incumbent() {
        let mut sketch = SpaceSaving::new(2);
        sketch.offer("b", 1.0);
        sketch.offer("a", 1.0);
        sketch.offer("z", 1.0);
        let top = sketch.top(2);
        let keys: Vec<&str> = top.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_candidate_capacity() {
        assert_eq!(candidate_capacity(1), 8);
        assert_eq!(candidate_capacity(3), 24);
        // Headroom floor dominates for k = 0 edge configs.
        assert_eq!(candidate_capacity(0), 5);
    }
}
