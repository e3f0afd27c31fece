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

//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared flag polled inside long-running loops at
//! bounded intervals (`yield_every` processed items). Cancellation is
//! best-effort: detection latency is bounded by the poll stride. Setting the
//! flag twice, or after the operation completed, is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::error::Error;

/// Shared cancellation flag for one request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true if the flag has been set.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Converts a set flag into the cancellation control-flow signal.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Request-id-keyed token registry shared between a dispatcher and its
/// callers, so `cancel` can reach an operation that is already running.
#[derive(Debug, Clone, Default)]
pub struct CancelRegistry {
    tokens: Arc<Mutex<HashMap<u64, CancelToken>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token for a request id, creating it on first use. A token
    /// created by an earlier `cancel` for the same id is returned already
    /// set, which closes the race between a cancel and the start of its
    /// target.
    pub fn token_for(&self, id: u64) -> CancelToken {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.entry(id).or_default().clone()
    }

    /// Sets the flag for a request id. Unknown, finished, or repeated
    /// targets make this a no-op from the caller's point of view.
    pub fn cancel(&self, id: u64) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.entry(id).or_default().cancel();
    }

    /// Drops the token once its request has finished.
    pub fn complete(&self, id: u64) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(&id);
    }
}
