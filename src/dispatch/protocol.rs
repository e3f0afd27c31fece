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

use serde::Deserialize;
use serde::Serialize;

use crate::bundle::Chunk;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::filter::FilterSpec;
use crate::snapshot::Snapshot;

/// Unique identifier of one request.
pub type RequestId = u64;

/// Commands understood by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Installs the session configuration.
    Init { config: EngineConfig },
    /// Replaces the whole-dataset buffer.
    Load { chunks: Vec<Chunk> },
    /// Appends to the whole-dataset buffer.
    AddData { chunks: Vec<Chunk> },
    /// Drives a progressive run through every configured threshold, one
    /// partial snapshot per threshold.
    ComputeProgressive {
        #[serde(default)]
        filter: Option<FilterSpec>,
    },
    /// Opens a streaming session.
    StreamInit {
        expected_requests: u64,
        #[serde(default)]
        filter: Option<FilterSpec>,
    },
    /// Ingests one chunk into the streaming session.
    StreamAdd {
        chunk: Chunk,
        #[serde(default)]
        requests_delta: i64,
    },
    /// Advances the streaming session's phase.
    StreamPhase { phase: f64 },
    /// Closes delivery accounting and reports the final snapshot.
    StreamFinalize,
    /// Tears the streaming session down.
    StreamEnd,
    /// Binds a facet extractor name via the host resolver.
    FacetImport { name: String, source: String },
    /// Binds a series extractor name via the host resolver.
    SeriesImport { name: String, source: String },
    /// Requests cooperative cancellation of another request.
    Cancel { target: RequestId },
}

/// One request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(flatten)]
    pub command: Command,
}

/// Completion marker payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Done {
    pub done: bool,
    #[serde(default)]
    pub cancelled: bool,
}

/// Error payload of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub error: String,
}

/// Result payload of one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Snapshot(Box<Snapshot>),
    Done(Done),
    Error(ErrorBody),
}

/// One response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub ok: bool,
    #[serde(default)]
    pub partial: bool,
    pub result: Payload,
}

impl Response {
    /// An intermediate snapshot; more responses for this id will follow.
    pub fn partial_snapshot(id: RequestId, snapshot: Snapshot) -> Self {
        Self {
            id,
            ok: true,
            partial: true,
            result: Payload::Snapshot(Box::new(snapshot)),
        }
    }

    /// The final snapshot response for this id.
    pub fn snapshot(id: RequestId, snapshot: Snapshot) -> Self {
        Self {
            id,
            ok: true,
            partial: false,
            result: Payload::Snapshot(Box::new(snapshot)),
        }
    }

    /// The final completion response for this id.
    pub fn done(id: RequestId) -> Self {
        Self {
            id,
            ok: true,
            partial: false,
            result: Payload::Done(Done {
                done: true,
                cancelled: false,
            }),
        }
    }

    /// The final response of a cooperatively cancelled request. Successful:
    /// cancellation is not an error.
    pub fn cancelled(id: RequestId) -> Self {
        Self {
            id,
            ok: true,
            partial: false,
            result: Payload::Done(Done {
                done: true,
                cancelled: true,
            }),
        }
    }

    /// The final error response for this id.
    pub fn error(id: RequestId, error: &Error) -> Self {
        Self {
            id,
            ok: false,
            partial: false,
            result: Payload::Error(ErrorBody {
                kind: error.kind().into_static().to_string(),
                error: error.to_string(),
            }),
        }
    }

    /// Returns the snapshot payload, if any.
    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match &self.result {
            Payload::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
