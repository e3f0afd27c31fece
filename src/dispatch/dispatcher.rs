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
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::unbounded;
use log::debug;
use log::warn;

use crate::bundle::Bundle;
use crate::cancel::CancelRegistry;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::dispatch::protocol::Command;
use crate::dispatch::protocol::Request;
use crate::dispatch::protocol::RequestId;
use crate::dispatch::protocol::Response;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::extract::ExtractorRegistry;
use crate::extract::FacetFn;
use crate::extract::NoResolver;
use crate::extract::Resolver;
use crate::extract::SeriesFn;
use crate::run::ProgressiveRun;
use crate::run::StreamingRun;
use crate::shard::Orchestrator;
use crate::snapshot::Snapshot;

enum StreamBackend {
    Local(Box<StreamingRun>),
    Sharded(Box<Orchestrator>),
}

enum Final {
    Done,
    Snapshot(Box<Snapshot>),
}

/// Owner of one session's state, executing commands one at a time.
///
/// All mutable session state lives on this instance and is reachable only
/// through it; nothing is shared across sessions. Long-running commands
/// poll their request's cancellation token at bounded intervals, and a
/// detected cancel ends the request with a successful `cancelled` response.
pub struct Dispatcher {
    config: Option<EngineConfig>,
    registry: ExtractorRegistry,
    resolver: Arc<dyn Resolver>,
    dataset: Vec<Bundle>,
    stream: Option<StreamBackend>,
    cancels: CancelRegistry,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher whose resolver resolves nothing.
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(NoResolver))
    }

    /// Creates a dispatcher with a host-supplied extractor resolver.
    pub fn with_resolver(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            config: None,
            registry: ExtractorRegistry::new(),
            resolver,
            dataset: Vec::new(),
            stream: None,
            cancels: CancelRegistry::new(),
        }
    }

    /// Returns the cancel registry shared with callers.
    pub fn cancels(&self) -> CancelRegistry {
        self.cancels.clone()
    }

    /// Statically registers a facet extractor; the primary registration API.
    pub fn register_facet(&mut self, name: impl Into<String>, extractor: FacetFn) {
        self.registry.register_facet(name, extractor);
    }

    /// Statically registers a series extractor.
    pub fn register_series(&mut self, name: impl Into<String>, extractor: SeriesFn) {
        self.registry.register_series(name, extractor);
    }

    /// Executes one request, emitting zero or more partial responses and
    /// exactly one final response.
    pub fn execute(&mut self, request: Request, emit: &mut dyn FnMut(Response)) {
        let id = request.id;
        if let Command::Cancel { target } = request.command {
            self.cancels.cancel(target);
            emit(Response::done(id));
            return;
        }
        let token = self.cancels.token_for(id);
        if token.is_cancelled() {
            // Cancelled before it started; still gets its terminating
            // response.
            self.cancels.complete(id);
            emit(Response::cancelled(id));
            return;
        }
        let outcome = self.run_command(id, request.command, &token, emit);
        self.cancels.complete(id);
        match outcome {
            Ok(Final::Done) => emit(Response::done(id)),
            Ok(Final::Snapshot(snapshot)) => emit(Response::snapshot(id, *snapshot)),
            Err(error) if error.is_cancelled() => emit(Response::cancelled(id)),
            Err(error) => {
                warn!("request {id} failed: {error}");
                emit(Response::error(id, &error));
            }
        }
    }

    /// Executes one raw JSON request. A request that does not parse into a
    /// known command is answered with an explicit error response; the
    /// dispatcher keeps running.
    pub fn execute_json(&mut self, raw: serde_json::Value, emit: &mut dyn FnMut(Response)) {
        let id = raw.get("id").and_then(|v| v.as_u64()).unwrap_or_default();
        match serde_json::from_value::<Request>(raw) {
            Ok(request) => self.execute(request, emit),
            Err(parse_error) => {
                let error = Error::new(ErrorKind::UnknownCommand, "unrecognized command")
                    .set_source(parse_error);
                emit(Response::error(id, &error));
            }
        }
    }

    /// Moves the dispatcher onto a worker thread, returning a handle that
    /// pairs it with request/response channels. The handle's `cancel`
    /// reaches a request that is already running.
    pub fn spawn(self) -> DispatcherHandle {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (response_tx, response_rx) = unbounded::<Response>();
        let cancels = self.cancels();
        let thread = std::thread::Builder::new()
            .name("bundlestats-dispatcher".to_string())
            .spawn(move || {
                let mut dispatcher = self;
                for request in request_rx {
                    dispatcher.execute(request, &mut |response| {
                        let _ = response_tx.send(response);
                    });
                }
            })
            .ok();
        DispatcherHandle {
            requests: request_tx,
            responses: response_rx,
            cancels,
            thread,
        }
    }

    fn run_command(
        &mut self,
        id: RequestId,
        command: Command,
        token: &CancelToken,
        emit: &mut dyn FnMut(Response),
    ) -> Result<Final, Error> {
        match command {
            Command::Init { config } => {
                config.validate()?;
                debug!(
                    "session init: {} series, {} facets, {} shards",
                    config.series.len(),
                    config.facets.len(),
                    config.shards
                );
                self.config = Some(config);
                self.stream = None;
                Ok(Final::Done)
            }
            Command::Load { chunks } => {
                self.dataset = chunks.into_iter().flat_map(|chunk| chunk.bundles).collect();
                Ok(Final::Done)
            }
            Command::AddData { chunks } => {
                for chunk in chunks {
                    self.dataset.extend(chunk.bundles);
                }
                Ok(Final::Done)
            }
            Command::ComputeProgressive { filter } => {
                let config = self.config()?.clone();
                let mut run =
                    ProgressiveRun::new(&self.dataset, filter.as_ref(), &config, &self.registry)?;
                for threshold in &config.thresholds {
                    run.advance_to(*threshold, token)?;
                    emit(Response::partial_snapshot(id, run.snapshot()));
                }
                Ok(Final::Done)
            }
            Command::StreamInit {
                expected_requests,
                filter,
            } => {
                let config = self.config()?.clone();
                let backend = if config.shards > 1 {
                    let mut orchestrator = Orchestrator::new(&config, &self.registry)?;
                    orchestrator.stream_init(expected_requests, filter.as_ref())?;
                    StreamBackend::Sharded(Box::new(orchestrator))
                } else {
                    StreamBackend::Local(Box::new(StreamingRun::new(
                        &config,
                        &self.registry,
                        filter,
                        expected_requests,
                    )))
                };
                self.stream = Some(backend);
                Ok(Final::Done)
            }
            Command::StreamAdd {
                chunk,
                requests_delta,
            } => {
                let snapshot = match self.stream_mut()? {
                    StreamBackend::Local(run) => {
                        run.ingest(vec![chunk], requests_delta, token)?;
                        run.snapshot()
                    }
                    StreamBackend::Sharded(orchestrator) => {
                        orchestrator.stream_add(chunk, requests_delta, token)?
                    }
                };
                Ok(Final::Snapshot(Box::new(snapshot)))
            }
            Command::StreamPhase { phase } => {
                let snapshot = match self.stream_mut()? {
                    StreamBackend::Local(run) => {
                        run.advance_to(phase, token)?;
                        run.snapshot()
                    }
                    StreamBackend::Sharded(orchestrator) => {
                        orchestrator.stream_phase(phase, token)?
                    }
                };
                Ok(Final::Snapshot(Box::new(snapshot)))
            }
            Command::StreamFinalize => {
                let snapshot = match self.stream_mut()? {
                    StreamBackend::Local(run) => run.finalize(),
                    StreamBackend::Sharded(orchestrator) => orchestrator.finalize()?,
                };
                Ok(Final::Snapshot(Box::new(snapshot)))
            }
            Command::StreamEnd => {
                if let Some(StreamBackend::Sharded(mut orchestrator)) = self.stream.take() {
                    orchestrator.end();
                }
                Ok(Final::Done)
            }
            Command::FacetImport { name, source } => {
                self.registry
                    .import_facet(&name, &source, self.resolver.as_ref())?;
                Ok(Final::Done)
            }
            Command::SeriesImport { name, source } => {
                self.registry
                    .import_series(&name, &source, self.resolver.as_ref())?;
                Ok(Final::Done)
            }
            Command::Cancel { .. } => unreachable!("cancel is handled before run_command"),
        }
    }

    fn config(&self) -> Result<&EngineConfig, Error> {
        self.config.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "init has not been called")
        })
    }

    fn stream_mut(&mut self) -> Result<&mut StreamBackend, Error> {
        self.stream.as_mut().ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "no active streaming session")
        })
    }
}

/// Channel-backed front-end of a spawned dispatcher.
pub struct DispatcherHandle {
    requests: Sender<Request>,
    responses: Receiver<Response>,
    cancels: CancelRegistry,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Enqueues one request.
    pub fn send(&self, request: Request) -> Result<(), Error> {
        self.requests.send(request).map_err(|_| {
            Error::new(ErrorKind::ShardFailed, "dispatcher worker is unreachable")
        })
    }

    /// The response stream: zero or more partials, then exactly one final
    /// response per request id.
    pub fn responses(&self) -> &Receiver<Response> {
        &self.responses
    }

    /// Flags a request for cooperative cancellation. Takes effect even while
    /// the target request is running; unknown or finished targets are
    /// no-ops.
    pub fn cancel(&self, target: RequestId) {
        self.cancels.cancel(target);
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        let (orphan_tx, _) = unbounded();
        drop(std::mem::replace(&mut self.requests, orphan_tx));
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("dispatcher worker panicked during teardown");
            }
        }
    }
}
