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

use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::unbounded;
use log::debug;
use log::warn;

use crate::bundle::Chunk;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::extract::ExtractorRegistry;
use crate::filter::FilterSpec;
use crate::run::StreamingRun;
use crate::shard::merge::merge_partials;
use crate::snapshot::Partial;
use crate::snapshot::Snapshot;

enum ShardRequest {
    StreamInit {
        filter: Option<FilterSpec>,
    },
    Ingest {
        chunks: Vec<Chunk>,
        cancel: CancelToken,
    },
    Advance {
        phase: f64,
        cancel: CancelToken,
    },
    Partial,
    Finalize,
}

enum ShardReply {
    Ack,
    Partial(Box<Partial>),
}

struct ShardHandle {
    sender: Sender<ShardRequest>,
    receiver: Receiver<Result<ShardReply, Error>>,
    thread: Option<JoinHandle<()>>,
    alive: bool,
}

/// Parallelizes streaming ingestion across N shard workers and merges their
/// partial snapshots into one externally consistent view.
///
/// Each shard is an independent [`StreamingRun`] on its own thread with its
/// own per-shard delivery accounting pinned to one expected request; the
/// orchestrator tracks the true received/expected totals for the session.
/// Shard faults are isolated: a failing shard rejects only its own
/// in-flight request and is skipped afterwards.
pub struct Orchestrator {
    config: EngineConfig,
    shards: Vec<ShardHandle>,
    next: usize,
    received: u64,
    expected: u64,
}

impl Orchestrator {
    /// Spawns the shard workers and propagates the session configuration,
    /// including every registered extractor, to each of them.
    pub fn new(config: &EngineConfig, registry: &ExtractorRegistry) -> Result<Self, Error> {
        config.validate()?;
        let mut shards = Vec::with_capacity(config.shards);
        for index in 0..config.shards {
            let (request_tx, request_rx) = unbounded::<ShardRequest>();
            let (reply_tx, reply_rx) = unbounded::<Result<ShardReply, Error>>();
            let worker_config = config.clone();
            let worker_registry = registry.clone();
            let thread = std::thread::Builder::new()
                .name(format!("bundlestats-shard-{index}"))
                .spawn(move || shard_worker(worker_config, worker_registry, request_rx, reply_tx))
                .map_err(|e| {
                    Error::new(ErrorKind::ShardFailed, "failed to spawn shard worker")
                        .with_context("shard", index)
                        .set_source(e)
                })?;
            shards.push(ShardHandle {
                sender: request_tx,
                receiver: reply_rx,
                thread: Some(thread),
                alive: true,
            });
        }
        Ok(Self {
            config: config.clone(),
            shards,
            next: 0,
            received: 0,
            expected: 0,
        })
    }

    /// Returns the number of spawned shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Allocates one run per shard and resets session accounting.
    pub fn stream_init(
        &mut self,
        expected_requests: u64,
        filter: Option<&FilterSpec>,
    ) -> Result<(), Error> {
        for index in 0..self.shards.len() {
            let reply = self.request(
                index,
                ShardRequest::StreamInit {
                    filter: filter.cloned(),
                },
            );
            reply?;
        }
        self.received = 0;
        self.expected = expected_requests;
        self.next = 0;
        Ok(())
    }

    /// Assigns one chunk to exactly one shard by round-robin, updates the
    /// session accounting, and returns a freshly merged snapshot.
    pub fn stream_add(
        &mut self,
        chunk: Chunk,
        requests_delta: i64,
        cancel: &CancelToken,
    ) -> Result<Snapshot, Error> {
        let index = self.pick_shard()?;
        self.request(
            index,
            ShardRequest::Ingest {
                chunks: vec![chunk],
                cancel: cancel.clone(),
            },
        )?;
        self.received += 1;
        self.expected = self.expected.saturating_add_signed(requests_delta);
        self.merged_snapshot()
    }

    /// Broadcasts a phase advance to every shard in parallel, waits for all
    /// of them, and returns the merged snapshot.
    pub fn stream_phase(&mut self, phase: f64, cancel: &CancelToken) -> Result<Snapshot, Error> {
        self.broadcast(|| ShardRequest::Advance {
            phase,
            cancel: cancel.clone(),
        })?;
        self.merged_snapshot()
    }

    /// Closes session accounting, finalizes every shard, and returns the
    /// final merged snapshot.
    pub fn finalize(&mut self) -> Result<Snapshot, Error> {
        self.expected = self.expected.max(self.received);
        let partials = self.gather(ShardRequest::Finalize)?;
        Ok(merge_partials(
            &partials,
            self.received,
            self.expected,
            &self.config,
        ))
    }

    /// Tears down every shard session.
    pub fn end(&mut self) {
        for shard in &mut self.shards {
            // Dropping the sender ends the worker loop.
            let (orphan_tx, _) = unbounded();
            drop(std::mem::replace(&mut shard.sender, orphan_tx));
            if let Some(thread) = shard.thread.take() {
                if thread.join().is_err() {
                    warn!("shard worker panicked during teardown");
                }
            }
            shard.alive = false;
        }
        self.shards.clear();
    }

    fn pick_shard(&mut self) -> Result<usize, Error> {
        let count = self.shards.len();
        for _ in 0..count {
            let index = self.next;
            self.next = (self.next + 1) % count;
            if self.shards[index].alive {
                return Ok(index);
            }
        }
        Err(Error::new(
            ErrorKind::ShardFailed,
            "no live shard workers remain",
        ))
    }

    fn request(&mut self, index: usize, request: ShardRequest) -> Result<ShardReply, Error> {
        let shard = &mut self.shards[index];
        if !shard.alive {
            return Err(Error::new(ErrorKind::ShardFailed, "shard worker is down")
                .with_context("shard", index));
        }
        if shard.sender.send(request).is_err() {
            shard.alive = false;
            return Err(
                Error::new(ErrorKind::ShardFailed, "shard worker is unreachable")
                    .with_context("shard", index),
            );
        }
        match shard.receiver.recv() {
            Ok(reply) => reply.map_err(|e| e.with_context("shard", index)),
            Err(_) => {
                shard.alive = false;
                warn!("shard {index} exited while a request was in flight");
                Err(
                    Error::new(ErrorKind::ShardFailed, "shard worker exited mid-request")
                        .with_context("shard", index),
                )
            }
        }
    }

    /// Sends one request to every live shard before collecting any reply,
    /// so the shards work in parallel.
    fn broadcast(&mut self, make: impl Fn() -> ShardRequest) -> Result<(), Error> {
        let mut pending = Vec::new();
        for (index, shard) in self.shards.iter_mut().enumerate() {
            if !shard.alive {
                continue;
            }
            if shard.sender.send(make()).is_err() {
                shard.alive = false;
                warn!("shard {index} is unreachable, skipping");
                continue;
            }
            pending.push(index);
        }
        let mut first_error = None;
        for index in pending {
            let shard = &mut self.shards[index];
            match shard.receiver.recv() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e.with_context("shard", index));
                }
                Err(_) => {
                    shard.alive = false;
                    first_error.get_or_insert(
                        Error::new(ErrorKind::ShardFailed, "shard worker exited mid-request")
                            .with_context("shard", index),
                    );
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn gather(&mut self, template: ShardRequest) -> Result<Vec<Partial>, Error> {
        // Partial and Finalize carry no payload, so the template can be
        // re-sent to every shard.
        let requests: Vec<ShardRequest> = match template {
            ShardRequest::Partial => (0..self.shards.len()).map(|_| ShardRequest::Partial).collect(),
            ShardRequest::Finalize => (0..self.shards.len())
                .map(|_| ShardRequest::Finalize)
                .collect(),
            _ => unreachable!("gather is only used for payload-free requests"),
        };
        let mut pending = Vec::new();
        for (index, request) in requests.into_iter().enumerate() {
            let shard = &mut self.shards[index];
            if !shard.alive {
                continue;
            }
            if shard.sender.send(request).is_err() {
                shard.alive = false;
                warn!("shard {index} is unreachable, skipping");
                continue;
            }
            pending.push(index);
        }
        let mut partials = Vec::with_capacity(pending.len());
        for index in pending {
            let shard = &mut self.shards[index];
            match shard.receiver.recv() {
                Ok(Ok(ShardReply::Partial(partial))) => partials.push(*partial),
                Ok(Ok(ShardReply::Ack)) => {}
                Ok(Err(e)) => return Err(e.with_context("shard", index)),
                Err(_) => {
                    shard.alive = false;
                    warn!("shard {index} exited while gathering partials, skipping");
                }
            }
        }
        Ok(partials)
    }

    fn merged_snapshot(&mut self) -> Result<Snapshot, Error> {
        let partials = self.gather(ShardRequest::Partial)?;
        debug!(
            "merged {} shard partials at received={} expected={}",
            partials.len(),
            self.received,
            self.expected
        );
        Ok(merge_partials(
            &partials,
            self.received,
            self.expected,
            &self.config,
        ))
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.end();
    }
}

fn shard_worker(
    config: EngineConfig,
    registry: ExtractorRegistry,
    requests: Receiver<ShardRequest>,
    replies: Sender<Result<ShardReply, Error>>,
) {
    let mut run: Option<StreamingRun> = None;
    for request in requests {
        let reply = match request {
            ShardRequest::StreamInit { filter } => {
                run = Some(StreamingRun::new(&config, &registry, filter, 1));
                Ok(ShardReply::Ack)
            }
            ShardRequest::Ingest { chunks, cancel } => match run.as_mut() {
                Some(run) => run.ingest(chunks, 0, &cancel).map(|_| ShardReply::Ack),
                None => Err(no_session()),
            },
            ShardRequest::Advance { phase, cancel } => match run.as_mut() {
                Some(run) => run.advance_to(phase, &cancel).map(|_| ShardReply::Ack),
                None => Err(no_session()),
            },
            ShardRequest::Partial => match run.as_ref() {
                Some(run) => Ok(ShardReply::Partial(Box::new(run.partial()))),
                None => Err(no_session()),
            },
            ShardRequest::Finalize => match run.as_mut() {
                Some(run) => {
                    let _ = run.finalize();
                    Ok(ShardReply::Partial(Box::new(run.partial())))
                }
                None => Err(no_session()),
            },
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

fn no_session() -> Error {
    Error::new(ErrorKind::ShardFailed, "no streaming session on this shard")
}
