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

//! Transport-agnostic command protocol.
//!
//! Each request carries a unique id; responses echo it. Zero or more
//! `partial: true` responses precede exactly one final response per id.
//! Every fault inside one request is caught at the dispatcher boundary and
//! returned as an error response for that id only; cancellation is converted
//! into a *successful* `{done: true, cancelled: true}` final response.
//!
//! The [`Dispatcher`] owns all per-session state (configuration, dataset,
//! extractor registry, streaming backend) and is driven either synchronously
//! via [`Dispatcher::execute`] or from a worker thread via
//! [`Dispatcher::spawn`], which pairs it with request/response channels.

mod dispatcher;
mod protocol;

pub use self::dispatcher::Dispatcher;
pub use self::dispatcher::DispatcherHandle;
pub use self::protocol::Command;
pub use self::protocol::Done;
pub use self::protocol::ErrorBody;
pub use self::protocol::Payload;
pub use self::protocol::Request;
pub use self::protocol::RequestId;
pub use self::protocol::Response;
