// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! RPC Transport (spec §4.4).

pub mod transport;

pub use transport::RpcTransport;
