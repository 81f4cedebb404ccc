/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Service clients built on the [`aws_http`] request lifecycle.
//!
//! [`defaults::handlers`] installs the handlers every AWS request needs: endpoint validation,
//! user agent, signing, dispatch through the configured connector and response validation.
//! Protocols add their own serialization handlers on top, eg. [`json::install`]. [`Waiter`] and
//! [`Pager`] drive a request repeatedly: until a resource reaches a state, or over every page.

pub mod client;
pub mod defaults;
pub mod json;
pub mod paginator;
pub mod test_connection;
pub mod waiter;

pub use client::Client;
pub use paginator::Pager;
pub use waiter::{Matcher, Waiter, WaiterAcceptor, WaiterState};
