/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Request lifecycle for AWS service clients.
//!
//! A [`Request`](request::Request) carries one API call through a series of handler stages
//! ([`Handlers`](handlers::Handlers)), retrying failed attempts according to a
//! [`Retryer`](retry::Retryer). Protocol specific behavior (serialization, signing, decoding
//! error responses) is plugged in as handlers.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod operation;
pub mod options;
pub mod request;
pub mod retry;
pub mod signing;
pub mod user_agent;

pub use config::Config;
pub use error::SdkError;
pub use request::Request;
