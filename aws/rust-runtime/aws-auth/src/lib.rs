/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential caching.
//!
//! [`CredentialsCache`] wraps any [`ProvideCredentials`](aws_types::credential::ProvideCredentials)
//! implementation and serves its result until it (nearly) expires.

pub mod cache;

pub use cache::CredentialsCache;
