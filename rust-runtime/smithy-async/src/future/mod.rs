/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Useful runtime-agnostic future implementations.

pub mod cancellable;
pub mod never;
