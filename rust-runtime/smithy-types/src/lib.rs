/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub mod rand;
pub mod retry;

/// Untyped, JSON-shaped value
///
/// Operation parameters and unmarshaled output are carried through the request pipeline as
/// documents so that the engine stays agnostic of any particular service's shapes.
pub type Document = serde_json::Value;
