/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub mod credential;
pub mod region;

pub use credential::Credentials;
pub use region::Region;
