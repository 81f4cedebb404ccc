/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Request signing seam.
//!
//! Signature algorithms live outside this crate. A [`SignRequest`] implementation receives the
//! fully built HTTP request along with the credentials loaded for the current attempt.

use aws_types::Credentials;
use smithy_http::body::SdkBody;
use smithy_http::connector::BoxError;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

/// Scope a signature is computed for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningParams {
    pub signing_name: String,
    pub signing_region: Option<String>,
    pub time: SystemTime,
}

pub trait SignRequest: Send + Sync + Debug {
    fn sign(
        &self,
        request: &mut http::Request<SdkBody>,
        credentials: &Credentials,
        params: &SigningParams,
    ) -> Result<(), BoxError>;
}

#[derive(Clone, Debug)]
pub struct SharedSigner(Arc<dyn SignRequest>);

impl SharedSigner {
    pub fn new(signer: impl SignRequest + 'static) -> Self {
        SharedSigner(Arc::new(signer))
    }
}

impl SignRequest for SharedSigner {
    fn sign(
        &self,
        request: &mut http::Request<SdkBody>,
        credentials: &Credentials,
        params: &SigningParams,
    ) -> Result<(), BoxError> {
        self.0.sign(request, credentials, params)
    }
}
