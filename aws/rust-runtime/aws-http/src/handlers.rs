/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The per-stage handler lists a request runs through.

use crate::request::Request;
use smithy_http::handler::{HandlerList, HandlerListRunItem};

/// Lifecycle stage of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Build,
    Sign,
    Send,
    ValidateResponse,
    Unmarshal,
    UnmarshalMeta,
    UnmarshalError,
    Retry,
    AfterRetry,
    Complete,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Validate => "Validate",
            Stage::Build => "Build",
            Stage::Sign => "Sign",
            Stage::Send => "Send",
            Stage::ValidateResponse => "ValidateResponse",
            Stage::Unmarshal => "Unmarshal",
            Stage::UnmarshalMeta => "UnmarshalMeta",
            Stage::UnmarshalError => "UnmarshalError",
            Stage::Retry => "Retry",
            Stage::AfterRetry => "AfterRetry",
            Stage::Complete => "Complete",
        }
    }
}

/// One handler list per stage.
///
/// Clients own a `Handlers` value and every new request receives its own copy, so customizing a
/// request's handlers never leaks back into the client or into sibling requests.
#[derive(Clone, Debug, Default)]
pub struct Handlers {
    pub validate: HandlerList<Request>,
    pub build: HandlerList<Request>,
    pub sign: HandlerList<Request>,
    pub send: HandlerList<Request>,
    pub validate_response: HandlerList<Request>,
    pub unmarshal: HandlerList<Request>,
    pub unmarshal_meta: HandlerList<Request>,
    pub unmarshal_error: HandlerList<Request>,
    pub retry: HandlerList<Request>,
    pub after_retry: HandlerList<Request>,
    pub complete: HandlerList<Request>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage: Stage) -> &HandlerList<Request> {
        match stage {
            Stage::Validate => &self.validate,
            Stage::Build => &self.build,
            Stage::Sign => &self.sign,
            Stage::Send => &self.send,
            Stage::ValidateResponse => &self.validate_response,
            Stage::Unmarshal => &self.unmarshal,
            Stage::UnmarshalMeta => &self.unmarshal_meta,
            Stage::UnmarshalError => &self.unmarshal_error,
            Stage::Retry => &self.retry,
            Stage::AfterRetry => &self.after_retry,
            Stage::Complete => &self.complete,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut HandlerList<Request> {
        match stage {
            Stage::Validate => &mut self.validate,
            Stage::Build => &mut self.build,
            Stage::Sign => &mut self.sign,
            Stage::Send => &mut self.send,
            Stage::ValidateResponse => &mut self.validate_response,
            Stage::Unmarshal => &mut self.unmarshal,
            Stage::UnmarshalMeta => &mut self.unmarshal_meta,
            Stage::UnmarshalError => &mut self.unmarshal_error,
            Stage::Retry => &mut self.retry,
            Stage::AfterRetry => &mut self.after_retry,
            Stage::Complete => &mut self.complete,
        }
    }

    /// Removes every handler from every stage
    pub fn clear(&mut self) {
        for stage in ALL_STAGES {
            self.stage_mut(*stage).clear();
        }
    }
}

pub(crate) const ALL_STAGES: &[Stage] = &[
    Stage::Validate,
    Stage::Build,
    Stage::Sign,
    Stage::Send,
    Stage::ValidateResponse,
    Stage::Unmarshal,
    Stage::UnmarshalMeta,
    Stage::UnmarshalError,
    Stage::Retry,
    Stage::AfterRetry,
    Stage::Complete,
];

/// After-each interceptor that halts a stage as soon as a handler records an error
pub fn stop_on_error(item: &HandlerListRunItem<'_, Request>) -> bool {
    item.request.error.is_none()
}
