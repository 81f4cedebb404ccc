/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! AWS SDK Credentials
//!
//! ## Implementing your own credentials provider
//!
//! [`Credentials`] implement [`ProvideCredentials`] directly, so static keys need no custom
//! provider. If you are loading credentials dynamically, implement [`ProvideCredentials`] by
//! defining an inherent `async fn` on your structure, then calling that method from the trait
//! implementation, or wrap a closure with [`provide_credentials_fn`].
//! ```rust
//! use aws_types::credential::{self, provide_credentials, Credentials, CredentialsError};
//! use aws_types::credential::provide_credentials::future::ProvideCredentials;
//! #[derive(Debug)]
//! struct SubprocessCredentialProvider;
//!
//! async fn invoke_command(command: &str) -> String {
//!     // implementation elided...
//!     # String::from("akid\nsecret")
//! }
//!
//! /// Parse access key and secret from the first two lines of a string
//! fn parse_credentials(creds: &str) -> credential::Result {
//!     let mut lines = creds.lines();
//!     let akid = lines.next().ok_or(CredentialsError::ProviderError("invalid credentials".into()))?;
//!     let secret = lines.next().ok_or(CredentialsError::ProviderError("invalid credentials".into()))?;
//!     Ok(Credentials::new(akid, secret, None, None, "CustomCommand"))
//! }
//!
//! impl SubprocessCredentialProvider {
//!     async fn load_credentials(&self) -> credential::Result {
//!         let creds = invoke_command("load-credentials.py").await;
//!         parse_credentials(&creds)
//!     }
//! }
//!
//! impl provide_credentials::ProvideCredentials for SubprocessCredentialProvider {
//!     fn provide_credentials<'a>(&'a self) -> ProvideCredentials<'a> where Self: 'a {
//!         ProvideCredentials::new(self.load_credentials())
//!     }
//! }
//! ```

pub mod credentials;
pub mod provide_credentials;

pub use credentials::Credentials;
pub use provide_credentials::future;
pub use provide_credentials::provide_credentials_fn;
pub use provide_credentials::CredentialsError;
pub use provide_credentials::ProvideCredentials;
pub use provide_credentials::Result;
pub use provide_credentials::SharedCredentialsProvider;
