//! Connection lifecycle and client construction for AWS service bindings.
//!
//! A [`Connection`] owns one service client and drives it through
//! `init`/`start`/`stop`/`close`. What the client is, and how it is built from
//! resolved credentials, transport settings and an endpoint, is supplied by a
//! [`ClientFactory`]; the service crates provide factories for S3, SNS and SQS.

mod auth;
mod client;
mod config;
mod connection;
mod endpoint;
mod error;
mod factory;
mod lifecycle;
mod progress;
mod retry;
mod transport;
mod types;

pub use auth::{Authentication, Credentials, KeysAuthentication};
pub use client::ClientBuilder;
pub use config::{ConnectionConfig, parse_bool};
pub use connection::{Connection, ConnectionState};
pub use endpoint::{CustomEndpoint, EndpointBuilder, RegionOnly};
pub use error::{ConnectionError, ConnectionResult, ShutdownError};
pub use factory::ClientFactory;
pub use lifecycle::{
    Lifecycle, init_and_start, init_and_start_all, stop_and_close, stop_and_close_all,
};
pub use progress::{DEFAULT_PROGRESS_INTERVAL, ProgressMonitor, TransferProgress};
pub use retry::{PluggableRetryPolicy, RetryPolicy, RetryPolicyFactory, RetryStrategy};
pub use transport::TransportConfig;
pub use types::AwsRegion;
