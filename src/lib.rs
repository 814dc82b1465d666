// PIMS history extraction client
// Main library entry point

pub mod client;
pub mod core;
pub mod models;
pub mod utils;

// Re-export main types
pub use crate::client::credentials::{CredentialProvider, EnvCredentials};
pub use crate::client::retry::RetryPolicy;
pub use crate::client::transport::{HistoryTransport, ReqwestTransport};
pub use crate::core::batch::{BatchOrchestrator, TagResult};
pub use crate::core::codec::{Anchor, TimestampCodec};
pub use crate::core::error::{FetchError, PimsError, Result, TransportError};
pub use crate::core::format::{Credentials, PimsTimestamp, TagRequest, TagSeries, TimeWindow};
pub use crate::core::query::{HistoryQuery, QueryBuilder};
pub use crate::core::session::{Outcome, SessionReport, StopReason, SyncSession};
pub use crate::models::config_model::{ClientConfig, JobConfig};
