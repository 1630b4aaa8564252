pub mod provider;
pub mod resilient;
pub mod sidecar;
pub mod tei;

pub use provider::{EmbeddingError, EmbeddingProvider};
pub use resilient::{ResilientProvider, RetryConfig, is_retryable_error, wrap_resilient, wrap_resilient_arc};
pub use sidecar::{Sidecar, SidecarError, SidecarState};
pub use tei::TeiProvider;
