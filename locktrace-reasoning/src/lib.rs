pub mod client;
pub mod error;
pub mod http;
pub mod profile;
pub mod service;

pub use client::{Invocation, ReasoningClient};
pub use error::{ReasoningError, ReasoningServiceError};
pub use http::HttpReasoningService;
pub use profile::{ModelProfile, ReasoningConfig};
pub use service::{Completion, Prompt, ReasoningService};
