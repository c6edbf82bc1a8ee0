//! forecast-advice: monthly budgeting advice from a hosted language model

pub mod provider;
pub mod request;

pub use provider::{AdviceError, AdviceGenerator, HttpAdvisor, Provider, ProviderConfig};
pub use request::{AdviceRequest, FALLBACK_ADVICE};
