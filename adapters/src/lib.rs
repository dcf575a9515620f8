//! # PixHub Adapters
//!
//! Instant-payment (PIX) provider abstraction with:
//! - One provider contract, five bank adapters
//! - Status/error normalization into a canonical model
//! - Health-based provider selection and fallback
//! - Sealed credential storage
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │     ProviderManager (health, priority, fallback)    │
//! └────────────┬────────────────────────────────────────┘
//!              │
//! ┌────────────▼────────────────────────────────────────┐
//! │          ProviderRegistry (code -> adapter)         │
//! └────────────┬────────────────────────────────────────┘
//!              │
//!     ┌────────┼──────────┬───────────┬───────────┐
//!     │        │          │           │           │
//! ┌───▼───┐ ┌──▼──┐ ┌─────▼────┐ ┌────▼──┐ ┌──────▼───┐
//! │ Inter │ │ BB  │ │Santander │ │ Itaú  │ │ Bradesco │
//! └───┬───┘ └──┬──┘ └─────┬────┘ └────┬──┘ └──────┬───┘
//!     │        │          │           │           │
//!     └────────┴──────────┼───────────┴───────────┘
//!                         │
//! ┌───────────────────────▼─────────────────────────────┐
//! │   Shared HTTP: OAuth2/mTLS, deadline, classification │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pix_adapters::settings::Settings;
//! use pix_adapters::{bootstrap, CallContext, ProviderSelection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(None)?;
//! let registry = bootstrap::build_registry(&settings)?;
//! let manager = bootstrap::build_manager(&settings, registry);
//!
//! manager.check_all(&CallContext::new()).await;
//! let provider = manager.get_healthy_provider(&ProviderSelection::prefer("itau"))?;
//! println!("routing to {}", provider.name());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod bb;
pub mod bootstrap;
pub mod bradesco;
pub mod context;
pub mod credentials;
pub mod error;
mod http;
pub mod inter;
pub mod itau;
pub mod manager;
pub mod metrics;
pub mod money;
pub mod provider;
pub mod registry;
pub mod santander;
pub mod settings;
pub mod types;

pub use bb::BancoDoBrasilProvider;
pub use bradesco::BradescoProvider;
pub use context::CallContext;
pub use credentials::{CredentialsError, StoredCredentials};
pub use error::{ErrorCode, ProviderError, Result};
pub use inter::InterProvider;
pub use itau::ItauProvider;
pub use manager::{HealthRecord, HealthStatus, ProviderHealth, ProviderManager, ProviderSelection};
pub use provider::PixProvider;
pub use registry::ProviderRegistry;
pub use santander::SantanderProvider;
pub use types::*;

/// Default request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default retry budget advertised to callers
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default health freshness window (seconds)
pub const DEFAULT_HEALTH_FRESHNESS_SECONDS: u64 = 300;
