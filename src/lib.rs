pub mod bridge;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod provision;
pub mod server;

pub use bridge::{Authorizer, EngineBridge, Interruption, RequestContext};
pub use config::Config;
pub use server::AuthorizationService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
