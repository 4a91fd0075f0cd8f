#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod store;
pub mod traits;
pub mod types;

// Re-exports for convenient access
pub use client::SessionClient;
pub use config::ClientConfig;
pub use error::Error;
pub use flow::{FlowController, Handoff};
pub use store::{AuthSnapshot, SessionStore};
pub use traits::{AuthApi, Navigator};
pub use types::{
    AccessToken, Credentials, Provider, Registration, Session, SessionState, UserId,
};
