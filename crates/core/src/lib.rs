//! DroidKit Core - Observer registry and shared types
//!
//! This crate provides the typed observer registry used by every DroidKit
//! event category, the connectivity notifications built on it, and the
//! configuration and error types shared across the workspace.

pub mod config;
pub mod error;
pub mod network;
pub mod observer;

pub use config::AppConfig;
pub use error::{DroidKitError, Result};
pub use network::{ChannelObserver, LinkEvent, LinkState, NetworkKind, NetworkObserver, NetworkRegistry, NetworkStatus};
pub use observer::{DeliveryFailure, DispatchReport, ObserverId, ObserverRegistry, Subsystem};

/// DroidKit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "DroidKit";
