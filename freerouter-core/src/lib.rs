//! Provider discovery and proxy config generation for freerouter.
//!
//! This crate provides:
//! - A [`Provider`](providers::Provider) trait with remote, local, static and
//!   manual variants
//! - A [`ProviderFactory`](factory::ProviderFactory) keyed by declaration
//!   type tag, with `${NAME}` environment placeholders resolved up front
//! - A [`Fetcher`](fetcher::Fetcher) that merges every provider's models into
//!   one proxy config and writes it atomically
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                providers.yaml                        │
//! └─────────────────────────────────────────────────────┘
//!                          │  ProviderFactory
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  ┌────────────┐ ┌────────────┐ ┌────────┐ ┌──────┐  │
//! │  │ openrouter │ │   ollama   │ │ static │ │manual│  │
//! │  │ modelscope │ │  (local)   │ │        │ │      │  │
//! │  │ iflow, oai │ │            │ │        │ │      │  │
//! │  └────────────┘ └────────────┘ └────────┘ └──────┘  │
//! └─────────────────────────────────────────────────────┘
//!                          │  Fetcher
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │        config.yaml (model_list + settings)          │
//! └─────────────────────────────────────────────────────┘
//! ```

mod error;
mod types;

pub mod auth;
pub mod config;
pub mod env;
pub mod factory;
pub mod fetcher;
pub mod providers;

pub use error::{Error, Result};
pub use fetcher::{FetchReport, Fetcher};
pub use types::{
    BackendParams, Capabilities, LitellmSettings, ModelDescriptor, OutputDocument, Pricing,
    RouterSettings, ServiceEntry,
};
