//! BReact client SDK.
//!
//! Invokes remotely hosted BReact services. The backend runs every request
//! asynchronously: a submission returns a process handle at once, and the
//! result is fetched by polling until the job completes or fails. This crate
//! turns that into a single awaited call.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Sequences calls to the [`protocol::Transport`] port;
//! wire types and errors come from [`protocol`], the HTTP implementation from
//! `http-transport`.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`ClientConfig`] and its environment resolution |
//! | [`poll`] | [`PollEngine`]: polls one process to a terminal status |
//! | [`executor`] | [`Executor`]: submit-then-poll, single and batched |
//! | [`registry`] | [`ServiceRegistry`]: definitions and live instances |
//! | [`service`] | [`ServiceInstance`], [`ServiceWrapper`], [`GenericService`] |
//! | [`services`] | Pre-built wrappers ([`SummarizationService`]) |
//! | [`catalog`] | [`ServiceCatalog`]: service ID → wrapper constructor |
//! | [`client`] | [`BReactClient`], the facade over all of the above |
//! | `testing` | `ScriptedTransport`, an in-memory transport (feature `test-util`) |
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), protocol::BReactError> {
//! use sdk::{BReactClient, SummarizationService};
//!
//! let client = BReactClient::from_env()?;
//! client.fetch_services().await?;
//! if let Some(summarizer) = client.get_service_as::<SummarizationService>().await? {
//!     let response = summarizer.summarize("Long text...", Some(50)).await?;
//!     println!("{:?}", response.content());
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod executor;
pub mod poll;
pub mod registry;
pub mod service;
pub mod services;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use catalog::{ServiceCatalog, WrapperFactory};
pub use client::{BReactClient, ClientBuilder, ClientRef};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use executor::{Executor, SubmitRequest};
pub use poll::PollEngine;
pub use registry::ServiceRegistry;
pub use service::{downcast_service, GenericService, ServiceCore, ServiceInstance, ServiceWrapper};
pub use services::SummarizationService;
