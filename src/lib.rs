//! `datahub` is a crate to work with [Frictionless data packages](https://frictionlessdata.io/docs/data-package/)
//! hosted on <https://datahub.io>.
//!
//! These features are supported:
//! * Inits a data package descriptor from a file or a directory, optionally asking for metadata.
//! * Validates a descriptor and the local data it references.
//! * Pushes a data package to DataHub under the authenticated user.
//! * Searches DataHub with a lazily paged stream.
//! * Opens a package from an identifier, a dataset URL or a descriptor URL, private ones included.
//!
//! All the network work goes through the [`registry::Registry`] trait, so a fake registry can be
//! injected with [`DataHub::with_registry`].
//!
//! ## Example
//!
//! To init and push a directory:
//! ```rust,no_run
//! # async fn run() -> Result<(), datahub::client::Error> {
//! use datahub::{Config, DataHub, registry::Findability};
//!
//! let hub = DataHub::connect(Config::default().with_token("eyJhbG...")).await?;
//! let package = hub.init("./my-data", false)?;  // `true` asks for name, title, description and license
//! let outcome = hub.push(&package, Findability::Published).await?;
//! println!("pushed as {}", outcome.dataset_id);
//! # Ok(())
//! # }
//! ```
//!
//! To search:
//! ```rust,no_run
//! # async fn run() -> Result<(), datahub::client::Error> {
//! use datahub::{DataHub, registry::SearchQuery};
//! use futures::TryStreamExt;
//!
//! let hub = DataHub::anonymous()?;
//! let found: Vec<_> = hub.search(SearchQuery::new("gdp")).try_collect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! To open:
//! ```rust,no_run
//! # async fn run() -> Result<(), datahub::client::Error> {
//! let hub = datahub::DataHub::anonymous()?;
//! let package = hub.open("core/gdp").await?;  // or "https://datahub.io/core/gdp/v/10"
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod identifier;
pub mod package;
pub mod registry;
pub mod search;

pub use client::DataHub;
pub use config::Config;
pub use package::Package;
