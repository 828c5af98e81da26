//! Blog UI: browse a remote blog catalog through a façade that keeps serving
//! placeholder pages while the upstream API is unhealthy.

pub mod circuit;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod model;
pub mod query;
pub mod render;
pub mod web;

pub use circuit::{CircuitPolicy, CircuitState, ResilienceGuard};
pub use client::{CatalogBackend, RemoteCatalogClient};
pub use error::{CatalogError, CatalogResult};
pub use facade::CatalogFacade;
pub use model::{Author, Entry, FrontMatter, Page, PageRequest};
pub use query::{CatalogQuery, QueryKind};
