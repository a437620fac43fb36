//! Blocking client for the CKAN open-data catalog action API.
//!
//! # Overview
//! Typed lookup, search, create and update operations over
//! `<catalog>/api/3/action/<action>`. Each call is one request/response round
//! trip; update operations may first read the current record so that field
//! groups the caller did not set are not erased on the server.
//!
//! # Design
//! - `CkanClient` is immutable after construction and `Send + Sync`.
//! - Requests and responses are plain data (`http`); the `Transport` trait is
//!   the only I/O seam, with a `ureq` implementation as the default.
//! - Every response is a `{help, success, error, result}` envelope decoded by
//!   one shared `Codec`; `success: false` always becomes `CkanError::Remote`.
//! - Payload types for create/update are separate from read-side records and
//!   keep "unset" (`None`) apart from "set to empty" (`Some(empty)`).

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod invoker;
pub mod query;
pub mod reconcile;
pub mod timestamp;
pub mod transport;
pub mod types;

pub use client::{dataset_page_url, group_page_url, resource_page_url, CkanClient};
pub use config::{ClientConfig, ProxyConfig};
pub use envelope::{Codec, Envelope, ErrorInfo};
pub use error::{CkanError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::{build_search_params, CkanQuery};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use transport::UreqTransport;
pub use types::{
    Dataset, DatasetPayload, Extra, Group, GroupOrg, GroupRef, License, Organization,
    OrganizationPayload, Resource, ResourcePayload, SearchResults, Tag, User,
};
