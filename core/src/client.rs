//! Catalog operations over the CKAN action API.
//!
//! # Design
//! `CkanClient` is a thin, blocking wrapper: one public method is one action
//! call (`GET`/`POST <catalog>/api/3/action/<action>`), except the two update
//! operations, which may first read the current record to avoid erasing
//! fields the caller did not set (see `reconcile`).
//!
//! The client is immutable after construction and holds no per-call state,
//! so a single instance can be shared across threads.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{CkanError, Result};
use crate::http::Transport;
use crate::invoker::{Invoker, APPLICATION_JSON};
use crate::query::{build_search_params, CkanQuery};
use crate::reconcile::{reconcile_dataset, reconcile_resource};
use crate::transport::UreqTransport;
use crate::types::{
    Dataset, DatasetPayload, Group, License, Organization, OrganizationPayload, Resource,
    ResourcePayload, SearchResults, Tag, User,
};

const ACTION_PATH: &str = "/api/3/action/";

fn action(name: &str) -> String {
    format!("{ACTION_PATH}{name}")
}

/// Blocking client for one CKAN catalog.
#[derive(Debug)]
pub struct CkanClient<T = UreqTransport> {
    invoker: Invoker<T>,
}

impl CkanClient<UreqTransport> {
    /// Client talking HTTP through `ureq`, honouring the configured proxy
    /// and timeout.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = UreqTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> CkanClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            invoker: Invoker::new(config, transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.invoker.config()
    }

    pub fn catalog_url(&self) -> &str {
        self.invoker.config().catalog_url()
    }

    // -----------------------------------------------------------------------
    // Display URLs
    // -----------------------------------------------------------------------

    pub fn dataset_url(&self, dataset_id_or_name: &str) -> Result<String> {
        dataset_page_url(self.catalog_url(), dataset_id_or_name)
    }

    pub fn resource_url(&self, dataset_id_or_name: &str, resource_id: &str) -> Result<String> {
        resource_page_url(self.catalog_url(), dataset_id_or_name, resource_id)
    }

    pub fn group_url(&self, group_name_or_id: &str) -> Result<String> {
        group_page_url(self.catalog_url(), group_name_or_id)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Names of all datasets, e.g. `limestone-pavement-orders`.
    pub fn dataset_list(&self) -> Result<Vec<String>> {
        self.get("package_list", &[])
    }

    /// One page of dataset names. `offset` starts at 0, so `(1, 0)` returns
    /// exactly one name on a non-empty catalog.
    pub fn dataset_list_page(&self, limit: u32, offset: u32) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let offset = offset.to_string();
        self.get("package_list", &[("limit", limit.as_str()), ("offset", offset.as_str())])
    }

    pub fn license_list(&self) -> Result<Vec<License>> {
        self.get("license_list", &[])
    }

    /// Dataset by name or id, with `package_id` set on every nested resource.
    pub fn get_dataset(&self, id_or_name: &str) -> Result<Dataset> {
        let mut dataset: Dataset = self.get("package_show", &[("id", id_or_name)])?;
        dataset.backfill_resource_package_ids();
        Ok(dataset)
    }

    pub fn user_list(&self) -> Result<Vec<User>> {
        self.get("user_list", &[])
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.get("user_show", &[("id", id)])
    }

    pub fn get_resource(&self, id: &str) -> Result<Resource> {
        self.get("resource_show", &[("id", id)])
    }

    /// All groups with full fields. Organizations are not included.
    pub fn group_list(&self) -> Result<Vec<Group>> {
        self.get("group_list", &[("all_fields", "True")])
    }

    pub fn group_names(&self) -> Result<Vec<String>> {
        self.get("group_list", &[])
    }

    /// Group by name or id. Do not pass an organization id here.
    pub fn get_group(&self, id_or_name: &str) -> Result<Group> {
        self.get("group_show", &[("id", id_or_name), ("include_datasets", "false")])
    }

    pub fn organization_list(&self) -> Result<Vec<Organization>> {
        self.get("organization_list", &[("all_fields", "True")])
    }

    pub fn organization_names(&self) -> Result<Vec<String>> {
        self.get("organization_list", &[])
    }

    pub fn get_organization(&self, id_or_name: &str) -> Result<Organization> {
        self.get(
            "organization_show",
            &[("id", id_or_name), ("include_datasets", "false")],
        )
    }

    /// Every resource format known to the catalog.
    pub fn formats(&self) -> Result<BTreeSet<String>> {
        self.get("format_autocomplete", &[("q", ""), ("limit", "1000")])
    }

    pub fn tag_list(&self) -> Result<Vec<Tag>> {
        self.get("tag_list", &[("all_fields", "True")])
    }

    pub fn tag_names(&self) -> Result<Vec<String>> {
        self.get("tag_list", &[])
    }

    /// Tag names containing `query`.
    pub fn tag_names_matching(&self, query: &str) -> Result<Vec<String>> {
        self.get("tag_list", &[("query", query)])
    }

    /// Free-text dataset search.
    pub fn search_datasets_text(
        &self,
        text: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchResults<Dataset>> {
        self.search_datasets(&CkanQuery::filter().by_text(text), limit, offset)
    }

    /// Dataset search with text and filters. Nested resources get their
    /// `package_id` back-filled.
    pub fn search_datasets(
        &self,
        query: &CkanQuery,
        limit: u32,
        offset: u32,
    ) -> Result<SearchResults<Dataset>> {
        let path = format!("{}?{}", action("package_search"), build_search_params(query, limit, offset));
        let mut results: SearchResults<Dataset> = self.invoker.get(&path, &[])?;
        for dataset in &mut results.results {
            dataset.backfill_resource_package_ids();
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[instrument(skip_all, fields(resource = ?resource.name))]
    pub fn create_resource(&self, resource: &ResourcePayload) -> Result<Resource> {
        self.require_token("create resource", resource.name.as_deref())?;
        resource.validate_for_create()?;
        self.post("resource_create", resource)
    }

    /// Update a resource. If `resource.others` is `None`, the custom fields
    /// currently on the server are merged in first so they are not erased;
    /// `Some` (even empty) replaces them.
    #[instrument(skip_all, fields(resource = ?resource.id))]
    pub fn update_resource(&self, mut resource: ResourcePayload) -> Result<Resource> {
        self.require_token("update resource", resource.name.as_deref())?;
        resource.check_custom_fields()?;
        reconcile_resource(&mut resource, |id| self.get_resource(id))?;
        self.post("resource_update", &resource)
    }

    /// Create a dataset, along with any resources it lists.
    #[instrument(skip_all, fields(dataset = ?dataset.name))]
    pub fn create_dataset(&self, dataset: &DatasetPayload) -> Result<Dataset> {
        self.require_token("create dataset", dataset.name.as_deref())?;
        dataset.validate_for_create()?;
        self.post("package_create", dataset)
    }

    /// Update a dataset. Custom fields, `extras` and `resources` left as
    /// `None` are filled from the server copy (fetched once) so they are not
    /// erased; `Some` values, even empty ones, replace the server state.
    #[instrument(skip_all, fields(dataset = ?dataset.id))]
    pub fn update_dataset(&self, mut dataset: DatasetPayload) -> Result<Dataset> {
        self.require_token("update dataset", dataset.name.as_deref())?;
        dataset.check_custom_fields()?;
        reconcile_dataset(&mut dataset, |id| self.get_dataset(id))?;
        self.post("package_update", &dataset)
    }

    #[instrument(skip_all, fields(organization = ?organization.name))]
    pub fn create_organization(&self, organization: &OrganizationPayload) -> Result<Organization> {
        self.require_token("create organization", organization.name.as_deref())?;
        organization.validate_for_create()?;
        self.post("organization_create", organization)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn get<R: DeserializeOwned>(&self, action_name: &str, params: &[(&str, &str)]) -> Result<R> {
        self.invoker.get(&action(action_name), params)
    }

    fn post<P, R>(&self, action_name: &str, payload: &P) -> Result<R>
    where
        P: serde::Serialize,
        R: DeserializeOwned,
    {
        let body = self.invoker.codec().encode_for_posting(payload)?;
        debug!(action = action_name, "sending payload");
        self.invoker.post(&action(action_name), body, APPLICATION_JSON, &[])
    }

    fn require_token(&self, what: &str, name: Option<&str>) -> Result<()> {
        if self.invoker.config().token().is_some() {
            return Ok(());
        }
        Err(CkanError::Configuration(format!(
            "tried to {what} {}, but ckan token was not set",
            name.unwrap_or("<unnamed>")
        )))
    }
}

/// `<catalog>/dataset/<id or name>`.
pub fn dataset_page_url(catalog_url: &str, dataset_id_or_name: &str) -> Result<String> {
    let catalog_url = non_empty(catalog_url.trim_end_matches('/'), "catalog url")?;
    let dataset = non_empty(dataset_id_or_name, "dataset identifier")?;
    Ok(format!("{catalog_url}/dataset/{dataset}"))
}

/// `<catalog>/<dataset>/resource/<resource id>`. Use the resource id, not its
/// name.
pub fn resource_page_url(catalog_url: &str, dataset_id_or_name: &str, resource_id: &str) -> Result<String> {
    let catalog_url = non_empty(catalog_url.trim_end_matches('/'), "catalog url")?;
    let dataset = non_empty(dataset_id_or_name, "dataset identifier")?;
    let resource = non_empty(resource_id, "resource id")?;
    Ok(format!("{catalog_url}/{dataset}/resource/{resource}"))
}

/// `<catalog>/group/<name or id>`.
pub fn group_page_url(catalog_url: &str, group_name_or_id: &str) -> Result<String> {
    let catalog_url = non_empty(catalog_url.trim_end_matches('/'), "catalog url")?;
    let group = non_empty(group_name_or_id, "group identifier")?;
    Ok(format!("{catalog_url}/group/{group}"))
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(CkanError::Validation(format!("invalid {what}")));
    }
    Ok(value)
}
