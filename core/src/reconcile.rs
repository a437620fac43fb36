//! Read-merge-write reconciliation for updates.
//!
//! # Design
//! CKAN's `*_update` actions are destructive: a field group left out of the
//! payload is erased on the server. To give callers "omitted means untouched"
//! semantics, each optional field group of a payload is checked before
//! sending:
//!
//! - `None`: the group is filled from the current server copy.
//! - `Some` (even empty): the caller's value is sent as is and replaces the
//!   server state.
//!
//! Datasets have three independent groups (custom fields, `extras`,
//! `resources`); the server copy is fetched lazily, at most once, and shared
//! between them. Resources have one group (custom fields).
//!
//! The fetch and the later write are two separate calls, so a concurrent
//! edit on the server between them can be overwritten. The client cannot
//! close that window.

use tracing::info;

use crate::error::{CkanError, Result};
use crate::types::{Dataset, DatasetPayload, Resource, ResourcePayload};

/// Fill the resource's custom fields from the server when the caller left
/// them unset. `fetch` is called with the resource id, at most once.
pub fn reconcile_resource<F>(resource: &mut ResourcePayload, fetch: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<Resource>,
{
    if resource.others.is_some() {
        info!("custom fields set on resource, they will replace the ones on the server");
        return Ok(());
    }

    info!("no custom fields set on resource, merging them from the server to prevent erasure");
    let id = required_id(resource.id.as_deref(), "resource")?;
    let current = fetch(id)?;
    for (key, value) in current.others {
        resource.put_other(key, value)?;
    }
    Ok(())
}

/// Fill unset custom fields, `extras` and `resources` of the dataset from the
/// server. `fetch` is called with the dataset id only if at least one group
/// is unset, and then exactly once.
pub fn reconcile_dataset<F>(dataset: &mut DatasetPayload, mut fetch: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Dataset>,
{
    let needs_server = dataset.others.is_none() || dataset.extras.is_none() || dataset.resources.is_none();
    if !needs_server {
        info!("custom fields, extras and resources all set on dataset, sending as is");
        return Ok(());
    }
    let id = required_id(dataset.id.as_deref(), "dataset")?.to_string();
    let mut current: Option<Dataset> = None;

    if dataset.others.is_none() {
        info!("no custom fields set on dataset, merging them from the server to prevent erasure");
        let server = server_copy(&mut current, &id, &mut fetch)?;
        if !server.others.is_empty() {
            dataset.others = Some(std::mem::take(&mut server.others));
        }
    } else {
        info!("custom fields set on dataset, they will replace the ones on the server");
    }

    if dataset.extras.is_none() {
        info!("no extras set on dataset, merging them from the server to prevent erasure");
        let server = server_copy(&mut current, &id, &mut fetch)?;
        if let Some(extras) = server.extras.take() {
            dataset.extras = Some(extras);
        }
    } else {
        info!("extras set on dataset, they will replace the ones on the server");
    }

    if dataset.resources.is_none() {
        info!("no resources set on dataset, merging them from the server to prevent erasure");
        let server = server_copy(&mut current, &id, &mut fetch)?;
        if let Some(resources) = server.resources.take() {
            dataset.resources = Some(resources.iter().map(ResourcePayload::from).collect());
        }
    } else {
        info!("resources set on dataset, they will replace the ones on the server");
    }

    Ok(())
}

/// The cached server copy, fetching it on first use.
fn server_copy<'a, F>(slot: &'a mut Option<Dataset>, id: &str, fetch: &mut F) -> Result<&'a mut Dataset>
where
    F: FnMut(&str) -> Result<Dataset>,
{
    let dataset = match slot.take() {
        Some(dataset) => dataset,
        None => fetch(id)?,
    };
    Ok(slot.insert(dataset))
}

fn required_id<'a>(id: Option<&'a str>, kind: &str) -> Result<&'a str> {
    match id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(CkanError::Validation(format!(
            "{kind} id is required to merge its current state before updating"
        ))),
    }
}
