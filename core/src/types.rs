//! CKAN records as returned by the action API, plus the payload types sent
//! to create/update actions.
//!
//! # Design
//! Read-side records (`Dataset`, `Resource`, `GroupOrg`, ...) decode
//! tolerantly: every field is optional and unknown dataset/resource fields are
//! collected in `others`, CKAN's free-form extension slot.
//!
//! Payload records (`DatasetPayload`, `ResourcePayload`,
//! `OrganizationPayload`) only carry what CKAN accepts on create/update and
//! are built from read-side records by `From` projections, which drop
//! server-maintained fields like `metadata_created` or `revision_id`.
//!
//! On payloads, `others`, `extras` and `resources` are `Option`s on purpose:
//! `None` means "not set, keep what the server has" and `Some(empty)` means
//! "set to nothing". The update reconciler relies on that difference.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::error::{CkanError, Result};
use crate::timestamp;

/// Custom key/value fields outside CKAN's core schema.
pub type Others = BTreeMap<String, Value>;

/// Wire names of the typed `ResourcePayload` fields.
pub const RESOURCE_FIELDS: &[&str] = &[
    "id",
    "package_id",
    "name",
    "url",
    "format",
    "description",
    "mimetype",
    "mimetype_inner",
    "hash",
    "resource_type",
    "url_type",
    "position",
    "created",
    "last_modified",
];

/// Wire names of the typed `DatasetPayload` fields.
pub const DATASET_FIELDS: &[&str] = &[
    "id",
    "name",
    "title",
    "url",
    "notes",
    "author",
    "author_email",
    "maintainer",
    "maintainer_email",
    "license_id",
    "owner_org",
    "private",
    "state",
    "version",
    "type",
    "tags",
    "groups",
    "extras",
    "resources",
];

/// One entry of a dataset's `extras` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Extra {
    pub key: String,
    pub value: String,
}

impl Extra {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Resource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub mimetype: Option<String>,
    pub mimetype_inner: Option<String>,
    pub hash: Option<String>,
    pub resource_type: Option<String>,
    pub url_type: Option<String>,
    /// Parent dataset id. Not always present on resources nested in a
    /// dataset; the client back-fills it.
    pub package_id: Option<String>,
    pub position: Option<i64>,
    #[serde(with = "timestamp::optional")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::optional")]
    pub last_modified: Option<NaiveDateTime>,
    pub cache_url: Option<String>,
    #[serde(with = "timestamp::optional")]
    pub cache_last_updated: Option<NaiveDateTime>,
    pub revision_id: Option<String>,
    pub state: Option<String>,
    #[serde(flatten)]
    pub others: Others,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Tag {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub vocabulary_id: Option<String>,
    pub state: Option<String>,
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// A CKAN group or organization; the API uses one shape for both.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupOrg {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub image_display_url: Option<String>,
    #[serde(with = "timestamp::optional")]
    pub created: Option<NaiveDateTime>,
    pub state: Option<String>,
    pub approval_status: Option<String>,
    pub is_organization: Option<bool>,
    pub package_count: Option<u64>,
    #[serde(rename = "type")]
    pub group_type: Option<String>,
    pub revision_id: Option<String>,
}

pub type Group = GroupOrg;
pub type Organization = GroupOrg;

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Dataset {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license_id: Option<String>,
    pub license_title: Option<String>,
    pub license_url: Option<String>,
    pub owner_org: Option<String>,
    pub private: Option<bool>,
    pub state: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    #[serde(with = "timestamp::optional")]
    pub metadata_created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::optional")]
    pub metadata_modified: Option<NaiveDateTime>,
    pub creator_user_id: Option<String>,
    pub revision_id: Option<String>,
    pub num_resources: Option<u64>,
    pub num_tags: Option<u64>,
    pub organization: Option<Organization>,
    pub extras: Option<Vec<Extra>>,
    pub resources: Option<Vec<Resource>>,
    pub tags: Option<Vec<Tag>>,
    pub groups: Option<Vec<Group>>,
    #[serde(flatten)]
    pub others: Others,
}

impl Dataset {
    /// Set `package_id` on every nested resource to this dataset's id.
    pub fn backfill_resource_package_ids(&mut self) {
        let Some(id) = self.id.as_ref() else {
            return;
        };
        for resource in self.resources.iter_mut().flatten() {
            resource.package_id = Some(id.clone());
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct License {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub maintainer: Option<String>,
    pub family: Option<String>,
    pub od_conformance: Option<String>,
    pub osd_conformance: Option<String>,
    pub domain_content: Option<Value>,
    pub domain_data: Option<Value>,
    pub domain_software: Option<Value>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct User {
    pub id: Option<String>,
    pub name: Option<String>,
    pub fullname: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub about: Option<String>,
    #[serde(with = "timestamp::optional")]
    pub created: Option<NaiveDateTime>,
    pub state: Option<String>,
    pub sysadmin: Option<bool>,
    pub number_of_edits: Option<u64>,
    pub number_created_packages: Option<u64>,
}

/// One page of `package_search` hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResourcePayload {
    pub id: Option<String>,
    pub package_id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub mimetype: Option<String>,
    pub mimetype_inner: Option<String>,
    pub hash: Option<String>,
    pub resource_type: Option<String>,
    pub url_type: Option<String>,
    pub position: Option<i64>,
    #[serde(with = "timestamp::optional")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::optional")]
    pub last_modified: Option<NaiveDateTime>,
    /// `None`: keep the custom fields on the server. `Some`: replace them.
    #[serde(flatten)]
    #[serialize_always]
    pub others: Option<Others>,
}

impl ResourcePayload {
    /// Minimal resource for `resource_create`.
    pub fn new(
        package_id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        format: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            package_id: Some(package_id.into()),
            name: Some(name.into()),
            url: Some(url.into()),
            format: Some(format.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Add one custom field, creating the map if it was unset. Keys naming a
    /// typed field are rejected.
    pub fn put_other(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        put_other(&mut self.others, RESOURCE_FIELDS, "resource", key.into(), value.into())
    }

    /// Fails if a custom field shadows a typed field.
    pub fn check_custom_fields(&self) -> Result<()> {
        check_custom_fields(self.others.as_ref(), RESOURCE_FIELDS, "resource")
    }

    /// Checks `resource_create` needs before sending anything.
    pub fn validate_for_create(&self) -> Result<()> {
        self.check_custom_fields()?;
        require(&self.format, "resource format")?;
        require(&self.name, "resource name")?;
        require(&self.description, "resource description")?;
        require(&self.package_id, "resource parent dataset id")?;
        require(&self.url, "resource url")
    }
}

impl From<&Resource> for ResourcePayload {
    fn from(r: &Resource) -> Self {
        Self {
            id: r.id.clone(),
            package_id: r.package_id.clone(),
            name: r.name.clone(),
            url: r.url.clone(),
            format: r.format.clone(),
            description: r.description.clone(),
            mimetype: r.mimetype.clone(),
            mimetype_inner: r.mimetype_inner.clone(),
            hash: r.hash.clone(),
            resource_type: r.resource_type.clone(),
            url_type: r.url_type.clone(),
            position: r.position,
            created: r.created,
            last_modified: r.last_modified,
            others: Some(r.others.clone()),
        }
    }
}

/// Group membership as sent on dataset create/update.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct GroupRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl From<&Group> for GroupRef {
    fn from(g: &Group) -> Self {
        Self {
            id: g.id.clone(),
            name: g.name.clone(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DatasetPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license_id: Option<String>,
    pub owner_org: Option<String>,
    pub private: Option<bool>,
    pub state: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub tags: Option<Vec<Tag>>,
    pub groups: Option<Vec<GroupRef>>,
    /// `None`: keep the server's extras. `Some`: replace them.
    pub extras: Option<Vec<Extra>>,
    /// `None`: keep the server's resources. `Some`: replace them.
    pub resources: Option<Vec<ResourcePayload>>,
    /// `None`: keep the server's custom fields. `Some`: replace them.
    #[serde(flatten)]
    #[serialize_always]
    pub others: Option<Others>,
}

impl DatasetPayload {
    /// Minimal dataset for `package_create`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn put_other(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        put_other(&mut self.others, DATASET_FIELDS, "dataset", key.into(), value.into())
    }

    /// Fails if a custom field of the dataset or of one of its resources
    /// shadows a typed field.
    pub fn check_custom_fields(&self) -> Result<()> {
        check_custom_fields(self.others.as_ref(), DATASET_FIELDS, "dataset")?;
        self.resources
            .iter()
            .flatten()
            .try_for_each(ResourcePayload::check_custom_fields)
    }

    pub fn validate_for_create(&self) -> Result<()> {
        self.check_custom_fields()?;
        require(&self.name, "dataset name")?;
        require(&self.url, "dataset url")
    }
}

impl From<&Dataset> for DatasetPayload {
    fn from(d: &Dataset) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            title: d.title.clone(),
            url: d.url.clone(),
            notes: d.notes.clone(),
            author: d.author.clone(),
            author_email: d.author_email.clone(),
            maintainer: d.maintainer.clone(),
            maintainer_email: d.maintainer_email.clone(),
            license_id: d.license_id.clone(),
            owner_org: d.owner_org.clone(),
            private: d.private,
            state: d.state.clone(),
            version: d.version.clone(),
            dataset_type: d.dataset_type.clone(),
            tags: d.tags.clone(),
            groups: d
                .groups
                .as_ref()
                .map(|groups| groups.iter().map(GroupRef::from).collect()),
            extras: d.extras.clone(),
            resources: d
                .resources
                .as_ref()
                .map(|resources| resources.iter().map(ResourcePayload::from).collect()),
            others: Some(d.others.clone()),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OrganizationPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub state: Option<String>,
}

impl OrganizationPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn validate_for_create(&self) -> Result<()> {
        require(&self.name, "organization name")
    }
}

impl From<&Organization> for OrganizationPayload {
    fn from(o: &Organization) -> Self {
        Self {
            id: o.id.clone(),
            name: o.name.clone(),
            title: o.title.clone(),
            description: o.description.clone(),
            image_url: o.image_url.clone(),
            state: o.state.clone(),
        }
    }
}

fn put_other(
    others: &mut Option<Others>,
    reserved: &[&str],
    kind: &str,
    key: String,
    value: Value,
) -> Result<()> {
    if reserved.contains(&key.as_str()) {
        return Err(CkanError::Validation(format!(
            "custom {kind} field {key:?} would overwrite the typed field of the same name"
        )));
    }
    others.get_or_insert_with(BTreeMap::new).insert(key, value);
    Ok(())
}

fn check_custom_fields(others: Option<&Others>, reserved: &[&str], kind: &str) -> Result<()> {
    match others.into_iter().flat_map(|o| o.keys()).find(|k| reserved.contains(&k.as_str())) {
        Some(key) => Err(CkanError::Validation(format!(
            "custom {kind} field {key:?} would overwrite the typed field of the same name"
        ))),
        None => Ok(()),
    }
}

fn require(value: &Option<String>, what: &str) -> Result<()> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(CkanError::Validation(format!("{what} must not be empty"))),
    }
}
