//! Dataset search queries and their `package_search` parameter encoding.
//!
//! # Design
//! `CkanQuery` is an immutable value built through a consuming builder.
//! `build_search_params` turns it into the raw query-string fragment the
//! search action expects. Filters become a Solr filter query (`fq`): each
//! non-empty list is a parenthesised conjunction of quoted `field:"value"`
//! terms, successive lists are joined by ` AND `, and the whole clause is
//! wrapped in one outer pair of parentheses.

use url::form_urlencoded;

/// A structured dataset search. All filter lists default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CkanQuery {
    text: String,
    group_names: Vec<String>,
    organization_names: Vec<String>,
    tag_names: Vec<String>,
    license_ids: Vec<String>,
}

impl CkanQuery {
    /// Start an empty query that matches every dataset.
    pub fn filter() -> Self {
        Self::default()
    }

    /// Free-text search over dataset metadata.
    pub fn by_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn by_group_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn by_organization_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organization_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn by_tag_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn by_license_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.license_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    pub fn organization_names(&self) -> &[String] {
        &self.organization_names
    }

    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    pub fn license_ids(&self) -> &[String] {
        &self.license_ids
    }

    /// The unencoded filter clause, or `None` when no filter list is set.
    pub fn filter_clause(&self) -> Option<String> {
        let groups = [
            ("groups", &self.group_names),
            ("organization", &self.organization_names),
            ("tags", &self.tag_names),
            ("license_id", &self.license_ids),
        ];

        let conjunctions: Vec<String> = groups
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(key, names)| {
                let terms: Vec<String> = names.iter().map(|n| format!("{key}:\"{n}\"")).collect();
                format!("({})", terms.join(" AND "))
            })
            .collect();

        if conjunctions.is_empty() {
            None
        } else {
            Some(format!("({})", conjunctions.join(" AND ")))
        }
    }
}

/// Build the `package_search` parameter string:
/// `rows=<limit>&start=<offset>[&q=..][&fq=..]`.
///
/// `offset` is zero based, so `limit = 1, offset = 0` asks for the first hit.
pub fn build_search_params(query: &CkanQuery, limit: u32, offset: u32) -> String {
    let mut params = format!("rows={limit}&start={offset}");

    if !query.text.is_empty() {
        params.push_str("&q=");
        params.push_str(&url_encode(&query.text));
    }

    if let Some(fq) = query.filter_clause() {
        params.push_str("&fq=");
        params.push_str(&url_encode(&fq));
    }

    params
}

/// Form-url-encode `s`, writing spaces as `%20` instead of `+`.
///
/// Solr behind CKAN does not turn `+` back into a space inside `q`/`fq`.
pub fn url_encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(params: &str, key: &str) -> Option<String> {
        form_urlencoded::parse(params.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn empty_query_has_only_paging() {
        let params = build_search_params(&CkanQuery::filter().by_text(""), 10, 0);
        assert_eq!(params, "rows=10&start=0");
    }

    #[test]
    fn text_is_encoded_with_percent_twenty() {
        let params = build_search_params(&CkanQuery::filter().by_text("lakes of trento"), 5, 2);
        assert_eq!(params, "rows=5&start=2&q=lakes%20of%20trento");
    }

    #[test]
    fn literal_plus_survives_encoding() {
        assert_eq!(url_encode("a+b c"), "a%2Bb%20c");
    }

    #[test]
    fn groups_and_tags_build_nested_conjunction() {
        let query = CkanQuery::filter()
            .by_group_names(["a", "b"])
            .by_tag_names(["x"]);
        let params = build_search_params(&query, 5, 0);
        assert!(params.starts_with("rows=5&start=0&fq="));
        assert!(param(&params, "q").is_none());

        let fq = param(&params, "fq").unwrap();
        assert_eq!(fq, r#"((groups:"a" AND groups:"b") AND (tags:"x"))"#);
        let raw_fq = params.split("&fq=").nth(1).unwrap();
        assert!(!raw_fq.contains('+'));
        assert!(raw_fq.contains("%20AND%20"));
    }

    #[test]
    fn filter_groups_follow_fixed_order() {
        let query = CkanQuery::filter()
            .by_license_ids(["cc-by"])
            .by_tag_names(["t"])
            .by_organization_names(["org"])
            .by_group_names(["g"]);
        assert_eq!(
            query.filter_clause().unwrap(),
            r#"((groups:"g") AND (organization:"org") AND (tags:"t") AND (license_id:"cc-by"))"#
        );
    }

    #[test]
    fn empty_lists_contribute_nothing() {
        let query = CkanQuery::filter()
            .by_group_names(Vec::<String>::new())
            .by_organization_names(["comune-di-trento"]);
        assert_eq!(
            query.filter_clause().unwrap(),
            r#"((organization:"comune-di-trento"))"#
        );
        assert!(CkanQuery::filter().filter_clause().is_none());
    }

    #[test]
    fn text_and_filter_together() {
        let query = CkanQuery::filter().by_text("acqua").by_license_ids(["odc-by"]);
        let params = build_search_params(&query, 1, 0);
        assert_eq!(param(&params, "q").as_deref(), Some("acqua"));
        assert_eq!(
            param(&params, "fq").as_deref(),
            Some(r#"((license_id:"odc-by"))"#)
        );
    }
}
