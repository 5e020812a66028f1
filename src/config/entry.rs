//! Relationship entries as they appear in configuration files, and the
//! validated form the planner works with.

use serde::{Deserialize, Serialize};

/// Default upper bound on the number of keys folded into one disjunction.
pub const DEFAULT_MAX_KEYS: usize = 50;

/// Default page size requested from the related resource.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// One relation entry exactly as a configuration layer declares it.
///
/// Every field is optional at this stage so that a partially filled entry still
/// parses. Usability is decided after all layers are merged, see
/// [`RelationshipEntry::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipEntry {
    pub related_resource: String,
    pub root_join_field: String,
    pub related_key_field: String,
    pub related_site_field: Option<String>,
    pub max_keys: Option<usize>,
    pub page_size: Option<usize>,
    pub select: Option<String>,
}

impl RelationshipEntry {
    /// Creates an entry with the three mandatory fields set.
    pub fn new(
        related_resource: impl Into<String>,
        root_join_field: impl Into<String>,
        related_key_field: impl Into<String>,
    ) -> Self {
        Self {
            related_resource: related_resource.into(),
            root_join_field: root_join_field.into(),
            related_key_field: related_key_field.into(),
            ..Self::default()
        }
    }

    /// Scopes prefetch queries by the given site field.
    pub fn with_site_field(mut self, field: impl Into<String>) -> Self {
        self.related_site_field = Some(field.into());
        self
    }

    /// Turns the raw entry into a usable [`RelationshipConfig`].
    ///
    /// Returns `None` when the related resource or either join field is blank.
    /// Zero limits fall back to the defaults.
    pub fn validate(&self) -> Option<RelationshipConfig> {
        let related_resource = self.related_resource.trim();
        let root_join_field = self.root_join_field.trim();
        let related_key_field = self.related_key_field.trim();
        if related_resource.is_empty() || root_join_field.is_empty() || related_key_field.is_empty() {
            return None;
        }

        let related_site_field = self
            .related_site_field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let select = self
            .select
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(related_key_field)
            .to_string();

        Some(RelationshipConfig {
            related_resource: related_resource.to_string(),
            root_join_field: root_join_field.to_string(),
            related_key_field: related_key_field.to_string(),
            related_site_field,
            max_keys: self.max_keys.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_KEYS),
            page_size: self.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE),
            select,
        })
    }
}

/// A validated relation between a root resource and a related resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipConfig {
    /// Resource queried during prefetch (e.g. `mxapiasset`).
    pub related_resource: String,
    /// Field on the root resource compared against the resolved keys.
    pub root_join_field: String,
    /// Field on the related resource holding the join key.
    pub related_key_field: String,
    /// Field used to scope prefetch queries to the caller's default site.
    pub related_site_field: Option<String>,
    pub max_keys: usize,
    pub page_size: usize,
    /// Projection requested from the related resource.
    pub select: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_fills_defaults() {
        let cfg = RelationshipEntry::new("mxapiasset", "assetnum", "assetnum")
            .validate()
            .expect("usable entry");
        assert_eq!(cfg.max_keys, DEFAULT_MAX_KEYS);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.select, "assetnum");
        assert_eq!(cfg.related_site_field, None);
    }

    #[test]
    fn validate_rejects_blank_join_fields() {
        assert!(RelationshipEntry::new("mxapiasset", "", "assetnum").validate().is_none());
        assert!(RelationshipEntry::new("mxapiasset", "assetnum", "  ").validate().is_none());
        assert!(RelationshipEntry::new("", "assetnum", "assetnum").validate().is_none());
    }

    #[test]
    fn zero_limits_fall_back_to_defaults() {
        let mut entry = RelationshipEntry::new("mxapiasset", "assetnum", "assetnum");
        entry.max_keys = Some(0);
        entry.page_size = Some(25);
        entry.select = Some(" ".into());
        let cfg = entry.validate().unwrap();
        assert_eq!(cfg.max_keys, DEFAULT_MAX_KEYS);
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.select, "assetnum");
    }

    #[test]
    fn parses_camel_case_json() {
        let entry: RelationshipEntry = serde_json::from_str(
            r#"{"relatedResource":"mxapivendor","rootJoinField":"vendor","relatedKeyField":"company","maxKeys":5}"#,
        )
        .unwrap();
        assert_eq!(entry.related_key_field, "company");
        assert_eq!(entry.max_keys, Some(5));
    }
}
