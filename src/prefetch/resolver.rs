//! Resolution of one relation predicate into the related resource's join keys.

use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use url::Url;

use super::PrefetchError;
use crate::config::RelationshipConfig;
use crate::filter::rewrite::quote_literal;
use crate::filter::Predicate;
use crate::transport::{AuthProvider, BaseUrlProvider, RequestDescriptor, Transport};

/// Query issued against the related resource for one predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchQuery {
    pub related_resource: String,
    /// Filter sent to the related resource, e.g. `siteid="BEDFORD" and assettype="SENSOR"`.
    pub where_clause: String,
    pub select: String,
    /// Rows requested; always more than `maxKeys` so an oversized result is visible.
    pub page_size: usize,
    /// Whether the site clause was prepended.
    pub site_scoped: bool,
}

impl PrefetchQuery {
    /// Builds `<field> <op> "<literal>"`, scoped to `default_site` when the relation
    /// declares a site field that the predicate does not already constrain.
    pub fn build(predicate: &Predicate, config: &RelationshipConfig, default_site: Option<&str>) -> Self {
        let clause = format!(
            "{} {} {}",
            predicate.field,
            predicate.operator,
            quote_literal(&predicate.value)
        );

        let site_clause = match (config.related_site_field.as_deref(), default_site) {
            (Some(site_field), Some(site)) if !site.trim().is_empty() && !predicate.field.eq_ignore_ascii_case(site_field) => {
                Some(format!("{site_field}={}", quote_literal(site.trim())))
            }
            _ => None,
        };

        let site_scoped = site_clause.is_some();
        let where_clause = match site_clause {
            Some(site) => format!("{site} and {clause}"),
            None => clause,
        };

        Self {
            related_resource: config.related_resource.clone(),
            where_clause,
            select: config.select.clone(),
            page_size: config.page_size.max(config.max_keys + 1),
            site_scoped,
        }
    }
}

/// Keys obtained for one predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKeys {
    /// Number of keys the related resource returned.
    pub returned: usize,
    /// Keys kept, at most `maxKeys`, in response order.
    pub keys: Vec<String>,
    pub truncated: bool,
}

/// Per-call values attached to every prefetch request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub tenant: &'a str,
    pub root_resource: &'a str,
    pub relation: &'a str,
    pub correlation_id: Option<&'a str>,
    /// Opaque host context forwarded in the request metadata.
    pub transport_context: Option<&'a Value>,
}

/// Issues prefetch queries through the host's collaborators.
pub struct PrefetchResolver<'a> {
    transport: &'a dyn Transport,
    auth: &'a dyn AuthProvider,
    base_url: &'a dyn BaseUrlProvider,
}

impl<'a> PrefetchResolver<'a> {
    pub fn new(transport: &'a dyn Transport, auth: &'a dyn AuthProvider, base_url: &'a dyn BaseUrlProvider) -> Self {
        Self {
            transport,
            auth,
            base_url,
        }
    }

    /// Builds the request descriptor for `query`.
    pub fn descriptor(&self, ctx: &RequestContext<'_>, query: &PrefetchQuery) -> Result<RequestDescriptor, PrefetchError> {
        let base = self.base_url.base_url(ctx.tenant);
        let raw = format!("{}/os/{}", base.trim_end_matches('/'), query.related_resource);
        let mut url = Url::parse(&raw).map_err(|source| PrefetchError::BaseUrl { url: base, source })?;
        url.query_pairs_mut()
            .append_pair("lean", "1")
            .append_pair("oslc.select", &query.select)
            .append_pair("oslc.where", &query.where_clause)
            .append_pair("oslc.pageSize", &query.page_size.to_string());

        let mut headers = self.auth.headers(ctx.tenant);
        headers
            .entry("Accept".to_string())
            .or_insert_with(|| "application/json".to_string());

        Ok(RequestDescriptor {
            method: "GET".to_string(),
            url: url.into(),
            headers,
            title: format!("Prefetch {} keys for {}", ctx.relation, ctx.root_resource),
            metadata: json!({
                "purpose": "relationship_prefetch",
                "rootResource": ctx.root_resource,
                "relation": ctx.relation,
                "relatedResource": query.related_resource,
                "correlationId": ctx.correlation_id,
                "context": ctx.transport_context,
            }),
        })
    }

    /// Runs `query` and returns the join keys, truncated to `config.max_keys`.
    #[instrument(skip_all, fields(relation = ctx.relation, resource = %query.related_resource))]
    pub async fn resolve(
        &self,
        ctx: &RequestContext<'_>,
        query: &PrefetchQuery,
        config: &RelationshipConfig,
    ) -> Result<ResolvedKeys, PrefetchError> {
        let request = self.descriptor(ctx, query)?;
        debug!(url = %request.url, "Sending prefetch");

        let body = self.transport.send(ctx.tenant, request).await?.into_json()?;
        let mut keys = extract_keys(&body, &config.related_key_field)?;

        let returned = keys.len();
        let truncated = returned > config.max_keys || has_next_page(&body);
        keys.truncate(config.max_keys);
        info!(returned, used = keys.len(), truncated, "Prefetch resolved");

        Ok(ResolvedKeys {
            returned,
            keys,
            truncated,
        })
    }
}

/// Whether the collection reports further pages beyond the one returned.
fn has_next_page(body: &Value) -> bool {
    body.get("responseInfo")
        .or_else(|| body.get("oslc:responseInfo"))
        .and_then(|info| info.get("nextPage").or_else(|| info.get("oslc:nextPage")))
        .is_some_and(|next| !next.is_null())
}

/// Reads `key_field` from every member of a member collection, in order.
///
/// Accepts `member` (lean) and `rdfs:member` collections, string or numeric keys,
/// and `spi:`-prefixed field names, matched ignoring ASCII case. Members without a
/// usable key are skipped; a non-empty collection yielding no key at all is a
/// [`PrefetchError::Shape`], since it points at a key field the response lacks.
pub fn extract_keys(body: &Value, key_field: &str) -> Result<Vec<String>, PrefetchError> {
    let members = body
        .get("member")
        .or_else(|| body.get("rdfs:member"))
        .ok_or_else(|| PrefetchError::Shape("missing member collection".to_string()))?
        .as_array()
        .ok_or_else(|| PrefetchError::Shape("member is not an array".to_string()))?;

    let prefixed = format!("spi:{key_field}");
    let keys: Vec<String> = members
        .iter()
        .filter_map(|m| member_field(m, key_field).or_else(|| member_field(m, &prefixed)))
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|k| !k.is_empty())
        .collect();

    if keys.is_empty() && !members.is_empty() {
        return Err(PrefetchError::Shape(format!(
            "{} members returned but none carries key field {key_field}",
            members.len()
        )));
    }
    Ok(keys)
}

/// Looks up `field` on a member, preferring an exact name over a case-insensitive one.
fn member_field<'v>(member: &'v Value, field: &str) -> Option<&'v Value> {
    let object = member.as_object()?;
    object.get(field).or_else(|| {
        object
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationshipEntry;
    use crate::filter::detect_predicates;
    use crate::transport::mock::MockTransport;
    use crate::transport::{Headers, TransportError};

    fn asset_config() -> RelationshipConfig {
        RelationshipEntry::new("mxapiasset", "assetnum", "assetnum")
            .with_site_field("siteid")
            .validate()
            .unwrap()
    }

    fn predicate(filter: &str) -> Predicate {
        detect_predicates(filter).unwrap().remove(0)
    }

    fn ctx() -> RequestContext<'static> {
        RequestContext {
            tenant: "acme",
            root_resource: "mxapiwo",
            relation: "asset",
            correlation_id: Some("req-1"),
            transport_context: None,
        }
    }

    fn auth(_: &str) -> Headers {
        Headers::from([("apikey".to_string(), "secret".to_string())])
    }

    fn base(_: &str) -> String {
        "https://maximo.example.com/maximo/api/".to_string()
    }

    #[test]
    fn query_is_site_scoped() {
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &asset_config(), Some("BEDFORD"));
        assert_eq!(q.where_clause, r#"siteid="BEDFORD" and assettype = "SENSOR""#);
        assert!(q.site_scoped);
        assert_eq!(q.select, "assetnum");
        assert_eq!(q.page_size, 200);
    }

    #[test]
    fn query_skips_site_scope_when_predicate_targets_site() {
        let q = PrefetchQuery::build(&predicate(r#"asset.SITEID="NASHUA""#), &asset_config(), Some("BEDFORD"));
        assert_eq!(q.where_clause, r#"SITEID = "NASHUA""#);
        assert!(!q.site_scoped);

        let q = PrefetchQuery::build(&predicate(r#"asset.assettype like 'PU%'"#), &asset_config(), None);
        assert_eq!(q.where_clause, r#"assettype like "PU%""#);
    }

    #[test]
    fn query_escapes_literal() {
        let q = PrefetchQuery::build(&predicate(r#"asset.description="6\" PIPE""#), &asset_config(), None);
        assert_eq!(q.where_clause, r#"description = "6\" PIPE""#);
    }

    #[test]
    fn descriptor_carries_projection_and_headers() {
        let mock = MockTransport::new();
        let resolver = PrefetchResolver::new(&mock, &auth, &base);
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &asset_config(), None);

        let request = resolver.descriptor(&ctx(), &q).unwrap();
        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.path(), "/maximo/api/os/mxapiasset");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("oslc.select".into(), "assetnum".into())));
        assert!(pairs.contains(&("oslc.where".into(), r#"assettype = "SENSOR""#.into())));
        assert!(pairs.contains(&("oslc.pageSize".into(), "200".into())));
        assert_eq!(request.headers["apikey"], "secret");
        assert_eq!(request.headers["Accept"], "application/json");
        assert_eq!(request.metadata["correlationId"], "req-1");
        assert_eq!(request.title, "Prefetch asset keys for mxapiwo");
    }

    #[test]
    fn extracts_keys_from_both_collection_names() {
        let lean = json!({"member": [{"assetnum": " A1 "}, {"assetnum": 42}, {"other": "x"}, {"assetnum": ""}]});
        assert_eq!(extract_keys(&lean, "assetnum").unwrap(), vec!["A1", "42"]);

        let full = json!({"rdfs:member": [{"spi:assetnum": "B1"}]});
        assert_eq!(extract_keys(&full, "assetnum").unwrap(), vec!["B1"]);

        assert!(matches!(extract_keys(&json!({"error": "x"}), "assetnum"), Err(PrefetchError::Shape(_))));
    }

    #[test]
    fn key_field_matches_ignoring_case() {
        let body = json!({"member": [{"assetnum": "A1"}, {"ASSETNUM": "A2"}]});
        assert_eq!(extract_keys(&body, "ASSETNUM").unwrap(), vec!["A1", "A2"]);
    }

    #[test]
    fn members_without_key_field_are_a_shape_error() {
        let body = json!({"member": [{"description": "x"}, {"description": "y"}]});
        assert!(matches!(extract_keys(&body, "assetnum"), Err(PrefetchError::Shape(_))));

        assert!(extract_keys(&json!({"member": []}), "assetnum").unwrap().is_empty());
    }

    #[test]
    fn page_size_always_exceeds_max_keys() {
        let mut config = asset_config();
        config.max_keys = 3;
        config.page_size = 2;
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &config, None);
        assert_eq!(q.page_size, 4);
    }

    #[tokio::test]
    async fn next_page_marks_result_truncated() {
        let mock = MockTransport::new();
        mock.expect_request("mxapiasset").return_json(json!({
            "member": [{"assetnum": "A1"}, {"assetnum": "A2"}],
            "responseInfo": {"nextPage": {"href": "https://h/os/mxapiasset?pageno=2"}},
        }));
        let resolver = PrefetchResolver::new(&mock, &auth, &base);

        let mut config = asset_config();
        config.max_keys = 3;
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &config, None);
        let resolved = resolver.resolve(&ctx(), &q, &config).await.unwrap();

        assert_eq!(resolved.keys, vec!["A1", "A2"]);
        assert!(resolved.truncated);
        mock.verify();
    }

    #[tokio::test]
    async fn resolve_truncates_to_max_keys() {
        let mock = MockTransport::new();
        mock.expect_request("mxapiasset").return_keys("assetnum", &["A1", "A2", "A3"]);
        let resolver = PrefetchResolver::new(&mock, &auth, &base);

        let mut config = asset_config();
        config.max_keys = 2;
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &config, None);
        let resolved = resolver.resolve(&ctx(), &q, &config).await.unwrap();

        assert_eq!(resolved.returned, 3);
        assert_eq!(resolved.keys, vec!["A1", "A2"]);
        assert!(resolved.truncated);
        mock.verify();
    }

    #[tokio::test]
    async fn resolve_reports_transport_failure() {
        let mock = MockTransport::new();
        mock.expect_any().return_err(TransportError::Failed("connection refused".into()));
        let resolver = PrefetchResolver::new(&mock, &auth, &base);

        let config = asset_config();
        let q = PrefetchQuery::build(&predicate(r#"asset.assettype="SENSOR""#), &config, None);
        let err = resolver.resolve(&ctx(), &q, &config).await.unwrap_err();
        assert!(matches!(err, PrefetchError::Transport(TransportError::Failed(_))));
    }
}
