//! # Layered Relationship Store
//!
//! Relationship definitions come from three layers, lowest priority first:
//!
//! 1. **Built-in**: compiled into the crate (see [`builtin_entries`]).
//! 2. **Defaults**: `<root>/relationships/default.json`, shared by every tenant.
//! 3. **Tenant**: `<root>/relationships/<tenant>.json`.
//!
//! A later layer replaces the *whole* entry for a relation alias. Fields are never
//! patched individually. Files are read on every call; nothing is cached.
//!
//! ```json
//! {
//!   "version": 1,
//!   "relationships": {
//!     "mxapiwo": {
//!       "asset": { "relatedResource": "mxapiasset", "rootJoinField": "assetnum", "relatedKeyField": "assetnum" }
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{ConfigError, RelationshipConfig, RelationshipEntry};

/// Environment variable naming the configuration root directory.
pub const CONFIG_DIR_ENV: &str = "RELATION_PREFETCH_CONFIG_DIR";

/// Configuration root used when [`CONFIG_DIR_ENV`] is unset.
pub const DEFAULT_CONFIG_DIR: &str = "config";

const RELATIONSHIPS_DIR: &str = "relationships";
const DEFAULT_LAYER_FILE: &str = "default.json";

/// Merged relation alias → config view for a single root resource.
pub type RelationshipMap = BTreeMap<String, RelationshipConfig>;

/// Raw entries of one layer for one root resource, keyed by lower-cased alias.
type EntryMap = HashMap<String, RelationshipEntry>;

/// Identifies a configuration layer in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSource {
    BuiltIn,
    Defaults,
    Tenant,
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSource::BuiltIn => write!(f, "built-in"),
            LayerSource::Defaults => write!(f, "defaults"),
            LayerSource::Tenant => write!(f, "tenant"),
        }
    }
}

/// On-disk shape of a relationship file.
#[derive(Debug, Deserialize)]
struct RelationshipFile {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<u32>,
    #[serde(default)]
    relationships: HashMap<String, HashMap<String, serde_json::Value>>,
}

/// Loads relationship definitions for a tenant from the filesystem.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Creates a store reading override files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store rooted at `$RELATION_PREFETCH_CONFIG_DIR`, or `config`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Produces the merged relationships of `root_resource` for `tenant_id`.
    ///
    /// Never fails: unreadable or malformed override files are logged and skipped,
    /// and entries that are unusable after merging are dropped.
    pub fn load(&self, root_resource: &str, tenant_id: &str) -> RelationshipMap {
        let root_key = root_resource.trim().to_ascii_lowercase();
        let dir = self.root.join(RELATIONSHIPS_DIR);

        let builtin = builtin_entries(&root_key);
        let defaults = self.read_layer(LayerSource::Defaults, &dir.join(DEFAULT_LAYER_FILE), &root_key);
        let tenant = match tenant_file_name(tenant_id) {
            Some(file) => self.read_layer(LayerSource::Tenant, &dir.join(file), &root_key),
            None => {
                debug!(tenant_id, "Tenant id is not a plain file name, skipping tenant layer");
                EntryMap::new()
            }
        };

        let merged = merge_layers([builtin, defaults, tenant]);
        let mut relationships = RelationshipMap::new();
        for (alias, entry) in merged {
            match entry.validate() {
                Some(cfg) => {
                    relationships.insert(alias, cfg);
                }
                None => debug!(root = %root_key, %alias, "Skipping unusable relationship entry"),
            }
        }
        debug!(root = %root_key, tenant_id, count = relationships.len(), "Relationships loaded");
        relationships
    }

    fn read_layer(&self, source: LayerSource, path: &Path, root_key: &str) -> EntryMap {
        match read_layer_file(path) {
            Ok(Some(file)) => entries_for_root(source, file, root_key),
            Ok(None) => EntryMap::new(),
            Err(e) => {
                warn!(layer = %source, error = %e, "Ignoring relationship layer");
                EntryMap::new()
            }
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Merges layers in order; a later layer replaces whole entries of earlier ones.
fn merge_layers<const N: usize>(layers: [EntryMap; N]) -> EntryMap {
    let mut merged = EntryMap::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

/// Reads a layer file. A missing file is `Ok(None)`.
fn read_layer_file(path: &Path) -> Result<Option<RelationshipFile>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Collects the entries of `root_key` from one layer file.
///
/// Names are matched ignoring ASCII case. When several spellings collide, they are
/// applied in name order with the exact lower-case spelling last, so it wins.
fn entries_for_root(source: LayerSource, file: RelationshipFile, root_key: &str) -> EntryMap {
    let mut roots: Vec<_> = file
        .relationships
        .into_iter()
        .filter(|(root, _)| root.eq_ignore_ascii_case(root_key))
        .collect();
    roots.sort_by(|(a, _), (b, _)| precedence(a, root_key).cmp(&precedence(b, root_key)));

    let mut entries = EntryMap::new();
    for (_, relations) in roots {
        let mut relations: Vec<_> = relations.into_iter().collect();
        relations.sort_by(|(a, _), (b, _)| {
            precedence(a, &a.to_ascii_lowercase()).cmp(&precedence(b, &b.to_ascii_lowercase()))
        });
        for (alias, raw) in relations {
            match serde_json::from_value::<RelationshipEntry>(raw) {
                Ok(entry) => {
                    entries.insert(alias.to_ascii_lowercase(), entry);
                }
                Err(e) => warn!(layer = %source, %alias, error = %e, "Ignoring malformed relationship entry"),
            }
        }
    }
    entries
}

/// Sort key placing `name` after every other spelling when it equals `canonical`.
fn precedence<'n>(name: &'n str, canonical: &str) -> (bool, &'n str) {
    (name == canonical, name)
}

/// Maps a tenant id to its override file name, refusing anything that is not a
/// single plain path segment.
fn tenant_file_name(tenant_id: &str) -> Option<String> {
    let plain = !tenant_id.is_empty()
        && tenant_id != "."
        && tenant_id != ".."
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    plain.then(|| format!("{tenant_id}.json"))
}

/// Relationships available with zero configuration.
pub fn builtin_entries(root_key: &str) -> HashMap<String, RelationshipEntry> {
    let asset = || RelationshipEntry::new("mxapiasset", "assetnum", "assetnum").with_site_field("siteid");
    let location = || RelationshipEntry::new("mxapioperloc", "location", "location").with_site_field("siteid");
    let vendor = || RelationshipEntry::new("mxapivendor", "vendor", "company");

    let entries: Vec<(&str, RelationshipEntry)> = match root_key {
        "mxapiwo" | "mxapisr" => vec![("asset", asset()), ("location", location())],
        "mxapiasset" => vec![("location", location())],
        "mxapipo" | "mxapiinvoice" => vec![("vendor", vendor())],
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .map(|(alias, entry)| (alias.to_string(), entry))
        .collect()
}
