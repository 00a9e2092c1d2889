//! Metric metadata index.
//!
//! The index answers Graphite-style queries over the dotted metric
//! namespace, per tenant. Every series a tenant sends is indexed under its
//! org id; series indexed under the public org are visible to everyone.

mod def;
mod memory;
pub mod pattern;
pub mod tag;
pub(crate) mod telemetry;

pub use def::{MetricData, MetricDefinition, MonitorState, REQUIRED_FIELDS};
pub use memory::{IndexConfig, MemoryIndex};
pub use tag::{TagExpression, TagOp};

use crate::Result;

/// Tenant identifier.
pub type OrgId = i32;

/// Series indexed under this org are visible to every tenant.
pub const PUBLIC_ORG: OrgId = -1;

/// One result node of a find: either a branch of the namespace or a leaf
/// carrying the definitions that share its path.
#[derive(Debug, Clone)]
pub struct Node {
    pub path: String,
    pub leaf: bool,
    pub defs: Vec<MetricDefinition>,
}

/// The metric index interface.
///
/// Reads take the index's shared lock, mutations the exclusive one; no
/// operation blocks on anything but that lock.
pub trait MetricIndex: Send + Sync {
    /// Upsert from an ingested sample. A known id only refreshes the
    /// definition's `last_update`.
    fn add(&self, data: &MetricData);

    /// Upsert a full definition, same semantics as [`MetricIndex::add`].
    fn add_def(&self, def: MetricDefinition);

    /// Bulk insert for rebuilding the index at startup; ids already
    /// present are left untouched.
    fn load(&self, defs: Vec<MetricDefinition>);

    /// Look up one definition by id.
    fn get(&self, id: &str) -> Result<MetricDefinition>;

    /// All definitions visible to `org_id`; the public org lists every
    /// tenant's definitions.
    fn list(&self, org_id: OrgId) -> Vec<MetricDefinition>;

    /// Nodes matching a Graphite pattern, merged across `org_id` and the
    /// public org with the tenant's own paths taking precedence.
    fn find(&self, org_id: OrgId, pattern: &str) -> Result<Vec<Node>>;

    /// Delete every series matching the pattern from `org_id`'s tree and
    /// return the deleted ids. Branches that become childless are pruned.
    fn delete(&self, org_id: OrgId, pattern: &str) -> Result<Vec<String>>;

    /// Series matching a list of `tag<op>value` expressions, optionally
    /// restricted to series updated at or after `from`.
    fn find_by_tag(&self, org_id: OrgId, expressions: &[String], from: i64)
        -> Result<Vec<Node>>;
}
