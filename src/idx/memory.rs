//! In-memory metric index.
//!
//! Every tenant owns a tree over the dotted metric namespace. Tree nodes
//! are stored flat in a map keyed by path: a branch's children are path
//! segments, a leaf's children are the ids of the series sharing that
//! path (same name, different tags or interval). One shared-exclusive
//! lock guards the id map and all trees together.

use super::pattern::{expand_braces, SegmentMatcher};
use super::{tag, telemetry, MetricData, MetricDefinition, MetricIndex, Node, OrgId, PUBLIC_ORG};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct TreeNode {
    path: String,
    leaf: bool,
    children: Vec<String>,
}

#[derive(Debug, Default)]
struct Tree {
    items: HashMap<String, TreeNode>,
}

impl Tree {
    fn with_root() -> Self {
        let mut items = HashMap::new();
        items.insert(
            String::new(),
            TreeNode {
                path: String::new(),
                leaf: false,
                children: Vec::new(),
            },
        );
        Tree { items }
    }
}

#[derive(Debug, Default)]
struct IndexInner {
    by_id: HashMap<String, MetricDefinition>,
    trees: HashMap<OrgId, Tree>,
}

/// Memory index configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Whether `find_by_tag` is available
    pub tag_support: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { tag_support: true }
    }
}

/// The in-memory [`MetricIndex`] implementation.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    config: IndexConfig,
    inner: RwLock<IndexInner>,
}

impl MemoryIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(IndexInner::default()),
        }
    }
}

impl MetricIndex for MemoryIndex {
    fn add(&self, data: &MetricData) {
        let pre = Instant::now();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_id.get_mut(&data.id) {
            debug!(id = %data.id, "definition already indexed, touching last_update");
            existing.last_update = data.time;
            telemetry::record_op("add", true, pre.elapsed().as_secs_f64());
            return;
        }
        let ok = insert_def(&mut inner, MetricDefinition::from(data));
        telemetry::record_op("add", ok, pre.elapsed().as_secs_f64());
    }

    fn add_def(&self, def: MetricDefinition) {
        let pre = Instant::now();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_id.get_mut(&def.id) {
            debug!(id = %def.id, "definition already indexed, touching last_update");
            existing.last_update = def.last_update;
            telemetry::record_op("add", true, pre.elapsed().as_secs_f64());
            return;
        }
        let ok = insert_def(&mut inner, def);
        telemetry::record_op("add", ok, pre.elapsed().as_secs_f64());
    }

    fn load(&self, defs: Vec<MetricDefinition>) {
        let pre = Instant::now();
        let mut inner = self.inner.write();
        for def in defs {
            if inner.by_id.contains_key(&def.id) {
                continue;
            }
            insert_def(&mut inner, def);
        }
        telemetry::record_op("load", true, pre.elapsed().as_secs_f64());
    }

    fn get(&self, id: &str) -> Result<MetricDefinition> {
        let pre = Instant::now();
        let inner = self.inner.read();
        let res = inner.by_id.get(id).cloned().ok_or(Error::DefNotFound);
        telemetry::record_op("get", res.is_ok(), pre.elapsed().as_secs_f64());
        res
    }

    fn list(&self, org_id: OrgId) -> Vec<MetricDefinition> {
        let pre = Instant::now();
        let inner = self.inner.read();
        let orgs: Vec<OrgId> = if org_id == PUBLIC_ORG {
            inner.trees.keys().copied().collect()
        } else {
            vec![PUBLIC_ORG, org_id]
        };

        let mut defs = Vec::new();
        for org in orgs {
            let Some(tree) = inner.trees.get(&org) else {
                continue;
            };
            for node in tree.items.values().filter(|n| n.leaf) {
                for id in &node.children {
                    if let Some(def) = inner.by_id.get(id) {
                        defs.push(def.clone());
                    }
                }
            }
        }
        telemetry::record_op("list", true, pre.elapsed().as_secs_f64());
        defs
    }

    fn find(&self, org_id: OrgId, pattern: &str) -> Result<Vec<Node>> {
        let pre = Instant::now();
        let inner = self.inner.read();

        let mut matched = find_paths(&inner, org_id, pattern);
        if org_id != PUBLIC_ORG {
            // public series are visible to every tenant
            matched = matched.and_then(|mut m| {
                let public = find_paths(&inner, PUBLIC_ORG, pattern)?;
                m.extend(public);
                Ok(m)
            });
        }
        let matched = match matched {
            Ok(m) => m,
            Err(e) => {
                telemetry::record_op("find", false, pre.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        // dedup by path; the querying tenant's copy shadows the public one
        // because its matches were collected first
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();
        for (org, path) in &matched {
            if !seen.insert(path.as_str()) {
                continue;
            }
            let Some(node) = inner.trees.get(org).and_then(|t| t.items.get(path)) else {
                continue;
            };
            results.push(resolve_node(&inner, node));
        }
        debug!(org_id, pattern, results = results.len(), "index find");
        telemetry::record_op("find", true, pre.elapsed().as_secs_f64());
        Ok(results)
    }

    fn delete(&self, org_id: OrgId, pattern: &str) -> Result<Vec<String>> {
        let pre = Instant::now();
        let mut inner = self.inner.write();
        let found = match find_paths(&inner, org_id, pattern) {
            Ok(found) => found,
            Err(e) => {
                telemetry::record_op("delete", false, pre.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let mut deleted = Vec::new();
        for (_, path) in found {
            delete_path(&mut inner, org_id, &path, &mut deleted)?;
        }
        telemetry::record_op("delete", true, pre.elapsed().as_secs_f64());
        Ok(deleted)
    }

    fn find_by_tag(
        &self,
        org_id: OrgId,
        expressions: &[String],
        from: i64,
    ) -> Result<Vec<Node>> {
        if !self.config.tag_support {
            return Err(Error::BadRequest("tag support is disabled".to_string()));
        }
        let pre = Instant::now();
        let exprs = match tag::parse_expressions(expressions) {
            Ok(exprs) => exprs,
            Err(e) => {
                telemetry::record_op("find_by_tag", false, pre.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let inner = self.inner.read();
        let orgs: Vec<OrgId> = if org_id == PUBLIC_ORG {
            vec![PUBLIC_ORG]
        } else {
            vec![org_id, PUBLIC_ORG]
        };

        let mut by_path: HashMap<String, Node> = HashMap::new();
        for (pass, org) in orgs.iter().enumerate() {
            // paths matched by an earlier pass; the tenant's own series
            // shadow public ones sharing their path
            let shadowed: HashSet<String> = if pass > 0 {
                by_path.keys().cloned().collect()
            } else {
                HashSet::new()
            };
            for def in inner.by_id.values().filter(|d| d.org_id == *org) {
                if from > 0 && def.last_update < from {
                    continue;
                }
                if shadowed.contains(&def.name) {
                    continue;
                }
                if !exprs.iter().all(|e| e.matches(def)) {
                    continue;
                }
                by_path
                    .entry(def.name.clone())
                    .or_insert_with(|| Node {
                        path: def.name.clone(),
                        leaf: true,
                        defs: Vec::new(),
                    })
                    .defs
                    .push(def.clone());
            }
        }

        telemetry::record_op("find_by_tag", true, pre.elapsed().as_secs_f64());
        Ok(by_path.into_values().collect())
    }
}

/// Insert a definition into the id map and its tenant tree. Returns false
/// when the insert is rejected because it would turn a branch into a leaf
/// or vice versa.
fn insert_def(inner: &mut IndexInner, def: MetricDefinition) -> bool {
    let org = def.org_id;
    let path = def.name.clone();
    let id = def.id.clone();

    if !inner.trees.contains_key(&org) {
        debug!(org, "first definition for tenant, creating tree");
        inner.trees.insert(org, Tree::with_root());
    } else if let Some(node) = inner
        .trees
        .get_mut(&org)
        .expect("tree just checked")
        .items
        .get_mut(&path)
    {
        // multiple definitions may share one path when tags or interval
        // differ; anything else on this path is bad data
        if !node.leaf {
            warn!(org, path, "rejecting insert: path is already a branch");
            telemetry::record_bad_data();
            return false;
        }
        if !node.children.contains(&id) {
            node.children.push(id.clone());
        }
        inner.by_id.insert(id, def);
        return true;
    }

    let segments: Vec<&str> = path.split('.').collect();

    // walk backwards through the prefixes to find the deepest branch this
    // path extends
    let mut start_pos = 0;
    for i in (1..segments.len()).rev() {
        let prefix = segments[..i].join(".");
        match inner.trees[&org].items.get(&prefix) {
            Some(n) if n.leaf => {
                warn!(org, path, prefix, "rejecting insert: prefix is a leaf");
                telemetry::record_bad_data();
                return false;
            }
            Some(_) => {
                start_pos = i;
                break;
            }
            None => {}
        }
    }

    let tree = inner.trees.get_mut(&org).expect("tree just checked");
    let attach_path = segments[..start_pos].join(".");
    tree.items
        .get_mut(&attach_path)
        .expect("attach branch exists")
        .children
        .push(segments[start_pos].to_string());

    // create the missing intermediate branches
    for i in start_pos + 1..segments.len() {
        let branch = segments[..i].join(".");
        debug!(org, branch, child = segments[i], "creating branch");
        tree.items.insert(
            branch.clone(),
            TreeNode {
                path: branch,
                leaf: false,
                children: vec![segments[i].to_string()],
            },
        );
    }

    debug!(org, path, "creating leaf");
    tree.items.insert(
        path.clone(),
        TreeNode {
            path,
            leaf: true,
            children: vec![id.clone()],
        },
    );
    inner.by_id.insert(id, def);
    true
}

/// Find paths matching `pattern` in one tenant's tree. Results are
/// `(org, path)` pairs so the caller can resolve nodes against the right
/// tree after merging tenants.
fn find_paths(
    inner: &IndexInner,
    org: OrgId,
    pattern: &str,
) -> Result<Vec<(OrgId, String)>> {
    let Some(tree) = inner.trees.get(&org) else {
        debug!(org, "tenant has no tree");
        return Ok(Vec::new());
    };

    let mut results = Vec::new();
    for expanded in expand_braces(pattern) {
        for path in find_expanded(tree, &expanded)? {
            results.push((org, path));
        }
    }
    Ok(results)
}

/// Find paths matching one brace-free pattern in a tree.
fn find_expanded(tree: &Tree, pattern: &str) -> Result<Vec<String>> {
    let segments: Vec<&str> = pattern.split('.').collect();
    let literal_count = segments
        .iter()
        .position(|s| s.contains(['*', '[', ']', '?']))
        .unwrap_or(segments.len());

    if literal_count == segments.len() {
        // no matching needed, the pattern is a specific branch or leaf
        return Ok(if tree.items.contains_key(pattern) {
            vec![pattern.to_string()]
        } else {
            Vec::new()
        });
    }

    let start_path = segments[..literal_count].join(".");
    if !tree.items.contains_key(&start_path) {
        return Ok(Vec::new());
    }

    let mut current = vec![start_path];
    for seg in &segments[literal_count..] {
        let matcher = SegmentMatcher::compile(seg)?;
        let mut next = Vec::new();
        for path in &current {
            let Some(node) = tree.items.get(path) else {
                continue;
            };
            if node.leaf {
                // a leaf with pattern segments still to consume is a dead end
                continue;
            }
            for child in matcher.matches(&node.children) {
                next.push(if path.is_empty() {
                    child.to_string()
                } else {
                    format!("{path}.{child}")
                });
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    Ok(current)
}

fn resolve_node(inner: &IndexInner, node: &TreeNode) -> Node {
    let defs = if node.leaf {
        node.children
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    } else {
        Vec::new()
    };
    Node {
        path: node.path.clone(),
        leaf: node.leaf,
        defs,
    }
}

/// Delete the node at `path` (branches recurse into their children) and
/// prune any ancestor branches left childless.
fn delete_path(
    inner: &mut IndexInner,
    org: OrgId,
    path: &str,
    deleted: &mut Vec<String>,
) -> Result<()> {
    let Some(node) = inner.trees.get(&org).and_then(|t| t.items.get(path)) else {
        // already removed while pruning a sibling
        return Ok(());
    };
    let leaf = node.leaf;
    let children = node.children.clone();

    if !leaf {
        debug!(org, path, "deleting branch");
        let child_paths = find_paths(inner, org, &format!("{path}.*"))?;
        for (_, child_path) in child_paths {
            delete_path(inner, org, &child_path, deleted)?;
        }
    } else {
        for id in &children {
            inner.by_id.remove(id);
            deleted.push(id.clone());
        }
    }

    let tree = inner.trees.get_mut(&org).expect("tree exists");
    if tree.items.remove(path).is_none() {
        // pruning during the recursion already took this node out,
        // together with its ancestors
        return Ok(());
    }

    // walk the parent chain: a branch with other children ends the walk,
    // a branch left childless is removed and the walk continues
    let segments: Vec<&str> = path.split('.').collect();
    for i in (0..segments.len()).rev() {
        let branch = segments[..i].join(".");
        let child = segments[i];
        let Some(bnode) = tree.items.get_mut(&branch) else {
            warn!(org, branch, "branch missing during prune, index is corrupt");
            telemetry::record_corruption();
            break;
        };
        if bnode.children.len() > 1 {
            bnode.children.retain(|c| c != child);
            break;
        }
        if bnode.children.first().map(String::as_str) != Some(child) {
            warn!(
                org,
                branch, child, "child missing from branch during prune, index is corrupt"
            );
            telemetry::record_corruption();
            break;
        }
        if branch.is_empty() {
            // the root branch always survives
            bnode.children.clear();
            break;
        }
        debug!(org, branch, "pruning childless branch");
        tree.items.remove(&branch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(idx: &MemoryIndex, org: OrgId, name: &str) -> String {
        let mut data = MetricData {
            org_id: org,
            name: name.to_string(),
            metric: name.to_string(),
            interval: 10,
            mtype: "gauge".to_string(),
            time: 100,
            ..MetricData::default()
        };
        data.set_id();
        idx.add(&data);
        data.id
    }

    fn index() -> MemoryIndex {
        MemoryIndex::new(IndexConfig::default())
    }

    #[test]
    fn add_and_get() {
        let idx = index();
        let id = add(&idx, 1, "a.b.c");
        let def = idx.get(&id).unwrap();
        assert_eq!(def.name, "a.b.c");
        assert!(matches!(idx.get("missing"), Err(Error::DefNotFound)));
    }

    #[test]
    fn add_twice_touches_last_update() {
        let idx = index();
        let mut data = MetricData {
            org_id: 1,
            name: "a.b".to_string(),
            metric: "a.b".to_string(),
            interval: 10,
            mtype: "gauge".to_string(),
            time: 100,
            ..MetricData::default()
        };
        data.set_id();
        idx.add(&data);
        data.time = 200;
        idx.add(&data);
        assert_eq!(idx.get(&data.id).unwrap().last_update, 200);
        assert_eq!(idx.list(1).len(), 1);
    }

    #[test]
    fn leaf_collects_ids_sharing_a_path() {
        let idx = index();
        let mut a = MetricData {
            org_id: 1,
            name: "a.b".to_string(),
            metric: "a.b".to_string(),
            interval: 10,
            mtype: "gauge".to_string(),
            ..MetricData::default()
        };
        a.set_id();
        let mut b = a.clone();
        b.interval = 60;
        b.set_id();
        assert_ne!(a.id, b.id);
        idx.add(&a);
        idx.add(&b);

        let nodes = idx.find(1, "a.b").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].leaf);
        assert_eq!(nodes[0].defs.len(), 2);
    }

    #[test]
    fn branch_leaf_collision_is_rejected() {
        let idx = index();
        add(&idx, 1, "a.b.c");
        // "a.b" is a branch now; a series named "a.b" is bad data
        let id = add(&idx, 1, "a.b");
        assert!(matches!(idx.get(&id), Err(Error::DefNotFound)));

        // and a series underneath an existing leaf is bad data too
        let id = add(&idx, 1, "a.b.c.d");
        assert!(matches!(idx.get(&id), Err(Error::DefNotFound)));
    }

    #[test]
    fn no_path_is_branch_and_leaf() {
        let idx = index();
        add(&idx, 1, "x.y");
        add(&idx, 1, "x.z");
        add(&idx, 1, "x.y2.deep");
        let inner = idx.inner.read();
        let tree = &inner.trees[&1];
        for node in tree.items.values() {
            if node.leaf {
                assert!(node.children.iter().all(|c| inner.by_id.contains_key(c)));
            } else {
                for child in &node.children {
                    let child_path = if node.path.is_empty() {
                        child.clone()
                    } else {
                        format!("{}.{child}", node.path)
                    };
                    assert!(tree.items.contains_key(&child_path));
                }
            }
        }
    }

    #[test]
    fn find_with_wildcards() {
        let idx = index();
        add(&idx, 1, "collectd.host1.cpu.idle");
        add(&idx, 1, "collectd.host2.cpu.idle");
        add(&idx, 1, "collectd.host2.mem.used");

        let nodes = idx.find(1, "collectd.*.cpu.idle").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.leaf));

        let nodes = idx.find(1, "collectd.host2.*").unwrap();
        let mut paths: Vec<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["collectd.host2.cpu", "collectd.host2.mem"]);
        assert!(nodes.iter().all(|n| !n.leaf));
    }

    #[test]
    fn find_with_braces() {
        let idx = index();
        add(&idx, 1, "a.dc1.x");
        add(&idx, 1, "a.dc2.x");
        add(&idx, 1, "a.dc3.x");

        let nodes = idx.find(1, "a.{dc1,dc3}.x").unwrap();
        let mut paths: Vec<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["a.dc1.x", "a.dc3.x"]);
    }

    #[test]
    fn find_with_bracket_class() {
        let idx = index();
        for i in 0..16 {
            add(&idx, 1, &format!("h.host{i}"));
        }
        let nodes = idx.find(1, "h.host1[0-5]").unwrap();
        assert_eq!(nodes.len(), 6);
    }

    #[test]
    fn find_merges_public_private_wins() {
        let idx = index();
        add(&idx, 1, "shared.series");
        add(&idx, PUBLIC_ORG, "shared.series");
        add(&idx, PUBLIC_ORG, "public.only");

        let nodes = idx.find(1, "shared.series").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].defs.len(), 1);
        assert_eq!(nodes[0].defs[0].org_id, 1);

        let nodes = idx.find(1, "public.only").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].defs[0].org_id, PUBLIC_ORG);
    }

    #[test]
    fn tenants_cannot_see_each_other() {
        let idx = index();
        add(&idx, 1, "org1.metric");
        add(&idx, 2, "org2.metric");
        assert!(idx.find(1, "org2.*").unwrap().is_empty());
        assert!(idx.find(2, "org1.*").unwrap().is_empty());
    }

    #[test]
    fn malformed_pattern_is_bad_request() {
        let idx = index();
        add(&idx, 1, "a.b");
        assert!(matches!(
            idx.find(1, "a.[b"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn list_merges_public() {
        let idx = index();
        add(&idx, 1, "a.one");
        add(&idx, 2, "a.two");
        add(&idx, PUBLIC_ORG, "a.pub");

        assert_eq!(idx.list(1).len(), 2);
        assert_eq!(idx.list(2).len(), 2);
        // -1 lists everything across tenants
        assert_eq!(idx.list(PUBLIC_ORG).len(), 3);
    }

    #[test]
    fn delete_leaf_prunes_empty_branches() {
        let idx = index();
        let id = add(&idx, 1, "a.b.c.d");
        let deleted = idx.delete(1, "a.b.c.d").unwrap();
        assert_eq!(deleted, vec![id.clone()]);
        assert!(matches!(idx.get(&id), Err(Error::DefNotFound)));

        let inner = idx.inner.read();
        let tree = &inner.trees[&1];
        assert_eq!(tree.items.len(), 1, "only the root may remain");
        let root = &tree.items[""];
        assert!(root.children.is_empty());
    }

    #[test]
    fn delete_keeps_branches_with_other_children() {
        let idx = index();
        add(&idx, 1, "a.b.c");
        let id = add(&idx, 1, "a.b.d");
        let deleted = idx.delete(1, "a.b.d").unwrap();
        assert_eq!(deleted, vec![id]);

        let nodes = idx.find(1, "a.b.*").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].path, "a.b.c");
    }

    #[test]
    fn delete_branch_deletes_descendants() {
        let idx = index();
        add(&idx, 1, "a.b.c");
        add(&idx, 1, "a.b.d");
        add(&idx, 1, "a.other");

        let deleted = idx.delete(1, "a.b").unwrap();
        assert_eq!(deleted.len(), 2);
        assert!(idx.find(1, "a.b.*").unwrap().is_empty());
        assert_eq!(idx.find(1, "a.*").unwrap().len(), 1);
    }

    #[test]
    fn delete_add_round_trip_restores_tree() {
        let idx = index();
        add(&idx, 1, "x.y.z");
        let shape_before: Vec<String> = {
            let inner = idx.inner.read();
            let mut paths: Vec<String> = inner.trees[&1].items.keys().cloned().collect();
            paths.sort();
            paths
        };

        idx.delete(1, "x.y.z").unwrap();
        add(&idx, 1, "x.y.z");

        let shape_after: Vec<String> = {
            let inner = idx.inner.read();
            let mut paths: Vec<String> = inner.trees[&1].items.keys().cloned().collect();
            paths.sort();
            paths
        };
        assert_eq!(shape_before, shape_after);
    }

    #[test]
    fn find_by_tag_intersects_and_filters() {
        let idx = index();
        let mk = |name: &str, tags: &[&str]| {
            let mut d = MetricData {
                org_id: 1,
                name: name.to_string(),
                metric: name.to_string(),
                interval: 10,
                mtype: "gauge".to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                time: 100,
                ..MetricData::default()
            };
            d.set_id();
            idx.add(&d);
        };
        mk("cpu.idle", &["dc=dc1", "host=web1"]);
        mk("cpu.idle2", &["dc=dc1", "host=db1"]);
        mk("cpu.idle3", &["dc=dc2", "host=web2"]);

        let exprs = vec!["dc=dc1".to_string(), "host=~web".to_string()];
        let nodes = idx.find_by_tag(1, &exprs, 0).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].path, "cpu.idle");

        // same result with the expressions in the other order
        let exprs = vec!["host=~web".to_string(), "dc=dc1".to_string()];
        let nodes = idx.find_by_tag(1, &exprs, 0).unwrap();
        assert_eq!(nodes.len(), 1);

        let exprs = vec!["dc=~dc".to_string(), "host!~db".to_string()];
        let mut paths: Vec<String> = idx
            .find_by_tag(1, &exprs, 0)
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["cpu.idle", "cpu.idle3"]);
    }

    #[test]
    fn find_by_tag_respects_from() {
        let idx = index();
        let mut d = MetricData {
            org_id: 1,
            name: "old.series".to_string(),
            metric: "old.series".to_string(),
            interval: 10,
            mtype: "gauge".to_string(),
            tags: vec!["dc=dc1".to_string()],
            time: 50,
            ..MetricData::default()
        };
        d.set_id();
        idx.add(&d);

        let exprs = vec!["dc=dc1".to_string()];
        assert_eq!(idx.find_by_tag(1, &exprs, 0).unwrap().len(), 1);
        assert!(idx.find_by_tag(1, &exprs, 100).unwrap().is_empty());
    }

    #[test]
    fn find_by_tag_disabled() {
        let idx = MemoryIndex::new(IndexConfig { tag_support: false });
        assert!(idx
            .find_by_tag(1, &["a=b".to_string()], 0)
            .is_err());
    }
}
