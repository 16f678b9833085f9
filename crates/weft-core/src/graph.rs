use crate::GraphError;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NodeId = String;

/// Closed set of node capabilities. Resolving a record's type tag to
/// behavior happens once, in the node arena, with compile-time
/// exhaustiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Input,
    Output,
    Llm,
    Api,
    Conditional,
    Merger,
    Group,
    WebCrawler,
    HtmlParser,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::Output => "output",
            NodeType::Llm => "llm",
            NodeType::Api => "api",
            NodeType::Conditional => "conditional",
            NodeType::Merger => "merger",
            NodeType::Group => "group",
            NodeType::WebCrawler => "web-crawler",
            NodeType::HtmlParser => "html-parser",
        }
    }
}

/// One node of the structural flow definition, as delivered by the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<NodeId>,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            config: serde_json::Map::new(),
            parent_group_id: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn in_group(mut self, group_id: impl Into<NodeId>) -> Self {
        self.parent_group_id = Some(group_id.into());
        self
    }
}

/// Directed edge. `source_handle` distinguishes a conditional node's
/// true/false outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// Adjacency info for one node. `level` is the longest-path distance from
/// any root; used for diagnostics and ordering hints only.
#[derive(Debug, Clone, Default)]
pub struct GraphEntry {
    pub level: usize,
    pub parent_ids: Vec<NodeId>,
    pub child_ids: Vec<NodeId>,
}

/// Read-only, per-run derivation of the structural graph. Rebuilt whenever
/// the flow definition changes; never mutated mid-run.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    records: HashMap<NodeId, NodeRecord>,
    entries: HashMap<NodeId, GraphEntry>,
    edges: Vec<Edge>,
    roots: Vec<NodeId>,
}

impl ExecutionGraph {
    pub fn record(&self, id: &str) -> Option<&NodeRecord> {
        self.records.get(id)
    }

    pub fn entry(&self, id: &str) -> Option<&GraphEntry> {
        self.entries.get(id)
    }

    /// Parent ids in edge insertion order.
    pub fn parents(&self, id: &str) -> &[NodeId] {
        self.entries.get(id).map(|e| e.parent_ids.as_slice()).unwrap_or(&[])
    }

    /// Child ids in edge insertion order.
    pub fn children(&self, id: &str) -> &[NodeId] {
        self.entries.get(id).map(|e| e.child_ids.as_slice()).unwrap_or(&[])
    }

    /// Top-level entry points: nodes with no incoming edge that are not
    /// members of a group.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// All members of a group, in record order.
    pub fn group_members(&self, group_id: &str) -> Vec<&NodeRecord> {
        let mut members: Vec<&NodeRecord> = self
            .records
            .values()
            .filter(|r| r.parent_group_id.as_deref() == Some(group_id))
            .collect();
        members.sort_by(|a, b| {
            let la = self.entries.get(&a.id).map(|e| e.level).unwrap_or(0);
            let lb = self.entries.get(&b.id).map(|e| e.level).unwrap_or(0);
            la.cmp(&lb).then_with(|| a.id.cmp(&b.id))
        });
        members
    }

    /// Internal roots of a group: members with no parents among the
    /// group's members.
    pub fn group_roots(&self, group_id: &str) -> Vec<NodeId> {
        self.group_members(group_id)
            .into_iter()
            .filter(|r| {
                self.parents(&r.id).iter().all(|p| {
                    self.records
                        .get(p)
                        .map(|pr| pr.parent_group_id.as_deref() != Some(group_id))
                        .unwrap_or(true)
                })
            })
            .map(|r| r.id.clone())
            .collect()
    }

    /// Internal leaves of a group: members with no children inside the
    /// group. Their results form the group's per-item output.
    pub fn group_leaves(&self, group_id: &str) -> Vec<NodeId> {
        self.group_members(group_id)
            .into_iter()
            .filter(|r| {
                self.children(&r.id).iter().all(|c| {
                    self.records
                        .get(c)
                        .map(|cr| cr.parent_group_id.as_deref() != Some(group_id))
                        .unwrap_or(true)
                })
            })
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.records.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.records.keys()
    }
}

/// Converts the flat node/edge lists into an [`ExecutionGraph`]. No
/// execution semantics live here.
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build(nodes: Vec<NodeRecord>, edges: Vec<Edge>) -> Result<ExecutionGraph, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut records = HashMap::with_capacity(nodes.len());
        let mut entries: HashMap<NodeId, GraphEntry> = HashMap::with_capacity(nodes.len());
        for record in nodes {
            entries.entry(record.id.clone()).or_default();
            records.insert(record.id.clone(), record);
        }

        for edge in &edges {
            if !records.contains_key(&edge.source) {
                return Err(GraphError::DanglingEdge(edge.source.clone()));
            }
            if !records.contains_key(&edge.target) {
                return Err(GraphError::DanglingEdge(edge.target.clone()));
            }
            if let Some(entry) = entries.get_mut(&edge.source) {
                entry.child_ids.push(edge.target.clone());
            }
            if let Some(entry) = entries.get_mut(&edge.target) {
                entry.parent_ids.push(edge.source.clone());
            }
        }

        // Cycle check on the full edge set.
        let mut dag: DiGraph<&NodeId, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for id in records.keys() {
            indices.insert(id.clone(), dag.add_node(id));
        }
        for edge in &edges {
            dag.add_edge(indices[&edge.source], indices[&edge.target], ());
        }
        let order = toposort(&dag, None).map_err(|_| GraphError::Cycle)?;

        // Longest-path levels, walking in topological order.
        for idx in order {
            let id = (*dag.node_weight(idx).expect("weight exists for every index")).clone();
            let level = entries[&id]
                .parent_ids
                .iter()
                .map(|p| entries[p].level + 1)
                .max()
                .unwrap_or(0);
            if let Some(entry) = entries.get_mut(&id) {
                entry.level = level;
            }
        }

        let mut roots: Vec<NodeId> = records
            .values()
            .filter(|r| entries[&r.id].parent_ids.is_empty() && r.parent_group_id.is_none())
            .map(|r| r.id.clone())
            .collect();
        roots.sort();

        Ok(ExecutionGraph {
            records,
            entries,
            edges,
            roots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diamond() -> (Vec<NodeRecord>, Vec<Edge>) {
        let nodes = vec![
            NodeRecord::new("a", NodeType::Input),
            NodeRecord::new("b", NodeType::Api),
            NodeRecord::new("c", NodeType::Api),
            NodeRecord::new("d", NodeType::Merger),
        ];
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];
        (nodes, edges)
    }

    #[test]
    fn builds_adjacency_and_levels() {
        let (nodes, edges) = diamond();
        let graph = GraphBuilder::build(nodes, edges).unwrap();

        assert_eq!(graph.roots(), &["a".to_string()]);
        assert_eq!(graph.children("a"), &["b".to_string(), "c".to_string()]);
        assert_eq!(graph.parents("d"), &["b".to_string(), "c".to_string()]);
        assert_eq!(graph.entry("a").unwrap().level, 0);
        assert_eq!(graph.entry("b").unwrap().level, 1);
        assert_eq!(graph.entry("d").unwrap().level, 2);
    }

    #[test]
    fn level_is_longest_path() {
        let nodes = vec![
            NodeRecord::new("a", NodeType::Input),
            NodeRecord::new("b", NodeType::Api),
            NodeRecord::new("c", NodeType::Output),
        ];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("a", "c")];
        let graph = GraphBuilder::build(nodes, edges).unwrap();
        assert_eq!(graph.entry("c").unwrap().level, 2);
    }

    #[test]
    fn rejects_cycles() {
        let nodes = vec![
            NodeRecord::new("a", NodeType::Api),
            NodeRecord::new("b", NodeType::Api),
        ];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];
        assert!(matches!(
            GraphBuilder::build(nodes, edges),
            Err(GraphError::Cycle)
        ));
    }

    #[test]
    fn rejects_dangling_edges() {
        let nodes = vec![NodeRecord::new("a", NodeType::Api)];
        let edges = vec![Edge::new("a", "ghost")];
        assert!(matches!(
            GraphBuilder::build(nodes, edges),
            Err(GraphError::DanglingEdge(id)) if id == "ghost"
        ));
    }

    #[test]
    fn group_members_are_not_flow_roots() {
        let nodes = vec![
            NodeRecord::new("src", NodeType::Input).with_config("value", json!([1, 2])),
            NodeRecord::new("grp", NodeType::Group),
            NodeRecord::new("inner", NodeType::Llm).in_group("grp"),
        ];
        let edges = vec![Edge::new("src", "grp")];
        let graph = GraphBuilder::build(nodes, edges).unwrap();

        assert_eq!(graph.roots(), &["src".to_string()]);
        assert_eq!(graph.group_roots("grp"), vec!["inner".to_string()]);
        assert_eq!(graph.group_leaves("grp"), vec!["inner".to_string()]);
    }

    #[test]
    fn parent_order_follows_edge_insertion() {
        let nodes = vec![
            NodeRecord::new("x", NodeType::Input),
            NodeRecord::new("y", NodeType::Input),
            NodeRecord::new("m", NodeType::Merger),
        ];
        let edges = vec![Edge::new("y", "m"), Edge::new("x", "m")];
        let graph = GraphBuilder::build(nodes, edges).unwrap();
        assert_eq!(graph.parents("m"), &["y".to_string(), "x".to_string()]);
    }

    #[test]
    fn node_type_tags_round_trip() {
        let record: NodeRecord = serde_json::from_value(json!({
            "id": "n1",
            "type": "web-crawler",
            "config": { "url": "https://example.com" }
        }))
        .unwrap();
        assert_eq!(record.node_type, NodeType::WebCrawler);
        assert_eq!(record.node_type.as_str(), "web-crawler");
    }
}
