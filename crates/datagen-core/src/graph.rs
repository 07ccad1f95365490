use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::error::{GraphIntegrityError, Result};
use crate::feature::{FeatureId, FeatureRef};
use crate::parameter::{ParameterDependency, ParameterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    child: FeatureId,
    parameter: ParameterId,
}

#[derive(Debug, Clone)]
struct Node {
    definition: FeatureRef,
    declared: u64,
    children: BTreeMap<EdgeKey, ParameterDependency>,
}

/// A `(parent, child, parameter)` triple: `child`'s parameter reads `parent`'s value.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub parent: FeatureRef,
    pub child: FeatureRef,
    pub parameter: ParameterDependency,
}

/// Feature definitions, their dependency edges, and a maintained topological order.
///
/// Invariants kept by every mutation:
/// - no sequence of edges returns to its starting definition;
/// - every parent or child of an edge is a node with its own edge set;
/// - for every edge, the parent sits strictly before the child in the order.
#[derive(Debug, Clone, Default)]
pub struct FeatureDefinitionGraph {
    nodes: BTreeMap<FeatureId, Node>,
    order: Vec<FeatureId>,
    next_declared: u64,
}

impl FeatureDefinitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every definition, then every dependency edge the definitions declare.
    ///
    /// Fails on the first edge that cannot be added; no partial graph is returned.
    pub fn from_definitions(definitions: &[FeatureRef]) -> Result<Self> {
        let mut graph = Self::new();
        for definition in definitions {
            graph.add_definition(definition);
        }
        for definition in definitions {
            for parameter in definition.dependent_parameters() {
                let parent = parameter.source().clone();
                graph.add_dependency(&parent, definition, &parameter)?;
            }
        }
        Ok(graph)
    }

    /// Independent structural clone, used to snapshot a graph before a run.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Returns `false` if the definition is already part of the graph.
    pub fn add_definition(&mut self, definition: &FeatureRef) -> bool {
        let id = definition.id();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id,
            Node {
                definition: definition.clone(),
                declared: self.next_declared,
                children: BTreeMap::new(),
            },
        );
        self.next_declared += 1;
        self.order.push(id);
        debug!(feature = %definition.name(), "feature added to graph");
        true
    }

    /// Add the edge `parent -> child` carried by `parameter`.
    ///
    /// Returns `Ok(false)` if the identical edge already exists. If the edge
    /// would close a cycle, the graph is restored to its exact prior state and
    /// a circular dependency error is returned.
    pub fn add_dependency(
        &mut self,
        parent: &FeatureRef,
        child: &FeatureRef,
        parameter: &ParameterDependency,
    ) -> Result<bool> {
        if !self.nodes.contains_key(&parent.id()) {
            return Err(GraphIntegrityError::MissingParent {
                parent: parent.name().to_string(),
            }
            .into());
        }
        if parameter.source().id() != parent.id() {
            return Err(GraphIntegrityError::ParameterSourceMismatch {
                parent: parent.name().to_string(),
                child: child.name().to_string(),
                parameter: parameter.name(),
            }
            .into());
        }

        let key = EdgeKey {
            child: child.id(),
            parameter: parameter.id(),
        };
        if self
            .nodes
            .get(&parent.id())
            .is_some_and(|node| node.children.contains_key(&key))
        {
            return Ok(false);
        }

        let child_added = self.add_definition(child);
        if let Some(node) = self.nodes.get_mut(&parent.id()) {
            node.children.insert(key, parameter.clone());
        }

        if self.contains_path(child.id(), parent.id()) {
            if let Some(node) = self.nodes.get_mut(&parent.id()) {
                node.children.remove(&key);
            }
            if child_added {
                self.remove_last_definition(child.id());
            }
            warn!(
                parent = %parent.name(),
                child = %child.name(),
                "dependency rejected: circular"
            );
            return Err(GraphIntegrityError::CircularDependency {
                parent: parent.name().to_string(),
                child: child.name().to_string(),
            }
            .into());
        }

        self.repair_order(parent.id(), child.id());
        debug!(
            parent = %parent.name(),
            child = %child.name(),
            parameter = parameter.name(),
            "dependency added"
        );
        Ok(true)
    }

    pub fn contains(&self, definition: &FeatureRef) -> bool {
        self.nodes.contains_key(&definition.id())
    }

    /// True iff the definition exists and feeds no other definition.
    pub fn is_leaf(&self, definition: &FeatureRef) -> bool {
        self.nodes
            .get(&definition.id())
            .is_some_and(|node| node.children.is_empty())
    }

    /// Parameters on other definitions that read this definition's value.
    pub fn dependent_parameters(&self, definition: &FeatureRef) -> Vec<ParameterDependency> {
        self.nodes
            .get(&definition.id())
            .map(|node| node.children.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();
        for id in &self.order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for (key, parameter) in &node.children {
                if let Some(child) = self.nodes.get(&key.child) {
                    edges.push(DependencyEdge {
                        parent: node.definition.clone(),
                        child: child.definition.clone(),
                        parameter: parameter.clone(),
                    });
                }
            }
        }
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.children.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions in the maintained order: parents before their children.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            graph: self,
            ids: self.order.iter(),
        }
    }

    pub fn topological_order(&self) -> Vec<FeatureRef> {
        self.iter().cloned().collect()
    }

    /// Definitions in the order they were first added.
    pub fn declaration_order(&self) -> Vec<FeatureRef> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by_key(|node| node.declared);
        nodes.into_iter().map(|node| node.definition.clone()).collect()
    }

    fn remove_last_definition(&mut self, id: FeatureId) {
        self.nodes.remove(&id);
        if self.order.last() == Some(&id) {
            self.order.pop();
            self.next_declared = self.next_declared.saturating_sub(1);
        } else {
            self.order.retain(|entry| *entry != id);
        }
    }

    fn contains_path(&self, start: FeatureId, goal: FeatureId) -> bool {
        let mut stack = vec![start];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == goal {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.keys().map(|key| key.child));
            }
        }
        false
    }

    /// Restore parent-before-child after inserting `parent -> child`.
    ///
    /// Moving `parent` alone is not enough when one of its ancestors sits
    /// between `child` and `parent`. Every ancestor of `parent` inside that
    /// window moves, in relative order, to just before `child`; all other
    /// entries keep their relative order.
    fn repair_order(&mut self, parent: FeatureId, child: FeatureId) {
        let position = |id: FeatureId| self.order.iter().position(|entry| *entry == id);
        let (Some(parent_pos), Some(child_pos)) = (position(parent), position(child)) else {
            return;
        };
        if parent_pos < child_pos {
            return;
        }

        let window = &self.order[child_pos..=parent_pos];
        let mut ancestors = HashSet::from([parent]);
        for id in window.iter().rev().skip(1) {
            let feeds_ancestor = self.nodes.get(id).is_some_and(|node| {
                node.children
                    .keys()
                    .any(|key| ancestors.contains(&key.child))
            });
            if feeds_ancestor {
                ancestors.insert(*id);
            }
        }

        let (moved, rest): (Vec<FeatureId>, Vec<FeatureId>) =
            window.iter().partition(|id| ancestors.contains(*id));
        let reordered: Vec<FeatureId> = moved.into_iter().chain(rest).collect();
        self.order[child_pos..=parent_pos].copy_from_slice(&reordered);
    }
}

impl PartialEq for FeatureDefinitionGraph {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.nodes.len() == other.nodes.len()
            && self.nodes.iter().all(|(id, node)| {
                other
                    .nodes
                    .get(id)
                    .is_some_and(|theirs| node.children.keys().eq(theirs.children.keys()))
            })
    }
}

/// Iterator over definitions in topological order.
pub struct Iter<'a> {
    graph: &'a FeatureDefinitionGraph,
    ids: std::slice::Iter<'a, FeatureId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a FeatureRef;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        self.graph.nodes.get(id).map(|node| &node.definition)
    }
}

impl<'a> IntoIterator for &'a FeatureDefinitionGraph {
    type Item = &'a FeatureRef;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
