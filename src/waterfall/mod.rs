//! Span tree reconstruction for the trace waterfall.
//!
//! Nodes live in an arena in trace order and refer to each other by index.
//! Siblings and roots are ordered by start time; cross-application ordering
//! follows tree structure, never raw timestamps.

pub mod filter;
pub mod peer;

pub use filter::{filter_waterfall, FilterMatch};
pub use peer::{NoPeerResolver, PeerResolver, StaticPeerResolver};

use crate::core::types::{Span, SpanId, Trace};
use crate::resource::Resource;
use std::collections::HashMap;
use std::sync::Arc;

/// One span in the reconstructed tree
#[derive(Debug, Clone)]
pub struct SpanNode {
    pub span: Arc<Span>,
    pub parent: Option<usize>,
    /// Child node indices ordered by start time
    pub children: Vec<usize>,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct Waterfall {
    nodes: Vec<SpanNode>,
    roots: Vec<usize>,
    depth_first: Vec<usize>,
}

impl Waterfall {
    /// Builds the span tree for a trace.
    ///
    /// Spans whose parent is absent or not part of the trace become roots.
    /// Parent cycles are broken by promoting the earliest unreachable span.
    pub fn build(trace: &Trace) -> Self {
        let spans = trace.spans();
        let mut index_of: HashMap<SpanId, usize> = HashMap::with_capacity(spans.len());
        for (i, span) in spans.iter().enumerate() {
            index_of.entry(span.span_id).or_insert(i);
        }

        let mut nodes: Vec<SpanNode> = spans
            .iter()
            .enumerate()
            .map(|(i, span)| SpanNode {
                span: Arc::clone(span),
                parent: span
                    .parent_span_id
                    .and_then(|parent| index_of.get(&parent).copied())
                    .filter(|&parent| parent != i),
                children: Vec::new(),
                depth: 0,
            })
            .collect();

        for i in 0..nodes.len() {
            if let Some(parent) = nodes[i].parent {
                nodes[parent].children.push(i);
            }
        }
        let mut roots: Vec<usize> =
            (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect();

        let start_of = |nodes: &[SpanNode], i: usize| (nodes[i].span.start_time_unix_nano, i);
        for i in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[i].children);
            children.sort_by_key(|&c| start_of(&nodes, c));
            nodes[i].children = children;
        }
        roots.sort_by_key(|&r| start_of(&nodes, r));

        let mut waterfall = Self {
            nodes,
            roots,
            depth_first: Vec::new(),
        };
        waterfall.walk();
        waterfall
    }

    /// Computes depth-first order and depths, promoting unreachable nodes.
    fn walk(&mut self) {
        loop {
            let mut visited = vec![false; self.nodes.len()];
            let mut order = Vec::with_capacity(self.nodes.len());
            let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&r| (r, 0)).collect();
            while let Some((i, depth)) = stack.pop() {
                if visited[i] {
                    continue;
                }
                visited[i] = true;
                self.nodes[i].depth = depth;
                order.push(i);
                for &child in self.nodes[i].children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }

            let unreached = (0..self.nodes.len())
                .filter(|&i| !visited[i])
                .min_by_key(|&i| (self.nodes[i].span.start_time_unix_nano, i));
            match unreached {
                None => {
                    self.depth_first = order;
                    return;
                },
                Some(i) => self.promote_to_root(i),
            }
        }
    }

    fn promote_to_root(&mut self, i: usize) {
        if let Some(parent) = self.nodes[i].parent.take() {
            self.nodes[parent].children.retain(|&c| c != i);
        }
        let start = (self.nodes[i].span.start_time_unix_nano, i);
        let position = self
            .roots
            .iter()
            .position(|&r| (self.nodes[r].span.start_time_unix_nano, r) > start)
            .unwrap_or(self.roots.len());
        self.roots.insert(position, i);
    }

    /// All nodes in trace (insertion) order
    pub fn nodes(&self) -> &[SpanNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &SpanNode {
        &self.nodes[index]
    }

    /// Root node indices ordered by start time
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node indices in depth-first order, siblings by start time
    pub fn depth_first(&self) -> &[usize] {
        &self.depth_first
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, span_id: SpanId) -> Option<usize> {
        self.nodes.iter().position(|node| node.span.span_id == span_id)
    }

    /// Every node below `index`, depth-first
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack: Vec<usize> = self.nodes[index].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            result.push(i);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        result
    }

    /// Resources in order of first appearance in the depth-first walk
    pub fn ordered_applications(&self) -> Vec<Arc<Resource>> {
        let mut applications: Vec<Arc<Resource>> = Vec::new();
        for &i in &self.depth_first {
            let resource = &self.nodes[i].span.resource;
            if !applications.iter().any(|r| r.key() == resource.key()) {
                applications.push(Arc::clone(resource));
            }
        }
        applications
    }
}

/// Builds the span tree for a trace
pub fn build_waterfall(trace: &Trace) -> Waterfall {
    Waterfall::build(trace)
}

/// Resources of a trace ordered by tree structure
pub fn get_ordered_applications(trace: &Trace) -> Vec<Arc<Resource>> {
    Waterfall::build(trace).ordered_applications()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::types::{Span, SpanId, SpanKind, SpanStatus, Trace, TraceId};
    use crate::resource::{InstrumentationScope, Resource, ResourceKey};
    use std::sync::Arc;

    pub fn resource(name: &str) -> Arc<Resource> {
        Arc::new(Resource::new(ResourceKey::new(name, name), Vec::new(), 0))
    }

    pub fn span(resource: &Arc<Resource>, id: u8, parent: Option<u8>, start: u64) -> Arc<Span> {
        Arc::new(Span {
            trace_id: TraceId::from_bytes(&[1; 16]).unwrap(),
            span_id: SpanId::from_bytes(&[id; 8]).unwrap(),
            parent_span_id: parent.map(|p| SpanId::from_bytes(&[p; 8]).unwrap()),
            resource: Arc::clone(resource),
            scope: Arc::new(InstrumentationScope {
                name: "test".to_string(),
                version: None,
                attributes: Vec::new(),
            }),
            name: format!("operation-{}", id),
            kind: SpanKind::Internal,
            start_time_unix_nano: start,
            end_time_unix_nano: start + 100,
            status: SpanStatus::Unset,
            status_message: None,
            trace_state: None,
            attributes: Vec::new(),
            events: Vec::new(),
            links: Vec::new(),
        })
    }

    pub fn trace(spans: Vec<Arc<Span>>) -> Trace {
        Trace::new(TraceId::from_bytes(&[1; 16]).unwrap(), Arc::new(spans))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{resource, span, trace};
    use super::*;

    fn span_ids(waterfall: &Waterfall, indices: &[usize]) -> Vec<u8> {
        indices
            .iter()
            .map(|&i| waterfall.node(i).span.span_id.as_bytes()[0])
            .collect()
    }

    #[test]
    fn test_children_attached_regardless_of_arrival_order() {
        let app = resource("app");
        let waterfall = Waterfall::build(&trace(vec![
            span(&app, 3, Some(1), 30),
            span(&app, 2, Some(1), 20),
            span(&app, 1, None, 10),
        ]));

        assert_eq!(span_ids(&waterfall, waterfall.roots()), vec![1]);
        assert_eq!(span_ids(&waterfall, waterfall.depth_first()), vec![1, 2, 3]);
        assert_eq!(waterfall.node(0).depth, 1);
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let app = resource("app");
        let waterfall = Waterfall::build(&trace(vec![
            span(&app, 1, None, 10),
            span(&app, 2, Some(9), 5),
        ]));
        assert_eq!(span_ids(&waterfall, waterfall.roots()), vec![2, 1]);
    }

    #[test]
    fn test_parent_cycle_is_broken() {
        let app = resource("app");
        let waterfall = Waterfall::build(&trace(vec![
            span(&app, 1, Some(2), 10),
            span(&app, 2, Some(1), 20),
        ]));
        assert_eq!(waterfall.depth_first().len(), 2);
        assert_eq!(span_ids(&waterfall, waterfall.roots()), vec![1]);
    }

    #[test]
    fn test_ordered_applications_follow_tree_not_clock() {
        let app1 = resource("app1");
        let app2 = resource("app2");
        // Child started before its parent (clock skew)
        let t = trace(vec![span(&app1, 1, None, 100), span(&app2, 2, Some(1), 50)]);

        let names: Vec<String> = get_ordered_applications(&t)
            .iter()
            .map(|r| r.key().name.clone())
            .collect();
        assert_eq!(names, vec!["app1", "app2"]);
    }

    #[test]
    fn test_descendants() {
        let app = resource("app");
        let waterfall = Waterfall::build(&trace(vec![
            span(&app, 1, None, 10),
            span(&app, 2, Some(1), 20),
            span(&app, 3, Some(2), 30),
            span(&app, 4, None, 40),
        ]));
        let root = waterfall.find(SpanId::from_bytes(&[1; 8]).unwrap()).unwrap();
        assert_eq!(span_ids(&waterfall, &waterfall.descendants(root)), vec![2, 3]);
    }
}
