//! Waterfall text filtering with ancestor/descendant propagation.
//!
//! A node that matches directly pulls in its whole subtree. A node that
//! only has matching descendants is shown too, but brings along just the
//! path down to those descendants.

use crate::resource::Resource;
use crate::waterfall::peer::PeerResolver;
use crate::waterfall::Waterfall;
use std::collections::HashSet;

/// Result of matching one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterMatch {
    pub matched: bool,
    /// Descendant node indices made visible by this node's match
    pub matched_descendants: Vec<usize>,
}

impl Waterfall {
    /// Returns true if the node itself contains `text` in one of its
    /// display fields
    fn matches_directly<A>(
        &self,
        index: usize,
        needle: &str,
        app_name: &A,
        resolver: &dyn PeerResolver,
    ) -> bool
    where
        A: Fn(&Resource) -> String,
    {
        let span = &self.node(index).span;
        let contains = |value: &str| value.to_lowercase().contains(needle);

        contains(&span.span_id.to_hex())
            || contains(&app_name(&span.resource))
            || contains(&span.display_summary())
            || resolver
                .resolve_peer_name(span)
                .is_some_and(|peer| contains(&peer))
    }

    /// Matches a node against `text`, case-insensitively.
    ///
    /// `app_name` selects the application name shown for a resource.
    pub fn matches_filter<A>(
        &self,
        index: usize,
        text: &str,
        app_name: &A,
        resolver: &dyn PeerResolver,
    ) -> FilterMatch
    where
        A: Fn(&Resource) -> String,
    {
        let needle = text.trim().to_lowercase();
        let state = self.match_state(&needle, app_name, resolver);
        FilterMatch {
            matched: state.reaches[index],
            matched_descendants: self.visible_below(index, &state),
        }
    }

    /// Evaluates every node once, children before parents
    fn match_state<A>(&self, needle: &str, app_name: &A, resolver: &dyn PeerResolver) -> MatchState
    where
        A: Fn(&Resource) -> String,
    {
        let mut state = MatchState {
            direct: vec![false; self.len()],
            reaches: vec![false; self.len()],
        };
        // A child always follows its parent in depth-first order
        for &i in self.depth_first().iter().rev() {
            let direct = self.matches_directly(i, needle, app_name, resolver);
            let reaches = direct || self.node(i).children.iter().any(|&c| state.reaches[c]);
            state.direct[i] = direct;
            state.reaches[i] = reaches;
        }
        state
    }

    /// Descendants of `index` made visible by a match, depth-first
    fn visible_below(&self, index: usize, state: &MatchState) -> Vec<usize> {
        if state.direct[index] {
            return self.descendants(index);
        }

        let reaching = |i: &usize| state.reaches[*i];
        let mut result = Vec::new();
        let mut stack: Vec<usize> =
            self.node(index).children.iter().rev().copied().filter(reaching).collect();
        while let Some(i) = stack.pop() {
            result.push(i);
            if state.direct[i] {
                result.extend(self.descendants(i));
            } else {
                stack.extend(self.node(i).children.iter().rev().copied().filter(reaching));
            }
        }
        result
    }
}

/// Per-node flags: matched itself, or matched itself or below
struct MatchState {
    direct: Vec<bool>,
    reaches: Vec<bool>,
}

/// Node indices visible for `text`. An empty filter shows every node.
pub fn filter_waterfall<A>(
    waterfall: &Waterfall,
    text: &str,
    app_name: &A,
    resolver: &dyn PeerResolver,
) -> HashSet<usize>
where
    A: Fn(&Resource) -> String,
{
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return (0..waterfall.len()).collect();
    }

    let state = waterfall.match_state(&needle, app_name, resolver);
    let mut visible = HashSet::new();
    for &root in waterfall.roots() {
        if state.reaches[root] {
            visible.insert(root);
            visible.extend(waterfall.visible_below(root, &state));
        }
    }
    visible
}
