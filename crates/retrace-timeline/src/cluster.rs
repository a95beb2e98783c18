//! Clusters: ordered accumulations of tags sharing a (sort-key,
//! cluster-key) pair, chained across sort keys for continuity rendering.

use retrace_core::tag::TagHandle;

/// Identity of a cluster in the project's cluster map.
pub type ClusterKey = (String, String);

/// Tags sharing one (sort-key, cluster-key) pair. Instances are created
/// lazily on first encounter and survive recompute passes — external
/// references key off them per frame — so `clear` empties membership
/// without destroying the instance.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    members: Vec<TagHandle>,
    /// Cluster with the same cluster-key under the previous sort-key, for
    /// continuity chains. Chains are built strictly in sorted key order,
    /// so they are acyclic by construction.
    linked: Option<ClusterKey>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member. No dedup check: the rebuild pass guarantees a tag
    /// is registered at most once per pass.
    pub fn add(&mut self, tag: TagHandle) {
        self.members.push(tag);
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.linked = None;
    }

    pub fn members(&self) -> &[TagHandle] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn set_linked(&mut self, previous: Option<ClusterKey>) {
        self.linked = previous;
    }

    pub fn linked(&self) -> Option<&ClusterKey> {
        self.linked.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_keeps_instance_state_fresh() {
        let mut cluster = Cluster::new();
        cluster.add(TagHandle::new(0, 0));
        cluster.add(TagHandle::new(1, 2));
        cluster.set_linked(Some(("a".into(), "theme".into())));
        assert_eq!(cluster.members().len(), 2);

        cluster.clear();
        assert!(cluster.is_empty());
        assert!(cluster.linked().is_none());
    }
}
