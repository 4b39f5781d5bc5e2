use crate::core::lattice::SymmetryGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionOutcome {
    /// Two previously separate sets were joined.
    Merged,
    /// Both atoms were already in one set and the new relation agrees with it.
    Consistent,
    /// Both atoms were already in one set but the new relation contradicts it.
    Inconsistent,
}

/// Disjoint-set forest over atoms in which every node also stores the
/// symmetry operation relating its orientation to its parent's:
/// `R_node ≈ R_parent · G[relation[node]]`.
///
/// The root of every set is its lowest atom index, which makes the final
/// partition and all relations independent of how merges were interleaved
/// for a fixed bond order.
#[derive(Debug, Clone)]
pub struct OrientedUnionFind {
    parent: Vec<usize>,
    relation: Vec<usize>,
    path: Vec<usize>,
}

impl OrientedUnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            relation: vec![0; len],
            path: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the root of `node` and the operation `g` with
    /// `R_node ≈ R_root · G[g]`, compressing the path on the way.
    pub fn find(&mut self, group: &SymmetryGroup, node: usize) -> (usize, usize) {
        self.path.clear();
        let mut root = node;
        while self.parent[root] != root {
            self.path.push(root);
            root = self.parent[root];
        }

        // Nodes closest to the root are rewritten first, so each parent
        // already points at the root when its child is processed.
        for &current in self.path.iter().rev() {
            let parent = self.parent[current];
            if parent != root {
                self.relation[current] = group.compose(self.relation[parent], self.relation[current]);
                self.parent[current] = root;
            }
        }

        let relation = if node == root { 0 } else { self.relation[node] };
        (root, relation)
    }

    /// Records that `R_b ≈ R_a · G[op]`.
    pub fn union(&mut self, group: &SymmetryGroup, a: usize, b: usize, op: usize) -> UnionOutcome {
        let (root_a, rel_a) = self.find(group, a);
        let (root_b, rel_b) = self.find(group, b);

        // R_root_b ≈ R_root_a · G[rel_a] · G[op] · G[rel_b]⁻¹
        let implied = group.compose(group.compose(rel_a, op), group.inverse(rel_b));

        if root_a == root_b {
            return if implied == 0 {
                UnionOutcome::Consistent
            } else {
                UnionOutcome::Inconsistent
            };
        }

        if root_a < root_b {
            self.parent[root_b] = root_a;
            self.relation[root_b] = implied;
        } else {
            self.parent[root_a] = root_b;
            self.relation[root_a] = group.inverse(implied);
        }
        UnionOutcome::Merged
    }
}
