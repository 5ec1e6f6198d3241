//! Regression tree storage and traversal.

use crate::error::{Error, Result};
use crate::matrix::FeatureMatrix;

/// A single node of a regression tree.
///
/// Nodes live in a flat array; the root is index 0 and every child index is
/// strictly greater than its parent's, so traversal always terminates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf {
        value: f32,
    },
}

/// A validated regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RegTree {
    nodes: Vec<TreeNode>,
}

impl RegTree {
    /// Validate and wrap a flat node array.
    ///
    /// `tree` is only used to label errors.
    pub fn new(nodes: Vec<TreeNode>, num_feature: usize, tree: usize) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::MalformedModel {
                message: format!("tree {tree} has no nodes"),
            });
        }
        let len = nodes.len();
        for (index, node) in nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                for child in [left, right] {
                    if child <= index || child >= len {
                        return Err(Error::MalformedModel {
                            message: format!(
                                "tree {tree} node {index} has out-of-order child {child} \
                                 (nodes: {len})"
                            ),
                        });
                    }
                }
                if feature >= num_feature {
                    return Err(Error::MalformedModel {
                        message: format!(
                            "tree {tree} node {index} splits on feature {feature} \
                             but the model has {num_feature}"
                        ),
                    });
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Walk from the root to a leaf for one row and return the leaf value.
    ///
    /// Missing cells take the split's default branch; otherwise values
    /// strictly below the threshold go left.
    pub fn leaf_value(&self, row: &[f32], matrix: &FeatureMatrix) -> f32 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = row.get(feature).copied().unwrap_or(f32::NAN);
                    index = if matrix.is_missing(value) {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if value < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, counted in splits.
    pub fn depth(&self) -> usize {
        // Children always follow their parent, so one forward pass suffices.
        let mut depths = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = *node {
                let child_depth = depths[index] + 1;
                depths[left] = child_depth;
                depths[right] = child_depth;
                deepest = deepest.max(child_depth);
            }
        }
        deepest
    }
}

#[cfg(test)]
pub(crate) fn stump(
    feature: usize,
    threshold: f32,
    left: f32,
    right: f32,
    default_left: bool,
) -> RegTree {
    RegTree::new(
        vec![
            TreeNode::Split {
                feature,
                threshold,
                left: 1,
                right: 2,
                default_left,
            },
            TreeNode::Leaf { value: left },
            TreeNode::Leaf { value: right },
        ],
        feature + 1,
        0,
    )
    .expect("stump is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_less_goes_left() {
        let tree = stump(0, 0.5, -1.0, 1.0, true);
        let m = FeatureMatrix::from_row(&[0.5], f32::NAN);
        assert_eq!(tree.leaf_value(&[0.49], &m), -1.0);
        assert_eq!(tree.leaf_value(&[0.5], &m), 1.0);
    }

    #[test]
    fn missing_follows_default_direction() {
        let m = FeatureMatrix::from_row(&[0.0], 0.0);
        let left = stump(0, 0.5, -1.0, 1.0, true);
        let right = stump(0, 0.5, -1.0, 1.0, false);
        // 0.0 is below the threshold but is the missing sentinel here.
        assert_eq!(left.leaf_value(&[0.0], &m), -1.0);
        assert_eq!(right.leaf_value(&[0.0], &m), 1.0);
        assert_eq!(right.leaf_value(&[f32::NAN], &m), 1.0);
    }

    #[test]
    fn rejects_backward_child() {
        let nodes = vec![
            TreeNode::Leaf { value: 0.0 },
            TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 2,
                default_left: true,
            },
            TreeNode::Leaf { value: 0.0 },
        ];
        let err = RegTree::new(nodes, 1, 3).expect_err("cycle-prone tree rejected");
        assert!(err.to_string().contains("tree 3 node 1"));
    }

    #[test]
    fn rejects_feature_out_of_range() {
        let nodes = vec![
            TreeNode::Split {
                feature: 6,
                threshold: 0.0,
                left: 1,
                right: 2,
                default_left: true,
            },
            TreeNode::Leaf { value: 0.0 },
            TreeNode::Leaf { value: 0.0 },
        ];
        assert!(RegTree::new(nodes, 6, 0).is_err());
    }

    #[test]
    fn reports_shape() {
        let tree = stump(2, 0.1, 0.0, 1.0, false);
        assert_eq!(tree.num_nodes(), 3);
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.depth(), 1);
    }
}
