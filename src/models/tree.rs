//! Regression tree used as the boosting base learner
//!
//! Nodes live in a flat arena so leaves can be addressed by index, which the
//! quantile loss needs to re-estimate leaf values after the split structure
//! has been grown on the gradients.

use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Least-squares regression tree
///
/// Samples whose split feature is NaN never satisfy `x <= threshold` and are
/// routed right, both while growing and while predicting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on rows `indices` of `x` against `y`
    ///
    /// `feature_order` fixes the order features are scanned in; among splits
    /// with equal gain the first one scanned wins.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[f64],
        indices: &[usize],
        config: &TreeConfig,
        feature_order: &[usize],
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, y, indices.to_vec(), 0, config, feature_order);
        tree
    }

    fn build(
        &mut self,
        x: ArrayView2<f64>,
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
        config: &TreeConfig,
        feature_order: &[usize],
    ) -> usize {
        let id = self.nodes.len();
        let n = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n.max(1) as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let impurity = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>();
        if depth >= config.max_depth
            || n < config.min_samples_split
            || n < 2 * config.min_samples_leaf.max(1)
            || impurity < 1e-12
        {
            return id;
        }

        let Some(split) = best_split(x, y, &indices, config, feature_order) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return id;
        }

        let left = self.build(x, y, left_idx, depth + 1, config, feature_order);
        let right = self.build(x, y, right_idx, depth + 1, config, feature_order);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };

        id
    }

    /// Index of the leaf a sample falls into
    pub fn apply(&self, row: ArrayView1<f64>) -> usize {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { .. } => return id,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Predict for a single sample
    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        match &self.nodes[self.apply(row)] {
            Node::Leaf { value } => *value,
            Node::Split { .. } => unreachable!("apply always stops at a leaf"),
        }
    }

    /// Overwrite the value of a leaf; split nodes are left untouched
    pub fn set_leaf_value(&mut self, leaf: usize, value: f64) {
        if let Some(Node::Leaf { value: v }) = self.nodes.get_mut(leaf) {
            *v = value;
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }

    /// Check a deserialized tree before it is used for prediction
    ///
    /// Children must come after their parent in the arena, which rules out
    /// cycles, and splits may only reference features below `n_features`.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::data("tree has no nodes"));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(Error::data(format!("node {}: non-finite leaf value", id)));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(Error::data(format!(
                            "node {}: feature {} out of range for {} features",
                            id, feature, n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(Error::data(format!("node {}: NaN threshold", id)));
                    }
                    for child in [*left, *right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(Error::data(format!(
                                "node {}: invalid child index {}",
                                id, child
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Scan sorted feature values once per feature using running sums
fn best_split(
    x: ArrayView2<f64>,
    y: &[f64],
    indices: &[usize],
    config: &TreeConfig,
    feature_order: &[usize],
) -> Option<SplitCandidate> {
    let n = indices.len();
    let min_leaf = config.min_samples_leaf.max(1);
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feature in feature_order {
        pairs.clear();
        pairs.extend(
            indices
                .iter()
                .map(|&i| (x[[i, feature]], y[i]))
                .filter(|(v, _)| !v.is_nan()),
        );
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..pairs.len().saturating_sub(1) {
            let (value, target) = pairs[k];
            left_sum += target;
            left_sq += target * target;

            let next = pairs[k + 1].0;
            if value == next {
                continue;
            }

            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);
            let gain = parent_sse - sse;

            if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
