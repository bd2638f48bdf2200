//! Weighted CART regression tree.
//!
//! Splits minimize the weighted sum of squared errors. On `0`/`1`
//! targets the weighted SSE is half the weighted Gini impurity, so the
//! same tree doubles as a binary classifier whose leaves hold the
//! weighted positive-class fraction.

use serde::{Deserialize, Serialize};

use crate::Pcg32;

/// Gains at or below this are treated as "no improvement".
const MIN_GAIN: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0.
    pub max_depth: usize,
    /// Nodes with fewer samples than this become leaves.
    pub min_samples_split: usize,
    /// Number of features sampled at each node. `None` considers all.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
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

/// A fitted regression tree stored as a flat node arena; node `0` is the
/// root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// Running weighted sums for one side of a split.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    w: f64,
    wy: f64,
    wy2: f64,
}

impl Moments {
    fn add(&mut self, w: f64, y: f64) {
        self.w += w;
        self.wy += w * y;
        self.wy2 += w * y * y;
    }

    fn minus(self, other: Self) -> Self {
        Self {
            w: self.w - other.w,
            wy: self.wy - other.wy,
            wy2: self.wy2 - other.wy2,
        }
    }

    fn mean(self) -> f64 {
        if self.w > 0.0 { self.wy / self.w } else { 0.0 }
    }

    fn sse(self) -> f64 {
        if self.w > 0.0 {
            (self.wy2 - self.wy * self.wy / self.w).max(0.0)
        } else {
            0.0
        }
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    weights: &'a [f64],
    params: TreeParams,
    n_features: usize,
    rng: &'a mut Pcg32,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree over the rows listed in `sample`.
    ///
    /// `sample` may repeat indices (bootstrap draws). `x`, `y`, and
    /// `weights` must be the same length and `x` rectangular; callers in
    /// this crate validate that up front.
    #[must_use]
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        weights: &[f64],
        sample: &[usize],
        params: TreeParams,
        rng: &mut Pcg32,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            weights,
            params,
            n_features,
            rng,
            nodes: Vec::new(),
        };
        builder.grow(sample.to_vec(), 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Predicts the target for one row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Builder<'_> {
    fn moments(&self, sample: &[usize]) -> Moments {
        let mut m = Moments::default();
        for &i in sample {
            m.add(self.weights[i], self.y[i]);
        }
        m
    }

    fn grow(&mut self, sample: Vec<usize>, depth: usize) -> usize {
        let totals = self.moments(&sample);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: totals.mean(),
        });

        if depth >= self.params.max_depth
            || sample.len() < self.params.min_samples_split.max(2)
            || totals.sse() <= MIN_GAIN
        {
            return id;
        }

        let Some(split) = self.best_split(&sample, totals) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Returns the feature visiting order and how many of them must be
    /// examined before the search may stop.
    fn feature_order(&mut self) -> (Vec<usize>, usize) {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        match self.params.max_features {
            Some(k) if k < self.n_features => {
                self.rng.shuffle(&mut features);
                (features, k.max(1))
            }
            _ => (features, self.n_features),
        }
    }

    fn best_split(&mut self, sample: &[usize], totals: Moments) -> Option<Split> {
        let parent_sse = totals.sse();
        let mut best: Option<Split> = None;
        let mut order = sample.to_vec();

        let (features, required) = self.feature_order();
        for (visited, feature) in features.into_iter().enumerate() {
            // Past the sampled features, keep looking only until any valid
            // split turns up.
            if visited >= required && best.is_some() {
                break;
            }
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = Moments::default();
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left.add(self.weights[i], self.y[i]);

                let here = self.x[i][feature];
                let next = self.x[order[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let right = totals.minus(left);
                if left.w <= 0.0 || right.w <= 0.0 {
                    continue;
                }

                let gain = parent_sse - left.sse() - right.sse();
                if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    let mid = here + (next - here) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}
