//! CART decision trees and bootstrap-aggregated random forests.
//!
//! Trees are stored as a flat node arena. Classification trees split on Gini
//! impurity and keep per-class proportions at the leaves; regression trees
//! split on squared error and keep the mean. A forest averages its trees.

use rand::rngs::StdRng;
use rand::{seq::index, Rng, SeedableRng};

use super::{ModelError, ModelResult};

// ---

/// What a tree predicts and how splits are scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Task {
    Regression,
    Classification { n_classes: usize },
}

impl Task {
    fn output_width(self) -> usize {
        match self {
            Task::Regression => 1,
            Task::Classification { n_classes } => n_classes,
        }
    }
}

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MaxFeatures {
    All,
    Sqrt,
}

#[derive(Debug, Clone)]
pub(crate) struct ForestConfig {
    // ---
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl ForestConfig {
    pub(crate) fn classifier(n_trees: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 2,
            max_depth: None,
            seed,
        }
    }

    pub(crate) fn regressor(n_trees: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_features: MaxFeatures::All,
            min_samples_split: 2,
            max_depth: None,
            seed,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<Node>,
}

/// Training view shared by every tree of a forest.
struct Samples<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    task: Task,
}

struct TreeBuilder<'a, 'b> {
    samples: &'b Samples<'a>,
    config: &'b ForestConfig,
    rng: &'b mut StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl<'a, 'b> TreeBuilder<'a, 'b> {
    // ---
    fn build(mut self, indices: Vec<usize>) -> DecisionTree {
        // ---
        self.grow(indices, 0);
        DecisionTree { nodes: self.nodes }
    }

    /// Grow the subtree for `indices` and return its node id.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        // ---
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: Vec::new() });

        let depth_exhausted = self.config.max_depth.is_some_and(|max| depth >= max);
        let split = if depth_exhausted
            || indices.len() < self.config.min_samples_split
            || self.is_pure(&indices)
        {
            None
        } else {
            self.best_split(&indices)
        };

        match split {
            None => {
                self.nodes[id] = Node::Leaf {
                    value: self.leaf_value(&indices),
                };
            }
            Some(split) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| self.samples.rows[i][split.feature] <= split.threshold);
                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
            }
        }
        id
    }

    fn is_pure(&self, indices: &[usize]) -> bool {
        // ---
        let first = self.samples.targets[indices[0]];
        indices.iter().all(|&i| self.samples.targets[i] == first)
    }

    fn leaf_value(&self, indices: &[usize]) -> Vec<f64> {
        // ---
        let n = indices.len() as f64;
        match self.samples.task {
            Task::Regression => {
                vec![indices.iter().map(|&i| self.samples.targets[i]).sum::<f64>() / n]
            }
            Task::Classification { n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &i in indices {
                    counts[self.samples.targets[i] as usize] += 1.0;
                }
                counts.iter_mut().for_each(|c| *c /= n);
                counts
            }
        }
    }

    /// Lowest weighted impurity over a random subset of features.
    fn best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        // ---
        let width = self.samples.rows[indices[0]].len();
        let k = match self.config.max_features {
            MaxFeatures::All => width,
            MaxFeatures::Sqrt => ((width as f64).sqrt() as usize).max(1),
        };
        let candidates = index::sample(&mut *self.rng, width, k).into_vec();

        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();
        for feature in candidates {
            sorted.sort_by(|&a, &b| {
                self.samples.rows[a][feature].total_cmp(&self.samples.rows[b][feature])
            });
            if let Some(split) = self.scan_feature(&sorted, feature) {
                if best.as_ref().map_or(true, |b| split.score < b.score) {
                    best = Some(split);
                }
            }
        }
        best
    }

    /// Sweep the sorted samples once, keeping running sums on each side.
    fn scan_feature(&self, sorted: &[usize], feature: usize) -> Option<BestSplit> {
        // ---
        let rows = self.samples.rows;
        let targets = self.samples.targets;
        let n = sorted.len();
        let mut stats = SplitStats::new(self.samples.task, sorted.iter().map(|&i| targets[i]));
        let mut best: Option<BestSplit> = None;

        for pos in 0..n - 1 {
            stats.move_left(targets[sorted[pos]]);
            let here = rows[sorted[pos]][feature];
            let next = rows[sorted[pos + 1]][feature];
            if here == next {
                continue;
            }
            let score = stats.weighted_impurity();
            if best.as_ref().map_or(true, |b| score < b.score) {
                best = Some(BestSplit {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    score,
                });
            }
        }
        best
    }
}

/// Running sufficient statistics for the left and right halves of a split.
enum SplitStats {
    Regression {
        left: (f64, f64, f64),
        right: (f64, f64, f64),
    },
    Classification {
        left: Vec<f64>,
        right: Vec<f64>,
        n_left: f64,
        n_right: f64,
    },
}

impl SplitStats {
    // ---
    fn new(task: Task, targets: impl Iterator<Item = f64>) -> Self {
        // ---
        match task {
            Task::Regression => {
                let mut right = (0.0, 0.0, 0.0);
                for y in targets {
                    right.0 += 1.0;
                    right.1 += y;
                    right.2 += y * y;
                }
                SplitStats::Regression {
                    left: (0.0, 0.0, 0.0),
                    right,
                }
            }
            Task::Classification { n_classes } => {
                let mut right = vec![0.0; n_classes];
                let mut n_right = 0.0;
                for y in targets {
                    right[y as usize] += 1.0;
                    n_right += 1.0;
                }
                SplitStats::Classification {
                    left: vec![0.0; n_classes],
                    right,
                    n_left: 0.0,
                    n_right,
                }
            }
        }
    }

    fn move_left(&mut self, y: f64) {
        // ---
        match self {
            SplitStats::Regression { left, right } => {
                left.0 += 1.0;
                left.1 += y;
                left.2 += y * y;
                right.0 -= 1.0;
                right.1 -= y;
                right.2 -= y * y;
            }
            SplitStats::Classification {
                left,
                right,
                n_left,
                n_right,
            } => {
                left[y as usize] += 1.0;
                right[y as usize] -= 1.0;
                *n_left += 1.0;
                *n_right -= 1.0;
            }
        }
    }

    /// Sum of child impurities weighted by child size.
    fn weighted_impurity(&self) -> f64 {
        // ---
        match self {
            // Sum of squared errors: Σy² − (Σy)²/n
            SplitStats::Regression { left, right } => {
                let sse = |(n, s, sq): (f64, f64, f64)| if n > 0.0 { sq - s * s / n } else { 0.0 };
                sse(*left) + sse(*right)
            }
            SplitStats::Classification {
                left,
                right,
                n_left,
                n_right,
            } => gini(left, *n_left) * n_left + gini(right, *n_right) * n_right,
        }
    }
}

fn gini(counts: &[f64], n: f64) -> f64 {
    // ---
    if n == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / n).powi(2)).sum::<f64>()
}

impl DecisionTree {
    // ---
    fn predict(&self, row: &[f64]) -> &[f64] {
        // ---
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Bagged ensemble of CART trees.
#[derive(Debug, Clone)]
pub(crate) struct RandomForest {
    // ---
    trees: Vec<DecisionTree>,
    task: Task,
    width: usize,
}

impl RandomForest {
    // ---
    /// Fit `config.n_trees` trees, each on a bootstrap resample.
    ///
    /// Classification targets are class indices stored as `f64`.
    pub(crate) fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        task: Task,
        config: &ForestConfig,
    ) -> ModelResult<Self> {
        // ---
        if rows.is_empty() || rows.len() != targets.len() || config.n_trees == 0 {
            return Err(ModelError::InsufficientData);
        }
        let width = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                got: bad.len(),
            });
        }
        if let Task::Classification { n_classes } = task {
            let out_of_range = targets
                .iter()
                .any(|&y| y < 0.0 || y.fract() != 0.0 || y as usize >= n_classes);
            if out_of_range {
                return Err(ModelError::InvalidInput(format!(
                    "class labels must be integers in 0..{n_classes}"
                )));
            }
        }

        let samples = Samples {
            rows,
            targets,
            task,
        };
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = rows.len();

        let trees = (0..config.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    samples: &samples,
                    config,
                    rng: &mut rng,
                    nodes: Vec::new(),
                }
                .build(bootstrap)
            })
            .collect();

        Ok(Self { trees, task, width })
    }

    /// Average of the tree outputs: a one-element mean for regression, a
    /// class-probability vector for classification.
    pub(crate) fn predict(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        // ---
        if row.len() != self.width {
            return Err(ModelError::DimensionMismatch {
                expected: self.width,
                got: row.len(),
            });
        }
        let mut out = vec![0.0; self.task.output_width()];
        for tree in &self.trees {
            for (acc, v) in out.iter_mut().zip(tree.predict(row)) {
                *acc += v;
            }
        }
        let n = self.trees.len() as f64;
        out.iter_mut().for_each(|v| *v /= n);
        Ok(out)
    }

    pub(crate) fn predict_value(&self, row: &[f64]) -> ModelResult<f64> {
        // ---
        let out = self.predict(row)?;
        out.first().copied().ok_or(ModelError::NotTrained)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_classifier_separates_two_clusters() {
        // ---
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..40 {
            let jitter = (i % 7) as f64 * 0.1;
            rows.push(vec![1.0 + jitter, 5.0 - jitter]);
            targets.push(0.0);
            rows.push(vec![9.0 - jitter, -5.0 + jitter]);
            targets.push(1.0);
        }

        let forest = RandomForest::fit(
            &rows,
            &targets,
            Task::Classification { n_classes: 2 },
            &ForestConfig::classifier(15, 7),
        )
        .unwrap();

        let probs = forest.predict(&[1.2, 4.8]).unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[0] > 0.9, "probs = {probs:?}");
    }

    #[test]
    fn test_regressor_tracks_step_function() {
        // ---
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..60).map(|i| if i < 30 { 10.0 } else { 50.0 }).collect();

        let forest = RandomForest::fit(
            &rows,
            &targets,
            Task::Regression,
            &ForestConfig::regressor(10, 3),
        )
        .unwrap();

        let low = forest.predict_value(&[5.0]).unwrap();
        let high = forest.predict_value(&[55.0]).unwrap();
        assert!((low - 10.0).abs() < 1e-9, "low = {low}");
        assert!((high - 50.0).abs() < 1e-9, "high = {high}");
    }

    #[test]
    fn test_same_seed_same_forest() {
        // ---
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i * 13 % 17) as f64, (i * 7 % 11) as f64])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] * 2.0 - r[1]).collect();
        let config = ForestConfig::regressor(5, 11);

        let a = RandomForest::fit(&rows, &targets, Task::Regression, &config).unwrap();
        let b = RandomForest::fit(&rows, &targets, Task::Regression, &config).unwrap();
        for probe in [[3.0, 4.0], [15.5, 0.5], [8.0, 10.0]] {
            assert_eq!(a.predict_value(&probe), b.predict_value(&probe));
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        // ---
        let config = ForestConfig::classifier(3, 1);
        assert!(RandomForest::fit(&[], &[], Task::Regression, &config).is_err());

        let rows = vec![vec![1.0], vec![2.0]];
        let labels = vec![0.0, 3.0];
        assert!(matches!(
            RandomForest::fit(&rows, &labels, Task::Classification { n_classes: 2 }, &config),
            Err(ModelError::InvalidInput(_))
        ));

        let forest =
            RandomForest::fit(&rows, &[1.0, 2.0], Task::Regression, &ForestConfig::regressor(2, 1))
                .unwrap();
        assert_eq!(
            forest.predict(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { expected: 1, got: 2 })
        );
    }
}
