use anyhow::{anyhow, ensure, Result};
use linfa::prelude::*;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::{EngineeredRow, TargetStat, FEATURE_COUNT};

const SPLIT_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;

const BOOST_ROUNDS: usize = 60;
const BOOST_DEPTH: usize = 3;
const BOOST_LEARNING_RATE: f64 = 0.1;
const BOOST_MIN_LEAF: usize = 3;

/// The three interchangeable regression strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Linear,
    Polynomial,
    Boosted,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Linear => "Linear Regression",
            ModelKind::Polynomial => "Polynomial Regression",
            ModelKind::Boosted => "Boosted Trees",
        }
    }

    pub fn next(&self) -> ModelKind {
        match self {
            ModelKind::Linear => ModelKind::Polynomial,
            ModelKind::Polynomial => ModelKind::Boosted,
            ModelKind::Boosted => ModelKind::Linear,
        }
    }

    pub fn prev(&self) -> ModelKind {
        match self {
            ModelKind::Linear => ModelKind::Boosted,
            ModelKind::Polynomial => ModelKind::Linear,
            ModelKind::Boosted => ModelKind::Polynomial,
        }
    }
}

/// A fitted estimator plus its held-out mean-squared-error. Lives only for
/// the duration of one prediction call.
pub struct TrainedModel {
    estimator: Estimator,
    pub kind: ModelKind,
    pub mse: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

enum Estimator {
    Linear(FittedLinearRegression<f64>),
    Polynomial(FittedLinearRegression<f64>),
    Boosted(BoostedForest),
}

impl TrainedModel {
    /// Square root of the held-out MSE, reported as the error bound.
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        match &self.estimator {
            Estimator::Linear(model) => linear_predict(model, features),
            Estimator::Polynomial(model) => linear_predict(model, &expand_poly(features)),
            Estimator::Boosted(forest) => forest.predict(features),
        }
    }
}

/// Fit one strategy on the engineered rows with a deterministic 80/20 split.
///
/// When the log is too small for a held-out side, the error is computed on
/// the training rows instead (and `test_rows` is 0).
pub fn train(kind: ModelKind, rows: &[EngineeredRow], target: TargetStat) -> Result<TrainedModel> {
    ensure!(!rows.is_empty(), "no engineered rows to fit");

    let matrix: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| match kind {
            ModelKind::Polynomial => expand_poly(&row.features),
            _ => row.features.to_vec(),
        })
        .collect();
    let targets: Vec<f64> = rows.iter().map(|row| target.of(row)).collect();

    let (train_idx, test_idx) = split_indices(rows.len());
    let eval_idx: &[usize] = if test_idx.is_empty() {
        &train_idx
    } else {
        &test_idx
    };

    let estimator = match kind {
        ModelKind::Linear | ModelKind::Polynomial => {
            let fitted = fit_ols(&matrix, &targets, &train_idx)?;
            if kind == ModelKind::Linear {
                Estimator::Linear(fitted)
            } else {
                Estimator::Polynomial(fitted)
            }
        }
        ModelKind::Boosted => Estimator::Boosted(fit_boosted(&matrix, &targets, &train_idx)),
    };

    let mut sq_err = 0.0;
    for &i in eval_idx {
        let pred = match &estimator {
            Estimator::Linear(model) | Estimator::Polynomial(model) => {
                linear_predict(model, &matrix[i])
            }
            Estimator::Boosted(forest) => forest.predict(&matrix[i]),
        };
        let err = pred - targets[i];
        sq_err += err * err;
    }
    let mse = sq_err / eval_idx.len() as f64;

    Ok(TrainedModel {
        estimator,
        kind,
        mse,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
    })
}

/// Degree-2 expansion: the raw features, then squares and pairwise
/// interactions. The OLS intercept stands in for the bias column.
fn expand_poly(features: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(features.len() * (features.len() + 3) / 2);
    out.extend_from_slice(features);
    for i in 0..features.len() {
        for j in i..features.len() {
            out.push(features[i] * features[j]);
        }
    }
    out
}

fn split_indices(n: usize) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    idx.shuffle(&mut rng);
    let test_len = ((n as f64) * TEST_FRACTION).ceil() as usize;
    // Keep at least one training row.
    let test_len = test_len.min(n.saturating_sub(1));
    let test = idx[..test_len].to_vec();
    let train = idx[test_len..].to_vec();
    (train, test)
}

fn fit_ols(
    matrix: &[Vec<f64>],
    targets: &[f64],
    train_idx: &[usize],
) -> Result<FittedLinearRegression<f64>> {
    let width = matrix.first().map(|row| row.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(train_idx.len() * width);
    let mut y = Vec::with_capacity(train_idx.len());
    for &i in train_idx {
        flat.extend_from_slice(&matrix[i]);
        y.push(targets[i]);
    }
    let records = Array2::from_shape_vec((train_idx.len(), width), flat)
        .map_err(|err| anyhow!("bad design matrix shape: {err}"))?;
    let dataset = Dataset::new(records, Array1::from_vec(y));
    LinearRegression::new()
        .fit(&dataset)
        .map_err(|err| anyhow!("least squares fit failed: {err}"))
}

fn linear_predict(model: &FittedLinearRegression<f64>, row: &[f64]) -> f64 {
    let mut acc = model.intercept();
    for (coef, x) in model.params().iter().zip(row.iter()) {
        acc += coef * x;
    }
    acc
}

/// Gradient-boosted regression trees on squared-error residuals.
struct BoostedForest {
    base: f64,
    trees: Vec<TreeNode>,
}

enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl BoostedForest {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut acc = self.base;
        for tree in &self.trees {
            acc += BOOST_LEARNING_RATE * predict_tree(tree, row);
        }
        acc
    }
}

fn fit_boosted(matrix: &[Vec<f64>], targets: &[f64], train_idx: &[usize]) -> BoostedForest {
    let base = train_idx.iter().map(|&i| targets[i]).sum::<f64>() / train_idx.len().max(1) as f64;
    let mut pred: Vec<f64> = vec![base; targets.len()];
    let mut trees = Vec::with_capacity(BOOST_ROUNDS);

    for _ in 0..BOOST_ROUNDS {
        let residuals: Vec<f64> = targets
            .iter()
            .zip(pred.iter())
            .map(|(t, p)| t - p)
            .collect();
        let tree = grow_tree(matrix, &residuals, train_idx, BOOST_DEPTH);
        for &i in train_idx {
            pred[i] += BOOST_LEARNING_RATE * predict_tree(&tree, &matrix[i]);
        }
        trees.push(tree);
    }

    BoostedForest { base, trees }
}

fn grow_tree(matrix: &[Vec<f64>], residuals: &[f64], idx: &[usize], depth: usize) -> TreeNode {
    let value = idx.iter().map(|&i| residuals[i]).sum::<f64>() / idx.len().max(1) as f64;
    if depth == 0 || idx.len() < 2 * BOOST_MIN_LEAF {
        return TreeNode::Leaf { value };
    }

    let Some((feature, threshold)) = best_split(matrix, residuals, idx) else {
        return TreeNode::Leaf { value };
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
        .iter()
        .copied()
        .partition(|&i| matrix[i][feature] <= threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        return TreeNode::Leaf { value };
    }

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(grow_tree(matrix, residuals, &left_idx, depth - 1)),
        right: Box::new(grow_tree(matrix, residuals, &right_idx, depth - 1)),
    }
}

fn best_split(matrix: &[Vec<f64>], residuals: &[f64], idx: &[usize]) -> Option<(usize, f64)> {
    let width = matrix.first().map(|row| row.len()).unwrap_or(0);
    let total_sum: f64 = idx.iter().map(|&i| residuals[i]).sum();
    let total_sq: f64 = idx.iter().map(|&i| residuals[i] * residuals[i]).sum();
    let total_sse = total_sq - total_sum * total_sum / idx.len() as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..width {
        let mut ordered: Vec<(f64, f64)> = idx
            .iter()
            .map(|&i| (matrix[i][feature], residuals[i]))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for (k, (x, r)) in ordered.iter().enumerate() {
            left_sum += r;
            left_sq += r * r;
            let left_n = k + 1;
            let right_n = ordered.len() - left_n;
            if left_n < BOOST_MIN_LEAF || right_n < BOOST_MIN_LEAF {
                continue;
            }
            // No split between identical feature values.
            if ordered[k + 1].0 <= *x {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / left_n as f64;
            let right_sse = right_sq - right_sum * right_sum / right_n as f64;
            let gain = total_sse - left_sse - right_sse;
            if gain > 1e-12 && best.map(|(_, _, g)| gain > g).unwrap_or(true) {
                let threshold = (x + ordered[k + 1].0) / 2.0;
                best = Some((feature, threshold, gain));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn predict_tree(node: &TreeNode, row: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value } => *value,
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                predict_tree(left, row)
            } else {
                predict_tree(right, row)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::mean_feature_row;
    use chrono::NaiveDate;
    use rand::Rng;

    fn synth_rows(n: usize, target_of: impl Fn(&[f64; FEATURE_COUNT]) -> f64) -> Vec<EngineeredRow> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..n)
            .map(|i| {
                let features = [
                    rng.gen_range(0.0..20.0),
                    rng.gen_range(0.0..12.0),
                    rng.gen_range(0.0..10.0),
                    rng.gen_range(20.0..40.0),
                    rng.gen_range(0.3..0.6),
                    rng.gen_range(0.6..0.95),
                    rng.gen_range(0.2..0.5),
                ];
                let pts = target_of(&features);
                EngineeredRow {
                    date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
                        + chrono::Days::new(i as u64),
                    home: i % 2 == 0,
                    pts,
                    reb: pts / 3.0,
                    ast: pts / 4.0,
                    avg_pts: pts,
                    avg_ast: pts / 4.0,
                    avg_reb: pts / 3.0,
                    features,
                }
            })
            .collect()
    }

    fn linear_rows(n: usize) -> Vec<EngineeredRow> {
        synth_rows(n, |f| 2.0 * f[0] + 1.5 * f[1] + 4.0)
    }

    #[test]
    fn linear_recovers_linear_targets() {
        let rows = linear_rows(60);
        let model = train(ModelKind::Linear, &rows, TargetStat::Points).unwrap();
        assert!(model.mse < 1e-6, "mse was {}", model.mse);
        assert!(model.test_rows > 0);

        let mean = mean_feature_row(&rows);
        let expect = 2.0 * mean[0] + 1.5 * mean[1] + 4.0;
        assert!((model.predict(&mean) - expect).abs() < 1e-6);
    }

    #[test]
    fn split_is_deterministic() {
        let rows = linear_rows(40);
        let a = train(ModelKind::Boosted, &rows, TargetStat::Points).unwrap();
        let b = train(ModelKind::Boosted, &rows, TargetStat::Points).unwrap();
        assert_eq!(a.mse, b.mse);
        assert_eq!(a.train_rows, b.train_rows);
    }

    #[test]
    fn polynomial_fits_quadratic_better_than_linear() {
        let rows = synth_rows(60, |f| f[0] * f[0] + 2.0);
        let linear = train(ModelKind::Linear, &rows, TargetStat::Points).unwrap();
        let poly = train(ModelKind::Polynomial, &rows, TargetStat::Points).unwrap();
        assert!(poly.mse < linear.mse);
        assert!(poly.mse < 1e-3, "poly mse was {}", poly.mse);
    }

    #[test]
    fn boosted_beats_constant_baseline_on_step_target() {
        let rows = synth_rows(80, |f| if f[0] > 10.0 { 20.0 } else { 10.0 });
        let model = train(ModelKind::Boosted, &rows, TargetStat::Points).unwrap();

        let targets: Vec<f64> = rows.iter().map(|r| r.pts).collect();
        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let variance =
            targets.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / targets.len() as f64;
        assert!(model.mse < variance / 4.0, "mse {} vs variance {}", model.mse, variance);
    }

    #[test]
    fn rmse_is_sqrt_of_mse() {
        let rows = linear_rows(30);
        let model = train(ModelKind::Linear, &rows, TargetStat::Points).unwrap();
        assert!((model.rmse() - model.mse.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn tiny_log_falls_back_to_training_error() {
        let rows = linear_rows(1);
        let model = train(ModelKind::Boosted, &rows, TargetStat::Points).unwrap();
        assert_eq!(model.test_rows, 0);
        assert_eq!(model.train_rows, 1);
        assert!(model.mse.is_finite());
    }

    #[test]
    fn empty_log_is_an_error() {
        assert!(train(ModelKind::Linear, &[], TargetStat::Points).is_err());
    }

    #[test]
    fn target_selects_the_right_column() {
        let rows = linear_rows(40);
        let pts = train(ModelKind::Linear, &rows, TargetStat::Points).unwrap();
        let ast = train(ModelKind::Linear, &rows, TargetStat::Assists).unwrap();
        let mean = mean_feature_row(&rows);
        assert!(pts.predict(&mean) > ast.predict(&mean));
    }
}
