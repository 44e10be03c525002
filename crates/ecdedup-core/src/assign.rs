//! Routing rows of a similarity matrix to buckets.
//!
//! - [`AssignmentPolicy::Optimal`]: maximum-weight perfect matching (Hungarian algorithm)
//! - [`AssignmentPolicy::Canonical`]: row `i` to column `i`
//! - [`AssignmentPolicy::Random`]: uniformly random permutation from a caller-seeded RNG

use crate::database::BucketId;
use crate::error::{DedupError, DedupResult};
use crate::matrix::SimilarityMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How rows are matched to columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentPolicy {
    /// Maximize the total similarity score.
    #[default]
    #[serde(alias = "hungarian")]
    Optimal,
    /// Identity mapping.
    Canonical,
    /// Random permutation.
    Random,
}

impl fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssignmentPolicy::Optimal => "optimal",
            AssignmentPolicy::Canonical => "canonical",
            AssignmentPolicy::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for AssignmentPolicy {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimal" | "hungarian" => Ok(AssignmentPolicy::Optimal),
            "canonical" => Ok(AssignmentPolicy::Canonical),
            "random" => Ok(AssignmentPolicy::Random),
            other => Err(DedupError::InvalidParameters(format!(
                "unknown assignment policy: {other}"
            ))),
        }
    }
}

/// Row → column mapping over an augmented matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    columns: Vec<usize>,
    buckets: usize,
}

impl Assignment {
    /// Wrap a precomputed row → column mapping for `buckets` buckets.
    pub fn from_columns(columns: Vec<usize>, buckets: usize) -> DedupResult<Self> {
        if buckets == 0 {
            return Err(DedupError::InvalidParameters(
                "bucket count must be positive".to_string(),
            ));
        }
        Ok(Self { columns, buckets })
    }

    /// Bucket count `K` the columns fold onto.
    pub fn bucket_count(&self) -> usize {
        self.buckets
    }

    /// Number of rows covered, dummies included.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Does the assignment cover no rows?
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column chosen for `row`.
    pub fn column(&self, row: usize) -> usize {
        self.columns[row]
    }

    /// All chosen columns in row order.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Bucket `row` is routed to, `column mod K`.
    pub fn bucket(&self, row: usize) -> BucketId {
        self.columns[row] % self.buckets
    }

    /// Buckets of the first `rows` rows.
    pub fn buckets(&self, rows: usize) -> Vec<BucketId> {
        (0..rows.min(self.len())).map(|row| self.bucket(row)).collect()
    }

    /// True if every column in `0..len` is used exactly once.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.columns.len()];
        for &column in &self.columns {
            match seen.get_mut(column) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

/// Choose a column for every row of `matrix` under `policy`.
///
/// `rng` is only drawn from by [`AssignmentPolicy::Random`].
pub fn solve<R: Rng + ?Sized>(
    matrix: &SimilarityMatrix,
    policy: AssignmentPolicy,
    rng: &mut R,
) -> DedupResult<Assignment> {
    if matrix.real_rows() == 0 {
        return Err(DedupError::InvalidMatrix("matrix has no rows".to_string()));
    }
    if !matrix.is_square() {
        return Err(DedupError::InvalidMatrix(format!(
            "matrix is {}x{}, expected square",
            matrix.rows(),
            matrix.columns()
        )));
    }

    let n = matrix.rows();
    let columns = match policy {
        AssignmentPolicy::Optimal => hungarian_max(matrix),
        AssignmentPolicy::Canonical => (0..n).collect(),
        AssignmentPolicy::Random => {
            let mut columns: Vec<usize> = (0..n).collect();
            columns.shuffle(rng);
            columns
        }
    };

    debug!(%policy, size = n, real_rows = matrix.real_rows(), "solved assignment");
    Assignment::from_columns(columns, matrix.buckets())
}

/// Total score of `assignment` over the real rows of `matrix`.
pub fn score_assignment(matrix: &SimilarityMatrix, assignment: &Assignment) -> DedupResult<u64> {
    if assignment.len() < matrix.real_rows() {
        return Err(DedupError::InvalidMatrix(format!(
            "assignment covers {} rows, matrix has {}",
            assignment.len(),
            matrix.real_rows()
        )));
    }
    let mut total = 0u64;
    for row in 0..matrix.real_rows() {
        let column = assignment.column(row);
        if column >= matrix.columns() {
            return Err(DedupError::InvalidMatrix(format!(
                "column {column} out of range for {} columns",
                matrix.columns()
            )));
        }
        total += matrix.get(row, column);
    }
    Ok(total)
}

/// Maximum-weight perfect matching on a square matrix.
///
/// Runs the O(n^3) potentials form of the Hungarian method on
/// `cost = max_score - score`. Arithmetic is in `i128` so any `u64` score is safe.
fn hungarian_max(matrix: &SimilarityMatrix) -> Vec<usize> {
    let n = matrix.rows();
    let ceiling = matrix.max_score() as i128;
    let cost = |row: usize, column: usize| ceiling - matrix.get(row, column) as i128;

    // 1-based; index 0 is the virtual start column.
    let mut u = vec![0i128; n + 1];
    let mut v = vec![0i128; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut current = 0usize;
        let mut min_slack = vec![i128::MAX; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[current] = true;
            let i0 = owner[current];
            let mut delta = i128::MAX;
            let mut next = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let slack = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = current;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    next = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            current = next;
            if owner[current] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the start column.
        loop {
            let prev = way[current];
            owner[current] = owner[prev];
            current = prev;
            if current == 0 {
                break;
            }
        }
    }

    let mut columns = vec![0usize; n];
    for j in 1..=n {
        columns[owner[j] - 1] = j - 1;
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// Exhaustive best score for small square matrices.
    fn brute_force_best(matrix: &SimilarityMatrix) -> u64 {
        fn permute(
            matrix: &SimilarityMatrix,
            row: usize,
            used: &mut Vec<bool>,
            acc: u64,
            best: &mut u64,
        ) {
            if row == matrix.rows() {
                *best = (*best).max(acc);
                return;
            }
            for column in 0..matrix.columns() {
                if !used[column] {
                    used[column] = true;
                    permute(matrix, row + 1, used, acc + matrix.get(row, column), best);
                    used[column] = false;
                }
            }
        }
        let mut best = 0;
        permute(matrix, 0, &mut vec![false; matrix.columns()], 0, &mut best);
        best
    }

    #[test]
    fn optimal_picks_best_matching() {
        let matrix = SimilarityMatrix::from_scores(vec![1, 2, 3, 4, 5, 6, 7, 8, 9], 3).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Optimal, &mut rng()).unwrap();
        assert!(assignment.is_permutation());
        assert_eq!(score_assignment(&matrix, &assignment).unwrap(), 15);
    }

    #[test]
    fn optimal_prefers_large_off_diagonal() {
        let matrix = SimilarityMatrix::from_scores(vec![0, 100, 100, 0], 2).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Optimal, &mut rng()).unwrap();
        assert_eq!(assignment.columns(), &[1, 0]);
        assert_eq!(score_assignment(&matrix, &assignment).unwrap(), 200);
    }

    #[test]
    fn canonical_is_identity() {
        let matrix = SimilarityMatrix::from_scores(vec![0, 100, 100, 0], 2).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Canonical, &mut rng()).unwrap();
        assert_eq!(assignment.columns(), &[0, 1]);
        assert_eq!(score_assignment(&matrix, &assignment).unwrap(), 0);
    }

    #[test]
    fn random_is_reproducible_permutation() {
        let matrix = SimilarityMatrix::from_scores(vec![0; 7 * 3], 3).unwrap();
        let a = solve(&matrix, AssignmentPolicy::Random, &mut rng()).unwrap();
        let b = solve(&matrix, AssignmentPolicy::Random, &mut rng()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 9);
        assert!(a.is_permutation());
    }

    #[test]
    fn augmented_rows_fold_to_buckets() {
        // Five rows, two buckets: each row strongly prefers bucket row % 2.
        let mut base = Vec::new();
        for row in 0..5u64 {
            base.extend(if row % 2 == 0 { [10, 0] } else { [0, 10] });
        }
        let matrix = SimilarityMatrix::from_scores(base, 2).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Optimal, &mut rng()).unwrap();
        assert_eq!(assignment.len(), 6);
        assert_eq!(assignment.buckets(5), vec![0, 1, 0, 1, 0]);
        assert_eq!(score_assignment(&matrix, &assignment).unwrap(), 50);
    }

    #[test]
    fn matrix_without_rows_rejected() {
        let matrix = SimilarityMatrix::from_scores(Vec::new(), 3).unwrap();
        let result = solve(&matrix, AssignmentPolicy::Optimal, &mut rng());
        assert!(matches!(result, Err(DedupError::InvalidMatrix(_))));
    }

    #[test]
    fn score_rejects_short_assignment() {
        let matrix = SimilarityMatrix::from_scores(vec![1, 2, 3, 4], 2).unwrap();
        let result = score_assignment(&matrix, &Assignment::from_columns(vec![0], 2).unwrap());
        assert!(matches!(result, Err(DedupError::InvalidMatrix(_))));
    }

    #[test]
    fn huge_scores_do_not_overflow() {
        let matrix =
            SimilarityMatrix::from_scores(vec![u64::MAX / 2, 0, 0, u64::MAX / 2], 2).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Optimal, &mut rng()).unwrap();
        assert_eq!(assignment.columns(), &[0, 1]);
    }

    #[test]
    fn zero_buckets_rejected() {
        let result = Assignment::from_columns(vec![0, 1], 0);
        assert!(matches!(result, Err(DedupError::InvalidParameters(_))));
        let assignment = Assignment::from_columns(vec![3, 0, 2, 1], 2).unwrap();
        assert_eq!(assignment.bucket_count(), 2);
        assert_eq!(assignment.buckets(4), vec![1, 0, 0, 1]);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("hungarian".parse::<AssignmentPolicy>().unwrap(), AssignmentPolicy::Optimal);
        assert_eq!("Canonical".parse::<AssignmentPolicy>().unwrap(), AssignmentPolicy::Canonical);
        assert_eq!(AssignmentPolicy::Random.to_string(), "random");
        assert!("greedy".parse::<AssignmentPolicy>().is_err());
        let json = serde_json::to_string(&AssignmentPolicy::Optimal).unwrap();
        assert_eq!(json, "\"optimal\"");
        let parsed: AssignmentPolicy = serde_json::from_str("\"hungarian\"").unwrap();
        assert_eq!(parsed, AssignmentPolicy::Optimal);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_optimal_matches_brute_force(
            k in 1usize..4,
            m in 1usize..6,
            seed in prop::collection::vec(0u64..50, 18),
        ) {
            let base: Vec<u64> = (0..m * k).map(|i| seed[i % seed.len()] * (i as u64 % 3 + 1)).collect();
            let matrix = SimilarityMatrix::from_scores(base, k).unwrap();
            prop_assume!(matrix.rows() <= 6);
            let optimal = solve(&matrix, AssignmentPolicy::Optimal, &mut rng()).unwrap();
            let canonical = solve(&matrix, AssignmentPolicy::Canonical, &mut rng()).unwrap();
            prop_assert!(optimal.is_permutation());
            let best = score_assignment(&matrix, &optimal).unwrap();
            prop_assert_eq!(best, brute_force_best(&matrix));
            prop_assert!(best >= score_assignment(&matrix, &canonical).unwrap());
        }
    }
}
