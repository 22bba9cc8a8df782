use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{BoostError, BoostResult};

/// 고정 시드로 행 번호를 학습/평가 구간으로 나눈다.
///
/// 평가 구간 크기는 `ceil(n * test_ratio)`이며 양쪽 모두 최소 1행을 보장한다.
/// 같은 `(n, test_ratio, seed)`는 항상 같은 분할을 돌려준다.
/// 반환값: (학습 행 번호, 평가 행 번호), 셔플된 순서 그대로.
pub fn train_test_split_indices(
    n: usize,
    test_ratio: f64,
    seed: u64,
) -> BoostResult<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Err(BoostError::empty(format!(
            "학습/평가 분할에는 최소 2행이 필요합니다 (입력: {}행)",
            n
        )));
    }
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(BoostError::invalid_parameter(
            "test_ratio",
            format!("0과 1 사이여야 합니다 (입력: {})", test_ratio),
        ));
    }

    let n_test = ((n as f64 * test_ratio).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split_indices(10, 0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let (train, test) = train_test_split_indices(11, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_split_is_reproducible_and_disjoint() {
        let a = train_test_split_indices(50, 0.2, 42).unwrap();
        let b = train_test_split_indices(50, 0.2, 42).unwrap();
        assert_eq!(a, b);

        let mut all: Vec<usize> = a.0.iter().chain(&a.1).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(train_test_split_indices(1, 0.2, 42).is_err());
        assert!(train_test_split_indices(10, 1.5, 42).is_err());
        let (train, test) = train_test_split_indices(2, 0.01, 42).unwrap();
        assert_eq!((train.len(), test.len()), (1, 1));
    }
}
