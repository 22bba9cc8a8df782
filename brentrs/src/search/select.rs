//! 최고 후보 선택
//!
//! 비교는 전순서(total order)이므로 병렬 reduce의 결합 순서와 무관하게 같은 결과가 나온다.
//! RMSE가 낮을수록, 같으면 R2가 높을수록, 같으면 MAE가 낮을수록, 그래도 같으면 후보 번호가 작은 쪽이 낫다.

use std::cmp::Ordering;

use crate::search::trainer::TrainedModelResult;

/// `a`가 `b`보다 나으면 `Ordering::Less`
pub fn compare(a: &TrainedModelResult, b: &TrainedModelResult) -> Ordering {
    a.metrics
        .rmse
        .total_cmp(&b.metrics.rmse)
        .then_with(|| b.metrics.r2.total_cmp(&a.metrics.r2))
        .then_with(|| a.metrics.mae.total_cmp(&b.metrics.mae))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

/// 두 결과 중 나은 쪽
pub fn better(a: TrainedModelResult, b: TrainedModelResult) -> TrainedModelResult {
    match compare(&a, &b) {
        Ordering::Greater => b,
        _ => a,
    }
}

/// 보관 중인 최고 결과와 새 결과를 합친다
pub fn merge_best(
    current: Option<TrainedModelResult>,
    next: Option<TrainedModelResult>,
) -> Option<TrainedModelResult> {
    match (current, next) {
        (Some(a), Some(b)) => Some(better(a, b)),
        (a, b) => a.or(b),
    }
}

pub fn select_best(results: Vec<TrainedModelResult>) -> Option<TrainedModelResult> {
    results.into_iter().reduce(better)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::trainer::{tests::small_context, train_candidate};
    use treeboost::RegressionMetrics;

    fn results() -> Vec<TrainedModelResult> {
        let (context, candidates) = small_context();
        let template = train_candidate(&context, &candidates[0]).unwrap();
        let metrics = [
            (2.0, 1.0, 0.5),
            (1.0, 0.9, 0.7),
            (1.0, 0.8, 0.9), // RMSE 동률, R2 더 높음
            (1.0, 0.7, 0.9), // 위와 RMSE/R2 동률, MAE 더 낮음
            (1.0, 0.7, 0.9), // 완전 동률, 번호가 더 큼
        ];
        metrics
            .iter()
            .enumerate()
            .map(|(i, &(rmse, mae, r2))| {
                let mut result = template.clone();
                result.candidate = candidates[i].clone();
                result.metrics = RegressionMetrics { rmse, mae, r2 };
                result
            })
            .collect()
    }

    #[test]
    fn test_select_best_tie_breaks() {
        let best = select_best(results()).unwrap();
        assert_eq!(best.candidate.id, 3);
    }

    #[test]
    fn test_selection_is_order_independent() {
        let forward = select_best(results()).unwrap();
        let mut reversed = results();
        reversed.reverse();
        let backward = select_best(reversed).unwrap();
        assert_eq!(forward.candidate.id, backward.candidate.id);

        let all = results();
        for a in &all {
            for b in &all {
                let ab = better(a.clone(), b.clone()).candidate.id;
                let ba = better(b.clone(), a.clone()).candidate.id;
                assert_eq!(ab, ba);
            }
        }
    }

    #[test]
    fn test_merge_best_handles_empty_sides() {
        let all = results();
        assert!(merge_best(None, None).is_none());
        let only = merge_best(None, Some(all[0].clone())).unwrap();
        assert_eq!(only.candidate.id, 0);
        let merged = merge_best(Some(all[0].clone()), Some(all[1].clone())).unwrap();
        assert_eq!(merged.candidate.id, 1);
        assert!(select_best(Vec::new()).is_none());
    }
}
