//! 후보 격자 병렬 탐색
//!
//! 후보는 서로 독립적으로 학습된다. 한 후보의 실패(에러/패닉)는 그 후보만 실패로 기록하고
//! 나머지 탐색은 계속된다. 모델은 최고 결과 하나만 남기고 버린다.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{error, info};

use crate::features::EngineeringStrategy;
use crate::search::candidate::{FeatureSetKind, SearchCandidate};
use crate::search::select::merge_best;
use crate::search::trainer::{train_candidate, TrainedModelResult, TrainingContext};
use crate::utility::config::SearchConfig;
use crate::utility::errors::{PipelineError, PipelineResult};

#[derive(Debug)]
pub enum CandidateOutcome {
    Trained(Box<TrainedModelResult>),
    Failed {
        candidate: SearchCandidate,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Ok,
    Failed,
}

/// 탐색 결과 표의 한 행
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    #[serde(skip)]
    pub id: usize,
    pub feature_set: FeatureSetKind,
    pub engineering: EngineeringStrategy,
    pub depth: usize,
    pub learning_rate: f64,
    pub iterations: usize,
    pub l2_leaf_reg: f64,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub status: RecordStatus,
    pub error: Option<String>,
}

impl SearchRecord {
    fn new(candidate: &SearchCandidate, status: RecordStatus) -> Self {
        Self {
            id: candidate.id,
            feature_set: candidate.feature_set,
            engineering: candidate.engineering,
            depth: candidate.depth,
            learning_rate: candidate.learning_rate,
            iterations: candidate.iterations,
            l2_leaf_reg: candidate.l2_leaf_reg,
            rmse: None,
            mae: None,
            r2: None,
            status,
            error: None,
        }
    }

    fn trained(result: &TrainedModelResult) -> Self {
        Self {
            rmse: Some(result.metrics.rmse),
            mae: Some(result.metrics.mae),
            r2: Some(result.metrics.r2),
            ..Self::new(&result.candidate, RecordStatus::Ok)
        }
    }

    fn failed(candidate: &SearchCandidate, reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::new(candidate, RecordStatus::Failed)
        }
    }
}

#[derive(Debug)]
pub struct SearchReport {
    /// 후보 번호 순
    pub records: Vec<SearchRecord>,
    pub best: TrainedModelResult,
    pub failures: usize,
}

impl SearchReport {
    pub fn total(&self) -> usize {
        self.records.len()
    }
}

/// 스레드별 부분 결과. 기록과 현재까지의 최고 결과만 보관한다
#[derive(Debug, Default)]
struct SearchAccumulator {
    records: Vec<SearchRecord>,
    best: Option<TrainedModelResult>,
    failures: usize,
}

impl SearchAccumulator {
    fn push(mut self, outcome: CandidateOutcome) -> Self {
        match outcome {
            CandidateOutcome::Trained(result) => {
                self.records.push(SearchRecord::trained(&result));
                self.best = merge_best(self.best.take(), Some(*result));
            }
            CandidateOutcome::Failed { candidate, reason } => {
                error!("❌ 후보 #{} 학습 실패 {}: {}", candidate.id, candidate, reason);
                self.records.push(SearchRecord::failed(&candidate, &reason));
                self.failures += 1;
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.records.extend(other.records);
        self.best = merge_best(self.best.take(), other.best);
        self.failures += other.failures;
        self
    }
}

/// 후보 하나를 학습한다. 에러와 패닉 모두 실패 결과로 바꾼다
pub fn run_isolated(context: &TrainingContext, candidate: &SearchCandidate) -> CandidateOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| train_candidate(context, candidate))) {
        Ok(Ok(result)) => CandidateOutcome::Trained(Box::new(result)),
        Ok(Err(e)) => CandidateOutcome::Failed {
            candidate: candidate.clone(),
            reason: e.to_string(),
        },
        Err(payload) => CandidateOutcome::Failed {
            candidate: candidate.clone(),
            reason: format!("패닉: {}", panic_message(payload.as_ref())),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SearchRunner {
    /// 0이면 rayon 기본값 (논리 코어 수)
    pub workers: usize,
    pub show_progress: bool,
}

impl From<&SearchConfig> for SearchRunner {
    fn from(config: &SearchConfig) -> Self {
        Self {
            workers: config.workers,
            show_progress: config.show_progress,
        }
    }
}

impl SearchRunner {
    pub fn run(
        &self,
        context: &TrainingContext,
        candidates: &[SearchCandidate],
    ) -> PipelineResult<SearchReport> {
        if candidates.is_empty() {
            return Err(PipelineError::search("탐색할 후보가 없습니다"));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("search-{}", i))
            .build()
            .map_err(|e| PipelineError::search(format!("스레드 풀 생성 실패: {}", e)))?;

        info!(
            "🔍 모델 탐색 시작: 후보 {}개, 스레드 {}개",
            candidates.len(),
            pool.current_num_threads()
        );

        let pb = self.progress_bar(candidates.len() as u64);

        let accumulated = pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| {
                    let outcome = run_isolated(context, candidate);
                    pb.inc(1);
                    outcome
                })
                .fold(SearchAccumulator::default, SearchAccumulator::push)
                .reduce(SearchAccumulator::default, SearchAccumulator::merge)
        });

        pb.finish_with_message("모델 탐색 완료!");

        let SearchAccumulator {
            mut records,
            best,
            failures,
        } = accumulated;
        records.sort_by_key(|record| record.id);

        let best = best.ok_or_else(|| {
            PipelineError::search(format!("모든 후보({}개)가 학습에 실패했습니다", failures))
        })?;

        info!(
            "🏆 최고 후보 #{}: {} (RMSE {:.4}, 실패 {}개)",
            best.candidate.id, best.candidate, best.metrics.rmse, failures
        );

        Ok(SearchReport {
            records,
            best,
            failures,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) - 모델 탐색")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
