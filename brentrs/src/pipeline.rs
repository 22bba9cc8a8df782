//! 시트 통합 → 특징 파생 → 중요도 축소 → 파생 특징 → 모델 탐색 → 결과 저장

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};
use treeboost::{attribute, BoostParams, RegressionMetrics};

use crate::data::{aggregate_sentiment, read_workbook, unify, RawSheet};
use crate::features::{compute_importance, derive_features, engineer_features, EngineeringStrategy};
use crate::report::ReportWriter;
use crate::search::{
    FeatureSets, SearchCandidate, SearchRunner, SearchSpace, TrainedModelResult, TrainingContext,
};
use crate::utility::config::Config;
use crate::utility::errors::PipelineResult;

/// 실행 결과 요약
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub rows: usize,
    pub original_features: usize,
    pub reduced_features: usize,
    pub engineered_features: usize,
    pub candidates: usize,
    pub failures: usize,
    pub best: SearchCandidate,
    pub metrics: RegressionMetrics,
    pub written: Vec<PathBuf>,
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 워크북 시트와 감성 집계 시트를 읽는다
    pub fn load_sheets(&self) -> PipelineResult<Vec<RawSheet>> {
        let data = &self.config.data;
        info!("📂 워크북 로드: {}", data.workbook_path);
        let mut sheets = read_workbook(Path::new(&data.workbook_path), &data.sheets)?;

        for source in &data.sentiment_files {
            sheets.push(aggregate_sentiment(Path::new(&source.path), &source.name)?);
        }
        Ok(sheets)
    }

    pub fn run(&self) -> PipelineResult<PipelineSummary> {
        let sheets = self.load_sheets()?;
        self.run_on_sheets(&sheets)
    }

    pub fn run_on_sheets(&self, sheets: &[RawSheet]) -> PipelineResult<PipelineSummary> {
        let started = Instant::now();
        let data = &self.config.data;
        let target_name = data.target_name();

        let table = unify(sheets, &data.target_sheet, &data.target_column)?;
        let frame = derive_features(table, &target_name, &self.config.features.sma_windows)?;

        let importance = compute_importance(&frame, &self.reduction_params())?;
        let ratio = self.config.reduction.importance_ratio;
        let reduced = importance.reduced(ratio);
        info!(
            "✂️ 특징 축소: {}개 → {}개 (임계값 {:.4})",
            frame.feature_names.len(),
            reduced.len(),
            importance.threshold(ratio)
        );

        let (_, engineered) = engineer_features(
            &frame.table,
            &reduced,
            &importance,
            EngineeringStrategy::InteractionLog,
        )?;
        let sets = FeatureSets {
            original: frame.feature_names.clone(),
            reduced,
            engineered,
        };

        let search = &self.config.search;
        let context = TrainingContext::build(&frame, &sets, &importance, search)?;
        let candidates = SearchSpace::from(search).candidates();
        let report = SearchRunner::from(search).run(&context, &candidates)?;

        let writer = ReportWriter::new(&self.config.output, target_name);
        let mut written = writer.write(&report)?;
        if let Some(path) = self.write_attribution(&writer, &context, &report.best) {
            written.push(path);
        }

        info!("⏱️ 전체 소요 시간: {:.1}초", started.elapsed().as_secs_f64());

        Ok(PipelineSummary {
            rows: frame.n_rows(),
            original_features: sets.original.len(),
            reduced_features: sets.reduced.len(),
            engineered_features: sets.engineered.len(),
            candidates: report.total(),
            failures: report.failures,
            best: report.best.candidate.clone(),
            metrics: report.best.metrics,
            written,
        })
    }

    fn reduction_params(&self) -> BoostParams {
        let reduction = &self.config.reduction;
        BoostParams {
            iterations: reduction.iterations,
            learning_rate: reduction.learning_rate,
            depth: reduction.depth,
            l2_leaf_reg: reduction.l2_leaf_reg,
            border_count: self.config.search.border_count,
            early_stopping_rounds: None,
            use_best_model: false,
            ..BoostParams::default()
        }
    }

    /// 최고 모델의 평가 구간 기여도 요약. 실패해도 경고만 남긴다
    fn write_attribution(
        &self,
        writer: &ReportWriter,
        context: &TrainingContext,
        best: &TrainedModelResult,
    ) -> Option<PathBuf> {
        if !self.config.output.write_attribution {
            return None;
        }

        let result = context.variant(&best.candidate).and_then(|variant| {
            let attribution = attribute(&best.model, variant.test.features.view())?;
            writer.write_attribution(&best.feature_names, &attribution)
        });
        match result {
            Ok(path) => path,
            Err(e) => {
                warn!("⚠️ 특징 기여도 계산 실패 (결과 저장은 계속): {}", e);
                None
            }
        }
    }
}
