//! 탐색 결과 파일 저장

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};
use treeboost::Attribution;

use crate::search::{SearchReport, TrainedModelResult};
use crate::utility::config::OutputConfig;
use crate::utility::errors::{PipelineError, PipelineResult};

pub const MODEL_FILE: &str = "brent_model.txt";
pub const PREDICTIONS_FILE: &str = "brent_predictions.csv";
pub const SEARCH_RESULTS_FILE: &str = "brent_search_results.csv";
pub const METRICS_FILE: &str = "brent_metrics.txt";
pub const FEATURES_FILE: &str = "brent_best_features.txt";
pub const ATTRIBUTION_FILE: &str = "brent_attribution_summary.csv";

/// 날짜/실제값/예측값을 가장 짧은 길이에 맞춘다
pub fn align_predictions<'a>(
    dates: &'a [NaiveDate],
    y_true: &'a [f64],
    y_pred: &'a [f64],
) -> (&'a [NaiveDate], &'a [f64], &'a [f64]) {
    let len = dates.len().min(y_true.len()).min(y_pred.len());
    if len != dates.len() || len != y_true.len() || len != y_pred.len() {
        warn!(
            "⚠️ 예측 결과 길이 불일치: 날짜 {}, 실제 {}, 예측 {} → {}행으로 맞춤",
            dates.len(),
            y_true.len(),
            y_pred.len(),
            len
        );
    }
    (&dates[..len], &y_true[..len], &y_pred[..len])
}

pub fn metrics_text(best: &TrainedModelResult) -> String {
    format!(
        "Best config: {}\nRMSE: {:.4}\nMAE: {:.4}\nR2: {:.4}\n",
        best.candidate, best.metrics.rmse, best.metrics.mae, best.metrics.r2
    )
}

pub fn features_text(best: &TrainedModelResult) -> String {
    let mut text = String::from("CatBoost Brent Best Model Features\n");
    text.push_str(&"=".repeat(33));
    text.push_str("\n\n");
    text.push_str(&format!("Best config: {}\n\n", best.candidate));
    text.push_str("Feature List:\n");
    for feature in &best.feature_names {
        text.push_str(&format!("- {}\n", feature));
    }
    text
}

/// 출력 디렉토리에 결과 파일을 쓴다
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    target_name: String,
    write_attribution: bool,
}

impl ReportWriter {
    pub fn new(config: &OutputConfig, target_name: impl Into<String>) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            target_name: target_name.into(),
            write_attribution: config.write_attribution,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }

    /// 필수 결과 파일을 모두 쓰고 저장된 경로 목록을 돌려준다
    pub fn write(&self, report: &SearchReport) -> PipelineResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            PipelineError::io(format!("출력 디렉토리 생성 {}", self.output_dir.display()), e)
        })?;

        let written = vec![
            self.write_search_results(report)?,
            self.write_model(&report.best)?,
            self.write_predictions(&report.best)?,
            self.write_text(METRICS_FILE, &metrics_text(&report.best))?,
            self.write_text(FEATURES_FILE, &features_text(&report.best))?,
        ];

        info!(
            "💾 결과 저장 완료: {} ({}개 파일)",
            self.output_dir.display(),
            written.len()
        );
        Ok(written)
    }

    pub fn write_search_results(&self, report: &SearchReport) -> PipelineResult<PathBuf> {
        let path = self.path(SEARCH_RESULTS_FILE);
        let mut writer = csv::Writer::from_path(&path)?;
        for record in &report.records {
            writer.serialize(record)?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("{} 저장", path.display()), e))?;
        Ok(path)
    }

    pub fn write_model(&self, best: &TrainedModelResult) -> PipelineResult<PathBuf> {
        let path = self.path(MODEL_FILE);
        best.model.save(&path)?;
        Ok(path)
    }

    pub fn write_predictions(&self, best: &TrainedModelResult) -> PipelineResult<PathBuf> {
        let path = self.path(PREDICTIONS_FILE);
        let (dates, y_true, y_pred) = align_predictions(&best.dates, &best.y_true, &best.y_pred);

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([
            "Date".to_string(),
            format!("{}_True", self.target_name),
            format!("{}_Pred", self.target_name),
        ])?;
        for ((date, actual), predicted) in dates.iter().zip(y_true).zip(y_pred) {
            writer.write_record([
                date.format("%Y-%m-%d").to_string(),
                actual.to_string(),
                predicted.to_string(),
            ])?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("{} 저장", path.display()), e))?;
        Ok(path)
    }

    fn write_text(&self, file: &str, content: &str) -> PipelineResult<PathBuf> {
        let path = self.path(file);
        fs::write(&path, content)
            .map_err(|e| PipelineError::io(format!("{} 저장", path.display()), e))?;
        Ok(path)
    }

    /// 특징별 평균 |기여도| (내림차순). 설정에서 끄면 None
    pub fn write_attribution(
        &self,
        feature_names: &[String],
        attribution: &Attribution,
    ) -> PipelineResult<Option<PathBuf>> {
        if !self.write_attribution {
            return Ok(None);
        }

        let mut summary: Vec<(&String, f64)> =
            feature_names.iter().zip(attribution.mean_abs()).collect();
        summary.sort_by(|a, b| b.1.total_cmp(&a.1));

        let path = self.path(ATTRIBUTION_FILE);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["feature", "mean_abs_attribution"])?;
        for (feature, value) in summary {
            writer.write_record([feature.clone(), value.to_string()])?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("{} 저장", path.display()), e))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::trainer::tests::small_context;
    use crate::search::SearchRunner;
    use tempfile::TempDir;

    fn report() -> SearchReport {
        let (context, candidates) = small_context();
        SearchRunner {
            workers: 1,
            show_progress: false,
        }
        .run(&context, &candidates[..2])
        .unwrap()
    }

    fn writer(dir: &TempDir, write_attribution: bool) -> ReportWriter {
        let config = OutputConfig {
            output_dir: dir.path().join("out").to_string_lossy().to_string(),
            write_attribution,
        };
        ReportWriter::new(&config, "Brent_Close")
    }

    #[test]
    fn test_align_predictions_trims_to_shortest() {
        let dates: Vec<NaiveDate> = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
            .collect();
        let (d, t, p) = align_predictions(&dates, &[1.0, 2.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!((d.len(), t.len(), p.len()), (2, 2, 2));
    }

    #[test]
    fn test_write_all_outputs() {
        let dir = TempDir::new().unwrap();
        let report = report();
        let writer = writer(&dir, true);
        let written = writer.write(&report).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));

        let predictions = fs::read_to_string(writer.output_dir().join(PREDICTIONS_FILE)).unwrap();
        let mut lines = predictions.lines();
        assert_eq!(lines.next(), Some("Date,Brent_Close_True,Brent_Close_Pred"));
        assert_eq!(lines.count(), report.best.y_true.len());

        let results = fs::read_to_string(writer.output_dir().join(SEARCH_RESULTS_FILE)).unwrap();
        let header = results.lines().next().unwrap();
        assert_eq!(
            header,
            "feature_set,engineering,depth,learning_rate,iterations,l2_leaf_reg,rmse,mae,r2,status,error"
        );
        assert_eq!(results.lines().count(), 3);

        let metrics = fs::read_to_string(writer.output_dir().join(METRICS_FILE)).unwrap();
        assert!(metrics.starts_with("Best config: {feature_set: original"));
        assert!(metrics.contains(&format!("RMSE: {:.4}\n", report.best.metrics.rmse)));

        let features = fs::read_to_string(writer.output_dir().join(FEATURES_FILE)).unwrap();
        assert!(features.starts_with("CatBoost Brent Best Model Features\n=================================\n\n"));
        for name in &report.best.feature_names {
            assert!(features.contains(&format!("- {}\n", name)));
        }

        // LightGBM 텍스트 모델로 저장되어 다시 불러올 수 있어야 한다
        let loaded = treeboost::GradientBoostedRegressor::load(writer.output_dir().join(MODEL_FILE)).unwrap();
        assert_eq!(loaded.tree_count(), report.best.model.tree_count());
        assert_eq!(loaded.n_features(), report.best.model.n_features());
    }

    #[test]
    fn test_attribution_summary_respects_switch() {
        let dir = TempDir::new().unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        let attribution = Attribution {
            expected_value: 0.0,
            values: vec![vec![1.0, -3.0], vec![-1.0, 1.0]],
        };

        let enabled = writer(&dir, true);
        fs::create_dir_all(enabled.output_dir()).unwrap();
        let path = enabled.write_attribution(&names, &attribution).unwrap().unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "feature,mean_abs_attribution\nb,2\na,1\n");

        let disabled = writer(&dir, false);
        assert!(disabled.write_attribution(&names, &attribution).unwrap().is_none());
    }
}
