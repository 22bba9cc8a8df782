use brentrs::{
    init_tracing,
    pipeline::Pipeline,
    utility::config::Config,
    utility::errors::{PipelineError, PipelineResult},
};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "brentrs")]
#[command(about = "Brent crude feature search and gradient boosting model selection")]
struct Args {
    /// 설정 파일 경로 (기본값: config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// 워크북 경로 (기본값: 설정 파일의 data.workbook_path)
    #[arg(short, long)]
    workbook: Option<String>,

    /// 결과 저장 디렉토리 (기본값: 설정 파일의 output.output_dir)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// 병렬 작업자 수 (0 = CPU 코어 수)
    #[arg(long)]
    workers: Option<usize>,

    /// 진행률 표시 끄기
    #[arg(long)]
    no_progress: bool,
}

fn main() -> PipelineResult<()> {
    // 명령행 인수 파싱
    let args = Args::parse();

    // 설정 로드 후 명령행 인수로 오버라이드
    let mut config = Config::load_from_file(&args.config)?;
    if let Some(workbook) = args.workbook {
        config.data.workbook_path = workbook;
    }
    if let Some(output_dir) = args.output_dir {
        config.output.output_dir = output_dir;
    }
    if let Some(workers) = args.workers {
        config.search.workers = workers;
    }
    if args.no_progress {
        config.search.show_progress = false;
    }
    config.validate()?;

    init_tracing(&config.logging.level)
        .map_err(|e| PipelineError::general(format!("로그 시스템 초기화 실패: {}", e)))?;

    info!("🚀 brentrs 시작!");
    info!("📁 설정 파일: {}", args.config);
    info!(
        "🎯 타깃: {} (시트 {}개, 감성 파일 {}개)",
        config.data.target_name(),
        config.data.sheets.len(),
        config.data.sentiment_files.len()
    );

    let pipeline = Pipeline::new(config);
    match pipeline.run() {
        Ok(summary) => {
            info!(
                "📊 행 {}개, 특징 original {} / reduced {} / engineered {}",
                summary.rows,
                summary.original_features,
                summary.reduced_features,
                summary.engineered_features
            );
            info!(
                "🏆 최고 설정: {} → RMSE {:.4}, MAE {:.4}, R2 {:.4} (후보 {}개 중 실패 {}개)",
                summary.best,
                summary.metrics.rmse,
                summary.metrics.mae,
                summary.metrics.r2,
                summary.candidates,
                summary.failures
            );
            for path in &summary.written {
                info!("💾 {}", path.display());
            }
        }
        Err(e) => {
            error!("❌ 파이프라인 실행 중 오류 발생: {}", e);
            return Err(e);
        }
    }

    info!("🏁 brentrs 종료");
    Ok(())
}
