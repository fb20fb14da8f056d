use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reelgen::app::Application;
use reelgen::shutdown::ShutdownManager;
use reelgen_core::{AppConfig, LogFormat};
use reelgen_dispatcher::GenerationMode;
use reelgen_domain::{
    DurationClass, GenerationParams, OverlayStyle, PreferencesRepository, Reel, ReelFilter,
    ReelStatus, StdRandom,
};
use reelgen_errors::ReelError;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "reelgen")]
#[command(version = "1.0.0")]
#[command(about = "短视频(Reels)生成、排期与自动发布系统")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，未指定时依次查找 config/reelgen.toml 和 reelgen.toml
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式 (pretty/json)，覆盖配置文件
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动发布调度器和每日自动生成，直到收到关闭信号
    Run,
    /// 生成一批 Reel
    Generate {
        #[arg(short, long)]
        niche: String,
        #[arg(short, long)]
        product: String,
        /// 时长 (7s/15s/30s)，默认取配置
        #[arg(short, long)]
        duration: Option<DurationClass>,
        /// 叠加层样式 (text/infographic)，默认取配置
        #[arg(short, long)]
        style: Option<OverlayStyle>,
        /// 只生成草稿，不自动排期
        #[arg(long)]
        manual: bool,
    },
    /// 手动排期
    Schedule {
        reel_id: String,
        /// RFC3339 时间，未指定时使用默认偏移
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// 为所有草稿和排队中的 Reel 排期
    ScheduleAll,
    /// 列出 Reel
    List {
        #[arg(short, long)]
        status: Option<ReelStatus>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// 归档
    Archive { reel_id: String },
    /// 用原有参数重新生成文案和叠加层
    Regenerate { reel_id: String },
    /// 把发布失败的 Reel 重新排入队列
    Requeue {
        reel_id: String,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// 导出单个 Reel 的压缩包
    Export {
        reel_id: String,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// 导出前三个 Reel 的压缩包
    ExportBatch {
        reel_ids: Vec<String>,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// 查看保存的默认 niche/product 和轮换计数
    Prefs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("<默认路径>")
        )
    })?;

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = cli.log_format.unwrap_or(config.observability.log_format);
    init_logging(&log_level, log_format)?;

    let app = Application::new(config).await?;
    if let Err(e) = execute(cli.command, app).await {
        if let Some(reel_error) = e.downcast_ref::<ReelError>() {
            eprintln!("{}", reel_error.user_message());
        }
        return Err(e);
    }
    Ok(())
}

async fn execute(command: Commands, app: Application) -> Result<()> {
    let now = Utc::now();

    match command {
        Commands::Run => run(app).await?,
        Commands::Generate {
            niche,
            product,
            duration,
            style,
            manual,
        } => {
            let generation = &app.config().generation;
            let params = GenerationParams::new(
                niche,
                product,
                duration.unwrap_or(generation.default_duration),
                style.unwrap_or(generation.default_overlay_style),
            );
            let mode = if manual {
                GenerationMode::Manual
            } else {
                GenerationMode::Auto
            };
            let report = app
                .generator()
                .generate(&params, mode, &mut StdRandom::from_entropy(), now)
                .await?;

            let scheduled = report.schedule.as_ref().map(|s| s.scheduled.clone());
            for reel in scheduled.as_ref().unwrap_or(&report.batch.created) {
                print_reel(reel);
            }
            for failure in &report.batch.failures {
                println!("生成失败 #{} ({}): {}", failure.index, failure.archetype, failure.error);
            }
            if let Some(schedule) = &report.schedule {
                for failure in &schedule.failures {
                    println!("排期失败 {}: {}", failure.reel_id, failure.error);
                }
            }
        }
        Commands::Schedule { reel_id, at } => {
            let reel = app.controller().schedule(&reel_id, at, now).await?;
            print_reel(&reel);
        }
        Commands::ScheduleAll => {
            let report = app.scheduler().schedule_all(now).await?;
            for reel in &report.scheduled {
                print_reel(reel);
            }
            for failure in &report.failures {
                println!("排期失败 {}: {}", failure.reel_id, failure.error);
            }
        }
        Commands::List {
            status,
            limit,
            offset,
        } => {
            let filter = ReelFilter {
                status,
                limit,
                offset,
                ..ReelFilter::default()
            };
            for reel in app.controller().list(&filter).await? {
                print_reel(&reel);
            }
            let summary = app.controller().status_summary().await?;
            println!(
                "共 {} 个: draft {} / queued {} / posted {} / failed {} / archived {}",
                summary.total(),
                summary.draft,
                summary.queued,
                summary.posted,
                summary.failed,
                summary.archived
            );
        }
        Commands::Archive { reel_id } => {
            print_reel(&app.controller().archive(&reel_id).await?);
        }
        Commands::Regenerate { reel_id } => {
            let reel = app
                .controller()
                .regenerate(&reel_id, &mut StdRandom::from_entropy(), now)
                .await?;
            print_reel(&reel);
            println!("{}", reel.caption_with_hashtags());
        }
        Commands::Requeue { reel_id, at } => {
            print_reel(&app.controller().requeue(&reel_id, at, now).await?);
        }
        Commands::Export { reel_id, output } => {
            let artifact = app.controller().export(&reel_id).await?;
            write_artifact(&output, &artifact.file_name, &artifact.bytes)?;
        }
        Commands::ExportBatch { reel_ids, output } => {
            let artifact = app.controller().export_batch(&reel_ids).await?;
            write_artifact(&output, &artifact.file_name, &artifact.bytes)?;
        }
        Commands::Prefs => {
            let prefs = app.preferences().load().await?;
            let last = app.preferences().last_auto_generation().await?;
            println!("niche: {}", prefs.niche);
            println!("product: {}", prefs.product);
            println!("rotation_counter: {}", prefs.rotation_counter);
            match last {
                Some(at) => println!("last_auto_generation: {}", at.to_rfc3339()),
                None => println!("last_auto_generation: -"),
            }
        }
    }

    Ok(())
}

async fn run(app: Application) -> Result<()> {
    info!("启动Reel生成与发布服务");

    let shutdown_manager = ShutdownManager::new();
    let app = Arc::new(app);
    let grace = app.config().dispatcher.shutdown_grace() + Duration::from_secs(5);

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(grace, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }
    Ok(())
}

fn print_reel(reel: &Reel) {
    let scheduled = reel
        .scheduled_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:<9} {:<12} {:<4} 排期: {}  尝试: {}/{}{}",
        reel.id,
        reel.status,
        reel.archetype,
        reel.duration_class,
        scheduled,
        reel.attempts,
        reel.max_retries,
        reel.post_id
            .as_deref()
            .map(|id| format!("  post: {id}"))
            .unwrap_or_default()
    );
}

fn write_artifact(dir: &std::path::Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).with_context(|| format!("写入导出文件失败: {}", path.display()))?;
    println!("已导出: {}", path.display());
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
