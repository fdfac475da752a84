//! Conversation Notifier CLI
//!
//! 对消息快照执行一轮（或持续）通知投递，并查看展示面记录

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use conversation_notifier::{
    notification::SurfaceOp, platform::ChannelScheduler, AnthropicSuggestionProvider,
    JsonlSurface, NotificationDispatcher, Notifier, NotifierConfig, RunContext, RunReport,
    SnapshotStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cnotify")]
#[command(about = "Conversation Notifier - 把未读消息整理成平台通知")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行一轮投递
    Run(RunArgs),
    /// 按配置的重复间隔持续投递
    Watch(RunArgs),
    /// 查看最近的展示面记录
    History {
        /// 显示最近 N 条
        #[arg(long, short, default_value = "20")]
        n: usize,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
        /// 展示面日志路径
        #[arg(long)]
        surface: Option<PathBuf>,
    },
    /// 查看当前仍在展示的通知
    Active {
        /// 展示面日志路径
        #[arg(long)]
        surface: Option<PathBuf>,
    },
}

#[derive(Args, Clone)]
struct RunArgs {
    /// 消息快照文件（JSON）
    #[arg(long)]
    store: PathBuf,
    /// 配置文件（默认 ~/.config/conversation-notifier/config.json）
    #[arg(long)]
    config: Option<PathBuf>,
    /// 当前在前台打开的会话
    #[arg(long)]
    foreground: Option<i64>,
    /// 本机为收信设备（显示拨号动作）
    #[arg(long)]
    device_of_record: bool,
    /// Dry-run 模式（只打印不投递）
    #[arg(long)]
    dry_run: bool,
    /// 展示面日志路径
    #[arg(long)]
    surface: Option<PathBuf>,
}

fn surface_at(path: Option<&Path>) -> JsonlSurface {
    match path {
        Some(p) => JsonlSurface::with_path(p),
        None => JsonlSurface::new(),
    }
}

fn load_config(path: Option<&Path>) -> Result<NotifierConfig> {
    match path {
        Some(p) => NotifierConfig::load_from(p),
        None => NotifierConfig::load(),
    }
}

fn build_notifier(args: &RunArgs, config: NotifierConfig, scheduler: Option<ChannelScheduler>) -> Result<Notifier> {
    let store = SnapshotStore::from_path(&args.store)
        .with_context(|| format!("Failed to load snapshot {}", args.store.display()))?;
    debug!(conversations = store.conversation_count(), "Snapshot loaded");

    let dispatcher = NotificationDispatcher::new(Arc::new(surface_at(args.surface.as_deref())))
        .with_dry_run(args.dry_run);

    let provider = if config.smart_reply_enabled() {
        AnthropicSuggestionProvider::from_config(&config)
    } else {
        None
    };

    let mut notifier = Notifier::new(Arc::new(store), dispatcher, config);
    if let Some(provider) = provider {
        notifier = notifier.with_suggestions(Arc::new(provider));
    }
    if let Some(scheduler) = scheduler {
        notifier = notifier.with_scheduler(Arc::new(scheduler));
    }
    Ok(notifier)
}

fn context(args: &RunArgs) -> RunContext {
    RunContext::now()
        .with_foreground(args.foreground)
        .with_device_of_record(args.device_of_record)
}

fn print_report(report: &RunReport) {
    println!("结果: {:?}", report.outcome);
    for key in report.posted() {
        println!("  已投递: {}", key);
    }
    for key in report.skipped() {
        println!("  已跳过: {}", key);
    }
    for key in report.failed() {
        println!("  失败: {}", key);
    }
    if let Some(id) = report.alerting {
        println!("  提醒会话: {}", id);
    }
    if let Some(summary) = report.summary {
        println!("  汇总: {:?}", summary);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug cnotify run --store snapshot.json
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conversation_notifier=info,cnotify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(args.config.as_deref())?;
            let notifier = build_notifier(&args, config, None)?;
            let report = notifier.run(context(&args)).await;
            print_report(&report);
        }
        Commands::Watch(args) => {
            let (scheduler, mut rx) = ChannelScheduler::new();
            loop {
                // 每轮重新读取配置和快照
                let config = load_config(args.config.as_deref())?;
                let notifier = build_notifier(&args, config, Some(scheduler.clone()))?;
                let report = notifier.run(context(&args)).await;
                print_report(&report);

                match rx.try_recv() {
                    Ok(after) => {
                        info!(after_secs = after.as_secs(), "Waiting for next run");
                        tokio::time::sleep(after).await;
                    }
                    Err(_) => {
                        info!("No repeat scheduled, exiting");
                        break;
                    }
                }
            }
        }
        Commands::History { n, json, surface } => {
            let records = surface_at(surface.as_deref()).read_recent(n);

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("最近 {} 条记录:\n", records.len());
                for record in records {
                    let op = match record.op {
                        SurfaceOp::Post => "post",
                        SurfaceOp::Cancel => "cancel",
                    };
                    let title = record.result.as_ref().map(|r| r.title.as_str()).unwrap_or("-");
                    println!(
                        "  {} | {:6} | {} | {}",
                        record.ts.format("%Y-%m-%d %H:%M:%S"),
                        op,
                        record.key,
                        title
                    );
                }
            }
        }
        Commands::Active { surface } => {
            let active = surface_at(surface.as_deref()).active();
            println!("当前展示 {} 条通知:\n", active.len());
            for (key, result) in active {
                let alert = if result.alert.is_alerting() { "🔔" } else { "  " };
                println!("  {} {} | {} | {}", alert, key, result.title, result.body.replace('\n', " / "));
            }
        }
    }

    Ok(())
}
