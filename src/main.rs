// ==========================================
// EKAP 招标数据采集系统 - 命令行入口
// ==========================================
// 用法: ekap-harvest [config.json]
// 流程: 日志 → 配置 → WebDriver 会话 → 识别服务/终端 → 管道 → 关闭会话
// 退出码: 运行级错误时非零
// ==========================================

use anyhow::Context;
use ekap_harvest::config::ConfigManager;
use ekap_harvest::domain::RunContext;
use ekap_harvest::engine::{
    BrowserDetailFetcher, CaptchaSolver, ListingDiscovery, OperatorChannel, PipelineOrchestrator,
    PortalLayout, PortalSurface, RunSummary, SessionDriver, VerificationGate,
};
use ekap_harvest::portal::{operator_console, TwoCaptchaSolver, WebDriverSurface};
use ekap_harvest::repository::ArtifactStore;
use ekap_harvest::transform::FilterRules;
use ekap_harvest::{logging, APP_NAME, VERSION};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    info!("==================================================");
    info!("{} v{}", APP_NAME, VERSION);
    info!("==================================================");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let manager = ConfigManager::load(&config_path)
        .with_context(|| format!("加载配置失败: {}", config_path))?;
    let config = manager.config().clone();

    // ===== 外部协作方 =====
    let surface: Arc<dyn PortalSurface> = Arc::new(WebDriverSurface::from_config(&config)?);

    let solver: Option<Arc<dyn CaptchaSolver>> = match config.captcha.usable_api_key() {
        Some(key) if config.captcha.auto_solve => {
            Some(Arc::new(TwoCaptchaSolver::new(key)?) as Arc<dyn CaptchaSolver>)
        }
        _ => None,
    };
    if config.captcha.auto_solve && solver.is_none() {
        warn!("已启用自动识别但未配置 API key, 将使用人工验证");
    }

    let (operator, handle) = OperatorChannel::new();
    let console = operator_console::spawn(handle);

    // ===== 管道装配 =====
    let gate = VerificationGate::new(
        solver,
        config.captcha.auto_solve_enabled(),
        operator,
        config.captcha.stickiness,
    );
    let driver = SessionDriver::new(
        Arc::clone(&surface),
        PortalLayout::default(),
        config.timing.clone(),
    );
    let discovery = ListingDiscovery::new(
        Arc::clone(&surface),
        config.portal.clone(),
        config.search.clone(),
        driver.retry_policy(),
    );
    let fetcher = BrowserDetailFetcher::new(
        driver,
        gate,
        config.portal.base_url.clone(),
        manager.filter_criteria(),
    );
    let orchestrator = PipelineOrchestrator::new(
        Box::new(discovery),
        Box::new(fetcher),
        ArtifactStore::new(&config.data_dir),
        FilterRules::from_config(&config.filter),
    );

    let mut ctx = RunContext::new();
    info!(run_id = %ctx.run_id, "运行开始");
    let result = orchestrator.run(&mut ctx).await;

    drop(orchestrator);
    if let Err(e) = surface.shutdown().await {
        warn!(error = %e, "关闭浏览器会话失败");
    }
    console.abort();

    let summary = result.context("运行终止")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("运行 {} 完成", summary.run_id);
    for phase in &summary.phases {
        println!("  {:<14} {:?} ({})", phase.phase.to_string(), phase.status, phase.count);
    }
    if !summary.skipped.is_empty() {
        println!("  跳过 {} 条记录:", summary.skipped.len());
        for skipped in &summary.skipped {
            println!("    {} [{}] {}", skipped.ikn, skipped.kind, skipped.message);
        }
    }
    println!("  导出文件 {} 个", summary.manifest.files.len());
}
