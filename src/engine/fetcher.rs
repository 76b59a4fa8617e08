// ==========================================
// EKAP 招标数据采集系统 - 详情采集阶段
// ==========================================
// 职责: 按发现顺序逐条打开详情、抽取、关闭
// 流程: 打开门户 → 应用检索条件（一次）→ 循环 [打开 → 抽取 → 关闭 → 间隔]
// 红线: 记录级错误跳过该记录并记录原因, 运行级错误终止阶段
//       每处理 snapshotEvery 条写一次进度快照, 快照失败不终止
// ==========================================

use crate::domain::{DetailRecord, DiscoveryEntry, FilterCriteria, RecordIdentifier, RunContext};
use crate::engine::error::{AcquisitionError, AcquisitionResult};
use crate::engine::extractor::{DetailExtractor, Extraction};
use crate::engine::orchestrator::DetailPhase;
use crate::engine::session::{pause, SessionDriver};
use crate::engine::verification::VerificationGate;
use crate::repository::ArtifactStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// 被跳过的记录及原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub ikn: RecordIdentifier,
    pub kind: String,
    pub message: String,
    /// NotFound 时的可见编号
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible: Vec<String>,
}

impl SkippedRecord {
    fn from_error(ikn: &RecordIdentifier, err: &AcquisitionError) -> Self {
        let visible = match err {
            AcquisitionError::NotFound { visible, .. } => visible.clone(),
            _ => Vec::new(),
        };
        Self {
            ikn: ikn.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            visible,
        }
    }
}

/// 详情阶段结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub records: Vec<DetailRecord>,
    pub skipped: Vec<SkippedRecord>,
}

// ==========================================
// BrowserDetailFetcher - 浏览器详情采集
// ==========================================
pub struct BrowserDetailFetcher {
    driver: SessionDriver,
    extractor: DetailExtractor,
    gate: VerificationGate,
    base_url: String,
    criteria: FilterCriteria,
}

impl BrowserDetailFetcher {
    /// 创建详情采集器
    ///
    /// # 参数
    /// - driver: 会话驱动（持有唯一交互会话）
    /// - gate: 验证门
    /// - base_url: 门户检索页
    /// - criteria: 列表检索条件
    pub fn new(
        driver: SessionDriver,
        gate: VerificationGate,
        base_url: impl Into<String>,
        criteria: FilterCriteria,
    ) -> Self {
        Self {
            driver,
            extractor: DetailExtractor::new(),
            gate,
            base_url: base_url.into(),
            criteria,
        }
    }

    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    /// 处理一条记录: 打开 → 抽取 → 关闭
    async fn fetch_one(
        &self,
        ctx: &mut RunContext,
        entry: &DiscoveryEntry,
    ) -> AcquisitionResult<Extraction> {
        let view = match self.driver.open_detail(ctx, &entry.ikn).await {
            Ok(view) => view,
            Err(e) => {
                // 按钮已点击但浮层未就绪时, 页面上可能残留浮层
                if matches!(e, AcquisitionError::InteractionFailed { .. }) {
                    let _ = self.driver.close_detail(ctx).await;
                }
                return Err(e);
            }
        };

        let extraction = self
            .extractor
            .extract(ctx, &self.driver, &self.gate, &view, entry)
            .await;

        if let Err(e) = self.driver.close_detail(ctx).await {
            debug!(ikn = %entry.ikn, error = %e, "关闭详情浮层失败, 继续");
        }
        extraction
    }

    fn write_snapshot(&self, store: &ArtifactStore, records: &[DetailRecord], processed: usize) {
        match store.save_snapshot(&records) {
            Ok(path) => info!(
                processed = processed,
                records = records.len(),
                path = %path.display(),
                "进度快照已保存"
            ),
            Err(e) => warn!(processed = processed, error = %e, "进度快照写入失败"),
        }
    }
}

#[async_trait]
impl DetailPhase for BrowserDetailFetcher {
    #[instrument(skip_all, fields(run_id = %ctx.run_id, entries = entries.len()))]
    async fn fetch_details(
        &self,
        ctx: &mut RunContext,
        entries: &[DiscoveryEntry],
        store: &ArtifactStore,
    ) -> AcquisitionResult<FetchReport> {
        info!("详情阶段开始");
        self.driver.navigate(&self.base_url).await?;
        self.driver.apply_filters(ctx, &self.criteria).await?;

        let snapshot_every = self.driver.timing().snapshot_every.max(1);
        let mut report = FetchReport::default();

        for (idx, entry) in entries.iter().enumerate() {
            let processed = idx + 1;
            info!(ikn = %entry.ikn, progress = processed, total = entries.len(), "处理记录");

            match self.fetch_one(ctx, entry).await {
                Ok(extraction) => report.records.push(extraction.record),
                Err(e) if e.is_record_scoped() => {
                    let skipped = SkippedRecord::from_error(&entry.ikn, &e);
                    warn!(
                        ikn = %entry.ikn,
                        kind = %skipped.kind,
                        error = %e,
                        visible = ?skipped.visible,
                        "跳过记录"
                    );
                    report.skipped.push(skipped);
                }
                Err(e) => {
                    error!(ikn = %entry.ikn, kind = e.kind(), error = %e, "详情阶段终止");
                    self.write_snapshot(store, &report.records, processed);
                    return Err(e);
                }
            }

            if processed % snapshot_every == 0 {
                self.write_snapshot(store, &report.records, processed);
            }
            pause(self.driver.timing().record_pause()).await;
        }

        info!(
            fetched = report.records.len(),
            skipped = report.skipped.len(),
            "详情阶段完成"
        );
        Ok(report)
    }
}
