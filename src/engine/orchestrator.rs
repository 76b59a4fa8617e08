// ==========================================
// EKAP 招标数据采集系统 - 管道编排器
// ==========================================
// 顺序: 发现 → 详情采集 → 清洗 → 筛选 → 导出
// 规则: 阶段 N 的产物存在 → 跳过该阶段, 读取产物作为 N+1 的输入
//       阶段完成后立即持久化产物
// 红线: 产物读写失败终止运行 (FatalIo)
// ==========================================

use crate::domain::{DetailRecord, DiscoveryEntry, PhaseKind, RunContext};
use crate::engine::error::AcquisitionResult;
use crate::engine::fetcher::{FetchReport, SkippedRecord};
use crate::repository::{ArtifactStore, PhaseArtifact};
use crate::transform::{CsvExporter, ExportManifest, FilterRules, RecordCleaner};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// 阶段接口
// ==========================================

/// 发现阶段: 生成有序唯一的编号列表
#[async_trait]
pub trait DiscoveryPhase: Send + Sync {
    async fn discover(&self, ctx: &mut RunContext) -> AcquisitionResult<Vec<DiscoveryEntry>>;
}

/// 详情阶段: 按顺序采集每条记录
///
/// # 参数
/// - store: 用于写入进度快照
#[async_trait]
pub trait DetailPhase: Send + Sync {
    async fn fetch_details(
        &self,
        ctx: &mut RunContext,
        entries: &[DiscoveryEntry],
        store: &ArtifactStore,
    ) -> AcquisitionResult<FetchReport>;
}

// ==========================================
// 运行摘要
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// 本次运行执行并写出产物
    Produced,
    /// 产物已存在, 直接读取
    Resumed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: PhaseKind,
    pub status: PhaseStatus,
    /// 产物中的条目数
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub phases: Vec<PhaseReport>,
    pub skipped: Vec<SkippedRecord>,
    pub manifest: ExportManifest,
}

impl RunSummary {
    pub fn phase(&self, phase: PhaseKind) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn count(&self, phase: PhaseKind) -> usize {
        self.phase(phase).map(|p| p.count).unwrap_or(0)
    }
}

// ==========================================
// PipelineOrchestrator - 管道编排器
// ==========================================
pub struct PipelineOrchestrator {
    discovery: Box<dyn DiscoveryPhase>,
    details: Box<dyn DetailPhase>,
    store: ArtifactStore,
    cleaner: RecordCleaner,
    rules: FilterRules,
    exporter: CsvExporter,
}

impl PipelineOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - discovery / details: 需要交互会话的两个阶段
    /// - store: 产物仓储（导出目录位于其下的 exports/）
    /// - rules: 筛选规则
    pub fn new(
        discovery: Box<dyn DiscoveryPhase>,
        details: Box<dyn DetailPhase>,
        store: ArtifactStore,
        rules: FilterRules,
    ) -> Self {
        let exporter = CsvExporter::new(store.exports_dir());
        Self {
            discovery,
            details,
            store,
            cleaner: RecordCleaner::new(),
            rules,
            exporter,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// 执行完整管道
    #[instrument(skip_all, fields(run_id = %ctx.run_id))]
    pub async fn run(&self, ctx: &mut RunContext) -> AcquisitionResult<RunSummary> {
        info!(data_dir = %self.store.root().display(), "管道开始");
        let mut phases = Vec::with_capacity(PhaseKind::ORDERED.len());
        let mut skipped = Vec::new();

        // ===== 1. 发现 =====
        let (entries, status) = match self.checkpoint::<Vec<DiscoveryEntry>>(PhaseKind::Discover)? {
            Some(entries) => (entries, PhaseStatus::Resumed),
            None => {
                let entries = self.discovery.discover(ctx).await?;
                self.store.save(PhaseArtifact::Discovery, &entries)?;
                (entries, PhaseStatus::Produced)
            }
        };
        phases.push(report(PhaseKind::Discover, status, entries.len()));

        // ===== 2. 详情采集 =====
        let (raw, status) = match self.checkpoint::<Vec<DetailRecord>>(PhaseKind::FetchDetails)? {
            Some(records) => (records, PhaseStatus::Resumed),
            None => {
                let fetched = self.details.fetch_details(ctx, &entries, &self.store).await?;
                self.store.save(PhaseArtifact::RawDetails, &fetched.records)?;
                skipped = fetched.skipped;
                (fetched.records, PhaseStatus::Produced)
            }
        };
        phases.push(report(PhaseKind::FetchDetails, status, raw.len()));

        // ===== 3. 清洗 =====
        let (cleaned, status) = self.derive(PhaseKind::Clean, || Ok(self.cleaner.clean_all(raw)))?;
        phases.push(report(PhaseKind::Clean, status, cleaned.len()));

        // ===== 4. 筛选 =====
        let (filtered, status) =
            self.derive(PhaseKind::Filter, || Ok(self.rules.apply(cleaned).0))?;
        phases.push(report(PhaseKind::Filter, status, filtered.len()));

        // ===== 5. 导出 =====
        let (manifest, status) =
            self.derive(PhaseKind::Export, || Ok(self.exporter.export(&filtered)?))?;
        phases.push(report(PhaseKind::Export, status, manifest.files.len()));

        for phase in &phases {
            info!(phase = %phase.phase, status = ?phase.status, count = phase.count, "阶段结果");
        }
        info!(skipped = skipped.len(), "管道完成");

        Ok(RunSummary {
            run_id: ctx.run_id,
            phases,
            skipped,
            manifest,
        })
    }

    /// 读取阶段检查点（不存在时返回 None）
    fn checkpoint<T: DeserializeOwned>(&self, phase: PhaseKind) -> AcquisitionResult<Option<T>> {
        let artifact = PhaseArtifact::for_phase(phase);
        if !self.store.exists(artifact) {
            return Ok(None);
        }
        info!(phase = %phase, path = %self.store.path(artifact).display(), "检查点已存在, 跳过阶段");
        Ok(Some(self.store.load(artifact)?))
    }

    /// 纯数据阶段: 有检查点则读取, 否则计算并持久化
    fn derive<T, F>(&self, phase: PhaseKind, produce: F) -> AcquisitionResult<(T, PhaseStatus)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> AcquisitionResult<T>,
    {
        if let Some(value) = self.checkpoint(phase)? {
            return Ok((value, PhaseStatus::Resumed));
        }
        info!(phase = %phase, "阶段开始");
        let value = produce()?;
        self.store.save(PhaseArtifact::for_phase(phase), &value)?;
        Ok((value, PhaseStatus::Produced))
    }
}

fn report(phase: PhaseKind, status: PhaseStatus, count: usize) -> PhaseReport {
    PhaseReport {
        phase,
        status,
        count,
    }
}
