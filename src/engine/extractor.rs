// ==========================================
// EKAP 招标数据采集系统 - 详情抽取器
// ==========================================
// 职责: 对已打开的详情浮层, 逐个子区块读取标签/值数据
// 区块: 招标信息 / 采购单位信息 / 合同信息（可缺失）/ 公告信息（需过验证门）
// 红线: 单个区块失败不影响其他区块
//       合同区块结构性缺失时写入哨兵值
// ==========================================

use crate::domain::{DetailRecord, DiscoveryEntry, RunContext, SectionKind, SentinelKind};
use crate::engine::error::{AcquisitionError, AcquisitionResult};
use crate::engine::session::{DetailView, SessionDriver};
use crate::engine::verification::{GateOutcome, VerificationGate};
use tracing::{debug, info, warn};

/// 单个区块的抽取结果
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    /// 成功, 合并的字段数
    Extracted(usize),
    /// 结构性缺失, 已写入哨兵值
    Absent,
    /// 读取失败（可选区块会写入哨兵值）
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub section: SectionKind,
    pub outcome: SectionOutcome,
}

/// 一条记录的抽取结果
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: DetailRecord,
    pub sections: Vec<SectionReport>,
    pub gate: Option<GateOutcome>,
}

impl Extraction {
    pub fn outcome(&self, section: SectionKind) -> Option<&SectionOutcome> {
        self.sections
            .iter()
            .find(|r| r.section == section)
            .map(|r| &r.outcome)
    }
}

// ==========================================
// DetailExtractor - 详情抽取器
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct DetailExtractor;

impl DetailExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 抽取一条记录
    ///
    /// # 返回
    /// - Ok(Extraction): 各区块结果的并集（发现字段 + 成功的区块 + 哨兵）
    /// - Err: 仅当验证门无法解决（运行级错误）
    pub async fn extract(
        &self,
        ctx: &mut RunContext,
        driver: &SessionDriver,
        gate: &VerificationGate,
        view: &DetailView,
        entry: &DiscoveryEntry,
    ) -> AcquisitionResult<Extraction> {
        let mut record = DetailRecord::from_discovery(entry);
        let mut sections = Vec::with_capacity(SectionKind::DETAIL_SECTIONS.len());

        for section in [
            SectionKind::General,
            SectionKind::Administrative,
            SectionKind::Contract,
        ] {
            let outcome = match self.extract_pairs(driver, view, section).await {
                Ok(pairs) => SectionOutcome::Extracted(record.merge_section(section, pairs)),
                Err(e) => self.on_section_error(&mut record, section, e),
            };
            debug!(ikn = %view.id, section = %section, outcome = ?outcome, "区块抽取完成");
            sections.push(SectionReport { section, outcome });
        }

        let (outcome, gate_outcome) = match self.extract_notice(ctx, driver, gate, view).await {
            Ok((pairs, gate_outcome)) => (
                SectionOutcome::Extracted(record.merge_section(SectionKind::Notice, pairs)),
                Some(gate_outcome),
            ),
            Err(e) => {
                if let Err(close_err) = driver.close_notice().await {
                    warn!(ikn = %view.id, error = %close_err, "关闭公告浮层失败");
                }
                if !e.is_record_scoped() {
                    return Err(e);
                }
                (self.on_section_error(&mut record, SectionKind::Notice, e), None)
            }
        };
        sections.push(SectionReport {
            section: SectionKind::Notice,
            outcome,
        });

        info!(ikn = %view.id, fields = record.fields.len(), "详情抽取完成");
        Ok(Extraction {
            record,
            sections,
            gate: gate_outcome,
        })
    }

    /// 区块错误处理
    ///
    /// - 合同区块页签/内容缺失 → SectionAbsent 哨兵
    /// - 可选区块其他错误 → SectionUnavailable 哨兵
    /// - 必选区块错误 → 仅记录日志
    fn on_section_error(
        &self,
        record: &mut DetailRecord,
        section: SectionKind,
        err: AcquisitionError,
    ) -> SectionOutcome {
        let structurally_absent = section == SectionKind::Contract
            && matches!(err, AcquisitionError::SectionUnavailable { .. });

        if structurally_absent {
            info!(ikn = %record.id, "合同信息不存在, 记为 N/A");
            record.mark_section(section, SentinelKind::SectionAbsent);
            return SectionOutcome::Absent;
        }

        warn!(ikn = %record.id, section = %section, error = %err, "区块抽取失败");
        if section.is_optional() {
            record.mark_section(section, SentinelKind::SectionUnavailable);
        }
        SectionOutcome::Failed(err.to_string())
    }

    async fn extract_pairs(
        &self,
        driver: &SessionDriver,
        view: &DetailView,
        section: SectionKind,
    ) -> AcquisitionResult<Vec<(String, String)>> {
        let layout = driver
            .layout()
            .section(section)
            .ok_or_else(|| AcquisitionError::SectionUnavailable {
                section,
                reason: "无标签/值布局".to_string(),
            })?;

        driver.select_section(view, section, layout).await?;

        let surface = driver.surface();
        let ready = surface
            .wait_for(&view.frame, &layout.ready, driver.timing().section_timeout())
            .await
            .map_err(|e| AcquisitionError::interaction("wait section", &e))?;
        if ready.is_none() {
            return Err(AcquisitionError::SectionUnavailable {
                section,
                reason: "区块未渲染".to_string(),
            });
        }

        let pairs = surface
            .read_label_pairs(&view.frame, &layout.pairs)
            .await
            .map_err(|e| AcquisitionError::interaction("read section", &e))?;

        if pairs.is_empty() && section == SectionKind::Contract {
            return Err(AcquisitionError::SectionUnavailable {
                section,
                reason: "合同信息为空".to_string(),
            });
        }
        Ok(pairs)
    }

    /// 公告区块: 打开预览浮层 → 验证门 → 读取表格 → 关闭浮层
    async fn extract_notice(
        &self,
        ctx: &mut RunContext,
        driver: &SessionDriver,
        gate: &VerificationGate,
        view: &DetailView,
    ) -> AcquisitionResult<(Vec<(String, String)>, GateOutcome)> {
        let notice = &driver.layout().notice;
        let scope = driver.open_notice(view).await?;
        let gate_outcome = gate.pass(ctx, driver, &scope).await?;

        let surface = driver.surface();
        let table = surface
            .wait_for(&scope, &notice.table, driver.timing().notice_timeout())
            .await
            .map_err(|e| AcquisitionError::interaction("wait notice table", &e))?;
        if table.is_none() {
            return Err(AcquisitionError::SectionUnavailable {
                section: SectionKind::Notice,
                reason: "公告表格未渲染".to_string(),
            });
        }

        let rows = surface
            .read_rows(&scope, &notice.rows)
            .await
            .map_err(|e| AcquisitionError::interaction("read notice rows", &e))?;
        let pairs = notice_pairs(rows);

        if let Err(e) = driver.close_notice().await {
            warn!(ikn = %view.id, error = %e, "关闭公告浮层失败");
        }
        Ok((pairs, gate_outcome))
    }
}

/// 公告表格行 → 标签/值: 至少两个非空单元格, 首格为标签, 其余以空格拼接
pub fn notice_pairs(rows: Vec<Vec<String>>) -> Vec<(String, String)> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.len() >= 2)
        .map(|cells| (cells[0].clone(), cells[1..].join(" ")))
        .collect()
}
