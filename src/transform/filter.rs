// ==========================================
// EKAP 招标数据采集系统 - 记录筛选器
// ==========================================
// 规则（全部满足才保留）:
//   1. 招标类型/程序 完全等于配置值
//   2. 状态 不等于取消状态
//   3. 批准日期 (DD.MM.YYYY) 不早于下限
// 说明: 哨兵值不满足任何相等判断
// ==========================================

use crate::config::FilterConfig;
use crate::domain::DetailRecord;
use chrono::NaiveDate;
use tracing::{debug, info};

pub const PROCEDURE_LABEL: &str = "İhale Türü - Usulü";
pub const STATUS_LABEL: &str = "İhale Durumu";
pub const APPROVAL_DATE_LABEL: &str = "İhale Onay Tarihi";

/// 解析门户日期 `DD.MM.YYYY`
pub fn parse_portal_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y").ok()
}

/// 记录被剔除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Procedure,
    Cancelled,
    ApprovalDate,
}

/// 筛选统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub wrong_procedure: usize,
    pub cancelled: usize,
    pub before_cutoff: usize,
}

// ==========================================
// FilterRules - 筛选规则
// ==========================================
#[derive(Debug, Clone)]
pub struct FilterRules {
    procedure: String,
    cancelled_status: String,
    approved_on_or_after: NaiveDate,
}

impl FilterRules {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            procedure: config.procedure.clone(),
            cancelled_status: config.cancelled_status.clone(),
            approved_on_or_after: config.approved_on_or_after,
        }
    }

    /// 判定单条记录
    ///
    /// # 返回
    /// - None: 保留
    /// - Some(Rejection): 第一个不满足的规则
    pub fn check(&self, record: &DetailRecord) -> Option<Rejection> {
        if record.find_text(PROCEDURE_LABEL) != Some(self.procedure.as_str()) {
            return Some(Rejection::Procedure);
        }
        if record.find_text(STATUS_LABEL) == Some(self.cancelled_status.as_str()) {
            return Some(Rejection::Cancelled);
        }
        match record.find_text(APPROVAL_DATE_LABEL).and_then(parse_portal_date) {
            Some(date) if date >= self.approved_on_or_after => None,
            _ => Some(Rejection::ApprovalDate),
        }
    }

    /// 筛选（保留顺序）
    pub fn apply(&self, records: Vec<DetailRecord>) -> (Vec<DetailRecord>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            match self.check(&record) {
                None => kept.push(record),
                Some(reason) => {
                    debug!(ikn = %record.id, reason = ?reason, "记录被剔除");
                    match reason {
                        Rejection::Procedure => stats.wrong_procedure += 1,
                        Rejection::Cancelled => stats.cancelled += 1,
                        Rejection::ApprovalDate => stats.before_cutoff += 1,
                    }
                }
            }
        }
        stats.kept = kept.len();

        info!(
            kept = stats.kept,
            wrong_procedure = stats.wrong_procedure,
            cancelled = stats.cancelled,
            before_cutoff = stats.before_cutoff,
            "筛选完成"
        );
        (kept, stats)
    }
}
