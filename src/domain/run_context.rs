// ==========================================
// EKAP 招标数据采集系统 - 运行上下文
// ==========================================
// 职责: 单次运行范围内的可变状态, 显式传递给每个调用
// 红线: 不使用全局状态, 不跨运行持久化
// ==========================================

use crate::domain::types::RecordIdentifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 列表页的检索条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// IKN 年份
    pub year: u16,
    /// 省份下拉框显示文本
    pub region_label: String,
    /// 招标类别的界面标签（如 "Yapım"）
    pub category_label: String,
}

/// 运行上下文
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// 当前生效的检索条件（apply_filters 之后才有值）
    pub criteria: Option<FilterCriteria>,
    /// 当前打开的详情记录
    pub open_record: Option<RecordIdentifier>,
    /// 本次运行内验证码是否已解决（一次性标志）
    pub verification_resolved: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            criteria: None,
            open_record: None,
            verification_resolved: false,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
