// ==========================================
// EKAP 招标数据采集系统 - 配置结构
// ==========================================
// 存储: config.json (camelCase 键)
// 说明: 除 search 外所有分组均有默认值
// ==========================================

use crate::domain::VerificationScope;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 验证码 API key 的占位值，视为未配置
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

// ==========================================
// AppConfig - 顶层配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub search: SearchConfig,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

fn default_headless() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

// ===== 检索条件 =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// IKN 年份
    pub year: u16,
    /// 省份编号（搜索接口 ilId）
    pub region_id: u32,
    /// 省份下拉框文本
    pub region_label: String,
    /// 招标类别编号（搜索接口 ihaleTuru）, 2 = 工程 (Yapım)
    #[serde(default = "default_category")]
    pub category: u32,
    #[serde(default = "default_category_label")]
    pub category_label: String,
    /// 搜索接口所需的页签 ID
    #[serde(default = "default_tab_id")]
    pub tab_id: String,
    /// 发现阶段最多翻页数（None 表示直到空页）
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_category() -> u32 {
    2
}

fn default_category_label() -> String {
    "Yapım".to_string()
}

fn default_tab_id() -> String {
    "8c0495a2-9ae9-4739-8f54-9dcf0c3197f8".to_string()
}

// ===== 验证码 =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptchaConfig {
    pub auto_solve: bool,
    pub api_key: Option<String>,
    pub stickiness: VerificationScope,
}

impl CaptchaConfig {
    /// 可用的 API key（空串与占位值视为未配置）
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != API_KEY_PLACEHOLDER)
    }

    /// 是否走自动识别路径
    pub fn auto_solve_enabled(&self) -> bool {
        self.auto_solve && self.usable_api_key().is_some()
    }
}

// ===== 门户地址 =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalConfig {
    pub base_url: String,
    pub search_data_url: String,
    pub webdriver_url: String,
    /// chrome | firefox
    pub browser: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ekap.kik.gov.tr/EKAP/Ortak/IhaleArama/index.html".to_string(),
            search_data_url: "https://ekap.kik.gov.tr/EKAP/Ortak/YeniIhaleAramaData.ashx"
                .to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            browser: "chrome".to_string(),
        }
    }
}

// ===== 时序参数 =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    /// 等待页面异步活动静止的上限
    pub settle_timeout_ms: u64,
    /// 静止后的固定缓冲
    pub settle_grace_ms: u64,
    pub retry_attempts: u32,
    pub retry_interval_ms: u64,
    /// 切换子区块后的渲染等待
    pub section_render_ms: u64,
    pub section_timeout_ms: u64,
    pub listing_timeout_ms: u64,
    pub detail_frame_timeout_ms: u64,
    pub notice_timeout_ms: u64,
    /// 提交验证码后等待站点受理
    pub captcha_acceptance_ms: u64,
    /// 两条记录之间的停顿
    pub record_pause_ms: u64,
    /// 详情阶段每处理 N 条写一次中间快照
    pub snapshot_every: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: 5_000,
            settle_grace_ms: 500,
            retry_attempts: 3,
            retry_interval_ms: 500,
            section_render_ms: 500,
            section_timeout_ms: 10_000,
            listing_timeout_ms: 5_000,
            detail_frame_timeout_ms: 5_000,
            notice_timeout_ms: 10_000,
            captcha_acceptance_ms: 2_000,
            record_pause_ms: 300,
            snapshot_every: 10,
        }
    }
}

impl TimingConfig {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn settle_grace(&self) -> Duration {
        Duration::from_millis(self.settle_grace_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn section_render(&self) -> Duration {
        Duration::from_millis(self.section_render_ms)
    }

    pub fn section_timeout(&self) -> Duration {
        Duration::from_millis(self.section_timeout_ms)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_millis(self.listing_timeout_ms)
    }

    pub fn detail_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_frame_timeout_ms)
    }

    pub fn notice_timeout(&self) -> Duration {
        Duration::from_millis(self.notice_timeout_ms)
    }

    pub fn captcha_acceptance(&self) -> Duration {
        Duration::from_millis(self.captcha_acceptance_ms)
    }

    pub fn record_pause(&self) -> Duration {
        Duration::from_millis(self.record_pause_ms)
    }
}

// ===== 筛选规则 =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// 必须完全匹配的招标类型/程序
    pub procedure: String,
    /// 视为已取消的状态文本
    pub cancelled_status: String,
    /// 批准日期下限（含）
    pub approved_on_or_after: NaiveDate,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            procedure: "Yapım - Pazarlık - Pazarlık (MD 21 B)".to_string(),
            cancelled_status: "İhale İptal Edilmiş".to_string(),
            // 2023-02-06 地震日
            approved_on_or_after: NaiveDate::from_ymd_opt(2023, 2, 6).unwrap_or_default(),
        }
    }
}
