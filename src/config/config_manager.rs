// ==========================================
// EKAP 招标数据采集系统 - 配置管理器
// ==========================================
// 职责: 配置加载、环境变量覆写、校验、按键查询
// 存储: config.json
// ==========================================

use crate::config::app_config::AppConfig;
use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::FilterCriteria;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// 覆写 captcha.apiKey 的环境变量
pub const ENV_CAPTCHA_API_KEY: &str = "EKAP_CAPTCHA_API_KEY";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    // 覆写后配置的 JSON 视图, 用于按点分键查询
    snapshot: Value,
}

impl ConfigManager {
    /// 从配置文件加载
    ///
    /// # 流程
    /// 1. 读取并解析 JSON
    /// 2. 应用环境变量覆写
    /// 3. 校验
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(shown));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: shown.clone(),
            message: e.to_string(),
        })?;

        let mut config: AppConfig = serde_json::from_str(&raw)?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());

        let manager = Self::from_config(config)?;
        info!(path = %shown, data_dir = %manager.config.data_dir.display(), "配置加载完成");
        Ok(manager)
    }

    /// 从 JSON 字符串创建（不应用环境变量）
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: AppConfig = serde_json::from_str(raw)?;
        Self::from_config(config)
    }

    /// 从已有配置创建
    pub fn from_config(config: AppConfig) -> ConfigResult<Self> {
        validate(&config)?;
        let snapshot = serde_json::to_value(&config)?;
        Ok(Self { config, snapshot })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 按点分键读取配置值（如 `search.year`）
    ///
    /// # 返回
    /// - Some(String): 标量值的文本形式
    /// - None: 键不存在或值为 null
    pub fn get_value(&self, key: &str) -> Option<String> {
        let pointer = format!("/{}", key.replace('.', "/"));
        let value = self.snapshot.pointer(&pointer)?;
        debug!(key = key, "读取配置项");
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// 列表页检索条件
    pub fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            year: self.config.search.year,
            region_label: self.config.search.region_label.clone(),
            category_label: self.config.search.category_label.clone(),
        }
    }
}

/// 应用环境变量覆写
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_CAPTCHA_API_KEY).filter(|k| !k.trim().is_empty()) {
        config.captcha.api_key = Some(key);
    }
}

fn validate(config: &AppConfig) -> ConfigResult<()> {
    if !(2000..=2100).contains(&config.search.year) {
        return Err(invalid(config_keys::SEARCH_YEAR, "年份必须在 2000..=2100"));
    }
    if config.search.region_label.trim().is_empty() {
        return Err(invalid(config_keys::SEARCH_REGION_LABEL, "省份标签不能为空"));
    }
    if config.data_dir.as_os_str().is_empty() {
        return Err(invalid(config_keys::DATA_DIR, "数据目录不能为空"));
    }
    if config.timing.retry_attempts == 0 {
        return Err(invalid(config_keys::TIMING_RETRY_ATTEMPTS, "重试次数至少为 1"));
    }
    if config.timing.snapshot_every == 0 {
        return Err(invalid(config_keys::TIMING_SNAPSHOT_EVERY, "快照间隔至少为 1"));
    }
    Ok(())
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 检索条件
    pub const SEARCH_YEAR: &str = "search.year";
    pub const SEARCH_REGION_ID: &str = "search.regionId";
    pub const SEARCH_REGION_LABEL: &str = "search.regionLabel";
    pub const SEARCH_CATEGORY: &str = "search.category";
    pub const SEARCH_CATEGORY_LABEL: &str = "search.categoryLabel";
    pub const SEARCH_TAB_ID: &str = "search.tabId";
    pub const SEARCH_MAX_PAGES: &str = "search.maxPages";

    // 会话
    pub const HEADLESS: &str = "headless";
    pub const DATA_DIR: &str = "dataDir";

    // 验证码
    pub const CAPTCHA_AUTO_SOLVE: &str = "captcha.autoSolve";
    pub const CAPTCHA_API_KEY: &str = "captcha.apiKey";
    pub const CAPTCHA_STICKINESS: &str = "captcha.stickiness";

    // 门户
    pub const PORTAL_BASE_URL: &str = "portal.baseUrl";
    pub const PORTAL_SEARCH_DATA_URL: &str = "portal.searchDataUrl";
    pub const PORTAL_WEBDRIVER_URL: &str = "portal.webdriverUrl";

    // 时序
    pub const TIMING_RETRY_ATTEMPTS: &str = "timing.retryAttempts";
    pub const TIMING_SNAPSHOT_EVERY: &str = "timing.snapshotEvery";

    // 筛选
    pub const FILTER_PROCEDURE: &str = "filter.procedure";
    pub const FILTER_CANCELLED_STATUS: &str = "filter.cancelledStatus";
    pub const FILTER_APPROVED_ON_OR_AFTER: &str = "filter.approvedOnOrAfter";
}
