// ==========================================
// EKAP 招标数据采集系统 - 配置层
// ==========================================
// 职责: 配置文件加载、环境变量覆写、校验
// 存储: config.json
// ==========================================

pub mod app_config;
pub mod config_manager;
pub mod error;

// 重导出核心配置类型
pub use app_config::{
    AppConfig, CaptchaConfig, FilterConfig, PortalConfig, SearchConfig, TimingConfig,
    API_KEY_PLACEHOLDER,
};
pub use config_manager::{config_keys, ConfigManager, ENV_CAPTCHA_API_KEY};
pub use error::{ConfigError, ConfigResult};
