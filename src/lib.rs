// ==========================================
// EKAP 招标数据采集系统 - 核心库
// ==========================================
// 目标: 土耳其公共采购门户 EKAP 的可续跑多阶段采集管道
// 阶段: 发现 → 详情采集 → 清洗 → 筛选 → 导出
// 技术栈: Tokio + WebDriver + serde/JSON 检查点
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 配置文件与环境变量
pub mod config;

// 引擎层 - 会话驱动与阶段编排
pub mod engine;

// 转换层 - 清洗/筛选/导出
pub mod transform;

// 数据仓储层 - 阶段产物
pub mod repository;

// 适配层 - WebDriver / 验证码识别 / 终端
pub mod portal;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{AppConfig, ConfigManager};
pub use domain::{
    DetailRecord, DiscoveryEntry, FieldValue, FilterCriteria, PhaseKind, RecordIdentifier,
    RunContext, SectionKind, SentinelKind,
};
pub use engine::{AcquisitionError, AcquisitionResult, PipelineOrchestrator, RunSummary};
pub use repository::{ArtifactStore, PhaseArtifact};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "EKAP 招标数据采集系统";
