// ==========================================
// EKAP 招标数据采集系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含页面交互逻辑, 不含持久化逻辑
// ==========================================

pub mod record;
pub mod run_context;
pub mod types;

// 重导出核心类型
pub use record::{DetailRecord, DiscoveryEntry, FieldValue, Sentinel, SentinelKind};
pub use run_context::{FilterCriteria, RunContext};
pub use types::{IdentifierError, PhaseKind, RecordIdentifier, SectionKind, VerificationScope};
