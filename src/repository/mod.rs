// ==========================================
// EKAP 招标数据采集系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 阶段产物的持久化, 屏蔽文件布局细节
// ==========================================

pub mod artifact_store;
pub mod error;

pub use artifact_store::{ArtifactStore, PhaseArtifact, SNAPSHOT_FILE};
pub use error::{RepositoryError, RepositoryResult};
