// ==========================================
// EKAP 招标数据采集系统 - 仓储层错误类型
// ==========================================
// 范围: 阶段产物与快照文件的读写、序列化
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 文件错误 =====
    #[error("产物不存在: {0}")]
    NotFound(String),

    #[error("文件读写失败 (path={path}): {message}")]
    Io { path: String, message: String },

    // ===== 数据错误 =====
    #[error("产物序列化失败 (path={path}): {message}")]
    Serialization { path: String, message: String },

    #[error("产物内容无效 (path={path}): {message}")]
    Corrupted { path: String, message: String },
}

impl RepositoryError {
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        RepositoryError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
