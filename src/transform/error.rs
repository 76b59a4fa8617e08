// ==========================================
// EKAP 招标数据采集系统 - 下游转换错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 转换模块错误类型
#[derive(Error, Debug)]
pub enum TransformError {
    // ===== 文件相关错误 =====
    #[error("导出目录创建失败 (path={path}): {message}")]
    DirectoryError { path: String, message: String },

    #[error("CSV 写入失败 (file={file}): {message}")]
    CsvWriteError { file: String, message: String },
}

impl TransformError {
    pub fn csv(file: &std::path::Path, err: impl std::fmt::Display) -> Self {
        TransformError::CsvWriteError {
            file: file.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type TransformResult<T> = Result<T, TransformError>;
