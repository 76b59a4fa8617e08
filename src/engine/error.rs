// ==========================================
// EKAP 招标数据采集系统 - 采集错误类型
// ==========================================
// 分类: NotFound / InteractionFailed / SectionUnavailable
//       VerificationUnresolved / FatalIo
// 规则: 记录级错误跳过该记录并记录日志, 其余错误终止运行
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::SectionKind;
use crate::engine::surface::SurfaceError;
use crate::repository::RepositoryError;
use crate::transform::TransformError;
use thiserror::Error;

/// 采集错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    // ===== 记录级（跳过记录, 继续运行）=====
    #[error("目标未找到: {target}（当前可见 {} 项）", visible.len())]
    NotFound {
        target: String,
        /// 未命中时当前可见的规范化编号, 用于离线诊断
        visible: Vec<String>,
    },

    #[error("交互失败: {action}（尝试 {attempts} 次）: {message}")]
    InteractionFailed {
        action: String,
        attempts: u32,
        message: String,
    },

    #[error("子区块不可用: {section}: {reason}")]
    SectionUnavailable { section: SectionKind, reason: String },

    // ===== 运行级（终止运行）=====
    #[error("验证未解决: {0}")]
    VerificationUnresolved(String),

    #[error("阶段产物读写失败: {0}")]
    FatalIo(String),
}

impl AcquisitionError {
    pub fn not_found(target: impl Into<String>) -> Self {
        AcquisitionError::NotFound {
            target: target.into(),
            visible: Vec::new(),
        }
    }

    /// 单次交互失败（尚未重试）
    pub fn interaction(action: &str, err: &SurfaceError) -> Self {
        AcquisitionError::InteractionFailed {
            action: action.to_string(),
            attempts: 1,
            message: err.to_string(),
        }
    }

    /// 是否只影响当前记录
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            AcquisitionError::NotFound { .. }
                | AcquisitionError::InteractionFailed { .. }
                | AcquisitionError::SectionUnavailable { .. }
        )
    }

    /// 错误类别标识（日志字段）
    pub fn kind(&self) -> &'static str {
        match self {
            AcquisitionError::NotFound { .. } => "NOT_FOUND",
            AcquisitionError::InteractionFailed { .. } => "INTERACTION_FAILED",
            AcquisitionError::SectionUnavailable { .. } => "SECTION_UNAVAILABLE",
            AcquisitionError::VerificationUnresolved(_) => "VERIFICATION_UNRESOLVED",
            AcquisitionError::FatalIo(_) => "FATAL_IO",
        }
    }
}

// 实现 From<RepositoryError>: 产物读写失败一律视为致命
impl From<RepositoryError> for AcquisitionError {
    fn from(err: RepositoryError) -> Self {
        AcquisitionError::FatalIo(err.to_string())
    }
}

impl From<TransformError> for AcquisitionError {
    fn from(err: TransformError) -> Self {
        AcquisitionError::FatalIo(err.to_string())
    }
}

/// Result 类型别名
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_scoped_classification() {
        assert!(AcquisitionError::not_found("2023/1").is_record_scoped());
        assert!(AcquisitionError::interaction("click", &SurfaceError::Timeout("x".into()))
            .is_record_scoped());
        assert!(AcquisitionError::SectionUnavailable {
            section: SectionKind::Contract,
            reason: "tab missing".into(),
        }
        .is_record_scoped());
        assert!(!AcquisitionError::VerificationUnresolved("closed".into()).is_record_scoped());
        assert!(!AcquisitionError::FatalIo("disk full".into()).is_record_scoped());
    }

    #[test]
    fn test_not_found_message_counts_visible() {
        let err = AcquisitionError::NotFound {
            target: "2023/10".into(),
            visible: vec!["2023/11".into(), "2023/12".into()],
        };
        assert!(err.to_string().contains("2023/10"));
        assert!(err.to_string().contains('2'));
        assert_eq!(err.kind(), "NOT_FOUND");
    }
}
