// ==========================================
// EKAP 招标数据采集系统 - 验证门
// ==========================================
// 职责: 检测公告浮层内的验证码, 自动识别或人工处理
// 顺序: (a) 自动: 截图 → 识别服务 → 回填 → 等待受理
//       (b) 人工: 自动关闭/失败/未配置时暂停, 等待操作员确认
// 规则: 人工等待无超时（强制超时会破坏交互状态）
//       解决后在 RunContext 上置位, 粘性范围可配置
// ==========================================

use crate::domain::{RecordIdentifier, RunContext, VerificationScope};
use crate::engine::error::{AcquisitionError, AcquisitionResult};
use crate::engine::session::{pause, SessionDriver};
use crate::engine::surface::Scope;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument, warn};

// ==========================================
// 识别服务接口
// ==========================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("识别服务请求失败: {0}")]
    Transport(String),

    #[error("识别服务拒绝: {0}")]
    Rejected(String),

    #[error("识别超时: 轮询 {0} 次仍未完成")]
    Timeout(u32),

    #[error("识别结果为空")]
    EmptyAnswer,
}

/// 验证码识别协作方
///
/// `submit(imageBytes) → recognizedText | failure`
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn submit(&self, image: &[u8]) -> Result<String, SolverError>;
}

// ==========================================
// 操作员通道
// ==========================================

/// 发给操作员的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPrompt {
    pub ikn: Option<RecordIdentifier>,
    pub message: String,
}

/// 操作员一侧的句柄: 接收提示、回送确认
pub struct OperatorHandle {
    pub prompts: mpsc::UnboundedReceiver<VerificationPrompt>,
    pub acks: mpsc::UnboundedSender<()>,
}

/// 采集一侧的操作员通道
///
/// 等待确认是无界的; 返回的 future 可以被丢弃以放弃等待（mpsc 接收是取消安全的）。
/// 确认通道关闭时返回 VerificationUnresolved。
pub struct OperatorChannel {
    prompts: mpsc::UnboundedSender<VerificationPrompt>,
    acks: Mutex<mpsc::UnboundedReceiver<()>>,
}

impl OperatorChannel {
    pub fn new() -> (Self, OperatorHandle) {
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        (
            Self {
                prompts: prompt_tx,
                acks: Mutex::new(ack_rx),
            },
            OperatorHandle {
                prompts: prompt_rx,
                acks: ack_tx,
            },
        )
    }

    /// 发出提示并等待操作员确认
    pub async fn request_acknowledgement(
        &self,
        prompt: VerificationPrompt,
    ) -> AcquisitionResult<()> {
        // 提示接收端已关闭不影响等待, 确认可能由其他途径送达
        if self.prompts.send(prompt).is_err() {
            warn!("操作员提示通道已关闭");
        }
        let mut acks = self.acks.lock().await;
        acks.recv().await.ok_or_else(|| {
            AcquisitionError::VerificationUnresolved("操作员确认通道已关闭".to_string())
        })
    }
}

// ==========================================
// 验证门结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// 本次运行已解决过, 未再检测
    AlreadyResolved,
    /// 未出现验证码
    NotChallenged,
    SolvedAutomatically,
    SolvedManually,
}

// ==========================================
// VerificationGate - 验证门
// ==========================================
pub struct VerificationGate {
    solver: Option<Arc<dyn CaptchaSolver>>,
    auto_solve: bool,
    operator: OperatorChannel,
    scope: VerificationScope,
}

impl VerificationGate {
    /// 创建验证门
    ///
    /// # 参数
    /// - solver: 识别服务（None 表示未配置）
    /// - auto_solve: 是否启用自动识别
    /// - operator: 人工处理通道
    /// - scope: 粘性范围
    pub fn new(
        solver: Option<Arc<dyn CaptchaSolver>>,
        auto_solve: bool,
        operator: OperatorChannel,
        scope: VerificationScope,
    ) -> Self {
        Self {
            solver,
            auto_solve,
            operator,
            scope,
        }
    }

    /// 通过验证门
    ///
    /// # 参数
    /// - notice: 公告浮层 iframe 作用域（验证码所在位置）
    ///
    /// # 返回
    /// - Ok(GateOutcome): 已通过
    /// - Err(VerificationUnresolved): 人工通道关闭, 无法继续
    #[instrument(skip(self, ctx, driver, notice), fields(run_id = %ctx.run_id))]
    pub async fn pass(
        &self,
        ctx: &mut RunContext,
        driver: &SessionDriver,
        notice: &Scope,
    ) -> AcquisitionResult<GateOutcome> {
        if self.scope == VerificationScope::Session && ctx.verification_resolved {
            return Ok(GateOutcome::AlreadyResolved);
        }

        let challenge = &driver.layout().challenge;
        let image = driver
            .surface()
            .locate(notice, &challenge.image)
            .await
            .map_err(|e| AcquisitionError::interaction("locate challenge", &e))?
            .into_iter()
            .next();
        let Some(image) = image else {
            return Ok(GateOutcome::NotChallenged);
        };
        info!(ikn = ?ctx.open_record, "检测到验证码");

        if let Some(solver) = self.automatic_solver() {
            match self.solve_automatically(driver, notice, &image, solver).await {
                Ok(()) => {
                    info!("验证码已自动提交");
                    ctx.verification_resolved = true;
                    return Ok(GateOutcome::SolvedAutomatically);
                }
                Err(e) => warn!(error = %e, "自动识别失败, 转人工处理"),
            }
        }

        self.operator
            .request_acknowledgement(VerificationPrompt {
                ikn: ctx.open_record.clone(),
                message: "请在浏览器中完成验证码, 然后回车继续…".to_string(),
            })
            .await?;
        info!("操作员已确认验证码");
        ctx.verification_resolved = true;
        Ok(GateOutcome::SolvedManually)
    }

    fn automatic_solver(&self) -> Option<&Arc<dyn CaptchaSolver>> {
        if self.auto_solve {
            self.solver.as_ref()
        } else {
            None
        }
    }

    async fn solve_automatically(
        &self,
        driver: &SessionDriver,
        notice: &Scope,
        image: &crate::engine::surface::ElementRef,
        solver: &Arc<dyn CaptchaSolver>,
    ) -> AcquisitionResult<()> {
        let surface = driver.surface();
        let challenge = &driver.layout().challenge;

        let bytes = surface
            .capture_image(image)
            .await
            .map_err(|e| AcquisitionError::interaction("capture challenge", &e))?;
        let answer = solver
            .submit(&bytes)
            .await
            .map_err(|e| AcquisitionError::VerificationUnresolved(e.to_string()))?;

        let input = driver.require(notice, &challenge.input).await?;
        surface
            .type_text(&input, &answer)
            .await
            .map_err(|e| AcquisitionError::interaction("type challenge answer", &e))?;
        driver
            .activate_selector(notice, &challenge.submit, "submit challenge")
            .await?;
        pause(driver.timing().captcha_acceptance()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operator_ack_resolves_wait() {
        let (channel, mut handle) = OperatorChannel::new();
        handle.acks.send(()).unwrap();
        let prompt = VerificationPrompt {
            ikn: None,
            message: "solve".to_string(),
        };
        channel.request_acknowledgement(prompt.clone()).await.unwrap();
        assert_eq!(handle.prompts.recv().await, Some(prompt));
    }

    #[tokio::test]
    async fn test_closed_ack_channel_is_unresolved() {
        let (channel, handle) = OperatorChannel::new();
        drop(handle);
        let err = channel
            .request_acknowledgement(VerificationPrompt {
                ikn: None,
                message: "solve".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::VerificationUnresolved(_)));
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let (channel, _handle) = OperatorChannel::new();
        let wait = channel.request_acknowledgement(VerificationPrompt {
            ikn: None,
            message: "solve".to_string(),
        });
        let timed = tokio::time::timeout(std::time::Duration::from_millis(20), wait).await;
        assert!(timed.is_err());
    }
}
