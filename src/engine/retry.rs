// ==========================================
// EKAP 招标数据采集系统 - 重试策略
// ==========================================
// 规则: 固定间隔、固定次数, 无指数退避也无抖动
// 说明: 单会话顺序交互, 不存在并发争用
// ==========================================

use crate::config::TimingConfig;
use crate::engine::error::AcquisitionError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

// ==========================================
// RetryPolicy - 重试策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.retry_attempts, timing.retry_interval())
    }

    /// 执行带重试的交互
    ///
    /// # 参数
    /// - action: 交互描述（用于日志与错误）
    /// - op: 每次调用产生一次新的尝试
    ///
    /// # 返回
    /// - Ok(T): 某次尝试成功
    /// - Err(InteractionFailed): 全部尝试失败, 携带最后一次的错误信息
    pub async fn run<T, E, F, Fut>(&self, action: &str, mut op: F) -> Result<T, AcquisitionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(action = action, attempt = attempt, "重试后成功");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(action = action, attempts = attempt, error = %e, "重试次数耗尽");
                    return Err(AcquisitionError::InteractionFailed {
                        action: action.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    debug!(action = action, attempt = attempt, error = %e, "交互失败, 等待重试");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
