// ==========================================
// EKAP 招标数据采集系统 - 2captcha 识别服务
// ==========================================
// 协议: in.php 提交 (method=base64, json=1) → res.php 轮询
// 轮询: 每 5 秒一次, 最多 24 次
// ==========================================

use crate::engine::verification::{CaptchaSolver, SolverError};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://2captcha.com";
pub const NOT_READY: &str = "CAPCHA_NOT_READY";

/// in.php / res.php 的统一响应
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: i32,
    request: String,
}

pub struct TwoCaptchaSolver {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl TwoCaptchaSolver {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SolverError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: &str, api_key: impl Into<String>) -> Result<Self, SolverError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SolverError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        })
    }

    /// 调整轮询参数
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, SolverError> {
        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| SolverError::Transport(format!("响应解析失败: {}", e)))
    }

    async fn upload(&self, image: &[u8]) -> Result<String, SolverError> {
        let body = base64::engine::general_purpose::STANDARD.encode(image);
        let form = [
            ("key", self.api_key.as_str()),
            ("method", "base64"),
            ("body", body.as_str()),
            ("json", "1"),
        ];
        let response = self
            .http
            .post(format!("{}/in.php", self.endpoint))
            .form(&form)
            .send()
            .await
            .map_err(|e| SolverError::Transport(e.to_string()))?;
        let parsed = Self::read(response).await?;
        if parsed.status != 1 {
            return Err(SolverError::Rejected(parsed.request));
        }
        Ok(parsed.request)
    }

    async fn poll(&self, task_id: &str) -> Result<String, SolverError> {
        let url = format!("{}/res.php", self.endpoint);
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", task_id),
                    ("json", "1"),
                ])
                .send()
                .await
                .map_err(|e| SolverError::Transport(e.to_string()))?;
            let parsed = Self::read(response).await?;

            match interpret(&parsed) {
                Some(result) => return result,
                None => debug!(task = task_id, attempt = attempt, "识别中"),
            }
        }
        Err(SolverError::Timeout(self.max_polls))
    }
}

/// 解析 res.php 响应
///
/// # 返回
/// - None: 尚未完成, 继续轮询
/// - Some(Ok(answer)) / Some(Err(..)): 轮询结束
fn interpret(parsed: &ApiResponse) -> Option<Result<String, SolverError>> {
    match (parsed.status, parsed.request.trim()) {
        (1, "") => Some(Err(SolverError::EmptyAnswer)),
        (1, answer) => Some(Ok(answer.to_string())),
        (_, NOT_READY) => None,
        (_, other) => Some(Err(SolverError::Rejected(other.to_string()))),
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaSolver {
    async fn submit(&self, image: &[u8]) -> Result<String, SolverError> {
        let task_id = self.upload(image).await?;
        info!(task = %task_id, "验证码已提交识别服务");
        self.poll(&task_id).await
    }
}
