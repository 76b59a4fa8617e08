// ==========================================
// EKAP 招标数据采集系统 - 终端操作员控制台
// ==========================================
// 职责: 把验证提示打印到终端, 读取一行输入作为确认
// 规则: 标准输入关闭后丢弃确认发送端, 等待方得到 VerificationUnresolved
// ==========================================

use crate::engine::verification::{OperatorHandle, VerificationPrompt};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

fn render(prompt: &VerificationPrompt) -> String {
    match &prompt.ikn {
        Some(ikn) => format!("🛑 [{}] {}", ikn, prompt.message),
        None => format!("🛑 {}", prompt.message),
    }
}

/// 处理提示直到任一通道关闭
///
/// # 参数
/// - input: 确认输入源（每行一次确认）
pub async fn serve<R>(handle: OperatorHandle, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let OperatorHandle { mut prompts, acks } = handle;
    let mut lines = input.lines();

    while let Some(prompt) = prompts.recv().await {
        println!("{}", render(&prompt));
        let _ = std::io::stdout().flush();

        match lines.next_line().await {
            Ok(Some(_)) => {
                info!(ikn = ?prompt.ikn, "收到操作员确认");
                if acks.send(()).is_err() {
                    break;
                }
            }
            Ok(None) => {
                warn!("标准输入已关闭, 无法继续人工验证");
                break;
            }
            Err(e) => {
                warn!(error = %e, "读取操作员输入失败");
                break;
            }
        }
    }
}

/// 在后台任务中挂接终端
pub fn spawn(handle: OperatorHandle) -> JoinHandle<()> {
    tokio::spawn(serve(handle, BufReader::new(tokio::io::stdin())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordIdentifier;
    use crate::engine::verification::OperatorChannel;

    #[tokio::test]
    async fn test_each_line_acknowledges_one_prompt() {
        let (channel, handle) = OperatorChannel::new();
        let task = tokio::spawn(serve(handle, BufReader::new(&b"\n"[..])));

        let prompt = VerificationPrompt {
            ikn: Some(RecordIdentifier::parse("2023/5").unwrap()),
            message: "press enter".to_string(),
        };
        channel.request_acknowledgement(prompt.clone()).await.unwrap();

        // 输入耗尽后第二次等待失败
        let second = channel.request_acknowledgement(prompt).await;
        assert!(second.is_err());
        task.await.unwrap();
    }
}
