// ==========================================
// EKAP 招标数据采集系统 - 页面交互能力接口
// ==========================================
// 职责: 定义与具体自动化机制无关的交互能力 (navigate/locate/activate/settle)
// 实现者: portal::WebDriverSurface（生产）, 测试中的脚本化门户
// 红线: 会话驱动层只依赖此 trait, 不依赖任何具体浏览器协议
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ==========================================
// SurfaceError - 交互层错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("连接自动化服务失败: {0}")]
    Transport(String),

    #[error("元素不存在: {0}")]
    NoSuchElement(String),

    #[error("元素已失效: {0}")]
    StaleElement(String),

    #[error("交互未完成: {0}")]
    Interaction(String),

    #[error("等待超时: {0}")]
    Timeout(String),

    #[error("页面脚本执行失败: {0}")]
    Script(String),

    #[error("协议响应异常: {0}")]
    Protocol(String),
}

/// Result 类型别名
pub type SurfaceResult<T> = Result<T, SurfaceError>;

// ==========================================
// Scope / ElementRef
// ==========================================

/// 交互作用域: 从顶层文档出发的嵌套 frame 链
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Scope {
    pub frames: Vec<String>,
}

impl Scope {
    /// 顶层文档
    pub fn page() -> Self {
        Self::default()
    }

    pub fn is_page(&self) -> bool {
        self.frames.is_empty()
    }

    /// 进入子 frame 后的作用域
    pub fn child(&self, frame_id: &str) -> Self {
        let mut frames = self.frames.clone();
        frames.push(frame_id.to_string());
        Self { frames }
    }
}

/// 元素句柄，记录其所在作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub scope: Scope,
    pub id: String,
}

impl ElementRef {
    pub fn new(scope: Scope, id: impl Into<String>) -> Self {
        Self {
            scope,
            id: id.into(),
        }
    }
}

// ==========================================
// 辅助类型
// ==========================================

/// 下拉框选项的选择方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChoice {
    Value(String),
    Label(String),
}

/// 静止等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Quiesced,
    TimedOut,
}

/// 标签/值表格的读取描述
///
/// `rows` 选出每一行, `label` / `value` 在行内选出标签单元与值单元。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairQuery {
    pub rows: String,
    pub label: String,
    pub value: String,
}

// ==========================================
// PortalSurface Trait
// ==========================================
// 选择器默认为 CSS, 以 `xpath:` 前缀表示 XPath
#[async_trait]
pub trait PortalSurface: Send + Sync {
    /// 打开地址并等待文档加载
    async fn navigate(&self, url: &str) -> SurfaceResult<()>;

    /// 在作用域内查找所有匹配元素（可能为空）
    async fn locate(&self, scope: &Scope, selector: &str) -> SurfaceResult<Vec<ElementRef>>;

    /// 在元素内部查找匹配元素
    async fn locate_in(&self, parent: &ElementRef, selector: &str)
        -> SurfaceResult<Vec<ElementRef>>;

    /// 等待元素出现
    ///
    /// # 返回
    /// - Some(ElementRef): 超时前出现的第一个元素
    /// - None: 超时仍未出现
    async fn wait_for(
        &self,
        scope: &Scope,
        selector: &str,
        timeout: Duration,
    ) -> SurfaceResult<Option<ElementRef>>;

    /// 激活元素（点击）
    async fn activate(&self, element: &ElementRef) -> SurfaceResult<()>;

    /// 等待作用域内异步活动静止，最多等待 timeout
    async fn wait_until_settled(&self, scope: &Scope, timeout: Duration) -> SurfaceResult<Settle>;

    /// 选择下拉框选项并触发 change 事件
    async fn select_option(
        &self,
        scope: &Scope,
        selector: &str,
        choice: &OptionChoice,
    ) -> SurfaceResult<()>;

    /// 元素可见文本
    async fn read_text(&self, element: &ElementRef) -> SurfaceResult<String>;

    /// 读取标签/值表格
    async fn read_label_pairs(
        &self,
        scope: &Scope,
        query: &PairQuery,
    ) -> SurfaceResult<Vec<(String, String)>>;

    /// 读取表格行（每行为非空单元格文本列表）
    async fn read_rows(&self, scope: &Scope, rows: &str) -> SurfaceResult<Vec<Vec<String>>>;

    /// 向输入框键入文本
    async fn type_text(&self, element: &ElementRef, text: &str) -> SurfaceResult<()>;

    /// 元素截图（PNG 字节）
    async fn capture_image(&self, element: &ElementRef) -> SurfaceResult<Vec<u8>>;

    /// 进入 iframe 元素对应的嵌套文档
    async fn enter_frame(&self, frame: &ElementRef) -> SurfaceResult<Scope>;

    /// 在页面上下文中请求 JSON（携带会话 cookie）
    async fn fetch_json(&self, url: &str) -> SurfaceResult<serde_json::Value>;

    /// 结束会话
    async fn shutdown(&self) -> SurfaceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_child_chain() {
        let page = Scope::page();
        assert!(page.is_page());
        let detail = page.child("frame-1");
        let notice = detail.child("frame-2");
        assert_eq!(notice.frames, vec!["frame-1".to_string(), "frame-2".to_string()]);
        assert!(page.is_page());
    }
}
