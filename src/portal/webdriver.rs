// ==========================================
// EKAP 招标数据采集系统 - WebDriver 交互实现
// ==========================================
// 职责: 通过 W3C WebDriver 协议实现 PortalSurface
// 会话: 首次调用时惰性创建, shutdown 时删除
// 并发: 每次调用在互斥锁内完成 frame 切换与命令, 保证作用域一致
// 选择器: 默认 CSS, `xpath:` 前缀使用 XPath
// ==========================================

use crate::config::{AppConfig, ConfigError, ConfigResult};
use crate::engine::surface::{
    ElementRef, OptionChoice, PairQuery, PortalSurface, Scope, Settle, SurfaceError,
    SurfaceResult,
};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// W3C 元素引用键
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const SCRIPT_TIMEOUT_MS: u64 = 30_000;

// ===== 页面脚本 =====

const SETTLE_PROBE: &str = "return [document.readyState, \
    (window.jQuery ? window.jQuery.active : 0), \
    performance.getEntriesByType('resource').length];";

const SELECT_OPTION: &str = "const [sel, mode, wanted] = arguments; \
    const opt = Array.from(sel.options).find(o => mode === 'value' \
        ? o.value === wanted : o.text.trim() === wanted); \
    if (!opt) { return false; } \
    sel.value = opt.value; \
    sel.dispatchEvent(new Event('change', { bubbles: true })); \
    return true;";

const READ_PAIRS: &str = "const [rows, label, value] = arguments; \
    const text = (el) => el ? el.innerText.trim() : ''; \
    return Array.from(document.querySelectorAll(rows)) \
        .map(row => [text(row.querySelector(label)), text(row.querySelector(value))]) \
        .filter(pair => pair[0].length > 0);";

const READ_ROWS: &str = "const [rows] = arguments; \
    return Array.from(document.querySelectorAll(rows)).map(tr => \
        Array.from(tr.querySelectorAll('td')) \
            .map(td => td.innerText.trim()) \
            .filter(t => t.length > 0));";

const FETCH_JSON: &str = "const [url, done] = arguments; \
    fetch(url, { headers: { 'X-Requested-With': 'XMLHttpRequest' } }) \
        .then(res => res.text()) \
        .then(body => { \
            if (body.trim().startsWith('<')) { done(null); return; } \
            try { done(JSON.parse(body)); } catch (e) { done(null); } \
        }) \
        .catch(err => done({ __transportError: String(err) }));";

// ==========================================
// 辅助函数
// ==========================================

/// 选择器 → (定位策略, 表达式)
pub fn locator_strategy(selector: &str) -> (&'static str, &str) {
    match selector.strip_prefix("xpath:") {
        Some(xpath) => ("xpath", xpath),
        None => ("css selector", selector),
    }
}

fn element_json(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}

fn parse_elements(value: &Value, scope: &Scope) -> Vec<ElementRef> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                .map(|id| ElementRef::new(scope.clone(), id))
                .collect()
        })
        .unwrap_or_default()
}

/// WebDriver 错误响应 → SurfaceError
pub fn classify_error(value: &Value) -> SurfaceError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let detail = format!("{}: {}", code, message);
    match code {
        "no such element" | "no such frame" => SurfaceError::NoSuchElement(detail),
        "stale element reference" => SurfaceError::StaleElement(detail),
        "element click intercepted" | "element not interactable" | "invalid element state" => {
            SurfaceError::Interaction(detail)
        }
        "timeout" | "script timeout" => SurfaceError::Timeout(detail),
        "javascript error" => SurfaceError::Script(detail),
        _ => SurfaceError::Protocol(detail),
    }
}

/// 浏览器启动参数
pub fn capabilities(browser: &str, headless: bool) -> ConfigResult<Value> {
    match browser {
        "chrome" => {
            let mut args = vec!["--window-size=1920,1080", "--disable-gpu"];
            if headless {
                args.push("--headless=new");
            }
            Ok(json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } }))
        }
        "firefox" => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
            Ok(json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } }))
        }
        other => Err(ConfigError::InvalidValue {
            key: "portal.browser".to_string(),
            message: format!("不支持的浏览器: {}", other),
        }),
    }
}

// ==========================================
// WebDriverSurface
// ==========================================
pub struct WebDriverSurface {
    http: reqwest::Client,
    endpoint: String,
    capabilities: Value,
    session: OnceCell<String>,
    /// 当前聚焦的 frame 链; 锁同时串行化所有命令
    focus: Mutex<Option<Scope>>,
}

impl WebDriverSurface {
    /// 创建 WebDriver 交互实现（此时不连接, 首次调用时创建会话）
    ///
    /// # 参数
    /// - endpoint: WebDriver 服务地址（如 http://localhost:4444）
    /// - capabilities: 见 [`capabilities`]
    pub fn new(endpoint: &str, capabilities: Value) -> SurfaceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(SCRIPT_TIMEOUT_MS + 30_000))
            .build()
            .map_err(|e| SurfaceError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            capabilities,
            session: OnceCell::new(),
            focus: Mutex::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let caps = capabilities(&config.portal.browser, config.headless)?;
        Ok(Self::new(&config.portal.webdriver_url, caps)?)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> SurfaceResult<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.http.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }
        let response = request
            .send()
            .await
            .map_err(|e| SurfaceError::Transport(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SurfaceError::Protocol(format!("响应不是 JSON: {}", e)))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(classify_error(&value));
        }
        Ok(value)
    }

    async fn session_id(&self) -> SurfaceResult<&str> {
        let id = self
            .session
            .get_or_try_init(|| async {
                let body = json!({ "capabilities": { "alwaysMatch": self.capabilities } });
                let value = self.send(Method::POST, "/session", Some(body)).await?;
                let id = value
                    .get("sessionId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SurfaceError::Protocol("缺少 sessionId".to_string()))?
                    .to_string();
                self.send(
                    Method::POST,
                    &format!("/session/{}/timeouts", id),
                    Some(json!({ "script": SCRIPT_TIMEOUT_MS })),
                )
                .await?;
                info!(session = %id, "WebDriver 会话已创建");
                Ok::<_, SurfaceError>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> SurfaceResult<Value> {
        let session = self.session_id().await?;
        self.send(method, &format!("/session/{}{}", session, path), body)
            .await
    }

    /// 切换到目标作用域（调用方需持有 focus 锁）
    async fn focus_on(&self, current: &mut Option<Scope>, scope: &Scope) -> SurfaceResult<()> {
        if current.as_ref() == Some(scope) {
            return Ok(());
        }
        self.command(Method::POST, "/frame", Some(json!({ "id": null })))
            .await?;
        for frame in &scope.frames {
            self.command(Method::POST, "/frame", Some(json!({ "id": element_json(frame) })))
                .await?;
        }
        *current = Some(scope.clone());
        Ok(())
    }

    /// 在作用域内执行一条命令
    async fn scoped(
        &self,
        scope: &Scope,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SurfaceResult<Value> {
        let mut focus = self.focus.lock().await;
        if let Err(e) = self.focus_on(&mut focus, scope).await {
            *focus = None;
            return Err(e);
        }
        self.command(method, path, body).await
    }

    async fn execute(&self, scope: &Scope, script: &str, args: Vec<Value>) -> SurfaceResult<Value> {
        self.scoped(
            scope,
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn find(&self, scope: &Scope, selector: &str) -> SurfaceResult<Vec<ElementRef>> {
        let (using, value) = locator_strategy(selector);
        let found = self
            .scoped(
                scope,
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        Ok(parse_elements(&found, scope))
    }
}

#[async_trait]
impl PortalSurface for WebDriverSurface {
    async fn navigate(&self, url: &str) -> SurfaceResult<()> {
        let mut focus = self.focus.lock().await;
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        *focus = Some(Scope::page());
        debug!(url = url, "页面已打开");
        Ok(())
    }

    async fn locate(&self, scope: &Scope, selector: &str) -> SurfaceResult<Vec<ElementRef>> {
        self.find(scope, selector).await
    }

    async fn locate_in(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> SurfaceResult<Vec<ElementRef>> {
        let (using, value) = locator_strategy(selector);
        let found = self
            .scoped(
                &parent.scope,
                Method::POST,
                &format!("/element/{}/elements", parent.id),
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        Ok(parse_elements(&found, &parent.scope))
    }

    async fn wait_for(
        &self,
        scope: &Scope,
        selector: &str,
        timeout: Duration,
    ) -> SurfaceResult<Option<ElementRef>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(first) = self.find(scope, selector).await?.into_iter().next() {
                return Ok(Some(first));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn activate(&self, element: &ElementRef) -> SurfaceResult<()> {
        self.scoped(
            &element.scope,
            Method::POST,
            &format!("/element/{}/click", element.id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn wait_until_settled(&self, scope: &Scope, timeout: Duration) -> SurfaceResult<Settle> {
        let deadline = Instant::now() + timeout;
        let mut last_resources: Option<u64> = None;
        loop {
            let probe = self.execute(scope, SETTLE_PROBE, Vec::new()).await?;
            let ready = probe.get(0).and_then(Value::as_str) == Some("complete");
            let pending = probe.get(1).and_then(Value::as_u64).unwrap_or(0);
            let resources = probe.get(2).and_then(Value::as_u64);

            if ready && pending == 0 && resources.is_some() && resources == last_resources {
                return Ok(Settle::Quiesced);
            }
            if Instant::now() >= deadline {
                return Ok(Settle::TimedOut);
            }
            last_resources = resources;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn select_option(
        &self,
        scope: &Scope,
        selector: &str,
        choice: &OptionChoice,
    ) -> SurfaceResult<()> {
        let select = self
            .find(scope, selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SurfaceError::NoSuchElement(selector.to_string()))?;
        let (mode, wanted) = match choice {
            OptionChoice::Value(v) => ("value", v.as_str()),
            OptionChoice::Label(l) => ("label", l.as_str()),
        };
        let selected = self
            .execute(scope, SELECT_OPTION, vec![element_json(&select.id), json!(mode), json!(wanted)])
            .await?;
        if selected.as_bool() != Some(true) {
            return Err(SurfaceError::NoSuchElement(format!("{} 选项 {}", selector, wanted)));
        }
        Ok(())
    }

    async fn read_text(&self, element: &ElementRef) -> SurfaceResult<String> {
        let text = self
            .scoped(
                &element.scope,
                Method::GET,
                &format!("/element/{}/text", element.id),
                None,
            )
            .await?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    async fn read_label_pairs(
        &self,
        scope: &Scope,
        query: &PairQuery,
    ) -> SurfaceResult<Vec<(String, String)>> {
        let value = self
            .execute(
                scope,
                READ_PAIRS,
                vec![json!(query.rows), json!(query.label), json!(query.value)],
            )
            .await?;
        serde_json::from_value(value).map_err(|e| SurfaceError::Script(e.to_string()))
    }

    async fn read_rows(&self, scope: &Scope, rows: &str) -> SurfaceResult<Vec<Vec<String>>> {
        let value = self.execute(scope, READ_ROWS, vec![json!(rows)]).await?;
        serde_json::from_value(value).map_err(|e| SurfaceError::Script(e.to_string()))
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> SurfaceResult<()> {
        self.scoped(
            &element.scope,
            Method::POST,
            &format!("/element/{}/value", element.id),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn capture_image(&self, element: &ElementRef) -> SurfaceResult<Vec<u8>> {
        let encoded = self
            .scoped(
                &element.scope,
                Method::GET,
                &format!("/element/{}/screenshot", element.id),
                None,
            )
            .await?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| SurfaceError::Protocol("截图不是字符串".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SurfaceError::Protocol(e.to_string()))
    }

    async fn enter_frame(&self, frame: &ElementRef) -> SurfaceResult<Scope> {
        Ok(frame.scope.child(&frame.id))
    }

    async fn fetch_json(&self, url: &str) -> SurfaceResult<Value> {
        let value = self
            .scoped(
                &Scope::page(),
                Method::POST,
                "/execute/async",
                Some(json!({ "script": FETCH_JSON, "args": [url] })),
            )
            .await?;
        if let Some(err) = value.get("__transportError").and_then(Value::as_str) {
            return Err(SurfaceError::Transport(err.to_string()));
        }
        Ok(value)
    }

    async fn shutdown(&self) -> SurfaceResult<()> {
        let Some(id) = self.session.get() else {
            return Ok(());
        };
        let _focus = self.focus.lock().await;
        match self.send(Method::DELETE, &format!("/session/{}", id), None).await {
            Ok(_) => {
                info!(session = %id, "WebDriver 会话已关闭");
                Ok(())
            }
            Err(e) => {
                warn!(session = %id, error = %e, "关闭 WebDriver 会话失败");
                Err(e)
            }
        }
    }
}
