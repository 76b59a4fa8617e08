// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 脚本化门户 (FakePortal)、测试配置、验证门装配、计数阶段
// 说明: FakePortal 按 PortalLayout::default() 的选择器应答, 不启动浏览器
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use ekap_harvest::config::{AppConfig, ConfigManager, TimingConfig};
use ekap_harvest::domain::{DetailRecord, DiscoveryEntry, RecordIdentifier, RunContext, VerificationScope};
use ekap_harvest::engine::{
    CaptchaSolver, DetailPhase, DiscoveryPhase, ElementRef, FetchReport, OperatorChannel,
    OptionChoice, PairQuery, PortalLayout, PortalSurface, Scope, SessionDriver, Settle,
    SolverError, SurfaceError, SurfaceResult, VerificationGate,
};
use ekap_harvest::repository::ArtifactStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DETAIL_FRAME: &str = "detail-frame";
pub const NOTICE_FRAME: &str = "notice-frame";

// ==========================================
// 测试配置
// ==========================================

pub fn test_config() -> AppConfig {
    let manager = ConfigManager::from_json_str(
        r#"{
            "search": { "year": 2023, "regionId": 31, "regionLabel": "HATAY" },
            "dataDir": "data"
        }"#,
    )
    .unwrap();
    let mut config = manager.into_config();
    config.timing = immediate_timing();
    config
}

/// 所有等待归零的时序
pub fn immediate_timing() -> TimingConfig {
    TimingConfig {
        settle_timeout_ms: 10,
        settle_grace_ms: 0,
        retry_attempts: 3,
        retry_interval_ms: 0,
        section_render_ms: 0,
        section_timeout_ms: 10,
        listing_timeout_ms: 10,
        detail_frame_timeout_ms: 10,
        notice_timeout_ms: 10,
        captcha_acceptance_ms: 0,
        record_pause_ms: 0,
        snapshot_every: 10,
    }
}

pub fn ikn(raw: &str) -> RecordIdentifier {
    RecordIdentifier::parse(raw).unwrap()
}

pub fn entries(ids: &[&str]) -> Vec<DiscoveryEntry> {
    ids.iter().map(|id| DiscoveryEntry::new(ikn(id))).collect()
}

// ==========================================
// FakeDetail - 详情浮层内容
// ==========================================

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(l, v)| (l.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct FakeDetail {
    /// 为 false 时招标信息页签不存在
    pub general_rendered: bool,
    pub general: Vec<(String, String)>,
    pub administrative: Vec<(String, String)>,
    pub contract: Option<Vec<(String, String)>>,
    pub notice: Option<Vec<Vec<String>>>,
}

impl FakeDetail {
    /// 满足默认筛选规则的完整详情
    pub fn complete(title: &str) -> Self {
        Self {
            general_rendered: true,
            general: pairs(&[
                ("İşin Adı", title),
                ("İhale Türü - Usulü", "Yapım - Pazarlık - Pazarlık (MD 21 B)"),
                ("İhale Durumu", "Sonuçlanmış"),
                ("İhale Onay Tarihi", "15.02.2023"),
                ("Yaklaşık Maliyet", "1.000.000,00 TRY"),
                ("İhale Yeri ve Tarihi", "Antakya - 20.02.2023 10:00"),
            ]),
            administrative: pairs(&[
                ("İdare Adı", "ANTAKYA BELEDİYESİ"),
                ("Bağlı Olduğu En Üst İdare", "İÇİŞLERİ BAKANLIĞI"),
                ("Bağlı Olduğu İdare", "HATAY VALİLİĞİ"),
            ]),
            contract: Some(pairs(&[("Sözleşme Bedeli", "900.000,00 TRY")])),
            notice: Some(vec![
                vec!["En Düşük Teklif".to_string(), "800.000,00 TRY".to_string()],
                vec!["En Yüksek Teklif".to_string(), "1.200.000,00 TRY".to_string()],
                vec!["Tek hücre".to_string()],
            ]),
        }
    }

    pub fn without_contract(mut self) -> Self {
        self.contract = None;
        self
    }

    pub fn without_general_tab(mut self) -> Self {
        self.general_rendered = false;
        self
    }

    pub fn without_notice(mut self) -> Self {
        self.notice = None;
        self
    }
}

/// 验证码出现方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaMode {
    Never,
    /// 解决一次后不再出现
    UntilSolved,
    /// 每次打开公告都出现
    EveryNotice,
}

struct FakeCard {
    label: String,
    ikn: String,
    open_failures: u32,
}

struct FakeState {
    cards: Vec<FakeCard>,
    details: HashMap<String, FakeDetail>,
    pages: Vec<Value>,
    captcha: CaptchaMode,
    captcha_solved: bool,
    captcha_pending: bool,
    open: Option<String>,
    notice_open: bool,
    typed: Vec<String>,
    clicks: HashMap<String, usize>,
    open_attempts: HashMap<String, usize>,
    selections: Vec<OptionChoice>,
    navigations: usize,
    fetch_calls: usize,
    challenge_checks: usize,
    settles: usize,
    shutdown: bool,
}

// ==========================================
// FakePortal - 脚本化门户
// ==========================================
pub struct FakePortal {
    layout: PortalLayout,
    state: Mutex<FakeState>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self {
            layout: PortalLayout::default(),
            state: Mutex::new(FakeState {
                cards: Vec::new(),
                details: HashMap::new(),
                pages: Vec::new(),
                captcha: CaptchaMode::Never,
                captcha_solved: false,
                captcha_pending: false,
                open: None,
                notice_open: false,
                typed: Vec::new(),
                clicks: HashMap::new(),
                open_attempts: HashMap::new(),
                selections: Vec::new(),
                navigations: 0,
                fetch_calls: 0,
                challenge_checks: 0,
                settles: 0,
                shutdown: false,
            }),
        }
    }

    // ===== 场景构造 =====

    /// 添加结果卡片, label 为卡片上显示的原始文本
    pub fn with_card(self, label: &str, detail: FakeDetail) -> Self {
        self.with_failing_card(label, detail, 0)
    }

    /// 添加前 failures 次点击详情按钮都会失败的卡片
    pub fn with_failing_card(self, label: &str, detail: FakeDetail, failures: u32) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = RecordIdentifier::normalize(label);
            state.cards.push(FakeCard {
                label: label.to_string(),
                ikn: id.clone(),
                open_failures: failures,
            });
            state.details.insert(id, detail);
        }
        self
    }

    pub fn with_captcha(self, mode: CaptchaMode) -> Self {
        self.state.lock().unwrap().captcha = mode;
        self
    }

    /// 检索接口分页（第 i 页返回 pages[i-1], 之后为空页）
    pub fn with_pages(self, pages: Vec<Value>) -> Self {
        self.state.lock().unwrap().pages = pages;
        self
    }

    /// 操作员在浏览器中手工完成验证码
    pub fn solve_captcha_manually(&self) {
        let mut state = self.state.lock().unwrap();
        state.captcha_pending = false;
        state.captcha_solved = true;
    }

    // ===== 观测 =====

    pub fn clicks(&self, element: &str) -> usize {
        *self.state.lock().unwrap().clicks.get(element).unwrap_or(&0)
    }

    pub fn open_attempts(&self, ikn: &str) -> usize {
        *self.state.lock().unwrap().open_attempts.get(ikn).unwrap_or(&0)
    }

    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn selections(&self) -> Vec<OptionChoice> {
        self.state.lock().unwrap().selections.clone()
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().unwrap().navigations
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn challenge_checks(&self) -> usize {
        self.state.lock().unwrap().challenge_checks
    }

    /// 静止等待被调用的次数
    pub fn settles(&self) -> usize {
        self.state.lock().unwrap().settles
    }

    pub fn is_detail_open(&self) -> bool {
        self.state.lock().unwrap().open.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }

    // ===== 内部 =====

    fn detail_scope() -> Scope {
        Scope::page().child(DETAIL_FRAME)
    }

    fn notice_scope() -> Scope {
        Scope::page().child(NOTICE_FRAME)
    }

    fn open_detail(state: &FakeState) -> Option<&FakeDetail> {
        state.open.as_ref().and_then(|id| state.details.get(id))
    }

    fn resolve(&self, state: &mut FakeState, scope: &Scope, selector: &str) -> Vec<String> {
        let l = &self.layout;
        let found = |cond: bool, id: &str| if cond { vec![id.to_string()] } else { Vec::new() };

        if scope.is_page() {
            if selector == l.listing_card {
                return (0..state.cards.len()).map(|i| format!("card:{}", i)).collect();
            }
            if selector == l.search_button {
                return vec!["search".to_string()];
            }
            if selector.starts_with("xpath://label") {
                return vec!["category".to_string()];
            }
            if selector == l.detail_frame || selector == l.detail_close {
                let id = if selector == l.detail_frame { DETAIL_FRAME } else { "detail-close" };
                return found(state.open.is_some(), id);
            }
            if selector == l.notice.frame {
                return found(state.notice_open, NOTICE_FRAME);
            }
            if selector == l.notice.close {
                return found(state.notice_open, "notice-close");
            }
            return Vec::new();
        }

        if *scope == Self::detail_scope() {
            let Some(detail) = Self::open_detail(state) else {
                return Vec::new();
            };
            let has_general = detail.general_rendered;
            let has_contract = detail.contract.is_some();
            let has_notice = detail.notice.is_some();
            return match selector {
                s if s == l.general.tab => found(has_general, "tab:general"),
                s if s == l.general.ready => found(has_general, "ready:general"),
                s if s == l.administrative.tab => vec!["tab:administrative".to_string()],
                s if s == l.administrative.ready => vec!["ready:administrative".to_string()],
                s if s == l.contract.tab => found(has_contract, "tab:contract"),
                s if s == l.contract.ready => found(has_contract, "ready:contract"),
                s if s == l.notice.tab => vec!["tab:notice".to_string()],
                s if s == l.notice.link => found(has_notice, "notice-link"),
                _ => Vec::new(),
            };
        }

        if *scope == Self::notice_scope() && state.notice_open {
            return match selector {
                s if s == l.challenge.image => {
                    state.challenge_checks += 1;
                    found(state.captcha_pending, "captcha-img")
                }
                s if s == l.challenge.input => vec!["captcha-input".to_string()],
                s if s == l.challenge.submit => vec!["captcha-submit".to_string()],
                s if s == l.notice.table => found(!state.captcha_pending, "notice-table"),
                _ => Vec::new(),
            };
        }
        Vec::new()
    }
}

impl Default for FakePortal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortalSurface for FakePortal {
    async fn navigate(&self, _url: &str) -> SurfaceResult<()> {
        self.state.lock().unwrap().navigations += 1;
        Ok(())
    }

    async fn locate(&self, scope: &Scope, selector: &str) -> SurfaceResult<Vec<ElementRef>> {
        let mut state = self.state.lock().unwrap();
        Ok(self
            .resolve(&mut state, scope, selector)
            .into_iter()
            .map(|id| ElementRef::new(scope.clone(), id))
            .collect())
    }

    async fn locate_in(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> SurfaceResult<Vec<ElementRef>> {
        let Some(idx) = parent.id.strip_prefix("card:") else {
            return Ok(Vec::new());
        };
        let id = if selector == self.layout.listing_identifier {
            format!("card-label:{}", idx)
        } else if selector == self.layout.listing_open {
            format!("card-open:{}", idx)
        } else {
            return Ok(Vec::new());
        };
        Ok(vec![ElementRef::new(parent.scope.clone(), id)])
    }

    async fn wait_for(
        &self,
        scope: &Scope,
        selector: &str,
        _timeout: Duration,
    ) -> SurfaceResult<Option<ElementRef>> {
        Ok(self.locate(scope, selector).await?.into_iter().next())
    }

    async fn activate(&self, element: &ElementRef) -> SurfaceResult<()> {
        let mut state = self.state.lock().unwrap();
        *state.clicks.entry(element.id.clone()).or_insert(0) += 1;

        if let Some(idx) = element.id.strip_prefix("card-open:") {
            let idx: usize = idx.parse().unwrap();
            let ikn = state.cards[idx].ikn.clone();
            *state.open_attempts.entry(ikn.clone()).or_insert(0) += 1;
            let card = &mut state.cards[idx];
            if card.open_failures > 0 {
                card.open_failures -= 1;
                return Err(SurfaceError::Interaction("element click intercepted".to_string()));
            }
            state.open = Some(ikn);
            return Ok(());
        }

        match element.id.as_str() {
            "detail-close" => {
                state.open = None;
                state.notice_open = false;
            }
            "notice-link" => {
                state.notice_open = true;
                state.captcha_pending = match state.captcha {
                    CaptchaMode::Never => false,
                    CaptchaMode::UntilSolved => !state.captcha_solved,
                    CaptchaMode::EveryNotice => true,
                };
            }
            "notice-close" => state.notice_open = false,
            "captcha-submit" => {
                state.captcha_pending = false;
                state.captcha_solved = true;
            }
            _ => {}
        }
        Ok(())
    }

    async fn wait_until_settled(&self, _scope: &Scope, _timeout: Duration) -> SurfaceResult<Settle> {
        self.state.lock().unwrap().settles += 1;
        Ok(Settle::Quiesced)
    }

    async fn select_option(
        &self,
        _scope: &Scope,
        _selector: &str,
        choice: &OptionChoice,
    ) -> SurfaceResult<()> {
        self.state.lock().unwrap().selections.push(choice.clone());
        Ok(())
    }

    async fn read_text(&self, element: &ElementRef) -> SurfaceResult<String> {
        let state = self.state.lock().unwrap();
        element
            .id
            .strip_prefix("card-label:")
            .and_then(|idx| idx.parse::<usize>().ok())
            .and_then(|idx| state.cards.get(idx))
            .map(|card| card.label.clone())
            .ok_or_else(|| SurfaceError::StaleElement(element.id.clone()))
    }

    async fn read_label_pairs(
        &self,
        scope: &Scope,
        query: &PairQuery,
    ) -> SurfaceResult<Vec<(String, String)>> {
        let state = self.state.lock().unwrap();
        let detail = match Self::open_detail(&state) {
            Some(detail) if *scope == Self::detail_scope() => detail,
            _ => return Ok(Vec::new()),
        };
        let l = &self.layout;
        Ok(if *query == l.general.pairs {
            detail.general.clone()
        } else if *query == l.administrative.pairs {
            detail.administrative.clone()
        } else if *query == l.contract.pairs {
            detail.contract.clone().unwrap_or_default()
        } else {
            Vec::new()
        })
    }

    async fn read_rows(&self, scope: &Scope, rows: &str) -> SurfaceResult<Vec<Vec<String>>> {
        let state = self.state.lock().unwrap();
        if *scope != Self::notice_scope() || rows != self.layout.notice.rows {
            return Ok(Vec::new());
        }
        Ok(Self::open_detail(&state)
            .and_then(|d| d.notice.clone())
            .unwrap_or_default())
    }

    async fn type_text(&self, _element: &ElementRef, text: &str) -> SurfaceResult<()> {
        self.state.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn capture_image(&self, _element: &ElementRef) -> SurfaceResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn enter_frame(&self, frame: &ElementRef) -> SurfaceResult<Scope> {
        Ok(frame.scope.child(&frame.id))
    }

    async fn fetch_json(&self, url: &str) -> SurfaceResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        let page: usize = url
            .split(['?', '&'])
            .find_map(|p| p.strip_prefix("pageIndex="))
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        Ok(state
            .pages
            .get(page - 1)
            .cloned()
            .unwrap_or_else(|| json!({ "yeniIhaleAramaResultList": [] })))
    }

    async fn shutdown(&self) -> SurfaceResult<()> {
        self.state.lock().unwrap().shutdown = true;
        Ok(())
    }
}

/// 检索接口的一页
pub fn listing_page(ids: &[&str]) -> Value {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "E1": id, "E2": format!("İş {}", id), "E3": "İDARE", "E6": "01.03.2023" }))
        .collect();
    json!({ "yeniIhaleAramaResultList": items })
}

// ==========================================
// 验证门装配
// ==========================================

/// 固定应答的识别服务
pub struct FakeSolver {
    pub answer: Result<String, SolverError>,
    pub calls: AtomicUsize,
}

impl FakeSolver {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(SolverError::Rejected("ERROR_CAPTCHA_UNSOLVABLE".to_string())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn submit(&self, _image: &[u8]) -> Result<String, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// 模拟操作员: 每个提示都在"浏览器"中完成验证码后确认
pub struct FakeOperator {
    pub prompts: Arc<AtomicUsize>,
    pub task: JoinHandle<()>,
}

/// 装配验证门与模拟操作员
///
/// # 参数
/// - solver: Some 时启用自动识别
pub fn gate_with_operator(
    portal: Arc<FakePortal>,
    solver: Option<Arc<dyn CaptchaSolver>>,
    scope: VerificationScope,
) -> (VerificationGate, FakeOperator) {
    let (channel, mut handle) = OperatorChannel::new();
    let prompts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&prompts);
    let task = tokio::spawn(async move {
        while handle.prompts.recv().await.is_some() {
            counter.fetch_add(1, Ordering::SeqCst);
            portal.solve_captcha_manually();
            if handle.acks.send(()).is_err() {
                break;
            }
        }
    });
    let auto = solver.is_some();
    let gate = VerificationGate::new(solver, auto, channel, scope);
    (gate, FakeOperator { prompts, task })
}

/// 没有操作员的验证门（确认通道已关闭）
pub fn gate_without_operator(scope: VerificationScope) -> VerificationGate {
    let (channel, handle) = OperatorChannel::new();
    drop(handle);
    VerificationGate::new(None, false, channel, scope)
}

pub fn driver(portal: &Arc<FakePortal>, timing: TimingConfig) -> SessionDriver {
    let surface: Arc<dyn PortalSurface> = portal.clone();
    SessionDriver::new(surface, PortalLayout::default(), timing)
}

// ==========================================
// 计数阶段（用于续跑测试）
// ==========================================

pub struct CountingDiscovery {
    pub entries: Vec<DiscoveryEntry>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DiscoveryPhase for CountingDiscovery {
    async fn discover(
        &self,
        _ctx: &mut RunContext,
    ) -> ekap_harvest::AcquisitionResult<Vec<DiscoveryEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }
}

/// 为每个条目生成一条只含发现字段的记录
pub struct CountingDetails {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DetailPhase for CountingDetails {
    async fn fetch_details(
        &self,
        _ctx: &mut RunContext,
        entries: &[DiscoveryEntry],
        _store: &ArtifactStore,
    ) -> ekap_harvest::AcquisitionResult<FetchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchReport {
            records: entries.iter().map(DetailRecord::from_discovery).collect(),
            skipped: Vec::new(),
        })
    }
}
