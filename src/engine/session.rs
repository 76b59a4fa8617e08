// ==========================================
// EKAP 招标数据采集系统 - 会话驱动
// ==========================================
// 职责: 持有唯一交互会话, 执行检索、打开/关闭详情、切换子区块
// 规则: 每个改变状态的交互之后执行静止等待:
//       等待异步活动静止或超时 (5s), 再固定缓冲 (≈500ms)
// 错误: NotFound（目标控件不存在）/ InteractionFailed（重试耗尽）
// ==========================================

use crate::config::TimingConfig;
use crate::domain::{FilterCriteria, RecordIdentifier, RunContext, SectionKind};
use crate::engine::error::{AcquisitionError, AcquisitionResult};
use crate::engine::layout::{PortalLayout, SectionLayout};
use crate::engine::locator::{ListLocator, Located};
use crate::engine::retry::RetryPolicy;
use crate::engine::surface::{ElementRef, OptionChoice, PortalSurface, Scope, Settle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 已打开的详情浮层
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: RecordIdentifier,
    /// 详情 iframe 的作用域
    pub frame: Scope,
}

// ==========================================
// SessionDriver - 会话驱动
// ==========================================
pub struct SessionDriver {
    surface: Arc<dyn PortalSurface>,
    layout: PortalLayout,
    retry: RetryPolicy,
    timing: TimingConfig,
}

impl SessionDriver {
    /// 创建会话驱动
    ///
    /// # 参数
    /// - surface: 交互能力实现
    /// - layout: 门户选择器
    /// - timing: 时序参数（重试策略也由此派生）
    pub fn new(surface: Arc<dyn PortalSurface>, layout: PortalLayout, timing: TimingConfig) -> Self {
        Self {
            retry: RetryPolicy::from_timing(&timing),
            surface,
            layout,
            timing,
        }
    }

    pub fn surface(&self) -> &dyn PortalSurface {
        self.surface.as_ref()
    }

    pub fn layout(&self) -> &PortalLayout {
        &self.layout
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // ==========================================
    // 基础交互
    // ==========================================

    /// 静止等待: 异步活动静止或超时, 然后固定缓冲
    ///
    /// 超时不视为错误, 与目标站点的动画/渲染竞争由缓冲吸收。
    pub async fn settle(&self, scope: &Scope) {
        match self
            .surface
            .wait_until_settled(scope, self.timing.settle_timeout())
            .await
        {
            Ok(Settle::Quiesced) => debug!("页面已静止"),
            Ok(Settle::TimedOut) => warn!("等待动态内容超时"),
            Err(e) => warn!(error = %e, "静止检测失败"),
        }
        pause(self.timing.settle_grace()).await;
    }

    /// 查找作用域内第一个匹配元素, 不存在时返回 NotFound
    pub async fn require(&self, scope: &Scope, selector: &str) -> AcquisitionResult<ElementRef> {
        self.surface
            .locate(scope, selector)
            .await
            .map_err(|e| AcquisitionError::interaction(selector, &e))?
            .into_iter()
            .next()
            .ok_or_else(|| AcquisitionError::not_found(selector))
    }

    /// 带重试地激活元素
    pub async fn activate(&self, element: &ElementRef, action: &str) -> AcquisitionResult<()> {
        let surface = self.surface.as_ref();
        self.retry
            .run(action, || surface.activate(element))
            .await
    }

    /// 查找并激活
    pub async fn activate_selector(
        &self,
        scope: &Scope,
        selector: &str,
        action: &str,
    ) -> AcquisitionResult<()> {
        let element = self.require(scope, selector).await?;
        self.activate(&element, action).await
    }

    // ==========================================
    // 会话级操作
    // ==========================================

    #[instrument(skip(self))]
    pub async fn navigate(&self, base_url: &str) -> AcquisitionResult<()> {
        info!(url = base_url, "打开门户");
        let surface = self.surface.as_ref();
        self.retry
            .run("navigate", || surface.navigate(base_url))
            .await?;
        self.settle(&Scope::page()).await;
        Ok(())
    }

    /// 应用检索条件
    ///
    /// # 顺序（固定）
    /// 1. 选择 IKN 年份
    /// 2. 按文本选择省份
    /// 3. 勾选招标类别
    /// 4. 点击检索按钮
    ///
    /// 每一步之后都执行静止等待。
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id))]
    pub async fn apply_filters(
        &self,
        ctx: &mut RunContext,
        criteria: &FilterCriteria,
    ) -> AcquisitionResult<()> {
        info!(
            year = criteria.year,
            region = %criteria.region_label,
            category = %criteria.category_label,
            "应用检索条件"
        );
        let page = Scope::page();
        let surface = self.surface.as_ref();

        let year = OptionChoice::Value(criteria.year.to_string());
        self.retry
            .run("select year", || {
                surface.select_option(&page, &self.layout.year_select, &year)
            })
            .await?;
        self.settle(&page).await;

        let region = OptionChoice::Label(criteria.region_label.clone());
        self.retry
            .run("select region", || {
                surface.select_option(&page, &self.layout.region_select, &region)
            })
            .await?;
        self.settle(&page).await;

        let category = self.layout.category_label(&criteria.category_label);
        self.activate_selector(&page, &category, "select category")
            .await?;
        self.settle(&page).await;

        self.activate_selector(&page, &self.layout.search_button, "submit search")
            .await?;
        self.settle(&page).await;

        ctx.criteria = Some(criteria.clone());
        Ok(())
    }

    // ==========================================
    // 详情浮层
    // ==========================================

    /// 打开记录详情
    ///
    /// # 流程
    /// 1. 等待结果列表渲染
    /// 2. 列表定位器查找目标卡片（未命中 → NotFound, 携带可见编号）
    /// 3. 激活卡片上的详情按钮（重试）
    /// 4. 等待详情 iframe 出现并进入
    #[instrument(skip(self, ctx), fields(ikn = %id))]
    pub async fn open_detail(
        &self,
        ctx: &mut RunContext,
        id: &RecordIdentifier,
    ) -> AcquisitionResult<DetailView> {
        let page = Scope::page();
        let surface = self.surface.as_ref();

        let listed = surface
            .wait_for(&page, &self.layout.listing_card, self.timing.listing_timeout())
            .await
            .map_err(|e| AcquisitionError::interaction("wait listing", &e))?;
        if listed.is_none() {
            return Err(AcquisitionError::NotFound {
                target: id.to_string(),
                visible: Vec::new(),
            });
        }
        self.settle(&page).await;

        let locator = ListLocator::new(surface, &self.layout);
        let card = match locator
            .locate(id)
            .await
            .map_err(|e| AcquisitionError::interaction("scan listing", &e))?
        {
            Located::Found(card) => card,
            Located::Missing { visible } => {
                return Err(AcquisitionError::NotFound {
                    target: id.to_string(),
                    visible,
                })
            }
        };

        let button = surface
            .locate_in(&card, &self.layout.listing_open)
            .await
            .map_err(|e| AcquisitionError::interaction("locate open button", &e))?
            .into_iter()
            .next()
            .ok_or_else(|| AcquisitionError::not_found(format!("{} 详情按钮", id)))?;

        self.activate(&button, "open detail").await?;
        self.settle(&page).await;

        let frame = surface
            .wait_for(&page, &self.layout.detail_frame, self.timing.detail_frame_timeout())
            .await
            .map_err(|e| AcquisitionError::interaction("wait detail frame", &e))?
            .ok_or_else(|| AcquisitionError::InteractionFailed {
                action: "wait detail frame".to_string(),
                attempts: 1,
                message: "详情浮层未出现".to_string(),
            })?;
        let scope = surface
            .enter_frame(&frame)
            .await
            .map_err(|e| AcquisitionError::interaction("enter detail frame", &e))?;
        self.settle(&scope).await;

        ctx.open_record = Some(id.clone());
        debug!("详情浮层已打开");
        Ok(DetailView {
            id: id.clone(),
            frame: scope,
        })
    }

    /// 关闭详情浮层
    pub async fn close_detail(&self, ctx: &mut RunContext) -> AcquisitionResult<()> {
        let open = ctx.open_record.take();
        let result = self
            .activate_selector(&Scope::page(), &self.layout.detail_close, "close detail")
            .await;
        self.settle(&Scope::page()).await;
        if let Err(e) = &result {
            warn!(ikn = ?open, error = %e, "关闭详情浮层失败");
        }
        result
    }

    /// 切换到子区块页签
    ///
    /// 页签不存在 → SectionUnavailable
    pub async fn select_section(
        &self,
        view: &DetailView,
        section: SectionKind,
        layout: &SectionLayout,
    ) -> AcquisitionResult<()> {
        let tab = self
            .surface
            .locate(&view.frame, &layout.tab)
            .await
            .map_err(|e| AcquisitionError::interaction("locate section tab", &e))?
            .into_iter()
            .next()
            .ok_or_else(|| AcquisitionError::SectionUnavailable {
                section,
                reason: "页签不存在".to_string(),
            })?;
        self.activate(&tab, &format!("select {} tab", section))
            .await?;
        pause(self.timing.section_render()).await;
        Ok(())
    }

    /// 打开公告预览浮层, 返回其 iframe 作用域
    pub async fn open_notice(&self, view: &DetailView) -> AcquisitionResult<Scope> {
        let notice = &self.layout.notice;
        let unavailable = |reason: &str| AcquisitionError::SectionUnavailable {
            section: SectionKind::Notice,
            reason: reason.to_string(),
        };

        let tab = self
            .surface
            .locate(&view.frame, &notice.tab)
            .await
            .map_err(|e| AcquisitionError::interaction("locate notice tab", &e))?
            .into_iter()
            .next()
            .ok_or_else(|| unavailable("公告页签不存在"))?;
        self.activate(&tab, "select notice tab").await?;
        pause(self.timing.section_render()).await;

        let link = self
            .surface
            .locate(&view.frame, &notice.link)
            .await
            .map_err(|e| AcquisitionError::interaction("locate notice link", &e))?
            .into_iter()
            .next()
            .ok_or_else(|| unavailable("公告链接不存在"))?;
        self.activate(&link, "open notice").await?;

        let frame = self
            .surface
            .wait_for(&Scope::page(), &notice.frame, self.timing.notice_timeout())
            .await
            .map_err(|e| AcquisitionError::interaction("wait notice frame", &e))?
            .ok_or_else(|| unavailable("公告浮层未出现"))?;
        self.surface
            .enter_frame(&frame)
            .await
            .map_err(|e| AcquisitionError::interaction("enter notice frame", &e))
    }

    /// 关闭公告浮层（不存在时直接返回）
    pub async fn close_notice(&self) -> AcquisitionResult<()> {
        let close = self
            .surface
            .locate(&Scope::page(), &self.layout.notice.close)
            .await
            .map_err(|e| AcquisitionError::interaction("locate notice close", &e))?;
        if let Some(button) = close.first() {
            self.activate(button, "close notice").await?;
            self.settle(&Scope::page()).await;
        }
        Ok(())
    }
}

/// 固定等待（零时长直接返回）
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
