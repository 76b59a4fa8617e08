// ==========================================
// EKAP 招标数据采集系统 - 发现阶段
// ==========================================
// 职责: 在会话内分页请求检索数据接口, 生成有序唯一的 IKN 列表
// 停止条件: 空列表 / 非 JSON 响应 / 达到 maxPages
// 红线: 编号规范化后去重, 无效编号丢弃并记录日志
// ==========================================

use crate::config::{PortalConfig, SearchConfig};
use crate::domain::{DiscoveryEntry, RecordIdentifier, RunContext};
use crate::engine::error::AcquisitionResult;
use crate::engine::orchestrator::DiscoveryPhase;
use crate::engine::retry::RetryPolicy;
use crate::engine::surface::{PortalSurface, SurfaceError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 检索接口返回的列表字段
pub const RESULT_LIST_KEY: &str = "yeniIhaleAramaResultList";

/// 从一页响应中取出结果列表
///
/// # 返回
/// - None: 响应不是预期结构（非 JSON 或缺少列表）
pub fn result_list(page: &Value) -> Option<&Vec<Value>> {
    page.get(RESULT_LIST_KEY).and_then(Value::as_array)
}

fn field_text(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ==========================================
// EntryCollector - 条目收集器
// ==========================================
// 保持首次出现的顺序
#[derive(Debug, Default)]
pub struct EntryCollector {
    seen: HashSet<String>,
    entries: Vec<DiscoveryEntry>,
    pub invalid: usize,
    pub duplicates: usize,
}

impl EntryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集一个 E1/E2/E3/E6 条目
    ///
    /// # 返回
    /// - true: 新条目已加入
    /// - false: 编号无效或重复
    pub fn push(&mut self, item: &Value) -> bool {
        let raw = field_text(item, "E1").unwrap_or_default();
        let ikn = match RecordIdentifier::parse(&raw) {
            Ok(ikn) => ikn,
            Err(e) => {
                warn!(raw = %raw, error = %e, "丢弃无效编号");
                self.invalid += 1;
                return false;
            }
        };
        if !self.seen.insert(ikn.as_str().to_string()) {
            warn!(ikn = %ikn, "重复编号, 已忽略");
            self.duplicates += 1;
            return false;
        }
        self.entries.push(DiscoveryEntry {
            ikn,
            title: field_text(item, "E2"),
            admin: field_text(item, "E3"),
            date: field_text(item, "E6"),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<DiscoveryEntry> {
        self.entries
    }
}

// ==========================================
// ListingDiscovery - 列表发现
// ==========================================
pub struct ListingDiscovery {
    surface: Arc<dyn PortalSurface>,
    portal: PortalConfig,
    search: SearchConfig,
    retry: RetryPolicy,
}

impl ListingDiscovery {
    pub fn new(
        surface: Arc<dyn PortalSurface>,
        portal: PortalConfig,
        search: SearchConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            surface,
            portal,
            search,
            retry,
        }
    }

    /// 第 page 页（从 1 开始）的请求地址
    pub fn page_url(&self, page: u32) -> String {
        format!(
            "{}?ES=&pageIndex={}&metot=ara&tabId={}&ihaleTuru={}&ilId={}&iknYil={}\
             &orderBy=8&yasaKapsami=1&isMobil=0&kayitTuru=1&totalCount=1",
            self.portal.search_data_url,
            page,
            self.search.tab_id,
            self.search.category,
            self.search.region_id,
            self.search.year,
        )
    }

    /// 请求一页
    ///
    /// # 返回
    /// - Ok(None): 响应不是 JSON, 视为结束
    async fn fetch_page(&self, page: u32) -> AcquisitionResult<Option<Value>> {
        let url = self.page_url(page);
        let url = url.as_str();
        let surface = self.surface.as_ref();
        let result = self
            .retry
            .run("fetch listing page", move || async move {
                match surface.fetch_json(url).await {
                    // 非 JSON 不重试
                    Err(SurfaceError::Protocol(msg)) => Ok(Err(msg)),
                    Err(e) => Err(e),
                    Ok(value) => Ok(Ok(value)),
                }
            })
            .await?;

        match result {
            Ok(Value::Null) => {
                warn!(page = page, "检索接口返回非 JSON 响应");
                Ok(None)
            }
            Ok(value) => Ok(Some(value)),
            Err(msg) => {
                warn!(page = page, error = %msg, "检索接口返回非 JSON 响应");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DiscoveryPhase for ListingDiscovery {
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id, year = self.search.year))]
    async fn discover(&self, ctx: &mut RunContext) -> AcquisitionResult<Vec<DiscoveryEntry>> {
        info!(url = %self.portal.base_url, "发现阶段开始");
        let surface = self.surface.as_ref();
        let base_url = self.portal.base_url.as_str();
        self.retry
            .run("navigate", || surface.navigate(base_url))
            .await?;

        let mut collector = EntryCollector::new();
        let mut page = 1u32;
        loop {
            if let Some(max) = self.search.max_pages {
                if page > max {
                    info!(max_pages = max, "达到最大页数");
                    break;
                }
            }

            let Some(body) = self.fetch_page(page).await? else {
                break;
            };
            let Some(items) = result_list(&body).filter(|items| !items.is_empty()) else {
                debug!(page = page, "空页, 结束翻页");
                break;
            };

            let mut added = 0;
            for item in items {
                if collector.push(item) {
                    added += 1;
                }
            }
            info!(page = page, items = items.len(), added = added, "发现一页");
            page += 1;
        }

        info!(
            entries = collector.len(),
            invalid = collector.invalid,
            duplicates = collector.duplicates,
            "发现阶段完成"
        );
        Ok(collector.into_entries())
    }
}
