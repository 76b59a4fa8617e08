// ==========================================
// EKAP 招标数据采集系统 - 列表定位器
// ==========================================
// 职责: 在当前渲染的结果卡片中找到目标 IKN
// 规则: 规范化后精确匹配, 返回第一个命中
//       未命中时返回当前可见的全部规范化编号
// ==========================================

use crate::domain::RecordIdentifier;
use crate::engine::layout::PortalLayout;
use crate::engine::surface::{ElementRef, PortalSurface, Scope, SurfaceResult};
use tracing::{debug, info};

/// 定位结果
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    Found(ElementRef),
    Missing { visible: Vec<String> },
}

/// 在候选编号中查找目标（候选需已规范化）
pub fn match_identifier(target: &RecordIdentifier, candidates: &[String]) -> Option<usize> {
    candidates.iter().position(|c| c == target.as_str())
}

pub struct ListLocator<'a> {
    surface: &'a dyn PortalSurface,
    layout: &'a PortalLayout,
}

impl<'a> ListLocator<'a> {
    pub fn new(surface: &'a dyn PortalSurface, layout: &'a PortalLayout) -> Self {
        Self { surface, layout }
    }

    /// 读取当前可见卡片及其规范化编号
    ///
    /// 读不到编号的卡片不参与匹配。
    pub async fn visible(&self) -> SurfaceResult<Vec<(ElementRef, String)>> {
        let cards = self
            .surface
            .locate(&Scope::page(), &self.layout.listing_card)
            .await?;
        debug!(cards = cards.len(), "扫描结果卡片");

        let mut visible = Vec::with_capacity(cards.len());
        for card in cards {
            let label = match self
                .surface
                .locate_in(&card, &self.layout.listing_identifier)
                .await?
                .into_iter()
                .next()
            {
                Some(label) => label,
                None => continue,
            };
            let raw = self.surface.read_text(&label).await?;
            visible.push((card, RecordIdentifier::normalize(&raw)));
        }
        Ok(visible)
    }

    /// 定位目标卡片
    pub async fn locate(&self, target: &RecordIdentifier) -> SurfaceResult<Located> {
        let mut visible = self.visible().await?;
        let ids: Vec<String> = visible.iter().map(|(_, id)| id.clone()).collect();

        match match_identifier(target, &ids) {
            Some(idx) => {
                info!(ikn = %target, "命中结果卡片");
                let (card, _) = visible.swap_remove(idx);
                Ok(Located::Found(card))
            }
            None => Ok(Located::Missing { visible: ids }),
        }
    }
}
