// ==========================================
// EKAP 招标数据采集系统 - 门户页面布局
// ==========================================
// 职责: 集中登记目标门户的所有选择器
// 说明: 门户改版时只需调整此处
// ==========================================

use crate::domain::SectionKind;
use crate::engine::surface::PairQuery;

/// 详情浮层中一个子区块的选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    /// 页签链接
    pub tab: String,
    /// 渲染完成的标志元素
    pub ready: String,
    /// 标签/值表格
    pub pairs: PairQuery,
}

/// 公告浮层选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeLayout {
    pub tab: String,
    /// 打开公告预览浮层的链接
    pub link: String,
    /// 公告预览 iframe（位于顶层文档）
    pub frame: String,
    pub table: String,
    pub rows: String,
    pub close: String,
}

/// 验证码选择器（位于公告 iframe 内）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeLayout {
    pub image: String,
    pub input: String,
    pub submit: String,
}

// ==========================================
// PortalLayout - 门户布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalLayout {
    // ===== 检索面板 =====
    pub year_select: String,
    pub region_select: String,
    pub search_button: String,

    // ===== 结果列表 =====
    pub listing_card: String,
    pub listing_identifier: String,
    pub listing_open: String,

    // ===== 详情浮层 =====
    pub detail_frame: String,
    pub detail_close: String,
    pub general: SectionLayout,
    pub administrative: SectionLayout,
    pub contract: SectionLayout,
    pub notice: NoticeLayout,
    pub challenge: ChallengeLayout,
}

impl PortalLayout {
    /// 招标类别单选项（按界面文本定位）
    pub fn category_label(&self, label: &str) -> String {
        format!(
            "xpath://label[contains(normalize-space(.), '{}')]",
            label.replace('\'', "")
        )
    }

    /// 标签/值型子区块的布局
    pub fn section(&self, section: SectionKind) -> Option<&SectionLayout> {
        match section {
            SectionKind::General => Some(&self.general),
            SectionKind::Administrative => Some(&self.administrative),
            SectionKind::Contract => Some(&self.contract),
            SectionKind::Notice | SectionKind::Discovery => None,
        }
    }
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            year_select: r#"select[title="İKN Yılı seçiniz"]"#.to_string(),
            region_select: r#"select[title="İhalenin yapıldığı il"]"#.to_string(),
            search_button: "#pnlFiltreBtn button".to_string(),

            listing_card: "div.card.text-justify".to_string(),
            listing_identifier: "h6.text-warning".to_string(),
            listing_open: "button.btn-outline-info".to_string(),

            detail_frame: r#"iframe[src*="BirBakistaIhale.aspx"]"#.to_string(),
            detail_close: "div.modal-header button.close".to_string(),
            general: SectionLayout {
                tab: r##"a[href="#tabIhaleBilgi"]"##.to_string(),
                ready: "section#tabIhaleBilgi table.bilgi".to_string(),
                pairs: PairQuery {
                    rows: "section#tabIhaleBilgi table.bilgi tr".to_string(),
                    label: "td:first-child span".to_string(),
                    value: "td:nth-child(2) span, td:nth-child(2)".to_string(),
                },
            },
            administrative: SectionLayout {
                tab: r##"a[href="#tabIdareBilgi"]"##.to_string(),
                ready: "section#tabIdareBilgi table.bilgi".to_string(),
                pairs: PairQuery {
                    rows: "section#tabIdareBilgi table.bilgi tr".to_string(),
                    label: "td:first-child span".to_string(),
                    value: "td:nth-child(2) span, td:nth-child(2)".to_string(),
                },
            },
            contract: SectionLayout {
                tab: r##"ul.nav.nav-tabs a[href="#tabSozlesmeBilgi"]"##.to_string(),
                ready: "section#tabSozlesmeBilgi".to_string(),
                pairs: PairQuery {
                    rows: "section#tabSozlesmeBilgi .sozlesmeCard .card-block .card-text.clear"
                        .to_string(),
                    label: "span.sozLabel b".to_string(),
                    value: "span:nth-child(2)".to_string(),
                },
            },
            notice: NoticeLayout {
                tab: r##"a[href="#tabIlanBilgi"]"##.to_string(),
                link: "#ucBirBakistaIhale_dataListSonucTarihleri_ctl00_lnkNav".to_string(),
                frame: "iframe#ifr".to_string(),
                table: "#ilanOnizleme .ilanTabloStil".to_string(),
                rows: "#ilanOnizleme .ilanTabloStil > tbody > tr".to_string(),
                close: "div.modal-dialog.modal-lg button.close".to_string(),
            },
            challenge: ChallengeLayout {
                image: "img#imgDogrulama".to_string(),
                input: "#txtDogrulamaKodu".to_string(),
                submit: "#btnGonder".to_string(),
            },
        }
    }
}
