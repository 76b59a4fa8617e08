// ==========================================
// EKAP 招标数据采集系统 - 领域类型定义
// ==========================================
// 职责: 招标编号 (IKN)、子区块、管道阶段等基础类型
// 红线: IKN 是贯穿所有阶段的连接键, 只允许规范化后的形式入库
// ==========================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// 规范形式: YYYY/NNN…
static CANONICAL_IKN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}/\d+").unwrap());
static FULL_IKN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}/\d+$").unwrap());

// ==========================================
// 招标编号 (Record Identifier)
// ==========================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的招标编号: {raw:?}（期望 YYYY/NNN 格式）")]
pub struct IdentifierError {
    pub raw: String,
}

/// 招标编号 (IKN)
///
/// 规范形式为 `YYYY/NNN…`，通过 [`RecordIdentifier::parse`] 构造时
/// 会先去除所有空白并从带噪声的标签文本中提取规范部分。
/// 反序列化同样经过 `parse`, 读回的产物中的编号总是规范形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordIdentifier(String);

impl RecordIdentifier {
    /// 规范化页面上显示的编号文本
    ///
    /// # 规则
    /// 1. 去除所有空白字符
    /// 2. 若包含 `YYYY/NNN` 片段，返回第一个片段
    /// 3. 否则返回去除空白后的文本
    ///
    /// 对输出重复调用是幂等的。
    ///
    /// # 示例
    /// - `"  2023/  123 "` → `"2023/123"`
    /// - `"İKN: 2023/456789 (Yapım)"` → `"2023/456789"`
    pub fn normalize(raw: &str) -> String {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        match CANONICAL_IKN.find(&compact) {
            Some(m) => m.as_str().to_string(),
            None => compact,
        }
    }

    /// 规范化并校验
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let normalized = Self::normalize(raw);
        if FULL_IKN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(IdentifierError {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 年份部分
    pub fn year(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordIdentifier {
    type Error = IdentifierError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RecordIdentifier> for String {
    fn from(id: RecordIdentifier) -> Self {
        id.0
    }
}

impl std::str::FromStr for RecordIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ==========================================
// 子区块 (Sub-section)
// ==========================================
// 详情浮层内独立加载的区域, 字段按区块命名空间隔离
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Discovery,      // 列表发现阶段带来的字段
    General,        // 招标信息 (İhale Bilgileri)
    Administrative, // 采购单位信息 (İdare Bilgileri)
    Contract,       // 合同信息 (Sözleşme Bilgileri) - 可缺失
    Notice,         // 公告信息 (İlan Bilgileri) - 需通过验证门
}

impl SectionKind {
    /// 详情浮层中的四个子区块（按抽取顺序）
    pub const DETAIL_SECTIONS: [SectionKind; 4] = [
        SectionKind::General,
        SectionKind::Administrative,
        SectionKind::Contract,
        SectionKind::Notice,
    ];

    /// 标签查找时的区块优先级
    pub const LOOKUP_ORDER: [SectionKind; 5] = [
        SectionKind::General,
        SectionKind::Administrative,
        SectionKind::Contract,
        SectionKind::Notice,
        SectionKind::Discovery,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            SectionKind::Discovery => "discovery",
            SectionKind::General => "general",
            SectionKind::Administrative => "administrative",
            SectionKind::Contract => "contract",
            SectionKind::Notice => "notice",
        }
    }

    /// 命名空间化的字段键: `<section>.<label>`
    pub fn key(&self, label: &str) -> String {
        format!("{}.{}", self.namespace(), label)
    }

    /// 是否允许结构性缺失（缺失时记录哨兵值）
    pub fn is_optional(&self) -> bool {
        matches!(self, SectionKind::Contract | SectionKind::Notice)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

// ==========================================
// 管道阶段 (Pipeline Phase)
// ==========================================
// 固定顺序: discover → fetch details → clean → filter → export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    Discover,
    FetchDetails,
    Clean,
    Filter,
    Export,
}

impl PhaseKind {
    pub const ORDERED: [PhaseKind; 5] = [
        PhaseKind::Discover,
        PhaseKind::FetchDetails,
        PhaseKind::Clean,
        PhaseKind::Filter,
        PhaseKind::Export,
    ];
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Discover => write!(f, "DISCOVER"),
            PhaseKind::FetchDetails => write!(f, "FETCH_DETAILS"),
            PhaseKind::Clean => write!(f, "CLEAN"),
            PhaseKind::Filter => write!(f, "FILTER"),
            PhaseKind::Export => write!(f, "EXPORT"),
        }
    }
}

// ==========================================
// 验证门粘性范围
// ==========================================
// 一次解决后是否对整个会话生效（待目标站点行为确认, 因此做成可配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationScope {
    #[default]
    Session,
    Record,
}
