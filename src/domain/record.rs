// ==========================================
// EKAP 招标数据采集系统 - 记录实体
// ==========================================
// 职责: 发现条目 (DiscoveryEntry) 与详情记录 (DetailRecord)
// 红线: 可选区块缺失必须记录哨兵值, 不能表现为缺键
// ==========================================

use crate::domain::types::{RecordIdentifier, SectionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// DiscoveryEntry - 发现阶段条目
// ==========================================
// 对应搜索接口返回的 E1/E2/E3/E6 字段
// 旧版发现产物以 `id` 为键, 读取时同样接受
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryEntry {
    #[serde(alias = "id")]
    pub ikn: RecordIdentifier,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub admin: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl DiscoveryEntry {
    pub fn new(ikn: RecordIdentifier) -> Self {
        Self {
            ikn,
            title: None,
            admin: None,
            date: None,
        }
    }
}

// ==========================================
// 哨兵值
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelKind {
    /// 区块在页面结构中不存在（例如尚未签订合同）
    SectionAbsent,
    /// 区块存在但本次未能读取（例如公告浮层加载失败）
    SectionUnavailable,
}

/// 显式占位值，序列化为 `{"sentinel": "section_absent"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinel {
    pub sentinel: SentinelKind,
}

// ==========================================
// FieldValue - 字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
    Sentinel(Sentinel),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn sentinel(kind: SentinelKind) -> Self {
        FieldValue::Sentinel(Sentinel { sentinel: kind })
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map(FieldValue::Number).unwrap_or(FieldValue::Null)
    }

    /// 文本内容（哨兵值与空值均返回 None）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, FieldValue::Sentinel(_))
    }

    /// 导出用的单元格文本
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Sentinel(_) => "N/A".to_string(),
        }
    }
}

// ==========================================
// DetailRecord - 详情记录
// ==========================================
// 生命周期: 发现阶段创建 → 详情阶段合并各区块 → 清洗阶段追加派生字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: RecordIdentifier,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl DetailRecord {
    pub fn new(id: RecordIdentifier) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// 由发现条目创建，写入 discovery 命名空间字段
    pub fn from_discovery(entry: &DiscoveryEntry) -> Self {
        let mut record = Self::new(entry.ikn.clone());
        let discovery = [
            ("title", &entry.title),
            ("admin", &entry.admin),
            ("date", &entry.date),
        ];
        for (label, value) in discovery {
            if let Some(v) = value {
                record.insert(SectionKind::Discovery, label, FieldValue::text(v.clone()));
            }
        }
        record
    }

    pub fn insert(&mut self, section: SectionKind, label: &str, value: FieldValue) {
        self.fields.insert(section.key(label), value);
    }

    /// 合并一个区块的标签/值对
    pub fn merge_section<I>(&mut self, section: SectionKind, pairs: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = 0;
        for (label, value) in pairs {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            self.insert(section, label, FieldValue::text(value.trim()));
            merged += 1;
        }
        merged
    }

    /// 写入区块级哨兵值（键为区块命名空间本身）
    pub fn mark_section(&mut self, section: SectionKind, kind: SentinelKind) {
        self.fields
            .insert(section.namespace().to_string(), FieldValue::sentinel(kind));
    }

    pub fn section_marker(&self, section: SectionKind) -> Option<&FieldValue> {
        self.fields.get(section.namespace())
    }

    /// 派生字段（无命名空间）
    pub fn set_derived(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// 跨区块查找标签
    ///
    /// 按 [`SectionKind::LOOKUP_ORDER`] 依次查找 `<section>.<label>`,
    /// 最后查找无命名空间的 `label`。
    pub fn find_label(&self, label: &str) -> Option<&FieldValue> {
        SectionKind::LOOKUP_ORDER
            .iter()
            .find_map(|section| self.fields.get(&section.key(label)))
            .or_else(|| self.fields.get(label))
    }

    /// 跨区块查找文本值（哨兵值视为无文本）
    pub fn find_text(&self, label: &str) -> Option<&str> {
        self.find_label(label).and_then(FieldValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ikn(s: &str) -> RecordIdentifier {
        RecordIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_discovery_entry_accepts_id_key() {
        let entry: DiscoveryEntry =
            serde_json::from_str(r#"{"id": " 2023/ 44 ", "title": "Okul"}"#).unwrap();
        assert_eq!(entry.ikn.as_str(), "2023/44");
        assert_eq!(entry.title.as_deref(), Some("Okul"));
        assert!(entry.admin.is_none());

        // 写出时统一使用 ikn 键
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ikn"], "2023/44");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_sentinel_roundtrip_distinct_from_text() {
        let mut record = DetailRecord::new(ikn("2023/1"));
        record.mark_section(SectionKind::Contract, SentinelKind::SectionAbsent);
        record.insert(SectionKind::General, "Durum", FieldValue::text("N/A"));

        let json = serde_json::to_string(&record).unwrap();
        let back: DetailRecord = serde_json::from_str(&json).unwrap();

        assert!(back.section_marker(SectionKind::Contract).unwrap().is_sentinel());
        assert_eq!(back.find_text("Durum"), Some("N/A"));
        assert_eq!(back, record);
    }

    #[test]
    fn test_null_and_number_roundtrip() {
        let mut record = DetailRecord::new(ikn("2023/2"));
        record.set_derived("a_parsed", FieldValue::Number(12.5));
        record.set_derived("b_parsed", FieldValue::Null);
        let back: DetailRecord =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(back.get("a_parsed"), Some(&FieldValue::Number(12.5)));
        assert_eq!(back.get("b_parsed"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_find_label_prefers_general_section() {
        let mut record = DetailRecord::new(ikn("2023/3"));
        record.insert(SectionKind::Notice, "İşin Adı", FieldValue::text("notice"));
        record.insert(SectionKind::General, "İşin Adı", FieldValue::text("general"));
        assert_eq!(record.find_text("İşin Adı"), Some("general"));
    }

    #[test]
    fn test_merge_section_skips_empty_labels() {
        let mut record = DetailRecord::new(ikn("2023/4"));
        let merged = record.merge_section(
            SectionKind::Administrative,
            vec![
                ("  İdare Adı ".to_string(), " HATAY VALİLİĞİ ".to_string()),
                ("".to_string(), "orphan".to_string()),
            ],
        );
        assert_eq!(merged, 1);
        assert_eq!(
            record.get("administrative.İdare Adı"),
            Some(&FieldValue::text("HATAY VALİLİĞİ"))
        );
    }

    #[test]
    fn test_from_discovery_fields() {
        let entry = DiscoveryEntry {
            ikn: ikn("2023/5"),
            title: Some("Okul Yapımı".to_string()),
            admin: None,
            date: Some("15.02.2023".to_string()),
        };
        let record = DetailRecord::from_discovery(&entry);
        assert_eq!(record.find_text("title"), Some("Okul Yapımı"));
        assert!(record.get("discovery.admin").is_none());
    }
}
