// ==========================================
// EKAP 招标数据采集系统 - 数据清洗器
// ==========================================
// 职责: 金额解析 / 比例派生 / 地点与时间拆分
// 规则: 派生字段无命名空间, 原始字段保持不变
//       无法解析或为哨兵值时写入 null
// ==========================================

use crate::domain::{DetailRecord, FieldValue};
use chrono::NaiveDateTime;
use tracing::{debug, info};

// ===== 输入标签 =====
pub const ESTIMATE: &str = "Yaklaşık Maliyet";
pub const LOWEST_BID: &str = "En Düşük Teklif";
pub const HIGHEST_BID: &str = "En Yüksek Teklif";
pub const MONEY_FIELDS: [&str; 3] = [ESTIMATE, LOWEST_BID, HIGHEST_BID];

/// 地点与时间合并字段（两种页面写法）
pub const LOCATION_DATETIME_LABELS: [&str; 2] =
    ["İhale Yeri ve Tarihi", "İhale Yeri - Tarihi - Saati"];

// ===== 派生字段 =====
pub const PCT_LOWEST_VS_ESTIMATE: &str = "pct_lowest_vs_estimate";
pub const PCT_BID_SPREAD: &str = "pct_bid_spread";
pub const LOCATION: &str = "İhale Yeri";
pub const DATETIME: &str = "İhale Tarihi";

/// 派生金额字段名
pub fn parsed_key(field: &str) -> String {
    format!("{}_parsed", field)
}

/// 解析土耳其里拉金额
///
/// `"1.234.567,89 TRY"` → `1234567.89`; 点为千分位, 逗号为小数点。
pub fn parse_try(raw: &str) -> Option<f64> {
    let upper = raw.to_uppercase();
    let without_unit = upper.replace("TRY", "");
    let compact: String = without_unit
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();
    if compact.is_empty() {
        return None;
    }
    compact.replacen(',', ".", 1).parse::<f64>().ok()
}

/// 在最后一个 `-` 处拆分地点与时间
///
/// `"Antakya - 20.02.2023 10:00"` → (`Antakya`, `2023-02-20T10:00:00`)
///
/// # 返回
/// - 无 `-`: 整串为地点, 时间为 None
/// - 时间部分不是 `DD.MM.YYYY HH:MM[:SS]`: 时间为 None
pub fn split_location_datetime(raw: &str) -> (Option<String>, Option<String>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    let Some(idx) = raw.rfind('-') else {
        return (Some(raw.to_string()), None);
    };

    let location = raw[..idx].trim();
    let location = (!location.is_empty()).then(|| location.to_string());
    let datetime = parse_portal_datetime(raw[idx + 1..].trim());
    (location, datetime)
}

fn parse_portal_datetime(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() != 2 {
        return None;
    }
    let joined = format!("{} {}", parts[0], parts[1]);
    NaiveDateTime::parse_from_str(&joined, "%d.%m.%Y %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(&joined, "%d.%m.%Y %H:%M:%S"))
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// 百分比: (a - b) / b * 100, 除数为零或缺失时为 None
fn pct_change(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if b != 0.0 => Some((a - b) / b * 100.0),
        _ => None,
    }
}

// ==========================================
// RecordCleaner - 数据清洗器
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordCleaner;

impl RecordCleaner {
    pub fn new() -> Self {
        Self
    }

    /// 清洗全部记录（顺序保持不变）
    pub fn clean_all(&self, records: Vec<DetailRecord>) -> Vec<DetailRecord> {
        let total = records.len();
        let cleaned: Vec<DetailRecord> = records.into_iter().map(|r| self.clean(r)).collect();
        info!(records = total, "清洗完成");
        cleaned
    }

    pub fn clean(&self, mut record: DetailRecord) -> DetailRecord {
        for field in MONEY_FIELDS {
            let parsed = match record.find_label(field) {
                Some(FieldValue::Text(raw)) => FieldValue::from_option(parse_try(raw)),
                Some(_) => FieldValue::Null,
                None => continue,
            };
            record.set_derived(&parsed_key(field), parsed);
        }

        let number = |record: &DetailRecord, field: &str| {
            record.get(&parsed_key(field)).and_then(FieldValue::as_number)
        };
        let estimate = number(&record, ESTIMATE);
        let lowest = number(&record, LOWEST_BID);
        let highest = number(&record, HIGHEST_BID);

        record.set_derived(
            PCT_LOWEST_VS_ESTIMATE,
            FieldValue::from_option(pct_change(lowest, estimate)),
        );
        record.set_derived(
            PCT_BID_SPREAD,
            FieldValue::from_option(pct_change(highest, lowest)),
        );

        let combined = LOCATION_DATETIME_LABELS
            .iter()
            .find_map(|label| record.find_text(label))
            .unwrap_or_default();
        let (location, datetime) = split_location_datetime(combined);
        debug!(ikn = %record.id, location = ?location, datetime = ?datetime, "拆分地点与时间");
        record.set_derived(LOCATION, location.map(FieldValue::Text).unwrap_or(FieldValue::Null));
        record.set_derived(DATETIME, datetime.map(FieldValue::Text).unwrap_or(FieldValue::Null));

        record
    }
}
