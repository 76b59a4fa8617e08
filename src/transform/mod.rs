// ==========================================
// EKAP 招标数据采集系统 - 下游转换层
// ==========================================
// 职责: 清洗 → 筛选 → 导出, 纯数据处理
// 红线: 不依赖页面交互, 输入输出均为 DetailRecord
// ==========================================

pub mod cleaner;
pub mod error;
pub mod exporter;
pub mod filter;

pub use cleaner::{parse_try, split_location_datetime, RecordCleaner};
pub use error::{TransformError, TransformResult};
pub use exporter::{CsvExporter, ExportManifest};
pub use filter::{FilterRules, FilterStats, Rejection};
