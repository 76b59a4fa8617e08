// ==========================================
// 详情抽取集成测试
// ==========================================
// 职责: 验证区块命名空间、合同缺失哨兵、公告失败哨兵
// ==========================================

mod test_helpers;

use ekap_harvest::domain::{
    DiscoveryEntry, FieldValue, RunContext, SectionKind, SentinelKind, VerificationScope,
};
use ekap_harvest::engine::{DetailExtractor, SectionOutcome};
use serde_json::json;
use std::sync::Arc;
use test_helpers::*;

async fn extract(portal: Arc<FakePortal>, id: &str) -> ekap_harvest::engine::Extraction {
    let driver = driver(&portal, immediate_timing());
    let (gate, _operator) =
        gate_with_operator(Arc::clone(&portal), None, VerificationScope::Session);
    let mut ctx = RunContext::new();
    let entry = DiscoveryEntry {
        ikn: ikn(id),
        title: Some("Okul Yapımı".to_string()),
        admin: None,
        date: None,
    };
    let view = driver.open_detail(&mut ctx, &entry.ikn).await.unwrap();
    DetailExtractor::new()
        .extract(&mut ctx, &driver, &gate, &view, &entry)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_complete_detail_is_namespaced_by_section() {
    let portal = Arc::new(FakePortal::new().with_card("2023/100", FakeDetail::complete("Okul")));
    let extraction = extract(portal, "2023/100").await;
    let record = &extraction.record;

    assert_eq!(record.get("general.İşin Adı"), Some(&FieldValue::text("Okul")));
    assert_eq!(
        record.get("administrative.İdare Adı"),
        Some(&FieldValue::text("ANTAKYA BELEDİYESİ"))
    );
    assert_eq!(
        record.get("contract.Sözleşme Bedeli"),
        Some(&FieldValue::text("900.000,00 TRY"))
    );
    assert_eq!(record.get("discovery.title"), Some(&FieldValue::text("Okul Yapımı")));
    assert!(record.section_marker(SectionKind::Contract).is_none());
    assert!(record.section_marker(SectionKind::Notice).is_none());
    assert_eq!(
        extraction.outcome(SectionKind::General),
        Some(&SectionOutcome::Extracted(6))
    );
}

#[tokio::test]
async fn test_notice_rows_become_label_value_pairs() {
    let portal = Arc::new(FakePortal::new().with_card("2023/100", FakeDetail::complete("Okul")));
    let extraction = extract(portal, "2023/100").await;
    let record = &extraction.record;

    assert_eq!(
        record.get("notice.En Düşük Teklif"),
        Some(&FieldValue::text("800.000,00 TRY"))
    );
    // 单列行被丢弃
    assert!(record.get("notice.Tek hücre").is_none());
    assert_eq!(
        extraction.outcome(SectionKind::Notice),
        Some(&SectionOutcome::Extracted(2))
    );
}

#[tokio::test]
async fn test_missing_contract_records_absent_sentinel() {
    let detail = FakeDetail::complete("Köprü").without_contract();
    let portal = Arc::new(FakePortal::new().with_card("2023/200", detail));
    let extraction = extract(portal, "2023/200").await;
    let record = &extraction.record;

    assert_eq!(
        record.section_marker(SectionKind::Contract),
        Some(&FieldValue::sentinel(SentinelKind::SectionAbsent))
    );
    assert_eq!(
        extraction.outcome(SectionKind::Contract),
        Some(&SectionOutcome::Absent)
    );
    // 其他区块不受影响
    assert_eq!(record.find_text("İşin Adı"), Some("Köprü"));
    assert!(record.get("notice.En Düşük Teklif").is_some());

    let json = serde_json::to_value(record).unwrap();
    assert_eq!(json["fields"]["contract"], json!({ "sentinel": "section_absent" }));
}

#[tokio::test]
async fn test_notice_failure_records_unavailable_sentinel() {
    let detail = FakeDetail::complete("Yol").without_notice();
    let portal = Arc::new(FakePortal::new().with_card("2023/300", detail));
    let extraction = extract(Arc::clone(&portal), "2023/300").await;
    let record = &extraction.record;

    assert_eq!(
        record.section_marker(SectionKind::Notice),
        Some(&FieldValue::sentinel(SentinelKind::SectionUnavailable))
    );
    assert!(matches!(
        extraction.outcome(SectionKind::Notice),
        Some(SectionOutcome::Failed(_))
    ));
    assert!(extraction.gate.is_none());
    assert_eq!(record.find_text("İşin Adı"), Some("Yol"));
}

#[tokio::test]
async fn test_open_detail_matches_noisy_card_label() {
    let portal = Arc::new(
        FakePortal::new()
            .with_card("İKN: 2023/ 400 (Yapım)", FakeDetail::complete("Park")),
    );
    let extraction = extract(Arc::clone(&portal), "2023/400").await;
    assert_eq!(extraction.record.id.as_str(), "2023/400");
    assert_eq!(portal.open_attempts("2023/400"), 1);
}

#[tokio::test]
async fn test_general_section_failure_leaves_other_sections_intact() {
    let detail = FakeDetail::complete("Okul").without_general_tab();
    let portal = Arc::new(FakePortal::new().with_card("2023/500", detail));
    let extraction = extract(portal, "2023/500").await;
    let record = &extraction.record;

    assert!(matches!(
        extraction.outcome(SectionKind::General),
        Some(SectionOutcome::Failed(_))
    ));
    // 必选区块失败不写哨兵
    assert!(record.section_marker(SectionKind::General).is_none());
    assert!(record.get("general.İşin Adı").is_none());

    assert_eq!(
        extraction.outcome(SectionKind::Administrative),
        Some(&SectionOutcome::Extracted(3))
    );
    assert_eq!(
        extraction.outcome(SectionKind::Contract),
        Some(&SectionOutcome::Extracted(1))
    );
    assert_eq!(
        record.get("administrative.İdare Adı"),
        Some(&FieldValue::text("ANTAKYA BELEDİYESİ"))
    );
    assert!(record.get("notice.En Düşük Teklif").is_some());
}

#[tokio::test]
async fn test_closing_overlays_waits_for_page_to_settle() {
    let portal = Arc::new(FakePortal::new().with_card("2023/600", FakeDetail::complete("Park")));
    let driver = driver(&portal, immediate_timing());
    let mut ctx = RunContext::new();

    let view = driver.open_detail(&mut ctx, &ikn("2023/600")).await.unwrap();
    driver.open_notice(&view).await.unwrap();

    let before = portal.settles();
    driver.close_notice().await.unwrap();
    assert_eq!(portal.settles(), before + 1);

    let before = portal.settles();
    driver.close_detail(&mut ctx).await.unwrap();
    assert_eq!(portal.settles(), before + 1);
    assert!(!portal.is_detail_open());
    assert!(ctx.open_record.is_none());
}
