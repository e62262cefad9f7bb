//! Fiscal year creation and month lifecycle through the engine.

mod common;

use common::{date, fixture};
use quire_core::LedgerError;
use quire_core::closing::CloseOptions;
use quire_core::fiscal::{NotReadyReason, PeriodScope, PeriodStatus};
use quire_core::store::LedgerStore;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_fiscal_year_generates_months() {
    let fx = fixture().await;
    let periods = &fx.year.periods;

    assert_eq!(periods.len(), 12);
    assert_eq!(periods[0].name, "January 2026");
    assert_eq!(periods[0].start_date, date(2026, 1, 1));
    assert_eq!(periods[1].end_date, date(2026, 2, 28));
    assert_eq!(periods[11].period_number, 12);
    assert_eq!(periods[11].end_date, date(2026, 12, 31));
    assert!(periods.iter().all(|m| m.status == PeriodStatus::Open && m.is_active));
}

#[tokio::test]
async fn test_fiscal_year_range_and_overlap_checks() {
    let fx = fixture().await;

    assert!(matches!(
        fx.engine.create_fiscal_year("Backwards", date(2027, 2, 1), date(2027, 1, 1)).await,
        Err(LedgerError::InvalidDateRange { .. })
    ));
    assert!(matches!(
        fx.engine.create_fiscal_year(" ", date(2027, 1, 1), date(2027, 12, 31)).await,
        Err(LedgerError::EmptyName)
    ));

    let err = fx
        .engine
        .create_fiscal_year("Overlap", date(2026, 7, 1), date(2027, 6, 30))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OverlappingFiscalYear(id) if id == fx.year.year.id));

    // Deactivating the year frees the range; reactivating it is then refused.
    fx.engine.set_fiscal_year_active(fx.year.year.id, false).await.unwrap();
    let other = fx
        .engine
        .create_fiscal_year("Overlap", date(2026, 7, 1), date(2027, 6, 30))
        .await
        .unwrap();
    assert_eq!(other.periods.len(), 12);
    assert!(matches!(
        fx.engine.set_fiscal_year_active(fx.year.year.id, true).await,
        Err(LedgerError::OverlappingFiscalYear(id)) if id == other.year.id
    ));
}

#[tokio::test]
async fn test_inactive_month_rejects_postings() {
    let fx = fixture().await;
    fx.engine.set_fiscal_year_active(fx.year.year.id, false).await.unwrap();

    let err = fx
        .create(date(2026, 3, 3), &[(fx.chart.cash, dec!(1), dec!(0)), (fx.chart.sales, dec!(0), dec!(1))])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PeriodInactive { name, .. } if name == "FY2026"));
}

#[tokio::test]
async fn test_month_close_reopen_reclose() {
    let fx = fixture().await;
    let march = fx.month(3).id;

    let closed = fx.engine.close_month(march, fx.actor).await.unwrap();
    assert_eq!(closed.status, PeriodStatus::Closed);
    assert_eq!(closed.audit.closed_by, Some(fx.actor));

    assert!(matches!(
        fx.engine.close_month(march, fx.actor).await,
        Err(LedgerError::InvalidPeriodTransition { .. })
    ));
    assert!(matches!(
        fx.engine.reclose_month(march, fx.actor).await,
        Err(LedgerError::InvalidPeriodTransition { .. })
    ));
    assert!(matches!(
        fx.engine.reopen_month(march, fx.actor, "").await,
        Err(LedgerError::ReasonRequired)
    ));

    let reopened = fx.engine.reopen_month(march, fx.actor, "Missing invoice").await.unwrap();
    assert_eq!(reopened.status, PeriodStatus::Reopened);
    assert_eq!(reopened.audit.reopen_reason.as_deref(), Some("Missing invoice"));

    fx.post(date(2026, 3, 30), &[(fx.chart.rent, dec!(40), dec!(0)), (fx.chart.cash, dec!(0), dec!(40))])
        .await;

    assert!(matches!(
        fx.engine.close_month(march, fx.actor).await,
        Err(LedgerError::InvalidPeriodTransition { .. })
    ));
    let reclosed = fx.engine.reclose_month(march, fx.actor).await.unwrap();
    assert_eq!(reclosed.status, PeriodStatus::Closed);
    assert_eq!(reclosed.audit.reclosed_by, Some(fx.actor));
    assert_eq!(reclosed.audit.closed_by, Some(fx.actor));
}

#[tokio::test]
async fn test_month_readiness_lists_every_reason() {
    let fx = fixture().await;
    let april = fx.month(4).id;
    fx.create(date(2026, 4, 2), &[(fx.chart.cash, dec!(3), dec!(0)), (fx.chart.sales, dec!(0), dec!(3))])
        .await
        .unwrap();

    let report = fx
        .engine
        .check_period_ready_to_close(PeriodScope::Month(april))
        .await
        .unwrap();
    assert!(matches!(report.reasons.as_slice(), [NotReadyReason::PendingEntries { entry_ids }] if entry_ids.len() == 1));
    assert!(matches!(
        fx.engine.close_month(april, fx.actor).await,
        Err(LedgerError::NotReadyToClose(_))
    ));

    let may = fx.engine.check_period_ready_to_close(PeriodScope::Month(fx.month(5).id)).await.unwrap();
    assert!(may.is_ready());
}

#[tokio::test]
async fn test_reopen_refused_when_active_year_overlaps() {
    let fx = fixture().await;
    let options = CloseOptions {
        open_next_year: false,
        ..CloseOptions::default()
    };
    fx.engine.close_period(fx.year.year.id, fx.actor, options).await.unwrap();
    fx.engine.set_fiscal_year_active(fx.year.year.id, false).await.unwrap();
    let replacement = fx
        .engine
        .create_fiscal_year("FY2026 restated", date(2026, 1, 1), date(2026, 12, 31))
        .await
        .unwrap();

    let err = fx
        .engine
        .reopen_period(fx.year.year.id, fx.actor, "Restatement")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ReopenOverlap(id) if id == replacement.year.id));
}

#[tokio::test]
async fn test_close_creates_next_year_with_same_month_count() {
    let fx = fixture().await;
    let summary = fx
        .engine
        .close_period(fx.year.year.id, fx.actor, CloseOptions::default())
        .await
        .unwrap();

    let next_id = summary.next_fiscal_year_id.unwrap();
    let store = fx.engine.store();
    let year = store.fiscal_year(next_id).await.unwrap().unwrap();
    assert_eq!(year.name, "FY2027");
    assert_eq!(year.start_date, date(2027, 1, 1));
    assert_eq!(year.end_date, date(2027, 12, 31));
    assert_eq!(year.status, PeriodStatus::Open);
    let months = store.periods(next_id).await.unwrap();
    assert_eq!(months.len(), 12);
}
