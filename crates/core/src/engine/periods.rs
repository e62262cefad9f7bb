//! Fiscal year and month lifecycle operations, including the year-end close.

use chrono::NaiveDate;
use quire_shared::types::{ActorId, FiscalYearId, MonthlyPeriodId};
use tracing::info;

use super::{LedgerEngine, log_failure};
use crate::closing::{ClosingPlanner, ClosingSummary, CloseOptions, NextYear};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::fiscal::lifecycle::{
    date_ranges_overlap, generate_monthly_periods, next_year_range, validate_date_range,
};
use crate::fiscal::{
    CloseKind, DateWindow, FiscalYear, FiscalYearWithPeriods, MonthlyPeriod, PeriodAudit,
    PeriodLifecycle, PeriodScope, PeriodStatus,
};
use crate::ledger::{BalanceAggregator, EntryKind, EntryStatus, JournalEntry};
use crate::store::{EntryQuery, LedgerStore, WriteBatch, WriteOp};

impl<S: LedgerStore, C: Clock> LedgerEngine<S, C> {
    /// Creates a fiscal year with one month per calendar month of its range.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName`, `InvalidDateRange`, or `OverlappingFiscalYear`
    /// if an active year covers any of the dates.
    pub async fn create_fiscal_year(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<FiscalYearWithPeriods, LedgerError> {
        self.create_year(name, start_date, end_date)
            .await
            .inspect_err(|e| log_failure("create_fiscal_year", e))
    }

    async fn create_year(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<FiscalYearWithPeriods, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let window = validate_date_range(start_date, end_date)?;
        let years = self.store.fiscal_years().await.map_err(LedgerError::storage)?;
        if let Some(other) = overlapping_active(&years, window, None) {
            return Err(LedgerError::OverlappingFiscalYear(other.id));
        }

        let year = FiscalYear {
            id: FiscalYearId::new(),
            name: name.to_string(),
            start_date,
            end_date,
            status: PeriodStatus::Open,
            is_active: true,
            audit: PeriodAudit::default(),
            created_at: self.clock.now(),
        };
        let periods = generate_monthly_periods(year.id, start_date, end_date);

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertFiscalYear(year.clone()));
        for period in &periods {
            batch.push(WriteOp::InsertPeriod(period.clone()));
        }
        self.commit(batch).await?;

        info!(
            fiscal_year_id = %year.id,
            name = %year.name,
            %start_date,
            %end_date,
            months = periods.len(),
            "Fiscal year created"
        );
        Ok(FiscalYearWithPeriods { year, periods })
    }

    /// Activates or deactivates a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `OverlappingFiscalYear` when activating a year that overlaps
    /// another active one.
    pub async fn set_fiscal_year_active(
        &self,
        fiscal_year_id: FiscalYearId,
        active: bool,
    ) -> Result<FiscalYear, LedgerError> {
        self.set_year_active(fiscal_year_id, active)
            .await
            .inspect_err(|e| log_failure("set_fiscal_year_active", e))
    }

    async fn set_year_active(
        &self,
        fiscal_year_id: FiscalYearId,
        active: bool,
    ) -> Result<FiscalYear, LedgerError> {
        let current = self.require_year(fiscal_year_id).await?;
        if current.is_active == active {
            return Ok(current);
        }
        if active {
            let years = self.store.fiscal_years().await.map_err(LedgerError::storage)?;
            if let Some(other) = overlapping_active(&years, current.window(), Some(current.id)) {
                return Err(LedgerError::OverlappingFiscalYear(other.id));
            }
        }

        let mut year = current.clone();
        year.is_active = active;
        self.commit(WriteBatch::from(WriteOp::UpdateFiscalYear {
            expected: current.status,
            year: year.clone(),
        }))
        .await?;

        info!(fiscal_year_id = %year.id, active, "Fiscal year activation changed");
        Ok(year)
    }

    /// Closes an open month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` unless the month is open, or
    /// `NotReadyToClose` with every unmet precondition.
    pub async fn close_month(
        &self,
        period_id: MonthlyPeriodId,
        actor: ActorId,
    ) -> Result<MonthlyPeriod, LedgerError> {
        self.close_one_month(period_id, actor, CloseKind::Close)
            .await
            .inspect_err(|e| log_failure("close_month", e))
    }

    /// Closes a reopened month again.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` unless the month was reopened, or
    /// `NotReadyToClose` with every unmet precondition.
    pub async fn reclose_month(
        &self,
        period_id: MonthlyPeriodId,
        actor: ActorId,
    ) -> Result<MonthlyPeriod, LedgerError> {
        self.close_one_month(period_id, actor, CloseKind::Reclose)
            .await
            .inspect_err(|e| log_failure("reclose_month", e))
    }

    async fn close_one_month(
        &self,
        period_id: MonthlyPeriodId,
        actor: ActorId,
        kind: CloseKind,
    ) -> Result<MonthlyPeriod, LedgerError> {
        let current = self.require_period(period_id).await?;
        match kind {
            CloseKind::Close => PeriodLifecycle::check_close_month(current.status)?,
            CloseKind::Reclose => PeriodLifecycle::check_reclose(current.status)?,
        }
        let report = self.readiness(PeriodScope::Month(period_id)).await?;
        if !report.is_ready() {
            return Err(LedgerError::NotReadyToClose(report.reasons));
        }

        let mut month = current.clone();
        PeriodLifecycle::apply_close(&mut month.status, &mut month.audit, kind, actor, self.clock.now());
        self.commit(WriteBatch::from(WriteOp::UpdatePeriod {
            expected: current.status,
            period: month.clone(),
        }))
        .await?;

        info!(period_id = %month.id, name = %month.name, ?kind, closed_by = %actor, "Month closed");
        Ok(month)
    }

    /// Reopens a closed month with a justification.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `ParentYearClosed` while the fiscal year is
    /// closed, or `InvalidPeriodTransition` unless the month is closed.
    pub async fn reopen_month(
        &self,
        period_id: MonthlyPeriodId,
        actor: ActorId,
        reason: &str,
    ) -> Result<MonthlyPeriod, LedgerError> {
        self.reopen_one_month(period_id, actor, reason)
            .await
            .inspect_err(|e| log_failure("reopen_month", e))
    }

    async fn reopen_one_month(
        &self,
        period_id: MonthlyPeriodId,
        actor: ActorId,
        reason: &str,
    ) -> Result<MonthlyPeriod, LedgerError> {
        let current = self.require_period(period_id).await?;
        let reason = PeriodLifecycle::check_reopen(current.status, reason)?;
        let year = self.require_year(current.fiscal_year_id).await?;
        if year.status.is_closed() {
            return Err(LedgerError::ParentYearClosed(year.id));
        }

        let mut month = current.clone();
        PeriodLifecycle::apply_reopen(&mut month.status, &mut month.audit, actor, self.clock.now(), &reason);
        self.commit(WriteBatch::from(WriteOp::UpdatePeriod {
            expected: current.status,
            period: month.clone(),
        }))
        .await?;

        info!(period_id = %month.id, name = %month.name, reopened_by = %actor, %reason, "Month reopened");
        Ok(month)
    }

    /// Closes a fiscal year: generates the closing entry, closes every month
    /// and the year, and optionally opens the next year, all in one commit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` if the year is already closed,
    /// `NotReadyToClose` with every unmet precondition, an error about the
    /// result account, or an error about the next fiscal year.
    pub async fn close_period(
        &self,
        fiscal_year_id: FiscalYearId,
        actor: ActorId,
        options: CloseOptions,
    ) -> Result<ClosingSummary, LedgerError> {
        self.close_year(fiscal_year_id, actor, options)
            .await
            .inspect_err(|e| log_failure("close_period", e))
    }

    async fn close_year(
        &self,
        fiscal_year_id: FiscalYearId,
        actor: ActorId,
        options: CloseOptions,
    ) -> Result<ClosingSummary, LedgerError> {
        let year = self.require_year(fiscal_year_id).await?;
        let kind = PeriodLifecycle::close_kind(year.status)?;
        // Read before any entry, so a write landing after this point fails
        // the close instead of slipping past its snapshot.
        let entry_revision = self
            .store
            .entry_revision(fiscal_year_id)
            .await
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::FiscalYearNotFound(fiscal_year_id))?;
        let report = self.readiness(PeriodScope::Year(fiscal_year_id)).await?;
        if !report.is_ready() {
            return Err(LedgerError::NotReadyToClose(report.reasons));
        }

        let chart = self.load_chart().await?;
        let result_account = match options.result_account_id {
            Some(id) => chart.get(id).ok_or(LedgerError::AccountNotFound(id))?,
            None => chart
                .find_by_code(&self.policy.result_account_code)
                .ok_or_else(|| LedgerError::AccountCodeNotFound(self.policy.result_account_code.clone()))?,
        };
        ClosingPlanner::check_result_account(result_account)?;

        let months = self
            .store
            .periods(fiscal_year_id)
            .await
            .map_err(LedgerError::storage)?;
        let entries = self
            .store
            .entries(&EntryQuery::approved_in(year.window()))
            .await
            .map_err(LedgerError::storage)?;
        let balances = BalanceAggregator::aggregate(&chart, &entries, &year.window());

        let years = if options.open_next_year {
            self.store.fiscal_years().await.map_err(LedgerError::storage)?
        } else {
            Vec::new()
        };
        let next_start = year.end_date.succ_opt();
        let existing_next = years
            .iter()
            .find(|y| y.id != year.id && Some(y.start_date) == next_start);
        let (next_periods, next_openings) = match existing_next {
            Some(next) => (
                self.store.periods(next.id).await.map_err(LedgerError::storage)?,
                self.opening_entries(next.id).await?,
            ),
            None => (Vec::new(), Vec::new()),
        };
        let next = if !options.open_next_year {
            None
        } else if let Some(next) = existing_next {
            Some(NextYear::Existing {
                year: next,
                periods: &next_periods,
                opening_entries: &next_openings,
            })
        } else {
            let window = next_year_range(year.window()).ok_or(
                LedgerError::InvalidDateRange {
                    start: year.start_date,
                    end: year.end_date,
                },
            )?;
            if let Some(other) = overlapping_active(&years, window, Some(year.id)) {
                return Err(LedgerError::OverlappingFiscalYear(other.id));
            }
            Some(NextYear::Create(window))
        };

        let planner = ClosingPlanner {
            chart: &chart,
            balances: &balances,
            entry_revision,
            year: &year,
            months: &months,
            result_account,
            actor,
            now: self.clock.now(),
        };
        let mut plan = planner.plan(kind, next)?;
        let batch = std::mem::take(&mut plan.batch);
        let receipt = self.commit(batch).await?;
        let summary = plan.finish(&receipt);

        info!(
            fiscal_year_id = %year.id,
            name = %year.name,
            ?kind,
            net_result = %summary.net_result,
            accounts_zeroed = summary.accounts_zeroed,
            months_closed = summary.months_closed,
            closing_entry = ?summary.closing_entry.map(|e| e.number),
            opening_entry = ?summary.opening_entry.map(|e| e.number),
            closed_by = %actor,
            "Fiscal year closed"
        );
        Ok(summary)
    }

    /// Reopens a closed fiscal year and every closed month in it.
    ///
    /// The year becomes active again. The justification is recorded on the
    /// year and on each reopened month.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidPeriodTransition` unless the year is
    /// closed, or `ReopenOverlap` if another active year overlaps it.
    pub async fn reopen_period(
        &self,
        fiscal_year_id: FiscalYearId,
        actor: ActorId,
        reason: &str,
    ) -> Result<FiscalYearWithPeriods, LedgerError> {
        self.reopen_year(fiscal_year_id, actor, reason)
            .await
            .inspect_err(|e| log_failure("reopen_period", e))
    }

    async fn reopen_year(
        &self,
        fiscal_year_id: FiscalYearId,
        actor: ActorId,
        reason: &str,
    ) -> Result<FiscalYearWithPeriods, LedgerError> {
        let current = self.require_year(fiscal_year_id).await?;
        let reason = PeriodLifecycle::check_reopen(current.status, reason)?;
        let years = self.store.fiscal_years().await.map_err(LedgerError::storage)?;
        if let Some(other) = overlapping_active(&years, current.window(), Some(current.id)) {
            return Err(LedgerError::ReopenOverlap(other.id));
        }

        let now = self.clock.now();
        let mut year = current.clone();
        PeriodLifecycle::apply_reopen(&mut year.status, &mut year.audit, actor, now, &reason);
        year.is_active = true;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpdateFiscalYear {
            expected: current.status,
            year: year.clone(),
        });

        let mut periods = self
            .store
            .periods(fiscal_year_id)
            .await
            .map_err(LedgerError::storage)?;
        let mut reopened = 0;
        for month in periods.iter_mut().filter(|m| m.status.is_closed()) {
            let expected = month.status;
            PeriodLifecycle::apply_reopen(&mut month.status, &mut month.audit, actor, now, &reason);
            batch.push(WriteOp::UpdatePeriod {
                expected,
                period: month.clone(),
            });
            reopened += 1;
        }
        self.commit(batch).await?;

        info!(
            fiscal_year_id = %year.id,
            name = %year.name,
            months_reopened = reopened,
            reopened_by = %actor,
            %reason,
            "Fiscal year reopened"
        );
        Ok(FiscalYearWithPeriods { year, periods })
    }

    async fn opening_entries(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<JournalEntry>, LedgerError> {
        let entries = self
            .store
            .entries(&EntryQuery::for_year(fiscal_year_id))
            .await
            .map_err(LedgerError::storage)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::Opening && e.status != EntryStatus::Voided)
            .collect())
    }
}

fn overlapping_active(
    years: &[FiscalYear],
    window: DateWindow,
    except: Option<FiscalYearId>,
) -> Option<&FiscalYear> {
    years
        .iter()
        .filter(|y| y.is_active && Some(y.id) != except)
        .find(|y| date_ranges_overlap(y.window(), window))
}
