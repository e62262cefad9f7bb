//! Fiscal year closing and opening entries.
//!
//! A close is planned from a balance snapshot and written as one batch:
//!
//! 0. an assertion that the year's entries are unchanged since the snapshot
//! 1. closing entry zeroing every revenue/expense/cost account, with the net
//!    result posted to the result account as its balancing line
//! 2. every month not yet closed, then the year, marked closed
//! 3. optionally, the next fiscal year (created if missing) and an opening
//!    entry carrying every permanent account's post-closing balance
//!
//! The snapshot includes earlier closing entries, so a reclose only zeroes
//! movement booked since the previous close.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use quire_shared::types::{
    AccountId, ActorId, Amount, FiscalYearId, JournalEntryId, JournalLineId, MonthlyPeriodId,
};
use serde::{Deserialize, Serialize};

use crate::accounts::{Account, AccountType, ChartOfAccounts};
use crate::error::LedgerError;
use crate::fiscal::lifecycle::generate_monthly_periods;
use crate::fiscal::{
    CloseKind, DateWindow, FiscalYear, MonthlyPeriod, PeriodAudit, PeriodLifecycle, PeriodStatus,
};
use crate::ledger::{
    AccountBalances, EntryAudit, EntryKind, EntryStatus, JournalEntry, JournalLine, NewEntry,
    StatusChange,
};
use crate::store::{CommitReceipt, WriteBatch, WriteOp};

/// Caller choices for a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOptions {
    /// Equity account receiving the net result; falls back to the
    /// configured result account code.
    pub result_account_id: Option<AccountId>,
    /// Carry permanent balances into the next fiscal year.
    pub open_next_year: bool,
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self {
            result_account_id: None,
            open_next_year: true,
        }
    }
}

/// Identifier and number of a generated entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    /// Entry ID.
    pub id: JournalEntryId,
    /// Sequence number within its fiscal year.
    pub number: i64,
}

/// Outcome of a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingSummary {
    /// The closed year.
    pub fiscal_year_id: FiscalYearId,
    /// First close or reclose.
    pub kind: CloseKind,
    /// Generated closing entry, if any account needed zeroing.
    pub closing_entry: Option<EntryRef>,
    /// Net result: revenue minus expense minus cost.
    pub net_result: Amount,
    /// Temporary accounts zeroed.
    pub accounts_zeroed: usize,
    /// Months closed by this operation.
    pub months_closed: usize,
    /// Year that received the opening entry.
    pub next_fiscal_year_id: Option<FiscalYearId>,
    /// Whether that year was created by this close.
    pub next_fiscal_year_created: bool,
    /// Opening entry in the next year (new or kept unchanged).
    pub opening_entry: Option<EntryRef>,
    /// Previous opening entries voided and replaced.
    pub voided_opening_entries: Vec<JournalEntryId>,
}

/// Where the opening entry goes.
#[derive(Debug, Clone, Copy)]
pub enum NextYear<'a> {
    /// An existing fiscal year starting the day after the closed one ends.
    Existing {
        /// The year.
        year: &'a FiscalYear,
        /// Its months.
        periods: &'a [MonthlyPeriod],
        /// Its non-voided opening entries.
        opening_entries: &'a [JournalEntry],
    },
    /// A year to create over this range.
    Create(DateWindow),
}

/// A planned close: the batch to commit plus the summary to complete.
#[derive(Debug, Clone)]
pub struct ClosingPlan {
    /// Writes to commit atomically.
    pub batch: WriteBatch,
    summary: ClosingSummary,
    closing_entry_id: Option<JournalEntryId>,
    opening_entry_id: Option<JournalEntryId>,
    kept_opening_entry: Option<EntryRef>,
}

impl ClosingPlan {
    /// Completes the summary with the numbers the store assigned.
    #[must_use]
    pub fn finish(self, receipt: &CommitReceipt) -> ClosingSummary {
        let reference = |id: JournalEntryId| {
            receipt
                .number_of(id)
                .map(|number| EntryRef { id, number })
        };
        let mut summary = self.summary;
        summary.closing_entry = self.closing_entry_id.and_then(reference);
        summary.opening_entry = self
            .opening_entry_id
            .and_then(reference)
            .or(self.kept_opening_entry);
        summary
    }

    /// Summary before commit; entry numbers are not known yet.
    #[must_use]
    pub const fn pending_summary(&self) -> &ClosingSummary {
        &self.summary
    }
}

type Posting = (AccountId, Amount, Amount);

/// Plans the close of one fiscal year.
#[derive(Debug, Clone, Copy)]
pub struct ClosingPlanner<'a> {
    /// Current chart.
    pub chart: &'a ChartOfAccounts,
    /// Approved balances over the whole year.
    pub balances: &'a AccountBalances,
    /// Entry revision of the year, read before the balances.
    pub entry_revision: i64,
    /// The year being closed.
    pub year: &'a FiscalYear,
    /// Its months.
    pub months: &'a [MonthlyPeriod],
    /// Account receiving the net result.
    pub result_account: &'a Account,
    /// Actor performing the close.
    pub actor: ActorId,
    /// Time of the close.
    pub now: DateTime<Utc>,
}

impl<'a> ClosingPlanner<'a> {
    /// Checks that an account can receive the net result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResultAccount` unless it is an active equity leaf.
    pub fn check_result_account(account: &Account) -> Result<(), LedgerError> {
        if account.account_type == AccountType::Equity && account.can_receive_postings() {
            Ok(())
        } else {
            Err(LedgerError::InvalidResultAccount(account.id))
        }
    }

    /// Zeroing postings for temporary accounts and the net result.
    #[must_use]
    pub fn closing_postings(&self) -> (Vec<Posting>, Amount) {
        let mut postings = Vec::new();
        let mut net_result = Amount::ZERO;

        for account in self.chart.iter().filter(|a| a.account_type.is_temporary()) {
            let balance = self
                .balances
                .get(account.id)
                .map_or(Amount::ZERO, |b| b.own_balance);
            if balance.is_zero() {
                continue;
            }
            match account.account_type {
                AccountType::Revenue => net_result += balance,
                _ => net_result -= balance,
            }
            // The posting that created the balance, mirrored.
            let (debit, credit) = account.nature.posting_for(balance);
            postings.push((account.id, credit, debit));
        }

        (postings, net_result)
    }

    /// Permanent accounts' balances once the closing postings land.
    #[must_use]
    pub fn post_closing_balances(&self, closing: &[Posting]) -> Vec<(AccountId, Amount)> {
        let mut adjustments: HashMap<AccountId, Amount> = HashMap::new();
        for (account_id, debit, credit) in closing {
            if let Some(account) = self.chart.get(*account_id) {
                *adjustments.entry(*account_id).or_default() +=
                    account.nature.balance_change(*debit, *credit);
            }
        }

        self.chart
            .iter()
            .filter(|a| a.account_type.is_permanent())
            .filter_map(|account| {
                let own = self
                    .balances
                    .get(account.id)
                    .map_or(Amount::ZERO, |b| b.own_balance);
                let balance = own + adjustments.get(&account.id).copied().unwrap_or_default();
                (!balance.is_zero()).then_some((account.id, balance))
            })
            .collect()
    }

    /// Opening postings reproducing the post-closing balances.
    #[must_use]
    pub fn opening_postings(&self, post_closing: &[(AccountId, Amount)]) -> Vec<Posting> {
        post_closing
            .iter()
            .filter_map(|(account_id, balance)| {
                let account = self.chart.get(*account_id)?;
                let (debit, credit) = account.nature.posting_for(*balance);
                Some((*account_id, debit, credit))
            })
            .collect()
    }

    /// Builds the batch for closing the year.
    ///
    /// # Errors
    ///
    /// Returns an error if the year has no month containing its end date, the
    /// next year is closed, or its first month is missing or closed.
    pub fn plan(&self, kind: CloseKind, next: Option<NextYear<'_>>) -> Result<ClosingPlan, LedgerError> {
        let mut batch = WriteBatch::from(WriteOp::ExpectEntryRevision {
            fiscal_year_id: self.year.id,
            revision: self.entry_revision,
        });

        let (mut closing, net_result) = self.closing_postings();
        let accounts_zeroed = closing.len();
        if !net_result.is_zero() {
            let (debit, credit) = if net_result.is_positive() {
                (Amount::ZERO, net_result)
            } else {
                (net_result.abs(), Amount::ZERO)
            };
            closing.push((self.result_account.id, debit, credit));
        }

        let closing_entry_id = if closing.is_empty() {
            None
        } else {
            let last_month = self
                .months
                .iter()
                .find(|m| m.contains_date(self.year.end_date))
                .ok_or(LedgerError::NoPeriodForDate(self.year.end_date))?;
            let entry = self.system_entry(
                self.year.id,
                last_month.id,
                self.year.end_date,
                format!("Closing entry {}", self.year.name),
                EntryKind::Closing,
                &closing,
            );
            let id = entry.id;
            batch.push(WriteOp::InsertEntry(entry));
            Some(id)
        };

        let mut months_closed = 0;
        for month in self.months {
            let month_kind = match month.status {
                PeriodStatus::Open => CloseKind::Close,
                PeriodStatus::Reopened => CloseKind::Reclose,
                PeriodStatus::Closed => continue,
            };
            let mut closed = month.clone();
            PeriodLifecycle::apply_close(&mut closed.status, &mut closed.audit, month_kind, self.actor, self.now);
            batch.push(WriteOp::UpdatePeriod {
                expected: month.status,
                period: closed,
            });
            months_closed += 1;
        }

        let mut closed_year = self.year.clone();
        PeriodLifecycle::apply_close(&mut closed_year.status, &mut closed_year.audit, kind, self.actor, self.now);
        batch.push(WriteOp::UpdateFiscalYear {
            expected: self.year.status,
            year: closed_year,
        });

        let mut summary = ClosingSummary {
            fiscal_year_id: self.year.id,
            kind,
            closing_entry: None,
            net_result,
            accounts_zeroed,
            months_closed,
            next_fiscal_year_id: None,
            next_fiscal_year_created: false,
            opening_entry: None,
            voided_opening_entries: Vec::new(),
        };

        let mut opening_entry_id = None;
        let mut kept_opening_entry = None;
        if let Some(next) = next {
            let post_closing = self.post_closing_balances(&closing);
            let opening = self.opening_postings(&post_closing);
            let (next_year_id, first_month_id, start, existing) =
                self.prepare_next_year(next, &mut batch, &mut summary)?;

            if let Some(kept) = matching_opening_entry(existing, &opening) {
                kept_opening_entry = Some(kept);
            } else {
                for previous in existing {
                    batch.push(WriteOp::UpdateEntryStatus {
                        entry_id: previous.id,
                        expected: previous.status,
                        change: StatusChange::Void {
                            voided_by: self.actor,
                            voided_at: self.now,
                            reason: format!("Superseded by reclose of {}", self.year.name),
                        },
                    });
                    summary.voided_opening_entries.push(previous.id);
                }
                if !opening.is_empty() {
                    let entry = self.system_entry(
                        next_year_id,
                        first_month_id,
                        start,
                        format!("Opening balances carried from {}", self.year.name),
                        EntryKind::Opening,
                        &opening,
                    );
                    opening_entry_id = Some(entry.id);
                    batch.push(WriteOp::InsertEntry(entry));
                }
            }
        }

        Ok(ClosingPlan {
            batch,
            summary,
            closing_entry_id,
            opening_entry_id,
            kept_opening_entry,
        })
    }

    fn prepare_next_year<'n>(
        &self,
        next: NextYear<'n>,
        batch: &mut WriteBatch,
        summary: &mut ClosingSummary,
    ) -> Result<(FiscalYearId, MonthlyPeriodId, chrono::NaiveDate, &'n [JournalEntry]), LedgerError> {
        match next {
            NextYear::Existing {
                year,
                periods,
                opening_entries,
            } => {
                if year.status.is_closed() {
                    return Err(LedgerError::period_closed(&year.name, year.window()));
                }
                let first = periods
                    .iter()
                    .find(|m| m.contains_date(year.start_date))
                    .ok_or(LedgerError::NoPeriodForDate(year.start_date))?;
                if first.status.is_closed() {
                    return Err(LedgerError::period_closed(&first.name, first.window()));
                }
                summary.next_fiscal_year_id = Some(year.id);
                Ok((year.id, first.id, year.start_date, opening_entries))
            }
            NextYear::Create(window) => {
                let year = FiscalYear {
                    id: FiscalYearId::new(),
                    name: format!("FY{}", window.end.year()),
                    start_date: window.start,
                    end_date: window.end,
                    status: PeriodStatus::Open,
                    is_active: true,
                    audit: PeriodAudit::default(),
                    created_at: self.now,
                };
                let periods = generate_monthly_periods(year.id, window.start, window.end);
                let first = periods
                    .first()
                    .map(|m| m.id)
                    .ok_or(LedgerError::NoPeriodForDate(window.start))?;
                let id = year.id;
                batch.push(WriteOp::InsertFiscalYear(year));
                for period in periods {
                    batch.push(WriteOp::InsertPeriod(period));
                }
                summary.next_fiscal_year_id = Some(id);
                summary.next_fiscal_year_created = true;
                Ok((id, first, window.start, &[]))
            }
        }
    }

    fn system_entry(
        &self,
        fiscal_year_id: FiscalYearId,
        period_id: MonthlyPeriodId,
        date: chrono::NaiveDate,
        description: String,
        kind: EntryKind,
        postings: &[Posting],
    ) -> NewEntry {
        let id = JournalEntryId::new();
        let lines = postings
            .iter()
            .enumerate()
            .map(|(position, (account_id, debit, credit))| JournalLine {
                id: JournalLineId::new(),
                entry_id: id,
                account_id: *account_id,
                debit: *debit,
                credit: *credit,
                memo: None,
                position: u32::try_from(position).unwrap_or(u32::MAX),
            })
            .collect();
        let mut audit = EntryAudit::created(self.actor, self.now);
        audit.approved_by = Some(self.actor);
        audit.approved_at = Some(self.now);

        NewEntry {
            id,
            fiscal_year_id,
            period_id,
            date,
            description,
            status: EntryStatus::Approved,
            kind,
            lines,
            audit,
        }
    }
}

/// The single existing opening entry if it already carries exactly these
/// postings.
fn matching_opening_entry(existing: &[JournalEntry], postings: &[Posting]) -> Option<EntryRef> {
    let [entry] = existing else {
        return None;
    };
    let mut current: Vec<Posting> = entry
        .lines
        .iter()
        .map(|l| (l.account_id, l.debit, l.credit))
        .collect();
    let mut wanted = postings.to_vec();
    current.sort();
    wanted.sort();
    (current == wanted && !wanted.is_empty()).then_some(EntryRef {
        id: entry.id,
        number: entry.number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountCode;
    use crate::fiscal::lifecycle::generate_monthly_periods;
    use crate::ledger::{BalanceAggregator, EntryTotals};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(code: &str, account_type: AccountType) -> Account {
        Account {
            id: AccountId::new(),
            code: AccountCode::parse(code).unwrap(),
            name: code.to_string(),
            account_type,
            nature: account_type.default_nature(),
            parent_id: None,
            is_parent: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn approved(year: &FiscalYear, lines: &[(AccountId, rust_decimal::Decimal, rust_decimal::Decimal)]) -> JournalEntry {
        let id = JournalEntryId::new();
        let lines: Vec<JournalLine> = lines
            .iter()
            .enumerate()
            .map(|(i, (account_id, debit, credit))| JournalLine {
                id: JournalLineId::new(),
                entry_id: id,
                account_id: *account_id,
                debit: Amount::new(*debit),
                credit: Amount::new(*credit),
                memo: None,
                position: u32::try_from(i).unwrap(),
            })
            .collect();
        JournalEntry {
            id,
            number: 1,
            fiscal_year_id: year.id,
            period_id: MonthlyPeriodId::new(),
            date: date(2026, 6, 1),
            description: "test".into(),
            status: EntryStatus::Approved,
            kind: EntryKind::Regular,
            totals: EntryTotals::from_lines(&lines),
            lines,
            audit: EntryAudit::created(ActorId::new(), Utc::now()),
        }
    }

    struct Fixture {
        cash: Account,
        payable: Account,
        capital: Account,
        result: Account,
        sales: Account,
        rent: Account,
        cogs: Account,
        chart: ChartOfAccounts,
        year: FiscalYear,
        months: Vec<MonthlyPeriod>,
    }

    fn fixture() -> Fixture {
        let cash = account("1.1", AccountType::Asset);
        let payable = account("2.1", AccountType::Liability);
        let capital = account("3.1", AccountType::Equity);
        let result = account("3.3", AccountType::Equity);
        let sales = account("4.1", AccountType::Revenue);
        let rent = account("5.1", AccountType::Expense);
        let cogs = account("6.1", AccountType::Cost);
        let chart = ChartOfAccounts::build(vec![
            cash.clone(),
            payable.clone(),
            capital.clone(),
            result.clone(),
            sales.clone(),
            rent.clone(),
            cogs.clone(),
        ])
        .unwrap();
        let year = FiscalYear {
            id: FiscalYearId::new(),
            name: "FY2026".into(),
            start_date: date(2026, 1, 1),
            end_date: date(2026, 12, 31),
            status: PeriodStatus::Open,
            is_active: true,
            audit: PeriodAudit::default(),
            created_at: Utc::now(),
        };
        let months = generate_monthly_periods(year.id, year.start_date, year.end_date);
        Fixture { cash, payable, capital, result, sales, rent, cogs, chart, year, months }
    }

    fn planner<'a>(f: &'a Fixture, balances: &'a AccountBalances) -> ClosingPlanner<'a> {
        ClosingPlanner {
            chart: &f.chart,
            balances,
            entry_revision: 7,
            year: &f.year,
            months: &f.months,
            result_account: &f.result,
            actor: ActorId::new(),
            now: Utc::now(),
        }
    }

    fn closing_entry(plan: &ClosingPlan) -> &NewEntry {
        plan.batch
            .ops()
            .iter()
            .find_map(|op| match op {
                WriteOp::InsertEntry(entry) if entry.kind == EntryKind::Closing => Some(entry),
                _ => None,
            })
            .expect("closing entry")
    }

    #[test]
    fn test_profit_credits_result_account() {
        let f = fixture();
        let entries = vec![
            approved(&f.year, &[(f.cash.id, dec!(1000), dec!(0)), (f.sales.id, dec!(0), dec!(1000))]),
            approved(&f.year, &[(f.rent.id, dec!(300), dec!(0)), (f.cash.id, dec!(0), dec!(300))]),
            approved(&f.year, &[(f.cogs.id, dec!(200), dec!(0)), (f.cash.id, dec!(0), dec!(200))]),
        ];
        let balances = BalanceAggregator::aggregate(&f.chart, &entries, &f.year.window());
        let planner = planner(&f, &balances);

        let (postings, net) = planner.closing_postings();
        assert_eq!(net, Amount::new(dec!(500)));
        assert!(postings.contains(&(f.sales.id, Amount::new(dec!(1000)), Amount::ZERO)));
        assert!(postings.contains(&(f.rent.id, Amount::ZERO, Amount::new(dec!(300)))));
        assert!(postings.contains(&(f.cogs.id, Amount::ZERO, Amount::new(dec!(200)))));

        let plan = planner.plan(CloseKind::Close, None).unwrap();
        assert_eq!(
            plan.batch.ops().first(),
            Some(&WriteOp::ExpectEntryRevision {
                fiscal_year_id: f.year.id,
                revision: 7,
            })
        );
        let closing = closing_entry(&plan);
        assert_eq!(closing.status, EntryStatus::Approved);
        assert_eq!(closing.date, date(2026, 12, 31));
        assert!(closing.totals().is_balanced());
        let result_line = closing.lines.iter().find(|l| l.account_id == f.result.id).unwrap();
        assert_eq!(result_line.credit, Amount::new(dec!(500)));
        assert_eq!(plan.pending_summary().months_closed, 12);
    }

    #[test]
    fn test_loss_debits_result_account() {
        let f = fixture();
        let entries = vec![
            approved(&f.year, &[(f.cash.id, dec!(100), dec!(0)), (f.sales.id, dec!(0), dec!(100))]),
            approved(&f.year, &[(f.rent.id, dec!(250), dec!(0)), (f.cash.id, dec!(0), dec!(250))]),
        ];
        let balances = BalanceAggregator::aggregate(&f.chart, &entries, &f.year.window());
        let plan = planner(&f, &balances).plan(CloseKind::Close, None).unwrap();
        let closing = closing_entry(&plan);
        let result_line = closing.lines.iter().find(|l| l.account_id == f.result.id).unwrap();
        assert_eq!(result_line.debit, Amount::new(dec!(150)));
        assert_eq!(plan.pending_summary().net_result, Amount::new(dec!(-150)));
    }

    #[test]
    fn test_opening_carries_permanent_balances() {
        let f = fixture();
        // Cash 500, Payable 200, Equity 300 after closing.
        let entries = vec![
            approved(&f.year, &[(f.cash.id, dec!(100), dec!(0)), (f.capital.id, dec!(0), dec!(100))]),
            approved(&f.year, &[(f.cash.id, dec!(200), dec!(0)), (f.payable.id, dec!(0), dec!(200))]),
            approved(&f.year, &[(f.cash.id, dec!(200), dec!(0)), (f.sales.id, dec!(0), dec!(200))]),
        ];
        let balances = BalanceAggregator::aggregate(&f.chart, &entries, &f.year.window());
        let planner = planner(&f, &balances);
        let (mut closing, net) = planner.closing_postings();
        closing.push((f.result.id, Amount::ZERO, net));

        let post_closing = planner.post_closing_balances(&closing);
        let opening = planner.opening_postings(&post_closing);
        assert_eq!(
            opening,
            vec![
                (f.cash.id, Amount::new(dec!(500)), Amount::ZERO),
                (f.payable.id, Amount::ZERO, Amount::new(dec!(200))),
                (f.capital.id, Amount::ZERO, Amount::new(dec!(100))),
                (f.result.id, Amount::ZERO, Amount::new(dec!(200))),
            ]
        );
    }

    #[test]
    fn test_creates_next_year_when_missing() {
        let f = fixture();
        let entries = vec![approved(&f.year, &[(f.cash.id, dec!(50), dec!(0)), (f.capital.id, dec!(0), dec!(50))])];
        let balances = BalanceAggregator::aggregate(&f.chart, &entries, &f.year.window());
        let window = DateWindow::new(date(2027, 1, 1), date(2027, 12, 31)).unwrap();

        let plan = planner(&f, &balances).plan(CloseKind::Close, Some(NextYear::Create(window))).unwrap();
        let summary = plan.pending_summary();
        assert!(summary.next_fiscal_year_created);
        assert!(summary.closing_entry.is_none());
        let inserted_periods = plan
            .batch
            .ops()
            .iter()
            .filter(|op| matches!(op, WriteOp::InsertPeriod(_)))
            .count();
        assert_eq!(inserted_periods, 12);
        let Some(WriteOp::InsertEntry(opening)) = plan.batch.ops().last() else {
            panic!("opening entry last");
        };
        assert_eq!(opening.kind, EntryKind::Opening);
        assert_eq!(opening.date, date(2027, 1, 1));
    }

    #[test]
    fn test_rejects_non_equity_result_account() {
        let f = fixture();
        assert!(ClosingPlanner::check_result_account(&f.result).is_ok());
        assert!(matches!(
            ClosingPlanner::check_result_account(&f.cash),
            Err(LedgerError::InvalidResultAccount(_))
        ));
    }
}
