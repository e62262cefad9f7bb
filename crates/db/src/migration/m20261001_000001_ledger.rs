//! Ledger schema.
//!
//! Creates the enums, the chart of accounts, fiscal years with their months,
//! the per-year entry counters and the journal tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(FISCAL_YEARS_SQL).await?;
        db.execute_unprepared(MONTHLY_PERIODS_SQL).await?;
        db.execute_unprepared(ENTRY_SEQUENCES_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM (
    'asset',
    'liability',
    'equity',
    'revenue',
    'expense',
    'cost'
);

CREATE TYPE account_nature AS ENUM ('debit_increasing', 'credit_increasing');

-- Shared by fiscal years and monthly periods
CREATE TYPE period_status AS ENUM ('open', 'closed', 'reopened');

CREATE TYPE entry_status AS ENUM ('pending', 'approved', 'voided');

CREATE TYPE entry_kind AS ENUM ('regular', 'closing', 'opening');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id              UUID PRIMARY KEY,
    code            VARCHAR(64) NOT NULL,
    name            VARCHAR(255) NOT NULL,
    account_type    account_type NOT NULL,
    nature          account_nature NOT NULL,
    parent_id       UUID REFERENCES accounts(id) ON DELETE RESTRICT,
    is_parent       BOOLEAN NOT NULL DEFAULT FALSE,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_accounts_code UNIQUE (code),
    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_parent ON accounts(parent_id);
";

const FISCAL_YEARS_SQL: &str = r"
CREATE TABLE fiscal_years (
    id              UUID PRIMARY KEY,
    name            VARCHAR(100) NOT NULL,
    start_date      DATE NOT NULL,
    end_date        DATE NOT NULL,
    status          period_status NOT NULL DEFAULT 'open',
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    closed_by       UUID,
    closed_at       TIMESTAMPTZ,
    reopened_by     UUID,
    reopened_at     TIMESTAMPTZ,
    reopen_reason   TEXT,
    reclosed_by     UUID,
    reclosed_at     TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_fiscal_years_dates CHECK (end_date >= start_date)
);

CREATE INDEX idx_fiscal_years_dates ON fiscal_years(start_date, end_date);
";

const MONTHLY_PERIODS_SQL: &str = r"
CREATE TABLE monthly_periods (
    id              UUID PRIMARY KEY,
    fiscal_year_id  UUID NOT NULL REFERENCES fiscal_years(id) ON DELETE CASCADE,
    period_number   INTEGER NOT NULL,
    name            VARCHAR(100) NOT NULL,
    start_date      DATE NOT NULL,
    end_date        DATE NOT NULL,
    status          period_status NOT NULL DEFAULT 'open',
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    closed_by       UUID,
    closed_at       TIMESTAMPTZ,
    reopened_by     UUID,
    reopened_at     TIMESTAMPTZ,
    reopen_reason   TEXT,
    reclosed_by     UUID,
    reclosed_at     TIMESTAMPTZ,

    CONSTRAINT uq_monthly_periods_number UNIQUE (fiscal_year_id, period_number),
    CONSTRAINT chk_monthly_periods_dates CHECK (end_date >= start_date),
    CONSTRAINT chk_monthly_periods_number CHECK (period_number > 0)
);

CREATE INDEX idx_monthly_periods_dates ON monthly_periods(start_date, end_date);
";

const ENTRY_SEQUENCES_SQL: &str = r"
-- One counter per fiscal year; incremented with UPDATE ... RETURNING so
-- concurrent inserts serialize on the row lock. revision counts every entry
-- write in the year and guards year-end closes.
CREATE TABLE entry_sequences (
    fiscal_year_id  UUID PRIMARY KEY REFERENCES fiscal_years(id) ON DELETE CASCADE,
    last_value      BIGINT NOT NULL DEFAULT 0,
    revision        BIGINT NOT NULL DEFAULT 0,

    CONSTRAINT chk_entry_sequences_value CHECK (last_value >= 0),
    CONSTRAINT chk_entry_sequences_revision CHECK (revision >= 0)
);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id              UUID PRIMARY KEY,
    entry_number    BIGINT NOT NULL,
    fiscal_year_id  UUID NOT NULL REFERENCES fiscal_years(id) ON DELETE RESTRICT,
    period_id       UUID NOT NULL REFERENCES monthly_periods(id) ON DELETE RESTRICT,
    entry_date      DATE NOT NULL,
    description     TEXT NOT NULL,
    status          entry_status NOT NULL DEFAULT 'pending',
    kind            entry_kind NOT NULL DEFAULT 'regular',
    total_debit     NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_credit    NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_by      UUID NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    approved_by     UUID,
    approved_at     TIMESTAMPTZ,
    voided_by       UUID,
    voided_at       TIMESTAMPTZ,
    void_reason     TEXT,

    CONSTRAINT uq_journal_entries_number UNIQUE (fiscal_year_id, entry_number),
    CONSTRAINT chk_journal_entries_description CHECK (length(trim(description)) > 0),
    CONSTRAINT chk_journal_entries_void_reason CHECK (
        status <> 'voided' OR void_reason IS NOT NULL
    )
);

CREATE INDEX idx_journal_entries_date ON journal_entries(entry_date, entry_number);
CREATE INDEX idx_journal_entries_period ON journal_entries(period_id);
CREATE INDEX idx_journal_entries_status ON journal_entries(status);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id              UUID PRIMARY KEY,
    entry_id        UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id      UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    debit           NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit          NUMERIC(19, 4) NOT NULL DEFAULT 0,
    memo            TEXT,
    position        INTEGER NOT NULL,

    CONSTRAINT chk_journal_lines_non_negative CHECK (debit >= 0 AND credit >= 0),
    CONSTRAINT chk_journal_lines_one_side CHECK (
        (debit > 0 AND credit = 0) OR (credit > 0 AND debit = 0)
    ),
    CONSTRAINT uq_journal_lines_position UNIQUE (entry_id, position)
);

CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS journal_lines;
DROP TABLE IF EXISTS journal_entries;
DROP TABLE IF EXISTS entry_sequences;
DROP TABLE IF EXISTS monthly_periods;
DROP TABLE IF EXISTS fiscal_years;
DROP TABLE IF EXISTS accounts;

DROP TYPE IF EXISTS entry_kind;
DROP TYPE IF EXISTS entry_status;
DROP TYPE IF EXISTS period_status;
DROP TYPE IF EXISTS account_nature;
DROP TYPE IF EXISTS account_type;
";
