//! Database seeder for Quire development and testing.
//!
//! Seeds a demo chart of accounts and a fiscal year covering the current
//! calendar year. Existing account codes and overlapping years are left
//! alone, so the seeder can be run repeatedly.
//!
//! Usage: cargo run --bin seeder

use std::collections::HashMap;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use quire_core::accounts::{AccountType, NewAccount};
use quire_core::{LedgerEngine, LedgerError, LedgerPolicy};
use quire_db::PgLedgerStore;
use quire_shared::AppConfig;
use quire_shared::telemetry::init_tracing;
use quire_shared::types::AccountId;
use tracing::{info, warn};

/// `(code, name, type, is_parent)`; parents are derived from the code.
const DEMO_CHART: &[(&str, &str, AccountType, bool)] = &[
    ("1", "Assets", AccountType::Asset, true),
    ("1.1", "Cash", AccountType::Asset, false),
    ("1.2", "Bank", AccountType::Asset, false),
    ("1.3", "Accounts receivable", AccountType::Asset, false),
    ("2", "Liabilities", AccountType::Liability, true),
    ("2.1", "Accounts payable", AccountType::Liability, false),
    ("2.2", "Taxes payable", AccountType::Liability, false),
    ("3", "Equity", AccountType::Equity, true),
    ("3.1", "Share capital", AccountType::Equity, false),
    ("3.2", "Retained earnings", AccountType::Equity, false),
    ("3.3", "Period result", AccountType::Equity, false),
    ("4", "Revenue", AccountType::Revenue, true),
    ("4.1", "Sales", AccountType::Revenue, false),
    ("4.2", "Services", AccountType::Revenue, false),
    ("5", "Expenses", AccountType::Expense, true),
    ("5.1", "Rent", AccountType::Expense, false),
    ("5.2", "Salaries", AccountType::Expense, false),
    ("5.3", "Utilities", AccountType::Expense, false),
    ("6", "Costs", AccountType::Cost, true),
    ("6.1", "Cost of goods sold", AccountType::Cost, false),
];

type Engine = LedgerEngine<PgLedgerStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = quire_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let engine = LedgerEngine::new(PgLedgerStore::new(db), LedgerPolicy::from(&config.ledger));

    info!("seeding chart of accounts");
    seed_chart(&engine).await?;

    info!("seeding fiscal year");
    seed_fiscal_year(&engine).await?;

    info!("seeding complete");
    Ok(())
}

fn parent_code(code: &str) -> Option<&str> {
    code.rsplit_once('.').map(|(parent, _)| parent)
}

async fn seed_chart(engine: &Engine) -> anyhow::Result<()> {
    let chart = engine.chart_of_accounts().await?;
    let mut ids: HashMap<String, AccountId> = chart
        .iter()
        .map(|a| (a.code.as_str().to_string(), a.id))
        .collect();

    for &(code, name, account_type, is_parent) in DEMO_CHART {
        if ids.contains_key(code) {
            info!(code, "account already exists, skipping");
            continue;
        }
        let parent_id = parent_code(code).and_then(|parent| ids.get(parent).copied());
        let account = engine
            .create_account(NewAccount {
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                nature: None,
                parent_id,
                is_parent,
            })
            .await
            .with_context(|| format!("failed to create account {code}"))?;
        info!(code, name, "created account");
        ids.insert(code.to_string(), account.id);
    }
    Ok(())
}

async fn seed_fiscal_year(engine: &Engine) -> anyhow::Result<()> {
    let year = Utc::now().year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1).context("invalid year start")?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31).context("invalid year end")?;

    match engine.create_fiscal_year(&format!("FY{year}"), start, end).await {
        Ok(created) => {
            info!(name = %created.year.name, months = created.periods.len(), "created fiscal year");
            Ok(())
        }
        Err(LedgerError::OverlappingFiscalYear(existing)) => {
            warn!(%existing, "a fiscal year already covers {year}, skipping");
            Ok(())
        }
        Err(err) => Err(err).context("failed to create fiscal year"),
    }
}
