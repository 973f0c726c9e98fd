//! Statement import and reconciliation example

use bookkeeping_core::utils::MemoryStorage;
use bookkeeping_core::{
    AccountKind, AccountSubtype, AccountType, ColumnMapping, CommitOptions, EngineConfig,
    ImportSession, Importer, Ledger, MatchType, MemorizedRule, RuleSet, StatementLine,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const STATEMENT: &str = "\
Date,Description,Debit,Credit,Balance
30/06/2025,BWS LIQUOR 2041,17.00,,1983.00
01/07/2025,WOOLWORTHS METRO,62.35,,1920.65
01/07/2025,SALARY ACME PTY LTD,,2500.00,4420.65
02/07/2025,CAFE NERO,4.50,,4416.15
";

const CONFIG: &str = r#"
[import]
date_tolerance_days = 1

[reconciliation]
strategy = "prefer_same_day"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).compact())
        .init();

    println!("🧾 Bookkeeping Core - Statement Import Example\n");

    let config = EngineConfig::from_toml_str(CONFIG)?;
    let mut ledger = Ledger::new(MemoryStorage::new());

    // 1. Accounts
    ledger
        .add_account(
            bookkeeping_core::Account::new(
                "everyday".to_string(),
                "Everyday Account".to_string(),
                AccountType::Asset,
                AccountKind::Transfer,
                None,
            )
            .with_subtype(AccountSubtype::Bank),
        )
        .await?;
    for (id, name, account_type) in [
        ("alcohol", "Alcohol", AccountType::Expense),
        ("groceries", "Groceries", AccountType::Expense),
        ("coffee", "Coffee", AccountType::Expense),
        ("wages", "Wages", AccountType::Income),
    ] {
        ledger
            .create_account(
                id.to_string(),
                name.to_string(),
                account_type,
                AccountKind::Category,
                None,
            )
            .await?;
    }

    // 2. Memorized rules
    let rules = RuleSet::new(vec![
        MemorizedRule::new("r1", "Liquor", MatchType::Contains, "bws").with_account("alcohol"),
        MemorizedRule::new("r2", "Woolies", MatchType::Contains, "woolworths")
            .with_account("groceries")
            .with_payee("Woolworths"),
        MemorizedRule::new("r3", "Pay", MatchType::Regex, r"^salary\b")
            .with_account("wages")
            .with_payee("Acme Pty Ltd"),
    ]);

    // 3. Import session
    let importer = Importer::new(config.import.clone());
    let mut session = ImportSession::new(
        importer.clone(),
        STATEMENT.to_string(),
        "everyday".to_string(),
    );
    session.map_columns(
        ColumnMapping::new()
            .date("Date")
            .description("Description")
            .debit_credit("Debit", "Credit"),
    )?;

    let preview = session.run_preview(&ledger, &rules).await?;
    println!("📋 Preview:");
    for candidate in &preview.candidates {
        println!(
            "  row {:>2}  {}  {:>9}  {:<28} -> {}",
            candidate.row.row,
            candidate.row.date,
            candidate.row.amount,
            candidate.resolved_payee(true),
            candidate.resolved_category(true).unwrap_or("(uncategorized)")
        );
    }
    println!();

    // The cafe row has no rule; categorize it by hand
    session.set_category(5, Some("coffee".to_string()))?;

    let summary = session
        .commit_with_progress(&mut ledger, &CommitOptions::from(&config.import), |p| {
            println!("  … {}/{} rows", p.processed, p.total)
        })
        .await?;
    println!(
        "\n✓ Imported {}, skipped {}, duplicates {}, errors {}\n",
        summary.imported,
        summary.skipped,
        summary.duplicates,
        summary.errors.len()
    );

    // 4. Importing the same file again changes nothing
    let again = importer
        .preview(
            &ledger,
            STATEMENT,
            &ColumnMapping::new()
                .date("Date")
                .description("Description")
                .debit_credit("Debit", "Credit"),
            "everyday",
            &rules,
        )
        .await?;
    println!(
        "🔁 Re-import preview: {} of {} rows are duplicates\n",
        again.duplicate_count,
        again.candidates.len()
    );

    // 5. Register
    println!("📒 Everyday Account register:");
    for line in ledger.running_balances("everyday", None).await? {
        println!(
            "  {}  {:<16} {:>9}  {:>9}",
            line.date, line.payee, line.amount, line.balance
        );
    }
    println!();

    // 6. Reconcile against the bank's view of the same period
    let lines: Vec<StatementLine> = again
        .candidates
        .iter()
        .map(|candidate| StatementLine {
            date: candidate.row.date,
            payee: candidate.row.payee.clone(),
            amount: candidate.row.amount.clone(),
            running_balance: None,
        })
        .collect();
    let report = ledger
        .reconcile_account("everyday", &lines, &config.reconciliation)
        .await?;
    println!("🏦 Reconciliation: {}", report.summary());
    let marked = ledger.mark_reconciled(&report).await?;
    println!("  ✓ Marked {} transactions reconciled", marked);

    let integrity = ledger.validate_integrity(None).await?;
    println!(
        "\n🔍 Ledger integrity: {} ({} transactions checked)",
        if integrity.is_valid { "OK" } else { "FAILED" },
        integrity.transactions_checked
    );

    Ok(())
}
