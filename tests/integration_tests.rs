//! Integration tests for bookkeeping-core

use bookkeeping_core::{
    utils::{EnhancedAccountValidator, EnhancedTransactionValidator, MemoryStorage},
    Account, AccountKind, AccountSubtype, AccountType, ColumnMapping, CommitMode, CommitOptions,
    ImportError, ImportSession, ImportSettings, ImportState, Importer, Ledger, LedgerError,
    MatchType, MemorizedRule, Posting, ReconciliationSettings, RuleSet, StatementLine,
    TransactionStatus,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup_ledger(storage: MemoryStorage) -> Ledger<MemoryStorage> {
    let mut ledger = Ledger::new(storage);
    ledger
        .add_account(
            Account::new(
                "A".to_string(),
                "Everyday".to_string(),
                AccountType::Asset,
                AccountKind::Transfer,
                None,
            )
            .with_subtype(AccountSubtype::Bank),
        )
        .await
        .unwrap();
    for (id, name, account_type) in [
        ("alcohol", "Alcohol", AccountType::Expense),
        ("groceries", "Groceries", AccountType::Expense),
        ("rent", "Rent", AccountType::Expense),
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
            .await
            .unwrap();
    }
    ledger
}

fn catch_all_rules() -> RuleSet {
    RuleSet::new(vec![
        MemorizedRule::new("bws", "Liquor", MatchType::Contains, "bws").with_account("alcohol"),
        MemorizedRule::new("woolies", "Woolies", MatchType::Exact, "Woolworths")
            .with_account("groceries"),
        MemorizedRule::new("wool", "Wool", MatchType::Contains, "wool").with_account("rent"),
        MemorizedRule::new("salary", "Salary", MatchType::Contains, "salary")
            .with_account("wages"),
        MemorizedRule::new("landlord", "Landlord", MatchType::Contains, "landlord")
            .with_account("rent"),
    ])
}

fn headerless_mapping() -> ColumnMapping {
    ColumnMapping::new().date(0).amount(1).description(2)
}

async fn import(
    ledger: &mut Ledger<MemoryStorage>,
    csv: &str,
    options: &CommitOptions,
) -> bookkeeping_core::CommitSummary {
    let importer = Importer::default();
    let preview = importer
        .preview(ledger, csv, &headerless_mapping(), "A", &catch_all_rules())
        .await
        .unwrap();
    importer
        .commit(ledger, &preview.candidates, "A", options)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_row_import_produces_balanced_pair() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let summary = import(
        &mut ledger,
        "30/06/2025,-17,BWS LIQUOR\n",
        &CommitOptions::default(),
    )
    .await;

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.duplicates, 0);
    assert!(summary.errors.is_empty());

    let txn = ledger
        .get_transaction(&summary.transaction_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(txn.date, ymd(2025, 6, 30));
    assert_eq!(txn.payee, "BWS LIQUOR");
    assert_eq!(txn.postings.len(), 2);
    assert_eq!(txn.amount_for("A"), dec("-17.00"));
    assert_eq!(txn.amount_for("alcohol"), dec("17.00"));
    assert!(txn.is_balanced());
    assert!(txn.external_id.as_deref().unwrap().starts_with("imp-"));
    assert_eq!(
        txn.postings
            .iter()
            .find(|p| p.account_id == "alcohol")
            .unwrap()
            .is_business,
        Some(false)
    );
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let csv = "\
30/06/2025,-17,BWS LIQUOR
01/07/2025,2500,SALARY ACME
02/07/2025,-6500.00,LANDLORD
";
    let mut ledger = setup_ledger(MemoryStorage::new()).await;

    let first = import(&mut ledger, csv, &CommitOptions::default()).await;
    assert_eq!(first.imported, 3);
    let balance = ledger.get_balance("A", None).await.unwrap();

    let second = import(&mut ledger, csv, &CommitOptions::default()).await;
    assert_eq!(second.imported, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(ledger.get_balance("A", None).await.unwrap(), balance);
    assert_eq!(ledger.get_transactions(None, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_overlapping_ranges_union_without_duplicates() {
    let run1 = "\
01/07/2025,-10,BWS ONE
02/07/2025,-20,BWS TWO
03/07/2025,-30,BWS THREE
";
    let run2 = "\
03/07/2025,-30,BWS THREE
04/07/2025,-40,BWS FOUR
05/07/2025,-50,BWS FIVE
";
    let combined = "\
01/07/2025,-10,BWS ONE
02/07/2025,-20,BWS TWO
03/07/2025,-30,BWS THREE
04/07/2025,-40,BWS FOUR
05/07/2025,-50,BWS FIVE
";

    let mut split = setup_ledger(MemoryStorage::new()).await;
    let first = import(&mut split, run1, &CommitOptions::default()).await;
    let second = import(&mut split, run2, &CommitOptions::default()).await;
    assert_eq!(second.duplicates, 1);

    let mut whole = setup_ledger(MemoryStorage::new()).await;
    let all = import(&mut whole, combined, &CommitOptions::default()).await;

    assert_eq!(first.imported + second.imported, all.imported);
    assert_eq!(all.imported, 5);
    assert_eq!(
        split.get_balance("A", None).await.unwrap(),
        whole.get_balance("A", None).await.unwrap()
    );

    let mut split_ids: Vec<String> = split
        .get_account_transactions("A", None, None)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|t| t.external_id)
        .collect();
    let mut whole_ids: Vec<String> = whole
        .get_account_transactions("A", None, None)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|t| t.external_id)
        .collect();
    split_ids.sort();
    whole_ids.sort();
    assert_eq!(split_ids, whole_ids);
}

#[tokio::test]
async fn test_same_batch_identical_rows_both_import() {
    let csv = "\
01/07/2025,-4.50,BWS
01/07/2025,-4.50,BWS
";
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let summary = import(&mut ledger, csv, &CommitOptions::default()).await;
    assert_eq!(summary.imported, 2);
    assert_eq!(ledger.get_balance("A", None).await.unwrap(), dec("-9.00"));
}

#[tokio::test]
async fn test_date_tolerance_catches_shifted_rows() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    import(
        &mut ledger,
        "01/07/2025,-6500.00,LANDLORD\n",
        &CommitOptions::default(),
    )
    .await;

    // The bank later renders the same payment a day later with a new payee
    let shifted = "02/07/2025,-6500.00,LANDLORD PTY LTD RENT\n";

    let strict = Importer::default()
        .preview(&ledger, shifted, &headerless_mapping(), "A", &catch_all_rules())
        .await
        .unwrap();
    assert_eq!(strict.duplicate_count, 0);

    let tolerant = Importer::new(ImportSettings {
        date_tolerance_days: 1,
        ..ImportSettings::default()
    })
    .preview(&ledger, shifted, &headerless_mapping(), "A", &catch_all_rules())
    .await
    .unwrap();
    assert_eq!(tolerant.duplicate_count, 1);
}

#[tokio::test]
async fn test_exact_rule_beats_contains_rule_on_import() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let summary = import(
        &mut ledger,
        "01/07/2025,-80,Woolworths\n02/07/2025,-5,WOOLSHED CAFE\n",
        &CommitOptions::default(),
    )
    .await;
    assert_eq!(summary.imported, 2);
    assert_eq!(ledger.get_balance("groceries", None).await.unwrap(), dec("80"));
    assert_eq!(ledger.get_balance("rent", None).await.unwrap(), dec("5"));
}

#[tokio::test]
async fn test_uncategorized_rows_are_counted_not_imported() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let summary = import(
        &mut ledger,
        "01/07/2025,-3,MYSTERY SHOP\n02/07/2025,-17,BWS\n",
        &CommitOptions::default(),
    )
    .await;
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed(), 2);
}

#[tokio::test]
async fn test_best_effort_continues_after_storage_failure() {
    let storage = MemoryStorage::new();
    let mut ledger = setup_ledger(storage.clone()).await;
    storage.set_insert_limit(Some(2)).unwrap();

    let csv = "\
01/07/2025,-1,BWS A
02/07/2025,-2,BWS B
03/07/2025,-3,BWS C
04/07/2025,-4,MYSTERY
";
    let summary = import(&mut ledger, csv, &CommitOptions::default()).await;

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 3);
    assert!(summary.errors[0].message.contains("limit"));
    assert_eq!(storage.transaction_count().unwrap(), 2);
}

#[tokio::test]
async fn test_all_or_nothing_rolls_back_on_storage_failure() {
    let storage = MemoryStorage::new();
    let mut ledger = setup_ledger(storage.clone()).await;
    storage.set_insert_limit(Some(2)).unwrap();

    let csv = "\
01/07/2025,-1,BWS A
02/07/2025,-2,BWS B
03/07/2025,-3,BWS C
";
    let options = CommitOptions {
        mode: CommitMode::AllOrNothing,
        ..CommitOptions::default()
    };
    let summary = import(&mut ledger, csv, &options).await;

    assert_eq!(summary.imported, 0);
    assert!(summary.transaction_ids.is_empty());
    assert_eq!(summary.errors.len(), 3);
    assert_eq!(
        summary.errors.iter().map(|e| e.row).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(storage.transaction_count().unwrap(), 0);
    assert_eq!(ledger.get_balance("A", None).await.unwrap(), dec("0"));

    storage.set_insert_limit(None).unwrap();
    let retry = import(&mut ledger, csv, &options).await;
    assert_eq!(retry.imported, 3);
    assert!(retry.errors.is_empty());
}

#[tokio::test]
async fn test_parse_errors_are_reported() {
    let ledger = setup_ledger(MemoryStorage::new()).await;
    let preview = Importer::default()
        .preview(
            &ledger,
            "31/02/2025,-1,BAD DATE\n01/03/2025,abc,BAD AMOUNT\n02/03/2025,-2,BWS\n",
            &headerless_mapping().with_header(false),
            "A",
            &catch_all_rules(),
        )
        .await
        .unwrap();
    assert_eq!(preview.candidates.len(), 1);
    assert_eq!(preview.parse_errors.len(), 2);
    assert_eq!(preview.parse_errors[0].row, 1);
    assert_eq!(preview.parse_errors[1].row, 2);
}

#[tokio::test]
async fn test_session_end_to_end_with_headers_and_split_amounts() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let csv = "\
\"Date\",\"Details\",\"Debit\",\"Credit\"
\"31 Jan 2026\",\"Smith, Jones & Co\",\"1,250.00\",\"\"
\"01 Feb 2026\",\"SALARY\",\"\",\"4,200.00\"
";
    let mut session = ImportSession::new(Importer::default(), csv.to_string(), "A".to_string());
    session
        .map_columns(
            ColumnMapping::new()
                .date("Date")
                .description("Details")
                .debit_credit("Debit", "Credit"),
        )
        .unwrap();
    let preview = session
        .run_preview(&ledger, &catch_all_rules())
        .await
        .unwrap();
    assert_eq!(preview.candidates.len(), 2);
    assert_eq!(preview.candidates[0].row.amount, dec("-1250.00"));
    assert_eq!(preview.candidates[0].row.payee, "Smith, Jones & Co");

    session.set_category(2, Some("rent".to_string())).unwrap();
    session.set_payee(2, Some("Smith Jones".to_string())).unwrap();
    assert_eq!(session.state(), ImportState::Categorized);

    let summary = session
        .commit(&mut ledger, &CommitOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(session.state(), ImportState::Committed);

    let register = ledger.running_balances("A", None).await.unwrap();
    assert_eq!(register.len(), 2);
    assert_eq!(register[0].payee, "Smith Jones");
    assert_eq!(register[1].balance, dec("2950.00"));
}

#[tokio::test]
async fn test_session_rejects_out_of_order_commit() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let mut session = ImportSession::new(
        Importer::default(),
        "30/06/2025,-17,BWS\n".to_string(),
        "A".to_string(),
    );
    let err = session
        .commit(&mut ledger, &CommitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidState { .. }));
    assert_eq!(session.state(), ImportState::Uploaded);
}

#[tokio::test]
async fn test_import_then_reconcile() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    import(
        &mut ledger,
        "21/01/2026,-6500.00,LANDLORD\n20/01/2026,-17,BWS\n",
        &CommitOptions::default(),
    )
    .await;

    let lines = vec![
        StatementLine {
            date: ymd(2026, 1, 22),
            payee: "LANDLORD".to_string(),
            amount: dec("-6500.00"),
            running_balance: None,
        },
        StatementLine {
            date: ymd(2026, 1, 22),
            payee: "BWS".to_string(),
            amount: dec("-17.00"),
            running_balance: Some(dec("-6517.00")),
        },
    ];
    let report = ledger
        .reconcile_account("A", &lines, &ReconciliationSettings::default())
        .await
        .unwrap();

    // Landlord is a day early and matches; BWS is two days early and does not
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].line_index, 0);
    assert_eq!(report.unmatched_lines, vec![1]);
    assert_eq!(report.unmatched_postings.len(), 1);
    assert_eq!(report.difference, Some(dec("0")));

    ledger.mark_reconciled(&report).await.unwrap();
    let reconciled = ledger
        .get_account_transactions("A", None, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.status == TransactionStatus::Reconciled)
        .count();
    assert_eq!(reconciled, 1);
}

#[tokio::test]
async fn test_enhanced_validators() {
    let mut ledger = Ledger::with_validators(
        MemoryStorage::new(),
        Box::new(EnhancedAccountValidator),
        Box::new(EnhancedTransactionValidator),
    );

    // Transfer accounts need a subtype under the enhanced rules
    let err = ledger
        .create_account(
            "A".to_string(),
            "Everyday".to_string(),
            AccountType::Asset,
            AccountKind::Transfer,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    ledger
        .add_account(
            Account::new(
                "A".to_string(),
                "Everyday".to_string(),
                AccountType::Asset,
                AccountKind::Transfer,
                None,
            )
            .with_subtype(AccountSubtype::Bank),
        )
        .await
        .unwrap();
    ledger
        .create_account(
            "food".to_string(),
            "Food".to_string(),
            AccountType::Expense,
            AccountKind::Category,
            None,
        )
        .await
        .unwrap();

    let err = ledger
        .create_transaction(
            ymd(2025, 7, 1),
            "Split".to_string(),
            String::new(),
            vec![
                Posting::new("food".to_string(), dec("5")),
                Posting::new("food".to_string(), dec("5")),
                Posting::new("A".to_string(), dec("-10")),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_account_kind_is_immutable() {
    let mut ledger = setup_ledger(MemoryStorage::new()).await;
    let mut account = ledger.get_account("alcohol").await.unwrap().unwrap();
    account.kind = AccountKind::Transfer;
    let err = ledger.update_account(&account).await.unwrap_err();
    assert!(matches!(err, LedgerError::ImmutableAccountKind { .. }));
}
