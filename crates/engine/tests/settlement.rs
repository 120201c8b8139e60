use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Currency, Engine, EngineError, ErrorKind, Money, NewObligationCmd, NewTransferCmd, Obligation,
    ObligationFilter, TransferFilter,
};
use migration::MigratorTrait;

/// Two engines with separate connection pools over one on-disk database.
async fn engines_sharing_file_db() -> (Engine, Engine, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("settlement_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let first = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&first, None).await.unwrap();
    let second = Database::connect(&url).await.unwrap();

    let a = Engine::builder()
        .database(first)
        .max_retries(20)
        .build()
        .await
        .unwrap();
    let b = Engine::builder()
        .database(second)
        .max_retries(20)
        .build()
        .await
        .unwrap();
    a.create_currency("PLN").await.unwrap();
    (a, b, path)
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine.create_currency("PLN").await.unwrap();
    (engine, db)
}

fn pln() -> Currency {
    Currency::new("PLN").unwrap()
}

async fn obligation(engine: &Engine, total: i64, requires_vat: bool, owner: &str) -> Obligation {
    engine
        .create_obligation(
            NewObligationCmd::new(pln(), Money::new(total), owner).requires_vat(requires_vat),
        )
        .await
        .unwrap()
}

fn transfer(obligation: &Obligation, netto: i64, vat: i64) -> NewTransferCmd {
    NewTransferCmd::new(
        obligation.id(),
        obligation.owner(),
        Money::new(netto),
        Money::new(vat),
        obligation.currency().clone(),
    )
}

#[tokio::test]
async fn partial_payment_leaves_obligation_open() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;

    let t = engine.create_transfer(transfer(&o, 50_00, 20_00)).await.unwrap();
    assert_eq!(t.brutto(), Money::new(70_00));
    assert_eq!(t.owner(), "sam");
    assert!(!t.is_booked());

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(70_00));
    assert_eq!(o.to_settle(), Money::new(30_00));
    assert!(!o.is_settled());
}

#[tokio::test]
async fn settled_obligation_rejects_new_transfers() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    engine.create_transfer(transfer(&o, 80_00, 20_00)).await.unwrap();

    let err = engine
        .create_transfer(transfer(&o, 1_00, 1_00))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadySettled(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(100_00));
    assert!(o.is_settled());
}

#[tokio::test]
async fn vat_transfer_on_non_vat_obligation_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;

    let err = engine
        .create_transfer(transfer(&o, 10_00, 2_30).is_vat(true))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VatMismatch(_)));

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::ZERO);
    let transfers = engine
        .list_transfers(&TransferFilter::default().obligation_id(o.id()))
        .await
        .unwrap();
    assert!(transfers.is_empty());
}

#[tokio::test]
async fn deleting_a_transfer_reopens_the_obligation() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    engine.create_transfer(transfer(&o, 20_00, 10_00)).await.unwrap();
    let big = engine.create_transfer(transfer(&o, 60_00, 10_00)).await.unwrap();

    let settled = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(settled.settled(), Money::new(100_00));
    assert!(settled.is_settled());

    engine.delete_transfer(big.id()).await.unwrap();

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(30_00));
    assert_eq!(o.to_settle(), Money::new(70_00));
    assert!(!o.is_settled());
    assert_eq!(
        engine.transfer(big.id(), None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn create_then_delete_restores_balances() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, true, "sam").await;
    engine.create_transfer(transfer(&o, 10_00, 5_00)).await.unwrap();
    let before = engine.obligation(o.id(), None).await.unwrap();

    let t = engine
        .create_transfer(transfer(&o, 40_00, 9_20).is_vat(true))
        .await
        .unwrap();
    engine.delete_transfer(t.id()).await.unwrap();

    let after = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(after.settled(), before.settled());
    assert_eq!(after.to_settle(), before.to_settle());
    assert_eq!(after.is_settled(), before.is_settled());
}

#[tokio::test]
async fn overpayment_is_absorbed_and_reversible() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    let t = engine.create_transfer(transfer(&o, 120_00, 30_00)).await.unwrap();

    let paid = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(paid.settled(), Money::new(150_00));
    assert_eq!(paid.to_settle(), Money::ZERO);
    assert!(paid.is_settled());

    engine.delete_transfer(t.id()).await.unwrap();
    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::ZERO);
    assert_eq!(o.to_settle(), Money::new(100_00));
}

#[tokio::test]
async fn settled_equals_sum_of_surviving_transfers() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 1_000_00, false, "sam").await;

    let mut kept = Vec::new();
    for (i, (netto, vat)) in [(10_00, 1_00), (25_50, 0_50), (7_00, 3_00), (100_00, 23_00)]
        .into_iter()
        .enumerate()
    {
        let t = engine.create_transfer(transfer(&o, netto, vat)).await.unwrap();
        if i % 2 == 0 {
            engine.delete_transfer(t.id()).await.unwrap();
        } else {
            kept.push(t);
        }
    }

    let expected = kept
        .iter()
        .try_fold(Money::ZERO, |acc, t| acc.checked_add(t.brutto()))
        .unwrap();
    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), expected);
    assert_eq!(o.settled(), Money::new(149_00));
    assert_eq!(o.to_settle(), Money::new(851_00));

    let listed = engine
        .list_transfers(&TransferFilter::default().obligation_id(o.id()))
        .await
        .unwrap();
    assert_eq!(listed.len(), kept.len());
}

#[tokio::test]
async fn concurrent_creates_are_both_applied() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;

    let (a, b) = tokio::join!(
        engine.create_transfer(transfer(&o, 9_00, 1_00)),
        engine.create_transfer(transfer(&o, 9_00, 1_00)),
    );
    a.unwrap();
    b.unwrap();

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(20_00));
    assert_eq!(o.to_settle(), Money::new(80_00));
}

#[tokio::test]
async fn many_spawned_transfers_sum_up() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    let o = obligation(&engine, 1_000_00, false, "sam").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        let cmd = transfer(&o, 4_00, 1_00);
        handles.push(tokio::spawn(async move { engine.create_transfer(cmd).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(50_00));
}

#[tokio::test]
async fn writers_on_separate_pools_all_land() {
    let (a, b, path) = engines_sharing_file_db().await;
    let (a, b) = (Arc::new(a), Arc::new(b));
    let o = obligation(&a, 1_000_00, false, "sam").await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let engine = Arc::clone(if i % 2 == 0 { &a } else { &b });
        let cmd = transfer(&o, 4_00, 1_00);
        handles.push(tokio::spawn(async move { engine.create_transfer(cmd).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let seen_by_a = a.obligation(o.id(), None).await.unwrap();
    let seen_by_b = b.obligation(o.id(), None).await.unwrap();
    assert_eq!(seen_by_a.settled(), Money::new(200_00));
    assert_eq!(seen_by_a, seen_by_b);
    let transfers = b
        .list_transfers(&TransferFilter::default().obligation_id(o.id()))
        .await
        .unwrap();
    assert_eq!(transfers.len(), 40);

    drop((a, b));
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn failed_transfer_insert_leaves_obligation_untouched() {
    let (engine, db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    db.execute_unprepared(
        "CREATE TRIGGER reject_transfers BEFORE INSERT ON transfers \
         BEGIN SELECT RAISE(ABORT, 'transfers are frozen'); END;",
    )
    .await
    .unwrap();

    let err = engine
        .create_transfer(transfer(&o, 9_00, 1_00))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(!err.is_retryable());

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::ZERO);
    assert_eq!(o.to_settle(), Money::new(100_00));
    assert!(
        engine
            .list_transfers(&TransferFilter::default().obligation_id(o.id()))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn transfer_checks_run_in_order() {
    let (engine, _db) = engine_with_db().await;
    engine.create_currency("USD").await.unwrap();
    let o = obligation(&engine, 100_00, false, "sam").await;

    let missing = NewTransferCmd::new(Uuid::new_v4(), "sam", Money::new(1_00), Money::new(1_00), pln());
    let err = engine.create_transfer(missing).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("obligation not exists".to_string()));

    let mut foreign = transfer(&o, 1_00, 1_00).is_vat(true);
    foreign.owner = "alex".to_string();
    let err = engine.create_transfer(foreign).await.unwrap_err();
    assert!(matches!(err, EngineError::OwnershipMismatch(_)));

    let mut usd = transfer(&o, 1_00, 1_00);
    usd.currency = Currency::new("usd").unwrap();
    let err = engine.create_transfer(usd).await.unwrap_err();
    assert!(matches!(err, EngineError::CurrencyMismatch(_)));
}

#[tokio::test]
async fn malformed_amounts_are_invalid_not_conflicts() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;

    let err = engine
        .create_transfer(transfer(&o, 10_00, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);

    let err = engine
        .create_obligation(NewObligationCmd::new(pln(), Money::ZERO, "sam"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .create_obligation(NewObligationCmd::new(pln(), Money::new(1_00), "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOwner(_)));
}

#[tokio::test]
async fn deleting_a_missing_transfer_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let err = engine.delete_transfer(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn obligation_needs_registered_currency() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .create_obligation(NewObligationCmd::new(
            Currency::new("EUR").unwrap(),
            Money::new(10_00),
            "sam",
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("currency not exists".to_string()));
}

#[tokio::test]
async fn booking_does_not_touch_balances() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    let t = engine.create_transfer(transfer(&o, 30_00, 10_00)).await.unwrap();

    let booked = engine.set_transfer_booked(t.id(), true).await.unwrap();
    assert!(booked.is_booked());
    assert_eq!(booked.brutto(), t.brutto());

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(40_00));

    let booked_only = engine
        .list_transfers(&TransferFilter::default().is_booked(true))
        .await
        .unwrap();
    assert_eq!(booked_only.len(), 1);

    engine.set_transfer_booked(t.id(), false).await.unwrap();
    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(40_00));
}

#[tokio::test]
async fn reads_are_scoped_to_owner() {
    let (engine, _db) = engine_with_db().await;
    let mine = obligation(&engine, 100_00, false, "sam").await;
    let theirs = obligation(&engine, 50_00, false, "alex").await;
    engine.create_transfer(transfer(&theirs, 10_00, 1_00)).await.unwrap();

    assert!(engine.obligation(mine.id(), Some("sam")).await.is_ok());
    let err = engine.obligation(theirs.id(), Some("sam")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let sams = engine
        .list_obligations(&ObligationFilter::default().owner("sam"))
        .await
        .unwrap();
    assert_eq!(sams.len(), 1);
    assert_eq!(sams[0].id(), mine.id());

    let all = engine
        .list_obligations(&ObligationFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let sams_transfers = engine
        .list_transfers(&TransferFilter::default().owner("sam"))
        .await
        .unwrap();
    assert!(sams_transfers.is_empty());
}

#[tokio::test]
async fn obligations_filter_by_settlement_and_currency() {
    let (engine, _db) = engine_with_db().await;
    engine.create_currency("USD").await.unwrap();
    let open = obligation(&engine, 100_00, false, "sam").await;
    let done = obligation(&engine, 10_00, false, "sam").await;
    engine.create_transfer(transfer(&done, 9_00, 1_00)).await.unwrap();
    engine
        .create_obligation(NewObligationCmd::new(
            Currency::new("USD").unwrap(),
            Money::new(5_00),
            "sam",
        ))
        .await
        .unwrap();

    let settled = engine
        .list_obligations(&ObligationFilter::default().is_settled(true))
        .await
        .unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].id(), done.id());

    let open_pln = engine
        .list_obligations(
            &ObligationFilter::default()
                .currency(pln())
                .is_settled(false),
        )
        .await
        .unwrap();
    assert_eq!(open_pln.len(), 1);
    assert_eq!(open_pln[0].id(), open.id());
}

#[tokio::test]
async fn deleting_an_obligation_removes_its_transfers() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, false, "sam").await;
    let t = engine.create_transfer(transfer(&o, 10_00, 1_00)).await.unwrap();

    engine.delete_obligation(o.id()).await.unwrap();

    assert_eq!(
        engine.obligation(o.id(), None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        engine.transfer(t.id(), None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        engine.delete_obligation(o.id()).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn currency_registry_rejects_duplicates_and_lists_sorted() {
    let (engine, _db) = engine_with_db().await;
    engine.create_currency("usd").await.unwrap();
    engine.create_currency("EUR").await.unwrap();

    let err = engine.create_currency(" pln ").await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("PLN".to_string()));

    let codes: Vec<String> = engine
        .list_currencies()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.code().to_string())
        .collect();
    assert_eq!(codes, vec!["EUR", "PLN", "USD"]);

    assert_eq!(engine.currency("usd").await.unwrap().code(), "USD");
    assert_eq!(
        engine.currency("CHF").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn renaming_a_currency_repoints_records() {
    let (engine, _db) = engine_with_db().await;
    engine.create_currency("USD").await.unwrap();
    let o = obligation(&engine, 100_00, false, "sam").await;
    let t = engine.create_transfer(transfer(&o, 10_00, 1_00)).await.unwrap();

    let err = engine.rename_currency("PLN", "USD").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let renamed = engine.rename_currency("PLN", "ZLOTY").await.unwrap();
    assert_eq!(renamed.code(), "ZLOTY");

    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.currency().code(), "ZLOTY");
    assert_eq!(o.settled(), Money::new(11_00));
    let t = engine.transfer(t.id(), None).await.unwrap();
    assert_eq!(t.currency().code(), "ZLOTY");

    assert_eq!(
        engine.currency("PLN").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let next = NewTransferCmd::new(o.id(), "sam", Money::new(1_00), Money::new(1_00), renamed);
    engine.create_transfer(next).await.unwrap();
    let o = engine.obligation(o.id(), None).await.unwrap();
    assert_eq!(o.settled(), Money::new(13_00));

    let err = engine.rename_currency("GBP", "CHF").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleting_a_currency_cascades() {
    let (engine, _db) = engine_with_db().await;
    engine.create_currency("USD").await.unwrap();
    let o = obligation(&engine, 100_00, false, "sam").await;
    let t = engine.create_transfer(transfer(&o, 10_00, 1_00)).await.unwrap();
    let usd = engine
        .create_obligation(NewObligationCmd::new(
            Currency::new("USD").unwrap(),
            Money::new(5_00),
            "sam",
        ))
        .await
        .unwrap();

    engine.delete_currency("pln").await.unwrap();

    assert_eq!(
        engine.obligation(o.id(), None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        engine.transfer(t.id(), None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(engine.obligation(usd.id(), None).await.is_ok());
    assert_eq!(
        engine.delete_currency("PLN").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn obligation_serializes_without_version() {
    let (engine, _db) = engine_with_db().await;
    let o = obligation(&engine, 100_00, true, "sam").await;
    let value = serde_json::to_value(&o).unwrap();
    assert_eq!(value["total_amount"], "100.00");
    assert_eq!(value["to_settle"], "100.00");
    assert_eq!(value["currency"], "PLN");
    assert_eq!(value["requires_vat"], true);
    assert!(value.get("version").is_none());
}
