use std::sync::Arc;

use leadstore_api::auth::{AuthUser, Role};
use leadstore_api::export::{
    mailer::RecordingMailer, storage::MemoryObjectStore, ExportConfig, ExportEngine, ExportOutcome,
};
use leadstore_api::ingest::{BulkLoader, IncomingLead};
use leadstore_api::models::PersonLead;
use leadstore_api::query::LeadFilter;
use leadstore_api::test_support::TestDatabase;
use rocket_db_pools::sqlx::PgPool;
use serde_json::json;

fn lead(n: usize) -> IncomingLead {
    IncomingLead {
        first_name: Some(format!("Lead{n}")),
        email: Some(format!("lead{n}@example.com")),
        linkedin_url: Some(format!("https://linkedin.com/in/lead{n}")),
        ..Default::default()
    }
}

async fn seed_leads(pool: &PgPool, count: usize) {
    let rows: Vec<IncomingLead> = (0..count).map(lead).collect();
    BulkLoader::new(pool.clone())
        .load_leads(&rows)
        .await
        .expect("seed leads");
}

async fn insert_user(pool: &PgPool, role: Role, credits: i32) -> AuthUser {
    let email = format!("{}@example.com", role.as_str());
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO users (email, role, credits) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(role.as_str())
    .bind(credits)
    .fetch_one(pool)
    .await
    .expect("insert user");

    AuthUser {
        id,
        email,
        role,
        credits,
    }
}

struct Harness {
    engine: ExportEngine,
    store: Arc<MemoryObjectStore>,
    mailer: Arc<RecordingMailer>,
}

fn harness(pool: PgPool, inline_threshold: usize) -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let config = ExportConfig {
        inline_threshold,
        ..Default::default()
    };
    let engine = ExportEngine::new(pool, store.clone(), mailer.clone(), config);
    Harness {
        engine,
        store,
        mailer,
    }
}

#[tokio::test]
async fn small_export_is_inline_and_deducts_credits() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 3).await;
    let user = insert_user(&pool, Role::User, 10).await;
    let h = harness(pool.clone(), 500);

    let pred = LeadFilter::default().compile();
    let outcome = h
        .engine
        .export::<PersonLead>(&user, &pred, &[], None, json!({}))
        .await
        .expect("export");

    match outcome {
        ExportOutcome::Inline {
            content,
            row_count,
            remaining_credits,
            ..
        } => {
            assert_eq!(row_count, 3);
            assert_eq!(remaining_credits, 7);
            assert!(content.starts_with("first_name,last_name,title"));
            assert!(content.contains("lead0@example.com"));
        }
        other => panic!("expected inline delivery, got {other:?}"),
    }

    let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .expect("balance");
    assert_eq!(balance, 7);

    // Every exported row was marked saved with its contact flags.
    let marks: Vec<(bool, bool)> =
        sqlx::query_as("SELECT has_email, has_phone FROM saved_marks WHERE user_id = $1")
            .bind(user.id)
            .fetch_all(&pool)
            .await
            .expect("marks");
    assert_eq!(marks.len(), 3);
    assert!(marks.iter().all(|(has_email, has_phone)| *has_email && !has_phone));

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM export_records")
        .fetch_one(&pool)
        .await
        .expect("records");
    assert_eq!(records, 1);

    assert_eq!(h.store.stored().len(), 1);
    assert!(h.mailer.sent().is_empty());

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn insufficient_credits_roll_back_everything() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 5).await;
    let user = insert_user(&pool, Role::User, 3).await;
    let h = harness(pool.clone(), 500);

    let pred = LeadFilter::default().compile();
    let err = h
        .engine
        .export::<PersonLead>(&user, &pred, &[], None, json!({}))
        .await
        .expect_err("export should fail");
    assert!(matches!(
        err,
        leadstore_api::error::ApiError::Conflict(_)
    ));

    let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .expect("balance");
    assert_eq!(balance, 3);

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM export_records")
        .fetch_one(&pool)
        .await
        .expect("records");
    assert_eq!(records, 0);

    let marks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_marks")
        .fetch_one(&pool)
        .await
        .expect("marks");
    assert_eq!(marks, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn large_export_is_delivered_by_mail() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 3).await;
    let user = insert_user(&pool, Role::User, 10).await;
    let h = harness(pool.clone(), 2);

    let pred = LeadFilter::default().compile();
    let outcome = h
        .engine
        .export::<PersonLead>(&user, &pred, &[], None, json!({}))
        .await
        .expect("export");

    match outcome {
        ExportOutcome::Emailed {
            row_count,
            remaining_credits,
            ..
        } => {
            assert_eq!(row_count, 3);
            assert_eq!(remaining_credits, 7);
        }
        other => panic!("expected mail delivery, got {other:?}"),
    }

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, user.email);
    assert!(sent[0].body.contains("memory://exports/"));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn storage_failure_aborts_the_export() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 2).await;
    let user = insert_user(&pool, Role::User, 10).await;
    let h = harness(pool.clone(), 500);
    h.store.fail_next();

    let pred = LeadFilter::default().compile();
    let err = h
        .engine
        .export::<PersonLead>(&user, &pred, &[], None, json!({}))
        .await
        .expect_err("export should fail");
    assert!(matches!(
        err,
        leadstore_api::error::ApiError::Integration(_)
    ));

    // Rolled back: credits intact, no audit record, no saved marks.
    let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .expect("balance");
    assert_eq!(balance, 10);

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM export_records")
        .fetch_one(&pool)
        .await
        .expect("records");
    assert_eq!(records, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn admins_export_without_spending_credits() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 4).await;
    let admin = insert_user(&pool, Role::Admin, 0).await;
    let h = harness(pool.clone(), 500);

    let pred = LeadFilter::default().compile();
    let outcome = h
        .engine
        .export::<PersonLead>(&admin, &pred, &[], None, json!({}))
        .await
        .expect("export");
    assert!(matches!(outcome, ExportOutcome::Inline { row_count: 4, .. }));

    let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(admin.id)
        .fetch_one(&pool)
        .await
        .expect("balance");
    assert_eq!(balance, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn concurrent_exports_never_overspend_the_balance() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 3).await;
    // Each export matches 3 rows and costs 3 credits; the balance covers
    // exactly one of them.
    let user = insert_user(&pool, Role::User, 4).await;
    let h = harness(pool.clone(), 500);

    let preds: Vec<_> = (0..3).map(|_| LeadFilter::default().compile()).collect();
    let (a, b, c) = tokio::join!(
        h.engine
            .export::<PersonLead>(&user, &preds[0], &[], None, json!({})),
        h.engine
            .export::<PersonLead>(&user, &preds[1], &[], None, json!({})),
        h.engine
            .export::<PersonLead>(&user, &preds[2], &[], None, json!({})),
    );

    let outcomes = [a, b, c];
    let exported_rows: usize = outcomes
        .iter()
        .filter_map(|result| match result {
            Ok(ExportOutcome::Inline { row_count, .. }) => Some(*row_count),
            Ok(ExportOutcome::Emailed { row_count, .. }) => Some(*row_count),
            Err(_) => None,
        })
        .sum();
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(leadstore_api::error::ApiError::Conflict(_))
            )
        })
        .count();

    // Total rows across successful exports never exceed the starting balance,
    // and the losers fail with the insufficient-credits conflict.
    assert!(exported_rows <= 4);
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 2);

    let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .expect("balance");
    assert!(balance >= 0);
    assert_eq!(balance as usize, 4 - exported_rows);

    // One audit row per successful export, none for the conflicts.
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM export_records")
        .fetch_one(&pool)
        .await
        .expect("records");
    assert_eq!(records as usize, successes);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn explicit_id_list_bypasses_the_filter() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();
    seed_leads(&pool, 3).await;
    let user = insert_user(&pool, Role::User, 10).await;
    let h = harness(pool.clone(), 500);

    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM person_leads ORDER BY id LIMIT 2")
        .fetch_all(&pool)
        .await
        .expect("ids");

    // Filter would match nothing; the id list still resolves.
    let filter = LeadFilter {
        title: vec!["Nonexistent Title".to_string()],
        ..Default::default()
    };
    let outcome = h
        .engine
        .export::<PersonLead>(&user, &filter.compile(), &ids, None, json!({}))
        .await
        .expect("export");
    assert!(matches!(outcome, ExportOutcome::Inline { row_count: 2, .. }));

    test_db.close().await.expect("failed to drop test database");
}
