use leadstore_api::error::ApiError;
use leadstore_api::ingest::{BulkLoader, IncomingCompany, IncomingLead};
use leadstore_api::models::EntityKind;
use leadstore_api::query::LeadFilter;
use leadstore_api::select::{select_leads, select_saved};
use leadstore_api::test_support::TestDatabase;
use rocket_db_pools::sqlx::PgPool;

fn lead(n: usize, company_id: Option<i64>) -> IncomingLead {
    IncomingLead {
        first_name: Some(format!("Lead{n}")),
        company_id,
        linkedin_url: Some(format!("https://linkedin.com/in/lead{n}")),
        ..Default::default()
    }
}

async fn seed_company(pool: &PgPool, name: &str) -> i64 {
    BulkLoader::new(pool.clone())
        .load_companies(&[IncomingCompany {
            name: Some(name.to_string()),
            address: Some("HQ".to_string()),
            ..Default::default()
        }])
        .await
        .expect("seed company");

    sqlx::query_scalar("SELECT id FROM companies WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("company id")
}

#[tokio::test]
async fn per_company_cap_limits_each_company() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();

    let acme = seed_company(&pool, "Acme").await;
    let globex = seed_company(&pool, "Globex").await;

    let mut rows: Vec<IncomingLead> = (0..5).map(|n| lead(n, Some(acme))).collect();
    rows.push(lead(5, Some(globex)));
    BulkLoader::new(pool.clone())
        .load_leads(&rows)
        .await
        .expect("seed leads");

    let ids = select_leads(&pool, &LeadFilter::default(), 100, Some(2))
        .await
        .expect("select");

    // Five Acme leads collapse to two; the Globex lead survives.
    assert_eq!(ids.len(), 3);
    // Most recent first overall.
    assert!(ids.windows(2).all(|w| w[0] > w[1]));

    let companies: Vec<Option<i64>> =
        sqlx::query_scalar("SELECT company_id FROM person_leads WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&pool)
            .await
            .expect("companies of selected leads");
    let acme_count = companies.iter().filter(|c| **c == Some(acme)).count();
    assert_eq!(acme_count, 2);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn leads_without_a_company_are_not_collapsed_together() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();

    let rows: Vec<IncomingLead> = (0..4).map(|n| lead(n, None)).collect();
    BulkLoader::new(pool.clone())
        .load_leads(&rows)
        .await
        .expect("seed leads");

    let ids = select_leads(&pool, &LeadFilter::default(), 100, Some(1))
        .await
        .expect("select");

    // Each unaffiliated lead is its own partition, so the cap of one keeps
    // all of them.
    assert_eq!(ids.len(), 4);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn fresh_selection_respects_the_requested_count() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();

    let rows: Vec<IncomingLead> = (0..6).map(|n| lead(n, None)).collect();
    BulkLoader::new(pool.clone())
        .load_leads(&rows)
        .await
        .expect("seed leads");

    let ids = select_leads(&pool, &LeadFilter::default(), 4, None)
        .await
        .expect("select");
    assert_eq!(ids.len(), 4);
    assert!(ids.windows(2).all(|w| w[0] > w[1]));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn saved_selection_returns_recent_saves_or_not_found() {
    let test_db = TestDatabase::new()
        .await
        .expect("failed to provision test database");
    let pool = test_db.pool_clone();

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (email, role, credits) VALUES ('u@example.com', 'user', 0) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("insert user");

    let err = select_saved(&pool, user_id, EntityKind::Lead, 10)
        .await
        .expect_err("no saved leads yet");
    assert!(matches!(err, ApiError::NotFound(_)));

    let rows: Vec<IncomingLead> = (0..3).map(|n| lead(n, None)).collect();
    BulkLoader::new(pool.clone())
        .load_leads(&rows)
        .await
        .expect("seed leads");

    let lead_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM person_leads ORDER BY id")
        .fetch_all(&pool)
        .await
        .expect("lead ids");

    for (i, id) in lead_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO saved_marks (user_id, entity_id, entity_type, has_email, has_phone, saved_at)
             VALUES ($1, $2, 'lead', FALSE, FALSE, NOW() + ($3 || ' seconds')::interval)",
        )
        .bind(user_id)
        .bind(id)
        .bind(i.to_string())
        .execute(&pool)
        .await
        .expect("save mark");
    }

    let ids = select_saved(&pool, user_id, EntityKind::Lead, 2)
        .await
        .expect("saved selection");

    // Two most recent saves, newest first.
    assert_eq!(ids, vec![lead_ids[2], lead_ids[1]]);

    test_db.close().await.expect("failed to drop test database");
}
