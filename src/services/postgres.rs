use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use crate::core::tokens::TokenTransaction;
use crate::models::{
    ClientProfile, ContactUsage, FilterOperator, HardFilterRule, TokenBalance, TrainerCandidate,
    TrainerTier, WeightClass,
};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("Connection pool error: {0}")]
    PoolError(#[from] deadpool_postgres::PoolError),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Version conflict for {0}")]
    VersionConflict(String),
}

/// PostgreSQL client for the matching engine's persistence collaborator
///
/// Supplies client profiles, the platform trainer pool, operator-authored
/// rules and weight classes, and owns the token balance and contact usage
/// records the economics endpoints mutate.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        _acquire_timeout_secs: Option<u64>,
        _idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL with URL: {}", url);

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    /// Fetch a client's intake profile
    pub async fn get_client_profile(&self, client_id: &str) -> Result<ClientProfile, PostgresError> {
        let query = r#"
            SELECT client_id, answers, embeddings, goal, experience_level
            FROM client_profiles
            WHERE client_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Client {}", client_id)))?;

        Ok(ClientProfile {
            client_id: row.get("client_id"),
            answers: json_field(&row, "answers")?,
            embeddings: json_field(&row, "embeddings")?,
            goal: row.get("goal"),
            experience_level: row.get("experience_level"),
        })
    }

    /// Fetch the full platform trainer pool
    pub async fn get_platform_trainers(&self) -> Result<Vec<TrainerCandidate>, PostgresError> {
        let query = r#"
            SELECT trainer_id, name, answers, embeddings, is_available,
                   required_responses, tier, boost_expires_at, badge_expires_at,
                   claim_available
            FROM trainer_profiles
            WHERE is_platform = true
            ORDER BY trainer_id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let trainers: Result<Vec<TrainerCandidate>, PostgresError> =
            rows.iter().map(trainer_from_row).collect();
        let trainers = trainers?;

        tracing::debug!("Loaded {} platform trainers", trainers.len());

        Ok(trainers)
    }

    /// Fetch a single trainer profile
    pub async fn get_trainer(&self, trainer_id: &str) -> Result<TrainerCandidate, PostgresError> {
        let query = r#"
            SELECT trainer_id, name, answers, embeddings, is_available,
                   required_responses, tier, boost_expires_at, badge_expires_at,
                   claim_available
            FROM trainer_profiles
            WHERE trainer_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(trainer_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Trainer {}", trainer_id)))?;

        trainer_from_row(&row)
    }

    /// Fetch the operator-authored hard filter rules, in evaluation order
    pub async fn get_hard_filter_rules(&self) -> Result<Vec<HardFilterRule>, PostgresError> {
        let query = r#"
            SELECT id, field, operator, expected, weight_class, failure_reason
            FROM hard_filter_rules
            ORDER BY position
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let raw_operator: String = row.get("operator");
                let operator = FilterOperator::from_wire(&raw_operator).ok_or_else(|| {
                    PostgresError::InvalidInput(format!("unknown operator '{}'", raw_operator))
                })?;

                Ok(HardFilterRule {
                    id: row.get("id"),
                    field: row.get("field"),
                    operator,
                    expected: row.get("expected"),
                    weight_class: row.get("weight_class"),
                    failure_reason: row.get("failure_reason"),
                })
            })
            .collect()
    }

    /// Fetch the operator-authored weight classes, in declared order
    pub async fn get_weight_classes(&self) -> Result<Vec<WeightClass>, PostgresError> {
        let query = r#"
            SELECT id, label, weight, question_ids
            FROM weight_classes
            ORDER BY position
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(WeightClass {
                    id: row.get("id"),
                    label: row.get("label"),
                    weight: row.get("weight"),
                    question_ids: json_field(row, "question_ids")?,
                })
            })
            .collect()
    }

    /// Fetch a client's token balance and its optimistic-concurrency version
    ///
    /// A client with no balance row starts at zero.
    pub async fn get_token_balance(
        &self,
        client_id: &str,
    ) -> Result<(TokenBalance, i64), PostgresError> {
        let query = r#"
            SELECT available, used, total, version
            FROM token_balances
            WHERE client_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok((
                TokenBalance {
                    available: row.get("available"),
                    used: row.get("used"),
                    total: row.get("total"),
                },
                row.get("version"),
            )),
            None => Ok((TokenBalance::new(0.0, 0.0), 0)),
        }
    }

    /// Persist an updated balance under optimistic concurrency
    ///
    /// Fails with `VersionConflict` when another writer got there first; the
    /// caller re-reads, revalidates and retries.
    pub async fn save_token_balance(
        &self,
        client_id: &str,
        balance: &TokenBalance,
        expected_version: i64,
    ) -> Result<(), PostgresError> {
        let query = r#"
            INSERT INTO token_balances (client_id, available, used, total, version)
            VALUES ($1, $2, $3, $4, $5 + 1)
            ON CONFLICT (client_id) DO UPDATE SET
                available = EXCLUDED.available,
                used = EXCLUDED.used,
                total = EXCLUDED.total,
                version = token_balances.version + 1
            WHERE token_balances.version = $5
        "#;

        let result = sqlx::query(query)
            .bind(client_id)
            .bind(balance.available)
            .bind(balance.used)
            .bind(balance.total)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PostgresError::VersionConflict(client_id.to_string()));
        }

        Ok(())
    }

    /// Append a token transaction to the audit trail
    pub async fn record_transaction(
        &self,
        client_id: &str,
        trainer_id: &str,
        transaction: &TokenTransaction,
    ) -> Result<(), PostgresError> {
        let query = r#"
            INSERT INTO token_transactions (id, client_id, trainer_id, amount, kind, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
        "#;

        sqlx::query(query)
            .bind(transaction.id)
            .bind(client_id)
            .bind(trainer_id)
            .bind(transaction.amount)
            .bind(transaction.kind.as_str())
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Recorded {} of {} tokens: {} -> {}",
            transaction.kind.as_str(),
            transaction.amount,
            client_id,
            trainer_id
        );

        Ok(())
    }

    /// Fetch a client's contact and match consumption counters
    ///
    /// Weekly and monthly windows are reset by an external scheduled job.
    pub async fn get_contact_usage(&self, client_id: &str) -> Result<ContactUsage, PostgresError> {
        let query = r#"
            SELECT free_contacts_used, matches_this_week, contacts_this_month
            FROM contact_usage
            WHERE client_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let free: i32 = row.get("free_contacts_used");
                let weekly: i32 = row.get("matches_this_week");
                let monthly: i32 = row.get("contacts_this_month");
                Ok(ContactUsage {
                    free_contacts_used: free.max(0) as u32,
                    matches_this_week: weekly.max(0) as u32,
                    contacts_this_month: monthly.max(0) as u32,
                })
            }
            None => Ok(ContactUsage::default()),
        }
    }

    /// Record a completed contact, bumping the relevant counters
    pub async fn record_contact(
        &self,
        client_id: &str,
        trainer_id: &str,
        free_contact: bool,
    ) -> Result<(), PostgresError> {
        let free_increment: i32 = if free_contact { 1 } else { 0 };

        let query = r#"
            INSERT INTO contact_usage (client_id, free_contacts_used, matches_this_week, contacts_this_month)
            VALUES ($1, $2, 1, 1)
            ON CONFLICT (client_id) DO UPDATE SET
                free_contacts_used = contact_usage.free_contacts_used + $2,
                matches_this_week = contact_usage.matches_this_week + 1,
                contacts_this_month = contact_usage.contacts_this_month + 1
        "#;

        sqlx::query(query)
            .bind(client_id)
            .bind(free_increment)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Recorded contact: {} -> {}", client_id, trainer_id);

        Ok(())
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Decode a JSONB column into a typed value
fn json_field<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, PostgresError> {
    let value: serde_json::Value = row.try_get(column)?;
    serde_json::from_value(value)
        .map_err(|e| PostgresError::InvalidInput(format!("{}: {}", column, e)))
}

/// Map a trainer_profiles row into a candidate
fn trainer_from_row(row: &PgRow) -> Result<TrainerCandidate, PostgresError> {
    let raw_tier: String = row.get("tier");

    Ok(TrainerCandidate {
        trainer_id: row.get("trainer_id"),
        name: row.get("name"),
        answers: json_field(row, "answers")?,
        embeddings: json_field(row, "embeddings")?,
        is_available: row.get("is_available"),
        required_responses: json_field(row, "required_responses")?,
        tier: TrainerTier::from_wire(&raw_tier),
        boost_expires_at: row.get("boost_expires_at"),
        badge_expires_at: row.get("badge_expires_at"),
        claim_available: row.get("claim_available"),
    })
}
