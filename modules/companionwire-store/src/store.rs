// Postgres persistence. All writes funnel through here; the engine composes
// the multi-statement cluster transaction out of the ops in `clusters`.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use companionwire_common::error::RunError;

use crate::models::{IngestRunRow, NewRawSignal, RawSignalRow, SignalNormalization, SignalRow};

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

/// Result of attempting to store one fetched item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInsertOutcome {
    /// A new raw signal and its pending companion signal were created.
    Inserted { signal_id: Uuid },
    /// The content hash already exists; nothing was written.
    Duplicate,
}

impl Store {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn begin(&self) -> sqlx::Result<Transaction<'static, Postgres>> {
        self.pool.begin().await
    }

    // --- Raw signals ---

    /// Insert a raw signal and its companion PENDING signal in one
    /// transaction. The content-hash unique index is checked first so a
    /// duplicate fetch is a counted skip, not an error.
    pub async fn insert_raw_signal(&self, new: &NewRawSignal) -> sqlx::Result<RawInsertOutcome> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM raw_signals WHERE content_hash = $1")
                .bind(&new.content_hash)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Ok(RawInsertOutcome::Duplicate);
        }

        let mut tx = self.pool.begin().await?;

        let raw_id = Uuid::new_v4();
        let insert = sqlx::query(
            r#"
            INSERT INTO raw_signals
                (id, source_kind, source_name, source_url, source_domain, external_id,
                 fetched_at, content_type, payload, raw_text, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(raw_id)
        .bind(&new.source_kind)
        .bind(&new.source_name)
        .bind(&new.source_url)
        .bind(&new.source_domain)
        .bind(&new.external_id)
        .bind(new.fetched_at)
        .bind(&new.content_type)
        .bind(&new.payload)
        .bind(&new.raw_text)
        .bind(&new.content_hash)
        .execute(&mut *tx)
        .await;

        // Two cycles racing on the same item: the unique index wins, we skip.
        if let Err(e) = insert {
            if is_unique_violation(&e) {
                tx.rollback().await.ok();
                return Ok(RawInsertOutcome::Duplicate);
            }
            return Err(e);
        }

        let signal_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO signals
                (id, raw_signal_id, canonical_url, title, author, published_at, ingest_status)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING')
            "#,
        )
        .bind(signal_id)
        .bind(raw_id)
        .bind(&new.canonical_url)
        .bind(&new.title)
        .bind(&new.author)
        .bind(new.published_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RawInsertOutcome::Inserted { signal_id })
    }

    // --- Signals ---

    pub async fn signal_by_id(&self, id: Uuid) -> sqlx::Result<Option<SignalRow>> {
        sqlx::query_as::<_, SignalRow>("SELECT * FROM signals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn raw_signal_by_id(&self, id: Uuid) -> sqlx::Result<Option<RawSignalRow>> {
        sqlx::query_as::<_, RawSignalRow>("SELECT * FROM raw_signals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Apply the normalizer's terminal decision to a pending signal.
    pub async fn apply_normalization(
        &self,
        signal_id: Uuid,
        n: &SignalNormalization,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE signals SET
                ingest_status = $2,
                ingest_reason = $3,
                summary = $4,
                suggested_headline = $5,
                categories = $6,
                entity_platforms = $7,
                entity_companies = $8,
                entity_people = $9,
                entity_topics = $10,
                confidence = $11,
                llm_provider = $12,
                llm_model = $13,
                prompt_version = $14,
                llm_raw_response = $15,
                image_url = $16,
                normalized_at = $17
            WHERE id = $1 AND ingest_status = 'PENDING'
            "#,
        )
        .bind(signal_id)
        .bind(&n.status)
        .bind(&n.reason)
        .bind(&n.summary)
        .bind(&n.suggested_headline)
        .bind(&n.categories)
        .bind(&n.entity_platforms)
        .bind(&n.entity_companies)
        .bind(&n.entity_people)
        .bind(&n.entity_topics)
        .bind(n.confidence)
        .bind(&n.llm_provider)
        .bind(&n.llm_model)
        .bind(&n.prompt_version)
        .bind(&n.llm_raw_response)
        .bind(&n.image_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Which of the given slugs exist in the platform reference table.
    pub async fn known_platform_slugs(&self, slugs: &[String]) -> sqlx::Result<Vec<String>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT slug FROM platforms WHERE slug = ANY($1)")
                .bind(slugs)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// Link a signal to the platform rows matching the given slugs.
    pub async fn link_signal_platforms(&self, signal_id: Uuid, slugs: &[String]) -> sqlx::Result<()> {
        if slugs.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO signal_platforms (signal_id, platform_id)
            SELECT $1, id FROM platforms WHERE slug = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(signal_id)
        .bind(slugs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Ingest runs ---

    pub async fn insert_run(&self) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO ingest_runs (id, started_at, status) VALUES ($1, $2, 'RUNNING')")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn finish_run(
        &self,
        run_id: Uuid,
        status: &str,
        fetched: u32,
        accepted: u32,
        rejected: u32,
        errors: &[RunError],
    ) -> sqlx::Result<()> {
        let errors_json = serde_json::to_value(errors).unwrap_or_default();
        sqlx::query(
            r#"
            UPDATE ingest_runs SET
                finished_at = $2,
                status = $3,
                signals_fetched = $4,
                signals_accepted = $5,
                signals_rejected = $6,
                errors = $7
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(status)
        .bind(fetched as i32)
        .bind(accepted as i32)
        .bind(rejected as i32)
        .bind(errors_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_runs(&self, limit: i64) -> sqlx::Result<Vec<IngestRunRow>> {
        sqlx::query_as::<_, IngestRunRow>(
            "SELECT * FROM ingest_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

/// True when the error is a Postgres unique-constraint violation (23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
