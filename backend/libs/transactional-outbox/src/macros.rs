//! Convenience macros for working with the outbox.

/// Insert an [`crate::OutboxRecord`] within an open business transaction.
///
/// # Usage
///
/// ```rust,no_run
/// use transactional_outbox::{publish_event, SqlxOutboxRepository};
/// use sqlx::PgPool;
/// use uuid::Uuid;
/// use serde_json::json;
///
/// # async fn example(pool: PgPool, repo: SqlxOutboxRepository) -> Result<(), Box<dyn std::error::Error>> {
/// let mut tx = pool.begin().await?;
/// let document_id = Uuid::new_v4();
///
/// sqlx::query("INSERT INTO documents (id, name) VALUES ($1, $2)")
///     .bind(document_id)
///     .bind("report.pdf")
///     .execute(&mut *tx)
///     .await?;
///
/// publish_event!(
///     &mut tx,
///     &repo,
///     "document",
///     document_id,
///     "DocumentUploaded",
///     json!({ "documentName": "report.pdf" })
/// );
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! publish_event {
    ($tx:expr, $repo:expr, $aggregate_type:expr, $aggregate_id:expr, $event_type:expr, $payload:expr) => {{
        use $crate::{OutboxRecord, OutboxRepository};

        let record = OutboxRecord::new($aggregate_type, $aggregate_id, $event_type, $payload);
        $repo.insert($tx, &record).await
    }};
}

#[cfg(test)]
mod tests {
    // Macro expansion is exercised by the doctest above; nothing further to
    // assert here.
}
