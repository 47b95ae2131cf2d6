//! HTTP handlers for the ingress stage: create a document and read it back.
//!
//! `create_document` is the one place in the whole pipeline where the
//! aggregate is born; it writes the aggregate row and the `Uploaded` outbox
//! row in a single transaction, so the two can never disagree about whether
//! the upload happened.

use actix_web::{web, HttpRequest, HttpResponse};
use error_types::AppError;
use sqlx::PgPool;
use transactional_outbox::{OutboxRecord, OutboxRepository, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::{CreateDocumentRequest, Document, DocumentResponse, DocumentUploadedPayload};

pub async fn create_document(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    outbox: web::Data<SqlxOutboxRepository>,
    body: web::Json<CreateDocumentRequest>,
) -> Result<HttpResponse, AppError> {
    let correlation_id = correlation::correlation_id_from_request(&req);

    if body.name.trim().is_empty() {
        let mut field_errors = std::collections::HashMap::new();
        field_errors.insert("name".to_string(), "must not be blank".to_string());
        return Err(AppError::Validation {
            message: "invalid document upload request".to_string(),
            field_errors,
        });
    }

    let document = Document {
        id: Uuid::new_v4(),
        name: body.name.clone(),
        content_type: body.content_type.clone(),
        file_size: body.file_size,
        metadata: body.metadata.clone(),
        uploaded_by: body.uploaded_by.clone(),
        status: "UPLOADED".to_string(),
        correlation_id: correlation_id.to_string(),
        created_at: chrono::Utc::now(),
    };

    let mut tx = pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, name, content_type, file_size, metadata, uploaded_by, status, correlation_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(document.id)
    .bind(&document.name)
    .bind(&document.content_type)
    .bind(document.file_size)
    .bind(&document.metadata)
    .bind(&document.uploaded_by)
    .bind(&document.status)
    .bind(&document.correlation_id)
    .bind(document.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let event_id = Uuid::new_v4();
    let payload = DocumentUploadedPayload::new(event_id, &document);
    let record = OutboxRecord::with_event_id(
        event_id,
        "document",
        document.id,
        "DocumentUploaded",
        serde_json::to_value(&payload).map_err(|e| AppError::Internal(e.to_string()))?,
    );
    outbox
        .insert(&mut tx, &record)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!(
        document_id = %document.id,
        correlation_id = %correlation_id,
        "document uploaded"
    );

    Ok(HttpResponse::Created().json(DocumentResponse::from(document)))
}

pub async fn get_document(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let document = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, name, content_type, file_size, metadata, uploaded_by, status, correlation_id, created_at
        FROM documents WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound(format!("document {id}")))?;

    Ok(HttpResponse::Ok().json(DocumentResponse::from(document)))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
