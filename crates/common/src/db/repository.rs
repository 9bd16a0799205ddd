//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::auth::Role;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::plan::{select_target_plan, PlanContent, PlanStatus, PlanVersion, TokenUsage};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use serde_json::Value;
use uuid::Uuid;

/// Partial unique index allowing one active plan per organization
const ONE_ACTIVE_INDEX: &str = "uq_plans_one_active";

/// Fields of a freshly stored upload
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Chosen before insert so the file can be stored under it
    pub id: Uuid,
    pub organization_id: Uuid,
    pub uploaded_by: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub content_hash: String,
}

/// Worker output for a successfully processed document
#[derive(Debug, Clone)]
pub struct CompletedExtraction {
    pub extracted_text: String,
    pub extracted_data: Value,
    pub document_type: String,
    pub confidence: f64,
    pub usage: TokenUsage,
}

/// One applied category of a document merge
#[derive(Debug, Clone)]
pub struct NewExtraction {
    pub document_id: Uuid,
    pub extraction_type: String,
    pub section_title: String,
    pub payload: Value,
    pub usage: TokenUsage,
}

/// Repository for data access operations
#[cfg_attr(not(test), derive(Clone))]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Organization Operations
    // ========================================================================

    pub async fn create_organization(&self, name: String, created_by: Uuid) -> Result<Organization> {
        let now = Utc::now();

        let organization = OrganizationActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_by: Set(created_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        organization.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete organization by ID; members, plans and documents cascade
    pub async fn delete_organization(&self, id: Uuid) -> Result<bool> {
        let result = OrganizationEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        OrganizationEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn add_member(&self, organization_id: Uuid, user_id: Uuid, role: Role) -> Result<Member> {
        let member = MemberActiveModel {
            organization_id: Set(organization_id),
            user_id: Set(user_id),
            role: Set(role.as_str().to_string()),
            created_at: Set(Utc::now().into()),
        };

        member.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Caller's role in an organization, `None` when not a member
    pub async fn member_role(&self, organization_id: Uuid, user_id: Uuid) -> Result<Option<Role>> {
        let member = MemberEntity::find_by_id((organization_id, user_id))
            .one(self.read_conn())
            .await?;

        Ok(member.map(|m| m.role()))
    }

    /// Organizations the user belongs to, with the user's role in each
    pub async fn list_organizations_for_user(&self, user_id: Uuid) -> Result<Vec<(Organization, Role)>> {
        let rows = MemberEntity::find()
            .filter(MemberColumn::UserId.eq(user_id))
            .order_by_asc(MemberColumn::CreatedAt)
            .find_also_related(OrganizationEntity)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, org)| org.map(|o| (o, member.role())))
            .collect())
    }

    // ========================================================================
    // Plan Operations
    // ========================================================================

    /// Insert a new draft plan at revision 1
    pub async fn create_plan(
        &self,
        organization_id: Uuid,
        created_by: Uuid,
        version: PlanVersion,
        content: &PlanContent,
    ) -> Result<Plan> {
        let now = Utc::now();

        let plan = PlanActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            version: Set(version.to_string()),
            status: Set(PlanStatus::Draft.as_str().to_string()),
            content: Set(content.to_json()?),
            created_by: Set(created_by),
            revision: Set(1),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            activated_at: Set(None),
        };

        plan.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_plan(&self, id: Uuid) -> Result<Option<Plan>> {
        PlanEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Plans of an organization, newest first
    pub async fn list_plans(&self, organization_id: Uuid) -> Result<Vec<Plan>> {
        PlanEntity::find()
            .filter(PlanColumn::OrganizationId.eq(organization_id))
            .order_by_desc(PlanColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Every version string used in the organization
    pub async fn plan_versions(&self, organization_id: Uuid) -> Result<Vec<String>> {
        PlanEntity::find()
            .select_only()
            .column(PlanColumn::Version)
            .filter(PlanColumn::OrganizationId.eq(organization_id))
            .into_tuple::<String>()
            .all(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Write new content if the stored revision still equals `expected_revision`
    pub async fn update_plan_content(
        &self,
        id: Uuid,
        expected_revision: i32,
        content: &PlanContent,
    ) -> Result<Plan> {
        write_plan_content(self.write_conn(), id, expected_revision, content).await
    }

    /// Move a plan to `review`, `draft` or `archived`
    pub async fn set_plan_status(&self, id: Uuid, status: PlanStatus) -> Result<Plan> {
        if status == PlanStatus::Active {
            return self.activate_plan(id).await;
        }

        let plan = self
            .find_plan(id)
            .await?
            .ok_or_else(|| AppError::PlanNotFound { id: id.to_string() })?;

        let current = plan.plan_status();
        if !current.can_transition_to(status) {
            return Err(AppError::InvalidState {
                message: format!("Cannot move plan from {} to {}", current, status),
            });
        }

        let mut active: PlanActiveModel = plan.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Activate a plan and archive every other active plan of its organization
    pub async fn activate_plan(&self, id: Uuid) -> Result<Plan> {
        let txn = self.write_conn().begin().await?;

        let plan = PlanEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::PlanNotFound { id: id.to_string() })?;

        let current = plan.plan_status();
        if !current.can_transition_to(PlanStatus::Active) {
            return Err(AppError::InvalidState {
                message: format!("Cannot activate a plan that is {}", current),
            });
        }

        let now = Utc::now();
        let archived = PlanEntity::update_many()
            .col_expr(PlanColumn::Status, Expr::value(PlanStatus::Archived.as_str()))
            .col_expr(PlanColumn::UpdatedAt, Expr::value(now))
            .filter(PlanColumn::OrganizationId.eq(plan.organization_id))
            .filter(PlanColumn::Status.eq(PlanStatus::Active.as_str()))
            .filter(PlanColumn::Id.ne(id))
            .exec(&txn)
            .await?;

        let mut active: PlanActiveModel = plan.into();
        active.status = Set(PlanStatus::Active.as_str().to_string());
        active.activated_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        let plan = active
            .update(&txn)
            .await
            .map_err(|e| activation_conflict(e, id))?;

        txn.commit().await.map_err(|e| activation_conflict(e, id))?;

        tracing::info!(
            plan_id = %id,
            archived = archived.rows_affected,
            "Activated plan"
        );
        Ok(plan)
    }

    /// Archive the given plans regardless of status
    pub async fn archive_plans(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = PlanEntity::update_many()
            .col_expr(PlanColumn::Status, Expr::value(PlanStatus::Archived.as_str()))
            .col_expr(PlanColumn::UpdatedAt, Expr::value(Utc::now()))
            .filter(PlanColumn::Id.is_in(ids.iter().copied()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    /// The plan document imports merge into: the active plan, else the newest draft.
    /// Surplus active plans are archived on the way.
    pub async fn resolve_target_plan(&self, organization_id: Uuid) -> Result<Option<Plan>> {
        let plans = PlanEntity::find()
            .filter(PlanColumn::OrganizationId.eq(organization_id))
            .filter(
                PlanColumn::Status
                    .is_in([PlanStatus::Active.as_str(), PlanStatus::Draft.as_str()]),
            )
            .all(self.write_conn())
            .await?;

        let candidates: Vec<_> = plans.iter().map(Plan::candidate).collect();
        let selection = select_target_plan(&candidates);

        if !selection.to_archive.is_empty() {
            tracing::warn!(
                organization_id = %organization_id,
                count = selection.to_archive.len(),
                "Archiving surplus active plans"
            );
            self.archive_plans(&selection.to_archive).await?;
        }

        Ok(selection
            .target
            .and_then(|id| plans.into_iter().find(|p| p.id == id)))
    }

    /// Write merged content and its audit rows in one transaction
    pub async fn apply_document_merge(
        &self,
        plan_id: Uuid,
        expected_revision: i32,
        content: &PlanContent,
        applied_by: Uuid,
        extractions: Vec<NewExtraction>,
    ) -> Result<(Plan, Vec<Extraction>)> {
        let txn = self.write_conn().begin().await?;

        let plan = write_plan_content(&txn, plan_id, expected_revision, content).await?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(extractions.len());
        for extraction in extractions {
            let record = ExtractionActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(extraction.document_id),
                plan_id: Set(plan_id),
                organization_id: Set(plan.organization_id),
                extraction_type: Set(extraction.extraction_type),
                section_title: Set(extraction.section_title),
                extracted_payload: Set(extraction.payload),
                input_tokens: Set(extraction.usage.input_tokens as i32),
                output_tokens: Set(extraction.usage.output_tokens as i32),
                applied: Set(true),
                applied_at: Set(Some(now.into())),
                applied_by: Set(Some(applied_by)),
                created_at: Set(now.into()),
            };
            records.push(record.insert(&txn).await?);
        }

        txn.commit().await?;
        Ok((plan, records))
    }

    // ========================================================================
    // Extraction Records
    // ========================================================================

    pub async fn list_extractions_for_plan(&self, plan_id: Uuid) -> Result<Vec<Extraction>> {
        ExtractionEntity::find()
            .filter(ExtractionColumn::PlanId.eq(plan_id))
            .order_by_desc(ExtractionColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Insert an uploaded document; it is due for extraction immediately
    pub async fn create_document(&self, new: NewDocument) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(new.id),
            organization_id: Set(new.organization_id),
            uploaded_by: Set(new.uploaded_by),
            filename: Set(new.filename),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            storage_path: Set(new.storage_path),
            content_hash: Set(new.content_hash),
            status: Set(DocumentStatus::Processing.into()),
            extracted_text: Set(None),
            extracted_data: Set(None),
            document_type: Set(None),
            confidence_score: Set(None),
            processing_error: Set(None),
            attempt_count: Set(0),
            next_attempt_at: Set(Some(now.into())),
            lease_expires_at: Set(None),
            input_tokens: Set(0),
            output_tokens: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            processed_at: Set(None),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Documents of an organization, newest first
    pub async fn list_documents(&self, organization_id: Uuid) -> Result<Vec<Document>> {
        DocumentEntity::find()
            .filter(DocumentColumn::OrganizationId.eq(organization_id))
            .order_by_desc(DocumentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Claim one due document for processing (uses SKIP LOCKED for concurrency).
    ///
    /// The claim takes a lease and counts an attempt. A worker that dies leaves the
    /// lease to expire, after which the document is claimable again.
    pub async fn claim_next_document(&self, lease_secs: i64) -> Result<Option<Document>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE documents
            SET lease_expires_at = NOW() + make_interval(secs => $1),
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM documents
                WHERE status = 'processing'
                  AND (next_attempt_at IS NULL OR next_attempt_at <= NOW())
                  AND (lease_expires_at IS NULL OR lease_expires_at < NOW())
                ORDER BY next_attempt_at ASC NULLS FIRST, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
            vec![(lease_secs as f64).into()],
        );

        DocumentEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Store the extraction result and release the lease
    pub async fn complete_document(&self, id: Uuid, result: CompletedExtraction) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(id),
            status: Set(DocumentStatus::Completed.into()),
            extracted_text: Set(Some(result.extracted_text)),
            extracted_data: Set(Some(result.extracted_data)),
            document_type: Set(Some(result.document_type)),
            confidence_score: Set(Some(result.confidence)),
            processing_error: Set(None),
            lease_expires_at: Set(None),
            input_tokens: Set(result.usage.input_tokens as i32),
            output_tokens: Set(result.usage.output_tokens as i32),
            updated_at: Set(now.into()),
            processed_at: Set(Some(now.into())),
            ..Default::default()
        };

        document.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Release the lease and make the document due again after `delay_secs`
    pub async fn schedule_document_retry(&self, id: Uuid, error: &str, delay_secs: i64) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(id),
            processing_error: Set(Some(error.to_string())),
            next_attempt_at: Set(Some((now + Duration::seconds(delay_secs)).into())),
            lease_expires_at: Set(None),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        document.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Dead-letter a document
    pub async fn fail_document(&self, id: Uuid, error: &str) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(id),
            status: Set(DocumentStatus::Failed.into()),
            processing_error: Set(Some(error.to_string())),
            next_attempt_at: Set(None),
            lease_expires_at: Set(None),
            updated_at: Set(now.into()),
            processed_at: Set(Some(now.into())),
            ..Default::default()
        };

        document.update(self.write_conn()).await.map_err(Into::into)
    }
}

/// Revision-checked content write, usable inside a transaction
/// A concurrent activation in the same organization won the unique index
fn activation_conflict(err: DbErr, id: Uuid) -> AppError {
    if err.to_string().contains(ONE_ACTIVE_INDEX) {
        AppError::Conflict {
            message: format!(
                "Another plan was activated concurrently; retry activating {}",
                id
            ),
        }
    } else {
        err.into()
    }
}

async fn write_plan_content<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_revision: i32,
    content: &PlanContent,
) -> Result<Plan> {
    let result = PlanEntity::update_many()
        .col_expr(PlanColumn::Content, Expr::value(content.to_json()?))
        .col_expr(PlanColumn::Revision, Expr::col(PlanColumn::Revision).add(1))
        .col_expr(PlanColumn::UpdatedAt, Expr::value(Utc::now()))
        .filter(PlanColumn::Id.eq(id))
        .filter(PlanColumn::Revision.eq(expected_revision))
        .exec(conn)
        .await?;

    let plan = PlanEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::PlanNotFound { id: id.to_string() })?;

    if result.rows_affected == 0 {
        return Err(AppError::RevisionConflict {
            id: id.to_string(),
            expected: expected_revision,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_content;
    use sea_orm::{MockDatabase, MockExecResult, RuntimeErr};

    fn plan(id: Uuid, status: PlanStatus, revision: i32) -> Plan {
        Plan {
            id,
            organization_id: Uuid::nil(),
            version: "1.0".to_string(),
            status: status.as_str().to_string(),
            content: sample_content().to_json().unwrap(),
            created_by: Uuid::nil(),
            revision,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            activated_at: None,
        }
    }

    fn repository(db: MockDatabase) -> Repository {
        Repository::new(DbPool {
            primary: db.into_connection(),
            replica: None,
        })
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_stale_revision_is_a_conflict() {
        let id = Uuid::new_v4();
        let repo = repository(
            MockDatabase::new(DbBackend::Postgres)
                .append_exec_results([exec(0)])
                .append_query_results([vec![plan(id, PlanStatus::Draft, 5)]]),
        );

        let result = repo.update_plan_content(id, 4, &sample_content()).await;
        assert!(matches!(
            result,
            Err(AppError::RevisionConflict { expected: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_current_revision_is_written() {
        let id = Uuid::new_v4();
        let repo = repository(
            MockDatabase::new(DbBackend::Postgres)
                .append_exec_results([exec(1)])
                .append_query_results([vec![plan(id, PlanStatus::Draft, 5)]]),
        );

        let plan = tokio_test::assert_ok!(repo.update_plan_content(id, 4, &sample_content()).await);
        assert_eq!(plan.revision, 5);
    }

    #[tokio::test]
    async fn test_activation_archives_siblings_in_one_transaction() {
        let id = Uuid::new_v4();
        let mut activated = plan(id, PlanStatus::Active, 2);
        activated.activated_at = Some(Utc::now().into());

        let repo = repository(
            MockDatabase::new(DbBackend::Postgres)
                .append_query_results([vec![plan(id, PlanStatus::Review, 2)], vec![activated]])
                .append_exec_results([exec(1)]),
        );

        let plan = tokio_test::assert_ok!(repo.activate_plan(id).await);
        assert_eq!(plan.plan_status(), PlanStatus::Active);

        let Repository { pool } = repo;
        let log = pool.primary.into_transaction_log();
        assert_eq!(log.len(), 1);

        let log = format!("{:?}", log);
        let begin = log.find("BEGIN").unwrap();
        let locked = log.find("FOR UPDATE").unwrap();
        let siblings = log.find("<>").unwrap();
        let row_update = log.find("RETURNING").unwrap();
        let commit = log.find("COMMIT").unwrap();
        assert!(begin < locked);
        assert!(locked < siblings);
        assert!(siblings < row_update);
        assert!(row_update < commit);
        assert!(log.contains("\"active\""));
    }

    #[tokio::test]
    async fn test_racing_activation_is_a_conflict() {
        let id = Uuid::new_v4();
        let violation = DbErr::Query(RuntimeErr::Internal(format!(
            "duplicate key value violates unique constraint \"{}\"",
            ONE_ACTIVE_INDEX
        )));

        let repo = repository(
            MockDatabase::new(DbBackend::Postgres)
                .append_query_results([vec![plan(id, PlanStatus::Draft, 1)]])
                .append_query_errors([violation])
                .append_exec_results([exec(0)]),
        );

        let result = repo.activate_plan(id).await;
        assert!(matches!(result, Err(AppError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_archived_plan_cannot_be_activated() {
        let id = Uuid::new_v4();
        let repo = repository(
            MockDatabase::new(DbBackend::Postgres)
                .append_query_results([vec![plan(id, PlanStatus::Archived, 1)]]),
        );

        let result = repo.activate_plan(id).await;
        assert!(matches!(result, Err(AppError::InvalidState { .. })));
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        let err = activation_conflict(DbErr::Custom("connection reset".into()), Uuid::nil());
        assert!(matches!(err, AppError::Database(_)));
    }
}
