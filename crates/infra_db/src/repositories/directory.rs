//! Student directory repository
//!
//! PostgreSQL adapter for the student/class directory port. The directory
//! is a collaborator of the ledger, not part of it — the ledger only ever
//! reads from it.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{ClassId, DomainPort, PortError, StudentId};
use domain_billing::{Student, StudentDirectory};

use crate::error::DatabaseError;

/// PostgreSQL-backed [`StudentDirectory`]
#[derive(Debug, Clone)]
pub struct PgStudentDirectory {
    pool: PgPool,
}

impl PgStudentDirectory {
    /// Creates a new directory over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgStudentDirectory {}

#[async_trait]
impl StudentDirectory for PgStudentDirectory {
    async fn find_student(&self, id: StudentId) -> Result<Option<Student>, PortError> {
        let row: Option<StudentRow> = sqlx::query_as(
            r#"
            SELECT student_id, first_name, last_name, reg_no, class_id
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(Student::from))
    }

    async fn find_students_in_class(&self, class_id: ClassId) -> Result<Vec<Student>, PortError> {
        let rows: Vec<StudentRow> = sqlx::query_as(
            r#"
            SELECT student_id, first_name, last_name, reg_no, class_id
            FROM students
            WHERE class_id = $1
            ORDER BY reg_no
            "#,
        )
        .bind(*class_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows.into_iter().map(Student::from).collect())
    }

    async fn list_students(&self) -> Result<Vec<Student>, PortError> {
        let rows: Vec<StudentRow> = sqlx::query_as(
            r#"
            SELECT student_id, first_name, last_name, reg_no, class_id
            FROM students
            ORDER BY reg_no
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows.into_iter().map(Student::from).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StudentRow {
    student_id: Uuid,
    first_name: String,
    last_name: String,
    reg_no: String,
    class_id: Option<Uuid>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: StudentId::from_uuid(row.student_id),
            first_name: row.first_name,
            last_name: row.last_name,
            reg_no: row.reg_no,
            class_id: row.class_id.map(ClassId::from_uuid),
        }
    }
}
