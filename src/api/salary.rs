use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{employee::StaffNumber, salary::EmployeeSalary},
    service::salary_import::{
        ColumnMapping, ImportedSheet, SalaryDirectory, SalaryDraft, import_salaries,
    },
    utils::import_storage,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const SALARY_COLUMNS: &str =
    "id, employee_id, year, month, salary_type, gross_with_employer_share, comment";

#[derive(Debug, Deserialize, IntoParams)]
pub struct SalaryQuery {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[param(example = 2026)]
    pub year: Option<i32>,
    /// 1-based month
    #[param(example = 3)]
    pub month: Option<u32>,
    /// Page number (start with 1)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedSalaryResponse {
    pub data: Vec<EmployeeSalary>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ImportQuery {
    /// Any day of the month the sheet belongs to
    #[param(example = "2026-03-01", value_type = String, format = Date)]
    pub date: NaiveDate,
}

/// Parsed sheet kept on the server until it is committed.
#[derive(Serialize, ToSchema)]
pub struct ImportPreview {
    #[schema(example = "8f14e45f-ceea-467f-a0e6-1c5b2f6e3a1d")]
    pub storage_id: String,
    pub valid: usize,
    pub faulty: usize,
    pub sheet: ImportedSheet,
}

impl ImportPreview {
    fn new(storage_id: Uuid, sheet: ImportedSheet) -> Self {
        Self {
            storage_id: storage_id.to_string(),
            valid: sheet.valid_count(),
            faulty: sheet.faulty_count(),
            sheet,
        }
    }
}

fn parse_storage_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid storage id".to_string()))
}

async fn load_directory(
    pool: &MySqlPool,
    year: i32,
    month: u32,
) -> Result<SalaryDirectory, sqlx::Error> {
    let employees = sqlx::query_as::<_, (u64, String)>(
        "SELECT id, staff_number FROM employees WHERE staff_number IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;

    let salaries = sqlx::query_as::<_, EmployeeSalary>(&format!(
        "SELECT {SALARY_COLUMNS} FROM employee_salaries WHERE year = ? AND month = ?"
    ))
    .bind(year)
    .bind(month)
    .fetch_all(pool)
    .await?;

    Ok(SalaryDirectory::new(
        employees
            .into_iter()
            .filter_map(|(id, staff_number)| StaffNumber::parse(&staff_number).map(|s| (s, id))),
        salaries,
    ))
}

async fn save_draft(
    tx: &mut Transaction<'_, MySql>,
    draft: &SalaryDraft,
) -> Result<(), sqlx::Error> {
    match draft.id {
        Some(id) => {
            sqlx::query(
                "UPDATE employee_salaries SET gross_with_employer_share = ?, comment = ? WHERE id = ?",
            )
            .bind(draft.gross_with_employer_share)
            .bind(&draft.comment)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            // A record created since the preview was taken is updated instead.
            sqlx::query(
                r#"
                INSERT INTO employee_salaries
                    (employee_id, year, month, salary_type, gross_with_employer_share, comment)
                VALUES (?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    gross_with_employer_share = VALUES(gross_with_employer_share),
                    comment = VALUES(comment)
                "#,
            )
            .bind(draft.employee_id)
            .bind(draft.year)
            .bind(draft.month)
            .bind(draft.salary_type.as_ref())
            .bind(draft.gross_with_employer_share)
            .bind(&draft.comment)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

/// List salaries
#[utoipa::path(
    get,
    path = "/api/salary",
    params(SalaryQuery),
    responses(
        (status = 200, description = "Paginated salary list", body = PaginatedSalaryResponse)
    ),
    tag = "Salary",
    security(("bearer_auth" = []))
)]
pub async fn list_salaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalaryQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = if auth.role.is_hr_or_admin() {
        query.employee_id
    } else {
        // Employees only ever see their own salaries.
        Some(auth.require_employee()?)
    };

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<i64> = Vec::new();
    if let Some(id) = employee_id {
        conditions.push("employee_id = ?");
        bindings.push(id as i64);
    }
    if let Some(year) = query.year {
        conditions.push("year = ?");
        bindings.push(year.into());
    }
    if let Some(month) = query.month {
        conditions.push("month = ?");
        bindings.push(month.into());
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employee_salaries {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(*b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {SALARY_COLUMNS} FROM employee_salaries {} \
         ORDER BY year DESC, month DESC, employee_id LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, bindings = ?bindings, "Fetching salaries");
    let mut data_query = sqlx::query_as::<_, EmployeeSalary>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(*b);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedSalaryResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get salary by ID
#[utoipa::path(
    get,
    path = "/api/salary/{salary_id}",
    params(("salary_id" = u64, Path, description = "Salary ID")),
    responses(
        (status = 200, description = "Salary found", body = EmployeeSalary),
        (status = 404, description = "Salary not found")
    ),
    tag = "Salary",
    security(("bearer_auth" = []))
)]
pub async fn get_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let salary_id = path.into_inner();

    let salary = sqlx::query_as::<_, EmployeeSalary>(&format!(
        "SELECT {SALARY_COLUMNS} FROM employee_salaries WHERE id = ?"
    ))
    .bind(salary_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("Salary"))?;
    // Someone else's salary answers like a missing one.
    auth.require_self_or_hr(salary.employee_id)
        .map_err(|_| AppError::not_found("Salary"))?;

    Ok(HttpResponse::Ok().json(salary))
}

/// Upload a payroll sheet (CSV) for preview
#[utoipa::path(
    post,
    path = "/api/salary/import",
    params(ImportQuery),
    request_body(content = String, content_type = "text/csv", description = "Payroll sheet with a header row"),
    responses(
        (status = 200, description = "Parsed sheet with per-row errors and changes", body = ImportPreview),
        (status = 400, description = "Columns not configured or not found in the sheet")
    ),
    tag = "Salary",
    security(("bearer_auth" = []))
)]
pub async fn import_preview(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ImportQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let mapping = ColumnMapping::from_config(&config.salary_import)?;

    let date = query.date;
    let directory = load_directory(pool.get_ref(), date.year(), date.month()).await?;
    let sheet = import_salaries(body.as_ref(), &mapping, &directory, date)?;

    let storage_id = import_storage::store(sheet.clone()).await;
    info!(%storage_id, rows = sheet.elements.len(), "Salary import stored for review");

    Ok(HttpResponse::Ok().json(ImportPreview::new(storage_id, sheet)))
}

/// Show a stored import
#[utoipa::path(
    get,
    path = "/api/salary/import/{storage_id}",
    params(("storage_id" = String, Path, description = "Id returned by the upload")),
    responses(
        (status = 200, description = "Stored import", body = ImportPreview),
        (status = 404, description = "Import expired or unknown")
    ),
    tag = "Salary",
    security(("bearer_auth" = []))
)]
pub async fn get_import(
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let storage_id = parse_storage_id(&path)?;

    let sheet = import_storage::get(&storage_id)
        .await
        .ok_or_else(|| AppError::not_found("Import"))?;

    Ok(HttpResponse::Ok().json(ImportPreview::new(storage_id, sheet)))
}

/// Persist the error-free rows of a stored import
#[utoipa::path(
    post,
    path = "/api/salary/import/{storage_id}/commit",
    params(("storage_id" = String, Path, description = "Id returned by the upload")),
    responses(
        (status = 200, description = "Rows saved", body = Object, example = json!({
            "message": "Salaries imported", "saved": 41, "skipped": 1
        })),
        (status = 404, description = "Import expired or unknown")
    ),
    tag = "Salary",
    security(("bearer_auth" = []))
)]
pub async fn commit_import(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let storage_id = parse_storage_id(&path)?;

    let sheet = import_storage::get(&storage_id)
        .await
        .ok_or_else(|| AppError::not_found("Import"))?;

    let mut tx = pool.begin().await?;
    let mut saved = 0usize;
    for draft in sheet.valid_drafts() {
        save_draft(&mut tx, draft).await?;
        saved += 1;
    }
    tx.commit().await?;
    import_storage::take(&storage_id).await;

    let skipped = sheet.faulty_count();
    info!(%storage_id, saved, skipped, "Salary import committed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Salaries imported",
        "saved": saved,
        "skipped": skipped
    })))
}
