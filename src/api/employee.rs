use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::employee::{Employee, StaffNumber},
    service::vacation::{LeaveBalance, VacationRules, could_use_vacation_service},
    utils::db_utils::{
        EMPLOYEE_COLUMNS, build_update_sql, execute_update, fetch_employee, fetch_vacations,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns a partial update may touch. Carry-over figures are maintained by the
/// vacation workflow and the year-end job only.
const UPDATABLE_COLUMNS: [&str; 7] = [
    "staff_number",
    "first_name",
    "last_name",
    "email",
    "hire_date",
    "annual_leave_days",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "1001", nullable = true)]
    pub staff_number: Option<String>,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 30, nullable = true)]
    pub annual_leave_days: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Page number (start with 1)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
    /// Filter by status
    pub status: Option<String>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Example payload for a partial update; any subset of the fields may be sent.
#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub staff_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: Option<NaiveDate>,
    pub annual_leave_days: Option<i32>,
    #[schema(example = "inactive")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct YearQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

fn duplicate_staff_number(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Staff number already in use".to_string())
        }
        other => other.into(),
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created", "id": 1
        })),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Staff number already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    if payload.first_name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::BadRequest("first_name and email are required".to_string()));
    }
    if payload.annual_leave_days.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest("annual_leave_days must not be negative".to_string()));
    }
    let staff_number = payload
        .staff_number
        .as_deref()
        .and_then(StaffNumber::parse)
        .map(|s| s.as_str().to_string());

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (staff_number, first_name, last_name, email, hire_date, annual_leave_days)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(staff_number)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.hire_date)
    .bind(payload.annual_leave_days)
    .execute(pool.get_ref())
    .await
    .map_err(duplicate_staff_number)?;

    info!(employee_id = result.last_insert_id(), "Employee created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }

    if let Some(search) = &query.search {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.extend([like.clone(), like.clone(), like]);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let employees = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Field cannot be updated"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, &UPDATABLE_COLUMNS, "id", employee_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(duplicate_staff_number)?;

    if affected == 0 {
        return Err(AppError::not_found("Employee"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee is still referenced")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(
                    "Employee has vacations, salaries or debts; set the status to inactive instead"
                        .to_string(),
                )
            }
            other => other.into(),
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Employee"));
    }

    info!(employee_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;

    Ok(HttpResponse::Ok().json(employee))
}

/// Leave account of an employee for one year
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/leave-account",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        YearQuery
    ),
    responses(
        (status = 200, description = "Leave account summary", body = crate::service::vacation::LeaveAccount),
        (status = 403, description = "Employee has no vacation days configured"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn leave_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    path: web::Path<u64>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;
    could_use_vacation_service(Some(&employee))?;

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let vacations = fetch_vacations(pool.get_ref(), employee_id).await?;
    let account = rules.leave_account(&LeaveBalance::from(&employee), &vacations, year);

    Ok(HttpResponse::Ok().json(account))
}
