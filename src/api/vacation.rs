use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{
        employee::Employee,
        vacation::{Vacation, VacationStatus},
    },
    service::{
        notification::{
            ApplicationEvent, Mail, Mailer, NotificationError, VacationParties, application_mails,
            decision_mails, send_all,
        },
        vacation::{
            LeaveBalance, VacationRequest, VacationRules, could_use_vacation_service, next_status,
        },
    },
    utils::db_utils::{
        VACATION_COLUMNS, fetch_employee, fetch_vacation, fetch_vacations, lock_employee,
        lock_vacation, update_previous_year_leave,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateVacation {
    /// HR and admins may apply on behalf of another employee.
    #[schema(example = 1000, nullable = true)]
    pub employee_id: Option<u64>,
    #[schema(example = 1001)]
    pub manager_id: u64,
    #[schema(example = 1002)]
    pub substitution_id: u64,
    #[schema(example = "2026-07-06", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-07-17", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_special: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateVacation {
    #[schema(example = 1001)]
    pub manager_id: u64,
    #[schema(example = 1002)]
    pub substitution_id: u64,
    #[schema(example = "2026-07-06", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-07-17", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_special: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct VacationFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by status (IN_PROGRESS, APPROVED, REJECTED)
    pub status: Option<VacationStatus>,
    /// Filter by the year the vacation starts in
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Items per page
    pub per_page: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct AvailableQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct VacationListResponse {
    pub data: Vec<Vacation>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// Result of a change to a leave application.
#[derive(Serialize, ToSchema)]
pub struct VacationChanged {
    #[schema(example = "Leave application submitted")]
    pub message: String,
    pub vacation: Vacation,
    /// Set when the change was saved but the notification mails could not be sent.
    #[schema(nullable = true)]
    pub mail_error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AvailableDays {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(value_type = String, example = "12.5")]
    pub available: Decimal,
}

enum FilterValue {
    U64(u64),
    I32(i32),
    Str(&'static str),
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn employee_in_tx(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
) -> Result<Employee, AppError> {
    let employee = lock_employee(&mut **tx, employee_id).await?;
    could_use_vacation_service(employee.as_ref())?;
    employee.ok_or_else(|| AppError::not_found("Employee"))
}

async fn require_colleagues(
    pool: &MySqlPool,
    employee_id: u64,
    manager_id: u64,
    substitution_id: u64,
) -> Result<(), AppError> {
    if manager_id == employee_id || substitution_id == employee_id {
        return Err(AppError::BadRequest(
            "Manager and substitution must be other employees".to_string(),
        ));
    }
    for (id, what) in [(manager_id, "Manager"), (substitution_id, "Substitution")] {
        if fetch_employee(pool, id).await?.is_none() {
            return Err(AppError::not_found(what));
        }
    }
    Ok(())
}

async fn load_parties(
    pool: &MySqlPool,
    vacation: &Vacation,
) -> Result<(Employee, Employee, Employee), AppError> {
    let employee = fetch_employee(pool, vacation.employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;
    let manager = fetch_employee(pool, vacation.manager_id)
        .await?
        .ok_or_else(|| AppError::not_found("Manager"))?;
    let substitution = fetch_employee(pool, vacation.substitution_id)
        .await?
        .ok_or_else(|| AppError::not_found("Substitution"))?;
    Ok((employee, manager, substitution))
}

/// Builds and sends the mails for a change that is already committed. Failures are
/// returned as text for the response, never as an error.
async fn notify<F>(
    pool: &MySqlPool,
    mailer: &dyn Mailer,
    vacation: &Vacation,
    build: F,
) -> Option<String>
where
    F: FnOnce(&VacationParties<'_>) -> Result<Vec<Mail>, NotificationError>,
{
    let (employee, manager, substitution) = match load_parties(pool, vacation).await {
        Ok(parties) => parties,
        Err(e) => {
            warn!(vacation_id = vacation.id, error = %e, "Cannot address vacation mails");
            return Some(e.to_string());
        }
    };
    let parties = VacationParties {
        vacation,
        employee: &employee,
        manager: &manager,
        substitution: &substitution,
    };

    match build(&parties).and_then(|mails| send_all(mailer, &mails)) {
        Ok(()) => None,
        Err(e) => {
            warn!(vacation_id = vacation.id, error = %e, "Vacation mails not sent");
            Some(e.to_string())
        }
    }
}

fn changed(message: &str, vacation: Vacation, mail_error: Option<String>) -> VacationChanged {
    VacationChanged {
        message: message.to_string(),
        vacation,
        mail_error,
    }
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/vacation",
    request_body = CreateVacation,
    responses(
        (status = 201, description = "Leave application submitted", body = VacationChanged),
        (status = 400, description = "Invalid period, overlap or not enough days left"),
        (status = 403, description = "No employee with vacation days linked to the user")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn create_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    mailer: web::Data<dyn Mailer>,
    payload: web::Json<CreateVacation>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match payload.employee_id {
        Some(id) if Some(id) != auth.employee_id => {
            auth.require_hr_or_admin()?;
            id
        }
        _ => auth.require_employee()?,
    };
    require_colleagues(
        pool.get_ref(),
        employee_id,
        payload.manager_id,
        payload.substitution_id,
    )
    .await?;

    let mut tx = pool.begin().await?;
    let employee = employee_in_tx(&mut tx, employee_id).await?;
    let vacations = fetch_vacations(&mut *tx, employee_id).await?;

    let request = VacationRequest {
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: next_status(None, VacationStatus::InProgress)?,
        is_special: payload.is_special,
        previous: None,
    };
    rules.validate_request(&LeaveBalance::from(&employee), &vacations, &request, today())?;

    let id = sqlx::query(
        r#"
        INSERT INTO vacations
            (employee_id, manager_id, substitution_id, start_date, end_date, status, is_special)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.manager_id)
    .bind(payload.substitution_id)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.status.as_ref())
    .bind(request.is_special)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let vacation = fetch_vacation(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("vacation {id} vanished after insert")))?;
    tx.commit().await?;
    info!(vacation_id = id, employee_id, "Leave application submitted");

    let mail_error = notify(pool.get_ref(), mailer.get_ref(), &vacation, |p| {
        Ok(application_mails(p, ApplicationEvent::New))
    })
    .await;

    Ok(HttpResponse::Created().json(changed("Leave application submitted", vacation, mail_error)))
}

/* =========================
Edit a leave application
========================= */
#[utoipa::path(
    put,
    path = "/api/vacation/{vacation_id}",
    params(("vacation_id" = u64, Path, description = "ID of the leave application")),
    request_body = UpdateVacation,
    responses(
        (status = 200, description = "Leave application changed", body = VacationChanged),
        (status = 400, description = "Invalid period, overlap, not enough days or already approved"),
        (status = 403, description = "Not the applicant"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn update_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
    payload: web::Json<UpdateVacation>,
) -> Result<HttpResponse, AppError> {
    let vacation_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let current = lock_vacation(&mut *tx, vacation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave application"))?;
    auth.require_vacation_owner(&current)?;
    require_colleagues(
        pool.get_ref(),
        current.employee_id,
        payload.manager_id,
        payload.substitution_id,
    )
    .await?;

    let employee = employee_in_tx(&mut tx, current.employee_id).await?;
    let vacations = fetch_vacations(&mut *tx, current.employee_id).await?;

    let request = VacationRequest {
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: next_status(Some(current.status), VacationStatus::InProgress)?,
        is_special: payload.is_special,
        previous: Some(&current),
    };
    rules.validate_request(&LeaveBalance::from(&employee), &vacations, &request, today())?;

    sqlx::query(
        r#"
        UPDATE vacations
        SET manager_id = ?, substitution_id = ?, start_date = ?, end_date = ?,
            status = ?, is_special = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.manager_id)
    .bind(payload.substitution_id)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.status.as_ref())
    .bind(request.is_special)
    .bind(vacation_id)
    .execute(&mut *tx)
    .await?;

    let vacation = fetch_vacation(&mut *tx, vacation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave application"))?;
    tx.commit().await?;
    info!(vacation_id, "Leave application changed");

    let mail_error = notify(pool.get_ref(), mailer.get_ref(), &vacation, |p| {
        Ok(application_mails(p, ApplicationEvent::Edited))
    })
    .await;

    Ok(HttpResponse::Ok().json(changed("Leave application changed", vacation, mail_error)))
}

/* =========================
Delete (soft) a leave application
========================= */
#[utoipa::path(
    delete,
    path = "/api/vacation/{vacation_id}",
    params(("vacation_id" = u64, Path, description = "ID of the leave application")),
    responses(
        (status = 200, description = "Leave application deleted", body = VacationChanged),
        (status = 403, description = "Not the applicant"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn delete_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let vacation_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut vacation = lock_vacation(&mut *tx, vacation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave application"))?;
    auth.require_vacation_owner(&vacation)?;

    if vacation.status == VacationStatus::Approved && !vacation.is_special {
        let employee = lock_employee(&mut *tx, vacation.employee_id)
            .await?
            .ok_or_else(|| AppError::not_found("Employee"))?;
        let vacations = fetch_vacations(&mut *tx, vacation.employee_id).await?;
        let balance = LeaveBalance::from(&employee);
        let used = rules.used_from_last_year_on_delete(&balance, &vacation, &vacations, today());
        if used != balance.previous_year_leave_used {
            update_previous_year_leave(&mut *tx, employee.id, balance.previous_year_leave, used)
                .await?;
        }
    }

    sqlx::query("UPDATE vacations SET deleted = TRUE WHERE id = ?")
        .bind(vacation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    vacation.deleted = true;
    info!(vacation_id, "Leave application deleted");

    let mail_error = notify(pool.get_ref(), mailer.get_ref(), &vacation, |p| {
        Ok(application_mails(p, ApplicationEvent::Deleted))
    })
    .await;

    Ok(HttpResponse::Ok().json(changed("Leave application deleted", vacation, mail_error)))
}

async fn decide(
    auth: AuthUser,
    pool: &MySqlPool,
    rules: &VacationRules,
    config: &Config,
    mailer: &dyn Mailer,
    vacation_id: u64,
    target: VacationStatus,
) -> Result<VacationChanged, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_vacation(&mut *tx, vacation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave application"))?;
    auth.require_vacation_decider(&current)?;
    let status = next_status(Some(current.status), target)?;

    let employee = lock_employee(&mut *tx, current.employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))?;
    let vacations = fetch_vacations(&mut *tx, current.employee_id).await?;
    let balance = LeaveBalance::from(&employee);
    let request = VacationRequest {
        start_date: current.start_date,
        end_date: current.end_date,
        status,
        is_special: current.is_special,
        previous: Some(&current),
    };
    rules.validate_request(&balance, &vacations, &request, today())?;

    let approved = status == VacationStatus::Approved;
    if approved && !current.is_special {
        let used = rules.used_from_last_year_on_approve(&balance, &current, today());
        if used != balance.previous_year_leave_used {
            update_previous_year_leave(&mut *tx, employee.id, balance.previous_year_leave, used)
                .await?;
        }
    }

    sqlx::query("UPDATE vacations SET status = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(vacation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(vacation_id, status = %status, decided_by = auth.user_id, "Leave application decided");

    let vacation = Vacation { status, ..current };
    let mail_error = notify(pool, mailer, &vacation, |p| {
        decision_mails(p, approved, config.hr_email.as_deref())
    })
    .await;

    let message = if approved {
        "Leave approved"
    } else {
        "Leave rejected"
    };
    Ok(changed(message, vacation, mail_error))
}

/* =========================
Approve leave (manager, HR, admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/vacation/{vacation_id}/approve",
    params(("vacation_id" = u64, Path, description = "ID of the leave application to approve")),
    responses(
        (status = 200, description = "Leave approved", body = VacationChanged),
        (status = 400, description = "Leave application already decided"),
        (status = 403, description = "Not the manager of the application"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn approve_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    config: web::Data<Config>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let result = decide(
        auth,
        pool.get_ref(),
        rules.get_ref(),
        config.get_ref(),
        mailer.get_ref(),
        path.into_inner(),
        VacationStatus::Approved,
    )
    .await?;
    Ok(HttpResponse::Ok().json(result))
}

/* =========================
Reject leave (manager, HR, admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/vacation/{vacation_id}/reject",
    params(("vacation_id" = u64, Path, description = "ID of the leave application to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = VacationChanged),
        (status = 400, description = "Leave application already decided"),
        (status = 403, description = "Not the manager of the application"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn reject_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    config: web::Data<Config>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let result = decide(
        auth,
        pool.get_ref(),
        rules.get_ref(),
        config.get_ref(),
        mailer.get_ref(),
        path.into_inner(),
        VacationStatus::Rejected,
    )
    .await?;
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/api/vacation/{vacation_id}",
    params(("vacation_id" = u64, Path, description = "ID of the leave application")),
    responses(
        (status = 200, description = "Leave application found", body = Vacation),
        (status = 403, description = "Neither applicant nor manager"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn get_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let vacation_id = path.into_inner();

    let vacation = fetch_vacation(pool.get_ref(), vacation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave application"))?;
    auth.require_vacation_owner(&vacation)
        .or_else(|_| auth.require_vacation_decider(&vacation))?;

    Ok(HttpResponse::Ok().json(vacation))
}

/// Leave applications. HR and admins see all; everyone else sees their own and the ones
/// they have to decide.
#[utoipa::path(
    get,
    path = "/api/vacation",
    params(VacationFilter),
    responses((status = 200, description = "Paginated leave applications", body = VacationListResponse)),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn list_vacations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<VacationFilter>,
) -> Result<HttpResponse, AppError> {
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE deleted = FALSE");
    let mut args: Vec<FilterValue> = Vec::new();

    if !auth.role.is_hr_or_admin() {
        let own = auth.require_employee()?;
        where_sql.push_str(" AND (employee_id = ? OR manager_id = ?)");
        args.push(FilterValue::U64(own));
        args.push(FilterValue::U64(own));
    }

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.into()));
    }

    if let Some(year) = query.year {
        where_sql.push_str(" AND YEAR(start_date) = ?");
        args.push(FilterValue::I32(year));
    }

    let count_sql = format!("SELECT COUNT(*) FROM vacations{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::I32(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {VACATION_COLUMNS} FROM vacations{} ORDER BY start_date DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, Vacation>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::I32(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }
    let vacations = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(VacationListResponse {
        data: vacations,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// Vacation days the caller still has in a year
#[utoipa::path(
    get,
    path = "/api/vacation/available",
    params(AvailableQuery),
    responses(
        (status = 200, description = "Available days", body = AvailableDays),
        (status = 403, description = "No employee with vacation days linked to the user")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn available_days(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rules: web::Data<VacationRules>,
    query: web::Query<AvailableQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    could_use_vacation_service(employee.as_ref())?;
    let employee = employee.ok_or_else(|| AppError::not_found("Employee"))?;

    let today = today();
    let year = query.year.unwrap_or(today.year());
    let vacations = fetch_vacations(pool.get_ref(), employee_id).await?;
    let available = rules.available_days_for_year(
        &LeaveBalance::from(&employee),
        &vacations,
        year,
        true,
        today,
    );

    Ok(HttpResponse::Ok().json(AvailableDays { year, available }))
}
