use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::ffp::{FfpAccounting, FfpDebt, FfpEvent},
    service::ffp::{FfpError, approve, calculate_debt, open_from_debts, validate_accountings},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const EVENT_COLUMNS: &str = "id, organizer_id, title, event_date, finished";
const ACCOUNTING_COLUMNS: &str = "event_id, attendee_id, value, weighting, comment";
const DEBT_COLUMNS: &str = "id, event_id, from_id, to_id, value, approved_by_from, approved_by_to";

#[derive(Deserialize, ToSchema)]
pub struct AccountingInput {
    #[schema(example = 1002)]
    pub attendee_id: u64,
    /// Amount the attendee paid.
    #[schema(value_type = String, example = "60.00")]
    pub value: Decimal,
    /// Share of the costs the attendee carries, relative to the others.
    #[schema(value_type = String, example = "1")]
    pub weighting: Decimal,
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateEvent {
    #[schema(example = "Team dinner")]
    pub title: String,
    #[schema(example = "2026-05-12", format = "date", value_type = String)]
    pub event_date: NaiveDate,
    pub accountings: Vec<AccountingInput>,
}

#[derive(Deserialize, IntoParams)]
pub struct EventFilter {
    /// Only finished or only open events
    pub finished: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct EventDetails {
    pub event: FfpEvent,
    pub accountings: Vec<FfpAccounting>,
    pub debts: Vec<FfpDebt>,
}

#[derive(Serialize, ToSchema)]
pub struct DebtList {
    pub debts: Vec<FfpDebt>,
    /// Debts the caller owes and has not marked as paid yet.
    #[schema(example = 2)]
    pub open_from: usize,
}

async fn event_details<'c>(
    tx: &mut Transaction<'c, MySql>,
    event: FfpEvent,
) -> Result<EventDetails, sqlx::Error> {
    let accountings = sqlx::query_as::<_, FfpAccounting>(&format!(
        "SELECT {ACCOUNTING_COLUMNS} FROM ffp_accountings WHERE event_id = ? ORDER BY attendee_id"
    ))
    .bind(event.id)
    .fetch_all(&mut **tx)
    .await?;
    let debts = sqlx::query_as::<_, FfpDebt>(&format!(
        "SELECT {DEBT_COLUMNS} FROM ffp_debts WHERE event_id = ? ORDER BY id"
    ))
    .bind(event.id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(EventDetails {
        event,
        accountings,
        debts,
    })
}

fn require_participant(auth: &AuthUser, details: &EventDetails) -> Result<(), AppError> {
    let me = auth.employee_id;
    let involved = me == Some(details.event.organizer_id)
        || details.accountings.iter().any(|a| Some(a.attendee_id) == me);
    if involved || auth.role.is_hr_or_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not an attendee of this event".to_string()))
    }
}

/// Create an event with its accountings
#[utoipa::path(
    post,
    path = "/api/ffp/event",
    request_body = CreateEvent,
    responses(
        (status = 201, description = "Event created", body = EventDetails),
        (status = 400, description = "Invalid accountings or unknown attendee")
    ),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEvent>,
) -> Result<HttpResponse, AppError> {
    let organizer_id = auth.require_employee()?;
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".to_string()));
    }

    let accountings: Vec<FfpAccounting> = payload
        .accountings
        .iter()
        .map(|a| FfpAccounting {
            event_id: 0,
            attendee_id: a.attendee_id,
            value: a.value,
            weighting: a.weighting,
            comment: a.comment.clone(),
        })
        .collect();
    validate_accountings(&accountings)?;

    let mut tx = pool.begin().await?;
    let event_id = sqlx::query("INSERT INTO ffp_events (organizer_id, title, event_date) VALUES (?, ?, ?)")
        .bind(organizer_id)
        .bind(payload.title.trim())
        .bind(payload.event_date)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

    for accounting in &accountings {
        sqlx::query(
            "INSERT INTO ffp_accountings (event_id, attendee_id, value, weighting, comment) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(accounting.attendee_id)
        .bind(accounting.value)
        .bind(accounting.weighting)
        .bind(&accounting.comment)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(format!("Unknown attendee {}", accounting.attendee_id))
            }
            other => other.into(),
        })?;
    }

    let event = FfpEvent {
        id: event_id,
        organizer_id,
        title: payload.title.trim().to_string(),
        event_date: payload.event_date,
        finished: false,
    };
    let details = event_details(&mut tx, event).await?;
    tx.commit().await?;
    info!(event_id, attendees = accountings.len(), "FFP event created");

    Ok(HttpResponse::Created().json(details))
}

/// Events the caller organized or attended (all events for HR and admins)
#[utoipa::path(
    get,
    path = "/api/ffp/event",
    params(EventFilter),
    responses((status = 200, description = "Events, newest first", body = [FfpEvent])),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EventFilter>,
) -> Result<HttpResponse, AppError> {
    let mut sql = format!("SELECT {EVENT_COLUMNS} FROM ffp_events e WHERE 1=1");
    let own = if auth.role.is_hr_or_admin() {
        None
    } else {
        Some(auth.require_employee()?)
    };

    if own.is_some() {
        sql.push_str(
            " AND (e.organizer_id = ? OR EXISTS \
             (SELECT 1 FROM ffp_accountings a WHERE a.event_id = e.id AND a.attendee_id = ?))",
        );
    }
    if query.finished.is_some() {
        sql.push_str(" AND e.finished = ?");
    }
    sql.push_str(" ORDER BY e.event_date DESC, e.id DESC");

    let mut q = sqlx::query_as::<_, FfpEvent>(&sql);
    if let Some(id) = own {
        q = q.bind(id).bind(id);
    }
    if let Some(finished) = query.finished {
        q = q.bind(finished);
    }
    let events = q.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(events))
}

#[utoipa::path(
    get,
    path = "/api/ffp/event/{event_id}",
    params(("event_id" = u64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event with accountings and debts", body = EventDetails),
        (status = 403, description = "Not an attendee"),
        (status = 404, description = "Event not found")
    ),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let event_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let event = sqlx::query_as::<_, FfpEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM ffp_events WHERE id = ?"
    ))
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Event"))?;
    let details = event_details(&mut tx, event).await?;
    tx.commit().await?;

    require_participant(&auth, &details)?;
    Ok(HttpResponse::Ok().json(details))
}

/// Finish an event: calculates and stores its debts
#[utoipa::path(
    post,
    path = "/api/ffp/event/{event_id}/finish",
    params(("event_id" = u64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event finished, debts created", body = EventDetails),
        (status = 400, description = "Already finished or no weighting"),
        (status = 403, description = "Only the organizer may finish the event"),
        (status = 404, description = "Event not found")
    ),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn finish_event(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let event_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let event = sqlx::query_as::<_, FfpEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM ffp_events WHERE id = ? FOR UPDATE"
    ))
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Event"))?;

    if auth.employee_id != Some(event.organizer_id) && !auth.role.is_hr_or_admin() {
        return Err(AppError::Forbidden(
            "Only the organizer may finish the event".to_string(),
        ));
    }
    if event.finished {
        return Err(FfpError::EventFinished.into());
    }

    let mut details = event_details(&mut tx, event).await?;
    let debts = calculate_debt(&details.accountings)?;

    for debt in &debts {
        sqlx::query("INSERT INTO ffp_debts (event_id, from_id, to_id, value) VALUES (?, ?, ?, ?)")
            .bind(event_id)
            .bind(debt.from_id)
            .bind(debt.to_id)
            .bind(debt.value)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE ffp_events SET finished = TRUE WHERE id = ?")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

    details.event.finished = true;
    let details = event_details(&mut tx, details.event).await?;
    tx.commit().await?;
    info!(event_id, debts = debts.len(), "FFP event finished");

    Ok(HttpResponse::Ok().json(details))
}

/// Debts the caller owes or is owed
#[utoipa::path(
    get,
    path = "/api/ffp/debt",
    responses((status = 200, description = "Debts of the caller", body = DebtList)),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn debt_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;

    let debts = sqlx::query_as::<_, FfpDebt>(&format!(
        "SELECT {DEBT_COLUMNS} FROM ffp_debts WHERE from_id = ? OR to_id = ? ORDER BY id DESC"
    ))
    .bind(employee_id)
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await?;

    let open_from = open_from_debts(employee_id, &debts);
    Ok(HttpResponse::Ok().json(DebtList { debts, open_from }))
}

/// Mark a debt as paid (debtor) or as received (creditor)
#[utoipa::path(
    put,
    path = "/api/ffp/debt/{debt_id}/approve",
    params(("debt_id" = u64, Path, description = "Debt ID")),
    responses(
        (status = 200, description = "Debt approved", body = FfpDebt),
        (status = 400, description = "Caller is neither debtor nor creditor"),
        (status = 404, description = "Debt not found")
    ),
    tag = "FFP",
    security(("bearer_auth" = []))
)]
pub async fn approve_debt(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let debt_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut debt = sqlx::query_as::<_, FfpDebt>(&format!(
        "SELECT {DEBT_COLUMNS} FROM ffp_debts WHERE id = ? FOR UPDATE"
    ))
    .bind(debt_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Debt"))?;

    approve(&mut debt, employee_id)?;

    sqlx::query("UPDATE ffp_debts SET approved_by_from = ?, approved_by_to = ? WHERE id = ?")
        .bind(debt.approved_by_from)
        .bind(debt.approved_by_to)
        .bind(debt_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(debt_id, employee_id, "FFP debt approved");

    Ok(HttpResponse::Ok().json(debt))
}
