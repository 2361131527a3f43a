//! Year-end carry-over of remaining vacation days.

use crate::model::employee::Employee;
use crate::service::vacation::{LeaveBalance, VacationRules};
use crate::utils::db_utils::{
    EMPLOYEE_COLUMNS, fetch_vacations, update_previous_year_leave,
};
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{error, info};

const CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// What the hourly job has to do, given the last year already carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverStep {
    /// Nothing recorded yet: mark last year as done without touching any balance.
    RecordBaseline(i32),
    CarryOver(i32),
    Idle,
}

pub fn next_step(today: NaiveDate, last_rolled_over: Option<i32>) -> RolloverStep {
    let year = today.year() - 1;
    match last_rolled_over {
        None => RolloverStep::RecordBaseline(year),
        Some(done) if done < year => RolloverStep::CarryOver(year),
        Some(_) => RolloverStep::Idle,
    }
}

/// Carries over the remaining days of `year` for every active employee with an allotment.
/// Runs in one transaction together with the marker row, so a year is never rolled over
/// twice.
pub async fn run_rollover(
    pool: &MySqlPool,
    rules: &VacationRules,
    year: i32,
    today: NaiveDate,
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query("INSERT IGNORE INTO vacation_rollovers (year) VALUES (?)")
        .bind(year)
        .execute(&mut *tx)
        .await?;
    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(0);
    }

    let employees = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees \
         WHERE status = 'active' AND annual_leave_days IS NOT NULL"
    ))
    .fetch_all(&mut *tx)
    .await?;

    for employee in &employees {
        let vacations = fetch_vacations(&mut *tx, employee.id).await?;
        let next = rules.rollover(&LeaveBalance::from(employee), &vacations, year, today);
        update_previous_year_leave(
            &mut *tx,
            employee.id,
            next.previous_year_leave,
            next.previous_year_leave_used,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(employees.len())
}

async fn last_rolled_over(pool: &MySqlPool) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(year) FROM vacation_rollovers")
        .fetch_one(pool)
        .await
}

async fn record_baseline(pool: &MySqlPool, year: i32) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT IGNORE INTO vacation_rollovers (year) VALUES (?)")
        .bind(year)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hourly check that performs the rollover once the year has changed.
pub async fn rollover_job(pool: MySqlPool, rules: VacationRules) {
    let mut interval = actix_web::rt::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        info!("Hourly vacation job started");

        let today = Utc::now().date_naive();
        let last = match last_rolled_over(&pool).await {
            Ok(last) => last,
            Err(e) => {
                error!(error = %e, "Failed to read vacation rollover state");
                continue;
            }
        };

        match next_step(today, last) {
            RolloverStep::RecordBaseline(year) => match record_baseline(&pool, year).await {
                Ok(()) => info!(year, "Vacation rollover baseline recorded"),
                Err(e) => error!(error = %e, "Failed to record vacation rollover baseline"),
            },
            RolloverStep::CarryOver(year) => match run_rollover(&pool, &rules, year, today).await {
                Ok(count) => info!(year, employees = count, "Vacation days carried over"),
                Err(e) => error!(error = %e, year, "Vacation rollover failed"),
            },
            RolloverStep::Idle => {}
        }
        info!("Hourly vacation job finished");
    }
}
