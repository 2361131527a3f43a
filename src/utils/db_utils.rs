use crate::model::employee::Employee;
use crate::model::vacation::Vacation;
use actix_web::error::ErrorBadRequest;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{MySql, MySqlPool, Executor};
use std::str::FromStr;

pub const EMPLOYEE_COLUMNS: &str = "id, staff_number, first_name, last_name, email, hire_date, \
     annual_leave_days, previous_year_leave, previous_year_leave_used, status";

pub const VACATION_COLUMNS: &str = "id, employee_id, manager_id, substitution_id, start_date, \
     end_date, status, is_special, deleted, created_at";

/// ===============================
/// Shared lookups
/// ===============================
pub async fn fetch_employee<'e, E>(executor: E, id: u64) -> Result<Option<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Same as [`fetch_employee`] but locks the row until the transaction ends, which
/// serializes concurrent leave changes of one employee.
pub async fn lock_employee<'e, E>(executor: E, id: u64) -> Result<Option<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_vacation<'e, E>(executor: E, id: u64) -> Result<Option<Vacation>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Vacation>(&format!(
        "SELECT {VACATION_COLUMNS} FROM vacations WHERE id = ? AND deleted = FALSE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn lock_vacation<'e, E>(executor: E, id: u64) -> Result<Option<Vacation>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Vacation>(&format!(
        "SELECT {VACATION_COLUMNS} FROM vacations WHERE id = ? AND deleted = FALSE FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// All non-deleted vacations of an employee, oldest first.
pub async fn fetch_vacations<'e, E>(executor: E, employee_id: u64) -> Result<Vec<Vacation>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Vacation>(&format!(
        "SELECT {VACATION_COLUMNS} FROM vacations WHERE employee_id = ? AND deleted = FALSE ORDER BY start_date"
    ))
    .bind(employee_id)
    .fetch_all(executor)
    .await
}

pub async fn update_previous_year_leave<'e, E>(
    executor: E,
    employee_id: u64,
    previous_year_leave: Decimal,
    previous_year_leave_used: Decimal,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        "UPDATE employees SET previous_year_leave = ?, previous_year_leave_used = ? WHERE id = ?",
    )
    .bind(previous_year_leave)
    .bind(previous_year_leave_used)
    .bind(employee_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    Decimal(Decimal),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` may be updated; anything else is a bad request.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Field '{unknown}' cannot be updated")));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table, set_clause, id_column
    );

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) =
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else {
                    let d = Decimal::from_str(&n.to_string())
                        .map_err(|_| ErrorBadRequest("Unsupported number"))?;
                    values.push(SqlValue::Decimal(d));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
        }
    }

    // WHERE id = ?
    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    pool: &MySqlPool,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::Decimal(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: [&str; 3] = ["first_name", "annual_leave_days", "hire_date"];

    #[test]
    fn builds_update_for_allowed_fields() {
        let payload = json!({ "first_name": "Anna", "hire_date": "2024-02-01" });
        let update = build_update_sql("employees", &payload, &ALLOWED, "id", 7).unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.values.len(), 3);
        assert!(update
            .values
            .contains(&SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())));
        assert_eq!(update.values.last(), Some(&SqlValue::I64(7)));
    }

    #[test]
    fn rejects_fields_outside_whitelist() {
        let payload = json!({ "previous_year_leave_used": 0 });
        assert!(build_update_sql("employees", &payload, &ALLOWED, "id", 7).is_err());
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("employees", &json!({}), &ALLOWED, "id", 7).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), &ALLOWED, "id", 7).is_err());
    }

    #[test]
    fn fractional_numbers_become_decimals() {
        let payload = json!({ "annual_leave_days": 27.5 });
        let update = build_update_sql("employees", &payload, &["annual_leave_days"], "id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Decimal(Decimal::new(275, 1)));
    }
}
