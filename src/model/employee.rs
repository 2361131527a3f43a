use chrono::NaiveDate;
use derive_more::{Display, From};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payroll staff number, the key used by spreadsheet imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize)]
pub struct StaffNumber(String);

impl StaffNumber {
    /// Trimmed staff number, `None` for blank cells.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "staff_number": "1001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "hire_date": "2024-01-01",
        "annual_leave_days": 30,
        "previous_year_leave": "4.5",
        "previous_year_leave_used": "2",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "1001", nullable = true)]
    pub staff_number: Option<String>,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    /// Yearly vacation allotment; employees without one cannot request leave.
    #[schema(example = 30, nullable = true)]
    pub annual_leave_days: Option<i32>,

    /// Days carried over from the previous year.
    #[schema(value_type = String, example = "4.5")]
    pub previous_year_leave: Decimal,

    /// Carried-over days already consumed.
    #[schema(value_type = String, example = "2")]
    pub previous_year_leave_used: Decimal,

    #[schema(example = "active")]
    pub status: String,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
