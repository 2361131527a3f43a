use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SalaryType {
    Salary,
    Bonus,
    Other,
}

impl TryFrom<String> for SalaryType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Monthly payroll entry of an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeSalary {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    /// 1-based month.
    #[schema(example = 3)]
    pub month: u32,
    #[sqlx(try_from = "String")]
    pub salary_type: SalaryType,
    /// Gross salary including the employer's share.
    #[schema(value_type = String, example = "4250.00")]
    pub gross_with_employer_share: Decimal,
    pub comment: Option<String>,
}
