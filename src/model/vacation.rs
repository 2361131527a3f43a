use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VacationStatus {
    InProgress,
    Approved,
    Rejected,
}

impl TryFrom<String> for VacationStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A leave application. Rows are soft-deleted on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Vacation {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 1001)]
    pub manager_id: u64,
    #[schema(example = 1002)]
    pub substitution_id: u64,
    #[schema(example = "2026-07-06", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-07-17", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: VacationStatus,
    /// Special leave does not consume vacation days.
    pub is_special: bool,
    pub deleted: bool,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Vacation {
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && self.end_date >= from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_stored_spelling() {
        assert_eq!(VacationStatus::InProgress.as_ref(), "IN_PROGRESS");
        assert_eq!(
            VacationStatus::try_from("APPROVED".to_string()),
            Ok(VacationStatus::Approved)
        );
        assert!(VacationStatus::try_from("approved".to_string()).is_err());
        let stored: &'static str = VacationStatus::Rejected.into();
        assert_eq!(stored, "REJECTED");
    }

    #[test]
    fn overlap_includes_boundaries() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 7, d).unwrap();
        let vacation = Vacation {
            id: 1,
            employee_id: 1000,
            manager_id: 1001,
            substitution_id: 1002,
            start_date: day(6),
            end_date: day(10),
            status: VacationStatus::InProgress,
            is_special: false,
            deleted: false,
            created_at: None,
        };
        assert!(vacation.overlaps(day(10), day(14)));
        assert!(vacation.overlaps(day(1), day(6)));
        assert!(!vacation.overlaps(day(11), day(14)));
    }
}
