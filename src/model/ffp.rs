use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FfpEvent {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub organizer_id: u64,
    #[schema(example = "Team dinner")]
    pub title: String,
    #[schema(example = "2026-05-12", value_type = String, format = "date")]
    pub event_date: NaiveDate,
    /// Debts are calculated once an event is finished; it is read-only afterwards.
    pub finished: bool,
}

/// What one attendee paid for an event and how much of it they consumed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FfpAccounting {
    pub event_id: u64,
    pub attendee_id: u64,
    #[schema(value_type = String, example = "60.00")]
    pub value: Decimal,
    #[schema(value_type = String, example = "1")]
    pub weighting: Decimal,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FfpDebt {
    pub id: u64,
    pub event_id: u64,
    /// Debtor.
    pub from_id: u64,
    /// Creditor.
    pub to_id: u64,
    #[schema(value_type = String, example = "20.00")]
    pub value: Decimal,
    pub approved_by_from: bool,
    pub approved_by_to: bool,
}
