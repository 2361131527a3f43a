//! Financial Fair Play: splitting the costs of a shared event between its attendees.

use crate::model::ffp::{FfpAccounting, FfpDebt};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq)]
pub enum FfpError {
    #[error("an event needs at least one attendee")]
    NoAttendees,
    #[error("the weightings of an event must add up to more than zero")]
    NoWeighting,
    #[error("negative value or weighting for attendee {0}")]
    NegativeAccounting(u64),
    #[error("attendee {0} is listed twice")]
    DuplicateAttendee(u64),
    #[error("the event is finished and can no longer be changed")]
    EventFinished,
    #[error("only the {0} of a debt may approve it")]
    NotParty(&'static str),
}

/// A debt before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DebtDraft {
    pub from_id: u64,
    pub to_id: u64,
    #[schema(value_type = String)]
    pub value: Decimal,
}

/// Checks the accountings of an event before they are saved.
pub fn validate_accountings(accountings: &[FfpAccounting]) -> Result<(), FfpError> {
    if accountings.is_empty() {
        return Err(FfpError::NoAttendees);
    }
    let mut seen = std::collections::HashSet::new();
    for accounting in accountings {
        if accounting.value < Decimal::ZERO || accounting.weighting < Decimal::ZERO {
            return Err(FfpError::NegativeAccounting(accounting.attendee_id));
        }
        if !seen.insert(accounting.attendee_id) {
            return Err(FfpError::DuplicateAttendee(accounting.attendee_id));
        }
    }
    Ok(())
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Debts that settle an event.
///
/// Each attendee owes `weighting × total / total weighting`; the difference to what they
/// paid is settled by debtors paying creditors, largest balances first.
pub fn calculate_debt(accountings: &[FfpAccounting]) -> Result<Vec<DebtDraft>, FfpError> {
    validate_accountings(accountings)?;
    let total_value: Decimal = accountings.iter().map(|a| a.value).sum();
    let total_weighting: Decimal = accountings.iter().map(|a| a.weighting).sum();
    if total_weighting <= Decimal::ZERO {
        return Err(FfpError::NoWeighting);
    }

    // BTreeMap keeps the settlement order stable for equal balances.
    let balances: BTreeMap<u64, Decimal> = accountings
        .iter()
        .map(|a| {
            let share = total_value * a.weighting / total_weighting;
            (a.attendee_id, cents(a.value - share))
        })
        .collect();

    let mut debtors: Vec<(u64, Decimal)> = balances
        .iter()
        .filter(|(_, b)| **b < Decimal::ZERO)
        .map(|(id, b)| (*id, -*b))
        .collect();
    let mut creditors: Vec<(u64, Decimal)> = balances
        .iter()
        .filter(|(_, b)| **b > Decimal::ZERO)
        .map(|(id, b)| (*id, *b))
        .collect();
    debtors.sort_by(|a, b| b.1.cmp(&a.1));
    creditors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut debts = Vec::new();
    let (mut d, mut c) = (0, 0);
    while d < debtors.len() && c < creditors.len() {
        let amount = debtors[d].1.min(creditors[c].1);
        if amount > Decimal::ZERO {
            debts.push(DebtDraft {
                from_id: debtors[d].0,
                to_id: creditors[c].0,
                value: amount,
            });
        }
        debtors[d].1 -= amount;
        creditors[c].1 -= amount;
        if debtors[d].1.is_zero() {
            d += 1;
        }
        if creditors[c].1.is_zero() {
            c += 1;
        }
    }
    Ok(debts)
}

/// Debts the employee owes and has not yet marked as paid.
pub fn open_from_debts(employee_id: u64, debts: &[FfpDebt]) -> usize {
    debts
        .iter()
        .filter(|d| d.from_id == employee_id && !d.approved_by_from)
        .count()
}

/// Records the approval of `employee_id` on a debt: the debtor confirms payment, the
/// creditor confirms receipt.
pub fn approve(debt: &mut FfpDebt, employee_id: u64) -> Result<(), FfpError> {
    if debt.from_id == employee_id {
        debt.approved_by_from = true;
        Ok(())
    } else if debt.to_id == employee_id {
        debt.approved_by_to = true;
        Ok(())
    } else {
        Err(FfpError::NotParty("debtor or creditor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn accounting(attendee_id: u64, value: Decimal, weighting: Decimal) -> FfpAccounting {
        FfpAccounting {
            event_id: 1,
            attendee_id,
            value,
            weighting,
            comment: None,
        }
    }

    fn debt(id: u64, from_id: u64, to_id: u64) -> FfpDebt {
        FfpDebt {
            id,
            event_id: 1,
            from_id,
            to_id,
            value: dec!(10),
            approved_by_from: false,
            approved_by_to: false,
        }
    }

    #[test]
    fn one_payer_is_reimbursed_by_everyone_else() {
        let debts = calculate_debt(&[
            accounting(1, dec!(60), dec!(1)),
            accounting(2, dec!(0), dec!(1)),
            accounting(3, dec!(0), dec!(1)),
        ])
        .unwrap();
        assert_eq!(
            debts,
            vec![
                DebtDraft { from_id: 2, to_id: 1, value: dec!(20) },
                DebtDraft { from_id: 3, to_id: 1, value: dec!(20) },
            ]
        );
    }

    #[test]
    fn weighting_shifts_the_share() {
        // Attendee 2 counts double: shares are 30 / 60 / 30 of 120.
        let debts = calculate_debt(&[
            accounting(1, dec!(120), dec!(1)),
            accounting(2, dec!(0), dec!(2)),
            accounting(3, dec!(0), dec!(1)),
        ])
        .unwrap();
        assert_eq!(debts[0], DebtDraft { from_id: 2, to_id: 1, value: dec!(60) });
        assert_eq!(debts[1], DebtDraft { from_id: 3, to_id: 1, value: dec!(30) });
    }

    #[test]
    fn several_payers_are_settled_pairwise() {
        let debts = calculate_debt(&[
            accounting(1, dec!(50), dec!(1)),
            accounting(2, dec!(40), dec!(1)),
            accounting(3, dec!(0), dec!(1)),
        ])
        .unwrap();
        // Everyone owes 30: attendee 3 pays 20 to 1 and 10 to 2.
        let total: Decimal = debts.iter().map(|d| d.value).sum();
        assert_eq!(total, dec!(30));
        assert!(debts.iter().all(|d| d.from_id == 3));
        assert!(debts.contains(&DebtDraft { from_id: 3, to_id: 1, value: dec!(20) }));
        assert!(debts.contains(&DebtDraft { from_id: 3, to_id: 2, value: dec!(10) }));
    }

    #[test]
    fn even_split_produces_no_debts() {
        let debts = calculate_debt(&[
            accounting(1, dec!(25), dec!(1)),
            accounting(2, dec!(25), dec!(1)),
        ])
        .unwrap();
        assert!(debts.is_empty());
    }

    #[test]
    fn invalid_accountings_are_rejected() {
        assert_eq!(calculate_debt(&[]), Err(FfpError::NoAttendees));
        assert_eq!(
            calculate_debt(&[accounting(1, dec!(10), dec!(0))]),
            Err(FfpError::NoWeighting)
        );
        assert_eq!(
            calculate_debt(&[accounting(1, dec!(-1), dec!(1))]),
            Err(FfpError::NegativeAccounting(1))
        );
        assert_eq!(
            calculate_debt(&[accounting(1, dec!(1), dec!(1)), accounting(1, dec!(2), dec!(1))]),
            Err(FfpError::DuplicateAttendee(1))
        );
    }

    #[test]
    fn open_debts_count_only_unapproved_debts_owed() {
        let mut paid = debt(2, 5, 6);
        paid.approved_by_from = true;
        let debts = vec![debt(1, 5, 6), paid, debt(3, 6, 5)];
        assert_eq!(open_from_debts(5, &debts), 1);
        assert_eq!(open_from_debts(6, &debts), 1);
    }

    #[test]
    fn only_parties_may_approve() {
        let mut d = debt(1, 5, 6);
        approve(&mut d, 5).unwrap();
        assert!(d.approved_by_from && !d.approved_by_to);
        approve(&mut d, 6).unwrap();
        assert!(d.approved_by_to);
        assert!(approve(&mut d, 7).is_err());
    }
}
