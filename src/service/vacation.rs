//! Vacation balance arithmetic and leave application rules.
//!
//! Every employee has a yearly allotment plus days carried over from the previous year.
//! Carried-over days expire after a configured day of the year (the carry-over cutoff);
//! vacation taken on or before that day consumes carried-over days first.

use crate::config::{Config, MonthDay};
use crate::model::employee::Employee;
use crate::model::vacation::{Vacation, VacationStatus};
use crate::service::workdays::HolidayCalendar;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq)]
pub enum VacationError {
    #[error("end date is before start date")]
    EndBeforeStart,
    #[error("a vacation must not span two years")]
    SpansTwoYears,
    #[error("a leave application already exists for this period")]
    Overlaps,
    #[error("not enough vacation days left")]
    NotEnoughDaysLeft,
    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: VacationStatus,
        to: VacationStatus,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum VacationAccessError {
    #[error("no employee is linked to this user")]
    NoEmployeeToUser,
    #[error("the employee has no vacation days configured")]
    EmployeeHasNoVacationDays,
    #[error("only the manager of the application, HR or an admin may decide it")]
    NotDecider,
    #[error("not allowed to modify this leave application")]
    NotOwner,
}

/// Vacation-relevant figures of an employee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaveBalance {
    pub annual_leave_days: Decimal,
    pub previous_year_leave: Decimal,
    pub previous_year_leave_used: Decimal,
}

impl From<&Employee> for LeaveBalance {
    fn from(employee: &Employee) -> Self {
        Self {
            annual_leave_days: Decimal::from(employee.annual_leave_days.unwrap_or(0)),
            previous_year_leave: employee.previous_year_leave,
            previous_year_leave_used: employee.previous_year_leave_used,
        }
    }
}

/// Leave account summary of one employee for one year.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveAccount {
    pub year: i32,
    #[schema(value_type = String)]
    pub annual_leave: Decimal,
    #[schema(value_type = String)]
    pub previous_year_leave: Decimal,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    /// Carried-over days not used yet; they expire after `carry_over_end`.
    #[schema(value_type = String)]
    pub previous_year_leave_unused: Decimal,
    #[schema(value_type = String, format = "date")]
    pub carry_over_end: NaiveDate,
    #[schema(value_type = String)]
    pub approved: Decimal,
    #[schema(value_type = String)]
    pub subtotal_after_approved: Decimal,
    #[schema(value_type = String)]
    pub planned: Decimal,
    #[schema(value_type = String)]
    pub available: Decimal,
    #[schema(value_type = String)]
    pub special_planned: Decimal,
    #[schema(value_type = String)]
    pub special_approved: Decimal,
}

/// A new or edited leave application to be checked before saving.
#[derive(Debug, Clone)]
pub struct VacationRequest<'a> {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: VacationStatus,
    pub is_special: bool,
    /// Stored state when editing an existing application.
    pub previous: Option<&'a Vacation>,
}

/// Vacations that count: not deleted, not rejected.
fn is_active(vacation: &Vacation) -> bool {
    !vacation.deleted && vacation.status != VacationStatus::Rejected
}

/// Non-deleted vacations starting in `year`; special leave only if `with_special`.
pub fn active_for_year(
    vacations: &[Vacation],
    year: i32,
    with_special: bool,
) -> impl Iterator<Item = &Vacation> {
    vacations.iter().filter(move |v| {
        !v.deleted && v.start_date.year() == year && (with_special || !v.is_special)
    })
}

/// Status a leave application ends up in after an edit requesting `requested`.
pub fn next_status(
    current: Option<VacationStatus>,
    requested: VacationStatus,
) -> Result<VacationStatus, VacationError> {
    match (current, requested) {
        (None, VacationStatus::InProgress) => Ok(VacationStatus::InProgress),
        (Some(VacationStatus::InProgress), to) => Ok(to),
        // Editing a rejected application resubmits it.
        (Some(VacationStatus::Rejected), VacationStatus::InProgress) => Ok(VacationStatus::InProgress),
        (from, to) => Err(VacationError::InvalidTransition {
            from: from.unwrap_or(VacationStatus::InProgress),
            to,
        }),
    }
}

/// Only employees with an allotment may use the vacation functions.
pub fn could_use_vacation_service(employee: Option<&Employee>) -> Result<(), VacationAccessError> {
    match employee {
        None => Err(VacationAccessError::NoEmployeeToUser),
        Some(e) if e.annual_leave_days.is_none() => {
            Err(VacationAccessError::EmployeeHasNoVacationDays)
        }
        Some(_) => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct VacationRules {
    calendar: HolidayCalendar,
    carry_over_end: MonthDay,
}

impl VacationRules {
    pub fn new(calendar: HolidayCalendar, carry_over_end: MonthDay) -> Self {
        Self {
            calendar,
            carry_over_end,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            HolidayCalendar::with_extra_holidays(&config.extra_holidays),
            config.carry_over_end,
        )
    }

    /// Last day on which carried-over days of `year` may be used.
    pub fn carry_over_end(&self, year: i32) -> NaiveDate {
        self.carry_over_end.in_year(year)
    }

    pub fn working_days_between(&self, from: NaiveDate, to: NaiveDate) -> Decimal {
        self.calendar.working_days(from, to)
    }

    pub fn working_days(&self, vacation: &Vacation) -> Decimal {
        self.working_days_between(vacation.start_date, vacation.end_date)
    }

    pub fn days_for_year_by_status(
        &self,
        vacations: &[Vacation],
        year: i32,
        status: VacationStatus,
    ) -> Decimal {
        active_for_year(vacations, year, false)
            .filter(|v| v.status == status)
            .map(|v| self.working_days(v))
            .sum()
    }

    pub fn approved_days_for_year(&self, vacations: &[Vacation], year: i32) -> Decimal {
        self.days_for_year_by_status(vacations, year, VacationStatus::Approved)
    }

    pub fn planned_days_for_year(&self, vacations: &[Vacation], year: i32) -> Decimal {
        self.days_for_year_by_status(vacations, year, VacationStatus::InProgress)
    }

    pub fn approved_and_planned_days_for_year(&self, vacations: &[Vacation], year: i32) -> Decimal {
        self.approved_days_for_year(vacations, year) + self.planned_days_for_year(vacations, year)
    }

    /// Working days of special leave with the given status.
    pub fn special_days(&self, vacations: &[Vacation], year: i32, status: VacationStatus) -> Decimal {
        active_for_year(vacations, year, true)
            .filter(|v| v.is_special && v.status == status)
            .map(|v| self.working_days(v))
            .sum()
    }

    /// Days still available in `year`.
    ///
    /// With `check_last_year` set and `today` on or before the carry-over cutoff, the whole
    /// carried-over amount counts; otherwise only the part already consumed does.
    pub fn available_days_for_year(
        &self,
        balance: &LeaveBalance,
        vacations: &[Vacation],
        year: i32,
        check_last_year: bool,
        today: NaiveDate,
    ) -> Decimal {
        let (previous, previous_used) = if year > today.year() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (balance.previous_year_leave, balance.previous_year_leave_used)
        };
        let approved = self.approved_days_for_year(vacations, year);
        let planned = self.planned_days_for_year(vacations, year);

        if !check_last_year || today > self.carry_over_end(today.year()) {
            balance.annual_leave_days + previous_used - approved - planned
        } else {
            balance.annual_leave_days + previous - approved - planned
        }
    }

    /// Carried-over days used after approving `vacation`.
    pub fn used_from_last_year_on_approve(
        &self,
        balance: &LeaveBalance,
        vacation: &Vacation,
        today: NaiveDate,
    ) -> Decimal {
        let cutoff = self.carry_over_end(today.year());
        if vacation.start_date.year() > today.year() && vacation.start_date >= cutoff {
            return balance.previous_year_leave_used;
        }
        let needed = if vacation.end_date >= cutoff {
            self.working_days_between(vacation.start_date, cutoff)
        } else {
            self.working_days(vacation)
        };

        let free = balance.previous_year_leave - balance.previous_year_leave_used;
        let remain = (free - needed).max(Decimal::ZERO);
        balance.previous_year_leave - remain
    }

    /// Carried-over days used after deleting `deleted`, recomputed from the approved
    /// vacations that remain.
    pub fn used_from_last_year_on_delete(
        &self,
        balance: &LeaveBalance,
        deleted: &Vacation,
        vacations: &[Vacation],
        today: NaiveDate,
    ) -> Decimal {
        let cutoff = self.carry_over_end(today.year());
        if deleted.start_date > cutoff || deleted.start_date.year() != cutoff.year() {
            return balance.previous_year_leave_used;
        }
        let consumed: Decimal = vacations
            .iter()
            .filter(|v| {
                v.id != deleted.id
                    && !v.deleted
                    && !v.is_special
                    && v.status == VacationStatus::Approved
                    && v.start_date.year() == cutoff.year()
                    && v.start_date <= cutoff
            })
            .map(|v| self.working_days_between(v.start_date, v.end_date.min(cutoff)))
            .sum();
        consumed.min(balance.previous_year_leave).max(Decimal::ZERO)
    }

    pub fn leave_account(
        &self,
        balance: &LeaveBalance,
        vacations: &[Vacation],
        year: i32,
    ) -> LeaveAccount {
        let subtotal = balance.annual_leave_days + balance.previous_year_leave;
        let unused = balance.previous_year_leave - balance.previous_year_leave_used;
        let approved = self.approved_days_for_year(vacations, year);
        let subtotal_after_approved = subtotal - unused - approved;
        let planned = self.planned_days_for_year(vacations, year);

        LeaveAccount {
            year,
            annual_leave: balance.annual_leave_days,
            previous_year_leave: balance.previous_year_leave,
            subtotal,
            previous_year_leave_unused: unused,
            carry_over_end: self.carry_over_end(year),
            approved,
            subtotal_after_approved,
            planned,
            available: subtotal_after_approved - planned,
            special_planned: self.special_days(vacations, year, VacationStatus::InProgress),
            special_approved: self.special_days(vacations, year, VacationStatus::Approved),
        }
    }

    /// Checks a leave application against the employee's other applications and balance.
    pub fn validate_request(
        &self,
        balance: &LeaveBalance,
        vacations: &[Vacation],
        request: &VacationRequest<'_>,
        today: NaiveDate,
    ) -> Result<(), VacationError> {
        let previous_status = request.previous.map(|p| p.status);
        if previous_status == Some(VacationStatus::InProgress)
            && matches!(request.status, VacationStatus::Approved | VacationStatus::Rejected)
        {
            return Ok(());
        }

        let (start, end) = (request.start_date, request.end_date);
        if end < start {
            return Err(VacationError::EndBeforeStart);
        }
        if end.year() > start.year() {
            return Err(VacationError::SpansTwoYears);
        }

        let own_id = request.previous.map(|p| p.id);
        if vacations
            .iter()
            .any(|v| Some(v.id) != own_id && is_active(v) && v.overlaps(start, end))
        {
            return Err(VacationError::Overlaps);
        }

        if request.is_special {
            return Ok(());
        }

        let cutoff = self.carry_over_end(today.year());
        // carried-over days belong to the current year only
        let (previous, previous_used) = if start.year() > today.year() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (balance.previous_year_leave, balance.previous_year_leave_used)
        };
        let used_whole_year = self.approved_and_planned_days_for_year(vacations, start.year());
        let used_without_last_year = used_whole_year - previous_used;

        let mut available = balance.annual_leave_days - used_without_last_year;
        let available_from_last_year = previous - previous_used;

        if let Some(previous) = request.previous {
            if is_active(previous) && !previous.is_special && previous.start_date.year() == start.year() {
                available += self.working_days(previous);
            }
        }

        let needed = self.working_days_between(start, end);
        let needed_before_cutoff = self.working_days_between(start, end.min(cutoff));
        let covered_by_last_year = available_from_last_year
            .max(Decimal::ZERO)
            .min(needed_before_cutoff);

        if available - (needed - covered_by_last_year) < Decimal::ZERO {
            return Err(VacationError::NotEnoughDaysLeft);
        }
        Ok(())
    }

    /// Balance after the year change: whatever is left of `year` becomes the carried-over
    /// amount of the next year.
    pub fn rollover(
        &self,
        balance: &LeaveBalance,
        vacations: &[Vacation],
        year: i32,
        today: NaiveDate,
    ) -> LeaveBalance {
        LeaveBalance {
            annual_leave_days: balance.annual_leave_days,
            previous_year_leave: self.available_days_for_year(balance, vacations, year, false, today),
            previous_year_leave_used: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rules() -> VacationRules {
        VacationRules::new(HolidayCalendar::default(), MonthDay { month: 3, day: 31 })
    }

    fn vacation(id: u64, start: NaiveDate, end: NaiveDate, status: VacationStatus) -> Vacation {
        Vacation {
            id,
            employee_id: 1000,
            manager_id: 1001,
            substitution_id: 1002,
            start_date: start,
            end_date: end,
            status,
            is_special: false,
            deleted: false,
            created_at: None,
        }
    }

    fn balance(annual: Decimal, previous: Decimal, used: Decimal) -> LeaveBalance {
        LeaveBalance {
            annual_leave_days: annual,
            previous_year_leave: previous,
            previous_year_leave_used: used,
        }
    }

    fn summer() -> Vec<Vacation> {
        vec![
            vacation(1, date(2026, 7, 6), date(2026, 7, 10), VacationStatus::Approved),
            vacation(2, date(2026, 8, 3), date(2026, 8, 7), VacationStatus::InProgress),
        ]
    }

    #[test]
    fn sums_by_status_ignore_rejected_deleted_and_special() {
        let mut vacations = summer();
        vacations.push(vacation(3, date(2026, 9, 7), date(2026, 9, 11), VacationStatus::Rejected));
        let mut deleted = vacation(4, date(2026, 10, 5), date(2026, 10, 9), VacationStatus::Approved);
        deleted.deleted = true;
        vacations.push(deleted);
        let mut special = vacation(5, date(2026, 11, 9), date(2026, 11, 10), VacationStatus::Approved);
        special.is_special = true;
        vacations.push(special);

        let rules = rules();
        assert_eq!(rules.approved_days_for_year(&vacations, 2026), dec!(5));
        assert_eq!(rules.planned_days_for_year(&vacations, 2026), dec!(5));
        assert_eq!(rules.approved_and_planned_days_for_year(&vacations, 2026), dec!(10));
        assert_eq!(rules.special_days(&vacations, 2026, VacationStatus::Approved), dec!(2));
        assert_eq!(rules.approved_days_for_year(&vacations, 2025), dec!(0));
    }

    #[test]
    fn available_days_after_cutoff_only_count_used_carry_over() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(2));
        let today = date(2026, 6, 1);
        assert_eq!(rules.available_days_for_year(&b, &summer(), 2026, true, today), dec!(22));
    }

    #[test]
    fn available_days_before_cutoff_count_whole_carry_over() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(2));
        let today = date(2026, 2, 1);
        assert_eq!(rules.available_days_for_year(&b, &summer(), 2026, true, today), dec!(25));
        assert_eq!(rules.available_days_for_year(&b, &summer(), 2026, false, today), dec!(22));
    }

    #[test]
    fn future_year_ignores_carry_over() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(2));
        let today = date(2026, 2, 1);
        assert_eq!(rules.available_days_for_year(&b, &summer(), 2027, true, today), dec!(30));
    }

    #[test]
    fn approval_before_cutoff_consumes_carry_over() {
        let rules = rules();
        let today = date(2026, 2, 1);
        // Mon 2026-03-02 .. Wed 2026-03-04
        let early = vacation(1, date(2026, 3, 2), date(2026, 3, 4), VacationStatus::Approved);
        assert_eq!(
            rules.used_from_last_year_on_approve(&balance(dec!(30), dec!(5), dec!(0)), &early, today),
            dec!(3)
        );
        assert_eq!(
            rules.used_from_last_year_on_approve(&balance(dec!(30), dec!(5), dec!(1)), &early, today),
            dec!(4)
        );
    }

    #[test]
    fn approval_across_cutoff_is_capped_by_carry_over() {
        let rules = rules();
        let today = date(2026, 2, 1);
        // 7 working days up to Tue 2026-03-31
        let across = vacation(1, date(2026, 3, 23), date(2026, 4, 3), VacationStatus::Approved);
        assert_eq!(
            rules.used_from_last_year_on_approve(&balance(dec!(30), dec!(5), dec!(0)), &across, today),
            dec!(5)
        );
    }

    #[test]
    fn approval_after_cutoff_keeps_used_carry_over() {
        let rules = rules();
        let today = date(2026, 2, 1);
        let late = vacation(1, date(2026, 4, 13), date(2026, 4, 17), VacationStatus::Approved);
        let b = balance(dec!(30), dec!(5), dec!(1));
        assert_eq!(rules.used_from_last_year_on_approve(&b, &late, today), dec!(1));
        let next_year = vacation(2, date(2027, 4, 12), date(2027, 4, 16), VacationStatus::Approved);
        assert_eq!(rules.used_from_last_year_on_approve(&b, &next_year, today), dec!(1));
    }

    #[test]
    fn deleting_recomputes_carry_over_from_remaining_vacations() {
        let rules = rules();
        let today = date(2026, 2, 1);
        let a = vacation(1, date(2026, 3, 2), date(2026, 3, 4), VacationStatus::Approved);
        let b = vacation(2, date(2026, 3, 9), date(2026, 3, 10), VacationStatus::Approved);
        let vacations = vec![a.clone(), b.clone()];

        let full = balance(dec!(30), dec!(5), dec!(5));
        assert_eq!(rules.used_from_last_year_on_delete(&full, &a, &vacations, today), dec!(2));

        let capped = balance(dec!(30), dec!(4), dec!(4));
        assert_eq!(rules.used_from_last_year_on_delete(&capped, &b, &vacations, today), dec!(3));
    }

    #[test]
    fn deleting_after_cutoff_leaves_carry_over_untouched() {
        let rules = rules();
        let today = date(2026, 2, 1);
        let late = vacation(1, date(2026, 5, 4), date(2026, 5, 8), VacationStatus::Approved);
        let b = balance(dec!(30), dec!(5), dec!(3));
        assert_eq!(
            rules.used_from_last_year_on_delete(&b, &late, std::slice::from_ref(&late), today),
            dec!(3)
        );
    }

    #[test]
    fn leave_account_adds_up() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(2));
        let account = rules.leave_account(&b, &summer(), 2026);
        assert_eq!(account.subtotal, dec!(35));
        assert_eq!(account.previous_year_leave_unused, dec!(3));
        assert_eq!(account.approved, dec!(5));
        assert_eq!(account.subtotal_after_approved, dec!(27));
        assert_eq!(account.planned, dec!(5));
        assert_eq!(account.available, dec!(22));
        assert_eq!(account.carry_over_end, date(2026, 3, 31));
    }

    fn june_booked() -> Vec<Vacation> {
        // Mon 2026-06-01 .. Fri 2026-06-26: 20 working days
        vec![vacation(1, date(2026, 6, 1), date(2026, 6, 26), VacationStatus::Approved)]
    }

    fn request<'a>(start: NaiveDate, end: NaiveDate) -> VacationRequest<'a> {
        VacationRequest {
            start_date: start,
            end_date: end,
            status: VacationStatus::InProgress,
            is_special: false,
            previous: None,
        }
    }

    #[test]
    fn request_after_cutoff_uses_annual_days_only() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(0));
        let today = date(2026, 1, 15);
        // 10 working days left
        let ok = request(date(2026, 8, 3), date(2026, 8, 14));
        assert_eq!(rules.validate_request(&b, &june_booked(), &ok, today), Ok(()));
        let too_long = request(date(2026, 8, 3), date(2026, 8, 17));
        assert_eq!(
            rules.validate_request(&b, &june_booked(), &too_long, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn request_before_cutoff_may_use_carry_over() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(0));
        let today = date(2026, 1, 15);
        let fifteen = request(date(2026, 2, 2), date(2026, 2, 20));
        assert_eq!(rules.validate_request(&b, &june_booked(), &fifteen, today), Ok(()));
        let sixteen = request(date(2026, 2, 2), date(2026, 2, 23));
        assert_eq!(
            rules.validate_request(&b, &june_booked(), &sixteen, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn request_across_cutoff_uses_carry_over_for_early_part() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(0));
        let today = date(2026, 1, 15);
        // 15 working days, 7 of them up to the cutoff, 5 covered by carry-over
        let exact = request(date(2026, 3, 23), date(2026, 4, 14));
        assert_eq!(rules.validate_request(&b, &june_booked(), &exact, today), Ok(()));
        let one_more = request(date(2026, 3, 23), date(2026, 4, 15));
        assert_eq!(
            rules.validate_request(&b, &june_booked(), &one_more, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn editing_credits_previous_working_days() {
        let rules = rules();
        let b = balance(dec!(30), dec!(0), dec!(0));
        let today = date(2026, 1, 15);
        let mut vacations = june_booked();
        let planned = vacation(2, date(2026, 8, 3), date(2026, 8, 14), VacationStatus::InProgress);
        vacations.push(planned.clone());

        let mut shorter = request(date(2026, 8, 4), date(2026, 8, 14));
        shorter.previous = Some(&planned);
        assert_eq!(rules.validate_request(&b, &vacations, &shorter, today), Ok(()));

        let mut longer = request(date(2026, 8, 3), date(2026, 8, 17));
        longer.previous = Some(&planned);
        assert_eq!(
            rules.validate_request(&b, &vacations, &longer, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn structural_errors_come_first() {
        let rules = rules();
        let b = balance(dec!(30), dec!(0), dec!(0));
        let today = date(2026, 1, 15);
        assert_eq!(
            rules.validate_request(&b, &[], &request(date(2026, 5, 8), date(2026, 5, 4)), today),
            Err(VacationError::EndBeforeStart)
        );
        assert_eq!(
            rules.validate_request(&b, &[], &request(date(2026, 12, 28), date(2027, 1, 4)), today),
            Err(VacationError::SpansTwoYears)
        );
        assert_eq!(
            rules.validate_request(&b, &june_booked(), &request(date(2026, 6, 22), date(2026, 6, 30)), today),
            Err(VacationError::Overlaps)
        );
    }

    #[test]
    fn overlap_ignores_own_and_rejected_applications() {
        let rules = rules();
        let b = balance(dec!(30), dec!(0), dec!(0));
        let today = date(2026, 1, 15);
        let mut vacations = june_booked();
        vacations.push(vacation(2, date(2026, 9, 7), date(2026, 9, 11), VacationStatus::Rejected));
        assert_eq!(
            rules.validate_request(&b, &vacations, &request(date(2026, 9, 7), date(2026, 9, 8)), today),
            Ok(())
        );

        let own = vacations[0].clone();
        let mut edit = request(date(2026, 6, 1), date(2026, 6, 19));
        edit.previous = Some(&own);
        assert_eq!(rules.validate_request(&b, &vacations, &edit, today), Ok(()));
    }

    #[test]
    fn deciding_an_application_skips_checks() {
        let rules = rules();
        let b = balance(dec!(0), dec!(0), dec!(0));
        let today = date(2026, 1, 15);
        let pending = vacation(1, date(2026, 6, 1), date(2026, 6, 26), VacationStatus::InProgress);
        let mut approve = request(pending.start_date, pending.end_date);
        approve.status = VacationStatus::Approved;
        approve.previous = Some(&pending);
        assert_eq!(rules.validate_request(&b, &[pending.clone()], &approve, today), Ok(()));
    }

    #[test]
    fn special_leave_does_not_need_days() {
        let rules = rules();
        let b = balance(dec!(0), dec!(0), dec!(0));
        let mut special = request(date(2026, 6, 1), date(2026, 6, 5));
        special.is_special = true;
        assert_eq!(rules.validate_request(&b, &[], &special, date(2026, 1, 15)), Ok(()));
    }

    #[test]
    fn status_transitions() {
        use VacationStatus::*;
        assert_eq!(next_status(None, InProgress), Ok(InProgress));
        assert_eq!(next_status(Some(InProgress), Approved), Ok(Approved));
        assert_eq!(next_status(Some(InProgress), Rejected), Ok(Rejected));
        assert_eq!(next_status(Some(Rejected), InProgress), Ok(InProgress));
        assert!(next_status(None, Approved).is_err());
        assert!(next_status(Some(Approved), Rejected).is_err());
        assert!(next_status(Some(Rejected), Approved).is_err());
    }

    #[test]
    fn vacation_service_requires_employee_with_allotment() {
        assert_eq!(could_use_vacation_service(None), Err(VacationAccessError::NoEmployeeToUser));

        let mut employee = Employee {
            id: 1000,
            staff_number: Some("1000".to_string()),
            first_name: "Anna".to_string(),
            last_name: "Berg".to_string(),
            email: "anna.berg@company.com".to_string(),
            hire_date: date(2020, 4, 1),
            annual_leave_days: None,
            previous_year_leave: dec!(0),
            previous_year_leave_used: dec!(0),
            status: "active".to_string(),
        };
        assert_eq!(
            could_use_vacation_service(Some(&employee)),
            Err(VacationAccessError::EmployeeHasNoVacationDays)
        );
        employee.annual_leave_days = Some(30);
        assert_eq!(could_use_vacation_service(Some(&employee)), Ok(()));
    }

    #[test]
    fn request_across_cutoff_counts_only_unused_carry_over() {
        let rules = rules();
        let today = date(2026, 1, 15);
        // 2 working days up to the cutoff; 14 working days up to Mon 2026-04-20
        let fourteen = request(date(2026, 3, 30), date(2026, 4, 20));
        let fifteen = request(date(2026, 3, 30), date(2026, 4, 21));

        let partly_used = balance(dec!(30), dec!(5), dec!(2));
        assert_eq!(rules.validate_request(&partly_used, &june_booked(), &fourteen, today), Ok(()));
        assert_eq!(
            rules.validate_request(&partly_used, &june_booked(), &fifteen, today),
            Err(VacationError::NotEnoughDaysLeft)
        );

        let unused = balance(dec!(30), dec!(5), dec!(0));
        assert_eq!(
            rules.validate_request(&unused, &june_booked(), &fourteen, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn request_for_next_year_ignores_carry_over() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(5));
        let today = date(2026, 6, 1);
        // Mon 2027-06-07 .. Fri 2027-07-16: 30 working days
        let booked = vec![vacation(1, date(2027, 6, 7), date(2027, 7, 16), VacationStatus::Approved)];
        assert_eq!(rules.available_days_for_year(&b, &booked, 2027, true, today), dec!(0));

        let more = request(date(2027, 8, 2), date(2027, 8, 6));
        assert_eq!(
            rules.validate_request(&b, &booked, &more, today),
            Err(VacationError::NotEnoughDaysLeft)
        );
    }

    #[test]
    fn rollover_carries_remaining_days() {
        let rules = rules();
        let b = balance(dec!(30), dec!(5), dec!(2));
        let next = rules.rollover(&b, &summer(), 2026, date(2027, 1, 1));
        assert_eq!(next.previous_year_leave, dec!(22));
        assert_eq!(next.previous_year_leave_used, dec!(0));
        assert_eq!(next.annual_leave_days, dec!(30));
    }
}
