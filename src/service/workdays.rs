use crate::config::MonthDay;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rust_decimal::Decimal;

const FIXED_HOLIDAYS: [MonthDay; 5] = [
    MonthDay { month: 1, day: 1 },
    MonthDay { month: 5, day: 1 },
    MonthDay { month: 10, day: 3 },
    MonthDay { month: 12, day: 25 },
    MonthDay { month: 12, day: 26 },
];

/// Christmas Eve and New Year's Eve.
const HALF_DAYS: [MonthDay; 2] = [MonthDay { month: 12, day: 24 }, MonthDay { month: 12, day: 31 }];

/// Offsets from Easter Sunday: Good Friday, Easter Monday, Ascension Day, Whit Monday.
const EASTER_OFFSETS: [i64; 4] = [-2, 1, 39, 50];

/// Public holidays used for counting vacation working days.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    fixed: Vec<MonthDay>,
    half_days: Vec<MonthDay>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self {
            fixed: FIXED_HOLIDAYS.to_vec(),
            half_days: HALF_DAYS.to_vec(),
        }
    }
}

impl HolidayCalendar {
    pub fn with_extra_holidays(extra: &[MonthDay]) -> Self {
        let mut calendar = Self::default();
        calendar.fixed.extend_from_slice(extra);
        calendar
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        let md = MonthDay {
            month: date.month(),
            day: date.day(),
        };
        if self.fixed.contains(&md) {
            return true;
        }
        let easter = easter_sunday(date.year());
        EASTER_OFFSETS
            .iter()
            .any(|offset| easter + chrono::Duration::days(*offset) == date)
    }

    /// Share of a full working day this date contributes: 0, 0.5 or 1.
    pub fn work_fraction(&self, date: NaiveDate) -> Decimal {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || self.is_holiday(date) {
            return Decimal::ZERO;
        }
        let md = MonthDay {
            month: date.month(),
            day: date.day(),
        };
        if self.half_days.contains(&md) {
            Decimal::new(5, 1)
        } else {
            Decimal::ONE
        }
    }

    /// Working days between `from` and `to`, both inclusive. Zero if `from` is after `to`.
    pub fn working_days(&self, from: NaiveDate, to: NaiveDate) -> Decimal {
        let mut total = Decimal::ZERO;
        let mut day = from;
        while day <= to {
            total += self.work_fraction(day);
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }
        total
    }
}

/// Easter Sunday by the anonymous Gregorian computus.
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap_or(NaiveDate::MIN)
}
