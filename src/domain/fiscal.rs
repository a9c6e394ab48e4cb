use chrono::{Datelike, NaiveDate};

/// Calendar fiscal period: year is the date's year, quarter is 1-4.
pub fn fiscal_period(date: NaiveDate) -> (i32, i32) {
    let quarter = (date.month0() / 3) + 1;
    (date.year(), quarter as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_day_of_year_is_q1() {
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()), (2026, 1));
    }

    #[test]
    fn quarter_boundaries() {
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()), (2026, 1));
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()), (2026, 2));
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()), (2026, 2));
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()), (2026, 3));
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()), (2026, 4));
        assert_eq!(fiscal_period(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()), (2026, 4));
    }
}
