//! Đọc mốc thời gian FHIR/CCDA ở nhiều độ chính xác khác nhau.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Chuyển chuỗi thời gian thành `DateTime<Utc>` để so sánh.
///
/// Hỗ trợ RFC 3339, ngày giờ không múi giờ (coi là UTC), ngày đầy đủ,
/// tháng (`YYYY-MM`), năm (`YYYY`) và dạng nén CCDA (`YYYYMMDD`, `YYYYMMDDHHMMSS`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y%m%d%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| compact_date(value))
        .or_else(|| partial_date(value))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        NaiveDate::parse_from_str(value, "%Y%m%d").ok()
    } else {
        None
    }
}

fn partial_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.splitn(2, '-');
    let year = parts.next()?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_precisions() {
        let full = parse_timestamp("2024-05-06T07:08:09+02:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2024-05-06T05:08:09+00:00");

        let naive = parse_timestamp("2024-05-06T07:08:09").unwrap();
        assert_eq!(naive.to_rfc3339(), "2024-05-06T07:08:09+00:00");

        let day = parse_timestamp("2024-05-06").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-05-06T00:00:00+00:00");

        let month = parse_timestamp("2024-05").unwrap();
        assert_eq!(month.to_rfc3339(), "2024-05-01T00:00:00+00:00");

        let year = parse_timestamp("2024").unwrap();
        assert_eq!(year.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        let compact = parse_timestamp("20240506").unwrap();
        assert_eq!(compact, day);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13").is_none());
    }
}
