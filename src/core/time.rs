use time::macros::format_description;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// `YYYY-MM-DD HH:MM:SS`, as used in spreadsheet exports.
pub(crate) fn format_export(value: PrimitiveDateTime) -> String {
    let layout = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    value.format(&layout).unwrap_or_else(|_| value.to_string())
}

/// Short human date such as `Mar 04, 2025` for chat replies.
pub(crate) fn format_short_date(value: PrimitiveDateTime) -> String {
    let layout = format_description!("[month repr:short] [day], [year]");
    value.format(&layout).unwrap_or_else(|_| value.date().to_string())
}

/// `YYYY-MM` bucket key for monthly trends.
pub(crate) fn month_key(value: PrimitiveDateTime) -> String {
    format!("{:04}-{:02}", value.year(), u8::from(value.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time, UtcOffset};

    fn sample() -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::March, 4).unwrap();
        let time = Time::from_hms(9, 5, 7).unwrap();
        PrimitiveDateTime::new(date, time)
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(sample()), "2025-03-04T09:05:07Z");
    }

    #[test]
    fn format_offset_preserves_offset() {
        let offset = UtcOffset::from_hms(5, 30, 0).unwrap();
        let shifted = sample().assume_utc().to_offset(offset);
        assert_eq!(format_offset(shifted), "2025-03-04T14:35:07+05:30");
    }

    #[test]
    fn export_and_chat_formats() {
        assert_eq!(format_export(sample()), "2025-03-04 09:05:07");
        assert_eq!(format_short_date(sample()), "Mar 04, 2025");
        assert_eq!(month_key(sample()), "2025-03");
    }

    #[test]
    fn to_primitive_utc_normalizes_offsets() {
        let offset = UtcOffset::from_hms(5, 30, 0).unwrap();
        let shifted = sample().assume_utc().to_offset(offset);
        assert_eq!(to_primitive_utc(shifted), sample());
    }
}
