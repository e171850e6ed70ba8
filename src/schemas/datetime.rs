use serde::de::Error as _;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::core::time::to_primitive_utc;

/// Accepts RFC 3339 and the zone-less `YYYY-MM-DDTHH:MM[:SS]` sent by
/// datetime-local inputs, which is read as UTC.
pub(crate) fn parse_flexible(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(to_primitive_utc(value));
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value);
    }
    PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()
}

/// Missing, `null` and empty strings all mean "no bound".
pub(crate) fn deserialize_option_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_flexible(value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
    }
}

/// Patch form: an absent field stays `None` (via `#[serde(default)]`), an
/// explicit `null` or empty string becomes `Some(None)` and clears the bound.
pub(crate) fn deserialize_patch_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<Option<PrimitiveDateTime>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_option_flexible(deserializer).map(Some)
}
