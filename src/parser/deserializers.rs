use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const SQLITE_DT_FMT: &str = "%Y-%m-%d %H:%M:%S";
const ISO_NAIVE_DT_FMT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

/// Parse un horodatage du store en UTC.
/// Formats acceptés : RFC 3339, "YYYY-MM-DD HH:MM:SS" (datetime('now') SQLite),
/// "YYYY-MM-DDTHH:MM:SS" (fractions de seconde tolérées) et "YYYY-MM-DD" (minuit).
/// Retourne None pour une chaîne vide ou illisible.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, SQLITE_DT_FMT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, &format!("{}%.f", SQLITE_DT_FMT)))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, ISO_NAIVE_DT_FMT))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, &format!("{}%.f", ISO_NAIVE_DT_FMT)))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, DATE_FMT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc())
}

/// Parse une valeur optionnelle ; absente, vide ou illisible → None.
pub fn parse_timestamp_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(parse_timestamp)
}

/// Forme stockée : RFC 3339 à la seconde, suffixe "Z".
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// "" ou "   " → None, sinon la valeur sans espaces de bord.
pub fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|v| !v.is_empty())
}
