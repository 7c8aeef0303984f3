use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Rewrites a 24-hour time (optionally preceded by a date) into the 12-hour
/// `H:MM[:SS] AM|PM` form the SAR export normally uses. Anything that already
/// carries a meridiem, or that does not look like `H:MM`, comes back as-is.
pub fn normalize_time(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.contains("AM") || s.contains("PM") {
        return input.to_string();
    }

    let (prefix, token) = match s.rsplit_once(' ') {
        Some((p, t)) => (Some(p), t),
        None => (None, s),
    };
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() < 2 {
        return input.to_string();
    }
    let Ok(hour) = parts[0].parse::<u32>() else {
        return input.to_string();
    };
    if parts[1].parse::<u32>().is_err() || hour > 23 {
        return input.to_string();
    }

    let (h12, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    let mut time = format!("{}:{}", h12, parts[1]);
    if let Some(sec) = parts.get(2) {
        time.push(':');
        time.push_str(sec);
    }
    match prefix {
        Some(p) => format!("{} {} {}", p, time, meridiem),
        None => format!("{} {}", time, meridiem),
    }
}

/// Calendar date as written in the export. Any time-of-day or UTC offset that
/// follows the date is ignored, so the weekday never shifts with the host zone.
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    for fmt in ["%b %d, %Y", "%B %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return Some(dt.date_naive());
    }

    let head = t
        .split(|c: char| c == ' ' || c == 'T')
        .next()?
        .trim_end_matches(',');
    let formats: &[&str] = if head.contains('/') {
        let two_digit_year = head.rsplit('/').next().map_or(false, |y| y.len() <= 2);
        if two_digit_year {
            &["%m/%d/%y"]
        } else {
            &["%m/%d/%Y", "%Y/%m/%d"]
        }
    } else {
        &["%Y-%m-%d", "%d-%b-%Y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

/// Parses an In/Out Time for ordering checks. Twelve-hour values may carry a
/// date prefix; without one they are placed on a common reference day.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }

    let (rest, meridiem) = if let Some(r) = t.strip_suffix("AM") {
        (r.trim_end(), "AM")
    } else if let Some(r) = t.strip_suffix("PM") {
        (r.trim_end(), "PM")
    } else {
        return None;
    };
    let (date_part, time_part) = match rest.rsplit_once(' ') {
        Some((d, tm)) => (Some(d.trim()), tm),
        None => (None, rest),
    };

    let clock = format!("{} {}", time_part, meridiem);
    let time = NaiveTime::parse_from_str(&clock, "%I:%M:%S%.f %p")
        .or_else(|_| NaiveTime::parse_from_str(&clock, "%I:%M %p"))
        .ok()?;
    let date = match date_part {
        Some(d) => parse_calendar_date(d)?,
        None => NaiveDate::from_ymd_opt(1970, 1, 1)?,
    };
    Some(date.and_time(time))
}
