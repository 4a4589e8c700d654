use crate::error::{CascadeError, Result};

/// Parses a time string (HH:MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight to time string (HH:MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}:{:02}", hours % 24, mins)
}

/// Start time label for each slot of a day with fixed-length periods.
/// An unparseable start time falls back to 09:00.
pub fn slot_times(start_time: &str, minutes_per_slot: u32, count: usize) -> Vec<String> {
    let start = parse_time_to_minutes(start_time).unwrap_or(9 * 60);
    (0..count)
        .map(|i| minutes_to_time_string(start + i as u32 * minutes_per_slot))
        .collect()
}

/// Parses a slot list such as "3,4" or "2-5" (ranges inclusive)
pub fn parse_slot_list(raw: &str) -> Result<Vec<usize>> {
    let mut slots = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((from, to)) = part.split_once('-') {
            let from = parse_slot(from)?;
            let to = parse_slot(to)?;
            if to < from {
                return Err(CascadeError::invalid(format!("slot range {} runs backwards", part)));
            }
            slots.extend(from..=to);
        } else {
            slots.push(parse_slot(part)?);
        }
    }
    if slots.is_empty() {
        return Err(CascadeError::invalid("slot list is empty"));
    }
    Ok(slots)
}

fn parse_slot(raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| CascadeError::invalid(format!("bad slot number {:?}", raw.trim())))
}
