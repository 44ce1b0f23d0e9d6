//! Display formatting helpers.
//!
//! Everything here is a pure function over its inputs so the rendering
//! surface can call them without touching engine state. All functions are
//! total over arbitrary strings, including empty ones.

use crate::portal::types::MessageStatus;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

/// Fixed avatar palette. Indexed by [`avatar_color`], never re-ordered: the
/// hash below must stay stable across releases.
const AVATAR_PALETTE: [&str; 8] = [
    "#00a884", "#53bdeb", "#e542a3", "#f0b330", "#fa6533", "#7f66ff", "#25d366", "#8696a0",
];

/// "HH:MM" wall-clock label for a message bubble.
pub fn format_clock_time(ts: &DateTime<Utc>) -> String {
    ts.format("%H:%M").to_string()
}

/// Full timestamp label for the contact list row.
pub fn format_full_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Day bucket label used to group messages: "Today", "Yesterday", the weekday
/// name within the last week, otherwise the full date.
///
/// `today` is passed in rather than read from the clock so the function stays
/// pure.
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    let age = today.signed_duration_since(date).num_days();
    match age {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => weekday_name(date.weekday()).to_string(),
        _ => date.format("%-d %B %Y").to_string(),
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Uppercase initials from up to two name words. Falls back to `"?"` for
/// empty or whitespace-only input.
pub fn initials(name: &str) -> String {
    let mut out = String::new();
    for word in name.split_whitespace().take(2) {
        if let Some(c) = word.chars().next() {
            out.extend(c.to_uppercase());
        }
    }
    if out.is_empty() {
        out.push('?');
    }
    out
}

/// Deterministic name → avatar color: sum of char codes modulo the palette
/// size. The empty string lands on slot 0.
pub fn avatar_color(name: &str) -> &'static str {
    let sum: u32 = name.chars().map(|c| c as u32).fold(0, u32::wrapping_add);
    AVATAR_PALETTE[(sum as usize) % AVATAR_PALETTE.len()]
}

/// Tick glyph for an outbound message status.
///
/// Delivered and read share the double tick; they differ only by color,
/// which is the renderer's business.
pub fn status_glyph(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Pending => "🕓",
        MessageStatus::Sent => "✓",
        MessageStatus::Delivered | MessageStatus::Read => "✓✓",
    }
}

/// Char-boundary-safe preview truncation with a trailing ellipsis.
pub fn preview(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut out: String = body.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_labels_cover_all_buckets() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(); // a Friday
        assert_eq!(day_label(today, today), "Today");
        assert_eq!(day_label(today.pred_opt().unwrap(), today), "Yesterday");
        // Two days back is a Wednesday.
        let wed = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        assert_eq!(day_label(wed, today), "Wednesday");
        // A week or more back gets the full date.
        let old = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(day_label(old, today), "7 March 2025");
    }

    #[test]
    fn initials_take_at_most_two_words() {
        assert_eq!(initials("Ada Lovelace"), "AL");
        assert_eq!(initials("ada lovelace king"), "AL");
        assert_eq!(initials("cher"), "C");
        assert_eq!(initials(""), "?");
        assert_eq!(initials("   "), "?");
    }

    #[test]
    fn avatar_color_is_deterministic_and_total() {
        assert_eq!(avatar_color("Alice"), avatar_color("Alice"));
        assert_eq!(avatar_color(""), AVATAR_PALETTE[0]);
        // Anagrams hash the same; that is acceptable for avatar coloring.
        assert_eq!(avatar_color("ab"), avatar_color("ba"));
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        // Multi-byte chars must not be split.
        assert_eq!(preview("ääää", 2), "ää...");
    }

    #[test]
    fn clock_time_formats_as_hours_and_minutes() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap();
        assert_eq!(format_clock_time(&ts), "09:05");
    }

    #[test]
    fn status_glyphs_match_the_tick_convention() {
        assert_eq!(status_glyph(MessageStatus::Pending), "🕓");
        assert_eq!(status_glyph(MessageStatus::Sent), "✓");
        assert_eq!(status_glyph(MessageStatus::Delivered), "✓✓");
        assert_eq!(status_glyph(MessageStatus::Read), "✓✓");
    }
}
