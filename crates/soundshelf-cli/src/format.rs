//! Display helpers.

/// Whole seconds as `m:ss`. Negative and non-finite inputs read as zero.
pub fn format_duration(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{}:{:02}", total / 60, total % 60)
}

/// Like [`format_duration`], switching to `h:mm:ss` from one hour.
pub fn format_clock(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    if total < 3600 {
        return format_duration(seconds);
    }
    format!("{}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}

/// File size given in megabytes: kilobytes below 1 MB, otherwise one decimal of MB.
pub fn format_file_size(mb: f64) -> String {
    if mb < 1.0 {
        format!("{} KB", (mb * 1024.0).round() as i64)
    } else {
        format!("{mb:.1} MB")
    }
}

/// Text progress bar `width` cells wide for `percent` in `[0, 100]`.
pub fn progress_bar(percent: f64, width: usize) -> String {
    let fraction = if percent.is_finite() {
        (percent / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}
