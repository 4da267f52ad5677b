//! Count-style progress bars for per-row feature computation.

use indicatif::{ProgressBar, ProgressStyle};

/// Count-style progress bar (rows processed out of total), with an optional label.
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// `Some(bar)` when progress is enabled.
pub fn maybe_count_progress(enabled: bool, total: usize, label: &str) -> Option<ProgressBar> {
    enabled.then(|| make_count_progress(total as u64, label))
}
