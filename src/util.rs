/// Render a second count as a zero-padded MM:SS clock. Hours fold into the
/// minute field, so an extended 90-minute phase reads "90:00".
pub fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
