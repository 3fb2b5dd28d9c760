//! Date folder discovery.

use thermo_remote::error::Result as RemoteResult;
use thermo_remote::{RemotePath, RemoteSession};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub(crate) const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parse a folder name of the exact form `YYYY-MM-DD` naming a real
/// calendar date.
///
/// # Examples
///
/// ```
/// use thermo_pipeline::parse_date;
///
/// assert!(parse_date("2024-02-29").is_some());
/// assert!(parse_date("2023-02-29").is_none());
/// assert!(parse_date("2024-1-05").is_none());
/// assert!(parse_date("notes.txt").is_none());
/// ```
pub fn parse_date(name: &str) -> Option<Date> {
    let bytes = name.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    Date::parse(name, DATE_FORMAT).ok()
}

/// Valid date folders directly under a site folder, oldest first.
///
/// Names that are not calendar dates are ignored.
pub async fn date_folders(session: &dyn RemoteSession, site: &RemotePath) -> RemoteResult<Vec<Date>> {
    let mut dates: Vec<Date> = session.list(site).await?.iter().filter_map(|name| parse_date(name)).collect();
    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}
