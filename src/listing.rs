//! Filtering, ordering and the display aggregates derived from one listing.
//!
//! Everything here is pure: it takes the entries returned by the store and
//! never mutates them.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DriveError;
use crate::model::FileEntry;

pub const RECENT_LIMIT: usize = 8;
pub const DEFAULT_STORAGE_LIMIT: u64 = 15 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    #[default]
    Date,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortKey {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortKey::Name),
            "date" => Ok(SortKey::Date),
            "size" => Ok(SortKey::Size),
            other => Err(DriveError::validation(format!(
                "Invalid sort key '{}'. Must be name, date, or size",
                other
            ))),
        }
    }
}

impl FromStr for SortDirection {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DriveError::validation(format!(
                "Invalid sort direction '{}'. Must be asc or desc",
                other
            ))),
        }
    }
}

/// Size used for ordering and totals: unknown counts as zero.
fn size_or_zero(entry: &FileEntry) -> u64 {
    entry.size_bytes().unwrap_or(0)
}

fn compare(a: &FileEntry, b: &FileEntry, key: SortKey) -> Ordering {
    match key {
        // case-insensitive, raw name breaks ties
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        // `None` orders before every timestamp
        SortKey::Date => a.created_time.cmp(&b.created_time),
        SortKey::Size => size_or_zero(a).cmp(&size_or_zero(b)),
    }
}

pub fn matches_query(entry: &FileEntry, query: &str) -> bool {
    query.is_empty() || entry.name.to_lowercase().contains(&query.to_lowercase())
}

pub fn filter_entries<'a>(entries: &'a [FileEntry], query: &str) -> Vec<&'a FileEntry> {
    entries.iter().filter(|e| matches_query(e, query)).collect()
}

/// Stable sort, so ties keep the store's order in both directions.
pub fn sort_entries(entries: &mut [&FileEntry], key: SortKey, direction: SortDirection) {
    entries.sort_by(|a, b| match direction {
        SortDirection::Asc => compare(a, b, key),
        SortDirection::Desc => compare(b, a, key),
    });
}

/// The main view: filtered by `query`, then ordered.
pub fn list_view(
    entries: &[FileEntry],
    query: &str,
    key: SortKey,
    direction: SortDirection,
) -> Vec<FileEntry> {
    let mut view = filter_entries(entries, query);
    sort_entries(&mut view, key, direction);
    view.into_iter().cloned().collect()
}

/// Newest first, capped, independent of the selected sort key.
pub fn recent_view(entries: &[FileEntry], query: &str) -> Vec<FileEntry> {
    let mut view = filter_entries(entries, query);
    sort_entries(&mut view, SortKey::Date, SortDirection::Desc);
    view.into_iter().take(RECENT_LIMIT).cloned().collect()
}

pub fn shared_view(
    entries: &[FileEntry],
    query: &str,
    key: SortKey,
    direction: SortDirection,
) -> Vec<FileEntry> {
    list_view(entries, query, key, direction)
        .into_iter()
        .filter(|e| e.shared)
        .collect()
}

/// Sum of known sizes over the full, unfiltered listing, saturating at
/// `u64::MAX`.
pub fn storage_used(entries: &[FileEntry]) -> u64 {
    entries
        .iter()
        .fold(0u64, |acc, e| acc.saturating_add(size_or_zero(e)))
}

pub fn shared_count(entries: &[FileEntry]) -> usize {
    entries.iter().filter(|e| e.shared).count()
}

pub fn storage_percentage(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    (used as f64 / limit as f64 * 100.0).min(100.0)
}

pub fn format_file_size(size: Option<&str>) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let Some(size) = size.and_then(|s| s.trim().parse::<u64>().ok()) else {
        return "Unknown size".to_string();
    };
    let bytes = size as f64;
    if bytes < KB {
        format!("{} B", size)
    } else if bytes < MB {
        format!("{:.1} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} GB", bytes / GB)
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n != 1 { "s" } else { "" })
}

pub fn format_relative_date(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - created).abs();
    let days = diff.num_days();
    if days == 0 {
        let hours = diff.num_hours();
        if hours == 0 {
            return plural(diff.num_minutes(), "minute");
        }
        return plural(hours, "hour");
    }
    if days < 7 {
        return plural(days, "day");
    }
    if days < 30 {
        return plural(days / 7, "week");
    }
    created.format("%Y-%m-%d").to_string()
}

/// Coarse category used to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Spreadsheet,
    Presentation,
    Document,
    Archive,
    Folder,
    Other,
}

impl FileKind {
    pub fn from_mime(mime_type: &str) -> Self {
        // first match wins
        if mime_type.contains("image") {
            FileKind::Image
        } else if mime_type.contains("pdf") {
            FileKind::Pdf
        } else if mime_type.contains("spreadsheet") {
            FileKind::Spreadsheet
        } else if mime_type.contains("presentation") {
            FileKind::Presentation
        } else if mime_type.contains("document") {
            FileKind::Document
        } else if mime_type.contains("zip") || mime_type.contains("archive") {
            FileKind::Archive
        } else if mime_type.contains("folder") {
            FileKind::Folder
        } else {
            FileKind::Other
        }
    }
}

/// What the presentation layer needs to render one listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub files: Vec<DisplayEntry>,
    pub recent: Vec<DisplayEntry>,
    pub shared: Vec<DisplayEntry>,
    pub storage_used: u64,
    pub storage_limit: u64,
    pub storage_percentage: f64,
    pub shared_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    #[serde(flatten)]
    pub entry: FileEntry,
    pub kind: FileKind,
    pub display_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
}

impl DisplayEntry {
    fn new(entry: FileEntry, now: DateTime<Utc>) -> Self {
        Self {
            kind: FileKind::from_mime(&entry.mime_type),
            display_size: format_file_size(entry.size.as_deref()),
            display_date: entry.created_time.map(|t| format_relative_date(t, now)),
            entry,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub query: String,
    pub sort_key: SortKey,
    pub direction: SortDirection,
}

impl DashboardView {
    pub fn build(
        entries: &[FileEntry],
        options: &ViewOptions,
        storage_limit: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let display = |v: Vec<FileEntry>| -> Vec<DisplayEntry> {
            v.into_iter().map(|e| DisplayEntry::new(e, now)).collect()
        };
        let used = storage_used(entries);
        Self {
            files: display(list_view(
                entries,
                &options.query,
                options.sort_key,
                options.direction,
            )),
            recent: display(recent_view(entries, &options.query)),
            shared: display(shared_view(
                entries,
                &options.query,
                options.sort_key,
                options.direction,
            )),
            storage_used: used,
            storage_limit,
            storage_percentage: storage_percentage(used, storage_limit),
            shared_count: shared_count(entries),
            total_count: entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::google_drive::DriveId;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn entry(id: &str, name: &str, size: Option<&str>, minute: i64, shared: bool) -> FileEntry {
        FileEntry {
            id: DriveId::from(id),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            size: size.map(str::to_string),
            created_time: Some(at(minute)),
            shared,
            web_view_link: None,
        }
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample() -> Vec<FileEntry> {
        vec![
            entry("1", "Report.pdf", Some("300"), 5, true),
            entry("2", "notes.txt", Some("20"), 1, false),
            entry("3", "photo.png", None, 9, true),
            entry("4", "report-draft.docx", Some("garbage"), 3, false),
            entry("5", "archive.zip", Some("1000"), 7, false),
        ]
    }

    #[test]
    fn name_and_size_scenario() {
        let entries = vec![
            entry("b", "b.txt", Some("20"), 1, false),
            entry("a", "a.txt", Some("10"), 2, false),
        ];
        let by_name = list_view(&entries, "", SortKey::Name, SortDirection::Asc);
        assert_eq!(names(&by_name), vec!["a.txt", "b.txt"]);
        let by_size = list_view(&entries, "", SortKey::Size, SortDirection::Desc);
        assert_eq!(names(&by_size), vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn filter_is_case_insensitive_subset() {
        let entries = sample();
        let view = list_view(&entries, "REPORT", SortKey::Name, SortDirection::Asc);
        assert_eq!(names(&view), vec!["report-draft.docx", "Report.pdf"]);
        for e in &view {
            assert!(entries.contains(e));
            assert!(e.name.to_lowercase().contains("report"));
        }
        assert_eq!(list_view(&entries, "", SortKey::Date, SortDirection::Asc).len(), 5);
        assert!(list_view(&entries, "nothing", SortKey::Date, SortDirection::Asc).is_empty());
    }

    #[test]
    fn name_order_ignores_case() {
        let entries = vec![
            entry("1", "Zebra", None, 0, false),
            entry("2", "apple", None, 1, false),
            entry("3", "Apple", None, 2, false),
        ];
        let view = list_view(&entries, "", SortKey::Name, SortDirection::Asc);
        assert_eq!(names(&view), vec!["Apple", "apple", "Zebra"]);
        let view = list_view(&entries, "", SortKey::Name, SortDirection::Desc);
        assert_eq!(names(&view), vec!["Zebra", "apple", "Apple"]);
    }

    #[test]
    fn ascending_reversed_is_descending() {
        let entries = sample();
        for key in [SortKey::Name, SortKey::Date] {
            let mut asc = list_view(&entries, "", key, SortDirection::Asc);
            asc.reverse();
            assert_eq!(asc, list_view(&entries, "", key, SortDirection::Desc), "{:?}", key);
        }
        let distinct_sizes = vec![
            entry("1", "a", Some("3"), 0, false),
            entry("2", "b", Some("1"), 0, false),
            entry("3", "c", Some("2"), 0, false),
        ];
        let mut asc = list_view(&distinct_sizes, "", SortKey::Size, SortDirection::Asc);
        asc.reverse();
        assert_eq!(
            asc,
            list_view(&distinct_sizes, "", SortKey::Size, SortDirection::Desc)
        );
    }

    #[test]
    fn unknown_sizes_sort_as_zero_and_ties_are_stable() {
        let entries = sample();
        let view = list_view(&entries, "", SortKey::Size, SortDirection::Asc);
        // photo.png (absent) and report-draft.docx (garbage) both count as 0
        assert_eq!(
            names(&view),
            vec!["photo.png", "report-draft.docx", "notes.txt", "Report.pdf", "archive.zip"]
        );
        let view = list_view(&entries, "", SortKey::Size, SortDirection::Desc);
        assert_eq!(
            names(&view),
            vec!["archive.zip", "Report.pdf", "notes.txt", "photo.png", "report-draft.docx"]
        );
    }

    #[test]
    fn recent_ignores_sort_key_and_caps() {
        let entries: Vec<FileEntry> = (0..12)
            .map(|i| entry(&i.to_string(), &format!("file{:02}", i), Some("1"), i, false))
            .collect();
        let recent = recent_view(&entries, "");
        assert_eq!(recent.len(), RECENT_LIMIT);
        let by_date = list_view(&entries, "", SortKey::Date, SortDirection::Desc);
        assert_eq!(recent, by_date[..RECENT_LIMIT].to_vec());
        assert_eq!(recent[0].name, "file11");

        let few = sample();
        let recent = recent_view(&few, "");
        assert_eq!(
            names(&recent),
            vec!["photo.png", "archive.zip", "Report.pdf", "report-draft.docx", "notes.txt"]
        );
    }

    #[test]
    fn shared_view_keeps_order_and_filter() {
        let entries = sample();
        let shared = shared_view(&entries, "", SortKey::Name, SortDirection::Asc);
        assert_eq!(names(&shared), vec!["photo.png", "Report.pdf"]);
        let shared = shared_view(&entries, "photo", SortKey::Name, SortDirection::Asc);
        assert_eq!(names(&shared), vec!["photo.png"]);
        assert_eq!(shared_count(&entries), 2);
    }

    #[test]
    fn storage_uses_unfiltered_set() {
        let entries = sample();
        assert_eq!(storage_used(&entries), 300 + 20 + 1000);
        assert_eq!(storage_used(&[]), 0);
        let max = u64::MAX.to_string();
        let huge = vec![
            entry("1", "a", Some(&max), 0, false),
            entry("2", "b", Some("1"), 1, false),
        ];
        assert_eq!(storage_used(&huge), u64::MAX);
        let view = DashboardView::build(
            &entries,
            &ViewOptions {
                query: "notes".into(),
                ..Default::default()
            },
            DEFAULT_STORAGE_LIMIT,
            at(60),
        );
        assert_eq!(view.files.len(), 1);
        assert_eq!(view.storage_used, 1320);
        assert_eq!(view.total_count, 5);
        assert_eq!(view.shared_count, 2);
    }

    #[test]
    fn storage_percentage_is_capped() {
        assert_eq!(storage_percentage(50, 100), 50.0);
        assert_eq!(storage_percentage(500, 100), 100.0);
        assert_eq!(storage_percentage(5, 0), 0.0);
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(None), "Unknown size");
        assert_eq!(format_file_size(Some("x")), "Unknown size");
        assert_eq!(format_file_size(Some("512")), "512 B");
        assert_eq!(format_file_size(Some("1536")), "1.5 KB");
        assert_eq!(format_file_size(Some("10485760")), "10.0 MB");
        assert_eq!(format_file_size(Some("3221225472")), "3.0 GB");
    }

    #[test]
    fn relative_dates() {
        let now = at(0);
        assert_eq!(format_relative_date(now, now), "0 minutes ago");
        assert_eq!(format_relative_date(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_relative_date(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(format_relative_date(now - Duration::days(1), now), "1 day ago");
        assert_eq!(format_relative_date(now - Duration::days(15), now), "2 weeks ago");
        assert_eq!(format_relative_date(now - Duration::days(45), now), "2024-03-17");
    }

    #[test]
    fn file_kinds() {
        assert_eq!(FileKind::from_mime("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("application/pdf"), FileKind::Pdf);
        assert_eq!(
            FileKind::from_mime("application/vnd.google-apps.spreadsheet"),
            FileKind::Spreadsheet
        );
        assert_eq!(FileKind::from_mime("application/zip"), FileKind::Archive);
        assert_eq!(
            FileKind::from_mime("application/vnd.google-apps.folder"),
            FileKind::Folder
        );
        assert_eq!(FileKind::from_mime("text/plain"), FileKind::Other);
    }

    #[test]
    fn sort_options_parse() {
        assert_eq!("size".parse::<SortKey>().unwrap(), SortKey::Size);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("color".parse::<SortKey>().is_err());
        assert_eq!(ViewOptions::default().sort_key, SortKey::Date);
        assert_eq!(ViewOptions::default().direction, SortDirection::Desc);
    }
}
