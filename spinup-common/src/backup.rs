use chrono::{Local, NaiveDate, Utc};

pub const BACKUP_SUFFIX: &str = ".tar.bz2";
const DATE_FORMAT: &str = "%Y.%m.%d";

/// Structured form of an object key `<name>.<YYYY>.<MM>.<DD>.tar.bz2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupKey {
    pub name: String,
    pub date: NaiveDate,
}

impl BackupKey {
    /// Key for a backup of `name` taken today, local time.
    pub fn today(name: &str) -> Self {
        Self {
            name: name.to_string(),
            date: Local::now().date_naive(),
        }
    }

    /// Name used when a server is saved without one.
    pub fn unnamed() -> String {
        format!("backup-{}", Utc::now().timestamp_millis())
    }

    pub fn parse(key: &str) -> Option<Self> {
        let stem = key.strip_suffix(BACKUP_SUFFIX)?;
        // The date is always the last three dot-separated segments.
        let mut parts = stem.rsplitn(4, '.');
        let day = parts.next()?;
        let month = parts.next()?;
        let year = parts.next()?;
        let name = parts.next()?;
        if name.is_empty() || year.len() != 4 || month.len() != 2 || day.len() != 2 {
            return None;
        }
        let date =
            NaiveDate::parse_from_str(&format!("{}.{}.{}", year, month, day), DATE_FORMAT).ok()?;
        Some(Self {
            name: name.to_string(),
            date,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}{}", self.name, self.date.format(DATE_FORMAT), BACKUP_SUFFIX)
    }

    pub fn date_label(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}
