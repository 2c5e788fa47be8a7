use crate::error::Result;
use crate::io::atomic_write;
use crate::paths::Layout;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

/// Stand-in for outbound delivery: live-mode emails and posts are written as
/// text files instead of being sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbox {
    emails_dir: PathBuf,
    content_dir: PathBuf,
}

impl Outbox {
    pub fn new(layout: &Layout) -> Self {
        Self {
            emails_dir: layout.outbox_emails(),
            content_dir: layout.outbox_content(),
        }
    }

    pub fn emails_dir(&self) -> &PathBuf {
        &self.emails_dir
    }

    pub fn content_dir(&self) -> &PathBuf {
        &self.content_dir
    }

    pub fn write_email(
        &self,
        action_id: Uuid,
        to: &str,
        subject: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let path = self.emails_dir.join(file_name("email", action_id, at));
        let text = format!(
            "To: {to}\nSubject: {subject}\nTimestamp: {}\n\n{body}\n",
            at.to_rfc3339()
        );
        atomic_write(&path, text.as_bytes())?;
        Ok(path)
    }

    pub fn write_post(
        &self,
        action_id: Uuid,
        platform: &str,
        vin: Option<&str>,
        content: &str,
        hashtags: &[String],
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let prefix = sanitize(platform);
        let path = self.content_dir.join(file_name(&prefix, action_id, at));
        let mut text = format!(
            "Platform: {platform}\nVehicle VIN: {}\nTimestamp: {}\n\n{content}\n",
            vin.unwrap_or("-"),
            at.to_rfc3339()
        );
        if !hashtags.is_empty() {
            text.push('\n');
            text.push_str(&hashtags.join(" "));
            text.push('\n');
        }
        atomic_write(&path, text.as_bytes())?;
        Ok(path)
    }
}

fn file_name(prefix: &str, id: Uuid, at: DateTime<Utc>) -> String {
    let short = id.simple().to_string();
    format!("{prefix}_{}_{}.txt", at.format("%Y%m%d_%H%M%S"), &short[..8])
}

fn sanitize(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "post".to_string()
    } else {
        cleaned
    }
}
