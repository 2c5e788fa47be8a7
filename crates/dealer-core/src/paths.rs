use crate::config::PathsConfig;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File name constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "dealer.yaml";

pub const INVENTORY_FILE: &str = "inventory.csv";
pub const COMPETITORS_FILE: &str = "competitors.csv";
pub const INQUIRIES_FILE: &str = "customer_inquiries.csv";
pub const SALES_FILE: &str = "sales_history.csv";
pub const SUMMARY_FILE: &str = "summary.json";

pub const ACTION_LOG_FILE: &str = "actions.jsonl";
pub const CYCLE_LOG_FILE: &str = "cycles.jsonl";
pub const OUTBOX_DIR: &str = "outbox";
pub const EMAILS_DIR: &str = "emails";
pub const CONTENT_DIR: &str = "content";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Resolved on-disk layout for one dealership project.
///
/// `data_dir` holds the CSV state store, `log_dir` the action/cycle logs and
/// the outbox. Relative directories in the config are resolved against `root`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Layout {
    pub fn new(root: &Path, paths: &PathsConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            data_dir: resolve(root, &paths.data_dir),
            log_dir: resolve(root, &paths.log_dir),
        }
    }

    pub fn inventory(&self) -> PathBuf {
        self.data_dir.join(INVENTORY_FILE)
    }

    pub fn competitors(&self) -> PathBuf {
        self.data_dir.join(COMPETITORS_FILE)
    }

    pub fn inquiries(&self) -> PathBuf {
        self.data_dir.join(INQUIRIES_FILE)
    }

    pub fn sales(&self) -> PathBuf {
        self.data_dir.join(SALES_FILE)
    }

    pub fn summary(&self) -> PathBuf {
        self.data_dir.join(SUMMARY_FILE)
    }

    pub fn action_log(&self) -> PathBuf {
        self.log_dir.join(ACTION_LOG_FILE)
    }

    pub fn cycle_log(&self) -> PathBuf {
        self.log_dir.join(CYCLE_LOG_FILE)
    }

    pub fn outbox_emails(&self) -> PathBuf {
        self.log_dir.join(OUTBOX_DIR).join(EMAILS_DIR)
    }

    pub fn outbox_content(&self) -> PathBuf {
        self.log_dir.join(OUTBOX_DIR).join(CONTENT_DIR)
    }
}

fn resolve(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_dirs_resolve_against_root() {
        let layout = Layout::new(Path::new("/srv/lot"), &PathsConfig::default());
        assert_eq!(layout.inventory(), PathBuf::from("/srv/lot/data/inventory.csv"));
        assert_eq!(layout.action_log(), PathBuf::from("/srv/lot/logs/actions.jsonl"));
        assert_eq!(
            layout.outbox_emails(),
            PathBuf::from("/srv/lot/logs/outbox/emails")
        );
    }

    #[test]
    fn absolute_dirs_are_kept() {
        let paths = PathsConfig {
            data_dir: PathBuf::from("/var/data"),
            log_dir: PathBuf::from("logs"),
        };
        let layout = Layout::new(Path::new("/srv/lot"), &paths);
        assert_eq!(layout.competitors(), PathBuf::from("/var/data/competitors.csv"));
        assert_eq!(layout.cycle_log(), PathBuf::from("/srv/lot/logs/cycles.jsonl"));
    }
}
