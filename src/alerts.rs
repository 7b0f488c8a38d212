//! User-facing alerts: blocking error dialogs and the final summary

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Where messages meant for the person at the desk go.
pub trait UserAlerts: Send + Sync {
    fn error(&self, title: &str, message: &str);
    fn info(&self, title: &str, message: &str);
}

/// Prints alerts to the terminal and mirrors them into the log. With a log
/// file set, every alert is also appended there so it survives launches that
/// have no console attached.
#[derive(Debug, Clone, Default)]
pub struct ConsoleAlerts {
    log_file: Option<PathBuf>,
}

impl ConsoleAlerts {
    pub fn with_log_file(path: impl Into<PathBuf>) -> Self {
        Self {
            log_file: Some(path.into()),
        }
    }

    fn persist(&self, level: &str, title: &str, message: &str) {
        let Some(path) = &self.log_file else {
            return;
        };
        let line = format!(
            "{} [{}] {}: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            title,
            message
        );

        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(path))
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), "could not write alert log: {}", e);
        }
    }
}

impl UserAlerts for ConsoleAlerts {
    fn error(&self, title: &str, message: &str) {
        tracing::error!(title, "{}", message);
        eprintln!("{}: {}", title, message);
        self.persist("ERROR", title, message);
    }

    fn info(&self, title: &str, message: &str) {
        tracing::info!(title, "{}", message);
        println!("{}: {}", title, message);
        self.persist("INFO", title, message);
    }
}

impl<T: UserAlerts + ?Sized> UserAlerts for std::sync::Arc<T> {
    fn error(&self, title: &str, message: &str) {
        (**self).error(title, message)
    }

    fn info(&self, title: &str, message: &str) {
        (**self).info(title, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_are_appended_to_log_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("alerts.log");
        let alerts = ConsoleAlerts::with_log_file(&path);

        alerts.error("Printer is busy", "try again later");
        alerts.info("Print Finished", "1 success and 0 fail");

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[ERROR] Printer is busy: try again later"));
        assert!(lines[1].ends_with("[INFO] Print Finished: 1 success and 0 fail"));
    }

    #[test]
    fn console_only_alerts_write_nothing() {
        let alerts = ConsoleAlerts::default();
        alerts.info("Print Finished", "nothing persisted");
        assert!(alerts.log_file.is_none());
    }
}
