use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::Once;
use std::sync::OnceLock;

// global log file, set once by `init`
static LOGGER: OnceLock<Mutex<Option<File>>> = OnceLock::new();
static INIT: Once = Once::new();
static VERBOSE: AtomicBool = AtomicBool::new(false);

pub struct Logger;

impl Logger {
    /// Opens (and truncates) the log file at `log_path`. Only the first call has any effect.
    pub fn init(log_path: &Path) {
        INIT.call_once(|| {
            // create the parent directory if missing
            if let Some(log_dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !log_dir.exists() {
                    if let Err(e) = fs::create_dir_all(log_dir) {
                        eprintln!("Cannot create log directory '{}': {e}", log_dir.display());
                        LOGGER.get_or_init(|| Mutex::new(None));
                        return;
                    }
                }
            }

            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(log_path);

            match file {
                Ok(file) => {
                    LOGGER.get_or_init(|| Mutex::new(Some(file)));
                }
                Err(e) => {
                    eprintln!("Cannot open log file '{}': {e}", log_path.display());
                    LOGGER.get_or_init(|| Mutex::new(None));
                }
            }
        });
    }

    pub fn set_verbose(verbose: bool) {
        VERBOSE.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose() -> bool {
        VERBOSE.load(Ordering::Relaxed)
    }

    pub fn log(message: &str) {
        println!("{message}");
        Self::write_file("", message);
    }

    pub fn log_error(message: &str) {
        eprintln!("{message}");
        Self::write_file("ERROR: ", message);
    }

    /// Diagnostics that only show up with `--verbose`.
    pub fn log_debug(message: &str) {
        if !Self::is_verbose() {
            return;
        }
        eprintln!("{message}");
        Self::write_file("DEBUG: ", message);
    }

    pub fn flush() -> std::io::Result<()> {
        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    file.flush()?;
                }
            }
        }
        Ok(())
    }

    fn write_file(level: &str, message: &str) {
        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    if let Err(e) = writeln!(file, "[{stamp}] {level}{message}") {
                        eprintln!("Log file write failed: {e}");
                    }
                }
            }
        }
    }
}

// macros
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log(&message);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log_error(&message);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if $crate::utils::Logger::is_verbose() {
            let message = format!($($arg)*);
            $crate::utils::Logger::log_debug(&message);
        }
    }};
}
