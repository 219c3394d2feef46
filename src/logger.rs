use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn run_start(&self, _mode: &str, _archive: &Path) {}
    fn download_done(&self, _pod: &str, _dir: &str, _bytes: u64, _seconds: f64) {}
    fn upload_done(&self, _pod: &str, _remote: &str, _seconds: f64) {}
    fn extract_done(&self, _pod: &str, _dir: &str, _seconds: f64) {}
    fn cleanup(&self, _path: &Path) {}
    fn error(&self, _context: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn run_start(&self, mode: &str, archive: &Path) {
        self.line(&format!("START mode={} archive={}", mode, archive.display()));
    }
    fn download_done(&self, pod: &str, dir: &str, bytes: u64, seconds: f64) {
        self.line(&format!(
            "DOWNLOAD pod={} dir={} bytes={} seconds={seconds:.3}",
            pod, dir, bytes
        ));
    }
    fn upload_done(&self, pod: &str, remote: &str, seconds: f64) {
        self.line(&format!(
            "UPLOAD pod={} remote={} seconds={seconds:.3}",
            pod, remote
        ));
    }
    fn extract_done(&self, pod: &str, dir: &str, seconds: f64) {
        self.line(&format!(
            "EXTRACT pod={} dir={} seconds={seconds:.3}",
            pod, dir
        ));
    }
    fn cleanup(&self, path: &Path) {
        self.line(&format!("CLEANUP path={}", path.display()));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} msg={}", context, msg));
    }
}
