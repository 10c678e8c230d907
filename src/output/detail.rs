use crate::error::TraceError;
use crate::log_error;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

/// `<prefix>[_<device>]_<suffix>[_<window_end>].dat`.
///
/// Only the base name of `device` is used, so `traces/sda` and `sda` map to
/// the same file.
pub fn detail_path(
    prefix: &str,
    device: Option<&str>,
    suffix: &str,
    window_end: Option<u64>,
) -> PathBuf {
    let mut name = prefix.to_string();
    if let Some(device) = device {
        let base = Path::new(device)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| device.into());
        name.push('_');
        name.push_str(&base);
    }
    name.push('_');
    name.push_str(suffix);
    if let Some(end) = window_end {
        name.push_str(&format!("_{end}"));
    }
    name.push_str(".dat");
    PathBuf::from(name)
}

/// Space separated data file written row by row.
///
/// Plugins cannot fail while consuming events, so a write error is logged once
/// and the file is abandoned.
pub struct DetailWriter {
    path: PathBuf,
    writer: Option<Writer<File>>,
}

impl DetailWriter {
    pub fn create(path: PathBuf) -> Result<Self, TraceError> {
        let file = File::create(&path).map_err(|source| TraceError::Io {
            path: path.clone(),
            source,
        })?;
        let writer = WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_row<I, T>(&mut self, fields: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write_record(fields) {
                log_error!("Writing '{}' failed, file abandoned: {}", self.path.display(), e);
                self.writer = None;
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                log_error!("Flushing '{}' failed, file abandoned: {}", self.path.display(), e);
                self.writer = None;
            }
        }
    }
}

impl Drop for DetailWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Seconds with nanosecond precision, as used in every data file.
pub fn format_secs(ns: u64) -> String {
    format!("{}.{:09}", ns / 1_000_000_000, ns % 1_000_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_path() {
        assert_eq!(
            detail_path("run", Some("sda"), "d2c", Some(1000)),
            PathBuf::from("run_sda_d2c_1000.dat")
        );
        assert_eq!(
            detail_path("run", Some("traces/sdb"), "d2c", Some(1000)),
            PathBuf::from("run_sdb_d2c_1000.dat")
        );
        assert_eq!(
            detail_path("out/run", None, "i2c_oio", None),
            PathBuf::from("out/run_i2c_oio.dat")
        );
    }

    #[test]
    fn test_rows_are_space_separated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.dat");
        {
            let mut w = DetailWriter::create(path.clone()).unwrap();
            w.write_row(["1.000000000", "100", "8"]);
            w.write_row(["2", "1"]);
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1.000000000 100 8\n2 1\n");
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(1_500_000_001), "1.500000001");
        assert_eq!(format_secs(5), "0.000000005");
    }
}
