use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::OutputWrite {
        source,
        path: path.to_path_buf(),
    }
}

// Replaces every run of `placeholder` with `value`, zero-padded to the run length.
fn fill_runs(pattern: &str, placeholder: char, value: usize) -> (String, bool) {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut found = false;
    while let Some(c) = chars.next() {
        if c != placeholder {
            out.push(c);
            continue;
        }
        let mut width = 1;
        while chars.peek() == Some(&placeholder) {
            chars.next();
            width += 1;
        }
        out.push_str(&format!("{:0width$}", value, width = width));
        found = true;
    }
    (out, found)
}

/// Output file of `partition` for an output pattern.
///
/// A run of `@` becomes the partition number and a run of `#` the file number within the
/// partition, both zero-padded to the run length. Without `@` the partition number is appended
/// as `-00000`.
pub fn shard_path(pattern: &str, partition: usize, file_number: usize) -> PathBuf {
    let (path, has_partition) = fill_runs(pattern, '@', partition);
    let (mut path, _) = fill_runs(&path, '#', file_number);
    if !has_partition {
        path.push_str(&format!("-{:05}", partition));
    }
    PathBuf::from(path)
}

/// Writes the records of one partition, one per line, to its shard of `pattern`.
pub(crate) fn write_partition<T: std::fmt::Display>(
    pattern: &str,
    partition: usize,
    records: Box<dyn Iterator<Item = T>>,
) -> Result<PathBuf> {
    let path = shard_path(pattern, partition, 0);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error(parent))?;
    }
    let file = fs::File::create(&path).map_err(write_error(&path))?;
    let mut writer = BufWriter::new(file);
    let mut lines = 0;
    for record in records {
        writeln!(writer, "{}", record).map_err(write_error(&path))?;
        lines += 1;
    }
    writer.flush().map_err(write_error(&path))?;
    log::debug!("wrote {} lines to {}", lines, path.display());
    Ok(path)
}
