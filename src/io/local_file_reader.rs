use std::fs;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};

fn read_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::InputRead {
        source,
        path: path.to_path_buf(),
    }
}

/// Expands every directory to the regular files inside it, in name order. Files are kept as
/// given; a missing path is an error.
pub fn expand_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(read_error(path))?;
        if !metadata.is_dir() {
            files.push(path.to_path_buf());
            continue;
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(read_error(path))? {
            let entry_path = entry.map_err(read_error(path))?.path();
            if entry_path.is_file() {
                entries.push(entry_path);
            }
        }
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}

#[derive(Debug, Clone)]
struct InputFile {
    path: PathBuf,
    // offset of the first byte in the concatenation of all inputs
    offset: u64,
    size: u64,
}

/// Text lines of a list of files.
///
/// The files are treated as one concatenated byte range split evenly across the partitions; a
/// line belongs to the partition holding its first byte, so no line is read twice or lost.
pub struct LinesRdd {
    vals: Arc<RddVals>,
    files: Arc<Vec<InputFile>>,
    total_size: u64,
}

impl Clone for LinesRdd {
    fn clone(&self) -> Self {
        LinesRdd {
            vals: self.vals.clone(),
            files: self.files.clone(),
            total_size: self.total_size,
        }
    }
}

impl LinesRdd {
    pub(crate) fn new<P: AsRef<Path>>(context: Arc<Context>, paths: &[P]) -> Result<Self> {
        let mut files = Vec::new();
        let mut offset = 0;
        for path in expand_paths(paths)? {
            let size = fs::metadata(&path).map_err(read_error(&path))?.len();
            files.push(InputFile { path, offset, size });
            offset += size;
        }
        log::debug!("reading {} files, {} bytes in total", files.len(), offset);
        Ok(LinesRdd {
            vals: Arc::new(RddVals::new(context, OpKind::ReadLines)),
            files: Arc::new(files),
            total_size: offset,
        })
    }

    fn byte_range(&self, split: usize) -> (u64, u64) {
        let parts = self.number_of_splits() as u128;
        let bound = |p: u128| (p * self.total_size as u128 / parts) as u64;
        (bound(split as u128), bound(split as u128 + 1))
    }
}

/// Lines of `file` starting in the local byte range `[begin, end)`.
fn read_lines_in(file: &InputFile, begin: u64, end: u64, lines: &mut Vec<String>) -> Result<()> {
    let path = &file.path;
    let mut reader = BufReader::new(fs::File::open(path).map_err(read_error(path))?);
    let mut pos = begin;
    if begin > 0 {
        // a line starts at `begin` only if the byte before it ends a line
        reader
            .seek(SeekFrom::Start(begin - 1))
            .map_err(read_error(path))?;
        let mut previous = [0u8; 1];
        reader.read_exact(&mut previous).map_err(read_error(path))?;
        if previous[0] != b'\n' {
            let mut skipped = Vec::new();
            pos += reader
                .read_until(b'\n', &mut skipped)
                .map_err(read_error(path))? as u64;
        }
    }
    let mut buf = Vec::new();
    while pos < end {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(read_error(path))?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(())
}

impl RddBase for LinesRdd {
    fn get_rdd_id(&self) -> usize {
        self.vals.id
    }

    fn get_context(&self) -> Arc<Context> {
        self.vals.context.clone()
    }

    fn get_dependencies(&self) -> Vec<Dependency> {
        self.vals.dependencies.clone()
    }

    fn get_op_kind(&self) -> OpKind {
        self.vals.op_kind.clone()
    }
}

impl Rdd for LinesRdd {
    type Item = String;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let (begin, end) = self.byte_range(split);
        let mut lines = Vec::new();
        for file in self.files.iter() {
            let file_end = file.offset + file.size;
            if file_end <= begin || file.offset >= end {
                continue;
            }
            let local_begin = begin.saturating_sub(file.offset);
            let local_end = (end - file.offset).min(file.size);
            read_lines_in(file, local_begin, local_end, &mut lines)?;
        }
        log::debug!("split {} read {} lines", split, lines.len());
        Ok(Box::new(lines.into_iter()))
    }
}
