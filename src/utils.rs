//! Utility functions for file handling and common operations

use crate::{EvalError, EvalResult};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> EvalResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(EvalError::Io(e)),
    }
}

/// Open a plain or gzipped text file
pub fn open_input<P: AsRef<Path>>(path: P) -> EvalResult<Box<dyn BufRead>> {
    let file = File::open(&path)
        .map_err(|_| EvalError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Create an output file, gzip compressed when the name ends in .gz
pub fn create_output<P: AsRef<Path>>(path: P) -> EvalResult<Box<dyn Write>> {
    let path = path.as_ref();
    ensure_parent_dirs(path)?;
    let file = File::create(path)?;

    let writer: Box<dyn Write> = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

/// Refuse to overwrite an existing file unless forced
pub fn check_overwrite<P: AsRef<Path>>(path: P, force: bool) -> EvalResult<()> {
    if path.as_ref().exists() && !force {
        return Err(EvalError::InvalidConfig(format!(
            "output file {} exists, use --force to overwrite",
            path.as_ref().display()
        )));
    }
    Ok(())
}

/// Get the number of CPU cores, with a fallback default
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Validate file paths and check if they exist
fn validate_file_exists<P: AsRef<Path>>(path: P) -> EvalResult<()> {
    if !path.as_ref().exists() {
        return Err(EvalError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> EvalResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| EvalError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> EvalResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Parse "name1,file1,name2,file2,..." into ordered pairs
pub fn parse_name_file_pairs(value: &str) -> EvalResult<Vec<(String, PathBuf)>> {
    let fields: Vec<&str> = value.split(',').map(|f| f.trim()).collect();
    if fields.len() % 2 != 0 || fields.iter().any(|f| f.is_empty()) {
        return Err(EvalError::InvalidConfig(format!(
            "expected comma separated name,file pairs, got '{}'",
            value
        )));
    }

    Ok(fields
        .chunks(2)
        .map(|pair| (pair[0].to_string(), PathBuf::from(pair[1])))
        .collect())
}

/// Chunking utility for splitting work across threads
pub fn chunk_work<T: Clone>(items: Vec<T>, num_chunks: usize) -> Vec<Vec<T>> {
    if items.is_empty() || num_chunks == 0 {
        return vec![items];
    }

    let num_chunks = std::cmp::min(num_chunks, items.len());
    let chunk_size = std::cmp::max(1, items.len() / num_chunks);

    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 0..num_chunks {
        let end = if i == num_chunks - 1 {
            items.len() // last chunk takes the remainder
        } else {
            std::cmp::min(start + chunk_size, items.len())
        };

        if start < items.len() {
            chunks.push(items[start..end].to_vec());
            start = end;
        }
    }

    chunks
}

/// Logs elapsed time when dropped
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!("Finished '{}' in {:.2?}", self.name, self.elapsed());
    }
}

/// Memory usage reporting utility
pub fn log_memory_usage(context: &str) {
    #[cfg(unix)]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                log::debug!("Memory usage ({}): {} MB", context, kb / 1024);
            }
        }
    }

    #[cfg(not(unix))]
    {
        log::debug!("Memory usage logging not supported on this platform ({})", context);
    }
}
