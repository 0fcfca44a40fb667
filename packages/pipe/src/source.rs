//! Line sources for producers.
//!
//! Lines keep their terminators, so a transform sees exactly what was read.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// Lazy iterator over the lines of a reader, terminators included.
///
/// Yields each line once, front to back. Not restartable.
#[derive(Debug)]
pub struct Lines<R> {
    reader: R,
    done: bool,
}

/// Reads lines from `reader`.
pub const fn lines<R: BufRead>(reader: R) -> Lines<R> {
    Lines {
        reader,
        done: false,
    }
}

/// Opens the file at `path` for reading line by line.
///
/// # Errors
///
/// * If the file cannot be opened
pub fn open(path: impl AsRef<Path>) -> io::Result<Lines<BufReader<File>>> {
    let path = path.as_ref();
    log::debug!("open: reading lines from {}", path.display());
    Ok(lines(BufReader::new(File::open(path)?)))
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
