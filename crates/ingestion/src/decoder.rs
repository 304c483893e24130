//! Gzip + CSV record decoding.
//!
//! Opens one `.csv.gz` order-book log and yields its rows lazily. The gzip
//! header is checked up front so a file that is not gzip at all is rejected
//! before any row is produced; corruption found later in the stream ends
//! iteration with a decompression error. Concatenated gzip members are read
//! as one stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use flate2::read::MultiGzDecoder;
use tickpack_core::{Error, Result, RowParseError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Sequential reader over the raw rows of one compressed log.
pub struct RecordDecoder {
    path: PathBuf,
    records: StringRecordsIntoIter<MultiGzDecoder<BufReader<File>>>,
    finished: bool,
}

impl RecordDecoder {
    /// Open a compressed log.
    ///
    /// Fails with [`Error::InputAccess`] if the file cannot be opened and
    /// with [`Error::Decompression`] if it does not start with a gzip header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::input_access(path, e))?;
        let mut reader = BufReader::new(file);

        let head = reader.fill_buf().map_err(|e| Error::input_access(path, e))?;
        if head.len() < GZIP_MAGIC.len() || head[..GZIP_MAGIC.len()] != GZIP_MAGIC {
            return Err(Error::decompression(path, "invalid gzip header"));
        }

        let records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(MultiGzDecoder::new(reader))
            .into_records();

        Ok(Self {
            path: path.to_path_buf(),
            records,
            finished: false,
        })
    }

    /// Path of the file being decoded.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordDecoder {
    /// `Error::RowParse` items are per-row and can be skipped;
    /// `Error::Decompression` is terminal.
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.records.next()? {
            Ok(record) => Some(Ok(record)),
            Err(err) if err.is_io_error() => {
                self.finished = true;
                Some(Err(Error::decompression(&self.path, err.to_string())))
            }
            Err(err) => Some(Err(RowParseError::Csv(err.to_string()).into())),
        }
    }
}
