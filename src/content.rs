//! Content scanners: read one file fully and return its record count
//!
//! - `AvroScanner`: Avro object container files, counted from block headers
//!   without decoding records
//! - `ParquetScanner`: Parquet files, counted from the footer metadata
//! - `LineScanner`: newline-delimited text

use crate::error::{ContentError, ContentResult};
use bytes::Bytes;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::io::{self, BufRead, BufReader, Read};

/// Counts the records of one open file
pub trait ContentScanner: Send + Sync {
    /// Consume `reader` fully and return its record count
    fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64>;
}

/// File formats the CLI knows how to count
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ContentFormat {
    Avro,
    Parquet,
    Lines,
}

impl ContentFormat {
    pub fn scanner(self) -> Box<dyn ContentScanner> {
        match self {
            ContentFormat::Avro => Box::new(AvroScanner),
            ContentFormat::Parquet => Box::new(ParquetScanner),
            ContentFormat::Lines => Box::new(LineScanner),
        }
    }
}

const AVRO_MAGIC: [u8; 4] = [b'O', b'b', b'j', 1];
const AVRO_SYNC_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct AvroScanner;

/// Zig-zag varint `long`; `None` on a clean end of stream before the first byte
fn read_long_or_eof<R: BufRead>(reader: &mut R, what: &'static str) -> ContentResult<Option<i64>> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) if shift == 0 => return Ok(None),
            Ok(0) => return Err(ContentError::Truncated { what }),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        if shift >= 64 {
            return Err(ContentError::Corrupt(format!("varint too long in {}", what)));
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        shift += 7;

        if byte[0] & 0x80 == 0 {
            let decoded = (value >> 1) as i64 ^ -((value & 1) as i64);
            return Ok(Some(decoded));
        }
    }
}

fn read_long<R: BufRead>(reader: &mut R, what: &'static str) -> ContentResult<i64> {
    read_long_or_eof(reader, what)?.ok_or(ContentError::Truncated { what })
}

fn read_length<R: BufRead>(reader: &mut R, what: &'static str) -> ContentResult<u64> {
    let len = read_long(reader, what)?;
    u64::try_from(len).map_err(|_| ContentError::Corrupt(format!("negative length in {}", what)))
}

fn skip<R: Read>(reader: &mut R, len: u64, what: &'static str) -> ContentResult<()> {
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped == len {
        Ok(())
    } else {
        Err(ContentError::Truncated { what })
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> ContentResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ContentError::Truncated { what }
        } else {
            e.into()
        }
    })
}

impl AvroScanner {
    /// Skip the header metadata map (blocks of string -> bytes pairs)
    fn skip_metadata<R: BufRead>(reader: &mut R) -> ContentResult<()> {
        loop {
            let count = read_long(reader, "header metadata")?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                // Negative count is followed by the block size in bytes
                let size = read_length(reader, "header metadata")?;
                skip(reader, size, "header metadata")?;
                continue;
            }
            for _ in 0..count {
                let key_len = read_length(reader, "metadata key")?;
                skip(reader, key_len, "metadata key")?;
                let value_len = read_length(reader, "metadata value")?;
                skip(reader, value_len, "metadata value")?;
            }
        }
    }
}

impl ContentScanner for AvroScanner {
    fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64> {
        let mut reader = BufReader::with_capacity(buffer_size.max(1), reader);

        let mut magic = [0u8; 4];
        read_exact(&mut reader, &mut magic, "header").map_err(|e| match e {
            ContentError::Truncated { .. } => ContentError::BadMagic { format: "Avro" },
            other => other,
        })?;
        if magic != AVRO_MAGIC {
            return Err(ContentError::BadMagic { format: "Avro" });
        }

        Self::skip_metadata(&mut reader)?;

        let mut sync = [0u8; AVRO_SYNC_SIZE];
        read_exact(&mut reader, &mut sync, "sync marker")?;

        let mut rows: u64 = 0;
        let mut marker = [0u8; AVRO_SYNC_SIZE];
        while let Some(count) = read_long_or_eof(&mut reader, "block header")? {
            let count = u64::try_from(count)
                .map_err(|_| ContentError::Corrupt("negative block object count".into()))?;
            let size = read_length(&mut reader, "block header")?;
            skip(&mut reader, size, "block data")?;

            read_exact(&mut reader, &mut marker, "block sync marker")?;
            if marker != sync {
                return Err(ContentError::Corrupt("block sync marker mismatch".into()));
            }
            rows += count;
        }

        Ok(rows)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetScanner;

impl ContentScanner for ParquetScanner {
    fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64> {
        // The footer sits at the end, so the stream is buffered whole
        let mut data = Vec::with_capacity(buffer_size);
        reader.read_to_end(&mut data)?;

        let file_reader = SerializedFileReader::new(Bytes::from(data))?;
        let rows = file_reader.metadata().file_metadata().num_rows();
        u64::try_from(rows).map_err(|_| ContentError::Corrupt(format!("negative row count {}", rows)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LineScanner;

impl ContentScanner for LineScanner {
    fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64> {
        let mut reader = BufReader::with_capacity(buffer_size.max(1), reader);
        let mut lines = 0u64;
        let mut last = None;

        loop {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if buf.is_empty() {
                break;
            }
            lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
            last = buf.last().copied();
            let len = buf.len();
            reader.consume(len);
        }

        if matches!(last, Some(b) if b != b'\n') {
            lines += 1;
        }
        Ok(lines)
    }
}
