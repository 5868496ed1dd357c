use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Byte range of a metadata blob inside the log file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogLocation {
    pub offset: u64,
    pub length: u32,
}

/// Append-only metadata log.
///
/// Blobs are written back to back with no framing; a `LogLocation` is the
/// sole index and lives in memory only. Appends go through an inner mutex
/// holding the write cursor; reads are positional so they tolerate
/// concurrent appends without sharing the cursor. Durability is not this
/// layer's job; nothing is fsynced per write.
pub struct MetaLog {
    writer: Mutex<LogWriter>,
    reader: File,
}

struct LogWriter {
    file: File,
    pos: u64,
}

impl MetaLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let pos = file.metadata()?.len();
        let reader = file.try_clone()?;
        Ok(Self {
            writer: Mutex::new(LogWriter { file, pos }),
            reader,
        })
    }

    /// Atomically appends `data` and returns its location.
    pub fn append(&self, data: &[u8]) -> io::Result<LogLocation> {
        if data.len() > i32::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "metadata blob exceeds 2^31-1 bytes",
            ));
        }

        let mut writer = self.writer.lock();
        let loc = LogLocation {
            offset: writer.pos,
            length: data.len() as u32,
        };
        writer.file.write_all(data)?;
        writer.pos += data.len() as u64;
        Ok(loc)
    }

    /// Positional read of the blob at `loc`.
    pub fn read_at(&self, loc: LogLocation) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; loc.length as usize];
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.reader.read_exact_at(&mut buf, loc.offset)?;
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self.reader.try_clone()?;
            file.seek(SeekFrom::Start(loc.offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    /// Current end-of-log offset.
    pub fn len(&self) -> u64 {
        self.writer.lock().pos
    }
}
