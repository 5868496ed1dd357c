//! Write-ahead log for rebuilding shard state after a restart.
//!
//! The arena itself is never persisted; when the log is enabled every
//! accepted insert is appended here and replayed into the cluster on the
//! next start. Record framing, all integers little-endian:
//!
//! ```text
//! u32 payload_size
//! u8  op                         1 = insert
//! u32 id_len,    id_len bytes
//! u32 vec_bytes, vec_bytes bytes (f32 little-endian each)
//! u32 meta_len,  meta_len bytes
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const OP_INSERT: u8 = 1;

pub struct Wal {
    writer: BufWriter<File>,
}

impl Wal {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record and flushes it to the OS. No fsync; a crash may
    /// lose the most recent tail, which replay tolerates.
    pub fn append(&mut self, op: u8, id: &str, vector: &[f32], meta: &[u8]) -> io::Result<()> {
        let id_bytes = id.as_bytes();
        let vec_bytes = vector.len() * 4;
        let payload = 1 + 4 + id_bytes.len() + 4 + vec_bytes + 4 + meta.len();

        let w = &mut self.writer;
        w.write_all(&(payload as u32).to_le_bytes())?;
        w.write_all(&[op])?;
        w.write_all(&(id_bytes.len() as u32).to_le_bytes())?;
        w.write_all(id_bytes)?;
        w.write_all(&(vec_bytes as u32).to_le_bytes())?;
        for value in vector {
            w.write_all(&value.to_le_bytes())?;
        }
        w.write_all(&(meta.len() as u32).to_le_bytes())?;
        w.write_all(meta)?;
        w.flush()
    }

    /// Scans a log from offset 0 to EOF, invoking `apply` for every insert
    /// record; unknown ops are skipped. A torn tail record (crash mid-write)
    /// ends the scan with a warning rather than an error. Returns the number
    /// of applied records.
    pub fn replay(
        path: impl AsRef<Path>,
        mut apply: impl FnMut(String, Vec<f32>, Vec<u8>),
    ) -> io::Result<usize> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        let mut reader = BufReader::new(file);
        let mut applied = 0usize;

        loop {
            let mut size_buf = [0u8; 4];
            match reader.read_exact(&mut size_buf) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err),
            }

            match read_record(&mut reader) {
                Ok((OP_INSERT, id, vector, meta)) => {
                    apply(id, vector, meta);
                    applied += 1;
                }
                Ok((op, ..)) => {
                    tracing::warn!(op, "skipping unknown wal op");
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!("wal ends in a torn record, ignoring tail");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(applied)
    }
}

fn read_record(reader: &mut impl Read) -> io::Result<(u8, String, Vec<f32>, Vec<u8>)> {
    let mut op = [0u8; 1];
    reader.read_exact(&mut op)?;

    let id_len = read_u32(reader)? as usize;
    let mut id_bytes = vec![0u8; id_len];
    reader.read_exact(&mut id_bytes)?;
    let id = String::from_utf8(id_bytes)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let vec_bytes = read_u32(reader)? as usize;
    let mut vector = vec![0.0f32; vec_bytes / 4];
    let mut value = [0u8; 4];
    for slot in vector.iter_mut() {
        reader.read_exact(&mut value)?;
        *slot = f32::from_le_bytes(value);
    }

    let meta_len = read_u32(reader)? as usize;
    let mut meta = vec![0u8; meta_len];
    reader.read_exact(&mut meta)?;

    Ok((op[0], id, vector, meta))
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.bin");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(OP_INSERT, "a", &[1.0, -2.5], b"{\"x\":1}").unwrap();
            wal.append(OP_INSERT, "b", &[0.0, 3.25], b"").unwrap();
        }

        let mut seen = Vec::new();
        let applied = Wal::replay(&path, |id, vector, meta| {
            seen.push((id, vector, meta));
        })
        .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(seen[0].0, "a");
        assert_eq!(seen[0].1, vec![1.0, -2.5]);
        assert_eq!(seen[0].2, b"{\"x\":1}");
        assert_eq!(seen[1].0, "b");
        assert_eq!(seen[1].1, vec![0.0, 3.25]);
        assert!(seen[1].2.is_empty());
    }

    #[test]
    fn record_framing_is_little_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.bin");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(OP_INSERT, "k", &[1.0], b"m").unwrap();
        drop(wal);

        let bytes = std::fs::read(&path).unwrap();
        // payload = op(1) + id_len(4)+1 + vec_len(4)+4 + meta_len(4)+1 = 19
        assert_eq!(&bytes[0..4], &19u32.to_le_bytes());
        assert_eq!(bytes[4], OP_INSERT);
        assert_eq!(&bytes[5..9], &1u32.to_le_bytes());
        assert_eq!(bytes[9], b'k');
        assert_eq!(&bytes[10..14], &4u32.to_le_bytes());
        assert_eq!(&bytes[14..18], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[18..22], &1u32.to_le_bytes());
        assert_eq!(bytes[22], b'm');
        assert_eq!(bytes.len(), 23);
    }

    #[test]
    fn unknown_ops_skipped_and_torn_tail_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.bin");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(2, "gone", &[1.0], b"").unwrap();
            wal.append(OP_INSERT, "kept", &[2.0], b"").unwrap();
        }
        // simulate a crash mid-append
        use std::io::Write;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&[OP_INSERT, 3]).unwrap();

        let mut seen = Vec::new();
        let applied = Wal::replay(&path, |id, _, _| seen.push(id)).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(seen, vec!["kept".to_string()]);
    }

    #[test]
    fn missing_file_replays_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let applied = Wal::replay(dir.path().join("absent.bin"), |_, _, _| {
            panic!("no records expected")
        })
        .unwrap();
        assert_eq!(applied, 0);
    }
}
