use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Event;

/// Encode one entry as `[u32 len][bincode event][u32 crc32]`, little endian.
fn encode_event(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Read exactly `buf.len()` bytes. `Ok(false)` means the log ended (possibly mid-entry).
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact entry and its size on disk, or `None` where the usable log ends.
/// `remaining` is the number of bytes left in the file.
fn read_entry(
    reader: &mut impl Read,
    remaining: u64,
    path: &Path,
) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_or_eof(reader, &mut len_buf)? {
        return Ok(None);
    }
    let payload_len = u64::from(u32::from_le_bytes(len_buf));
    let entry_len = payload_len + 8;
    if entry_len > remaining {
        return Ok(None);
    }
    let mut payload = vec![0u8; payload_len as usize];
    let mut crc_buf = [0u8; 4];
    if !read_or_eof(reader, &mut payload)? || !read_or_eof(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        warn!(path = %path.display(), "checksum mismatch in booking log");
        return Ok(None);
    }
    match bincode::deserialize::<Event>(&payload) {
        Ok(event) => Ok(Some((event, entry_len))),
        Err(e) => {
            warn!(path = %path.display(), "undecodable booking log entry: {e}");
            Ok(None)
        }
    }
}

/// Result of scanning a log file.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    /// Byte offset just past the last intact entry.
    pub valid_len: u64,
    pub file_len: u64,
}

impl Replay {
    /// Bytes after the last intact entry (a torn or corrupt tail).
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Append-only booking log.
///
/// Appends are staged in memory and reach the file only in `flush_sync`,
/// which writes and fsyncs the whole batch. If that fails, `rollback` cuts
/// the file back to its last durable length so a failed batch can never
/// resurface on replay.
pub struct Wal {
    file: File,
    path: PathBuf,
    pending: Vec<u8>,
    pending_appends: u64,
    durable_len: u64,
    appends_since_compact: u64,
    /// Set when a rollback itself failed; the file tail is then unknown.
    poisoned: bool,
    #[cfg(test)]
    fail_next_sync: bool,
}

impl Wal {
    /// Open for append. Run `recover` first if the file may have a damaged tail.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let durable_len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            pending: Vec::new(),
            pending_appends: 0,
            durable_len,
            appends_since_compact: 0,
            poisoned: false,
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    #[cfg(test)]
    pub fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }

    fn ensure_usable(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other(
                "booking log tail is in an unknown state; refusing writes until compaction",
            ));
        }
        Ok(())
    }

    /// Stage one event. Nothing reaches the file until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.ensure_usable()?;
        encode_event(&mut self.pending, event)?;
        self.pending_appends += 1;
        Ok(())
    }

    /// Write and fsync everything staged. On error the staged bytes are kept
    /// until `rollback`.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.ensure_usable()?;
        self.file.write_all(&self.pending)?;
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(io::Error::other("injected fsync failure"));
        }
        self.file.sync_all()?;
        self.durable_len += self.pending.len() as u64;
        self.appends_since_compact += self.pending_appends;
        self.pending.clear();
        self.pending_appends = 0;
        Ok(())
    }

    /// Drop the staged batch and truncate the file to its last durable length.
    pub fn rollback(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pending_appends = 0;
        let truncated = self
            .file
            .set_len(self.durable_len)
            .and_then(|()| self.file.sync_all());
        if truncated.is_err() {
            self.poisoned = true;
        }
        truncated
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write the compacted log next to the live one and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::tmp_path(path))?);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the compacted file over the live log and reopen it for append.
    /// The new file is fully intact, so this also clears a poisoned tail.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.flush_sync()?;
        fs::rename(Self::tmp_path(&self.path), &self.path)?;
        let path = self.path.clone();
        *self = Self::open(&path)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Scan every intact event. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay {
            file_len,
            ..Replay::default()
        };
        while let Some((event, entry_len)) =
            read_entry(&mut reader, file_len - replay.valid_len, path)?
        {
            replay.events.push(event);
            replay.valid_len += entry_len;
        }
        Ok(replay)
    }

    /// Replay the log and cut off anything past the last intact entry, so
    /// the next append lands directly behind it.
    pub fn recover(path: &Path) -> io::Result<Vec<Event>> {
        let replay = Self::replay(path)?;
        let discarded = replay.discarded_bytes();
        if discarded > 0 {
            warn!(
                path = %path.display(),
                kept = replay.events.len(),
                discarded,
                "truncating damaged booking log tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        Ok(replay.events)
    }
}
