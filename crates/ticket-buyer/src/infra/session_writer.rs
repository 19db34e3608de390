use log::{debug, warn};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Destination for the archive of a finished session.
///
/// Writes only happen between `start_writing_session` and
/// `session_writing_finished`. Use [`SessionArchive`] to keep the two paired.
pub trait SessionWriter: Write + Send {
    fn start_writing_session(&mut self, ticket_hash: &str) -> io::Result<()>;

    /// Closes the current archive, returning where it was stored if that
    /// means anything for this writer.
    fn session_writing_finished(&mut self) -> io::Result<Option<String>>;
}

/// Guard pairing the begin and end calls on a [`SessionWriter`]. The end
/// call happens on drop when [`SessionArchive::finish`] was never reached.
pub struct SessionArchive<'a> {
    writer: &'a mut dyn SessionWriter,
    finished: bool,
}

impl<'a> SessionArchive<'a> {
    pub fn begin(writer: &'a mut dyn SessionWriter, ticket_hash: &str) -> io::Result<Self> {
        writer.start_writing_session(ticket_hash)?;
        Ok(Self {
            writer,
            finished: false,
        })
    }

    pub fn finish(mut self) -> io::Result<Option<String>> {
        self.finished = true;
        self.writer.session_writing_finished()
    }
}

impl Write for SessionArchive<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for SessionArchive<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.writer.session_writing_finished() {
            warn!("Failed to close unfinished session archive: {}", e);
        }
    }
}

/// Stores each session under `<data_dir>/sessions/<ticket hash>`, readable
/// only by the owner.
pub struct FileSessionWriter {
    sessions_dir: PathBuf,
    current: Option<(PathBuf, BufWriter<File>)>,
}

impl FileSessionWriter {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: data_dir.as_ref().join("sessions"),
            current: None,
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }
}

impl SessionWriter for FileSessionWriter {
    fn start_writing_session(&mut self, ticket_hash: &str) -> io::Result<()> {
        if self.current.is_some() {
            return Err(io::Error::other("a session archive is already being written"));
        }
        fs::create_dir_all(&self.sessions_dir)?;
        let path = self.sessions_dir.join(ticket_hash);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path)?;
        debug!("Writing session archive to {}", path.display());
        self.current = Some((path, BufWriter::new(file)));
        Ok(())
    }

    fn session_writing_finished(&mut self) -> io::Result<Option<String>> {
        let Some((path, mut writer)) = self.current.take() else {
            return Ok(None);
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(Some(path.display().to_string()))
    }
}

impl Write for FileSessionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current.as_mut() {
            Some((_, writer)) => writer.write(buf),
            None => Err(io::Error::other("no session archive is being written")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some((_, writer)) => writer.flush(),
            None => Ok(()),
        }
    }
}
