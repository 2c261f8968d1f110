//! Append-only conversation transcript

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Who produced a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Text typed by the user
    User,
    /// Reply from the bot
    Bot,
    /// Informational notice (session changes)
    System,
    /// Failed turn
    Error,
}

/// One rendered transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::User => write!(f, "me: {}", self.text),
            Role::Bot => write!(f, "bot: {}", self.text),
            Role::System => f.write_str(&self.text),
            Role::Error => write!(f, "⚠️ Error: {}", self.text),
        }
    }
}

type Sink = Box<dyn Write + Send>;

/// Ordered history of a conversation, echoed to a writer as it grows
///
/// Cloning yields a handle to the same history.
#[derive(Clone)]
pub struct Transcript {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    entries: Vec<TranscriptEntry>,
    sink: Option<Sink>,
}

impl Transcript {
    /// Transcript that renders each line to stdout
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_sink(Some(Box::new(std::io::stdout())))
    }

    /// Transcript that only records entries
    #[must_use]
    pub fn detached() -> Self {
        Self::with_sink(None)
    }

    /// Transcript rendering to an arbitrary writer
    #[must_use]
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::with_sink(Some(Box::new(writer)))
    }

    fn with_sink(sink: Option<Sink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                sink,
            })),
        }
    }

    /// Append a line and render it
    pub fn append(&self, role: Role, text: impl Into<String>) {
        let entry = TranscriptEntry {
            role,
            text: text.into(),
        };

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = inner.sink.as_mut() {
            // A closed stdout must not take the conversation down
            if let Err(e) = writeln!(sink, "{entry}").and_then(|()| sink.flush()) {
                tracing::debug!(error = %e, "transcript write failed");
            }
        }
        inner.entries.push(entry);
    }

    /// Snapshot of all entries in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    /// Number of entries so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Whether nothing has been appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that shares its buffer with the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_roles() {
        let buf = SharedBuf::default();
        let transcript = Transcript::with_writer(buf.clone());

        transcript.append(Role::User, "hola");
        transcript.append(Role::Bot, "buenas");
        transcript.append(Role::System, "Session ID: abc");
        transcript.append(Role::Error, "boom");

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            out,
            "me: hola\nbot: buenas\nSession ID: abc\n⚠️ Error: boom\n"
        );
    }

    #[test]
    fn keeps_insertion_order() {
        let transcript = Transcript::detached();
        assert!(transcript.is_empty());

        for i in 0..10 {
            transcript.append(Role::User, i.to_string());
        }

        let texts: Vec<String> = transcript.entries().into_iter().map(|e| e.text).collect();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
        assert_eq!(transcript.len(), 10);
    }

    #[test]
    fn clones_share_history() {
        let transcript = Transcript::detached();
        let handle = transcript.clone();
        handle.append(Role::Bot, "shared");
        assert_eq!(transcript.entries()[0].text, "shared");
    }
}
