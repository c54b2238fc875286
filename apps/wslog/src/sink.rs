//! Output surfaces for normalized lines.

use std::io::{self, Write};

use wslog_protocol::NormalizedLine;

use crate::config::OutputKind;

/// Write-only destination for rendered log lines.
pub trait LineSink {
    fn write_line(&mut self, line: &NormalizedLine) -> io::Result<()>;
}

impl<T: LineSink + ?Sized> LineSink for Box<T> {
    fn write_line(&mut self, line: &NormalizedLine) -> io::Result<()> {
        (**self).write_line(line)
    }
}

/// Writes `[source] text` lines to any writer, flushing after each one.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn write_line(&mut self, line: &NormalizedLine) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

/// Emits each line as a `tracing` event.
pub struct TracingSink;

impl LineSink for TracingSink {
    fn write_line(&mut self, line: &NormalizedLine) -> io::Result<()> {
        tracing::info!(target: "wslog::line", source = %line.source, "{}", line.text);
        Ok(())
    }
}

/// Builds the sink selected by configuration.
pub fn for_output(kind: OutputKind) -> Box<dyn LineSink + Send> {
    match kind {
        OutputKind::Stdout => Box::new(WriterSink::new(io::stdout())),
        OutputKind::Log => Box::new(TracingSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(source: &str, text: &str) -> NormalizedLine {
        NormalizedLine {
            source: source.into(),
            text: text.into(),
        }
    }

    #[test]
    fn writer_sink_renders_one_line_each() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_line(&line("web-1", "listening on :8080")).unwrap();
        sink.write_line(&line("db", "ready")).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "[web-1] listening on :8080\n[db] ready\n");
    }

    #[test]
    fn boxed_sink_forwards() {
        let mut sink: Box<dyn LineSink> = Box::new(TracingSink);
        assert!(sink.write_line(&line("a", "b")).is_ok());
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_errors_propagate() {
        let mut sink = WriterSink::new(FailingWriter);
        let err = sink.write_line(&line("a", "b")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
