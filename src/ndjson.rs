use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder as ZstdDecoder;
use zstd::stream::write::Encoder as ZstdEncoder;

fn is_zst(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("zst")
}

/// NDJSON reader with buffering; transparently decodes `.zst` files.
pub struct NdjsonReader {
    rdr: Box<dyn BufRead + Send>,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        let cap = buf_bytes.max(8 * 1024);
        let inner: Box<dyn Read + Send> = if is_zst(path) {
            let mut dec = ZstdDecoder::new(f)?;
            dec.window_log_max(31)?;
            Box::new(dec)
        } else {
            Box::new(f)
        };
        Ok(Self { rdr: Box::new(BufReader::with_capacity(cap, inner)) })
    }

    /// Read the next line into `buf`, stripping `\r?\n`. Returns bytes read (0 on EOF).
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }

    /// Deserialize every non-empty line. Lines that fail to parse abort with their line number.
    pub fn read_all<T: serde::de::DeserializeOwned>(mut self, label: &Path) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut buf = String::with_capacity(64 * 1024);
        let mut line_no = 0usize;
        while self.read_line(&mut buf).with_context(|| format!("read {}", label.display()))? > 0 {
            line_no += 1;
            if buf.trim().is_empty() { continue; }
            let v = serde_json::from_str(&buf)
                .with_context(|| format!("parse {} line {}", label.display(), line_no))?;
            out.push(v);
        }
        Ok(out)
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Zst(ZstdEncoder<'static, BufWriter<File>>),
}

/// NDJSON writer on a temp path, promoted to its final name on `finish_atomic`.
pub struct NdjsonWriter {
    path: PathBuf,
    sink: Sink,
}

impl NdjsonWriter {
    pub fn create(path: &Path, buf_bytes: usize, compress: bool) -> io::Result<Self> {
        let f = create_with_backoff(path, 16, 50)?;
        let w = BufWriter::with_capacity(buf_bytes.max(8 * 1024), f);
        let sink = if compress { Sink::Zst(ZstdEncoder::new(w, 3)?) } else { Sink::Plain(w) };
        Ok(Self { path: path.to_path_buf(), sink })
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        let w: &mut dyn Write = match &mut self.sink {
            Sink::Plain(w) => w,
            Sink::Zst(w) => w,
        };
        w.write_all(s.as_bytes())?;
        w.write_all(b"\n")
    }

    /// Flush (ending the zstd frame if any) and promote the temp file to `final_path`.
    pub fn finish_atomic(self, final_path: &Path) -> Result<()> {
        let mut inner = match self.sink {
            Sink::Plain(w) => w,
            Sink::Zst(enc) => enc.finish().with_context(|| format!("finish zstd {}", self.path.display()))?,
        };
        inner.flush().with_context(|| format!("flush {}", self.path.display()))?;
        drop(inner);
        replace_file_atomic_backoff(&self.path, final_path)
    }
}
