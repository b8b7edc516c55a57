#![allow(dead_code)]

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use htmlstream::{BoxError, OutputSink, RewriteEngine, RewriteSession, StreamAdapter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFault(pub &'static str);

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine fault: {}", self.0)
    }
}

impl std::error::Error for EngineFault {}

/// Streaming tag renamer: `<from ...>` / `</from>` become `<to ...>` / `</to>`.
///
/// Text runs and completed tags are emitted as separate chunks from one reused buffer; partial
/// tags are held across writes.
#[derive(Clone)]
pub struct TagRename {
    pub from: &'static str,
    pub to: &'static str,
    pub sentinel_on_end: bool,
    pub sessions: Arc<AtomicUsize>,
}

impl TagRename {
    pub fn new(from: &'static str, to: &'static str) -> Self {
        Self {
            from,
            to,
            sentinel_on_end: false,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Full-buffer transform as bytes.
    pub fn full(&self, html: &str) -> Vec<u8> {
        self.transform_full(html).unwrap().into_bytes()
    }
}

pub struct TagRenameSession<S> {
    sink: S,
    from: &'static str,
    to: &'static str,
    sentinel_on_end: bool,
    tag: Vec<u8>,
    buf: Vec<u8>,
}

impl<S: OutputSink> TagRenameSession<S> {
    fn emit_buf(&mut self) {
        if !self.buf.is_empty() {
            self.sink.handle_chunk(&self.buf);
            self.buf.clear();
        }
    }

    fn emit_tag(&mut self) {
        let tag = std::mem::take(&mut self.tag);
        let close = tag.get(1) == Some(&b'/');
        let name_start = if close { 2 } else { 1 };
        let name_end = tag[name_start..]
            .iter()
            .position(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
            .map(|p| p + name_start)
            .unwrap_or(tag.len());
        if &tag[name_start..name_end] == self.from.as_bytes() {
            self.buf.extend_from_slice(&tag[..name_start]);
            self.buf.extend_from_slice(self.to.as_bytes());
            self.buf.extend_from_slice(&tag[name_end..]);
        } else {
            self.buf.extend_from_slice(&tag);
        }
        self.emit_buf();
    }
}

impl<S: OutputSink> RewriteSession for TagRenameSession<S> {
    type Error = EngineFault;

    fn write(&mut self, chunk: &[u8]) -> Result<(), EngineFault> {
        for &b in chunk {
            if !self.tag.is_empty() {
                self.tag.push(b);
                if b == b'>' {
                    self.emit_tag();
                }
            } else if b == b'<' {
                self.emit_buf();
                self.tag.push(b);
            } else {
                self.buf.push(b);
            }
        }
        self.emit_buf();
        Ok(())
    }

    fn end(&mut self) -> Result<(), EngineFault> {
        let tag = std::mem::take(&mut self.tag);
        self.buf.extend_from_slice(&tag);
        self.emit_buf();
        if self.sentinel_on_end {
            self.sink.handle_chunk(b"");
        }
        Ok(())
    }
}

impl RewriteEngine for TagRename {
    type Error = EngineFault;
    type Session<S: OutputSink> = TagRenameSession<S>;

    fn new_session<S: OutputSink>(&self, sink: S) -> Result<TagRenameSession<S>, EngineFault> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(TagRenameSession {
            sink,
            from: self.from,
            to: self.to,
            sentinel_on_end: self.sentinel_on_end,
            tag: Vec::new(),
            buf: Vec::new(),
        })
    }

    fn transform_full(&self, input: &str) -> Result<String, EngineFault> {
        let mut out = Vec::new();
        {
            let mut session = TagRenameSession {
                sink: |chunk: &[u8]| out.extend_from_slice(chunk),
                from: self.from,
                to: self.to,
                sentinel_on_end: false,
                tag: Vec::new(),
                buf: Vec::new(),
            };
            session.write(input.as_bytes())?;
            session.end()?;
        }
        String::from_utf8(out).map_err(|_| EngineFault("non-utf8 output"))
    }
}

/// Engine driven by a script: write call `i` emits `bursts[i]` (an empty string is the
/// sentinel), `end` emits `on_end`. With `hold_input`, every written byte is kept and emitted
/// ahead of `on_end`.
#[derive(Clone, Default)]
pub struct Scripted {
    pub bursts: Vec<Vec<&'static str>>,
    pub on_end: Vec<&'static str>,
    pub hold_input: bool,
    pub fail_on_write: Option<usize>,
    pub fail_on_end: bool,
    pub fail_on_new_session: bool,
    pub fail_on_full: bool,
}

pub struct ScriptedSession<S> {
    sink: S,
    script: Scripted,
    writes: usize,
    held: Vec<u8>,
}

impl<S: OutputSink> RewriteSession for ScriptedSession<S> {
    type Error = EngineFault;

    fn write(&mut self, chunk: &[u8]) -> Result<(), EngineFault> {
        let index = self.writes;
        self.writes += 1;
        if self.script.fail_on_write == Some(index) {
            return Err(EngineFault("write"));
        }
        if self.script.hold_input {
            self.held.extend_from_slice(chunk);
        }
        if let Some(burst) = self.script.bursts.get(index) {
            for out in burst {
                self.sink.handle_chunk(out.as_bytes());
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), EngineFault> {
        if self.script.fail_on_end {
            return Err(EngineFault("end"));
        }
        if !self.held.is_empty() {
            self.sink.handle_chunk(&self.held);
        }
        for out in &self.script.on_end {
            self.sink.handle_chunk(out.as_bytes());
        }
        Ok(())
    }
}

impl RewriteEngine for Scripted {
    type Error = EngineFault;
    type Session<S: OutputSink> = ScriptedSession<S>;

    fn new_session<S: OutputSink>(&self, sink: S) -> Result<ScriptedSession<S>, EngineFault> {
        if self.fail_on_new_session {
            return Err(EngineFault("new_session"));
        }
        Ok(ScriptedSession {
            sink,
            script: self.clone(),
            writes: 0,
            held: Vec::new(),
        })
    }

    fn transform_full(&self, input: &str) -> Result<String, EngineFault> {
        if self.fail_on_full {
            return Err(EngineFault("full"));
        }
        Ok(input.to_string())
    }
}

/// Upstream body that counts how often it was polled.
pub struct CountingUpstream {
    items: std::vec::IntoIter<Result<Bytes, BoxError>>,
    polls: Arc<AtomicUsize>,
}

impl CountingUpstream {
    pub fn new(items: Vec<Result<Bytes, BoxError>>) -> (Self, Arc<AtomicUsize>) {
        let polls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                items: items.into_iter(),
                polls: Arc::clone(&polls),
            },
            polls,
        )
    }
}

impl Stream for CountingUpstream {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(self.items.next())
    }
}

pub fn ok_chunks<I, T>(chunks: I) -> Vec<Result<Bytes, BoxError>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    chunks
        .into_iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_ref())))
        .collect()
}

pub fn upstream_error(msg: &'static str) -> Result<Bytes, BoxError> {
    Err(msg.into())
}

/// Drive a [`StreamAdapter`] synchronously and concatenate everything it produced.
pub fn run_adapter<E: RewriteEngine>(engine: &E, chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut adapter = StreamAdapter::new(engine).unwrap();
    let mut out = Vec::new();
    for chunk in chunks {
        for c in adapter.submit(chunk).unwrap() {
            out.extend_from_slice(&c);
        }
    }
    for c in adapter.finish().unwrap() {
        out.extend_from_slice(&c);
    }
    out
}

pub fn chunk_whole(text: &str) -> Vec<Vec<u8>> {
    vec![text.as_bytes().to_vec()]
}

pub fn chunk_bytes(text: &str) -> Vec<Vec<u8>> {
    text.bytes().map(|b| vec![b]).collect()
}

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in s.as_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

pub fn chunk_pseudo_random(
    text: &str,
    seed_label: &str,
    trial: u64,
    max_bytes: usize,
) -> Vec<Vec<u8>> {
    assert!(max_bytes > 0);
    let mut state = fnv1a64(seed_label) ^ (trial.wrapping_mul(0x9e3779b97f4a7c15)) | 1;
    let bytes = text.as_bytes();

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < bytes.len() {
        let want = (xorshift64(&mut state) as usize % max_bytes) + 1;
        let end = (start + want).min(bytes.len());
        out.push(bytes[start..end].to_vec());
        start = end;
    }
    out
}
