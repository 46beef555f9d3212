//! Line framing for engine output.

use std::io;
use tokio::io::AsyncRead;
use tokio_stream::{Stream, StreamExt};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead};

/// Splits engine output into lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped so Windows builds of an engine
/// produce the same lines. Bytes that are not valid UTF-8 are replaced rather
/// than failing the stream, and an unterminated last line is still emitted at
/// end-of-stream.
#[derive(Debug, Default, Clone)]
pub struct EngineLineCodec {
    // Where to resume the newline search so partial reads are not rescanned
    next_index: usize,
}

impl EngineLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for EngineLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src[self.next_index..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = src.split_to(end + 1);
                Ok(Some(decode_line(&line[..end])))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.next_index = 0;
        let rest = src.split_to(src.len());
        Ok(Some(decode_line(&rest)))
    }
}

/// Frame a single reader into a stream of lines
pub fn lines<R: AsyncRead>(io: R) -> FramedRead<R, EngineLineCodec> {
    FramedRead::with_capacity(io, EngineLineCodec::new(), 1024)
}

/// Combine stdout and stderr into one line stream.
///
/// Each source keeps its own order; the stream ends once both sources have ended.
pub fn merged_lines<O, E>(
    stdout: O,
    stderr: E,
) -> impl Stream<Item = io::Result<String>> + Send + Unpin + 'static
where
    O: AsyncRead + Send + Unpin + 'static,
    E: AsyncRead + Send + Unpin + 'static,
{
    lines(stdout).merge(lines(stderr))
}
