//! Forward-only streaming ZIP reader.
//!
//! Walks an archive from a plain byte stream using local file headers
//! only; the central directory at the tail is never required and never
//! seeked to. Members come out in archive-physical order, each as a lazy
//! sub-stream of decompressed bytes. CRC-32 is computed while
//! decompressing and checked against the local header or the trailing
//! data descriptor when a member closes.
//!
//! Supported: store (method 0), deflate (method 8), ZIP64 member sizes,
//! UTF-8 member names (general-purpose bit 11; anything else is decoded
//! as ISO-8859-1). Encrypted members, unknown compression methods, and
//! split archives are rejected.

use std::io::{self, Read};

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Error, Result};

const LOCAL_FILE_HEADER: u32 = 0x0403_4b50;
const CENTRAL_DIR_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIR: u32 = 0x0606_4b50;
const ZIP64_END_LOCATOR: u32 = 0x0706_4b50;
const DIGITAL_SIGNATURE: u32 = 0x0505_4b50;
const DATA_DESCRIPTOR: u32 = 0x0807_4b50;
const SPANNED_MARKER: u32 = 0x3030_4b50;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8_NAME: u16 = 1 << 11;

const METHOD_STORE: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

const ZIP64_EXTRA_ID: u16 = 0x0001;

fn le16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Single refillable read buffer over the raw byte stream.
///
/// Decompression consumes exact byte counts from this buffer, so bytes
/// that belong to the next record are never lost to over-reading.
struct ChunkBuf<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
}

impl<R: Read> ChunkBuf<R> {
    fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(512)].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
        }
    }

    /// Return the buffered bytes, pulling one chunk from the transport
    /// if the buffer is empty. An empty slice means end of stream.
    fn fill(&mut self) -> Result<&[u8]> {
        if self.pos == self.len && !self.eof {
            self.pos = 0;
            self.len = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::from_io(e)),
                }
            };
            if self.len == 0 {
                self.eof = true;
            }
        }
        Ok(&self.buf[self.pos..self.len])
    }

    fn consume(&mut self, n: usize) {
        self.pos += n;
    }

    fn read_exact(&mut self, out: &mut [u8], what: &str) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let chunk = self.fill()?;
            if chunk.is_empty() {
                return Err(Error::UnexpectedEof(format!("truncated {what}")));
            }
            let n = (out.len() - filled).min(chunk.len());
            out[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.consume(n);
            filled += n;
        }
        Ok(())
    }

    /// Like `read_exact`, but a clean end of stream before the first
    /// byte returns `false` instead of an error.
    fn read_exact_or_eof(&mut self, out: &mut [u8], what: &str) -> Result<bool> {
        if self.fill()?.is_empty() {
            return Ok(false);
        }
        self.read_exact(out, what)?;
        Ok(true)
    }
}

struct EntryState {
    name: String,
    method: u16,
    has_descriptor: bool,
    zip64: bool,
    crc_expected: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    inflate: Option<Decompress>,
    raw_consumed: u64,
    produced: u64,
    hasher: crc32fast::Hasher,
    done: bool,
}

/// Streaming ZIP member iterator over any forward byte stream.
///
/// [`ZipStream::next_member`] yields members in archive order; a member
/// left unconsumed is drained automatically before the next one is
/// produced. For the common tail case of reading one member to the end
/// of the job, [`ZipStream::find_member`] converts the stream into an
/// owning [`MemberReader`].
pub struct ZipStream<R: Read> {
    input: ChunkBuf<R>,
    entry: Option<EntryState>,
    first_record: bool,
    finished: bool,
}

impl<R: Read> ZipStream<R> {
    /// Wrap a raw byte stream. `buffer_capacity` bounds the single read
    /// buffer this stream allocates.
    pub fn new(inner: R, buffer_capacity: usize) -> Self {
        Self {
            input: ChunkBuf::new(inner, buffer_capacity),
            entry: None,
            first_record: true,
            finished: false,
        }
    }

    /// Advance to the next member, draining whatever remains of the
    /// current one. Returns `None` once the member region of the
    /// archive ends (central directory or end of stream).
    pub fn next_member(&mut self) -> Result<Option<Member<'_, R>>> {
        self.drain_current()?;
        if !self.read_header()? {
            return Ok(None);
        }
        Ok(Some(Member { stream: self }))
    }

    /// Advance until a member named `target` is found and take ownership
    /// of the stream positioned at its data. Members before it are
    /// drained (their CRCs checked); members after it are left unread.
    pub fn find_member(mut self, target: &str) -> Result<Option<MemberReader<R>>> {
        loop {
            self.drain_current()?;
            if !self.read_header()? {
                return Ok(None);
            }
            let matched = self.entry.as_ref().is_some_and(|e| e.name == target);
            if matched {
                return Ok(Some(MemberReader { stream: self }));
            }
        }
    }

    fn drain_current(&mut self) -> Result<()> {
        if self.entry.as_ref().is_some_and(|e| !e.done) {
            let mut scratch = [0u8; 8192];
            while self.read_entry_data(&mut scratch)? > 0 {}
        }
        self.entry = None;
        Ok(())
    }

    fn read_header(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let mut sig = [0u8; 4];
        if !self.input.read_exact_or_eof(&mut sig, "record signature")? {
            self.finished = true;
            return Ok(false);
        }
        let signature = u32::from_le_bytes(sig);
        let first = self.first_record;
        self.first_record = false;
        match signature {
            LOCAL_FILE_HEADER => {}
            DATA_DESCRIPTOR | SPANNED_MARKER if first => return Err(Error::SplitArchive),
            CENTRAL_DIR_HEADER
            | END_OF_CENTRAL_DIR
            | ZIP64_END_OF_CENTRAL_DIR
            | ZIP64_END_LOCATOR
            | DIGITAL_SIGNATURE => {
                self.finished = true;
                return Ok(false);
            }
            other => {
                return Err(Error::UnexpectedEof(format!(
                    "unrecognized record signature {other:#010x}"
                )))
            }
        }

        let mut fixed = [0u8; 26];
        self.input.read_exact(&mut fixed, "local file header")?;
        let flags = le16(&fixed[2..]);
        let method = le16(&fixed[4..]);
        let crc = le32(&fixed[10..]);
        let raw_compressed = le32(&fixed[14..]);
        let raw_uncompressed = le32(&fixed[18..]);
        let name_len = le16(&fixed[22..]) as usize;
        let extra_len = le16(&fixed[24..]) as usize;

        let mut name_bytes = vec![0u8; name_len];
        self.input.read_exact(&mut name_bytes, "member name")?;
        let name = decode_name(&name_bytes, flags & FLAG_UTF8_NAME != 0);

        let mut extra = vec![0u8; extra_len];
        self.input.read_exact(&mut extra, "extra field")?;

        let mut compressed = raw_compressed as u64;
        let mut uncompressed = raw_uncompressed as u64;
        let zip64 = parse_zip64_extra(
            &extra,
            raw_uncompressed == u32::MAX,
            raw_compressed == u32::MAX,
            &mut uncompressed,
            &mut compressed,
        );

        if flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::EncryptedEntry(name));
        }
        if method != METHOD_STORE && method != METHOD_DEFLATE {
            return Err(Error::UnsupportedMethod {
                method,
                member: name,
            });
        }

        log::trace!("member {name:?} (method {method}, {compressed} bytes compressed)");

        self.entry = Some(EntryState {
            name,
            method,
            has_descriptor: flags & FLAG_DATA_DESCRIPTOR != 0,
            zip64,
            crc_expected: crc,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            inflate: (method == METHOD_DEFLATE).then(|| Decompress::new(false)),
            raw_consumed: 0,
            produced: 0,
            hasher: crc32fast::Hasher::new(),
            done: false,
        });
        Ok(true)
    }

    fn read_entry_data(&mut self, out: &mut [u8]) -> Result<usize> {
        let method = match &self.entry {
            Some(e) if !e.done && !out.is_empty() => e.method,
            _ => return Ok(0),
        };
        if method == METHOD_STORE {
            self.read_stored(out)
        } else {
            self.read_deflated(out)
        }
    }

    fn read_stored(&mut self, out: &mut [u8]) -> Result<usize> {
        let Some(entry) = self.entry.as_mut() else {
            return Ok(0);
        };
        let remaining = entry.compressed_size - entry.raw_consumed;
        if remaining == 0 {
            Self::finish_entry(&mut self.input, entry)?;
            return Ok(0);
        }
        let chunk = self.input.fill()?;
        if chunk.is_empty() {
            return Err(Error::UnexpectedEof(format!(
                "member {:?} truncated",
                entry.name
            )));
        }
        let n = out
            .len()
            .min(chunk.len())
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));
        out[..n].copy_from_slice(&chunk[..n]);
        self.input.consume(n);
        entry.hasher.update(&out[..n]);
        entry.raw_consumed += n as u64;
        entry.produced += n as u64;
        if entry.raw_consumed == entry.compressed_size {
            Self::finish_entry(&mut self.input, entry)?;
        }
        Ok(n)
    }

    fn read_deflated(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            let Some(entry) = self.entry.as_mut() else {
                return Ok(0);
            };
            let chunk = self.input.fill()?;
            let at_eof = chunk.is_empty();
            let Some(inflate) = entry.inflate.as_mut() else {
                return Ok(0);
            };
            let before_in = inflate.total_in();
            let before_out = inflate.total_out();
            let status = inflate
                .decompress(chunk, out, FlushDecompress::None)
                .map_err(|e| {
                    Error::UnexpectedEof(format!("invalid deflate data in {:?}: {e}", entry.name))
                })?;
            let consumed = (inflate.total_in() - before_in) as usize;
            let produced = (inflate.total_out() - before_out) as usize;
            self.input.consume(consumed);
            entry.hasher.update(&out[..produced]);
            entry.raw_consumed += consumed as u64;
            entry.produced += produced as u64;

            match status {
                Status::StreamEnd => {
                    Self::finish_entry(&mut self.input, entry)?;
                    return Ok(produced);
                }
                _ if produced > 0 => return Ok(produced),
                _ if at_eof => {
                    return Err(Error::UnexpectedEof(format!(
                        "member {:?} truncated",
                        entry.name
                    )))
                }
                Status::BufError if consumed == 0 => {
                    return Err(Error::UnexpectedEof(format!(
                        "deflate stream stalled in {:?}",
                        entry.name
                    )))
                }
                _ => continue,
            }
        }
    }

    /// Close out a fully-read member: read the trailing data descriptor
    /// if one was announced, then verify sizes and CRC-32.
    fn finish_entry(input: &mut ChunkBuf<R>, entry: &mut EntryState) -> Result<()> {
        if entry.has_descriptor {
            let (crc, compressed, uncompressed) = Self::read_descriptor(input, entry.zip64)?;
            entry.crc_expected = crc;
            entry.compressed_size = compressed;
            entry.uncompressed_size = uncompressed;
        }
        if entry.raw_consumed != entry.compressed_size
            || entry.produced != entry.uncompressed_size
        {
            // A stored member whose real length only lives in its data
            // descriptor cannot be delimited in a forward stream.
            if entry.method == METHOD_STORE && entry.has_descriptor && entry.raw_consumed == 0 {
                return Err(Error::UnsupportedMethod {
                    method: METHOD_STORE,
                    member: entry.name.clone(),
                });
            }
            return Err(Error::UnexpectedEof(format!(
                "member {:?} size mismatch",
                entry.name
            )));
        }
        let actual = std::mem::take(&mut entry.hasher).finalize();
        if actual != entry.crc_expected {
            return Err(Error::CrcMismatch(entry.name.clone()));
        }
        entry.done = true;
        Ok(())
    }

    fn read_descriptor(input: &mut ChunkBuf<R>, zip64: bool) -> Result<(u32, u64, u64)> {
        let mut word = [0u8; 4];
        input.read_exact(&mut word, "data descriptor")?;
        let mut crc = u32::from_le_bytes(word);
        // The descriptor signature is optional; without it the first
        // word is already the CRC.
        if crc == DATA_DESCRIPTOR {
            input.read_exact(&mut word, "data descriptor")?;
            crc = u32::from_le_bytes(word);
        }
        let (compressed, uncompressed) = if zip64 {
            let mut quad = [0u8; 8];
            input.read_exact(&mut quad, "data descriptor")?;
            let c = u64::from_le_bytes(quad);
            input.read_exact(&mut quad, "data descriptor")?;
            (c, u64::from_le_bytes(quad))
        } else {
            input.read_exact(&mut word, "data descriptor")?;
            let c = u32::from_le_bytes(word) as u64;
            input.read_exact(&mut word, "data descriptor")?;
            (c, u32::from_le_bytes(word) as u64)
        };
        Ok((crc, compressed, uncompressed))
    }
}

/// One archive member, borrowed from a [`ZipStream`].
///
/// Reading yields decompressed bytes; dropping it without reading to the
/// end is fine, the stream drains the remainder before the next member.
pub struct Member<'a, R: Read> {
    stream: &'a mut ZipStream<R>,
}

impl<R: Read> Member<'_, R> {
    /// Member path within the archive.
    pub fn name(&self) -> &str {
        self.stream
            .entry
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or("")
    }
}

impl<R: Read> Read for Member<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read_entry_data(buf).map_err(Error::into_io)
    }
}

/// One archive member that owns the underlying [`ZipStream`].
///
/// Produced by [`ZipStream::find_member`] for the final member a pass
/// cares about; everything after it in the archive is left unread.
pub struct MemberReader<R: Read> {
    stream: ZipStream<R>,
}

impl<R: Read> MemberReader<R> {
    /// Member path within the archive.
    pub fn name(&self) -> &str {
        self.stream
            .entry
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or("")
    }
}

impl<R: Read> Read for MemberReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read_entry_data(buf).map_err(Error::into_io)
    }
}

fn decode_name(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        // Historical OEM names are matched as ISO-8859-1: every byte
        // maps to the code point of the same value.
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Pull 64-bit sizes out of a ZIP64 extended-information extra field.
/// Fields are present only for the header values that overflowed to
/// `0xFFFFFFFF`, uncompressed size first.
fn parse_zip64_extra(
    extra: &[u8],
    need_uncompressed: bool,
    need_compressed: bool,
    uncompressed: &mut u64,
    compressed: &mut u64,
) -> bool {
    let mut rest = extra;
    let mut saw = false;
    while rest.len() >= 4 {
        let id = le16(rest);
        let len = le16(&rest[2..]) as usize;
        let Some(data) = rest.get(4..4 + len) else {
            break;
        };
        if id == ZIP64_EXTRA_ID {
            saw = true;
            let mut fields = data;
            if need_uncompressed && fields.len() >= 8 {
                *uncompressed = le64(fields);
                fields = &fields[8..];
            }
            if need_compressed && fields.len() >= 8 {
                *compressed = le64(fields);
            }
        }
        rest = &rest[4 + len..];
    }
    saw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Hand-build one local-file record so header fields can be bent in
    /// ways the zip crate will not produce.
    fn raw_member(
        name: &[u8],
        flags: u16,
        method: u16,
        crc: u32,
        payload: &[u8],
        sizes: (u32, u32),
        extra: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LOCAL_FILE_HEADER.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&sizes.0.to_le_bytes());
        out.extend_from_slice(&sizes.1.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(extra);
        out.extend_from_slice(payload);
        out
    }

    fn build_with_zip_crate(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data, stored) in entries {
            let method = if *stored {
                zip::CompressionMethod::Stored
            } else {
                zip::CompressionMethod::Deflated
            };
            let options =
                zip::write::SimpleFileOptions::default().compression_method(method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        buffer
    }

    fn read_all<R: Read>(member: &mut Member<'_, R>) -> Vec<u8> {
        let mut out = Vec::new();
        member.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn iterates_members_in_archive_order() {
        let bytes = build_with_zip_crate(&[
            ("first.txt", b"hello".as_slice(), true),
            ("second.txt", b"streaming world".as_slice(), false),
        ]);
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);

        let mut member = zip.next_member().unwrap().unwrap();
        assert_eq!(member.name(), "first.txt");
        assert_eq!(read_all(&mut member), b"hello");

        let mut member = zip.next_member().unwrap().unwrap();
        assert_eq!(member.name(), "second.txt");
        assert_eq!(read_all(&mut member), b"streaming world");

        assert!(zip.next_member().unwrap().is_none());
    }

    #[test]
    fn drains_unconsumed_member() {
        let bytes = build_with_zip_crate(&[
            ("skipped.bin", &[7u8; 20_000], false),
            ("wanted.txt", b"payload".as_slice(), false),
        ]);
        let mut zip = ZipStream::new(Cursor::new(bytes), 1024);

        let member = zip.next_member().unwrap().unwrap();
        assert_eq!(member.name(), "skipped.bin");
        drop(member);

        let mut member = zip.next_member().unwrap().unwrap();
        assert_eq!(member.name(), "wanted.txt");
        assert_eq!(read_all(&mut member), b"payload");
    }

    #[test]
    fn find_member_skips_ahead_and_owns_the_stream() {
        let bytes = build_with_zip_crate(&[
            ("a.xml", b"<a/>".as_slice(), false),
            ("b.xml", b"<b/>".as_slice(), false),
            ("c.xml", b"<c/>".as_slice(), false),
        ]);
        let zip = ZipStream::new(Cursor::new(bytes), 4096);
        let mut member = zip.find_member("b.xml").unwrap().unwrap();
        assert_eq!(member.name(), "b.xml");
        let mut out = Vec::new();
        member.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"<b/>");
    }

    #[test]
    fn find_member_missing_returns_none() {
        let bytes = build_with_zip_crate(&[("a.xml", b"<a/>".as_slice(), false)]);
        let zip = ZipStream::new(Cursor::new(bytes), 4096);
        assert!(zip.find_member("nope.xml").unwrap().is_none());
    }

    #[test]
    fn detects_crc_mismatch() {
        let payload = b"corrupt me";
        let bytes = raw_member(
            b"bad.txt",
            0,
            METHOD_STORE,
            crc32fast::hash(payload) ^ 1,
            payload,
            (payload.len() as u32, payload.len() as u32),
            &[],
        );
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        let mut member = zip.next_member().unwrap().unwrap();
        let mut out = Vec::new();
        let err = member.read_to_end(&mut out).unwrap_err();
        match Error::from_io(err) {
            Error::CrcMismatch(name) => assert_eq!(name, "bad.txt"),
            other => panic!("expected CrcMismatch, got {other:?}"),
        }
    }

    #[test]
    fn detects_truncated_stream() {
        // Poorly compressible payload, so the cut lands inside member data.
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i.wrapping_mul(31) % 251) as u8).collect();
        let mut bytes = build_with_zip_crate(&[("cut.bin", &payload, false)]);
        bytes.truncate(bytes.len() / 4);
        let mut zip = ZipStream::new(Cursor::new(bytes), 1024);
        let mut member = zip.next_member().unwrap().unwrap();
        let mut out = Vec::new();
        let err = member.read_to_end(&mut out).unwrap_err();
        match Error::from_io(err) {
            Error::UnexpectedEof(_) => {}
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn rejects_encrypted_member() {
        let bytes = raw_member(b"secret.txt", FLAG_ENCRYPTED, METHOD_STORE, 0, b"", (0, 0), &[]);
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        match zip.next_member() {
            Err(Error::EncryptedEntry(name)) => assert_eq!(name, "secret.txt"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected EncryptedEntry"),
        }
    }

    #[test]
    fn rejects_unknown_method() {
        let bytes = raw_member(b"lzma.txt", 0, 14, 0, b"", (0, 0), &[]);
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        match zip.next_member() {
            Err(Error::UnsupportedMethod { method: 14, .. }) => {}
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected UnsupportedMethod"),
        }
    }

    #[test]
    fn rejects_split_archive_marker() {
        let mut bytes = SPANNED_MARKER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        match zip.next_member() {
            Err(Error::SplitArchive) => {}
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected SplitArchive"),
        }
    }

    #[test]
    fn reads_deflated_member_with_data_descriptor() {
        let payload = b"descriptor delimited payload, repeated a few times to compress";
        let compressed = deflate(payload);
        let mut bytes = raw_member(
            b"streamed.txt",
            FLAG_DATA_DESCRIPTOR,
            METHOD_DEFLATE,
            0,
            &compressed,
            (0, 0),
            &[],
        );
        bytes.extend_from_slice(&DATA_DESCRIPTOR.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());

        let mut zip = ZipStream::new(Cursor::new(bytes), 512);
        let mut member = zip.next_member().unwrap().unwrap();
        assert_eq!(read_all(&mut member), payload);
    }

    #[test]
    fn reads_zip64_sizes_from_extra_field() {
        let payload = b"zip64 sized member";
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        extra.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        let bytes = raw_member(
            b"big.bin",
            0,
            METHOD_STORE,
            crc32fast::hash(payload),
            payload,
            (u32::MAX, u32::MAX),
            &extra,
        );
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        let mut member = zip.next_member().unwrap().unwrap();
        assert_eq!(read_all(&mut member), payload);
    }

    #[test]
    fn decodes_legacy_member_names_as_latin1() {
        let payload = b"x";
        let bytes = raw_member(
            &[b'r', 0xE9, b's', b'.', b't', b'x', b't'],
            0,
            METHOD_STORE,
            crc32fast::hash(payload),
            payload,
            (1, 1),
            &[],
        );
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        let member = zip.next_member().unwrap().unwrap();
        assert_eq!(member.name(), "rés.txt");
    }

    #[test]
    fn stops_at_central_directory() {
        let mut bytes = build_with_zip_crate(&[("only.txt", b"data".as_slice(), true)]);
        // Clean EOF straight after the member region also terminates.
        let cut = bytes
            .windows(4)
            .position(|w| w == CENTRAL_DIR_HEADER.to_le_bytes())
            .unwrap();
        bytes.truncate(cut + 4);
        let mut zip = ZipStream::new(Cursor::new(bytes), 4096);
        let mut member = zip.next_member().unwrap().unwrap();
        read_all(&mut member);
        assert!(zip.next_member().unwrap().is_none());
    }
}
