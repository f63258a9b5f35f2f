// crates/rtemsg-core/src/loader.rs
//
// Translate the binary data file into a linear word stream. Post-mortem
// data is linearized from the circular buffer (oldest data first),
// single-shot data is truncated at the last written index, and the
// streaming modes keep the file handle around and slide a window over it.

use std::io::{Read, Seek, SeekFrom};

use crate::codes::ErrorCode;
use crate::config::{MAX_BUFFER_WORDS, STREAM_CHUNK_WORDS};
use crate::error::{Result, RteError};
use crate::header::{HeaderInfo, LoggingMode, RtedbgHeader, HEADER_SIZE};

pub const SENTINEL: u32 = 0xFFFF_FFFF;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Non-fatal problems found while loading; the caller logs them once the
/// output files exist.
pub type LoadProblems = Vec<(ErrorCode, Vec<String>)>;

/// The linearized word stream consumed by the reassembler. For the
/// streaming modes the source stays open and `refill` slides the window.
pub struct WordStream {
    pub buffer: Vec<u32>,
    /// Next word to consume.
    pub index: usize,
    /// Number of valid words in `buffer`.
    pub in_size: usize,
    /// Words consumed and dropped by earlier window moves.
    pub already_processed: u64,
    pub complete_file_loaded: bool,
    source: Option<Box<dyn ReadSeek>>,
}

impl WordStream {
    /// A fully loaded in-memory stream (tests and the non-streaming modes).
    pub fn from_words(words: Vec<u32>) -> Self {
        let in_size = words.len();
        WordStream {
            buffer: words,
            index: 0,
            in_size,
            already_processed: 0,
            complete_file_loaded: true,
            source: None,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.in_size - self.index
    }

    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.buffer[index]
    }

    /// Overall stream position of a buffer index (for debug reports).
    pub fn stream_position(&self, index: usize) -> u64 {
        self.already_processed + index as u64
    }

    /// Move the unconsumed tail to the front and append new data from the
    /// source. Sets `complete_file_loaded` once the source is drained.
    pub fn refill(&mut self, problems: &mut LoadProblems) {
        if self.complete_file_loaded {
            return;
        }

        let remaining = self.in_size - self.index;
        self.buffer.copy_within(self.index..self.in_size, 0);
        self.already_processed += self.index as u64;
        self.index = 0;
        self.in_size = remaining;

        let space = STREAM_CHUNK_WORDS - remaining;
        if space == 0 {
            return;
        }

        self.buffer.resize(remaining + space, SENTINEL);
        let Some(source) = self.source.as_mut() else {
            self.complete_file_loaded = true;
            return;
        };

        let read = read_words(source.as_mut(), &mut self.buffer[remaining..remaining + space]);
        if read < space {
            self.complete_file_loaded = true;
        }
        if read == 0 && remaining == 0 {
            problems.push((ErrorCode::ReadBinFileProblem, vec!["0".to_owned()]));
        }

        self.in_size = remaining + read;
        self.buffer.truncate(self.in_size);
    }
}

/// Read 32-bit little-endian words; trailing partial bytes are dropped.
fn read_words(source: &mut dyn ReadSeek, out: &mut [u32]) -> usize {
    let mut bytes = vec![0u8; out.len() * 4];
    let mut filled = 0usize;

    while filled < bytes.len() {
        match source.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }

    let words = filled / 4;
    for (i, chunk) in bytes[..words * 4].chunks_exact(4).enumerate() {
        out[i] = u32::from_le_bytes(chunk.try_into().unwrap());
    }

    words
}

/// Load the data words of the binary file according to the logging mode.
/// `file_size` is the total file size in bytes (header included).
pub fn load_binary(
    mut source: Box<dyn ReadSeek>,
    file_size: u64,
    header: &RtedbgHeader,
    hdr: &HeaderInfo,
    problems: &mut LoadProblems,
) -> Result<WordStream> {
    let mut size = file_size;

    if size % 4 != 0 {
        problems.push((ErrorCode::BinFileSizeNotDivisibleBy4, vec![]));
        size &= !3;
    }

    let data_size = size.saturating_sub(HEADER_SIZE as u64);

    match header.logging_mode() {
        LoggingMode::PostMortem => {
            let stream = if header.last_index > header.buffer_size {
                problems.push((
                    ErrorCode::IndexInCircularBufferOutOfRange,
                    vec![header.last_index.to_string()],
                ));
                load_single_shot(&mut source, data_size, header, problems)?
            } else if data_size < header.buffer_size as u64 * 4 {
                // A deliberately shortened snapshot decodes linearly.
                load_single_shot(&mut source, data_size, header, problems)?
            } else {
                load_post_mortem(&mut source, data_size, header, hdr, problems)?
            };
            Ok(stream)
        }

        LoggingMode::SingleShot => {
            let mut stream = load_single_shot(&mut source, data_size, header, problems)?;
            if stream.in_size > header.last_index as usize {
                stream.in_size = header.last_index as usize;
                stream.index = stream.index.min(stream.in_size);
            }
            Ok(stream)
        }

        LoggingMode::Streaming | LoggingMode::MultipleCapture => {
            load_streaming(source, data_size, header, problems)
        }

        LoggingMode::Unknown => Err(RteError::fatal(
            ErrorCode::FatalUnknownLoggingMode,
            format!("buffer_size = 0x{:08X}", header.buffer_size),
        )),
    }
}

/// Validate the file size against the expected buffer size and adjust.
/// Returns (buffer_size_words, size_changed, last_index).
fn check_data_size(
    data_size: u64,
    header: &RtedbgHeader,
    problems: &mut LoadProblems,
) -> Result<(u32, bool, u32)> {
    let mut buffer_size = header.buffer_size;
    let mut changed = false;

    if buffer_size == 0 {
        return Err(RteError::fatal(ErrorCode::FatalBufferSizeInHeaderIsZero, ""));
    }

    let expected_bytes = buffer_size as u64 * 4;

    if data_size > expected_bytes {
        problems.push((
            ErrorCode::BinFileContainsTooMuchData,
            vec![buffer_size.to_string()],
        ));
        buffer_size = (data_size / 4) as u32;
        changed = true;
    } else if data_size < expected_bytes {
        problems.push((
            ErrorCode::NotEnoughDataInBinFile,
            vec![buffer_size.to_string()],
        ));
        buffer_size = (data_size / 4) as u32;
        changed = true;
    }

    if buffer_size > MAX_BUFFER_WORDS {
        buffer_size = MAX_BUFFER_WORDS;
        changed = true;
        problems.push((
            ErrorCode::MessageFileSizeTruncated,
            vec![(MAX_BUFFER_WORDS as u64 * 4).to_string()],
        ));
    }

    let mut last_index = header.last_index;
    if last_index >= buffer_size {
        last_index = buffer_size;
        problems.push((
            ErrorCode::IndexInCircularBufferOutOfRange,
            vec![header.last_index.to_string()],
        ));
    }

    Ok((buffer_size, changed, last_index))
}

fn load_single_shot(
    source: &mut Box<dyn ReadSeek>,
    data_size: u64,
    header: &RtedbgHeader,
    problems: &mut LoadProblems,
) -> Result<WordStream> {
    if header.last_index == 0 && header.single_shot_active() {
        return Err(RteError::fatal(ErrorCode::FatalSingleShotAndIndexIsZero, ""));
    }

    let (buffer_size, _, _) = check_data_size(data_size, header, problems)?;

    source.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
    let mut buffer = vec![SENTINEL; buffer_size as usize];
    let words_read = read_words(source.as_mut(), &mut buffer);
    buffer.truncate(words_read);

    // Skip the leading words that were never written.
    let index = buffer.iter().position(|&w| w != SENTINEL).unwrap_or(words_read);

    let mut stream = WordStream::from_words(buffer);
    stream.index = index;
    Ok(stream)
}

/// Count sentinel words at the end of the circular buffer. The embedded
/// logger reserves a four-word trailer when limiting the write index, so
/// up to four words before the physical end never carry a full message.
fn trailing_guard_words(buffer: &[u32]) -> usize {
    let size = buffer.len();
    if size < 5 {
        return 0;
    }

    if buffer[size - 5] == SENTINEL {
        return 4;
    }

    for i in size - 5..size {
        if buffer[i] & 1 != 0 {
            return size - i - 1;
        }
    }

    0
}

fn load_post_mortem(
    source: &mut Box<dyn ReadSeek>,
    data_size: u64,
    header: &RtedbgHeader,
    hdr: &HeaderInfo,
    problems: &mut LoadProblems,
) -> Result<WordStream> {
    let (mut buffer_size, mut changed, last_index) = check_data_size(data_size, header, problems)?;
    let last_index = last_index as usize;

    source.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
    let mut circular = vec![SENTINEL; buffer_size as usize];
    let words_read = read_words(source.as_mut(), &mut circular);

    if words_read != buffer_size as usize {
        problems.push((ErrorCode::ReadBinFileProblem, vec![words_read.to_string()]));
        buffer_size = words_read as u32;
        changed = true;
        circular.truncate(words_read);

        if last_index > words_read {
            return Ok(WordStream::from_words(circular));
        }
    }

    let empty_at_start = circular[..last_index]
        .iter()
        .take_while(|&&w| w == SENTINEL)
        .count();

    // Buffer never wrapped: only the data before last_index is live.
    if circular[last_index..].iter().all(|&w| w == SENTINEL) {
        circular.truncate(last_index);
        let mut stream = WordStream::from_words(circular);
        stream.index = empty_at_start;
        return Ok(stream);
    }

    let mut skip_at_end = trailing_guard_words(&circular);
    let mut skip_at_start = 0usize;

    if changed {
        skip_at_end = 0;
    } else if hdr.buffer_size_is_power_of_2 && buffer_size > 8 {
        // The power-of-two index limiting always drops four words; the
        // words not dropped at the end are dropped at the start.
        skip_at_start = 4 - skip_at_end;
    }

    // Oldest data (after last_index) first, then the newer data.
    let part1 = &circular[last_index..circular.len() - skip_at_end];
    let part2 = &circular[skip_at_start.min(last_index)..last_index];

    let mut joined = Vec::with_capacity(part1.len() + part2.len());
    joined.extend_from_slice(part1);
    joined.extend_from_slice(part2);

    let index = joined[..part1.len()]
        .iter()
        .take_while(|&&w| w == SENTINEL)
        .count();

    let mut stream = WordStream::from_words(joined);
    stream.index = index;
    Ok(stream)
}

fn load_streaming(
    source: Box<dyn ReadSeek>,
    data_size: u64,
    header: &RtedbgHeader,
    problems: &mut LoadProblems,
) -> Result<WordStream> {
    if data_size < 4 {
        return Err(RteError::fatal(ErrorCode::FatalNoBinData, ""));
    }

    if header.last_index != 0 {
        problems.push((
            ErrorCode::IndexShouldBeZero,
            vec![header.last_index.to_string()],
        ));
    }

    let mut stream = WordStream {
        buffer: Vec::new(),
        index: 0,
        in_size: 0,
        already_processed: 0,
        complete_file_loaded: false,
        source: Some(source),
    };

    if let Some(s) = stream.source.as_mut() {
        let _ = s.seek(SeekFrom::Start(HEADER_SIZE as u64));
    }

    stream.refill(problems);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{encode_header, pack_cfg};
    use std::io::Cursor;

    fn file_bytes(header: &RtedbgHeader, words: &[u32]) -> Vec<u8> {
        let mut out = encode_header(header).to_vec();
        for w in words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }

    fn post_mortem_header(buffer_size: u32, last_index: u32, pow2: bool) -> RtedbgHeader {
        RtedbgHeader {
            last_index,
            rte_cfg: pack_cfg(false, false, false, false, 1, 9, 4, pow2),
            timestamp_frequency: 1_000_000,
            buffer_size,
            ..Default::default()
        }
    }

    fn load(header: &RtedbgHeader, words: &[u32]) -> (WordStream, LoadProblems) {
        let hdr = header.unpack(9).unwrap();
        let bytes = file_bytes(header, words);
        let size = bytes.len() as u64;
        let mut problems = Vec::new();
        let stream =
            load_binary(Box::new(Cursor::new(bytes)), size, header, &hdr, &mut problems).unwrap();
        (stream, problems)
    }

    #[test]
    fn unwrapped_buffer_loads_linearly() {
        // Words after last_index still hold the erased pattern.
        let header = post_mortem_header(8, 3, false);
        let words = [0x11, 0x21, 0x31, SENTINEL, SENTINEL, SENTINEL, SENTINEL, SENTINEL];
        let (stream, _) = load(&header, &words);

        assert_eq!(stream.index, 0);
        assert_eq!(&stream.buffer[..stream.in_size], &[0x11, 0x21, 0x31]);
    }

    #[test]
    fn wrapped_buffer_starts_at_last_index() {
        let header = post_mortem_header(8, 3, false);
        let words = [0x11, 0x21, 0x31, 0x41, 0x51, 0x61, 0x71, 0x81];
        let (stream, _) = load(&header, &words);

        // Oldest data first: [3..8) then [0..3).
        assert_eq!(
            &stream.buffer[..],
            &[0x41, 0x51, 0x61, 0x71, 0x81, 0x11, 0x21, 0x31]
        );
    }

    #[test]
    fn pow2_buffer_drops_four_guard_words() {
        let header = post_mortem_header(16, 4, true);
        let mut words = [0u32; 16];
        for (i, w) in words.iter_mut().enumerate() {
            *w = ((i as u32) << 8) | 1; // all FMT words
        }
        let (stream, _) = load(&header, &words);

        // Guard scan finds a FMT word at size-5, so 4 words are skipped at
        // the end and none at the start: [4..12) then [0..4).
        assert_eq!(stream.in_size, 12);
        assert_eq!(stream.buffer[0], words[4]);
        assert_eq!(stream.buffer[7], words[11]);
        assert_eq!(stream.buffer[8], words[0]);
    }

    #[test]
    fn single_shot_truncates_at_last_index() {
        let mut header = post_mortem_header(8, 2, false);
        header.rte_cfg = pack_cfg(true, false, true, false, 1, 9, 4, false);
        let words = [0x11, 0x21, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99];
        let (stream, _) = load(&header, &words);

        assert_eq!(stream.in_size, 2);
        assert_eq!(&stream.buffer[..2], &[0x11, 0x21]);
    }

    #[test]
    fn file_size_mismatch_is_reported() {
        let header = post_mortem_header(16, 0, false);
        let words = [0x11u32, 0x21, 0x31, 0x41];
        let (_, problems) = load(&header, &words);
        assert!(problems
            .iter()
            .any(|(code, _)| *code == ErrorCode::NotEnoughDataInBinFile));
    }
}
