// crates/rtemsg-core/src/reassemble.rs
//
// Reassembly of logged messages from the raw word stream. A subpacket is
// up to four DATA words terminated by one FMT word; longer messages are
// runs of subpackets sharing the same (format ID, timestamp) tag. Every
// DATA word carries its payload shifted left by one (bit 0 is the role
// tag) with the payload's top bit packed into the low bits of the format
// ID, MSB first across the packet.

use crate::config::{MAX_FMT_IDS, MAX_RAW_DATA_SIZE};
use crate::descriptor::{DescriptorTable, MsgKind};
use crate::header::HeaderInfo;
use crate::loader::{WordStream, SENTINEL};

/// Result of one assembly attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A message (possibly with an unknown format ID) was assembled.
    DataFound,
    /// DATA words without a matching FMT word were skipped.
    BadBlock,
    /// A run of erased (sentinel) words was skipped.
    UnfinishedBlock,
    /// The message exceeded 4 * max_subpackets data words.
    MessageTooLong,
    EndOfBuffer,
}

/// The message currently being assembled plus its per-message error
/// counters. Reused across messages to avoid reallocation.
#[derive(Default)]
pub struct CurrentMessage {
    pub fmt_id: u32,
    /// Normalized low timestamp: (FMT word & !1) << fmt_id_bits.
    pub timestamp_low: u32,
    /// Extended-data bits recovered from the format ID (EXT_MSG).
    pub additional_data: u32,
    /// Assembled DATA words (bit 31 restored).
    pub data: Vec<u32>,
    /// Message size in bytes, extended data included once prepared.
    pub asm_size: usize,
    /// Raw words of the most recent packet (error dumps).
    pub raw: Vec<u32>,
    pub bad_packet_words: u32,
    pub unfinished_words: u32,
}

impl CurrentMessage {
    pub fn asm_words(&self) -> usize {
        self.data.len()
    }

    /// Message bytes in logged order (little-endian words).
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 4 + 4);
        for w in &self.data {
            out.extend_from_slice(&w.to_le_bytes());
        }
        // Slack so the message always reads as a terminated string.
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }
}

/// Expected length of one subpacket (DATA words + the FMT word) for the
/// format ID, or None when no descriptor covers it. EXT_MSG descriptors
/// alias a range of IDs, so the lookup walks down to the range base.
fn packet_length(table: &DescriptorTable, fmt_id: u32) -> Option<u32> {
    if fmt_id as usize >= MAX_FMT_IDS {
        return None;
    }

    let mut id = fmt_id;
    let mut handle = table.handle_at(id);

    while handle.is_none() && id & 0xF != 0 {
        id -= 1;
        handle = table.handle_at(id);
    }

    let desc = table.by_handle(handle?);
    let mut len = desc.msg_len / 4;

    match desc.kind {
        MsgKind::Fixed => {}
        MsgKind::Extended => {
            if len > 0 {
                len -= 1; // one data element lives in the FMT word
            }
        }
        MsgKind::Variable => {
            if len == 0 || len > 4 {
                len = 4;
            }
        }
        MsgKind::SelfSized => len = 4,
    }

    Some(len + 1)
}

/// Check whether more subpackets may follow the one just consumed.
fn message_complete(
    table: &DescriptorTable,
    cur: &CurrentMessage,
    packet_words: usize,
) -> bool {
    if packet_words < 5 {
        // Only a full subpacket (4 DATA + FMT) can have a continuation.
        return true;
    }

    if let Some(desc) = table.descriptor(cur.fmt_id) {
        let mut length = desc.msg_len;

        if length == 0 {
            return false; // length unknown, keep collecting
        }

        if desc.kind == MsgKind::Extended && length >= 4 {
            // The extended byte is not assembled yet at this point.
            length -= 4;
        }

        if length as usize <= cur.asm_words() * 4 {
            return true;
        }
    }

    false
}

/// Scan ahead (without consuming) for a FMT word carrying the same tag.
/// The FMT word must appear within the next five words with no sentinel
/// in between.
fn next_packet_is_continuation(stream: &WordStream, hdr: &HeaderInfo, tag: u32) -> bool {
    let mut words = 0;

    for idx in stream.index..stream.in_size {
        words += 1;
        if words > 5 {
            return false;
        }

        let data = stream.word(idx);

        if data == SENTINEL {
            return false;
        }

        if data & 1 != 0 {
            return data & hdr.timestamp_and_index_mask == tag;
        }
    }

    false
}

fn skip_unfinished_words(stream: &mut WordStream) -> u32 {
    let mut count = 0;

    while stream.index < stream.in_size && stream.word(stream.index) == SENTINEL {
        count += 1;
        stream.index += 1;
    }

    count
}

/// Collect words up to the next FMT word into `cur.raw`.
fn find_fmt_word(
    stream: &mut WordStream,
    cur: &mut CurrentMessage,
    packet_words: &mut usize,
) -> Result<u32, Outcome> {
    loop {
        if *packet_words >= MAX_RAW_DATA_SIZE || stream.index >= stream.in_size {
            cur.bad_packet_words = *packet_words as u32;
            return Err(Outcome::BadBlock);
        }

        let data = stream.word(stream.index);

        if data == SENTINEL {
            if !cur.data.is_empty() {
                // A message is staged already; emit it and revisit this
                // packet on the next call. Whether it is complete shows
                // up during decoding.
                stream.index -= *packet_words;
                *packet_words = 0;
                return Err(Outcome::DataFound);
            } else if *packet_words > 0 {
                cur.bad_packet_words = *packet_words as u32;
                return Err(Outcome::BadBlock);
            } else {
                cur.unfinished_words = skip_unfinished_words(stream);
                return Err(Outcome::UnfinishedBlock);
            }
        }

        stream.index += 1;
        cur.raw.push(data);
        *packet_words += 1;

        if data & 1 != 0 {
            return Ok(data);
        }
    }
}

/// Decode one subpacket: unpack the FMT word, restore bit 31 of the DATA
/// words from the low format-ID bits and append the payload.
fn process_packet(
    stream: &mut WordStream,
    table: &DescriptorTable,
    hdr: &HeaderInfo,
    cur: &mut CurrentMessage,
    packet_words: usize,
    fmt_word: u32,
) -> Option<Outcome> {
    cur.fmt_id = fmt_word >> hdr.fmt_id_shift;
    cur.timestamp_low = (fmt_word & 0xFFFF_FFFE) << hdr.fmt_id_bits;

    let expected = packet_length(table, cur.fmt_id);

    if expected.is_none() && packet_words > 5 {
        // Treat the FMT word as the start of the next packet and drop the
        // DATA words before it.
        cur.bad_packet_words = packet_words as u32 - 1;
        stream.index -= 1;
        return Some(Outcome::BadBlock);
    }

    if let Some(expected) = expected {
        if packet_words as u32 > expected {
            // Skip the surplus words and process the remainder again.
            cur.bad_packet_words = packet_words as u32 - expected;
            stream.index -= expected as usize;
            return Some(Outcome::BadBlock);
        }
    }

    let mut additional_data = cur.fmt_id;
    let is_ext = table
        .descriptor(cur.fmt_id)
        .is_some_and(|d| d.kind == MsgKind::Extended);
    if !is_ext {
        additional_data &= 0x0F;
    }

    let data_words = packet_words - 1;
    let mut and_mask = u32::MAX;

    for n in (0..data_words).rev() {
        cur.raw[n] = (cur.raw[n] >> 1) | ((additional_data & 1) << 31);
        additional_data >>= 1;
        and_mask <<= 1;
    }

    cur.additional_data = additional_data;
    cur.fmt_id &= and_mask;

    cur.data.extend_from_slice(&cur.raw[..data_words]);

    if expected.is_none() {
        return Some(Outcome::DataFound); // unknown ID, reported downstream
    }

    if message_complete(table, cur, packet_words) {
        return Some(Outcome::DataFound);
    }

    None // the message continues in the next subpacket
}

/// Assemble the next message from the stream. `cur` is reset on entry;
/// its error counters survive for the caller to report and clear.
pub fn assemble_message(
    stream: &mut WordStream,
    table: &DescriptorTable,
    hdr: &HeaderInfo,
    cur: &mut CurrentMessage,
) -> Outcome {
    cur.data.clear();
    cur.asm_size = 0;
    cur.additional_data = 0;
    let mut packet_words = 0usize;

    while stream.index < stream.in_size {
        packet_words = 0;
        cur.raw.clear();

        let fmt_word = match find_fmt_word(stream, cur, &mut packet_words) {
            Ok(word) => word,
            Err(outcome) => return outcome,
        };

        let tag = fmt_word & hdr.timestamp_and_index_mask;

        if let Some(outcome) = process_packet(stream, table, hdr, cur, packet_words, fmt_word) {
            return outcome;
        }

        if !next_packet_is_continuation(stream, hdr, tag) {
            return Outcome::DataFound;
        }

        if cur.asm_words() >= 4 * hdr.max_msg_blocks as usize {
            return Outcome::MessageTooLong;
        }
    }

    // End of the stream: emit what is staged or classify the leftovers.
    if !cur.data.is_empty() && packet_words == 0 {
        return Outcome::DataFound;
    }

    if packet_words > 0 {
        cur.bad_packet_words = packet_words as u32;
        return Outcome::BadBlock;
    }

    Outcome::EndOfBuffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorTable, MessageDescriptor};
    use crate::header::{pack_cfg, RtedbgHeader};

    fn hdr9() -> HeaderInfo {
        let h = RtedbgHeader {
            rte_cfg: pack_cfg(false, false, false, false, 1, 9, 4, false),
            ..Default::default()
        };
        h.unpack(9).unwrap()
    }

    fn table_with(kind: MsgKind, msg_len: u32, ids: u32, start: u32) -> DescriptorTable {
        let mut t = DescriptorTable::new((1 << 9) - 2);
        t.set_start(start);
        let mut d = MessageDescriptor::new("TEST", kind);
        d.msg_len = msg_len;
        let h = t.register(d);
        assert_eq!(t.assign_fmt_id(ids, h), Some(start));
        t
    }

    /// FMT word for N=9: fmt_id in the top 9 bits, bit 0 set.
    fn fmt_word(fmt_id: u32, ts_low: u32) -> u32 {
        (fmt_id << 23) | (ts_low << 1) | 1
    }

    /// A DATA word carrying `payload` with a zero stolen bit.
    fn data_word(payload: u32) -> u32 {
        (payload << 1) & 0xFFFF_FFFE
    }

    #[test]
    fn single_packet_message() {
        let hdr = hdr9();
        let t = table_with(MsgKind::Fixed, 4, 2, 4);
        let mut s = WordStream::from_words(vec![data_word(0x123), fmt_word(4, 0x55)]);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.fmt_id, 4);
        assert_eq!(cur.data, vec![0x123]);
        assert_eq!(cur.timestamp_low, (0x55 << 1) << 9);
    }

    #[test]
    fn multi_subpacket_message_shares_the_tag() {
        let hdr = hdr9();
        let t = table_with(MsgKind::Variable, 8 * 4, 16, 16);

        let mut words = Vec::new();
        for p in 0..2 {
            for w in 0..4 {
                words.push(data_word(p * 4 + w));
            }
            words.push(fmt_word(16, 0x33));
        }

        let mut s = WordStream::from_words(words);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.asm_words(), 8);
        assert_eq!(cur.data, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn sentinel_run_reports_unfinished_block() {
        let hdr = hdr9();
        let t = table_with(MsgKind::Fixed, 0, 1, 4);
        let mut s = WordStream::from_words(vec![SENTINEL, SENTINEL, fmt_word(4, 1)]);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::UnfinishedBlock);
        assert_eq!(cur.unfinished_words, 2);

        cur.unfinished_words = 0;
        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.fmt_id, 4);
    }

    #[test]
    fn oversized_packet_is_a_bad_block() {
        let hdr = hdr9();
        // MSG0: expected packet length is exactly one FMT word.
        let t = table_with(MsgKind::Fixed, 0, 1, 4);
        let mut s = WordStream::from_words(vec![
            data_word(1),
            data_word(2),
            fmt_word(4, 1),
        ]);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::BadBlock);
        assert_eq!(cur.bad_packet_words, 2);

        // The FMT word itself is reprocessed as a valid empty message.
        cur.bad_packet_words = 0;
        cur.raw.clear();
        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.fmt_id, 4);
        assert_eq!(cur.asm_words(), 0);
    }

    #[test]
    fn ext_msg_recovers_stolen_bits() {
        let hdr = hdr9();
        // EXT_MSG1_3: one DATA word plus three extended bits, 16 IDs.
        let mut t = DescriptorTable::new((1 << 9) - 2);
        t.set_start(16);
        let mut d = MessageDescriptor::new("E", MsgKind::Extended);
        d.msg_len = 8;
        d.ext_data_mask = 0x7;
        let h = t.register(d);
        assert_eq!(t.assign_fmt_id(16, h), Some(16));

        // Payload 0x8000_0001 : bit 31 set. One data word steals one
        // format-ID bit; ext bits 0b101 stay below it.
        let payload: u32 = 0x8000_0001;
        let stolen_bit = payload >> 31;
        let ext_bits = 0b101u32;
        let fmt_id = 16 | (stolen_bit << 3) | ext_bits;

        let mut s = WordStream::from_words(vec![
            (payload << 1) & 0xFFFF_FFFE,
            fmt_word(fmt_id, 0x12),
        ]);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.data, vec![payload]);
        assert_eq!(cur.additional_data, ext_bits);
        // The stolen bit is masked off the format ID again.
        assert_eq!(cur.fmt_id & !0xF, 16);
    }

    #[test]
    fn partial_message_before_sentinel_is_emitted() {
        let hdr = hdr9();
        let t = table_with(MsgKind::Variable, 8 * 4, 16, 16);

        let mut words = Vec::new();
        for w in 0..4 {
            words.push(data_word(w));
        }
        words.push(fmt_word(16, 0x33));
        words.push(SENTINEL);

        let mut s = WordStream::from_words(words);
        let mut cur = CurrentMessage::default();

        assert_eq!(assemble_message(&mut s, &t, &hdr, &mut cur), Outcome::DataFound);
        assert_eq!(cur.asm_words(), 4);
    }
}
