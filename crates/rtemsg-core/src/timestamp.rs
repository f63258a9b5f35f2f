// crates/rtemsg-core/src/timestamp.rs
//
// Reconstruction of the 64-bit timestamp from the truncated low part
// carried by every FMT word. The low part is normalized so that one full
// cycle is 2^32 units; the high part is tracked across wraps and
// re-anchored with LONG_TIMESTAMP system messages when the difference
// between consecutive messages is too large to trust.

use crate::config::{MAX_FMT_IDS, NORMALIZED_TSTAMP_PERIOD};
use crate::descriptor::{DescriptorTable, MsgKind};
use crate::header::HeaderInfo;
use crate::loader::{WordStream, SENTINEL};
use crate::params::Params;
use crate::sysmsg;

#[derive(Default)]
pub struct TimestampEngine {
    /// Full timestamp of the current message in seconds.
    pub seconds: f64,
    /// Seconds per normalized timestamp unit.
    pub multiplier: f64,
    pub current_frequency: u32,
    /// High 32 bits of the reconstructed timestamp.
    pub hi: u32,
    /// Normalized low part of the current message.
    pub low: u32,
    /// Low part of the previous message (not updated for late writes).
    pub old: u32,
    /// Stream index up to which the anchor search ran already.
    pub searched_to_index: usize,
    /// Message number of the last high-part increment.
    pub msg_of_last_hi_bump: u32,
    pub suspicious_count: u32,
    /// Prefix the next message number with a marker.
    pub mark_problematic: bool,
    pub no_previous: bool,
    pub long_timestamp_found: bool,
    pub first_processed: bool,
    pub first_ns: u64,
    pub last_ns: u64,
}

impl TimestampEngine {
    pub fn new(hdr: &HeaderInfo, frequency: u32) -> Self {
        TimestampEngine {
            multiplier: hdr.timestamp_multiplier(frequency),
            current_frequency: frequency.max(1),
            no_previous: true,
            ..Default::default()
        }
    }

    /// A TSTAMP_FREQUENCY system message changes the tick rate
    /// prospectively.
    pub fn set_frequency(&mut self, hdr: &HeaderInfo, frequency: u32) {
        self.current_frequency = frequency;
        self.multiplier = hdr.timestamp_multiplier(frequency);
    }

    /// Restart the tracking after a snapshot marker or logging restart.
    pub fn reset(&mut self) {
        self.searched_to_index = 0;
        self.no_previous = true;
        self.mark_problematic = false;
        self.old = 0;
    }

    /// Current timestamp in nanoseconds, saturating at u64::MAX.
    pub fn nanoseconds(&self) -> u64 {
        if self.seconds > u64::MAX as f64 / 1e9 {
            u64::MAX
        } else {
            (self.seconds * 1e9) as u64
        }
    }

    /// Prepare the timestamp of the current message.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &mut self,
        stream: &WordStream,
        table: &DescriptorTable,
        hdr: &HeaderInfo,
        params: &Params,
        fmt_id: u32,
        message_cnt: u32,
    ) {
        let mut value = ((self.hi as u64) << 32) | self.low as u64;

        if fmt_id & !1 == sysmsg::LONG_TIMESTAMP {
            self.old = self.low;
            self.long_timestamp_found = true;
        } else if fmt_id != sysmsg::streaming_mark(hdr) {
            self.track(stream, table, hdr, params, message_cnt, &mut value);
        }

        self.no_previous = false;
        self.seconds = self.multiplier * value as f64;
    }

    /// Classify the difference to the previous message and update the
    /// high part (the update rules of the decoder):
    ///  1. small forward step            -> keep hi, update old
    ///  2. small backward step           -> keep everything (late write)
    ///  3. wrap of the low counter       -> hi += 1 (rate limited)
    ///  4. late write from the last wrap -> emit with hi - 1
    ///  5. anything else                 -> suspicious, search an anchor
    fn track(
        &mut self,
        stream: &WordStream,
        table: &DescriptorTable,
        hdr: &HeaderInfo,
        params: &Params,
        message_cnt: u32,
        value: &mut u64,
    ) {
        let diff = self.low as i64 - self.old as i64;
        let mut search_anchor = false;
        let mut update_old = true;

        if diff >= 0 && diff <= params.max_positive_tstamp_diff {
            // Plain forward step.
        } else if diff < 0 && diff >= params.max_negative_tstamp_diff {
            // Slightly out of order; the previous values stay current.
            update_old = false;
        } else if self.old as i64 >= NORMALIZED_TSTAMP_PERIOD / 2
            && diff <= -(NORMALIZED_TSTAMP_PERIOD - params.max_positive_tstamp_diff)
            && !self.no_previous
        {
            // The low part wrapped. Require a few messages between two
            // increments so data loss cannot run the high part away.
            if message_cnt.wrapping_sub(self.msg_of_last_hi_bump) >= 4 {
                self.msg_of_last_hi_bump = message_cnt;
                self.hi += 1;
            }

            *value = ((self.hi as u64) << 32) | self.low as u64;
        } else if (self.old as i64) < NORMALIZED_TSTAMP_PERIOD / 2
            && diff >= NORMALIZED_TSTAMP_PERIOD + params.max_negative_tstamp_diff
            && !self.no_previous
        {
            // A late message from before the last wrap.
            let hi = self.hi.saturating_sub(1);
            *value = ((hi as u64) << 32) | self.low as u64;
            update_old = false;
        } else {
            search_anchor = true;
            self.mark_problematic = !self.no_previous;
        }

        if update_old || self.no_previous {
            self.old = self.low;
        }

        if (search_anchor && self.searched_to_index < stream.index) || self.no_previous {
            if self.search_long_timestamp(stream, table, hdr, params) {
                *value = ((self.hi as u64) << 32) | self.low as u64;
                self.old = self.low;
            }
        }
    }

    /// Difference check shared with the anchor search. The shadow state
    /// (`hi_counter`, `old_low`) tracks wraps seen while walking ahead.
    fn small_tstamp_difference(
        &self,
        params: &Params,
        hi_counter: &mut u32,
        old_low: &mut u32,
        new_low: u32,
    ) -> bool {
        let diff = new_low as i64 - *old_low as i64;

        if diff >= 0 && diff <= params.max_positive_tstamp_diff {
            *old_low = new_low;
            return true;
        }

        if diff < 0 && diff >= params.max_negative_tstamp_diff {
            return true;
        }

        if self.old as i64 >= NORMALIZED_TSTAMP_PERIOD / 2
            && diff <= -(NORMALIZED_TSTAMP_PERIOD - params.max_positive_tstamp_diff)
        {
            *hi_counter += 1;
            *old_low = new_low;
            return true;
        }

        if (self.old as i64) < NORMALIZED_TSTAMP_PERIOD / 2
            && diff >= NORMALIZED_TSTAMP_PERIOD + params.max_negative_tstamp_diff
        {
            return true;
        }

        false
    }

    /// Walk the unconsumed stream looking for a LONG_TIMESTAMP anchor.
    /// The search validates every FMT word against the descriptor table,
    /// counts wraps into a shadow high counter and gives up on streaming
    /// markers, invalid data or unacceptable jumps. Resumable: the stream
    /// is never consumed and `searched_to_index` remembers the progress.
    fn search_long_timestamp(
        &mut self,
        stream: &WordStream,
        table: &DescriptorTable,
        hdr: &HeaderInfo,
        params: &Params,
    ) -> bool {
        if !hdr.long_timestamp_used {
            return false;
        }

        if stream.index >= stream.in_size {
            return false;
        }

        let mut previous_data = SENTINEL;
        let mut old_low = self.low;
        let mut hi_counter: u32 = 0;
        let mut data_words: u32 = 0;

        for index in stream.index..stream.in_size {
            let data = stream.word(index);
            self.searched_to_index = index + 1;

            if data & 1 == 0 {
                if data == SENTINEL {
                    return false;
                }

                data_words += 1;
                if data_words > 4 {
                    // Invalid run; stop searching at faulty data.
                    return false;
                }

                previous_data = data;
                continue;
            }

            let Some(fmt_id) = fmt_id_valid(table, hdr, data, data_words) else {
                data_words = 0;
                previous_data = data;
                continue;
            };

            let new_low = (data & 0xFFFF_FFFE) << hdr.fmt_id_bits;

            // A streaming marker terminates the search.
            if fmt_id == sysmsg::streaming_mark(hdr) && data_words == 1 {
                return false;
            }

            if fmt_id & !1 == sysmsg::LONG_TIMESTAMP && data_words == 1 {
                // The payload's top bit was stolen into the format ID.
                let timestamp_h =
                    (previous_data >> 1) | ((data << (hdr.fmt_id_bits - 1)) & 0x8000_0000);

                if timestamp_h == SENTINEL {
                    return false; // logged by a timing restart
                }

                if timestamp_h >= hi_counter {
                    if !self.small_tstamp_difference(params, &mut hi_counter, &mut old_low, new_low)
                    {
                        return false;
                    }

                    self.hi = timestamp_h - hi_counter;
                    return true;
                }

                return false;
            }

            if !self.small_tstamp_difference(params, &mut hi_counter, &mut old_low, new_low) {
                return false;
            }

            data_words = 0;
            previous_data = data;
        }

        false
    }
}

/// Check a raw FMT word against the descriptor table: the format ID must
/// carry a descriptor and the subpacket length must fit the message kind.
/// Returns the decoded format ID.
pub fn fmt_id_valid(
    table: &DescriptorTable,
    hdr: &HeaderInfo,
    fmt_word: u32,
    data_words: u32,
) -> Option<u32> {
    if fmt_word == SENTINEL {
        return None;
    }

    let fmt_id = fmt_word >> hdr.fmt_id_shift;
    if fmt_id as usize >= MAX_FMT_IDS {
        return None;
    }

    let desc = table.descriptor(fmt_id)?;
    let length = desc.msg_len / 4;

    let valid = match desc.kind {
        MsgKind::SelfSized => true,
        MsgKind::Variable => length == 0 || data_words == 4 || (data_words & 3) == (length & 3),
        MsgKind::Extended => length.wrapping_sub(1) == data_words,
        MsgKind::Fixed => length == data_words,
    };

    if valid {
        Some(fmt_id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorTable, MessageDescriptor};
    use crate::header::{pack_cfg, RtedbgHeader};

    fn hdr9(long_ts: bool) -> HeaderInfo {
        let h = RtedbgHeader {
            rte_cfg: pack_cfg(false, false, false, long_ts, 1, 9, 4, false),
            ..Default::default()
        };
        h.unpack(9).unwrap()
    }

    fn empty_stream() -> WordStream {
        WordStream::from_words(vec![])
    }

    fn table9() -> DescriptorTable {
        let hdr = hdr9(true);
        let mut t = DescriptorTable::new((1 << 9) - 2);
        crate::sysmsg::install_system_descriptors(&mut t, hdr.topmost_fmt_id);
        let mut d = MessageDescriptor::new("MSG0_A", MsgKind::Fixed);
        d.msg_len = 0;
        let h = t.register(d);
        t.set_start(4);
        t.assign_fmt_id(1, h);
        t
    }

    fn engine(hdr: &HeaderInfo) -> TimestampEngine {
        TimestampEngine::new(hdr, 1_000_000)
    }

    #[test]
    fn forward_steps_keep_the_high_part() {
        let hdr = hdr9(false);
        let params = Params::default();
        let table = table9();
        let stream = empty_stream();
        let mut ts = engine(&hdr);

        ts.low = 0x1000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 1);
        assert_eq!(ts.hi, 0);
        assert_eq!(ts.old, 0x1000);

        ts.low = 0x2000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 2);
        assert_eq!(ts.hi, 0);
        assert_eq!(ts.old, 0x2000);
    }

    #[test]
    fn wrap_increments_the_high_part() {
        let hdr = hdr9(false);
        let params = Params::default();
        let table = table9();
        let stream = empty_stream();
        let mut ts = engine(&hdr);

        ts.low = 0xF000_0000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 1);
        assert_eq!(ts.hi, 0);

        // At least four messages must pass before a bump is accepted.
        ts.low = 0x0000_1000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 6);
        assert_eq!(ts.hi, 1);
        assert_eq!(ts.old, 0x0000_1000);
    }

    #[test]
    fn small_backward_step_is_tolerated() {
        let hdr = hdr9(false);
        let params = Params::default();
        let table = table9();
        let stream = empty_stream();
        let mut ts = engine(&hdr);

        ts.low = 0x10_0000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 1);

        ts.low = 0x0F_0000;
        ts.prepare(&stream, &table, &hdr, &params, 4, 2);
        assert_eq!(ts.hi, 0);
        // The previous value stays current for the next comparison.
        assert_eq!(ts.old, 0x10_0000);
    }

    #[test]
    fn anchor_search_uses_the_long_timestamp() {
        let hdr = hdr9(true);
        let params = Params::default();
        let table = table9();
        let mut ts = engine(&hdr);

        // Stream ahead: a LONG_TIMESTAMP subpacket (DATA + FMT id 0) with
        // a high part of 7, then nothing else.
        let anchor_hi: u32 = 7;
        let data_word = (anchor_hi << 1) & 0xFFFF_FFFE; // bit31 of hi is 0
        let fmt_word = 1u32; // fmt_id 0, ts_low 0
        let stream = WordStream::from_words(vec![data_word, fmt_word]);

        ts.low = 0;
        ts.no_previous = true;
        ts.prepare(&stream, &table, &hdr, &params, 4, 1);

        assert_eq!(ts.hi, anchor_hi);
        assert!(ts.searched_to_index > 0);
    }

    #[test]
    fn anchor_search_needs_firmware_support() {
        let hdr = hdr9(false);
        let params = Params::default();
        let table = table9();
        let stream = WordStream::from_words(vec![15, 1]);
        let mut ts = engine(&hdr);

        ts.low = 0;
        ts.no_previous = true;
        ts.prepare(&stream, &table, &hdr, &params, 4, 1);
        assert_eq!(ts.hi, 0);
    }
}
