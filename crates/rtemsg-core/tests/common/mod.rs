// Shared helpers for the end-to-end decoder tests: synthetic binary
// snapshots (N = 9 format ID bits, timestamp shift 1, 1 MHz) and a
// workspace layout with separate fmt and output folders.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rtemsg_core::header::{encode_header, pack_cfg, RtedbgHeader};
use rtemsg_core::loader::SENTINEL;
use rtemsg_core::Params;

pub const FMT_ID_BITS: u8 = 9;
pub const FREQUENCY: u32 = 1_000_000;

/// Seconds per raw timestamp unit for the test configuration:
/// 2^shift / frequency = 2 us... scaled by the 22-bit field position.
pub fn seconds_per_raw_unit() -> f64 {
    let normalized_per_raw = (1u64 << (FMT_ID_BITS + 1)) as f64;
    let mult = 2.0 / FREQUENCY as f64 / (1u64 << (1 + FMT_ID_BITS)) as f64;
    normalized_per_raw * mult
}

/// FMT word: format ID in the top 9 bits, 22-bit raw timestamp, bit 0 set.
pub fn fmt_word(fmt_id: u32, ts_raw: u32) -> u32 {
    (fmt_id << 23) | ((ts_raw & 0x3F_FFFF) << 1) | 1
}

/// DATA word carrying `payload`: shifted left by one, bit 31 stolen.
pub fn data_word(payload: u32) -> u32 {
    (payload << 1) & 0xFFFF_FFFE
}

/// Stolen top bits of the payloads, MSB of the first word ending up in
/// the highest used format-ID bit.
pub fn stolen_bits(payloads: &[u32]) -> u32 {
    let mut bits = 0;
    for p in payloads {
        bits = (bits << 1) | (p >> 31);
    }
    bits
}

/// One complete subpacket for a message with the given payload words.
pub fn subpacket(base_fmt_id: u32, payloads: &[u32], ts_raw: u32) -> Vec<u32> {
    let mut words: Vec<u32> = payloads.iter().map(|&p| data_word(p)).collect();
    words.push(fmt_word(base_fmt_id | stolen_bits(payloads), ts_raw));
    words
}

pub struct TestBench {
    pub dir: tempfile::TempDir,
    pub out: PathBuf,
    pub fmt: PathBuf,
}

impl TestBench {
    pub fn new(fmt_content: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let fmt = dir.path().join("fmt");
        fs::create_dir(&out).unwrap();
        fs::create_dir(&fmt).unwrap();
        fs::write(fmt.join("rte_main_fmt.h"), fmt_content).unwrap();
        TestBench { dir, out, fmt }
    }

    /// Post-mortem snapshot: the live words followed by erased words up
    /// to the buffer size named in the header.
    pub fn write_bin(&self, live_words: &[u32], long_timestamp: bool) -> PathBuf {
        let trailing = 4usize;
        let total = live_words.len() + trailing;

        let header = RtedbgHeader {
            last_index: live_words.len() as u32,
            filter: 0,
            rte_cfg: pack_cfg(false, false, false, long_timestamp, 1, FMT_ID_BITS, 4, false),
            timestamp_frequency: FREQUENCY,
            filter_copy: 0,
            buffer_size: total as u32,
        };

        let mut bytes = encode_header(&header).to_vec();
        for w in live_words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        for _ in 0..trailing {
            bytes.extend_from_slice(&SENTINEL.to_le_bytes());
        }

        let path = self.dir.path().join("data.bin");
        fs::write(&path, bytes).unwrap();
        path
    }

    pub fn params(&self, bin: &Path) -> Params {
        Params {
            working_folder: self.out.clone(),
            fmt_folder: self.fmt.clone(),
            data_file_name: Some(bin.to_owned()),
            fmt_id_bits: FMT_ID_BITS,
            ..Params::default()
        }
    }

    pub fn read_out(&self, name: &str) -> String {
        fs::read_to_string(self.out.join(name)).unwrap_or_default()
    }
}
