// Statistics files and snapshot handling: value min/max/average rows,
// message frequency tables and the host-inserted snapshot markers.

mod common;

use common::{data_word, fmt_word, subpacket, TestBench, FMT_ID_BITS};
use rtemsg_core::header::{encode_header, pack_cfg, RtedbgHeader};
use rtemsg_core::RunOutcome;

#[test]
fn value_statistics_csv_row() {
    let bench = TestBench::new(
        "// FMT_START(4)\n// MSG1_V \"v=%[0:32u]|load|u\"\n",
    );

    let mut words = Vec::new();
    for (n, v) in [5u32, 1, 9, 3].iter().enumerate() {
        words.extend(subpacket(4, &[*v], n as u32 * 16));
    }

    let bin = bench.write_bin(&words, false);
    let mut params = bench.params(&bin);
    params.value_statistics_enabled = true;

    assert_eq!(rtemsg_core::run(params).unwrap(), RunOutcome::Success);

    let csv = bench.read_out("Statistics.csv");
    assert!(csv.contains("\"load\";\"MSG1_V\""), "{csv}");
    assert!(csv.contains(";max;9;5;3;1;"), "{csv}");
    assert!(csv.contains(";min;1;3;5;9;"), "{csv}");
    assert!(csv.contains("average;4.5;count;4"), "{csv}");
}

#[test]
fn message_frequency_tables() {
    let fmt = "// FMT_START(4)\n\
               // MSG0_SEEN \"seen\"\n\
               // MSG0_NEVER \"never\"\n";
    let bench = TestBench::new(fmt);

    let words = vec![fmt_word(4, 0), fmt_word(4, 16), fmt_word(4, 32)];
    let bin = bench.write_bin(&words, false);

    let mut params = bench.params(&bin);
    params.message_statistics_enabled = true;

    assert_eq!(rtemsg_core::run(params).unwrap(), RunOutcome::Success);

    let found = bench.read_out("Stat_msgs_found.txt");
    assert!(found.contains("3 - MSG0_SEEN"), "{found}");
    assert!(!found.contains("MSG0_NEVER"), "{found}");

    let missing = bench.read_out("Stat_msgs_missing.txt");
    assert!(missing.contains("MSG0_NEVER"), "{missing}");
    assert!(!missing.contains("MSG0_SEEN"), "{missing}");
}

#[test]
fn top_message_tables_in_stat_main() {
    let fmt = "// FMT_START(4)\n\
               // MSG0_OFTEN \"o\"\n\
               // MSG1_RARE \"r %[0:32u]u\"\n";
    let bench = TestBench::new(fmt);

    let mut words = Vec::new();
    for n in 0..5 {
        words.push(fmt_word(4, n * 16));
    }
    words.extend(subpacket(6, &[1], 200)); // MSG1 pair sits at 6

    let bin = bench.write_bin(&words, false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let stat = bench.read_out("Stat_main.log");
    assert!(stat.contains("Messages processed: 6"), "{stat}");

    // MSG0_OFTEN leads the frequency table.
    let freq_section = stat
        .split("highest frequency of occurrence:")
        .nth(1)
        .expect("frequency table");
    let first_line = freq_section.lines().nth(1).unwrap_or_default();
    assert!(first_line.contains("MSG0_OFTEN"), "{stat}");
}

#[test]
fn snapshot_marker_resets_per_snapshot_counters() {
    let bench = TestBench::new(
        "// FMT_START(4)\n// MSG0_TICK \"dT=%T\"\n",
    );

    // Multiple-capture file: two snapshots separated by the marker with
    // the SYS_MULTIPLE_LOGGING sub-code in the raw timestamp bits.
    let topmost = (1u32 << FMT_ID_BITS) - 2;
    let marker_ts = 2 << 11;

    let mut words = vec![
        fmt_word(4, 0x10),
        fmt_word(4, 0x20),
        data_word(0),
        fmt_word(topmost, marker_ts),
        fmt_word(4, 0x1000),
    ];

    let header = RtedbgHeader {
        last_index: 0,
        rte_cfg: pack_cfg(false, false, false, false, 1, FMT_ID_BITS, 4, false),
        timestamp_frequency: common::FREQUENCY,
        buffer_size: 0xFFFF_FFF4, // multiple data capture
        ..Default::default()
    };

    let mut bytes = encode_header(&header).to_vec();
    for w in words.drain(..) {
        bytes.extend_from_slice(&w.to_le_bytes());
    }

    let path = bench.dir.path().join("data.bin");
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(rtemsg_core::run(bench.params(&path)).unwrap(), RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("Multiple data capture"), "{main_log}");
    assert!(main_log.contains("Snapshot logged at"), "{main_log}");

    // The delta timer restarts with the new snapshot: the first tick
    // after the marker prints zero again.
    assert_eq!(main_log.matches("dT=0.000000").count(), 2, "{main_log}");
}
