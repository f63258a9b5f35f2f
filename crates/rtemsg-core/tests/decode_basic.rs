// End-to-end decoding of literal byte streams: plain messages,
// bit-field extraction, MSGX length verification and re-run stability.

mod common;

use common::{data_word, fmt_word, subpacket, TestBench};
use rtemsg_core::RunOutcome;

#[test]
fn single_msg0_message() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_HELLO \"hello\"\n");
    let bin = bench.write_bin(&[fmt_word(4, 0)], false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(
        main_log.contains("N00001 0.000000 MSG0_HELLO: hello"),
        "unexpected Main.log:\n{main_log}"
    );

    let errors = bench.read_out("Errors.log");
    assert!(errors.contains("No errors detected"), "{errors}");
}

#[test]
fn bit_fields_split_one_word() {
    let bench = TestBench::new(
        "// FMT_START(4)\n// MSG1_V \"x=%[0:12u]d, y=%[12:20u]u\"\n",
    );

    let bin = bench.write_bin(&subpacket(4, &[0xABCD_E123], 0), false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(
        main_log.contains("MSG1_V: x=291, y=703710"),
        "unexpected Main.log:\n{main_log}"
    );
}

#[test]
fn unsigned_signed_and_float_coercions() {
    let fmt = "// FMT_START(4)\n\
               // MSG1_S \"v=%[0:8i]d h=%[8:16f]g\"\n";
    let bench = TestBench::new(fmt);

    // Low byte: -2 as i8. Bits 8..24: half-precision 1.5 (0x3E00).
    let payload: u32 = 0x3E00_u32 << 8 | 0xFE;
    let bin = bench.write_bin(&subpacket(4, &[payload], 0), false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("v=-2 h=1.5"), "unexpected Main.log:\n{main_log}");
}

#[test]
fn scaling_applies_offset_and_multiplier() {
    let bench = TestBench::new(
        "// FMT_START(4)\n// MSG1_RAW \"adc=%[0:16u](-100*0.5)g\"\n",
    );

    // (300 - 100) * 0.5 = 100.
    let bin = bench.write_bin(&subpacket(4, &[300], 0), false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("adc=100"), "unexpected Main.log:\n{main_log}");
}

#[test]
fn memo_store_and_recall() {
    let fmt = "// FMT_START(4)\n\
               // MEMO(M_LAST)\n\
               // MSG1_SET \"set %[0:32u]<M_LAST>u\"\n\
               // MSG0_GET \"last was %[M_LAST]g\"\n";
    let bench = TestBench::new(fmt);

    let mut words = subpacket(4, &[41], 0);
    words.extend(subpacket(6, &[], 1)); // MSG0_GET (ID 6 after the MSG1 pair)

    let bin = bench.write_bin(&words, false);
    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("set 41"), "{main_log}");
    assert!(main_log.contains("last was 41"), "{main_log}");
}

#[test]
fn indexed_text_selection_clamps() {
    let fmt = "// FMT_START(4)\n\
               // MSG1_STATE \"state %[0:8u]{off|on|fault}Y now\"\n";
    let bench = TestBench::new(fmt);

    let mut words = subpacket(4, &[1], 0);
    words.extend(subpacket(4, &[9], 1)); // out of range -> last entry

    let bin = bench.write_bin(&words, false);
    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("state on now"), "{main_log}");
    assert!(main_log.contains("state fault now"), "{main_log}");
}

#[test]
fn msgx_length_byte_is_verified() {
    let bench = TestBench::new("// FMT_START(4)\n// MSGX_BLOB \"blob %[0:8u]u\"\n");

    // MSGX reserves 16 aligned IDs; the first free 16-aligned range is 16.
    let good = [0x4433_2211, 0x0500_0055u32]; // length byte 5, tail zero
    let bad = [0x4433_2211, 0x0900_0055u32]; // length byte 9 > asm - 1

    let mut words = subpacket(16, &good, 0);
    words.extend(subpacket(16, &bad, 1));

    let bin = bench.write_bin(&words, false);
    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::NonFatalDecodeErrors);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("blob 17"), "{main_log}"); // 0x11

    let errors = bench.read_out("Errors.log");
    assert!(errors.contains("ERR_106"), "missing MSGX size error:\n{errors}");
}

#[test]
fn message_without_definition_is_reported_once() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_KNOWN \"known\"\n");

    let mut words = vec![fmt_word(4, 0)];
    words.push(fmt_word(100, 1)); // no descriptor for ID 100
    words.push(fmt_word(4, 2));

    let bin = bench.write_bin(&words, false);
    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::NonFatalDecodeErrors);

    let errors = bench.read_out("Errors.log");
    assert!(errors.contains(" 1 x ERR_100"), "{errors}");

    // The stream recovers: both known messages decode.
    let main_log = bench.read_out("Main.log");
    assert_eq!(main_log.matches("MSG0_KNOWN: known").count(), 2, "{main_log}");
}

#[test]
fn ext_msg_carries_the_extra_byte() {
    let bench = TestBench::new(
        "// FMT_START(16)\n// EXT_MSG1_3_LEVEL \"ch=%[32:3u]u v=%[0:32u]u\"\n",
    );

    // One payload word plus 3 extended bits packed into the format ID.
    let payload: u32 = 1234;
    let ext: u32 = 0b101;
    let fmt_id = 16 | (ext << 1) | (payload >> 31);
    let bin = bench.write_bin(&[data_word(payload), fmt_word(fmt_id, 0)], false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains("ch=5 v=1234"), "{main_log}");
}

#[test]
fn rerun_produces_identical_output() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG1_V \"v=%[0:32u]u\"\n");
    let bin = bench.write_bin(&subpacket(4, &[7], 0), false);

    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);
    let first = bench.read_out("Main.log");

    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);
    let second = bench.read_out("Main.log");

    assert_eq!(first, second);
}
