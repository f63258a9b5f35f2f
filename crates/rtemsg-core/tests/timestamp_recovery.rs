// Timestamp reconstruction across messages: delta timestamps, low-part
// wraps and the LONG_TIMESTAMP anchor search.

mod common;

use common::{data_word, fmt_word, seconds_per_raw_unit, TestBench};
use rtemsg_core::RunOutcome;

#[test]
fn delta_timestamp_between_two_ticks() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_TICK \"dT=%T\"\n");

    let t1: u32 = 0;
    let t2: u32 = 0x100;
    let bin = bench.write_bin(&[fmt_word(4, t1), fmt_word(4, t2)], false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let main_log = bench.read_out("Main.log");

    // The first occurrence has no predecessor and prints zero.
    assert!(main_log.contains("MSG0_TICK: dT=0.000000"), "{main_log}");

    let expected = (t2 - t1) as f64 * seconds_per_raw_unit();
    let expected = format!("dT={expected:.6}");
    assert!(main_log.contains(&expected), "expected {expected} in:\n{main_log}");
}

#[test]
fn absolute_timestamps_follow_the_low_part() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_T \"t=%t\"\n");

    let raw: u32 = 2500;
    let bin = bench.write_bin(&[fmt_word(4, 0), fmt_word(4, raw)], false);

    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let main_log = bench.read_out("Main.log");
    let expected = format!("t={:.6}", raw as f64 * seconds_per_raw_unit());
    assert!(main_log.contains(&expected), "expected {expected} in:\n{main_log}");
}

#[test]
fn long_timestamp_anchor_sets_the_high_part() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_A \"tick\"\n");

    // A run of plain messages with small steps, then a LONG_TIMESTAMP
    // system message carrying hi = 7, then one more plain message.
    let mut words = Vec::new();
    let mut raw: u32 = 0;
    for _ in 0..5 {
        words.push(fmt_word(4, raw));
        raw += 400_000;
    }

    let anchor_hi: u32 = 7;
    words.push(data_word(anchor_hi));
    words.push(fmt_word(0 | (anchor_hi >> 31), raw));

    let final_raw = raw + 419_430;
    words.push(fmt_word(4, final_raw));

    let bin = bench.write_bin(&words, true);
    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    // The final message time comes from the anchored high part, not from
    // a locally incremented one.
    let normalized = (final_raw as u64) << 10;
    let value = ((anchor_hi as u64) << 32) | normalized;
    let mult = seconds_per_raw_unit() / (1u64 << 10) as f64;
    let expected = format!("{:.6}", value as f64 * mult);

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains(&expected), "expected {expected} in:\n{main_log}");
}

#[test]
fn low_part_wrap_increments_the_high_part() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_A \"tick\"\n");

    // March the low part close to the wrap (raw is 22 bits here), then
    // step past it. Enough messages in between satisfy the bump limiter.
    let steps = [
        0x10_0000u32,
        0x20_0000,
        0x30_0000,
        0x3E_0000,
        0x3F_0000,
        0x00_1000, // wrapped
    ];

    let words: Vec<u32> = steps.iter().map(|&t| fmt_word(4, t)).collect();
    let bin = bench.write_bin(&words, false);

    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    // After the wrap the absolute time is one full period plus the new
    // low part.
    let period_s = (1u64 << 32) as f64 * seconds_per_raw_unit() / (1u64 << 10) as f64;
    let expected_s = period_s + 0x1000 as f64 * seconds_per_raw_unit();
    let expected = format!("{expected_s:.6}");

    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains(&expected), "expected {expected} in:\n{main_log}");
}

#[test]
fn frequency_change_rescales_later_messages() {
    let bench = TestBench::new("// FMT_START(4)\n// MSG0_T \"t=%t\"\n");

    // TSTAMP_FREQUENCY (ID 2) halves the tick rate; the same raw step
    // afterwards covers twice the time.
    let new_frequency: u32 = common::FREQUENCY / 2;
    let words = vec![
        fmt_word(4, 0),
        data_word(new_frequency),
        fmt_word(2 | (new_frequency >> 31), 0),
        fmt_word(4, 0x100),
    ];

    let bin = bench.write_bin(&words, false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let expected = format!("t={:.6}", 0x100 as f64 * seconds_per_raw_unit() * 2.0);
    let main_log = bench.read_out("Main.log");
    assert!(main_log.contains(&expected), "expected {expected} in:\n{main_log}");
}
