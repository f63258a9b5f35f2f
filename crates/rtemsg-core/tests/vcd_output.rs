// End-to-end VCD generation: toggle and pulse semantics, the auto
// variables, header assembly and timestamp monotonicity.

mod common;

use common::{fmt_word, subpacket, TestBench};
use rtemsg_core::RunOutcome;

fn vcd_fmt() -> &'static str {
    "// FMT_START(4)\n\
     // OUT_FILE(VCD, \"wave.vcd\", \"w\")\n\
     // MSG0_EV\n\
     // >VCD \"B clk = T\"\n\
     // >VCD \"B trigger = P\"\n"
}

/// Byte offsets of the needles, in order, all required to be present.
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut from = 0usize;
    for needle in needles {
        match haystack[from..].find(needle) {
            Some(pos) => from += pos + needle.len(),
            None => panic!("missing \"{needle}\" after offset {from} in:\n{haystack}"),
        }
    }
}

#[test]
fn toggle_and_pulse_transitions() {
    let bench = TestBench::new(vcd_fmt());

    // Two firings; raw timestamps map to 32 us and 1024 us.
    let t1: u32 = 0x10;
    let t2: u32 = 0x200;
    let bin = bench.write_bin(&[fmt_word(4, t1), fmt_word(4, t2)], false);

    let outcome = rtemsg_core::run(bench.params(&bin)).unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let wave = bench.read_out("wave.vcd");

    // Header block and declarations (alphabetic order, ids by insertion).
    assert_in_order(
        &wave,
        &[
            "$timescale",
            "1ns",
            "$scope module RTEdbg $end",
            "$var real 64 # N $end",
            "$var wire 1 $ TsJumpBack $end",
            "$var wire 1 ! clk $end",
            "$var wire 1 \" trigger $end",
            "$enddefinitions",
        ],
    );

    // First message: toggle to 1, pulse 1, auto vars, pulse back to 0 a
    // nanosecond later. Second message: toggle back to 0, pulse again.
    let body = wave.split("$enddefinitions").nth(1).unwrap();
    assert_in_order(
        body,
        &[
            "#32000\n",
            "1!\n",
            "1\"\n",
            "r1 #\n",
            "0$\n",
            "#32001\n",
            "0\"\n",
            "#1024000\n",
            "0!\n",
            "1\"\n",
            "r2 #\n",
            "#1024001\n",
            "0\"\n",
        ],
    );

    // TsJumpBack never left zero.
    assert!(!body.contains("1$\n"), "{body}");
}

#[test]
fn vcd_timestamps_are_strictly_monotonic() {
    let bench = TestBench::new(vcd_fmt());

    // The second message repeats the first timestamp; the guard bumps it
    // by one nanosecond instead of writing a duplicate.
    let bin = bench.write_bin(&[fmt_word(4, 0x10), fmt_word(4, 0x10)], false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let wave = bench.read_out("wave.vcd");
    let mut last: i64 = -1;

    for line in wave.lines() {
        if let Some(ts) = line.strip_prefix('#') {
            let ts: i64 = ts.parse().expect("timestamp line");
            assert!(ts > last, "non-monotonic #{ts} after #{last}:\n{wave}");
            last = ts;
        }
    }

    assert!(last >= 0, "no timestamps written:\n{wave}");
}

#[test]
fn numeric_vcd_variable_from_a_value_field() {
    let fmt = "// FMT_START(4)\n\
               // OUT_FILE(VCD, \"level.vcd\", \"w\")\n\
               // MSG1_LVL\n\
               // >VCD \"F level = %[0:32u]u\"\n";
    let bench = TestBench::new(fmt);

    let bin = bench.write_bin(&subpacket(4, &[777], 0x10), false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let wave = bench.read_out("level.vcd");
    assert!(wave.contains("$var real 64 ! level $end"), "{wave}");
    assert!(wave.contains("r777 !"), "{wave}");
}

#[test]
fn gtkw_companion_is_generated() {
    let bench = TestBench::new(vcd_fmt());
    let bin = bench.write_bin(&[fmt_word(4, 0x10)], false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    let gtkw = bench.read_out("wave.gtkw");
    assert!(gtkw.contains("[dumpfile]"), "{gtkw}");
    assert!(gtkw.contains("RTEdbg.clk"), "{gtkw}");
    assert!(gtkw.contains("RTEdbg.trigger"), "{gtkw}");
}

#[test]
fn tmp_body_is_removed_after_finalization() {
    let bench = TestBench::new(vcd_fmt());
    let bin = bench.write_bin(&[fmt_word(4, 0x10)], false);
    assert_eq!(rtemsg_core::run(bench.params(&bin)).unwrap(), RunOutcome::Success);

    assert!(bench.out.join("wave.vcd").exists());
    assert!(!bench.out.join("wave.vcd.tmp").exists());
}
