// crates/rtemsg-core/src/stats.rs
//
// Value statistics (min/max/average per labelled value) and the summary
// tables written at the end of a run.

use crate::config::{MIN_MAX_VALUES, TOP_MESSAGES};
use crate::descriptor::DescriptorTable;

/// Bounded min/max tables plus a running sum for one labelled value.
/// The tables keep the extreme values together with the numbers of the
/// messages in which they appeared; element 0 is the most extreme one.
#[derive(Debug, Clone)]
pub struct ValueStats {
    pub name: String,
    pub sum: f64,
    pub counter: u32,
    pub min: [f64; MIN_MAX_VALUES],
    pub min_msg_no: [u32; MIN_MAX_VALUES],
    pub max: [f64; MIN_MAX_VALUES],
    pub max_msg_no: [u32; MIN_MAX_VALUES],
}

impl ValueStats {
    fn new(name: &str) -> Self {
        ValueStats {
            name: name.to_owned(),
            sum: 0.0,
            counter: 0,
            min: [0.0; MIN_MAX_VALUES],
            min_msg_no: [0; MIN_MAX_VALUES],
            max: [0.0; MIN_MAX_VALUES],
            max_msg_no: [0; MIN_MAX_VALUES],
        }
    }

    /// Feed one value into the accumulator.
    pub fn add(&mut self, value: f64, msg_no: u32) {
        let count = self.counter as usize;
        insert_minimal(&mut self.min, &mut self.min_msg_no, value, msg_no, count);
        insert_maximal(&mut self.max, &mut self.max_msg_no, value, msg_no, count);
        self.counter += 1;
        self.sum += value;
    }

    pub fn average(&self) -> f64 {
        if self.counter == 0 {
            0.0
        } else {
            self.sum / self.counter as f64
        }
    }

    /// Number of valid entries in the min/max tables.
    pub fn table_len(&self) -> usize {
        (self.counter as usize).min(MIN_MAX_VALUES)
    }
}

fn insert_minimal(
    values: &mut [f64; MIN_MAX_VALUES],
    msg_numbers: &mut [u32; MIN_MAX_VALUES],
    value: f64,
    msg_no: u32,
    count: usize,
) {
    let count = if count >= MIN_MAX_VALUES {
        if value >= values[MIN_MAX_VALUES - 1] {
            return;
        }
        MIN_MAX_VALUES
    } else {
        count
    };

    let mut position = 0;
    while position < count && value >= values[position] {
        position += 1;
    }

    for i in (position + 1..MIN_MAX_VALUES).rev() {
        values[i] = values[i - 1];
        msg_numbers[i] = msg_numbers[i - 1];
    }

    values[position] = value;
    msg_numbers[position] = msg_no;
}

fn insert_maximal(
    values: &mut [f64; MIN_MAX_VALUES],
    msg_numbers: &mut [u32; MIN_MAX_VALUES],
    value: f64,
    msg_no: u32,
    count: usize,
) {
    let count = if count >= MIN_MAX_VALUES {
        if value <= values[MIN_MAX_VALUES - 1] {
            return;
        }
        MIN_MAX_VALUES
    } else {
        count
    };

    let mut position = 0;
    while position < count && value <= values[position] {
        position += 1;
    }

    for i in (position + 1..MIN_MAX_VALUES).rev() {
        values[i] = values[i - 1];
        msg_numbers[i] = msg_numbers[i - 1];
    }

    values[position] = value;
    msg_numbers[position] = msg_no;
}

/// Owned pool of statistics accumulators; field descriptors reference
/// entries by index.
#[derive(Default)]
pub struct StatsPool {
    entries: Vec<ValueStats>,
}

impl StatsPool {
    pub fn new() -> Self {
        StatsPool::default()
    }

    pub fn add(&mut self, name: &str) -> u32 {
        self.entries.push(ValueStats::new(name));
        (self.entries.len() - 1) as u32
    }

    pub fn get(&self, idx: u32) -> Option<&ValueStats> {
        self.entries.get(idx as usize)
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut ValueStats> {
        self.entries.get_mut(idx as usize)
    }
}

/// Fold the since-reset counters into the totals. Called after snapshot
/// markers and at finalization so the summary tables see every message.
pub fn fold_counters(table: &mut DescriptorTable) {
    for c in &mut table.counters {
        c.count_total += c.count_since_reset;
        c.count_since_reset = 0;
    }
}

/// Statistics.csv content: one row per labelled value that received data.
/// Row: name;message;maxima;max msg numbers;minima;min msg numbers;
/// average;count.
pub fn value_statistics_csv(
    table: &DescriptorTable,
    pool: &StatsPool,
    msg_no_fmt: impl Fn(u32) -> String,
) -> String {
    let mut out = String::new();
    let mut rows = 0;

    for (_, handle) in table.unique() {
        let desc = table.by_handle(handle);

        for field in &desc.fields {
            let Some(stat_idx) = field.value_stat else { continue };
            let Some(stat) = pool.get(stat_idx) else { continue };
            if stat.counter == 0 {
                continue;
            }

            let k = stat.table_len();
            out.push_str(&format!("\"{}\";\"{}\";max", stat.name, desc.name));
            for v in &stat.max[..k] {
                out.push_str(&format!(";{v}"));
            }
            out.push_str(";msg");
            for n in &stat.max_msg_no[..k] {
                out.push_str(&format!(";{}", msg_no_fmt(*n)));
            }
            out.push_str(";min");
            for v in &stat.min[..k] {
                out.push_str(&format!(";{v}"));
            }
            out.push_str(";msg");
            for n in &stat.min_msg_no[..k] {
                out.push_str(&format!(";{}", msg_no_fmt(*n)));
            }
            out.push_str(&format!(";average;{};count;{}\n", stat.average(), stat.counter));
            rows += 1;
        }
    }

    if rows == 0 {
        out.push_str("No value statistics collected.\n");
    }

    out
}

fn top_table(
    table: &DescriptorTable,
    value_of: impl Fn(u32) -> u32, // handle index -> metric
) -> Vec<(u32, u32)> {
    // (fmt_id, value), value-descending, bounded at TOP_MESSAGES.
    let mut top: Vec<(u32, u32)> = Vec::new();

    for (fmt_id, handle) in table.unique() {
        let value = value_of(handle);
        if value == 0 {
            continue;
        }

        if top.len() >= TOP_MESSAGES && value <= top[top.len() - 1].1 {
            continue;
        }

        let position = top.iter().position(|&(_, v)| value > v).unwrap_or(top.len());
        top.insert(position, (fmt_id, value));
        top.truncate(TOP_MESSAGES);
    }

    top
}

/// Stat_main.log content: totals, format ID usage and the two top-ten
/// message tables (occurrence count and buffer usage).
pub fn common_statistics(
    table: &DescriptorTable,
    message_cnt: u32,
    total_bad_packet_words: u32,
    total_unfinished_words: u32,
    multiple_logging: u32,
) -> String {
    let mut out = String::new();

    if message_cnt == 0 {
        return out;
    }

    out.push_str(&format!("Messages processed: {message_cnt}\n"));

    if total_bad_packet_words > 0 {
        out.push_str(&format!(
            "Data words without a FMT word (bad blocks): {total_bad_packet_words}\n"
        ));
    }

    if total_unfinished_words > 0 {
        out.push_str(&format!(
            "Unfinished words found in the buffer: {total_unfinished_words}\n"
        ));
    }

    if multiple_logging > 1 {
        out.push_str(&format!("Separate snapshots in the data file: {multiple_logging}\n"));
    }

    let used = table.slots_used();
    let total = table.topmost_fmt_id;
    out.push_str(&format!(
        "Format IDs used: {} of {} ({:.1}%)\n",
        used,
        total,
        100.0 * used as f64 / total as f64
    ));

    if message_cnt > 1 {
        let by_count = top_table(table, |h| table.counters[h as usize].count_total);
        if !by_count.is_empty() {
            out.push_str("\nMessages with the highest frequency of occurrence:\n");
            for (i, (fmt_id, count)) in by_count.iter().enumerate() {
                let name = table.descriptor(*fmt_id).map(|d| d.name.as_str()).unwrap_or("?");
                out.push_str(&format!("{:2} {:6} {}\n", i + 1, count, name));
            }
        }

        let by_bytes = top_table(table, |h| {
            table.counters[h as usize].words_total.saturating_mul(4)
        });
        if !by_bytes.is_empty() {
            out.push_str("\nMessages with the highest buffer usage [bytes]:\n");
            for (i, (fmt_id, bytes)) in by_bytes.iter().enumerate() {
                let name = table.descriptor(*fmt_id).map(|d| d.name.as_str()).unwrap_or("?");
                out.push_str(&format!("{:2} {:6} {}\n", i + 1, bytes, name));
            }
        }
    }

    out
}

/// Contents of Stat_msgs_found.txt and Stat_msgs_missing.txt.
pub fn message_frequency_files(table: &DescriptorTable) -> (String, String) {
    let mut found = String::new();
    let mut missing = String::new();

    for (_, handle) in table.unique() {
        let desc = table.by_handle(handle);
        let counter = table.counters[handle as usize].count_total;

        if counter == 0 {
            missing.push_str(&format!("{}\n", desc.name));
        } else {
            found.push_str(&format!("{:5} - {}\n", counter, desc.name));
        }
    }

    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_tables_track_extremes() {
        let mut s = ValueStats::new("v");
        for (i, v) in [5.0, 1.0, 9.0, 3.0].iter().enumerate() {
            s.add(*v, i as u32 + 1);
        }

        assert_eq!(s.min[0], 1.0);
        assert_eq!(s.min_msg_no[0], 2);
        assert_eq!(s.max[0], 9.0);
        assert_eq!(s.max_msg_no[0], 3);
        assert_eq!(s.counter, 4);
        assert_eq!(s.average(), 4.5);
    }

    #[test]
    fn tables_are_bounded() {
        let mut s = ValueStats::new("v");
        for i in 0..100u32 {
            s.add(i as f64, i);
        }

        assert_eq!(s.table_len(), MIN_MAX_VALUES);
        // Smallest ten values and the largest ten values survive.
        assert_eq!(s.min[0], 0.0);
        assert_eq!(s.min[MIN_MAX_VALUES - 1], 9.0);
        assert_eq!(s.max[0], 99.0);
        assert_eq!(s.max[MIN_MAX_VALUES - 1], 90.0);
    }

    #[test]
    fn duplicate_peaks_keep_their_message_numbers() {
        let mut s = ValueStats::new("v");
        s.add(7.0, 1);
        s.add(7.0, 2);
        assert_eq!(s.max[0], 7.0);
        assert_eq!(s.max[1], 7.0);
        let mut numbers = [s.max_msg_no[0], s.max_msg_no[1]];
        numbers.sort();
        assert_eq!(numbers, [1, 2]);
    }
}
