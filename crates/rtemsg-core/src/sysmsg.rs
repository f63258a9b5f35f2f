// crates/rtemsg-core/src/sysmsg.rs
//
// System messages logged by the embedded library itself. The two MSG1
// messages occupy the four lowest format IDs; the streaming marker uses
// the topmost ID. User messages start at FMT_START(4) or above.

use crate::descriptor::{
    DataType, DescriptorTable, FieldDescriptor, MessageDescriptor, MsgKind, PrintType,
};
use crate::header::HeaderInfo;

/// High 32 bits of the timestamp counter (payload of one DATA word).
pub const LONG_TIMESTAMP: u32 = 0;
/// New timestamp counter frequency in Hz.
pub const TSTAMP_FREQUENCY: u32 = 2;

/// End-of-block marker inserted by the host tools in the streaming and
/// multiple-capture modes; always the topmost format ID.
pub fn streaming_mark(hdr: &HeaderInfo) -> u32 {
    hdr.topmost_fmt_id
}

// Sub-codes of the streaming marker (bits 11..15 of the raw timestamp).
pub const SYS_HOST_DATE_TIME_INFO: u32 = 0;
pub const SYS_DATA_OVERRUN_DETECTED: u32 = 1;
pub const SYS_MULTIPLE_LOGGING: u32 = 2;

fn one_word_field(fmt: &str) -> FieldDescriptor {
    FieldDescriptor {
        fmt_string: fmt.to_owned(),
        bit_address: 0,
        bit_size: 32,
        data_type: DataType::U64,
        print_type: PrintType::Uint,
        ..Default::default()
    }
}

/// Register the descriptors of the system messages. Called before the
/// format files are parsed so that the ID assignment starts past them.
pub fn install_system_descriptors(table: &mut DescriptorTable, topmost_fmt_id: u32) {
    let mut long_ts = MessageDescriptor::new("LONG_TIMESTAMP", MsgKind::Fixed);
    long_ts.msg_len = 4;
    long_ts.fields.push(one_word_field("0x%08X"));
    let handle = table.register(long_ts);
    table.assign_fmt_id(2, handle);

    let mut freq = MessageDescriptor::new("TSTAMP_FREQUENCY", MsgKind::Fixed);
    freq.msg_len = 4;
    freq.fields.push(one_word_field("%u Hz"));
    let handle = table.register(freq);
    table.assign_fmt_id(2, handle);

    // The marker carries one data word with host date/time information;
    // its content prints through the dedicated streaming-message path.
    let mut sys = MessageDescriptor::new("sys", MsgKind::Fixed);
    sys.msg_len = 4;
    sys.fields.push(FieldDescriptor {
        print_type: PrintType::PlainText,
        ..Default::default()
    });
    let handle = table.register(sys);
    table.bind_slot(topmost_fmt_id, handle);
}
