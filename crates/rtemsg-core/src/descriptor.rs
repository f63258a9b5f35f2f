// crates/rtemsg-core/src/descriptor.rs
//
// Compiled message descriptors. Format IDs index a flat slot table whose
// entries are handles into an owned arena; an aligned range of IDs shares
// one handle. Descriptors are immutable once compilation succeeds -
// per-run counters live in a parallel table indexed by the same handle.

use crate::config::MAX_FMT_IDS;
use crate::symbols::EnumIdx;

pub type DescHandle = u32;

/// How the decoder interprets the assembled payload of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    /// MSG0..MSG4: length fixed at compile time (0..=4 words).
    Fixed,
    /// MSGN / MSGN_k: variable length, 0 = unknown at compile time.
    Variable,
    /// EXT_MSGm_k: fixed length plus k bits recovered from the format ID.
    Extended,
    /// MSGX: the last payload byte carries the length.
    SelfSized,
}

/// Type the raw bits are coerced to before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// 32-bit word interpreted according to the print type.
    #[default]
    Auto,
    U64,
    I64,
    F64,
    Str,
    Timestamp,
    DeltaTimestamp,
    Memo,
    TimeDiff,
    MsgNo,
}

/// Rendering routine selected by the format type character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintType {
    /// No format directive in the sub-string.
    #[default]
    PlainText,
    Str,
    SelectedText,
    Uint,
    Int,
    Double,
    BinaryDigits,
    Timestamp,
    DeltaTimestamp,
    MsgNo,
    HexDump1,
    HexDump2,
    HexDump4,
    BinToFile,
    Date,
    MsgName,
}

/// Special routing of the rendered text (VCD sinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecialFmt {
    #[default]
    None,
    /// Append the rendered text to the sink's variable assembly.
    VcdWork,
    /// Append and then parse/write the assembled variable.
    VcdFinalize,
}

/// Formatting data for a single value of a message.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    pub fmt_string: String,
    pub out_file: EnumIdx,
    pub in_file: EnumIdx,
    pub get_memo: EnumIdx,
    pub put_memo: EnumIdx,
    /// Format ID whose last timestamp anchors a [t-NAME] difference (0 = none).
    pub fmt_id_timer: u32,
    pub bit_address: u32,
    pub bit_size: u32,
    pub data_type: DataType,
    pub print_type: PrintType,
    pub also_to_main_log: bool,
    pub special_fmt: SpecialFmt,
    /// Scaling: value = (raw + offset) * mult; mult == 0 disables scaling.
    pub mult: f64,
    pub offset: f64,
    /// Handle into the statistics pool (None = no statistics).
    pub value_stat: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub name: String,
    pub kind: MsgKind,
    /// Expected message length in bytes (0 = unknown at compile time).
    pub msg_len: u32,
    /// Low format-ID bits that carry extended data (EXT_MSG only).
    pub ext_data_mask: u16,
    pub fields: Vec<FieldDescriptor>,
}

/// Mutable per-run message counters, parallel to the descriptor arena.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgCounters {
    /// Messages decoded since the last restart/snapshot marker.
    pub count_since_reset: u32,
    /// Messages decoded in total.
    pub count_total: u32,
    /// Buffer words consumed by this message kind (FMT words included).
    pub words_total: u32,
    /// Timestamp [s] of the most recent message of this kind.
    pub last_timestamp_s: f64,
}

pub struct DescriptorTable {
    slots: Vec<Option<DescHandle>>,
    arena: Vec<MessageDescriptor>,
    pub counters: Vec<MsgCounters>,
    /// Highest slot index ever reserved (alignment gaps included).
    pub fmt_ids_defined: u32,
    /// Lower bound for the next ID search (FMT_START / FMT_ALIGN floor).
    align_floor: u32,
    /// One past the last ID usable for user messages.
    pub topmost_fmt_id: u32,
}

impl DescriptorTable {
    pub fn new(topmost_fmt_id: u32) -> Self {
        DescriptorTable {
            slots: vec![None; MAX_FMT_IDS],
            arena: Vec::new(),
            counters: Vec::new(),
            fmt_ids_defined: 0,
            align_floor: 0,
            topmost_fmt_id,
        }
    }

    /// Move a descriptor into the arena. The returned handle is not yet
    /// bound to any format ID.
    pub fn register(&mut self, desc: MessageDescriptor) -> DescHandle {
        let handle = self.arena.len() as DescHandle;
        self.arena.push(desc);
        self.counters.push(MsgCounters::default());
        handle
    }

    pub fn by_handle(&self, handle: DescHandle) -> &MessageDescriptor {
        &self.arena[handle as usize]
    }

    pub fn by_handle_mut(&mut self, handle: DescHandle) -> &mut MessageDescriptor {
        &mut self.arena[handle as usize]
    }

    pub fn handle_at(&self, fmt_id: u32) -> Option<DescHandle> {
        self.slots.get(fmt_id as usize).copied().flatten()
    }

    pub fn descriptor(&self, fmt_id: u32) -> Option<&MessageDescriptor> {
        self.handle_at(fmt_id).map(|h| &self.arena[h as usize])
    }

    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    /// Assign `count` consecutive format IDs (a power of two) to the
    /// descriptor. The search starts at the alignment floor and the first
    /// ID of the range is aligned to `count`. Returns the first ID.
    pub fn assign_fmt_id(&mut self, count: u32, handle: DescHandle) -> Option<u32> {
        if count == 0 || !count.is_power_of_two() {
            return None;
        }

        // Skip the IDs assigned below the floor already.
        while self.align_floor < self.topmost_fmt_id
            && self.slots[self.align_floor as usize].is_some()
        {
            self.align_floor += 1;
        }

        let mut fmt_id = (self.align_floor + count - 1) & !(count - 1);

        let mut found = false;
        while fmt_id < self.topmost_fmt_id {
            let range = fmt_id as usize..(fmt_id + count) as usize;
            if self.slots[range].iter().all(|s| s.is_none()) {
                found = true;
                break;
            }
            fmt_id += count;
        }

        if !found {
            return None;
        }

        let limit = fmt_id.checked_add(count)?;
        if limit > self.topmost_fmt_id {
            return None;
        }

        for slot in &mut self.slots[fmt_id as usize..limit as usize] {
            *slot = Some(handle);
        }

        if limit > self.fmt_ids_defined {
            self.fmt_ids_defined = limit;
        }

        Some(fmt_id)
    }

    /// Bind a handle to an explicit slot. Used for the system message at
    /// the topmost format ID; the slot sits past the user range and must
    /// not advance the assignment cursor.
    pub fn bind_slot(&mut self, fmt_id: u32, handle: DescHandle) {
        self.slots[fmt_id as usize] = Some(handle);
    }

    /// Raise the floor for the next ID search (FMT_START).
    pub fn set_start(&mut self, fmt_id: u32) {
        self.fmt_ids_defined = fmt_id;
        self.align_floor = fmt_id;
    }

    /// Round the floor up to a power-of-two boundary (FMT_ALIGN).
    pub fn align_to(&mut self, alignment: u32) {
        let aligned = (self.fmt_ids_defined + alignment - 1) & !(alignment - 1);
        self.fmt_ids_defined = aligned;
        self.align_floor = aligned;
    }

    pub fn align_floor(&self) -> u32 {
        self.align_floor
    }

    /// First format ID carrying a descriptor with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<u32> {
        let mut last: Option<DescHandle> = None;

        for fmt_id in 0..self.fmt_ids_defined {
            let Some(handle) = self.slots[fmt_id as usize] else { continue };
            if last == Some(handle) {
                continue;
            }
            last = Some(handle);

            if self.arena[handle as usize].name == name {
                return Some(fmt_id);
            }
        }

        None
    }

    /// Iterate unique descriptors in slot order as (first_fmt_id, handle).
    pub fn unique(&self) -> Vec<(u32, DescHandle)> {
        let mut out = Vec::new();
        let mut last: Option<DescHandle> = None;

        for fmt_id in 0..self.fmt_ids_defined.min(MAX_FMT_IDS as u32) {
            let Some(handle) = self.slots[fmt_id as usize] else { continue };
            if last == Some(handle) {
                continue;
            }
            last = Some(handle);
            out.push((fmt_id, handle));
        }

        out
    }

    /// Number of slots with a descriptor below the user ID range.
    pub fn slots_used(&self) -> u32 {
        let limit = self.fmt_ids_defined.min(self.topmost_fmt_id) as usize;
        self.slots[..limit].iter().filter(|s| s.is_some()).count() as u32
    }
}

impl MessageDescriptor {
    pub fn new(name: &str, kind: MsgKind) -> Self {
        MessageDescriptor {
            name: name.to_owned(),
            kind,
            msg_len: 0,
            ext_data_mask: 0,
            fields: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DescriptorTable {
        DescriptorTable::new((1 << 9) - 2)
    }

    fn msg(name: &str) -> MessageDescriptor {
        MessageDescriptor::new(name, MsgKind::Fixed)
    }

    #[test]
    fn ids_are_aligned_to_request_size() {
        let mut t = table();
        let a = t.register(msg("A"));
        let b = t.register(msg("B"));
        let c = t.register(msg("C"));

        assert_eq!(t.assign_fmt_id(1, a), Some(0));
        assert_eq!(t.assign_fmt_id(4, b), Some(4));
        assert_eq!(t.assign_fmt_id(2, c), Some(2));

        // All four reserved slots point at the same descriptor.
        for id in 4..8 {
            assert_eq!(t.handle_at(id), Some(b));
        }
        assert_eq!(t.fmt_ids_defined, 8);
    }

    #[test]
    fn fmt_start_moves_the_floor() {
        let mut t = table();
        let a = t.register(msg("A"));
        t.set_start(4);
        assert_eq!(t.assign_fmt_id(1, a), Some(4));
    }

    #[test]
    fn assignment_fails_past_topmost() {
        let mut t = DescriptorTable::new(4);
        let a = t.register(msg("A"));
        assert_eq!(t.assign_fmt_id(4, a), Some(0));
        let b = t.register(msg("B"));
        assert_eq!(t.assign_fmt_id(1, b), None);
    }

    #[test]
    fn find_by_name_dedups_aliased_slots() {
        let mut t = table();
        let a = t.register(msg("FIRST"));
        let b = t.register(msg("SECOND"));
        t.assign_fmt_id(4, a);
        t.assign_fmt_id(2, b);

        assert_eq!(t.find_by_name("FIRST"), Some(0));
        assert_eq!(t.find_by_name("SECOND"), Some(4));
        assert_eq!(t.find_by_name("NONE"), None);
        assert_eq!(t.unique().len(), 2);
    }
}
