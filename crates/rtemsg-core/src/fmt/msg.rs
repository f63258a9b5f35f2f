// crates/rtemsg-core/src/fmt/msg.rs
//
// MSG0..MSG4, MSGN, MSGX and EXT_MSG directive parsing. The directive
// fixes the message kind and length and reserves an aligned block of
// format IDs; the message name is the entire directive token (the kind
// prefix included).

use crate::codes::ErrorCode;
use crate::descriptor::{MessageDescriptor, MsgKind};

use super::report::PResult;
use super::{Compiler, Cursor, FileCtx};

/// Max. MSGN length in 32-bit data words.
const MAX_MSGN_WORDS: u32 = 1024;

impl<'a> Compiler<'a> {
    pub(super) fn parse_msg_directives(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        let rest = cur.rest();

        if rest.starts_with("MSGN") {
            self.parse_msg_directive(f, cur, "MSGN", MsgKind::Variable)
        } else if rest.starts_with("MSGX") {
            self.parse_msg_directive(f, cur, "MSGX", MsgKind::SelfSized)
        } else if rest.starts_with("MSG") {
            self.parse_msg_directive(f, cur, "MSG", MsgKind::Fixed)
        } else if rest.starts_with("EXT_MSG") {
            self.parse_msg_directive(f, cur, "EXT_MSG", MsgKind::Extended)
        } else {
            self.abort(f, ErrorCode::ParseUnrecognizedDirective, rest)
        }
    }

    fn parse_msg_directive(
        &mut self,
        f: &mut FileCtx,
        cur: &mut Cursor,
        keyword: &str,
        kind: MsgKind,
    ) -> PResult<()> {
        self.check_last_msg_empty(f);

        if f.line.new_message.is_some() {
            return self.abort(f, ErrorCode::ParseMsgMultipleInLine, cur.rest());
        }

        if f.line.in_file_select || f.line.out_file_select {
            return self.abort(f, ErrorCode::ParseMsgInLineAfterInOutSelect, cur.rest());
        }

        let start = cur.pos;
        cur.eat_keyword(keyword);

        let handle = self.table.register(MessageDescriptor::new("", kind));

        let fmt_ids = match kind {
            MsgKind::Fixed => {
                let words = match cur.take_unsigned() {
                    Some(n) => n,
                    None => return self.abort(f, ErrorCode::ParseMsgSize0To4, cur.rest()),
                };
                if words > 4 {
                    return self.abort(f, ErrorCode::ParseMsgSize0To4, cur.rest());
                }
                self.table.by_handle_mut(handle).msg_len = 4 * words;
                1u32 << words
            }

            MsgKind::Extended => {
                let words = match cur.take_unsigned() {
                    Some(n) => n,
                    None => return self.abort(f, ErrorCode::ParseExtMsgSize, cur.rest()),
                };
                if words > 4 {
                    return self.abort(f, ErrorCode::ParseExtMsgSize, cur.rest());
                }
                if !cur.eat('_') {
                    return self.abort(f, ErrorCode::ParseExpectingUnderscore, cur.rest());
                }
                let bits = match cur.take_unsigned() {
                    Some(n) => n,
                    None => return self.abort(f, ErrorCode::ParseExtMsgNoBits, cur.rest()),
                };
                if bits < 1 || bits > 8 - words {
                    return self.abort(f, ErrorCode::ParseExtMsgNoBits, cur.rest());
                }

                let desc = self.table.by_handle_mut(handle);
                desc.ext_data_mask = ((1u32 << bits) - 1) as u16;
                desc.msg_len = 4 + words * 4;
                1u32 << (bits + words)
            }

            MsgKind::Variable => {
                if cur.peek() == Some('_') {
                    // Length unknown at compile time.
                    16
                } else {
                    let words = match cur.take_unsigned() {
                        Some(n) => n,
                        None => return self.abort(f, ErrorCode::ParseValueInvalidChar, cur.rest()),
                    };
                    if words > MAX_MSGN_WORDS {
                        return self.abort(f, ErrorCode::ParseMsgDefinitionTooBig, cur.rest());
                    }
                    if words == 0 {
                        return self.abort(f, ErrorCode::ParseMsg0NotAllowed, cur.rest());
                    }
                    self.table.by_handle_mut(handle).msg_len = words * 4;
                    16
                }
            }

            MsgKind::SelfSized => 16,
        };

        let Some(fmt_id) = self.table.assign_fmt_id(fmt_ids, handle) else {
            self.reporter.stop_parsing();
            return self.abort(f, ErrorCode::ParseFmtIdNotAssigned, cur.rest());
        };

        // The directive continues with '_' and at least one name character.
        let next_two: Vec<char> = cur.rest().chars().take(2).collect();
        if next_two.first() != Some(&'_')
            || !next_two.get(1).is_some_and(|c| c.is_ascii_alphanumeric())
        {
            return self.abort(f, ErrorCode::ParseMsgDefinition, cur.rest());
        }

        cur.pos = start;
        let name = cur.take_name().to_owned();

        if self.table.find_by_name(&name).is_some() {
            return self.abort(f, ErrorCode::ParseMsgNameExists, &name);
        }

        self.table.by_handle_mut(handle).name = name.clone();
        self.cur_msg = Some(handle);
        f.line.new_message = Some(handle);
        self.write_define(f, &name, fmt_id);

        Ok(())
    }
}
