// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Debug pretty-printer
//!
//! Renders any structure as an indented tree of
//! `field name: declared type = value` lines, recursing into nested
//! structures, arrays and union payloads. Diagnostics only; the output has
//! no bearing on wire correctness.

use std::fmt::Write;

use crate::descriptor::resolve;
use crate::structure::{TpmStructure, Value};

/// Renders `s` as a human-readable tree.
pub fn render(s: &dyn TpmStructure) -> String {
    let mut out = String::new();
    render_struct(&mut out, s, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn render_struct(out: &mut String, s: &dyn TpmStructure, depth: usize) {
    indent(out, depth);
    let _ = writeln!(out, "{}", s.type_name());
    let descs = match resolve(s.wire_spec(), s.type_name()) {
        Ok(d) => d,
        Err(err) => {
            indent(out, depth + 1);
            let _ = writeln!(out, "<unresolvable: {err}>");
            return;
        }
    };
    for d in descs.iter() {
        indent(out, depth + 1);
        let _ = write!(out, "{}: {}", d.name, d.type_name);
        render_value(out, s.wire_get(d.name), depth + 1);
    }
}

fn render_value(out: &mut String, value: Value, depth: usize) {
    match value {
        Value::U8(v) => {
            let _ = writeln!(out, " = {v:#04x}");
        }
        Value::U16(v) => {
            let _ = writeln!(out, " = {v:#06x}");
        }
        Value::U32(v) => {
            let _ = writeln!(out, " = {v:#010x}");
        }
        Value::U64(v) => {
            let _ = writeln!(out, " = {v:#018x}");
        }
        Value::Bytes(b) => {
            let _ = writeln!(out, " = [{}] {}", b.len(), hex::encode(&b));
        }
        Value::Absent => {
            let _ = writeln!(out, " = <absent>");
        }
        Value::Struct(inner) => {
            out.push('\n');
            render_struct(out, inner.as_ref(), depth + 1);
        }
        Value::List(items) => {
            let _ = writeln!(out, " [{}]", items.len());
            for item in items {
                render_value_line(out, item, depth + 1);
            }
        }
    }
}

fn render_value_line(out: &mut String, value: Value, depth: usize) {
    match value {
        Value::Struct(inner) => render_struct(out, inner.as_ref(), depth),
        other => {
            indent(out, depth);
            out.push('-');
            render_value(out, other, depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TpmsPcrSelection, TpmlPcrSelection};
    use crate::constants::TpmAlgId;

    #[test]
    fn test_render_nested_tree() {
        let list = TpmlPcrSelection {
            pcr_selections: vec![TpmsPcrSelection::new(TpmAlgId::Sha256, &[0, 7])],
        };
        let text = render(&list);
        assert!(text.contains("TpmlPcrSelection"), "{text}");
        assert!(text.contains("pcr_selections"), "{text}");
        assert!(text.contains("TpmsPcrSelection"), "{text}");
        assert!(text.contains("hash: u16"), "{text}");
    }
}
