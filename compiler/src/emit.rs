// emit.rs — Descriptor emission for the graph serializer
//
// Turns the canonical descriptors of a pass run into serializable records:
// per operand its label, class, IR type and, for attributes, the literal it
// holds.
//
// Preconditions: descriptors came from `run_op_pass` on the same function, so
//   every attribute operand is a direct literal.
// Postconditions: records preserve descriptor and operand order.
// Failure modes: JSON serialization of these plain records does not fail.
// Side effects: none.

use std::fmt::Write;

use serde::Serialize;

use crate::constant::{constant_value, ConstantValue};
use crate::decode::OperationDescriptor;
use crate::dtype::TargetInfo;
use crate::ir::Function;
use crate::opclass::OperandClass;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperandRecord {
    pub label: String,
    pub class: OperandClass,
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ConstantValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpRecord {
    pub function: String,
    pub op_name: String,
    pub encoded_name: String,
    pub operands: Vec<OperandRecord>,
}

/// Build the records for one function's operations.
pub fn op_records(
    func: &Function,
    ops: &[OperationDescriptor],
    target: &TargetInfo,
) -> Vec<OpRecord> {
    ops.iter()
        .map(|desc| {
            let operands = desc
                .operand_classes
                .iter()
                .zip(desc.operands(func))
                .map(|(entry, operand)| OperandRecord {
                    label: entry.label.clone(),
                    class: entry.class,
                    ty: func.ty(operand).to_string(),
                    value: if entry.class.is_input() {
                        None
                    } else {
                        constant_value(func, operand, target)
                    },
                })
                .collect();
            OpRecord {
                function: func.name.clone(),
                op_name: desc.op_name.clone(),
                encoded_name: desc.builtin_name.clone(),
                operands,
            }
        })
        .collect()
}

/// Pretty-printed JSON array of records.
pub fn to_json(records: &[OpRecord]) -> String {
    match serde_json::to_string_pretty(records) {
        Ok(mut json) => {
            json.push('\n');
            json
        }
        Err(e) => error_json(&e.to_string()),
    }
}

fn error_json(message: &str) -> String {
    let mut json = serde_json::json!({ "error": message }).to_string();
    json.push('\n');
    json
}

fn format_value(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Integer { value, bits } => format!("{}:i{}", value, bits),
        ConstantValue::Float { value, bits } => format!("{:?}:f{}", value, bits),
        ConstantValue::String { value } => format!("{:?}", value),
        ConstantValue::TypeMarker { ty, dtype } => match dtype {
            Some(dtype) => format!("type {} ({:?})", ty, dtype),
            None => format!("type {}", ty),
        },
    }
}

/// One line per operation, one indented line per operand.
pub fn format_ops(records: &[OpRecord]) -> String {
    let mut out = String::new();
    for rec in records {
        let _ = writeln!(out, "@{}: {}", rec.function, rec.op_name);
        for (i, operand) in rec.operands.iter().enumerate() {
            let label = if operand.label.is_empty() {
                "_"
            } else {
                operand.label.as_str()
            };
            let _ = write!(out, "  {:>2} {:<8} {:?}", i, label, operand.class);
            match &operand.value {
                Some(value) => {
                    let _ = writeln!(out, " = {}", format_value(value));
                }
                None => {
                    let _ = writeln!(out, " : {}", operand.ty);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::parse_module;
    use crate::dtype::DType;
    use crate::pipeline::{run_op_pass, PassOptions};

    fn records(source: &str) -> Vec<OpRecord> {
        let built = parse_module("t.tfir", source);
        assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
        let mut func = built.module.functions[0].clone();
        let options = PassOptions::default();
        let result = run_op_pass(&mut func, &options);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        op_records(&func, &result.ops, &options.target)
    }

    const SOURCE: &str = r#"
        func @f {
          %a = argument 0 : TensorHandle<Float>
          %x = integer_literal 1 : Builtin.Int64
          %i = struct (%x) : Int
          %m = metatype : Metatype<Float>
          %r = builtin "__tfop_Op,$in,axis,T$dtype" (%a, %i, %m) : TensorHandle<Float>
        }
    "#;

    #[test]
    fn attributes_carry_their_values() {
        let recs = records(SOURCE);
        assert_eq!(recs.len(), 1);
        let ops = &recs[0].operands;
        assert_eq!(recs[0].op_name, "Op");
        assert_eq!(ops[0].value, None);
        assert_eq!(ops[0].class, OperandClass::Input);
        assert_eq!(
            ops[1].value,
            Some(ConstantValue::Integer { value: 1, bits: 64 })
        );
        assert_eq!(
            ops[2].value,
            Some(ConstantValue::TypeMarker {
                ty: "Float".to_string(),
                dtype: Some(DType::Float),
            })
        );
    }

    #[test]
    fn json_is_an_array_of_ops() {
        let json = to_json(&records(SOURCE));
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let ops = parsed.as_array().expect("array");
        assert_eq!(ops[0]["op_name"], "Op");
        assert_eq!(ops[0]["operands"][1]["value"]["kind"], "integer");
        assert_eq!(ops[0]["operands"][2]["value"]["dtype"], "Float");
        assert!(ops[0]["operands"][0].get("value").is_none());
    }

    #[test]
    fn text_form_lists_operands() {
        let text = format_ops(&records(SOURCE));
        assert!(text.starts_with("@f: Op\n"));
        assert!(text.contains("axis"));
        assert!(text.contains("= 1:i64"));
        assert!(text.contains("= type Float (Float)"));
    }

    #[test]
    fn error_fallback_is_escaped_json() {
        let json = error_json("bad \"value\"\nat line 2");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed["error"], "bad \"value\"\nat line 2");
        assert!(json.ends_with('\n'));
    }
}
