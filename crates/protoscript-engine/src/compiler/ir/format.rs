//! Serialized IR
//!
//! `{"ir_version": 1, "format": "ProtoScriptIR", "module": {...}}`, validated
//! both when written and when read back.

use super::block::TERMINATOR_OPCODES;
use super::instr::OPCODES;
use super::module::IrModule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const IR_FORMAT: &str = "ProtoScriptIR";
pub const IR_VERSION: u32 = 1;

/// Errors reading or writing serialized IR
#[derive(Debug, Error)]
pub enum IrFormatError {
    #[error("malformed IR JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected IR format '{0}' (expected 'ProtoScriptIR')")]
    WrongFormat(String),

    #[error("unsupported IR version {0}")]
    UnsupportedVersion(u64),

    #[error("unknown opcode '{opcode}' in {function}/{block}")]
    UnknownOpcode {
        function: String,
        block: String,
        opcode: String,
    },

    #[error("invalid IR: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    ir_version: u32,
    format: String,
    module: IrModule,
}

/// Serialize a module after validating it
pub fn write_ir(module: &IrModule) -> Result<String, IrFormatError> {
    module.validate().map_err(IrFormatError::Invalid)?;
    let envelope = Envelope {
        ir_version: IR_VERSION,
        format: IR_FORMAT.to_string(),
        module: module.clone(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parse and validate serialized IR
pub fn read_ir(json: &str) -> Result<IrModule, IrFormatError> {
    let value: Value = serde_json::from_str(json)?;

    match value.get("format").and_then(Value::as_str) {
        Some(IR_FORMAT) => {}
        Some(other) => return Err(IrFormatError::WrongFormat(other.to_string())),
        None => return Err(IrFormatError::WrongFormat(String::new())),
    }
    match value.get("ir_version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(IR_VERSION) => {}
        Some(v) => return Err(IrFormatError::UnsupportedVersion(v)),
        None => return Err(IrFormatError::UnsupportedVersion(0)),
    }

    check_opcodes(&value)?;

    let envelope: Envelope = serde_json::from_value(value)?;
    envelope
        .module
        .validate()
        .map_err(IrFormatError::Invalid)?;
    Ok(envelope.module)
}

/// Reject unknown opcodes with a precise location before typed decoding
fn check_opcodes(value: &Value) -> Result<(), IrFormatError> {
    let functions = value
        .pointer("/module/functions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for func in functions {
        let fname = func.get("name").and_then(Value::as_str).unwrap_or("?");
        let blocks = func
            .get("blocks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for block in blocks {
            let label = block.get("label").and_then(Value::as_str).unwrap_or("?");
            let unknown = |opcode: &str| IrFormatError::UnknownOpcode {
                function: fname.to_string(),
                block: label.to_string(),
                opcode: opcode.to_string(),
            };

            let instrs = block
                .get("instructions")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for instr in instrs {
                let op = instr.get("op").and_then(Value::as_str).unwrap_or("");
                if !OPCODES.contains(&op) {
                    return Err(unknown(op));
                }
            }

            let term = block
                .pointer("/terminator/op")
                .and_then(Value::as_str)
                .unwrap_or("");
            if !TERMINATOR_OPCODES.contains(&term) {
                return Err(unknown(term));
            }
        }
    }
    Ok(())
}
