//! IR Module
//!
//! Top-level container for a compiled program: functions plus the flattened
//! layout of every prototype the functions touch.

use super::function::IrFunction;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// An IR module (compilation unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
    pub prototypes: Vec<IrPrototype>,
}

impl IrModule {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            prototypes: Vec::new(),
        }
    }

    pub fn add_function(&mut self, func: IrFunction) {
        self.functions.push(func);
    }

    pub fn add_prototype(&mut self, proto: IrPrototype) {
        self.prototypes.push(proto);
    }

    /// Get a function by name
    pub fn get_function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut IrFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn get_prototype(&self, name: &str) -> Option<&IrPrototype> {
        self.prototypes.iter().find(|p| p.name == name)
    }

    /// Get the number of functions
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Validate the entire module
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (i, func) in self.functions.iter().enumerate() {
            if let Err(e) = func.validate() {
                errors.push(format!("Function '{}' ({}): {}", func.name, i, e));
            }
            if self.functions[..i].iter().any(|f| f.name == func.name) {
                errors.push(format!("Function '{}' is defined twice", func.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get total instruction count across all functions
    pub fn total_instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instruction_count()).sum()
    }
}

/// Flattened layout of a prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrPrototype {
    pub name: String,
    /// Runtime identity stored in every instance header
    pub proto_id: u32,
    pub parent: Option<String>,
    /// Every field, inherited ones first
    pub fields: Vec<IrField>,
}

impl IrPrototype {
    pub fn new(name: impl Into<String>, proto_id: u32, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            proto_id,
            parent,
            fields: Vec::new(),
        }
    }

    /// Get a field by name
    pub fn get_field(&self, name: &str) -> Option<(usize, &IrField)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// A field slot in a prototype layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrField {
    pub name: String,
    pub ty: Type,
}

impl IrField {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}
