//! Module registry interface
//!
//! Describes the functions and constants of importable modules. The file
//! loader lives outside this crate; the analyzer and the IR builder only see
//! the [`ModuleLookup`] trait.

use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Query interface over importable modules
pub trait ModuleLookup {
    fn has_module(&self, module: &str) -> bool;

    fn function(&self, module: &str, name: &str) -> Option<&ModuleFunction>;

    fn constant(&self, module: &str, name: &str) -> Option<&ModuleConstant>;

    /// Names of every module, for suggestions
    fn module_names(&self) -> Vec<&str>;

    /// Names of every member of `module`, for suggestions
    fn member_names(&self, module: &str) -> Vec<&str>;
}

/// `{modules: [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRegistry {
    #[serde(default)]
    pub modules: Vec<ModuleInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<ModuleFunction>,
    #[serde(default)]
    pub constants: Vec<ModuleConstant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFunction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConstant {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub value: ModuleValue,
}

/// Literal value of a module constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Also used for `glyph` constants (one character)
    Text(String),
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_module(mut self, module: ModuleInfo) -> Self {
        self.modules.push(module);
        self
    }

    fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.name == name)
    }
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &str, params: Vec<Type>, ret: Type) -> Self {
        self.functions.push(ModuleFunction {
            name: name.to_string(),
            params,
            ret,
        });
        self
    }

    pub fn with_constant(mut self, name: &str, ty: Type, value: ModuleValue) -> Self {
        self.constants.push(ModuleConstant {
            name: name.to_string(),
            ty,
            value,
        });
        self
    }
}

impl ModuleLookup for ModuleRegistry {
    fn has_module(&self, module: &str) -> bool {
        self.module(module).is_some()
    }

    fn function(&self, module: &str, name: &str) -> Option<&ModuleFunction> {
        self.module(module)?.functions.iter().find(|f| f.name == name)
    }

    fn constant(&self, module: &str, name: &str) -> Option<&ModuleConstant> {
        self.module(module)?.constants.iter().find(|c| c.name == name)
    }

    fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    fn member_names(&self, module: &str) -> Vec<&str> {
        match self.module(module) {
            Some(m) => m
                .functions
                .iter()
                .map(|f| f.name.as_str())
                .chain(m.constants.iter().map(|c| c.name.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }
}
