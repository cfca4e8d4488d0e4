//! Preprocessor macro sets.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Shader definition value for compile-time conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDef {
    /// Boolean definition (`#ifdef`, `#ifndef`). `false` leaves the macro undefined.
    Bool(bool),
    /// Integer definition (`#if VAR == 5`).
    Int(i32),
    /// Unsigned integer definition.
    UInt(u32),
}

impl From<bool> for ShaderDef {
    fn from(v: bool) -> Self {
        ShaderDef::Bool(v)
    }
}

impl From<i32> for ShaderDef {
    fn from(v: i32) -> Self {
        ShaderDef::Int(v)
    }
}

impl From<u32> for ShaderDef {
    fn from(v: u32) -> Self {
        ShaderDef::UInt(v)
    }
}

/// An ordered set of `#define`s passed to the GLSL preprocessor.
///
/// Entries are kept sorted by name, so two sets with the same definitions
/// hash identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MacroSet {
    defines: BTreeMap<String, String>,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ShaderDef>) -> Self {
        self.set(name, value);
        self
    }

    /// Define `name`. `ShaderDef::Bool(false)` removes it instead.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ShaderDef>) -> &mut Self {
        let name = name.into();
        match value.into() {
            ShaderDef::Bool(false) => {
                self.defines.remove(&name);
            }
            ShaderDef::Bool(true) => {
                self.defines.insert(name, String::new());
            }
            ShaderDef::Int(v) => {
                self.defines.insert(name, v.to_string());
            }
            ShaderDef::UInt(v) => {
                self.defines.insert(name, v.to_string());
            }
        }
        self
    }

    /// Add every definition of `other`, overwriting on conflict.
    pub fn merge(&mut self, other: &MacroSet) -> &mut Self {
        for (name, value) in &other.defines {
            self.defines.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Hash of every name and value, used as the macro half of the shader cache key.
    pub fn hash_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn to_naga_defines(&self) -> naga::FastHashMap<String, String> {
        self.defines
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<N: Into<String>, V: Into<ShaderDef>> FromIterator<(N, V)> for MacroSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.set(name, value);
        }
        set
    }
}
