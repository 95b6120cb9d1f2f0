use std::{collections::HashMap, sync::Arc};

use super::{Chain, Ty};

/// A user-defined function (`def name(a, int b) { ... }`).
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Chain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<Ty>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A lightweight record type (`proto Person { String name; def greet() { .. } }`).
#[derive(Debug)]
pub struct Proto {
    pub name: Arc<str>,
    pub fields: Vec<ProtoField>,
    pub methods: HashMap<String, Arc<Function>>,
}

#[derive(Debug)]
pub struct ProtoField {
    pub name: String,
    pub ty: Option<Ty>,
    /// Initialiser evaluated for every new instance
    pub init: Option<Chain>,
}

impl Proto {
    pub fn field(&self, name: &str) -> Option<&ProtoField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Arc<Function>> {
        self.methods.get(name)
    }
}
