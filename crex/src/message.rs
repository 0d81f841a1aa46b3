use crate::block::Origin;
use crextables::{Fxy, prelude::BTableEntry};
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Value {
    Number(f64),
    Missing,
    String(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Missing => write!(f, "MISSING"),
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Missing | Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            Value::Number(_) | Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// A value qualifying another variable (quality flag, confidence, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub code: Fxy,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct Variable {
    entry: Arc<BTableEntry>,
    value: Value,
    attributes: Vec<Attribute>,
}

impl Variable {
    pub fn new(entry: Arc<BTableEntry>, value: Value) -> Self {
        Self {
            entry,
            value,
            attributes: Vec::new(),
        }
    }

    pub fn code(&self) -> Fxy {
        self.entry.fxy
    }

    pub fn entry(&self) -> &BTableEntry {
        &self.entry
    }

    pub fn name(&self) -> &str {
        &self.entry.element_name_en
    }

    pub fn unit(&self) -> &str {
        self.entry
            .crex_unit()
            .unwrap_or_else(|| self.entry.bufr_unit())
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_missing()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, code: Fxy) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.code == code)
    }

    /// Attaches an attribute, replacing one with the same code.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        match self.attributes.iter_mut().find(|a| a.code == attribute.code) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    fn shows_unit(&self) -> bool {
        !(self.entry.is_string() || self.entry.is_flag_or_code())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = f.width().unwrap_or(0);
        write!(f, "{} {:<width$} : ", self.code(), self.name(), width = width)?;
        match &self.value {
            Value::Missing => write!(f, "MISSING")?,
            Value::String(s) => write!(f, "\"{}\"", s)?,
            Value::Number(n) if self.shows_unit() => write!(f, "{} {}", n, self.unit())?,
            Value::Number(n) => write!(f, "{}", n)?,
        }
        for attribute in &self.attributes {
            write!(f, " [{}={}]", attribute.code, attribute.value)?;
        }
        Ok(())
    }
}

/// Variables produced by one engine pass, in decode order.
#[derive(Debug, Clone, Default)]
pub struct Subset {
    variables: Vec<Variable>,
}

impl Subset {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, variable: Variable) {
        self.variables.push(variable);
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Variable> {
        self.variables.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    /// First variable with `code`.
    pub fn find(&self, code: Fxy) -> Option<&Variable> {
        self.variables.iter().find(|v| v.code() == code)
    }

    /// Every variable with `code`, e.g. the levels of a replicated group.
    pub fn find_all(&self, code: Fxy) -> impl Iterator<Item = &Variable> + '_ {
        self.variables.iter().filter(move |v| v.code() == code)
    }

    pub fn codes(&self) -> Vec<Fxy> {
        self.variables.iter().map(|v| v.code()).collect()
    }
}

impl<'a> IntoIterator for &'a Subset {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

impl Display for Subset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let max_name_len = self
            .variables
            .iter()
            .map(|v| v.name().len())
            .max()
            .unwrap_or(0)
            .min(50);
        for variable in &self.variables {
            writeln!(f, "  {:<max_name_len$}", variable, max_name_len = max_name_len)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Crex,
    Bufr,
}

impl Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Crex => write!(f, "CREX"),
            Encoding::Bufr => write!(f, "BUFR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Display for ReferenceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Identification decoded from a message's framing sections.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub encoding: Encoding,
    pub edition: u8,
    pub master_table: u8,
    pub table_version: u8,
    pub local_table_version: u8,
    pub centre: Option<u16>,
    pub subcentre: Option<u16>,
    pub data_category: u16,
    pub data_subcategory: Option<u16>,
    pub reference_time: Option<ReferenceTime>,
    pub check_digits: bool,
}

/// A fully decoded message. Only built once every subset decoded.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub origin: Origin,
    pub subsets: Vec<Subset>,
}

impl Message {
    pub fn encoding(&self) -> Encoding {
        self.header.encoding
    }

    pub fn subset_count(&self) -> usize {
        self.subsets.len()
    }

    pub fn subsets(&self) -> &[Subset] {
        &self.subsets
    }

    pub fn variable_count(&self) -> usize {
        self.subsets.iter().map(Subset::len).sum()
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "{} edition {} from {} ({} subsets)",
            h.encoding,
            h.edition,
            self.origin,
            self.subsets.len()
        )?;
        writeln!(
            f,
            "  Master table {} v{}, local v{}, category {}{}",
            h.master_table,
            h.table_version,
            h.local_table_version,
            h.data_category,
            h.data_subcategory
                .map(|s| format!("/{s}"))
                .unwrap_or_default()
        )?;
        if let (Some(centre), Some(subcentre)) = (h.centre, h.subcentre) {
            writeln!(f, "  Centre {centre}, sub-centre {subcentre}")?;
        }
        if let Some(time) = &h.reference_time {
            writeln!(f, "  Reference time {time} UTC")?;
        }
        for (idx, subset) in self.subsets.iter().enumerate() {
            writeln!(f, "Subset {} ({} variables):", idx + 1, subset.len())?;
            write!(f, "{}", subset)?;
        }
        Ok(())
    }
}
