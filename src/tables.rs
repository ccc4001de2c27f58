//! Symbol table, macro table, and external-reference list.
//!
//! Both tables are closed-addressing hash tables with a fixed bucket
//! count. The hash is the classic `h = byte + 31·h` fold. Bucket chains
//! keep insertion order, and table iteration walks buckets in index order,
//! which is the order the `.ent` file depends on.

use crate::diagnostics::ErrorKind;
use bitflags::bitflags;
use serde::Serialize;

/// Number of hash buckets. Any input-independent constant works; 64 keeps
/// chains short for realistic symbol counts.
pub const HASH_BUCKETS: usize = 64;

fn hash(name: &str) -> usize {
    let h = name
        .bytes()
        .fold(0u32, |h, b| u32::from(b).wrapping_add(h.wrapping_mul(31)));
    h as usize % HASH_BUCKETS
}

bitflags! {
    /// Symbol attributes. `CODE`/`DATA` are mutually exclusive;
    /// `EXTERNAL` excludes everything else; `ENTRY` may ride along with
    /// `CODE` or `DATA`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolAttrs: u8 {
        /// Defined by an operation line.
        const CODE = 1;
        /// Defined by `.data` or `.string`.
        const DATA = 2;
        /// Exported via `.entry`.
        const ENTRY = 4;
        /// Imported via `.extern`.
        const EXTERNAL = 8;
    }
}

impl SymbolAttrs {
    /// Names of the set attributes, for reports and dumps.
    pub fn names(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.contains(SymbolAttrs::CODE) {
            out.push("code");
        }
        if self.contains(SymbolAttrs::DATA) {
            out.push("data");
        }
        if self.contains(SymbolAttrs::ENTRY) {
            out.push("entry");
        }
        if self.contains(SymbolAttrs::EXTERNAL) {
            out.push("external");
        }
        out
    }
}

/// One symbol-table entry.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Identifier, already validated by the caller.
    pub name: String,
    /// Address after counter adjustment; 0 for externals.
    pub value: u32,
    /// `value` rounded down to a multiple of 16.
    pub base: u32,
    /// `value mod 16`.
    pub offset: u32,
    /// Attribute set.
    pub attrs: SymbolAttrs,
}

impl Symbol {
    fn set_value(&mut self, value: u32) {
        let (base, offset) = base_and_offset(value);
        self.value = value;
        self.base = base;
        self.offset = offset;
    }

    /// The address written to the `.ent` file.
    pub fn address(&self) -> u32 {
        self.base + self.offset
    }
}

/// Serializable symbol summary for reports.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolSummary {
    /// Identifier.
    pub name: String,
    /// Final address.
    pub value: u32,
    /// Attribute names in canonical order.
    pub attrs: Vec<&'static str>,
}

/// Closed-addressing symbol table.
#[derive(Debug)]
pub struct SymbolTable {
    buckets: Vec<Vec<Symbol>>,
    entries_count: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Empty table.
    pub fn new() -> Self {
        SymbolTable {
            buckets: vec![Vec::new(); HASH_BUCKETS],
            entries_count: 0,
        }
    }

    /// Find a symbol by name.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.buckets[hash(name)].iter().find(|s| s.name == name)
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.buckets[hash(name)]
            .iter_mut()
            .find(|s| s.name == name)
    }

    /// True if a symbol by that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Add or merge a symbol.
    ///
    /// A new name is installed with the given attributes and (if supplied)
    /// value. An existing name is merged: attributes are OR-ed in and the
    /// value replaced when supplied, unless the combination is illegal:
    /// attaching anything local to an external, marking a local symbol
    /// external, or making a name both code and data.
    pub fn add_symbol(
        &mut self,
        name: &str,
        value: Option<u32>,
        attrs: SymbolAttrs,
    ) -> Result<(), ErrorKind> {
        if let Some(existing) = self.lookup_mut(name) {
            let local = attrs.intersects(
                SymbolAttrs::CODE | SymbolAttrs::DATA | SymbolAttrs::ENTRY,
            );
            if existing.attrs.contains(SymbolAttrs::EXTERNAL) && (local || value.is_some()) {
                return Err(ErrorKind::OverrideExternal);
            }
            if existing
                .attrs
                .intersects(SymbolAttrs::CODE | SymbolAttrs::DATA | SymbolAttrs::ENTRY)
                && attrs.contains(SymbolAttrs::EXTERNAL)
            {
                return Err(ErrorKind::OverrideLocalWithExternal);
            }
            if (attrs.contains(SymbolAttrs::CODE) && existing.attrs.contains(SymbolAttrs::DATA))
                || (attrs.contains(SymbolAttrs::DATA)
                    && existing.attrs.contains(SymbolAttrs::CODE))
                || attrs.contains(SymbolAttrs::CODE | SymbolAttrs::DATA)
            {
                return Err(ErrorKind::NameAlreadyInUse);
            }
            existing.attrs |= attrs;
            if let Some(v) = value {
                existing.set_value(v);
            }
            return Ok(());
        }

        let mut symbol = Symbol {
            name: name.to_string(),
            value: 0,
            base: 0,
            offset: 0,
            attrs,
        };
        if let Some(v) = value {
            symbol.set_value(v);
        }
        self.buckets[hash(name)].push(symbol);
        Ok(())
    }

    /// True if `name` is bound to a symbol with a body (code or data).
    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|s| s.attrs.intersects(SymbolAttrs::CODE | SymbolAttrs::DATA))
            .unwrap_or(false)
    }

    /// True if `name` is an external symbol.
    pub fn is_external(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|s| s.attrs.contains(SymbolAttrs::EXTERNAL))
            .unwrap_or(false)
    }

    /// True if `name` is an entry symbol.
    pub fn is_entry(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|s| s.attrs.contains(SymbolAttrs::ENTRY))
            .unwrap_or(false)
    }

    /// Iterate all symbols in table-iteration order: buckets by index,
    /// each bucket in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.buckets.iter().flatten()
    }

    /// Number of entry symbols counted during finalization.
    pub fn entries_count(&self) -> u32 {
        self.entries_count
    }

    /// Finalize the table between the passes: every data symbol is moved
    /// past the code segment by adding `icf`, entry symbols are counted,
    /// and every external symbol gets a head node in the reference list.
    pub fn finalize(&mut self, icf: u32, externals: &mut ExternalList) {
        self.entries_count = 0;
        for bucket in &mut self.buckets {
            for symbol in bucket.iter_mut() {
                if symbol.attrs.contains(SymbolAttrs::ENTRY) {
                    self.entries_count += 1;
                }
                if symbol.attrs.contains(SymbolAttrs::EXTERNAL) {
                    externals.declare(&symbol.name);
                }
                if symbol.attrs.contains(SymbolAttrs::DATA) {
                    let value = symbol.value + icf;
                    symbol.set_value(value);
                }
            }
        }
    }

    /// Serializable summaries in table-iteration order.
    pub fn summaries(&self) -> Vec<SymbolSummary> {
        self.iter()
            .map(|s| SymbolSummary {
                name: s.name.clone(),
                value: s.value,
                attrs: s.attrs.names(),
            })
            .collect()
    }
}

impl std::fmt::Display for SymbolTable {
    /// Tabular dump: name, value, base, offset, attributes.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name\tvalue\tbase\toffset\tattributes")?;
        for s in self.iter() {
            writeln!(
                f,
                "{}\t{}\t{}\t{}\t{}",
                s.name,
                s.value,
                s.base,
                s.offset,
                s.attrs.names().join(",")
            )?;
        }
        Ok(())
    }
}

/// One macro definition: the body is the verbatim text between the
/// `macr NAME` line and the `endmacr` line.
#[derive(Debug, Clone)]
pub struct Macro {
    /// Macro name.
    pub name: String,
    /// Captured body lines, each without a trailing newline.
    pub body: Vec<String>,
}

/// Closed-addressing macro table.
#[derive(Debug)]
pub struct MacroTable {
    buckets: Vec<Vec<Macro>>,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// Empty table.
    pub fn new() -> Self {
        MacroTable {
            buckets: vec![Vec::new(); HASH_BUCKETS],
        }
    }

    /// Find a macro by name.
    pub fn lookup(&self, name: &str) -> Option<&Macro> {
        self.buckets[hash(name)].iter().find(|m| m.name == name)
    }

    /// True if a macro by that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Install a macro; duplicate names are rejected.
    pub fn add_macro(&mut self, name: &str, body: Vec<String>) -> Result<(), ErrorKind> {
        if self.contains(name) {
            return Err(ErrorKind::MacroNameInUse);
        }
        self.buckets[hash(name)].push(Macro {
            name: name.to_string(),
            body,
        });
        Ok(())
    }
}

/// One use site of an external symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefSite {
    /// Address of the word awaiting relocation.
    pub base: u32,
    /// Companion address recorded alongside the base.
    pub offset: u32,
}

#[derive(Debug)]
struct ExternalEntry {
    name: String,
    sites: Vec<RefSite>,
}

/// Use-site list for external symbols.
///
/// Head nodes are declared at finalization; sites are appended during
/// pass 2. The `.ext` file lists symbols in order of first use, each
/// symbol's sites in encounter order.
#[derive(Debug, Default)]
pub struct ExternalList {
    entries: Vec<ExternalEntry>,
    use_order: Vec<usize>,
}

impl ExternalList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a head node for `name` if it does not have one yet.
    pub fn declare(&mut self, name: &str) {
        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(ExternalEntry {
                name: name.to_string(),
                sites: Vec::new(),
            });
        }
    }

    /// Append a use site for `name`.
    pub fn add_site(&mut self, name: &str, base: u32, offset: u32) {
        let index = match self.entries.iter().position(|e| e.name == name) {
            Some(i) => i,
            None => {
                self.entries.push(ExternalEntry {
                    name: name.to_string(),
                    sites: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        if self.entries[index].sites.is_empty() {
            self.use_order.push(index);
        }
        self.entries[index].sites.push(RefSite { base, offset });
    }

    /// True if at least one use site was recorded.
    pub fn has_references(&self) -> bool {
        !self.use_order.is_empty()
    }

    /// Total number of recorded use sites.
    pub fn reference_count(&self) -> usize {
        self.entries.iter().map(|e| e.sites.len()).sum()
    }

    /// Iterate `(name, sites)` in order of first use.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RefSite])> {
        self.use_order.iter().map(move |&i| {
            let e = &self.entries[i];
            (e.name.as_str(), e.sites.as_slice())
        })
    }
}

/// Derived base/offset pair for an address, 16-aligned.
pub fn base_and_offset(value: u32) -> (u32, u32) {
    let offset = value % 16;
    (value - offset, offset)
}
