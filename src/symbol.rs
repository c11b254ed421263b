use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolKind {
    /// Address of a line
    Label,
    /// Named value from `NAME = expr`
    Constant,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Label => f.write_str("label"),
            SymbolKind::Constant => f.write_str("constant"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Symbol {
    pub value: i64,
    pub kind: SymbolKind,
    /// Line the symbol was defined on
    pub line: usize,
}

/// Labels and constants, sharing one namespace. Names are stored upper-cased and kept in
/// definition order.
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    symbols: FxMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Define a symbol. Fails with the existing definition if the name is taken.
    pub fn add_symbol(
        &mut self,
        name: &str,
        value: i64,
        kind: SymbolKind,
        line: usize,
    ) -> Result<(), Symbol> {
        let name = name.to_ascii_uppercase();
        if let Some(existing) = self.symbols.get(&name) {
            return Err(*existing);
        }
        log::debug!("{kind} {name} = {value:#06x} (line {line})");
        self.symbols.insert(name, Symbol { value, kind, line });
        Ok(())
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(&name.to_ascii_uppercase())
    }

    pub fn value(&self, name: &str) -> Option<i64> {
        self.lookup_symbol(name).map(|sym| sym.value)
    }

    /// Value of `name` only if it is a constant.
    pub fn constant(&self, name: &str) -> Option<i64> {
        self.lookup_symbol(name)
            .filter(|sym| sym.kind == SymbolKind::Constant)
            .map(|sym| sym.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup_symbol(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in their current order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.symbols.iter().map(|(name, sym)| (name.as_str(), sym))
    }

    /// Order by value, then by name.
    pub fn sort(&mut self) {
        self.symbols
            .sort_by(|k1, v1, k2, v2| v1.value.cmp(&v2.value).then_with(|| k1.cmp(k2)));
    }
}
