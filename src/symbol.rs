use std::collections::HashMap;
use std::fmt;

/// An interned name. Two symbols interned through the same [`Interner`]
/// compare equal iff their text is equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Symbol table owned by a runtime. Interning is append-only; ids are
/// never reused, so a `Symbol` stays valid for the life of its interner.
#[derive(Default)]
pub struct Interner {
    ids: HashMap<String, Symbol>,
    names: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.ids.get(name) {
            return *sym;
        }
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.ids.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("message");
        let b = interner.intern("message");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "message");
    }

    #[test]
    fn distinct_names_get_distinct_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.lookup("b"), Some(b));
        assert_eq!(interner.lookup("c"), None);
    }

    #[test]
    fn interners_do_not_share_state() {
        let mut x = Interner::new();
        let mut y = Interner::new();
        x.intern("only-in-x");
        assert_eq!(y.lookup("only-in-x"), None);
        let sym = y.intern("z");
        assert_eq!(y.resolve(sym), "z");
    }
}
