//! Structural comparison of typedefs.

use micheline_types::OpCode;

use crate::typedef::{TypeKind, Typedef};

fn is_positional(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

fn is_sequence(kind: TypeKind) -> bool {
    kind.is(OpCode::list) || kind.is(OpCode::set)
}

fn is_collection(kind: TypeKind) -> bool {
    is_sequence(kind) || kind.is(OpCode::map) || kind.is(OpCode::big_map)
}

impl Typedef {
    /// Same kind, optionality and shape at every level. Names and paths are
    /// ignored.
    pub fn equal(&self, other: &Typedef) -> bool {
        self.kind == other.kind
            && self.optional == other.optional
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.equal(b))
    }

    /// [`Typedef::equal`] that also requires equal names at every level.
    pub fn strict_equal(&self, other: &Typedef) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.optional == other.optional
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.strict_equal(b))
    }

    /// Canonical form for comparison: anonymous non-optional structs nested
    /// in a struct are inlined into it and positional names renumbered, so
    /// that any comb shape of the same fields unfolds to the same tree.
    pub fn unfold(&self) -> Typedef {
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let arg = arg.unfold();
            if self.is_struct() && arg.is_struct() && !arg.optional && arg.is_anonymous() {
                args.extend(arg.args);
            } else {
                args.push(arg);
            }
        }
        if self.is_struct() {
            for (index, arg) in args.iter_mut().enumerate() {
                if is_positional(&arg.name) {
                    arg.name = index.to_string();
                }
            }
        }
        Typedef {
            name: self.name.clone(),
            kind: self.kind,
            optional: self.optional,
            args,
            path: self.path.clone(),
        }
    }

    /// Loose compatibility of `other` with `self`, where `self` is the
    /// reference type.
    ///
    /// A mandatory value is similar to an optional reference but not the
    /// other way round. An element-less `list` or `set`, as produced by
    /// inference from an empty sequence, is similar to any collection.
    pub fn similar(&self, other: &Typedef) -> bool {
        if self.optional != other.optional {
            return self.optional;
        }
        let loose = |t: &Typedef| t.args.is_empty() && is_sequence(t.kind);
        if (loose(self) && is_collection(other.kind))
            || (loose(other) && is_collection(self.kind))
        {
            return true;
        }
        self.kind == other.kind
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.similar(b))
    }
}
