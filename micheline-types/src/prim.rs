//! The Micheline tree node.
//!
//! A [`Prim`] is a closed sum over literals, sequences and primitive
//! applications, plus the annotations attached to it. Trees are treated as
//! immutable: every structural change returns a new tree.

use std::{borrow::Cow, cmp::Ordering, fmt};

use num_bigint::BigInt;

use crate::opcode::OpCode;

/// Payload of a tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Int(BigInt),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<Prim>),
    /// Primitive application with any number of arguments.
    App(OpCode, Vec<Prim>),
}

/// A Micheline expression.
#[derive(Clone, Debug)]
pub struct Prim {
    pub node: Node,
    /// Raw annotations including their `%`, `:` or `@` prefix.
    pub annots: Vec<String>,
    /// Set on pairs read back from packed bytes, whose combs are already
    /// in their optimized shape.
    pub was_packed: bool,
}

impl PartialEq for Prim {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.annots == other.annots
    }
}

impl Eq for Prim {}

/// Control value returned by [`Prim::visit`] callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the children of the current node.
    Continue,
    /// Do not descend, but keep walking siblings.
    Skip,
    /// Abort the walk.
    Stop,
}

pub const FIELD_PREFIX: char = '%';
pub const TYPE_PREFIX: char = ':';
pub const VAR_PREFIX: char = '@';

impl From<Node> for Prim {
    fn from(node: Node) -> Self {
        Prim {
            node,
            annots: Vec::new(),
            was_packed: false,
        }
    }
}

impl Prim {
    pub fn new(op: OpCode, args: Vec<Prim>) -> Self {
        Node::App(op, args).into()
    }

    pub fn nullary(op: OpCode) -> Self {
        Self::new(op, Vec::new())
    }

    pub fn unary(op: OpCode, arg: Prim) -> Self {
        Self::new(op, vec![arg])
    }

    pub fn binary(op: OpCode, left: Prim, right: Prim) -> Self {
        Self::new(op, vec![left, right])
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Node::Int(value.into()).into()
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::String(value.into()).into()
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Node::Bytes(value.into()).into()
    }

    pub fn seq(items: Vec<Prim>) -> Self {
        Node::Seq(items).into()
    }

    pub fn with_annots<I, S>(mut self, annots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annots.extend(annots.into_iter().map(Into::into));
        self
    }

    pub fn with_anno(self, anno: impl Into<String>) -> Self {
        self.with_annots([anno])
    }

    pub fn opcode(&self) -> Option<OpCode> {
        match &self.node {
            Node::App(op, _) => Some(*op),
            _ => None,
        }
    }

    pub fn is(&self, op: OpCode) -> bool {
        self.opcode() == Some(op)
    }

    /// Application arguments or sequence items; empty for literals.
    pub fn args(&self) -> &[Prim] {
        match &self.node {
            Node::App(_, args) => args,
            Node::Seq(items) => items,
            _ => &[],
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Prim> {
        self.args().get(index)
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.node {
            Node::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.node {
            Node::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.node {
            Node::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.node, Node::Int(_) | Node::String(_) | Node::Bytes(_))
    }

    /// Short description of the node used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.node {
            Node::Int(_) => "int literal".to_string(),
            Node::String(_) => "string literal".to_string(),
            Node::Bytes(_) => "bytes literal".to_string(),
            Node::Seq(items) => format!("sequence of {}", items.len()),
            Node::App(op, args) if args.is_empty() => format!("`{op}`"),
            Node::App(op, args) => format!("`{op}` with {} arguments", args.len()),
        }
    }

    // Annotations

    pub fn has_annots(&self) -> bool {
        !self.annots.is_empty()
    }

    /// First annotation of the given class, without its prefix.
    pub fn anno_with_prefix(&self, prefix: char) -> Option<&str> {
        self.annots
            .iter()
            .find_map(|anno| anno.strip_prefix(prefix))
            .filter(|name| !name.is_empty())
    }

    pub fn field_anno(&self) -> Option<&str> {
        self.anno_with_prefix(FIELD_PREFIX)
    }

    pub fn type_anno(&self) -> Option<&str> {
        self.anno_with_prefix(TYPE_PREFIX)
    }

    pub fn var_anno(&self) -> Option<&str> {
        self.anno_with_prefix(VAR_PREFIX)
    }

    /// Field annotation, falling back to the type annotation.
    pub fn label(&self) -> Option<&str> {
        self.field_anno().or_else(|| self.type_anno())
    }

    /// Whether any annotation, with its prefix removed, starts with `prefix`.
    pub fn has_anno_starting_with(&self, prefix: &str) -> bool {
        self.annots
            .iter()
            .map(|anno| anno.trim_start_matches([FIELD_PREFIX, TYPE_PREFIX, VAR_PREFIX]))
            .any(|name| name.starts_with(prefix))
    }

    /// Deep copy without any annotations.
    pub fn strip_annots(&self) -> Prim {
        let node = match &self.node {
            Node::Seq(items) => Node::Seq(items.iter().map(Prim::strip_annots).collect()),
            Node::App(op, args) => Node::App(*op, args.iter().map(Prim::strip_annots).collect()),
            other => other.clone(),
        };
        Prim {
            node,
            annots: Vec::new(),
            was_packed: self.was_packed,
        }
    }

    // Traversal

    /// Pre-order walk. Returns `false` when the callback stopped the walk.
    pub fn visit<F>(&self, f: &mut F) -> bool
    where
        F: FnMut(&Prim) -> Visit,
    {
        match f(self) {
            Visit::Stop => false,
            Visit::Skip => true,
            Visit::Continue => self.args().iter().all(|child| child.visit(f)),
        }
    }

    pub fn contains_opcode(&self, op: OpCode) -> bool {
        !self.visit(&mut |p| if p.is(op) { Visit::Stop } else { Visit::Continue })
    }

    /// All subtrees applying `op`, outermost first. Matches are not searched
    /// for nested occurrences.
    pub fn find_opcodes(&self, op: OpCode) -> Vec<&Prim> {
        let mut found = Vec::new();
        self.collect_opcodes(op, &mut found);
        found
    }

    fn collect_opcodes<'a>(&'a self, op: OpCode, found: &mut Vec<&'a Prim>) {
        if self.is(op) {
            found.push(self);
            return;
        }
        for child in self.args() {
            child.collect_opcodes(op, found);
        }
    }

    /// Follow child indices from this node.
    pub fn get_path(&self, path: &[usize]) -> Option<&Prim> {
        path.iter().try_fold(self, |node, &index| node.arg(index))
    }

    // Comb pairs

    fn is_pair_like(&self) -> bool {
        matches!(self.opcode(), Some(OpCode::Pair | OpCode::pair))
    }

    /// Rewrites a variadic `pair a b c` (type or value) into the binary
    /// `pair a (pair b c)`; the inner pair stays variadic if it has more
    /// than two arguments.
    pub fn comb_normalized(&self) -> Cow<'_, Prim> {
        match &self.node {
            Node::App(op, args) if self.is_pair_like() && args.len() > 2 => {
                let tail = Prim::new(*op, args[1..].to_vec());
                let mut pair = Prim::new(*op, vec![args[0].clone(), tail]);
                pair.annots = self.annots.clone();
                pair.was_packed = self.was_packed;
                Cow::Owned(pair)
            }
            _ => Cow::Borrowed(self),
        }
    }

    /// Child `index` of this node read as a binary comb. Variadic pairs and
    /// sequences of two or more items are viewed as right combs.
    pub fn comb_arg(&self, index: usize) -> Option<Cow<'_, Prim>> {
        match &self.node {
            Node::App(op, args) if self.is_pair_like() && args.len() > 2 && index == 1 => {
                Some(Cow::Owned(Prim::new(*op, args[1..].to_vec())))
            }
            Node::Seq(items) if items.len() > 2 && index == 1 => {
                Some(Cow::Owned(Prim::seq(items[1..].to_vec())))
            }
            Node::Seq(items) if items.len() >= 2 && index < 2 => {
                items.get(index).map(Cow::Borrowed)
            }
            Node::Seq(_) => None,
            Node::App(_, args) if index < 2 || !self.is_pair_like() => {
                args.get(index).map(Cow::Borrowed)
            }
            _ => None,
        }
    }

    /// Follow a binary comb path, see [`Prim::comb_arg`].
    pub fn comb_path(&self, path: &[usize]) -> Option<Cow<'_, Prim>> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(Cow::Borrowed(self));
        };
        match self.comb_arg(first)? {
            Cow::Borrowed(child) => child.comb_path(rest),
            Cow::Owned(child) => child.comb_path(rest).map(|p| Cow::Owned(p.into_owned())),
        }
    }

    // Shape heuristics for untyped values

    /// A non-empty sequence of instructions (possibly nested in blocks).
    pub fn looks_like_code(&self) -> bool {
        let Node::Seq(items) = &self.node else {
            return false;
        };
        !items.is_empty()
            && items.iter().all(|item| match &item.node {
                Node::App(op, _) => op.is_instruction(),
                Node::Seq(inner) => inner.is_empty() || item.looks_like_code(),
                _ => false,
            })
    }

    /// A non-empty sequence of `Elt key value` items.
    pub fn looks_like_map(&self) -> bool {
        let Node::Seq(items) = &self.node else {
            return false;
        };
        !items.is_empty()
            && items
                .iter()
                .all(|item| item.is(OpCode::Elt) && item.args().len() == 2)
    }

    /// At least three scalar literals of one kind in strictly ascending
    /// order, the ordering a serialized set is required to have.
    pub fn looks_like_set(&self) -> bool {
        let Node::Seq(items) = &self.node else {
            return false;
        };
        items.len() >= 3
            && items
                .windows(2)
                .all(|pair| scalar_cmp(&pair[0], &pair[1]) == Some(Ordering::Less))
    }
}

fn scalar_cmp(a: &Prim, b: &Prim) -> Option<Ordering> {
    match (&a.node, &b.node) {
        (Node::Int(a), Node::Int(b)) => Some(a.cmp(b)),
        (Node::String(a), Node::String(b)) => Some(a.cmp(b)),
        (Node::Bytes(a), Node::Bytes(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Position of a constructor among the constructors of its type.
fn constructor_rank(op: OpCode) -> Option<(u8, u8)> {
    match op {
        OpCode::False => Some((0, 0)),
        OpCode::True => Some((0, 1)),
        OpCode::None => Some((1, 0)),
        OpCode::Some => Some((1, 1)),
        OpCode::Left => Some((2, 0)),
        OpCode::Right => Some((2, 1)),
        OpCode::Unit => Some((3, 0)),
        OpCode::Pair => Some((4, 0)),
        _ => None,
    }
}

impl Prim {
    /// Michelson order between two values of the same comparable type:
    /// numbers numerically, strings and bytes lexicographically, `False`
    /// before `True`, `None` before `Some`, `Left` before `Right` and pairs
    /// component-wise. `None` when the two are not comparable.
    pub fn compare_values(&self, other: &Prim) -> Option<Ordering> {
        if let Some(order) = scalar_cmp(self, other) {
            return Some(order);
        }
        let (Node::App(a, xs), Node::App(b, ys)) = (&self.node, &other.node) else {
            return None;
        };
        let (family_a, rank_a) = constructor_rank(*a)?;
        let (family_b, rank_b) = constructor_rank(*b)?;
        if family_a != family_b {
            return None;
        }
        if rank_a != rank_b {
            return Some(rank_a.cmp(&rank_b));
        }
        for (x, y) in xs.iter().zip(ys) {
            match x.compare_values(y)? {
                Ordering::Equal => continue,
                order => return Some(order),
            }
        }
        Some(xs.len().cmp(&ys.len()))
    }
}

impl Prim {
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
        match &self.node {
            Node::Int(value) => write!(f, "{value}"),
            Node::String(value) => write!(f, "{value:?}"),
            Node::Bytes(value) => write!(f, "0x{}", hex::encode(value)),
            Node::Seq(items) => {
                if items.is_empty() {
                    return f.write_str("{}");
                }
                f.write_str("{ ")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ; ")?;
                    }
                    item.fmt_nested(f, false)?;
                }
                f.write_str(" }")
            }
            Node::App(op, args) => {
                let wrap = nested && (!args.is_empty() || !self.annots.is_empty());
                if wrap {
                    f.write_str("(")?;
                }
                write!(f, "{op}")?;
                for anno in &self.annots {
                    write!(f, " {anno}")?;
                }
                for arg in args {
                    f.write_str(" ")?;
                    arg.fmt_nested(f, true)?;
                }
                if wrap {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

/// Michelson concrete syntax.
impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, false)
    }
}
