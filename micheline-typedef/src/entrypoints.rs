//! Entrypoint discovery on a contract's parameter type.

use std::collections::HashMap;

use micheline_types::{OpCode, Prim};
use serde::Serialize;
use tracing::debug;

use crate::{
    errors::TypedefError,
    typedef::{TypeKind, Typedef, build_typedef},
};

/// Knobs for [`discover_entrypoints`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntrypointOptions {
    /// An `or` node carrying an annotation that starts with one of these
    /// prefixes is kept as a single entrypoint instead of being split.
    pub non_splitting_prefixes: Vec<String>,
}

impl EntrypointOptions {
    pub fn with_non_splitting_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.non_splitting_prefixes.push(prefix.into());
        self
    }

    fn keeps_whole(&self, prim: &Prim) -> bool {
        self.non_splitting_prefixes
            .iter()
            .any(|prefix| prim.has_anno_starting_with(prefix))
    }
}

/// A callable leaf of the parameter's `or` tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    /// Position of the leaf in a left-to-right walk.
    pub id: usize,
    pub name: String,
    /// `/L` and `/R` steps from the parameter root, empty for a contract
    /// without branches.
    pub branch: String,
    /// Arguments: the fields of a struct leaf, otherwise the leaf itself.
    pub typedef: Vec<Typedef>,
    pub prim: Prim,
}

impl Entrypoint {
    /// The leaf's typedef as a single tree, named after the entrypoint.
    pub fn signature(&self) -> Typedef {
        match self.typedef.as_slice() {
            [single] => single.clone(),
            args => Typedef {
                name: self.name.clone(),
                kind: TypeKind::Struct,
                optional: false,
                args: args.to_vec(),
                path: Vec::new(),
            },
        }
    }
}

/// Entrypoints by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entrypoints {
    entries: HashMap<String, Entrypoint>,
}

impl Entrypoints {
    pub fn get(&self, name: &str) -> Option<&Entrypoint> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entrypoint> {
        self.entries.values()
    }

    pub fn find_id(&self, id: usize) -> Option<&Entrypoint> {
        self.iter().find(|entry| entry.id == id)
    }

    pub fn find_branch(&self, branch: &str) -> Option<&Entrypoint> {
        self.iter().find(|entry| entry.branch == branch)
    }

    /// All entrypoints ordered by id.
    pub fn sorted(&self) -> Vec<&Entrypoint> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }
}

/// Split a parameter type into its entrypoints. A `parameter` section is
/// unwrapped first.
pub fn discover_entrypoints(
    param: &Prim,
    options: &EntrypointOptions,
) -> Result<Entrypoints, TypedefError> {
    let root = match param.args() {
        [inner] if param.is(OpCode::parameter) => inner,
        _ => param,
    };
    let mut leaves = Vec::new();
    collect_leaves(root, String::new(), options, &mut leaves)?;

    let explicit_default = leaves
        .iter()
        .any(|(_, prim)| prim.field_anno() == Some("default"));
    let mut entries = HashMap::with_capacity(leaves.len());
    for (id, (branch, prim)) in leaves.into_iter().enumerate() {
        let name = match prim.field_anno() {
            Some(anno) if !entries.contains_key(anno) => anno.to_string(),
            _ if id == 0 && !explicit_default => "default".to_string(),
            _ => format!("@entrypoint_{id}"),
        };
        let mut root = build_typedef(prim, &name, &[])?;
        root.name = name.clone();
        let typedef = if root.is_struct() { root.args } else { vec![root] };
        entries.insert(
            name.clone(),
            Entrypoint {
                id,
                name,
                branch,
                typedef,
                prim: prim.clone(),
            },
        );
    }
    debug!(count = entries.len(), "discovered entrypoints");
    Ok(Entrypoints { entries })
}

fn collect_leaves<'a>(
    prim: &'a Prim,
    branch: String,
    options: &EntrypointOptions,
    out: &mut Vec<(String, &'a Prim)>,
) -> Result<(), TypedefError> {
    if !prim.is(OpCode::or) || options.keeps_whole(prim) {
        out.push((branch, prim));
        return Ok(());
    }
    let [left, right] = prim.args() else {
        return Err(TypedefError::Arity {
            op: OpCode::or,
            expected: 2,
            found: prim.args().len(),
        });
    };
    collect_leaves(left, format!("{branch}/L"), options, out)?;
    collect_leaves(right, format!("{branch}/R"), options, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn ty(op: OpCode) -> Prim {
        Prim::nullary(op)
    }

    #[test]
    fn two_entrypoints() {
        init_test_logging();
        let param = Prim::unary(
            OpCode::parameter,
            Prim::binary(
                OpCode::or,
                ty(OpCode::nat).with_anno("%deposit"),
                Prim::binary(
                    OpCode::pair,
                    ty(OpCode::address).with_anno("%to"),
                    ty(OpCode::mutez),
                )
                .with_anno("%withdraw"),
            ),
        );
        let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
        assert_eq!(entrypoints.len(), 2);

        let deposit = entrypoints.get("deposit").unwrap();
        assert_eq!((deposit.id, deposit.branch.as_str()), (0, "/L"));
        assert_eq!(deposit.typedef.len(), 1);
        assert_eq!(deposit.typedef[0].name, "deposit");

        let withdraw = entrypoints.get("withdraw").unwrap();
        assert_eq!((withdraw.id, withdraw.branch.as_str()), (1, "/R"));
        let names: Vec<_> = withdraw.typedef.iter().map(|arg| arg.name.as_str()).collect();
        assert_eq!(names, ["to", "1"]);
        assert_eq!(entrypoints.find_branch("/R"), Some(withdraw));
        assert_eq!(entrypoints.find_id(0), Some(deposit));
        insta::assert_snapshot!(withdraw.signature(), @"struct { to: address, 1: mutez }");
    }

    #[test]
    fn names_unannotated_and_duplicate_leaves() {
        let param = Prim::binary(
            OpCode::or,
            ty(OpCode::unit),
            Prim::binary(
                OpCode::or,
                ty(OpCode::nat).with_anno("%mint"),
                Prim::binary(OpCode::or, ty(OpCode::int).with_anno("%mint"), ty(OpCode::string)),
            ),
        );
        let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
        let names: Vec<_> = entrypoints
            .sorted()
            .into_iter()
            .map(|entry| (entry.name.as_str(), entry.branch.as_str()))
            .collect();
        assert_eq!(
            names,
            [
                ("default", "/L"),
                ("mint", "/R/L"),
                ("@entrypoint_2", "/R/R/L"),
                ("@entrypoint_3", "/R/R/R"),
            ]
        );
    }

    #[test]
    fn single_leaf_is_default() {
        let entrypoints =
            discover_entrypoints(&ty(OpCode::unit), &EntrypointOptions::default()).unwrap();
        let default = entrypoints.get("default").unwrap();
        assert_eq!(default.branch, "");
        assert_eq!(default.typedef[0].kind, TypeKind::Op(OpCode::unit));
    }

    #[test]
    fn explicit_default_wins_over_the_first_leaf() {
        let param = Prim::binary(
            OpCode::or,
            ty(OpCode::unit),
            ty(OpCode::nat).with_anno("%default"),
        );
        let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
        assert_eq!(entrypoints.len(), 2);
        assert_eq!(entrypoints.get("default").unwrap().branch, "/R");
        assert_eq!(entrypoints.get("@entrypoint_0").unwrap().branch, "/L");
    }

    #[test]
    fn non_splitting_prefixes_keep_unions_whole() {
        let param = Prim::binary(
            OpCode::or,
            Prim::binary(OpCode::or, ty(OpCode::nat), ty(OpCode::int)).with_anno("%_keep"),
            ty(OpCode::unit).with_anno("%ping"),
        );
        let split = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
        assert_eq!(split.len(), 3);

        let options = EntrypointOptions::default().with_non_splitting_prefix("_");
        let kept = discover_entrypoints(&param, &options).unwrap();
        assert_eq!(kept.len(), 2);
        let whole = kept.get("_keep").unwrap();
        assert!(whole.typedef[0].is_union());
    }

    #[test]
    fn rejects_malformed_unions() {
        let param = Prim::unary(OpCode::or, ty(OpCode::nat));
        assert_eq!(
            discover_entrypoints(&param, &EntrypointOptions::default()),
            Err(TypedefError::Arity {
                op: OpCode::or,
                expected: 2,
                found: 1
            })
        );
    }
}
