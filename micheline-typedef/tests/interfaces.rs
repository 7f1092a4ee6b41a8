use indoc::indoc;
use micheline_typedef::{EntrypointOptions, Interface, discover_entrypoints};
use micheline_types::{OpCode, Prim};

const FA12_PARAMETER: &str = indoc! {r#"
    {
      "prim": "or",
      "args": [
        {
          "prim": "or",
          "args": [
            {
              "prim": "or",
              "args": [
                {
                  "prim": "pair",
                  "args": [
                    { "prim": "address", "annots": [":from"] },
                    {
                      "prim": "pair",
                      "args": [
                        { "prim": "address", "annots": [":to"] },
                        { "prim": "nat", "annots": [":value"] }
                      ]
                    }
                  ],
                  "annots": ["%transfer"]
                },
                {
                  "prim": "pair",
                  "args": [
                    { "prim": "address", "annots": [":spender"] },
                    { "prim": "nat", "annots": [":value"] }
                  ],
                  "annots": ["%approve"]
                }
              ]
            },
            {
              "prim": "or",
              "args": [
                {
                  "prim": "pair",
                  "args": [
                    {
                      "prim": "pair",
                      "args": [
                        { "prim": "address", "annots": [":owner"] },
                        { "prim": "address", "annots": [":spender"] }
                      ]
                    },
                    { "prim": "contract", "args": [{ "prim": "nat" }] }
                  ],
                  "annots": ["%getAllowance"]
                },
                {
                  "prim": "pair",
                  "args": [
                    { "prim": "address", "annots": [":owner"] },
                    { "prim": "contract", "args": [{ "prim": "nat" }] }
                  ],
                  "annots": ["%getBalance"]
                }
              ]
            }
          ]
        },
        {
          "prim": "pair",
          "args": [
            { "prim": "unit" },
            { "prim": "contract", "args": [{ "prim": "nat" }] }
          ],
          "annots": ["%getTotalSupply"]
        }
      ]
    }
"#};

fn ty(op: OpCode) -> Prim {
    Prim::nullary(op)
}

fn named(op: OpCode, anno: &str) -> Prim {
    ty(op).with_anno(anno)
}

fn or(left: Prim, right: Prim) -> Prim {
    Prim::binary(OpCode::or, left, right)
}

fn pair(args: Vec<Prim>) -> Prim {
    Prim::new(OpCode::pair, args)
}

#[test]
fn fa12_token_matches_fa1_and_fa12() {
    let param = Prim::from_json(FA12_PARAMETER).unwrap();
    let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
    assert_eq!(entrypoints.len(), 5);
    assert_eq!(entrypoints.interfaces(), vec![Interface::Tzip5, Interface::Tzip7]);
    assert!(Interface::Tzip7.matches_strict(&entrypoints));
    assert!(Interface::Tzip5.contains(entrypoints.get("getBalance").unwrap()));
    assert!(!Interface::Tzip5.contains(entrypoints.get("approve").unwrap()));
    assert_eq!(entrypoints.get("getTotalSupply").unwrap().branch, "/R");
    assert_eq!(entrypoints.get("getAllowance").unwrap().branch, "/L/R/L");
}

#[test]
fn fa1_rejects_a_signed_amount() {
    let text = FA12_PARAMETER.replacen(
        r#"{ "prim": "nat", "annots": [":value"] }"#,
        r#"{ "prim": "int", "annots": [":value"] }"#,
        1,
    );
    let param = Prim::from_json(&text).unwrap();
    let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
    assert!(!Interface::Tzip5.matches(&entrypoints));
    assert!(!Interface::Tzip7.matches(&entrypoints));
    assert!(entrypoints.interfaces().is_empty());
}

#[test]
fn unlabeled_fields_match_loosely_only() {
    let param = Prim::from_json(FA12_PARAMETER).unwrap().strip_annots();
    let callback = || Prim::unary(OpCode::contract, ty(OpCode::nat));
    let relabeled = or(
        pair(vec![ty(OpCode::address), ty(OpCode::address), ty(OpCode::nat)])
            .with_anno("%transfer"),
        or(
            pair(vec![ty(OpCode::address), callback()]).with_anno("%getBalance"),
            pair(vec![ty(OpCode::unit), callback()]).with_anno("%getTotalSupply"),
        ),
    );
    let entrypoints = discover_entrypoints(&relabeled, &EntrypointOptions::default()).unwrap();
    assert!(Interface::Tzip5.matches(&entrypoints));
    assert!(!Interface::Tzip5.matches_strict(&entrypoints));

    let anonymous = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();
    assert!(anonymous.interfaces().is_empty());
}

fn operator(anno: &str, flat: bool) -> Prim {
    let (owner, op, token) = (
        named(OpCode::address, "%owner"),
        named(OpCode::address, "%operator"),
        named(OpCode::nat, "%token_id"),
    );
    if flat {
        pair(vec![owner, op, token]).with_anno(anno)
    } else {
        pair(vec![owner, pair(vec![op, token])]).with_anno(anno)
    }
}

fn fa2_parameter(txs: Prim, flat: bool) -> Prim {
    let request = pair(vec![named(OpCode::address, "%owner"), named(OpCode::nat, "%token_id")]);
    let balance_of = pair(vec![
        Prim::unary(OpCode::list, request.clone()).with_anno("%requests"),
        Prim::unary(
            OpCode::contract,
            Prim::unary(
                OpCode::list,
                pair(vec![request.with_anno("%request"), named(OpCode::nat, "%balance")]),
            ),
        )
        .with_anno("%callback"),
    ])
    .with_anno("%balance_of");
    let transfer = Prim::unary(
        OpCode::list,
        pair(vec![
            named(OpCode::address, "%from_"),
            Prim::unary(OpCode::list, txs).with_anno("%txs"),
        ]),
    )
    .with_anno("%transfer");
    let update_operators = Prim::unary(
        OpCode::list,
        or(operator("%add_operator", flat), operator("%remove_operator", flat)),
    )
    .with_anno("%update_operators");
    Prim::unary(OpCode::parameter, or(or(balance_of, transfer), update_operators))
}

#[test]
fn fa2_flat_and_combed_layouts_match() {
    let to = || named(OpCode::address, "%to_");
    let token = || named(OpCode::nat, "%token_id");
    let amount = || named(OpCode::nat, "%amount");

    let layouts = [
        fa2_parameter(pair(vec![to(), token(), amount()]), true),
        fa2_parameter(pair(vec![to(), pair(vec![token(), amount()])]), false),
        fa2_parameter(pair(vec![pair(vec![to(), token()]), amount()]), false),
    ];
    for param in &layouts {
        let entrypoints = discover_entrypoints(param, &EntrypointOptions::default()).unwrap();
        assert_eq!(entrypoints.interfaces(), vec![Interface::Tzip12], "{param}");
        assert!(Interface::Tzip12.matches_strict(&entrypoints), "{param}");
    }

    let renamed = fa2_parameter(pair(vec![to(), token(), named(OpCode::nat, "%quantity")]), true);
    let entrypoints = discover_entrypoints(&renamed, &EntrypointOptions::default()).unwrap();
    assert!(Interface::Tzip12.matches(&entrypoints));
    assert!(!Interface::Tzip12.matches_strict(&entrypoints));
}

fn spec_typedef(interface: Interface, name: &str) -> micheline_typedef::Typedef {
    let spec = interface.specs().iter().find(|spec| spec.name == name).unwrap();
    spec.typedef().unwrap()
}

const ALICE: &str = "tz1eZUHkQDC1bBEbvrrUxkbWEagdZJXQyszc";
const BOB: &str = "tz1burnburnburnburnburnburnburjAYjjX";

#[test]
fn fa1_transfer_values_conform() {
    let transfer = spec_typedef(Interface::Tzip5, "transfer");
    let combed = Prim::binary(
        OpCode::Pair,
        Prim::string(ALICE),
        Prim::binary(OpCode::Pair, Prim::string(BOB), Prim::int(10)),
    );
    let flat = Prim::new(OpCode::Pair, vec![Prim::string(ALICE), Prim::string(BOB), Prim::int(10)]);
    assert!(transfer.implements_type(&combed));
    assert!(transfer.implements_type(&flat));

    let short = Prim::binary(OpCode::Pair, Prim::string(ALICE), Prim::int(10));
    assert!(!transfer.implements_type(&short));
    let swapped = Prim::new(
        OpCode::Pair,
        vec![Prim::string(ALICE), Prim::int(10), Prim::string(BOB)],
    );
    let mismatch = transfer.check_value(&swapped).unwrap_err();
    assert_eq!(mismatch.path, vec![1, 0]);
}

#[test]
fn fa2_transfer_values_conform_in_any_comb_layout() {
    let transfer = spec_typedef(Interface::Tzip12, "transfer");
    let batch = |txs: Vec<Prim>| {
        Prim::seq(vec![Prim::binary(OpCode::Pair, Prim::string(ALICE), Prim::seq(txs))])
    };

    let flat = batch(vec![
        Prim::new(OpCode::Pair, vec![Prim::string(BOB), Prim::int(0), Prim::int(10)]),
        Prim::new(OpCode::Pair, vec![Prim::string(ALICE), Prim::int(1), Prim::int(5)]),
    ]);
    let combed = batch(vec![Prim::binary(
        OpCode::Pair,
        Prim::string(BOB),
        Prim::binary(OpCode::Pair, Prim::int(0), Prim::int(10)),
    )]);
    let sequence = batch(vec![Prim::seq(vec![Prim::string(BOB), Prim::int(0), Prim::int(10)])]);
    for value in [&flat, &combed, &sequence] {
        assert_eq!(transfer.check_value(value), Ok(()), "{value}");
    }

    let missing_amount = batch(vec![Prim::binary(OpCode::Pair, Prim::string(BOB), Prim::int(0))]);
    assert!(!transfer.implements_type(&missing_amount));
}
