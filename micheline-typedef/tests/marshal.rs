use micheline_typedef::{EntrypointOptions, Typedef, discover_entrypoints};
use micheline_types::{Address, AddressKind, OpCode, Prim};
use serde_json::json;

const ALICE: &str = "tz1eZUHkQDC1bBEbvrrUxkbWEagdZJXQyszc";

fn ty(op: OpCode) -> Prim {
    Prim::nullary(op)
}

#[test]
fn named_scalar_unwraps_its_own_field() {
    let typedef = Typedef::derive(&ty(OpCode::nat).with_anno("%payoutDelay"), "storage").unwrap();
    let prim = typedef.marshal(&json!({"payoutDelay": 1}), false).unwrap();
    assert_eq!(prim.to_json(), r#"{"int":"1"}"#);
}

#[test]
fn key_hash_text_and_bytes() {
    let typedef = Typedef::derive(&ty(OpCode::key_hash), "delegate").unwrap();
    let readable = typedef.marshal(&json!(ALICE), false).unwrap();
    assert_eq!(readable, Prim::string(ALICE));

    let optimized = typedef.marshal(&json!(ALICE), true).unwrap();
    assert_eq!(
        optimized.as_bytes().map(hex::encode).as_deref(),
        Some("00cf8dad6c9cd30672987242a8c2a94fc72816d8cf")
    );
    assert!(typedef.implements_type(&readable));
    assert!(typedef.implements_type(&optimized));
}

#[test]
fn marshaled_arguments_conform_to_the_entrypoint() {
    let param = Prim::binary(
        OpCode::or,
        Prim::binary(
            OpCode::pair,
            ty(OpCode::address).with_anno(":from"),
            Prim::binary(
                OpCode::pair,
                ty(OpCode::address).with_anno(":to"),
                ty(OpCode::nat).with_anno(":value"),
            ),
        )
        .with_anno("%transfer"),
        Prim::new(
            OpCode::or,
            vec![
                ty(OpCode::unit).with_anno("%pause"),
                Prim::unary(OpCode::option, ty(OpCode::key_hash)).with_anno("%set_delegate"),
            ],
        ),
    );
    let entrypoints = discover_entrypoints(&param, &EntrypointOptions::default()).unwrap();

    let transfer = entrypoints.get("transfer").unwrap().signature();
    let contract = Address {
        kind: AddressKind::Contract,
        hash: [0x11; 20],
    }
    .to_string();
    let args = json!({"from": ALICE, "to": contract, "value": "250"});
    for optimized in [false, true] {
        let prim = transfer.marshal(&args, optimized).unwrap();
        assert_eq!(transfer.check_value(&prim), Ok(()), "{prim}");
    }
    let prim = transfer.marshal(&args, false).unwrap();
    assert_eq!(
        prim,
        Prim::binary(
            OpCode::Pair,
            Prim::string(ALICE),
            Prim::binary(OpCode::Pair, Prim::string(contract), Prim::int(250)),
        )
    );

    let delegate = entrypoints.get("set_delegate").unwrap().signature();
    assert_eq!(delegate.marshal(&json!(null), false).unwrap(), ty(OpCode::None));
    let some = delegate.marshal(&json!(ALICE), false).unwrap();
    assert_eq!(some, Prim::unary(OpCode::Some, Prim::string(ALICE)));
    assert!(delegate.implements_type(&some));
}
