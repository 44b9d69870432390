use monad_core::parser::parse_one;
use monad_core::types::{
    infer_literal_type, parse_type_annotation, promote, PromoteError, Type,
};

const VALUE_KINDS: &[Type] = &[
    Type::Int,
    Type::Float,
    Type::Char,
    Type::Str,
    Type::Bool,
    Type::Hex,
    Type::Bin,
    Type::Oct,
];

#[test]
fn literal_inference_from_lexemes() {
    for (value, lexeme, expected) in [
        (255.0, "0xFF", Type::Hex),
        (255.0, "0XFF", Type::Hex),
        (10.0, "0b1010", Type::Bin),
        (10.0, "0B1010", Type::Bin),
        (63.0, "0o77", Type::Oct),
        (1.5, "1.5", Type::Float),
        (100.0, "1e2", Type::Float),
        (42.0, "42", Type::Int),
        (-5.0, "-5", Type::Int),
    ] {
        assert_eq!(
            infer_literal_type(value, Some(lexeme)),
            expected,
            "lexeme {lexeme}"
        );
    }
}

#[test]
fn promotion_is_commutative_on_kinds() {
    for lhs in VALUE_KINDS {
        for rhs in VALUE_KINDS {
            let ab = promote(lhs, rhs);
            let ba = promote(rhs, lhs);
            match (&ab, &ba) {
                (Ok(a), Ok(b)) => assert_eq!(a, b, "promote({lhs}, {rhs})"),
                (Err(_), Err(_)) => {}
                _ => panic!("promote({lhs}, {rhs}) disagrees with its mirror"),
            }
        }
    }
}

#[test]
fn promotion_rules() {
    assert_eq!(promote(&Type::Hex, &Type::Hex), Ok(Type::Hex));
    assert_eq!(promote(&Type::Bin, &Type::Bin), Ok(Type::Bin));
    assert_eq!(promote(&Type::Hex, &Type::Int), Ok(Type::Int));
    assert_eq!(promote(&Type::Char, &Type::Int), Ok(Type::Int));
    assert_eq!(promote(&Type::Char, &Type::Char), Ok(Type::Int));
    assert_eq!(promote(&Type::Float, &Type::Hex), Ok(Type::Float));
    assert_eq!(promote(&Type::Int, &Type::Int), Ok(Type::Int));
    assert_eq!(promote(&Type::Float, &Type::Char), Ok(Type::Float));
}

#[test]
fn mixed_bases_are_rejected() {
    for (lhs, rhs) in [
        (Type::Hex, Type::Bin),
        (Type::Bin, Type::Oct),
        (Type::Oct, Type::Hex),
    ] {
        assert_eq!(
            promote(&lhs, &rhs),
            Err(PromoteError::MixedBases(lhs.clone(), rhs.clone()))
        );
    }
}

#[test]
fn non_numeric_operands_are_rejected() {
    assert_eq!(
        promote(&Type::Str, &Type::Int),
        Err(PromoteError::NonNumeric(Type::Str))
    );
    assert_eq!(
        promote(&Type::Int, &Type::Bool),
        Err(PromoteError::NonNumeric(Type::Bool))
    );
}

#[test]
fn annotation_parsing() {
    let annotated = parse_one("[x :: Int]").unwrap();
    assert_eq!(parse_type_annotation(&annotated), Ok(Some(Type::Int)));

    let plain = parse_one("[x]").unwrap();
    assert_eq!(parse_type_annotation(&plain), Ok(None));

    let unknown = parse_one("[x :: Wat]").unwrap();
    let err = parse_type_annotation(&unknown).unwrap_err();
    assert_eq!(err.name, "Wat");

    for name in ["Int", "Float", "Char", "String", "Bool", "Hex", "Bin", "Oct"] {
        let src = format!("[v :: {name}]");
        let ast = parse_one(&src).unwrap();
        let ty = parse_type_annotation(&ast).unwrap().unwrap();
        assert_eq!(ty.to_string(), name);
    }
}

#[test]
fn type_names_round_trip_through_the_table() {
    for kind in VALUE_KINDS {
        assert_eq!(Type::from_name(&kind.to_string()), Some(kind.clone()));
    }
    assert_eq!(Type::from_name("Fn"), None);
    assert_eq!(Type::from_name("?"), None);
}
