use super::*;
use crate::values::Snapshot;
use proptest::prelude::*;

const FIELDS: [&str; 2] = ["a", "b"];

fn arb_field() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(FIELDS[0]), Just(FIELDS[1])]
}

fn arb_connector() -> impl Strategy<Value = Connector> {
    prop_oneof![Just(Connector::And), Just(Connector::Or)]
}

fn arb_condition() -> impl Strategy<Value = Child> {
    let compare = (
        arb_field(),
        prop_oneof![
            Just("eq"),
            Just("ne"),
            Just("gt"),
            Just("lt"),
            Just("gte"),
            Just("lte"),
        ],
        -5i64..5,
    )
        .prop_map(|(field, opcode, literal)| {
            Child::Field(format!("{field}__{opcode}"), Value::Integer(literal))
        });
    let membership = (
        arb_field(),
        prop_oneof![Just("in"), Just("not_in")],
        prop::collection::vec(-5i64..5, 0..4),
    )
        .prop_map(|(field, opcode, literal)| {
            Child::Field(format!("{field}__{opcode}"), Value::from(literal))
        });
    prop_oneof![3 => compare, 1 => membership]
}

fn arb_child() -> impl Strategy<Value = Child> {
    arb_condition().prop_recursive(3, 16, 4, |inner| {
        (
            arb_connector(),
            any::<bool>(),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(connector, negated, children)| {
                Child::from(Filter::new(connector, negated, children).unwrap())
            })
    })
}

fn arb_children() -> impl Strategy<Value = Vec<Child>> {
    prop::collection::vec(arb_child(), 0..5)
}

fn arb_object() -> impl Strategy<Value = Value> {
    (-6i64..6, -6i64..6).prop_map(|(a, b)| {
        Value::record()
            .with_integer(FIELDS[0], a)
            .with_integer(FIELDS[1], b)
            .build()
    })
}

fn arb_scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        "[a-z]{0,3}".prop_map(Value::from),
        prop::collection::vec(any::<i64>(), 0..3).prop_map(Value::from),
    ]
}

fn single(child: Child) -> Filter {
    Filter::new(Connector::And, false, vec![child]).unwrap()
}

proptest! {
    #[test]
    fn negating_a_node_negates_its_result(
        connector in arb_connector(),
        children in arb_children(),
        object in arb_object()
    ) {
        let plain = Filter::new(connector, false, children.clone()).unwrap();
        let negated = Filter::new(connector, true, children).unwrap();

        prop_assert_eq!(
            negated.evaluate(&object).unwrap(),
            !plain.evaluate(&object).unwrap()
        );
    }

    #[test]
    fn or_nodes_match_when_any_child_matches(
        children in arb_children(),
        object in arb_object()
    ) {
        let expected = children
            .iter()
            .map(|child| single(child.clone()).evaluate(&object).unwrap())
            .any(|matched| matched);
        let filter = Filter::new(Connector::Or, false, children).unwrap();

        prop_assert_eq!(expected, filter.evaluate(&object).unwrap());
    }

    #[test]
    fn and_nodes_follow_de_morgan(
        left in arb_child(),
        right in arb_child(),
        object in arb_object()
    ) {
        let and = !(single(left.clone()) & single(right.clone()));
        let or = !single(left) | !single(right);

        prop_assert_eq!(and.evaluate(&object).unwrap(), or.evaluate(&object).unwrap());
    }

    #[test]
    fn boolean_equality_matches_truthiness(value in arb_scalar_value()) {
        let object = Value::record().with_value("v", value.clone()).build();
        let truthy = single(("v__eq", true).into());
        let falsy = single(("v__eq", false).into());

        prop_assert_eq!(value.is_truthy(), truthy.evaluate(&object).unwrap());
        prop_assert_eq!(!value.is_truthy(), falsy.evaluate(&object).unwrap());
    }

    #[test]
    fn transitions_fire_only_when_crossing(
        threshold in -10i64..10,
        old in -10i64..10,
        new in -10i64..10
    ) {
        let filter = single(("score__now_gt", threshold).into());
        let snapshot = Snapshot::history([
            Value::record().with_integer("score", old).build(),
            Value::record().with_integer("score", new).build(),
        ])
        .unwrap();

        prop_assert_eq!(
            old <= threshold && new > threshold,
            filter.evaluate(&snapshot).unwrap()
        );
    }
}
