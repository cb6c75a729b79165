use q_tree::{Filter, Predicate, Snapshot, Value};

fn main() {
    let filter = Filter::and()
        .with_field("author__last_name__eq", "Benes")
        .with_field("views__now_gte", 1000)
        .build()
        .unwrap();

    let article = |views: i64| {
        Value::record()
            .with_string("title", "The Jerk Store")
            .with_record("author", Value::record().with_string("last_name", "Benes"))
            .with_integer("views", views)
            .build()
    };
    let history = Snapshot::history([article(120), article(980), article(1200), article(1500)]);

    let mut snapshot = history.as_ref();
    let mut matches = Vec::new();
    while let Some(current) = snapshot {
        matches.push(filter.evaluate(current).unwrap());
        snapshot = current.previous();
    }

    println!("{matches:?}");
}
