use specmint_core::rules_json_schema;

fn main() {
    let schema = rules_json_schema();
    let json = serde_json::to_string_pretty(&schema).expect("serialize rules schema");
    println!("{json}");
}
