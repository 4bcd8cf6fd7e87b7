// Example native handler module.
//
//   cargo build --release
//   mkdir -p math && cp target/release/libops.so math/
//   echo '{"a": 2, "b": 3}' | invoke math/ops add

use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct Operands {
    a: f64,
    b: f64,
}

fn add(operands: Operands) -> Result<Value, String> {
    let sum = operands.a + operands.b;
    // keep integer sums integral in the output
    if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
        Ok(Value::from(sum as i64))
    } else {
        serde_json::Number::from_f64(sum)
            .map(Value::Number)
            .ok_or_else(|| format!("sum {} is not a finite number", sum))
    }
}

fn identity(event: Value) -> Result<Value, String> {
    Ok(event)
}

invoke_local::export_handler!(
    add => add,
    identity => identity;
    VERSION: "string",
);
