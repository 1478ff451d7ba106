//! Node builders for common test targets

use colony::{NodeBuilder, PortKind, Signature};
use serde_json::{json, Value};

fn as_i64(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

/// f(x) = x * x
pub fn square() -> NodeBuilder {
    NodeBuilder::new().function(|call| {
        let x = as_i64(call.arg(0));
        Ok(json!(x * x))
    })
}

/// f(xs) = [x * x for x in xs]
pub fn square_all() -> NodeBuilder {
    NodeBuilder::new().function(|call| {
        let xs = call
            .arg(0)
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("expected an array, got {}", call.arg(0)))?;
        Ok(Value::Array(
            xs.iter().map(|x| json!(as_i64(x) * as_i64(x))).collect(),
        ))
    })
}

/// f(x) = x
pub fn pass_through() -> NodeBuilder {
    NodeBuilder::new().function(|call| Ok(call.arg(0).clone()))
}

/// f(x, offset=0) = x + offset
pub fn add_offset() -> NodeBuilder {
    NodeBuilder::new()
        .signature(Signature::new(1).with_optional("offset", json!(0)))
        .function(|call| Ok(json!(as_i64(call.arg(0)) + as_i64(call.kwarg("offset")))))
}

/// Square with a mapping input port
pub fn mapped_square() -> NodeBuilder {
    square().reactive_port(PortKind::MappingArg)
}

/// Square-all with a batch input port
pub fn batched_square(batch_size: usize) -> NodeBuilder {
    square_all().reactive_port(PortKind::BatchArg { batch_size })
}
