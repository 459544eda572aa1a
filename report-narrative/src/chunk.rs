//! Resource-aligned chunking of oversized collections.

use serde::Serialize;
use serde_json::Value;

/// Character count of the compact JSON serialization.
pub fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_string(value)
        .map(|json| json.chars().count())
        .unwrap_or(0)
}

/// Individual resources of a Bundle, an array, a grouped-by-type object or a
/// single loose resource.
pub fn flatten_resources(input: &Value) -> Vec<&Value> {
    match input {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.get("resourceType").and_then(Value::as_str) == Some("Bundle") => {
            map.get("entry")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.get("resource"))
                        .filter(|resource| !resource.is_null())
                        .collect()
                })
                .unwrap_or_default()
        }
        Value::Object(map)
            if map
                .get("resourceType")
                .and_then(Value::as_str)
                .is_some_and(|t| !t.is_empty()) =>
        {
            vec![input]
        }
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .collect(),
        _ => Vec::new(),
    }
}

/// Greedily packs resources into chunks whose serialized array stays within
/// `max_chars`. A resource is never split; one that alone exceeds the limit
/// forms its own chunk. An input with no resources yields a single chunk
/// holding the input itself.
pub fn chunk_resources(input: &Value, max_chars: usize) -> Vec<Vec<&Value>> {
    let resources = flatten_resources(input);
    if resources.is_empty() {
        return vec![vec![input]];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&Value> = Vec::new();
    // "[" and "]"
    let mut size = 2;
    for resource in resources {
        let len = serialized_len(resource);
        if !current.is_empty() && size + len + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
            size = 2;
        }
        // Comma separator before every resource but the first.
        size += len + usize::from(!current.is_empty());
        current.push(resource);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(id: &str, filler: usize) -> Value {
        json!({"resourceType": "Condition", "id": id, "note": "x".repeat(filler)})
    }

    #[test]
    fn flattens_every_accepted_shape() {
        let a = condition("a", 1);
        let b = condition("b", 1);
        let bundle = json!({"resourceType": "Bundle", "entry": [{"resource": a.clone()}, {"resource": b.clone()}, {}]});
        let grouped = json!({"Condition": [a.clone(), b.clone()], "note": "ignored"});
        let array = json!([a.clone(), b.clone()]);

        assert_eq!(flatten_resources(&bundle), vec![&a, &b]);
        assert_eq!(flatten_resources(&grouped), vec![&a, &b]);
        assert_eq!(flatten_resources(&array), vec![&a, &b]);
        assert!(flatten_resources(&json!("text")).is_empty());
    }

    #[test]
    fn chunks_stay_within_limit() {
        let resources: Vec<Value> = (0..10).map(|i| condition(&format!("c{i}"), 40)).collect();
        let input = Value::Array(resources.clone());
        let max = 200;
        let chunks = chunk_resources(&input, max);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(serialized_len(chunk) <= max, "chunk vượt ngưỡng");
        }
        let flattened: Vec<&Value> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, resources.iter().collect::<Vec<_>>());
    }

    #[test]
    fn oversized_resource_is_its_own_chunk() {
        let small = condition("small", 1);
        let big = condition("big", 500);
        let input = json!([small.clone(), big.clone(), small.clone()]);
        let chunks = chunk_resources(&input, 100);
        assert_eq!(chunks, vec![vec![&small], vec![&big], vec![&small]]);
    }

    #[test]
    fn loose_resource_is_never_split() {
        let observation = json!({
            "resourceType": "Observation",
            "id": "bp",
            "component": [
                {"code": {"text": "a".repeat(60)}},
                {"code": {"text": "b".repeat(60)}},
                {"code": {"text": "c".repeat(60)}}
            ]
        });

        assert_eq!(flatten_resources(&observation), vec![&observation]);
        assert_eq!(chunk_resources(&observation, 120), vec![vec![&observation]]);
    }

    #[test]
    fn empty_collection_is_one_chunk() {
        let input = json!({"resourceType": "Bundle", "entry": []});
        assert_eq!(chunk_resources(&input, 10), vec![vec![&input]]);
    }
}
