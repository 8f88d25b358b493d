//! Benchmark for WA-string encoding and decoding using a synthetic aura pack.
//!
//! Builds a large display collection in memory, then times both format
//! versions and the async dispatch path.

use std::time::Instant;

use serde_json::{json, Value};
use wa_codec::{FormatVersion, Payload, WaCodec};

const CLASSES: [&str; 6] = ["MAGE", "PRIEST", "DRUID", "SHAMAN", "WARLOCK", "PALADIN"];
const REGION_TYPES: [&str; 4] = ["icon", "aurabar", "progresstexture", "text"];
const DECODE_ITERS: u32 = 20;

/// One display table, shaped like a real aura export: identity, load
/// conditions, trigger list, and a handful of layout numbers.
fn build_display(index: u32) -> Value {
    let class = CLASSES[index as usize % CLASSES.len()];
    let region = REGION_TYPES[index as usize % REGION_TYPES.len()];
    json!({
        "id": format!("Aura {index}"),
        "uid": format!("synthetic{index:08}"),
        "regionType": region,
        "load": {
            "class": {"multi": {class: true}},
            "size": {"multi": {"party": true}},
        },
        "triggers": [
            {
                "trigger": {
                    "type": "aura2",
                    "spellIds": [10000 + index, 20000 + index],
                    "unit": "player",
                    "debuffType": "HELPFUL",
                },
                "untrigger": {"custom_hide": "timed"},
            },
        ],
        "xOffset": (index % 400) as f64 - 200.0,
        "yOffset": ((index * 7) % 300) as f64 - 150.0,
        "width": 48,
        "height": 48,
        "frameStrata": 1,
        "conditions": [],
        "config": [],
        "authorOptions": [],
        "animation": {
            "start": {"type": "none", "duration_type": "seconds"},
            "main": {"type": "none", "duration_type": "seconds"},
            "finish": {"type": "none", "duration_type": "seconds"},
        },
    })
}

/// A group export: one parent with `count` children, keyed like the real
/// transmission envelope.
fn build_pack(count: u32) -> Value {
    let mut children = Vec::with_capacity(count as usize);
    let mut child_ids = Vec::with_capacity(count as usize);
    for index in 0..count {
        children.push(build_display(index));
        child_ids.push(format!("Aura {index}"));
    }
    json!({
        "m": "d",
        "s": "WA-dev",
        "v": 2000,
        "d": {
            "id": "Synthetic Pack",
            "uid": "syntheticpack001",
            "regionType": "group",
            "controlledChildren": child_ids,
            "load": {"size": {"multi": {"party": true}}},
            "triggers": [{"trigger": {"type": "custom"}, "untrigger": {"custom_hide": "timed"}}],
        },
        "c": children,
    })
}

fn count_nodes(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(count_nodes).sum::<usize>(),
        Value::Object(map) => 1 + map.values().map(count_nodes).sum::<usize>(),
        _ => 1,
    }
}

fn throughput(bytes: usize, elapsed: std::time::Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
}

fn main() {
    let display_count: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(500);

    let build_start = Instant::now();
    let pack = build_pack(display_count);
    let build_time = build_start.elapsed();

    let json_size = serde_json::to_string(&pack).expect("Failed to render JSON").len();
    println!(
        "Built {} displays ({} nodes, {} bytes as JSON) in {:?}",
        display_count,
        count_nodes(&pack),
        json_size,
        build_time
    );

    let codec = WaCodec::new();

    // Encode, both versions
    let encode_start = Instant::now();
    let encoded_v2 = codec
        .encode(&pack, Some(FormatVersion::BinarySerialization))
        .expect("Failed to encode v2");
    let encode_v2_time = encode_start.elapsed();

    println!(
        "\nEncode v2: {} chars in {:?} ({:.2} MB/s of JSON)",
        encoded_v2.len(),
        encode_v2_time,
        throughput(json_size, encode_v2_time)
    );

    let encode_start = Instant::now();
    let encoded_v1 = codec
        .encode(&pack, Some(FormatVersion::Deflate))
        .expect("Failed to encode v1");
    let encode_v1_time = encode_start.elapsed();

    println!(
        "Encode v1: {} chars in {:?} ({:.2} MB/s of JSON)",
        encoded_v1.len(),
        encode_v1_time,
        throughput(json_size, encode_v1_time)
    );
    println!(
        "  v2 vs v1 size: {:.1}%",
        100.0 * encoded_v2.len() as f64 / encoded_v1.len() as f64
    );

    // Decode v2
    for _ in 0..3 {
        let _ = codec.decode_value(&encoded_v2).expect("Failed to decode v2");
    }
    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = Some(codec.decode_value(&encoded_v2).expect("Failed to decode v2"));
    }
    let decode_v2_time = decode_start.elapsed() / DECODE_ITERS;
    assert_eq!(decoded.expect("no decode ran"), pack);

    println!(
        "\nDecode v2: {:?} avg of {} iterations ({:.2} MB/s of JSON)",
        decode_v2_time,
        DECODE_ITERS,
        throughput(json_size, decode_v2_time)
    );

    // Decode v1, to text only and through the strategy
    for _ in 0..3 {
        let _ = codec.decode(&encoded_v1).expect("Failed to decode v1");
    }
    let decode_start = Instant::now();
    let mut text_len = 0;
    for _ in 0..DECODE_ITERS {
        match codec.decode(&encoded_v1).expect("Failed to decode v1") {
            Payload::Text(text) => text_len = text.len(),
            Payload::Value(_) => unreachable!("v1 strings decode to text"),
        }
    }
    let decode_v1_text_time = decode_start.elapsed() / DECODE_ITERS;

    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = Some(codec.decode_value(&encoded_v1).expect("Failed to decode v1"));
    }
    let decode_v1_time = decode_start.elapsed() / DECODE_ITERS;
    assert_eq!(decoded.expect("no decode ran"), pack);

    println!(
        "Decode v1 to text: {:?} avg ({} Ace bytes)",
        decode_v1_text_time, text_len
    );
    println!(
        "Decode v1 to value: {:?} avg ({:.2} MB/s of JSON)",
        decode_v1_time,
        throughput(json_size, decode_v1_time)
    );

    // Async dispatch overhead
    let runtime = tokio::runtime::Runtime::new().expect("Failed to start runtime");
    let async_start = Instant::now();
    let async_decoded = runtime
        .block_on(codec.decode_value_async(encoded_v2.clone()))
        .expect("Failed to decode async");
    let async_time = async_start.elapsed();
    assert_eq!(async_decoded, pack);

    println!(
        "\nAsync decode v2 (cold runtime): {:?} (+{:?} over sync)",
        async_time,
        async_time.saturating_sub(decode_v2_time)
    );

    // Summary
    println!("\n=== Summary ===");
    println!("Displays: {}", display_count);
    println!("JSON: {} bytes", json_size);
    println!(
        "v2 string: {} chars ({:.1}% of JSON)",
        encoded_v2.len(),
        100.0 * encoded_v2.len() as f64 / json_size as f64
    );
    println!(
        "v1 string: {} chars ({:.1}% of JSON)",
        encoded_v1.len(),
        100.0 * encoded_v1.len() as f64 / json_size as f64
    );
}
