//! Simple decoder to inspect WA-strings.
//!
//! Pass an import string as the first argument; without one, a small demo
//! string is encoded and decoded in place.

use serde_json::json;
use wa_codec::{detect_version, Payload, WaCodec};

fn main() {
    let codec = WaCodec::new();

    let src = std::env::args().nth(1).unwrap_or_else(|| {
        let demo = json!({
            "d": {
                "id": "Demo Aura",
                "regionType": "icon",
                "load": {"class": {"multi": {"MAGE": true}}},
                "triggers": [{"trigger": {"type": "aura2", "spellIds": [12345]}}],
            },
        });
        codec.encode(&demo, None).expect("Failed to encode demo value")
    });

    println!("Input: {} chars", src.len());
    match detect_version(&src) {
        Some(version) => println!("Format: {:?} ({})", version, version.marker()),
        None => println!("Format: unrecognized"),
    }

    let payload = codec.decode(&src).expect("Failed to decode");

    match &payload {
        Payload::Text(text) => {
            println!("\n=== Text Payload ({} bytes) ===", text.len());
            let preview: String = text.chars().take(200).collect();
            println!("{}{}", preview, if text.len() > 200 { "..." } else { "" });
        }
        Payload::Value(value) => {
            println!("\n=== Value Payload ===");
            println!(
                "{}",
                serde_json::to_string_pretty(value).expect("Failed to render JSON")
            );
        }
    }

    // v1 payloads still resolve to a tree through the text strategy
    let value = codec.decode_value(&src).expect("Failed to decode to a value");
    match &value {
        serde_json::Value::Object(map) => {
            println!("\n=== Summary ===");
            println!("Top-level keys: {}", map.len());
            for key in map.keys().take(10) {
                println!("  - {}", key);
            }
        }
        other => println!("\nTop-level value: {}", other),
    }
}
