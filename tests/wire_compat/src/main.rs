fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bundlehub_protocol::envelope::Message;
    use bundlehub_protocol::messages::{
        InstallRequest, ModifySessionRequest, RemainingTimeReport, StartUploadRequest,
        UploadChunkRequest,
    };
    use bundlehub_protocol::session::{InstallationSnapshot, ItemStatus, SessionStatus};

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_fixture_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes JSON numbers so integer and float spellings of the same
    /// value compare equal. The hub writes `120` where Rust's serializer
    /// writes `120.0` for an `f64`; both mean the same frame.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and
    /// compares the JSON values (order-independent, float-normalized).
    ///
    /// Goes through strings rather than `serde_json::from_value` because
    /// the envelope keeps its payload as `RawValue`, which only the text
    /// deserializer can produce.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let text = load_fixture_text(name);
        let parsed: T = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_string(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        let fixture: serde_json::Value = serde_json::from_str(&text).unwrap();
        let rust: serde_json::Value = serde_json::from_str(&reserialized).unwrap();
        let norm_fixture = normalize_value(&fixture);
        let norm_rust = normalize_value(&rust);
        assert_eq!(
            norm_fixture, norm_rust,
            "roundtrip mismatch for {name}:\n  hub:  {fixture}\n  rust: {rust}"
        );
    }

    // --- Envelope ---

    #[test]
    fn fixture_message_envelope() {
        roundtrip_test::<Message>("message_envelope.json");
    }

    #[test]
    fn fixture_error_envelope() {
        roundtrip_test::<Message>("error_envelope.json");

        let msg: Message = serde_json::from_str(&load_fixture_text("error_envelope.json")).unwrap();
        let err = msg.into_result().unwrap_err();
        assert_eq!(err.code, 422);
    }

    // --- Upload protocol payloads ---

    #[test]
    fn fixture_start_upload_request() {
        roundtrip_test::<StartUploadRequest>("start_upload_request.json");
    }

    #[test]
    fn fixture_upload_chunk_request() {
        roundtrip_test::<UploadChunkRequest>("upload_chunk_request.json");

        // The data field must decode from base64 into raw bytes.
        let req: UploadChunkRequest =
            serde_json::from_value(load_fixture("upload_chunk_request.json")).unwrap();
        assert!(!req.data.is_empty());
        assert_eq!(req.chunk_index, 2);
    }

    // --- Installation session payloads ---

    #[test]
    fn fixture_install_request_is_a_bare_list() {
        let fixture = load_fixture("install_request.json");
        assert!(fixture.is_array(), "install payload must be the item list");
        roundtrip_test::<InstallRequest>("install_request.json");
    }

    #[test]
    fn fixture_modify_session_request() {
        roundtrip_test::<ModifySessionRequest>("modify_session_request.json");
    }

    #[test]
    fn fixture_session_snapshot() {
        roundtrip_test::<InstallationSnapshot>("session_snapshot.json");

        let snap: InstallationSnapshot =
            serde_json::from_value(load_fixture("session_snapshot.json")).unwrap();
        assert_eq!(snap.status, SessionStatus::Running);
        assert_eq!(snap.items[1].status, ItemStatus::Installing);
    }

    #[test]
    fn fixture_remaining_time_report() {
        roundtrip_test::<RemainingTimeReport>("remaining_time_report.json");
    }

    // --- Tolerant parsing: shapes older hub builds actually send ---

    #[test]
    fn snapshot_pushed_as_a_json_string() {
        // Some hub builds double-encode the snapshot payload.
        let inner = load_fixture("session_snapshot.json");
        let wrapped = serde_json::Value::String(inner.to_string());
        let snap = InstallationSnapshot::from_report(&wrapped).unwrap();
        assert_eq!(snap.items.len(), 3);
    }

    #[test]
    fn snapshot_item_without_progress_defaults_to_zero() {
        let json = r#"{
            "status": "running",
            "items": [
                {"id": "blender_0.0.1", "version": "4.5.0", "status": "pending"}
            ]
        }"#;
        let snap: InstallationSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.items[0].progress, 0);
    }

    #[test]
    fn unknown_session_status_still_parses() {
        let json = r#"{"status": "rebalancing", "items": []}"#;
        let snap: InstallationSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.status, SessionStatus::Unknown);
    }

    #[test]
    fn remaining_time_with_no_fields_parses() {
        let report: RemainingTimeReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report.item_id, "");
        assert_eq!(report.remaining_seconds, 0.0);
    }
}
