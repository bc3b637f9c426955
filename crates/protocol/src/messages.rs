use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload protocol payloads
// ---------------------------------------------------------------------------

/// Opens the begin phase of a bundle transfer.
///
/// `expected_checksum` is the SHA-256 hex digest of the whole plaintext
/// file, computed before the first chunk is sent. The hub verifies
/// reassembly against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub expected_checksum: String,
}

/// One encrypted chunk.
///
/// `data` is `nonce || ciphertext+tag`, base64-encoded on the wire to match
/// the browser client's `btoa` framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub chunk_index: u64,
}

// ---------------------------------------------------------------------------
// Installation session payloads
// ---------------------------------------------------------------------------

/// One application in an install batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallItem {
    pub id: String,
    pub version: String,
}

/// Batch install request: the payload is the bare item list, matching the
/// original `Install(applications)` call shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallRequest(pub Vec<InstallItem>);

/// Pause/resume command for the active install batch.
///
/// Serializes to the bare strings `"stop"` / `"continue"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallControl {
    Stop,
    Continue,
}

/// Mutation verb for `ModifyInstallationSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Cancel,
}

/// Requests a mutation of one installation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifySessionRequest {
    pub action: SessionAction,
    pub item: InstallItem,
}

// ---------------------------------------------------------------------------
// Hub pushes
// ---------------------------------------------------------------------------

/// Advisory telemetry about remaining install time. No client state changes
/// on receipt, so every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingTimeReport {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub remaining_seconds: f64,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_upload_field_names() {
        let req = StartUploadRequest {
            file_name: "app.bundle".into(),
            file_size: 256_000,
            chunk_size: 102_400,
            expected_checksum: "ab".repeat(32),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"fileName\""));
        assert!(json.contains("\"fileSize\""));
        assert!(json.contains("\"chunkSize\""));
        assert!(json.contains("\"expectedChecksum\""));
    }

    #[test]
    fn upload_chunk_base64_roundtrip() {
        let req = UploadChunkRequest {
            data: vec![0x48, 0x65, 0x6c, 0x6c, 0x6f],
            chunk_index: 3,
        };
        let json = serde_json::to_string(&req).unwrap();
        // "Hello" base64-encodes to "SGVsbG8="
        assert!(json.contains("SGVsbG8="));
        assert!(json.contains("\"chunkIndex\":3"));
        let parsed: UploadChunkRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn install_request_is_bare_list() {
        let req = InstallRequest(vec![InstallItem {
            id: "pycharm_community_0.0.1".into(),
            version: "2025.1.3.1".into(),
        }]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"id\":\"pycharm_community_0.0.1\""));
    }

    #[test]
    fn install_control_bare_strings() {
        assert_eq!(
            serde_json::to_string(&InstallControl::Stop).unwrap(),
            "\"stop\""
        );
        assert_eq!(
            serde_json::to_string(&InstallControl::Continue).unwrap(),
            "\"continue\""
        );
    }

    #[test]
    fn modify_session_shape() {
        let req = ModifySessionRequest {
            action: SessionAction::Cancel,
            item: InstallItem {
                id: "blender_0.0.1".into(),
                version: "4.5.0".into(),
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"action\":\"cancel\""));
        assert!(json.contains("\"version\":\"4.5.0\""));
    }

    #[test]
    fn remaining_time_tolerates_missing_fields() {
        let report: RemainingTimeReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report.item_id, "");
        assert_eq!(report.remaining_seconds, 0.0);
    }
}
