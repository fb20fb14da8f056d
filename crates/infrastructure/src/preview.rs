use base64::{engine::general_purpose, Engine as _};
use reelgen_errors::{ReelError, ReelResult};

/// 1 秒黑帧的极小 MP4，渲染器接入前作为预览占位
const PLACEHOLDER_MP4_BASE64: &str =
    "AAAAHGZ0eXBpc29tAAAAAGlzb21pc28yYXZjMQAAAAhmcmVlAAAAIG1kYXQAAAAAAAACAAACAAABAAABAAAAAAAZAAA=";

pub struct PreviewAsset;

impl PreviewAsset {
    pub fn placeholder_bytes() -> ReelResult<Vec<u8>> {
        general_purpose::STANDARD
            .decode(PLACEHOLDER_MP4_BASE64)
            .map_err(|e| ReelError::internal(format!("预览占位数据损坏: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_mp4() {
        let bytes = PreviewAsset::placeholder_bytes().unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[4..8], b"ftyp");
        assert_eq!(&bytes[8..12], b"isom");
    }
}
