use reelgen_domain::Reel;
use reelgen_errors::{ReelError, ReelResult};
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::preview::PreviewAsset;

/// 批量导出时最多打包的 Reel 数
pub const BATCH_EXPORT_LIMIT: usize = 3;

/// 只读的导出打包器，不修改任何 Reel 状态
pub struct ExportBundler;

impl ExportBundler {
    pub fn bundle_file_name(reel: &Reel) -> String {
        format!("reelgen-{}.zip", reel.id)
    }

    /// 单个 Reel：`reel-{id}.mp4`、`caption-{id}.txt`、`overlay-{id}.json`
    pub fn export_reel(reel: &Reel) -> ReelResult<Vec<u8>> {
        let video = PreviewAsset::placeholder_bytes()?;
        let overlay = serde_json::to_string_pretty(&reel.overlay)?;
        let caption = reel.caption_with_hashtags();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        Self::add_file(&mut writer, format!("reel-{}.mp4", reel.id), &video)?;
        Self::add_file(&mut writer, format!("caption-{}.txt", reel.id), caption.as_bytes())?;
        Self::add_file(&mut writer, format!("overlay-{}.json", reel.id), overlay.as_bytes())?;

        let bytes = Self::finish(writer)?;
        debug!(reel_id = %reel.id, bytes = bytes.len(), "单个Reel导出完成");
        Ok(bytes)
    }

    /// 前三个 Reel，各自放在 `{id}/` 目录下
    pub fn export_batch(reels: &[Reel]) -> ReelResult<Vec<u8>> {
        if reels.is_empty() {
            return Err(ReelError::validation("没有可导出的Reel"));
        }

        let video = PreviewAsset::placeholder_bytes()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for reel in reels.iter().take(BATCH_EXPORT_LIMIT) {
            let overlay = serde_json::to_string_pretty(&reel.overlay)?;
            let caption = reel.caption_with_hashtags();

            Self::add_file(&mut writer, format!("{}/video.mp4", reel.id), &video)?;
            Self::add_file(&mut writer, format!("{}/caption.txt", reel.id), caption.as_bytes())?;
            Self::add_file(&mut writer, format!("{}/overlay.json", reel.id), overlay.as_bytes())?;
        }

        let bytes = Self::finish(writer)?;
        info!(
            count = reels.len().min(BATCH_EXPORT_LIMIT),
            bytes = bytes.len(),
            "批量导出完成"
        );
        Ok(bytes)
    }

    fn add_file(
        writer: &mut ZipWriter<Cursor<Vec<u8>>>,
        name: String,
        contents: &[u8],
    ) -> ReelResult<()> {
        writer
            .start_file(name.as_str(), SimpleFileOptions::default())
            .map_err(|e| ReelError::export(format!("创建压缩条目 {name} 失败: {e}")))?;
        writer
            .write_all(contents)
            .map_err(|e| ReelError::export(format!("写入压缩条目 {name} 失败: {e}")))
    }

    fn finish(writer: ZipWriter<Cursor<Vec<u8>>>) -> ReelResult<Vec<u8>> {
        writer
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| ReelError::export(format!("完成压缩包失败: {e}")))
    }
}
