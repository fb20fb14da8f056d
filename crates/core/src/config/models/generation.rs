use reelgen_domain::{DurationClass, OverlayStyle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub auto_generate_enabled: bool,
    pub auto_generate_interval_hours: u64,
    pub auto_check_interval_seconds: u64,
    pub default_duration: DurationClass,
    pub default_overlay_style: OverlayStyle,
    /// 手动排期未指定时间时的默认偏移
    pub manual_schedule_offset_minutes: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            auto_generate_enabled: true,
            auto_generate_interval_hours: 24,
            auto_check_interval_seconds: 300,
            default_duration: DurationClass::Seconds15,
            default_overlay_style: OverlayStyle::Text,
            manual_schedule_offset_minutes: 10,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auto_generate_interval_hours == 0 {
            return Err(anyhow::anyhow!("自动生成间隔必须大于0"));
        }
        if self.auto_check_interval_seconds == 0 {
            return Err(anyhow::anyhow!("自动生成检查间隔必须大于0"));
        }
        if self.manual_schedule_offset_minutes <= 0 {
            return Err(anyhow::anyhow!("手动排期偏移必须大于0分钟"));
        }
        Ok(())
    }
}
