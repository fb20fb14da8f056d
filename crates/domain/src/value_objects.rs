use std::fmt;
use std::str::FromStr;

use reelgen_errors::ReelError;
use serde::{Deserialize, Serialize};

/// 内容原型，决定hook与文案的语气
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Archetype {
    #[serde(rename = "CTA")]
    Cta,
    Educational,
    Storytelling,
    Testimonial,
    Authority,
}

impl Archetype {
    /// 轮换顺序，CreativeRotator 按此顺序取模
    pub const ROTATION: [Archetype; 5] = [
        Archetype::Cta,
        Archetype::Educational,
        Archetype::Storytelling,
        Archetype::Testimonial,
        Archetype::Authority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Cta => "CTA",
            Archetype::Educational => "Educational",
            Archetype::Storytelling => "Storytelling",
            Archetype::Testimonial => "Testimonial",
            Archetype::Authority => "Authority",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 目标时长档位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DurationClass {
    #[serde(rename = "7s")]
    Seconds7,
    #[default]
    #[serde(rename = "15s")]
    Seconds15,
    #[serde(rename = "30s")]
    Seconds30,
}

impl DurationClass {
    pub fn seconds(&self) -> u32 {
        match self {
            DurationClass::Seconds7 => 7,
            DurationClass::Seconds15 => 15,
            DurationClass::Seconds30 => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationClass::Seconds7 => "7s",
            DurationClass::Seconds15 => "15s",
            DurationClass::Seconds30 => "30s",
        }
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationClass {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7s" | "7" => Ok(DurationClass::Seconds7),
            "15s" | "15" => Ok(DurationClass::Seconds15),
            "30s" | "30" => Ok(DurationClass::Seconds30),
            _ => Err(ReelError::validation(format!(
                "无效的时长档位: {s}，支持: 7s, 15s, 30s"
            ))),
        }
    }
}

/// 叠加层样式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum OverlayStyle {
    #[default]
    Text,
    Infographic,
}

impl OverlayStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayStyle::Text => "Text",
            OverlayStyle::Infographic => "Infographic",
        }
    }
}

impl fmt::Display for OverlayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayStyle {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OverlayStyle::Text),
            "infographic" => Ok(OverlayStyle::Infographic),
            _ => Err(ReelError::validation(format!(
                "无效的叠加层样式: {s}，支持: Text, Infographic"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_class_seconds() {
        assert_eq!(DurationClass::Seconds7.seconds(), 7);
        assert_eq!(DurationClass::Seconds15.seconds(), 15);
        assert_eq!(DurationClass::Seconds30.seconds(), 30);
    }

    #[test]
    fn test_parse_value_objects() {
        assert_eq!("15s".parse::<DurationClass>().unwrap(), DurationClass::Seconds15);
        assert_eq!("30".parse::<DurationClass>().unwrap(), DurationClass::Seconds30);
        assert!("45s".parse::<DurationClass>().is_err());

        assert_eq!("infographic".parse::<OverlayStyle>().unwrap(), OverlayStyle::Infographic);
        assert!("video".parse::<OverlayStyle>().is_err());
    }

    #[test]
    fn test_archetype_serde_names() {
        assert_eq!(serde_json::to_string(&Archetype::Cta).unwrap(), "\"CTA\"");
        assert_eq!(
            serde_json::to_string(&DurationClass::Seconds7).unwrap(),
            "\"7s\""
        );
    }
}
