use crate::value_objects::Archetype;

/// 按全局计数器轮换内容原型
pub struct CreativeRotator;

impl CreativeRotator {
    pub fn next_type(index: u64) -> Archetype {
        let len = Archetype::ROTATION.len() as u64;
        Archetype::ROTATION[(index % len) as usize]
    }

    /// 从 start 开始连续取 count 个原型
    pub fn batch(start: u64, count: usize) -> Vec<Archetype> {
        (0..count as u64)
            .map(|offset| Self::next_type(start.wrapping_add(offset)))
            .collect()
    }
}
