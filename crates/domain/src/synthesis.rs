use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::entities::{
    BlockKind, BlockPayload, ChartKind, GenerationParams, OverlayBlock, OverlayDocument,
    SynthesisPayload,
};
use crate::value_objects::{Archetype, DurationClass, OverlayStyle};

pub const MIN_HASHTAGS: usize = 5;
pub const MAX_HASHTAGS: usize = 12;

const DOMAIN_TAGS: [&str; 4] = ["#reels", "#instagramreels", "#contentmarketing", "#viral"];
const EXTRA_TAGS: [&str; 7] = [
    "#howto",
    "#tips",
    "#trending",
    "#growth",
    "#storytime",
    "#review",
    "#learn",
];

/// 合成过程中用到的随机性，测试里可以替换成确定性实现
pub trait RandomSource: Send {
    /// 返回 [0, len) 内的下标，len 保证大于 0
    fn pick_index(&mut self, len: usize) -> usize;
    fn shuffle(&mut self, items: &mut [String]);
}

/// 基于 StdRng 的默认随机源
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }

    fn shuffle(&mut self, items: &mut [String]) {
        items.shuffle(&mut self.rng);
    }
}

/// 生成文案、标签与叠加层
pub struct ContentSynthesizer;

impl ContentSynthesizer {
    pub fn synthesize(
        params: &GenerationParams,
        archetype: Archetype,
        random: &mut dyn RandomSource,
    ) -> SynthesisPayload {
        let hook = Self::hook(archetype, &params.niche, random);
        let caption = format!("{hook}\n\n{}", Self::body(archetype, &params.niche, &params.product));

        SynthesisPayload {
            caption,
            hashtags: Self::hashtags(&params.niche, &params.product, archetype, random),
            overlay: Self::overlay(params.duration_class, params.overlay_style),
        }
    }

    fn hook_templates(archetype: Archetype, niche: &str) -> [String; 2] {
        match archetype {
            Archetype::Cta => [
                format!("Stop scrolling! {niche} pros do THIS today…"),
                format!("You’re missing out if you don’t try this in {niche}!"),
            ],
            Archetype::Educational => [
                format!("{niche}: 3 quick tips in 15s"),
                format!("Beginners in {niche} make this mistake…"),
            ],
            Archetype::Storytelling => [
                format!("I tried this {niche} trick for 7 days…"),
                format!("A {niche} story no one told you"),
            ],
            Archetype::Testimonial => [
                format!("Real results: how this changed my {niche}"),
                format!("Before/After in {niche}: 30 seconds"),
            ],
            Archetype::Authority => [
                format!("I’ve helped 100+ people with {niche}, here’s the playbook"),
                format!("{niche} in 30s: do this first"),
            ],
        }
    }

    pub fn hook(archetype: Archetype, niche: &str, random: &mut dyn RandomSource) -> String {
        let templates = Self::hook_templates(archetype, niche);
        let index = random.pick_index(templates.len()).min(templates.len() - 1);
        templates[index].clone()
    }

    pub fn body(archetype: Archetype, niche: &str, product: &str) -> String {
        match archetype {
            Archetype::Cta => format!("Try {product} today. Tap the link in bio to start."),
            Archetype::Educational => {
                format!("Quick breakdown to level up your {niche}. Save for later!")
            }
            Archetype::Storytelling => "Here’s what I learned so you don’t have to.".to_string(),
            Archetype::Testimonial => "Real results from real use. Curious?".to_string(),
            Archetype::Authority => format!("What actually works in {niche}, distilled."),
        }
    }

    /// 固定顺序的基础标签 + 打乱后的扩展标签，截取到 [5, 12] 个
    pub fn hashtags(
        niche: &str,
        product: &str,
        archetype: Archetype,
        random: &mut dyn RandomSource,
    ) -> Vec<String> {
        let niche_tag: String = niche.chars().filter(|c| !c.is_whitespace()).collect();
        let product_tag = product
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();

        let mut tags = vec![
            format!("#{niche_tag}"),
            format!("#{product_tag}"),
            format!("#{}", archetype.as_str().to_lowercase()),
        ];
        tags.extend(DOMAIN_TAGS.iter().map(|t| t.to_string()));

        let mut extras: Vec<String> = EXTRA_TAGS.iter().map(|t| t.to_string()).collect();
        random.shuffle(&mut extras);
        tags.extend(extras);

        let n = tags.len().clamp(MIN_HASHTAGS, MAX_HASHTAGS);
        tags.truncate(n);
        tags
    }

    pub fn beats(duration: u32, style: OverlayStyle) -> Vec<u32> {
        let beats = match style {
            OverlayStyle::Text => vec![1, 3, 5, 6.max(duration.saturating_sub(2))],
            OverlayStyle::Infographic => vec![2, 6, 8.max(duration.saturating_sub(4))],
        };
        beats.into_iter().map(|t| t.min(duration)).collect()
    }

    pub fn overlay(duration_class: DurationClass, style: OverlayStyle) -> OverlayDocument {
        let duration = duration_class.seconds();
        let beats = Self::beats(duration, style);
        let last = beats.len() - 1;

        let blocks = beats
            .iter()
            .enumerate()
            .map(|(i, &t)| match style {
                OverlayStyle::Text => {
                    let text = match i {
                        0 => "Hook".to_string(),
                        i if i == last => "CTA".to_string(),
                        i => format!("Point {i}"),
                    };
                    OverlayBlock {
                        t,
                        kind: BlockKind::Text,
                        payload: BlockPayload::Text { text },
                    }
                }
                OverlayStyle::Infographic => OverlayBlock {
                    t,
                    kind: BlockKind::Infographic,
                    payload: BlockPayload::Chart {
                        chart: if i % 2 == 0 {
                            ChartKind::Number
                        } else {
                            ChartKind::Bar
                        },
                        value: i as u32 * 25 + 25,
                    },
                },
            })
            .collect();

        OverlayDocument::new(duration, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FirstPick;

    impl RandomSource for FirstPick {
        fn pick_index(&mut self, _len: usize) -> usize {
            0
        }
        fn shuffle(&mut self, _items: &mut [String]) {}
    }

    fn params(duration: DurationClass, style: OverlayStyle) -> GenerationParams {
        GenerationParams::new("home fitness", "Protein Shake Pro", duration, style)
    }

    #[test]
    fn test_caption_is_hook_blank_line_body() {
        let payload = ContentSynthesizer::synthesize(
            &params(DurationClass::Seconds15, OverlayStyle::Text),
            Archetype::Cta,
            &mut FirstPick,
        );
        assert_eq!(
            payload.caption,
            "Stop scrolling! home fitness pros do THIS today…\n\nTry Protein Shake Pro today. Tap the link in bio to start."
        );
    }

    #[test]
    fn test_hashtags_base_before_extras() {
        let tags = ContentSynthesizer::hashtags(
            "home fitness",
            "Protein Shake Pro",
            Archetype::Educational,
            &mut FirstPick,
        );
        assert_eq!(
            tags,
            vec![
                "#homefitness",
                "#protein",
                "#educational",
                "#reels",
                "#instagramreels",
                "#contentmarketing",
                "#viral",
                "#howto",
                "#tips",
                "#trending",
                "#growth",
                "#storytime",
            ]
        );
    }

    #[test]
    fn test_hashtag_bounds_with_real_random() {
        let mut random = StdRandom::seeded(7);
        for archetype in Archetype::ROTATION {
            for _ in 0..20 {
                let tags =
                    ContentSynthesizer::hashtags("yoga", "mat", archetype, &mut random);
                assert!((MIN_HASHTAGS..=MAX_HASHTAGS).contains(&tags.len()));
                assert!(tags.iter().all(|t| t.starts_with('#')));
                assert_eq!(&tags[..7], &ContentSynthesizer::hashtags("yoga", "mat", archetype, &mut FirstPick)[..7]);
            }
        }
    }

    #[test]
    fn test_text_overlay_beats() {
        let doc = ContentSynthesizer::overlay(DurationClass::Seconds15, OverlayStyle::Text);
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.duration, 15);
        assert_eq!(doc.timestamps(), vec![1, 3, 5, 13]);
        assert_eq!(
            doc.blocks[0].payload,
            BlockPayload::Text {
                text: "Hook".to_string()
            }
        );
        assert_eq!(
            doc.blocks[1].payload,
            BlockPayload::Text {
                text: "Point 1".to_string()
            }
        );
        assert_eq!(
            doc.blocks[3].payload,
            BlockPayload::Text {
                text: "CTA".to_string()
            }
        );
    }

    #[test]
    fn test_infographic_overlay_beats() {
        let doc = ContentSynthesizer::overlay(DurationClass::Seconds30, OverlayStyle::Infographic);
        assert_eq!(doc.timestamps(), vec![2, 6, 26]);
        assert!(doc.blocks.iter().all(|b| b.kind == BlockKind::Infographic));
        assert_eq!(
            doc.blocks[0].payload,
            BlockPayload::Chart {
                chart: ChartKind::Number,
                value: 25
            }
        );
        assert_eq!(
            doc.blocks[1].payload,
            BlockPayload::Chart {
                chart: ChartKind::Bar,
                value: 50
            }
        );
    }

    #[test]
    fn test_overlay_always_well_formed() {
        for duration in [
            DurationClass::Seconds7,
            DurationClass::Seconds15,
            DurationClass::Seconds30,
        ] {
            for style in [OverlayStyle::Text, OverlayStyle::Infographic] {
                let doc = ContentSynthesizer::overlay(duration, style);
                assert!(doc.is_well_formed(), "{duration} {style}");
            }
        }
        // 7s 信息图的最后一拍被截到时长内
        let short = ContentSynthesizer::overlay(DurationClass::Seconds7, OverlayStyle::Infographic);
        assert_eq!(short.timestamps(), vec![2, 6, 7]);
    }
}
