use rand::Rng;
use rand::distr::{Distribution, weighted::WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use super::{GlyphSource, LineSource, SourceCommon, random_chars};
use crate::config::{ChineseConfig, GeneratorKind};

const COMMON_CHARS: &str = "的一是了我不人在他有这个上们来到时大地为子中你说生国年着就那和要\
她出也得里后自以会家可下而过天去能对小多然于心学么之都好看起发当没成只如事把还用第样道想作种开美\
乖让相本关老头手高三两长明行见问名主进示己所次白应女其最感现向外由此前性华通先回实内情必全常\
满战南与什至些度电力水化二理物加量体制机使点从业它合因政四日社义平形表间各重新线数正反原又\
利比或但质气命变条结解意建月公无系军很者立代已并提直题党程展五果料象员革位入文总品式活设及管\
特件求基资边流路级少图山统接知较将组计别角期根论运农指几九区强放决西被干做则任取据处队给色光\
门即保治北造百规热领七海口东导器压志世金增争济阶油思术极交受联认六共权收证改清再采转更单风切\
打教速花带安场身车例真务具万每目达走积议声报斗完类八离确才科张信马节话米整空元况今集温传土许\
步群广石记需段研界拉林律叫且究观越织装影算低持音众书布复容儿须际商非验连断深难近矿千周委素技\
备半办青省列习响约支般史劳便团往酸历市克何除消构府称太准精值号率族维划选标写存候毛亲快效斯院\
查江型眼王按格养易置派层片始却专状育厂京识适属圆包火住调县局照参红细引听该铁价严龙飞";

const TRADITIONAL_CHARS: &str = "的一是了我不人在他有這個上們來到時大地為子中你說生國年著就那和要\
她出也得裡後自以會家可下而過天去能對小多然於心學麼之都好看起發當沒成只如事把還用第樣道想作種開美";

const SURNAMES: [char; 15] = [
    '王', '李', '张', '刘', '陈', '杨', '黄', '赵', '周', '吴', '徐', '孙', '朱', '马', '胡',
];
const PROVINCES: [&str; 10] = [
    "北京", "上海", "广东", "浙江", "江苏", "山东", "河北", "河南", "湖北", "湖南",
];
const CITY_SUFFIXES: [&str; 3] = ["市", "县", "区"];
const STREET_SUFFIXES: [&str; 5] = ["街", "路", "巷", "大道", "小区"];
const VERSE_CLAUSES: [usize; 2] = [5, 7];

const PUNCTUATION: &str = "。，？！；：“”‘’（）、";
const CLAUSE_ENDINGS: [char; 4] = ['，', '。', '？', '！'];

/// Ideographic lines: random characters, short word groupings,
/// clause-and-punctuation sentences, verse lines, or names and addresses.
pub struct IdeographicSource {
    common: SourceCommon,
    chars: Vec<char>,
    punctuation: Vec<char>,
    include_punctuation: bool,
    poem_probability: f64,
    form_probability: f64,
}

impl IdeographicSource {
    pub(crate) fn new(common: SourceCommon, config: &ChineseConfig) -> Self {
        let charset = match (config.charset.trim().is_empty(), config.traditional) {
            (false, _) => config.charset.as_str(),
            (true, true) => TRADITIONAL_CHARS,
            (true, false) => COMMON_CHARS,
        };
        let mut chars: Vec<char> = charset.chars().filter(|ch| !ch.is_whitespace()).collect();
        chars.sort_unstable();
        chars.dedup();
        Self {
            common,
            chars,
            punctuation: PUNCTUATION.chars().collect(),
            include_punctuation: config.include_punctuation,
            poem_probability: config.poem_probability,
            form_probability: config.form_probability,
        }
    }

    /// Regular clauses of five or seven characters, as in classical verse.
    fn verse(&self, rng: &mut StdRng, target: usize) -> String {
        let size = *VERSE_CLAUSES.choose(rng).unwrap_or(&7);
        let clauses = (target / (size + 1)).clamp(1, 4);
        let mut result = String::new();
        for clause in 0..clauses {
            result.push_str(&random_chars(rng, &self.chars, size));
            if self.include_punctuation {
                result.push(if clause + 1 == clauses { '。' } else { '，' });
            }
        }
        result
    }

    fn name(&self, rng: &mut StdRng) -> String {
        let mut result: String = SURNAMES.choose(rng).into_iter().collect();
        let given = rng.random_range(1..=2);
        result.push_str(&random_chars(rng, &self.chars, given));
        result
    }

    fn address(&self, rng: &mut StdRng) -> String {
        let mut result = String::new();
        result.push_str(PROVINCES.choose(rng).copied().unwrap_or_default());
        result.push_str(&random_chars(rng, &self.chars, 2));
        result.push_str(CITY_SUFFIXES.choose(rng).copied().unwrap_or_default());
        let street = rng.random_range(2..=4);
        result.push_str(&random_chars(rng, &self.chars, street));
        result.push_str(STREET_SUFFIXES.choose(rng).copied().unwrap_or_default());
        result.push_str(&format!("{}号", rng.random_range(1..=999)));
        result
    }

    fn generate(&self, rng: &mut StdRng, length: usize) -> String {
        // the extra draw only happens when verse or form lines are enabled
        let roll = if self.poem_probability + self.form_probability > 0.0 {
            rng.random::<f64>()
        } else {
            1.0
        };
        if roll < self.poem_probability {
            return self.verse(rng, length);
        }
        if roll < self.poem_probability + self.form_probability {
            return if rng.random_bool(0.5) {
                self.name(rng)
            } else {
                self.address(rng)
            };
        }
        match rng.random_range(0..3) {
            0 => self.random_run(rng, length),
            1 => self.words(rng, length),
            _ => self.sentence(rng, length),
        }
    }

    fn random_run(&self, rng: &mut StdRng, length: usize) -> String {
        let mut chars: Vec<char> = random_chars(rng, &self.chars, length).chars().collect();
        if self.include_punctuation && length > 2 && rng.random_bool(0.3) {
            let position = rng.random_range(1..length);
            if let Some(punct) = self.punctuation.choose(rng) {
                chars.insert(position, *punct);
            }
        }
        chars.into_iter().collect()
    }

    fn words(&self, rng: &mut StdRng, target: usize) -> String {
        let sizes = [2usize, 3, 4, 1];
        let Ok(picker) = WeightedIndex::new([0.5, 0.2, 0.1, 0.2]) else {
            return random_chars(rng, &self.chars, target);
        };
        let mut result = String::new();
        let mut length = 0;
        while length < target {
            let size = sizes[picker.sample(rng)].min(target - length);
            result.push_str(&random_chars(rng, &self.chars, size));
            length += size;
        }
        result
    }

    fn sentence(&self, rng: &mut StdRng, target: usize) -> String {
        let mut result = String::new();
        let mut length = 0;
        while length < target {
            let remaining = target - length;
            let clause = rng.random_range(remaining.min(2)..=remaining.min(6));
            result.push_str(&random_chars(rng, &self.chars, clause));
            length += clause;
            if self.include_punctuation && length + 1 < target && rng.random_bool(0.4) {
                if let Some(punct) = CLAUSE_ENDINGS.choose(rng) {
                    result.push(*punct);
                    length += 1;
                }
            }
        }
        result
    }
}

impl LineSource for IdeographicSource {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Chinese
    }

    fn language(&self) -> &str {
        &self.common.language
    }

    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        if self.chars.is_empty() && self.common.corpus.is_none() {
            return None;
        }
        self.common
            .text_or(index, rng, |rng, length| self.generate(rng, length))
    }

    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        self.common.backend.select(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{asset_backend, common};
    use rand::SeedableRng;

    fn source(include_punctuation: bool) -> IdeographicSource {
        IdeographicSource::new(
            common(asset_backend("天地人"), 2, 10),
            &ChineseConfig {
                include_punctuation,
                charset: "天地人".to_string(),
                ..ChineseConfig::default()
            },
        )
    }

    #[test]
    fn without_punctuation_only_charset_is_used() {
        let source = source(false);
        let mut rng = StdRng::seed_from_u64(8);
        for index in 0..40 {
            let text = source.produce_text(index, &mut rng).expect("text");
            let len = text.chars().count();
            assert!((2..=10).contains(&len), "{}", text);
            assert!(text.chars().all(|ch| "天地人".contains(ch)));
        }
    }

    #[test]
    fn sentences_never_end_with_clause_punctuation() {
        let source = source(true);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..40 {
            let text = source.sentence(&mut rng, 9);
            assert_eq!(text.chars().count(), 9);
            let last = text.chars().last().expect("last");
            assert!(!CLAUSE_ENDINGS.contains(&last));
        }
    }

    #[test]
    fn traditional_set_replaces_the_simplified_default() {
        let config = ChineseConfig {
            traditional: true,
            include_punctuation: false,
            ..ChineseConfig::default()
        };
        let source = IdeographicSource::new(common(asset_backend("天"), 4, 12), &config);
        assert!(source.chars.contains(&'這'));
        assert!(!source.chars.contains(&'这'));
        let mut rng = StdRng::seed_from_u64(2);
        let text = source.produce_text(0, &mut rng).expect("text");
        assert!(text.chars().all(|ch| TRADITIONAL_CHARS.contains(ch)));
    }

    #[test]
    fn verse_lines_have_regular_clauses() {
        let source = IdeographicSource::new(
            common(asset_backend("天地人"), 12, 16),
            &ChineseConfig {
                charset: "天地人".to_string(),
                poem_probability: 1.0,
                ..ChineseConfig::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(6);
        for index in 0..30 {
            let text = source.produce_text(index, &mut rng).expect("text");
            assert!(text.ends_with('。'), "{}", text);
            let clauses: Vec<&str> = text
                .trim_end_matches('。')
                .split('，')
                .collect();
            let size = clauses[0].chars().count();
            assert!(size == 5 || size == 7, "{}", text);
            assert!(clauses.iter().all(|c| c.chars().count() == size));
        }
    }

    #[test]
    fn form_lines_are_names_or_addresses() {
        let source = IdeographicSource::new(
            common(asset_backend("天地人"), 4, 10),
            &ChineseConfig {
                charset: "天地人".to_string(),
                form_probability: 1.0,
                ..ChineseConfig::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(9);
        let mut seen_name = false;
        let mut seen_address = false;
        for index in 0..40 {
            let text = source.produce_text(index, &mut rng).expect("text");
            if text.ends_with('号') {
                seen_address = true;
                assert!(PROVINCES.iter().any(|p| text.starts_with(p)), "{}", text);
            } else {
                seen_name = true;
                let first = text.chars().next().expect("surname");
                assert!(SURNAMES.contains(&first));
                assert!((2..=3).contains(&text.chars().count()));
            }
        }
        assert!(seen_name && seen_address);
    }
}
