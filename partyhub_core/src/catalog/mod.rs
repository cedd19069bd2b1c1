//! Content catalog, read side (C6).
//!
//! Seed words and penalty phrases are compile-time resources
//! (`include_str!`'d JSON under `assets/`) rather than a migrated table —
//! `spec.md` §9 explicitly permits this for a small fixed seed set. Loaded
//! once into a process-wide `OnceLock` on first use.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::room::GameCode;

struct SeedCategory {
    category_id: &'static str,
    game: GameCode,
    name: &'static str,
    is_penalty: bool,
    json: &'static str,
}

const SEED: &[SeedCategory] = &[
    SeedCategory {
        category_id: "quiz-animals",
        game: GameCode::Quiz,
        name: "동물",
        is_penalty: false,
        json: include_str!("../../assets/quiz_animals.json"),
    },
    SeedCategory {
        category_id: "quiz-movies",
        game: GameCode::Quiz,
        name: "영화",
        is_penalty: false,
        json: include_str!("../../assets/quiz_movies.json"),
    },
    SeedCategory {
        category_id: "quiz-jobs",
        game: GameCode::Quiz,
        name: "직업",
        is_penalty: false,
        json: include_str!("../../assets/quiz_jobs.json"),
    },
    SeedCategory {
        category_id: "quiz-sports",
        game: GameCode::Quiz,
        name: "스포츠",
        is_penalty: false,
        json: include_str!("../../assets/quiz_sports.json"),
    },
    SeedCategory {
        category_id: "quiz-music",
        game: GameCode::Quiz,
        name: "악기",
        is_penalty: false,
        json: include_str!("../../assets/quiz_music.json"),
    },
    SeedCategory {
        category_id: "quiz-proverbs",
        game: GameCode::Quiz,
        name: "속담",
        is_penalty: false,
        json: include_str!("../../assets/quiz_proverbs.json"),
    },
    SeedCategory {
        category_id: "quiz-food",
        game: GameCode::Quiz,
        name: "음식",
        is_penalty: false,
        json: include_str!("../../assets/quiz_food.json"),
    },
    SeedCategory {
        category_id: "quiz-advanced",
        game: GameCode::Quiz,
        name: "심화",
        is_penalty: false,
        json: include_str!("../../assets/quiz_advanced.json"),
    },
    SeedCategory {
        category_id: "liar-general",
        game: GameCode::Liar,
        name: "일반",
        is_penalty: false,
        json: include_str!("../../assets/liar_keywords.json"),
    },
    SeedCategory {
        category_id: "marble-default",
        game: GameCode::Marble,
        name: "기본 벌칙",
        is_penalty: true,
        json: include_str!("../../assets/marble_penalties.json"),
    },
];

/// Built-in fallback used only if the catalog's own penalty category is
/// somehow also exhausted (spec.md §4.5.1 step 3's last resort).
pub const FALLBACK_PENALTIES: &[&str] = &[
    "원샷하기", "애교 부리기", "노래 한 소절 부르기", "러브샷 하기", "옆 사람 칭찬하기",
    "눈 감고 한 바퀴 돌기", "성대모사 하기", "윙크 날리기", "3초간 정지하기",
    "지목한 사람과 건배하기", "즉석 시 짓기", "별명 짓기", "팔굽혀펴기 5회",
    "벌칙 통과권 양도하기", "춤 추기", "상대방 따라하기", "랜덤 질문에 답하기",
    "오른손으로 왼쪽 귀 잡기", "가위바위보 3연패자 원샷", "박수 세 번 치고 웃기",
    "혀 짧은 소리로 말하기", "반대로 말하기", "물구나무서기 시도", "투명의자 10초",
    "건배사 하기", "이름 삼행시 짓기",
];

#[derive(Clone, Debug, Serialize)]
pub struct CategoryInfo {
    pub category_id: String,
    pub name: String,
    pub word_count: usize,
}

/// A read-only view over the seeded content. Cheap to clone (all fields
/// are `'static` references); typically accessed through [`Catalog::global`].
#[derive(Clone, Copy)]
pub struct Catalog {
    seed: &'static [SeedCategory],
}

static GLOBAL: OnceLock<Catalog> = OnceLock::new();

impl Catalog {
    fn find(&self, category_id: &str) -> Option<&'static SeedCategory> {
        self.seed.iter().find(|c| c.category_id == category_id)
    }

    fn words(category: &SeedCategory) -> Vec<String> {
        serde_json::from_str(category.json).unwrap_or_default()
    }

    /// The process-wide catalog instance, parsed once on first access.
    pub fn global() -> &'static Catalog {
        GLOBAL.get_or_init(|| Catalog { seed: SEED })
    }

    pub fn list_categories(&self, game: GameCode) -> Vec<CategoryInfo> {
        self.seed
            .iter()
            .filter(|c| c.game == game && !c.is_penalty)
            .map(|c| CategoryInfo {
                category_id: c.category_id.to_string(),
                name: c.name.to_string(),
                word_count: Self::words(c).len(),
            })
            .collect()
    }

    /// Up to `n` randomized rows from `category_id`; empty if the category
    /// is unknown.
    pub fn random_words(&self, category_id: &str, n: usize) -> Vec<String> {
        let Some(category) = self.find(category_id) else {
            return Vec::new();
        };
        let mut words = Self::words(category);
        words.shuffle(&mut rand::rng());
        words.truncate(n);
        words
    }

    /// The penalty category for `game`, if one is seeded.
    pub fn find_one_penalty_category(&self, game: GameCode) -> Option<CategoryInfo> {
        self.seed
            .iter()
            .find(|c| c.game == game && c.is_penalty)
            .map(|c| CategoryInfo {
                category_id: c.category_id.to_string(),
                name: c.name.to_string(),
                word_count: Self::words(c).len(),
            })
    }

    /// Every row of `category_id`, in file order (unshuffled).
    pub fn all_content(&self, category_id: &str) -> Vec<String> {
        self.find(category_id).map(Self::words).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_has_eight_categories() {
        let categories = Catalog::global().list_categories(GameCode::Quiz);
        assert_eq!(categories.len(), 8);
        assert!(categories.iter().all(|c| c.word_count > 0));
    }

    #[test]
    fn liar_has_one_category() {
        let categories = Catalog::global().list_categories(GameCode::Liar);
        assert_eq!(categories.len(), 1);
    }

    #[test]
    fn marble_penalty_category_has_at_least_26_rows() {
        let category = Catalog::global()
            .find_one_penalty_category(GameCode::Marble)
            .unwrap();
        assert!(category.word_count >= 26);
    }

    #[test]
    fn mafia_has_no_categories() {
        assert!(Catalog::global()
            .list_categories(GameCode::Mafia)
            .is_empty());
        assert!(Catalog::global()
            .find_one_penalty_category(GameCode::Mafia)
            .is_none());
    }

    #[test]
    fn random_words_never_exceeds_n_and_is_a_subset() {
        let catalog = Catalog::global();
        let all = catalog.all_content("quiz-animals");
        let drawn = catalog.random_words("quiz-animals", 5);
        assert_eq!(drawn.len(), 5);
        assert!(drawn.iter().all(|w| all.contains(w)));
    }

    #[test]
    fn random_words_unknown_category_is_empty() {
        assert!(Catalog::global().random_words("does-not-exist", 5).is_empty());
    }

    #[test]
    fn fallback_penalties_has_at_least_26_entries() {
        assert!(FALLBACK_PENALTIES.len() >= 26);
    }
}
