use serde::{Deserialize, Serialize};
use std::fmt;

// CEFR 六个等级，从低到高排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

// 无法识别等级时，调用方显式使用的默认值
pub const DEFAULT_LEVEL: CefrLevel = CefrLevel::A1;

// 旧版等级名称（只接受小写比较）
const LEGACY_LEVELS: [(&str, CefrLevel); 3] = [
    ("beginner", CefrLevel::A1),
    ("intermediate", CefrLevel::B1),
    ("advanced", CefrLevel::C1),
];

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    // 把任意写法的等级转换为标准 CEFR 等级，无法识别时返回 None，
    // 不在这里猜测默认值
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let upper = trimmed.to_uppercase();
        if let Some(level) = Self::ALL.iter().find(|level| level.as_str() == upper) {
            return Some(*level);
        }

        let lower = trimmed.to_lowercase();
        LEGACY_LEVELS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, level)| *level)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }

    // 模板里使用的大致阶段名称
    pub fn band_label(self) -> &'static str {
        match self {
            CefrLevel::A1 | CefrLevel::A2 => "beginner",
            CefrLevel::B1 | CefrLevel::B2 => "intermediate",
            CefrLevel::C1 | CefrLevel::C2 => "advanced",
        }
    }

    pub fn next(self) -> Option<Self> {
        let index = self as usize;
        Self::ALL.get(index + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        let index = self as usize;
        index.checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn normalize(raw: &str) -> Option<CefrLevel> {
    CefrLevel::normalize(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_codes_are_identity_in_any_case() {
        for level in CefrLevel::ALL {
            let code = level.as_str();
            assert_eq!(normalize(code), Some(level));
            assert_eq!(normalize(&code.to_lowercase()), Some(level));
            assert_eq!(normalize(&format!("  {}\t", code)), Some(level));
        }
        assert_eq!(normalize("c2"), Some(CefrLevel::C2));
    }

    #[test]
    fn legacy_names_map_case_insensitively() {
        assert_eq!(normalize("beginner"), Some(CefrLevel::A1));
        assert_eq!(normalize("Intermediate"), Some(CefrLevel::B1));
        assert_eq!(normalize(" ADVANCED "), Some(CefrLevel::C1));
    }

    #[test]
    fn unrecognized_input_returns_none() {
        assert_eq!(normalize("xyz"), None);
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("D1"), None);
        assert_eq!(normalize("begin ner"), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["a1", "Beginner", "advanced", "b2"] {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(once.as_str()), Some(once));
        }
    }

    #[test]
    fn levels_are_totally_ordered() {
        assert!(CefrLevel::A1 < CefrLevel::A2);
        assert!(CefrLevel::B2 < CefrLevel::C1);
        let mut shuffled = vec![CefrLevel::C1, CefrLevel::A2, CefrLevel::B1, CefrLevel::C2, CefrLevel::A1, CefrLevel::B2];
        shuffled.sort();
        assert_eq!(shuffled, CefrLevel::ALL.to_vec());
    }

    #[test]
    fn next_and_previous_walk_the_scale() {
        assert_eq!(CefrLevel::A1.previous(), None);
        assert_eq!(CefrLevel::A1.next(), Some(CefrLevel::A2));
        assert_eq!(CefrLevel::C2.next(), None);
        assert_eq!(CefrLevel::C1.previous(), Some(CefrLevel::B2));
    }

    #[test]
    fn display_uses_canonical_code() {
        assert_eq!(CefrLevel::B2.to_string(), "B2");
        assert_eq!(CefrLevel::C1.band_label(), "advanced");
    }
}
