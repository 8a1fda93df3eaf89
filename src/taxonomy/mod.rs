//! 분류체계(Taxonomy) 모듈
//!
//! 고정된 3단계 분류체계 (카테고리 → 하위 카테고리 → 평가 기준)와
//! 문서/청크에 부착되는 분류 참조를 정의합니다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

// ============================================================================
// Taxonomy Reference
// ============================================================================

/// 분류체계 노드 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyLevel {
    Category,
    Subcategory,
    Criterion,
}

impl TaxonomyLevel {
    /// 그래프 노드 라벨 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyLevel::Category => "Category",
            TaxonomyLevel::Subcategory => "Subcategory",
            TaxonomyLevel::Criterion => "Criterion",
        }
    }
}

/// 분류체계 참조
///
/// 문서/청크가 분류체계의 어느 위치와 관련되는지를 나타냅니다.
/// 카테고리는 필수, 하위 레벨은 선택입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyReference {
    pub category_id: String,
    pub category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion_name: Option<String>,
}

impl TaxonomyReference {
    /// 카테고리 레벨 참조 생성
    pub fn category(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category_id: id.into(),
            category_name: name.into(),
            ..Default::default()
        }
    }

    /// 하위 카테고리 지정
    pub fn with_subcategory(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.subcategory_id = Some(id.into());
        self.subcategory_name = Some(name.into());
        self
    }

    /// 평가 기준 지정
    pub fn with_criterion(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.criterion_id = Some(id.into());
        self.criterion_name = Some(name.into());
        self
    }

    /// 중복 제거용 키: (category_id, subcategory_id, criterion_id)
    pub fn key(&self) -> (String, String, String) {
        (
            self.category_id.clone(),
            self.subcategory_id.clone().unwrap_or_default(),
            self.criterion_id.clone().unwrap_or_default(),
        )
    }

    /// 가장 구체적인 레벨과 해당 노드 id 반환
    ///
    /// 우선순위: criterion > subcategory > category
    pub fn most_specific(&self) -> (TaxonomyLevel, &str) {
        if let Some(ref id) = self.criterion_id {
            (TaxonomyLevel::Criterion, id)
        } else if let Some(ref id) = self.subcategory_id {
            (TaxonomyLevel::Subcategory, id)
        } else {
            (TaxonomyLevel::Category, self.category_id.as_str())
        }
    }
}

/// 참조 목록에서 (category, subcategory, criterion) id 튜플 기준 중복 제거
///
/// 첫 등장 순서를 유지합니다.
pub fn dedup_references(refs: &mut Vec<TaxonomyReference>) {
    let mut seen = std::collections::HashSet::new();
    refs.retain(|r| seen.insert(r.key()));
}

// ============================================================================
// Taxonomy Structure
// ============================================================================

/// 평가 기준 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionDef {
    pub id: String,
    pub name: String,
}

/// 하위 카테고리 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub criteria: Vec<CriterionDef>,
}

/// 카테고리 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryDef>,
}

/// 3단계 분류체계 전체 구조
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxonomy {
    pub categories: Vec<CategoryDef>,
}

impl Taxonomy {
    /// JSON 문자열에서 로드
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RagError::InvalidParameter(format!("invalid taxonomy json: {}", e)))
    }

    /// JSON 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// 최소 구조 (1~7 카테고리, 하위 레벨 없음)
    ///
    /// 분류체계 파일이 없을 때의 폴백입니다.
    pub fn minimal() -> Self {
        Self {
            categories: (1..=7)
                .map(|i| CategoryDef {
                    id: i.to_string(),
                    name: format!("Category {}", i),
                    description: String::new(),
                    subcategories: vec![],
                })
                .collect(),
        }
    }

    /// 카테고리 id로 조회
    pub fn category(&self, id: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_specific_precedence() {
        let cat = TaxonomyReference::category("1", "Leadership");
        assert_eq!(cat.most_specific(), (TaxonomyLevel::Category, "1"));

        let sub = TaxonomyReference::category("1", "Leadership").with_subcategory("1.1", "Vision");
        assert_eq!(sub.most_specific(), (TaxonomyLevel::Subcategory, "1.1"));

        let cri = TaxonomyReference::category("1", "Leadership")
            .with_subcategory("1.1", "Vision")
            .with_criterion("1.1.1", "Direction");
        assert_eq!(cri.most_specific(), (TaxonomyLevel::Criterion, "1.1.1"));
    }

    #[test]
    fn test_dedup_references_keeps_order() {
        let mut refs = vec![
            TaxonomyReference::category("2", "Strategy"),
            TaxonomyReference::category("1", "Leadership"),
            TaxonomyReference::category("2", "Strategy"),
            TaxonomyReference::category("1", "Leadership").with_subcategory("1.1", "Vision"),
        ];

        dedup_references(&mut refs);

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].category_id, "2");
        assert_eq!(refs[1].category_id, "1");
        assert_eq!(refs[2].subcategory_id.as_deref(), Some("1.1"));
    }

    #[test]
    fn test_taxonomy_from_json() {
        let json = r#"{
            "categories": [
                {
                    "id": "1",
                    "name": "Leadership",
                    "subcategories": [
                        {
                            "id": "1.1",
                            "name": "Vision",
                            "criteria": [{"id": "1.1.1", "name": "Direction"}]
                        }
                    ]
                }
            ]
        }"#;

        let taxonomy = Taxonomy::from_json(json).unwrap();
        assert_eq!(taxonomy.categories.len(), 1);
        assert_eq!(taxonomy.categories[0].subcategories[0].criteria.len(), 1);
        assert!(taxonomy.category("1").is_some());
        assert!(taxonomy.category("9").is_none());
    }

    #[test]
    fn test_taxonomy_invalid_json() {
        assert!(Taxonomy::from_json("not json").is_err());
    }

    #[test]
    fn test_minimal_taxonomy() {
        let taxonomy = Taxonomy::minimal();
        assert_eq!(taxonomy.categories.len(), 7);
    }
}
