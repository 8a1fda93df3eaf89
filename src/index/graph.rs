//! SQLite 기반 그래프 스토어
//!
//! 노드/엣지 두 테이블로 문서-청크-분류체계 그래프를 저장합니다.
//! 저장 위치: ~/.taxorag/graph.db
//!
//! 탐색 질의는 HAS_CHUNK 조인으로 후보 청크를 모은 뒤 Rust 쪽에서
//! 부분 문자열 매칭(청크 내용 3점, 문서 제목 2점, 그 외 1점)으로
//! 점수를 매깁니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::taxonomy::{Taxonomy, TaxonomyReference};

use super::{
    DocumentMetadata, EdgeType, GraphChunkQuery, GraphHit, GraphStore, NodeLabel, SearchFilter,
};

// ============================================================================
// Node Properties
// ============================================================================

/// Chunk 노드 속성
#[derive(Debug, Serialize, Deserialize)]
struct ChunkProps {
    content: String,
    document_id: String,
    start_offset: usize,
    end_offset: usize,
}

/// 분류체계 노드 속성 (상위 계보 포함)
///
/// RELATES_TO 대상 노드 하나만으로 전체 참조를 복원할 수 있도록
/// 상위 레벨의 id/이름을 함께 저장합니다.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TaxonomyNodeProps {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategory_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategory_name: Option<String>,
}

// ============================================================================
// SqliteGraphStore
// ============================================================================

/// SQLite 그래프 스토어
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteGraphStore {
    /// 스토어 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| RagError::StoreWrite(format!("failed to open graph db: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// 인메모리 스토어 (테스트용)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RagError::StoreWrite(format!("failed to open graph db: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// DB 파일 경로
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 스키마 초기화
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS nodes (
                id         TEXT NOT NULL,
                label      TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (id, label)
            );

            CREATE TABLE IF NOT EXISTS edges (
                src TEXT NOT NULL,
                dst TEXT NOT NULL,
                rel TEXT NOT NULL,
                PRIMARY KEY (src, dst, rel)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_src ON edges(src, rel);
            CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst, rel);
            "#,
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to init schema: {}", e)))?;

        Ok(())
    }

    /// 노드 upsert
    fn upsert_node(
        conn: &Connection,
        id: &str,
        label: NodeLabel,
        properties: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO nodes (id, label, properties) VALUES (?1, ?2, ?3)",
            params![id, label.as_str(), properties],
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to upsert node: {}", e)))?;
        Ok(())
    }

    /// 엣지 upsert (중복 무시)
    fn upsert_edge(conn: &Connection, src: &str, dst: &str, rel: EdgeType) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO edges (src, dst, rel) VALUES (?1, ?2, ?3)",
            params![src, dst, rel.as_str()],
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to upsert edge: {}", e)))?;
        Ok(())
    }

    /// 노드 존재 여부
    fn node_exists(conn: &Connection, id: &str, label: NodeLabel) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE id = ?1 AND label = ?2",
                params![id, label.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| RagError::StoreQuery(format!("failed to check node: {}", e)))?;
        Ok(count > 0)
    }

    /// 참조의 가장 구체적인 분류체계 노드로 RELATES_TO 엣지 생성
    ///
    /// 대상 노드가 없으면 엣지를 만들지 않고 경고만 남깁니다.
    fn link_references(
        conn: &Connection,
        src: &str,
        references: &[TaxonomyReference],
    ) -> Result<()> {
        for reference in references {
            let (level, target_id) = reference.most_specific();
            let label = match level {
                crate::taxonomy::TaxonomyLevel::Category => NodeLabel::Category,
                crate::taxonomy::TaxonomyLevel::Subcategory => NodeLabel::Subcategory,
                crate::taxonomy::TaxonomyLevel::Criterion => NodeLabel::Criterion,
            };

            if Self::node_exists(conn, target_id, label)? {
                Self::upsert_edge(conn, src, target_id, EdgeType::RelatesTo)?;
            } else {
                tracing::warn!(
                    "Skipping RELATES_TO edge: {} node {} not found",
                    label.as_str(),
                    target_id
                );
            }
        }
        Ok(())
    }

    /// 청크의 RELATES_TO 대상에서 분류체계 참조 복원
    fn references_for(conn: &Connection, chunk_id: &str) -> Result<Vec<TaxonomyReference>> {
        let mut stmt = conn
            .prepare(
                "SELECT n.id, n.label, n.properties
                 FROM edges e
                 JOIN nodes n ON n.id = e.dst
                 WHERE e.src = ?1 AND e.rel = 'RELATES_TO'
                   AND n.label IN ('Category', 'Subcategory', 'Criterion')
                 ORDER BY n.id",
            )
            .map_err(|e| RagError::StoreQuery(format!("failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![chunk_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| RagError::StoreQuery(format!("failed to query references: {}", e)))?;

        let mut references = Vec::new();
        for row in rows {
            let (id, label, props_json) =
                row.map_err(|e| RagError::StoreQuery(format!("failed to read row: {}", e)))?;
            let props: TaxonomyNodeProps = serde_json::from_str(&props_json).unwrap_or_default();

            let reference = match label.as_str() {
                "Category" => TaxonomyReference::category(&id, &props.name),
                "Subcategory" => TaxonomyReference::category(
                    props.category_id.as_deref().unwrap_or_default(),
                    props.category_name.as_deref().unwrap_or_default(),
                )
                .with_subcategory(&id, &props.name),
                "Criterion" => TaxonomyReference::category(
                    props.category_id.as_deref().unwrap_or_default(),
                    props.category_name.as_deref().unwrap_or_default(),
                )
                .with_subcategory(
                    props.subcategory_id.as_deref().unwrap_or_default(),
                    props.subcategory_name.as_deref().unwrap_or_default(),
                )
                .with_criterion(&id, &props.name),
                _ => continue,
            };
            references.push(reference);
        }

        Ok(references)
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn init_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        let conn = self.lock();

        for category in &taxonomy.categories {
            let props = TaxonomyNodeProps {
                name: category.name.clone(),
                description: if category.description.is_empty() {
                    None
                } else {
                    Some(category.description.clone())
                },
                ..Default::default()
            };
            Self::upsert_node(
                &conn,
                &category.id,
                NodeLabel::Category,
                &to_json(&props)?,
            )?;

            for sub in &category.subcategories {
                let props = TaxonomyNodeProps {
                    name: sub.name.clone(),
                    category_id: Some(category.id.clone()),
                    category_name: Some(category.name.clone()),
                    ..Default::default()
                };
                Self::upsert_node(&conn, &sub.id, NodeLabel::Subcategory, &to_json(&props)?)?;
                Self::upsert_edge(&conn, &category.id, &sub.id, EdgeType::HasSubcategory)?;

                for criterion in &sub.criteria {
                    let props = TaxonomyNodeProps {
                        name: criterion.name.clone(),
                        category_id: Some(category.id.clone()),
                        category_name: Some(category.name.clone()),
                        subcategory_id: Some(sub.id.clone()),
                        subcategory_name: Some(sub.name.clone()),
                        ..Default::default()
                    };
                    Self::upsert_node(
                        &conn,
                        &criterion.id,
                        NodeLabel::Criterion,
                        &to_json(&props)?,
                    )?;
                    Self::upsert_edge(&conn, &sub.id, &criterion.id, EdgeType::HasCriterion)?;
                }
            }
        }

        tracing::info!(
            "Taxonomy initialized: {} categories",
            taxonomy.categories.len()
        );
        Ok(())
    }

    async fn upsert_document(
        &self,
        document_id: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
    ) -> Result<()> {
        let conn = self.lock();

        Self::upsert_node(&conn, document_id, NodeLabel::Document, &to_json(metadata)?)?;
        Self::link_references(&conn, document_id, references)?;

        Ok(())
    }

    async fn upsert_chunk(
        &self,
        chunk_id: &str,
        document_id: &str,
        content: &str,
        start_offset: usize,
        end_offset: usize,
        references: &[TaxonomyReference],
    ) -> Result<()> {
        let conn = self.lock();

        let props = ChunkProps {
            content: content.to_string(),
            document_id: document_id.to_string(),
            start_offset,
            end_offset,
        };
        Self::upsert_node(&conn, chunk_id, NodeLabel::Chunk, &to_json(&props)?)?;
        Self::upsert_edge(&conn, document_id, chunk_id, EdgeType::HasChunk)?;
        Self::link_references(&conn, chunk_id, references)?;

        Ok(())
    }

    async fn query_chunks(&self, query: &GraphChunkQuery) -> Result<Vec<GraphHit>> {
        let conn = self.lock();

        // 분류체계 제약은 가장 구체적인 레벨의 RELATES_TO 엣지 존재로 검사
        let taxonomy_target: Option<String> = query
            .taxonomy
            .as_ref()
            .map(|r| r.most_specific().1.to_string());

        let sql = if taxonomy_target.is_some() {
            "SELECT c.id, c.properties, d.id, d.properties
             FROM nodes c
             JOIN edges hc ON hc.dst = c.id AND hc.rel = 'HAS_CHUNK'
             JOIN nodes d ON d.id = hc.src AND d.label = 'Document'
             WHERE c.label = 'Chunk'
               AND EXISTS (
                   SELECT 1 FROM edges r
                   WHERE r.src = c.id AND r.rel = 'RELATES_TO' AND r.dst = ?1
               )
             ORDER BY c.id"
        } else {
            "SELECT c.id, c.properties, d.id, d.properties
             FROM nodes c
             JOIN edges hc ON hc.dst = c.id AND hc.rel = 'HAS_CHUNK'
             JOIN nodes d ON d.id = hc.src AND d.label = 'Document'
             WHERE c.label = 'Chunk'
             ORDER BY c.id"
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| RagError::StoreQuery(format!("failed to prepare query: {}", e)))?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        };

        let rows: Vec<(String, String, String, String)> = match taxonomy_target {
            Some(ref target) => stmt
                .query_map(params![target], map_row)
                .map_err(|e| RagError::StoreQuery(format!("failed to query chunks: {}", e)))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| RagError::StoreQuery(format!("failed to read rows: {}", e)))?,
            None => stmt
                .query_map([], map_row)
                .map_err(|e| RagError::StoreQuery(format!("failed to query chunks: {}", e)))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| RagError::StoreQuery(format!("failed to read rows: {}", e)))?,
        };

        let mut hits = Vec::new();

        for (chunk_id, chunk_json, document_id, document_json) in rows {
            let chunk_props: ChunkProps = match serde_json::from_str(&chunk_json) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Skipping malformed chunk node {}: {}", chunk_id, e);
                    continue;
                }
            };
            let metadata: DocumentMetadata =
                serde_json::from_str(&document_json).unwrap_or_default();

            // 메타데이터 필터
            if let Some(ref filter) = query.filter {
                if !matches_filter(&metadata, filter) {
                    continue;
                }
            }

            // 부분 문자열 매칭: 내용 3점, 제목 2점, 그 외 1점
            let score = if !query.text.is_empty() && chunk_props.content.contains(&query.text) {
                3.0
            } else if !query.text.is_empty() && metadata.title.contains(&query.text) {
                2.0
            } else if query.text.is_empty() {
                1.0
            } else {
                // 텍스트 매칭 실패 - 후보에서 제외
                continue;
            };

            let taxonomy_references = Self::references_for(&conn, &chunk_id)?;

            hits.push(GraphHit {
                chunk_id,
                document_id,
                document_title: metadata.title.clone(),
                content: chunk_props.content,
                score,
                taxonomy_references,
                metadata: metadata.to_map(),
            });
        }

        // 점수 내림차순 (동점은 청크 id 순서 유지)
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.top_k);

        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut conn = self.lock();

        let tx = conn
            .transaction()
            .map_err(|e| RagError::StoreWrite(format!("failed to begin transaction: {}", e)))?;

        let chunk_ids: Vec<String> = {
            let mut stmt = tx
                .prepare("SELECT dst FROM edges WHERE src = ?1 AND rel = 'HAS_CHUNK'")
                .map_err(|e| RagError::StoreQuery(format!("failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map(params![document_id], |row| row.get::<_, String>(0))
                .map_err(|e| RagError::StoreQuery(format!("failed to query chunks: {}", e)))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| RagError::StoreQuery(format!("failed to read rows: {}", e)))?;
            rows
        };

        let mut deleted = 0usize;

        for chunk_id in &chunk_ids {
            deleted += tx
                .execute(
                    "DELETE FROM nodes WHERE id = ?1 AND label = 'Chunk'",
                    params![chunk_id],
                )
                .map_err(|e| RagError::StoreWrite(format!("failed to delete chunk: {}", e)))?;
            tx.execute(
                "DELETE FROM edges WHERE src = ?1 OR dst = ?1",
                params![chunk_id],
            )
            .map_err(|e| RagError::StoreWrite(format!("failed to delete edges: {}", e)))?;
        }

        deleted += tx
            .execute(
                "DELETE FROM nodes WHERE id = ?1 AND label = 'Document'",
                params![document_id],
            )
            .map_err(|e| RagError::StoreWrite(format!("failed to delete document: {}", e)))?;
        tx.execute(
            "DELETE FROM edges WHERE src = ?1 OR dst = ?1",
            params![document_id],
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to delete edges: {}", e)))?;

        tx.commit()
            .map_err(|e| RagError::StoreWrite(format!("failed to commit: {}", e)))?;

        Ok(deleted)
    }

    async fn node_count(&self, label: NodeLabel) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE label = ?1",
                params![label.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| RagError::StoreQuery(format!("failed to count nodes: {}", e)))?;
        Ok(count as usize)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 메타데이터가 필터를 만족하는지 검사
fn matches_filter(metadata: &DocumentMetadata, filter: &SearchFilter) -> bool {
    if let Some(ref category) = filter.category {
        if metadata.category.as_deref() != Some(category.as_str()) {
            return false;
        }
    }
    if let Some(ref author) = filter.author {
        if metadata.author.as_deref() != Some(author.as_str()) {
            return false;
        }
    }
    if let Some(ref after) = filter.published_after {
        match metadata.published_date {
            Some(ref date) if date.as_str() >= after.as_str() => {}
            _ => return false,
        }
    }
    if let Some(ref before) = filter.published_before {
        match metadata.published_date {
            Some(ref date) if date.as_str() <= before.as_str() => {}
            _ => return false,
        }
    }
    true
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| RagError::StoreWrite(format!("failed to serialize properties: {}", e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{CategoryDef, CriterionDef, SubcategoryDef};

    fn test_taxonomy() -> Taxonomy {
        Taxonomy {
            categories: vec![CategoryDef {
                id: "1".into(),
                name: "Leadership".into(),
                description: "Leading the organization".into(),
                subcategories: vec![SubcategoryDef {
                    id: "1.1".into(),
                    name: "Vision".into(),
                    criteria: vec![CriterionDef {
                        id: "1.1.1".into(),
                        name: "Direction".into(),
                    }],
                }],
            }],
        }
    }

    fn test_metadata(title: &str) -> DocumentMetadata {
        let mut metadata = DocumentMetadata::new(title, "text/plain");
        metadata.author = Some("kim".into());
        metadata.category = Some("Leadership".into());
        metadata.published_date = Some("2024-03-01".into());
        metadata
    }

    async fn seeded_store() -> SqliteGraphStore {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.init_taxonomy(&test_taxonomy()).await.unwrap();

        let refs = vec![TaxonomyReference::category("1", "Leadership")
            .with_subcategory("1.1", "Vision")];

        store
            .upsert_document("doc-1", &test_metadata("Annual Report"), &refs)
            .await
            .unwrap();
        store
            .upsert_chunk("chunk-a", "doc-1", "vision and direction matter", 0, 28, &refs)
            .await
            .unwrap();
        store
            .upsert_chunk("chunk-b", "doc-1", "unrelated filler text", 28, 49, &refs)
            .await
            .unwrap();

        store
    }

    #[tokio::test]
    async fn test_init_taxonomy_creates_nodes() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.init_taxonomy(&test_taxonomy()).await.unwrap();

        assert_eq!(store.node_count(NodeLabel::Category).await.unwrap(), 1);
        assert_eq!(store.node_count(NodeLabel::Subcategory).await.unwrap(), 1);
        assert_eq!(store.node_count(NodeLabel::Criterion).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_init_taxonomy_idempotent() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.init_taxonomy(&test_taxonomy()).await.unwrap();
        store.init_taxonomy(&test_taxonomy()).await.unwrap();

        assert_eq!(store.node_count(NodeLabel::Category).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_scores_content_over_title() {
        let store = seeded_store().await;

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: None,
                filter: None,
                top_k: 10,
            })
            .await
            .unwrap();

        // "vision"은 chunk-a 내용에 있음 → 3점
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "chunk-a");
        assert_eq!(hits[0].score, 3.0);
    }

    #[tokio::test]
    async fn test_query_title_match_scores_two() {
        let store = seeded_store().await;

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "Annual".into(),
                taxonomy: None,
                filter: None,
                top_k: 10,
            })
            .await
            .unwrap();

        // 제목에만 매칭 → 모든 청크가 2점
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == 2.0));
    }

    #[tokio::test]
    async fn test_query_taxonomy_constraint() {
        let store = seeded_store().await;

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: Some(
                    TaxonomyReference::category("1", "Leadership")
                        .with_subcategory("1.1", "Vision"),
                ),
                filter: None,
                top_k: 10,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // 존재하지 않는 분류체계 노드로 제약하면 빈 결과
        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: Some(TaxonomyReference::category("9", "Missing")),
                filter: None,
                top_k: 10,
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_metadata_filter() {
        let store = seeded_store().await;

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: None,
                filter: Some(SearchFilter {
                    author: Some("park".into()),
                    ..Default::default()
                }),
                top_k: 10,
            })
            .await
            .unwrap();
        assert!(hits.is_empty());

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: None,
                filter: Some(SearchFilter {
                    author: Some("kim".into()),
                    published_after: Some("2024-01-01".into()),
                    published_before: Some("2024-12-31".into()),
                    ..Default::default()
                }),
                top_k: 10,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_hit_reconstructs_taxonomy_reference() {
        let store = seeded_store().await;

        let hits = store
            .query_chunks(&GraphChunkQuery {
                text: "vision".into(),
                taxonomy: None,
                filter: None,
                top_k: 10,
            })
            .await
            .unwrap();

        let reference = &hits[0].taxonomy_references[0];
        assert_eq!(reference.category_id, "1");
        assert_eq!(reference.category_name, "Leadership");
        assert_eq!(reference.subcategory_id.as_deref(), Some("1.1"));
        assert_eq!(reference.subcategory_name.as_deref(), Some("Vision"));
    }

    #[tokio::test]
    async fn test_upsert_document_is_idempotent() {
        let store = seeded_store().await;

        store
            .upsert_document("doc-1", &test_metadata("Annual Report v2"), &[])
            .await
            .unwrap();

        assert_eq!(store.node_count(NodeLabel::Document).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_document_removes_chunks() {
        let store = seeded_store().await;

        let deleted = store.delete_document("doc-1").await.unwrap();
        assert_eq!(deleted, 3); // 문서 1 + 청크 2

        assert_eq!(store.node_count(NodeLabel::Document).await.unwrap(), 0);
        assert_eq!(store.node_count(NodeLabel::Chunk).await.unwrap(), 0);
        // 분류체계 노드는 남는다
        assert_eq!(store.node_count(NodeLabel::Category).await.unwrap(), 1);
    }
}
