//! Tantivy-based search index module.
//!
//! Provides full-text search over imported projects with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Project;

/// Field boost values; titles dominate, tools barely count.
const BOOST_TITLE: f32 = 10.0;
const BOOST_SHORT_DESC: f32 = 7.0;
const BOOST_SUBJECTS: f32 = 6.0;
const BOOST_TAGS: f32 = 5.0;
const BOOST_LONG_DESC: f32 = 4.0;
const BOOST_TOOLS: f32 = 2.0;

/// Search hit with project id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub project_id: String,
    pub score: f32,
}

/// One page of hits plus the number of matching documents.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// Search index schema fields.
struct SearchFields {
    project_id: Field,
    title: Field,
    short_desc: Field,
    long_desc: Field,
    subjects: Field,
    tags: Field,
    tools: Field,
}

/// Tantivy search index for projects.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // STRING so the id can be deleted by exact term
        let project_id = schema_builder.add_text_field("project_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let short_desc = schema_builder.add_text_field("short_desc", TEXT);
        let long_desc = schema_builder.add_text_field("long_desc", TEXT);
        let subjects = schema_builder.add_text_field("subjects", TEXT);
        let tags = schema_builder.add_text_field("tags", TEXT);
        let tools = schema_builder.add_text_field("tools", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            project_id,
            title,
            short_desc,
            long_desc,
            subjects,
            tags,
            tools,
        };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from projects.
    pub async fn rebuild(&self, projects: &[Project]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;

        for project in projects {
            writer.add_document(self.create_document(project))?;
        }

        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} projects", projects.len());
        Ok(())
    }

    /// Index a single project, replacing any earlier version of it.
    pub async fn index_project(&self, project: &Project) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.project_id, &project.id);
        writer.delete_term(term);

        writer.add_document(self.create_document(project))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Remove a project from the index.
    pub async fn remove_project(&self, project_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.project_id, project_id);
        writer.delete_term(term);
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for projects matching the query.
    ///
    /// `total` counts every match regardless of `limit` and `offset`.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchHits, AppError> {
        if query_str.trim().is_empty() {
            return Ok(SearchHits::default());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.short_desc,
                self.fields.long_desc,
                self.fields.subjects,
                self.fields.tags,
                self.fields.tools,
            ],
        );

        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.short_desc, BOOST_SHORT_DESC),
            (self.fields.subjects, BOOST_SUBJECTS),
            (self.fields.tags, BOOST_TAGS),
            (self.fields.long_desc, BOOST_LONG_DESC),
            (self.fields.tools, BOOST_TOOLS),
        ];

        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                let boosted = BoostQuery::new(field_query, boost);
                subqueries.push((Occur::Should, Box::new(boosted)));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let total = searcher
            .search(&combined_query, &Count)
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        // TopDocs rejects a zero limit; the fetch window never exceeds the match count
        if limit == 0 || offset >= total {
            return Ok(SearchHits {
                results: Vec::new(),
                total,
            });
        }
        let window = offset + limit.min(total - offset);

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(window))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let project_id = doc.get_first(self.fields.project_id)?.as_str()?.to_string();
                Some(SearchResult { project_id, score })
            })
            .collect();

        Ok(SearchHits { results, total })
    }

    fn create_document(&self, project: &Project) -> TantivyDocument {
        doc!(
            self.fields.project_id => project.id.clone(),
            self.fields.title => project.title.clone(),
            self.fields.short_desc => project.short_desc.clone(),
            self.fields.long_desc => project.long_desc.clone(),
            self.fields.subjects => project.subjects.join(" "),
            self.fields.tags => project.tags.join(" "),
            self.fields.tools => project.tools.join(" ")
        )
    }
}
