//! Editor use-case service.
//!
//! # Responsibility
//! - Load, navigate and resume models with their sentences.
//! - Turn edited paragraphs into reconcile plans and persist them.
//! - Cross-link sentences into other models through a preview/commit pair.
//! - Allocate identifiers and create structures.
//!
//! # Invariants
//! - Every identifier from callers is decoded before storage is touched.
//! - A blank paragraph clears the model; it never reaches the splitter.
//! - Multi-model commits are applied in one transaction.

use crate::model::body::{has_well_formed_variant, neutral_name, normalize_name, BodyModel, ModelRecord};
use crate::model::identifier::{
    allocate_first_fit, Classification, Gender, IdentifierError, ModelValue,
    DEFAULT_START_VALUE,
};
use crate::model::sentence::Sentence;
use crate::navigation::{resolve, Direction, NavigationError};
use crate::repo::model_repo::{
    DescriptionFilter, ModelRepository, ModelSearchQuery, SqliteModelRepository,
};
use crate::repo::sentence_repo::{SaveOutcome, SentenceRepository, SqliteSentenceRepository};
use crate::repo::RepoError;
use crate::session::{SessionError, SessionStore};
use crate::text::paragraph::{
    append_sentences_to_paragraph, append_text_to_paragraph, split_paragraph, ParagraphError,
};
use crate::text::reconcile::reconcile_associations;
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EditorResult<T> = Result<T, EditorError>;

/// Service error for editor use-cases.
#[derive(Debug)]
pub enum EditorError {
    InvalidIdentifier(IdentifierError),
    /// Directional move from a value that is not stored.
    UnknownIdentifier(i64),
    EmptyParagraph,
    /// Structure insert would overwrite an existing value.
    DuplicateStructure(i64),
    /// Structure insert is missing the named field.
    IncompleteStructure(&'static str),
    ModelNotFound(i64),
    EmptyDataset,
    Session(SessionError),
    Repo(RepoError),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::UnknownIdentifier(value) => write!(f, "model value {value} does not exist"),
            Self::EmptyParagraph => write!(f, "paragraph is blank"),
            Self::DuplicateStructure(value) => write!(f, "structure {value} already exists"),
            Self::IncompleteStructure(field) => write!(f, "structure is missing `{field}`"),
            Self::ModelNotFound(value) => write!(f, "model not found: {value}"),
            Self::EmptyDataset => write!(f, "no models are stored"),
            Self::Session(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EditorError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(value) => Self::ModelNotFound(value),
            RepoError::Duplicate(value) => Self::DuplicateStructure(value),
            other => Self::Repo(other),
        }
    }
}

impl From<IdentifierError> for EditorError {
    fn from(value: IdentifierError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

impl From<NavigationError> for EditorError {
    fn from(value: NavigationError) -> Self {
        match value {
            NavigationError::InvalidIdentifier(err) => Self::InvalidIdentifier(err),
            NavigationError::UnknownIdentifier(value) => Self::UnknownIdentifier(value),
            NavigationError::EmptyDataset => Self::EmptyDataset,
        }
    }
}

impl From<ParagraphError> for EditorError {
    fn from(value: ParagraphError) -> Self {
        match value {
            ParagraphError::EmptyParagraph => Self::EmptyParagraph,
        }
    }
}

impl From<SessionError> for EditorError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

/// Input for administrative structure creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStructure {
    pub value: i64,
    pub name: String,
    /// Required for leaf values; 0 is treated as absent.
    pub parent_value: Option<i64>,
}

/// Editor service facade over model and sentence repositories.
pub struct EditorService<M: ModelRepository, S: SentenceRepository> {
    models: M,
    sentences: S,
    search_limit: u32,
}

impl<'conn> EditorService<SqliteModelRepository<'conn>, SqliteSentenceRepository<'conn>> {
    /// Builds a service over SQLite repositories sharing one connection.
    pub fn from_connection(conn: &'conn Connection) -> EditorResult<Self> {
        Ok(Self::new(
            SqliteModelRepository::try_new(conn)?,
            SqliteSentenceRepository::try_new(conn)?,
        ))
    }
}

impl<M: ModelRepository, S: SentenceRepository> EditorService<M, S> {
    pub fn new(models: M, sentences: S) -> Self {
        Self {
            models,
            sentences,
            search_limit: 1000,
        }
    }

    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit;
        self
    }

    /// Loads one model and its ordered sentences.
    pub fn load_model(&self, value: i64) -> EditorResult<BodyModel> {
        let value = ModelValue::new(value)?;
        let record = self.require_record(value)?;
        let sentences = self.sentences.load_sentences(value)?;
        Ok(BodyModel::new(record, sentences))
    }

    /// Resolves a previous/next/jump request and loads the resulting model.
    pub fn navigate(&self, target: i64, direction: Direction) -> EditorResult<BodyModel> {
        let ordered = self.models.list_values_ordered()?;
        let resolved = resolve(target, direction, &ordered)?;
        self.load_model(resolved)
    }

    /// Reopens the last viewed model, or the model nearest to the default
    /// start value when the session is missing, unreadable or stale.
    pub fn resume(&self, session: &SessionStore) -> EditorResult<BodyModel> {
        match session.load() {
            Ok(Some(value)) => match self.navigate(value, Direction::Jump) {
                Ok(model) => return Ok(model),
                Err(EditorError::EmptyDataset) => return Err(EditorError::EmptyDataset),
                Err(err) => warn!(
                    "event=session_resume module=service status=fallback model_value={} error={}",
                    value, err
                ),
            },
            Ok(None) => {}
            Err(err) => warn!(
                "event=session_resume module=service status=fallback error={}",
                err
            ),
        }
        self.navigate(DEFAULT_START_VALUE, Direction::Jump)
    }

    pub fn remember(&self, session: &SessionStore, value: ModelValue) -> EditorResult<()> {
        session.save(value)?;
        Ok(())
    }

    /// Searches models by name, then by legacy info.
    pub fn search(
        &self,
        keywords: &str,
        system_id: Option<u8>,
        filter: DescriptionFilter,
    ) -> EditorResult<Vec<ModelRecord>> {
        let query = ModelSearchQuery {
            keywords: keywords.to_string(),
            system_id,
            filter,
            limit: Some(self.search_limit),
        };
        Ok(self.models.search_models(&query)?)
    }

    /// Keywords a search box is prefilled with for `model`.
    pub fn default_search_keywords(&self, model: &BodyModel) -> String {
        neutral_name(model.name())
    }

    pub fn split_preview(&self, paragraph: &str) -> EditorResult<Vec<Sentence>> {
        Ok(split_paragraph(paragraph)?)
    }

    /// Persists an edited paragraph. Blank text clears the model.
    pub fn save_paragraph(&self, value: i64, paragraph: &str) -> EditorResult<SaveOutcome> {
        if paragraph.trim().is_empty() {
            return self.clear_sentences(value);
        }
        let sentences = split_paragraph(paragraph)?;
        self.save_sentences(value, &sentences)
    }

    pub fn save_sentences(&self, value: i64, sentences: &[Sentence]) -> EditorResult<SaveOutcome> {
        let value = ModelValue::new(value)?;
        self.require_record(value)?;
        let existing = self.sentences.load_links(value)?;
        let plan = reconcile_associations(value, sentences, &existing);
        let mut outcomes = self.sentences.apply_plans(std::slice::from_ref(&plan))?;
        outcomes
            .pop()
            .ok_or_else(|| RepoError::InvalidData("plan produced no outcome".to_string()).into())
    }

    pub fn clear_sentences(&self, value: i64) -> EditorResult<SaveOutcome> {
        let value = ModelValue::new(value)?;
        self.require_record(value)?;
        let unlinked = self.sentences.clear_links(value)?;
        Ok(SaveOutcome {
            model_value: value,
            linked: 0,
            unlinked,
            reordered: 0,
            new_sentences: 0,
        })
    }

    /// Loads each target and merges `sentences` into it without saving.
    pub fn preview_links(
        &self,
        sentences: &[Sentence],
        targets: &[i64],
    ) -> EditorResult<Vec<BodyModel>> {
        targets
            .iter()
            .map(|target| {
                let mut model = self.load_model(*target)?;
                model.merge(sentences);
                Ok(model)
            })
            .collect()
    }

    /// Saves the sentence lists of several models atomically.
    pub fn commit_models(&self, models: &[BodyModel]) -> EditorResult<Vec<SaveOutcome>> {
        let mut plans = Vec::with_capacity(models.len());
        for model in models {
            self.require_record(model.value())?;
            let existing = self.sentences.load_links(model.value())?;
            plans.push(reconcile_associations(
                model.value(),
                model.sentences(),
                &existing,
            ));
        }
        let outcomes = self.sentences.apply_plans(&plans)?;
        info!(
            "event=models_commit module=service status=ok models={}",
            outcomes.len()
        );
        Ok(outcomes)
    }

    /// Model with the same name and the opposite gender, if stored.
    pub fn counterpart(&self, value: i64) -> EditorResult<Option<ModelRecord>> {
        let value = ModelValue::new(value)?;
        let record = self.require_record(value)?;
        let wanted = record.gender().opposite();
        Ok(self
            .models
            .find_by_name(&record.name)?
            .into_iter()
            .find(|candidate| candidate.gender() == wanted))
    }

    pub fn legacy_info(&self, value: i64) -> EditorResult<Option<String>> {
        let value = ModelValue::new(value)?;
        Ok(self.models.legacy_info(value)?)
    }

    /// Appends the sentences of `source` that `paragraph` does not contain.
    pub fn append_from_model(&self, paragraph: &str, source: i64) -> EditorResult<String> {
        let source = self.load_model(source)?;
        Ok(append_sentences_to_paragraph(paragraph, source.sentences()))
    }

    /// Appends the legacy info block of `value`, if any.
    pub fn append_legacy_info(&self, paragraph: &str, value: i64) -> EditorResult<String> {
        Ok(match self.legacy_info(value)? {
            Some(text) => append_text_to_paragraph(paragraph, &text),
            None => paragraph.to_string(),
        })
    }

    pub fn progress_percentage(
        &self,
        system_id: Option<u8>,
        gender: Option<Gender>,
    ) -> EditorResult<u8> {
        Ok(self.models.progress(system_id, gender)?.percentage())
    }

    /// Smallest unused value in the partition of `classification`.
    pub fn allocate_value(&self, classification: Classification) -> EditorResult<ModelValue> {
        let occupied = self.models.list_values_in_partition(classification)?;
        Ok(allocate_first_fit(classification, &occupied)?)
    }

    pub fn create_structure(&self, structure: NewStructure) -> EditorResult<ModelRecord> {
        if structure.name.trim().is_empty() {
            return Err(EditorError::IncompleteStructure("name"));
        }
        let name = normalize_name(&structure.name);
        if !has_well_formed_variant(&name) {
            return Err(EditorError::IncompleteStructure("name"));
        }

        let value = ModelValue::new(structure.value)?;
        let parent_value = structure.parent_value.filter(|parent| *parent != 0);
        if !value.is_parent() {
            let parent = parent_value.ok_or(EditorError::IncompleteStructure("parent_value"))?;
            let parent = ModelValue::new(parent)?;
            if self.models.get_model(parent)?.is_none() {
                return Err(EditorError::IncompleteStructure("parent_value"));
            }
        }

        let record = ModelRecord::new(value, name, parent_value);
        self.models.create_model(&record)?;
        Ok(record)
    }

    pub fn purge_orphan_sentences(&self) -> EditorResult<usize> {
        Ok(self.sentences.purge_orphan_sentences()?)
    }

    fn require_record(&self, value: ModelValue) -> EditorResult<ModelRecord> {
        self.models
            .get_model(value)?
            .ok_or(EditorError::ModelNotFound(value.get()))
    }
}
