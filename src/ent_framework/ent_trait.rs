// Entity Trait - identity, persistence and queries shared by every entity
// Implementors only supply identity and state accessors; everything else is provided

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::{Document, DocumentId, ID_FIELD};
use crate::ent_framework::context::EntContext;
use crate::ent_framework::ent_hooks::{HookContext, HookOperation, HookTiming};
use crate::ent_framework::ent_schema::{
    apply_defaults, apply_update_defaults, validate_changes, validate_document, EntSchema,
};
use crate::ent_framework::population::{populate_document, PopulateSpec};
use crate::entities::EntityType;
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::infrastructure::database::{DeleteResult, ReturnDocument, UpdateOptions, UpdateResult};
use crate::infrastructure::query::{Filter, Update};

/// Entity trait that all entities implement
#[async_trait]
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity type, which also names the collection
    const ENTITY_TYPE: EntityType;

    type Schema: EntSchema;

    fn id(&self) -> DocumentId;

    /// Whether the entity has never been persisted
    fn is_new(&self) -> bool;

    fn set_new(&mut self, is_new: bool);

    /// Called once a save has been written. Entities drop state that only
    /// lived until the next persist here.
    fn after_save(&mut self) {}

    fn collection() -> &'static str {
        Self::ENTITY_TYPE.collection()
    }

    // --- Construction and conversion ---

    /// Build an unsaved entity from loosely typed fields.
    ///
    /// Reference fields accept either an id string or a whole entity
    /// document. A fresh id is assigned unless one is given.
    fn construct(fields: Value) -> AppResult<Self> {
        let mut doc = match fields {
            Value::Object(doc) => doc,
            other => {
                return Err(AppError::BadRequest(format!(
                    "cannot construct {} from {}",
                    Self::ENTITY_TYPE,
                    other
                )))
            }
        };
        doc.entry(ID_FIELD.to_string())
            .or_insert_with(|| DocumentId::new().into());
        apply_defaults(&Self::Schema::fields(), &mut doc);

        let mut entity: Self = match serde_json::from_value(Value::Object(doc.clone())) {
            Ok(entity) => entity,
            Err(e) => {
                let errors = validate_document(&Self::Schema::fields(), &doc);
                return Err(if errors.is_empty() {
                    AppError::from(e)
                } else {
                    AppError::Validation(errors)
                });
            }
        };
        entity.set_new(true);
        Ok(entity)
    }

    fn to_document(&self) -> AppResult<Document> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            other => Err(AppError::Serialization(format!(
                "{} serialized to a non-object: {}",
                Self::ENTITY_TYPE,
                other
            ))),
        }
    }

    /// Rebuild a persisted entity from a stored (possibly populated) document
    fn from_document(doc: Document) -> AppResult<Self> {
        let mut entity: Self = serde_json::from_value(Value::Object(doc))?;
        entity.set_new(false);
        Ok(entity)
    }

    fn validate(&self) -> AppResult<()> {
        validate_document(&Self::Schema::fields(), &self.to_document()?)
            .into_result()
            .map_err(AppError::Validation)
    }

    /// Run validation without touching storage; `Ok(None)` when valid.
    /// Failing to serialize the entity is an error, never a pass.
    fn validate_sync(&self) -> AppResult<Option<ValidationErrors>> {
        match self.validate() {
            Ok(()) => Ok(None),
            Err(AppError::Validation(errors)) => Ok(Some(errors)),
            Err(e) => Err(e),
        }
    }

    // --- Instance operations ---

    /// Validate, then insert (new) or replace (persisted) the whole document
    async fn save(&mut self, ctx: &EntContext) -> AppResult<()> {
        self.validate()?;

        let mut hook_ctx = HookContext::new(
            Self::ENTITY_TYPE,
            self.id(),
            HookOperation::Save,
            self.to_document()?,
        );
        ctx.hooks()
            .execute_hooks(HookOperation::Save, HookTiming::Before, ctx.db(), &mut hook_ctx)
            .await?;

        let doc = hook_ctx.document.clone();
        if self.is_new() {
            ctx.db().insert_document(Self::collection(), doc).await?;
        } else if !ctx
            .db()
            .replace_document(Self::collection(), self.id(), doc)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "{} {} no longer exists",
                Self::ENTITY_TYPE,
                self.id()
            )));
        }

        self.set_new(false);
        self.after_save();
        debug!("Saved {} {}", Self::ENTITY_TYPE, self.id());

        ctx.hooks()
            .execute_hooks(HookOperation::Save, HookTiming::After, ctx.db(), &mut hook_ctx)
            .await
    }

    /// Remove this instance. Before-remove hooks (cascades) complete first;
    /// if one fails the instance itself is left in place.
    async fn remove(&self, ctx: &EntContext) -> AppResult<DeleteResult> {
        let mut hook_ctx = HookContext::new(
            Self::ENTITY_TYPE,
            self.id(),
            HookOperation::Remove,
            self.to_document()?,
        );
        ctx.hooks()
            .execute_hooks(HookOperation::Remove, HookTiming::Before, ctx.db(), &mut hook_ctx)
            .await?;

        let result = ctx
            .db()
            .delete_documents(Self::collection(), &Filter::id(self.id()), true)
            .await?;
        debug!("Removed {} {}", Self::ENTITY_TYPE, self.id());

        ctx.hooks()
            .execute_hooks(HookOperation::Remove, HookTiming::After, ctx.db(), &mut hook_ctx)
            .await?;
        Ok(result)
    }

    /// Apply `update` to the stored document and refresh `self` from the result
    async fn update_with(&mut self, ctx: &EntContext, mut update: Update) -> AppResult<()> {
        apply_update_defaults(&Self::Schema::fields(), &mut update);
        let mut preview = self.to_document()?;
        update.apply(&mut preview)?;
        validate_document(&Self::Schema::fields(), &preview).into_result()?;

        let stored = ctx
            .db()
            .find_one_and_update(
                Self::collection(),
                &Filter::id(self.id()),
                &update,
                ReturnDocument::After,
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("{} {} not found", Self::ENTITY_TYPE, self.id()))
            })?;
        *self = Self::from_document(stored)?;
        Ok(())
    }

    /// A copy of this entity with the given references resolved
    async fn populate(&self, ctx: &EntContext, specs: &[PopulateSpec]) -> AppResult<Self> {
        let doc = populate_document(ctx, Self::ENTITY_TYPE, self.to_document()?, specs).await?;
        let mut populated = Self::from_document(doc)?;
        populated.set_new(self.is_new());
        Ok(populated)
    }

    // --- Queries ---

    async fn find(ctx: &EntContext, filter: Filter) -> AppResult<Vec<Self>> {
        ctx.db()
            .find_documents(Self::collection(), &filter, None)
            .await?
            .into_iter()
            .map(Self::from_document)
            .collect()
    }

    async fn find_one(ctx: &EntContext, filter: Filter) -> AppResult<Option<Self>> {
        ctx.db()
            .find_one_document(Self::collection(), &filter)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    async fn find_by_id(ctx: &EntContext, id: DocumentId) -> AppResult<Option<Self>> {
        Self::find_one(ctx, Filter::id(id)).await
    }

    async fn count(ctx: &EntContext, filter: Filter) -> AppResult<u64> {
        ctx.db().count_documents(Self::collection(), &filter).await
    }

    async fn find_populated(
        ctx: &EntContext,
        filter: Filter,
        specs: &[PopulateSpec],
    ) -> AppResult<Vec<Self>> {
        let docs = ctx
            .db()
            .find_documents(Self::collection(), &filter, None)
            .await?;
        let mut entities = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = populate_document(ctx, Self::ENTITY_TYPE, doc, specs).await?;
            entities.push(Self::from_document(doc)?);
        }
        Ok(entities)
    }

    async fn find_one_populated(
        ctx: &EntContext,
        filter: Filter,
        specs: &[PopulateSpec],
    ) -> AppResult<Option<Self>> {
        match ctx
            .db()
            .find_one_document(Self::collection(), &filter)
            .await?
        {
            Some(doc) => {
                let doc = populate_document(ctx, Self::ENTITY_TYPE, doc, specs).await?;
                Ok(Some(Self::from_document(doc)?))
            }
            None => Ok(None),
        }
    }

    // --- Filter updates ---

    /// Stamp write-time defaults into `update`, then validate what it touches
    fn prepare_update(mut update: Update) -> AppResult<Update> {
        let fields = Self::Schema::fields();
        apply_update_defaults(&fields, &mut update);
        validate_changes(&fields, &update).into_result()?;
        Ok(update)
    }

    /// Update every matching document
    async fn update(ctx: &EntContext, filter: Filter, update: Update) -> AppResult<UpdateResult> {
        let update = Self::prepare_update(update)?;
        ctx.db()
            .update_documents(Self::collection(), &filter, &update, UpdateOptions::many())
            .await
    }

    /// Update the first matching document
    async fn update_one(
        ctx: &EntContext,
        filter: Filter,
        update: Update,
    ) -> AppResult<UpdateResult> {
        let update = Self::prepare_update(update)?;
        ctx.db()
            .update_documents(Self::collection(), &filter, &update, UpdateOptions::just_once())
            .await
    }

    async fn find_one_and_update(
        ctx: &EntContext,
        filter: Filter,
        update: Update,
        return_document: ReturnDocument,
    ) -> AppResult<Option<Self>> {
        let update = Self::prepare_update(update)?;
        ctx.db()
            .find_one_and_update(Self::collection(), &filter, &update, return_document)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    async fn find_by_id_and_update(
        ctx: &EntContext,
        id: DocumentId,
        update: Update,
        return_document: ReturnDocument,
    ) -> AppResult<Option<Self>> {
        Self::find_one_and_update(ctx, Filter::id(id), update, return_document).await
    }

    // --- Filter deletes (no hooks, hence no cascade) ---

    async fn remove_many(ctx: &EntContext, filter: Filter) -> AppResult<DeleteResult> {
        ctx.db()
            .delete_documents(Self::collection(), &filter, false)
            .await
    }

    async fn find_one_and_remove(ctx: &EntContext, filter: Filter) -> AppResult<Option<Self>> {
        ctx.db()
            .find_one_and_delete(Self::collection(), &filter)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    async fn find_by_id_and_remove(ctx: &EntContext, id: DocumentId) -> AppResult<Option<Self>> {
        Self::find_one_and_remove(ctx, Filter::id(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::CommentSchema;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    /// Entity whose map keys cannot become JSON object keys
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct GridNote {
        #[serde(rename = "_id")]
        id: DocumentId,
        cells: BTreeMap<(u8, u8), String>,
    }

    impl Entity for GridNote {
        const ENTITY_TYPE: EntityType = EntityType::Comment;
        type Schema = CommentSchema;

        fn id(&self) -> DocumentId {
            self.id
        }

        fn is_new(&self) -> bool {
            true
        }

        fn set_new(&mut self, _is_new: bool) {}
    }

    #[test]
    fn test_validate_sync_surfaces_serialization_failures() {
        let note = GridNote {
            id: DocumentId::new(),
            cells: BTreeMap::from([((0, 0), "x".to_string())]),
        };
        assert!(matches!(note.validate_sync(), Err(AppError::Serialization(_))));
    }

    #[test]
    fn test_construct_stamps_embedded_created_at() {
        use crate::entities::EntUser;

        let joe = EntUser::construct(serde_json::json!({
            "name": "Joe",
            "posts": [{"url": "https://x/"}],
        }))
        .unwrap();
        assert_eq!(joe.post_count(), 1);
        assert!(joe.validate_sync().unwrap().is_none());
    }
}
