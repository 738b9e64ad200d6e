// Population - resolve stored reference ids into full documents, path by path

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::core::document::value_id;
use crate::core::{document_id, Document, DocumentId};
use crate::ent_framework::context::EntContext;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::infrastructure::query::Filter;

/// Which reference field to resolve, and what to resolve beneath it.
///
/// `model` overrides the target declared in the schema; nested specs apply
/// to the resolved documents, to any depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulateSpec {
    pub path: String,
    pub model: Option<EntityType>,
    pub populate: Vec<PopulateSpec>,
}

impl PopulateSpec {
    pub fn path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn model(mut self, model: EntityType) -> Self {
        self.model = Some(model);
        self
    }

    pub fn populate(mut self, child: PopulateSpec) -> Self {
        self.populate.push(child);
        self
    }
}

fn resolve_target(ctx: &EntContext, owner: EntityType, spec: &PopulateSpec) -> AppResult<EntityType> {
    if let Some(model) = spec.model {
        return Ok(model);
    }
    ctx.schemas()
        .field(owner, &spec.path)
        .and_then(|field| field.reference_target())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "cannot populate '{}' on {}: not a reference field and no model given",
                spec.path, owner
            ))
        })
}

fn collect_ids(value: &Value) -> Vec<DocumentId> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_id).collect(),
        other => value_id(other).into_iter().collect(),
    }
}

fn substitute(value: &Value, found: &HashMap<DocumentId, Document>) -> Value {
    let lookup = |item: &Value| match value_id(item).and_then(|id| found.get(&id)) {
        Some(doc) => Value::Object(doc.clone()),
        None => Value::Null,
    };
    match value {
        Value::Array(items) => Value::Array(items.iter().map(lookup).collect()),
        other => lookup(other),
    }
}

/// Replace the reference ids named by `specs` with the referenced documents.
///
/// One batched lookup per path; targets that no longer exist become null
/// and keep their position in arrays.
pub fn populate_document<'a>(
    ctx: &'a EntContext,
    owner: EntityType,
    mut doc: Document,
    specs: &'a [PopulateSpec],
) -> BoxFuture<'a, AppResult<Document>> {
    async move {
        for spec in specs {
            let target = resolve_target(ctx, owner, spec)?;
            let value = match doc.get(&spec.path) {
                Some(Value::Null) | None => continue,
                Some(value) => value.clone(),
            };

            let ids = collect_ids(&value);
            let fetched = if ids.is_empty() {
                Vec::new()
            } else {
                ctx.db()
                    .find_documents(target.collection(), &Filter::id_in(ids), None)
                    .await?
            };
            debug!(
                "Populating {}.{} with {} {} documents",
                owner,
                spec.path,
                fetched.len(),
                target
            );

            let resolved = try_join_all(
                fetched
                    .into_iter()
                    .map(|child| populate_document(ctx, target, child, &spec.populate)),
            )
            .await?;
            let found: HashMap<DocumentId, Document> = resolved
                .into_iter()
                .filter_map(|child| document_id(&child).map(|id| (id, child)))
                .collect();

            doc.insert(spec.path.clone(), substitute(&value, &found));
        }
        Ok(doc)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_keeps_positions_for_missing_targets() {
        let present = DocumentId::new();
        let missing = DocumentId::new();
        let mut found = HashMap::new();
        let doc = json!({"_id": present.to_string(), "content": "C"});
        found.insert(present, doc.as_object().cloned().unwrap());

        let list = json!([missing.to_string(), present.to_string()]);
        let replaced = substitute(&list, &found);
        assert_eq!(replaced[0], Value::Null);
        assert_eq!(replaced[1]["content"], json!("C"));

        assert_eq!(substitute(&json!(missing.to_string()), &found), Value::Null);
    }

    #[tokio::test]
    async fn test_non_reference_path_without_model_is_rejected() {
        let ctx = EntContext::connect("memory://population").await.unwrap();
        let doc = json!({"_id": DocumentId::new().to_string(), "name": "Joe"});
        let specs = [PopulateSpec::path("name")];
        let err = populate_document(&ctx, EntityType::User, doc.as_object().cloned().unwrap(), &specs)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
