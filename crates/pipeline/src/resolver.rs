//! Mutation resolution: decides whether a normalized bundle creates a new
//! entity, updates an existing one, or leaves the store unchanged, and
//! performs the minimal write.
//!
//! Every bundle is written under its own savepoint. A per-record failure
//! (validation or store constraint) rolls back to that savepoint so the rest
//! of the open batch is unaffected. Changes to an existing entity are
//! planned before anything is written, so a refused update writes nothing.

use arkiv_core::bundle::Bundle;
use arkiv_core::entity::{EntityRef, Node};
use arkiv_core::error::{CoreError, ValidationError};
use arkiv_core::idgen;
use arkiv_core::mutation::Mutation;
use arkiv_core::scope::Scope;
use arkiv_core::types::{keys, labels};
use arkiv_core::validation;
use arkiv_db::{GraphTx, StoreError};

use crate::error::PipelineError;

const SAVEPOINT: &str = "arkiv_bundle";

/// How existing entities are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Refuse with [`PipelineError::ModeViolation`] instead of updating.
    pub allow_updates: bool,
    /// A stored description in the same language but from another source
    /// file is kept, and the incoming one gets its own id.
    pub use_source_id: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            allow_updates: true,
            use_source_id: false,
        }
    }
}

/// Assign ids to a bundle and its descriptions for placement in `scope`.
pub fn assign_ids(mut bundle: Bundle, scope: &Scope) -> Result<Bundle, CoreError> {
    let id = idgen::generate_id(bundle.entity_type, &scope.id_path, &bundle)?;
    for children in bundle.relations.values_mut() {
        for child in children.iter_mut() {
            child.id = Some(idgen::generate_description_id(&id, child)?);
        }
    }
    bundle.id = Some(id.clone());

    let mut seen = std::collections::HashSet::new();
    for (_, child) in bundle.dependents() {
        if let Some(child_id) = &child.id {
            if !seen.insert(child_id.clone()) {
                return Err(ValidationError::single(
                    bundle.entity_type,
                    Some(id),
                    labels::HAS_DESCRIPTION,
                    format!("more than one description with id '{child_id}'"),
                )
                .into());
            }
        }
    }
    Ok(bundle)
}

/// Resolve one normalized bundle against the store with default options.
pub async fn resolve(
    tx: &mut dyn GraphTx,
    bundle: Bundle,
    scope: &Scope,
) -> Result<Mutation, PipelineError> {
    resolve_with(tx, bundle, scope, ResolveOptions::default()).await
}

pub async fn resolve_with(
    tx: &mut dyn GraphTx,
    bundle: Bundle,
    scope: &Scope,
    options: ResolveOptions,
) -> Result<Mutation, PipelineError> {
    let bundle = assign_ids(bundle, scope)?;
    validation::validate(&bundle, scope).map_err(CoreError::from)?;

    tx.savepoint(SAVEPOINT).await?;
    match write(tx, &bundle, scope, options).await {
        Ok(mutation) => {
            tx.release_savepoint(SAVEPOINT).await?;
            Ok(mutation)
        }
        Err(err) if !err.is_fatal() => {
            tx.rollback_to_savepoint(SAVEPOINT).await?;
            tx.release_savepoint(SAVEPOINT).await?;
            Err(constraint_as_validation(err, &bundle))
        }
        Err(err) => Err(err),
    }
}

/// Store constraint violations are reported like any other rejected bundle.
fn constraint_as_validation(err: PipelineError, bundle: &Bundle) -> PipelineError {
    match err {
        PipelineError::Store(StoreError::Constraint(message)) => CoreError::from(ValidationError::single(
            bundle.entity_type,
            bundle.id.clone(),
            "_",
            message,
        ))
        .into(),
        other => other,
    }
}

fn node_of(bundle: &Bundle) -> Result<Node, PipelineError> {
    bundle.to_node().ok_or_else(|| {
        CoreError::Internal(format!("{} bundle reached the store without an id", bundle.entity_type))
            .into()
    })
}

async fn write(
    tx: &mut dyn GraphTx,
    bundle: &Bundle,
    scope: &Scope,
    options: ResolveOptions,
) -> Result<Mutation, PipelineError> {
    let unit = node_of(bundle)?;
    let entity = EntityRef::from(&unit);

    let Some(existing) = tx.get_node(&unit.id).await? else {
        create(tx, bundle, &unit, scope).await?;
        tracing::debug!(id = %unit.id, entity_type = %unit.entity_type, "Created entity");
        return Ok(Mutation::created(entity));
    };

    if existing.entity_type != unit.entity_type {
        return Err(CoreError::from(ValidationError::single(
            unit.entity_type,
            Some(unit.id.clone()),
            "_",
            format!("id is already taken by a {}", existing.entity_type),
        ))
        .into());
    }

    let stored_descriptions = tx.targets(&unit.id, labels::HAS_DESCRIPTION).await?;
    let separated;
    let bundle = if options.use_source_id {
        separated = separate_sources(bundle, &stored_descriptions);
        &separated
    } else {
        bundle
    };

    let diff = bundle.diff_against(&existing.properties);
    let mut new_descriptions = Vec::new();
    let mut changed_descriptions = Vec::new();
    for (label, child) in bundle.dependents() {
        let node = node_of(child)?;
        match stored_descriptions.iter().find(|d| d.id == node.id) {
            None => new_descriptions.push((label, node)),
            Some(stored) => {
                let diff = child.diff_against(&stored.properties);
                if !diff.is_empty() {
                    changed_descriptions.push((node.id, diff));
                }
            }
        }
    }

    if diff.is_empty() && new_descriptions.is_empty() && changed_descriptions.is_empty() {
        return Ok(Mutation::unchanged(entity));
    }
    if !options.allow_updates {
        return Err(PipelineError::ModeViolation { id: unit.id });
    }

    let prior = stored_bundle(&existing, &stored_descriptions);
    if !diff.is_empty() {
        tracing::debug!(id = %unit.id, fields = ?diff.changed_keys(), "Updating entity");
        tx.update_properties(&unit.id, &diff.set, &diff.removed).await?;
    }
    for (label, node) in &new_descriptions {
        tx.create_node(node).await?;
        tx.add_edge(&unit.id, label, &node.id).await?;
    }
    for (id, diff) in &changed_descriptions {
        tracing::debug!(id = %id, fields = ?diff.changed_keys(), "Updating description");
        tx.update_properties(id, &diff.set, &diff.removed).await?;
    }
    Ok(Mutation::updated(entity, prior))
}

/// Give incoming descriptions whose id is held by a stored description from
/// another source file an id of their own.
fn separate_sources(bundle: &Bundle, stored: &[Node]) -> Bundle {
    let mut bundle = bundle.clone();
    for children in bundle.relations.values_mut() {
        for child in children.iter_mut() {
            let replacement = match (child.id.as_deref(), child.str_value(keys::SOURCE_FILE_ID)) {
                (Some(id), Some(source))
                    if stored
                        .iter()
                        .any(|d| d.id == id && d.str_property(keys::SOURCE_FILE_ID) != Some(source)) =>
                {
                    Some(idgen::source_description_id(id, source))
                }
                _ => None,
            };
            if let Some(id) = replacement {
                child.id = Some(id);
            }
        }
    }
    bundle
}

async fn create(
    tx: &mut dyn GraphTx,
    bundle: &Bundle,
    unit: &Node,
    scope: &Scope,
) -> Result<(), PipelineError> {
    tx.create_node(unit).await?;
    if let Some(scope_id) = scope.id() {
        tx.add_edge(&unit.id, labels::HAS_PERMISSION_SCOPE, scope_id).await?;
    }
    for (label, child) in bundle.dependents() {
        let node = node_of(child)?;
        tx.create_node(&node).await?;
        tx.add_edge(&unit.id, label, &node.id).await?;
    }
    Ok(())
}

/// The stored state of an entity as a bundle, for the UPDATE record.
fn stored_bundle(node: &Node, descriptions: &[Node]) -> Bundle {
    descriptions.iter().fold(
        Bundle::new(node.entity_type)
            .with_id(node.id.clone())
            .with_data(node.properties.clone()),
        |bundle, d| {
            bundle.with_relation(
                labels::HAS_DESCRIPTION,
                Bundle::new(d.entity_type)
                    .with_id(d.id.clone())
                    .with_data(d.properties.clone()),
            )
        },
    )
}
