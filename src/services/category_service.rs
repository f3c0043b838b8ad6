//! Category Service - Category tree maintenance

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::{
    BookFilter, Category, CategoryFilter, CreateCategoryInput, DomainError, EntityKind,
    RecordChange, UpdateCategoryInput,
};
use crate::infrastructure::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub book_count: usize,
}

async fn check_unique(
    state: &AppState,
    name: &str,
    code: &str,
    own_id: Option<i32>,
) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Category name is required"));
    }
    if code.trim().is_empty() {
        return Err(DomainError::validation("Category code is required"));
    }

    let by_name = state
        .category_repo
        .find_all(CategoryFilter {
            name: Some(name.to_string()),
            ..Default::default()
        })
        .await?;
    if by_name.iter().any(|c| Some(c.id) != own_id) {
        return Err(DomainError::validation(format!(
            "Category name '{}' already exists",
            name
        )));
    }

    let by_code = state
        .category_repo
        .find_all(CategoryFilter {
            code: Some(code.to_string()),
            ..Default::default()
        })
        .await?;
    if by_code.iter().any(|c| Some(c.id) != own_id) {
        return Err(DomainError::validation(format!(
            "Category code '{}' already exists",
            code
        )));
    }
    Ok(())
}

/// Walk up from `parent_id`; the chain must end without meeting `own_id`.
async fn check_parent(
    state: &AppState,
    parent_id: Option<i32>,
    own_id: Option<i32>,
) -> Result<(), DomainError> {
    let mut visited = HashSet::new();
    let mut current = parent_id;

    while let Some(id) = current {
        if Some(id) == own_id || !visited.insert(id) {
            return Err(DomainError::validation("A category cannot be its own ancestor"));
        }
        let parent = state.category_repo.find_by_id(id).await?.ok_or_else(|| {
            DomainError::validation(format!("Parent category {} does not exist", id))
        })?;
        current = parent.parent_id;
    }
    Ok(())
}

pub async fn create_category(
    state: &AppState,
    input: CreateCategoryInput,
) -> Result<Category, DomainError> {
    check_unique(state, &input.name, &input.code, None).await?;
    check_parent(state, input.parent_id, None).await?;

    let category = state.category_repo.create(input).await?;
    tracing::info!("Category {} created: {}", category.id, category.name);

    state
        .notify(RecordChange::created(EntityKind::Category, category.id))
        .await;
    Ok(category)
}

pub async fn update_category(
    state: &AppState,
    id: i32,
    input: UpdateCategoryInput,
) -> Result<Category, DomainError> {
    let mut category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let mut fields = Vec::new();

    if let Some(name) = input.name {
        category.name = name;
        fields.push("name");
    }
    if let Some(code) = input.code {
        category.code = code;
        fields.push("code");
    }
    if let Some(parent_id) = input.parent_id {
        category.parent_id = parent_id;
        fields.push("parent_id");
    }

    check_unique(state, &category.name, &category.code, Some(id)).await?;
    check_parent(state, category.parent_id, Some(id)).await?;

    let category = state.category_repo.update(category).await?;
    state
        .notify(RecordChange::updated(EntityKind::Category, category.id, &fields))
        .await;
    Ok(category)
}

pub async fn get_category(state: &AppState, id: i32) -> Result<CategoryView, DomainError> {
    let category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let books = state
        .book_repo
        .find_all(BookFilter {
            category_id: Some(id),
            ..Default::default()
        })
        .await?;

    Ok(CategoryView {
        category,
        book_count: books.len(),
    })
}

/// List categories with their book counts, ordered by name
pub async fn list_categories(
    state: &AppState,
    filter: CategoryFilter,
) -> Result<Vec<CategoryView>, DomainError> {
    let categories = state.category_repo.find_all(filter).await?;

    let mut counts: HashMap<i32, usize> = HashMap::new();
    for book in state.book_repo.find_all(BookFilter::default()).await? {
        for category_id in book.category_ids {
            *counts.entry(category_id).or_insert(0) += 1;
        }
    }

    Ok(categories
        .into_iter()
        .map(|category| CategoryView {
            book_count: counts.get(&category.id).copied().unwrap_or(0),
            category,
        })
        .collect())
}

/// Delete a category. Its children become roots and its books lose the link.
pub async fn delete_category(state: &AppState, id: i32) -> Result<(), DomainError> {
    state.category_repo.delete(id).await?;
    tracing::info!("Category {} deleted", id);

    state
        .notify(RecordChange::deleted(EntityKind::Category, id))
        .await;
    Ok(())
}
