//! SeaORM implementation of ContactRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{Contact, ContactFilter, ContactRepository, CreateContactInput, DomainError};
use crate::models::contact::{ActiveModel, Column, Entity as ContactEntity, Model};

/// SeaORM-based implementation of ContactRepository
pub struct SeaOrmContactRepository {
    db: DatabaseConnection,
}

impl SeaOrmContactRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<Model> for Contact {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            is_company: model.is_company,
            is_author: model.is_author,
            birth_date: model.birth_date,
            death_date: model.death_date,
            birth_place: model.birth_place,
            biography: model.biography,
            awards: model.awards,
            website: model.website,
            email: model.email,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl ContactRepository for SeaOrmContactRepository {
    async fn find_all(&self, filter: ContactFilter) -> Result<Vec<Contact>, DomainError> {
        let mut query = ContactEntity::find();

        if let Some(is_author) = filter.is_author {
            query = query.filter(Column::IsAuthor.eq(is_author));
        }
        if let Some(is_company) = filter.is_company {
            query = query.filter(Column::IsCompany.eq(is_company));
        }
        if let Some(name) = &filter.name
            && !name.is_empty()
        {
            query = query.filter(Column::Name.contains(name));
        }

        let contacts = query.order_by_asc(Column::Name).all(&self.db).await?;
        Ok(contacts.into_iter().map(Contact::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Contact>, DomainError> {
        let contact = ContactEntity::find_by_id(id).one(&self.db).await?;
        Ok(contact.map(Contact::from))
    }

    async fn create(&self, input: CreateContactInput) -> Result<Contact, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();

        let new_contact = ActiveModel {
            name: Set(input.name),
            is_company: Set(input.is_company),
            is_author: Set(input.is_author),
            birth_date: Set(input.birth_date),
            death_date: Set(input.death_date),
            birth_place: Set(input.birth_place),
            biography: Set(input.biography),
            awards: Set(input.awards),
            website: Set(input.website),
            email: Set(input.email),
            phone: Set(input.phone),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let saved = new_contact.insert(&self.db).await?;
        Ok(Contact::from(saved))
    }

    async fn update(&self, contact: Contact) -> Result<Contact, DomainError> {
        let existing = ContactEntity::find_by_id(contact.id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(contact.name);
        active.is_company = Set(contact.is_company);
        active.is_author = Set(contact.is_author);
        active.birth_date = Set(contact.birth_date);
        active.death_date = Set(contact.death_date);
        active.birth_place = Set(contact.birth_place);
        active.biography = Set(contact.biography);
        active.awards = Set(contact.awards);
        active.website = Set(contact.website);
        active.email = Set(contact.email);
        active.phone = Set(contact.phone);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active.update(&self.db).await?;
        Ok(Contact::from(model))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = ContactEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }
}
