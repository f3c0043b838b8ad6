//! SeaORM implementation of LoanRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::domain::{DomainError, Loan, LoanFilter, LoanRepository, LoanState, LossType, NewLoan};
use crate::models::loan::{ActiveModel, Column, Entity as LoanEntity, Model};

/// SeaORM-based implementation of LoanRepository
pub struct SeaOrmLoanRepository {
    db: DatabaseConnection,
}

impl SeaOrmLoanRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_loan(model: Model) -> Result<Loan, DomainError> {
    Ok(Loan {
        id: model.id,
        book_id: model.book_id,
        borrower_id: model.borrower_id,
        loan_date: model.loan_date,
        expected_return_date: model.expected_return_date,
        return_date: model.return_date,
        quantity: model.quantity,
        state: model.state.parse::<LoanState>()?,
        loss_type: model.loss_type.as_deref().map(str::parse::<LossType>).transpose()?,
        loss_description: model.loss_description,
        notes: model.notes,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

async fn insert_loan<C: ConnectionTrait>(conn: &C, loan: NewLoan) -> Result<Model, DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let new_loan = ActiveModel {
        book_id: Set(loan.book_id),
        borrower_id: Set(loan.borrower_id),
        loan_date: Set(loan.loan_date),
        expected_return_date: Set(loan.expected_return_date),
        return_date: Set(None),
        quantity: Set(loan.quantity),
        state: Set(LoanState::Ongoing.as_str().to_owned()),
        loss_type: Set(None),
        loss_description: Set(None),
        notes: Set(loan.notes),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    new_loan.insert(conn).await
}

async fn write_loan<C: ConnectionTrait>(conn: &C, loan: Loan) -> Result<Model, DomainError> {
    let existing = LoanEntity::find_by_id(loan.id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.book_id = Set(loan.book_id);
    active.borrower_id = Set(loan.borrower_id);
    active.loan_date = Set(loan.loan_date);
    active.expected_return_date = Set(loan.expected_return_date);
    active.return_date = Set(loan.return_date);
    active.quantity = Set(loan.quantity);
    active.state = Set(loan.state.as_str().to_owned());
    active.loss_type = Set(loan.loss_type.map(|t| t.as_str().to_owned()));
    active.loss_description = Set(loan.loss_description);
    active.notes = Set(loan.notes);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(conn).await?)
}

#[async_trait]
impl LoanRepository for SeaOrmLoanRepository {
    async fn find_all(&self, filter: LoanFilter) -> Result<Vec<Loan>, DomainError> {
        let mut query = LoanEntity::find();

        if let Some(book_id) = filter.book_id {
            query = query.filter(Column::BookId.eq(book_id));
        }
        if let Some(borrower_id) = filter.borrower_id {
            query = query.filter(Column::BorrowerId.eq(borrower_id));
        }
        if let Some(state) = filter.state {
            query = query.filter(Column::State.eq(state.as_str()));
        }

        let loans = query
            .order_by_desc(Column::LoanDate)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        loans.into_iter().map(to_loan).collect()
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Loan>, DomainError> {
        LoanEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(to_loan)
            .transpose()
    }

    async fn create(&self, loan: NewLoan) -> Result<Loan, DomainError> {
        let model = insert_loan(&self.db, loan).await?;
        to_loan(model)
    }

    async fn create_many(&self, loans: Vec<NewLoan>) -> Result<Vec<Loan>, DomainError> {
        let txn = self.db.begin().await?;

        let mut models = Vec::with_capacity(loans.len());
        for loan in loans {
            models.push(insert_loan(&txn, loan).await?);
        }

        txn.commit().await?;
        models.into_iter().map(to_loan).collect()
    }

    async fn update(&self, loan: Loan) -> Result<Loan, DomainError> {
        let model = write_loan(&self.db, loan).await?;
        to_loan(model)
    }

    async fn update_many(&self, loans: Vec<Loan>) -> Result<Vec<Loan>, DomainError> {
        let txn = self.db.begin().await?;

        let mut models = Vec::with_capacity(loans.len());
        for loan in loans {
            models.push(write_loan(&txn, loan).await?);
        }

        txn.commit().await?;
        models.into_iter().map(to_loan).collect()
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = LoanEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }
}
