//! Repository implementations using SeaORM

pub mod book_repository;
pub mod category_repository;
pub mod contact_repository;
pub mod loan_repository;
pub mod stage_repository;

pub use book_repository::SeaOrmBookRepository;
pub use category_repository::SeaOrmCategoryRepository;
pub use contact_repository::SeaOrmContactRepository;
pub use loan_repository::SeaOrmLoanRepository;
pub use stage_repository::SeaOrmStageRepository;
