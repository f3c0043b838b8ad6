pub mod book;
pub mod book_categories;
pub mod category;
pub mod contact;
pub mod loan;
pub mod operation_log;
pub mod stage;
