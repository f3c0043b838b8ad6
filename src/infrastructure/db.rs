use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Contacts carry both the author and the borrower role
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_company INTEGER NOT NULL DEFAULT 0,
            is_author INTEGER NOT NULL DEFAULT 0,
            birth_date TEXT,
            death_date TEXT,
            birth_place TEXT,
            biography TEXT,
            awards TEXT,
            website TEXT,
            email TEXT,
            phone TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (death_date IS NULL OR birth_date IS NULL OR death_date >= birth_date)
        )
        "#,
    )
    .await?;
    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_contacts_is_author ON contacts(is_author)",
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            description TEXT,
            sequence INTEGER NOT NULL DEFAULT 1,
            fold INTEGER NOT NULL DEFAULT 0,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Only one default stage at a time
    execute(
        db,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_stages_single_default ON stages(is_default) WHERE is_default = 1",
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            parent_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            isbn TEXT UNIQUE,
            pages INTEGER,
            description TEXT,
            total_copies INTEGER NOT NULL DEFAULT 1,
            author_id INTEGER,
            stage_id INTEGER,
            date_published TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            color INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (author_id) REFERENCES contacts(id) ON DELETE SET NULL,
            FOREIGN KEY (stage_id) REFERENCES stages(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;
    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_books_author_id ON books(author_id)",
    )
    .await?;
    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_books_stage_id ON books(stage_id)",
    )
    .await?;

    // Create book_categories junction table
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS book_categories (
            book_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (book_id, category_id),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            borrower_id INTEGER NOT NULL,
            loan_date TEXT NOT NULL,
            expected_return_date TEXT,
            return_date TEXT,
            quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0),
            state TEXT NOT NULL DEFAULT 'ongoing',
            loss_type TEXT,
            loss_description TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
            FOREIGN KEY (borrower_id) REFERENCES contacts(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;
    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_loans_book_id ON loans(book_id)",
    )
    .await?;
    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_loans_borrower_id ON loans(borrower_id)",
    )
    .await?;
    execute(db, "CREATE INDEX IF NOT EXISTS idx_loans_state ON loans(state)").await?;

    // Create operation_log table
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS operation_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            operation TEXT NOT NULL, -- 'create', 'update', 'delete'
            payload TEXT, -- JSON array of written field names
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    Ok(())
}
