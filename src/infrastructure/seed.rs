use sea_orm::*;

use crate::models::stage;

/// Stages every fresh catalog starts with: (code, name, sequence, fold, is_default)
const DEFAULT_STAGES: [(&str, &str, i32, bool, bool); 4] = [
    ("draft", "Draft", 1, false, true),
    ("cataloguing", "Cataloguing", 2, false, false),
    ("shelved", "On Shelf", 3, false, false),
    ("withdrawn", "Withdrawn", 4, true, false),
];

/// Insert the default workflow stages, skipping codes that already exist.
///
/// A default flag is only seeded when no stage is default yet.
pub async fn seed_default_stages(db: &DatabaseConnection) -> Result<usize, DbErr> {
    let has_default = stage::Entity::find()
        .filter(stage::Column::IsDefault.eq(true))
        .one(db)
        .await?
        .is_some();

    let mut inserted = 0;
    for (code, name, sequence, fold, is_default) in DEFAULT_STAGES {
        let exists = stage::Entity::find()
            .filter(stage::Column::Code.eq(code))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let now = chrono::Utc::now().to_rfc3339();
        let model = stage::ActiveModel {
            name: Set(name.to_owned()),
            code: Set(code.to_owned()),
            description: Set(None),
            sequence: Set(sequence),
            fold: Set(fold),
            is_default: Set(is_default && !has_default),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        stage::Entity::insert(model).exec(db).await?;
        inserted += 1;
    }

    Ok(inserted)
}
