use crate::service::salary_import::ImportedSheet;
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;
use uuid::Uuid;

/// Parsed salary sheets waiting to be committed, keyed by storage id.
static IMPORT_STORAGE: Lazy<Cache<Uuid, ImportedSheet>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

/// Keeps a parsed sheet and returns the id to fetch or commit it with.
pub async fn store(sheet: ImportedSheet) -> Uuid {
    let id = Uuid::new_v4();
    IMPORT_STORAGE.insert(id, sheet).await;
    id
}

pub async fn get(id: &Uuid) -> Option<ImportedSheet> {
    IMPORT_STORAGE.get(id).await
}

/// Removes the sheet; a second commit of the same id finds nothing.
pub async fn take(id: &Uuid) -> Option<ImportedSheet> {
    IMPORT_STORAGE.remove(id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(month: u32) -> ImportedSheet {
        ImportedSheet {
            name: "employeeSalaries".to_string(),
            year: 2026,
            month,
            elements: Vec::new(),
        }
    }

    #[actix_web::test]
    async fn stored_sheet_can_be_read_until_taken() {
        let id = store(sheet(4)).await;

        assert_eq!(get(&id).await.map(|s| s.month), Some(4));
        assert_eq!(take(&id).await.map(|s| s.month), Some(4));
        assert!(get(&id).await.is_none());
        assert!(take(&id).await.is_none());
    }

    #[actix_web::test]
    async fn unknown_id_is_empty() {
        assert!(get(&Uuid::new_v4()).await.is_none());
    }
}
