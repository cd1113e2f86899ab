//! `Settings` boundary behaviour against a live database (spec.md §8).

use sqlx::PgPool;

use dashboard_core::db::Store;
use dashboard_core::settings::Settings;

#[sqlx::test]
async fn backup_retention_days_clamps_to_one_and_365(pool: PgPool) {
    let store = Store::new(pool);
    let settings = Settings::new(&store);

    assert_eq!(settings.backup_retention_days().await.unwrap(), 7, "default with no row set");

    settings.set("backup_retention_days", "0").await.unwrap();
    assert_eq!(settings.backup_retention_days().await.unwrap(), 1);

    settings.set("backup_retention_days", "-5").await.unwrap();
    assert_eq!(settings.backup_retention_days().await.unwrap(), 1);

    settings.set("backup_retention_days", "400").await.unwrap();
    assert_eq!(settings.backup_retention_days().await.unwrap(), 365);

    settings.set("backup_retention_days", "not-a-number").await.unwrap();
    assert_eq!(settings.backup_retention_days().await.unwrap(), 7);

    settings.set("backup_retention_days", "30").await.unwrap();
    assert_eq!(settings.backup_retention_days().await.unwrap(), 30);
}

#[sqlx::test]
async fn auto_rename_after_transcode_defaults_off(pool: PgPool) {
    let store = Store::new(pool);
    let settings = Settings::new(&store);

    assert!(!settings.auto_rename_after_transcode().await.unwrap());

    settings.set("auto_rename_after_transcode", "true").await.unwrap();
    assert!(settings.auto_rename_after_transcode().await.unwrap());
}
