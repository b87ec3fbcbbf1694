use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_child_urls")
        .depends_on(&["0001_initial"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE discovered_child_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_url TEXT NOT NULL,
    child_url TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    UNIQUE (parent_url, child_url)
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_child_urls_child ON discovered_child_urls(child_url)",
        ))
}
