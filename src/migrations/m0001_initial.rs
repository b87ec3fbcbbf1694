use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE work_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    content_category TEXT NOT NULL,
    external_id TEXT NOT NULL,
    latest_timestamp TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT,
    created_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_work_items_status ON work_items(status, content_category)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE extracted_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    external_id TEXT,
    content_category TEXT,
    price REAL,
    beds INTEGER,
    baths REAL,
    sqft REAL,
    price_per_sqft REAL,
    listing_status TEXT,
    listing_type TEXT,
    agent TEXT,
    brokerage TEXT,
    building_name TEXT,
    address TEXT,
    neighborhood TEXT,
    borough TEXT,
    city TEXT,
    state TEXT,
    zipcode TEXT,
    latitude REAL,
    longitude REAL,
    year_built INTEGER,
    building_type TEXT,
    amenities TEXT,
    raw_payload TEXT,
    snapshot_timestamp TEXT,
    snapshot_url TEXT,
    extracted_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE price_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    external_id TEXT,
    event_date TEXT,
    event_type TEXT NOT NULL,
    price REAL,
    price_delta REAL,
    broker TEXT,
    description TEXT,
    source TEXT NOT NULL,
    raw_json TEXT,
    extracted_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_price_events_url ON price_events(url)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_price_events_date ON price_events(event_date)",
        ))
}
