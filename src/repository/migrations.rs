//! Database schema for crosslist

/// Schema applied on every startup; all statements are idempotent.
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id          TEXT PRIMARY KEY,
    status      TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    record      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sales (
    sale_id      TEXT NOT NULL,
    platform     TEXT NOT NULL,
    listing_id   TEXT NOT NULL,
    sale_date    TEXT NOT NULL,
    gross_amount REAL NOT NULL,
    fees         REAL NOT NULL,
    record       TEXT NOT NULL,
    PRIMARY KEY (sale_id, platform)
);

CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(sale_date);
CREATE INDEX IF NOT EXISTS idx_sales_listing ON sales(listing_id);
"#;
