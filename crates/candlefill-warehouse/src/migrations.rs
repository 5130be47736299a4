use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_instruments",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS instruments_id_seq START 1;

CREATE TABLE IF NOT EXISTS instruments (
    id BIGINT PRIMARY KEY DEFAULT nextval('instruments_id_seq'),
    external_id TEXT NOT NULL UNIQUE,
    ticker TEXT NOT NULL,
    isin TEXT NOT NULL,
    name TEXT NOT NULL,
    min_price_increment DECIMAL(38, 18) NOT NULL,
    lot BIGINT NOT NULL,
    currency TEXT NOT NULL,
    instrument_type TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_bars_1d",
        sql: r#"
CREATE TABLE IF NOT EXISTS bars_1d (
    instrument_id BIGINT NOT NULL,
    ts DATE NOT NULL,
    open DECIMAL(38, 18) NOT NULL,
    close DECIMAL(38, 18) NOT NULL,
    high DECIMAL(38, 18) NOT NULL,
    low DECIMAL(38, 18) NOT NULL,
    volume BIGINT NOT NULL CHECK (volume >= 0),
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(instrument_id, ts)
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_instruments_ticker ON instruments(ticker);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
