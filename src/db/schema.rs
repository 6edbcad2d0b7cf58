use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- License keys: one row per purchasable activation slot.
        -- The CHECK ties the status enum to the machine binding so a
        -- claimed row can never lose its machine_id (and vice versa).
        CREATE TABLE IF NOT EXISTS license_keys (
            id TEXT PRIMARY KEY,
            key_string TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'unused' CHECK (status IN ('unused', 'claimed')),
            email TEXT,
            name TEXT,
            machine_id TEXT,
            claimed_at INTEGER,
            notes TEXT,
            created_at INTEGER NOT NULL,
            CHECK ((status = 'claimed') = (machine_id IS NOT NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_license_keys_status ON license_keys(status);
        CREATE INDEX IF NOT EXISTS idx_license_keys_created ON license_keys(created_at);

        -- Activation log: append-only, one row per accepted activation.
        CREATE TABLE IF NOT EXISTS activations (
            id TEXT PRIMARY KEY,
            key_string TEXT NOT NULL,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            machine_id TEXT NOT NULL,
            activated_at INTEGER NOT NULL,
            source_address TEXT,
            client_agent TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_activations_time ON activations(activated_at);
        CREATE INDEX IF NOT EXISTS idx_activations_key ON activations(key_string);
        "#,
    )
}
