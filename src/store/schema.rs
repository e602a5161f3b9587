//! SQLite schema.
//!
//! IPv4 addresses are INTEGER columns, IPv6 addresses 16-byte big-endian
//! BLOBs; both compare in numeric order.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS registrar (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL UNIQUE,
    serial      INTEGER NOT NULL DEFAULT 0,
    last_import INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS org (
    id           INTEGER PRIMARY KEY,
    registrar_id INTEGER NOT NULL REFERENCES registrar(id) ON DELETE CASCADE,
    serial       INTEGER NOT NULL,
    handle       TEXT    NOT NULL,
    name         TEXT    NOT NULL DEFAULT '',
    descr        TEXT    NOT NULL DEFAULT '',
    UNIQUE (registrar_id, handle)
);

CREATE TABLE IF NOT EXISTS netblock_v4 (
    id           INTEGER PRIMARY KEY,
    registrar_id INTEGER NOT NULL REFERENCES registrar(id) ON DELETE CASCADE,
    serial       INTEGER NOT NULL,
    org_id_str   TEXT,
    org_id       INTEGER REFERENCES org(id) ON DELETE SET NULL,
    start_ip     INTEGER NOT NULL,
    end_ip       INTEGER NOT NULL,
    prefix_len   INTEGER NOT NULL,
    netname      TEXT    NOT NULL DEFAULT '',
    descr        TEXT    NOT NULL DEFAULT '',
    UNIQUE (registrar_id, start_ip, end_ip)
);
CREATE INDEX IF NOT EXISTS idx_netblock_v4_start_end ON netblock_v4 (start_ip, end_ip);

CREATE TABLE IF NOT EXISTS netblock_v6 (
    id           INTEGER PRIMARY KEY,
    registrar_id INTEGER NOT NULL REFERENCES registrar(id) ON DELETE CASCADE,
    serial       INTEGER NOT NULL,
    org_id_str   TEXT,
    org_id       INTEGER REFERENCES org(id) ON DELETE SET NULL,
    start_ip     BLOB    NOT NULL,
    end_ip       BLOB    NOT NULL,
    prefix_len   INTEGER NOT NULL,
    netname      TEXT    NOT NULL DEFAULT '',
    descr        TEXT    NOT NULL DEFAULT '',
    UNIQUE (registrar_id, start_ip, end_ip)
);
CREATE INDEX IF NOT EXISTS idx_netblock_v6_start_end ON netblock_v6 (start_ip, end_ip);

CREATE TABLE IF NOT EXISTS list (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS netblock_v4_list (
    list_id     INTEGER NOT NULL REFERENCES list(id) ON DELETE CASCADE,
    netblock_id INTEGER NOT NULL REFERENCES netblock_v4(id) ON DELETE CASCADE,
    start_ip    INTEGER NOT NULL,
    end_ip      INTEGER NOT NULL,
    prefix_len  INTEGER NOT NULL,
    PRIMARY KEY (list_id, netblock_id)
);
CREATE INDEX IF NOT EXISTS idx_netblock_v4_list_order ON netblock_v4_list (list_id, start_ip, end_ip);

CREATE TABLE IF NOT EXISTS netblock_v6_list (
    list_id     INTEGER NOT NULL REFERENCES list(id) ON DELETE CASCADE,
    netblock_id INTEGER NOT NULL REFERENCES netblock_v6(id) ON DELETE CASCADE,
    start_ip    BLOB    NOT NULL,
    end_ip      BLOB    NOT NULL,
    prefix_len  INTEGER NOT NULL,
    PRIMARY KEY (list_id, netblock_id)
);
CREATE INDEX IF NOT EXISTS idx_netblock_v6_list_order ON netblock_v6_list (list_id, start_ip, end_ip);

CREATE TABLE IF NOT EXISTS netblock_v4_list_union (
    list_id    INTEGER NOT NULL REFERENCES list(id) ON DELETE CASCADE,
    address    INTEGER NOT NULL,
    prefix_len INTEGER NOT NULL,
    PRIMARY KEY (list_id, address)
);

CREATE TABLE IF NOT EXISTS netblock_v6_list_union (
    list_id    INTEGER NOT NULL REFERENCES list(id) ON DELETE CASCADE,
    address    BLOB    NOT NULL,
    prefix_len INTEGER NOT NULL,
    PRIMARY KEY (list_id, address)
);

CREATE TABLE IF NOT EXISTS netblock_v4_union (
    address    INTEGER PRIMARY KEY,
    prefix_len INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS netblock_v6_union (
    address    BLOB PRIMARY KEY,
    prefix_len INTEGER NOT NULL
);
";
