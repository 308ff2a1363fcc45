use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use rusqlite::Connection;

/// Outcome of offering one row to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted,
    Rejected,
}

/// One crawl row as persisted.
#[derive(Debug, Clone)]
pub struct StoredTranslation {
    pub dictionary: String,
    pub word: String,
    pub translation: String,
    pub author_name: String,
    pub author_link: String,
}

/// Sink for crawl rows. `put` reports whether the row was novel; a duplicate
/// is `Rejected`, not an error. URLs of timed-out pages go to the quarantine
/// list for out-of-band retries.
pub trait TranslationStore {
    fn put(&mut self, row: &StoredTranslation) -> Result<PutOutcome>;
    fn quarantine(&mut self, url: &str, reason: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS translations (
            id          INTEGER PRIMARY KEY,
            dictionary  TEXT NOT NULL,
            word        TEXT NOT NULL,
            translation TEXT NOT NULL,
            author_name TEXT,
            author_link TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(dictionary, word)
        );
        CREATE INDEX IF NOT EXISTS idx_translations_dictionary ON translations(dictionary);

        CREATE TABLE IF NOT EXISTS quarantine (
            id          INTEGER PRIMARY KEY,
            url         TEXT NOT NULL,
            reason      TEXT,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── SQLite store ──

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = connect(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl TranslationStore for SqliteStore {
    fn put(&mut self, row: &StoredTranslation) -> Result<PutOutcome> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO translations
             (dictionary, word, translation, author_name, author_link)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let changed = stmt.execute(rusqlite::params![
            row.dictionary,
            row.word,
            row.translation,
            row.author_name,
            row.author_link,
        ])?;
        Ok(if changed == 1 {
            PutOutcome::Accepted
        } else {
            PutOutcome::Rejected
        })
    }

    fn quarantine(&mut self, url: &str, reason: &str) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO quarantine (url, reason) VALUES (?1, ?2)")?;
        stmt.execute(rusqlite::params![url, reason])?;
        Ok(())
    }
}

// ── Flat store ──

/// Append-only TSV sink. Uniqueness cannot be checked here, so every put is
/// accepted; quarantined URLs land in a sibling file.
pub struct FlatStore {
    writer: csv::Writer<File>,
    quarantine_path: String,
}

impl FlatStore {
    pub fn create(path: &str) -> Result<Self> {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Always)
            .from_path(path)
            .with_context(|| format!("Cannot create {}", path))?;
        Ok(Self {
            writer,
            quarantine_path: format!("{}.quarantine.tsv", path),
        })
    }
}

impl TranslationStore for FlatStore {
    fn put(&mut self, row: &StoredTranslation) -> Result<PutOutcome> {
        self.writer.write_record([
            row.dictionary.as_str(),
            row.word.as_str(),
            row.translation.as_str(),
            row.author_name.as_str(),
            row.author_link.as_str(),
        ])?;
        Ok(PutOutcome::Accepted)
    }

    fn quarantine(&mut self, url: &str, reason: &str) -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.quarantine_path)?;
        writeln!(file, "{}\t{}", url, reason)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ── Stats ──

pub struct Stats {
    pub translations: usize,
    pub dictionaries: usize,
    pub quarantined: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let translations: usize =
        conn.query_row("SELECT COUNT(*) FROM translations", [], |r| r.get(0))?;
    let dictionaries: usize = conn.query_row(
        "SELECT COUNT(DISTINCT dictionary) FROM translations",
        [],
        |r| r.get(0),
    )?;
    let quarantined: usize = conn.query_row("SELECT COUNT(*) FROM quarantine", [], |r| r.get(0))?;
    Ok(Stats {
        translations,
        dictionaries,
        quarantined,
    })
}

pub fn fetch_top_dictionaries(conn: &Connection, limit: usize) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT dictionary, COUNT(*) AS n FROM translations
         GROUP BY dictionary ORDER BY n DESC, dictionary LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Test store ──

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    rows: std::collections::HashSet<(String, String)>,
    pub quarantined: Vec<(String, String)>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, dictionary: &str, word: &str) -> bool {
        self.rows
            .contains(&(dictionary.to_string(), word.to_string()))
    }
}

#[cfg(test)]
impl TranslationStore for MemoryStore {
    fn put(&mut self, row: &StoredTranslation) -> Result<PutOutcome> {
        if self.rows.insert((row.dictionary.clone(), row.word.clone())) {
            Ok(PutOutcome::Accepted)
        } else {
            Ok(PutOutcome::Rejected)
        }
    }

    fn quarantine(&mut self, url: &str, reason: &str) -> Result<()> {
        self.quarantined.push((url.to_string(), reason.to_string()));
        Ok(())
    }
}
